use advisor_core::{DocumentSink, StoreError, UploadedFile};
use advisor_domain::vault::{content_checksum, doc_type_from_name};
use advisor_domain::{VaultDirectory, VaultDocument, VaultProject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::{with_retry, PgPool};
use crate::error::PersistenceError;

const DOCUMENT_COLUMNS: &str = "d.id, d.name, d.doc_type, d.file_size, d.project_id, d.uploaded_at, d.checksum";

/// Vault sobre `vault_documents` / `vault_projects`.
#[derive(Clone)]
pub struct PgVault {
    pool: PgPool,
}

impl PgVault {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_project(&self, name: &str) -> Result<VaultProject, PersistenceError> {
        let project = VaultProject { id: Uuid::new_v4(),
                                    name: name.to_string() };
        sqlx::query("INSERT INTO vault_projects (id, name) VALUES ($1,$2)").bind(project.id)
                                                                          .bind(&project.name)
                                                                          .execute(&self.pool)
                                                                          .await?;
        Ok(project)
    }

    /// Guarda un documento con su contenido. `project_id` debe existir.
    pub async fn insert_document(&self,
                                 name: &str,
                                 bytes: &[u8],
                                 content_type: Option<&str>,
                                 project_id: Option<Uuid>)
                                 -> Result<VaultDocument, PersistenceError> {
        let doc = VaultDocument { id: Uuid::new_v4(),
                                  name: name.to_string(),
                                  doc_type: doc_type_from_name(name),
                                  file_size: bytes.len() as u64,
                                  project_id,
                                  uploaded_at: Utc::now(),
                                  checksum: Some(content_checksum(bytes)) };
        let size = i64::try_from(doc.file_size).map_err(|_| PersistenceError::Decode(format!("file too large: {}", doc.file_size)))?;
        sqlx::query("INSERT INTO vault_documents (id, name, doc_type, file_size, project_id, content, content_type, checksum, uploaded_at)
                     VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)")
            .bind(doc.id)
            .bind(&doc.name)
            .bind(&doc.doc_type)
            .bind(size)
            .bind(doc.project_id)
            .bind(bytes)
            .bind(content_type)
            .bind(&doc.checksum)
            .bind(doc.uploaded_at)
            .execute(&self.pool)
            .await?;
        Ok(doc)
    }

    pub async fn move_document(&self, document_id: Uuid, project_id: Option<Uuid>) -> Result<(), PersistenceError> {
        let result = sqlx::query("UPDATE vault_documents SET project_id = $2 WHERE id = $1").bind(document_id)
                                                                                          .bind(project_id)
                                                                                          .execute(&self.pool)
                                                                                          .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound);
        }
        Ok(())
    }

    async fn delete_document_once(&self, document_id: Uuid) -> Result<(), PersistenceError> {
        let result = sqlx::query("DELETE FROM vault_documents WHERE id = $1").bind(document_id)
                                                                             .execute(&self.pool)
                                                                             .await?;
        debug!("vault:discard document_id={document_id} rows={}", result.rows_affected());
        Ok(())
    }

    async fn documents_where(&self, filter: &str, id: Option<Uuid>) -> Result<Vec<VaultDocument>, PersistenceError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM vault_documents d {filter} ORDER BY d.uploaded_at, d.name");
        let mut query = sqlx::query(&sql);
        if let Some(id) = id {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_document).collect()
    }

    async fn get_document_once(&self, document_id: Uuid) -> Result<Option<VaultDocument>, PersistenceError> {
        Ok(self.documents_where("WHERE d.id = $1", Some(document_id)).await?.into_iter().next())
    }

    async fn project_for_document_once(&self, document_id: Uuid) -> Result<Option<VaultProject>, PersistenceError> {
        let row: Option<(Uuid, String)> =
            sqlx::query_as("SELECT p.id, p.name FROM vault_documents d JOIN vault_projects p ON p.id = d.project_id WHERE d.id = $1")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, name)| VaultProject { id, name }))
    }

    async fn list_projects_once(&self) -> Result<Vec<VaultProject>, PersistenceError> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as("SELECT id, name FROM vault_projects ORDER BY name").fetch_all(&self.pool)
                                                                                                          .await?;
        Ok(rows.into_iter().map(|(id, name)| VaultProject { id, name }).collect())
    }
}

fn row_to_document(row: &PgRow) -> Result<VaultDocument, PersistenceError> {
    let size: i64 = row.try_get("file_size")?;
    let uploaded_at: DateTime<Utc> = row.try_get("uploaded_at")?;
    Ok(VaultDocument { id: row.try_get("id")?,
                       name: row.try_get("name")?,
                       doc_type: row.try_get("doc_type")?,
                       file_size: u64::try_from(size).map_err(|_| PersistenceError::Decode(format!("negative file_size {size}")))?,
                       project_id: row.try_get("project_id")?,
                       uploaded_at,
                       checksum: row.try_get("checksum")? })
}

#[async_trait]
impl VaultDirectory for PgVault {
    async fn list_documents(&self) -> Result<Vec<VaultDocument>, StoreError> {
        Ok(with_retry("list_documents", move || self.documents_where("", None)).await?)
    }

    async fn list_projects(&self) -> Result<Vec<VaultProject>, StoreError> {
        Ok(with_retry("list_projects", move || self.list_projects_once()).await?)
    }

    async fn get_document(&self, document_id: Uuid) -> Result<Option<VaultDocument>, StoreError> {
        Ok(with_retry("get_document", move || self.get_document_once(document_id)).await?)
    }

    async fn project_for_document(&self, document_id: Uuid) -> Result<Option<VaultProject>, StoreError> {
        Ok(with_retry("project_for_document", move || self.project_for_document_once(document_id)).await?)
    }

    async fn documents_for_project(&self, project_id: Uuid) -> Result<Vec<VaultDocument>, StoreError> {
        Ok(with_retry("documents_for_project",
                      move || self.documents_where("WHERE d.project_id = $1", Some(project_id))).await?)
    }
}

#[async_trait]
impl DocumentSink for PgVault {
    async fn store_upload(&self, file: &UploadedFile) -> Result<Uuid, StoreError> {
        let doc = self.insert_document(&file.name, &file.bytes, file.content_type.as_deref(), None)
                      .await?;
        debug!("vault:upload document_id={} name={} size={}", doc.id, doc.name, doc.file_size);
        Ok(doc.id)
    }

    async fn discard_upload(&self, document_id: Uuid) -> Result<(), StoreError> {
        Ok(with_retry("discard_upload", move || self.delete_document_once(document_id)).await?)
    }
}
