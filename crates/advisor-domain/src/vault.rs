// vault.rs
//! Vault de documentos y proyectos: registros, contrato de consulta y una
//! implementación en memoria.
use std::sync::atomic::{AtomicBool, Ordering};

use advisor_core::{DocumentSink, StoreError, UploadedFile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::DomainError;

/// Documento almacenado en el vault. Pertenece como mucho a un proyecto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultDocument {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
    /// SHA-256 hex del contenido, si se conoce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Carpeta de proyecto del vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VaultProject {
    pub id: Uuid,
    pub name: String,
}

/// Consultas de sólo lectura sobre el vault.
#[async_trait]
pub trait VaultDirectory: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<VaultDocument>, StoreError>;
    async fn list_projects(&self) -> Result<Vec<VaultProject>, StoreError>;
    async fn get_document(&self, document_id: Uuid) -> Result<Option<VaultDocument>, StoreError>;
    /// Proyecto padre del documento, o `None` si es un documento suelto.
    async fn project_for_document(&self, document_id: Uuid) -> Result<Option<VaultProject>, StoreError>;
    async fn documents_for_project(&self, project_id: Uuid) -> Result<Vec<VaultDocument>, StoreError>;
}

/// SHA-256 hex de un contenido.
pub fn content_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Tipo de documento a partir de la extensión del nombre ("pdf", "csv", ...).
pub fn doc_type_from_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => "file".to_string(),
    }
}

/// Vault en memoria. También actúa como `DocumentSink`: un upload se guarda
/// como documento suelto con su checksum.
#[derive(Debug, Default)]
pub struct InMemoryVault {
    documents: DashMap<Uuid, VaultDocument>,
    projects: DashMap<Uuid, VaultProject>,
    offline: AtomicBool,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(&self, name: impl Into<String>) -> VaultProject {
        let project = VaultProject { id: Uuid::new_v4(),
                                     name: name.into() };
        self.projects.insert(project.id, project.clone());
        project
    }

    /// Registra un documento, opcionalmente dentro de un proyecto existente.
    pub fn add_document(&self,
                        name: impl Into<String>,
                        bytes: &[u8],
                        project_id: Option<Uuid>)
                        -> Result<VaultDocument, DomainError> {
        if let Some(pid) = project_id {
            if !self.projects.contains_key(&pid) {
                return Err(DomainError::ProjectNotFound(pid));
            }
        }
        let name = name.into();
        let doc = VaultDocument { id: Uuid::new_v4(),
                                  doc_type: doc_type_from_name(&name),
                                  name,
                                  file_size: bytes.len() as u64,
                                  project_id,
                                  uploaded_at: Utc::now(),
                                  checksum: Some(content_checksum(bytes)) };
        self.documents.insert(doc.id, doc.clone());
        Ok(doc)
    }

    /// Mueve un documento a otro proyecto (o lo deja suelto con `None`).
    pub fn move_document(&self, document_id: Uuid, project_id: Option<Uuid>) -> Result<(), DomainError> {
        if let Some(pid) = project_id {
            if !self.projects.contains_key(&pid) {
                return Err(DomainError::ProjectNotFound(pid));
            }
        }
        let mut doc = self.documents
                          .get_mut(&document_id)
                          .ok_or(DomainError::DocumentNotFound(document_id))?;
        doc.project_id = project_id;
        Ok(())
    }

    pub fn remove_document(&self, document_id: Uuid) -> Option<VaultDocument> {
        self.documents.remove(&document_id).map(|(_, d)| d)
    }

    /// Simula una caída del vault: todas las consultas fallan con
    /// `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("vault is offline".into()));
        }
        Ok(())
    }

    fn sorted(mut docs: Vec<VaultDocument>) -> Vec<VaultDocument> {
        docs.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then_with(|| a.name.cmp(&b.name)));
        docs
    }
}

#[async_trait]
impl VaultDirectory for InMemoryVault {
    async fn list_documents(&self) -> Result<Vec<VaultDocument>, StoreError> {
        self.ensure_online()?;
        Ok(Self::sorted(self.documents.iter().map(|d| d.clone()).collect()))
    }

    async fn list_projects(&self) -> Result<Vec<VaultProject>, StoreError> {
        self.ensure_online()?;
        let mut projects: Vec<VaultProject> = self.projects.iter().map(|p| p.clone()).collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    async fn get_document(&self, document_id: Uuid) -> Result<Option<VaultDocument>, StoreError> {
        self.ensure_online()?;
        Ok(self.documents.get(&document_id).map(|d| d.clone()))
    }

    async fn project_for_document(&self, document_id: Uuid) -> Result<Option<VaultProject>, StoreError> {
        self.ensure_online()?;
        let project_id = self.documents.get(&document_id).and_then(|d| d.project_id);
        Ok(project_id.and_then(|pid| self.projects.get(&pid).map(|p| p.clone())))
    }

    async fn documents_for_project(&self, project_id: Uuid) -> Result<Vec<VaultDocument>, StoreError> {
        self.ensure_online()?;
        Ok(Self::sorted(self.documents
                            .iter()
                            .filter(|d| d.project_id == Some(project_id))
                            .map(|d| d.clone())
                            .collect()))
    }
}

#[async_trait]
impl DocumentSink for InMemoryVault {
    async fn store_upload(&self, file: &UploadedFile) -> Result<Uuid, StoreError> {
        self.ensure_online()?;
        let doc = self.add_document(file.name.clone(), &file.bytes, None)
                      .map_err(|e| StoreError::Backend(e.to_string()))?;
        debug!("vault:upload document_id={} name={} size={}", doc.id, doc.name, doc.file_size);
        Ok(doc.id)
    }

    async fn discard_upload(&self, document_id: Uuid) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.documents.remove(&document_id);
        Ok(())
    }
}
