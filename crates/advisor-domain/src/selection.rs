// selection.rs
//! Agregador de documentos seleccionados para un run pendiente.
//!
//! `DocumentSelection` es la única fuente de verdad sobre qué documentos se
//! enviarán con el run. Mezcla tres orígenes (uploads directos, documentos
//! del vault sueltos y documentos del vault agrupados por proyecto) y
//! mantiene estos invariantes:
//!
//! * no hay dos `FileItem` con el mismo nombre ni dos `ProjectItem` con el
//!   mismo id;
//! * un documento que pertenece a un proyecto aparece una sola vez, dentro de
//!   su `ProjectItem`, nunca además como `FileItem` suelto;
//! * un `ProjectItem` nunca queda sin miembros.
//!
//! Los duplicados se resuelven como no-op; las únicas operaciones que pueden
//! fallar son las que consultan el vault, y fallan sin modificar nada.
use std::collections::HashMap;

use advisor_core::{DocumentKind, DocumentSource, ProjectRef, SelectionPayload, SubmittedDocument, UploadedFile};
use indexmap::IndexMap;
use log::debug;
use uuid::Uuid;

use crate::vault::{VaultDirectory, VaultDocument, VaultProject};
use crate::DomainError;

/// Origen del contenido de un `FileItem`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Archivo recién subido; aún no existe en el vault.
    Upload(UploadedFile),
    /// Documento existente del vault.
    Vault(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    pub id: Uuid,
    pub name: String,
    pub source: FileSource,
}

impl FileItem {
    pub fn vault_document_id(&self) -> Option<Uuid> {
        match self.source {
            FileSource::Vault(id) => Some(id),
            FileSource::Upload(_) => None,
        }
    }
}

/// Carpeta de proyecto con los miembros actualmente seleccionados
/// (nombre -> id de documento, en orden de inserción).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectItem {
    pub id: Uuid,
    pub name: String,
    members: IndexMap<String, Uuid>,
}

impl ProjectItem {
    fn new(project: &VaultProject) -> Self {
        Self { id: project.id,
               name: project.name.clone(),
               members: IndexMap::new() }
    }

    pub fn member_file_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, Uuid)> {
        self.members.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn contains_document(&self, document_id: Uuid) -> bool {
        self.members.values().any(|id| *id == document_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectedItem {
    File(FileItem),
    Project(ProjectItem),
}

impl SelectedItem {
    pub fn id(&self) -> Uuid {
        match self {
            SelectedItem::File(f) => f.id,
            SelectedItem::Project(p) => p.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SelectedItem::File(f) => &f.name,
            SelectedItem::Project(p) => &p.name,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            SelectedItem::File(_) => DocumentKind::File,
            SelectedItem::Project(_) => DocumentKind::Project,
        }
    }

    pub fn as_project(&self) -> Option<&ProjectItem> {
        match self {
            SelectedItem::Project(p) => Some(p),
            SelectedItem::File(_) => None,
        }
    }
}

/// Resultado de una importación desde el vault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub files_added: usize,
    pub members_added: usize,
    pub projects_created: usize,
    /// Documentos ya presentes (o con nombre ya usado) que se ignoraron.
    pub duplicates: usize,
    /// `FileItem` sueltos absorbidos por el proyecto al que pertenecen.
    pub absorbed: usize,
}

impl ImportSummary {
    pub fn added(&self) -> usize {
        self.files_added + self.members_added
    }
}

/// Resultado de `refresh_from_vault`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Documentos cuyo proyecto cambió desde que se importaron.
    pub regrouped: usize,
    /// Documentos que ya no existen en el vault y se quitaron.
    pub missing: usize,
    /// Documentos que al reagruparse chocaron con otro elemento de la
    /// selección (mismo nombre) y se quitaron.
    pub dropped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSelection {
    items: IndexMap<Uuid, SelectedItem>,
}

impl DocumentSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> impl Iterator<Item = &SelectedItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, id: Uuid) -> Option<&SelectedItem> {
        self.items.get(&id)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Agrega un `FileItem` por archivo. Un nombre ya seleccionado se ignora
    /// (gana la primera selección). Devuelve cuántos se agregaron.
    pub fn add_uploaded_files<I>(&mut self, files: I) -> usize
        where I: IntoIterator<Item = UploadedFile>
    {
        let mut added = 0;
        for file in files {
            if self.file_named(&file.name).is_some() {
                debug!("selection:skip duplicate upload name={}", file.name);
                continue;
            }
            let item = FileItem { id: Uuid::new_v4(),
                                  name: file.name.clone(),
                                  source: FileSource::Upload(file) };
            self.items.insert(item.id, SelectedItem::File(item));
            added += 1;
        }
        added
    }

    /// Importa documentos del vault por id.
    ///
    /// Primero se resuelven todos los ids (documento y proyecto padre); si
    /// alguna consulta falla o un id no existe, se devuelve el error y la
    /// selección queda intacta. Después la fusión es puramente local.
    pub async fn import_vault_selection(&mut self,
                                        vault: &dyn VaultDirectory,
                                        ids: &[Uuid])
                                        -> Result<ImportSummary, DomainError> {
        let resolved = resolve(vault, ids).await?;
        let mut summary = ImportSummary::default();
        for (doc, project) in &resolved {
            self.merge_vault_document(doc, project.as_ref(), &mut summary);
        }
        debug!("selection:import ids={} added={} duplicates={}",
               ids.len(),
               summary.added(),
               summary.duplicates);
        Ok(summary)
    }

    /// Quita un `FileItem` o un `ProjectItem` completo.
    pub fn remove_item(&mut self, id: Uuid) -> bool {
        self.items.shift_remove(&id).is_some()
    }

    /// Quita un miembro de un proyecto. Si era el último, el proyecto
    /// desaparece de la selección.
    pub fn remove_project_member(&mut self, project_id: Uuid, member_name: &str) -> bool {
        let Some(SelectedItem::Project(project)) = self.items.get_mut(&project_id) else {
            return false;
        };
        if project.members.shift_remove(member_name).is_none() {
            return false;
        }
        if project.members.is_empty() {
            self.items.shift_remove(&project_id);
        }
        true
    }

    /// Payload normalizado: una entrada por documento, los miembros de
    /// proyecto etiquetados con su proyecto de origen.
    pub fn to_payload(&self) -> SelectionPayload {
        let mut documents = Vec::new();
        for item in self.items.values() {
            match item {
                SelectedItem::File(file) => {
                    let source = match &file.source {
                        FileSource::Upload(upload) => DocumentSource::Upload(upload.clone()),
                        FileSource::Vault(id) => DocumentSource::Vault(*id),
                    };
                    documents.push(SubmittedDocument { source,
                                                       name: file.name.clone(),
                                                       project: None });
                }
                SelectedItem::Project(project) => {
                    let origin = ProjectRef { id: project.id,
                                              name: project.name.clone() };
                    for (name, doc_id) in project.members() {
                        documents.push(SubmittedDocument { source: DocumentSource::Vault(doc_id),
                                                           name: name.to_string(),
                                                           project: Some(origin.clone()) });
                    }
                }
            }
        }
        SelectionPayload::new(documents)
    }

    /// Vuelve a resolver contra el vault todos los documentos que vienen de
    /// él, reagrupándolos según la pertenencia actual a proyectos. Los
    /// uploads no se tocan y el orden relativo se conserva. Todo o nada.
    pub async fn refresh_from_vault(&mut self, vault: &dyn VaultDirectory) -> Result<RefreshSummary, DomainError> {
        // (id documento, proyecto en el que estaba seleccionado)
        let mut previous: Vec<(Uuid, Option<Uuid>)> = Vec::new();
        for item in self.items.values() {
            match item {
                SelectedItem::File(file) => {
                    if let Some(id) = file.vault_document_id() {
                        previous.push((id, None));
                    }
                }
                SelectedItem::Project(project) => {
                    previous.extend(project.members.values().map(|id| (*id, Some(project.id))));
                }
            }
        }

        let mut current: HashMap<Uuid, (VaultDocument, Option<VaultProject>)> = HashMap::new();
        for (doc_id, _) in &previous {
            let Some(doc) = vault.get_document(*doc_id).await? else {
                continue;
            };
            let project = vault.project_for_document(*doc_id).await?;
            current.insert(*doc_id, (doc, project));
        }

        let mut summary = RefreshSummary::default();
        let mut rebuilt = DocumentSelection::new();
        let mut scratch = ImportSummary::default();
        for item in self.items.values() {
            let vault_ids: Vec<(Uuid, Option<Uuid>)> = match item {
                SelectedItem::File(file) => match &file.source {
                    FileSource::Upload(_) => {
                        rebuilt.items.insert(file.id, item.clone());
                        continue;
                    }
                    FileSource::Vault(id) => vec![(*id, None)],
                },
                SelectedItem::Project(project) => project.members.values().map(|id| (*id, Some(project.id))).collect(),
            };
            for (doc_id, was_in) in vault_ids {
                match current.get(&doc_id) {
                    Some((doc, project)) => {
                        if project.as_ref().map(|p| p.id) != was_in {
                            summary.regrouped += 1;
                        }
                        rebuilt.merge_vault_document(doc, project.as_ref(), &mut scratch);
                    }
                    None => summary.missing += 1,
                }
            }
        }
        summary.dropped = scratch.duplicates;
        self.items = rebuilt.items;
        debug!("selection:refresh regrouped={} missing={} dropped={}",
               summary.regrouped,
               summary.missing,
               summary.dropped);
        Ok(summary)
    }

    fn file_named(&self, name: &str) -> Option<&FileItem> {
        self.items.values().find_map(|item| match item {
                               SelectedItem::File(f) if f.name == name => Some(f),
                               _ => None,
                           })
    }

    fn holds_document(&self, document_id: Uuid) -> bool {
        self.items.values().any(|item| match item {
                               SelectedItem::File(f) => f.vault_document_id() == Some(document_id),
                               SelectedItem::Project(p) => p.contains_document(document_id),
                           })
    }

    fn merge_vault_document(&mut self, doc: &VaultDocument, project: Option<&VaultProject>, summary: &mut ImportSummary) {
        match project {
            None => {
                if self.holds_document(doc.id) || self.file_named(&doc.name).is_some() {
                    summary.duplicates += 1;
                    return;
                }
                let item = FileItem { id: doc.id,
                                      name: doc.name.clone(),
                                      source: FileSource::Vault(doc.id) };
                self.items.insert(item.id, SelectedItem::File(item));
                summary.files_added += 1;
            }
            Some(project) => {
                // Un FileItem suelto del mismo documento pasa a vivir dentro
                // de su proyecto.
                let loose = self.items
                                .values()
                                .find_map(|item| match item {
                                    SelectedItem::File(f) if f.vault_document_id() == Some(doc.id) => Some(f.id),
                                    _ => None,
                                });
                let already_member = self.items
                                         .values()
                                         .filter_map(SelectedItem::as_project)
                                         .any(|p| p.contains_document(doc.id) || (p.id == project.id && p.members.contains_key(&doc.name)));
                if already_member {
                    summary.duplicates += 1;
                    return;
                }
                if let Some(loose_id) = loose {
                    self.items.shift_remove(&loose_id);
                    summary.absorbed += 1;
                }
                let entry = self.items
                                .entry(project.id)
                                .or_insert_with(|| SelectedItem::Project(ProjectItem::new(project)));
                if let SelectedItem::Project(item) = entry {
                    if item.members.is_empty() {
                        summary.projects_created += 1;
                    }
                    item.members.insert(doc.name.clone(), doc.id);
                    summary.members_added += 1;
                }
            }
        }
    }
}

async fn resolve(vault: &dyn VaultDirectory, ids: &[Uuid]) -> Result<Vec<(VaultDocument, Option<VaultProject>)>, DomainError> {
    let mut resolved = Vec::with_capacity(ids.len());
    for id in ids {
        let doc = vault.get_document(*id).await?.ok_or(DomainError::DocumentNotFound(*id))?;
        let project = vault.project_for_document(*id).await?;
        resolved.push((doc, project));
    }
    Ok(resolved)
}
