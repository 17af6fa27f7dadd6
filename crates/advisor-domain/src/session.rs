// session.rs
use std::sync::Arc;

use advisor_core::{SelectionPayload, UploadedFile};
use log::warn;
use uuid::Uuid;

use crate::notify::{Notice, Notifier};
use crate::selection::{DocumentSelection, ImportSummary, RefreshSummary};
use crate::vault::VaultDirectory;
use crate::DomainError;

/// Selección en curso acoplada al canal de notificaciones del usuario.
///
/// Los fallos de E/S del vault se convierten en un aviso de error y dejan la
/// selección sin cambios; las operaciones exitosas emiten un aviso
/// informativo.
pub struct SelectionSession {
    selection: DocumentSelection,
    notifier: Arc<dyn Notifier>,
}

impl SelectionSession {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { selection: DocumentSelection::new(),
               notifier }
    }

    pub fn selection(&self) -> &DocumentSelection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut DocumentSelection {
        &mut self.selection
    }

    pub fn upload(&mut self, files: Vec<UploadedFile>) -> usize {
        let offered = files.len();
        let added = self.selection.add_uploaded_files(files);
        if added > 0 {
            self.notifier.notify(Notice::info(format!("Added {added} file(s)")));
        }
        if added < offered {
            self.notifier
                .notify(Notice::info(format!("Skipped {} file(s) already selected", offered - added)));
        }
        added
    }

    pub async fn import(&mut self, vault: &dyn VaultDirectory, ids: &[Uuid]) -> Result<ImportSummary, DomainError> {
        match self.selection.import_vault_selection(vault, ids).await {
            Ok(summary) => {
                self.notifier
                    .notify(Notice::info(format!("Imported {} document(s) from the vault", summary.added())));
                Ok(summary)
            }
            Err(e) => {
                warn!("selection:import failed ids={} err={e}", ids.len());
                self.notifier.notify(Notice::error(format!("Could not import documents: {e}")));
                Err(e)
            }
        }
    }

    pub async fn refresh(&mut self, vault: &dyn VaultDirectory) -> Result<RefreshSummary, DomainError> {
        match self.selection.refresh_from_vault(vault).await {
            Ok(summary) => {
                if summary.regrouped + summary.missing + summary.dropped > 0 {
                    self.notifier.notify(Notice::info(format!("Documents refreshed: {} regrouped, {} no longer in the vault, {} dropped as duplicates",
                                                              summary.regrouped, summary.missing, summary.dropped)));
                }
                Ok(summary)
            }
            Err(e) => {
                warn!("selection:refresh failed err={e}");
                self.notifier.notify(Notice::error(format!("Could not refresh documents: {e}")));
                Err(e)
            }
        }
    }

    pub fn payload(&self) -> SelectionPayload {
        self.selection.to_payload()
    }

    pub fn into_selection(self) -> DocumentSelection {
        self.selection
    }
}
