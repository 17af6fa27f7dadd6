// advisor-domain library entry point
pub mod error;
pub mod notify;
pub mod selection;
pub mod session;
pub mod vault;

pub use error::DomainError;
pub use notify::{Notice, NoticeLevel, Notifier, RecordingNotifier};
pub use selection::{DocumentSelection, FileItem, FileSource, ImportSummary, ProjectItem, RefreshSummary, SelectedItem};
pub use session::SelectionSession;
pub use vault::{InMemoryVault, VaultDirectory, VaultDocument, VaultProject};
