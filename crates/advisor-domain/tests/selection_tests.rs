use std::sync::Arc;

use advisor_core::{DocumentKind, UploadedFile};
use advisor_domain::{DocumentSelection, DomainError, FileSource, InMemoryVault, NoticeLevel, RecordingNotifier,
                     RefreshSummary, SelectedItem, SelectionSession, VaultDirectory, VaultProject};
use uuid::Uuid;

struct Fixture {
    vault: InMemoryVault,
    project: VaultProject,
    doc1: Uuid,
    doc2: Uuid,
    doc3: Uuid,
}

/// doc1 y doc3 pertenecen al proyecto P; doc2 es suelto.
fn fixture() -> Fixture {
    let vault = InMemoryVault::new();
    let project = vault.add_project("Johnson Trust 2024");
    let doc1 = vault.add_document("K1.pdf", b"k1", Some(project.id)).unwrap().id;
    let doc2 = vault.add_document("W2.pdf", b"w2", None).unwrap().id;
    let doc3 = vault.add_document("1099-DIV.pdf", b"div", Some(project.id)).unwrap().id;
    Fixture { vault,
              project,
              doc1,
              doc2,
              doc3 }
}

fn names(selection: &DocumentSelection) -> Vec<(DocumentKind, String)> {
    selection.items().map(|i| (i.kind(), i.name().to_string())).collect()
}

#[test]
fn uploading_same_name_twice_keeps_one_item() {
    let mut selection = DocumentSelection::new();
    selection.add_uploaded_files(vec![UploadedFile::new("W9.pdf", b"v1".to_vec())]);
    selection.add_uploaded_files(vec![UploadedFile::new("W9.pdf", b"v2".to_vec())]);
    assert_eq!(names(&selection), vec![(DocumentKind::File, "W9.pdf".to_string())]);
    match selection.items().next() {
        Some(SelectedItem::File(file)) => {
            assert!(matches!(&file.source, FileSource::Upload(f) if f.bytes == b"v1"));
        }
        other => panic!("unexpected item {other:?}"),
    };
}

#[tokio::test]
async fn import_groups_project_members_and_keeps_loose_files() {
    let fx = fixture();
    let mut selection = DocumentSelection::new();
    let summary = selection.import_vault_selection(&fx.vault, &[fx.doc1, fx.doc2]).await.unwrap();
    assert_eq!(summary.projects_created, 1);
    assert_eq!(summary.members_added, 1);
    assert_eq!(summary.files_added, 1);

    assert_eq!(names(&selection),
               vec![(DocumentKind::Project, "Johnson Trust 2024".to_string()), (DocumentKind::File, "W2.pdf".to_string())]);
    let project = selection.find(fx.project.id).and_then(SelectedItem::as_project).unwrap();
    assert_eq!(project.member_file_names().collect::<Vec<_>>(), vec!["K1.pdf"]);

    // Cascade: removing the only member removes the project.
    assert!(selection.remove_project_member(fx.project.id, "K1.pdf"));
    assert_eq!(names(&selection), vec![(DocumentKind::File, "W2.pdf".to_string())]);
}

#[tokio::test]
async fn repeated_imports_are_idempotent() {
    let fx = fixture();
    let mut once = DocumentSelection::new();
    once.import_vault_selection(&fx.vault, &[fx.doc1, fx.doc2]).await.unwrap();

    let mut twice = DocumentSelection::new();
    twice.import_vault_selection(&fx.vault, &[fx.doc1, fx.doc2]).await.unwrap();
    let again = twice.import_vault_selection(&fx.vault, &[fx.doc1]).await.unwrap();
    assert_eq!(again.added(), 0);
    assert_eq!(again.duplicates, 1);
    assert_eq!(once, twice);

    // Same ids repeated inside one call.
    let mut dup = DocumentSelection::new();
    dup.import_vault_selection(&fx.vault, &[fx.doc2, fx.doc2, fx.doc1, fx.doc1]).await.unwrap();
    assert_eq!(dup.len(), 2);
}

#[tokio::test]
async fn no_duplicates_across_mixed_sources() {
    let fx = fixture();
    let mut selection = DocumentSelection::new();
    selection.add_uploaded_files(vec![UploadedFile::new("W2.pdf", b"local".to_vec())]);
    selection.import_vault_selection(&fx.vault, &[fx.doc2, fx.doc3, fx.doc1]).await.unwrap();
    selection.import_vault_selection(&fx.vault, &[fx.doc3]).await.unwrap();
    selection.add_uploaded_files(vec![UploadedFile::new("W2.pdf", b"again".to_vec())]);

    let files: Vec<_> = selection.items().filter(|i| i.kind() == DocumentKind::File).collect();
    assert_eq!(files.len(), 1, "W2.pdf appears once");
    let projects: Vec<_> = selection.items().filter_map(SelectedItem::as_project).collect();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].member_file_names().collect::<Vec<_>>(), vec!["1099-DIV.pdf", "K1.pdf"]);
}

#[tokio::test]
async fn unknown_id_aborts_whole_import() {
    let fx = fixture();
    let mut selection = DocumentSelection::new();
    selection.import_vault_selection(&fx.vault, &[fx.doc2]).await.unwrap();
    let before = selection.clone();

    let missing = Uuid::new_v4();
    let err = selection.import_vault_selection(&fx.vault, &[fx.doc1, missing]).await.unwrap_err();
    assert_eq!(err, DomainError::DocumentNotFound(missing));
    assert_eq!(selection, before);
}

#[tokio::test]
async fn vault_outage_leaves_selection_unchanged() {
    let fx = fixture();
    let mut selection = DocumentSelection::new();
    selection.import_vault_selection(&fx.vault, &[fx.doc2]).await.unwrap();
    let before = selection.clone();

    fx.vault.set_offline(true);
    let err = selection.import_vault_selection(&fx.vault, &[fx.doc1]).await.unwrap_err();
    assert!(matches!(err, DomainError::Vault(_)));
    assert_eq!(selection, before);
}

#[tokio::test]
async fn selection_is_a_snapshot_until_refreshed() {
    let fx = fixture();
    let mut selection = DocumentSelection::new();
    selection.import_vault_selection(&fx.vault, &[fx.doc2, fx.doc1]).await.unwrap();

    // doc2 joins the project, doc1 leaves it.
    fx.vault.move_document(fx.doc2, Some(fx.project.id)).unwrap();
    fx.vault.move_document(fx.doc1, None).unwrap();
    assert_eq!(names(&selection),
               vec![(DocumentKind::File, "W2.pdf".to_string()), (DocumentKind::Project, "Johnson Trust 2024".to_string())]);

    let summary = selection.refresh_from_vault(&fx.vault).await.unwrap();
    assert_eq!(summary.regrouped, 2);
    assert_eq!(summary.missing, 0);
    assert_eq!(names(&selection),
               vec![(DocumentKind::Project, "Johnson Trust 2024".to_string()), (DocumentKind::File, "K1.pdf".to_string())]);
    let project = selection.find(fx.project.id).and_then(SelectedItem::as_project).unwrap();
    assert_eq!(project.member_file_names().collect::<Vec<_>>(), vec!["W2.pdf"]);
}

#[tokio::test]
async fn refresh_drops_deleted_documents_and_keeps_uploads() {
    let fx = fixture();
    let mut selection = DocumentSelection::new();
    selection.add_uploaded_files(vec![UploadedFile::new("notes.txt", b"n".to_vec())]);
    selection.import_vault_selection(&fx.vault, &[fx.doc1]).await.unwrap();
    fx.vault.remove_document(fx.doc1);

    let summary = selection.refresh_from_vault(&fx.vault).await.unwrap();
    assert_eq!(summary.missing, 1);
    assert_eq!(names(&selection), vec![(DocumentKind::File, "notes.txt".to_string())]);
}

#[tokio::test]
async fn loose_file_is_absorbed_by_its_project() {
    let fx = fixture();
    let mut selection = DocumentSelection::new();
    selection.import_vault_selection(&fx.vault, &[fx.doc2]).await.unwrap();
    fx.vault.move_document(fx.doc2, Some(fx.project.id)).unwrap();

    // Re-importing the project's documents pulls doc2 into the project item.
    let members: Vec<Uuid> = fx.vault
                               .documents_for_project(fx.project.id)
                               .await
                               .unwrap()
                               .into_iter()
                               .map(|d| d.id)
                               .collect();
    let summary = selection.import_vault_selection(&fx.vault, &members).await.unwrap();
    assert_eq!(summary.absorbed, 1);
    assert_eq!(selection.len(), 1);
    let project = selection.find(fx.project.id).and_then(SelectedItem::as_project).unwrap();
    assert!(project.contains_document(fx.doc2));
    assert_eq!(project.len(), 3);
}

#[tokio::test]
async fn session_reports_failures_through_notifier() {
    let fx = fixture();
    let notifier = Arc::new(RecordingNotifier::new());
    let mut session = SelectionSession::new(notifier.clone());

    assert_eq!(session.upload(vec![UploadedFile::new("a.pdf", b"a".to_vec())]), 1);
    session.import(&fx.vault, &[fx.doc2]).await.unwrap();
    fx.vault.set_offline(true);
    assert!(session.import(&fx.vault, &[fx.doc1]).await.is_err());

    let notices = notifier.notices();
    assert_eq!(notices.len(), 3);
    assert_eq!(notices[2].level, NoticeLevel::Error);
    assert!(notices[..2].iter().all(|n| n.level == NoticeLevel::Info));
    assert_eq!(session.selection().len(), 2);
    assert_eq!(session.payload().len(), 2);
}

#[tokio::test]
async fn refresh_reports_documents_dropped_on_name_collision() {
    let fx = fixture();
    let notifier = Arc::new(RecordingNotifier::new());
    let mut session = SelectionSession::new(notifier.clone());
    session.upload(vec![UploadedFile::new("K1.pdf", b"local".to_vec())]);
    session.import(&fx.vault, &[fx.doc1]).await.unwrap();
    assert_eq!(session.selection().len(), 2);

    // doc1 leaves its project and now collides with the loose upload
    fx.vault.move_document(fx.doc1, None).unwrap();
    let summary = session.refresh(&fx.vault).await.unwrap();
    assert_eq!(summary.regrouped, 1);
    assert_eq!(summary.dropped, 1);
    assert_eq!(summary.missing, 0);
    assert_eq!(names(session.selection()), vec![(DocumentKind::File, "K1.pdf".to_string())]);
    assert!(matches!(session.selection().items().next(),
                     Some(SelectedItem::File(f)) if matches!(f.source, FileSource::Upload(_))));
    let notice = notifier.last().unwrap();
    assert_eq!(notice.level, NoticeLevel::Info);
    assert!(notice.message.contains("1 dropped"));
}

#[tokio::test]
async fn failed_session_refresh_keeps_selection_and_notifies() {
    let fx = fixture();
    let notifier = Arc::new(RecordingNotifier::new());
    let mut session = SelectionSession::new(notifier.clone());
    session.import(&fx.vault, &[fx.doc1, fx.doc2]).await.unwrap();
    let before = session.selection().clone();

    fx.vault.set_offline(true);
    let err = session.refresh(&fx.vault).await.unwrap_err();
    assert!(matches!(err, DomainError::Vault(_)));
    assert_eq!(session.selection(), &before);
    assert_eq!(notifier.last().unwrap().level, NoticeLevel::Error);

    // nothing changed in the vault: a successful refresh is silent
    fx.vault.set_offline(false);
    let notices = notifier.notices().len();
    let summary = session.refresh(&fx.vault).await.unwrap();
    assert_eq!(summary, RefreshSummary::default());
    assert_eq!(notifier.notices().len(), notices);
}
