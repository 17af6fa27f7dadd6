//! CLI de operación sobre el backend Postgres.
//!
//! `advisor-cli submit --workflow <ID> --run-by <WHO> [--input k=v]... [--vault-doc <UUID>]... [--file <PATH>]...`
//! `advisor-cli execute --run <UUID> --title <TXT> [--description <TXT>]`
//! `advisor-cli show --run <UUID>`
//! `advisor-cli reap [--max-idle-secs <N>]`
//! `advisor-cli documents`
//!
//! Códigos de salida: 0 ok, 4 rechazado / no encontrado, 5 error.
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use advisor_adapters::{CatalogPlanner, LogNotifier, TemplateNarrator};
use advisor_core::{DocumentKind, ExecuteDocument, ExecuteOutcome, ExecuteRequest, RunDocumentAssociation, RunError,
                   RunLifecycleManager, RunSubmission, UploadedFile};
use advisor_domain::{SelectionSession, VaultDirectory};
use advisor_persistence::{build_pool_from_env, PgRunStore, PgVault};
use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "advisor-cli", about = "Workflow runs over the document vault")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crea un run en `initializing` con documentos del vault y archivos locales.
    Submit {
        #[arg(long)]
        workflow: String,
        #[arg(long = "run-by")]
        run_by: String,
        /// Respuesta `clave=valor`; el valor se interpreta como JSON si es válido.
        #[arg(long = "input")]
        inputs: Vec<String>,
        #[arg(long = "vault-doc")]
        vault_docs: Vec<Uuid>,
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
    /// Ejecuta un run en `initializing`.
    Execute {
        #[arg(long)]
        run: Uuid,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Muestra un run con sus documentos.
    Show {
        #[arg(long)]
        run: Uuid,
    },
    /// Marca `failed` los runs en `running` sin actividad.
    Reap {
        #[arg(long = "max-idle-secs", default_value_t = 900)]
        max_idle_secs: i64,
    },
    /// Lista los documentos del vault.
    Documents,
}

#[derive(Debug)]
enum CliError {
    Rejected(String),
    Failed(String),
}

impl From<RunError> for CliError {
    fn from(e: RunError) -> Self {
        match e {
            RunError::RunNotFound(_) | RunError::WorkflowMismatch { .. } => CliError::Rejected(e.to_string()),
            other => CliError::Failed(other.to_string()),
        }
    }
}

/// `clave=valor` -> (clave, valor JSON o string).
fn parse_input(raw: &str) -> Result<(String, serde_json::Value), CliError> {
    let (key, value) = raw.split_once('=')
                          .ok_or_else(|| CliError::Rejected(format!("input sin '=': {raw}")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::Rejected(format!("input sin clave: {raw}")));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Reconstruye el resumen `[{id, name, type}]` de un run a partir de sus
/// asociaciones: una entrada por proyecto y una por documento suelto.
async fn documents_from_associations(vault: &dyn VaultDirectory,
                                     associations: &[RunDocumentAssociation])
                                     -> Result<Vec<ExecuteDocument>, CliError> {
    let mut out: Vec<ExecuteDocument> = Vec::new();
    for assoc in associations {
        if let Some(project_id) = assoc.project_id {
            if out.iter().any(|d| d.kind == DocumentKind::Project && d.id == project_id) {
                continue;
            }
            let project = vault.project_for_document(assoc.document_id)
                               .await
                               .map_err(|e| CliError::Failed(e.to_string()))?;
            let name = project.filter(|p| p.id == project_id)
                              .map(|p| p.name)
                              .unwrap_or_else(|| project_id.to_string());
            out.push(ExecuteDocument { id: project_id,
                                       name,
                                       kind: DocumentKind::Project });
        } else {
            let doc = vault.get_document(assoc.document_id)
                           .await
                           .map_err(|e| CliError::Failed(e.to_string()))?;
            out.push(ExecuteDocument { id: assoc.document_id,
                                       name: doc.map(|d| d.name).unwrap_or_else(|| assoc.document_id.to_string()),
                                       kind: DocumentKind::File });
        }
    }
    Ok(out)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::Failed(e.to_string()))?;
    println!("{text}");
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let pool = build_pool_from_env().await
                                    .map_err(|e| CliError::Failed(format!("pool error: {e}")))?;
    let store = Arc::new(PgRunStore::new(pool.clone()));
    let vault = Arc::new(PgVault::new(pool));
    let manager = RunLifecycleManager::builder(store, vault.clone()).narrator(Arc::new(TemplateNarrator::default()))
                                                                     .planner(Arc::new(CatalogPlanner::tax_advisory()))
                                                                     .build();

    match cli.command {
        Command::Submit { workflow,
                          run_by,
                          inputs,
                          vault_docs,
                          files, } => {
            let mut answers = serde_json::Map::new();
            for raw in &inputs {
                let (k, v) = parse_input(raw)?;
                answers.insert(k, v);
            }
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                let bytes = tokio::fs::read(path).await
                                                 .map_err(|e| CliError::Failed(format!("{}: {e}", path.display())))?;
                let name = path.file_name()
                               .map(|n| n.to_string_lossy().to_string())
                               .ok_or_else(|| CliError::Rejected(format!("ruta sin nombre: {}", path.display())))?;
                uploads.push(UploadedFile::new(name, bytes));
            }

            let mut session = SelectionSession::new(Arc::new(LogNotifier));
            session.upload(uploads);
            if !vault_docs.is_empty() {
                session.import(vault.as_ref(), &vault_docs)
                       .await
                       .map_err(|e| CliError::Rejected(e.to_string()))?;
            }
            let init = manager.initialize(RunSubmission { workflow_id: workflow,
                                                          run_by,
                                                          inputs: answers,
                                                          documents: session.payload() })
                              .await?;
            print_json(&serde_json::json!({ "runId": init.run.id,
                                            "status": init.run.status,
                                            "documents": init.documents }))
        }
        Command::Execute { run,
                           title,
                           description, } => {
            let view = manager.load(run).await?;
            let documents = documents_from_associations(vault.as_ref(), &view.associations).await?;
            let request = ExecuteRequest { run_id: run,
                                           workflow_id: view.run.workflow_id.clone(),
                                           workflow_title: title,
                                           workflow_description: description,
                                           inputs: view.run.inputs.clone(),
                                           documents: Some(documents) };
            match manager.execute(&request).await? {
                ExecuteOutcome::Completed(done) => print_json(&done),
                ExecuteOutcome::Skipped(current) => {
                    Err(CliError::Rejected(format!("run {run} ya está en estado {}", current.status)))
                }
            }
        }
        Command::Show { run } => {
            let view = manager.load(run).await?;
            print_json(&serde_json::json!({ "run": view.run, "documents": view.associations }))
        }
        Command::Reap { max_idle_secs } => {
            let reaped = manager.reap_stalled_runs(chrono::Duration::seconds(max_idle_secs)).await?;
            print_json(&reaped)
        }
        Command::Documents => {
            let docs = vault.list_documents().await.map_err(|e| CliError::Failed(e.to_string()))?;
            print_json(&docs)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Cargar .env si existe para obtener DATABASE_URL
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
                             .with_writer(std::io::stderr)
                             .init();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Rejected(msg)) => {
            eprintln!("[advisor-cli] rechazado: {msg}");
            ExitCode::from(4)
        }
        Err(CliError::Failed(msg)) => {
            eprintln!("[advisor-cli] error: {msg}");
            ExitCode::from(5)
        }
    }
}
