//! Command-line front end for scene documents.
//!
//! # Responsibility
//! - Inspect, migrate and edit wire-format document files.
//! - Move documents in and out of the SQLite store.
//!
//! # Invariants
//! - Output files are only written after every step succeeded.
//! - Diagnostics go to stderr; stdout carries JSON results only.

mod error;

use clap::{Args, Parser, Subcommand};
use error::{CliError, CliResult};
use log::info;
use scenebook_core::db::open_db;
use scenebook_core::{
    default_log_level, init_logging, Command, Document, DocumentId, DocumentRepository,
    EditorConfig, EntityRecord, InMemoryRegistry, SceneEditor, SqliteDocumentRepository,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "scenebook", version, about = "Scene-segmented document tool")]
struct Cli {
    /// Editor configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write rolling logs into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Print scene summaries of a document file
    Inspect(InspectArgs),

    /// Repair a legacy document and write it back out
    Migrate(MigrateArgs),

    /// Run a JSON list of editor commands against a document
    Apply(ApplyArgs),

    /// Work with the SQLite document store
    #[command(subcommand)]
    Store(StoreCommand),
}

#[derive(Args)]
struct InspectArgs {
    /// Document file in wire JSON
    file: PathBuf,

    /// Entity records (JSON array) used to report dangling references
    #[arg(long)]
    registry: Option<PathBuf>,
}

#[derive(Args)]
struct MigrateArgs {
    input: PathBuf,

    /// Output path; prints to stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ApplyArgs {
    /// Document file in wire JSON
    file: PathBuf,

    /// JSON array of tagged commands
    commands: PathBuf,

    /// Output path; prints to stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum StoreCommand {
    /// Save a document file into the store
    Save {
        db: PathBuf,
        file: PathBuf,
        #[arg(long, default_value = "")]
        title: String,
        /// Existing document id to overwrite
        #[arg(long)]
        id: Option<DocumentId>,
    },
    /// List stored documents, most recently updated first
    List { db: PathBuf },
    /// Write a stored document out as wire JSON
    Export {
        db: PathBuf,
        id: DocumentId,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = match &cli.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };
    if let Some(dir) = &cli.log_dir {
        let level = config.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, absolute(dir)?)?;
    }

    match cli.command {
        CliCommand::Inspect(args) => inspect(args, config).await,
        CliCommand::Migrate(args) => migrate(args),
        CliCommand::Apply(args) => apply(args, config),
        CliCommand::Store(command) => store(command),
    }
}

async fn inspect(args: InspectArgs, config: EditorConfig) -> CliResult<()> {
    let records = match &args.registry {
        Some(path) => read_json::<Vec<EntityRecord>>(path)?,
        None => Vec::new(),
    };
    let registry = Arc::new(InMemoryRegistry::with_records(records));
    let editor = SceneEditor::with_document(read_document(&args.file)?, registry.clone(), config);

    let mut dangling = Vec::new();
    if args.registry.is_some() {
        for id in editor.referenced_entities() {
            if registry.get(&id).await.is_none() {
                dangling.push(id);
            }
        }
    }
    print_json(&json!({
        "scene_count": editor.scene_count(),
        "scenes": editor.scenes(),
        "referenced_entities": editor.referenced_entities(),
        "dangling_entities": dangling,
    }))
}

fn migrate(args: MigrateArgs) -> CliResult<()> {
    let raw = std::fs::read_to_string(&args.input)?;
    let (document, report) =
        scenebook_core::tree::migration::migrate_with_report(&Document::from_json_str(&raw)?);
    eprintln!(
        "wrapped_runs={} filled_scenes={} reminted_ids={}",
        report.wrapped_runs, report.filled_scenes, report.reminted_ids
    );
    write_document(&document, args.output.as_deref())
}

fn apply(args: ApplyArgs, config: EditorConfig) -> CliResult<()> {
    let commands: Vec<Command> = read_json(&args.commands)?;
    let mut editor = SceneEditor::with_document(
        read_document(&args.file)?,
        Arc::new(InMemoryRegistry::new()),
        config,
    );

    let mut outcomes = Vec::with_capacity(commands.len());
    for (index, command) in commands.into_iter().enumerate() {
        let name = command.name();
        let outcome = editor
            .dispatch(command)
            .map_err(|source| CliError::Command {
                index,
                name,
                source,
            })?;
        outcomes.push(outcome);
    }
    info!(
        "event=cli_apply module=cli status=ok commands={} scene_count={}",
        outcomes.len(),
        editor.scene_count()
    );

    match args.output.as_deref() {
        Some(path) => {
            write_document(editor.document(), Some(path))?;
            print_json(&json!({ "outcomes": outcomes }))
        }
        None => print_json(&json!({
            "outcomes": outcomes,
            "document": editor.document().to_json_value(),
        })),
    }
}

fn store(command: StoreCommand) -> CliResult<()> {
    match command {
        StoreCommand::Save {
            db,
            file,
            title,
            id,
        } => {
            let conn = open_db(&db)?;
            let repo = SqliteDocumentRepository::new(&conn);
            let document = scenebook_core::migrate(&read_document(&file)?);
            let id = id.unwrap_or_else(uuid::Uuid::new_v4);
            repo.save_document(id, &title, &document)?;
            print_json(&json!({ "id": id, "scene_count": document.scene_count() }))
        }
        StoreCommand::List { db } => {
            let conn = open_db(&db)?;
            let repo = SqliteDocumentRepository::new(&conn);
            let rows: Vec<_> = repo
                .list_documents()?
                .into_iter()
                .map(|summary| {
                    json!({
                        "id": summary.id,
                        "title": summary.title,
                        "scene_count": summary.scene_count,
                        "updated_at": summary.updated_at,
                    })
                })
                .collect();
            print_json(&json!(rows))
        }
        StoreCommand::Export { db, id, output } => {
            let conn = open_db(&db)?;
            let repo = SqliteDocumentRepository::new(&conn);
            let loaded = repo
                .load_document(id)?
                .ok_or(CliError::DocumentNotFound(id))?;
            write_document(&loaded.document, output.as_deref())
        }
    }
}

fn read_document(path: &Path) -> CliResult<Document> {
    let raw = std::fs::read_to_string(path)?;
    Ok(Document::from_json_str(&raw)?)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CliResult<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_document(document: &Document, output: Option<&Path>) -> CliResult<()> {
    let rendered = document.to_json_string_pretty()?;
    match output {
        Some(path) => Ok(std::fs::write(path, rendered + "\n")?),
        None => {
            println!("{rendered}");
            Ok(())
        }
    }
}

fn print_json(value: &serde_json::Value) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn absolute(path: &Path) -> CliResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}
