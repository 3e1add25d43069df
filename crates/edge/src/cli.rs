// crates/edge/src/cli.rs

use crate::{
    db::{open_collection, Document, DocumentStore, SqliteDatabase},
    setting::Settings,
    Result,
};
use adapt::{lit, member, parse_filter, IndexedField};
use clap::{builder::ValueHint, Parser, Subcommand};
use domain::LeafStore;
use serde_json::{json, Value as Json};
use std::{path::PathBuf, process::ExitCode};
use tracing::{debug, error, info};

/// kq CLI
#[tokio::main(flavor = "multi_thread")]
pub async fn start() -> ExitCode {
    let cli = Cli::parse();

    run(cli).await.map_or_else(
        |e| {
            error!("kq failed: {}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        },
        |_| ExitCode::SUCCESS,
    )
}

#[derive(Parser, Debug)]
#[command(name = "kq", version, about = "Indexed JSON document store")]
pub struct Cli {
    /// Directory holding settings.toml (or set KQ_DIR)
    #[arg(
        long,
        short,
        value_name = "DIR",
        env = "KQ_DIR",
        value_hint = ValueHint::DirPath,
        value_parser = dir_must_exist
    )]
    pub dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Insert a JSON document; an `id` is generated when missing
    Insert { document: String },
    /// Remove the document with this id
    Remove { id: String },
    /// Print the document with this id
    Get { id: String },
    /// Print every document matching a JSON filter, e.g. '{"FirstName": "ann"}'
    Find { filter: String },
    /// Print the single document matching a JSON filter
    FindOne { filter: String },
    /// List all document ids
    Keys,
}

fn dir_must_exist(s: &str) -> std::result::Result<PathBuf, String> {
    let p = PathBuf::from(s);
    if !p.exists() {
        return Err(format!("Not found: {}", p.display()));
    }
    if !p.is_dir() {
        return Err(format!("Not a directory: {}", p.display()));
    }
    Ok(p)
}

/// Loads settings from the directory, opens the collection and runs one command.
#[tracing::instrument(skip_all)]
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(&cli.dir)?;
    debug!(?settings, "settings loaded");

    let db = SqliteDatabase::open(&settings.database).await?;
    let fields = settings
        .collection
        .indexes
        .iter()
        .map(|path| IndexedField::member(path.as_str()))
        .collect();
    let store = open_collection::<Document>(&db, &settings.collection.name, fields).await?;

    let output = execute(&store, cli.command).await;
    db.close().await;

    println!("{}", serde_json::to_string_pretty(&output?)?);
    Ok(())
}

/// Runs one command against an open collection and returns its JSON output.
#[tracing::instrument(skip(store))]
pub async fn execute(store: &DocumentStore, command: Commands) -> Result<Json> {
    let output = match command {
        Commands::Insert { document } => {
            let doc = Document::from_json(serde_json::from_str(&document)?)?;
            let id = doc.id.clone();
            let inserted = store.insert(doc).await?;
            info!(%id, inserted, "insert");
            json!({ "id": id, "inserted": inserted })
        }
        Commands::Remove { id } => {
            let removed = store.remove(&id).await?;
            info!(%id, removed, "remove");
            json!({ "id": id, "removed": removed })
        }
        Commands::Get { id } => {
            let found = store.find_one(&member("id").eq(lit(id))).await?;
            serde_json::to_value(found)?
        }
        Commands::Find { filter } => {
            let filter: Json = serde_json::from_str(&filter)?;
            serde_json::to_value(store.find_filter(&filter).await?)?
        }
        Commands::FindOne { filter } => {
            let predicate = parse_filter(&serde_json::from_str(&filter)?)?;
            serde_json::to_value(store.find_one(&predicate).await?)?
        }
        Commands::Keys => {
            let mut keys = store.records().all_keys().await?;
            keys.sort();
            json!(keys)
        }
    };
    Ok(output)
}
