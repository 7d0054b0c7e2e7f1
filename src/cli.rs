//! `dv` command-line interface.
//!
//! Thin orchestration over the library: loads the TOML config, opens the
//! SQLite store, and maps each subcommand onto one pipeline operation.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{load_config, Config};
use crate::db;
use crate::extract::extract_file;
use crate::migrate;
use crate::models::{DocumentType, Metadata, MetadataPatch, NewDocument};
use crate::pipeline::DocumentPipeline;
use crate::store::sqlite::SqliteStore;

/// doc-vault CLI — a versioned document store and chunking pipeline
/// for retrieval systems.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file with `[db]` and `[chunking]` sections.
#[derive(Parser)]
#[command(
    name = "dv",
    about = "doc-vault — a versioned document store and chunking pipeline",
    version
)]
pub struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dv.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (documents,
    /// versions, chunks). Idempotent — running it multiple times is safe.
    Init,

    /// Ingest a new document.
    ///
    /// Content comes from `--file` (txt, md, csv, pdf, docx, xlsx),
    /// `--content`, or stdin, in that order of precedence.
    Add {
        /// Owning organization id.
        #[arg(long)]
        org: String,

        /// Document type label (e.g. SOP, POLICY, RISK_REGISTER).
        #[arg(long = "type")]
        document_type: String,

        /// Owner identity (e.g. an email address).
        #[arg(long)]
        owner: String,

        /// Comma-separated tags.
        #[arg(long)]
        tags: Option<String>,

        /// Read and extract content from this file.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Inline content.
        #[arg(long)]
        content: Option<String>,

        /// File format label when content is not taken from a file.
        #[arg(long)]
        format: Option<String>,

        /// Metadata entries, repeatable. Values parse as JSON when they
        /// can, else as strings.
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },

    /// Update a document's content, snapshotting the prior state into its
    /// version history.
    Update {
        /// Document id.
        id: String,

        /// Read and extract the new content from this file.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Inline new content.
        #[arg(long)]
        content: Option<String>,

        /// Metadata patch entries, shallow-merged key-by-key.
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },

    /// Print a document's fields and current content.
    Get {
        /// Document id.
        id: String,
    },

    /// Print a document's version history, oldest entry first.
    History {
        /// Document id.
        id: String,
    },

    /// Recompute and replace the document's chunk set; prints the ordered
    /// chunk IDs.
    Vectorize {
        /// Document id.
        id: String,
    },

    /// List the stored chunks for a document.
    Chunks {
        /// Document id.
        id: String,
    },

    /// Attach an externally computed embedding vector to a chunk.
    SetEmbedding {
        /// Chunk id (`{document_id}-chunk-{index}`).
        chunk_id: String,

        /// Comma-separated f32 components.
        #[arg(long)]
        values: String,
    },

    /// Delete a document together with its history and chunks.
    Delete {
        /// Document id.
        id: String,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        let pool = db::connect(&config).await?;
        migrate::run_migrations(&pool).await?;
        pool.close().await;
        println!("initialized {}", config.db.path.display());
        return Ok(());
    }

    let pipeline = open_pipeline(&config).await?;

    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Add {
            org,
            document_type,
            owner,
            tags,
            file,
            content,
            format,
            meta,
        } => {
            let document_type: DocumentType = document_type
                .parse()
                .context("Unknown document type; use labels like SOP or POLICY")?;
            let (content, file_format) = resolve_content(file.as_deref(), content)?;
            let new = NewDocument {
                org_id: org,
                document_type,
                owner,
                tags: tags
                    .map(|t| {
                        t.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
                file_format: file_format.or(format),
                content,
                metadata: parse_meta(&meta)?.0,
            };
            let id = pipeline.create(&new).await?;
            println!("{id}");
        }
        Commands::Update {
            id,
            file,
            content,
            meta,
        } => {
            let (content, _) = resolve_content(file.as_deref(), content)?;
            let patch = parse_meta(&meta)?;
            pipeline.update(&id, &content, &patch).await?;
            println!("updated {id}");
        }
        Commands::Get { id } => {
            let doc = pipeline.get(&id).await?;
            println!("--- Document ---");
            println!("id:            {}", doc.document_id);
            println!("org_id:        {}", doc.org_id);
            println!("document_type: {}", doc.document_type);
            println!("owner:         {}", doc.owner);
            if !doc.tags.is_empty() {
                println!("tags:          {}", doc.tags.join(", "));
            }
            if let Some(ref format) = doc.file_format {
                println!("file_format:   {format}");
            }
            println!("created_at:    {}", format_ts_iso(doc.created_at));
            println!("updated_at:    {}", format_ts_iso(doc.updated_at));
            println!(
                "metadata:      {}",
                serde_json::Value::Object(doc.metadata)
            );
            println!();
            println!("--- Content ---");
            println!("{}", doc.content);
        }
        Commands::History { id } => {
            let Some(content) = pipeline.get_content(&id).await? else {
                bail!("document not found: {id}");
            };
            println!(
                "--- Versions ({}) ---",
                content.version_history.len()
            );
            for (i, entry) in content.version_history.iter().enumerate() {
                println!("[version {i}] {}", format_ts_iso(entry.created_at));
                println!(
                    "metadata: {}",
                    serde_json::Value::Object(entry.metadata.clone())
                );
                println!("{}", entry.content);
                println!();
            }
        }
        Commands::Vectorize { id } => {
            let chunk_ids = pipeline.vectorize(&id).await?;
            for chunk_id in &chunk_ids {
                println!("{chunk_id}");
            }
            println!("chunks: {}", chunk_ids.len());
        }
        Commands::Chunks { id } => {
            let chunks = pipeline.chunks(&id).await?;
            println!("--- Chunks ({}) ---", chunks.len());
            for chunk in &chunks {
                let embedded = match &chunk.embedding {
                    Some(v) => format!("{} dims", v.len()),
                    None => "pending".to_string(),
                };
                println!("[{}] embedding: {embedded}", chunk.chunk_id);
                println!("{}", chunk.text);
                println!();
            }
        }
        Commands::SetEmbedding { chunk_id, values } => {
            let vector = parse_vector(&values)?;
            pipeline.update_embedding(&chunk_id, &vector).await?;
            println!("embedded {chunk_id} ({} dims)", vector.len());
        }
        Commands::Delete { id } => {
            if pipeline.delete(&id).await? {
                println!("deleted {id}");
            } else {
                bail!("document not found: {id}");
            }
        }
    }

    Ok(())
}

async fn open_pipeline(config: &Config) -> Result<DocumentPipeline> {
    let pool = db::connect(config).await?;
    let chunker = config.chunking.chunker()?;
    Ok(DocumentPipeline::new(
        Arc::new(SqliteStore::new(pool)),
        chunker,
    ))
}

/// Content from `--file` (extracted), `--content`, or stdin.
fn resolve_content(
    file: Option<&std::path::Path>,
    inline: Option<String>,
) -> Result<(String, Option<String>)> {
    if let Some(path) = file {
        let extracted = extract_file(path)?;
        return Ok((extracted.content, Some(extracted.file_format)));
    }
    if let Some(content) = inline {
        return Ok((content, None));
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read content from stdin")?;
    Ok((buf, None))
}

fn parse_meta(entries: &[String]) -> Result<MetadataPatch> {
    let mut map = Metadata::new();
    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("metadata entry must be KEY=VALUE, got: {entry}");
        };
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        map.insert(key.to_string(), value);
    }
    Ok(MetadataPatch(map))
}

fn parse_vector(values: &str) -> Result<Vec<f32>> {
    values
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f32>()
                .with_context(|| format!("invalid embedding component: {v}"))
        })
        .collect()
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
