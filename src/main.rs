//! # doc-vault CLI (`dv`)
//!
//! The `dv` binary is the operator interface for doc-vault. It provides
//! commands for database initialization, document ingest, versioned
//! updates, vectorization, and chunk inspection.
//!
//! ## Usage
//!
//! ```bash
//! dv --config ./config/dv.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dv init` | Create the SQLite database and run schema migrations |
//! | `dv add` | Ingest a new document (file, inline, or stdin content) |
//! | `dv update <id>` | Replace content, versioning the prior state |
//! | `dv get <id>` | Print a document's fields and current content |
//! | `dv history <id>` | Print the version history, oldest first |
//! | `dv vectorize <id>` | Recompute the chunk set, print chunk IDs |
//! | `dv chunks <id>` | List stored chunks and embedding status |
//! | `dv set-embedding <chunk_id>` | Attach an externally computed vector |
//! | `dv delete <id>` | Drop a document, its history, and its chunks |

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = doc_vault::cli::Cli::parse();
    doc_vault::cli::run(cli).await
}
