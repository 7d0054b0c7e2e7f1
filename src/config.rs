use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::{Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

impl ChunkingConfig {
    /// Build the configured [`Chunker`], rejecting configurations that
    /// cannot make forward progress before any document is accepted.
    pub fn chunker(&self) -> Result<Chunker, crate::error::Error> {
        Chunker::new(self.chunk_size, self.chunk_overlap)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Chunker construction performs the real validation; surface it now
    // rather than on the first vectorize call.
    config
        .chunking
        .chunker()
        .context("Invalid [chunking] configuration")?;

    Ok(config)
}
