//! Storage abstraction for the document store.
//!
//! [`ContentStore`] owns the canonical current content of each document plus
//! its append-only version history; [`ChunkStore`] owns the derived chunk
//! records produced by vectorization. Backends implement both, and the
//! [`Store`] marker is what the pipeline holds.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`create_document`](ContentStore::create_document) | Store a new document with an empty version history |
//! | [`get_document`](ContentStore::get_document) | Retrieve a document by id |
//! | [`update_document`](ContentStore::update_document) | Replace content, snapshotting the prior state |
//! | [`get_content`](ContentStore::get_content) | Current content plus full version history |
//! | [`delete_document`](ContentStore::delete_document) | Evict a document, its history, and its chunks |
//! | [`replace_chunks`](ChunkStore::replace_chunks) | Replace a document's whole chunk set |
//! | [`get_chunks`](ChunkStore::get_chunks) | List stored chunks for a document |
//! | [`update_embedding`](ChunkStore::update_embedding) | Attach an externally computed vector to a chunk |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Chunk, ChunkRecord, Document, DocumentContent, MetadataPatch, NewDocument};

/// Durable storage of one current content blob per document plus its
/// version history.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a new document and return its freshly assigned id.
    ///
    /// Fails with `Validation` when required fields are missing; ids are
    /// never reused.
    async fn create_document(&self, new: &NewDocument) -> Result<String>;

    /// Fetch a document by id. Fails with `NotFound` for unknown ids.
    async fn get_document(&self, document_id: &str) -> Result<Document>;

    /// Replace the current content, appending the pre-update content and
    /// metadata to the version history and shallow-merging `patch` into the
    /// current metadata (patch values win key-by-key).
    ///
    /// The read-snapshot-write sequence is atomic with respect to other
    /// updates of the same document. Fails with `NotFound` for unknown ids;
    /// returns `true` on success.
    async fn update_document(
        &self,
        document_id: &str,
        new_content: &str,
        patch: &MetadataPatch,
    ) -> Result<bool>;

    /// Current content plus the full version history, oldest entry first,
    /// or `None` for unknown ids — callers distinguish "not found" from
    /// "found but empty".
    async fn get_content(&self, document_id: &str) -> Result<Option<DocumentContent>>;

    /// Drop a document together with its history and derived chunks.
    ///
    /// Returns `false` for unknown ids. This is the explicit eviction path
    /// for everything keyed by the document.
    async fn delete_document(&self, document_id: &str) -> Result<bool>;
}

/// Storage of derived chunk records, replaced wholesale per document.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Replace the document's entire chunk set, all-or-nothing: a failure
    /// mid-batch must never leave a half-old/half-new set visible.
    async fn replace_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()>;

    /// All stored chunks for a document, ordered by chunk index.
    async fn get_chunks(&self, document_id: &str) -> Result<Vec<ChunkRecord>>;

    /// Overwrite the embedding for one chunk. Fails with `NotFound` for
    /// unknown chunk ids; returns `true` on success.
    async fn update_embedding(&self, chunk_id: &str, vector: &[f32]) -> Result<bool>;
}

/// A backend that stores both document content and derived chunks.
pub trait Store: ContentStore + ChunkStore {}

impl<T: ContentStore + ChunkStore> Store for T {}
