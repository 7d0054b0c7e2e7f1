//! Versioning and vectorization pipeline.
//!
//! Orchestrates document ingest, versioned update, and chunk replacement
//! over a [`Store`] backend. Single-document mutations serialize behind a
//! per-document async lock, so two updates (or an update and a vectorize)
//! of the same document can never interleave their read-modify-write;
//! operations on different documents proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, Weak};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::chunk::{make_chunk, Chunker};
use crate::error::Result;
use crate::models::{
    Chunk, ChunkRecord, Document, DocumentContent, MetadataPatch, NewDocument,
};
use crate::store::Store;

/// Per-document lock registry.
///
/// Entries are held by `Weak` reference and pruned on every acquire, so the
/// map only ever contains locks for documents with an operation in flight.
#[derive(Default)]
struct DocLocks {
    inner: StdMutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl DocLocks {
    fn acquire(&self, document_id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap();
        map.retain(|_, weak| weak.strong_count() > 0);
        if let Some(existing) = map.get(document_id).and_then(Weak::upgrade) {
            return existing;
        }
        let fresh = Arc::new(AsyncMutex::new(()));
        map.insert(document_id.to_string(), Arc::downgrade(&fresh));
        fresh
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

/// Content versioning and chunking pipeline over a pluggable [`Store`].
pub struct DocumentPipeline {
    store: Arc<dyn Store>,
    chunker: Chunker,
    locks: DocLocks,
}

impl DocumentPipeline {
    pub fn new(store: Arc<dyn Store>, chunker: Chunker) -> Self {
        Self {
            store,
            chunker,
            locks: DocLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Ingest a new document with an empty version history.
    pub async fn create(&self, new: &NewDocument) -> Result<String> {
        let document_id = self.store.create_document(new).await?;
        info!(%document_id, document_type = %new.document_type, "document created");
        Ok(document_id)
    }

    pub async fn get(&self, document_id: &str) -> Result<Document> {
        self.store.get_document(document_id).await
    }

    pub async fn get_content(&self, document_id: &str) -> Result<Option<DocumentContent>> {
        self.store.get_content(document_id).await
    }

    /// Replace the document's content, snapshotting the prior state into
    /// the version history and shallow-merging `patch` into its metadata.
    pub async fn update(
        &self,
        document_id: &str,
        new_content: &str,
        patch: &MetadataPatch,
    ) -> Result<bool> {
        let lock = self.locks.acquire(document_id);
        let _guard = lock.lock().await;

        let updated = self
            .store
            .update_document(document_id, new_content, patch)
            .await?;
        debug!(%document_id, "document updated, prior state versioned");
        Ok(updated)
    }

    /// Recompute and replace the document's chunk set.
    ///
    /// Returns the ordered chunk IDs (`"{document_id}-chunk-{i}"`, gapless
    /// from 0). An unknown document yields an empty sequence rather than an
    /// error. Embeddings are left unset for the external embedding service
    /// to fill in.
    pub async fn vectorize(&self, document_id: &str) -> Result<Vec<String>> {
        let lock = self.locks.acquire(document_id);
        let _guard = lock.lock().await;

        let Some(doc) = self.store.get_content(document_id).await? else {
            debug!(%document_id, "vectorize skipped: document not found");
            return Ok(Vec::new());
        };

        let texts = self.chunker.chunk(&doc.content)?;
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| make_chunk(document_id, i as i64, text))
            .collect();

        self.store.replace_chunks(document_id, &chunks).await?;
        info!(%document_id, chunks = chunks.len(), "document vectorized");
        Ok(chunks.into_iter().map(|c| c.id).collect())
    }

    /// Stored chunks for a document, ordered by chunk index.
    pub async fn chunks(&self, document_id: &str) -> Result<Vec<ChunkRecord>> {
        self.store.get_chunks(document_id).await
    }

    /// Attach an externally computed embedding vector to a chunk.
    pub async fn update_embedding(&self, chunk_id: &str, vector: &[f32]) -> Result<bool> {
        self.store.update_embedding(chunk_id, vector).await
    }

    /// Evict a document together with its history and chunk set.
    pub async fn delete(&self, document_id: &str) -> Result<bool> {
        let lock = self.locks.acquire(document_id);
        let _guard = lock.lock().await;

        let removed = self.store.delete_document(document_id).await?;
        if removed {
            info!(%document_id, "document deleted");
        }
        Ok(removed)
    }
}
