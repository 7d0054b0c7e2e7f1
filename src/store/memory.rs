//! In-memory store for tests and embedded use.
//!
//! Documents, version history, and chunks live in `RwLock`-guarded maps
//! owned by an explicitly constructed store value — nothing process-global.
//! Derived chunk state is bounded because vectorization replaces a
//! document's chunk set wholesale, and `delete_document` evicts a document,
//! its history, and its chunks together.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    Chunk, ChunkRecord, Document, DocumentContent, MetadataPatch, NewDocument, VersionEntry,
};

use super::{ChunkStore, ContentStore};

struct StoredDoc {
    doc: Document,
    versions: Vec<VersionEntry>,
}

struct StoredChunk {
    chunk: Chunk,
    embedding: Option<Vec<f32>>,
}

/// In-memory implementation of [`ContentStore`] and [`ChunkStore`].
pub struct MemoryStore {
    docs: RwLock<HashMap<String, StoredDoc>>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            chunks: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn create_document(&self, new: &NewDocument) -> Result<String> {
        new.validate()?;

        let document_id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        let doc = Document {
            document_id: document_id.clone(),
            org_id: new.org_id.clone(),
            document_type: new.document_type,
            owner: new.owner.clone(),
            tags: new.tags.clone(),
            file_format: new.file_format.clone(),
            content: new.content.clone(),
            metadata: new.metadata.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut docs = self.docs.write().unwrap();
        docs.insert(
            document_id.clone(),
            StoredDoc {
                doc,
                versions: Vec::new(),
            },
        );
        Ok(document_id)
    }

    async fn get_document(&self, document_id: &str) -> Result<Document> {
        let docs = self.docs.read().unwrap();
        docs.get(document_id)
            .map(|s| s.doc.clone())
            .ok_or_else(|| Error::NotFound(format!("document {document_id}")))
    }

    async fn update_document(
        &self,
        document_id: &str,
        new_content: &str,
        patch: &MetadataPatch,
    ) -> Result<bool> {
        // The write guard spans the whole read-snapshot-write sequence, so
        // concurrent updates to one document cannot interleave.
        let mut docs = self.docs.write().unwrap();
        let stored = docs
            .get_mut(document_id)
            .ok_or_else(|| Error::NotFound(format!("document {document_id}")))?;

        let now = Utc::now().timestamp();
        stored.versions.push(VersionEntry {
            content: stored.doc.content.clone(),
            metadata: stored.doc.metadata.clone(),
            created_at: now,
        });

        stored.doc.content = new_content.to_string();
        patch.apply(&mut stored.doc.metadata);
        stored.doc.updated_at = now;
        Ok(true)
    }

    async fn get_content(&self, document_id: &str) -> Result<Option<DocumentContent>> {
        let docs = self.docs.read().unwrap();
        Ok(docs.get(document_id).map(|s| DocumentContent {
            document_id: s.doc.document_id.clone(),
            content: s.doc.content.clone(),
            metadata: s.doc.metadata.clone(),
            version_history: s.versions.clone(),
        }))
    }

    async fn delete_document(&self, document_id: &str) -> Result<bool> {
        let removed = self.docs.write().unwrap().remove(document_id).is_some();
        if removed {
            self.chunks
                .write()
                .unwrap()
                .retain(|sc| sc.chunk.document_id != document_id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn replace_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut stored = self.chunks.write().unwrap();
        stored.retain(|sc| sc.chunk.document_id != document_id);
        for chunk in chunks {
            stored.push(StoredChunk {
                chunk: chunk.clone(),
                embedding: None,
            });
        }
        Ok(())
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<ChunkRecord>> {
        let stored = self.chunks.read().unwrap();
        let mut matching: Vec<&StoredChunk> = stored
            .iter()
            .filter(|sc| sc.chunk.document_id == document_id)
            .collect();
        matching.sort_by_key(|sc| sc.chunk.chunk_index);
        Ok(matching
            .into_iter()
            .map(|sc| ChunkRecord {
                chunk_id: sc.chunk.id.clone(),
                text: sc.chunk.text.clone(),
                embedding: sc.embedding.clone(),
            })
            .collect())
    }

    async fn update_embedding(&self, chunk_id: &str, vector: &[f32]) -> Result<bool> {
        let mut stored = self.chunks.write().unwrap();
        let entry = stored
            .iter_mut()
            .find(|sc| sc.chunk.id == chunk_id)
            .ok_or_else(|| Error::NotFound(format!("chunk {chunk_id}")))?;
        entry.embedding = Some(vector.to_vec());
        Ok(true)
    }
}
