//! SQLite-backed store.
//!
//! Maps each store operation to SQL against the documents/versions/chunks
//! schema. `update_document` runs its read-modify-write inside one
//! transaction so concurrent updates of a document cannot interleave, and
//! `replace_chunks` deletes and reinserts inside one transaction so readers
//! never observe a half-replaced chunk set.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::{Error, Result};
use crate::models::{
    Chunk, ChunkRecord, Document, DocumentContent, Metadata, MetadataPatch, NewDocument,
    VersionEntry,
};

use super::{ChunkStore, ContentStore};

/// SQLite implementation of [`ContentStore`] and [`ChunkStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_metadata(json: &str) -> Metadata {
    serde_json::from_str(json).unwrap_or_default()
}

fn parse_tags(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

fn metadata_to_json(metadata: &Metadata) -> Result<String> {
    Ok(serde_json::to_string(metadata)?)
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
    let type_label: String = row.get("document_type");
    let tags_json: String = row.get("tags_json");
    let metadata_json: String = row.get("metadata_json");

    Ok(Document {
        document_id: row.get("document_id"),
        org_id: row.get("org_id"),
        document_type: type_label.parse()?,
        owner: row.get("owner"),
        tags: parse_tags(&tags_json),
        file_format: row.get("file_format"),
        content: row.get("content"),
        metadata: parse_metadata(&metadata_json),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn create_document(&self, new: &NewDocument) -> Result<String> {
        new.validate()?;

        let document_id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        let tags_json = serde_json::to_string(&new.tags)?;
        let metadata_json = metadata_to_json(&new.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO documents (document_id, org_id, document_type, owner, tags_json,
                                   file_format, content, metadata_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document_id)
        .bind(&new.org_id)
        .bind(new.document_type.as_str())
        .bind(&new.owner)
        .bind(&tags_json)
        .bind(&new.file_format)
        .bind(&new.content)
        .bind(&metadata_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(document_id)
    }

    async fn get_document(&self, document_id: &str) -> Result<Document> {
        let row = sqlx::query(
            "SELECT document_id, org_id, document_type, owner, tags_json, file_format, \
             content, metadata_json, created_at, updated_at FROM documents WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_document(&row),
            None => Err(Error::NotFound(format!("document {document_id}"))),
        }
    }

    async fn update_document(
        &self,
        document_id: &str,
        new_content: &str,
        patch: &MetadataPatch,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT content, metadata_json FROM documents WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("document {document_id}")))?;

        let prior_content: String = row.get("content");
        let prior_metadata_json: String = row.get("metadata_json");
        let now = Utc::now().timestamp();

        // Snapshot the pre-update state before anything is overwritten.
        sqlx::query(
            "INSERT INTO versions (document_id, content, metadata_json, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(document_id)
        .bind(&prior_content)
        .bind(&prior_metadata_json)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut metadata = parse_metadata(&prior_metadata_json);
        patch.apply(&mut metadata);
        let merged_json = metadata_to_json(&metadata)?;

        sqlx::query(
            "UPDATE documents SET content = ?, metadata_json = ?, updated_at = ? \
             WHERE document_id = ?",
        )
        .bind(new_content)
        .bind(&merged_json)
        .bind(now)
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn get_content(&self, document_id: &str) -> Result<Option<DocumentContent>> {
        let row = sqlx::query(
            "SELECT document_id, content, metadata_json FROM documents WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let metadata_json: String = row.get("metadata_json");
        let version_rows = sqlx::query(
            "SELECT content, metadata_json, created_at FROM versions \
             WHERE document_id = ? ORDER BY id ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        let version_history = version_rows
            .iter()
            .map(|v| {
                let meta_json: String = v.get("metadata_json");
                VersionEntry {
                    content: v.get("content"),
                    metadata: parse_metadata(&meta_json),
                    created_at: v.get("created_at"),
                }
            })
            .collect();

        Ok(Some(DocumentContent {
            document_id: row.get("document_id"),
            content: row.get("content"),
            metadata: parse_metadata(&metadata_json),
            version_history,
        }))
    }

    async fn delete_document(&self, document_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM versions WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM documents WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn replace_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (id, document_id, chunk_index, text, hash) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query(
            "SELECT id, text, embedding FROM chunks WHERE document_id = ? \
             ORDER BY chunk_index ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let blob: Option<Vec<u8>> = row.get("embedding");
                ChunkRecord {
                    chunk_id: row.get("id"),
                    text: row.get("text"),
                    embedding: blob.map(|b| blob_to_vec(&b)),
                }
            })
            .collect())
    }

    async fn update_embedding(&self, chunk_id: &str, vector: &[f32]) -> Result<bool> {
        let blob = vec_to_blob(vector);
        let result = sqlx::query("UPDATE chunks SET embedding = ? WHERE id = ?")
            .bind(&blob)
            .bind(chunk_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("chunk {chunk_id}")));
        }
        Ok(true)
    }
}
