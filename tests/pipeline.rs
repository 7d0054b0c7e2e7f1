//! End-to-end pipeline tests, exercised against both store backends.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use doc_vault::chunk::Chunker;
use doc_vault::config::{ChunkingConfig, Config, DbConfig};
use doc_vault::db;
use doc_vault::error::Error;
use doc_vault::migrate;
use doc_vault::models::{DocumentType, MetadataPatch, NewDocument};
use doc_vault::pipeline::DocumentPipeline;
use doc_vault::store::memory::MemoryStore;
use doc_vault::store::sqlite::SqliteStore;

fn new_doc(content: &str) -> NewDocument {
    NewDocument {
        org_id: "org-1".to_string(),
        document_type: DocumentType::Policy,
        owner: "ops@example.com".to_string(),
        tags: vec!["resilience".to_string()],
        file_format: Some("txt".to_string()),
        content: content.to_string(),
        metadata: serde_json::from_value(json!({"k": "old", "j": 1})).unwrap(),
    }
}

fn patch(value: serde_json::Value) -> MetadataPatch {
    MetadataPatch(serde_json::from_value(value).unwrap())
}

fn memory_pipeline() -> DocumentPipeline {
    DocumentPipeline::new(
        Arc::new(MemoryStore::new()),
        Chunker::new(20, 5).unwrap(),
    )
}

async fn sqlite_pipeline(dir: &TempDir) -> DocumentPipeline {
    let config = Config {
        db: DbConfig {
            path: dir.path().join("dv.sqlite"),
        },
        chunking: ChunkingConfig {
            chunk_size: 20,
            chunk_overlap: 5,
        },
    };
    let pool = db::connect(&config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    let chunker = config.chunking.chunker().unwrap();
    DocumentPipeline::new(Arc::new(SqliteStore::new(pool)), chunker)
}

async fn check_create_and_get(pipeline: &DocumentPipeline) {
    let id = pipeline.create(&new_doc("policy body")).await.unwrap();

    let doc = pipeline.get(&id).await.unwrap();
    assert_eq!(doc.document_id, id);
    assert_eq!(doc.org_id, "org-1");
    assert_eq!(doc.document_type, DocumentType::Policy);
    assert_eq!(doc.content, "policy body");
    assert_eq!(doc.tags, vec!["resilience".to_string()]);
    assert_eq!(doc.created_at, doc.updated_at);

    let content = pipeline.get_content(&id).await.unwrap().unwrap();
    assert_eq!(content.content, "policy body");
    assert!(content.version_history.is_empty());
}

async fn check_get_unknown_is_not_found(pipeline: &DocumentPipeline) {
    let err = pipeline.get("no-such-id").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // GetContent reports absence as None, not as an error.
    assert!(pipeline.get_content("no-such-id").await.unwrap().is_none());
}

async fn check_create_validation(pipeline: &DocumentPipeline) {
    let mut invalid = new_doc("body");
    invalid.org_id = String::new();
    let err = pipeline.create(&invalid).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let mut empty_content = new_doc("body");
    empty_content.content = String::new();
    let err = pipeline.create(&empty_content).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

async fn check_update_records_prior_state(pipeline: &DocumentPipeline) {
    let id = pipeline.create(&new_doc("C1")).await.unwrap();

    assert!(pipeline
        .update(&id, "C2", &patch(json!({"k": "v"})))
        .await
        .unwrap());
    assert!(pipeline
        .update(&id, "C3", &MetadataPatch::default())
        .await
        .unwrap());

    let content = pipeline.get_content(&id).await.unwrap().unwrap();
    assert_eq!(content.content, "C3");

    // History records the prior state, never the newly written one.
    assert_eq!(content.version_history.len(), 2);
    assert_eq!(content.version_history[0].content, "C1");
    assert_eq!(content.version_history[1].content, "C2");

    // The first snapshot carries the pre-patch metadata; the current
    // metadata is the shallow merge with patch values winning.
    assert_eq!(
        content.version_history[0].metadata.get("k"),
        Some(&json!("old"))
    );
    assert_eq!(content.metadata.get("k"), Some(&json!("v")));
    assert_eq!(content.metadata.get("j"), Some(&json!(1)));
}

async fn check_update_unknown_is_not_found(pipeline: &DocumentPipeline) {
    let err = pipeline
        .update("no-such-id", "body", &MetadataPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

async fn check_vectorize_ids_gapless(pipeline: &DocumentPipeline) {
    let long = "The quick brown fox jumps over the lazy dog. ".repeat(4);
    let id = pipeline.create(&new_doc(&long)).await.unwrap();

    let chunk_ids = pipeline.vectorize(&id).await.unwrap();
    assert!(chunk_ids.len() > 1);
    for (i, chunk_id) in chunk_ids.iter().enumerate() {
        assert_eq!(chunk_id, &format!("{id}-chunk-{i}"));
    }

    let chunks = pipeline.chunks(&id).await.unwrap();
    assert_eq!(chunks.len(), chunk_ids.len());
    for chunk in &chunks {
        assert!(chunk.embedding.is_none());
    }
}

async fn check_vectorize_idempotent(pipeline: &DocumentPipeline) {
    let long = "Risk registers list failure modes. ".repeat(5);
    let id = pipeline.create(&new_doc(&long)).await.unwrap();

    let first = pipeline.vectorize(&id).await.unwrap();
    let first_chunks = pipeline.chunks(&id).await.unwrap();
    let second = pipeline.vectorize(&id).await.unwrap();
    let second_chunks = pipeline.chunks(&id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first_chunks.len(), second_chunks.len());
    for (a, b) in first_chunks.iter().zip(second_chunks.iter()) {
        assert_eq!(a.chunk_id, b.chunk_id);
        assert_eq!(a.text, b.text);
    }
}

async fn check_vectorize_missing_is_empty(pipeline: &DocumentPipeline) {
    let chunk_ids = pipeline.vectorize("no-such-id").await.unwrap();
    assert!(chunk_ids.is_empty());
}

async fn check_revectorize_replaces_chunk_set(pipeline: &DocumentPipeline) {
    let long = "Business continuity procedures for the data center. ".repeat(4);
    let id = pipeline.create(&new_doc(&long)).await.unwrap();

    let before = pipeline.vectorize(&id).await.unwrap();
    assert!(before.len() > 1);

    pipeline
        .update(&id, "short body", &MetadataPatch::default())
        .await
        .unwrap();
    let after = pipeline.vectorize(&id).await.unwrap();

    assert_eq!(after, vec![format!("{id}-chunk-0")]);
    let chunks = pipeline.chunks(&id).await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "short body");
}

async fn check_update_embedding(pipeline: &DocumentPipeline) {
    let id = pipeline.create(&new_doc("short body")).await.unwrap();
    let chunk_ids = pipeline.vectorize(&id).await.unwrap();
    assert_eq!(chunk_ids.len(), 1);

    let vector = vec![0.25f32, -0.5, 1.0];
    assert!(pipeline
        .update_embedding(&chunk_ids[0], &vector)
        .await
        .unwrap());

    let chunks = pipeline.chunks(&id).await.unwrap();
    assert_eq!(chunks[0].embedding.as_deref(), Some(vector.as_slice()));

    let err = pipeline
        .update_embedding("no-such-chunk", &vector)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

async fn check_delete_evicts_everything(pipeline: &DocumentPipeline) {
    let id = pipeline.create(&new_doc("short body")).await.unwrap();
    pipeline.vectorize(&id).await.unwrap();

    assert!(pipeline.delete(&id).await.unwrap());
    assert!(matches!(
        pipeline.get(&id).await.unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(pipeline.chunks(&id).await.unwrap().is_empty());
    assert!(!pipeline.delete(&id).await.unwrap());
}

async fn check_concurrent_updates_lose_no_versions(pipeline: Arc<DocumentPipeline>) {
    let id = pipeline.create(&new_doc("v0")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..5 {
        let pipeline = Arc::clone(&pipeline);
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            pipeline
                .update(&id, &format!("v{}", i + 1), &MetadataPatch::default())
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let content = pipeline.get_content(&id).await.unwrap().unwrap();
    assert_eq!(content.version_history.len(), 5);
    assert_eq!(content.version_history[0].content, "v0");

    // No snapshot was lost: every written revision is either in the history
    // or still current, with no duplicates.
    let mut seen: Vec<&str> = content
        .version_history
        .iter()
        .map(|v| v.content.as_str())
        .chain(std::iter::once(content.content.as_str()))
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, vec!["v0", "v1", "v2", "v3", "v4", "v5"]);
}

// ---- memory backend ----

#[tokio::test]
async fn memory_create_and_get() {
    check_create_and_get(&memory_pipeline()).await;
}

#[tokio::test]
async fn memory_get_unknown_is_not_found() {
    check_get_unknown_is_not_found(&memory_pipeline()).await;
}

#[tokio::test]
async fn memory_create_validation() {
    check_create_validation(&memory_pipeline()).await;
}

#[tokio::test]
async fn memory_update_records_prior_state() {
    check_update_records_prior_state(&memory_pipeline()).await;
}

#[tokio::test]
async fn memory_update_unknown_is_not_found() {
    check_update_unknown_is_not_found(&memory_pipeline()).await;
}

#[tokio::test]
async fn memory_vectorize_ids_gapless() {
    check_vectorize_ids_gapless(&memory_pipeline()).await;
}

#[tokio::test]
async fn memory_vectorize_idempotent() {
    check_vectorize_idempotent(&memory_pipeline()).await;
}

#[tokio::test]
async fn memory_vectorize_missing_is_empty() {
    check_vectorize_missing_is_empty(&memory_pipeline()).await;
}

#[tokio::test]
async fn memory_revectorize_replaces_chunk_set() {
    check_revectorize_replaces_chunk_set(&memory_pipeline()).await;
}

#[tokio::test]
async fn memory_update_embedding() {
    check_update_embedding(&memory_pipeline()).await;
}

#[tokio::test]
async fn memory_delete_evicts_everything() {
    check_delete_evicts_everything(&memory_pipeline()).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_concurrent_updates_lose_no_versions() {
    check_concurrent_updates_lose_no_versions(Arc::new(memory_pipeline())).await;
}

// ---- sqlite backend ----

#[tokio::test]
async fn sqlite_create_and_get() {
    let dir = TempDir::new().unwrap();
    check_create_and_get(&sqlite_pipeline(&dir).await).await;
}

#[tokio::test]
async fn sqlite_get_unknown_is_not_found() {
    let dir = TempDir::new().unwrap();
    check_get_unknown_is_not_found(&sqlite_pipeline(&dir).await).await;
}

#[tokio::test]
async fn sqlite_create_validation() {
    let dir = TempDir::new().unwrap();
    check_create_validation(&sqlite_pipeline(&dir).await).await;
}

#[tokio::test]
async fn sqlite_update_records_prior_state() {
    let dir = TempDir::new().unwrap();
    check_update_records_prior_state(&sqlite_pipeline(&dir).await).await;
}

#[tokio::test]
async fn sqlite_update_unknown_is_not_found() {
    let dir = TempDir::new().unwrap();
    check_update_unknown_is_not_found(&sqlite_pipeline(&dir).await).await;
}

#[tokio::test]
async fn sqlite_vectorize_ids_gapless() {
    let dir = TempDir::new().unwrap();
    check_vectorize_ids_gapless(&sqlite_pipeline(&dir).await).await;
}

#[tokio::test]
async fn sqlite_vectorize_idempotent() {
    let dir = TempDir::new().unwrap();
    check_vectorize_idempotent(&sqlite_pipeline(&dir).await).await;
}

#[tokio::test]
async fn sqlite_vectorize_missing_is_empty() {
    let dir = TempDir::new().unwrap();
    check_vectorize_missing_is_empty(&sqlite_pipeline(&dir).await).await;
}

#[tokio::test]
async fn sqlite_revectorize_replaces_chunk_set() {
    let dir = TempDir::new().unwrap();
    check_revectorize_replaces_chunk_set(&sqlite_pipeline(&dir).await).await;
}

#[tokio::test]
async fn sqlite_update_embedding() {
    let dir = TempDir::new().unwrap();
    check_update_embedding(&sqlite_pipeline(&dir).await).await;
}

#[tokio::test]
async fn sqlite_delete_evicts_everything() {
    let dir = TempDir::new().unwrap();
    check_delete_evicts_everything(&sqlite_pipeline(&dir).await).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn sqlite_concurrent_updates_lose_no_versions() {
    let dir = TempDir::new().unwrap();
    check_concurrent_updates_lose_no_versions(Arc::new(sqlite_pipeline(&dir).await)).await;
}

// ---- cross-document isolation ----

#[tokio::test]
async fn vectorize_does_not_touch_other_documents() {
    let pipeline = memory_pipeline();

    let a = pipeline.create(&new_doc("document a body")).await.unwrap();
    let b = pipeline.create(&new_doc("document b body")).await.unwrap();

    pipeline.vectorize(&a).await.unwrap();
    pipeline.vectorize(&b).await.unwrap();

    // Re-vectorizing A replaces only A's chunks.
    pipeline.vectorize(&a).await.unwrap();
    let b_chunks = pipeline.chunks(&b).await.unwrap();
    assert_eq!(b_chunks.len(), 1);
    assert_eq!(b_chunks[0].chunk_id, format!("{b}-chunk-0"));
}
