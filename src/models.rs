//! Core data models for the document store and chunking pipeline.
//!
//! These types represent the documents, version snapshots, and chunks that
//! flow through ingestion, versioned update, and vectorization.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Open key-value metadata attached to a document.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Closed set of organizational document categories.
///
/// Used for filtering and labeling only — no variant carries behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Sop,
    RiskRegister,
    RoleChart,
    ProcessManual,
    ArchitectureDiagram,
    IncidentLog,
    VendorContract,
    Policy,
    DrBcpPlan,
    ChatHistory,
    ExternalDocument,
}

impl DocumentType {
    /// Stable wire/column label for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Sop => "SOP",
            DocumentType::RiskRegister => "RISK_REGISTER",
            DocumentType::RoleChart => "ROLE_CHART",
            DocumentType::ProcessManual => "PROCESS_MANUAL",
            DocumentType::ArchitectureDiagram => "ARCHITECTURE_DIAGRAM",
            DocumentType::IncidentLog => "INCIDENT_LOG",
            DocumentType::VendorContract => "VENDOR_CONTRACT",
            DocumentType::Policy => "POLICY",
            DocumentType::DrBcpPlan => "DR_BCP_PLAN",
            DocumentType::ChatHistory => "CHAT_HISTORY",
            DocumentType::ExternalDocument => "EXTERNAL_DOCUMENT",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SOP" => Ok(DocumentType::Sop),
            "RISK_REGISTER" => Ok(DocumentType::RiskRegister),
            "ROLE_CHART" => Ok(DocumentType::RoleChart),
            "PROCESS_MANUAL" => Ok(DocumentType::ProcessManual),
            "ARCHITECTURE_DIAGRAM" => Ok(DocumentType::ArchitectureDiagram),
            "INCIDENT_LOG" => Ok(DocumentType::IncidentLog),
            "VENDOR_CONTRACT" => Ok(DocumentType::VendorContract),
            "POLICY" => Ok(DocumentType::Policy),
            "DR_BCP_PLAN" => Ok(DocumentType::DrBcpPlan),
            "CHAT_HISTORY" => Ok(DocumentType::ChatHistory),
            "EXTERNAL_DOCUMENT" => Ok(DocumentType::ExternalDocument),
            other => Err(Error::Validation(format!(
                "unknown document type: {other}"
            ))),
        }
    }
}

/// Creation payload for a new document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub org_id: String,
    pub document_type: DocumentType,
    pub owner: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub file_format: Option<String>,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewDocument {
    /// Required-field check applied by every store on create.
    ///
    /// `org_id`/`owner` referential integrity against the relational store
    /// is the caller's job; only presence is checked here.
    pub fn validate(&self) -> Result<()> {
        if self.org_id.trim().is_empty() {
            return Err(Error::Validation("org_id is required".to_string()));
        }
        if self.owner.trim().is_empty() {
            return Err(Error::Validation("owner is required".to_string()));
        }
        if self.content.is_empty() {
            return Err(Error::Validation("content is required".to_string()));
        }
        Ok(())
    }
}

/// A stored document: one current body plus an append-only version history.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub document_id: String,
    pub org_id: String,
    pub document_type: DocumentType,
    pub owner: String,
    pub tags: Vec<String>,
    pub file_format: Option<String>,
    pub content: String,
    pub metadata: Metadata,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Immutable snapshot of content + metadata taken just before an update
/// overwrote them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub content: String,
    pub metadata: Metadata,
    pub created_at: i64,
}

/// Current content of a document together with its full version history,
/// oldest entry first.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentContent {
    pub document_id: String,
    pub content: String,
    pub metadata: Metadata,
    pub version_history: Vec<VersionEntry>,
}

/// Shallow metadata patch applied on update.
///
/// Keys present in the patch overwrite the stored value key-by-key; nested
/// objects are replaced wholesale, never merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataPatch(pub Metadata);

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn apply(&self, target: &mut Metadata) {
        for (key, value) in &self.0 {
            target.insert(key.clone(), value.clone());
        }
    }
}

impl FromIterator<(String, serde_json::Value)> for MetadataPatch {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        MetadataPatch(iter.into_iter().collect())
    }
}

/// Canonical chunk identifier: `"{document_id}-chunk-{index}"`, zero-based,
/// gapless per document. The one externally visible string contract.
pub fn chunk_id(document_id: &str, index: i64) -> String {
    format!("{document_id}-chunk-{index}")
}

/// A chunk of a document's body text, produced by vectorization.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// Read-side view of a stored chunk, embedding included once the external
/// embedding service has filled it in.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
}
