//! Corpus store: the immutable table of advisory text chunks
//!
//! The corpus file is produced offline by the ingestion step and holds two
//! parallel arrays, `texts` and `metadatas`. A chunk's position in those arrays
//! is its identity for the lifetime of the loaded corpus; the vector index uses
//! the same positions.

use crate::error::{AdvisorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Placeholder rendered when a chunk carries no page metadata
pub const UNKNOWN_PAGE: &str = "?";

/// A retrievable passage of the advisory document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Verbatim passage text
    pub text: String,

    /// Source metadata (`page`, `page_label`, `source`, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Chunk {
    pub fn new(text: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Page reference used in citations: `page_label`, then `page`, then `?`.
    ///
    /// The JSON type is preserved so a numeric page stays numeric when it is
    /// echoed back to API clients.
    pub fn page(&self) -> Value {
        ["page_label", "page"]
            .iter()
            .filter_map(|key| self.metadata.get(*key))
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| Value::String(UNKNOWN_PAGE.to_string()))
    }

    /// Page reference rendered for a `[Source p.X]` marker
    pub fn page_label(&self) -> String {
        match self.page() {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    /// First `max_chars` characters of the text followed by an ellipsis
    pub fn excerpt(&self, max_chars: usize) -> String {
        let head: String = self.text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

/// On-disk corpus layout: parallel `texts` / `metadatas` arrays
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusFile {
    pub texts: Vec<String>,
    pub metadatas: Vec<Map<String, Value>>,
}

impl CorpusFile {
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        Self {
            texts: chunks.iter().map(|c| c.text.clone()).collect(),
            metadatas: chunks.iter().map(|c| c.metadata.clone()).collect(),
        }
    }

    /// Write the corpus as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string(self).map_err(|e| AdvisorError::Json {
            source: e,
            context: "Failed to serialize corpus".to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| AdvisorError::Io {
            source: e,
            context: format!("Failed to write corpus file: {:?}", path),
        })
    }
}

/// Read-only, position-indexed chunk table
#[derive(Debug, Clone)]
pub struct CorpusStore {
    chunks: Vec<Chunk>,
    digest: String,
}

impl CorpusStore {
    /// Build a store from chunks, rejecting an empty corpus or empty passages
    pub fn new(chunks: Vec<Chunk>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(AdvisorError::Corpus("Corpus contains no chunks".to_string()));
        }
        if let Some(position) = chunks.iter().position(|c| c.text.trim().is_empty()) {
            return Err(AdvisorError::Corpus(format!(
                "Chunk at position {} has empty text",
                position
            )));
        }

        let digest = digest_texts(chunks.iter().map(|c| c.text.as_str()));
        Ok(Self { chunks, digest })
    }

    /// Load the corpus file written by the ingestion step
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AdvisorError::Corpus(format!(
                "Corpus file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| AdvisorError::Io {
            source: e,
            context: format!("Failed to read corpus file: {:?}", path),
        })?;
        let file: CorpusFile = serde_json::from_str(&content).map_err(|e| AdvisorError::Json {
            source: e,
            context: format!("Failed to parse corpus file: {:?}", path),
        })?;

        Self::from_file(file)
    }

    pub fn from_file(file: CorpusFile) -> Result<Self> {
        if file.texts.len() != file.metadatas.len() {
            return Err(AdvisorError::Corpus(format!(
                "texts ({}) and metadatas ({}) have different lengths",
                file.texts.len(),
                file.metadatas.len()
            )));
        }

        let chunks = file
            .texts
            .into_iter()
            .zip(file.metadatas)
            .map(|(text, metadata)| Chunk { text, metadata })
            .collect();

        let store = Self::new(chunks)?;
        tracing::info!("Loaded corpus with {} chunks", store.len());
        Ok(store)
    }

    /// Chunk at `position`, or `None` when the offset is out of range
    pub fn get(&self, position: usize) -> Option<&Chunk> {
        self.chunks.get(position)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// BLAKE3 digest over the ordered chunk texts
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Order-sensitive BLAKE3 digest of chunk texts.
///
/// Each text is length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn digest_texts<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = blake3::Hasher::new();
    for text in texts {
        hasher.update(&(text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn meta(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_page_prefers_label() {
        let chunk = Chunk::new("text", meta(json!({"page": 11, "page_label": "12"})));
        assert_eq!(chunk.page_label(), "12");
        assert_eq!(chunk.page(), json!("12"));
    }

    #[test]
    fn test_page_falls_back_to_number() {
        let chunk = Chunk::new("text", meta(json!({"page": 12})));
        assert_eq!(chunk.page_label(), "12");
        assert_eq!(chunk.page(), json!(12));
    }

    #[test]
    fn test_missing_page_renders_placeholder() {
        let chunk = Chunk::new("text", Map::new());
        assert_eq!(chunk.page_label(), "?");

        let chunk = Chunk::new("text", meta(json!({"page": null})));
        assert_eq!(chunk.page_label(), "?");
    }

    #[test]
    fn test_excerpt_is_char_safe() {
        let chunk = Chunk::new("ééééé", Map::new());
        assert_eq!(chunk.excerpt(3), "ééé...");

        let chunk = Chunk::new("short", Map::new());
        assert_eq!(chunk.excerpt(200), "short...");
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let file = CorpusFile {
            texts: vec!["a".to_string(), "b".to_string()],
            metadatas: vec![Map::new()],
        };
        assert!(CorpusStore::from_file(file).is_err());
    }

    #[test]
    fn test_empty_corpus_rejected() {
        assert!(CorpusStore::from_file(CorpusFile::default()).is_err());
    }

    #[test]
    fn test_load_roundtrip_through_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunks.json");

        let chunks = vec![
            Chunk::new("Whitefly thrives in hot dry weather.", meta(json!({"page": 3}))),
            Chunk::new("Pink bollworm larvae bore into bolls.", meta(json!({"page": 12}))),
        ];
        CorpusFile::from_chunks(&chunks).save(&path).unwrap();

        let store = CorpusStore::load(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1), Some(&chunks[1]));
        assert!(store.get(2).is_none());
    }

    #[test]
    fn test_digest_depends_on_order() {
        assert_ne!(digest_texts(["a", "b"]), digest_texts(["b", "a"]));
        assert_ne!(digest_texts(["ab", "c"]), digest_texts(["a", "bc"]));
    }
}
