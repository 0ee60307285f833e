use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-defined document metadata (a JSON object)
pub type Metadata = serde_json::Map<String, Value>;

/// A text chunk ready for embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextChunk {
    /// Trimmed, non-empty chunk text
    pub content: String,

    /// Position and provenance of this chunk
    pub metadata: ChunkMetadata,
}

impl TextChunk {
    #[must_use]
    pub const fn new(content: String, metadata: ChunkMetadata) -> Self {
        Self { content, metadata }
    }

    /// Length in characters
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Metadata attached to each chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Zero-based position within the source
    pub chunk_index: usize,

    /// Number of chunks produced from the source
    pub total_chunks: usize,

    /// Source file path (file and directory ingestion only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// Lowercase extension including the dot, e.g. `.md`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,

    /// Caller-supplied metadata
    #[serde(flatten)]
    pub extra: Metadata,
}

impl ChunkMetadata {
    /// Metadata for chunk `chunk_index` of `total_chunks`
    pub fn new(chunk_index: usize, total_chunks: usize, extra: Metadata) -> Self {
        Self {
            chunk_index,
            total_chunks,
            extra,
            ..Default::default()
        }
    }

    /// Builder: set file provenance from a path
    #[must_use]
    pub fn with_file(mut self, path: &std::path::Path) -> Self {
        self.file_path = Some(path.to_string_lossy().into_owned());
        self.file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        self.file_extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()));
        self
    }

    /// Flatten into one JSON object; chunk fields win over caller keys of the same name.
    #[must_use]
    pub fn into_map(self) -> Metadata {
        let mut map = self.extra;
        if let Some(path) = self.file_path {
            map.insert("file_path".to_string(), Value::String(path));
        }
        if let Some(name) = self.file_name {
            map.insert("file_name".to_string(), Value::String(name));
        }
        if let Some(ext) = self.file_extension {
            map.insert("file_extension".to_string(), Value::String(ext));
        }
        map.insert("chunk_index".to_string(), Value::from(self.chunk_index));
        map.insert("total_chunks".to_string(), Value::from(self.total_chunks));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::Path;

    #[test]
    fn test_metadata_with_file() {
        let meta = ChunkMetadata::new(0, 2, Metadata::new()).with_file(Path::new("docs/Guide.MD"));
        assert_eq!(meta.file_path.as_deref(), Some("docs/Guide.MD"));
        assert_eq!(meta.file_name.as_deref(), Some("Guide.MD"));
        assert_eq!(meta.file_extension.as_deref(), Some(".md"));
    }

    #[test]
    fn test_into_map_overrides_caller_keys() {
        let mut extra = Metadata::new();
        extra.insert("source".to_string(), json!("upload"));
        extra.insert("chunk_index".to_string(), json!("bogus"));

        let map = ChunkMetadata::new(3, 7, extra).into_map();
        assert_eq!(
            Value::Object(map),
            json!({"source": "upload", "chunk_index": 3, "total_chunks": 7})
        );
    }

    #[test]
    fn test_char_len_counts_characters() {
        let chunk = TextChunk::new("你好, world".to_string(), ChunkMetadata::default());
        assert_eq!(chunk.char_len(), 9);
    }
}
