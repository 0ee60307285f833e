use crate::config::ChunkingConfig;
use crate::error::{ChunkerError, Result};
use crate::format::DocumentFormat;
use crate::scanner::{FileScanner, ScanOptions};
use crate::strategy::StrategyExecutor;
use crate::types::{ChunkMetadata, Metadata, TextChunk};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Main chunker interface: extract text, split it, attach metadata
pub struct Chunker {
    config: ChunkingConfig,
    executor: StrategyExecutor,
}

impl Chunker {
    /// Create a new chunker, rejecting invalid configuration
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate().map_err(ChunkerError::invalid_config)?;
        let executor = StrategyExecutor::new(config.clone()).map_err(ChunkerError::invalid_config)?;
        Ok(Self { config, executor })
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk raw text; blank input is `EmptyContent`
    pub fn chunk_text(&self, text: &str, metadata: &Metadata) -> Result<Vec<TextChunk>> {
        if text.trim().is_empty() {
            return Err(ChunkerError::EmptyContent);
        }
        Ok(self.build_chunks(text, metadata, None))
    }

    /// Extract text from document bytes of a known format, then chunk it
    pub fn chunk_bytes(
        &self,
        bytes: &[u8],
        format: DocumentFormat,
        metadata: &Metadata,
    ) -> Result<Vec<TextChunk>> {
        let text = format.extract(bytes)?;
        self.chunk_text(&text, metadata)
    }

    /// Read, extract and chunk a single file; file provenance is added to every chunk
    pub fn chunk_file(&self, path: impl AsRef<Path>, metadata: &Metadata) -> Result<Vec<TextChunk>> {
        let path = path.as_ref();
        let format = DocumentFormat::from_path(path)?;
        self.chunk_path(path, format, metadata)
    }

    /// Chunk every ingestible file under `root`. Per-file failures are collected, not raised.
    pub fn chunk_directory(
        &self,
        root: impl AsRef<Path>,
        options: &ScanOptions,
        metadata: &Metadata,
    ) -> Result<DirectoryChunks> {
        let files = FileScanner::new(root)
            .with_options(options.clone())
            .scan()?;

        let mut result = DirectoryChunks::default();
        for path in files {
            // The scanner only yields allow-listed extensions; code and config files read as text.
            let format = DocumentFormat::from_path(&path).unwrap_or(DocumentFormat::Text);
            match self.chunk_path(&path, format, metadata) {
                Ok(chunks) => result.files.push(FileChunks { path, chunks }),
                Err(ChunkerError::EmptyContent) => {
                    log::debug!("Skipping empty document {}", path.display());
                    result.skipped.push(path);
                }
                Err(err) => {
                    log::warn!("Failed to chunk {}: {err}", path.display());
                    result.failures.push(FileFailure {
                        path,
                        message: err.to_string(),
                    });
                }
            }
        }

        log::info!(
            "Chunked {} files into {} chunks ({} failed, {} empty)",
            result.files.len(),
            result.total_chunks(),
            result.failures.len(),
            result.skipped.len()
        );
        Ok(result)
    }

    fn chunk_path(&self, path: &Path, format: DocumentFormat, metadata: &Metadata) -> Result<Vec<TextChunk>> {
        let bytes = std::fs::read(path)?;
        let text = format.extract(&bytes)?;
        if text.trim().is_empty() {
            return Err(ChunkerError::EmptyContent);
        }
        Ok(self.build_chunks(&text, metadata, Some(path)))
    }

    fn build_chunks(&self, text: &str, metadata: &Metadata, path: Option<&Path>) -> Vec<TextChunk> {
        let pieces = self.executor.execute(text);
        let total = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(index, content)| {
                let mut meta = ChunkMetadata::new(index, total, metadata.clone());
                if let Some(path) = path {
                    meta = meta.with_file(path);
                }
                TextChunk::new(content, meta)
            })
            .collect()
    }

    /// Get chunking statistics
    #[must_use]
    pub fn get_stats(chunks: &[TextChunk]) -> ChunkingStats {
        let sizes: Vec<usize> = chunks.iter().map(TextChunk::char_len).collect();
        let total_chars: usize = sizes.iter().sum();
        ChunkingStats {
            total_chunks: chunks.len(),
            total_chars,
            avg_chars_per_chunk: if chunks.is_empty() {
                0
            } else {
                total_chars / chunks.len()
            },
            min_chars: sizes.iter().copied().min().unwrap_or(0),
            max_chars: sizes.iter().copied().max().unwrap_or(0),
        }
    }
}

/// Chunks produced from one file
#[derive(Debug, Clone, Serialize)]
pub struct FileChunks {
    pub path: PathBuf,
    pub chunks: Vec<TextChunk>,
}

/// A file that could not be chunked
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of chunking a directory
#[derive(Debug, Clone, Default, Serialize)]
pub struct DirectoryChunks {
    pub files: Vec<FileChunks>,
    pub failures: Vec<FileFailure>,
    /// Files with no extractable text
    pub skipped: Vec<PathBuf>,
}

impl DirectoryChunks {
    #[must_use]
    pub fn total_chunks(&self) -> usize {
        self.files.iter().map(|file| file.chunks.len()).sum()
    }

    /// All chunks in file order
    pub fn into_chunks(self) -> impl Iterator<Item = TextChunk> {
        self.files.into_iter().flat_map(|file| file.chunks)
    }
}

/// Statistics about chunking results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    pub total_chars: usize,
    pub avg_chars_per_chunk: usize,
    pub min_chars: usize,
    pub max_chars: usize,
}

impl std::fmt::Display for ChunkingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} | Chars: {} | Avg: {} | Range: {}-{}",
            self.total_chunks,
            self.total_chars,
            self.avg_chars_per_chunk,
            self.min_chars,
            self.max_chars
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_invalid_config_rejected() {
        let err = Chunker::new(ChunkingConfig::fixed_size(10, 10)).err().unwrap();
        assert!(matches!(err, ChunkerError::InvalidConfig(_)));
    }

    #[test]
    fn test_blank_text_is_empty_content() {
        let chunker = Chunker::new(ChunkingConfig::default()).unwrap();
        assert!(matches!(
            chunker.chunk_text(" \n\t ", &Metadata::new()),
            Err(ChunkerError::EmptyContent)
        ));
    }

    #[test]
    fn test_chunks_carry_index_and_caller_metadata() {
        let chunker = Chunker::new(ChunkingConfig::paragraph()).unwrap();
        let mut meta = Metadata::new();
        meta.insert("source".to_string(), json!("manual"));

        let chunks = chunker
            .chunk_text("first\n\nsecond\n\nthird", &meta)
            .unwrap();
        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_index, i);
            assert_eq!(chunk.metadata.total_chunks, 3);
            assert_eq!(chunk.metadata.extra.get("source"), Some(&json!("manual")));
            assert!(chunk.metadata.file_path.is_none());
        }
    }

    #[test]
    fn test_stats() {
        let chunker = Chunker::new(ChunkingConfig::paragraph()).unwrap();
        let chunks = chunker.chunk_text("ab\n\ncdef", &Metadata::new()).unwrap();
        let stats = Chunker::get_stats(&chunks);
        assert_eq!(
            stats,
            ChunkingStats {
                total_chunks: 2,
                total_chars: 6,
                avg_chars_per_chunk: 3,
                min_chars: 2,
                max_chars: 4,
            }
        );
        assert_eq!(stats.to_string(), "Chunks: 2 | Chars: 6 | Avg: 3 | Range: 2-4");
    }

    #[test]
    fn test_empty_stats() {
        let stats = Chunker::get_stats(&[]);
        assert_eq!(stats.total_chunks, 0);
        assert_eq!(stats.max_chars, 0);
    }
}
