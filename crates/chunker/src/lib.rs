//! # DocIndex Chunker
//!
//! Turns raw documents and source trees into ordered text chunks ready for embedding.
//!
//! ## Pipeline
//!
//! ```text
//! File bytes / pasted text / directory
//!     │
//!     ├──> Format detection (extension)
//!     │      ├─> .txt       charset sniffing → UTF-8 → GBK (lossy)
//!     │      ├─> .md        verbatim text
//!     │      ├─> .docx      paragraph text
//!     │      └─> .pdf       page-by-page text
//!     │
//!     ├──> Strategy
//!     │      ├─> NoChunking
//!     │      ├─> Paragraph  (long paragraphs re-split by FixedSize)
//!     │      ├─> Sentence   (greedy packing, trailing-sentence overlap)
//!     │      └─> FixedSize  (sliding window, word-boundary aware)
//!     │
//!     └──> TextChunk[] with chunk_index / total_chunks / file metadata
//! ```
//!
//! ## Example
//!
//! ```rust
//! use docindex_chunker::{Chunker, ChunkingConfig, Metadata};
//!
//! let chunker = Chunker::new(ChunkingConfig::fixed_size(40, 10)).unwrap();
//! let text = "Rust makes systems programming approachable. It has no garbage collector.";
//! let chunks = chunker.chunk_text(text, &Metadata::new()).unwrap();
//! for chunk in &chunks {
//!     println!("{}/{}: {}", chunk.metadata.chunk_index, chunk.metadata.total_chunks, chunk.content);
//! }
//! ```

mod chunker;
mod config;
mod error;
mod format;
mod scanner;
mod strategy;
mod types;

pub use chunker::{Chunker, ChunkingStats, DirectoryChunks, FileChunks, FileFailure};
pub use config::{ChunkingConfig, ChunkingStrategy, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use error::{ChunkerError, Result};
pub use format::{decode_text, DocumentFormat};
pub use scanner::{FileScanner, ScanOptions, DEFAULT_MAX_FILE_SIZE};
pub use types::{ChunkMetadata, Metadata, TextChunk};
