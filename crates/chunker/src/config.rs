use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Default paragraph separator: a run of blank lines
pub(crate) const DEFAULT_PARAGRAPH_SEPARATOR: &str = r"\n\s*\n";

/// Configuration for text chunking behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Chunking strategy to use
    pub strategy: ChunkingStrategy,

    /// Maximum chunk size in characters (soft limit for FixedSize, which extends to a word boundary)
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,

    /// Paragraph separator regex (Paragraph strategy only)
    pub separator: Option<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::FixedSize,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separator: None,
        }
    }
}

impl ChunkingConfig {
    /// Whole text as one chunk
    pub fn no_chunking() -> Self {
        Self {
            strategy: ChunkingStrategy::NoChunking,
            ..Default::default()
        }
    }

    /// Sliding window of `chunk_size` characters
    pub fn fixed_size(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            strategy: ChunkingStrategy::FixedSize,
            chunk_size,
            chunk_overlap,
            separator: None,
        }
    }

    /// Blank-line separated paragraphs
    pub fn paragraph() -> Self {
        Self {
            strategy: ChunkingStrategy::Paragraph,
            ..Default::default()
        }
    }

    /// Sentences packed up to `chunk_size` characters
    pub fn sentence(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            strategy: ChunkingStrategy::Sentence,
            chunk_size,
            chunk_overlap,
            separator: None,
        }
    }

    /// Builder: set paragraph separator
    #[must_use]
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    /// Compiled paragraph separator
    pub(crate) fn separator_regex(&self) -> Result<Regex, String> {
        let pattern = self
            .separator
            .as_deref()
            .unwrap_or(DEFAULT_PARAGRAPH_SEPARATOR);
        Regex::new(pattern).map_err(|err| format!("invalid separator '{pattern}': {err}"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.strategy == ChunkingStrategy::NoChunking {
            return Ok(());
        }

        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }

        if self.strategy == ChunkingStrategy::Paragraph {
            self.separator_regex()?;
        }

        Ok(())
    }
}

/// Strategy for splitting text into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// One chunk holding the whole text
    NoChunking,

    /// Split on a separator; oversized paragraphs fall back to FixedSize
    Paragraph,

    /// Split on sentence terminators and pack sentences greedily
    Sentence,

    /// Sliding character window that avoids cutting words
    FixedSize,
}

impl ChunkingStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoChunking => "no_chunking",
            Self::Paragraph => "paragraph",
            Self::Sentence => "sentence",
            Self::FixedSize => "fixed_size",
        }
    }
}

impl std::str::FromStr for ChunkingStrategy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "no_chunking" | "none" => Ok(Self::NoChunking),
            "paragraph" => Ok(Self::Paragraph),
            "sentence" => Ok(Self::Sentence),
            "fixed_size" | "fixed" => Ok(Self::FixedSize),
            other => Err(format!(
                "unknown chunking strategy '{other}' (expected no_chunking, paragraph, sentence or fixed_size)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = ChunkingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy, ChunkingStrategy::FixedSize);
    }

    #[test]
    fn test_preset_configs_valid() {
        assert!(ChunkingConfig::no_chunking().validate().is_ok());
        assert!(ChunkingConfig::paragraph().validate().is_ok());
        assert!(ChunkingConfig::sentence(200, 20).validate().is_ok());
        assert!(ChunkingConfig::fixed_size(500, 50).validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(ChunkingConfig::fixed_size(0, 0).validate().is_err());
        assert!(ChunkingConfig::fixed_size(100, 100).validate().is_err());
        assert!(ChunkingConfig::sentence(100, 150).validate().is_err());
        assert!(ChunkingConfig::paragraph()
            .separator("(unclosed")
            .validate()
            .is_err());

        // Size limits do not apply when the text is kept whole
        let config = ChunkingConfig {
            chunk_size: 0,
            ..ChunkingConfig::no_chunking()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "fixed-size".parse::<ChunkingStrategy>(),
            Ok(ChunkingStrategy::FixedSize)
        );
        assert_eq!(
            "No_Chunking".parse::<ChunkingStrategy>(),
            Ok(ChunkingStrategy::NoChunking)
        );
        assert!("tokens".parse::<ChunkingStrategy>().is_err());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ChunkingConfig =
            serde_json::from_str(r#"{"strategy":"sentence","chunk_size":300}"#).unwrap();
        assert_eq!(config.strategy, ChunkingStrategy::Sentence);
        assert_eq!(config.chunk_size, 300);
        assert_eq!(config.chunk_overlap, DEFAULT_CHUNK_OVERLAP);
        assert!(config.separator.is_none());
    }
}
