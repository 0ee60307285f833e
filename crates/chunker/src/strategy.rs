use crate::config::{ChunkingConfig, ChunkingStrategy};
use regex::Regex;

/// Sentence terminators (ASCII and full-width)
const SENTENCE_TERMINATORS: &[char] = &['.', '。', '!', '！', '?', '？'];

/// Punctuation a FixedSize window may end on when it would otherwise split a word
const BOUNDARY_PUNCTUATION: &[char] = &['.', '。', '!', '！', '?', '？', ',', '，', ';', '；'];

/// Execute chunking strategy on extracted text
pub struct StrategyExecutor {
    config: ChunkingConfig,
    separator: Option<Regex>,
}

impl StrategyExecutor {
    /// Build an executor; the config must already be validated.
    pub fn new(config: ChunkingConfig) -> Result<Self, String> {
        let separator = match config.strategy {
            ChunkingStrategy::Paragraph => Some(config.separator_regex()?),
            _ => None,
        };
        Ok(Self { config, separator })
    }

    /// Execute the configured strategy. Chunks are trimmed and empty ones dropped.
    pub fn execute(&self, text: &str) -> Vec<String> {
        let raw = match self.config.strategy {
            ChunkingStrategy::NoChunking => vec![text.to_string()],
            ChunkingStrategy::Paragraph => self.chunk_by_paragraph(text),
            ChunkingStrategy::Sentence => self.chunk_by_sentence(text),
            ChunkingStrategy::FixedSize => {
                chunk_by_fixed_size(text, self.config.chunk_size, self.config.chunk_overlap)
            }
        };

        raw.into_iter()
            .filter_map(|chunk| {
                let trimmed = chunk.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .collect()
    }

    fn chunk_by_paragraph(&self, text: &str) -> Vec<String> {
        let paragraphs: Vec<&str> = match &self.separator {
            Some(separator) => separator.split(text).collect(),
            None => vec![text],
        };

        let mut chunks = Vec::new();
        for paragraph in paragraphs {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            if paragraph.chars().count() > self.config.chunk_size {
                chunks.extend(chunk_by_fixed_size(
                    paragraph,
                    self.config.chunk_size,
                    self.config.chunk_overlap,
                ));
            } else {
                chunks.push(paragraph.to_string());
            }
        }
        chunks
    }

    fn chunk_by_sentence(&self, text: &str) -> Vec<String> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_size = 0usize;

        for sentence in split_sentences(text) {
            let sentence_len = sentence.chars().count();

            if current_size + sentence_len > chunk_size && !current.is_empty() {
                chunks.push(current.join(" "));

                // Carry trailing sentences that fit in the overlap budget.
                let mut carried = Vec::new();
                let mut carried_size = 0usize;
                if overlap > 0 {
                    for prev in current.iter().rev() {
                        let len = prev.chars().count();
                        if carried_size + len > overlap {
                            break;
                        }
                        carried.push(*prev);
                        carried_size += len;
                    }
                    carried.reverse();
                }
                current = carried;
                current_size = carried_size;
            }

            current.push(sentence);
            current_size += sentence_len;
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        chunks
    }
}

/// Split text after sentence terminators that are followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if !SENTENCE_TERMINATORS.contains(&ch) {
            continue;
        }
        let Some(&(_, next)) = chars.peek() else {
            continue;
        };
        if !next.is_whitespace() {
            continue;
        }

        let end = idx + ch.len_utf8();
        sentences.push(&text[start..end]);
        while let Some(&(_, ws)) = chars.peek() {
            if !ws.is_whitespace() {
                break;
            }
            chars.next();
        }
        start = chars.peek().map_or(text.len(), |&(next_idx, _)| next_idx);
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Slide a `chunk_size`-character window over `text`.
///
/// A window ending mid-word is extended to the nearest following space, newline or
/// punctuation mark. The next window starts `chunk_overlap` characters before the
/// previous end, but never at or before the previous start.
pub(crate) fn chunk_by_fixed_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let chunk_size = chunk_size.max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut boundaries = BoundaryScan::default();

    while start < len {
        let mut end = (start + chunk_size).min(len);

        if end + 1 < len && !chars[end].is_whitespace() {
            if let Some(boundary) = boundaries.next(&chars, end) {
                end = boundary;
            }
        }

        chunks.push(chars[start..end].iter().collect::<String>());

        // The final window already covers the tail; another overlapping window would be a subset.
        if end >= len {
            break;
        }
        start = if end > start + chunk_overlap {
            end - chunk_overlap
        } else {
            end
        };
    }

    chunks
}

/// Remembers the last boundary lookup so a long run without boundaries is scanned once.
#[derive(Default)]
struct BoundaryScan {
    last: Option<(usize, Option<usize>)>,
}

impl BoundaryScan {
    fn next(&mut self, chars: &[char], from: usize) -> Option<usize> {
        if let Some((scanned_from, found)) = self.last {
            // Nothing matched in `scanned_from..found`, so the answer holds for any `from` inside it.
            if from >= scanned_from && found.map_or(true, |found| found >= from) {
                return found;
            }
        }
        let found = next_boundary(chars, from);
        self.last = Some((from, found));
        found
    }
}

/// First space, newline or punctuation mark at or after `from`
fn next_boundary(chars: &[char], from: usize) -> Option<usize> {
    chars[from..]
        .iter()
        .position(|&c| c == ' ' || c == '\n' || BOUNDARY_PUNCTUATION.contains(&c))
        .map(|offset| from + offset)
}
