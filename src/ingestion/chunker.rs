//! Separator-based chunking with per-page overlap.

use tracing::debug;

use crate::config::ChunkingConfig;
use crate::types::{Chunk, SourceDocument};

/// Splits page text into overlapping, size-bounded chunks.
///
/// Sizes are counted in characters. Chunks never cross page boundaries, so
/// every chunk carries exact page attribution.
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: String,
}

impl TextChunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            separator: config.separator.clone(),
        }
    }

    /// Chunk every page of a document, assigning per-page sequence numbers.
    pub fn chunk_document(&self, document: &SourceDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in &document.pages {
            for (sequence, text) in self.chunk_page(&page.text).into_iter().enumerate() {
                chunks.push(Chunk::new(
                    text,
                    document.name.clone(),
                    page.page_number,
                    sequence as u32,
                ));
            }
        }
        debug!("chunked {} into {} chunk(s)", document.name, chunks.len());
        chunks
    }

    /// Chunk one page's text: split on the separator, drop empty units, then
    /// greedily pack units back together under the size limit, carrying the
    /// trailing overlap into each new chunk.
    pub fn chunk_page(&self, text: &str) -> Vec<String> {
        let units: Vec<&str> = if self.separator.is_empty() {
            vec![text]
        } else {
            text.split(self.separator.as_str())
                .filter(|unit| !unit.is_empty())
                .collect()
        };

        let mut chunks = Vec::new();
        let mut current = String::new();

        for unit in units {
            if self.fits(&current, unit) {
                self.append_unit(&mut current, unit);
                continue;
            }

            if !current.is_empty() {
                let carry = tail_chars(&current, self.chunk_overlap);
                chunks.push(std::mem::take(&mut current));
                current = carry;
                if self.fits(&current, unit) {
                    self.append_unit(&mut current, unit);
                    continue;
                }
                // the carried overlap cannot sit with this unit; drop it
                // rather than emit a chunk of nothing but repeated text
                current.clear();
            }

            if char_len(unit) <= self.chunk_size {
                current.push_str(unit);
                continue;
            }

            self.split_oversized(unit, &mut chunks, &mut current);
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    fn fits(&self, current: &str, unit: &str) -> bool {
        if current.is_empty() {
            char_len(unit) <= self.chunk_size
        } else {
            char_len(current) + char_len(&self.separator) + char_len(unit) <= self.chunk_size
        }
    }

    fn append_unit(&self, current: &mut String, unit: &str) {
        if !current.is_empty() {
            current.push_str(&self.separator);
        }
        current.push_str(unit);
    }

    /// Hard-split a unit longer than a whole chunk into `chunk_size`-char
    /// windows advancing by `chunk_size - chunk_overlap`; the final window
    /// stays open so following units can pack onto it.
    fn split_oversized(&self, unit: &str, chunks: &mut Vec<String>, current: &mut String) {
        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
        let chars: Vec<char> = unit.chars().collect();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            if end == chars.len() {
                *current = window;
                return;
            }
            chunks.push(window);
            start += step;
        }
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Last `count` characters of `text` (the whole string when shorter).
fn tail_chars(text: &str, count: usize) -> String {
    let len = char_len(text);
    if len <= count {
        return text.to_string();
    }
    text.chars().skip(len - count).collect()
}
