//! Line-window text chunker.
//!
//! Splits file content into overlapping windows of whole lines. Every window
//! spans up to `chunk_size` lines, and consecutive windows start
//! `chunk_size - overlap` lines apart, so each window repeats the last
//! `overlap` lines of the previous one.
//!
//! # Algorithm
//!
//! 1. Split the text on `\n` (a trailing newline produces a trailing empty line).
//! 2. For `start = 0, step, 2·step, …` while `start < line_count`, take
//!    `lines[start .. start + chunk_size]` (the last window may be shorter).
//! 3. Join the window with `\n`.
//! 4. Drop windows whose trimmed text is empty.
//!
//! The output depends only on `(text, chunk_size, overlap)`.
//!
//! # Example
//!
//! ```rust
//! use session_index_core::chunk::{chunk_text, ChunkingConfig};
//!
//! let text = (0..30).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
//! let chunks = chunk_text(&text, &ChunkingConfig::default());
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[1].start_line, 15);
//! ```

use crate::error::{Error, Result};
use crate::models::Chunk;

pub const DEFAULT_CHUNK_SIZE: usize = 20;
pub const DEFAULT_OVERLAP: usize = 5;

/// Validated chunking parameters.
///
/// Construction is the only place the parameters are checked, so chunking
/// with a `ChunkingConfig` cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkingConfig {
    /// # Errors
    ///
    /// [`Error::Configuration`] if `chunk_size == 0` or `overlap >= chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be > 0".to_string()));
        }
        if overlap >= chunk_size {
            return Err(Error::Configuration(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between the first lines of consecutive windows. Always >= 1.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// Split `text` into overlapping line windows, skipping blank windows.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut chunks = Vec::new();

    let mut start = 0;
    while start < lines.len() {
        let end = (start + config.chunk_size).min(lines.len());
        let window = &lines[start..end];
        let joined = window.join("\n");

        if !joined.trim().is_empty() {
            chunks.push(Chunk {
                start_line: start,
                source_lines: window.iter().map(|l| l.to_string()).collect(),
                text: joined,
            });
        }

        start += config.step();
    }

    chunks
}

/// Validate `(chunk_size, overlap)` and chunk in one call.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    let config = ChunkingConfig::new(chunk_size, overlap)?;
    Ok(chunk_text(text, &config))
}
