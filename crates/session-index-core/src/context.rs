//! Selected-context accumulator.
//!
//! Holds the chunk contents a user picked from search results, in selection
//! order, for injection into the next prompt. Duplicates are detected by
//! exact content match.

use crate::models::SearchResult;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedContext {
    items: Vec<String>,
}

impl SelectedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `content` unless an identical string is already selected.
    /// Returns whether it was added.
    pub fn add(&mut self, content: impl Into<String>) -> bool {
        let content = content.into();
        if self.items.contains(&content) {
            return false;
        }
        self.items.push(content);
        true
    }

    pub fn add_result(&mut self, result: &SearchResult) -> bool {
        self.add(result.content.as_str())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
