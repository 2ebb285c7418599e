//! Recent Searches

use serde::{Deserialize, Serialize};

/// How many searches are remembered.
pub const CAPACITY: usize = 5;

/// Most recent search terms, newest first, without case-insensitive duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentSearches(Vec<String>);

impl RecentSearches {
    /// No remembered searches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from a persisted JSON array, dropping non-string and blank
    /// entries and re-applying the ordering rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a JSON array.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        let raw: Vec<serde_json::Value> = serde_json::from_str(payload)?;
        let mut searches = Self::new();

        for term in raw.iter().rev().filter_map(serde_json::Value::as_str) {
            searches.record(term);
        }

        Ok(searches)
    }

    /// Serialize for persistence.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Remember a search term. Returns `false` for blank terms.
    pub fn record(&mut self, term: &str) -> bool {
        let term = term.trim();

        if term.is_empty() {
            return false;
        }

        self.0.retain(|existing| !existing.eq_ignore_ascii_case(term));
        self.0.insert(0, term.to_string());
        self.0.truncate(CAPACITY);

        true
    }

    /// Forget every term.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Terms, newest first.
    pub fn terms(&self) -> &[String] {
        &self.0
    }

    /// Number of remembered terms.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
