//! Search History

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use storefront::searches::RecentSearches;
use tracing::warn;

use crate::persistence::{PersistentStore, RECENT_SEARCHES_KEY};

/// Persisted list of the shopper's recent search terms.
#[derive(Clone)]
pub struct SearchHistory {
    searches: Arc<Mutex<RecentSearches>>,
    persistence: Arc<dyn PersistentStore>,
}

impl fmt::Debug for SearchHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchHistory")
            .field("searches", &self.searches)
            .finish_non_exhaustive()
    }
}

impl SearchHistory {
    /// Restore the history, starting empty if nothing usable was stored.
    pub fn load(persistence: Arc<dyn PersistentStore>) -> Self {
        let searches = match persistence.load(RECENT_SEARCHES_KEY) {
            Ok(Some(payload)) => RecentSearches::from_json(&payload).unwrap_or_else(|source| {
                warn!(%source, "discarding corrupt search history");

                RecentSearches::new()
            }),
            Ok(None) => RecentSearches::new(),
            Err(source) => {
                warn!(%source, "failed to read search history");

                RecentSearches::new()
            }
        };

        Self {
            searches: Arc::new(Mutex::new(searches)),
            persistence,
        }
    }

    /// Remember a term. Blank terms are ignored.
    pub fn record(&self, term: &str) {
        let mut searches = self.lock();

        if searches.record(term) {
            self.persist(&searches);
        }
    }

    /// Forget every term.
    pub fn clear(&self) {
        let mut searches = self.lock();

        searches.clear();
        self.persist(&searches);
    }

    /// Terms, newest first.
    pub fn terms(&self) -> Vec<String> {
        self.lock().terms().to_vec()
    }

    fn lock(&self) -> MutexGuard<'_, RecentSearches> {
        self.searches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, searches: &RecentSearches) {
        let saved = searches
            .to_json()
            .map_err(|source| source.to_string())
            .and_then(|payload| {
                self.persistence
                    .save(RECENT_SEARCHES_KEY, &payload)
                    .map_err(|source| source.to_string())
            });

        if let Err(reason) = saved {
            warn!(%reason, "failed to persist search history");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::persistence::MemoryStore;

    use super::*;

    #[test]
    fn history_survives_reload() {
        let persistence = Arc::new(MemoryStore::new());
        let history = SearchHistory::load(persistence.clone());

        history.record("lamp");
        history.record("desk");
        history.record("LAMP");

        let reloaded = SearchHistory::load(persistence);

        assert_eq!(reloaded.terms(), ["LAMP", "desk"]);
    }

    #[test]
    fn corrupt_history_starts_empty() {
        let persistence = Arc::new(MemoryStore::with_entries([(RECENT_SEARCHES_KEY, "nope")]));

        assert!(SearchHistory::load(persistence).terms().is_empty());
    }
}
