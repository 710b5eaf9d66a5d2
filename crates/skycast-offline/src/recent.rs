//! Recent-search list: up to five city names, most recent first.

use crate::store::{SharedStore, StoreError, KEY_RECENT_SEARCHES};

pub const MAX_RECENT_SEARCHES: usize = 5;

/// Persisted recent-search list.
#[derive(Clone)]
pub struct RecentSearches {
    store: SharedStore,
}

impl RecentSearches {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Current list, most recent first.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        self.store.get_list(KEY_RECENT_SEARCHES)
    }

    /// Record a search: moves an existing entry to the front,
    /// keeps at most five, persists, and returns the updated list.
    pub fn record(&self, city_name: &str) -> Result<Vec<String>, StoreError> {
        let mut list = self.list()?;
        list.retain(|c| c != city_name);
        list.insert(0, city_name.to_string());
        list.truncate(MAX_RECENT_SEARCHES);
        self.store.put(KEY_RECENT_SEARCHES, &list)?;
        Ok(list)
    }

    /// Forget everything.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(KEY_RECENT_SEARCHES)
    }
}
