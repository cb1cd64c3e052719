use std::sync::{Arc, RwLock};
use tracing::info;

use crate::models::Dataset;

/// Holds the single dataset currently in force.
///
/// Uploads swap the `Arc` under a short write lock; readers clone the `Arc`
/// and keep working on that snapshot even if a newer upload lands meanwhile.
#[derive(Debug, Default)]
pub struct DatasetStore {
    current: RwLock<Option<Arc<Dataset>>>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dataset in force, if any.
    pub fn snapshot(&self) -> Option<Arc<Dataset>> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }

    /// Replaces the stored dataset wholesale and returns the new snapshot.
    pub fn replace(&self, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(Arc::clone(&dataset));
        info!("Dataset replaced: {} rows", dataset.len());
        dataset
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset_with_columns(columns: &[&str]) -> Dataset {
        Dataset {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Dataset::default()
        }
    }

    #[test]
    fn test_empty_store_has_no_snapshot() {
        let store = DatasetStore::new();
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let store = DatasetStore::new();
        store.replace(dataset_with_columns(&["first"]));
        let before = store.snapshot().unwrap();

        store.replace(dataset_with_columns(&["second"]));
        let after = store.snapshot().unwrap();

        assert_eq!(before.columns, vec!["first".to_string()]);
        assert_eq!(after.columns, vec!["second".to_string()]);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let store = Arc::new(DatasetStore::new());
        store.replace(dataset_with_columns(&["v0"]));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        store.replace(dataset_with_columns(&["v1"]));
                    }
                    let snapshot = store.snapshot().unwrap();
                    assert_eq!(snapshot.columns.len(), 1);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.snapshot().unwrap().columns, vec!["v1".to_string()]);
    }
}
