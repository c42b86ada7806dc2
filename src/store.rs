//! Read access to recordings and the swappable snapshot served to requests.

use crate::recording::{Catalog, Method, RequestResponsePair};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Supplies the ordered recordings for each method.
pub trait RecordingStore: Send + Sync + fmt::Debug {
    /// Recordings for `method` in insertion order; empty when none exist.
    fn ordered_pairs(&self, method: Method) -> &[RequestResponsePair];

    /// Total number of recordings across all methods.
    fn total(&self) -> usize {
        Method::ALL
            .iter()
            .map(|m| self.ordered_pairs(*m).len())
            .sum()
    }
}

impl RecordingStore for Catalog {
    fn ordered_pairs(&self, method: Method) -> &[RequestResponsePair] {
        self.pairs(method)
    }
}

/// The catalog snapshot currently being served.
///
/// Readers clone the `Arc` and release the lock immediately, so a request
/// keeps the snapshot it started with for its whole lifetime, including
/// any delay. Replacing the snapshot never blocks on in-flight requests.
pub struct SharedCatalog {
    current: RwLock<Arc<dyn RecordingStore>>,
    generation: AtomicU64,
}

impl SharedCatalog {
    pub fn new(store: Arc<dyn RecordingStore>) -> Self {
        Self {
            current: RwLock::new(store),
            generation: AtomicU64::new(0),
        }
    }

    /// The snapshot to use for one request.
    pub async fn snapshot(&self) -> Arc<dyn RecordingStore> {
        Arc::clone(&*self.current.read().await)
    }

    /// Swap in a new snapshot, returning the new generation number.
    pub async fn replace(&self, store: Arc<dyn RecordingStore>) -> u64 {
        let mut current = self.current.write().await;
        *current = store;
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of times the snapshot has been replaced.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for SharedCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCatalog")
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{RecordedRequest, RecordedResponse};

    fn catalog(paths: &[&str]) -> Catalog {
        paths
            .iter()
            .map(|path| {
                RequestResponsePair::new(
                    RecordedRequest::new(Method::Get, path),
                    RecordedResponse::new(200),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_empty_store_returns_empty_sequences() {
        let store = Catalog::new();
        for method in Method::ALL {
            assert!(store.ordered_pairs(method).is_empty());
        }
        assert_eq!(store.total(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_survives_replace() {
        let shared = SharedCatalog::new(Arc::new(catalog(&["/old"])));
        let before = shared.snapshot().await;

        let generation = shared.replace(Arc::new(catalog(&["/new", "/newer"]))).await;
        assert_eq!(generation, 1);
        assert_eq!(shared.generation(), 1);

        // The earlier snapshot is unaffected by the swap.
        assert_eq!(before.ordered_pairs(Method::Get)[0].request.path, "/old");

        let after = shared.snapshot().await;
        assert_eq!(after.total(), 2);
        assert_eq!(after.ordered_pairs(Method::Get)[0].request.path, "/new");
    }
}
