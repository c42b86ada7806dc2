//! Entry point for answering requests from the current catalog.

use crate::config::{GlobalSettings, ReplayConfig};
use crate::dispatcher::Dispatcher;
use crate::error::RecordingError;
use crate::recording::{InboundRequest, Method, OutboundResult};
use crate::source::{load_all, RecordingSource};
use crate::store::{RecordingStore, SharedCatalog};
use bytes::Bytes;
use std::sync::Arc;
use tracing::info;

/// Replays recorded responses for inbound requests.
///
/// Each request is dispatched against the snapshot current when it
/// arrives; `reload` and `replace` swap snapshots without disturbing
/// requests already in flight.
pub struct Replayer {
    catalog: SharedCatalog,
    dispatcher: Dispatcher,
    sources: Vec<Arc<dyn RecordingSource>>,
}

impl Replayer {
    /// Serve a fixed store.
    pub fn new(store: Arc<dyn RecordingStore>, settings: GlobalSettings) -> Self {
        Self {
            catalog: SharedCatalog::new(store),
            dispatcher: Dispatcher::new(settings),
            sources: Vec::new(),
        }
    }

    /// Load every source and serve the result; `reload` re-reads them.
    pub async fn from_sources(
        sources: Vec<Arc<dyn RecordingSource>>,
        settings: GlobalSettings,
    ) -> Result<Self, RecordingError> {
        let catalog = load_all(&sources).await?;
        for source in &sources {
            info!(source = %source.describe(), "Using recording source");
        }
        Ok(Self {
            catalog: SharedCatalog::new(Arc::new(catalog)),
            dispatcher: Dispatcher::new(settings),
            sources,
        })
    }

    /// Build a replayer from a validated configuration.
    pub async fn from_config(config: &ReplayConfig) -> Result<Self, RecordingError> {
        Self::from_sources(config.sources(), config.settings.clone()).await
    }

    /// Answer one request.
    pub async fn handle(&self, request: &InboundRequest) -> OutboundResult {
        let snapshot = self.catalog.snapshot().await;
        self.dispatcher.dispatch(snapshot.as_ref(), request).await
    }

    /// Answer one request given as raw parts.
    ///
    /// Methods other than GET, HEAD, POST, PUT and DELETE yield `NotFound`.
    pub async fn handle_parts(
        &self,
        method: &str,
        path: &str,
        query: Vec<(String, String)>,
        headers: Vec<(String, String)>,
        body: Bytes,
    ) -> OutboundResult {
        let Ok(method) = method.parse::<Method>() else {
            return OutboundResult::NotFound;
        };
        let request = InboundRequest {
            method,
            path: path.to_string(),
            query,
            headers,
            body,
        };
        self.handle(&request).await
    }

    /// Re-read all sources and swap in the result.
    ///
    /// On failure the current snapshot stays in place.
    pub async fn reload(&self) -> Result<usize, RecordingError> {
        let catalog = load_all(&self.sources).await?;
        let total = catalog.len();
        let generation = self.catalog.replace(Arc::new(catalog)).await;
        info!(recordings = total, generation, "Recordings reloaded");
        Ok(total)
    }

    /// Swap in an already built store.
    pub async fn replace(&self, store: Arc<dyn RecordingStore>) {
        self.catalog.replace(store).await;
    }

    /// Recording counts per method in the current snapshot.
    pub async fn recording_counts(&self) -> Vec<(Method, usize)> {
        let snapshot = self.catalog.snapshot().await;
        Method::ALL
            .into_iter()
            .map(|m| (m, snapshot.ordered_pairs(m).len()))
            .collect()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Whether `reload` has anything to re-read.
    pub fn can_reload(&self) -> bool {
        !self.sources.is_empty()
    }
}
