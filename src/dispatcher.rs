//! Turns a matched recording into the outbound response.

use crate::config::GlobalSettings;
use crate::delay::apply_delay;
use crate::matcher::find_match;
use crate::recording::{InboundRequest, OutboundResult, RecordedResponse};
use crate::reserved::ReservedHeader;
use crate::store::RecordingStore;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Dispatcher
///
/// Selects the method's recordings, finds the first match and replays its
/// response with reserved headers removed and any delay applied.
#[derive(Debug)]
pub struct Dispatcher {
    settings: GlobalSettings,
    /// Total requests dispatched.
    requests_total: AtomicU64,
    /// Total requests answered from a recording.
    requests_matched: AtomicU64,
    /// Total requests answered with 404.
    requests_unmatched: AtomicU64,
}

impl Dispatcher {
    pub fn new(settings: GlobalSettings) -> Self {
        Self {
            settings,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        }
    }

    /// Get total requests dispatched.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Get total requests matched.
    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    /// Get total requests unmatched.
    pub fn total_unmatched(&self) -> u64 {
        self.requests_unmatched.load(Ordering::Relaxed)
    }

    /// Answer `request` from `store`.
    ///
    /// Never fails: a request nothing matches yields `OutboundResult::NotFound`.
    pub async fn dispatch(
        &self,
        store: &dyn RecordingStore,
        request: &InboundRequest,
    ) -> OutboundResult {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let pairs = store.ordered_pairs(request.method);
        match find_match(pairs, request) {
            Some(result) => {
                self.requests_matched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_matches {
                    info!(
                        method = %request.method,
                        path = %request.path,
                        index = result.index,
                        status = result.pair.response.status,
                        "Request matched recording"
                    );
                }
                build_response(&result.pair.response).await
            }
            None => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_unmatched {
                    warn!(
                        method = %request.method,
                        path = %request.path,
                        recordings = pairs.len(),
                        "No matching recording found"
                    );
                }
                OutboundResult::NotFound
            }
        }
    }
}

/// Build the outbound response from a recording, in header order.
async fn build_response(response: &RecordedResponse) -> OutboundResult {
    let mut headers = Vec::with_capacity(response.headers.len());

    for (name, value) in &response.headers {
        match ReservedHeader::classify(name) {
            Some(ReservedHeader::ContentLength) | Some(ReservedHeader::BodyMatch) => continue,
            Some(ReservedHeader::Delay) => {
                apply_delay(value).await;
            }
            None => headers.push((name.clone(), value.clone())),
        }
    }

    OutboundResult::Matched {
        status: response.status,
        headers,
        body: response.body.clone().unwrap_or_default(),
    }
}
