//! Ditto Replay
//!
//! An HTTP replay server. Incoming requests are matched against recorded
//! request/response pairs and answered with the recorded response, making
//! it a drop-in test double for real backend services.
//!
//! # Features
//!
//! - **Ordered Matching**: Recordings are scanned in catalog order; the first match wins
//! - **Query Matching**: Query parameters compare as an unordered set
//! - **Body Matching**: Exact, contains, regex or JSON matching for POST/PUT bodies
//! - **Delay Simulation**: `X-Ditto-Delay` holds a response for whole seconds
//! - **Hot Reload**: Recordings are swapped atomically without disturbing in-flight requests
//!
//! # Recording Files
//!
//! ```text
//! GET /service/user/123?param=value HTTP/1.1
//! host: localhost:8080
//!
//! HTTP/1.1 200 OK
//! Content-Type: application/json
//!
//! {"name":"Sam"}
//! ```
//!
//! # Example Configuration
//!
//! ```yaml
//! recordings:
//!   directory: ./recordings
//! stubs:
//!   - id: health
//!     request:
//!       method: GET
//!       path: /health
//!     response:
//!       status: 200
//!       body:
//!         type: text
//!         content: "ok"
//! ```

pub mod config;
pub mod delay;
pub mod dispatcher;
pub mod error;
pub mod format;
pub mod matcher;
pub mod recording;
pub mod replayer;
pub mod reserved;
pub mod server;
pub mod source;
pub mod store;

pub use config::ReplayConfig;
pub use dispatcher::Dispatcher;
pub use error::RecordingError;
pub use recording::{
    Catalog, InboundRequest, Method, OutboundResult, RecordedRequest, RecordedResponse,
    RequestResponsePair,
};
pub use replayer::Replayer;
pub use server::ReplayServer;
pub use store::{RecordingStore, SharedCatalog};
