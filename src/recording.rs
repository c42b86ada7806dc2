//! Recorded request/response pairs and the per-method catalog.

use crate::error::RecordingError;
use crate::matcher::{parse_query_string, BodyMatch, BodyMatchStrategy, HeaderCondition};
use crate::reserved::ReservedHeader;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

/// HTTP methods served by the replayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl Method {
    /// All served methods, in catalog order.
    pub const ALL: [Method; 5] = [
        Method::Get,
        Method::Head,
        Method::Post,
        Method::Put,
        Method::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    fn index(self) -> usize {
        match self {
            Method::Get => 0,
            Method::Head => 1,
            Method::Post => 2,
            Method::Put => 3,
            Method::Delete => 4,
        }
    }
}

impl FromStr for Method {
    type Err = RecordingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RecordingError::UnsupportedMethod(s.trim().to_string()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a request target into its path and decoded query pairs.
pub(crate) fn split_target(target: &str) -> (String, Vec<(String, String)>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query_string(query)),
        None => (target.to_string(), Vec::new()),
    }
}

/// The request half of a recording.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    /// Path component, without the query string.
    pub path: String,
    /// Decoded query parameters.
    pub query: Vec<(String, String)>,
    pub body: Option<Bytes>,
    /// Explicit body-match strategy; takes precedence over the marker header.
    pub body_match: Option<BodyMatchStrategy>,
    /// Extra header conditions; empty for file recordings.
    pub header_conditions: Vec<HeaderCondition>,
}

impl RecordedRequest {
    /// Create a request for `target`, which may carry a query string.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method,
            path,
            query,
            body: None,
            body_match: None,
            header_conditions: Vec::new(),
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_body_match(mut self, strategy: BodyMatchStrategy) -> Self {
        self.body_match = Some(strategy);
        self
    }

    pub fn with_header_condition(mut self, condition: HeaderCondition) -> Self {
        self.header_conditions.push(condition);
        self
    }
}

/// The response half of a recording, replayed verbatim.
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    pub status: u16,
    /// Headers in recorded order, original case.
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl RecordedResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Case-insensitive header lookup; the last occurrence wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A recording: the unit of storage and matching.
#[derive(Debug, Clone)]
pub struct RequestResponsePair {
    pub request: RecordedRequest,
    pub response: RecordedResponse,
    body_match: BodyMatch,
}

impl RequestResponsePair {
    /// Pair a request with its response, resolving the body-match strategy.
    ///
    /// The strategy comes from the request's explicit setting, then the
    /// body-match marker on the response, then the method default.
    pub fn new(
        request: RecordedRequest,
        response: RecordedResponse,
    ) -> Result<Self, RecordingError> {
        let strategy = match request.body_match {
            Some(strategy) => strategy,
            None => match response.header(ReservedHeader::BodyMatch.name()) {
                Some(value) => value.parse()?,
                None => BodyMatchStrategy::default_for(request.method),
            },
        };
        let body_match = BodyMatch::compile(strategy, request.body.as_ref())?;
        Ok(Self {
            request,
            response,
            body_match,
        })
    }

    pub fn method(&self) -> Method {
        self.request.method
    }

    pub fn body_match(&self) -> &BodyMatch {
        &self.body_match
    }
}

/// Recordings partitioned by method, each sequence in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    sequences: [Vec<RequestResponsePair>; 5],
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair to the end of its method's sequence.
    pub fn push(&mut self, pair: RequestResponsePair) {
        self.sequences[pair.method().index()].push(pair);
    }

    /// Append every pair of `other`, keeping its order.
    pub fn append(&mut self, other: Catalog) {
        for (ours, theirs) in self.sequences.iter_mut().zip(other.sequences) {
            ours.extend(theirs);
        }
    }

    pub fn pairs(&self, method: Method) -> &[RequestResponsePair] {
        &self.sequences[method.index()]
    }

    pub fn len(&self) -> usize {
        self.sequences.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<RequestResponsePair> for Catalog {
    fn from_iter<I: IntoIterator<Item = RequestResponsePair>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for pair in iter {
            catalog.push(pair);
        }
        catalog
    }
}

/// A request as received by the transport.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl InboundRequest {
    /// Create a request for `target`, which may carry a query string.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method,
            path,
            query,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Outcome of dispatching one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundResult {
    /// A recording matched; its response after header filtering.
    Matched {
        status: u16,
        headers: Vec<(String, String)>,
        body: Bytes,
    },
    /// Nothing matched: 404, no headers, empty body.
    NotFound,
}

impl OutboundResult {
    pub fn status(&self) -> u16 {
        match self {
            OutboundResult::Matched { status, .. } => *status,
            OutboundResult::NotFound => 404,
        }
    }

    pub fn headers(&self) -> &[(String, String)] {
        match self {
            OutboundResult::Matched { headers, .. } => headers,
            OutboundResult::NotFound => &[],
        }
    }

    pub fn body(&self) -> &[u8] {
        match self {
            OutboundResult::Matched { body, .. } => body,
            OutboundResult::NotFound => &[],
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, OutboundResult::Matched { .. })
    }
}
