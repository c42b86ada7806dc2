//! Request matching logic.
//!
//! Matches inbound requests against the recordings of their method. The
//! first recording in catalog order whose path, query, body and header
//! conditions all hold wins.

use crate::error::RecordingError;
use crate::recording::{InboundRequest, Method, RequestResponsePair};
use bytes::Bytes;
use regex::Regex;
use std::str::FromStr;

/// Result of matching a request against a method's recordings.
#[derive(Debug)]
pub struct MatchResult<'a> {
    /// Position of the recording in its method's sequence
    pub index: usize,
    /// The matched recording
    pub pair: &'a RequestResponsePair,
}

/// How a recording constrains the inbound body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMatchStrategy {
    /// Bodies must be byte-for-byte equal
    Exact,
    /// Body is not considered
    Ignore,
    /// Inbound body must contain the recorded body
    Contains,
    /// Recorded body is a regex the inbound body must match
    Regex,
    /// Both bodies are JSON and structurally equal
    Json,
}

impl BodyMatchStrategy {
    /// Strategy used when a recording names none.
    ///
    /// POST and PUT recordings are keyed by URL and body; the rest by URL only.
    pub fn default_for(method: Method) -> Self {
        match method {
            Method::Post | Method::Put => BodyMatchStrategy::Exact,
            Method::Get | Method::Head | Method::Delete => BodyMatchStrategy::Ignore,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BodyMatchStrategy::Exact => "exact",
            BodyMatchStrategy::Ignore => "ignore",
            BodyMatchStrategy::Contains => "contains",
            BodyMatchStrategy::Regex => "regex",
            BodyMatchStrategy::Json => "json",
        }
    }
}

impl FromStr for BodyMatchStrategy {
    type Err = RecordingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        [
            BodyMatchStrategy::Exact,
            BodyMatchStrategy::Ignore,
            BodyMatchStrategy::Contains,
            BodyMatchStrategy::Regex,
            BodyMatchStrategy::Json,
        ]
        .into_iter()
        .find(|strategy| strategy.as_str().eq_ignore_ascii_case(name))
        .ok_or_else(|| RecordingError::InvalidBodyMatch(name.to_string()))
    }
}

/// A body-match strategy compiled against a recorded body.
#[derive(Debug, Clone)]
pub enum BodyMatch {
    Exact(Bytes),
    Ignore,
    Contains(Bytes),
    Regex(Regex),
    Json(serde_json::Value),
}

impl BodyMatch {
    /// Compile `strategy` for a recording whose body is `recorded`.
    pub fn compile(
        strategy: BodyMatchStrategy,
        recorded: Option<&Bytes>,
    ) -> Result<Self, RecordingError> {
        let recorded = recorded.cloned().unwrap_or_default();
        Ok(match strategy {
            BodyMatchStrategy::Exact => BodyMatch::Exact(recorded),
            BodyMatchStrategy::Ignore => BodyMatch::Ignore,
            BodyMatchStrategy::Contains => BodyMatch::Contains(recorded),
            BodyMatchStrategy::Regex => {
                let pattern = String::from_utf8_lossy(&recorded);
                let regex = Regex::new(&pattern).map_err(|source| RecordingError::InvalidRegex {
                    pattern: pattern.to_string(),
                    source,
                })?;
                BodyMatch::Regex(regex)
            }
            BodyMatchStrategy::Json => BodyMatch::Json(serde_json::from_slice(&recorded)?),
        })
    }

    /// Check an inbound body against this condition.
    pub fn matches(&self, body: &[u8]) -> bool {
        match self {
            BodyMatch::Exact(expected) => body == &expected[..],
            BodyMatch::Ignore => true,
            BodyMatch::Contains(needle) => {
                needle.is_empty() || body.windows(needle.len()).any(|w| w == &needle[..])
            }
            BodyMatch::Regex(regex) => std::str::from_utf8(body)
                .map(|s| regex.is_match(s))
                .unwrap_or(false),
            BodyMatch::Json(expected) => serde_json::from_slice::<serde_json::Value>(body)
                .map(|actual| actual == *expected)
                .unwrap_or(false),
        }
    }
}

/// Header matching rule.
#[derive(Debug, Clone)]
pub enum HeaderRule {
    /// Exact value match
    Exact(String),
    /// Value must contain substring
    Contains(String),
    /// Regex pattern match
    Regex(Regex),
    /// Header must be present (any value)
    Present,
    /// Header must be absent
    Absent,
}

/// A condition on one inbound header.
#[derive(Debug, Clone)]
pub struct HeaderCondition {
    pub name: String,
    pub rule: HeaderRule,
}

impl HeaderCondition {
    pub fn new(name: impl Into<String>, rule: HeaderRule) -> Self {
        Self {
            name: name.into(),
            rule,
        }
    }

    pub fn matches(&self, headers: &[(String, String)]) -> bool {
        let value = header_value(headers, &self.name);
        match &self.rule {
            HeaderRule::Exact(expected) => value == Some(expected.as_str()),
            HeaderRule::Contains(needle) => value.map(|v| v.contains(needle.as_str())).unwrap_or(false),
            HeaderRule::Regex(regex) => value.map(|v| regex.is_match(v)).unwrap_or(false),
            HeaderRule::Present => value.is_some(),
            HeaderRule::Absent => value.is_none(),
        }
    }
}

/// Case-insensitive header lookup.
pub(crate) fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Find the first recording in `pairs` that matches `request`.
///
/// `pairs` must already be the sequence for the request's method.
pub fn find_match<'a>(
    pairs: &'a [RequestResponsePair],
    request: &InboundRequest,
) -> Option<MatchResult<'a>> {
    pairs
        .iter()
        .enumerate()
        .find(|(_, pair)| matches_request(pair, request))
        .map(|(index, pair)| MatchResult { index, pair })
}

/// Check a single recording against a request.
pub fn matches_request(pair: &RequestResponsePair, request: &InboundRequest) -> bool {
    let recorded = &pair.request;

    if recorded.path != request.path {
        return false;
    }

    if !same_query(&recorded.query, &request.query) {
        return false;
    }

    if !pair.body_match().matches(&request.body) {
        return false;
    }

    recorded
        .header_conditions
        .iter()
        .all(|condition| condition.matches(&request.headers))
}

/// Compare query parameters as unordered multisets.
fn same_query(recorded: &[(String, String)], inbound: &[(String, String)]) -> bool {
    if recorded.len() != inbound.len() {
        return false;
    }
    let mut recorded: Vec<_> = recorded.iter().collect();
    let mut inbound: Vec<_> = inbound.iter().collect();
    recorded.sort();
    inbound.sort();
    recorded == inbound
}

/// Parse a query string into decoded key-value pairs, keeping order.
pub(crate) fn parse_query_string(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => (decode_component(key), decode_component(value)),
            None => (decode_component(part), String::new()),
        })
        .collect()
}

fn decode_component(s: &str) -> String {
    let s = s.replace('+', " ");
    match urlencoding::decode(&s) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => s,
    }
}
