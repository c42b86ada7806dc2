//! Reserved response header names.

/// Response header carrying a delay in whole seconds.
pub const DELAY_HEADER: &str = "X-Ditto-Delay";

/// Response header naming the body-match strategy of a recording.
pub const BODY_MATCH_HEADER: &str = "X-Ditto-Body-Match";

/// Headers that are never copied from a recording to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedHeader {
    /// Delay marker, consumed by the delay executor.
    Delay,
    /// Body-match marker, consumed at load time by the matcher.
    BodyMatch,
    /// Recomputed by the transport from the emitted body.
    ContentLength,
}

impl ReservedHeader {
    /// Classify a header name, ignoring ASCII case.
    pub fn classify(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case(DELAY_HEADER) {
            Some(ReservedHeader::Delay)
        } else if name.eq_ignore_ascii_case(BODY_MATCH_HEADER) {
            Some(ReservedHeader::BodyMatch)
        } else if name.eq_ignore_ascii_case("content-length") {
            Some(ReservedHeader::ContentLength)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReservedHeader::Delay => DELAY_HEADER,
            ReservedHeader::BodyMatch => BODY_MATCH_HEADER,
            ReservedHeader::ContentLength => "Content-Length",
        }
    }
}
