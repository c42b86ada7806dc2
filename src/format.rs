//! Parser for recording files.
//!
//! A recording file holds one raw HTTP/1.1 exchange: the request (line,
//! headers, optional body) followed by the response (status line, headers,
//! optional body). Line endings may be CRLF or LF.

use crate::error::RecordingError;
use crate::recording::{Method, RecordedRequest, RecordedResponse, RequestResponsePair};
use std::path::Path;

struct Lines<'a> {
    inner: std::iter::Peekable<std::iter::Enumerate<std::str::SplitInclusive<'a, char>>>,
    last: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_inclusive('\n').enumerate().peekable(),
            last: 0,
        }
    }

    /// Next raw line (terminator included) with its 1-based number.
    fn next_raw(&mut self) -> Option<(usize, &'a str)> {
        let (idx, line) = self.inner.next()?;
        self.last = idx + 1;
        Some((idx + 1, line))
    }

    fn peek_content(&mut self) -> Option<&'a str> {
        self.inner.peek().map(|&(_, line)| content(line))
    }
}

fn content(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

fn is_status_line(line: &str) -> bool {
    line.trim_start().starts_with("HTTP/")
}

fn parse_error(path: &Path, line: usize, message: impl Into<String>) -> RecordingError {
    RecordingError::Parse {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

/// Parse the text of one recording file.
///
/// `path` is only used to label errors.
pub fn parse_recording(path: &Path, text: &str) -> Result<RequestResponsePair, RecordingError> {
    let mut lines = Lines::new(text);

    // Request line, after any leading blank lines.
    let (request_line_no, request_line) = loop {
        match lines.next_raw() {
            Some((_, line)) if content(line).trim().is_empty() => continue,
            Some((no, line)) => break (no, content(line)),
            None => return Err(parse_error(path, lines.last.max(1), "empty recording")),
        }
    };

    let mut parts = request_line.split_whitespace();
    let (method, target) = match (parts.next(), parts.next()) {
        (Some(method), Some(target)) => (method, target),
        _ => {
            return Err(parse_error(
                path,
                request_line_no,
                format!("malformed request line: {request_line:?}"),
            ))
        }
    };
    let method: Method = method
        .parse()
        .map_err(|e: RecordingError| e.at(path, request_line_no))?;
    let mut request = RecordedRequest::new(method, target);

    // Request headers are informational only; validate their shape.
    while let Some(next) = lines.peek_content() {
        if next.trim().is_empty() || is_status_line(next) {
            break;
        }
        if let Some((no, line)) = lines.next_raw() {
            if !content(line).contains(':') {
                return Err(parse_error(
                    path,
                    no,
                    format!("malformed header line: {:?}", content(line)),
                ));
            }
        }
    }

    // Request body runs up to the status line.
    let mut body = String::new();
    let status_line = loop {
        match lines.next_raw() {
            Some((no, line)) if is_status_line(content(line)) => break (no, content(line)),
            Some((_, line)) => body.push_str(line),
            None => {
                return Err(parse_error(
                    path,
                    lines.last.max(1),
                    "missing response status line",
                ))
            }
        }
    };
    let body = body.trim_matches(['\r', '\n']);
    if !body.is_empty() {
        request = request.with_body(body.to_string());
    }

    let (status_line_no, status_line) = status_line;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| (100..=599).contains(code))
        .ok_or_else(|| {
            parse_error(
                path,
                status_line_no,
                format!("malformed status line: {status_line:?}"),
            )
        })?;
    let mut response = RecordedResponse::new(status);

    // Response headers until the first blank line.
    while let Some((no, line)) = lines.next_raw() {
        let line = content(line);
        if line.trim().is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .filter(|(name, _)| !name.trim().is_empty())
            .ok_or_else(|| parse_error(path, no, format!("malformed header line: {line:?}")))?;
        response = response.with_header(name.trim(), value.trim());
    }

    // Everything else is the response body.
    let mut body = String::new();
    while let Some((_, line)) = lines.next_raw() {
        body.push_str(line);
    }
    let body = body.trim_end_matches(['\r', '\n']);
    if !body.is_empty() {
        response = response.with_body(body.to_string());
    }

    RequestResponsePair::new(request, response).map_err(|e| e.at(path, status_line_no))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::BodyMatch;

    fn parse(text: &str) -> Result<RequestResponsePair, RecordingError> {
        parse_recording(Path::new("test.txt"), text)
    }

    #[test]
    fn test_parse_get_recording() {
        let text = "GET /service/user/123?param=value HTTP/1.1\r\n\
                    connection: Keep-Alive\r\n\
                    host: localhost:8080\r\n\
                    \r\n\
                    \r\n\
                    \r\n\
                    HTTP/1.1 200 OK\r\n\
                    Date: Sun, 25 Sep 2016 16:30:44 GMT\r\n\
                    Content-Length: 576\r\n\
                    Content-Type: application/json;charset=UTF-8\r\n\
                    \r\n\
                    {\"name\":\"Sam\"}\r\n";
        let pair = parse(text).unwrap();

        assert_eq!(pair.request.method, Method::Get);
        assert_eq!(pair.request.path, "/service/user/123");
        assert_eq!(
            pair.request.query,
            vec![("param".to_string(), "value".to_string())]
        );
        assert!(pair.request.body.is_none());

        assert_eq!(pair.response.status, 200);
        assert_eq!(pair.response.headers.len(), 3);
        assert_eq!(pair.response.headers[0].0, "Date");
        assert_eq!(pair.response.header("content-type"), Some("application/json;charset=UTF-8"));
        assert_eq!(pair.response.body.as_deref(), Some(&b"{\"name\":\"Sam\"}"[..]));
    }

    #[test]
    fn test_parse_put_recording_with_body() {
        let text = "PUT /service/user HTTP/1.1\n\
                    host: localhost:9080\n\
                    \n\
                    {\"operation\":\"GET\"}\n\
                    \n\
                    HTTP/1.1 200 OK\n\
                    Content-Type: application/json\n";
        let pair = parse(text).unwrap();

        assert_eq!(pair.request.method, Method::Put);
        assert_eq!(pair.request.body.as_deref(), Some(&b"{\"operation\":\"GET\"}"[..]));
        assert!(matches!(pair.body_match(), BodyMatch::Exact(_)));
        assert!(pair.response.body.is_none());
    }

    #[test]
    fn test_parse_keeps_inner_body_lines() {
        let text = "GET /multi HTTP/1.1\n\nHTTP/1.1 200 OK\n\nline one\n\nline three\n\n";
        let pair = parse(text).unwrap();
        assert_eq!(
            pair.response.body.as_deref(),
            Some(&b"line one\n\nline three"[..])
        );
    }

    #[test]
    fn test_parse_body_match_marker() {
        let text = "POST /search HTTP/1.1\n\nquery\n\nHTTP/1.1 200 OK\nX-Ditto-Body-Match: contains\n";
        let pair = parse(text).unwrap();
        assert!(matches!(pair.body_match(), BodyMatch::Contains(_)));
    }

    #[test]
    fn test_parse_missing_status_line() {
        let err = parse("GET /x HTTP/1.1\nhost: a\n\n").unwrap_err();
        assert!(err.to_string().contains("missing response status line"));
    }

    #[test]
    fn test_parse_unsupported_method() {
        let err = parse("PATCH /x HTTP/1.1\n\nHTTP/1.1 200 OK\n").unwrap_err();
        assert_eq!(err.to_string(), "test.txt:1: unsupported method: PATCH");
    }

    #[test]
    fn test_parse_bad_status() {
        let err = parse("GET /x HTTP/1.1\n\nHTTP/1.1 abc\n").unwrap_err();
        match err {
            RecordingError::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }

        assert!(parse("GET /x HTTP/1.1\n\nHTTP/1.1 700 Nope\n").is_err());
    }

    #[test]
    fn test_parse_bad_response_header() {
        let err = parse("GET /x HTTP/1.1\n\nHTTP/1.1 200 OK\nno colon here\n").unwrap_err();
        match err {
            RecordingError::Parse { line, .. } => assert_eq!(line, 4),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_empty_file() {
        assert!(parse("").is_err());
        assert!(parse("\n\n").is_err());
    }

    #[test]
    fn test_parse_invalid_marker_reports_status_line() {
        let err = parse("POST /x HTTP/1.1\n\nHTTP/1.1 200 OK\nX-Ditto-Body-Match: fuzzy\n").unwrap_err();
        match err {
            RecordingError::Parse { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("fuzzy"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
