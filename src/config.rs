//! Configuration for the replay server.
//!
//! Defines the listener, where recordings come from, inline recordings and
//! logging settings.

use crate::error::RecordingError;
use crate::matcher::{BodyMatchStrategy, HeaderCondition, HeaderRule};
use crate::recording::{Method, RecordedRequest, RecordedResponse, RequestResponsePair};
use crate::source::{DirectorySource, RecordingSource, StubSource};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Main configuration for the replay server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ReplayConfig {
    /// Listener settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Where recording files are loaded from
    #[serde(default)]
    pub recordings: RecordingSettings,

    /// Inline recordings, served before any recording files
    #[serde(default)]
    pub stubs: Vec<StubDefinition>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl ReplayConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for (i, stub) in self.stubs.iter().enumerate() {
            stub.validate()
                .map_err(|e| anyhow::anyhow!("Stub {}: {}", i, e))?;
            if !seen.insert(stub.id.as_str()) {
                anyhow::bail!("Stub {}: duplicate id {:?}", i, stub.id);
            }
        }
        if let Some(dir) = &self.recordings.directory {
            if dir.as_os_str().is_empty() {
                anyhow::bail!("Recordings directory cannot be empty");
            }
        }
        Ok(())
    }

    /// Recording sources in catalog order: inline stubs, then the directory.
    pub fn sources(&self) -> Vec<Arc<dyn RecordingSource>> {
        let mut sources: Vec<Arc<dyn RecordingSource>> = Vec::new();
        if !self.stubs.is_empty() {
            sources.push(Arc::new(StubSource::new(self.stubs.clone())));
        }
        if let Some(dir) = &self.recordings.directory {
            sources.push(Arc::new(DirectorySource::new(dir.clone())));
        }
        sources
    }
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    /// Address to listen on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Give up on a request after this many seconds (none = never)
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_timeout_secs: None,
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Recording file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordingSettings {
    /// Directory of recording files
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Reload recordings on SIGHUP
    #[serde(default = "default_true")]
    pub reload_on_signal: bool,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            directory: None,
            reload_on_signal: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// A recording defined inline in the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StubDefinition {
    /// Unique identifier for this stub
    pub id: String,

    /// Request to match
    pub request: RequestDefinition,

    /// Response to replay
    pub response: ResponseDefinition,

    /// Whether this stub is served
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl StubDefinition {
    /// Validate the stub definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.id.is_empty() {
            anyhow::bail!("Stub id cannot be empty");
        }
        self.to_pair()?;
        Ok(())
    }

    /// Build the recording this stub describes.
    pub fn to_pair(&self) -> Result<RequestResponsePair, RecordingError> {
        let invalid = |message: String| RecordingError::InvalidStub {
            id: self.id.clone(),
            message,
        };

        let method: Method = self
            .request
            .method
            .parse()
            .map_err(|e: RecordingError| invalid(e.to_string()))?;

        let mut request = RecordedRequest::new(method, &self.request.path);
        for (name, value) in &self.request.query {
            request = request.with_query(name.clone(), value.clone());
        }
        if let Some(body) = &self.request.body {
            request = request.with_body(body.clone());
        }
        if let Some(strategy) = &self.request.body_match {
            let strategy: BodyMatchStrategy = strategy.parse()?;
            request = request.with_body_match(strategy);
        }
        for (name, matcher) in &self.request.headers {
            request = request.with_header_condition(matcher.compile(name)?);
        }

        self.response.validate().map_err(|e| invalid(e.to_string()))?;
        let mut response = RecordedResponse::new(self.response.status);
        for (name, value) in &self.response.headers {
            response = response.with_header(name.clone(), value.clone());
        }
        if let Some(body) = &self.response.body {
            let bytes = body.to_bytes().map_err(|e| invalid(format!("{e:#}")))?;
            response = response.with_body(bytes);
        }

        RequestResponsePair::new(request, response)
    }
}

/// Request matching configuration for an inline recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestDefinition {
    /// HTTP method
    pub method: String,

    /// Path, optionally with a query string
    pub path: String,

    /// Additional query parameters
    #[serde(default)]
    pub query: IndexMap<String, String>,

    /// Header conditions
    #[serde(default)]
    pub headers: IndexMap<String, HeaderMatcher>,

    /// Recorded request body
    #[serde(default)]
    pub body: Option<String>,

    /// Body-match strategy (exact, ignore, contains, regex, json)
    #[serde(default)]
    pub body_match: Option<String>,
}

/// Header matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HeaderMatcher {
    /// Exact value match
    Exact { value: String },
    /// Regex pattern match
    Regex { pattern: String },
    /// Header must be present (any value)
    Present,
    /// Header must be absent
    Absent,
    /// Value must contain substring
    Contains { value: String },
}

impl HeaderMatcher {
    fn compile(&self, name: &str) -> Result<HeaderCondition, RecordingError> {
        let rule = match self {
            HeaderMatcher::Exact { value } => HeaderRule::Exact(value.clone()),
            HeaderMatcher::Regex { pattern } => HeaderRule::Regex(
                regex::Regex::new(pattern).map_err(|source| RecordingError::InvalidRegex {
                    pattern: pattern.clone(),
                    source,
                })?,
            ),
            HeaderMatcher::Present => HeaderRule::Present,
            HeaderMatcher::Absent => HeaderRule::Absent,
            HeaderMatcher::Contains { value } => HeaderRule::Contains(value.clone()),
        };
        Ok(HeaderCondition::new(name, rule))
    }
}

/// Response definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseDefinition {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response headers, replayed in order
    #[serde(default)]
    pub headers: IndexMap<String, String>,

    /// Response body
    #[serde(default)]
    pub body: Option<ResponseBody>,
}

fn default_status() -> u16 {
    200
}

impl ResponseDefinition {
    /// Validate the response definition.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.status < 100 || self.status > 599 {
            anyhow::bail!("Invalid status code: {}", self.status);
        }
        Ok(())
    }
}

/// Response body configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBody {
    /// Plain text body
    Text { content: String },
    /// JSON body
    Json { content: serde_json::Value },
    /// Base64 encoded binary
    Base64 { content: String },
}

impl ResponseBody {
    /// Get the body content as bytes.
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        match self {
            ResponseBody::Text { content } => Ok(content.as_bytes().to_vec()),
            ResponseBody::Json { content } => Ok(serde_json::to_string(content)?.into_bytes()),
            ResponseBody::Base64 { content } => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD
                    .decode(content)
                    .map_err(|e| anyhow::anyhow!("Invalid base64: {}", e))
            }
        }
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log all matched requests
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log unmatched requests
    #[serde(default = "default_true")]
    pub log_unmatched: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::BodyMatch;

    #[test]
    fn test_parse_simple_stub() {
        let yaml = r#"
stubs:
  - id: user
    request:
      method: GET
      path: /service/user/123?param=value
    response:
      status: 200
      headers:
        Content-Type: application/json
      body:
        type: text
        content: '{"name":"Sam"}'
"#;
        let config: ReplayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.stubs.len(), 1);
        assert_eq!(config.stubs[0].id, "user");
        config.validate().unwrap();

        let pair = config.stubs[0].to_pair().unwrap();
        assert_eq!(pair.request.method, Method::Get);
        assert_eq!(pair.request.path, "/service/user/123");
        assert_eq!(pair.response.body.as_deref(), Some(&br#"{"name":"Sam"}"#[..]));
    }

    #[test]
    fn test_defaults() {
        let config: ReplayConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.server.listen, SocketAddr::from(([0, 0, 0, 0], 8080)));
        assert!(config.server.request_timeout().is_none());
        assert!(config.recordings.directory.is_none());
        assert!(config.recordings.reload_on_signal);
        assert!(config.settings.log_matches);
        assert!(config.sources().is_empty());
    }

    #[test]
    fn test_parse_server_and_recordings() {
        let yaml = r#"
server:
  listen: "127.0.0.1:9090"
  request_timeout_secs: 30
recordings:
  directory: ./recordings
  reload_on_signal: false
settings:
  log_matches: false
"#;
        let config: ReplayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.listen.port(), 9090);
        assert_eq!(config.server.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(
            config.recordings.directory.as_deref(),
            Some(Path::new("./recordings"))
        );
        assert!(!config.recordings.reload_on_signal);
        assert!(!config.settings.log_matches);
        assert!(config.settings.log_unmatched);
        assert_eq!(config.sources().len(), 1);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let yaml = r#"
server:
  port: 8080
"#;
        assert!(serde_yaml::from_str::<ReplayConfig>(yaml).is_err());
    }

    #[test]
    fn test_response_headers_keep_order() {
        let yaml = r#"
id: ordered
request:
  method: GET
  path: /x
response:
  headers:
    Zeta: "1"
    Alpha: "2"
    X-Ditto-Delay: "0"
"#;
        let stub: StubDefinition = serde_yaml::from_str(yaml).unwrap();
        let pair = stub.to_pair().unwrap();
        let names: Vec<_> = pair.response.headers.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["Zeta", "Alpha", "X-Ditto-Delay"]);
        assert_eq!(pair.response.status, 200);
    }

    #[test]
    fn test_body_match_and_header_conditions() {
        let yaml = r#"
id: search
request:
  method: POST
  path: /search
  query:
    page: "2"
  headers:
    authorization:
      type: regex
      pattern: "^Bearer "
  body: '{"q": "rust"}'
  body_match: json
response:
  status: 201
"#;
        let stub: StubDefinition = serde_yaml::from_str(yaml).unwrap();
        let pair = stub.to_pair().unwrap();
        assert!(matches!(pair.body_match(), BodyMatch::Json(_)));
        assert_eq!(pair.request.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(pair.request.header_conditions.len(), 1);
        assert!(matches!(
            pair.request.header_conditions[0].rule,
            HeaderRule::Regex(_)
        ));
    }

    #[test]
    fn test_validate_rejects_bad_stubs() {
        let base = r#"
stubs:
  - id: a
    request:
      method: GET
      path: /a
    response:
      status: 200
"#;
        let mut config: ReplayConfig = serde_yaml::from_str(base).unwrap();
        config.validate().unwrap();

        config.stubs[0].response.status = 42;
        assert!(config.validate().is_err());
        config.stubs[0].response.status = 200;

        config.stubs[0].request.method = "PATCH".to_string();
        assert!(config.validate().is_err());
        config.stubs[0].request.method = "GET".to_string();

        config.stubs[0].request.body_match = Some("fuzzy".to_string());
        assert!(config.validate().is_err());
        config.stubs[0].request.body_match = None;

        config.stubs.push(config.stubs[0].clone());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate id"));

        config.stubs.truncate(1);
        config.stubs[0].id = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_response_body_to_bytes() {
        let text = ResponseBody::Text {
            content: "hello".to_string(),
        };
        assert_eq!(text.to_bytes().unwrap(), b"hello");

        let json = ResponseBody::Json {
            content: serde_json::json!({"key": "value"}),
        };
        let bytes = json.to_bytes().unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("key"));

        let binary = ResponseBody::Base64 {
            content: "AAEC".to_string(),
        };
        assert_eq!(binary.to_bytes().unwrap(), vec![0, 1, 2]);

        let broken = ResponseBody::Base64 {
            content: "***".to_string(),
        };
        assert!(broken.to_bytes().is_err());
    }

    #[test]
    fn test_only_inline_body_types_accepted() {
        let yaml = r#"
id: file-body
request:
  method: GET
  path: /x
response:
  body:
    type: file
    path: /etc/hostname
"#;
        assert!(serde_yaml::from_str::<StubDefinition>(yaml).is_err());
    }

    #[test]
    fn test_stub_fields_are_closed() {
        let yaml = r#"
id: named
name: A described stub
request:
  method: GET
  path: /x
response:
  status: 200
"#;
        assert!(serde_yaml::from_str::<StubDefinition>(yaml).is_err());
    }
}
