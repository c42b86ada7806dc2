//! Where recordings come from.
//!
//! A source produces a complete catalog or fails as a whole; a catalog is
//! never built from a partially read source.

use crate::config::StubDefinition;
use crate::error::RecordingError;
use crate::format::parse_recording;
use crate::recording::Catalog;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Something recordings can be loaded from.
#[async_trait]
pub trait RecordingSource: Send + Sync {
    /// Human-readable origin, for logs.
    fn describe(&self) -> String;

    /// Load every recording, in catalog order.
    async fn load(&self) -> Result<Catalog, RecordingError>;
}

/// A directory of recording files, one exchange per file.
///
/// Regular files are loaded in file-name order; hidden files and
/// subdirectories are skipped.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn recording_files(&self) -> Result<Vec<PathBuf>, RecordingError> {
        let io_err = |source: std::io::Error| RecordingError::Io {
            path: self.root.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(io_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            let file_type = entry.file_type().await.map_err(io_err)?;
            if file_type.is_file() && !hidden {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl RecordingSource for DirectorySource {
    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }

    async fn load(&self) -> Result<Catalog, RecordingError> {
        let mut catalog = Catalog::new();
        for path in self.recording_files().await? {
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| RecordingError::Io {
                    path: path.clone(),
                    source,
                })?;
            let pair = parse_recording(&path, &text)?;
            debug!(
                path = %path.display(),
                method = %pair.method(),
                request_path = %pair.request.path,
                "Loaded recording"
            );
            catalog.push(pair);
        }
        Ok(catalog)
    }
}

/// Recordings defined inline in the configuration.
#[derive(Debug, Clone)]
pub struct StubSource {
    stubs: Vec<StubDefinition>,
}

impl StubSource {
    pub fn new(stubs: Vec<StubDefinition>) -> Self {
        Self { stubs }
    }
}

#[async_trait]
impl RecordingSource for StubSource {
    fn describe(&self) -> String {
        format!("{} inline stubs", self.stubs.len())
    }

    async fn load(&self) -> Result<Catalog, RecordingError> {
        self.stubs
            .iter()
            .filter(|stub| stub.enabled)
            .map(StubDefinition::to_pair)
            .collect::<Result<Vec<_>, _>>()
            .map(|pairs| pairs.into_iter().collect())
    }
}

/// Load every source in order into a single catalog.
pub async fn load_all(sources: &[Arc<dyn RecordingSource>]) -> Result<Catalog, RecordingError> {
    let mut catalog = Catalog::new();
    for source in sources {
        let loaded = source.load().await?;
        debug!(source = %source.describe(), recordings = loaded.len(), "Loaded source");
        catalog.append(loaded);
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::Method;
    use std::fs;

    fn write(dir: &std::path::Path, name: &str, text: &str) {
        fs::write(dir.join(name), text).unwrap();
    }

    #[tokio::test]
    async fn test_directory_loads_in_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.txt", "GET /x HTTP/1.1\n\nHTTP/1.1 201 Created\n");
        write(dir.path(), "a.txt", "GET /x HTTP/1.1\n\nHTTP/1.1 200 OK\n");
        write(dir.path(), "c.txt", "DELETE /x HTTP/1.1\n\nHTTP/1.1 204 No Content\n");
        write(dir.path(), ".hidden", "not a recording");
        fs::create_dir(dir.path().join("nested")).unwrap();

        let catalog = DirectorySource::new(dir.path()).load().await.unwrap();

        let statuses: Vec<_> = catalog
            .pairs(Method::Get)
            .iter()
            .map(|p| p.response.status)
            .collect();
        assert_eq!(statuses, [200, 201]);
        assert_eq!(catalog.pairs(Method::Delete).len(), 1);
        assert_eq!(catalog.len(), 3);
    }

    #[tokio::test]
    async fn test_directory_fails_as_a_whole() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "GET /ok HTTP/1.1\n\nHTTP/1.1 200 OK\n");
        write(dir.path(), "b.txt", "GET /broken HTTP/1.1\n\n");

        let err = DirectorySource::new(dir.path()).load().await.unwrap_err();
        assert!(matches!(err, RecordingError::Parse { .. }));
        assert!(err.to_string().contains("b.txt"));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = DirectorySource::new(&missing).load().await.unwrap_err();
        assert!(matches!(err, RecordingError::Io { .. }));
    }

    #[tokio::test]
    async fn test_stub_source_skips_disabled() {
        let yaml = r#"
- id: live
  request: { method: GET, path: /on }
  response: { status: 200 }
- id: parked
  request: { method: GET, path: /off }
  response: { status: 200 }
  enabled: false
"#;
        let stubs: Vec<StubDefinition> = serde_yaml::from_str(yaml).unwrap();
        let catalog = StubSource::new(stubs).load().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.pairs(Method::Get)[0].request.path, "/on");
    }

    #[tokio::test]
    async fn test_load_all_keeps_source_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "GET /x HTTP/1.1\n\nHTTP/1.1 500 Internal Server Error\n");

        let yaml = r#"
- id: inline
  request: { method: GET, path: /x }
  response: { status: 200 }
"#;
        let stubs: Vec<StubDefinition> = serde_yaml::from_str(yaml).unwrap();
        let sources: Vec<Arc<dyn RecordingSource>> = vec![
            Arc::new(StubSource::new(stubs)),
            Arc::new(DirectorySource::new(dir.path())),
        ];

        let catalog = load_all(&sources).await.unwrap();
        let statuses: Vec<_> = catalog
            .pairs(Method::Get)
            .iter()
            .map(|p| p.response.status)
            .collect();
        assert_eq!(statuses, [200, 500]);
    }
}
