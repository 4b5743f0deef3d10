//! Resources served straight from the local board database and snapshot files.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;

use super::{
    ResourceError, ResourceProvider, ACCESSIBILITY_SNAPSHOT_URI, ASSIGNMENTS_URI,
    HTML_SNAPSHOT_URI,
};
use crate::board;

pub struct BoardResources {
    db_path: PathBuf,
    snapshot_dir: PathBuf,
}

impl BoardResources {
    pub fn new(db_path: impl Into<PathBuf>, snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            snapshot_dir: snapshot_dir.into(),
        }
    }

    async fn read_assignments(&self) -> Result<String, ResourceError> {
        let db_path = self.db_path.clone();
        if !db_path.exists() {
            return Err(ResourceError::NotFound(format!(
                "{} (database {} missing; run `agile-qa init-db`)",
                ASSIGNMENTS_URI,
                db_path.display()
            )));
        }

        let assignments = tokio::task::spawn_blocking(move || {
            let conn = board::open_read_only(&db_path)?;
            board::load_assignments(&conn)
        })
        .await
        .context("Board query task panicked")??;

        serde_json::to_string(&assignments)
            .map_err(|e| ResourceError::Provider(e.into()))
    }

    async fn read_snapshot_file(&self, uri: &str, file: &str) -> Result<String, ResourceError> {
        let path = self.snapshot_dir.join(file);
        read_optional_file(&path)
            .await?
            .ok_or_else(|| ResourceError::NotFound(format!("{} ({} missing)", uri, path.display())))
    }
}

async fn read_optional_file(path: &Path) -> Result<Option<String>, ResourceError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ResourceError::Provider(
            anyhow::Error::new(e).context(format!("Failed to read {}", path.display())),
        )),
    }
}

#[async_trait]
impl ResourceProvider for BoardResources {
    async fn list_resources(&self) -> Result<Vec<String>, ResourceError> {
        Ok(vec![
            ASSIGNMENTS_URI.to_string(),
            ACCESSIBILITY_SNAPSHOT_URI.to_string(),
            HTML_SNAPSHOT_URI.to_string(),
        ])
    }

    async fn read_resource(&self, uri: &str) -> Result<String, ResourceError> {
        match uri {
            ASSIGNMENTS_URI => self.read_assignments().await,
            ACCESSIBILITY_SNAPSHOT_URI => self.read_snapshot_file(uri, "ui_snapshot.json").await,
            HTML_SNAPSHOT_URI => self.read_snapshot_file(uri, "ui_snapshot.html").await,
            other => Err(ResourceError::NotFound(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceSnapshot;

    #[tokio::test]
    async fn serves_seeded_assignments_as_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("agile_board.db");
        board::init_db(&db).unwrap();

        let provider = BoardResources::new(&db, dir.path().join("snapshots"));
        let raw = provider.read_resource(ASSIGNMENTS_URI).await.unwrap();
        let records: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(records.len(), 9);
        assert_eq!(records[1]["engineer"], "Bob Johnson");
        assert_eq!(records[1]["status"], "Testing");
    }

    #[tokio::test]
    async fn missing_snapshot_files_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = BoardResources::new(dir.path().join("db.sqlite"), dir.path());

        let err = provider.read_resource(HTML_SNAPSHOT_URI).await.unwrap_err();
        assert!(matches!(err, ResourceError::NotFound(_)));
        let err = provider.read_resource(ASSIGNMENTS_URI).await.unwrap_err();
        assert!(err.to_string().contains("init-db"));
    }

    #[tokio::test]
    async fn snapshot_loads_files_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("agile_board.db");
        board::init_db(&db).unwrap();
        let snapshots = dir.path().join("snapshots");
        std::fs::create_dir_all(&snapshots).unwrap();
        std::fs::write(snapshots.join("ui_snapshot.json"), r#"{"role": "WebArea"}"#).unwrap();

        let provider = BoardResources::new(&db, &snapshots);
        let snapshot = ResourceSnapshot::load(&provider).await.unwrap();
        assert_eq!(snapshot.records.len(), 9);
        assert!(snapshot.accessibility.is_some());
        assert!(snapshot.html.is_none());
    }
}
