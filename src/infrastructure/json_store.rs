use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::application::{AppError, AppResult, SessionTokenStore, SnapshotStore};
use crate::domain::{Heartbeat, Snapshot};

/// Snapshot and heartbeat as pretty JSON files under one directory.
///
/// Layout:
/// - `last_snapshot.json` – `{timestamp, especialidades: [..]}`
/// - `heartbeat.json` – `{last_run, status}`
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub async fn new(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Storage(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("last_snapshot.json")
    }

    fn heartbeat_path(&self) -> PathBuf {
        self.dir.join("heartbeat.json")
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load_snapshot(&self) -> AppResult<Option<Snapshot>> {
        read_json(&self.snapshot_path()).await
    }

    async fn save_snapshot(&self, snapshot: &Snapshot) -> AppResult<()> {
        write_json(&self.snapshot_path(), snapshot).await
    }

    async fn load_heartbeat(&self) -> AppResult<Option<Heartbeat>> {
        read_json(&self.heartbeat_path()).await
    }

    async fn save_heartbeat(&self, heartbeat: &Heartbeat) -> AppResult<()> {
        write_json(&self.heartbeat_path(), heartbeat).await
    }
}

/// Session token kept as a single-line text file.
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionTokenStore for TokenFile {
    async fn load(&self) -> AppResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!("read {}: {e}", self.path.display()))),
        }
    }

    async fn save(&self, token: &str) -> AppResult<()> {
        replace_file(&self.path, token.trim().as_bytes()).await
    }
}

/// Missing, empty or corrupt files read as `None`.
async fn read_json<T: DeserializeOwned>(path: &Path) -> AppResult<Option<T>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(r) => r,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AppError::Storage(format!("read {}: {e}", path.display()))),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str(&raw) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt state file, starting over");
            Ok(None)
        }
    }
}

async fn write_json<T: Serialize + Sync>(path: &Path, value: &T) -> AppResult<()> {
    let body = serde_json::to_vec_pretty(value).map_err(|e| AppError::Storage(e.to_string()))?;
    replace_file(path, &body).await
}

/// Write to a sibling temp file then rename over the target.
async fn replace_file(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| AppError::Storage(format!("write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| AppError::Storage(format!("rename {}: {e}", path.display())))?;
    Ok(())
}
