use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("Failed to serialize the run ledger.")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write the run ledger to {path}.")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(serde::Serialize, serde::Deserialize)]
struct LedgerEntry {
    last_completed_run: DateTime<Utc>,
}

/// Remembers when the last digest run completed, so a restart across a
/// scheduled trigger can be detected.
pub struct RunLedger {
    path: Option<PathBuf>,
}

impl RunLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A ledger that remembers nothing.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub async fn last_completed_run(&self) -> Option<DateTime<Utc>> {
        let path = self.path.as_ref()?;

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %path.display(), error.message = %err, "Run ledger is unreadable");
                return None;
            }
        };

        match serde_json::from_str::<LedgerEntry>(&content) {
            Ok(entry) => Some(entry.last_completed_run),
            Err(err) => {
                tracing::warn!(path = %path.display(), error.message = %err, "Run ledger is corrupt");
                None
            }
        }
    }

    pub async fn record(&self, completed_run: DateTime<Utc>) -> Result<(), LedgerError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(&LedgerEntry {
            last_completed_run: completed_run,
        })?;
        let write_error = |source| LedgerError::Write {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }

        tokio::fs::write(path, content).await.map_err(write_error)
    }
}
