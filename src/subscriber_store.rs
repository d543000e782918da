use async_trait::async_trait;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::domain::SubscriberEmail;

#[derive(thiserror::Error, Debug)]
pub enum SubscriberStoreError {
    #[error("Failed to serialize the subscriber list.")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to read the subscriber list from {path}.")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("The subscriber list in {path} is not a JSON array of addresses.")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write the subscriber list to {path}.")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Durable, insertion-ordered list of unique subscribers.
///
/// `load` never fails: missing or unreadable storage is an empty list.
/// Writes surface their failures so the subscription flow can report them,
/// and `add` refuses to build on top of a list it could not read.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    async fn load(&self) -> Vec<SubscriberEmail>;

    async fn save(&self, subscribers: &[SubscriberEmail]) -> Result<(), SubscriberStoreError>;

    /// Appends `email` unless it is already stored. Returns whether it was new.
    async fn add(&self, email: SubscriberEmail) -> Result<bool, SubscriberStoreError>;

    async fn count(&self) -> usize {
        self.load().await.len()
    }
}

/// Subscribers kept as a pretty-printed JSON array of addresses.
pub struct JsonFileSubscriberStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileSubscriberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Strict read: only a missing file counts as an empty list.
    async fn read(&self) -> Result<Vec<SubscriberEmail>, SubscriberStoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No subscriber file yet");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(SubscriberStoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let entries: Vec<String> =
            serde_json::from_str(&content).map_err(|source| SubscriberStoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        let mut seen = HashSet::new();

        Ok(entries
            .into_iter()
            .filter_map(|entry| match SubscriberEmail::parse(entry) {
                Ok(email) => Some(email),
                Err(err) => {
                    tracing::warn!(error.message = %err, "Skipping an invalid stored subscriber");
                    None
                }
            })
            // First occurrence wins
            .filter(|email| seen.insert(email.clone()))
            .collect())
    }

    async fn write(&self, subscribers: &[SubscriberEmail]) -> Result<(), SubscriberStoreError> {
        let content = serde_json::to_string_pretty(subscribers)?;
        let write_error = |source| SubscriberStoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }

        // Write aside then rename, so a crash never leaves a truncated list behind.
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        tokio::fs::write(&staging, content)
            .await
            .map_err(write_error)?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(write_error)
    }
}

#[async_trait]
impl SubscriberStore for JsonFileSubscriberStore {
    #[tracing::instrument(name = "Load subscribers from file", skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Vec<SubscriberEmail> {
        match self.read().await {
            Ok(subscribers) => subscribers,
            Err(err) => {
                tracing::warn!(
                    error.cause_chain = ?err,
                    error.message = %err,
                    "Subscriber file is unusable, treating it as empty"
                );
                Vec::new()
            }
        }
    }

    #[tracing::instrument(name = "Save subscribers to file", skip(self, subscribers), fields(path = %self.path.display()))]
    async fn save(&self, subscribers: &[SubscriberEmail]) -> Result<(), SubscriberStoreError> {
        let _guard = self.write_lock.lock().await;

        self.write(subscribers).await
    }

    #[tracing::instrument(name = "Add a subscriber to file", skip(self), fields(subscriber_email = %email))]
    async fn add(&self, email: SubscriberEmail) -> Result<bool, SubscriberStoreError> {
        let _guard = self.write_lock.lock().await;
        let mut subscribers = self.read().await?;

        if subscribers.contains(&email) {
            return Ok(false);
        }

        subscribers.push(email);
        self.write(&subscribers).await?;

        Ok(true)
    }
}

/// Volatile backend, handy for tests and single-shot runs.
#[derive(Default)]
pub struct InMemorySubscriberStore {
    subscribers: Mutex<Vec<SubscriberEmail>>,
}

impl InMemorySubscriberStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscribers(subscribers: Vec<SubscriberEmail>) -> Self {
        Self {
            subscribers: Mutex::new(subscribers),
        }
    }
}

#[async_trait]
impl SubscriberStore for InMemorySubscriberStore {
    async fn load(&self) -> Vec<SubscriberEmail> {
        self.subscribers.lock().await.clone()
    }

    async fn save(&self, subscribers: &[SubscriberEmail]) -> Result<(), SubscriberStoreError> {
        *self.subscribers.lock().await = subscribers.to_vec();

        Ok(())
    }

    async fn add(&self, email: SubscriberEmail) -> Result<bool, SubscriberStoreError> {
        let mut subscribers = self.subscribers.lock().await;

        if subscribers.contains(&email) {
            return Ok(false);
        }

        subscribers.push(email);

        Ok(true)
    }
}
