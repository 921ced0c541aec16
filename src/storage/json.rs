use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{Repository, StorageError, Subscription};

const SUBSCRIPTIONS_FILE: &str = "feeds.json";
const CONTENTS_DIR: &str = "contents";

/// Repository backed by a data directory:
///
/// ```text
/// <root>/feeds.json          subscription records
/// <root>/contents/<file>     last fetched copy of each feed
/// ```
///
/// Every write goes through a temporary file and an atomic rename, so a
/// crash never leaves a half-written `feeds.json` behind.
#[derive(Debug)]
pub struct JsonRepository {
    root: PathBuf,
    /// Serializes read-modify-write cycles on `feeds.json`
    write_lock: Mutex<()>,
}

impl JsonRepository {
    /// Opens (creating if needed) the data directory at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join(CONTENTS_DIR)).await?;

        let repo = Self {
            root,
            write_lock: Mutex::new(()),
        };

        if !tokio::fs::try_exists(repo.subscriptions_path()).await? {
            tracing::info!(path = %repo.root.display(), "Initializing subscriptions file");
            atomic_write(&repo.subscriptions_path(), b"[]").await?;
        }

        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn subscriptions_path(&self) -> PathBuf {
        self.root.join(SUBSCRIPTIONS_FILE)
    }

    /// SEC-008: Resolve a content name, rejecting anything but a plain file name.
    fn content_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(CONTENTS_DIR).join(name)),
            _ => Err(StorageError::InvalidContentName(name.to_owned())),
        }
    }

    async fn read_all(&self) -> Result<Vec<Subscription>, StorageError> {
        let raw = tokio::fs::read_to_string(self.subscriptions_path()).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn write_all(&self, subscriptions: &[Subscription]) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(subscriptions)?;
        atomic_write(&self.subscriptions_path(), &json).await
    }
}

#[async_trait]
impl Repository for JsonRepository {
    async fn list(&self) -> Result<Vec<Subscription>, StorageError> {
        self.read_all().await
    }

    async fn put(&self, subscription: Subscription) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut subscriptions = self.read_all().await?;

        match subscriptions.iter_mut().find(|sub| sub.id == subscription.id) {
            Some(existing) => *existing = subscription,
            None => subscriptions.push(subscription),
        }

        self.write_all(&subscriptions).await
    }

    async fn remove(&self, id: &str) -> Result<Subscription, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut subscriptions = self.read_all().await?;

        let index = subscriptions
            .iter()
            .position(|sub| sub.id == id)
            .ok_or_else(|| StorageError::NotFound(id.to_owned()))?;
        let removed = subscriptions.remove(index);

        self.write_all(&subscriptions).await?;
        Ok(removed)
    }

    async fn read_content(&self, subscription: &Subscription) -> Result<String, StorageError> {
        let path = self.content_path(&subscription.read_from)?;
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn write_content(&self, subscription: &Subscription, xml: &str) -> Result<(), StorageError> {
        let path = self.content_path(&subscription.read_from)?;
        atomic_write(&path, xml.as_bytes()).await
    }

    async fn remove_content(&self, subscription: &Subscription) -> Result<(), StorageError> {
        let path = self.content_path(&subscription.read_from)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Content file already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Writes `bytes` to `dst` via a uniquely named temp file and a rename.
async fn atomic_write(dst: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    // SEC-009: Unpredictable temp name, created with create_new
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{suffix:016x}"));

    let result = async {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp_path, dst).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}
