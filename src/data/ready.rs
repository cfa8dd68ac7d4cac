//! Readiness of the dataset
//!
//! The dataset is loaded once, possibly while other startup work runs.
//! Consumers hold a [`DatasetReady`] and await it; the loader resolves it
//! exactly once.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use super::{BibleData, BibleError};

/// Creates a linked loader/readiness pair
pub fn dataset_channel() -> (DatasetLoader, DatasetReady) {
    let (tx, rx) = watch::channel(None);
    (DatasetLoader { tx }, DatasetReady { rx })
}

/// Loads the dataset file on a background task
///
/// If loading fails the loader is dropped and every waiter gets
/// [`BibleError::DatasetUnavailable`].
pub fn spawn_load(path: PathBuf) -> DatasetReady {
    let (loader, ready) = dataset_channel();
    tokio::spawn(async move {
        match BibleData::load(&path).await {
            Ok(data) => {
                info!(path = %path.display(), version = data.version(), "Bible dataset loaded");
                loader.resolve(data);
            }
            Err(e) => error!(path = %path.display(), error = %e, "Failed to load Bible dataset"),
        }
    });
    ready
}

/// Resolving half of the readiness pair
#[derive(Debug)]
pub struct DatasetLoader {
    tx: watch::Sender<Option<Arc<BibleData>>>,
}

impl DatasetLoader {
    /// Publishes the loaded dataset to every current and future waiter
    pub fn resolve(self, data: BibleData) -> Arc<BibleData> {
        let data = Arc::new(data);
        self.tx.send_replace(Some(Arc::clone(&data)));
        data
    }
}

/// Awaitable handle to the dataset
#[derive(Debug, Clone)]
pub struct DatasetReady {
    rx: watch::Receiver<Option<Arc<BibleData>>>,
}

impl DatasetReady {
    /// A handle that is already resolved
    pub fn resolved(data: BibleData) -> Self {
        let (loader, ready) = dataset_channel();
        loader.resolve(data);
        ready
    }

    /// Waits until the dataset is loaded
    ///
    /// Fails with [`BibleError::DatasetUnavailable`] if the loader went away
    /// without resolving.
    pub async fn wait(&self) -> Result<Arc<BibleData>, BibleError> {
        let mut rx = self.rx.clone();
        let current = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| BibleError::DatasetUnavailable)?;
        Option::clone(&current).ok_or(BibleError::DatasetUnavailable)
    }

    /// The dataset if it is already loaded
    pub fn try_get(&self) -> Option<Arc<BibleData>> {
        self.rx.borrow().clone()
    }
}
