use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Result;
use crate::types::{Temperature, ZoneId};

pub const STORAGE_KEY: &str = "uponorx265_data";
pub const STORAGE_VERSION: u32 = 1;

/// Zone id -> last setpoint in Celsius.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SavedSetpoints(BTreeMap<String, f64>);

impl SavedSetpoints {
    pub fn get(&self, zone: &ZoneId) -> Option<Temperature> {
        self.0
            .get(&zone.to_string())
            .copied()
            .map(Temperature::from_celsius)
    }

    pub fn set(&mut self, zone: &ZoneId, temp: Temperature) {
        self.0.insert(zone.to_string(), temp.celsius());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[async_trait]
pub trait SetpointStore: Send + Sync {
    /// `None` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<SavedSetpoints>>;
    async fn save(&self, data: &SavedSetpoints) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    version: u32,
    key: String,
    data: SavedSetpoints,
}

/// Versioned JSON document on disk, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct FileSetpointStore {
    path: PathBuf,
}

impl FileSetpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SetpointStore for FileSetpointStore {
    async fn load(&self) -> Result<Option<SavedSetpoints>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let doc: StoredDocument = serde_json::from_slice(&bytes)?;
        if doc.version > STORAGE_VERSION {
            warn!(
                path = %self.path.display(),
                version = doc.version,
                "saved setpoints written by a newer version, ignoring"
            );
            return Ok(None);
        }
        debug!(path = %self.path.display(), zones = doc.data.len(), "loaded saved setpoints");
        Ok(Some(doc.data))
    }

    async fn save(&self, data: &SavedSetpoints) -> Result<()> {
        let doc = StoredDocument {
            version: STORAGE_VERSION,
            key: STORAGE_KEY.to_string(),
            data: data.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), zones = data.len(), "saved setpoints");
        Ok(())
    }
}

/// Keeps saved setpoints for the life of the process only.
#[derive(Debug, Default)]
pub struct MemorySetpointStore {
    data: Mutex<Option<SavedSetpoints>>,
}

impl MemorySetpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: SavedSetpoints) -> Self {
        Self {
            data: Mutex::new(Some(data)),
        }
    }

    pub fn snapshot(&self) -> Option<SavedSetpoints> {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SetpointStore for MemorySetpointStore {
    async fn load(&self) -> Result<Option<SavedSetpoints>> {
        Ok(self.snapshot())
    }

    async fn save(&self, data: &SavedSetpoints) -> Result<()> {
        *self.data.lock().unwrap_or_else(PoisonError::into_inner) = Some(data.clone());
        Ok(())
    }
}

#[async_trait]
impl<T: SetpointStore + ?Sized> SetpointStore for std::sync::Arc<T> {
    async fn load(&self) -> Result<Option<SavedSetpoints>> {
        (**self).load().await
    }

    async fn save(&self, data: &SavedSetpoints) -> Result<()> {
        (**self).save(data).await
    }
}
