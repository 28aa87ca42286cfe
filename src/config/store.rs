use async_trait::async_trait;
use log::{ debug, info };
use serde::{ Deserialize, Serialize };
use serde_json::{ Map, Value };
use std::collections::HashMap;
use std::fmt;
use std::path::{ Path, PathBuf };
use thiserror::Error;
use tokio::sync::{ broadcast, RwLock };

const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings file IO error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file '{path}' is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    /// Follows the user across devices: credentials, model, prompts.
    Sync,
    /// Stays on this device: chat history, UI preferences.
    Local,
}

impl StorageArea {
    fn file_name(self) -> &'static str {
        match self {
            StorageArea::Sync => "sync.json",
            StorageArea::Local => "local.json",
        }
    }
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageArea::Sync => write!(f, "sync"),
            StorageArea::Local => write!(f, "local"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StorageChange {
    pub area: StorageArea,
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the subset of `keys` that are present.
    async fn get(&self, area: StorageArea, keys: &[&str]) -> Result<Map<String, Value>, StoreError>;

    async fn get_all(&self, area: StorageArea) -> Result<Map<String, Value>, StoreError>;

    async fn set(&self, area: StorageArea, items: Map<String, Value>) -> Result<(), StoreError>;

    async fn remove(&self, area: StorageArea, keys: &[&str]) -> Result<(), StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

#[derive(Default)]
struct Areas {
    data: HashMap<StorageArea, Map<String, Value>>,
}

impl Areas {
    fn area(&self, area: StorageArea) -> Option<&Map<String, Value>> {
        self.data.get(&area)
    }

    fn pick(&self, area: StorageArea, keys: &[&str]) -> Map<String, Value> {
        let mut out = Map::new();
        if let Some(values) = self.area(area) {
            for key in keys {
                if let Some(value) = values.get(*key) {
                    out.insert((*key).to_string(), value.clone());
                }
            }
        }
        out
    }

    fn apply_set(&mut self, area: StorageArea, items: Map<String, Value>) -> Vec<StorageChange> {
        let values = self.data.entry(area).or_default();
        let mut changes = Vec::new();
        for (key, new_value) in items {
            let old_value = values.insert(key.clone(), new_value.clone());
            if old_value.as_ref() != Some(&new_value) {
                changes.push(StorageChange {
                    area,
                    key,
                    old_value,
                    new_value: Some(new_value),
                });
            }
        }
        changes
    }

    fn apply_remove(&mut self, area: StorageArea, keys: &[&str]) -> Vec<StorageChange> {
        let mut changes = Vec::new();
        if let Some(values) = self.data.get_mut(&area) {
            for key in keys {
                if let Some(old_value) = values.remove(*key) {
                    changes.push(StorageChange {
                        area,
                        key: (*key).to_string(),
                        old_value: Some(old_value),
                        new_value: None,
                    });
                }
            }
        }
        changes
    }
}

fn publish(sender: &broadcast::Sender<StorageChange>, changes: Vec<StorageChange>) {
    for change in changes {
        debug!("Storage changed: {}.{}", change.area, change.key);
        // No subscribers is fine.
        let _ = sender.send(change);
    }
}

/// Process-local store, used by tests and one-shot commands.
pub struct MemoryStore {
    areas: RwLock<Areas>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            areas: RwLock::new(Areas::default()),
            changes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, area: StorageArea, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        Ok(self.areas.read().await.pick(area, keys))
    }

    async fn get_all(&self, area: StorageArea) -> Result<Map<String, Value>, StoreError> {
        Ok(self.areas.read().await.area(area).cloned().unwrap_or_default())
    }

    async fn set(&self, area: StorageArea, items: Map<String, Value>) -> Result<(), StoreError> {
        let changes = self.areas.write().await.apply_set(area, items);
        publish(&self.changes, changes);
        Ok(())
    }

    async fn remove(&self, area: StorageArea, keys: &[&str]) -> Result<(), StoreError> {
        let changes = self.areas.write().await.apply_remove(area, keys);
        publish(&self.changes, changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

/// One JSON file per area inside `dir`, rewritten on every write.
pub struct JsonFileStore {
    dir: PathBuf,
    areas: RwLock<Areas>,
    changes: broadcast::Sender<StorageChange>,
}

impl JsonFileStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await
            .map_err(|source| StoreError::Io { path: dir.clone(), source })?;

        let mut areas = Areas::default();
        for area in [StorageArea::Sync, StorageArea::Local] {
            let values = read_area_file(&dir.join(area.file_name())).await?;
            areas.data.insert(area, values);
        }
        info!("Settings store opened at {}", dir.display());

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            dir,
            areas: RwLock::new(areas),
            changes,
        })
    }

    async fn persist(&self, area: StorageArea, values: &Map<String, Value>) -> Result<(), StoreError> {
        let path = self.dir.join(area.file_name());
        let body = serde_json::to_string_pretty(values)
            .map_err(|source| StoreError::Json { path: path.clone(), source })?;
        tokio::fs::write(&path, body).await
            .map_err(|source| StoreError::Io { path, source })
    }
}

async fn read_area_file(path: &Path) -> Result<Map<String, Value>, StoreError> {
    let body = match tokio::fs::read_to_string(path).await {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(source) => return Err(StoreError::Io { path: path.to_path_buf(), source }),
    };
    if body.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str(&body)
        .map_err(|source| StoreError::Json { path: path.to_path_buf(), source })
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, area: StorageArea, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        Ok(self.areas.read().await.pick(area, keys))
    }

    async fn get_all(&self, area: StorageArea) -> Result<Map<String, Value>, StoreError> {
        Ok(self.areas.read().await.area(area).cloned().unwrap_or_default())
    }

    async fn set(&self, area: StorageArea, items: Map<String, Value>) -> Result<(), StoreError> {
        let mut areas = self.areas.write().await;
        let changes = areas.apply_set(area, items);
        if let Some(values) = areas.area(area) {
            self.persist(area, values).await?;
        }
        drop(areas);
        publish(&self.changes, changes);
        Ok(())
    }

    async fn remove(&self, area: StorageArea, keys: &[&str]) -> Result<(), StoreError> {
        let mut areas = self.areas.write().await;
        let changes = areas.apply_remove(area, keys);
        if !changes.is_empty() {
            if let Some(values) = areas.area(area) {
                self.persist(area, values).await?;
            }
        }
        drop(areas);
        publish(&self.changes, changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
