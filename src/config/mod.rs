pub mod settings;
pub mod store;
pub mod transfer;

use log::info;
use std::path::Path;
use std::sync::Arc;

use self::store::{ JsonFileStore, KeyValueStore, StoreError };

pub async fn initialize_store(dir: &Path) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    info!("Settings will be stored in: {}", dir.display());
    let store = JsonFileStore::open(dir).await?;
    Ok(Arc::new(store))
}
