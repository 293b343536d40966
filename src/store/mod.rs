pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub datasets: sled::Tree,
    pub cards: sled::Tree,
    pub card_states: sled::Tree,
    pub reviews: sled::Tree,
    pub confusion_pairs: sled::Tree,
    pub settings: sled::Tree,
    pub meta: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let tree = |name: &str| db.open_tree(name);

        Ok(Self {
            datasets: tree(trees::DATASETS)?,
            cards: tree(trees::CARDS)?,
            card_states: tree(trees::CARD_STATES)?,
            reviews: tree(trees::REVIEWS)?,
            confusion_pairs: tree(trees::CONFUSION_PAIRS)?,
            settings: tree(trees::SETTINGS)?,
            meta: tree(trees::META)?,
            db,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Bulk data wipe. Clears every data tree; the schema version in `meta`
    /// survives so migrations are not re-run against an empty store.
    pub fn wipe_all(&self) -> Result<(), StoreError> {
        for tree in [
            &self.datasets,
            &self.cards,
            &self.card_states,
            &self.reviews,
            &self.confusion_pairs,
            &self.settings,
        ] {
            tree.clear()?;
        }
        tracing::warn!("All study data wiped");
        Ok(())
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub(crate) fn scan_dataset<T: DeserializeOwned>(
        tree: &sled::Tree,
        dataset_id: &str,
    ) -> Result<Vec<T>, StoreError> {
        let prefix = keys::dataset_prefix(dataset_id)?;
        let mut out = Vec::new();
        for item in tree.scan_prefix(prefix.as_bytes()) {
            let (_, v) = item?;
            out.push(Self::deserialize(&v)?);
        }
        Ok(out)
    }
}

pub(crate) fn map_tx_error(error: sled::transaction::TransactionError<StoreError>) -> StoreError {
    match error {
        sled::transaction::TransactionError::Abort(store_error) => store_error,
        sled::transaction::TransactionError::Storage(storage_error) => {
            StoreError::Sled(storage_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn wipe_keeps_schema_version() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        store.run_migrations().unwrap();
        store.cards.insert("d1:c1", b"{}".as_slice()).unwrap();

        store.wipe_all().unwrap();

        assert!(store.cards.is_empty());
        assert_eq!(migrate::get_current_version(&store).unwrap(), migrate::latest_version());
    }
}
