use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Transactional;

use crate::store::keys;
use crate::store::operations::cards::Card;
use crate::store::{map_tx_error, Store, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMeta {
    pub dataset_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub imported_at: DateTime<Utc>,
    pub schema: String,
}

impl Store {
    pub fn get_dataset_meta(&self, dataset_id: &str) -> Result<Option<DatasetMeta>, StoreError> {
        let key = keys::dataset_key(dataset_id)?;
        match self.datasets.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Newest import first.
    pub fn list_datasets(&self) -> Result<Vec<DatasetMeta>, StoreError> {
        let mut out = Vec::new();
        for item in self.datasets.iter() {
            let (_, v) = item?;
            out.push(Self::deserialize::<DatasetMeta>(&v)?);
        }
        out.sort_by(|a, b| b.imported_at.cmp(&a.imported_at));
        Ok(out)
    }

    pub fn put_dataset_meta(&self, meta: &DatasetMeta) -> Result<(), StoreError> {
        let key = keys::dataset_key(&meta.dataset_id)?;
        self.datasets.insert(key.as_bytes(), Self::serialize(meta)?)?;
        Ok(())
    }

    /// Writes dataset metadata and replaces the dataset's cards in a single
    /// transaction. Cards missing from `cards` are removed; card states are
    /// left alone.
    pub fn replace_dataset(&self, meta: &DatasetMeta, cards: &[Card]) -> Result<(), StoreError> {
        let meta_key = keys::dataset_key(&meta.dataset_id)?;
        let meta_bytes = Self::serialize(meta)?;

        let mut card_rows = Vec::with_capacity(cards.len());
        let mut incoming = HashSet::with_capacity(cards.len());
        for card in cards {
            if card.dataset_id != meta.dataset_id {
                return Err(StoreError::Validation(format!(
                    "card {} belongs to dataset {}, expected {}",
                    card.card_id, card.dataset_id, meta.dataset_id
                )));
            }
            let key = keys::card_key(&card.dataset_id, &card.card_id)?;
            incoming.insert(key.clone());
            card_rows.push((key, Self::serialize(card)?));
        }

        let prefix = keys::dataset_prefix(&meta.dataset_id)?;
        let mut stale = Vec::new();
        for item in self.cards.scan_prefix(prefix.as_bytes()) {
            let (k, _) = item?;
            if !incoming.contains(&*String::from_utf8_lossy(&k)) {
                stale.push(k.to_vec());
            }
        }

        (&self.datasets, &self.cards)
            .transaction(|(tx_datasets, tx_cards)| {
                tx_datasets.insert(meta_key.as_bytes(), meta_bytes.as_slice())?;
                for key in &stale {
                    tx_cards.remove(key.as_slice())?;
                }
                for (key, bytes) in &card_rows {
                    tx_cards.insert(key.as_bytes(), bytes.as_slice())?;
                }
                Ok(())
            })
            .map_err(map_tx_error)?;

        tracing::info!(
            dataset_id = %meta.dataset_id,
            cards = cards.len(),
            removed = stale.len(),
            "Dataset replaced"
        );
        Ok(())
    }
}
