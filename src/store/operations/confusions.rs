use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

/// Canonical key for an unordered pair of cards within a dataset.
///
/// The smaller card id is always `card_a`, so (A, B) and (B, A) address the
/// same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfusionPairKey {
    dataset_id: String,
    card_a: String,
    card_b: String,
}

impl ConfusionPairKey {
    pub fn new(dataset_id: &str, x: &str, y: &str) -> Result<Self, StoreError> {
        if x == y {
            return Err(StoreError::Validation(format!(
                "a card cannot be confused with itself: {x}"
            )));
        }
        let (card_a, card_b) = if x < y { (x, y) } else { (y, x) };
        Ok(Self {
            dataset_id: dataset_id.to_string(),
            card_a: card_a.to_string(),
            card_b: card_b.to_string(),
        })
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn card_a(&self) -> &str {
        &self.card_a
    }

    pub fn card_b(&self) -> &str {
        &self.card_b
    }

    pub(crate) fn storage_key(&self) -> Result<String, StoreError> {
        keys::confusion_pair_key(&self.dataset_id, &self.card_a, &self.card_b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfusionPair {
    pub dataset_id: String,
    pub card_a: String,
    pub card_b: String,
    pub score: u64,
}

impl ConfusionPair {
    pub(crate) fn zeroed(key: &ConfusionPairKey) -> Self {
        Self {
            dataset_id: key.dataset_id.clone(),
            card_a: key.card_a.clone(),
            card_b: key.card_b.clone(),
            score: 0,
        }
    }

    pub fn key(&self) -> Result<ConfusionPairKey, StoreError> {
        ConfusionPairKey::new(&self.dataset_id, &self.card_a, &self.card_b)
    }
}

impl Store {
    pub fn get_confusion(&self, key: &ConfusionPairKey) -> Result<Option<ConfusionPair>, StoreError> {
        let storage_key = key.storage_key()?;
        match self.confusion_pairs.get(storage_key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Upserts a zero-initialised pair and increments its score.
    pub fn bump_confusion(&self, key: &ConfusionPairKey) -> Result<ConfusionPair, StoreError> {
        let storage_key = key.storage_key()?;
        let mut last_error = None;

        let updated = self.confusion_pairs.update_and_fetch(storage_key.as_bytes(), |old| {
            let mut pair = match old.map(Self::deserialize::<ConfusionPair>) {
                Some(Ok(pair)) => pair,
                Some(Err(error)) => {
                    tracing::warn!(error = %error, "Corrupt confusion pair record, resetting");
                    ConfusionPair::zeroed(key)
                }
                None => ConfusionPair::zeroed(key),
            };
            pair.score += 1;
            match Self::serialize(&pair) {
                Ok(bytes) => Some(bytes),
                Err(error) => {
                    last_error = Some(error);
                    old.map(|raw| raw.to_vec())
                }
            }
        })?;

        if let Some(error) = last_error {
            return Err(error);
        }
        let raw = updated.ok_or_else(|| StoreError::NotFound {
            entity: "confusion_pair".to_string(),
            key: storage_key.clone(),
        })?;
        Self::deserialize(&raw)
    }

    pub fn list_confusions(&self, dataset_id: &str) -> Result<Vec<ConfusionPair>, StoreError> {
        Self::scan_dataset(&self.confusion_pairs, dataset_id)
    }
}
