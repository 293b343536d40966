use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

/// Teaching content. Written at import time and never mutated afterwards;
/// a re-import replaces the dataset's cards wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub dataset_id: String,
    pub card_id: String,
    #[serde(default)]
    pub topic: Option<String>,
    pub question: String,
    pub answers: Vec<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Store {
    pub fn get_card(&self, dataset_id: &str, card_id: &str) -> Result<Option<Card>, StoreError> {
        let key = keys::card_key(dataset_id, card_id)?;
        match self.cards.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// All cards of a dataset in key order, which is the dataset's natural
    /// iteration order for due-queue building and confusion detection.
    pub fn list_cards(&self, dataset_id: &str) -> Result<Vec<Card>, StoreError> {
        Self::scan_dataset(&self.cards, dataset_id)
    }

    pub fn count_cards(&self, dataset_id: &str) -> Result<usize, StoreError> {
        let prefix = keys::dataset_prefix(dataset_id)?;
        let mut count = 0usize;
        for item in self.cards.scan_prefix(prefix.as_bytes()) {
            let _ = item?;
            count += 1;
        }
        Ok(count)
    }

    pub fn put_card(&self, card: &Card) -> Result<(), StoreError> {
        let key = keys::card_key(&card.dataset_id, &card.card_id)?;
        self.cards.insert(key.as_bytes(), Self::serialize(card)?)?;
        Ok(())
    }
}
