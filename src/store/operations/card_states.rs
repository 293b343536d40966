use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

/// Persisted per-card scheduling state, keyed by (datasetId, cardId).
///
/// Memory fields are optional on disk: a record written by an older
/// client, or one that picked up `null`s, is still readable. The scheduler
/// decides whether the memory fields are usable; see
/// [`crate::srs::scheduler::MemoryState::from_record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardStateRecord {
    pub dataset_id: String,
    pub card_id: String,
    #[serde(default)]
    pub stability: Option<f64>,
    #[serde(default)]
    pub difficulty: Option<f64>,
    #[serde(default)]
    pub last_review_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reps: u32,
    #[serde(default)]
    pub lapses: u32,
    #[serde(default)]
    pub last_rating: Option<u8>,
    #[serde(default)]
    pub last_response_ms: Option<u64>,
}

impl CardStateRecord {
    pub fn due_at_ms(&self) -> Option<i64> {
        self.due_at.map(|d| d.timestamp_millis())
    }
}

impl Store {
    pub fn get_card_state(
        &self,
        dataset_id: &str,
        card_id: &str,
    ) -> Result<Option<CardStateRecord>, StoreError> {
        let key = keys::card_state_key(dataset_id, card_id)?;
        match self.card_states.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put_card_state(&self, state: &CardStateRecord) -> Result<(), StoreError> {
        let key = keys::card_state_key(&state.dataset_id, &state.card_id)?;
        self.card_states
            .insert(key.as_bytes(), Self::serialize(state)?)?;
        Ok(())
    }

    /// Secondary-index read: every state belonging to a dataset.
    pub fn list_card_states(&self, dataset_id: &str) -> Result<Vec<CardStateRecord>, StoreError> {
        Self::scan_dataset(&self.card_states, dataset_id)
    }
}
