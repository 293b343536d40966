use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Transactional;

use crate::store::keys;
use crate::store::operations::card_states::CardStateRecord;
use crate::store::operations::confusions::{ConfusionPair, ConfusionPairKey};
use crate::store::{map_tx_error, Store, StoreError};

/// Append-only review log entry. Kept for analytics and backup; the
/// scheduler never reads it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub dataset_id: String,
    pub card_id: String,
    pub reviewed_at: DateTime<Utc>,
    pub correct: bool,
    pub rating: u8,
    pub response_ms: u64,
    pub answer_raw: String,
}

impl Store {
    pub fn append_review(&self, review: &Review) -> Result<(), StoreError> {
        let key = keys::review_key(
            &review.dataset_id,
            review.reviewed_at.timestamp_millis(),
            &review.id,
        )?;
        self.reviews.insert(key.as_bytes(), Self::serialize(review)?)?;
        Ok(())
    }

    /// Newest first.
    pub fn list_reviews(&self, dataset_id: &str, limit: usize) -> Result<Vec<Review>, StoreError> {
        let prefix = keys::dataset_prefix(dataset_id)?;
        let mut out = Vec::new();
        for item in self.reviews.scan_prefix(prefix.as_bytes()).take(limit) {
            let (_, v) = item?;
            out.push(Self::deserialize(&v)?);
        }
        Ok(out)
    }

    pub fn list_all_reviews(&self) -> Result<Vec<Review>, StoreError> {
        let mut out = Vec::new();
        for item in self.reviews.iter() {
            let (_, v) = item?;
            out.push(Self::deserialize(&v)?);
        }
        Ok(out)
    }

    /// Commits one grading step atomically: the new card state, the review
    /// log entry and, when a confusion was detected, the pair bump.
    pub fn commit_review(
        &self,
        state: &CardStateRecord,
        review: &Review,
        confusion: Option<&ConfusionPairKey>,
    ) -> Result<Option<ConfusionPair>, StoreError> {
        let state_key = keys::card_state_key(&state.dataset_id, &state.card_id)?;
        let state_bytes = Self::serialize(state)?;
        let review_key = keys::review_key(
            &review.dataset_id,
            review.reviewed_at.timestamp_millis(),
            &review.id,
        )?;
        let review_bytes = Self::serialize(review)?;
        let confusion_key = confusion.map(|k| k.storage_key()).transpose()?;

        let bumped = (&self.card_states, &self.reviews, &self.confusion_pairs)
            .transaction(|(tx_states, tx_reviews, tx_confusions)| {
                tx_states.insert(state_key.as_bytes(), state_bytes.as_slice())?;
                tx_reviews.insert(review_key.as_bytes(), review_bytes.as_slice())?;

                let (Some(pair_key), Some(storage_key)) = (confusion, &confusion_key) else {
                    return Ok(None);
                };

                let mut pair = match tx_confusions.get(storage_key.as_bytes())? {
                    Some(raw) => serde_json::from_slice::<ConfusionPair>(&raw).map_err(|error| {
                        sled::transaction::ConflictableTransactionError::Abort(
                            StoreError::Serialization(error),
                        )
                    })?,
                    None => ConfusionPair::zeroed(pair_key),
                };
                pair.score += 1;
                let pair_bytes = serde_json::to_vec(&pair).map_err(|error| {
                    sled::transaction::ConflictableTransactionError::Abort(
                        StoreError::Serialization(error),
                    )
                })?;
                tx_confusions.insert(storage_key.as_bytes(), pair_bytes)?;

                Ok(Some(pair))
            })
            .map_err(map_tx_error)?;

        Ok(bumped)
    }
}
