use sled::Transactional;

use crate::store::keys;
use crate::store::operations::card_states::CardStateRecord;
use crate::store::operations::cards::Card;
use crate::store::operations::confusions::ConfusionPair;
use crate::store::operations::datasets::DatasetMeta;
use crate::store::operations::reviews::Review;
use crate::store::operations::settings::Settings;
use crate::store::{map_tx_error, Store, StoreError};

type Row = (String, Vec<u8>);

/// Rows of a progress restore, keyed and serialized up front. Building the
/// batch is where malformed ids are rejected, so nothing is written for a
/// batch that cannot be applied in full.
#[derive(Debug, Default)]
pub struct ProgressBatch {
    datasets: Vec<Row>,
    cards: Vec<Row>,
    card_states: Vec<Row>,
    reviews: Vec<Row>,
    confusion_pairs: Vec<Row>,
    settings: Option<Vec<u8>>,
}

impl ProgressBatch {
    pub fn push_dataset(&mut self, meta: &DatasetMeta) -> Result<(), StoreError> {
        let key = keys::dataset_key(&meta.dataset_id)?;
        self.datasets.push((key, Store::serialize(meta)?));
        Ok(())
    }

    pub fn push_card(&mut self, card: &Card) -> Result<(), StoreError> {
        let key = keys::card_key(&card.dataset_id, &card.card_id)?;
        self.cards.push((key, Store::serialize(card)?));
        Ok(())
    }

    pub fn push_card_state(&mut self, state: &CardStateRecord) -> Result<(), StoreError> {
        let key = keys::card_state_key(&state.dataset_id, &state.card_id)?;
        self.card_states.push((key, Store::serialize(state)?));
        Ok(())
    }

    pub fn push_confusion(&mut self, pair: &ConfusionPair) -> Result<(), StoreError> {
        let key = pair.key()?.storage_key()?;
        self.confusion_pairs.push((key, Store::serialize(pair)?));
        Ok(())
    }

    pub fn push_review(&mut self, review: &Review) -> Result<(), StoreError> {
        let key = keys::review_key(
            &review.dataset_id,
            review.reviewed_at.timestamp_millis(),
            &review.id,
        )?;
        self.reviews.push((key, Store::serialize(review)?));
        Ok(())
    }

    pub fn set_settings(&mut self, settings: &Settings) -> Result<(), StoreError> {
        self.settings = Some(Store::serialize(settings)?);
        Ok(())
    }
}

fn existing_keys(tree: &sled::Tree) -> Result<Vec<sled::IVec>, StoreError> {
    tree.iter()
        .keys()
        .map(|k| k.map_err(StoreError::from))
        .collect()
}

impl Store {
    /// Applies a restore batch in one transaction across every data tree.
    /// With `replace` the current contents are dropped in the same
    /// transaction, so a failed restore leaves the store as it was.
    pub fn apply_progress(&self, batch: &ProgressBatch, replace: bool) -> Result<(), StoreError> {
        let data_trees = [
            &self.datasets,
            &self.cards,
            &self.card_states,
            &self.reviews,
            &self.confusion_pairs,
            &self.settings,
        ];
        let mut stale: [Vec<sled::IVec>; 6] = Default::default();
        if replace {
            for (slot, tree) in stale.iter_mut().zip(data_trees) {
                *slot = existing_keys(tree)?;
            }
        }
        let [stale_datasets, stale_cards, stale_states, stale_reviews, stale_pairs, stale_settings] =
            &stale;

        (
            &self.datasets,
            &self.cards,
            &self.card_states,
            &self.reviews,
            &self.confusion_pairs,
            &self.settings,
        )
            .transaction(|(tx_datasets, tx_cards, tx_states, tx_reviews, tx_pairs, tx_settings)| {
                let targets = [
                    (tx_datasets, stale_datasets, &batch.datasets),
                    (tx_cards, stale_cards, &batch.cards),
                    (tx_states, stale_states, &batch.card_states),
                    (tx_reviews, stale_reviews, &batch.reviews),
                    (tx_pairs, stale_pairs, &batch.confusion_pairs),
                ];
                for (tree, stale_keys, rows) in targets {
                    for key in stale_keys {
                        tree.remove(key.as_ref())?;
                    }
                    for (key, bytes) in rows {
                        tree.insert(key.as_bytes(), bytes.as_slice())?;
                    }
                }
                for key in stale_settings {
                    tx_settings.remove(key.as_ref())?;
                }
                if let Some(bytes) = &batch.settings {
                    tx_settings.insert(keys::SETTINGS_KEY.as_bytes(), bytes.as_slice())?;
                }
                Ok(())
            })
            .map_err(map_tx_error)?;

        tracing::info!(
            replace,
            datasets = batch.datasets.len(),
            cards = batch.cards.len(),
            reviews = batch.reviews.len(),
            "Progress batch applied"
        );
        Ok(())
    }
}
