//! 学习进度备份与恢复（memory-progress/v1）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::PROGRESS_SCHEMA;
use crate::srs::EngineError;
use crate::store::operations::card_states::CardStateRecord;
use crate::store::operations::cards::Card;
use crate::store::operations::confusions::ConfusionPair;
use crate::store::operations::datasets::DatasetMeta;
use crate::store::operations::progress::ProgressBatch;
use crate::store::operations::reviews::Review;
use crate::store::operations::settings::Settings;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetBackup {
    pub meta: DatasetMeta,
    #[serde(default)]
    pub cards: Vec<Card>,
    #[serde(default)]
    pub card_states: Vec<CardStateRecord>,
    #[serde(default)]
    pub confusion_pairs: Vec<ConfusionPair>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDocument {
    pub schema: String,
    pub exported_at: DateTime<Utc>,
    pub datasets: Vec<DatasetBackup>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSummary {
    pub datasets: usize,
    pub cards: usize,
    pub card_states: usize,
    pub confusion_pairs: usize,
    pub reviews: usize,
}

pub fn export_progress(store: &Store, now: DateTime<Utc>) -> Result<ProgressDocument, EngineError> {
    let mut datasets = Vec::new();
    for meta in store.list_datasets()? {
        let id = meta.dataset_id.clone();
        datasets.push(DatasetBackup {
            meta,
            cards: store.list_cards(&id)?,
            card_states: store.list_card_states(&id)?,
            confusion_pairs: store.list_confusions(&id)?,
        });
    }

    Ok(ProgressDocument {
        schema: PROGRESS_SCHEMA.to_string(),
        exported_at: now,
        datasets,
        reviews: store.list_all_reviews()?,
        settings: store.get_settings()?,
    })
}

/// Restores a progress backup. Without `merge` the stored data is replaced;
/// with it records are upserted over what is already stored. Either way the
/// restore is all-or-nothing.
pub fn import_progress(store: &Store, raw: &Value, merge: bool) -> Result<RestoreSummary, EngineError> {
    match raw.get("schema").and_then(Value::as_str) {
        Some(PROGRESS_SCHEMA) => {}
        _ => {
            return Err(EngineError::Validation(format!(
                "schema must be {PROGRESS_SCHEMA}"
            )))
        }
    }
    let doc: ProgressDocument = serde_json::from_value(raw.clone())
        .map_err(|e| EngineError::Validation(format!("invalid progress backup: {e}")))?;

    let mut batch = ProgressBatch::default();
    let mut summary = RestoreSummary::default();
    for backup in &doc.datasets {
        let dataset_id = &backup.meta.dataset_id;
        let foreign = backup
            .cards
            .iter()
            .map(|c| (&c.dataset_id, &c.card_id))
            .chain(backup.card_states.iter().map(|s| (&s.dataset_id, &s.card_id)))
            .find(|(owner, _)| *owner != dataset_id);
        if let Some((owner, card_id)) = foreign {
            return Err(EngineError::Validation(format!(
                "card {card_id} belongs to dataset {owner}, listed under {dataset_id}"
            )));
        }

        batch.push_dataset(&backup.meta)?;
        for card in &backup.cards {
            batch.push_card(card)?;
        }
        for state in &backup.card_states {
            batch.push_card_state(state)?;
        }
        for pair in &backup.confusion_pairs {
            batch.push_confusion(pair)?;
        }
        summary.datasets += 1;
        summary.cards += backup.cards.len();
        summary.card_states += backup.card_states.len();
        summary.confusion_pairs += backup.confusion_pairs.len();
    }
    for review in &doc.reviews {
        batch.push_review(review)?;
    }
    summary.reviews = doc.reviews.len();
    batch.set_settings(&doc.settings)?;

    // 所有 key 校验通过后才动存储；覆盖模式的清空与写入同在一个事务里
    store.apply_progress(&batch, !merge)?;

    tracing::info!(
        merge,
        datasets = summary.datasets,
        cards = summary.cards,
        reviews = summary.reviews,
        "Progress restored"
    );
    Ok(summary)
}
