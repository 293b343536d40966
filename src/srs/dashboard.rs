use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::MAX_CONFUSION_PAIRS;
use crate::srs::queue::{count_due, DueCounts};
use crate::srs::retention::retrievability;
use crate::srs::scheduler::MemoryState;
use crate::srs::EngineError;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfusionSummary {
    pub card_a: String,
    pub card_b: String,
    pub score: u64,
    /// "questionA ↔ questionB"
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub dataset_id: String,
    pub title: String,
    pub due: DueCounts,
    pub average_retrievability: f64,
    pub reviewed_cards: usize,
    pub top_confusions: Vec<ConfusionSummary>,
}

/// Mean current R over cards with a usable memory state; 0 when none.
pub fn average_retrievability(
    store: &Store,
    dataset_id: &str,
    now: DateTime<Utc>,
) -> Result<(f64, usize), EngineError> {
    let values: Vec<f64> = store
        .list_card_states(dataset_id)?
        .iter()
        .filter_map(|state| match MemoryState::from_record(Some(state)) {
            MemoryState::Reviewed {
                stability,
                last_review_at,
                ..
            } => Some(retrievability(now, last_review_at, stability)),
            MemoryState::Fresh => None,
        })
        .collect();

    if values.is_empty() {
        return Ok((0.0, 0));
    }
    Ok((values.iter().sum::<f64>() / values.len() as f64, values.len()))
}

pub fn top_confusions(
    store: &Store,
    dataset_id: &str,
    limit: usize,
) -> Result<Vec<ConfusionSummary>, EngineError> {
    let mut pairs = store.list_confusions(dataset_id)?;
    pairs.sort_by(|a, b| b.score.cmp(&a.score));
    pairs.truncate(limit.min(MAX_CONFUSION_PAIRS));

    let questions: HashMap<String, String> = store
        .list_cards(dataset_id)?
        .into_iter()
        .map(|card| (card.card_id, card.question))
        .collect();
    let label_of = |card_id: &str| {
        questions
            .get(card_id)
            .cloned()
            .unwrap_or_else(|| card_id.to_string())
    };

    Ok(pairs
        .into_iter()
        .map(|pair| ConfusionSummary {
            label: format!("{} ↔ {}", label_of(&pair.card_a), label_of(&pair.card_b)),
            card_a: pair.card_a,
            card_b: pair.card_b,
            score: pair.score,
        })
        .collect())
}

pub fn dashboard(
    store: &Store,
    dataset_id: &str,
    now: DateTime<Utc>,
    confusion_limit: usize,
) -> Result<Dashboard, EngineError> {
    let meta = store
        .get_dataset_meta(dataset_id)?
        .ok_or_else(|| EngineError::DatasetNotFound(dataset_id.to_string()))?;
    let (average, reviewed_cards) = average_retrievability(store, dataset_id, now)?;

    Ok(Dashboard {
        dataset_id: meta.dataset_id,
        title: meta.title,
        due: count_due(store, dataset_id, now)?,
        average_retrievability: average,
        reviewed_cards,
        top_confusions: top_confusions(store, dataset_id, confusion_limit)?,
    })
}
