//! 数据集导入导出（memory-dataset/v1）
//!
//! Imports are validated on the raw JSON value first so that every failure
//! names the offending field, then converted into strict internal types.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::{Uuid, Variant, Version};

use crate::constants::DATASET_SCHEMA;
use crate::srs::EngineError;
use crate::store::operations::cards::Card;
use crate::store::operations::datasets::DatasetMeta;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub question: String,
    pub answers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDocument {
    pub schema: String,
    pub dataset_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub cards: Vec<CardDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub dataset_id: String,
    pub title: String,
    pub count: usize,
}

fn invalid(message: impl Into<String>) -> EngineError {
    EngineError::Validation(message.into())
}

/// Hyphenated 36-character RFC 4122 version 4 UUID.
pub fn is_uuid_v4(raw: &str) -> bool {
    if raw.len() != 36 {
        return false;
    }
    match Uuid::parse_str(raw) {
        Ok(id) => id.get_version() == Some(Version::Random) && id.get_variant() == Variant::RFC4122,
        Err(_) => false,
    }
}

fn optional_text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn validate_card(index: usize, raw: &Value) -> Result<CardDocument, EngineError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| invalid(format!("cards[{index}] must be an object")))?;

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| is_uuid_v4(id))
        .ok_or_else(|| invalid(format!("cards[{index}].id must be a UUID v4")))?;
    let question = obj
        .get("question")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(format!("cards[{index}].question must be a string")))?;

    let answers = obj
        .get("answers")
        .and_then(Value::as_array)
        .filter(|list| !list.is_empty())
        .ok_or_else(|| invalid(format!("cards[{index}].answers must be a non-empty array")))?;
    let answers = answers
        .iter()
        .enumerate()
        .map(|(j, a)| {
            a.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(format!("cards[{index}].answers[{j}] must be a string")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CardDocument {
        id: id.to_string(),
        topic: optional_text(obj.get("topic")),
        question: question.to_string(),
        answers,
        explanation: optional_text(obj.get("explanation")),
        tags: string_list(obj.get("tags")),
        created_at: optional_text(obj.get("createdAt")),
        updated_at: optional_text(obj.get("updatedAt")),
    })
}

/// Whole-document validation; the first failure aborts.
pub fn validate_dataset(raw: &Value) -> Result<DatasetDocument, EngineError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| invalid("dataset must be a JSON object"))?;

    match obj.get("schema").and_then(Value::as_str) {
        Some(DATASET_SCHEMA) => {}
        _ => return Err(invalid(format!("schema must be {DATASET_SCHEMA}"))),
    }
    let dataset_id = obj
        .get("datasetId")
        .and_then(Value::as_str)
        .filter(|id| is_uuid_v4(id))
        .ok_or_else(|| invalid("datasetId must be a UUID v4"))?;
    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| invalid("title must be a non-empty string"))?;
    let cards = obj
        .get("cards")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("cards must be an array"))?;

    let cards = cards
        .iter()
        .enumerate()
        .map(|(i, c)| validate_card(i, c))
        .collect::<Result<Vec<_>, _>>()?;
    let mut seen = HashSet::with_capacity(cards.len());
    if let Some((i, dup)) = cards.iter().enumerate().find(|(_, c)| !seen.insert(c.id.as_str())) {
        return Err(invalid(format!("cards[{i}].id duplicates {}", dup.id)));
    }

    Ok(DatasetDocument {
        schema: DATASET_SCHEMA.to_string(),
        dataset_id: dataset_id.to_string(),
        title: title.to_string(),
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        tags: string_list(obj.get("tags")),
        cards,
    })
}

impl CardDocument {
    fn into_card(self, dataset_id: &str) -> Card {
        Card {
            dataset_id: dataset_id.to_string(),
            card_id: self.id,
            topic: self.topic,
            question: self.question,
            answers: self.answers,
            explanation: self.explanation,
            tags: self.tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn from_card(card: Card) -> Self {
        Self {
            id: card.card_id,
            topic: card.topic,
            question: card.question,
            answers: card.answers,
            explanation: card.explanation,
            tags: card.tags,
            created_at: card.created_at,
            updated_at: card.updated_at,
        }
    }
}

/// Validates and stores a dataset. A re-import with the same `datasetId`
/// replaces its cards wholesale; nothing is written if validation fails.
pub fn import_dataset(store: &Store, raw: &Value, now: DateTime<Utc>) -> Result<ImportSummary, EngineError> {
    let doc = validate_dataset(raw)?;
    let meta = DatasetMeta {
        dataset_id: doc.dataset_id.clone(),
        title: doc.title.clone(),
        description: doc.description,
        tags: doc.tags,
        imported_at: now,
        schema: doc.schema,
    };
    let cards: Vec<Card> = doc
        .cards
        .into_iter()
        .map(|c| c.into_card(&doc.dataset_id))
        .collect();

    store.replace_dataset(&meta, &cards)?;

    Ok(ImportSummary {
        dataset_id: doc.dataset_id,
        title: doc.title,
        count: cards.len(),
    })
}

pub fn import_dataset_json(store: &Store, text: &str, now: DateTime<Utc>) -> Result<ImportSummary, EngineError> {
    let raw: Value =
        serde_json::from_str(text).map_err(|e| invalid(format!("invalid JSON: {e}")))?;
    import_dataset(store, &raw, now)
}

pub fn export_dataset(store: &Store, dataset_id: &str) -> Result<DatasetDocument, EngineError> {
    let meta = store
        .get_dataset_meta(dataset_id)?
        .ok_or_else(|| EngineError::DatasetNotFound(dataset_id.to_string()))?;
    let cards = store
        .list_cards(dataset_id)?
        .into_iter()
        .map(CardDocument::from_card)
        .collect();

    Ok(DatasetDocument {
        schema: DATASET_SCHEMA.to_string(),
        dataset_id: meta.dataset_id,
        title: meta.title,
        description: meta.description,
        tags: meta.tags,
        cards,
    })
}
