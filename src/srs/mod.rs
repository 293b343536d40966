//! Spaced-repetition core: answer scoring, memory model, due queue,
//! interleaving, confusion tracking and the review session loop.

pub mod answer;
pub mod backup;
pub mod confusion;
pub mod dashboard;
pub mod dataset;
pub mod interleave;
pub mod queue;
pub mod registry;
pub mod retention;
pub mod scheduler;
pub mod session;

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Validation(String),
    #[error("dataset not found: {0}")]
    DatasetNotFound(String),
    #[error("card not found: {dataset_id}/{card_id}")]
    CardNotFound { dataset_id: String, card_id: String },
    #[error("queue is empty")]
    EmptyQueue,
    #[error("no cards due in dataset {0}")]
    NothingDue(String),
    #[error("invalid session transition: {0}")]
    InvalidTransition(String),
    #[error("invalid rating: {0}")]
    InvalidRating(String),
}
