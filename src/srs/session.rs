//! 单次复习会话状态机
//!
//! `AwaitingAnswer -> Graded -> AwaitingAnswer | Completed`. A session is
//! built from the due queue once, at start; every grading step commits its
//! store update atomically before the in-memory session advances, so a
//! failed commit leaves the session in `Graded` and the step can be retried.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::srs::answer::{score_answer, AnswerResult};
use crate::srs::confusion::{detect_confusion, inject_remediation};
use crate::srs::interleave::select_next;
use crate::srs::queue::{build_due_queue, DueEntry};
use crate::srs::retention::parse_exam_date;
use crate::srs::scheduler::{schedule_next, Rating};
use crate::srs::EngineError;
use crate::store::operations::card_states::CardStateRecord;
use crate::store::operations::confusions::{ConfusionPair, ConfusionPairKey};
use crate::store::operations::reviews::Review;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    AwaitingAnswer {
        shown_at: DateTime<Utc>,
    },
    Graded {
        result: AnswerResult,
        response_ms: u64,
        gave_up: bool,
    },
    Completed,
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitingAnswer { .. } => "awaitingAnswer",
            Self::Graded { .. } => "graded",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReviewSession {
    id: String,
    dataset_id: String,
    queue: Vec<DueEntry>,
    current: Option<DueEntry>,
    last_topic: Option<String>,
    phase: SessionPhase,
    sample_size: usize,
    started_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    reviewed: u32,
    correct: u32,
}

/// What a committed grading step produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateOutcome {
    pub rating: Rating,
    pub state: CardStateRecord,
    pub confused_with: Option<String>,
    pub confusion: Option<ConfusionPair>,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPrompt {
    pub card_id: String,
    pub topic: Option<String>,
    pub question: String,
}

/// Client-facing snapshot. Answers and explanation are only revealed once
/// the current card has been graded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub dataset_id: String,
    pub phase: &'static str,
    pub current: Option<CardPrompt>,
    pub result: Option<AnswerResult>,
    pub explanation: Option<String>,
    pub awaiting_self_rating: bool,
    pub remaining: usize,
    pub reviewed: u32,
    pub correct: u32,
    pub started_at: DateTime<Utc>,
}

impl ReviewSession {
    pub fn start(
        store: &Store,
        dataset_id: &str,
        sample_size: usize,
        now: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        if store.get_dataset_meta(dataset_id)?.is_none() {
            return Err(EngineError::DatasetNotFound(dataset_id.to_string()));
        }

        let mut queue = build_due_queue(store, dataset_id, now)?;
        if queue.is_empty() {
            return Err(EngineError::NothingDue(dataset_id.to_string()));
        }
        let current = select_next(&mut queue, None, sample_size)?;

        let session = Self {
            id: uuid::Uuid::new_v4().to_string(),
            dataset_id: dataset_id.to_string(),
            queue,
            current: Some(current),
            last_topic: None,
            phase: SessionPhase::AwaitingAnswer { shown_at: now },
            sample_size,
            started_at: now,
            last_activity_at: now,
            reviewed: 0,
            correct: 0,
        };
        tracing::info!(
            session_id = %session.id,
            dataset_id,
            due = session.queue.len() + 1,
            "Review session started"
        );
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn current(&self) -> Option<&DueEntry> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &[DueEntry] {
        &self.queue
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.phase, SessionPhase::Completed)
    }

    fn grade(&mut self, input: Option<&str>, gave_up: bool, now: DateTime<Utc>) -> Result<AnswerResult, EngineError> {
        let SessionPhase::AwaitingAnswer { shown_at } = self.phase else {
            return Err(EngineError::InvalidTransition(format!(
                "cannot answer while {}",
                self.phase.name()
            )));
        };
        let current = self
            .current
            .as_ref()
            .ok_or_else(|| EngineError::InvalidTransition("no current card".to_string()))?;

        let mut result = score_answer(input, &current.card.answers);
        if gave_up {
            result.correct = false;
        }
        let response_ms = u64::try_from((now - shown_at).num_milliseconds()).unwrap_or(0);

        self.last_activity_at = now;
        self.phase = SessionPhase::Graded {
            result: result.clone(),
            response_ms,
            gave_up,
        };
        Ok(result)
    }

    pub fn submit_answer(&mut self, input: Option<&str>, now: DateTime<Utc>) -> Result<AnswerResult, EngineError> {
        self.grade(input, false, now)
    }

    /// "I don't know": whatever was typed so far is graded as incorrect.
    pub fn give_up(&mut self, input: Option<&str>, now: DateTime<Utc>) -> Result<AnswerResult, EngineError> {
        self.grade(input, true, now)
    }

    /// Correct answers need a self-rating of Hard, Good or Easy; incorrect
    /// answers are always graded Again and `rating` is ignored.
    pub fn rate(
        &mut self,
        store: &Store,
        rating: Option<Rating>,
        now: DateTime<Utc>,
    ) -> Result<RateOutcome, EngineError> {
        let SessionPhase::Graded {
            result,
            response_ms,
            ..
        } = &self.phase
        else {
            return Err(EngineError::InvalidTransition(format!(
                "cannot rate while {}",
                self.phase.name()
            )));
        };
        let current = self
            .current
            .as_ref()
            .ok_or_else(|| EngineError::InvalidTransition("no current card".to_string()))?;

        let rating = if result.correct {
            match rating {
                Some(r) if r.is_success() => r,
                Some(_) => {
                    return Err(EngineError::InvalidRating(
                        "a correct answer must be rated hard, good or easy".to_string(),
                    ))
                }
                None => {
                    return Err(EngineError::InvalidRating(
                        "a correct answer needs a self-rating".to_string(),
                    ))
                }
            }
        } else {
            Rating::Again
        };

        let card_id = current.card.card_id.clone();
        // 会话期间数据集被重新导入时，卡片可能已不存在
        if store.get_card(&self.dataset_id, &card_id)?.is_none() {
            return Err(EngineError::CardNotFound {
                dataset_id: self.dataset_id.clone(),
                card_id,
            });
        }
        let settings = store.get_settings()?;
        let exam_date = settings.exam_date.as_deref().and_then(parse_exam_date);
        let prior = store.get_card_state(&self.dataset_id, &card_id)?;
        let record = schedule_next(now, prior.as_ref(), rating, settings.target_r, exam_date)
            .into_record(&self.dataset_id, &card_id, rating, *response_ms);

        let review = Review {
            id: uuid::Uuid::new_v4().to_string(),
            dataset_id: self.dataset_id.clone(),
            card_id: card_id.clone(),
            reviewed_at: now,
            correct: result.correct,
            rating: rating.grade(),
            response_ms: *response_ms,
            answer_raw: result.actual.clone(),
        };

        let confused_card = if result.correct {
            None
        } else {
            detect_confusion(store, &self.dataset_id, &result.actual, &card_id)?
        };
        let pair_key = confused_card
            .as_ref()
            .map(|other| ConfusionPairKey::new(&self.dataset_id, &card_id, &other.card_id))
            .transpose()?;

        let confusion = store.commit_review(&record, &review, pair_key.as_ref())?;

        // Committed; only now does the in-memory session move on.
        let was_correct = result.correct;
        let answered = self.current.take();
        self.last_topic = answered.and_then(|entry| entry.card.topic);
        self.reviewed += 1;
        if was_correct {
            self.correct += 1;
        }
        self.last_activity_at = now;

        let confused_with = confused_card.as_ref().map(|c| c.card_id.clone());
        let remediation = match confused_card {
            Some(card) => inject_remediation(&mut self.queue, card),
            None => false,
        };
        if let Some(other) = &confused_with {
            tracing::info!(
                session_id = %self.id,
                card_id = %card_id,
                confused_with = %other,
                remediation,
                "Confusion detected"
            );
        }

        self.advance(remediation, now)?;

        Ok(RateOutcome {
            rating,
            state: record,
            confused_with,
            confusion,
            completed: self.is_completed(),
        })
    }

    fn advance(&mut self, remediation: bool, now: DateTime<Utc>) -> Result<(), EngineError> {
        if self.queue.is_empty() {
            self.phase = SessionPhase::Completed;
            tracing::info!(
                session_id = %self.id,
                reviewed = self.reviewed,
                correct = self.correct,
                "Review session completed"
            );
            return Ok(());
        }
        // A remediation card was just put at the head and must be shown
        // next, whatever its topic.
        let next = if remediation {
            self.queue.remove(0)
        } else {
            select_next(&mut self.queue, self.last_topic.as_deref(), self.sample_size)?
        };
        self.current = Some(next);
        self.phase = SessionPhase::AwaitingAnswer { shown_at: now };
        Ok(())
    }

    pub fn abandon(&mut self) {
        if !self.is_completed() {
            tracing::info!(
                session_id = %self.id,
                reviewed = self.reviewed,
                remaining = self.queue.len() + usize::from(self.current.is_some()),
                "Review session abandoned"
            );
        }
        self.queue.clear();
        self.current = None;
        self.phase = SessionPhase::Completed;
    }

    pub fn view(&self) -> SessionView {
        let (result, awaiting_self_rating) = match &self.phase {
            SessionPhase::Graded { result, .. } => (Some(result.clone()), result.correct),
            _ => (None, false),
        };
        let explanation = match self.phase {
            SessionPhase::Graded { .. } => self.current.as_ref().and_then(|c| c.card.explanation.clone()),
            _ => None,
        };
        SessionView {
            session_id: self.id.clone(),
            dataset_id: self.dataset_id.clone(),
            phase: self.phase.name(),
            current: self.current.as_ref().map(|entry| CardPrompt {
                card_id: entry.card.card_id.clone(),
                topic: entry.card.topic.clone(),
                question: entry.card.question.clone(),
            }),
            result,
            explanation,
            awaiting_self_rating,
            remaining: self.queue.len(),
            reviewed: self.reviewed,
            correct: self.correct,
            started_at: self.started_at,
        }
    }
}
