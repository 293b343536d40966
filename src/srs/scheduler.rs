//! FSRS 风格的记忆状态转移
//!
//! Given a card's prior memory state and a grade, produces the new
//! stability, difficulty and due date.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_INTERVAL_DAYS, MILLIS_PER_DAY};
use crate::srs::retention::{clamp_stability, interval_from_target_r, retrievability, target_r_for_exam};
use crate::store::operations::card_states::CardStateRecord;

/// FSRS v4 default weights.
const W: [f64; 17] = [
    0.4, 0.6, 2.4, 5.8, // initial stability per grade
    4.93, 0.94, 0.86, 0.01, // difficulty
    1.49, 0.14, 0.94, // success stability
    2.18, 0.05, 0.34, 1.26, // failure stability
    0.29, 2.61, // hard penalty, easy bonus
];

const MIN_DIFFICULTY: f64 = 1.0;
const MAX_DIFFICULTY: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    /// Out-of-range grades are clamped into 1..=4.
    pub fn from_grade(grade: i64) -> Self {
        match grade {
            i64::MIN..=1 => Self::Again,
            2 => Self::Hard,
            3 => Self::Good,
            _ => Self::Easy,
        }
    }

    pub fn grade(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self != Self::Again
    }
}

/// Memory state as the scheduler sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MemoryState {
    Fresh,
    Reviewed {
        stability: f64,
        difficulty: f64,
        last_review_at: DateTime<Utc>,
    },
}

impl MemoryState {
    /// Absent, zero or non-finite memory fields yield `Fresh`, so a
    /// corrupted record is rescheduled as a first review.
    pub fn from_record(record: Option<&CardStateRecord>) -> Self {
        let Some(record) = record else {
            return Self::Fresh;
        };
        match (record.stability, record.difficulty, record.last_review_at) {
            (Some(stability), Some(difficulty), Some(last_review_at))
                if usable(stability) && usable(difficulty) =>
            {
                Self::Reviewed {
                    stability,
                    difficulty,
                    last_review_at,
                }
            }
            _ => Self::Fresh,
        }
    }
}

fn usable(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Result of one state transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledState {
    pub stability: f64,
    pub difficulty: f64,
    pub last_review_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub reps: u32,
    pub lapses: u32,
}

impl ScheduledState {
    pub fn into_record(
        self,
        dataset_id: &str,
        card_id: &str,
        rating: Rating,
        response_ms: u64,
    ) -> CardStateRecord {
        CardStateRecord {
            dataset_id: dataset_id.to_string(),
            card_id: card_id.to_string(),
            stability: Some(self.stability),
            difficulty: Some(self.difficulty),
            last_review_at: Some(self.last_review_at),
            due_at: Some(self.due_at),
            reps: self.reps,
            lapses: self.lapses,
            last_rating: Some(rating.grade()),
            last_response_ms: Some(response_ms),
        }
    }
}

fn clamp_difficulty(d: f64) -> f64 {
    d.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

fn initial_stability(rating: Rating) -> f64 {
    W[rating.grade() as usize - 1]
}

fn initial_difficulty(rating: Rating) -> f64 {
    clamp_difficulty(W[4] - (rating.grade() as f64 - 3.0) * W[5])
}

/// Mean reversion towards the "Good" baseline.
fn next_difficulty(difficulty: f64, rating: Rating) -> f64 {
    let delta = difficulty - W[6] * (rating.grade() as f64 - 3.0);
    clamp_difficulty(W[7] * W[4] + (1.0 - W[7]) * delta)
}

fn stability_after_failure(stability: f64, difficulty: f64, r: f64) -> f64 {
    let next = W[11]
        * difficulty.powf(-W[12])
        * ((stability + 1.0).powf(W[13]) - 1.0)
        * (W[14] * (1.0 - r)).exp();
    next.min(stability)
}

fn stability_after_success(stability: f64, difficulty: f64, r: f64, rating: Rating) -> f64 {
    let hard_penalty = if rating == Rating::Hard { W[15] } else { 1.0 };
    let easy_bonus = if rating == Rating::Easy { W[16] } else { 1.0 };
    let growth = W[8].exp()
        * (11.0 - difficulty)
        * stability.powf(-W[9])
        * ((W[10] * (1.0 - r)).exp() - 1.0)
        * hard_penalty
        * easy_bonus;
    stability * (growth + 1.0)
}

/// Keeps the due date within [now, exam - 1 day]; `now` wins if the exam is
/// less than a day away.
fn clip_due_at(due_at: DateTime<Utc>, now: DateTime<Utc>, exam_date: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let mut clipped = due_at.max(now);
    if let Some(exam) = exam_date {
        clipped = clipped.min(exam - Duration::days(1)).max(now);
    }
    clipped
}

fn due_after(now: DateTime<Utc>, interval_days: f64) -> DateTime<Utc> {
    let days = if interval_days.is_finite() {
        interval_days.clamp(0.0, MAX_INTERVAL_DAYS)
    } else {
        0.0
    };
    now + Duration::milliseconds((days * MILLIS_PER_DAY as f64).round() as i64)
}

/// The core state transition.
///
/// `prior_reps`/`prior_lapses` come from the stored record when one exists,
/// even if its memory fields were unusable.
pub fn schedule_next(
    now: DateTime<Utc>,
    prior: Option<&CardStateRecord>,
    rating: Rating,
    base_target_r: f64,
    exam_date: Option<DateTime<Utc>>,
) -> ScheduledState {
    let target_r = target_r_for_exam(base_target_r, exam_date, now);
    let prior_reps = prior.map(|p| p.reps).unwrap_or(0);
    let prior_lapses = prior.map(|p| p.lapses).unwrap_or(0);

    let (stability, difficulty, lapses) = match MemoryState::from_record(prior) {
        MemoryState::Fresh => (initial_stability(rating), initial_difficulty(rating), prior_lapses),
        MemoryState::Reviewed {
            stability,
            difficulty,
            last_review_at,
        } => {
            let stability = clamp_stability(stability);
            let r = retrievability(now, last_review_at, stability);
            let next_d = next_difficulty(difficulty, rating);
            let next_s = if rating.is_success() {
                stability_after_success(stability, next_d, r, rating)
            } else {
                stability_after_failure(stability, next_d, r)
            };
            let lapses = if rating.is_success() {
                prior_lapses
            } else {
                prior_lapses.saturating_add(1)
            };
            (next_s, next_d, lapses)
        }
    };

    let stability = clamp_stability(stability);
    let interval = interval_from_target_r(target_r, stability);
    let due_at = clip_due_at(due_after(now, interval), now, exam_date);

    ScheduledState {
        stability,
        difficulty,
        last_review_at: now,
        due_at,
        reps: prior_reps.saturating_add(1),
        lapses,
    }
}
