//! 到期队列构建

use std::collections::HashMap;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;

use crate::constants::{MILLIS_PER_MINUTE, NEVER_REVIEWED_PRIORITY};
use crate::store::operations::card_states::CardStateRecord;
use crate::store::operations::cards::Card;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueEntry {
    pub card: Card,
    /// 0 for never-reviewed cards and remediation inserts.
    pub due_at_ms: i64,
    pub priority: i64,
}

impl DueEntry {
    pub fn card_id(&self) -> &str {
        &self.card.card_id
    }

    pub fn topic(&self) -> Option<&str> {
        self.card.topic.as_deref()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueCounts {
    pub overdue: usize,
    pub today: usize,
    pub total: usize,
}

/// 23:59:59.999 of `now`'s local calendar day.
pub fn end_of_local_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let local_date = now.with_timezone(&Local).date_naive();
    local_date
        .and_hms_milli_opt(23, 59, 59, 999)
        .and_then(|naive| Local.from_local_datetime(&naive).latest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

fn states_by_card(states: Vec<CardStateRecord>) -> HashMap<String, CardStateRecord> {
    states
        .into_iter()
        .map(|state| (state.card_id.clone(), state))
        .collect()
}

fn due_at_ms(state: Option<&CardStateRecord>) -> i64 {
    state.and_then(CardStateRecord::due_at_ms).unwrap_or(0)
}

/// Orders `cards` into a due queue. Cards are due when never reviewed or
/// due by the end of the local day; never-reviewed cards come first, then
/// by minutes overdue. Ties keep `cards` order.
pub fn due_queue_from(
    cards: Vec<Card>,
    states: Vec<CardStateRecord>,
    now: DateTime<Utc>,
) -> Vec<DueEntry> {
    let states = states_by_card(states);
    let now_ms = now.timestamp_millis();
    let end_ms = end_of_local_day(now).timestamp_millis();

    let mut queue: Vec<DueEntry> = cards
        .into_iter()
        .filter_map(|card| {
            let due_at_ms = due_at_ms(states.get(&card.card_id));
            let never_reviewed = due_at_ms == 0;
            if !never_reviewed && due_at_ms > end_ms {
                return None;
            }
            let priority = if never_reviewed {
                NEVER_REVIEWED_PRIORITY
            } else {
                let overdue_minutes = (now_ms - due_at_ms) as f64 / MILLIS_PER_MINUTE as f64;
                (overdue_minutes.round() as i64).clamp(0, NEVER_REVIEWED_PRIORITY)
            };
            Some(DueEntry {
                card,
                due_at_ms,
                priority,
            })
        })
        .collect();

    queue.sort_by(|a, b| b.priority.cmp(&a.priority));
    queue
}

pub fn build_due_queue(
    store: &Store,
    dataset_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<DueEntry>, StoreError> {
    let cards = store.list_cards(dataset_id)?;
    let states = store.list_card_states(dataset_id)?;
    let queue = due_queue_from(cards, states, now);
    tracing::debug!(dataset_id, due = queue.len(), "Due queue built");
    Ok(queue)
}

/// Never-reviewed cards count as overdue.
pub fn count_due(store: &Store, dataset_id: &str, now: DateTime<Utc>) -> Result<DueCounts, StoreError> {
    let cards = store.list_cards(dataset_id)?;
    let states = states_by_card(store.list_card_states(dataset_id)?);
    let now_ms = now.timestamp_millis();
    let end_ms = end_of_local_day(now).timestamp_millis();

    let mut counts = DueCounts {
        total: cards.len(),
        ..DueCounts::default()
    };
    for card in &cards {
        let due = due_at_ms(states.get(&card.card_id));
        if due == 0 || due <= now_ms {
            counts.overdue += 1;
        } else if due <= end_ms {
            counts.today += 1;
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::tempdir;

    use super::*;

    fn card(card_id: &str) -> Card {
        Card {
            dataset_id: "d1".to_string(),
            card_id: card_id.to_string(),
            topic: None,
            question: format!("q {card_id}"),
            answers: vec!["a".to_string()],
            explanation: None,
            tags: vec![],
            created_at: None,
            updated_at: None,
        }
    }

    fn state(card_id: &str, due_at: DateTime<Utc>) -> CardStateRecord {
        CardStateRecord {
            dataset_id: "d1".to_string(),
            card_id: card_id.to_string(),
            stability: Some(1.0),
            difficulty: Some(5.0),
            last_review_at: Some(due_at - Duration::days(1)),
            due_at: Some(due_at),
            reps: 1,
            lapses: 0,
            last_rating: Some(3),
            last_response_ms: None,
        }
    }

    #[test]
    fn never_reviewed_first_then_most_overdue() {
        let now = Utc::now();
        let cards = vec![card("a"), card("b"), card("c"), card("d")];
        let states = vec![
            state("a", now - Duration::minutes(5)),
            state("b", now - Duration::hours(2)),
            state("d", now + Duration::days(3)),
        ];

        let queue = due_queue_from(cards, states, now);
        let ids: Vec<&str> = queue.iter().map(DueEntry::card_id).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(queue[0].priority, NEVER_REVIEWED_PRIORITY);
        assert_eq!(queue[0].due_at_ms, 0);
        assert_eq!(queue[1].priority, 120);
        assert_eq!(queue[2].priority, 5);
    }

    #[test]
    fn nothing_beyond_end_of_day() {
        let now = Utc::now();
        let end = end_of_local_day(now);
        let states = vec![
            state("a", end),
            state("b", end + Duration::milliseconds(1)),
        ];
        let queue = due_queue_from(vec![card("a"), card("b")], states, now);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].card_id(), "a");
        assert_eq!(queue[0].priority, 0);
    }

    #[test]
    fn counts_split_overdue_today_total() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        let now = Utc::now();
        let end = end_of_local_day(now);
        for id in ["a", "b", "c", "d"] {
            store.put_card(&card(id)).unwrap();
        }
        store.put_card_state(&state("a", now - Duration::hours(1))).unwrap();
        store.put_card_state(&state("c", now + Duration::days(2))).unwrap();
        if end > now + Duration::milliseconds(1) {
            store.put_card_state(&state("d", end)).unwrap();
        } else {
            store.put_card_state(&state("d", now + Duration::days(2))).unwrap();
        }

        let counts = count_due(&store, "d1", now).unwrap();
        assert_eq!(counts.total, 4);
        assert_eq!(counts.overdue, 2);
        assert_eq!(counts.today + counts.overdue, build_due_queue(&store, "d1", now).unwrap().len());
    }

    #[test]
    fn end_of_day_is_not_before_now() {
        let now = Utc::now();
        assert!(end_of_local_day(now) >= now);
        assert!(end_of_local_day(now) - now < Duration::days(1) + Duration::hours(2));
    }
}
