//! 混淆检测与补救插入

use crate::constants::REMEDIATION_PRIORITY;
use crate::srs::answer::normalize;
use crate::srs::queue::DueEntry;
use crate::srs::EngineError;
use crate::store::operations::cards::Card;
use crate::store::operations::confusions::{ConfusionPair, ConfusionPairKey};
use crate::store::Store;

/// First other card (in `cards` order) accepting the typed answer.
pub fn find_confused<'a>(cards: &'a [Card], answer_raw: &str, current_card_id: &str) -> Option<&'a Card> {
    let wanted = normalize(answer_raw);
    if wanted.is_empty() {
        return None;
    }
    cards
        .iter()
        .filter(|card| card.card_id != current_card_id)
        .find(|card| card.answers.iter().any(|a| normalize(a) == wanted))
}

pub fn detect_confusion(
    store: &Store,
    dataset_id: &str,
    answer_raw: &str,
    current_card_id: &str,
) -> Result<Option<Card>, EngineError> {
    if normalize(answer_raw).is_empty() {
        return Ok(None);
    }
    let cards = store.list_cards(dataset_id)?;
    Ok(find_confused(&cards, answer_raw, current_card_id).cloned())
}

pub fn bump_confusion(
    store: &Store,
    dataset_id: &str,
    card_a: &str,
    card_b: &str,
) -> Result<ConfusionPair, EngineError> {
    let key = ConfusionPairKey::new(dataset_id, card_a, card_b)?;
    Ok(store.bump_confusion(&key)?)
}

/// Pushes `card` to the front of the queue unless it is already queued.
/// Returns whether it was inserted.
pub fn inject_remediation(queue: &mut Vec<DueEntry>, card: Card) -> bool {
    if queue.iter().any(|entry| entry.card_id() == card.card_id) {
        return false;
    }
    queue.insert(
        0,
        DueEntry {
            card,
            due_at_ms: 0,
            priority: REMEDIATION_PRIORITY,
        },
    );
    true
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn card(card_id: &str, answers: &[&str]) -> Card {
        Card {
            dataset_id: "d1".to_string(),
            card_id: card_id.to_string(),
            topic: None,
            question: format!("q {card_id}"),
            answers: answers.iter().map(|s| s.to_string()).collect(),
            explanation: None,
            tags: vec![],
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn finds_other_card_with_matching_answer() {
        let cards = vec![
            card("a", &["hashing"]),
            card("b", &["Encryption"]),
            card("c", &["encryption"]),
        ];
        let hit = find_confused(&cards, "  ENCRYPTION ", "a").unwrap();
        assert_eq!(hit.card_id, "b");
    }

    #[test]
    fn never_matches_itself_or_blank_input() {
        let cards = vec![card("a", &["x"]), card("b", &["y"])];
        assert!(find_confused(&cards, "x", "a").is_none());
        assert!(find_confused(&cards, "   ", "a").is_none());
        assert!(find_confused(&cards, "z", "a").is_none());
    }

    #[test]
    fn detect_and_bump_against_store() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        store.put_card(&card("a", &["signature"])).unwrap();
        store.put_card(&card("b", &["encryption"])).unwrap();

        let confused = detect_confusion(&store, "d1", "encryption", "a").unwrap().unwrap();
        assert_eq!(confused.card_id, "b");

        bump_confusion(&store, "d1", "a", "b").unwrap();
        let pair = bump_confusion(&store, "d1", "b", "a").unwrap();
        assert_eq!(pair.score, 2);
        assert_eq!(store.list_confusions("d1").unwrap().len(), 1);
    }

    #[test]
    fn remediation_goes_first_once() {
        let mut queue = vec![DueEntry {
            card: card("a", &["x"]),
            due_at_ms: 5,
            priority: 10,
        }];
        assert!(inject_remediation(&mut queue, card("b", &["y"])));
        assert_eq!(queue[0].card_id(), "b");
        assert_eq!(queue[0].priority, REMEDIATION_PRIORITY);
        assert_eq!(queue[0].due_at_ms, 0);

        assert!(!inject_remediation(&mut queue, card("a", &["x"])));
        assert_eq!(queue.len(), 2);
    }
}
