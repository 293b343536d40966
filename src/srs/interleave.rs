use crate::srs::queue::DueEntry;
use crate::srs::EngineError;

/// Pops the next entry to present.
///
/// Without a `last_topic` the head is taken. Otherwise the first of the
/// leading `sample_size` entries whose topic differs from `last_topic` (or
/// has none) wins, falling back to the head when all of them share it.
pub fn select_next(
    queue: &mut Vec<DueEntry>,
    last_topic: Option<&str>,
    sample_size: usize,
) -> Result<DueEntry, EngineError> {
    if queue.is_empty() {
        return Err(EngineError::EmptyQueue);
    }

    let index = match last_topic {
        None => 0,
        Some(last) => queue
            .iter()
            .take(sample_size.max(1))
            .position(|entry| entry.topic() != Some(last))
            .unwrap_or(0),
    };
    Ok(queue.remove(index))
}
