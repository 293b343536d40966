use crate::store::StoreError;

const SEPARATOR: char = ':';

fn component<'a>(name: &str, value: &'a str) -> Result<&'a str, StoreError> {
    if value.is_empty() {
        return Err(StoreError::Validation(format!("{name} must not be empty")));
    }
    if value.contains(SEPARATOR) {
        return Err(StoreError::Validation(format!(
            "{name} must not contain '{SEPARATOR}'"
        )));
    }
    Ok(value)
}

pub fn dataset_key(dataset_id: &str) -> Result<String, StoreError> {
    Ok(component("datasetId", dataset_id)?.to_string())
}

pub fn card_key(dataset_id: &str, card_id: &str) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}",
        component("datasetId", dataset_id)?,
        component("cardId", card_id)?
    ))
}

/// Prefix shared by every per-dataset key in `cards`, `card_states`,
/// `reviews` and `confusion_pairs`.
pub fn dataset_prefix(dataset_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", component("datasetId", dataset_id)?))
}

pub fn card_state_key(dataset_id: &str, card_id: &str) -> Result<String, StoreError> {
    card_key(dataset_id, card_id)
}

pub fn review_key(
    dataset_id: &str,
    timestamp_ms: i64,
    review_id: &str,
) -> Result<String, StoreError> {
    let ts = timestamp_ms.max(0) as u64;
    let reverse_ts = u64::MAX - ts;
    Ok(format!(
        "{}:{:020}:{}",
        component("datasetId", dataset_id)?,
        reverse_ts,
        component("reviewId", review_id)?
    ))
}

/// Caller is expected to pass the ids already in canonical (sorted) order.
pub fn confusion_pair_key(
    dataset_id: &str,
    card_a: &str,
    card_b: &str,
) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}:{}",
        component("datasetId", dataset_id)?,
        component("cardA", card_a)?,
        component("cardB", card_b)?
    ))
}

pub const SETTINGS_KEY: &str = "app";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_key_orders_by_time_desc() {
        let k_new = review_key("d1", 2000, "r2").unwrap();
        let k_old = review_key("d1", 1000, "r1").unwrap();
        assert!(k_new < k_old);
    }

    #[test]
    fn card_keys_share_dataset_prefix() {
        let prefix = dataset_prefix("d1").unwrap();
        assert!(card_key("d1", "c1").unwrap().starts_with(&prefix));
        assert!(!card_key("d10", "c1").unwrap().starts_with(&prefix));
    }

    #[test]
    fn separator_in_component_is_rejected() {
        assert!(matches!(
            card_key("d1", "bad:id"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(dataset_key(""), Err(StoreError::Validation(_))));
    }
}
