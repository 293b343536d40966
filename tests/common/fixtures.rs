use std::collections::HashMap;

use serde_json::{json, Value};

/// A dataset import document plus the accepted answer of each card, so
/// tests can answer whichever card the session shows.
pub struct DatasetFixture {
    pub dataset_id: String,
    pub document: Value,
    pub answers: HashMap<String, String>,
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `cards` is `(topic, question, answer)`.
pub fn dataset(title: &str, cards: &[(&str, &str, &str)]) -> DatasetFixture {
    let dataset_id = new_id();
    let mut answers = HashMap::new();
    let cards: Vec<Value> = cards
        .iter()
        .map(|(topic, question, answer)| {
            let id = new_id();
            answers.insert(id.clone(), answer.to_string());
            json!({
                "id": id,
                "topic": topic,
                "question": question,
                "answers": [answer],
                "explanation": format!("{question} -> {answer}"),
            })
        })
        .collect();

    let document = json!({
        "schema": "memory-dataset/v1",
        "datasetId": dataset_id,
        "title": title,
        "description": "fixture",
        "tags": ["test"],
        "cards": cards,
    });

    DatasetFixture {
        dataset_id,
        document,
        answers,
    }
}

pub fn crypto_dataset() -> DatasetFixture {
    dataset(
        "Security basics",
        &[
            ("crypto", "Same key for encrypt and decrypt", "symmetric key"),
            ("crypto", "Key pair with public and private halves", "public key"),
            ("network", "Filters traffic between zones", "firewall"),
        ],
    )
}
