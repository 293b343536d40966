pub mod card_states;
pub mod cards;
pub mod confusions;
pub mod datasets;
pub mod progress;
pub mod reviews;
pub mod settings;
