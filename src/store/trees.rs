pub const DATASETS: &str = "datasets";
pub const CARDS: &str = "cards";
pub const CARD_STATES: &str = "card_states";
pub const REVIEWS: &str = "reviews";
pub const CONFUSION_PAIRS: &str = "confusion_pairs";
pub const SETTINGS: &str = "settings";
pub const META: &str = "meta";
