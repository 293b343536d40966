use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::DEFAULT_TARGET_R;
use crate::store::keys;
use crate::store::{Store, StoreError};

/// Installation-wide study settings (singleton).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_target_r")]
    pub target_r: f64,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    #[serde(default)]
    pub exam_date: Option<String>,
}

fn default_target_r() -> f64 {
    DEFAULT_TARGET_R
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_r: DEFAULT_TARGET_R,
            exam_date: None,
        }
    }
}

/// Partial update. `examDate: null` clears the exam date, an absent
/// `examDate` leaves it untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default)]
    pub target_r: Option<f64>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub exam_date: Option<Option<String>>,
}

fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl Store {
    pub fn get_settings(&self) -> Result<Settings, StoreError> {
        match self.settings.get(keys::SETTINGS_KEY.as_bytes())? {
            Some(raw) => match serde_json::from_slice::<Settings>(&raw) {
                Ok(parsed) => Ok(parsed),
                Err(error) => {
                    tracing::error!(error = %error, "Failed to deserialize settings");
                    Err(StoreError::Serialization(error))
                }
            },
            None => Ok(Settings::default()),
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.settings
            .insert(keys::SETTINGS_KEY.as_bytes(), Self::serialize(settings)?)?;
        Ok(())
    }

    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<Settings, StoreError> {
        let mut settings = self.get_settings()?;
        if let Some(target_r) = patch.target_r {
            if !target_r.is_finite() {
                return Err(StoreError::Validation("targetR must be a number".to_string()));
            }
            settings.target_r = target_r;
        }
        if let Some(exam_date) = &patch.exam_date {
            settings.exam_date = exam_date.clone().filter(|d| !d.trim().is_empty());
        }
        self.save_settings(&settings)?;
        Ok(settings)
    }
}
