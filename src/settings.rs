use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::ai::AiError;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-sonnet-20240229";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Provider {
    OpenAi,
    Gemini,
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, AiError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(AiError::UnsupportedProvider(other.to_string())),
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => DEFAULT_OPENAI_MODEL,
            Self::Gemini => DEFAULT_GEMINI_MODEL,
            Self::Anthropic => DEFAULT_ANTHROPIC_MODEL,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::Anthropic => "https://api.anthropic.com/v1",
        }
    }
}

/// Provider settings as the rest of the app sees them. `provider` stays a
/// plain string so unknown stored values surface as `UnsupportedProvider` at
/// call time instead of failing the load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettings {
    pub provider: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ApiSettings {
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.api_key.trim().chars().collect();
        if chars.len() <= 4 {
            return "****".to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{tail}")
    }
}

/// Everything a stored settings blob may contain, including legacy fields.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredApiSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub gemini_key: Option<String>,
}

impl StoredApiSettings {
    pub fn reconcile(self) -> Option<ApiSettings> {
        let api_key = self.api_key.filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            if let Some(gemini_key) = self.gemini_key.filter(|key| !key.trim().is_empty()) {
                return Some(ApiSettings {
                    provider: Provider::Gemini.as_str().to_string(),
                    api_key: gemini_key,
                    model: Some(
                        self.model
                            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                    ),
                    base_url: None,
                });
            }
        }

        let api_key = api_key?;
        let provider = self.provider.filter(|name| !name.trim().is_empty())?;
        Some(ApiSettings {
            provider,
            api_key,
            model: self.model,
            base_url: self.base_url,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationFrequency {
    Low,
    #[default]
    Medium,
    High,
}

impl NotificationFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuietHours {
    pub start: String,
    pub end: String,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            start: "22:00".to_string(),
            end: "08:00".to_string(),
        }
    }
}

impl QuietHours {
    pub fn bounds(&self) -> Option<(NaiveTime, NaiveTime)> {
        Some((parse_clock(&self.start)?, parse_clock(&self.end)?))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationTypes {
    pub daily_tasks: bool,
    pub goal_reminders: bool,
    pub motivational: bool,
    pub progress: bool,
    pub streaks: bool,
}

impl Default for NotificationTypes {
    fn default() -> Self {
        Self {
            daily_tasks: true,
            goal_reminders: true,
            motivational: true,
            progress: true,
            streaks: true,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub frequency: NotificationFrequency,
    pub quiet_hours: QuietHours,
    pub types: NotificationTypes,
}

pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(value: serde_json::Value) -> StoredApiSettings {
        serde_json::from_value(value).expect("stored settings")
    }

    #[test]
    fn legacy_gemini_key_maps_to_gemini_provider() {
        let settings = stored(serde_json::json!({"geminiKey": "g-key"}))
            .reconcile()
            .expect("settings");
        assert_eq!(settings.provider, "gemini");
        assert_eq!(settings.api_key, "g-key");
        assert_eq!(settings.model.as_deref(), Some(DEFAULT_GEMINI_MODEL));
    }

    #[test]
    fn current_format_requires_key_and_provider() {
        assert!(stored(serde_json::json!({"apiKey": "k"})).reconcile().is_none());
        assert!(stored(serde_json::json!({"provider": "openai"}))
            .reconcile()
            .is_none());
        let settings = stored(serde_json::json!({
            "apiKey": "k",
            "provider": "anthropic",
            "baseUrl": "http://localhost:1"
        }))
        .reconcile()
        .expect("settings");
        assert_eq!(settings.provider, "anthropic");
        assert_eq!(settings.base_url.as_deref(), Some("http://localhost:1"));
    }

    #[test]
    fn api_key_wins_over_legacy_gemini_key() {
        let settings = stored(serde_json::json!({
            "apiKey": "k",
            "provider": "openai",
            "geminiKey": "old"
        }))
        .reconcile()
        .expect("settings");
        assert_eq!(settings.provider, "openai");
        assert_eq!(settings.api_key, "k");
    }

    #[test]
    fn unknown_provider_is_rejected_by_name() {
        let err = Provider::from_name("mistral").unwrap_err();
        assert!(matches!(err, AiError::UnsupportedProvider(name) if name == "mistral"));
        assert_eq!(Provider::from_name(" OpenAI ").expect("openai"), Provider::OpenAi);
    }

    #[test]
    fn partial_notification_settings_merge_over_defaults() {
        let settings: NotificationSettings =
            serde_json::from_value(serde_json::json!({"enabled": true, "types": {"motivational": false}}))
                .expect("settings");
        assert!(settings.enabled);
        assert_eq!(settings.frequency, NotificationFrequency::Medium);
        assert_eq!(settings.quiet_hours, QuietHours::default());
        assert!(!settings.types.motivational);
        assert!(settings.types.daily_tasks);
    }

    #[test]
    fn masked_key_keeps_last_four_characters() {
        let settings = ApiSettings {
            provider: "openai".to_string(),
            api_key: "sk-123456789".to_string(),
            model: None,
            base_url: None,
        };
        assert_eq!(settings.masked_key(), "****6789");
    }
}
