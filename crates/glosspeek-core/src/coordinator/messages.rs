//! Message protocol between view contexts and the coordinator.
//!
//! These types define the request/response contract: view contexts (the
//! reader overlay, the settings form, one-shot commands) send
//! [`CoordinatorInput`] and receive [`CoordinatorOutput`] on their
//! registered channel. `UpdateState` is a broadcast with no reply
//! expected; everything else answers the context that asked.

use serde::{Deserialize, Serialize};

use crate::provider::discovery::ModelDescriptor;
use crate::provider::translate::TranslationResult;
use crate::settings::{PinnedTranslation, Settings, SettingsPatch};

/// Identifies a registered view context.
pub type ContextId = String;

/// Monotonic per-context sequence number tagging translation requests,
/// so a superseded in-flight response can be recognized and dropped.
pub type RequestSeq = u64;

/// Input messages sent TO the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorInput {
    /// Set the enabled flag (settings toggle or the global shortcut)
    ToggleEnabled { enabled: bool },
    /// Merge new settings; only non-empty fields overwrite
    UpdateSettings { patch: SettingsPatch },
    /// Request a translation of selected text
    Translate { seq: RequestSeq, text: String },
    /// Save a pinned translation
    Pin { pin: PinnedTranslation },
    /// Discover the models a provider offers
    FetchModels { base_url: String, api_key: String },
}

impl CoordinatorInput {
    /// Create a toggle input
    pub fn toggle(enabled: bool) -> Self {
        Self::ToggleEnabled { enabled }
    }

    /// Create a settings update input
    pub fn update_settings(patch: SettingsPatch) -> Self {
        Self::UpdateSettings { patch }
    }

    /// Create a translation request
    pub fn translate(seq: RequestSeq, text: impl Into<String>) -> Self {
        Self::Translate {
            seq,
            text: text.into(),
        }
    }

    /// Create a pin request
    pub fn pin(pin: PinnedTranslation) -> Self {
        Self::Pin { pin }
    }

    /// Create a model discovery request
    pub fn fetch_models(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::FetchModels {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

/// Output messages sent FROM the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorOutput {
    /// Broadcast to every context when the enabled flag or settings change
    UpdateState { enabled: bool, settings: Settings },
    /// A translation request succeeded
    Translation {
        seq: RequestSeq,
        result: TranslationResult,
    },
    /// A translation request failed
    TranslationFailed { seq: RequestSeq, error: String },
    /// A pin request was handled
    PinSaved { success: bool },
    /// Model discovery succeeded
    Models { models: Vec<ModelDescriptor> },
    /// Model discovery failed
    ModelsFailed { error: String },
}

impl CoordinatorOutput {
    /// Create a state broadcast
    pub fn update_state(enabled: bool, settings: Settings) -> Self {
        Self::UpdateState { enabled, settings }
    }

    /// Create a translation success output
    pub fn translation(seq: RequestSeq, result: TranslationResult) -> Self {
        Self::Translation { seq, result }
    }

    /// Create a translation failure output
    pub fn translation_failed(seq: RequestSeq, error: impl Into<String>) -> Self {
        Self::TranslationFailed {
            seq,
            error: error.into(),
        }
    }

    /// Create a pin acknowledgement
    pub fn pin_saved(success: bool) -> Self {
        Self::PinSaved { success }
    }

    /// Create a discovery success output
    pub fn models(models: Vec<ModelDescriptor>) -> Self {
        Self::Models { models }
    }

    /// Create a discovery failure output
    pub fn models_failed(error: impl Into<String>) -> Self {
        Self::ModelsFailed {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_creation() {
        let input = CoordinatorInput::translate(7, "hola");
        match input {
            CoordinatorInput::Translate { seq, text } => {
                assert_eq!(seq, 7);
                assert_eq!(text, "hola");
            }
            _ => panic!("Expected Translate"),
        }

        let toggle = CoordinatorInput::toggle(true);
        assert!(matches!(
            toggle,
            CoordinatorInput::ToggleEnabled { enabled: true }
        ));
    }

    #[test]
    fn test_input_serialization() {
        let input = CoordinatorInput::fetch_models("https://api.openai.com/v1", "sk-x");
        let json = serde_json::to_string(&input).unwrap();
        assert!(json.contains("fetch_models"));
        assert!(json.contains("api.openai.com"));

        let deserialized: CoordinatorInput = serde_json::from_str(&json).unwrap();
        match deserialized {
            CoordinatorInput::FetchModels { base_url, api_key } => {
                assert_eq!(base_url, "https://api.openai.com/v1");
                assert_eq!(api_key, "sk-x");
            }
            _ => panic!("Deserialization failed"),
        }
    }

    #[test]
    fn test_output_serialization() {
        let output = CoordinatorOutput::models_failed("boom");
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("models_failed"));

        let deserialized: CoordinatorOutput = serde_json::from_str(&json).unwrap();
        match deserialized {
            CoordinatorOutput::ModelsFailed { error } => assert_eq!(error, "boom"),
            _ => panic!("Deserialization failed"),
        }
    }

    #[test]
    fn test_update_state_round_trip() {
        let output = CoordinatorOutput::update_state(true, Settings::default());
        let json = serde_json::to_string(&output).unwrap();
        let deserialized: CoordinatorOutput = serde_json::from_str(&json).unwrap();
        match deserialized {
            CoordinatorOutput::UpdateState { enabled, settings } => {
                assert!(enabled);
                assert_eq!(settings, Settings::default());
            }
            _ => panic!("Deserialization failed"),
        }
    }
}
