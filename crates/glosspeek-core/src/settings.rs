//! Settings persistence and change notification
//!
//! Handles loading, saving, and watching the persisted application state:
//! the enabled flag, provider credentials, model selection, and the pinned
//! translation list.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{Error, Result};

/// Maximum number of pinned translations kept in the store.
pub const MAX_PINS: usize = 20;

/// The sentinel model value meaning "use the custom model text field".
/// It never leaves the settings UI unresolved.
pub const CUSTOM_MODEL_SENTINEL: &str = "custom";

/// In-memory settings snapshot owned by the coordinator and carried in
/// state broadcasts. `model` is always a concrete identifier here; the
/// "custom" sentinel is resolved before a snapshot is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub target_language: String,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_language: "es".to_string(),
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// A partial settings update as emitted by the settings UI.
///
/// Only non-empty fields overwrite the coordinator's state. `model` may
/// carry the "custom" sentinel; `actual_model`, when present, is the
/// already-resolved identifier and wins over any resolution here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_model: Option<String>,
}

impl SettingsPatch {
    /// Resolve the concrete model identifier this patch selects, if any.
    ///
    /// Priority: an explicit `actual_model` is used verbatim; otherwise the
    /// "custom" sentinel resolves to `custom_model`; otherwise a plain
    /// `model` value is used as-is.
    pub fn resolved_model(&self) -> Option<String> {
        if let Some(actual) = non_empty(self.actual_model.as_deref()) {
            return Some(actual);
        }
        match non_empty(self.model.as_deref()) {
            Some(model) if model == CUSTOM_MODEL_SENTINEL => {
                non_empty(self.custom_model.as_deref())
            }
            other => other,
        }
    }

    /// Merge this patch into an in-memory settings snapshot.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(v) = non_empty(self.target_language.as_deref()) {
            settings.target_language = v;
        }
        if let Some(v) = non_empty(self.api_key.as_deref()) {
            settings.api_key = v;
        }
        if let Some(v) = non_empty(self.base_url.as_deref()) {
            settings.base_url = v;
        }
        if let Some(model) = self.resolved_model() {
            settings.model = model;
        }
    }

    /// Merge this patch into the persisted state. The stored `model` keeps
    /// the raw UI selection (possibly the sentinel) alongside `custom_model`,
    /// so reopening the settings form reproduces the selection.
    pub fn apply_stored(&self, stored: &mut StoredSettings) {
        if let Some(v) = non_empty(self.target_language.as_deref()) {
            stored.target_language = v;
        }
        if let Some(v) = non_empty(self.api_key.as_deref()) {
            stored.api_key = v;
        }
        if let Some(v) = non_empty(self.base_url.as_deref()) {
            stored.base_url = v;
        }
        if let Some(v) = non_empty(self.model.as_deref()) {
            stored.model = v;
        }
        if let Some(v) = &self.custom_model {
            stored.custom_model = v.clone();
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// A translation the user saved from a tooltip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedTranslation {
    pub text: String,
    pub translation: String,
    /// Derived display context, "partOfSpeech - example".
    pub context: String,
    pub model: String,
    pub pinned_at: DateTime<Utc>,
}

impl PinnedTranslation {
    pub fn new(
        text: impl Into<String>,
        translation: impl Into<String>,
        context: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            translation: translation.into(),
            context: context.into(),
            model: model.into(),
            pinned_at: Utc::now(),
        }
    }
}

/// The full persisted state, one key per field of the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredSettings {
    pub enabled: bool,
    pub target_language: String,
    pub api_key: String,
    pub base_url: String,
    /// Raw UI selection; may be the "custom" sentinel.
    pub model: String,
    pub custom_model: String,
    /// Newest first, capped at [`MAX_PINS`].
    pub pinned_translations: Vec<PinnedTranslation>,
}

impl Default for StoredSettings {
    fn default() -> Self {
        let defaults = Settings::default();
        Self {
            enabled: false,
            target_language: defaults.target_language,
            api_key: defaults.api_key,
            base_url: defaults.base_url,
            model: defaults.model,
            custom_model: String::new(),
            pinned_translations: Vec::new(),
        }
    }
}

impl StoredSettings {
    /// The concrete model identifier, with the sentinel resolved.
    pub fn resolved_model(&self) -> String {
        if self.model == CUSTOM_MODEL_SENTINEL && !self.custom_model.is_empty() {
            self.custom_model.clone()
        } else {
            self.model.clone()
        }
    }

    /// Build the in-memory snapshot the coordinator works with.
    pub fn settings(&self) -> Settings {
        Settings {
            target_language: self.target_language.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.resolved_model(),
        }
    }

    /// Prepend a pin and evict the oldest entries past the cap.
    pub fn push_pin(&mut self, pin: PinnedTranslation) {
        self.pinned_translations.insert(0, pin);
        self.pinned_translations.truncate(MAX_PINS);
    }

    /// Remove a pin by its position in the list. Returns false when the
    /// index is out of range.
    pub fn remove_pin(&mut self, index: usize) -> bool {
        if index < self.pinned_translations.len() {
            self.pinned_translations.remove(index);
            true
        } else {
            false
        }
    }
}

/// Persisted key-value settings store with change notification.
///
/// Reads and writes a TOML file under the platform config directory.
/// Every successful update is pushed to watch subscribers; writes are
/// last-write-wins.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    state: RwLock<StoredSettings>,
    tx: watch::Sender<StoredSettings>,
}

impl SettingsStore {
    /// Open the store at the default platform path.
    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// The default settings file location.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Storage("Could not find config directory".to_string()))?;
        Ok(config_dir.join("glosspeek").join("config.toml"))
    }

    /// Open the store at a specific path, loading the file if it exists.
    pub fn open(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            Self::load_from_path(&path)?
        } else {
            StoredSettings::default()
        };
        let (tx, _rx) = watch::channel(state.clone());
        Ok(Self {
            path,
            state: RwLock::new(state),
            tx,
        })
    }

    fn load_from_path(path: &Path) -> Result<StoredSettings> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Storage(format!("Failed to read settings: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Storage(format!("Failed to parse settings: {}", e)))
    }

    /// Current state snapshot.
    pub fn get(&self) -> StoredSettings {
        self.state.read().clone()
    }

    /// Subscribe to state changes. The receiver always starts with the
    /// current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StoredSettings> {
        self.tx.subscribe()
    }

    /// Mutate the state, persist it, and notify subscribers.
    pub fn update<F>(&self, mutate: F) -> Result<StoredSettings>
    where
        F: FnOnce(&mut StoredSettings),
    {
        let snapshot = {
            let mut state = self.state.write();
            mutate(&mut state);
            state.clone()
        };
        self.save(&snapshot)?;
        // send_replace stores the new state even when nobody subscribes
        self.tx.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    fn save(&self, state: &StoredSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create settings dir: {}", e)))?;
        }
        let content = toml::to_string_pretty(state)
            .map_err(|e| Error::Storage(format!("Failed to serialize settings: {}", e)))?;
        std::fs::write(&self.path, content)
            .map_err(|e| Error::Storage(format!("Failed to write settings: {}", e)))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stored_settings() {
        let stored = StoredSettings::default();
        assert!(!stored.enabled);
        assert_eq!(stored.target_language, "es");
        assert_eq!(stored.base_url, "https://api.openai.com/v1");
        assert_eq!(stored.model, "gpt-4o-mini");
        assert!(stored.api_key.is_empty());
        assert!(stored.pinned_translations.is_empty());
    }

    #[test]
    fn test_resolved_model_sentinel() {
        let mut stored = StoredSettings::default();
        stored.model = CUSTOM_MODEL_SENTINEL.to_string();
        stored.custom_model = "my-local-model".to_string();
        assert_eq!(stored.resolved_model(), "my-local-model");
        assert_eq!(stored.settings().model, "my-local-model");

        // Sentinel with no custom model falls back to the raw value
        stored.custom_model.clear();
        assert_eq!(stored.resolved_model(), CUSTOM_MODEL_SENTINEL);
    }

    #[test]
    fn test_patch_resolution_priority() {
        let patch = SettingsPatch {
            model: Some(CUSTOM_MODEL_SENTINEL.to_string()),
            custom_model: Some("foo".to_string()),
            actual_model: Some("bar".to_string()),
            ..Default::default()
        };
        // Explicit actual model wins over sentinel resolution
        assert_eq!(patch.resolved_model(), Some("bar".to_string()));

        let patch = SettingsPatch {
            model: Some(CUSTOM_MODEL_SENTINEL.to_string()),
            custom_model: Some("foo".to_string()),
            ..Default::default()
        };
        assert_eq!(patch.resolved_model(), Some("foo".to_string()));

        let patch = SettingsPatch {
            model: Some("gpt-4".to_string()),
            ..Default::default()
        };
        assert_eq!(patch.resolved_model(), Some("gpt-4".to_string()));
    }

    #[test]
    fn test_patch_empty_fields_do_not_overwrite() {
        let mut settings = Settings::default();
        settings.api_key = "sk-existing".to_string();
        let patch = SettingsPatch {
            api_key: Some(String::new()),
            target_language: Some("fr".to_string()),
            ..Default::default()
        };
        patch.apply(&mut settings);
        assert_eq!(settings.api_key, "sk-existing");
        assert_eq!(settings.target_language, "fr");
    }

    #[test]
    fn test_pin_cap_evicts_oldest() {
        let mut stored = StoredSettings::default();
        for i in 0..MAX_PINS + 1 {
            stored.push_pin(PinnedTranslation::new(
                format!("word-{}", i),
                format!("palabra-{}", i),
                "noun - example",
                "gpt-4o-mini",
            ));
        }
        assert_eq!(stored.pinned_translations.len(), MAX_PINS);
        // Newest first; the very first pin fell off the end
        assert_eq!(stored.pinned_translations[0].text, format!("word-{}", MAX_PINS));
        assert_eq!(stored.pinned_translations[MAX_PINS - 1].text, "word-1");
    }

    #[test]
    fn test_remove_pin_by_index() {
        let mut stored = StoredSettings::default();
        stored.push_pin(PinnedTranslation::new("a", "x", "", "m"));
        stored.push_pin(PinnedTranslation::new("b", "y", "", "m"));
        assert!(stored.remove_pin(1));
        assert_eq!(stored.pinned_translations.len(), 1);
        assert_eq!(stored.pinned_translations[0].text, "b");
        assert!(!stored.remove_pin(5));
    }

    #[test]
    fn test_store_round_trip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");

        let store = SettingsStore::open(path.clone()).unwrap();
        store
            .update(|s| {
                s.enabled = true;
                s.target_language = "de".to_string();
                s.api_key = "sk-test".to_string();
                s.base_url = "https://openrouter.ai/api/v1".to_string();
                s.model = CUSTOM_MODEL_SENTINEL.to_string();
                s.custom_model = "mistral-7b".to_string();
            })
            .unwrap();

        let reopened = SettingsStore::open(path).unwrap();
        let stored = reopened.get();
        assert!(stored.enabled);
        assert_eq!(stored.target_language, "de");
        assert_eq!(stored.api_key, "sk-test");
        assert_eq!(stored.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(stored.resolved_model(), "mistral-7b");
    }

    #[test]
    fn test_store_notifies_subscribers() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = SettingsStore::open(dir.path().join("config.toml")).unwrap();
        let rx = store.subscribe();
        store.update(|s| s.enabled = true).unwrap();
        assert!(rx.borrow().enabled);
    }
}
