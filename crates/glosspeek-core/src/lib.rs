//! Glosspeek Core - selection translation for language learners
//!
//! This crate provides the non-UI half of Glosspeek:
//! - Persisted settings with change notification and the pinned list
//! - Provider clients: chat-completion translation and model discovery
//! - The background coordinator that owns the enabled flag, mediates all
//!   outbound API calls, and broadcasts state to view contexts

pub mod coordinator;
pub mod error;
pub mod provider;
pub mod settings;

pub use coordinator::{Coordinator, CoordinatorHandle};
pub use coordinator::messages::{ContextId, CoordinatorInput, CoordinatorOutput, RequestSeq};
pub use error::{Error, Result};
pub use provider::{
    DiscoveryClient, ModelDescriptor, TranslationClient, TranslationResult, UsageFrequency,
    normalize_models,
};
pub use settings::{
    CUSTOM_MODEL_SENTINEL, MAX_PINS, PinnedTranslation, Settings, SettingsPatch, SettingsStore,
    StoredSettings,
};
