//! Provider catalog — single source of truth for provider shortcuts
//!
//! Loads provider data from embedded JSON at compile time. The catalog
//! maps shortcut ids to base URLs and carries the static fallback model
//! list used when discovery is unavailable.

use std::sync::LazyLock;

use serde::Deserialize;

use super::discovery::ModelDescriptor;

/// Embedded JSON data
const PROVIDERS_JSON: &str = include_str!("providers.json");

/// Shortcut id for "none of the known providers".
pub const CUSTOM_PROVIDER: &str = "custom";

/// A known provider shortcut
#[derive(Debug, Clone, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub base_url: String,
}

#[derive(Deserialize)]
struct RawCatalog {
    providers: Vec<Provider>,
    fallback_models: Vec<ModelDescriptor>,
}

/// Global provider catalog
static CATALOG: LazyLock<RawCatalog> = LazyLock::new(|| {
    serde_json::from_str(PROVIDERS_JSON).expect("failed to parse providers.json")
});

/// All known providers, in display order.
pub fn all() -> &'static [Provider] {
    &CATALOG.providers
}

/// Get a provider by shortcut id
pub fn get(provider_id: &str) -> Option<&'static Provider> {
    CATALOG.providers.iter().find(|p| p.id == provider_id)
}

/// Get the base URL for a provider shortcut
pub fn base_url(provider_id: &str) -> Option<&'static str> {
    get(provider_id).map(|p| p.base_url.as_str())
}

/// Resolve a stored base URL back to its provider shortcut, or
/// [`CUSTOM_PROVIDER`] when it matches none.
pub fn match_provider(base_url: &str) -> &'static str {
    CATALOG
        .providers
        .iter()
        .find(|p| p.base_url == base_url)
        .map(|p| p.id.as_str())
        .unwrap_or(CUSTOM_PROVIDER)
}

/// The static model list shown when discovery has not run or failed.
pub fn fallback_models() -> &'static [ModelDescriptor] {
    &CATALOG.fallback_models
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_provider_urls() {
        assert_eq!(base_url("openai"), Some("https://api.openai.com/v1"));
        assert_eq!(base_url("ollama"), Some("http://localhost:11434/api"));
        assert_eq!(base_url("openrouter"), Some("https://openrouter.ai/api/v1"));
        assert!(base_url("nonexistent").is_none());
    }

    #[test]
    fn test_match_provider_round_trip() {
        for provider in all() {
            assert_eq!(match_provider(&provider.base_url), provider.id);
        }
        assert_eq!(match_provider("https://example.com/v1"), CUSTOM_PROVIDER);
    }

    #[test]
    fn test_fallback_models() {
        let models = fallback_models();
        assert_eq!(models.len(), 8);
        assert!(models.iter().any(|m| m.id == "gpt-3.5-turbo"));
        assert!(models.iter().all(|m| !m.id.is_empty() && !m.name.is_empty()));
    }
}
