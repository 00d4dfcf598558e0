//! Model discovery client and response normalization.
//!
//! Providers disagree wildly about the shape of a `GET {base_url}/models`
//! response. Normalization is an ordered list of shape matchers tried in
//! priority order, each a pure function from the raw JSON to an optional
//! model list, with a depth-bounded tree search as the last resort.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{DEFAULT_TIMEOUT, endpoint_url};
use crate::error::{Error, Result};

/// How deep the fallback tree search descends.
const MAX_SEARCH_DEPTH: usize = 3;

/// One model offered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Client for the model-listing endpoint.
#[derive(Clone)]
pub struct DiscoveryClient {
    http: reqwest::Client,
}

impl DiscoveryClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("Glosspeek/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// Fetch and normalize the provider's model list. Fails when either
    /// argument is empty or when normalization yields nothing usable.
    pub async fn fetch_models(
        &self,
        base_url: &str,
        api_key: &str,
    ) -> Result<Vec<ModelDescriptor>> {
        if base_url.trim().is_empty() || api_key.trim().is_empty() {
            return Err(Error::Configuration(
                "Base URL and API key are required to fetch models".to_string(),
            ));
        }
        url::Url::parse(base_url)
            .map_err(|e| Error::Configuration(format!("Invalid base URL: {}", e)))?;

        let models_url = endpoint_url(base_url, "models");
        debug!(%models_url, "fetching model list");

        let response = self
            .http
            .get(&models_url)
            .bearer_auth(api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Value = response.json().await?;
        let models = normalize_models(&raw);
        if models.is_empty() {
            return Err(Error::NoModels);
        }
        Ok(models)
    }
}

/// Normalize a heterogeneous model-listing response into a uniform list.
///
/// Matchers run in priority order; the first that recognizes the shape
/// wins. The result is filtered of unusable entries and deduplicated by
/// first occurrence of `id`.
pub fn normalize_models(raw: &Value) -> Vec<ModelDescriptor> {
    const MATCHERS: &[fn(&Value) -> Option<Vec<ModelDescriptor>>] =
        &[match_id_list_field, match_bare_array, match_models_field];

    let mapped = MATCHERS
        .iter()
        .find_map(|matcher| matcher(raw))
        .unwrap_or_else(|| collect_candidates(raw));

    let mut seen = std::collections::HashSet::new();
    mapped
        .into_iter()
        .filter(|m| !m.id.is_empty() && !m.name.is_empty())
        .filter(|m| seen.insert(m.id.clone()))
        .collect()
}

/// Shape 1: some field holds an array of objects that each expose an `id`
/// (the OpenAI `data` style). Mapped directly, name = id.
fn match_id_list_field(raw: &Value) -> Option<Vec<ModelDescriptor>> {
    let obj = raw.as_object()?;
    for value in obj.values() {
        let Some(items) = value.as_array() else {
            continue;
        };
        if items.is_empty() {
            continue;
        }
        let ids: Option<Vec<&str>> = items
            .iter()
            .map(|item| item.as_object().and_then(|o| string_field(o, "id")))
            .collect();
        if let Some(ids) = ids {
            return Some(
                ids.into_iter()
                    .map(|id| ModelDescriptor::new(id, id))
                    .collect(),
            );
        }
    }
    None
}

/// Shape 2: the response itself is an array of objects.
fn match_bare_array(raw: &Value) -> Option<Vec<ModelDescriptor>> {
    let items = raw.as_array()?;
    Some(map_entries(items))
}

/// Shape 3: a `models` field holds the array.
fn match_models_field(raw: &Value) -> Option<Vec<ModelDescriptor>> {
    let items = raw.as_object()?.get("models")?.as_array()?;
    Some(map_entries(items))
}

/// Shape 4 (fallback): walk the tree up to [`MAX_SEARCH_DEPTH`] levels and
/// collect every object that exposes `id`, `name`, or `model`.
fn collect_candidates(raw: &Value) -> Vec<ModelDescriptor> {
    let mut found = Vec::new();
    search_tree(raw, 0, &mut found);
    found
}

fn search_tree(value: &Value, depth: usize, out: &mut Vec<ModelDescriptor>) {
    if depth > MAX_SEARCH_DEPTH {
        return;
    }
    match value {
        Value::Object(obj) => {
            if obj.contains_key("id") || obj.contains_key("name") || obj.contains_key("model") {
                if let Some(entry) = map_entry(obj) {
                    out.push(entry);
                }
            }
            for child in obj.values() {
                if child.is_object() || child.is_array() {
                    search_tree(child, depth + 1, out);
                }
            }
        }
        Value::Array(items) => {
            for child in items {
                search_tree(child, depth + 1, out);
            }
        }
        _ => {}
    }
}

fn map_entries(items: &[Value]) -> Vec<ModelDescriptor> {
    items
        .iter()
        .filter_map(|item| item.as_object())
        .filter_map(map_entry)
        .collect()
}

/// Map one object with the `id ?? name ?? model` fallback chain for the id
/// and `name ?? id ?? model ?? "Unknown model"` for the name.
fn map_entry(obj: &Map<String, Value>) -> Option<ModelDescriptor> {
    let id = string_field(obj, "id")
        .or_else(|| string_field(obj, "name"))
        .or_else(|| string_field(obj, "model"))?;
    let name = string_field(obj, "name")
        .or_else(|| string_field(obj, "id"))
        .or_else(|| string_field(obj, "model"))
        .unwrap_or("Unknown model");
    Some(ModelDescriptor::new(id, name))
}

fn string_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_openai_data_shape() {
        let raw = json!({"data": [{"id": "a"}, {"id": "b"}]});
        let models = normalize_models(&raw);
        assert_eq!(
            models,
            vec![ModelDescriptor::new("a", "a"), ModelDescriptor::new("b", "b")]
        );
    }

    #[test]
    fn test_data_shape_ignores_extra_name_field() {
        // The id-list shape maps name = id even when names are present
        let raw = json!({"data": [{"id": "gpt-4", "name": "GPT Four"}]});
        let models = normalize_models(&raw);
        assert_eq!(models, vec![ModelDescriptor::new("gpt-4", "gpt-4")]);
    }

    #[test]
    fn test_bare_array_shape() {
        let raw = json!([{"name": "x"}]);
        let models = normalize_models(&raw);
        assert_eq!(models, vec![ModelDescriptor::new("x", "x")]);
    }

    #[test]
    fn test_bare_array_fallback_chain() {
        let raw = json!([
            {"id": "m1", "name": "Model One"},
            {"model": "m2"},
            {"name": "m3"}
        ]);
        let models = normalize_models(&raw);
        assert_eq!(
            models,
            vec![
                ModelDescriptor::new("m1", "Model One"),
                ModelDescriptor::new("m2", "m2"),
                ModelDescriptor::new("m3", "m3"),
            ]
        );
    }

    #[test]
    fn test_models_field_shape() {
        let raw = json!({"models": [{"name": "llama3", "details": {}}]});
        let models = normalize_models(&raw);
        assert_eq!(models, vec![ModelDescriptor::new("llama3", "llama3")]);
    }

    #[test]
    fn test_nested_tree_fallback() {
        let raw = json!({
            "result": {
                "available": [
                    {"model": "deep-1"},
                    {"model": "deep-2"}
                ]
            }
        });
        let models = normalize_models(&raw);
        assert_eq!(
            models,
            vec![
                ModelDescriptor::new("deep-1", "deep-1"),
                ModelDescriptor::new("deep-2", "deep-2"),
            ]
        );
    }

    #[test]
    fn test_tree_search_is_depth_bounded() {
        // Five levels down is out of reach for the fallback walk
        let raw = json!({"a": {"b": {"c": {"d": {"e": {"id": "too-deep"}}}}}});
        assert!(normalize_models(&raw).is_empty());
    }

    #[test]
    fn test_unrecognizable_shape_yields_nothing() {
        assert!(normalize_models(&json!({})).is_empty());
        assert!(normalize_models(&json!({"count": 3})).is_empty());
        assert!(normalize_models(&json!("just a string")).is_empty());
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let raw = json!([
            {"id": "m", "name": "First"},
            {"id": "m", "name": "Second"},
            {"id": "other"}
        ]);
        let models = normalize_models(&raw);
        assert_eq!(
            models,
            vec![
                ModelDescriptor::new("m", "First"),
                ModelDescriptor::new("other", "other"),
            ]
        );
    }

    #[test]
    fn test_entries_without_usable_id_are_dropped() {
        let raw = json!([{"id": ""}, {"context_length": 4096}, {"id": "ok"}]);
        let models = normalize_models(&raw);
        assert_eq!(models, vec![ModelDescriptor::new("ok", "ok")]);
    }

    #[tokio::test]
    async fn test_fetch_models_requires_credentials() {
        let client = DiscoveryClient::new().unwrap();
        let err = client.fetch_models("", "sk-key").await.unwrap_err();
        assert!(err.to_string().contains("Base URL and API key"));
        let err = client
            .fetch_models("https://api.openai.com/v1", "")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Base URL and API key"));
    }

    #[tokio::test]
    async fn test_fetch_models_rejects_invalid_url() {
        let client = DiscoveryClient::new().unwrap();
        let err = client.fetch_models("not a url", "sk-key").await.unwrap_err();
        assert!(err.to_string().contains("Invalid base URL"));
    }
}
