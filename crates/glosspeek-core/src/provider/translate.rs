//! Chat-completion translation client.
//!
//! Sends the selected text to a `{base_url}/chat/completions` endpoint with
//! a system prompt that asks for strict JSON, and parses the annotated
//! translation out of the model's reply. Non-JSON output degrades to a
//! best-effort result instead of failing the request.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DEFAULT_TIMEOUT, endpoint_url};
use crate::error::{Error, Result};

/// Fixed sampling temperature; linguistic annotations want determinism.
const TEMPERATURE: f32 = 0.3;

/// Frequency and register annotation for a translated term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageFrequency {
    pub frequency: String,
    pub register: String,
}

/// An annotated translation as delivered to the UI surfaces.
///
/// Serialized camelCase to stay wire-compatible with what the model is
/// asked to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub original_text: String,
    pub translation: String,
    pub part_of_speech: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    pub example: String,
    /// The model that produced this translation.
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_frequency: Option<UsageFrequency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collocations: Vec<String>,
}

impl TranslationResult {
    /// The derived "partOfSpeech - example" context string used for pins.
    pub fn pin_context(&self) -> String {
        format!("{} - {}", self.part_of_speech, self.example)
    }
}

/// The JSON document the model is instructed to emit.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotatedReply {
    translation: String,
    #[serde(default)]
    part_of_speech: Option<String>,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    example: Option<String>,
    #[serde(default)]
    usage_frequency: Option<UsageFrequency>,
    #[serde(default)]
    collocations: Vec<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Client for the chat-completion translation endpoint.
#[derive(Clone)]
pub struct TranslationClient {
    http: reqwest::Client,
}

impl TranslationClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("Glosspeek/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// Translate `text` into `target_language`. Exactly one request is
    /// made; there is no retry.
    pub async fn translate(
        &self,
        text: &str,
        target_language: &str,
        api_key: &str,
        base_url: &str,
        model: &str,
    ) -> Result<TranslationResult> {
        let url = endpoint_url(base_url, "chat/completions");
        debug!(%url, %model, "requesting translation");

        let prompt = system_prompt(target_language);
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: TEMPERATURE,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
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

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| Error::InvalidResponse("no choices in completion".to_string()))?;

        Ok(parse_reply(content, text, model))
    }
}

/// System prompt instructing the model to return strict JSON annotations.
fn system_prompt(target_language: &str) -> String {
    format!(
        "You are a language translation assistant that translates text to {target_language}. \
         Provide the translation followed by detailed linguistic information to help language learners.\n\
         \n\
         Include the following in your response:\n\
         1. Translation of the text\n\
         2. Part-of-speech information\n\
         3. Gender information (if the word is a noun and the target language has grammatical gender)\n\
         4. One example sentence showing usage\n\
         5. Usage frequency (indicate if common/uncommon and formal/informal)\n\
         6. Common collocations (2-3 words or phrases frequently used with the translated term)\n\
         \n\
         Format your response as JSON with the following fields:\n\
         - \"translation\": the translated text\n\
         - \"partOfSpeech\": part of speech\n\
         - \"gender\": grammatical gender if applicable\n\
         - \"example\": example sentence\n\
         - \"usageFrequency\": object with \"frequency\" (common/uncommon) and \"register\" (formal/informal)\n\
         - \"collocations\": array of common word combinations with the translated term"
    )
}

/// Parse the model's reply into a result. Anything that is not the asked-for
/// JSON becomes a degraded result carrying the raw content as the
/// translation.
fn parse_reply(content: &str, original_text: &str, model: &str) -> TranslationResult {
    match serde_json::from_str::<AnnotatedReply>(content) {
        Ok(reply) => TranslationResult {
            original_text: original_text.to_string(),
            translation: reply.translation,
            part_of_speech: reply.part_of_speech.unwrap_or_else(|| "N/A".to_string()),
            gender: reply.gender,
            example: reply.example.unwrap_or_else(|| "N/A".to_string()),
            model: model.to_string(),
            usage_frequency: reply.usage_frequency,
            collocations: reply.collocations,
        },
        Err(e) => {
            debug!("model output was not valid JSON ({e}), degrading to raw text");
            TranslationResult {
                original_text: original_text.to_string(),
                translation: content.to_string(),
                part_of_speech: "N/A".to_string(),
                gender: None,
                example: "N/A".to_string(),
                model: model.to_string(),
                usage_frequency: None,
                collocations: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_reply() {
        let content = r#"{
            "translation": "perro",
            "partOfSpeech": "noun",
            "gender": "masculine",
            "example": "El perro ladra.",
            "usageFrequency": {"frequency": "common", "register": "informal"},
            "collocations": ["perro callejero", "perro guardián"]
        }"#;
        let result = parse_reply(content, "dog", "gpt-4o-mini");
        assert_eq!(result.original_text, "dog");
        assert_eq!(result.translation, "perro");
        assert_eq!(result.part_of_speech, "noun");
        assert_eq!(result.gender.as_deref(), Some("masculine"));
        assert_eq!(result.example, "El perro ladra.");
        assert_eq!(result.model, "gpt-4o-mini");
        let freq = result.usage_frequency.unwrap();
        assert_eq!(freq.frequency, "common");
        assert_eq!(freq.register, "informal");
        assert_eq!(result.collocations.len(), 2);
    }

    #[test]
    fn test_parse_minimal_reply_fills_placeholders() {
        let result = parse_reply(r#"{"translation": "hola"}"#, "hello", "m");
        assert_eq!(result.translation, "hola");
        assert_eq!(result.part_of_speech, "N/A");
        assert_eq!(result.example, "N/A");
        assert!(result.gender.is_none());
        assert!(result.collocations.is_empty());
    }

    #[test]
    fn test_parse_non_json_degrades_to_raw_text() {
        let content = "Hola — that means hello!";
        let result = parse_reply(content, "hello", "m");
        assert_eq!(result.translation, content);
        assert_eq!(result.part_of_speech, "N/A");
        assert_eq!(result.example, "N/A");
    }

    #[test]
    fn test_system_prompt_names_the_contract_fields() {
        let prompt = system_prompt("fr");
        assert!(prompt.contains("translates text to fr"));
        for field in [
            "\"translation\"",
            "\"partOfSpeech\"",
            "\"gender\"",
            "\"example\"",
            "\"usageFrequency\"",
            "\"collocations\"",
        ] {
            assert!(prompt.contains(field), "prompt missing {field}");
        }
    }

    #[test]
    fn test_pin_context() {
        let result = parse_reply(
            r#"{"translation": "perro", "partOfSpeech": "noun", "example": "El perro ladra."}"#,
            "dog",
            "m",
        );
        assert_eq!(result.pin_context(), "noun - El perro ladra.");
    }
}
