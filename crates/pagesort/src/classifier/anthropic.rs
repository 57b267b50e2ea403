//! Classification through the Anthropic Messages API.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{parse_classification, Classifier};
use crate::config::ClassifierConfig;
use crate::error::{ConfigError, ProcessError};
use crate::sanitize::redact_path;
use crate::stage::ClassificationResult;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY_LENGTH: usize = 200;

const INSTRUCTION: &str = r#"The images above are the pages of one scanned document, in order.
Classify the document and reply with a single JSON object and nothing else:
{
  "dates": [{"date": "YYYY-MM-DD", "description": "what the date refers to"}],
  "type_name": "document type, e.g. Invoice",
  "type_abbr": "short uppercase abbreviation of the type, e.g. INV",
  "summary": "one or two sentences describing the content",
  "suggested_file_name": "YYYY-MM-DD TYPE_ABBR short description"
}
List every relevant date, most important first. The suggested file name must
start with the most important date and must not contain a file extension."#;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct AnthropicClassifier {
    client: Client,
    endpoint: String,
    model: String,
    api_version: String,
    max_tokens: u32,
    temperature: f32,
    api_key: SecretString,
}

impl AnthropicClassifier {
    /// Reads the API key from the environment variable named in `config`.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ConfigError> {
        let key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_api_key(config, SecretString::from(key))
    }

    pub fn with_api_key(config: &ClassifierConfig, api_key: SecretString) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Validation {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_version: config.api_version.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            api_key,
        })
    }

    async fn encode_pages(pages: &[PathBuf]) -> Result<Vec<ContentBlock>, ProcessError> {
        let mut blocks = Vec::with_capacity(pages.len() + 1);
        for page in pages {
            let bytes = tokio::fs::read(page).await.map_err(|e| {
                ProcessError::ClassificationFailed(format!(
                    "failed to read page image '{}': {}",
                    redact_path(page),
                    e
                ))
            })?;
            blocks.push(ContentBlock::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: "image/webp",
                    data: STANDARD.encode(bytes),
                },
            });
        }
        Ok(blocks)
    }
}

/// Text of the first `text` block of a Messages API response body.
fn first_text(body: &str) -> Result<String, ProcessError> {
    let response: MessagesResponse = serde_json::from_str(body).map_err(|e| {
        ProcessError::ClassificationFailed(format!("failed to decode API response: {}", e))
    })?;
    response
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .ok_or_else(|| {
            ProcessError::ClassificationFailed("API response contains no text".to_string())
        })
}

/// The API's own error message when the body carries one, otherwise the
/// status and a truncated body.
fn api_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        return parsed.error.message;
    }
    let body = body.trim();
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let truncated: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("classification request failed ({}): {}... (truncated)", status, truncated)
    } else {
        format!("classification request failed ({}): {}", status, body)
    }
}

#[async_trait]
impl Classifier for AnthropicClassifier {
    async fn classify(&self, pages: &[PathBuf]) -> Result<ClassificationResult, ProcessError> {
        if pages.is_empty() {
            return Err(ProcessError::ClassificationFailed(
                "no page images to classify".to_string(),
            ));
        }

        let mut content = Self::encode_pages(pages).await?;
        content.push(ContentBlock::Text {
            text: INSTRUCTION.to_string(),
        });
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![Message {
                role: "user",
                content,
            }],
        };

        debug!(model = %self.model, pages = pages.len(), "Sending classification request");
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", &self.api_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ProcessError::ClassificationFailed(format!("classification request failed: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProcessError::ClassificationFailed(format!("failed to read API response: {}", e))
        })?;

        if !status.is_success() {
            let message = api_error_message(status, &body);
            warn!(%status, "Classification request rejected");
            return Err(ProcessError::ClassificationFailed(message));
        }

        let text = first_text(&body)?;
        parse_classification(&text)
    }
}
