//! OpenAI-compatible chat completions client.
//!
//! Serves both remote capabilities: image description (vision model, image
//! passed as a base64 data URL) and question answering (text model).

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ml::remote::{ChatPrompt, RemoteError, TextGenerator, VisionClient, VisionRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub vision_model: String,
    pub text_model: String,
    pub vision_max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            vision_model: "gpt-4o".to_string(),
            text_model: "gpt-4".to_string(),
            vision_max_tokens: 200,
            temperature: 0.7,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(String),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct OpenAiClient {
    http: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RemoteError::Network)?;
        Ok(Self { http, config })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key().is_some()
    }

    fn api_key(&self) -> Option<&str> {
        self.config.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    fn complete(&self, request: &ChatCompletionRequest<'_>) -> Result<String, RemoteError> {
        let key = self.api_key().ok_or(RemoteError::MissingCredential)?;
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        debug!("POST {} (model {})", url, request.model);
        let response = self.http.post(&url).bearer_auth(key).json(request).send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| RemoteError::InvalidResponse("no message content in response".to_string()))
    }
}

impl VisionClient for OpenAiClient {
    fn describe(&self, request: &VisionRequest<'_>) -> Result<String, RemoteError> {
        let body = ChatCompletionRequest {
            model: &self.config.vision_model,
            messages: vec![
                Message {
                    role: "system",
                    content: MessageContent::Text(request.instruction.to_string()),
                },
                Message {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text { text: request.prompt },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: request.image.data_url(),
                            },
                        },
                    ]),
                },
            ],
            max_tokens: Some(self.config.vision_max_tokens),
            temperature: None,
        };
        self.complete(&body)
    }
}

impl TextGenerator for OpenAiClient {
    fn generate(&self, prompt: &ChatPrompt<'_>) -> Result<String, RemoteError> {
        let body = ChatCompletionRequest {
            model: &self.config.text_model,
            messages: vec![
                Message {
                    role: "system",
                    content: MessageContent::Text(prompt.system.to_string()),
                },
                Message {
                    role: "user",
                    content: MessageContent::Text(prompt.user_message()),
                },
            ],
            max_tokens: None,
            temperature: Some(self.config.temperature),
        };
        self.complete(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::encode::EncodedImage;
    use serde_json::json;

    #[test]
    fn test_vision_request_shape() {
        let image = EncodedImage::from_bytes("image/jpeg", b"xyz");
        let body = ChatCompletionRequest {
            model: "gpt-4o",
            messages: vec![Message {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text { text: "describe" },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image.data_url() },
                    },
                ]),
            }],
            max_tokens: Some(200),
            temperature: None,
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "model": "gpt-4o",
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": "describe"},
                        {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,eHl6"}}
                    ]
                }],
                "max_tokens": 200
            })
        );
    }

    #[test]
    fn test_missing_key_fails_without_network() {
        let client = OpenAiClient::new(OpenAiConfig {
            api_key: Some("  ".to_string()),
            base_url: "http://127.0.0.1:9".to_string(),
            ..OpenAiConfig::default()
        })
        .unwrap();
        assert!(!client.has_credential());

        let prompt = ChatPrompt { system: "s", context: "c", question: "q" };
        assert!(matches!(client.generate(&prompt), Err(RemoteError::MissingCredential)));
    }
}
