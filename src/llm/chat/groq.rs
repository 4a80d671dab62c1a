use async_trait::async_trait;
use log::info;
use reqwest::{Client as HttpClient, header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION}};
use serde::{Deserialize, Serialize};

use super::{ChatClient, CompletionError, CompletionResponse};
use crate::llm::LlmConfig;
use crate::models::chat::ChatTurn;

const PROVIDER: &str = "Groq";

pub struct GroqChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct GroqMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct GroqRequest {
    messages: Vec<GroqMessage>,
    model: String,
    temperature: f32,
    #[serde(rename = "max_tokens")]
    max_tokens: u32,
}

#[derive(Deserialize)]
struct GroqResponse {
    choices: Vec<GroqChoice>,
}

#[derive(Deserialize)]
struct GroqChoice {
    message: GroqMessage,
}

impl GroqChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, CompletionError> {
        let chat_model = model.unwrap_or_else(|| "llama-3.1-8b-instant".to_string());
        let api_url = base_url.unwrap_or_else(|| "https://api.groq.com/openai/v1".to_string());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| CompletionError::Config {
                    provider: PROVIDER,
                    message: format!("Invalid API key format: {}", e),
                })?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(CompletionError::http(PROVIDER))?;

        Ok(Self {
            http,
            model: chat_model,
            base_url: api_url,
            temperature: 0.7,
            max_tokens: 1024,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CompletionError::Config {
                provider: PROVIDER,
                message: "Groq API key is required".to_string(),
            })?;

        let mut client = Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
        )?;
        client.temperature = config.temperature;
        client.max_tokens = config.max_tokens;
        Ok(client)
    }
}

#[async_trait]
impl ChatClient for GroqChatClient {
    async fn complete(
        &self,
        messages: &[ChatTurn]
    ) -> Result<CompletionResponse, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let req = GroqRequest {
            messages: messages
                .iter()
                .map(|m| GroqMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        info!("Sending request to Groq API with model: {}", self.model);
        let resp = self.http.post(&url)
            .json(&req)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(CompletionError::http(PROVIDER))?
            .json::<GroqResponse>()
            .await
            .map_err(CompletionError::http(PROVIDER))?;

        let content = resp.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse(PROVIDER))?;

        Ok(CompletionResponse { response: content })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
