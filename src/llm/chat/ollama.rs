use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use super::{ ChatClient, CompletionError, CompletionResponse };
use crate::llm::LlmConfig;
use crate::models::chat::ChatTurn;
use log::info;

const PROVIDER: &str = "Ollama";

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<OllamaMessage>,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>) -> Self {
        let model = completion_model.unwrap_or_else(|| "llama3.1".to_string());
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Self {
            http: HttpClient::new(),
            base_url: url,
            completion_model: model,
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        if config.llm_type != crate::llm::LlmType::Ollama {
            return Err(CompletionError::Config {
                provider: PROVIDER,
                message: "Invalid config type for OllamaClient".to_string(),
            });
        }

        let mut client = Self::new(config.base_url.clone(), config.completion_model.clone());
        client.temperature = config.temperature;
        client.max_tokens = config.max_tokens;
        Ok(client)
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(
        &self,
        messages: &[ChatTurn]
    ) -> Result<CompletionResponse, CompletionError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let req = ChatRequest {
            model: self.completion_model.clone(),
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        info!("Sending request to Ollama at {} with model: {}", url, self.completion_model);
        let data = self.http.post(&url)
            .json(&req)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(CompletionError::http(PROVIDER))?
            .json::<ChatResponse>()
            .await
            .map_err(CompletionError::http(PROVIDER))?;

        let content = data.message
            .map(|m| m.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse(PROVIDER))?;

        Ok(CompletionResponse { response: content })
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
