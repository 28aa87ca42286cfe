use async_trait::async_trait;
use log::{ debug, error, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };
use serde_json::Value;

use super::ChatClient;
use crate::error::{ HelperError, Result };
use crate::llm::models::ModelListResponse;
use crate::llm::{
    build_completion_url,
    build_models_url,
    ApiConfig,
    DEFAULT_MAX_TOKENS,
    DEFAULT_TEMPERATURE,
};
use crate::models::chat::ChatMessage;

/// Client for OpenAI-compatible `chat/completions` and `models` endpoints.
pub struct OpenAIChatClient {
    http: HttpClient,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: Option<String>,
}

fn bearer(api_key: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {}", api_key))
        .map_err(|e| HelperError::Validation(format!("Invalid API key format: {}", e)))
}

impl OpenAIChatClient {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = HttpClient::builder().default_headers(headers).build()?;
        Ok(Self { http })
    }

    async fn error_from_response(url: &str, resp: reqwest::Response) -> HelperError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        error!("API Error: status={} url={} error={}", status, url, body);
        HelperError::Http { status, body }
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, config: &ApiConfig, messages: &[ChatMessage]) -> Result<String> {
        let url = build_completion_url(&config.endpoint);
        info!("Making API request to: {}", url);

        let req = OpenAIChatRequest {
            model: &config.model,
            messages,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        };

        let resp = self.http.post(&url)
            .header(AUTHORIZATION, bearer(&config.api_key)?)
            .json(&req)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::error_from_response(&url, resp).await);
        }

        let body = resp.text().await?;
        let parsed: OpenAIResponse = serde_json
            ::from_str(&body)
            .map_err(|e| HelperError::Parse(format!("Unexpected completion response: {}", e)))?;

        let content = parsed.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| HelperError::Parse("No response from API".to_string()))?;

        debug!("Completion returned {} characters", content.len());
        Ok(content)
    }

    async fn list_models(&self, endpoint: &str, api_key: &str) -> Result<Vec<String>> {
        let url = build_models_url(endpoint);
        info!("Listing models from: {}", url);

        let resp = self.http.get(&url)
            .header(AUTHORIZATION, bearer(api_key)?)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::error_from_response(&url, resp).await);
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| HelperError::Parse(format!("Model list is not valid JSON: {}", e)))?;
        Ok(ModelListResponse::from_value(body)?.into_model_ids())
    }
}
