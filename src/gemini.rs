use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Failures from a generateContent call.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Non-success HTTP status, carrying the message from the error body
    /// (or one synthesized from the status when the body is unreadable).
    #[error("{message}")]
    Api { status: u16, message: String },
    /// The request never produced an HTTP response.
    #[error("{0}")]
    Network(String),
    /// Success status but no extractable text in the first candidate.
    #[error("Received an empty response from the API.")]
    EmptyResponse,
}

impl ApiError {
    /// A 400 whose message names an invalid API key is terminal for the
    /// session: the caller wipes the key and the chat history.
    pub fn is_invalid_api_key(&self) -> bool {
        match self {
            ApiError::Api { status: 400, message } => {
                message.to_lowercase().contains("api key not valid")
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiModel {
    Flash25Preview,
    Pro,
}

impl GeminiModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeminiModel::Flash25Preview => "gemini-2.5-flash-preview-05-20",
            GeminiModel::Pro => "gemini-pro",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GeminiModel::Flash25Preview => "Gemini 2.5 Flash",
            GeminiModel::Pro => "Gemini Pro",
        }
    }

    pub fn all() -> Vec<GeminiModel> {
        vec![GeminiModel::Flash25Preview, GeminiModel::Pro]
    }

    pub fn next(&self) -> GeminiModel {
        let models = Self::all();
        let idx = models.iter().position(|m| m == self).unwrap_or(0);
        models[(idx + 1) % models.len()]
    }

    pub fn prev(&self) -> GeminiModel {
        let models = Self::all();
        let idx = models.iter().position(|m| m == self).unwrap_or(0);
        models[(idx + models.len() - 1) % models.len()]
    }
}

/// Generation parameters for the next request. Edits made in the settings
/// panel only affect requests spawned after the edit.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub system_prompt: String,
    pub model: GeminiModel,
    pub temperature: f64,
    pub top_p: f64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful assistant.".to_string(),
            model: GeminiModel::Flash25Preview,
            temperature: 0.7,
            top_p: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub text: String,
}

/// One entry in the model-facing conversation. Role is "user" or "model";
/// error turns from the transcript never reach this type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_p: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn build_request(
    history: Vec<Content>,
    prompt: &str,
    settings: &GenerationSettings,
) -> GenerateRequest {
    let mut contents = history;
    contents.push(Content::new("user", prompt));
    GenerateRequest {
        contents,
        system_instruction: SystemInstruction {
            parts: vec![Part {
                text: settings.system_prompt.clone(),
            }],
        },
        generation_config: GenerationConfig {
            temperature: settings.temperature,
            top_p: settings.top_p,
        },
    }
}

fn extract_text(response: &GenerateResponse) -> Option<String> {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .and_then(|c| c.parts.first())
        .map(|p| p.text.clone())
        .filter(|t| !t.is_empty())
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    /// Issues exactly one generateContent call. `history` is the prior
    /// conversation in order; the new prompt is appended as the final user
    /// entry. The full response is awaited, no retries, no streaming.
    pub async fn complete(
        &self,
        history: Vec<Content>,
        prompt: &str,
        settings: &GenerationSettings,
        api_key: &str,
    ) -> Result<String, ApiError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url,
            settings.model.as_str(),
            api_key
        );

        let request = build_request(history, prompt, settings);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(ErrorBody {
                    error: Some(detail),
                }) if !detail.message.is_empty() => detail.message,
                _ => format!("API Error: {}", status.as_u16()),
            };
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        extract_text(&body).ok_or(ApiError::EmptyResponse)
    }
}
