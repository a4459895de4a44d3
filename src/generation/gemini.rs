//! Gemini `generateContent` client

use super::{ApiKey, GenerationClient, GenerationError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Async client for the Gemini REST API
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl GeminiClient {
    /// Build a client for `model`; the key has already been validated
    pub fn new(
        api_key: &ApiKey,
        base_url: &str,
        model: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, String> {
        if model.trim().is_empty() {
            return Err("missing Gemini model name".to_string());
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key.expose()).map_err(|_| "invalid Gemini API key".to_string())?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| format!("failed to build Gemini HTTP client: {}", e))?;

        let endpoint = format!(
            "{}/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            model
        );

        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            temperature,
        })
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(classify_status(status, &text));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Other(format!("failed to parse Gemini response: {}", e)))?;

        extract_text(parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn classify_transport_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(err.to_string())
    } else if err.is_connect() {
        GenerationError::ServiceUnavailable(err.to_string())
    } else {
        GenerationError::Other(err.to_string())
    }
}

/// Map a non-success HTTP response onto the failure taxonomy
fn classify_status(status: StatusCode, body: &str) -> GenerationError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| body.to_string());
    let message = format!("Gemini returned {}: {}", status, message);

    let reasons: Vec<&str> = detail
        .as_ref()
        .map(|d| {
            d.details
                .iter()
                .filter_map(|item| item.reason.as_deref())
                .collect()
        })
        .unwrap_or_default();
    let rpc_status = detail.as_ref().and_then(|d| d.status.as_deref());

    if reasons.contains(&"API_KEY_INVALID")
        || matches!(rpc_status, Some("UNAUTHENTICATED") | Some("PERMISSION_DENIED"))
    {
        return GenerationError::Auth(message);
    }
    if rpc_status == Some("RESOURCE_EXHAUSTED") {
        return GenerationError::RateLimited(message);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::Auth(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            GenerationError::Timeout(message)
        }
        StatusCode::NOT_FOUND => GenerationError::ServiceUnavailable(message),
        s if s.is_server_error() => GenerationError::ServiceUnavailable(message),
        s if s.is_client_error() => GenerationError::InvalidRequest(message),
        _ => GenerationError::Other(message),
    }
}

/// Join the text parts of the first candidate
fn extract_text(response: GenerateResponse) -> Result<String, GenerationError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GenerationError::Other(format!(
            "prompt blocked by Gemini: {}",
            reason
        )));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Other("Gemini response has no candidates".to_string()))?;

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(GenerationError::Other(format!(
            "Gemini response missing text content (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text)
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> GenerateResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"Use pheromone traps. "},{"text":"[Source p.12]"}],"role":"model"},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(
            extract_text(response).unwrap(),
            "Use pheromone traps. [Source p.12]"
        );
    }

    #[test]
    fn test_extract_text_without_candidates() {
        let response = parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
        assert!(matches!(extract_text(response), Err(GenerationError::Other(_))));

        let response = parse(r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#);
        assert!(matches!(extract_text(response), Err(GenerationError::Other(_))));
    }

    #[test]
    fn test_invalid_key_is_auth() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT","details":[{"@type":"type.googleapis.com/google.rpc.ErrorInfo","reason":"API_KEY_INVALID"}]}}"#;
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, body),
            GenerationError::Auth(_)
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "quota"),
            GenerationError::RateLimited(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, ""),
            GenerationError::Auth(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "models/x is not found"),
            GenerationError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            GenerationError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::GATEWAY_TIMEOUT, ""),
            GenerationError::Timeout(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "{}"),
            GenerationError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_resource_exhausted_is_rate_limited() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        match classify_status(StatusCode::TOO_MANY_REQUESTS, body) {
            GenerationError::RateLimited(message) => assert!(message.contains("Quota exceeded")),
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn test_endpoint_uses_model() {
        let key = ApiKey::parse("AIzaTest", "AIza").unwrap();
        let client = GeminiClient::new(
            &key,
            "https://example.test/v1beta/",
            "gemini-2.5-flash",
            0.2,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.endpoint,
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(client.model_name(), "gemini-2.5-flash");
    }
}
