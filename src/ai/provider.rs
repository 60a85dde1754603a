use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use super::AiError;
use crate::settings::{ApiSettings, Provider};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const ANTHROPIC_DEFAULT_MAX_TOKENS: u32 = 1024;
const ERROR_BODY_LIMIT: usize = 500;

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Anything that turns a prompt into reply text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError>;
}

/// A fully built provider request, ready to send.
#[derive(Clone, Debug)]
pub struct HttpCall {
    pub provider: Provider,
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

pub fn build_http_call(
    settings: &ApiSettings,
    request: &CompletionRequest,
) -> Result<HttpCall, AiError> {
    let api_key = settings.api_key.trim();
    if api_key.is_empty() {
        return Err(AiError::MissingApiKey);
    }
    let provider = Provider::from_name(&settings.provider)?;
    let model = settings
        .model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .unwrap_or_else(|| provider.default_model());
    let base = settings
        .base_url
        .as_deref()
        .map(str::trim)
        .filter(|base| !base.is_empty())
        .unwrap_or_else(|| provider.default_base_url())
        .trim_end_matches('/');

    let call = match provider {
        Provider::OpenAi => {
            let mut messages = Vec::new();
            if let Some(system) = &request.system {
                messages.push(json!({"role": "system", "content": system}));
            }
            messages.push(json!({"role": "user", "content": request.prompt}));
            let mut body = json!({
                "model": model,
                "messages": messages,
                "temperature": request.temperature,
            });
            if let Some(max_tokens) = request.max_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            HttpCall {
                provider,
                url: parse_endpoint(&format!("{base}/chat/completions"))?,
                headers: vec![("authorization", format!("Bearer {api_key}"))],
                body,
            }
        }
        Provider::Gemini => {
            let mut url = parse_endpoint(&format!("{base}/models/{model}:generateContent"))?;
            url.query_pairs_mut().append_pair("key", api_key);
            let mut contents = Vec::new();
            if let Some(system) = &request.system {
                contents.push(json!({"role": "user", "parts": [{"text": system}]}));
            }
            contents.push(json!({"role": "user", "parts": [{"text": request.prompt}]}));
            let mut generation_config = json!({"temperature": request.temperature});
            if let Some(max_tokens) = request.max_tokens {
                generation_config["maxOutputTokens"] = json!(max_tokens);
            }
            HttpCall {
                provider,
                url,
                headers: Vec::new(),
                body: json!({"contents": contents, "generationConfig": generation_config}),
            }
        }
        Provider::Anthropic => {
            let mut body = json!({
                "model": model,
                "max_tokens": request.max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
                "temperature": request.temperature,
                "messages": [{"role": "user", "content": request.prompt}],
            });
            if let Some(system) = &request.system {
                body["system"] = json!(system);
            }
            HttpCall {
                provider,
                url: parse_endpoint(&format!("{base}/messages"))?,
                headers: vec![
                    ("x-api-key", api_key.to_string()),
                    ("anthropic-version", ANTHROPIC_VERSION.to_string()),
                ],
                body,
            }
        }
    };
    Ok(call)
}

fn parse_endpoint(raw: &str) -> Result<Url, AiError> {
    Url::parse(raw).map_err(|err| AiError::InvalidEndpoint(format!("{raw}: {err}")))
}

/// Provider reply bodies, decoded per provider before mapping to text.
#[derive(Debug)]
pub enum ProviderReply {
    OpenAi(OpenAiReply),
    Gemini(GeminiReply),
    Anthropic(AnthropicReply),
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenAiReply {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiChoice {
    #[serde(default)]
    message: Option<TextContent<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeminiReply {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<TextBlock>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnthropicReply {
    #[serde(default)]
    content: Vec<TextBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct TextContent<T> {
    #[serde(default)]
    content: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct TextBlock {
    #[serde(default)]
    text: Option<String>,
}

impl ProviderReply {
    pub fn parse(provider: Provider, body: &str) -> Result<Self, AiError> {
        let reply = match provider {
            Provider::OpenAi => {
                Self::OpenAi(serde_json::from_str(body).map_err(AiError::JsonParseError)?)
            }
            Provider::Gemini => {
                Self::Gemini(serde_json::from_str(body).map_err(AiError::JsonParseError)?)
            }
            Provider::Anthropic => {
                Self::Anthropic(serde_json::from_str(body).map_err(AiError::JsonParseError)?)
            }
        };
        Ok(reply)
    }

    pub fn into_text(self) -> Result<String, AiError> {
        let text = match self {
            Self::OpenAi(reply) => reply
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message)
                .and_then(|message| message.content),
            Self::Gemini(reply) => reply
                .candidates
                .into_iter()
                .next()
                .and_then(|candidate| candidate.content)
                .and_then(|content| content.parts.into_iter().next())
                .and_then(|part| part.text),
            Self::Anthropic(reply) => reply
                .content
                .into_iter()
                .next()
                .and_then(|block| block.text),
        };
        text.filter(|text| !text.trim().is_empty())
            .ok_or(AiError::EmptyResponse)
    }
}

/// HTTP-backed client for the configured provider. Settings are checked on
/// each call so a missing key fails the call, not construction.
pub struct ProviderClient {
    http: reqwest::Client,
    settings: Option<ApiSettings>,
}

impl ProviderClient {
    pub fn new(http: reqwest::Client, settings: Option<ApiSettings>) -> Self {
        Self { http, settings }
    }
}

#[async_trait]
impl CompletionClient for ProviderClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        let settings = self.settings.as_ref().ok_or(AiError::MissingApiKey)?;
        let call = build_http_call(settings, request)?;
        debug!(
            provider = call.provider.as_str(),
            path = call.url.path(),
            "sending completion request"
        );

        let mut builder = self.http.post(call.url.clone()).json(&call.body);
        for (name, value) in &call.headers {
            builder = builder.header(*name, value);
        }
        let response = builder
            .send()
            .await
            .map_err(|err| AiError::network(err.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| AiError::NetworkFailure {
                status: Some(status.as_u16()),
                message: err.without_url().to_string(),
            })?;
        if !status.is_success() {
            warn!(
                provider = call.provider.as_str(),
                status = status.as_u16(),
                "provider returned an error status"
            );
            return Err(AiError::NetworkFailure {
                status: Some(status.as_u16()),
                message: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        ProviderReply::parse(call.provider, &body)?.into_text()
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn settings(provider: &str, base_url: Option<String>) -> ApiSettings {
        ApiSettings {
            provider: provider.to_string(),
            api_key: "test-key".to_string(),
            model: None,
            base_url,
        }
    }

    #[test]
    fn openai_call_uses_bearer_auth_and_system_message() {
        let request = CompletionRequest::new("hello")
            .with_system("be brief")
            .with_max_tokens(400);
        let call = build_http_call(&settings("openai", None), &request).expect("call");
        assert_eq!(
            call.url.as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            call.headers,
            vec![("authorization", "Bearer test-key".to_string())]
        );
        assert_eq!(call.body["model"], "gpt-3.5-turbo");
        assert_eq!(call.body["messages"][0]["role"], "system");
        assert_eq!(call.body["messages"][1]["content"], "hello");
        assert_eq!(call.body["max_tokens"], 400);
    }

    #[test]
    fn gemini_call_puts_model_in_path_and_key_in_query() {
        let mut settings = settings("gemini", None);
        settings.model = Some("gemini-pro".to_string());
        let call = build_http_call(&settings, &CompletionRequest::new("hi").with_max_tokens(2500))
            .expect("call");
        assert_eq!(
            call.url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent?key=test-key"
        );
        assert!(call.headers.is_empty());
        assert_eq!(call.body["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(call.body["generationConfig"]["maxOutputTokens"], 2500);
    }

    #[test]
    fn anthropic_call_sets_version_header_and_default_max_tokens() {
        let call = build_http_call(
            &settings("anthropic", Some("http://localhost:9/v1/".to_string())),
            &CompletionRequest::new("hi").with_system("coach"),
        )
        .expect("call");
        assert_eq!(call.url.as_str(), "http://localhost:9/v1/messages");
        assert!(call
            .headers
            .contains(&("anthropic-version", ANTHROPIC_VERSION.to_string())));
        assert!(call.headers.contains(&("x-api-key", "test-key".to_string())));
        assert_eq!(call.body["max_tokens"], ANTHROPIC_DEFAULT_MAX_TOKENS);
        assert_eq!(call.body["system"], "coach");
        assert_eq!(call.body["model"], crate::settings::DEFAULT_ANTHROPIC_MODEL);
    }

    #[test]
    fn blank_key_and_unknown_provider_fail_before_any_call() {
        let mut blank = settings("openai", None);
        blank.api_key = "  ".to_string();
        assert!(matches!(
            build_http_call(&blank, &CompletionRequest::new("x")),
            Err(AiError::MissingApiKey)
        ));
        assert!(matches!(
            build_http_call(&settings("cohere", None), &CompletionRequest::new("x")),
            Err(AiError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn replies_map_to_text_per_provider() {
        let openai = r#"{"choices":[{"message":{"content":"from openai"}}]}"#;
        let gemini = r#"{"candidates":[{"content":{"parts":[{"text":"from gemini"}]}}]}"#;
        let anthropic = r#"{"content":[{"type":"text","text":"from anthropic"}]}"#;
        assert_eq!(
            ProviderReply::parse(Provider::OpenAi, openai)
                .and_then(ProviderReply::into_text)
                .expect("text"),
            "from openai"
        );
        assert_eq!(
            ProviderReply::parse(Provider::Gemini, gemini)
                .and_then(ProviderReply::into_text)
                .expect("text"),
            "from gemini"
        );
        assert_eq!(
            ProviderReply::parse(Provider::Anthropic, anthropic)
                .and_then(ProviderReply::into_text)
                .expect("text"),
            "from anthropic"
        );
        assert!(matches!(
            ProviderReply::parse(Provider::OpenAi, r#"{"choices":[]}"#)
                .and_then(ProviderReply::into_text),
            Err(AiError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn client_posts_to_mock_openai() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "gpt-3.5-turbo"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "pong"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ProviderClient::new(
            reqwest::Client::new(),
            Some(settings("openai", Some(server.uri()))),
        );
        let text = client
            .complete(&CompletionRequest::new("ping"))
            .await
            .expect("reply");
        assert_eq!(text, "pong");
    }

    #[tokio::test]
    async fn client_sends_gemini_key_as_query_param() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-3-flash-preview:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "hola"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ProviderClient::new(
            reqwest::Client::new(),
            Some(settings("gemini", Some(server.uri()))),
        );
        let text = client
            .complete(&CompletionRequest::new("hi"))
            .await
            .expect("reply");
        assert_eq!(text, "hola");
    }

    #[tokio::test]
    async fn non_success_status_is_network_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = ProviderClient::new(
            reqwest::Client::new(),
            Some(settings("anthropic", Some(server.uri()))),
        );
        let err = client
            .complete(&CompletionRequest::new("hi"))
            .await
            .unwrap_err();
        match err {
            AiError::NetworkFailure { status, message } => {
                assert_eq!(status, Some(529));
                assert_eq!(message, "overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_settings_is_missing_api_key() {
        let client = ProviderClient::new(reqwest::Client::new(), None);
        assert!(matches!(
            client.complete(&CompletionRequest::new("hi")).await,
            Err(AiError::MissingApiKey)
        ));
    }
}
