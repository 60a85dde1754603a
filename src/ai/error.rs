use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("no API key configured; run `goalpilot settings set-api` first")]
    MissingApiKey,
    #[error("unsupported provider '{0}' (expected openai, gemini or anthropic)")]
    UnsupportedProvider(String),
    #[error("invalid provider endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("{}", network_message(.status, .message))]
    NetworkFailure {
        status: Option<u16>,
        message: String,
    },
    #[error("provider returned an empty response")]
    EmptyResponse,
    #[error("no JSON found in provider response")]
    NoJsonFound,
    #[error("could not parse JSON from provider response: {0}")]
    JsonParseError(#[source] serde_json::Error),
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
}

impl AiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            status: None,
            message: message.into(),
        }
    }
}

fn network_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("provider request failed ({code}): {message}"),
        None => format!("provider request failed: {message}"),
    }
}
