//! Seams for the two remote capabilities: image description and text generation.
//!
//! Both are opaque to the pipeline. `OpenAiClient` implements them over HTTP;
//! any `Fn` with the right signature does too, which is what the tests use.

use thiserror::Error;

use crate::ml::encode::EncodedImage;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("API credential is missing")]
    MissingCredential,

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Timeout | RemoteError::Network(_) => true,
            RemoteError::Status { status, .. } => *status == 429 || *status >= 500,
            RemoteError::MissingCredential | RemoteError::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout
        } else if e.is_decode() {
            RemoteError::InvalidResponse(e.to_string())
        } else {
            RemoteError::Network(e)
        }
    }
}

/// One image plus the instructions that go with it.
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    pub instruction: &'a str,
    pub prompt: &'a str,
    pub image: &'a EncodedImage,
}

/// A question to be answered from the assembled frame descriptions.
#[derive(Debug, Clone, Copy)]
pub struct ChatPrompt<'a> {
    pub system: &'a str,
    pub context: &'a str,
    pub question: &'a str,
}

impl ChatPrompt<'_> {
    pub fn user_message(&self) -> String {
        format!("Video context:\n{}\n\nQuestion: {}", self.context, self.question)
    }
}

pub trait VisionClient: Send + Sync {
    fn describe(&self, request: &VisionRequest<'_>) -> Result<String, RemoteError>;
}

pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &ChatPrompt<'_>) -> Result<String, RemoteError>;
}

impl<F> VisionClient for F
where
    F: Fn(&VisionRequest<'_>) -> Result<String, RemoteError> + Send + Sync,
{
    fn describe(&self, request: &VisionRequest<'_>) -> Result<String, RemoteError> {
        self(request)
    }
}

impl<F> TextGenerator for F
where
    F: Fn(&ChatPrompt<'_>) -> Result<String, RemoteError> + Send + Sync,
{
    fn generate(&self, prompt: &ChatPrompt<'_>) -> Result<String, RemoteError> {
        self(prompt)
    }
}

/// Pins a closure to the `VisionClient` call signature.
pub fn vision_fn<F>(f: F) -> F
where
    F: Fn(&VisionRequest<'_>) -> Result<String, RemoteError> + Send + Sync,
{
    f
}

/// Pins a closure to the `TextGenerator` call signature.
pub fn text_fn<F>(f: F) -> F
where
    F: Fn(&ChatPrompt<'_>) -> Result<String, RemoteError> + Send + Sync,
{
    f
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_layout() {
        let prompt = ChatPrompt {
            system: "sys",
            context: "At 0 sec: a cat",
            question: "Is there a cat?",
        };
        assert_eq!(
            prompt.user_message(),
            "Video context:\nAt 0 sec: a cat\n\nQuestion: Is there a cat?"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(RemoteError::Timeout.is_retryable());
        assert!(RemoteError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(RemoteError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!RemoteError::Status { status: 400, body: String::new() }.is_retryable());
        assert!(!RemoteError::MissingCredential.is_retryable());
    }

    #[test]
    fn test_closure_implements_text_generator() {
        let echo = text_fn(|p| Ok(p.question.to_uppercase()));
        let prompt = ChatPrompt { system: "", context: "", question: "hi" };
        assert_eq!(echo.generate(&prompt).unwrap(), "HI");
    }
}
