//! Reply generation backends and the canned fallback set

use async_trait::async_trait;
use serde::Serialize;

use crate::emotion::EmotionLabel;
use crate::{Error, Result};

/// One message in a chat-completion exchange
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// An external reply generator
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce a reply for the conversation so far
    async fn reply(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Fixed empathetic reply keyed by the frame's dominant emotion label
///
/// Used when the responder fails or times out; wording follows the fallback
/// set of the therapeutic backend this gateway fronts.
#[must_use]
pub const fn fallback_reply(label: EmotionLabel) -> &'static str {
    match label {
        EmotionLabel::Stressed => {
            "I can sense you're feeling quite stressed right now. Let's take a slow breath together. What's weighing most heavily on your mind?"
        }
        EmotionLabel::Excited => {
            "There's a lot of energy in what you're sharing. What's got you feeling this way?"
        }
        EmotionLabel::Engaged => {
            "I can tell this really matters to you. Tell me more about it."
        }
        EmotionLabel::Relaxed => {
            "You seem at ease right now. What would you like to talk through while things feel calm?"
        }
        EmotionLabel::Focused => {
            "Your mind is clearly working hard on this. What feels most important to address first?"
        }
        EmotionLabel::Neutral => {
            "I hear you, and I want you to know that your feelings and experiences matter. I'm here to listen. Can you tell me more about what you're going through?"
        }
    }
}

/// Response from an OpenAI-compatible chat completion API
#[derive(serde::Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(serde::Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completion request body
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
}

/// Responder backed by an OpenAI-compatible chat completion API
pub struct ChatResponder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ChatResponder {
    /// Create a chat responder
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for responder".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            max_tokens,
        })
    }
}

#[async_trait]
impl Responder for ChatResponder {
    async fn reply(&self, messages: &[ChatMessage]) -> Result<String> {
        tracing::debug!(model = %self.model, turns = messages.len(), "requesting reply");

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&ChatCompletionRequest {
                model: &self.model,
                messages,
                max_tokens: self.max_tokens,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat completion error");
            return Err(Error::Responder(format!(
                "chat completion error {status}: {body}"
            )));
        }

        let result: ChatCompletionResponse = response.json().await?;
        let text = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::Responder("empty completion".to_string()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_label_has_a_nonempty_fallback() {
        for label in [
            EmotionLabel::Stressed,
            EmotionLabel::Excited,
            EmotionLabel::Engaged,
            EmotionLabel::Relaxed,
            EmotionLabel::Focused,
            EmotionLabel::Neutral,
        ] {
            assert!(!fallback_reply(label).is_empty());
        }
    }

    #[test]
    fn responder_requires_api_key() {
        assert!(ChatResponder::new(String::new(), "gpt-4o-mini".to_string(), 256).is_err());
    }

    #[test]
    fn completion_response_parses() {
        let json = r#"{"choices":[{"message":{"content":"hello"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("hello")
        );
    }
}
