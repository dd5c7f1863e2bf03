//! Model selection and the model gateway seam.
//!
//! [`ModelConfig`] picks a model; [`ModelGateway`] turns a configuration,
//! a message log and a tool set into the next assistant message.

use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{Error, ProviderError, Result};
use crate::message::Message;
use crate::provider::{StreamChunk, ToolDefinition};

pub const DEFAULT_MODEL: &str = "openai:gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Model selection for a turn. Also the cache key for bound model handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// `"provider:model"` identifier, e.g. `"openai:gpt-4o-mini"`.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Split `"provider:model"` into its two halves.
    pub fn provider_and_model(&self) -> Option<(&str, &str)> {
        match self.model.split_once(':') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
                Some((provider, model))
            }
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider_and_model().is_none() {
            return Err(Error::InvalidRequest(format!(
                "model must look like 'provider:model', got '{}'",
                self.model
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::InvalidRequest(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == Some(0) {
            return Err(Error::InvalidRequest("max_tokens must be positive".into()));
        }
        Ok(())
    }
}

impl PartialEq for ModelConfig {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model
            && self.temperature.to_bits() == other.temperature.to_bits()
            && self.max_tokens == other.max_tokens
    }
}

impl Eq for ModelConfig {}

impl Hash for ModelConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.model.hash(state);
        self.temperature.to_bits().hash(state);
        self.max_tokens.hash(state);
    }
}

/// Receiver half of a streamed model response.
pub type ChunkStream = mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>;

/// Produces the next assistant message for a conversation.
///
/// Implementations resolve the model named in the configuration, bind the
/// tool definitions and call the backend. Unresolvable models fail with
/// [`Error::ModelInitialization`]; backend failures with
/// [`Error::ModelInvocation`].
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn invoke(
        &self,
        config: &ModelConfig,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message>;

    /// Stream the next assistant message as content deltas plus a final chunk
    /// carrying any tool calls.
    ///
    /// Default implementation calls `invoke()` and emits a single final chunk.
    async fn stream(
        &self,
        config: &ModelConfig,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChunkStream> {
        let message = self.invoke(config, messages, tools).await?;
        if !message.is_assistant() {
            return Err(Error::RoutingInvariant {
                found: message.role().to_string(),
            });
        }
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(Ok(StreamChunk::finished(&message, None))).await;
        Ok(rx)
    }

    /// Model identifiers this gateway can serve.
    fn models(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.model, "openai:gpt-4o-mini");
        assert!((config.temperature - 1.0).abs() < f32::EPSILON);
        assert!(config.max_tokens.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserializes_partial_config() {
        let config: ModelConfig = serde_json::from_str(r#"{"model":"groq:llama3-8b"}"#).unwrap();
        assert_eq!(config.model, "groq:llama3-8b");
        assert!((config.temperature - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn provider_split() {
        let config = ModelConfig::new("anthropic:claude-3-5-sonnet");
        assert_eq!(config.provider_and_model(), Some(("anthropic", "claude-3-5-sonnet")));
        assert!(ModelConfig::new("gpt-4o").provider_and_model().is_none());
        assert!(ModelConfig::new(":gpt-4o").provider_and_model().is_none());
    }

    #[test]
    fn validation_rejects_out_of_range() {
        assert!(ModelConfig::default().with_temperature(2.5).validate().is_err());
        assert!(ModelConfig::default().with_temperature(-0.1).validate().is_err());
        assert!(ModelConfig::default().with_max_tokens(0).validate().is_err());
        assert!(ModelConfig::new("nope").validate().is_err());
        assert!(ModelConfig::default().with_temperature(0.0).validate().is_ok());
    }

    #[test]
    fn usable_as_cache_key() {
        let mut set = HashSet::new();
        set.insert(ModelConfig::default());
        set.insert(ModelConfig::default());
        set.insert(ModelConfig::default().with_temperature(0.5));
        assert_eq!(set.len(), 2);
    }

    struct FixedGateway;

    #[async_trait]
    impl ModelGateway for FixedGateway {
        async fn invoke(&self, _: &ModelConfig, _: &[Message], _: &[ToolDefinition]) -> Result<Message> {
            Ok(Message::assistant("fixed"))
        }
    }

    #[tokio::test]
    async fn default_stream_wraps_invoke() {
        let mut rx = FixedGateway
            .stream(&ModelConfig::default(), &[], &[])
            .await
            .unwrap();
        let chunk = rx.recv().await.unwrap().unwrap();
        assert!(chunk.done);
        assert_eq!(chunk.content.as_deref(), Some("fixed"));
        assert!(rx.recv().await.is_none());
    }
}
