//! Provider router — the [`ModelGateway`] implementation.
//!
//! Resolves `provider:model` identifiers to a registered [`Provider`],
//! caches one [`BoundModel`] per [`ModelConfig`], and classifies failures
//! as initialization or invocation errors.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use librarian_core::error::{Error, Result};
use librarian_core::message::Message;
use librarian_core::model::{ChunkStream, ModelConfig, ModelGateway};
use librarian_core::provider::{Provider, ProviderRequest, ToolDefinition};
use tracing::debug;

use crate::catalogue::KNOWN_MODELS;
use crate::openai_compat::OpenAiCompatProvider;

/// A provider resolved for one model configuration.
pub struct BoundModel {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl BoundModel {
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, messages: &[Message], tools: &[ToolDefinition], stream: bool) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: tools.to_vec(),
            stream,
        }
    }
}

/// Routes model invocations to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    bound: RwLock<HashMap<ModelConfig, Arc<BoundModel>>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            bound: RwLock::new(HashMap::new()),
        }
    }

    /// Register a provider under the prefix used in model identifiers.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a configuration to a bound model, reusing a cached one when
    /// an identical configuration was seen before.
    pub fn bind(&self, config: &ModelConfig) -> Result<Arc<BoundModel>> {
        if let Some(bound) = self.read_cache().get(config) {
            return Ok(bound.clone());
        }

        config
            .validate()
            .map_err(|e| Error::ModelInitialization(e.to_string()))?;
        let (provider_name, model) = config.provider_and_model().ok_or_else(|| {
            Error::ModelInitialization(format!("'{}' has no provider prefix", config.model))
        })?;
        let provider = self.get(provider_name).ok_or_else(|| {
            Error::ModelInitialization(format!("provider '{provider_name}' is not configured"))
        })?;

        debug!(provider = provider_name, model, "Binding model");
        let bound = Arc::new(BoundModel {
            provider,
            model: model.to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        });

        let mut cache = self.bound.write().unwrap_or_else(|p| p.into_inner());
        Ok(cache.entry(config.clone()).or_insert(bound).clone())
    }

    /// Number of cached bindings.
    pub fn bound_count(&self) -> usize {
        self.read_cache().len()
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ModelConfig, Arc<BoundModel>>> {
        self.bound.read().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelGateway for ProviderRouter {
    async fn invoke(
        &self,
        config: &ModelConfig,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message> {
        let bound = self.bind(config)?;
        let response = bound
            .provider
            .complete(bound.request(messages, tools, false))
            .await?;
        Ok(response.message)
    }

    async fn stream(
        &self,
        config: &ModelConfig,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChunkStream> {
        let bound = self.bind(config)?;
        let rx = bound
            .provider
            .stream(bound.request(messages, tools, true))
            .await?;
        Ok(rx)
    }

    fn models(&self) -> Vec<String> {
        KNOWN_MODELS.iter().map(|m| m.to_string()).collect()
    }
}

/// Build providers from configuration.
///
/// Every well-known provider with an API key is registered, plus every
/// provider listed in `[providers]`. Ollama needs no key and is always
/// available.
pub fn build_from_config(config: &librarian_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new();

    for (name, provider_config) in &config.providers {
        if provider_config.api_key.is_none() && provider_config.api_url.is_none() {
            continue;
        }
        let api_key = provider_config.api_key.clone().unwrap_or_default();
        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));

        router.register(
            name.clone(),
            Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key)),
        );
    }

    if router.get("ollama").is_none() {
        router.register("ollama", Arc::new(OpenAiCompatProvider::ollama(None)));
    }

    router
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "anthropic" => "https://api.anthropic.com/v1".into(),
        "google_genai" => "https://generativelanguage.googleapis.com/v1beta/openai".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
