//! Model gateway.
//!
//! The gateway is the only code that talks to the generation service. It
//! turns a prompt plus a stage schema into either one JSON document or an
//! ordered stream of text fragments that concatenate to one. Failures are
//! returned to the caller as-is; nothing here retries.

use crate::config::GeneratorConfig;
use crate::prompts::Prompt;
use crate::schema::Stage;
use async_trait::async_trait;
use claude::{Claude, Message, Request, StreamEvent, Tool};
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// A lazy, finite, non-restartable sequence of JSON text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, GatewayError>> + Send>>;

/// Errors from the generation service.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Model API error: {0}")]
    Api(#[from] claude::Error),

    #[error("The model reported an error: {0}")]
    Service(String),

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("The model did not produce a '{tool}' result")]
    MissingOutput { tool: &'static str },

    #[error("{0}")]
    Unavailable(String),
}

/// A request for one structured generation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub stage: Stage,
    pub system: String,
    pub prompt: String,
    pub schema: Value,
    pub temperature: Option<f32>,
    pub max_tokens: usize,
}

impl GenerationRequest {
    /// Build a request for `prompt` using the sampling settings in `config`.
    pub fn new(prompt: Prompt, config: &GeneratorConfig) -> Self {
        let (temperature, max_tokens) = if prompt.stage == Stage::Turn {
            (config.turn_temperature, config.turn_max_tokens)
        } else {
            (config.world_temperature, config.world_max_tokens)
        };

        Self {
            stage: prompt.stage,
            system: prompt.system.to_string(),
            prompt: prompt.text,
            schema: prompt.schema,
            temperature,
            max_tokens,
        }
    }
}

/// The generation service.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Generate one complete structured document.
    async fn generate(&self, request: GenerationRequest) -> Result<Value, GatewayError>;

    /// Generate a structured document as a stream of text fragments.
    async fn stream(&self, request: GenerationRequest) -> Result<FragmentStream, GatewayError>;
}

/// Image generation, used for faction emblems and scene illustrations.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Produce an image for `prompt`. `placeholder` is the image shown while
    /// waiting; services that refine an existing image may start from it.
    async fn generate(&self, prompt: &str, placeholder: &str) -> Result<String, GatewayError>;
}

/// Image generator used when no image service is configured. Always fails,
/// which callers treat as "no image".
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImages;

#[async_trait]
impl ImageGenerator for NoImages {
    async fn generate(&self, _prompt: &str, _placeholder: &str) -> Result<String, GatewayError> {
        Err(GatewayError::Unavailable(
            "image generation is not configured".to_string(),
        ))
    }
}

/// A 1x1 transparent PNG shown while an image is generated.
pub const PLACEHOLDER_IMAGE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Gateway backed by the Claude Messages API.
///
/// Structured output is obtained by forcing a single tool whose input schema
/// is the stage schema. Streaming yields the tool's `input_json_delta`
/// fragments verbatim.
#[derive(Debug, Clone)]
pub struct ClaudeGateway {
    client: Claude,
    request_timeout: Duration,
}

impl ClaudeGateway {
    pub fn new(client: Claude, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    /// Build a gateway from `ANTHROPIC_API_KEY` and the given configuration.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, GatewayError> {
        let mut client = Claude::from_env()?.with_timeout(config.request_timeout)?;
        if let Some(model) = &config.model {
            client = client.with_model(model);
        }
        Ok(Self::new(client, config.request_timeout))
    }

    fn build_request(&self, request: &GenerationRequest) -> Request {
        let tool = Tool {
            name: request.stage.tool_name().to_string(),
            description: request.stage.description().to_string(),
            input_schema: request.schema.clone(),
        };

        let mut api_request = Request::new(vec![Message::user(&request.prompt)])
            .with_system(&request.system)
            .with_max_tokens(request.max_tokens)
            .with_forced_tool(tool);

        if let Some(temperature) = request.temperature {
            api_request = api_request.with_temperature(temperature);
        }
        api_request
    }
}

#[async_trait]
impl ModelGateway for ClaudeGateway {
    #[instrument(skip_all, fields(stage = %request.stage, model = %self.client.model()))]
    async fn generate(&self, request: GenerationRequest) -> Result<Value, GatewayError> {
        let tool = request.stage.tool_name();
        let call = self.client.complete(self.build_request(&request));
        let response = tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| GatewayError::Timeout(self.request_timeout))??;

        debug!(output_tokens = response.usage.output_tokens, "stage generated");
        response
            .tool_input(tool)
            .cloned()
            .ok_or(GatewayError::MissingOutput { tool })
    }

    #[instrument(skip_all, fields(stage = %request.stage, model = %self.client.model()))]
    async fn stream(&self, request: GenerationRequest) -> Result<FragmentStream, GatewayError> {
        let call = self.client.stream(self.build_request(&request));
        let events = tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| GatewayError::Timeout(self.request_timeout))??;

        let fragments = events.filter_map(|event| async move {
            match event {
                Ok(StreamEvent::InputJsonDelta { partial_json, .. }) => Some(Ok(partial_json)),
                Ok(StreamEvent::Error { message }) => Some(Err(GatewayError::Service(message))),
                Ok(_) => None,
                Err(e) => Some(Err(GatewayError::Api(e))),
            }
        });

        Ok(Box::pin(fragments))
    }
}
