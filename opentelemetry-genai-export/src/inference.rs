//! Backends for the agent step.
//!
//! Without configuration the agent step is answered by [`SyntheticBackend`],
//! which returns a fixed `get_weather` tool call. Setting `OPENAI_BASE_URL`
//! delegates it to any OpenAI-compatible chat completions server (LM Studio,
//! Ollama, vLLM, the OpenAI API itself).

use crate::config::EnvSource;
use crate::error::InferenceError;
use crate::workflow::{AgentOutput, TokenUsage, ToolCall, TOOL_GET_WEATHER, TOOL_GET_WEATHER_DESCRIPTION};
use http::Uri;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Base URL of an OpenAI-compatible server. Empty or unset disables delegation.
pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
/// Bearer token sent to the server.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Model requested from the server.
pub const OPENAI_MODEL: &str = "OPENAI_MODEL";

const OPENAI_API_KEY_DEFAULT: &str = "lm-studio";
const OPENAI_MODEL_DEFAULT: &str = "local";
const INFERENCE_TIMEOUT_DEFAULT: Duration = Duration::from_secs(30);

const SYNTHETIC_MODEL: &str = "gpt-4o";
const SYNTHETIC_RESPONSE_ID: &str = "chatcmpl-synthetic-abc123";
const SYNTHETIC_TOOL_CALL_ID: &str = "call_synthetic_xyz";
const SYNTHETIC_SERVER_ADDRESS: &str = "api.openai.com";
const PROVIDER_OPENAI: &str = "openai";

// USD per token, used to estimate the cost of delegated calls
const INPUT_TOKEN_PRICE: f64 = 2.5e-6;
const OUTPUT_TOKEN_PRICE: f64 = 1e-5;

/// Produces the agent step output for a user query.
pub trait InferenceBackend: Debug {
    /// Answers `query`. Errors are recoverable: the runner falls back to
    /// the synthetic output.
    fn complete(&self, query: &str) -> Result<AgentOutput, InferenceError>;
}

/// Always answers with the same `get_weather` tool call.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyntheticBackend;

impl InferenceBackend for SyntheticBackend {
    fn complete(&self, _query: &str) -> Result<AgentOutput, InferenceError> {
        Ok(synthetic_output())
    }
}

/// The fixed tool call `get_weather({"location": "Paris"})`.
pub fn synthetic_tool_call() -> ToolCall {
    let mut arguments = Map::new();
    arguments.insert("location".into(), Value::from("Paris"));
    ToolCall {
        id: SYNTHETIC_TOOL_CALL_ID.into(),
        name: TOOL_GET_WEATHER.into(),
        arguments,
    }
}

/// The fixed agent output used when no backend is configured or it failed.
pub fn synthetic_output() -> AgentOutput {
    AgentOutput {
        content: String::new(),
        tool_calls: vec![synthetic_tool_call()],
        request_model: SYNTHETIC_MODEL.into(),
        response_model: SYNTHETIC_MODEL.into(),
        response_id: SYNTHETIC_RESPONSE_ID.into(),
        usage: TokenUsage {
            input_tokens: 42,
            output_tokens: 18,
        },
        cost_usd: 0.0012,
        provider: PROVIDER_OPENAI.into(),
        server_address: SYNTHETIC_SERVER_ADDRESS.into(),
        finish_reasons: vec!["tool_calls".into()],
        delegated: false,
    }
}

/// Connection settings for an OpenAI-compatible server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenAiConfig {
    /// Base URL, e.g. `http://localhost:1234/v1`.
    pub base_url: String,
    /// Bearer token.
    pub api_key: String,
    /// Requested model.
    pub model: String,
    /// Upper bound for the completion request.
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Reads the `OPENAI_*` variables. Returns `None` when `OPENAI_BASE_URL`
    /// is unset or blank.
    pub fn from_env<E: EnvSource + ?Sized>(env: &E) -> Option<Self> {
        let base_url = env
            .var(OPENAI_BASE_URL)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())?;
        Some(OpenAiConfig {
            base_url,
            api_key: env
                .var(OPENAI_API_KEY)
                .unwrap_or_else(|| OPENAI_API_KEY_DEFAULT.to_string()),
            model: env
                .var(OPENAI_MODEL)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| OPENAI_MODEL_DEFAULT.to_string()),
            timeout: INFERENCE_TIMEOUT_DEFAULT,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn server_address(&self) -> String {
        self.base_url
            .parse::<Uri>()
            .ok()
            .and_then(|uri| uri.host().map(str::to_string))
            .unwrap_or_default()
    }
}

/// Delegates the agent step to an OpenAI-compatible chat completions API.
#[derive(Debug)]
pub struct OpenAiBackend {
    config: OpenAiConfig,
    client: reqwest::blocking::Client,
}

impl OpenAiBackend {
    /// Creates a backend with its own HTTP client.
    pub fn new(config: OpenAiConfig) -> Result<Self, InferenceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InferenceError::ClientBuild(e.to_string()))?;
        Ok(OpenAiBackend { config, client })
    }

    /// The backend configuration.
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }
}

impl InferenceBackend for OpenAiBackend {
    fn complete(&self, query: &str) -> Result<AgentOutput, InferenceError> {
        let url = self.config.completions_url();
        debug!(name: "Inference.Request", url = %url, model = %self.config.model);

        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": query }],
            "tools": [get_weather_tool_definition()],
        });
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let completion: ChatCompletion = response.json()?;
        let output = normalize(completion, &self.config)?;
        info!(
            name: "Inference.Response",
            model = %output.response_model,
            content_length = output.content.len(),
            tool_calls = output.tool_calls.len(),
        );
        Ok(output)
    }
}

/// Picks the backend configured in `env`, falling back to the synthetic one.
pub fn backend_from_env<E: EnvSource + ?Sized>(env: &E) -> Box<dyn InferenceBackend> {
    let Some(config) = OpenAiConfig::from_env(env) else {
        info!(
            name: "Inference.Synthetic",
            "OPENAI_BASE_URL unset, using synthetic response"
        );
        return Box::new(SyntheticBackend);
    };
    info!(name: "Inference.Delegated", base_url = %config.base_url, model = %config.model);
    match OpenAiBackend::new(config) {
        Ok(backend) => Box::new(backend),
        Err(err) => {
            warn!(name: "Inference.ClientBuildFailed", error = %err, "using synthetic response");
            Box::new(SyntheticBackend)
        }
    }
}

fn get_weather_tool_definition() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": TOOL_GET_WEATHER,
            "description": TOOL_GET_WEATHER_DESCRIPTION,
            "parameters": {
                "type": "object",
                "properties": {
                    "location": { "type": "string", "description": "City name" }
                },
                "required": ["location"],
            },
        },
    })
}

fn estimate_cost(usage: TokenUsage) -> f64 {
    usage.input_tokens as f64 * INPUT_TOKEN_PRICE + usage.output_tokens as f64 * OUTPUT_TOKEN_PRICE
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ApiFunction,
}

#[derive(Debug, Deserialize)]
struct ApiFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

fn normalize(
    completion: ChatCompletion,
    config: &OpenAiConfig,
) -> Result<AgentOutput, InferenceError> {
    let finish_reasons = completion
        .choices
        .iter()
        .filter_map(|choice| choice.finish_reason.clone())
        .collect();
    let message = completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| InferenceError::InvalidResponse("response has no choices".into()))?;

    let mut tool_calls = Vec::new();
    for (idx, call) in message.tool_calls.unwrap_or_default().into_iter().enumerate() {
        let raw = call.function.arguments.unwrap_or_default();
        let arguments = if raw.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str::<Map<String, Value>>(&raw).map_err(|e| {
                InferenceError::InvalidResponse(format!("tool call arguments are not a JSON object: {e}"))
            })?
        };
        tool_calls.push(ToolCall {
            id: call.id.unwrap_or_else(|| format!("call_{idx}")),
            name: call.function.name.unwrap_or_else(|| TOOL_GET_WEATHER.to_string()),
            arguments,
        });
    }
    if tool_calls.is_empty() {
        // keep the tool step meaningful for models without tool support
        tool_calls.push(synthetic_tool_call());
    }

    let usage = completion
        .usage
        .map(|usage| TokenUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
        .unwrap_or_default();

    Ok(AgentOutput {
        content: message.content.unwrap_or_default(),
        tool_calls,
        request_model: config.model.clone(),
        response_model: completion
            .model
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| SYNTHETIC_MODEL.to_string()),
        response_id: completion.id.unwrap_or_default(),
        usage,
        cost_usd: estimate_cost(usage),
        provider: PROVIDER_OPENAI.into(),
        server_address: config.server_address(),
        finish_reasons,
        delegated: true,
    })
}
