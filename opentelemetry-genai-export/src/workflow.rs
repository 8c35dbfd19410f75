//! The two-step agent workflow: an inference step followed by one tool call.

use crate::error::WorkflowError;
use crate::inference::{synthetic_output, synthetic_tool_call, InferenceBackend, SyntheticBackend};
use crate::observer::WorkflowObserver;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Name of the only tool this workflow provides.
pub const TOOL_GET_WEATHER: &str = "get_weather";
/// Human readable description of [`TOOL_GET_WEATHER`].
pub const TOOL_GET_WEATHER_DESCRIPTION: &str = "Get the current weather in a given location";
/// Query used when none is given.
pub const DEFAULT_USER_QUERY: &str = "What's the weather in Paris?";

pub(crate) const DEFAULT_LOCATION: &str = "Paris";

/// A tool invocation requested by the agent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolCall {
    /// Identifier assigned by the model.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Decoded JSON arguments.
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Arguments serialized as a compact JSON object.
    pub fn arguments_json(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }
}

/// Token counts reported for the inference step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Completion tokens.
    pub output_tokens: u64,
}

/// Normalized result of the agent step, whichever backend produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentOutput {
    /// Assistant text. Empty when the model only requested tools.
    pub content: String,
    /// Requested tool calls, in model order.
    pub tool_calls: Vec<ToolCall>,
    /// Model the request asked for.
    pub request_model: String,
    /// Model that actually answered.
    pub response_model: String,
    /// Provider response identifier.
    pub response_id: String,
    /// Token usage.
    pub usage: TokenUsage,
    /// Estimated cost in USD.
    pub cost_usd: f64,
    /// GenAI provider, e.g. `openai`.
    pub provider: String,
    /// Host of the inference server.
    pub server_address: String,
    /// Finish reason of each choice.
    pub finish_reasons: Vec<String>,
    /// `true` when a real backend answered instead of the synthetic one.
    pub delegated: bool,
}

/// Result of the `get_weather` tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WeatherReport {
    /// Temperature.
    pub temp: i64,
    /// Temperature unit.
    pub unit: String,
    /// Location the report is for.
    pub location: String,
}

/// Everything a run produced, including a failed tool step.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkflowOutput {
    /// The user query that started the run.
    pub query: String,
    /// Agent step output.
    pub agent: AgentOutput,
    /// The tool call that was executed.
    pub tool_call: ToolCall,
    /// Tool step outcome.
    pub tool: Result<WeatherReport, WorkflowError>,
}

impl WorkflowOutput {
    /// `true` if both steps completed.
    pub fn is_success(&self) -> bool {
        self.tool.is_ok()
    }
}

/// Executes `agent -> tool -> done` once per call to [`WorkflowRunner::run`].
#[derive(Debug)]
pub struct WorkflowRunner {
    backend: Box<dyn InferenceBackend>,
}

impl Default for WorkflowRunner {
    fn default() -> Self {
        Self::new(SyntheticBackend)
    }
}

impl WorkflowRunner {
    /// Creates a runner delegating the agent step to `backend`.
    pub fn new(backend: impl InferenceBackend + 'static) -> Self {
        WorkflowRunner {
            backend: Box::new(backend),
        }
    }

    /// Creates a runner from an already boxed backend.
    pub fn from_boxed(backend: Box<dyn InferenceBackend>) -> Self {
        WorkflowRunner { backend }
    }

    /// Runs both steps. A failing tool step does not abort: the error is
    /// carried in [`WorkflowOutput::tool`] so the trace can still be built.
    pub fn run(&self, query: &str, observer: &mut dyn WorkflowObserver) -> WorkflowOutput {
        observer.on_agent_start(query);
        let agent = match self.backend.complete(query) {
            Ok(output) => output,
            Err(err) => {
                warn!(
                    name: "Workflow.InferenceFailed",
                    error = %err,
                    "inference backend failed, using synthetic response"
                );
                synthetic_output()
            }
        };
        observer.on_agent_end(&agent);

        let tool_call = agent
            .tool_calls
            .first()
            .cloned()
            .unwrap_or_else(synthetic_tool_call);
        debug!(
            name: "Workflow.ToolSelected",
            tool = %tool_call.name,
            arguments = %tool_call.arguments_json(),
        );

        observer.on_tool_start(&tool_call);
        let tool = execute_tool(&tool_call);
        observer.on_tool_end(&tool_call, tool.as_ref());

        WorkflowOutput {
            query: query.to_string(),
            agent,
            tool_call,
            tool,
        }
    }
}

/// Executes a single tool call.
pub fn execute_tool(call: &ToolCall) -> Result<WeatherReport, WorkflowError> {
    if call.name != TOOL_GET_WEATHER {
        return Err(WorkflowError::UnknownTool(call.name.clone()));
    }
    let location = call
        .arguments
        .get("location")
        .and_then(Value::as_str)
        .filter(|location| !location.is_empty())
        .unwrap_or(DEFAULT_LOCATION);
    Ok(WeatherReport {
        temp: 18,
        unit: "celsius".to_string(),
        location: location.to_string(),
    })
}
