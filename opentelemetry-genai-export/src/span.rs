//! Span records for one workflow run.
//!
//! A run yields exactly two spans that share a trace id: the `chat` span
//! for the inference step and its child, the `execute_tool` span.

use crate::observer::StageTimings;
use crate::workflow::{WorkflowOutput, TOOL_GET_WEATHER_DESCRIPTION};
use opentelemetry::trace::{SpanId, SpanKind, Status, TraceId};
use opentelemetry::{Array, KeyValue, StringValue, Value};
use opentelemetry_semantic_conventions::attribute as semconv;
use rand::Rng;
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// `gen_ai.provider.name`
pub const GEN_AI_PROVIDER_NAME: &str = "gen_ai.provider.name";
/// `gen_ai.input.messages`, JSON encoded.
pub const GEN_AI_INPUT_MESSAGES: &str = "gen_ai.input.messages";
/// `gen_ai.output.messages`, JSON encoded.
pub const GEN_AI_OUTPUT_MESSAGES: &str = "gen_ai.output.messages";
/// Estimated cost of the inference call in USD. Not part of the conventions.
pub const GEN_AI_COST: &str = "gen_ai.cost";
/// `gen_ai.tool.name`
pub const GEN_AI_TOOL_NAME: &str = "gen_ai.tool.name";
/// `gen_ai.tool.description`
pub const GEN_AI_TOOL_DESCRIPTION: &str = "gen_ai.tool.description";
/// `gen_ai.tool.type`
pub const GEN_AI_TOOL_TYPE: &str = "gen_ai.tool.type";
/// `gen_ai.tool.call.id`
pub const GEN_AI_TOOL_CALL_ID: &str = "gen_ai.tool.call.id";
/// `gen_ai.tool.call.arguments`, JSON encoded.
pub const GEN_AI_TOOL_CALL_ARGUMENTS: &str = "gen_ai.tool.call.arguments";
/// `gen_ai.tool.call.result`, JSON encoded.
pub const GEN_AI_TOOL_CALL_RESULT: &str = "gen_ai.tool.call.result";
/// `error.message`
pub const ERROR_MESSAGE: &str = "error.message";

const OPERATION_CHAT: &str = "chat";
const OPERATION_EXECUTE_TOOL: &str = "execute_tool";

/// Interface for generating IDs
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// Generate a new `TraceId`
    fn new_trace_id(&self) -> TraceId;

    /// Generate a new `SpanId`
    fn new_span_id(&self) -> SpanId;
}

/// Generates trace and span ids from the thread-local random generator.
#[derive(Clone, Debug, Default)]
pub struct RandomIdGenerator {
    _private: (),
}

impl IdGenerator for RandomIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        // all-zero ids are invalid
        TraceId::from(rand::rng().random::<u128>().max(1))
    }

    fn new_span_id(&self) -> SpanId {
        SpanId::from(rand::rng().random::<u64>().max(1))
    }
}

/// [`IdGenerator`] that increments a counter for each new ID. This helps
/// produce predictable IDs for testing.
#[derive(Clone, Debug)]
pub struct IncrementIdGenerator(Arc<AtomicU64>);

impl IncrementIdGenerator {
    /// Create a new [`IncrementIdGenerator`]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for IncrementIdGenerator {
    fn default() -> Self {
        Self(Arc::new(AtomicU64::new(1)))
    }
}

impl IdGenerator for IncrementIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        TraceId::from(self.0.fetch_add(1, Ordering::SeqCst) as u128)
    }

    fn new_span_id(&self) -> SpanId {
        SpanId::from(self.0.fetch_add(1, Ordering::SeqCst))
    }
}

/// A finished span, ready to be exported.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanRecord {
    /// Trace the span belongs to.
    pub trace_id: TraceId,
    /// Span identifier.
    pub span_id: SpanId,
    /// Parent span, `None` for the root.
    pub parent_span_id: Option<SpanId>,
    /// Span name.
    pub name: String,
    /// Span kind.
    pub kind: SpanKind,
    /// Start time.
    pub start_time: SystemTime,
    /// End time, never before `start_time`.
    pub end_time: SystemTime,
    /// Span attributes.
    pub attributes: Vec<KeyValue>,
    /// Span status.
    pub status: Status,
}

impl SpanRecord {
    /// Value of the attribute named `key`, if present.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }
}

/// Turns a [`WorkflowOutput`] into the `chat` and `execute_tool` spans.
#[derive(Debug)]
pub struct SpanBuilder<G = RandomIdGenerator> {
    id_generator: G,
}

impl Default for SpanBuilder<RandomIdGenerator> {
    fn default() -> Self {
        Self::new()
    }
}

impl SpanBuilder<RandomIdGenerator> {
    /// Builder using random ids.
    pub fn new() -> Self {
        SpanBuilder {
            id_generator: RandomIdGenerator::default(),
        }
    }
}

impl<G: IdGenerator> SpanBuilder<G> {
    /// Builder using the given id source.
    pub fn with_id_generator(id_generator: G) -> Self {
        SpanBuilder { id_generator }
    }

    /// Builds `(chat_span, tool_span)`.
    ///
    /// The tool span is always nested in the chat span, both in its parent
    /// id and in time, even if the recorded timings are out of order.
    pub fn build(&self, output: &WorkflowOutput, timings: &StageTimings) -> (SpanRecord, SpanRecord) {
        let trace_id = self.id_generator.new_trace_id();
        let chat_id = self.id_generator.new_span_id();
        let tool_id = self.id_generator.new_span_id();

        let chat_start = timings.agent_start;
        let tool_start = timings.tool_start.max(chat_start);
        let tool_end = timings.tool_end.max(tool_start);
        let chat_end = timings.agent_end.max(tool_end);

        let chat = SpanRecord {
            trace_id,
            span_id: chat_id,
            parent_span_id: None,
            name: format!("{OPERATION_CHAT} {}", output.agent.request_model),
            kind: SpanKind::Internal,
            start_time: chat_start,
            end_time: chat_end,
            attributes: chat_attributes(output),
            status: Status::Ok,
        };

        let (tool_attributes, status) = tool_attributes(output);
        let tool = SpanRecord {
            trace_id,
            span_id: tool_id,
            parent_span_id: Some(chat_id),
            name: format!("{OPERATION_EXECUTE_TOOL} {}", output.tool_call.name),
            kind: SpanKind::Internal,
            start_time: tool_start,
            end_time: tool_end,
            attributes: tool_attributes,
            status,
        };

        (chat, tool)
    }
}

fn string_array(values: &[String]) -> Value {
    Value::Array(Array::String(
        values.iter().cloned().map(StringValue::from).collect(),
    ))
}

fn chat_attributes(output: &WorkflowOutput) -> Vec<KeyValue> {
    let agent = &output.agent;
    let input_messages = json!([{
        "role": "user",
        "parts": [{ "type": "text", "content": output.query }],
    }]);

    let mut parts = Vec::new();
    if !agent.content.is_empty() {
        parts.push(json!({ "type": "text", "content": agent.content }));
    }
    for call in &agent.tool_calls {
        parts.push(json!({
            "type": "tool_call",
            "id": call.id,
            "name": call.name,
            "arguments": call.arguments,
        }));
    }
    let mut output_message = json!({ "role": "assistant", "parts": parts });
    if let Some(reason) = agent.finish_reasons.first() {
        output_message["finish_reason"] = json!(reason);
    }

    let mut attributes = vec![
        KeyValue::new(semconv::GEN_AI_OPERATION_NAME, OPERATION_CHAT),
        KeyValue::new(GEN_AI_PROVIDER_NAME, agent.provider.clone()),
        KeyValue::new(semconv::GEN_AI_REQUEST_MODEL, agent.request_model.clone()),
        KeyValue::new(semconv::GEN_AI_RESPONSE_MODEL, agent.response_model.clone()),
        KeyValue::new(semconv::GEN_AI_USAGE_INPUT_TOKENS, agent.usage.input_tokens as i64),
        KeyValue::new(semconv::GEN_AI_USAGE_OUTPUT_TOKENS, agent.usage.output_tokens as i64),
        KeyValue::new(GEN_AI_COST, agent.cost_usd),
        KeyValue::new(semconv::GEN_AI_RESPONSE_ID, agent.response_id.clone()),
        KeyValue::new(
            semconv::GEN_AI_RESPONSE_FINISH_REASONS,
            string_array(&agent.finish_reasons),
        ),
        KeyValue::new(GEN_AI_INPUT_MESSAGES, input_messages.to_string()),
        KeyValue::new(GEN_AI_OUTPUT_MESSAGES, json!([output_message]).to_string()),
    ];
    if !agent.server_address.is_empty() {
        attributes.push(KeyValue::new(semconv::SERVER_ADDRESS, agent.server_address.clone()));
    }
    attributes
}

fn tool_attributes(output: &WorkflowOutput) -> (Vec<KeyValue>, Status) {
    let call = &output.tool_call;
    let mut attributes = vec![
        KeyValue::new(semconv::GEN_AI_OPERATION_NAME, OPERATION_EXECUTE_TOOL),
        KeyValue::new(GEN_AI_TOOL_NAME, call.name.clone()),
        KeyValue::new(GEN_AI_TOOL_DESCRIPTION, TOOL_GET_WEATHER_DESCRIPTION),
        KeyValue::new(GEN_AI_TOOL_TYPE, "function"),
        KeyValue::new(GEN_AI_TOOL_CALL_ID, call.id.clone()),
        KeyValue::new(GEN_AI_TOOL_CALL_ARGUMENTS, call.arguments_json()),
    ];

    // scalar arguments are also exposed flat, e.g. `location`
    for (key, value) in &call.arguments {
        let value = match value {
            serde_json::Value::String(s) => Value::from(s.clone()),
            serde_json::Value::Bool(b) => Value::from(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::from(i),
                None => Value::from(n.as_f64().unwrap_or_default()),
            },
            _ => continue,
        };
        attributes.push(KeyValue::new(key.clone(), value));
    }

    let status = match &output.tool {
        Ok(report) => {
            // the resolved location wins over whatever the model passed
            attributes.retain(|kv| kv.key.as_str() != "location");
            attributes.push(KeyValue::new("location", report.location.clone()));
            attributes.push(KeyValue::new(
                GEN_AI_TOOL_CALL_RESULT,
                serde_json::to_string(report).unwrap_or_default(),
            ));
            Status::Ok
        }
        Err(err) => {
            attributes.push(KeyValue::new(semconv::ERROR_TYPE, err.error_type()));
            attributes.push(KeyValue::new(ERROR_MESSAGE, err.to_string()));
            Status::error(err.to_string())
        }
    };

    (attributes, status)
}
