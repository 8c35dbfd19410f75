//! Workflow observers.
//!
//! The runner reports every state transition to a [`WorkflowObserver`].
//! [`SpanRecorder`] turns those notifications into span timings, and
//! [`LoggingObserver`] mirrors them to the `tracing` log. Both can be
//! combined by passing a tuple.

use crate::error::WorkflowError;
use crate::workflow::{AgentOutput, ToolCall, WeatherReport};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Receives workflow state transitions. Every method has a no-op default.
pub trait WorkflowObserver {
    /// The agent step is about to run.
    fn on_agent_start(&mut self, _query: &str) {}

    /// The agent step produced its output.
    fn on_agent_end(&mut self, _output: &AgentOutput) {}

    /// The tool step is about to run.
    fn on_tool_start(&mut self, _call: &ToolCall) {}

    /// The tool step completed or failed.
    fn on_tool_end(&mut self, _call: &ToolCall, _result: Result<&WeatherReport, &WorkflowError>) {}
}

impl<T: WorkflowObserver + ?Sized> WorkflowObserver for &mut T {
    fn on_agent_start(&mut self, query: &str) {
        (**self).on_agent_start(query)
    }

    fn on_agent_end(&mut self, output: &AgentOutput) {
        (**self).on_agent_end(output)
    }

    fn on_tool_start(&mut self, call: &ToolCall) {
        (**self).on_tool_start(call)
    }

    fn on_tool_end(&mut self, call: &ToolCall, result: Result<&WeatherReport, &WorkflowError>) {
        (**self).on_tool_end(call, result)
    }
}

impl<A: WorkflowObserver, B: WorkflowObserver> WorkflowObserver for (A, B) {
    fn on_agent_start(&mut self, query: &str) {
        self.0.on_agent_start(query);
        self.1.on_agent_start(query);
    }

    fn on_agent_end(&mut self, output: &AgentOutput) {
        self.0.on_agent_end(output);
        self.1.on_agent_end(output);
    }

    fn on_tool_start(&mut self, call: &ToolCall) {
        self.0.on_tool_start(call);
        self.1.on_tool_start(call);
    }

    fn on_tool_end(&mut self, call: &ToolCall, result: Result<&WeatherReport, &WorkflowError>) {
        self.0.on_tool_end(call, result);
        self.1.on_tool_end(call, result);
    }
}

/// Wall-clock boundaries of the two workflow steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageTimings {
    /// Agent step start.
    pub agent_start: SystemTime,
    /// Agent step end.
    pub agent_end: SystemTime,
    /// Tool step start.
    pub tool_start: SystemTime,
    /// Tool step end.
    pub tool_end: SystemTime,
}

impl StageTimings {
    /// All four boundaries at the same instant.
    pub fn at(instant: SystemTime) -> Self {
        StageTimings {
            agent_start: instant,
            agent_end: instant,
            tool_start: instant,
            tool_end: instant,
        }
    }
}

/// Records when each step started and ended.
#[derive(Clone, Debug, Default)]
pub struct SpanRecorder {
    agent_start: Option<SystemTime>,
    agent_end: Option<SystemTime>,
    tool_start: Option<SystemTime>,
    tool_end: Option<SystemTime>,
}

impl SpanRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded timings. Missing boundaries collapse onto the previous one,
    /// or onto the current time if nothing was recorded.
    pub fn timings(&self) -> StageTimings {
        let agent_start = self.agent_start.unwrap_or_else(SystemTime::now);
        let agent_end = self.agent_end.unwrap_or(agent_start);
        let tool_start = self.tool_start.unwrap_or(agent_end);
        let tool_end = self.tool_end.unwrap_or(tool_start);
        StageTimings {
            agent_start,
            agent_end,
            tool_start,
            tool_end,
        }
    }
}

impl WorkflowObserver for SpanRecorder {
    fn on_agent_start(&mut self, _query: &str) {
        self.agent_start = Some(SystemTime::now());
    }

    fn on_agent_end(&mut self, _output: &AgentOutput) {
        self.agent_end = Some(SystemTime::now());
    }

    fn on_tool_start(&mut self, _call: &ToolCall) {
        self.tool_start = Some(SystemTime::now());
    }

    fn on_tool_end(&mut self, _call: &ToolCall, _result: Result<&WeatherReport, &WorkflowError>) {
        self.tool_end = Some(SystemTime::now());
    }
}

/// Mirrors workflow transitions to the `tracing` log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingObserver;

fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

impl WorkflowObserver for LoggingObserver {
    fn on_agent_start(&mut self, query: &str) {
        info!(name: "Workflow.AgentStart", query = %snippet(query, 80));
    }

    fn on_agent_end(&mut self, output: &AgentOutput) {
        info!(
            name: "Workflow.AgentEnd",
            model = %output.response_model,
            delegated = output.delegated,
            tool_calls = output.tool_calls.len(),
            content_preview = %snippet(&output.content, 200),
        );
    }

    fn on_tool_start(&mut self, call: &ToolCall) {
        debug!(name: "Workflow.ToolStart", tool = %call.name, arguments = %call.arguments_json());
    }

    fn on_tool_end(&mut self, call: &ToolCall, result: Result<&WeatherReport, &WorkflowError>) {
        match result {
            Ok(report) => info!(
                name: "Workflow.ToolEnd",
                tool = %call.name,
                location = %report.location,
                temp = report.temp,
            ),
            Err(err) => warn!(name: "Workflow.ToolFailed", tool = %call.name, error = %err),
        }
    }
}
