//! # OpenTelemetry GenAI workflow export
//!
//! Runs a minimal two-step agent workflow (an inference step followed by a
//! tool-execution step) and exports its trace over OTLP/HTTP. Every run
//! produces exactly one trace made of two spans:
//!
//! - `chat {model}`: the inference step, carrying the GenAI attribute set
//!   (model, token usage, cost, response id, input/output messages).
//! - `execute_tool {tool}`: child of the chat span, carrying the tool name,
//!   its serialized arguments and its serialized result.
//!
//! The same trace can be sent to an OpenTelemetry collector or to any GenAI
//! observability vendor that accepts OTLP/HTTP, by pointing the standard
//! exporter environment variables at it.
//!
//! ## Configuration
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_TRACES_ENDPOINT` | Used verbatim as the traces URL |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | Base URL, `/v1/traces` is appended |
//! | `OTEL_EXPORTER_OTLP_TRACES_HEADERS` / `OTEL_EXPORTER_OTLP_HEADERS` | `k1=v1,k2=v2` request headers |
//! | `OTEL_EXPORTER_OTLP_TRACES_TIMEOUT` / `OTEL_EXPORTER_OTLP_TIMEOUT` | Request timeout in milliseconds |
//! | `OTEL_EXPORTER_OTLP_TRACES_PROTOCOL` / `OTEL_EXPORTER_OTLP_PROTOCOL` | `http/protobuf` or `http/json` |
//! | `OTEL_EXPORTER_OTLP_TRACES_COMPRESSION` / `OTEL_EXPORTER_OTLP_COMPRESSION` | `gzip` or `none` |
//! | `OTEL_EXPORTER_OTLP_TRACES_VERIFY_TLS` | `true` turns certificate verification on |
//! | `OTEL_SERVICE_NAME` | `service.name` resource attribute |
//! | `OPENAI_BASE_URL`, `OPENAI_API_KEY`, `OPENAI_MODEL` | Delegate the agent step to an OpenAI-compatible server |
//!
//! ## TLS verification
//!
//! Certificate verification is **disabled by default** so the export keeps
//! working behind TLS-intercepting proxies. This lowers the security of the
//! export channel: anyone able to intercept the connection can read or
//! forge the telemetry. Set `OTEL_EXPORTER_OTLP_TRACES_VERIFY_TLS=true` when
//! the network path does not rewrite certificates. A warning is logged on
//! every run that exports with verification disabled.
//!
//! ## Exit status
//!
//! [`run`] returns [`ExitStatus::Success`] only when the workflow completed
//! and the collector accepted the export. Every other outcome maps to
//! [`ExitStatus::Failure`].
#![warn(missing_debug_implementations, missing_docs)]

pub mod config;
pub mod controller;
pub mod error;
pub mod inference;
pub mod observer;
pub mod span;
pub mod transform;
pub mod transport;
pub mod workflow;

pub use config::{
    resolve, Compression, EndpointConfig, EnvSource, ProcessEnv, Protocol, TlsVerification,
};
pub use controller::{run, ExitStatus, ExportController};
pub use error::{ConfigError, ExportError, FailureReason, InferenceError, WorkflowError};
pub use inference::{InferenceBackend, OpenAiBackend, SyntheticBackend};
pub use observer::{LoggingObserver, SpanRecorder, StageTimings, WorkflowObserver};
pub use span::{IdGenerator, IncrementIdGenerator, RandomIdGenerator, SpanBuilder, SpanRecord};
pub use transport::{ExportResult, HttpClient, OtlpHttpTransport};
pub use workflow::{
    AgentOutput, ToolCall, WeatherReport, WorkflowOutput, WorkflowRunner, DEFAULT_USER_QUERY,
};
