//! Conversion of [`SpanRecord`]s into an OTLP export request body.

use crate::config::{Compression, Protocol};
use crate::error::ExportError;
use crate::span::SpanRecord;
use opentelemetry::trace;
use opentelemetry::trace::SpanKind;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::{AnyValue, InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{span, status, ResourceSpans, ScopeSpans, Span, Status};
use opentelemetry_semantic_conventions::attribute as semconv;
use prost::Message;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

const SCOPE_NAME: &str = env!("CARGO_PKG_NAME");
const SCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) fn to_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

fn key_value(key: &str, value: opentelemetry::Value) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue::from(value)),
    }
}

fn span_kind(kind: &SpanKind) -> span::SpanKind {
    match kind {
        SpanKind::Client => span::SpanKind::Client,
        SpanKind::Server => span::SpanKind::Server,
        SpanKind::Producer => span::SpanKind::Producer,
        SpanKind::Consumer => span::SpanKind::Consumer,
        SpanKind::Internal => span::SpanKind::Internal,
    }
}

fn span_status(source: &trace::Status) -> Status {
    match source {
        trace::Status::Ok => Status {
            code: status::StatusCode::Ok.into(),
            ..Default::default()
        },
        trace::Status::Error { description } => Status {
            code: status::StatusCode::Error.into(),
            message: description.to_string(),
        },
        trace::Status::Unset => Status::default(),
    }
}

impl From<&SpanRecord> for Span {
    fn from(source: &SpanRecord) -> Self {
        Span {
            trace_id: source.trace_id.to_bytes().to_vec(),
            span_id: source.span_id.to_bytes().to_vec(),
            parent_span_id: source
                .parent_span_id
                .map(|id| id.to_bytes().to_vec())
                .unwrap_or_default(),
            name: source.name.clone(),
            kind: span_kind(&source.kind).into(),
            start_time_unix_nano: to_nanos(source.start_time),
            end_time_unix_nano: to_nanos(source.end_time),
            attributes: source
                .attributes
                .iter()
                .map(|kv| key_value(kv.key.as_str(), kv.value.clone()))
                .collect(),
            status: Some(span_status(&source.status)),
            ..Default::default()
        }
    }
}

/// Wraps `spans` into a request with one resource and one scope.
pub fn build_export_request(spans: &[SpanRecord], service_name: &str) -> ExportTraceServiceRequest {
    let resource = Resource {
        attributes: vec![
            key_value(semconv::SERVICE_NAME, service_name.to_string().into()),
            key_value(semconv::TELEMETRY_SDK_NAME, SCOPE_NAME.into()),
            key_value(semconv::TELEMETRY_SDK_LANGUAGE, "rust".into()),
            key_value(semconv::TELEMETRY_SDK_VERSION, SCOPE_VERSION.into()),
        ],
        ..Default::default()
    };

    ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            resource: Some(resource),
            scope_spans: vec![ScopeSpans {
                scope: Some(InstrumentationScope {
                    name: SCOPE_NAME.to_string(),
                    version: SCOPE_VERSION.to_string(),
                    ..Default::default()
                }),
                spans: spans.iter().map(Span::from).collect(),
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// Serializes the request in the wire format of `protocol`.
pub fn encode(request: &ExportTraceServiceRequest, protocol: Protocol) -> Result<Vec<u8>, ExportError> {
    match protocol {
        Protocol::HttpBinary => Ok(request.encode_to_vec()),
        Protocol::HttpJson => serde_json::to_vec(request)
            .map_err(|e| ExportError::other(format!("failed to encode JSON body: {e}"))),
    }
}

/// Applies `compression` to an encoded body.
pub fn compress(body: Vec<u8>, compression: Option<Compression>) -> Result<Vec<u8>, ExportError> {
    match compression {
        None => Ok(body),
        Some(Compression::Gzip) => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(&body)
                .map_err(|e| ExportError::other(format!("gzip write failed: {e}")))?;
            encoder
                .finish()
                .map_err(|e| ExportError::other(format!("gzip finish failed: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{synthetic_output, synthetic_tool_call};
    use crate::observer::StageTimings;
    use crate::span::{IncrementIdGenerator, SpanBuilder};
    use crate::workflow::{WeatherReport, WorkflowOutput};
    use crate::error::WorkflowError;
    use opentelemetry_proto::tonic::common::v1::any_value;
    use std::io::Read;
    use std::time::Duration;

    fn spans(tool: Result<WeatherReport, WorkflowError>) -> Vec<SpanRecord> {
        let output = WorkflowOutput {
            query: "q".into(),
            agent: synthetic_output(),
            tool_call: synthetic_tool_call(),
            tool,
        };
        let start = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let (chat, tool) = SpanBuilder::with_id_generator(IncrementIdGenerator::new())
            .build(&output, &StageTimings::at(start));
        vec![chat, tool]
    }

    fn report() -> WeatherReport {
        WeatherReport {
            temp: 18,
            unit: "celsius".into(),
            location: "Paris".into(),
        }
    }

    #[test]
    fn request_has_one_resource_and_scope() {
        let request = build_export_request(&spans(Ok(report())), "svc");

        assert_eq!(request.resource_spans.len(), 1);
        let resource_spans = &request.resource_spans[0];
        let resource = resource_spans.resource.as_ref().expect("resource");
        let service = resource
            .attributes
            .iter()
            .find(|kv| kv.key == "service.name")
            .and_then(|kv| kv.value.as_ref())
            .and_then(|v| v.value.as_ref());
        assert_eq!(
            service,
            Some(&any_value::Value::StringValue("svc".into()))
        );

        assert_eq!(resource_spans.scope_spans.len(), 1);
        let scope_spans = &resource_spans.scope_spans[0];
        assert_eq!(
            scope_spans.scope.as_ref().map(|s| s.name.as_str()),
            Some("opentelemetry-genai-export")
        );
        assert_eq!(scope_spans.spans.len(), 2);
    }

    #[test]
    fn span_fields_are_converted() {
        let records = spans(Ok(report()));
        let request = build_export_request(&records, "svc");
        let proto = &request.resource_spans[0].scope_spans[0].spans;

        let chat = &proto[0];
        let tool = &proto[1];
        assert_eq!(chat.trace_id, records[0].trace_id.to_bytes().to_vec());
        assert_eq!(chat.trace_id.len(), 16);
        assert_eq!(chat.span_id.len(), 8);
        assert!(chat.parent_span_id.is_empty());
        assert_eq!(tool.parent_span_id, chat.span_id);
        assert_eq!(tool.trace_id, chat.trace_id);
        assert_eq!(chat.kind, span::SpanKind::Internal as i32);
        assert_eq!(chat.start_time_unix_nano, 1_700_000_000_000_000_000);
        assert_eq!(chat.name, "chat gpt-4o");
        assert_eq!(
            chat.status.as_ref().map(|s| s.code),
            Some(status::StatusCode::Ok as i32)
        );
        assert!(chat
            .attributes
            .iter()
            .any(|kv| kv.key == "gen_ai.usage.input_tokens"
                && kv.value.as_ref().and_then(|v| v.value.clone())
                    == Some(any_value::Value::IntValue(42))));
    }

    #[test]
    fn error_status_keeps_description() {
        let records = spans(Err(WorkflowError::UnknownTool("x".into())));
        let request = build_export_request(&records, "svc");
        let tool = &request.resource_spans[0].scope_spans[0].spans[1];
        let status = tool.status.as_ref().expect("status");
        assert_eq!(status.code, status::StatusCode::Error as i32);
        assert_eq!(status.message, "unknown tool 'x'");
    }

    #[test]
    fn protobuf_body_decodes_back() {
        let request = build_export_request(&spans(Ok(report())), "svc");
        let body = encode(&request, Protocol::HttpBinary).expect("encoded");
        let decoded = ExportTraceServiceRequest::decode(body.as_slice()).expect("decoded");
        assert_eq!(decoded, request);
    }

    #[test]
    fn json_body_uses_hex_ids() {
        let records = spans(Ok(report()));
        let request = build_export_request(&records, "svc");
        let body = encode(&request, Protocol::HttpJson).expect("encoded");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");

        let chat = &json["resourceSpans"][0]["scopeSpans"][0]["spans"][0];
        assert_eq!(chat["traceId"], records[0].trace_id.to_string());
        assert_eq!(chat["name"], "chat gpt-4o");
    }

    #[test]
    fn gzip_body_inflates_to_original() {
        let body = b"otlp body".to_vec();
        assert_eq!(compress(body.clone(), None).expect("identity"), body);

        let compressed = compress(body.clone(), Some(Compression::Gzip)).expect("gzip");
        let mut inflated = Vec::new();
        flate2::read::GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut inflated)
            .expect("inflate");
        assert_eq!(inflated, body);
    }
}
