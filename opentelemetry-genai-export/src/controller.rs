//! Ties configuration, workflow, span building and transport together and
//! maps the outcome of a run to an exit status.

use crate::config::{resolve, EndpointConfig, EnvSource, TlsVerification};
use crate::inference::backend_from_env;
use crate::observer::{LoggingObserver, SpanRecorder};
use crate::span::SpanBuilder;
use crate::transport::{HttpClient, OtlpHttpTransport};
use crate::workflow::WorkflowRunner;
use std::io::{self, Write};
use tracing::{error, info, warn};

/// Process outcome of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    /// Workflow completed and the collector accepted the trace.
    Success,
    /// Anything else.
    Failure,
}

impl ExitStatus {
    /// Numeric process exit code.
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status.code())
    }
}

/// Runs the workflow once and exports its trace.
///
/// Prints exactly one status line to `output`. Details of a failure go to
/// the `tracing` log only.
#[derive(Debug)]
pub struct ExportController<C = reqwest::blocking::Client, W = io::Stdout> {
    config: EndpointConfig,
    runner: WorkflowRunner,
    transport: OtlpHttpTransport<C>,
    span_builder: SpanBuilder,
    output: W,
}

impl<C: HttpClient, W: Write> ExportController<C, W> {
    /// Creates a controller from its collaborators.
    pub fn new(
        config: EndpointConfig,
        runner: WorkflowRunner,
        transport: OtlpHttpTransport<C>,
        output: W,
    ) -> Self {
        ExportController {
            config,
            runner,
            transport,
            span_builder: SpanBuilder::new(),
            output,
        }
    }

    /// The transport, e.g. to inspect a test client.
    pub fn transport(&self) -> &OtlpHttpTransport<C> {
        &self.transport
    }

    /// Consumes the controller and returns its output sink.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs the workflow for `query`, exports the trace and reports.
    pub fn execute(&mut self, query: &str) -> ExitStatus {
        let endpoint = self.config.traces_endpoint.clone();
        if self.config.tls_verification == TlsVerification::Disabled {
            warn!(
                name: "ExportController.TlsVerificationDisabled",
                endpoint = %endpoint,
                "TLS certificate verification is disabled; set OTEL_EXPORTER_OTLP_TRACES_VERIFY_TLS=true to enable it"
            );
        }

        let mut recorder = SpanRecorder::new();
        let output = self
            .runner
            .run(query, &mut (&mut recorder, LoggingObserver));
        let (chat, tool) = self.span_builder.build(&output, &recorder.timings());
        let exported = self.transport.send(&self.config, &[chat, tool]);

        if let Err(err) = &exported {
            error!(
                name: "ExportController.ExportFailed",
                endpoint = %endpoint,
                reason = %err.reason,
                error = %err.detail,
            );
        }

        match (&output.tool, exported) {
            (Ok(_), Ok(())) => {
                info!(name: "ExportController.Exported", endpoint = %endpoint);
                self.report(&format!(
                    "GenAI spans exported (chat + execute_tool) to {endpoint}. Service: {}.",
                    self.config.service_name
                ));
                ExitStatus::Success
            }
            (Ok(_), Err(_)) => {
                self.report(&format!(
                    "Export failed (SSL or network error). Check logs above. Endpoint: {endpoint}"
                ));
                ExitStatus::Failure
            }
            (Err(err), exported) => {
                error!(
                    name: "ExportController.WorkflowFailed",
                    error_type = err.error_type(),
                    error = %err,
                    trace_exported = exported.is_ok(),
                );
                self.report(&format!(
                    "Workflow failed. Check logs above. Endpoint: {endpoint}"
                ));
                ExitStatus::Failure
            }
        }
    }

    fn report(&mut self, line: &str) {
        if let Err(err) = writeln!(self.output, "{line}") {
            warn!(name: "ExportController.ReportFailed", error = %err);
        }
    }
}

/// Resolves configuration from `env`, runs the workflow for `query` and
/// exports its trace, reporting on stdout.
pub fn run<E: EnvSource + ?Sized>(env: &E, query: &str) -> ExitStatus {
    let config = resolve(env);
    let runner = WorkflowRunner::from_boxed(backend_from_env(env));
    let transport = match OtlpHttpTransport::from_config(&config) {
        Ok(transport) => transport,
        Err(err) => {
            error!(name: "ExportController.TransportFailed", error = %err);
            println!(
                "Export failed (SSL or network error). Check logs above. Endpoint: {}",
                config.traces_endpoint
            );
            return ExitStatus::Failure;
        }
    };
    ExportController::new(config, runner, transport, io::stdout()).execute(query)
}
