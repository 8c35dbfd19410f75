use opentelemetry_genai_export::{run, ProcessEnv, DEFAULT_USER_QUERY};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Diagnostics go to stderr so stdout only carries the status line.
    // `RUST_LOG` overrides the default of `info` with HTTP internals muted.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .parse_lossy("hyper=off,h2=off,reqwest=warn")
    });
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);
    tracing_subscriber::registry().with(fmt_layer).init();

    let query = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let query = if query.trim().is_empty() {
        DEFAULT_USER_QUERY.to_string()
    } else {
        query
    };

    run(&ProcessEnv, &query).into()
}
