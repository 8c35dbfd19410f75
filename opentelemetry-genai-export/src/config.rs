//! Export configuration resolved from environment variables.
//!
//! Resolution happens once per process. The result is an [`EndpointConfig`]
//! value handed to the controller; nothing reads the environment afterwards.
//!
//! Endpoint precedence follows the OTLP exporter rules
//! <https://github.com/open-telemetry/opentelemetry-specification/blob/main/specification/protocol/exporter.md#endpoint-urls-for-otlphttp>:
//! the signal specific variable is used as is, the generic one gets the
//! signal path appended, and the local collector is the fallback.

use crate::error::ConfigError;
use http::Uri;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Target to which traces are sent, verbatim.
pub const OTEL_EXPORTER_OTLP_TRACES_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT";
/// Base target for all signals; `/v1/traces` is appended for traces.
pub const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
/// Key-value pairs used as headers for trace export requests.
/// Example: `k1=v1,k2=v2`
pub const OTEL_EXPORTER_OTLP_TRACES_HEADERS: &str = "OTEL_EXPORTER_OTLP_TRACES_HEADERS";
/// Key-value pairs used as headers for all export requests.
pub const OTEL_EXPORTER_OTLP_HEADERS: &str = "OTEL_EXPORTER_OTLP_HEADERS";
/// Max waiting time for the trace export request, in milliseconds.
pub const OTEL_EXPORTER_OTLP_TRACES_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_TRACES_TIMEOUT";
/// Max waiting time for any export request, in milliseconds.
pub const OTEL_EXPORTER_OTLP_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_TIMEOUT";
/// Encoding used for trace export: `http/protobuf` or `http/json`.
pub const OTEL_EXPORTER_OTLP_TRACES_PROTOCOL: &str = "OTEL_EXPORTER_OTLP_TRACES_PROTOCOL";
/// Encoding used for all exports.
pub const OTEL_EXPORTER_OTLP_PROTOCOL: &str = "OTEL_EXPORTER_OTLP_PROTOCOL";
/// Compression of the trace export body: `gzip` or `none`.
pub const OTEL_EXPORTER_OTLP_TRACES_COMPRESSION: &str = "OTEL_EXPORTER_OTLP_TRACES_COMPRESSION";
/// Compression of every export body.
pub const OTEL_EXPORTER_OTLP_COMPRESSION: &str = "OTEL_EXPORTER_OTLP_COMPRESSION";
/// Set to `true` to verify the collector's TLS certificate.
pub const OTEL_EXPORTER_OTLP_TRACES_VERIFY_TLS: &str = "OTEL_EXPORTER_OTLP_TRACES_VERIFY_TLS";
/// Logical name of the service, exported as `service.name`.
pub const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";

/// Traces URL of a collector running on the local host.
pub const OTEL_EXPORTER_OTLP_TRACES_ENDPOINT_DEFAULT: &str = "http://localhost:4318/v1/traces";
/// Default export timeout.
pub const OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT: Duration = Duration::from_millis(10_000);
/// Default `service.name`.
pub const OTEL_SERVICE_NAME_DEFAULT: &str = "genai-weather-agent";

const TRACES_PATH: &str = "/v1/traces";

/// Read access to a set of environment variables.
///
/// Production code reads the process environment through [`ProcessEnv`];
/// tests can pass a map or an array of pairs instead.
pub trait EnvSource {
    /// Returns the value of `key`, if set.
    fn var(&self, key: &str) -> Option<String>;
}

/// The environment of the current process.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<const N: usize> EnvSource for [(&str, &str); N] {
    fn var(&self, key: &str) -> Option<String> {
        self.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| (*v).to_string())
    }
}

/// Wire encoding of the export body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Protocol {
    /// Protobuf binary over HTTP.
    #[default]
    HttpBinary,
    /// Protobuf JSON over HTTP.
    HttpJson,
}

impl Protocol {
    /// `Content-Type` header value for this encoding.
    pub fn content_type(&self) -> &'static str {
        match self {
            Protocol::HttpBinary => "application/x-protobuf",
            Protocol::HttpJson => "application/json",
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http/protobuf" => Ok(Protocol::HttpBinary),
            "http/json" => Ok(Protocol::HttpJson),
            "grpc" => Err("grpc is not supported by the HTTP exporter".to_string()),
            other => Err(format!("unknown protocol '{other}'")),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::HttpBinary => write!(f, "http/protobuf"),
            Protocol::HttpJson => write!(f, "http/json"),
        }
    }
}

/// Compression applied to the export body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    /// Compresses data using gzip.
    Gzip,
}

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::Gzip => write!(f, "gzip"),
        }
    }
}

/// Whether the collector's TLS certificate is checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Any certificate is accepted. Reduced security, see the crate docs.
    #[default]
    Disabled,
    /// Certificates are verified against the platform roots.
    Enabled,
}

/// Where and how the trace is exported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Fully-qualified traces URL. Never empty.
    pub traces_endpoint: String,
    /// Extra request headers, in the order they were configured.
    pub headers: Vec<(String, String)>,
    /// Upper bound for the export request.
    pub timeout: Duration,
    /// Body encoding.
    pub protocol: Protocol,
    /// Body compression, if any.
    pub compression: Option<Compression>,
    /// TLS certificate policy.
    pub tls_verification: TlsVerification,
    /// Exported as the `service.name` resource attribute.
    pub service_name: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            traces_endpoint: OTEL_EXPORTER_OTLP_TRACES_ENDPOINT_DEFAULT.to_string(),
            headers: Vec::new(),
            timeout: OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT,
            protocol: Protocol::default(),
            compression: None,
            tls_verification: TlsVerification::default(),
            service_name: OTEL_SERVICE_NAME_DEFAULT.to_string(),
        }
    }
}

impl EndpointConfig {
    /// Value of the first header named `key`, compared case-insensitively.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Resolves the export configuration, logging every value that had to be
/// dropped.
pub fn resolve<E: EnvSource + ?Sized>(env: &E) -> EndpointConfig {
    let (config, issues) = resolve_with_diagnostics(env);
    for issue in &issues {
        warn!(name: "ExportConfig.Malformed", issue = %issue, "ignoring malformed export configuration");
    }
    config
}

/// Resolves the export configuration and returns the values that were
/// ignored alongside it. Resolution itself never fails.
pub fn resolve_with_diagnostics<E: EnvSource + ?Sized>(
    env: &E,
) -> (EndpointConfig, Vec<ConfigError>) {
    let mut issues = Vec::new();

    let config = EndpointConfig {
        traces_endpoint: resolve_endpoint(env, &mut issues),
        headers: resolve_headers(env, &mut issues),
        timeout: resolve_timeout(env, &mut issues),
        protocol: resolve_protocol(env, &mut issues),
        compression: resolve_compression(env, &mut issues),
        tls_verification: resolve_tls_verification(env, &mut issues),
        service_name: non_empty_var(env, OTEL_SERVICE_NAME)
            .unwrap_or_else(|| OTEL_SERVICE_NAME_DEFAULT.to_string()),
    };

    (config, issues)
}

fn non_empty_var<E: EnvSource + ?Sized>(env: &E, key: &str) -> Option<String> {
    env.var(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Signal specific variable first, then the generic one.
fn layered_var<E: EnvSource + ?Sized>(
    env: &E,
    signal_var: &'static str,
    generic_var: &'static str,
) -> Option<(&'static str, String)> {
    non_empty_var(env, signal_var)
        .map(|value| (signal_var, value))
        .or_else(|| non_empty_var(env, generic_var).map(|value| (generic_var, value)))
}

fn is_absolute_url(value: &str) -> bool {
    value
        .parse::<Uri>()
        .map(|uri| uri.scheme().is_some() && uri.authority().is_some())
        .unwrap_or(false)
}

fn build_endpoint_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with(path.trim_start_matches('/')) {
        return base.to_string();
    }
    format!("{base}{path}")
}

fn resolve_endpoint<E: EnvSource + ?Sized>(env: &E, issues: &mut Vec<ConfigError>) -> String {
    // per signal env var is not modified
    if let Some(endpoint) = non_empty_var(env, OTEL_EXPORTER_OTLP_TRACES_ENDPOINT) {
        if is_absolute_url(&endpoint) {
            return endpoint;
        }
        issues.push(ConfigError::InvalidValue {
            name: OTEL_EXPORTER_OTLP_TRACES_ENDPOINT.to_string(),
            reason: format!("'{endpoint}' is not an absolute URL"),
        });
    }

    if let Some(base) = non_empty_var(env, OTEL_EXPORTER_OTLP_ENDPOINT) {
        let endpoint = build_endpoint_url(&base, TRACES_PATH);
        if is_absolute_url(&endpoint) {
            return endpoint;
        }
        issues.push(ConfigError::InvalidValue {
            name: OTEL_EXPORTER_OTLP_ENDPOINT.to_string(),
            reason: format!("'{base}' is not an absolute URL"),
        });
    }

    OTEL_EXPORTER_OTLP_TRACES_ENDPOINT_DEFAULT.to_string()
}

fn resolve_headers<E: EnvSource + ?Sized>(
    env: &E,
    issues: &mut Vec<ConfigError>,
) -> Vec<(String, String)> {
    // set-but-empty still selects the variable, as with any other string setting
    match env
        .var(OTEL_EXPORTER_OTLP_TRACES_HEADERS)
        .or_else(|| env.var(OTEL_EXPORTER_OTLP_HEADERS))
    {
        Some(input) => parse_headers(&input, issues),
        None => Vec::new(),
    }
}

fn resolve_timeout<E: EnvSource + ?Sized>(env: &E, issues: &mut Vec<ConfigError>) -> Duration {
    for var in [OTEL_EXPORTER_OTLP_TRACES_TIMEOUT, OTEL_EXPORTER_OTLP_TIMEOUT] {
        if let Some(value) = non_empty_var(env, var) {
            match value.parse::<u64>() {
                Ok(millis) => return Duration::from_millis(millis),
                Err(_) => issues.push(ConfigError::InvalidValue {
                    name: var.to_string(),
                    reason: format!("'{value}' is not a number of milliseconds"),
                }),
            }
        }
    }
    OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT
}

fn resolve_protocol<E: EnvSource + ?Sized>(env: &E, issues: &mut Vec<ConfigError>) -> Protocol {
    match layered_var(
        env,
        OTEL_EXPORTER_OTLP_TRACES_PROTOCOL,
        OTEL_EXPORTER_OTLP_PROTOCOL,
    ) {
        Some((name, value)) => value.parse().unwrap_or_else(|reason| {
            issues.push(ConfigError::InvalidValue {
                name: name.to_string(),
                reason,
            });
            Protocol::default()
        }),
        None => Protocol::default(),
    }
}

fn resolve_compression<E: EnvSource + ?Sized>(
    env: &E,
    issues: &mut Vec<ConfigError>,
) -> Option<Compression> {
    let (name, value) = layered_var(
        env,
        OTEL_EXPORTER_OTLP_TRACES_COMPRESSION,
        OTEL_EXPORTER_OTLP_COMPRESSION,
    )?;
    match value.to_ascii_lowercase().as_str() {
        "gzip" => Some(Compression::Gzip),
        "none" => None,
        other => {
            issues.push(ConfigError::InvalidValue {
                name: name.to_string(),
                reason: format!("unsupported compression algorithm '{other}'"),
            });
            None
        }
    }
}

fn resolve_tls_verification<E: EnvSource + ?Sized>(
    env: &E,
    issues: &mut Vec<ConfigError>,
) -> TlsVerification {
    let Some(value) = non_empty_var(env, OTEL_EXPORTER_OTLP_TRACES_VERIFY_TLS) else {
        return TlsVerification::default();
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => TlsVerification::Enabled,
        "false" | "0" | "no" => TlsVerification::Disabled,
        other => {
            issues.push(ConfigError::InvalidValue {
                name: OTEL_EXPORTER_OTLP_TRACES_VERIFY_TLS.to_string(),
                reason: format!("'{other}' is not a boolean"),
            });
            TlsVerification::default()
        }
    }
}

/// Parses a `k1=v1,k2=v2` header list, dropping malformed entries.
pub fn parse_header_string(input: &str) -> Vec<(String, String)> {
    parse_headers(input, &mut Vec::new())
}

fn parse_headers(input: &str, issues: &mut Vec<ConfigError>) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for entry in input.split_terminator(',').map(str::trim) {
        if entry.is_empty() {
            continue;
        }
        match parse_header_key_value_string(entry) {
            Some((key, value)) => {
                match headers.iter_mut().find(|(k, _)| k.as_str() == key) {
                    Some(existing) => existing.1 = value,
                    None => headers.push((key.to_string(), value)),
                }
            }
            None => issues.push(ConfigError::MalformedHeader(entry.to_string())),
        }
    }
    headers
}

fn parse_header_key_value_string(key_value_string: &str) -> Option<(&str, String)> {
    key_value_string
        .split_once('=')
        .map(|(key, value)| (key.trim(), url_decode(value.trim())))
        .filter(|(key, _)| !key.is_empty())
}

fn url_decode(value: &str) -> String {
    percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn run_env_test<T, F>(env_vars: T, f: F)
    where
        F: FnOnce(),
        T: Into<Vec<(&'static str, &'static str)>>,
    {
        let all_vars = [
            OTEL_EXPORTER_OTLP_TRACES_ENDPOINT,
            OTEL_EXPORTER_OTLP_ENDPOINT,
            OTEL_EXPORTER_OTLP_TRACES_HEADERS,
            OTEL_EXPORTER_OTLP_HEADERS,
            OTEL_EXPORTER_OTLP_TRACES_TIMEOUT,
            OTEL_EXPORTER_OTLP_TIMEOUT,
            OTEL_EXPORTER_OTLP_TRACES_PROTOCOL,
            OTEL_EXPORTER_OTLP_PROTOCOL,
            OTEL_EXPORTER_OTLP_TRACES_COMPRESSION,
            OTEL_EXPORTER_OTLP_COMPRESSION,
            OTEL_EXPORTER_OTLP_TRACES_VERIFY_TLS,
            OTEL_SERVICE_NAME,
        ];
        let env_vars = env_vars.into();
        temp_env::with_vars(
            all_vars
                .iter()
                .map(|&key| {
                    let value = env_vars.iter().find(|(k, _)| *k == key).map(|(_, v)| *v);
                    (key, value)
                })
                .collect::<Vec<(&'static str, Option<&'static str>)>>(),
            f,
        )
    }

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_append_signal_path_to_generic_env() {
        run_env_test(vec![(OTEL_EXPORTER_OTLP_ENDPOINT, "http://host:1234")], || {
            assert_eq!(resolve(&ProcessEnv).traces_endpoint, "http://host:1234/v1/traces");
        })
    }

    #[test]
    fn test_not_append_signal_path_to_signal_env() {
        run_env_test(
            vec![(OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, "http://example.com")],
            || {
                assert_eq!(resolve(&ProcessEnv).traces_endpoint, "http://example.com");
            },
        )
    }

    #[test]
    fn test_priority_of_signal_env_over_generic_env() {
        run_env_test(
            vec![
                (OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, "http://example.com/custom"),
                (OTEL_EXPORTER_OTLP_ENDPOINT, "http://wrong.com"),
            ],
            || {
                assert_eq!(
                    resolve(&ProcessEnv).traces_endpoint,
                    "http://example.com/custom"
                );
            },
        );
    }

    #[test]
    fn test_use_default_when_others_missing() {
        run_env_test(Vec::<(&str, &str)>::new(), || {
            let config = resolve(&ProcessEnv);
            assert_eq!(config.traces_endpoint, "http://localhost:4318/v1/traces");
            assert!(config.headers.is_empty());
            assert_eq!(config, EndpointConfig::default());
        });
    }

    #[test]
    fn test_empty_signal_env_is_ignored() {
        let env = [
            (OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, "   "),
            (OTEL_EXPORTER_OTLP_ENDPOINT, "http://host:1234"),
        ];
        assert_eq!(resolve(&env).traces_endpoint, "http://host:1234/v1/traces");
    }

    #[test]
    fn test_build_endpoint_url() {
        assert_eq!(
            build_endpoint_url("https://example.com", TRACES_PATH),
            "https://example.com/v1/traces"
        );
        // Should be no duplicate slashes:
        assert_eq!(
            build_endpoint_url("https://example.com/", TRACES_PATH),
            "https://example.com/v1/traces"
        );
        // Append paths properly:
        assert_eq!(
            build_endpoint_url("https://example.com/additional/path/", TRACES_PATH),
            "https://example.com/additional/path/v1/traces"
        );
        // Already pointing at the traces path:
        assert_eq!(
            build_endpoint_url("https://example.com/otel/v1/traces/", TRACES_PATH),
            "https://example.com/otel/v1/traces"
        );
    }

    #[test]
    fn test_invalid_uri_in_signal_env_falls_back_to_generic_env() {
        let env = [
            (OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, "-*/*-/*-//-/-/invalid-uri"),
            (OTEL_EXPORTER_OTLP_ENDPOINT, "http://example.com"),
        ];
        let (config, issues) = resolve_with_diagnostics(&env);
        assert_eq!(config.traces_endpoint, "http://example.com/v1/traces");
        assert!(matches!(
            issues.as_slice(),
            [ConfigError::InvalidValue { name, .. }] if name == OTEL_EXPORTER_OTLP_TRACES_ENDPOINT
        ));
    }

    #[test]
    fn test_all_invalid_urls_fall_back_to_default() {
        let env = [
            (OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, "localhost"),
            (OTEL_EXPORTER_OTLP_ENDPOINT, "not a url"),
        ];
        let (config, issues) = resolve_with_diagnostics(&env);
        assert_eq!(config.traces_endpoint, OTEL_EXPORTER_OTLP_TRACES_ENDPOINT_DEFAULT);
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_parse_header_string() {
        let test_cases = vec![
            // Format: (input_str, expected_headers)
            ("a=1,b=2", vec![("a", "1"), ("b", "2")]),
            ("a=1,bad,c=3", vec![("a", "1"), ("c", "3")]),
            ("k1=v1=10,k2,k3", vec![("k1", "v1=10")]),
            ("k1=v1,,,k2,k3=10", vec![("k1", "v1"), ("k3", "10")]),
            (" k1 = v1 , k2=v2 ", vec![("k1", "v1"), ("k2", "v2")]),
            ("k1=v1,k1=v2", vec![("k1", "v2")]),
            ("a=1,k=,c=3", vec![("a", "1"), ("k", ""), ("c", "3")]),
            ("a=1,=2", vec![("a", "1")]),
            ("", vec![]),
        ];

        for (input_str, expected_headers) in test_cases {
            assert_eq!(
                parse_header_string(input_str),
                headers(&expected_headers),
                "Failed on input: {input_str}"
            )
        }
    }

    #[test]
    fn test_parse_header_key_value_string() {
        let test_cases = vec![
            // Format: (input_str, expected_header)
            ("k1=v1", Some(("k1", "v1"))),
            (
                "Authentication=Basic AAA",
                Some(("Authentication", "Basic AAA")),
            ),
            (
                "Authentication=Basic%20AAA",
                Some(("Authentication", "Basic AAA")),
            ),
            ("list=a%2Cb", Some(("list", "a,b"))),
            ("k1=%XX", Some(("k1", "%XX"))),
            ("", None),
            ("=v1", None),
            ("k1=", Some(("k1", ""))),
            ("k1 = ", Some(("k1", ""))),
        ];

        for (input_str, expected_header) in test_cases {
            assert_eq!(
                parse_header_key_value_string(input_str),
                expected_header.map(|(k, v)| (k, v.to_string())),
            )
        }
    }

    #[test]
    fn test_malformed_headers_are_reported_not_fatal() {
        let env = [(OTEL_EXPORTER_OTLP_HEADERS, "a=1,bad,c=3")];
        let (config, issues) = resolve_with_diagnostics(&env);
        assert_eq!(config.headers, headers(&[("a", "1"), ("c", "3")]));
        assert_eq!(issues, vec![ConfigError::MalformedHeader("bad".into())]);
    }

    #[test]
    fn test_priority_of_signal_headers_over_generic_headers() {
        run_env_test(
            vec![
                (OTEL_EXPORTER_OTLP_TRACES_HEADERS, "x-api-key=signal"),
                (OTEL_EXPORTER_OTLP_HEADERS, "x-api-key=generic,other=1"),
            ],
            || {
                let config = resolve(&ProcessEnv);
                assert_eq!(config.headers, headers(&[("x-api-key", "signal")]));
                assert_eq!(config.header("X-API-KEY"), Some("signal"));
            },
        );
    }

    #[test]
    fn test_headers_do_not_depend_on_endpoint() {
        let env = [
            (OTEL_EXPORTER_OTLP_HEADERS, "authorization=Bearer%20abc"),
            (OTEL_EXPORTER_OTLP_TRACES_ENDPOINT, "https://vendor.example/otel/v1/traces"),
        ];
        let config = resolve(&env);
        assert_eq!(config.traces_endpoint, "https://vendor.example/otel/v1/traces");
        assert_eq!(config.header("authorization"), Some("Bearer abc"));
    }

    #[test]
    fn test_priority_of_signal_env_over_generic_env_for_timeout() {
        run_env_test(
            vec![
                (OTEL_EXPORTER_OTLP_TRACES_TIMEOUT, "3000"),
                (OTEL_EXPORTER_OTLP_TIMEOUT, "2000"),
            ],
            || {
                assert_eq!(resolve(&ProcessEnv).timeout.as_millis(), 3000);
            },
        );
    }

    #[test]
    fn test_invalid_timeout_falls_through() {
        let env = [
            (OTEL_EXPORTER_OTLP_TRACES_TIMEOUT, "soon"),
            (OTEL_EXPORTER_OTLP_TIMEOUT, "2500"),
        ];
        let (config, issues) = resolve_with_diagnostics(&env);
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(issues.len(), 1);

        let env = [(OTEL_EXPORTER_OTLP_TIMEOUT, "-1")];
        assert_eq!(resolve(&env).timeout, OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT);
    }

    #[test]
    fn test_protocol_from_env() {
        let env = [(OTEL_EXPORTER_OTLP_PROTOCOL, "http/json")];
        assert_eq!(resolve(&env).protocol, Protocol::HttpJson);

        let env = [
            (OTEL_EXPORTER_OTLP_TRACES_PROTOCOL, "http/protobuf"),
            (OTEL_EXPORTER_OTLP_PROTOCOL, "http/json"),
        ];
        assert_eq!(resolve(&env).protocol, Protocol::HttpBinary);

        let env = [(OTEL_EXPORTER_OTLP_PROTOCOL, "grpc")];
        let (config, issues) = resolve_with_diagnostics(&env);
        assert_eq!(config.protocol, Protocol::HttpBinary);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_compression_from_env() {
        let env = [(OTEL_EXPORTER_OTLP_COMPRESSION, "gzip")];
        assert_eq!(resolve(&env).compression, Some(Compression::Gzip));

        let env = [
            (OTEL_EXPORTER_OTLP_TRACES_COMPRESSION, "none"),
            (OTEL_EXPORTER_OTLP_COMPRESSION, "gzip"),
        ];
        assert_eq!(resolve(&env).compression, None);

        let env = [(OTEL_EXPORTER_OTLP_COMPRESSION, "brotli")];
        let (config, issues) = resolve_with_diagnostics(&env);
        assert_eq!(config.compression, None);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_tls_verification_defaults_to_disabled() {
        let env: [(&str, &str); 0] = [];
        assert_eq!(resolve(&env).tls_verification, TlsVerification::Disabled);

        let env = [(OTEL_EXPORTER_OTLP_TRACES_VERIFY_TLS, "TRUE")];
        assert_eq!(resolve(&env).tls_verification, TlsVerification::Enabled);

        let env = [(OTEL_EXPORTER_OTLP_TRACES_VERIFY_TLS, "maybe")];
        let (config, issues) = resolve_with_diagnostics(&env);
        assert_eq!(config.tls_verification, TlsVerification::Disabled);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_service_name_from_env() {
        let env = [(OTEL_SERVICE_NAME, "otel-llm-log")];
        assert_eq!(resolve(&env).service_name, "otel-llm-log");

        let env: HashMap<String, String> = HashMap::new();
        assert_eq!(resolve(&env).service_name, OTEL_SERVICE_NAME_DEFAULT);
    }
}
