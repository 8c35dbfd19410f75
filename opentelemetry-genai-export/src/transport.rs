//! OTLP/HTTP transport.
//!
//! [`OtlpHttpTransport::send`] is the only place where raw transport errors
//! exist. They are classified into [`FailureReason`]s before leaving this
//! module.

use crate::config::{Compression, EndpointConfig, TlsVerification};
use crate::error::{ExportError, FailureReason};
use crate::span::SpanRecord;
use crate::transform::{build_export_request, compress, encode};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use http::{Method, Request, Response};
use std::error::Error as StdError;
use std::fmt::Debug;
use std::io;
use tracing::{debug, warn};

/// Error returned by an [`HttpClient`].
pub type HttpError = Box<dyn StdError + Send + Sync + 'static>;

/// Outcome of one export attempt.
pub type ExportResult = Result<(), ExportError>;

const RESPONSE_PREVIEW_CHARS: usize = 1000;

// lowercase fragments found in TLS failures of rustls, native-tls and openssl
const TLS_ERROR_MARKERS: &[&str] = &[
    "certificate",
    "tls",
    "ssl",
    "handshake",
    "corrupt message",
    "peer is incompatible",
];

/// A minimal interface necessary for sending requests over HTTP.
///
/// The transport is generic over it so tests can substitute a client that
/// never touches the network.
pub trait HttpClient: Debug {
    /// Send the specified HTTP request with `Bytes` payload.
    ///
    /// Returns the HTTP response including the status code and body, for
    /// any status. Returns an error if it can't connect to the server or the
    /// request could not be completed, e.g. because of a timeout or a failed
    /// TLS handshake.
    fn send_bytes(&self, request: Request<Bytes>) -> Result<Response<Bytes>, HttpError>;
}

impl HttpClient for reqwest::blocking::Client {
    fn send_bytes(&self, request: Request<Bytes>) -> Result<Response<Bytes>, HttpError> {
        debug!(name: "ReqwestBlockingClient.Send", uri = %request.uri());
        let request = request.try_into()?;
        let mut response = self.execute(request)?;
        let headers = std::mem::take(response.headers_mut());
        let mut http_response = Response::builder()
            .status(response.status())
            .body(response.bytes()?)?;
        *http_response.headers_mut() = headers;

        Ok(http_response)
    }
}

/// Sends span records to an OTLP/HTTP traces endpoint.
#[derive(Debug)]
pub struct OtlpHttpTransport<C = reqwest::blocking::Client> {
    client: C,
}

impl OtlpHttpTransport {
    /// Builds a blocking reqwest client honoring the timeout and TLS policy
    /// of `config`.
    pub fn from_config(config: &EndpointConfig) -> Result<Self, ExportError> {
        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(config.tls_verification == TlsVerification::Disabled)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExportError::other(format!("failed to build HTTP client: {e}")))?;
        Ok(OtlpHttpTransport { client })
    }
}

impl<C: HttpClient> OtlpHttpTransport<C> {
    /// Uses `client` for every request.
    pub fn with_client(client: C) -> Self {
        OtlpHttpTransport { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Exports `spans` with a single POST to `config.traces_endpoint`.
    pub fn send(&self, config: &EndpointConfig, spans: &[SpanRecord]) -> ExportResult {
        let request = build_export_request(spans, &config.service_name);
        let body = compress(encode(&request, config.protocol)?, config.compression)?;
        let request = build_http_request(config, body)?;

        debug!(
            name: "OtlpHttpTransport.Send",
            endpoint = %config.traces_endpoint,
            spans = spans.len(),
            protocol = %config.protocol,
        );

        let response = self
            .client
            .send_bytes(request)
            .map_err(|err| ExportError::new(classify_error(&*err), error_chain(&*err)))?;

        let status = response.status();
        if !status.is_success() {
            let preview: String = String::from_utf8_lossy(response.body())
                .chars()
                .take(RESPONSE_PREVIEW_CHARS)
                .collect();
            return Err(ExportError::new(
                FailureReason::Network,
                format!("collector responded with {status}: {preview}"),
            ));
        }

        debug!(name: "OtlpHttpTransport.Accepted", status = status.as_u16());
        Ok(())
    }
}

fn build_http_request(config: &EndpointConfig, body: Vec<u8>) -> Result<Request<Bytes>, ExportError> {
    let mut request = Request::builder()
        .method(Method::POST)
        .uri(config.traces_endpoint.as_str())
        .body(Bytes::from(body))
        .map_err(|e| ExportError::other(format!("invalid export request: {e}")))?;

    let headers = request.headers_mut();
    for (key, value) in &config.headers {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(
                name: "OtlpHttpTransport.InvalidHeader",
                header = %key,
                "header is not valid HTTP and was not sent"
            ),
        }
    }
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(config.protocol.content_type()),
    );
    if let Some(Compression::Gzip) = config.compression {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }

    Ok(request)
}

/// Maps a client error onto the coarse reason shown to the user.
///
/// The whole source chain is inspected: a TLS failure anywhere wins over the
/// connection error that usually wraps it.
pub fn classify_error(err: &(dyn StdError + 'static)) -> FailureReason {
    let mut reason = FailureReason::Other;
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(reqwest_err) = err.downcast_ref::<reqwest::Error>() {
            // the reqwest message embeds the URL, so only its flags are used
            if reqwest_err.is_timeout() || reqwest_err.is_connect() {
                reason = FailureReason::Network;
            }
        } else {
            if let Some(io_err) = err.downcast_ref::<io::Error>() {
                if is_network_io_error(io_err.kind()) {
                    reason = FailureReason::Network;
                }
            }
            let message = err.to_string().to_ascii_lowercase();
            if TLS_ERROR_MARKERS.iter().any(|marker| message.contains(marker)) {
                return FailureReason::Ssl;
            }
        }
        current = err.source();
    }
    reason
}

fn is_network_io_error(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::UnexpectedEof
    )
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut detail = err.to_string();
    let mut current = err.source();
    while let Some(source) = current {
        detail.push_str(": ");
        detail.push_str(&source.to_string());
        current = source.source();
    }
    detail
}
