//! Single-attempt HTTP exchange.
//!
//! A [`Transport`] sends one request and hands back a fully buffered
//! response. Retrying is layered on top by [`crate::RetryableClient`].

use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Method, StatusCode,
};

use crate::{AdminError, Credentials, TransportError, TransportOptions};

const USER_AGENT: &str = concat!("esadmin-http/", env!("CARGO_PKG_VERSION"));

/// A request ready to be sent, possibly several times.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Basic credentials, applied after `headers` so they replace any
    /// caller-provided `Authorization`.
    pub credentials: Option<Credentials>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Vec::new(),
            credentials: None,
        }
    }
}

/// Response of one attempt with its body read into memory.
///
/// The body behaves like a stream that can be consumed once: [`take_body`]
/// hands it out and leaves nothing behind. Code that only needs to peek at it
/// must put it back with [`restore_body`].
///
/// [`take_body`]: HttpResponse::take_body
/// [`restore_body`]: HttpResponse::restore_body
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .finish()
    }
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Some(body.into()),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Consumes the body. Returns an empty buffer if it was already taken.
    pub fn take_body(&mut self) -> Vec<u8> {
        self.body.take().unwrap_or_default()
    }

    /// Installs `body` as the readable body again.
    pub fn restore_body(&mut self, body: Vec<u8>) {
        self.body = Some(body);
    }

    pub fn is_body_consumed(&self) -> bool {
        self.body.is_none()
    }
}

/// One attempt of an HTTP exchange.
///
/// Implementations must read the entire body before returning and must be
/// safe to share between concurrent requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a pooled `reqwest` client.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds the underlying client from timeouts and TLS settings.
    pub fn new(options: &TransportOptions) -> Result<Self, AdminError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(options.timeout_ms))
            .connect_timeout(Duration::from_millis(options.connect_timeout_ms));

        if let Some(pem) = &options.ca_certificate_pem {
            let certificate = reqwest::Certificate::from_pem(pem)
                .map_err(|err| AdminError::Config(format!("invalid CA certificate: {err}")))?;
            builder = builder.add_root_certificate(certificate);
        }

        if options.accept_invalid_certs {
            #[cfg(feature = "tracing")]
            tracing::warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|err| AdminError::Config(format!("cannot build HTTP client: {err}")))?;
        Ok(Self { http })
    }

    /// Wraps an already configured `reqwest` client.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut headers = request.headers.clone();
        let mut builder = self.http.request(request.method.clone(), &request.url);

        // `basic_auth` appends rather than replaces, so drop any competing value first.
        if let Some(credentials) = &request.credentials {
            headers.remove(header::AUTHORIZATION);
            builder = builder
                .headers(headers)
                .basic_auth(credentials.username(), Some(credentials.password()));
        } else {
            builder = builder.headers(headers);
        }

        let response = builder.body(request.body.clone()).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            headers,
            body: Some(body.to_vec()),
        })
    }
}
