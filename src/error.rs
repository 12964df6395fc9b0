use std::error::Error as StdError;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// No response was obtained from the target API.
    #[error("transport error: {0}")]
    Transport(TransportError),
    /// The request could not be built from the caller's method, URL or headers.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// A retry policy failed while inspecting an attempt.
    #[error("retry policy error: {0}")]
    Policy(String),
    /// The background exchange never signalled completion.
    #[error("executor error: {0}")]
    Executor(String),
    /// Client or transport configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<TransportError> for AdminError {
    fn from(err: TransportError) -> Self {
        AdminError::Transport(err)
    }
}

/// Delivery failure of a single attempt: no HTTP response was received.
///
/// Each variant carries the rendered error chain of the underlying cause.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Malformed URL, unsupported scheme or otherwise unsendable request.
    #[error("request could not be sent: {0}")]
    InvalidRequest(String),
    #[error("too many redirects: {0}")]
    Redirect(String),
    /// Certificate verification failed during the TLS handshake.
    #[error("tls error: {0}")]
    Tls(String),
    /// The response body could not be read to the end.
    #[error("response body error: {0}")]
    Body(String),
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether re-sending the same request can plausibly succeed.
    ///
    /// Bad requests, redirect loops and certificate failures fail the same way
    /// every time; everything else is treated as transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TransportError::InvalidRequest(_) | TransportError::Redirect(_) | TransportError::Tls(_)
        )
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let chain = render_chain(&err);
        if err.is_builder() {
            TransportError::InvalidRequest(chain)
        } else if err.is_redirect() {
            TransportError::Redirect(chain)
        } else if err.is_timeout() {
            TransportError::Timeout(chain)
        } else if err.is_connect() {
            if chain.to_ascii_lowercase().contains("certificate") {
                TransportError::Tls(chain)
            } else {
                TransportError::Connect(chain)
            }
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(chain)
        } else {
            TransportError::Other(chain)
        }
    }
}

// reqwest's Display stops at the outermost layer; the cause is usually the useful part.
fn render_chain(err: &dyn StdError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
