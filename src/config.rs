use std::fmt;

use crate::Credentials;

/// Target cluster and the credentials used to reach it.
///
/// Read-only once built; one value is typically shared by every request
/// against the same cluster.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL requests are issued against, e.g. `https://localhost:9200`.
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ClientConfig {
    /// Creates a configuration without credentials.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: None,
            password: None,
        }
    }

    /// Sets HTTP Basic credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Creates a configuration from environment variables.
    ///
    /// Reads:
    /// - `ESADMIN_URL` — base URL of the cluster (required)
    /// - `ESADMIN_USERNAME` / `ESADMIN_PASSWORD` — optional Basic credentials
    ///
    /// Returns an error if `ESADMIN_URL` is missing or empty.
    pub fn from_env() -> std::result::Result<Self, String> {
        let base_url = std::env::var("ESADMIN_URL")
            .map_err(|_| "missing ESADMIN_URL environment variable".to_owned())?;
        if base_url.trim().is_empty() {
            return Err("ESADMIN_URL is set but empty".to_owned());
        }
        Ok(Self {
            base_url,
            username: std::env::var("ESADMIN_USERNAME").ok(),
            password: std::env::var("ESADMIN_PASSWORD").ok(),
        })
    }

    /// Credentials to attach, if any.
    ///
    /// Blank usernames or passwords are never sent: both parts must be
    /// non-empty, otherwise the request goes out without authorization.
    pub fn credentials(&self) -> Option<Credentials> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Credentials::new(username, password))
            }
            _ => None,
        }
    }

    /// Joins the base URL and an endpoint with exactly one `/` between them.
    pub fn url_for(&self, endpoint: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if endpoint.is_empty() {
            return base.to_owned();
        }
        if endpoint.starts_with('/') {
            format!("{base}{endpoint}")
        } else {
            format!("{base}/{endpoint}")
        }
    }
}

/// Configures the shared transport: timeouts, retry schedule and TLS.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransportOptions {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Smallest wait between attempts in milliseconds (exponential base).
    pub retry_wait_min_ms: u64,
    /// Largest wait between attempts in milliseconds.
    pub retry_wait_max_ms: u64,
    /// Skip server certificate verification. Never enable outside testing.
    pub accept_invalid_certs: bool,
    /// Extra PEM-encoded root certificate to trust.
    pub ca_certificate_pem: Option<Vec<u8>>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            max_retries: 4,
            retry_wait_min_ms: 200,
            retry_wait_max_ms: 30_000,
            accept_invalid_certs: false,
            ca_certificate_pem: None,
        }
    }
}
