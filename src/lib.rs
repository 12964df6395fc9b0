//! `esadmin-http` issues administrative requests (index creation, mapping
//! updates, ...) against Elasticsearch/OpenSearch-style REST APIs.
//!
//! Requests go through a [`RetryableClient`] that retries transient failures
//! with exponential backoff, and additionally retries a `400` whose error type
//! is `resource_already_exists_exception`. [`RequestExecutor::execute`] returns
//! the final status and decoded JSON body as a [`Response`], whatever the status.
//!
//! ```no_run
//! use esadmin_http::{ClientConfig, RequestExecutor, RequestSpec, RetryableClient, TransportOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RetryableClient::new(&TransportOptions::default())?;
//! let executor = RequestExecutor::new(client)?;
//! let config = ClientConfig::new("https://localhost:9200").with_credentials("admin", "admin");
//!
//! let response = executor.execute(&config, RequestSpec::put("/logs").with_body(r#"{"settings":{}}"#))?;
//! println!("{} {:?}", response.status, response.data);
//! # Ok(())
//! # }
//! ```

mod backoff;
mod client;
mod config;
mod error;
mod executor;
mod retry;
mod transport;
mod types;

pub use backoff::Backoff;
pub use client::RetryableClient;
pub use config::{ClientConfig, TransportOptions};
pub use error::{AdminError, TransportError};
pub use executor::RequestExecutor;
pub use retry::{
    decide, Attempt, DefaultRetryPolicy, ResourceExistsPolicy, RetryDecision, RetryPolicy,
    RESOURCE_ALREADY_EXISTS,
};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use types::{Credentials, RequestSpec, Response};

pub type Result<T> = std::result::Result<T, AdminError>;
