//! Retry decisions.
//!
//! [`DefaultRetryPolicy`] retries transient failures: transport errors that
//! may go away, 429 and 5xx (except 501). [`ResourceExistsPolicy`] adds one
//! override on top of it: a 400 whose error payload says the resource already
//! exists is retried instead of failing the create outright.

use reqwest::StatusCode;
use serde_json::{Map, Value};

use crate::{transport::HttpResponse, AdminError, TransportError};

/// `error.type` reported when creating an index, template or similar that is already there.
pub const RESOURCE_ALREADY_EXISTS: &str = "resource_already_exists_exception";

/// Outcome of one attempt, as seen by a retry policy.
#[derive(Debug)]
pub enum Attempt<'a> {
    /// A response arrived. Policies may read its body but must restore it.
    Response(&'a mut HttpResponse),
    /// Nothing arrived.
    Failed(&'a TransportError),
}

/// Whether to send the request again, and any error the policy itself hit.
#[derive(Debug)]
pub struct RetryDecision {
    pub retry: bool,
    pub error: Option<AdminError>,
}

impl RetryDecision {
    pub fn retry() -> Self {
        Self {
            retry: true,
            error: None,
        }
    }

    pub fn stop() -> Self {
        Self {
            retry: false,
            error: None,
        }
    }

    /// Stops retrying and surfaces `error` to the caller.
    pub fn fail(error: AdminError) -> Self {
        Self {
            retry: false,
            error: Some(error),
        }
    }
}

impl From<bool> for RetryDecision {
    fn from(retry: bool) -> Self {
        if retry {
            Self::retry()
        } else {
            Self::stop()
        }
    }
}

/// Decides after every attempt whether the request should be sent again.
pub trait RetryPolicy: Send + Sync {
    fn check(&self, attempt: Attempt<'_>) -> RetryDecision;
}

/// Retries transient transport errors, 429 and 5xx other than 501.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRetryPolicy;

impl DefaultRetryPolicy {
    fn should_retry_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS
            || (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
    }
}

impl RetryPolicy for DefaultRetryPolicy {
    fn check(&self, attempt: Attempt<'_>) -> RetryDecision {
        match attempt {
            Attempt::Failed(err) => err.is_retryable().into(),
            Attempt::Response(response) => Self::should_retry_status(response.status()).into(),
        }
    }
}

/// Retries `400 resource_already_exists_exception`, otherwise defers to `fallback`.
#[derive(Clone, Debug, Default)]
pub struct ResourceExistsPolicy<P = DefaultRetryPolicy> {
    fallback: P,
}

impl<P: RetryPolicy> ResourceExistsPolicy<P> {
    pub fn new(fallback: P) -> Self {
        Self { fallback }
    }
}

impl<P: RetryPolicy> RetryPolicy for ResourceExistsPolicy<P> {
    fn check(&self, attempt: Attempt<'_>) -> RetryDecision {
        let response = match attempt {
            Attempt::Response(response) => response,
            failed @ Attempt::Failed(_) => return self.fallback.check(failed),
        };

        if response.status() == StatusCode::BAD_REQUEST
            && error_reason(response) == RESOURCE_ALREADY_EXISTS
        {
            #[cfg(feature = "tracing")]
            tracing::debug!("resource already exists, retrying to confirm");
            return RetryDecision::retry();
        }

        self.fallback.check(Attempt::Response(response))
    }
}

/// Retry decision for one attempt under the default policy with the
/// resource-exists override.
///
/// Pass the response when one arrived, otherwise the transport error. With
/// neither, nothing is known and the request is not retried.
pub fn decide(
    response: Option<&mut HttpResponse>,
    transport_err: Option<&TransportError>,
) -> RetryDecision {
    let policy = ResourceExistsPolicy::<DefaultRetryPolicy>::default();
    match (response, transport_err) {
        (Some(response), _) => policy.check(Attempt::Response(response)),
        (None, Some(err)) => policy.check(Attempt::Failed(err)),
        (None, None) => RetryDecision::stop(),
    }
}

/// Reads `error.type` from the body and leaves the body readable again.
///
/// Any shape other than `{"error": {"type": "<string>"}}` yields `""`.
fn error_reason(response: &mut HttpResponse) -> String {
    let body = response.take_body();
    let reason = serde_json::from_slice::<Map<String, Value>>(&body)
        .ok()
        .and_then(|data| {
            data.get("error")
                .and_then(Value::as_object)
                .and_then(|error| error.get("type"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_default();
    response.restore_body(body);
    reason
}
