use std::{fmt, sync::Arc};

use tokio::time::sleep;

use crate::{
    backoff::Backoff,
    retry::{Attempt, DefaultRetryPolicy, ResourceExistsPolicy, RetryPolicy},
    transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport},
    AdminError, Result, TransportOptions,
};

/// Transport plus retry loop, shared by every request of the process.
///
/// Cloning is cheap and clones share the connection pool. The policy is
/// consulted after each attempt; by default it is
/// [`ResourceExistsPolicy`] over [`DefaultRetryPolicy`].
#[derive(Clone)]
pub struct RetryableClient {
    transport: Arc<dyn Transport>,
    policy: Arc<dyn RetryPolicy>,
    backoff: Backoff,
    max_retries: usize,
}

impl fmt::Debug for RetryableClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryableClient")
            .field("backoff", &self.backoff)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl RetryableClient {
    /// Creates a client over `reqwest` configured from `options`.
    pub fn new(options: &TransportOptions) -> Result<Self> {
        let transport = ReqwestTransport::new(options)?;
        Ok(Self::with_transport(transport, options))
    }

    /// Creates a client over a custom transport. Only the retry settings of
    /// `options` are used.
    pub fn with_transport(transport: impl Transport + 'static, options: &TransportOptions) -> Self {
        Self {
            transport: Arc::new(transport),
            policy: Arc::new(ResourceExistsPolicy::new(DefaultRetryPolicy)),
            backoff: Backoff::from_options(options),
            max_retries: options.max_retries,
        }
    }

    /// Replaces the retry policy.
    pub fn with_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Sends `request` until the policy stops or retries run out.
    ///
    /// Returns the last response whatever its status. Fails only when the
    /// last attempt produced no response or the policy reported an error.
    pub async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut attempt = 0usize;
        loop {
            #[cfg(feature = "tracing")]
            tracing::debug!(method = %request.method, url = %request.url, attempt = attempt + 1, "sending request");

            let mut outcome = self.transport.send(request).await;
            let decision = match &mut outcome {
                Ok(response) => self.policy.check(Attempt::Response(response)),
                Err(err) => self.policy.check(Attempt::Failed(err)),
            };

            if let Some(err) = decision.error {
                return Err(err);
            }
            if !decision.retry {
                return outcome.map_err(AdminError::from);
            }
            if attempt >= self.max_retries {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    method = %request.method,
                    url = %request.url,
                    "giving up after {} attempt(s)",
                    attempt + 1
                );
                return outcome.map_err(AdminError::from);
            }

            let delay = self.backoff.delay(attempt, outcome.as_ref().ok());
            #[cfg(feature = "tracing")]
            tracing::debug!("retrying request after {} ms", delay.as_millis());
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };

    use async_trait::async_trait;
    use reqwest::{Method, StatusCode};

    use super::RetryableClient;
    use crate::{
        retry::{Attempt, DefaultRetryPolicy, RetryDecision, RetryPolicy},
        transport::{HttpRequest, HttpResponse, Transport},
        AdminError, TransportError, TransportOptions,
    };

    type Outcome = Result<(u16, &'static str), TransportError>;

    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<Outcome>>,
        hits: Arc<AtomicUsize>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<Outcome>) -> (Self, Arc<AtomicUsize>) {
            let hits = Arc::new(AtomicUsize::new(0));
            let transport = Self {
                outcomes: Mutex::new(outcomes.into()),
                hits: hits.clone(),
            };
            (transport, hits)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            let next = self
                .outcomes
                .lock()
                .expect("outcome queue mutex must not be poisoned")
                .pop_front()
                .unwrap_or(Err(TransportError::Other("script exhausted".to_owned())));
            next.map(|(status, body)| {
                HttpResponse::new(
                    StatusCode::from_u16(status).expect("valid status"),
                    body.as_bytes().to_vec(),
                )
            })
        }
    }

    fn options(max_retries: usize) -> TransportOptions {
        TransportOptions {
            max_retries,
            retry_wait_min_ms: 1,
            retry_wait_max_ms: 2,
            ..TransportOptions::default()
        }
    }

    fn request() -> HttpRequest {
        HttpRequest::new(Method::PUT, "http://es.invalid/logs")
    }

    const EXISTS: &str = r#"{"error":{"type":"resource_already_exists_exception"}}"#;

    #[tokio::test]
    async fn success_is_returned_after_one_attempt() {
        let (transport, hits) = ScriptedTransport::new(vec![Ok((200, r#"{"acknowledged":true}"#))]);
        let client = RetryableClient::with_transport(transport, &options(4));

        let mut response = client.send(&request()).await.expect("must succeed");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.take_body(), br#"{"acknowledged":true}"#);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resource_exists_is_retried_until_it_converges() {
        let (transport, hits) = ScriptedTransport::new(vec![
            Ok((400, EXISTS)),
            Ok((200, r#"{"logs":{}}"#)),
        ]);
        let client = RetryableClient::with_transport(transport, &options(4));

        let response = client.send(&request()).await.expect("must succeed");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_response_with_body() {
        let (transport, hits) = ScriptedTransport::new(vec![
            Ok((400, EXISTS)),
            Ok((400, EXISTS)),
            Ok((400, EXISTS)),
        ]);
        let client = RetryableClient::with_transport(transport, &options(2));

        let mut response = client.send(&request()).await.expect("last response is returned");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.take_body(), EXISTS.as_bytes());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_bad_requests_are_not_retried() {
        let (transport, hits) = ScriptedTransport::new(vec![Ok((
            400,
            r#"{"error":{"type":"mapper_parsing_exception"}}"#,
        ))]);
        let client = RetryableClient::with_transport(transport, &options(4));

        let response = client.send(&request()).await.expect("400 is a response, not an error");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let (transport, hits) = ScriptedTransport::new(vec![
            Err(TransportError::Connect("connection refused".to_owned())),
            Ok((503, "{}")),
            Ok((201, r#"{"acknowledged":true}"#)),
        ]);
        let client = RetryableClient::with_transport(transport, &options(4));

        let response = client.send(&request()).await.expect("must succeed");

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn persistent_transport_failure_surfaces_last_error() {
        let (transport, hits) = ScriptedTransport::new(vec![
            Err(TransportError::Connect("refused".to_owned())),
            Err(TransportError::Timeout("slow".to_owned())),
        ]);
        let client = RetryableClient::with_transport(transport, &options(1));

        let err = client.send(&request()).await.expect_err("must fail");

        assert!(matches!(
            err,
            AdminError::Transport(TransportError::Timeout(_))
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_transport_failure_is_not_retried() {
        let (transport, hits) = ScriptedTransport::new(vec![Err(TransportError::InvalidRequest(
            "unsupported scheme".to_owned(),
        ))]);
        let client = RetryableClient::with_transport(transport, &options(4));

        let err = client.send(&request()).await.expect_err("must fail");

        assert!(matches!(
            err,
            AdminError::Transport(TransportError::InvalidRequest(_))
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    struct FailOnServerError;

    impl RetryPolicy for FailOnServerError {
        fn check(&self, attempt: Attempt<'_>) -> RetryDecision {
            match &attempt {
                Attempt::Response(response) if response.status().is_server_error() => {
                    RetryDecision::fail(AdminError::Policy("server is unhealthy".to_owned()))
                }
                _ => DefaultRetryPolicy.check(attempt),
            }
        }
    }

    #[tokio::test]
    async fn policy_errors_stop_the_loop() {
        let (transport, hits) =
            ScriptedTransport::new(vec![Ok((500, "{}")), Ok((200, "{}"))]);
        let client =
            RetryableClient::with_transport(transport, &options(4)).with_policy(FailOnServerError);

        let err = client.send(&request()).await.expect_err("policy error must surface");

        assert!(matches!(err, AdminError::Policy(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn default_policy_alone_does_not_retry_resource_exists() {
        let (transport, hits) = ScriptedTransport::new(vec![Ok((400, EXISTS)), Ok((200, "{}"))]);
        let client =
            RetryableClient::with_transport(transport, &options(4)).with_policy(DefaultRetryPolicy);

        let response = client.send(&request()).await.expect("must return response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
