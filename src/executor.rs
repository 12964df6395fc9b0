use std::sync::Arc;

use reqwest::{
    header::{self, HeaderName, HeaderValue},
    Method,
};
use serde_json::{Map, Value};
use tokio::{
    runtime::{Builder, Handle, Runtime},
    sync::oneshot,
};

use crate::{
    transport::HttpRequest, AdminError, ClientConfig, RequestSpec, Response, Result,
    RetryableClient,
};

/// Runs requests through a shared [`RetryableClient`] and hands back
/// normalized [`Response`]s.
///
/// Every request, retries included, runs as its own task on the executor's
/// runtime and reports back once. [`execute`](RequestExecutor::execute)
/// blocks the calling thread on that report;
/// [`execute_async`](RequestExecutor::execute_async) awaits it. Dropping the
/// caller's future does not cancel the request.
#[derive(Clone, Debug)]
pub struct RequestExecutor {
    client: RetryableClient,
    handle: Handle,
    // Keeps an owned runtime alive for as long as any clone of the executor.
    _runtime: Option<Arc<OwnedRuntime>>,
}

/// Runtime created by [`RequestExecutor::new`].
///
/// Shuts down in the background so the last executor clone may be dropped
/// anywhere, including inside another runtime.
#[derive(Debug)]
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

impl RequestExecutor {
    /// Creates an executor with its own multi-threaded runtime.
    pub fn new(client: RetryableClient) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .thread_name("esadmin-http")
            .enable_all()
            .build()
            .map_err(|err| AdminError::Executor(format!("cannot start runtime: {err}")))?;
        Ok(Self {
            client,
            handle: runtime.handle().clone(),
            _runtime: Some(Arc::new(OwnedRuntime(Some(runtime)))),
        })
    }

    /// Creates an executor that spawns onto an existing runtime.
    pub fn with_handle(client: RetryableClient, handle: Handle) -> Self {
        Self {
            client,
            handle,
            _runtime: None,
        }
    }

    pub fn client(&self) -> &RetryableClient {
        &self.client
    }

    /// Sends `spec` against `config.base_url` and waits for the final outcome.
    ///
    /// Any HTTP status is returned as `Ok`; only a missing response (or a
    /// request that cannot be built) is an error. Calling it from inside an
    /// async context fails with [`AdminError::Executor`]; use
    /// [`execute_async`](RequestExecutor::execute_async) there.
    pub fn execute(&self, config: &ClientConfig, spec: RequestSpec) -> Result<Response> {
        if Handle::try_current().is_ok() {
            return Err(AdminError::Executor(
                "execute called from within an async context".to_owned(),
            ));
        }
        self.submit(config, spec)?
            .blocking_recv()
            .map_err(|_| lost_completion())?
    }

    /// Async form of [`execute`](RequestExecutor::execute).
    ///
    /// The request keeps running to completion even if the returned future is
    /// dropped before it resolves.
    pub async fn execute_async(&self, config: &ClientConfig, spec: RequestSpec) -> Result<Response> {
        self.submit(config, spec)?
            .await
            .map_err(|_| lost_completion())?
    }

    /// Spawns the exchange and returns the receiver of its single completion signal.
    fn submit(
        &self,
        config: &ClientConfig,
        spec: RequestSpec,
    ) -> Result<oneshot::Receiver<Result<Response>>> {
        let request = build_request(config, spec)?;
        let client = self.client.clone();
        let (done_tx, done_rx) = oneshot::channel();

        self.handle.spawn(async move {
            let outcome = exchange(&client, &request).await;
            // The receiver is gone when the caller stopped waiting.
            let _ = done_tx.send(outcome);
        });

        Ok(done_rx)
    }
}

fn lost_completion() -> AdminError {
    AdminError::Executor("request task ended without reporting completion".to_owned())
}

async fn exchange(client: &RetryableClient, request: &HttpRequest) -> Result<Response> {
    let mut response = client.send(request).await?;
    let status = response.status().as_u16();
    let data = match decode_body(&response.take_body()) {
        Ok(data) => data,
        Err(err) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(status, "response body is not a JSON object: {err}");
            drop(err);
            Map::new()
        }
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(method = %request.method, url = %request.url, status, "request completed");

    Ok(Response { status, data })
}

/// Decodes the final body as a JSON object. An empty body is an empty object.
fn decode_body(body: &[u8]) -> serde_json::Result<Map<String, Value>> {
    if body.is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_slice(body)
}

/// Turns the caller's spec into a sendable request.
///
/// Header order: JSON content type for non-empty bodies, then the caller's
/// headers, then Basic credentials when both parts are present.
fn build_request(config: &ClientConfig, spec: RequestSpec) -> Result<HttpRequest> {
    let method = if spec.method.trim().is_empty() {
        Method::GET
    } else {
        Method::from_bytes(spec.method.trim().to_ascii_uppercase().as_bytes()).map_err(|err| {
            AdminError::InvalidRequest(format!("invalid method {:?}: {err}", spec.method))
        })?
    };

    let mut request = HttpRequest::new(method, config.url_for(&spec.endpoint));

    if !spec.body.is_empty() {
        request.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }

    for (name, value) in &spec.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            AdminError::InvalidRequest(format!("invalid header name {name:?}: {err}"))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            AdminError::InvalidRequest(format!("invalid value for header {name:?}: {err}"))
        })?;
        request.headers.insert(header_name, header_value);
    }

    request.body = spec.body;
    request.credentials = config.credentials();
    Ok(request)
}
