use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single administrative request, as supplied by the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestSpec {
    /// HTTP method, e.g. `"PUT"`.
    pub method: String,
    /// Path appended to the configured base URL, e.g. `"/my-index"`.
    pub endpoint: String,
    pub body: Vec<u8>,
    /// Headers applied after the defaults, so they win on conflict.
    pub headers: BTreeMap<String, String>,
}

impl RequestSpec {
    pub fn new(method: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            endpoint: endpoint.into(),
            body: Vec::new(),
            headers: BTreeMap::new(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new("GET", endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new("PUT", endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new("POST", endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new("DELETE", endpoint)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Serializes `value` as the JSON request body.
    pub fn with_json<T: Serialize>(mut self, value: &T) -> serde_json::Result<Self> {
        self.body = serde_json::to_vec(value)?;
        Ok(self)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Normalized outcome of a request that produced an HTTP response.
///
/// Any status is represented here, including 4xx/5xx; interpreting it is left
/// to the caller. `Response::default()` is the zero value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    /// Decoded JSON object of the final response body; empty when the body
    /// was empty or not a JSON object.
    pub data: Map<String, Value>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Shortcut for `data[key]`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// `error.type` of an error payload, if present.
    pub fn error_type(&self) -> Option<&str> {
        self.data.get("error")?.get("type")?.as_str()
    }
}

/// HTTP Basic credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Credentials, RequestSpec, Response};

    #[test]
    fn request_spec_builders_fill_fields() {
        let spec = RequestSpec::put("/logs")
            .with_json(&json!({"settings": {"number_of_shards": 1}}))
            .expect("json body must serialize")
            .with_header("X-Opaque-Id", "bootstrap");

        assert_eq!(spec.method, "PUT");
        assert_eq!(spec.endpoint, "/logs");
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&spec.body).unwrap(),
            json!({"settings": {"number_of_shards": 1}})
        );
        assert_eq!(spec.headers.get("X-Opaque-Id").map(String::as_str), Some("bootstrap"));
    }

    #[test]
    fn response_error_type_reads_nested_discriminator() {
        let data = json!({"error": {"type": "index_not_found_exception"}, "status": 404});
        let response = Response {
            status: 404,
            data: data.as_object().cloned().unwrap(),
        };
        assert_eq!(response.error_type(), Some("index_not_found_exception"));
        assert!(!response.is_success());
        assert_eq!(Response::default().error_type(), None);
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("admin", "s3cret"));
        assert!(debug.contains("admin"));
        assert!(!debug.contains("s3cret"));
    }
}
