//! Request transport
//!
//! The gateway talks to the server only through [`Transport`]. The HTTP
//! implementation queues every request so that the server sees them in
//! submission order; the mock implementation returns scripted replies.

mod form;
mod http;
mod mock;

pub use form::{encode_form, encode_params};
pub use http::HttpTransport;
pub use mock::{MockReply, MockTransport};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One request against the server, path relative to the instance root
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    /// JSON object of parameters; nested values are form-encoded
    pub params: Value,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            params: Value::Object(Default::default()),
        }
    }

    pub fn post(path: impl Into<String>, params: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            params,
        }
    }

    /// Parameter value by name
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// The `state` parameter decoded back into JSON
    pub fn state(&self) -> Option<Value> {
        self.param("state")
            .and_then(Value::as_str)
            .and_then(|s| serde_json::from_str(s).ok())
    }
}

/// Sends requests and returns the decoded JSON response
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Value>;
}

/// Map a failed response to the error taxonomy
///
/// The server reports errors as `{"error": ..., "type": ..., "detail": ...}`,
/// sometimes with a success status.
pub(crate) fn error_from_response(status: u16, body: &str) -> ClientError {
    let payload: Option<Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        payload
            .as_ref()
            .and_then(|p| p.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let error_type = field("type").unwrap_or_default();
    let message = field("error")
        .or_else(|| field("detail"))
        .unwrap_or_else(|| body.to_string());

    if error_type.contains("StateMatching") {
        ClientError::StalePrecondition(message)
    } else if error_type.contains("PermissionError") || status == 403 {
        ClientError::Forbidden(message)
    } else if error_type.contains("DoesNotExist") || status == 404 {
        ClientError::NotFound(message)
    } else {
        ClientError::Server { status, message }
    }
}

/// True if a decoded JSON body carries an error payload
pub(crate) fn is_error_payload(body: &Value) -> bool {
    body.get("error").is_some_and(|e| !e.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_matching_is_stale() {
        let body = r#"{"error": "edition time mismatch", "type": "StateMatchingError"}"#;
        let err = error_from_response(400, body);
        assert!(matches!(
            err,
            ClientError::StalePrecondition(ref m) if m == "edition time mismatch"
        ));
    }

    #[test]
    fn test_permission_error_is_forbidden() {
        let body = r#"{"error": "no", "type": "PermissionError"}"#;
        assert!(matches!(error_from_response(400, body), ClientError::Forbidden(_)));
        assert!(matches!(error_from_response(403, "denied"), ClientError::Forbidden(_)));
    }

    #[test]
    fn test_not_found() {
        let body = r#"{"error": "gone", "type": "DoesNotExist"}"#;
        assert!(matches!(error_from_response(400, body), ClientError::NotFound(_)));
        assert!(matches!(error_from_response(404, ""), ClientError::NotFound(_)));
    }

    #[test]
    fn test_unknown_error_keeps_status() {
        let err = error_from_response(500, "boom");
        assert!(matches!(
            err,
            ClientError::Server { status: 500, ref message } if message == "boom"
        ));
    }

    #[test]
    fn test_request_state_decodes() {
        let request = Request::post(
            "1/link/create",
            serde_json::json!({"state": r#"{"edition_time":"t"}"#}),
        );
        assert_eq!(request.state(), Some(serde_json::json!({"edition_time": "t"})));
        assert!(Request::get("permissions").state().is_none());
    }
}
