//! Scripted transport for tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use super::{error_from_response, Request, Transport};
use crate::error::{ClientError, Result};

/// A scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    Ok(Value),
    /// Error response as the server would send it
    Error { status: u16, body: Value },
}

impl MockReply {
    /// `StateMatchingError` reply
    pub fn stale(message: &str) -> Self {
        MockReply::Error {
            status: 400,
            body: serde_json::json!({"error": message, "type": "StateMatchingError"}),
        }
    }
}

/// Transport that records every request and answers from per-path queues
///
/// Replies for a path are consumed in order. A request for a path without a
/// queued reply fails with `NotFound`.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<String, VecDeque<MockReply>>>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply for a path
    pub fn on(&self, path: impl Into<String>, response: Value) -> &Self {
        self.push(path.into(), MockReply::Ok(response));
        self
    }

    /// Queue an error reply for a path
    pub fn on_error(&self, path: impl Into<String>, reply: MockReply) -> &Self {
        self.push(path.into(), reply);
        self
    }

    fn push(&self, path: String, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path)
            .or_default()
            .push_back(reply);
    }

    /// All requests received so far
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Number of queued replies not yet consumed
    pub fn pending_replies(&self) -> usize {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(VecDeque::len)
            .sum()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Value> {
        let path = request.path.clone();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&path)
            .and_then(VecDeque::pop_front);

        match reply {
            Some(MockReply::Ok(value)) => Ok(value),
            Some(MockReply::Error { status, body }) => {
                Err(error_from_response(status, &body.to_string()))
            }
            None => Err(ClientError::NotFound(format!("no scripted reply for {}", path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_replies_in_order() {
        let mock = MockTransport::new();
        mock.on("a", json!(1)).on("a", json!(2));

        assert_eq!(mock.send(Request::get("a")).await.unwrap(), json!(1));
        assert_eq!(mock.send(Request::get("a")).await.unwrap(), json!(2));
        assert!(mock.send(Request::get("a")).await.is_err());
        assert_eq!(mock.request_count(), 3);
        assert_eq!(mock.pending_replies(), 0);
    }

    #[tokio::test]
    async fn test_error_reply_is_mapped() {
        let mock = MockTransport::new();
        mock.on_error("b", MockReply::stale("changed"));

        let err = mock.send(Request::get("b")).await.unwrap_err();
        assert!(matches!(err, ClientError::StalePrecondition(_)));
        assert_eq!(mock.last_request().unwrap().path, "b");
    }
}
