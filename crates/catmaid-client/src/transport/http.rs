//! HTTP transport backed by reqwest

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{encode_form, error_from_response, is_error_payload, Method, Request, Transport};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// HTTP transport for a CATMAID instance
///
/// At most one request is in flight. Waiting callers are served in the order
/// they arrived, so the server applies mutations in submission order.
///
/// # Example
///
/// ```rust,no_run
/// use catmaid_client::{ClientConfig, HttpTransport};
///
/// # fn example() -> catmaid_client::Result<()> {
/// let transport = HttpTransport::new(
///     ClientConfig::new("https://catmaid.example.org").with_api_token("secret"),
/// )?;
/// # Ok(())
/// # }
/// ```
pub struct HttpTransport {
    config: ClientConfig,
    client: Client,
    queue: Mutex<()>,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = config.api_token {
            let value = header::HeaderValue::from_str(&format!("Token {}", token))
                .map_err(|_| ClientError::Config("API token is not a valid header value".into()))?;
            headers.insert("X-Authorization", value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            queue: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &body));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| ClientError::InvalidResponse(format!("{}: {}", e, body)))?;
        if is_error_payload(&value) {
            return Err(error_from_response(status.as_u16(), &body));
        }
        Ok(value)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Value> {
        let mut url = self.config.url(&request.path);
        let encoded = encode_form(&request.params)?;

        let _turn = self.queue.lock().await;
        debug!(method = ?request.method, url = %url, bytes = encoded.len(), "Sending request");

        let builder = match request.method {
            Method::Get => {
                if !encoded.is_empty() {
                    url.push('?');
                    url.push_str(&encoded);
                }
                self.client.get(&url)
            }
            Method::Post => self
                .client
                .post(&url)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(encoded),
        };
        let response = builder.send().await?;
        let result = self.handle_response(response).await;
        if let Err(ref e) = result {
            warn!(url = %url, error = %e, "Request failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn transport(server: &MockServer) -> HttpTransport {
        HttpTransport::new(ClientConfig::new(server.uri()).with_api_token("abc")).unwrap()
    }

    #[tokio::test]
    async fn test_post_is_form_encoded_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/connector/create"))
            .and(header("X-Authorization", "Token abc"))
            .and(body_string_contains("links%5B0%5D%5B1%5D=4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "connector_id": 9,
                "connector_edition_time": "t9",
                "created_links": []
            })))
            .mount(&server)
            .await;

        let response = transport(&server)
            .await
            .send(Request::post(
                "1/connector/create",
                json!({"x": 1, "links": [[12, 4, 5]]}),
            ))
            .await
            .unwrap();
        assert_eq!(response["connector_id"], 9);
    }

    #[tokio::test]
    async fn test_get_uses_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/permissions"))
            .and(query_param("all", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"1": {}})))
            .mount(&server)
            .await;

        let mut request = Request::get("permissions");
        request.params = json!({"all": true});
        let response = transport(&server).await.send(request).await.unwrap();
        assert_eq!(response, json!({"1": {}}));
    }

    #[tokio::test]
    async fn test_error_payload_with_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/link/delete"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "The provided state differs from the database state",
                "type": "ValueError/StateMatchingError"
            })))
            .mount(&server)
            .await;

        let err = transport(&server)
            .await
            .send(Request::post("1/link/delete", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::StalePrecondition(_)));
    }

    #[tokio::test]
    async fn test_not_found_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1/connector/5/detail"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = transport(&server)
            .await
            .send(Request::get("1/connector/5/detail"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(HttpTransport::new(ClientConfig::new("catmaid.local")).is_err());
    }
}
