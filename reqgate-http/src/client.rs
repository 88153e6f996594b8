//! HTTP transport on reqwest.
//!
//! Request payloads are JSON records:
//! `{ "method": "GET", "url": "...", "headers": {..}, "query": {..}, "body": .. }`
//! (`params` and `data` are accepted for `query` and `body`). Responses come
//! back as `{ "status": 200, "headers": {..}, "body": .. }`; the body is parsed
//! as JSON when possible and kept as a string otherwise.
//!
//! Only network-level failures are transport errors. Any HTTP status is a
//! result, left to the validator.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqgate::{Transport, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const USER_AGENT: &str = concat!("reqgate/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request timeout; `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
    pub user_agent: String,
    /// Sent as `Authorization: Bearer <token>` on every request.
    pub bearer_token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            user_agent: USER_AGENT.to_string(),
            bearer_token: std::env::var("REQGATE_AUTH_TOKEN").ok(),
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HttpRequest {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, alias = "params")]
    pub query: BTreeMap<String, Value>,
    #[serde(default, alias = "data")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, HttpClientError> {
        Self::with_config(HttpConfig::default())
    }

    pub fn with_config(config: HttpConfig) -> Result<Self, HttpClientError> {
        let mut headers = reqwest::header::HeaderMap::new();

        if let Some(token) = &config.bearer_token
            && let Ok(value) = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
        {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        if let Ok(value) = reqwest::header::HeaderValue::from_str(&config.user_agent) {
            headers.insert(reqwest::header::USER_AGENT, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| TransportError::new(format!("invalid HTTP method: {}", request.method)))?;

        let mut builder = self.client.request(method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.query.is_empty() {
            let pairs: Vec<(&str, String)> = request
                .query
                .iter()
                .map(|(name, value)| (name.as_str(), query_value(value)))
                .collect();
            builder = builder.query(&pairs);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(method = %method, url = %request.url, error = %e, "HTTP request failed");
            TransportError::new(format!("{} {} failed: {}", method, request.url, e))
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let text = response.text().await.map_err(|e| {
            TransportError::new(format!("failed to read response body: {}", e))
                .with_detail(serde_json::json!({ "status": status }))
        })?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        tracing::debug!(method = %method, url = %request.url, status, "HTTP response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn call(&self, request: Value) -> Result<Value, TransportError> {
        let request: HttpRequest = serde_json::from_value(request)
            .map_err(|e| TransportError::new(format!("invalid request payload: {}", e)))?;
        let response = self.send(request).await?;
        serde_json::to_value(response).map_err(|e| TransportError::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::with_config(HttpConfig {
            timeout: Some(Duration::from_secs(5)),
            user_agent: USER_AGENT.to_string(),
            bearer_token: None,
        })
        .unwrap()
    }

    #[test]
    fn request_defaults_and_aliases() {
        let request: HttpRequest = serde_json::from_value(json!({
            "url": "http://localhost/items",
            "params": {"page": 2},
            "data": {"name": "widget"},
        }))
        .unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.query.get("page"), Some(&json!(2)));
        assert_eq!(request.body, Some(json!({"name": "widget"})));
        assert!(request.headers.is_empty());
    }

    #[test]
    fn response_record_shape() {
        let response = HttpResponse {
            status: 201,
            headers: BTreeMap::from([
                ("content-type".to_string(), "application/json".to_string()),
                ("x-request-id".to_string(), "r-42".to_string()),
            ]),
            body: json!({"id": 7}),
        };
        insta::assert_json_snapshot!("http_response_shape", response);
    }

    #[tokio::test]
    async fn sends_method_headers_query_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/items"))
            .and(query_param("page", "2"))
            .and(header("x-trace", "abc"))
            .and(header("user-agent", USER_AGENT))
            .and(body_json(json!({"name": "widget"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
            .expect(1)
            .mount(&server)
            .await;

        let response = client()
            .call(json!({
                "method": "post",
                "url": format!("{}/items", server.uri()),
                "headers": {"x-trace": "abc"},
                "query": {"page": 2},
                "body": {"name": "widget"},
            }))
            .await
            .unwrap();

        assert_eq!(response["status"], json!(201));
        assert_eq!(response["body"], json!({"id": 7}));
    }

    #[tokio::test]
    async fn error_status_is_a_result() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
            .mount(&server)
            .await;

        let response = client()
            .send(HttpRequest {
                method: "GET".to_string(),
                url: format!("{}/missing", server.uri()),
                headers: BTreeMap::new(),
                query: BTreeMap::new(),
                body: None,
            })
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.body, json!("not here"));
    }

    #[tokio::test]
    async fn empty_body_is_null() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let response = client()
            .call(json!({"method": "DELETE", "url": server.uri()}))
            .await
            .unwrap();
        assert_eq!(response["status"], json!(204));
        assert_eq!(response["body"], Value::Null);
    }

    #[tokio::test]
    async fn bearer_token_is_sent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::with_config(HttpConfig {
            bearer_token: Some("s3cret".to_string()),
            ..HttpConfig::default()
        })
        .unwrap();
        client.call(json!({"url": server.uri()})).await.unwrap();
    }

    #[tokio::test]
    async fn connection_failure_is_transport_error() {
        // Nothing listens on port 9 (discard) on test hosts.
        let err = client()
            .call(json!({"url": "http://127.0.0.1:9/"}))
            .await
            .unwrap_err();
        assert!(err.message().starts_with("GET http://127.0.0.1:9/ failed"));
    }

    #[tokio::test]
    async fn malformed_payload_is_transport_error() {
        let err = client().call(json!({"method": "GET"})).await.unwrap_err();
        assert!(err.message().starts_with("invalid request payload"));

        let err = client()
            .call(json!({"method": "NOT A METHOD", "url": "http://localhost/"}))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "invalid HTTP method: NOT A METHOD");
    }
}
