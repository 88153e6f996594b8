//! reqgate-http: HTTP transport and response validator for reqgate sessions.

mod client;
mod status;

pub use client::{
    HttpClient, HttpClientError, HttpConfig, HttpRequest, HttpResponse, USER_AGENT,
};
pub use status::{is_success, status_validator};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use reqgate::{Failure, FireError, FireOptions, GlobalRegistry, RegistryOptions, RequestSession};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry() -> Arc<GlobalRegistry> {
        let registry = Arc::new(GlobalRegistry::new());
        registry.configure(
            RegistryOptions::new()
                .with_client(Arc::new(HttpClient::new().unwrap()))
                .with_queue(true)
                .with_default_parallel(false),
        );
        registry.set_validator(is_success);
        registry
    }

    #[tokio::test]
    async fn session_resolves_http_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2])))
            .mount(&server)
            .await;

        let registry = registry();
        let session = RequestSession::new(
            Arc::clone(&registry),
            json!({"url": format!("{}/orders", server.uri())}),
        );
        let response = session
            .fire(FireOptions::new().with_key("orders"))
            .await
            .unwrap();

        assert_eq!(response["status"], json!(200));
        assert_eq!(response["body"], json!([1, 2]));
        assert!(registry.queue().unwrap().is_idle());
    }

    #[tokio::test]
    async fn session_rejects_error_code_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"errorCode": 40, "message": "quota"})),
            )
            .mount(&server)
            .await;

        let session = RequestSession::new(registry(), json!({"url": server.uri()}));
        let err = session.fire(FireOptions::new()).await.unwrap_err();

        let Some(Failure::Invalid(response)) = err.rejection() else {
            panic!("expected validator rejection, got {err:?}");
        };
        assert_eq!(response["body"]["errorCode"], json!(40));
        assert!(matches!(err, FireError::Rejected(_)));
    }
}
