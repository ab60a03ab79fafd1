pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::review::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/reviews", post(handlers::handle_review))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use jsonwebtoken::{encode, get_current_timestamp, EncodingKey, Header};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::auth::JwtVerifier;
    use crate::llm_client::{ChatBackend, LlmError};
    use crate::review::service::{RetryPolicy, ReviewService};

    const SECRET: &str = "router-test-secret";
    const BOUNDARY: &str = "X-CV-REVIEW-BOUNDARY";
    const MODEL_REPLY: &str = r#"{"apto":"yes","puntuacion":91,"competenciasFaltantes":["Terraform"],"cursosRecomendados":["Terraform Associate"],"resumen":"Excellent match."}"#;

    /// Answers every call with the same result.
    struct StubBackend {
        reply: fn() -> Result<String, LlmError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatBackend for StubBackend {
        async fn send(&self, _model: &str, _prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.reply)()
        }
    }

    fn stub(reply: fn() -> Result<String, LlmError>) -> Arc<StubBackend> {
        Arc::new(StubBackend {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    fn app(backend: Arc<StubBackend>, secured: bool) -> Router {
        let reviewer = ReviewService::new(backend, "gpt-4o-mini".to_string(), 1000)
            .with_retry_policy(RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(1),
            });
        let state = AppState {
            reviewer: Arc::new(reviewer),
            auth: secured.then(|| Arc::new(JwtVerifier::new(SECRET))),
        };
        build_router(state, 1024 * 1024)
    }

    fn token() -> String {
        encode(
            &Header::default(),
            &json!({"sub": "recruiter@example.com", "exp": get_current_timestamp() + 600}),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn multipart_body(file: Option<&str>, vacancy: Option<&str>) -> String {
        let mut body = String::new();
        if let Some(content) = file {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cv.txt\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
            ));
        }
        if let Some(text) = vacancy {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"vacancyDescription\"\r\n\r\n{text}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn review_request(body: String, bearer: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/reviews")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let response = app(stub(|| Ok(String::new())), true)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "cv-review-api");
    }

    #[tokio::test]
    async fn test_review_requires_bearer_token() {
        let backend = stub(|| Ok(MODEL_REPLY.to_string()));
        let response = app(backend.clone(), true)
            .oneshot(review_request(
                multipart_body(Some("Jane Doe, SRE"), None),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["code"], "UNAUTHORIZED");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_review_rejects_invalid_token() {
        let response = app(stub(|| Ok(MODEL_REPLY.to_string())), true)
            .oneshot(review_request(
                multipart_body(Some("Jane Doe, SRE"), None),
                Some("not-a-token".to_string()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_review_returns_verdict_with_external_field_names() {
        let backend = stub(|| Ok(MODEL_REPLY.to_string()));
        let response = app(backend.clone(), true)
            .oneshot(review_request(
                multipart_body(Some("Jane Doe\nSRE, 8 years AWS"), Some("Platform engineer")),
                Some(token()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["apto"], "yes");
        assert_eq!(body["puntuacion"], 91);
        assert_eq!(body["competenciasFaltantes"], json!(["Terraform"]));
        assert_eq!(body["cursosRecomendados"], json!(["Terraform Associate"]));
        assert_eq!(body["resumen"], "Excellent match.");
        assert_eq!(body["rawOpenAiResponse"], MODEL_REPLY);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_review_without_security_needs_no_token() {
        let response = app(stub(|| Ok(MODEL_REPLY.to_string())), false)
            .oneshot(review_request(multipart_body(Some("Jane Doe"), None), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_document_returns_bad_request_verdict() {
        let backend = stub(|| Ok(MODEL_REPLY.to_string()));
        let response = app(backend.clone(), true)
            .oneshot(review_request(multipart_body(Some("   "), None), Some(token())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["apto"], "no");
        assert_eq!(body["puntuacion"], 0);
        assert_eq!(body["resumen"], "Text cannot be extracted from the selected file.");
        assert_eq!(body["rawOpenAiResponse"], "");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_file_part_is_validation_error() {
        let response = app(stub(|| Ok(MODEL_REPLY.to_string())), true)
            .oneshot(review_request(
                multipart_body(None, Some("Platform engineer")),
                Some(token()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_maps_to_429() {
        let backend = stub(|| {
            Err(LlmError::Backend {
                status: 429,
                body: "Too Many Requests".to_string(),
            })
        });
        let response = app(backend.clone(), true)
            .oneshot(review_request(multipart_body(Some("Jane Doe"), None), Some(token())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json_body(response).await["error"]["code"], "RATE_LIMITED");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_backend_failure_maps_to_500() {
        let response = app(
            stub(|| {
                Err(LlmError::Backend {
                    status: 401,
                    body: "invalid api key".to_string(),
                })
            }),
            true,
        )
        .oneshot(review_request(multipart_body(Some("Jane Doe"), None), Some(token())))
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "LLM_ERROR");
        assert!(!body["error"]["message"].as_str().unwrap().contains("api key"));
    }
}
