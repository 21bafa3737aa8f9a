//! Liveness probe.

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    summary = "Health check",
    responses(
        (status = 200, description = "Service is up", body = String, content_type = "text/plain"),
    )
)]
pub async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{bill_form, create_memory_test_app};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_returns_ok() {
        let (server, _storage) = create_memory_test_app();

        let response = server.get("/health").await;

        response.assert_status(StatusCode::OK);
        response.assert_text("OK");
        assert!(
            response
                .headers()
                .get("content-type")
                .is_some_and(|v| v.to_str().unwrap().starts_with("text/plain"))
        );
    }

    #[tokio::test]
    async fn test_health_unaffected_by_failed_requests() {
        let (server, _storage) = create_memory_test_app();

        server.post("/api/upload").await.assert_status(StatusCode::BAD_REQUEST);
        server
            .post("/api/analyze")
            .json(&serde_json::json!({ "filename": "missing.png" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/api/upload")
            .multipart(bill_form("ok.png", vec![1u8; 8]))
            .await
            .assert_status(StatusCode::OK);

        let response = server.get("/health").await;
        response.assert_status(StatusCode::OK);
        response.assert_text("OK");
    }
}
