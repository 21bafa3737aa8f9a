//! HTTP handlers for bill analysis.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use tracing::{error, info};

use crate::AppState;
use crate::analysis::{AnalysisError, AnalysisResult};
use crate::api::models::analysis::AnalyzeRequest;
use crate::errors::{Error, ErrorBody, Result};

#[utoipa::path(
    post,
    path = "/api/analyze",
    tag = "analysis",
    summary = "Analyze bill",
    description = "Roast a previously uploaded bill. The result is all-or-nothing: every field is populated, or the \
    request fails.",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Analysis complete", body = AnalysisResult),
        (status = 400, description = "Missing filename or unreadable file", body = ErrorBody),
        (status = 404, description = "No upload with that filename", body = ErrorBody),
        (status = 500, description = "Analysis failed", body = ErrorBody),
        (status = 503, description = "Analysis did not finish in time, retry later", body = ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn analyze_bill(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>> {
    let Json(request) = payload.map_err(|rejection| Error::bad_request(format!("Invalid analysis request: {}", rejection.body_text())))?;

    let filename = request.filename.trim();
    if filename.is_empty() {
        return Err(Error::bad_request("No filename provided"));
    }

    info!(filename, "Analyzing file");

    let content = state.storage.retrieve(filename).await.map_err(|e| {
        if e.is_not_found() {
            Error::NotFound {
                resource: "File".to_string(),
                id: filename.to_string(),
            }
        } else {
            error!(error = %e, filename, "Failed to read upload for analysis");
            Error::internal("analysis")
        }
    })?;

    let result = tokio::time::timeout(state.config.analysis.timeout, state.analyzer.analyze(&content))
        .await
        .map_err(|_| Error::Timeout {
            operation: "Analysis".to_string(),
        })?
        .and_then(|result| result.ensure_complete().map(|_| result))
        .map_err(|e| match e {
            AnalysisError::Unreadable(_) => Error::bad_request(e.to_string()),
            AnalysisError::Incomplete(_) | AnalysisError::Other(_) => {
                error!(error = %e, filename, "Analysis failed");
                Error::internal("analysis")
            }
        })?;

    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::http::StatusCode;

    use crate::analysis::{AnalysisError, AnalysisResult, Analyzer, CannedAnalyzer};
    use crate::api::models::uploads::UploadResponse;
    use crate::errors::ErrorBody;
    use crate::test_utils::{bill_form, create_memory_test_app, create_test_app_with_analyzer};

    struct FailingAnalyzer;

    #[async_trait]
    impl Analyzer for FailingAnalyzer {
        async fn analyze(&self, _content: &[u8]) -> Result<AnalysisResult, AnalysisError> {
            Err(AnalysisError::Other(anyhow::anyhow!("model backend unreachable at 10.0.0.7")))
        }
    }

    async fn upload(server: &axum_test::TestServer, name: &str, content: Vec<u8>) -> String {
        server
            .post("/api/upload")
            .multipart(bill_form(name, content))
            .await
            .json::<UploadResponse>()
            .filename
    }

    #[tokio::test]
    async fn test_analyze_uploaded_file() {
        let (server, _storage) = create_memory_test_app();
        let filename = upload(&server, "receipt.png", vec![1u8; 2048]).await;

        let response = server.post("/api/analyze").json(&serde_json::json!({ "filename": filename })).await;

        response.assert_status(StatusCode::OK);
        let result: AnalysisResult = response.json();
        assert_eq!(result, AnalysisResult::canned());
    }

    #[tokio::test]
    async fn test_analyze_unknown_file_is_404() {
        let (server, _storage) = create_memory_test_app();

        let response = server
            .post("/api/analyze")
            .json(&serde_json::json!({ "filename": "1700000000000-nope.png" }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert!(response.json::<ErrorBody>().error.contains("1700000000000-nope.png"));
    }

    #[tokio::test]
    async fn test_analyze_rejects_path_traversal() {
        let (server, _storage) = create_memory_test_app();

        let response = server
            .post("/api/analyze")
            .json(&serde_json::json!({ "filename": "../../etc/passwd" }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_analyze_without_filename() {
        let (server, _storage) = create_memory_test_app();

        let response = server.post("/api/analyze").json(&serde_json::json!({})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<ErrorBody>().error, "No filename provided");

        let response = server.post("/api/analyze").text("filename=receipt.png").await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_empty_upload_is_bad_request() {
        let (server, _storage) = create_memory_test_app();
        let filename = upload(&server, "empty.png", Vec::new()).await;

        let response = server.post("/api/analyze").json(&serde_json::json!({ "filename": filename })).await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyzer_failure_is_generic_500() {
        let server = create_test_app_with_analyzer(Arc::new(FailingAnalyzer));
        let filename = upload(&server, "receipt.png", vec![1u8; 32]).await;

        let response = server.post("/api/analyze").json(&serde_json::json!({ "filename": filename })).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "Internal Server Error during analysis");
        assert!(!body.error.contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn test_incomplete_result_is_never_returned() {
        let mut partial = AnalysisResult::canned();
        partial.roast = String::new();
        let server = create_test_app_with_analyzer(Arc::new(CannedAnalyzer::with_result(Duration::ZERO, partial)));
        let filename = upload(&server, "receipt.png", vec![1u8; 32]).await;

        let response = server.post("/api/analyze").json(&serde_json::json!({ "filename": filename })).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.json::<ErrorBody>().error, "Internal Server Error during analysis");
    }

    #[tokio::test]
    async fn test_slow_analysis_times_out_with_503() {
        // Test config allows 2s for analysis
        let server = create_test_app_with_analyzer(Arc::new(CannedAnalyzer::new(Duration::from_secs(3))));
        let filename = upload(&server, "receipt.png", vec![1u8; 32]).await;

        let response = server.post("/api/analyze").json(&serde_json::json!({ "filename": filename })).await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.json::<ErrorBody>().error, "Analysis timed out");
    }
}
