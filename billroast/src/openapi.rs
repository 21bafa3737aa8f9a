//! OpenAPI documentation, served as JSON at `/api-docs/openapi.json` and rendered at `/docs`.

use utoipa::OpenApi;

use crate::analysis::AnalysisResult;
use crate::api;
use crate::api::models::{analysis::AnalyzeRequest, uploads::UploadResponse};
use crate::errors::ErrorBody;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bill Roast API",
        description = "Upload a photo or scan of a bill, then get it roasted: a spending rank, hashtags, a short \
        roast, a savings countdown and tomorrow's budget. Every error response carries an `error` message.",
    ),
    paths(
        api::handlers::uploads::upload_bill,
        api::handlers::uploads::get_upload,
        api::handlers::analysis::analyze_bill,
        api::handlers::health::health,
    ),
    components(schemas(UploadResponse, AnalyzeRequest, AnalysisResult, ErrorBody)),
    tags(
        (name = "uploads", description = "Bill upload and retrieval"),
        (name = "analysis", description = "Bill roasting"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;
