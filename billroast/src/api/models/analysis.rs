use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `/api/analyze`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    /// `filename` returned by a previous upload
    #[serde(default)]
    #[schema(example = "1760812345678-6f1c2e9a0b7d4c3e8a5f1b2c3d4e5f60.png")]
    pub filename: String,
}
