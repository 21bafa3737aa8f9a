use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::StoredFile;

/// Response for a successful upload
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "message": "File uploaded successfully",
    "filename": "1760812345678-6f1c2e9a0b7d4c3e8a5f1b2c3d4e5f60.png",
    "path": "/uploads/1760812345678-6f1c2e9a0b7d4c3e8a5f1b2c3d4e5f60.png"
}))]
pub struct UploadResponse {
    pub message: String,
    /// Storage key to pass to `/api/analyze`
    pub filename: String,
    /// Where the uploaded file can be fetched
    pub path: String,
}

impl UploadResponse {
    pub fn from_stored(stored: &StoredFile) -> Self {
        Self {
            message: "File uploaded successfully".to_string(),
            filename: stored.stored_name.clone(),
            path: stored.public_path(),
        }
    }
}
