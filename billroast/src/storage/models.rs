use bytes::Bytes;

/// Request to store an uploaded file
#[derive(Debug, Clone)]
pub struct StoreRequest {
    /// Client-supplied filename. Untrusted, only its extension is kept.
    pub original_name: String,
    pub content: Bytes,
}

/// Metadata for a stored upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Generated key the content can be retrieved with
    pub stored_name: String,
    pub original_name: String,
    pub size_bytes: u64,
}

impl StoredFile {
    /// Public path under which the upload is served
    pub fn public_path(&self) -> String {
        format!("{}/{}", super::UPLOADS_PATH, self.stored_name)
    }
}
