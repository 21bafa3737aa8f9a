//! HTTP handlers for bill uploads.

use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::BytesMut;
use tracing::{debug, error, info, warn};

use crate::AppState;
use crate::api::models::uploads::UploadResponse;
use crate::errors::{Error, ErrorBody, Result};
use crate::storage::StoreRequest;

const NO_FILE_UPLOADED: &str = "No file uploaded";
const FILE_TOO_LARGE: &str = "File too large";
const UNEXPECTED_FIELD: &str = "Unexpected field";
const FIELD_TOO_LONG: &str = "Field value too long";
const TOO_MANY_FIELDS: &str = "Too many fields";

/// Map a multipart stream error onto the error taxonomy: size-limit hits and malformed bodies are
/// the client's fault, anything else is a transport fault on our side.
fn multipart_error(e: MultipartError) -> Error {
    let status = e.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        Error::bad_request(FILE_TOO_LARGE)
    } else if status.is_client_error() {
        Error::bad_request(format!("Malformed multipart body: {}", e.body_text()))
    } else {
        error!(error = %e, "Failed to read multipart body");
        Error::internal("upload")
    }
}

#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "uploads",
    summary = "Upload bill",
    description = "Upload a single receipt/bill file under the multipart field `bill`. The returned `filename` is the \
    reference to pass to `/api/analyze`.",
    request_body(
        content_type = "multipart/form-data",
        description = "One file part named `bill`, at most 10 MiB by default"
    ),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file, file too large, unexpected file field, or oversized form values", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn upload_bill(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    // A body that isn't multipart at all carries no file
    let mut multipart = multipart.map_err(|rejection| {
        debug!(%rejection, "Upload without a multipart body");
        Error::bad_request(NO_FILE_UPLOADED)
    })?;

    let limits = &state.config.uploads;
    let field_name = limits.field_name.as_str();
    let max_file_size = limits.max_file_size;
    let mut upload: Option<(String, bytes::Bytes)> = None;
    let mut text_fields: u64 = 0;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        // Parts without a filename are plain form values: bounded, then ignored
        let Some(original_name) = field.file_name().map(str::to_string) else {
            text_fields += 1;
            if text_fields > limits.max_fields {
                return Err(Error::bad_request(TOO_MANY_FIELDS));
            }

            let mut value_len: u64 = 0;
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                value_len += chunk.len() as u64;
                if value_len > limits.max_field_size {
                    debug!(field = ?field.name(), max_field_size = limits.max_field_size, "Form value too long");
                    return Err(Error::bad_request(FIELD_TOO_LONG));
                }
            }
            continue;
        };

        // Exactly one file, under the expected field
        if field.name() != Some(field_name) || upload.is_some() {
            debug!(field = ?field.name(), "Rejecting unexpected file field");
            return Err(Error::bad_request(UNEXPECTED_FIELD));
        }

        let mut content = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            // Fail fast: nothing is persisted for an oversized upload
            if (content.len() + chunk.len()) as u64 > max_file_size {
                warn!(
                    original_name = %original_name,
                    max_file_size = max_file_size,
                    "File size limit exceeded, aborting upload"
                );
                return Err(Error::bad_request(FILE_TOO_LARGE));
            }
            content.extend_from_slice(&chunk);
        }

        upload = Some((original_name, content.freeze()));
    }

    let (original_name, content) = upload.ok_or_else(|| Error::bad_request(NO_FILE_UPLOADED))?;

    let stored = state
        .storage
        .store(StoreRequest { original_name, content })
        .await
        .map_err(|e| {
            error!(error = %e, backend = state.storage.backend_name(), "Failed to store upload");
            Error::internal("upload")
        })?;

    info!(
        stored_name = %stored.stored_name,
        original_name = %stored.original_name,
        size_bytes = stored.size_bytes,
        "File uploaded"
    );

    Ok(Json(UploadResponse::from_stored(&stored)))
}

#[utoipa::path(
    get,
    path = "/uploads/{name}",
    tag = "uploads",
    summary = "Get uploaded file",
    description = "Fetch the raw bytes of a previously uploaded bill.",
    params(
        ("name" = String, Path, description = "Stored filename returned by the upload"),
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "No such upload", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_upload(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response> {
    let content = state.storage.retrieve(&name).await.map_err(|e| {
        if e.is_not_found() {
            Error::NotFound {
                resource: "File".to_string(),
                id: name.clone(),
            }
        } else {
            error!(error = %e, "Failed to read upload");
            Error::internal("download")
        }
    })?;

    let mime = mime_guess::from_path(&name).first_or_octet_stream();

    // Uploads never change once stored
    Ok((
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_string()),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
        ],
        content,
    )
        .into_response())
}
