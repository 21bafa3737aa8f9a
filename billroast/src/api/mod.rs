//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - `POST /api/upload`: multipart upload of a bill under the `bill` field
//! - `POST /api/analyze`: roast a previously uploaded bill
//! - `GET /uploads/{name}`: fetch an uploaded bill
//! - `GET /health`: liveness probe
//!
//! OpenAPI documentation is served at `/api-docs/openapi.json` and rendered at `/docs`.

pub mod handlers;
pub mod models;
