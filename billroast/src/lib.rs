//! # billroast: bill upload and roasting service
//!
//! `billroast` accepts a photo or scan of a bill, keeps it, and answers with a humorous
//! "financial roast" of it: a spending rank, a few hashtags, a short roast, a countdown to
//! financial freedom and a suggested budget for tomorrow.
//!
//! ## Request Flow
//!
//! A client first sends the file to `POST /api/upload` as a multipart form, under the field
//! `bill`. The upload is checked (exactly one file, at most `uploads.max_file_size` bytes) and
//! handed to a [`storage::FileStorage`] backend, which assigns it a collision-free stored name.
//! That name comes back as `filename` together with the public path under `/uploads/`.
//!
//! The client then posts `{"filename": ...}` to `POST /api/analyze`. The file is looked up in
//! storage and passed to the configured [`analysis::Analyzer`]. The response is either a complete
//! [`analysis::AnalysisResult`] or an error, never a partial result. Analyses that outlive
//! `analysis.timeout` fail with 503 so the client can retry.
//!
//! Every failure, including unmatched routes, request timeouts and handler panics, is answered
//! with a JSON body of the form `{"error": "..."}` (see [`errors::Error`]).
//!
//! ## Storage
//!
//! Uploads are written to a local directory by default. When the filesystem is not usable
//! (`storage.type: memory`, or whenever the `VERCEL` environment variable is set), they are kept
//! in process memory instead and are lost on restart.
//!
//! ## Configuration
//!
//! See [`config`] for the YAML file layout and the `BILLROAST_` environment overrides.

pub mod analysis;
pub mod api;
pub mod config;
pub mod errors;
pub mod openapi;
pub mod recovery;
pub mod storage;
pub mod telemetry;
#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Uri},
    routing::{get, post},
};
use bon::Builder;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;

use crate::analysis::Analyzer;
use crate::config::CorsOrigin;
use crate::errors::Error;
use crate::openapi::ApiDoc;
use crate::recovery::RouterRecoveryExt;
use crate::storage::FileStorage;

/// Room for multipart boundaries and part headers on top of the file and form values
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn FileStorage>,
    pub analyzer: Arc<dyn Analyzer>,
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;

    let allow_origin = if cors_config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Browsers send the bare origin, without path or trailing slash
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(cors_config.methods()?)
        .allow_headers(cors_config.headers()?);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

async fn route_not_found(uri: Uri) -> Error {
    Error::NotFound {
        resource: "Route".to_string(),
        id: uri.path().to_string(),
    }
}

/// Build the application router with all endpoints and middleware.
///
/// Middleware, from the outside in: request tracing, CORS, then recovery (request timeout and
/// panic handling).
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    // The handler enforces the per-file and per-field limits itself; this only caps the whole body
    let body_limit = usize::try_from(state.config.uploads.max_body_size().saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .route(
            "/upload",
            post(api::handlers::uploads::upload_bill).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/analyze", post(api::handlers::analysis::analyze_bill));

    let router = Router::new()
        .route("/health", get(api::handlers::health::health))
        .route("/uploads/{name}", get(api::handlers::uploads::get_upload))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest("/api", api_routes)
        .fallback(route_not_found)
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .with_recovery(state.config.request_timeout);

    let cors_layer = create_cors_layer(&state.config)?;
    let router = router.layer(cors_layer);

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with storage and analyzer chosen by configuration
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting billroast with configuration: {:#?}", config);

        let storage = storage::create_file_storage(&config.storage).await?;
        info!(backend = storage.backend_name(), "Upload storage ready");

        let analyzer = analysis::create_analyzer(&config.analysis);

        Self::with_components(config, storage, analyzer)
    }

    /// Create an application around already constructed storage and analyzer
    pub fn with_components(config: Config, storage: Arc<dyn FileStorage>, analyzer: Arc<dyn Analyzer>) -> anyhow::Result<Self> {
        let app_state = AppState::builder().config(config.clone()).storage(storage).analyzer(analyzer).build();
        let router = build_router(&app_state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "billroast listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
