//! Helpers for building test servers around the real router.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};

use crate::Application;
use crate::analysis::{Analyzer, CannedAnalyzer};
use crate::config::{AnalysisConfig, Config, StorageConfig};
use crate::storage::{MemoryFileStorage, create_file_storage};

pub fn create_test_config() -> Config {
    Config {
        storage: StorageConfig::Memory,
        analysis: AnalysisConfig {
            delay: Duration::ZERO,
            timeout: Duration::from_secs(2),
        },
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

/// Test server over in-memory storage; the storage handle lets tests inspect what was persisted
pub fn create_memory_test_app() -> (TestServer, Arc<MemoryFileStorage>) {
    let storage = Arc::new(MemoryFileStorage::new());
    let server = Application::with_components(create_test_config(), storage.clone(), Arc::new(CannedAnalyzer::new(Duration::ZERO)))
        .expect("Failed to create application")
        .into_test_server();

    (server, storage)
}

pub async fn create_local_test_app(upload_dir: &Path) -> TestServer {
    let config = Config {
        storage: StorageConfig::Local {
            path: upload_dir.to_path_buf(),
        },
        ..create_test_config()
    };
    let storage = create_file_storage(&config.storage).await.expect("Failed to create local storage");

    Application::with_components(config, storage, Arc::new(CannedAnalyzer::new(Duration::ZERO)))
        .expect("Failed to create application")
        .into_test_server()
}

pub fn create_test_app_with_analyzer(analyzer: Arc<dyn Analyzer>) -> TestServer {
    Application::with_components(create_test_config(), Arc::new(MemoryFileStorage::new()), analyzer)
        .expect("Failed to create application")
        .into_test_server()
}

/// Multipart form carrying one file under the `bill` field
pub fn bill_form(file_name: &str, content: Vec<u8>) -> MultipartForm {
    let mime = mime_guess::from_path(file_name).first_or_octet_stream();
    MultipartForm::new().add_part("bill", Part::bytes(content).file_name(file_name).mime_type(mime.as_ref()))
}
