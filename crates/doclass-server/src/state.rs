use crate::config::ServerConfig;
use doclass_classifiers::ClassifierContext;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Load-once classifier context
    pub context: Arc<ClassifierContext>,

    /// Directory for spooled uploads
    pub upload_dir: PathBuf,

    /// Maximum accepted request body size
    pub max_upload_bytes: usize,

    /// Prometheus handle for `/metrics`; absent when no recorder is installed
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Build state from configuration and an already loaded context
    pub fn new(
        config: &ServerConfig,
        context: ClassifierContext,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            context: Arc::new(context),
            upload_dir: config
                .upload_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            max_upload_bytes: config.max_upload_bytes,
            metrics_handle,
        }
    }
}
