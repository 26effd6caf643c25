//! Server configuration

use crate::cli::Cli;
use doclass_classifiers::ClassifierConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory for spooled uploads; system temp dir if unset
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,

    /// Maximum accepted request body size
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Classification pipeline settings
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    ///
    /// A missing file yields the defaults.
    pub fn load(config_path: impl AsRef<Path>, cli: &Cli) -> anyhow::Result<Self> {
        let config_path = config_path.as_ref();
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        if let Some(listen) = &cli.listen {
            config.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            config.port = port;
        }

        if let Some(model) = &cli.model {
            config.classifier.model_path = model.clone();
        }

        if let Some(labels) = &cli.labels {
            config.classifier.label_map_path = labels.clone();
        }

        Ok(config)
    }

    /// Socket address string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            upload_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
            classifier: ClassifierConfig::default(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}
