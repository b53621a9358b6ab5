//! Client configuration for the row API

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_PAGE_SIZE: usize = 100;

/// Where the backend lives and which table the editor works on.
///
/// Loaded from `<config_dir>/tabula/config.toml`; every field may be
/// overridden on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub workspace_id: Option<String>,
    pub table_id: Option<String>,
    /// Transport timeout for each request. Unset means the client's default.
    pub request_timeout_secs: Option<u64>,
    pub page_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            workspace_id: None,
            table_id: None,
            request_timeout_secs: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Default config file location
    pub fn default_path() -> ServiceResult<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("tabula").join("config.toml"))
            .ok_or_else(|| {
                ServiceError::Configuration("Could not determine config directory".into())
            })
    }

    /// Read a config file
    pub fn load(path: &Path) -> ServiceResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            ServiceError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Read `path`, or the default location when `path` is `None`. A missing
    /// default file yields the default config; a missing explicit file is an
    /// error.
    pub fn load_or_default(path: Option<&Path>) -> ServiceResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let path = Self::default_path()?;
        if path.exists() {
            tracing::debug!(path = %path.display(), "Loading client config");
            Self::load(&path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Check that everything needed to talk to the backend is present
    pub fn validate(&self) -> ServiceResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ServiceError::Configuration("base_url is empty".into()));
        }
        if self.workspace_id().is_none() {
            return Err(ServiceError::Configuration("workspace_id is not set".into()));
        }
        if self.table_id().is_none() {
            return Err(ServiceError::Configuration("table_id is not set".into()));
        }
        if self.page_size == 0 {
            return Err(ServiceError::Configuration(
                "page_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn workspace_id(&self) -> Option<&str> {
        non_blank(self.workspace_id.as_deref())
    }

    pub fn table_id(&self) -> Option<&str> {
        non_blank(self.table_id.as_deref())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
