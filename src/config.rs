//! Configuration - Export Naming, Page Layout, Raster Limits
//!
//! Every field has a default so an empty `{}` file is a valid config.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::print::{LayoutError, PageLayout};
use crate::raster::RasterOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid page layout: {0}")]
    Layout(#[from] LayoutError),

    #[error("baseName must not be empty or contain path separators")]
    BaseName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct StudioConfig {
    /// Filename stem shared by every exported payload.
    pub base_name: String,
    pub page: PageLayout,
    pub raster: RasterOptions,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            base_name: "design".to_string(),
            page: PageLayout::default(),
            raster: RasterOptions::default(),
        }
    }
}

impl StudioConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: StudioConfig = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validated()
    }

    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.base_name.is_empty() || self.base_name.contains(['/', '\\']) {
            return Err(ConfigError::BaseName);
        }
        self.page.validated()?;
        Ok(self)
    }
}
