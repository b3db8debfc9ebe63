//! Pagination configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from validating a `PaginationConfig`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("document_count_per_page must be greater than zero")]
    ZeroPageSize,
}

/// Settings for paginated subscriptions.
///
/// Deserializes from any serde format; missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Documents added to the limit by each page.
    pub document_count_per_page: usize,
}

impl PaginationConfig {
    pub const DEFAULT_DOCUMENT_COUNT_PER_PAGE: usize = 20;

    pub fn new(document_count_per_page: usize) -> Self {
        Self {
            document_count_per_page,
        }
    }

    /// Checks that the page size is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.document_count_per_page == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        Ok(())
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DOCUMENT_COUNT_PER_PAGE)
    }
}
