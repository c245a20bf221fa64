//! Search-core tuning knobs.
//!
//! Loaded from TOML by the host; every field has a default so an empty
//! document is a valid configuration.

use serde::Deserialize;
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to parse search config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid search config: {message}")]
    Validation { message: String },
}

///
/// SearchConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Identifiers held in the fixed duplicate block before promotion.
    pub dup_block_capacity: usize,

    /// Row distance under which VLV counts exactly, walks from a boundary,
    /// or reuses the previous position key.
    pub vlv_epsilon: u32,

    /// Initial capacity of the reusable ancestor buffer, in identifiers.
    pub ancestors_initial_capacity: usize,

    /// ASQ batch size used when the request carries no smaller size limit.
    pub asq_page_size: u32,

    /// Default per-step time limit in clock ticks.
    pub time_limit_ticks: Option<u64>,
}

impl SearchConfig {
    pub const DEFAULT_DUP_BLOCK_CAPACITY: usize = 64;
    pub const DEFAULT_VLV_EPSILON: u32 = 100;
    pub const DEFAULT_ANCESTORS_INITIAL_CAPACITY: usize = 32;
    pub const DEFAULT_ASQ_PAGE_SIZE: u32 = 1000;

    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dup_block_capacity == 0 {
            return Err(ConfigError::Validation {
                message: "dup_block_capacity must be greater than zero".to_string(),
            });
        }
        if self.vlv_epsilon == 0 {
            return Err(ConfigError::Validation {
                message: "vlv_epsilon must be greater than zero".to_string(),
            });
        }
        if self.ancestors_initial_capacity == 0 {
            return Err(ConfigError::Validation {
                message: "ancestors_initial_capacity must be greater than zero".to_string(),
            });
        }
        if self.asq_page_size == 0 {
            return Err(ConfigError::Validation {
                message: "asq_page_size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            dup_block_capacity: Self::DEFAULT_DUP_BLOCK_CAPACITY,
            vlv_epsilon: Self::DEFAULT_VLV_EPSILON,
            ancestors_initial_capacity: Self::DEFAULT_ANCESTORS_INITIAL_CAPACITY,
            asq_page_size: Self::DEFAULT_ASQ_PAGE_SIZE,
            time_limit_ticks: None,
        }
    }
}

///
/// TESTS
///
