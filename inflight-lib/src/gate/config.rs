use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

use crate::{ErrorKind, Result};

/// Default number of requests allowed in flight at the same time
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Configuration of an [`AdmissionGate`](crate::AdmissionGate)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    /// Maximum number of admitted requests not yet completed
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Run the admission check that follows an enqueue one scheduling tick
    /// later, so that a burst of submissions is fully queued before the first
    /// one is admitted
    #[serde(default = "default_defer_admission")]
    pub defer_admission: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            defer_admission: default_defer_admission(),
        }
    }
}

const fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

const fn default_defer_admission() -> bool {
    true
}

impl GateConfig {
    /// Create a configuration with the given concurrency limit and
    /// default values otherwise
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            ..Self::default()
        }
    }

    /// Parse a configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid TOML, contains unknown
    /// keys, or describes a gate without capacity.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.capacity()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ErrorKind::ReadConfig(path.to_path_buf(), e))?;
        log::debug!("Loaded gate configuration from {}", path.display());
        Self::from_toml(&contents)
    }

    /// The validated capacity of the gate
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Configuration`] if `max_concurrent` is zero.
    pub fn capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.max_concurrent)
            .ok_or_else(|| ErrorKind::Configuration("capacity must be ≥ 1".to_string()))
    }
}
