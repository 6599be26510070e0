#![forbid(unsafe_code)]

//! Configuration for modification stacks.
//!
//! ```toml
//! # rui-history.toml
//! max_depth = 200
//! title_separator = " - "
//! fake_bumps_version = false
//! ```
//!
//! ```rust,ignore
//! let config = HistoryConfig::from_toml_file("rui-history.toml")?;
//! let stack = ModificationStack::with_config("Person", config);
//! ```

#[cfg(feature = "history-config")]
use std::path::Path;

#[cfg(feature = "history-config")]
use serde::{Deserialize, Serialize};

/// Configuration for a [`ModificationStack`](super::ModificationStack).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "history-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "history-config", serde(default))]
pub struct HistoryConfig {
    /// Maximum number of undoable entries kept (oldest evicted first).
    pub max_depth: usize,
    /// Separator placed between an owner's title and a nested edit's title.
    pub title_separator: String,
    /// Whether fake modifications advance the state version.
    pub fake_bumps_version: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: 100,
            title_separator: ": ".to_string(),
            fake_bumps_version: false,
        }
    }
}

impl HistoryConfig {
    /// Create a configuration with a custom depth limit.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    /// Create unlimited configuration.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(usize::MAX)
    }

    /// Set the title separator.
    #[must_use]
    pub fn with_title_separator(mut self, separator: impl Into<String>) -> Self {
        self.title_separator = separator.into();
        self
    }

    /// Set whether fake modifications advance the state version.
    #[must_use]
    pub fn with_fake_bumps_version(mut self, enabled: bool) -> Self {
        self.fake_bumps_version = enabled;
        self
    }

    /// Validate parameters. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_depth == 0 {
            errors.push("max_depth must be > 0".into());
        }
        errors
    }

    /// Load from a TOML string.
    #[cfg(feature = "history-config")]
    pub fn from_toml_str(s: &str) -> Result<Self, HistoryConfigError> {
        let config: Self = toml::from_str(s).map_err(HistoryConfigError::Toml)?;
        config.validated()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "history-config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, HistoryConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(HistoryConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "history-config")]
    pub fn from_json_str(s: &str) -> Result<Self, HistoryConfigError> {
        let config: Self = serde_json::from_str(s).map_err(HistoryConfigError::Json)?;
        config.validated()
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "history-config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, HistoryConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(HistoryConfigError::Io)?;
        Self::from_json_str(&content)
    }

    #[cfg(feature = "history-config")]
    fn validated(self) -> Result<Self, HistoryConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(HistoryConfigError::Validation(errors))
        }
    }
}

/// Errors from loading a [`HistoryConfig`].
#[derive(Debug)]
pub enum HistoryConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "history-config")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "history-config")]
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for HistoryConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "history-config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "history-config")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for HistoryConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "history-config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "history-config")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}
