//! Crate error types.
//!
//! Only construction and configuration can fail with an error. Tile load
//! outcomes are values (see [`crate::loader::TileLoadResult`]) and never cross
//! the mailbox boundary as errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors loading or validating a [`crate::config::SourceConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid INI.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A key holds a value that cannot be used.
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Errors building a layer configuration.
#[derive(Debug, Error)]
pub enum LayerConfigError {
    /// The tile URL template lacks a placeholder.
    #[error("URL template '{template}' is missing the {placeholder} placeholder")]
    MissingPlaceholder {
        template: String,
        placeholder: &'static str,
    },

    /// The zoom level range is empty or out of bounds.
    #[error("Invalid zoom range {min}..={max} (allowed 0..={limit})")]
    InvalidZoomRange { min: i32, max: i32, limit: i32 },

    /// A layer must have at least one zoom level.
    #[error("Layer '{0}' has no zoom levels")]
    EmptyZoomTable(String),
}

/// Errors converting coordinates between systems.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// No conversion between the two systems is known.
    #[error("No conversion from system {from} to system {to}")]
    Unsupported { from: i32, to: i32 },
}
