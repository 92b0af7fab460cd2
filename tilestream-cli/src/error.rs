//! CLI error types.

use std::fmt;

use tilestream::error::{ConfigError, LayerConfigError};

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Failed to load or validate the configuration.
    Config(ConfigError),

    /// Failed to build the layer.
    Layer(LayerConfigError),

    /// A command-line argument could not be interpreted.
    InvalidArgument(String),

    /// Failed to set up logging.
    Logging(String),

    /// Failed to create the Tokio runtime.
    RuntimeCreation(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Layer(e) => write!(f, "Layer error: {}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Logging(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::RuntimeCreation(msg) => {
                write!(f, "Failed to create Tokio runtime: {}", msg)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Layer(e) => Some(e),
            CliError::InvalidArgument(_) => None,
            CliError::Logging(_) => None,
            CliError::RuntimeCreation(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<LayerConfigError> for CliError {
    fn from(e: LayerConfigError) -> Self {
        CliError::Layer(e)
    }
}
