//! Error types
//!
//! Resolution failures that merely mean "not found" are never errors; they
//! come back as a `ResolutionResult` with `found == false`. Only malformed
//! origin references and whole-artifact I/O surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`crate::ImportResolver::resolve`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Origin import points at a file with the wrong extension, a file that
    /// cannot be found, or a file without the requested block
    #[error("Malformed origin reference: {0}")]
    MalformedOriginReference(String),

    /// Origin import is missing its type tag or block name
    #[error("Origin import requires a type tag and a block name: {0}")]
    IncompleteOriginRequest(String),
}

/// Errors that can occur while saving or loading a persisted index
#[derive(Debug, Error)]
pub enum IndexError {
    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Index artifact does not exist
    #[error("Index file not found: {0}")]
    NotFound(PathBuf),

    /// Module root to index does not exist
    #[error("Module root does not exist: {0}")]
    MissingRoot(PathBuf),
}

/// Errors that can occur while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid configuration: {0}")]
    Validation(String),
}
