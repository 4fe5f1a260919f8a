//! # Publish Error Types
//!
//! Error types for publishing operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Publish Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Transport      │  │  Precondition   │  │  Configuration          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Connectivity   │  │  EmptyLayer     │  │  InvalidConfig          │ │
//! │  │  Request (4xx/  │  │  Validation     │  │  UnknownDatabase        │ │
//! │  │   5xx)          │  │  NoActiveSession│  │  InvalidUrl, Load/Save  │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Collaborators  │  │  Local          │  │  Domain                 │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Export         │  │  Io, Zip        │  │  Core (cycles, bad      │ │
//! │  │  Style, Import  │  │  Serialization  │  │   documents, XML)       │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use geobridge_core::{CoreError, ValidationError};

use crate::transport::Method;

/// Result type alias for publishing operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// The server could not be reached or the exchange did not complete.
///
/// Distinct from a server that answered with an error status.
#[derive(Debug, Clone, Error)]
#[error("Could not connect to {url}: {reason}")]
pub struct ConnectivityError {
    pub url: String,
    pub reason: String,
}

/// Publish error type covering all possible publishing failures.
///
/// ## Design Principles
/// - Each variant includes enough context for debugging
/// - Errors are categorized for different handling strategies
/// - All errors are `Send + Sync` for async compatibility
#[derive(Debug, Error)]
pub enum PublishError {
    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Server unreachable.
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    /// Server answered with a non-2xx status.
    #[error("{method} {url} failed with status {status}: {body}")]
    Request {
        method: Method,
        url: String,
        status: u16,
        body: String,
    },

    /// Server answered 2xx with a body we cannot use.
    #[error("Unexpected response from {url}: {reason}")]
    UnexpectedResponse { url: String, reason: String },

    // =========================================================================
    // Precondition Errors
    // =========================================================================
    /// Vector layer without features.
    #[error("Layer '{layer}' contains zero features and cannot be published")]
    EmptyLayer { layer: String },

    /// Local validation failed (workspace name, server version).
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Operation requires `prepare_for_publishing` first.
    #[error("No publish session is active. Call prepare_for_publishing first.")]
    NoActiveSession,

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Storage strategy names a database profile that does not exist.
    #[error("Cannot find the selected PostGIS database '{0}'")]
    UnknownDatabase(String),

    /// Invalid server URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// Layer export failed.
    #[error("Export of layer '{layer}' failed: {reason}")]
    Export { layer: String, reason: String },

    /// Style conversion failed.
    #[error("Style conversion for '{name}' failed: {reason}")]
    Style { name: String, reason: String },

    /// Loading a layer into an external database failed.
    #[error("Import of layer '{layer}' into the database failed: {reason}")]
    Import { layer: String, reason: String },

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shapefile bundle could not be written.
    #[error("Zip error: {0}")]
    Zip(String),

    /// JSON (de)serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// Group cycles, malformed style documents, XML failures.
    #[error(transparent)]
    Core(CoreError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for PublishError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(validation) => PublishError::Validation(validation),
            other => PublishError::Core(other),
        }
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialization(err.to_string())
    }
}

impl From<zip::result::ZipError> for PublishError {
    fn from(err: zip::result::ZipError) -> Self {
        PublishError::Zip(err.to_string())
    }
}

impl From<url::ParseError> for PublishError {
    fn from(err: url::ParseError) -> Self {
        PublishError::InvalidUrl(err.to_string())
    }
}

impl From<toml::de::Error> for PublishError {
    fn from(err: toml::de::Error) -> Self {
        PublishError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for PublishError {
    fn from(err: toml::ser::Error) -> Self {
        PublishError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl PublishError {
    /// Returns true if the server could not be reached.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, PublishError::Connectivity(_))
    }

    /// Returns true if the server rejected a request.
    pub fn is_request_error(&self) -> bool {
        matches!(self, PublishError::Request { .. })
    }

    /// HTTP status of a rejected request.
    pub fn status(&self) -> Option<u16> {
        match self {
            PublishError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the publish was refused before contacting the server.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PublishError::EmptyLayer { .. }
                | PublishError::Validation(_)
                | PublishError::NoActiveSession
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PublishError::InvalidConfig(_)
                | PublishError::UnknownDatabase(_)
                | PublishError::InvalidUrl(_)
                | PublishError::ConfigLoadFailed(_)
                | PublishError::ConfigSaveFailed(_)
        )
    }
}
