//! # Error Types
//!
//! Domain-specific error types for geobridge-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  geobridge-core errors (this file)                                     │
//! │  ├── CoreError        - Domain rule violations (groups, versions, XML) │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  geobridge-publish errors (separate crate)                             │
//! │  └── PublishError     - Transport, request and reconciliation failures │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → PublishError → report / CLI       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (layer, group, workspace)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A layer group contains itself, directly or through a nested group.
    ///
    /// ## When This Occurs
    /// ```text
    /// G ──► G2 ──► G        (cycle through G2)
    ///      │
    ///      ▼
    /// CyclicGroup { path: ["G", "G2", "G"] }
    /// ```
    #[error("Layer group cycle detected: {}", path.join(" -> "))]
    CyclicGroup { path: Vec<String> },

    /// Group nesting goes deeper than the supported bound.
    #[error("Layer group '{group}' exceeds maximum nesting depth of {max}")]
    GroupTooDeep { group: String, max: usize },

    /// The same group name is declared twice in one tree.
    #[error("Layer group name '{0}' is used more than once")]
    DuplicateGroup(String),

    /// A Mapbox style document lacks the structure we rewrite.
    #[error("Invalid Mapbox style document: {0}")]
    InvalidStyleDocument(String),

    /// A server response lacks a field the publisher needs to edit it.
    #[error("Unexpected {resource} document: {reason}")]
    UnexpectedResource { resource: String, reason: String },

    /// An XML descriptor could not be produced.
    #[error("XML serialization failed: {0}")]
    Xml(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These are pre-flight failures: they are detected before any request is
/// sent to the server.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Invalid format (e.g., reserved character in a workspace name).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Remote server is older than the supported minimum.
    #[error("GeoServer {required} or later is required, server reports '{found}'")]
    UnsupportedVersion { required: String, found: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
