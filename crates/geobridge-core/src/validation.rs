//! # Validation Module
//!
//! Pre-flight checks that run before a publish touches the server.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Local (THIS MODULE, no requests)                             │
//! │  ├── Project saved → workspace name derived from its file stem         │
//! │  └── Workspace name free of reserved characters                        │
//! │           │                                                             │
//! │           ▼  (only when layer 1 passes)                                 │
//! │  Layer 2: Remote (publish session)                                     │
//! │  ├── Layers that would be deleted → user confirmation                  │
//! │  └── Server version (THIS MODULE decides, session fetches)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use std::path::Path;
//! use geobridge_core::validation::{validate_workspace_name, workspace_name_for_project};
//!
//! let ws = workspace_name_for_project(Some(Path::new("/projects/roads.qgz")));
//! assert_eq!(ws, "roads");
//! assert!(validate_workspace_name(&ws).is_ok());
//! assert!(validate_workspace_name("roads.v2").is_err());
//! ```

use std::path::Path;

use crate::error::ValidationError;
use crate::MIN_GEOSERVER_VERSION;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Characters GeoServer cannot accept in a workspace name.
pub const FORBIDDEN_WORKSPACE_CHARS: &[char] = &['.', ':', '/', '\\'];

// =============================================================================
// Workspace
// =============================================================================

/// Workspace name for a project file: its stem, or empty when unsaved.
pub fn workspace_name_for_project(project_path: Option<&Path>) -> String {
    project_path
        .and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Validates a workspace name.
///
/// ## Rules
/// - Must not be empty (the project has been saved)
/// - Must not contain `.`, `:`, `/`, `\` or whitespace
pub fn validate_workspace_name(name: &str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "workspace".to_string(),
        });
    }

    if let Some(bad) = name
        .chars()
        .find(|c| FORBIDDEN_WORKSPACE_CHARS.contains(c) || c.is_whitespace())
    {
        return Err(ValidationError::InvalidFormat {
            field: "workspace".to_string(),
            reason: format!("contains unsupported character '{}'", bad),
        });
    }

    Ok(())
}

// =============================================================================
// Server Version
// =============================================================================

/// Checks a reported GeoServer version against the supported minimum.
///
/// Development and release-candidate builds often report versions that are
/// not `major.minor.patch`; those, and a missing version, are accepted.
pub fn check_server_version(reported: Option<&str>) -> ValidationResult<()> {
    let Some(reported) = reported else {
        return Ok(());
    };
    let Ok(version) = semver::Version::parse(reported.trim()) else {
        return Ok(());
    };

    if (version.major, version.minor) < MIN_GEOSERVER_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            required: format!("{}.{}.0", MIN_GEOSERVER_VERSION.0, MIN_GEOSERVER_VERSION.1),
            found: reported.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Positive Numbers
// =============================================================================

/// Validates a value that must be strictly positive (timeouts, ports).
pub fn validate_positive(field: &str, value: u64) -> ValidationResult<()> {
    if value == 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
