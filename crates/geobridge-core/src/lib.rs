//! # geobridge-core: Pure Publishing Domain for GeoBridge
//!
//! This crate describes *what* gets published to a GeoServer instance:
//! profiles, layers, group trees, REST resource shapes and URLs. It never
//! talks to the network; `geobridge-publish` does that.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        GeoBridge Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/geobridge-cli                           │   │
//! │  │    config + manifest ──► PublishSession ──► report             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              geobridge-publish (I/O layer)                      │   │
//! │  │   transport, catalog, reconciler, styles, groups, session       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ geobridge-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌────────┐  │   │
//! │  │   │  types  │ │  group  │ │endpoints │ │resources│ │ mapbox │  │   │
//! │  │   │ Profile │ │ Layer-  │ │  URLs    │ │  DTOs   │ │ tiles  │  │   │
//! │  │   │ Target  │ │ Group   │ │          │ │JSON/XML │ │ gwc    │  │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └─────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • PURE FUNCTIONS                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Server profiles, storage strategies, source layers, publish targets
//! - [`group`] - Layer group trees and their invariants
//! - [`endpoints`] - Typed REST URL builders
//! - [`resources`] - Request/response bodies exchanged with the server
//! - [`mapbox`] - Vector-tile source rewriting and tile-cache format edits
//! - [`validation`] - Workspace name and server version checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use geobridge_core::{Endpoints, ServerProfile};
//!
//! let profile = ServerProfile::new("local", "http://localhost:8080/geoserver/");
//! assert_eq!(profile.url(), "http://localhost:8080/geoserver/rest");
//!
//! let endpoints = Endpoints::new(&profile, "roads");
//! assert_eq!(
//!     endpoints.layer_json("streets"),
//!     "http://localhost:8080/geoserver/rest/workspaces/roads/layers/streets.json"
//! );
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod endpoints;
pub mod error;
pub mod group;
pub mod mapbox;
pub mod resources;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use endpoints::Endpoints;
pub use error::{CoreError, CoreResult, ValidationError};
pub use group::{GroupMember, LayerGroup, MAX_GROUP_DEPTH};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Path suffix of the GeoServer REST API.
pub const REST_SUFFIX: &str = "/rest";

/// MIME type of Mapbox vector tiles in the tile cache.
pub const VECTOR_TILE_MIME: &str = "application/vnd.mapbox-vector-tile";

/// Content type GeoServer expects for Mapbox GL style bodies.
pub const MBSTYLE_CONTENT_TYPE: &str = "application/vnd.geoserver.mbstyle+json";

/// Oldest GeoServer release the publisher works with.
pub const MIN_GEOSERVER_VERSION: (u64, u64) = (2, 14);
