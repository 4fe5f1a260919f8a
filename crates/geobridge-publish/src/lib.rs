//! # geobridge-publish: Publishing Engine for GeoBridge
//!
//! Pushes a project's layers, styles and layer groups into a GeoServer
//! workspace over the REST API.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Publish Architecture                             │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  PublishSession (Main Orchestrator)              │  │
//! │  │                                                                  │  │
//! │  │  validate → prepare → styles / data / groups → close → report   │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  Reconciler    │  │ StylePublisher │  │  GroupComposer         │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Export, upload │  │ Zipped SLD,    │  │ Bottom-up layer groups │    │
//! │  │ import, feature│  │ Mapbox GL,     │  │ tile cache formats     │    │
//! │  │ types          │  │ sprites        │  │                        │    │
//! │  └───────┬────────┘  └───────┬────────┘  └───────────┬────────────┘    │
//! │          └───────────────────┼───────────────────────┘                 │
//! │                              ▼                                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Catalog: status checks, existence cache, small CRUD helpers    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                ▼                                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  RestClient: HttpTransport (reqwest) or an in-memory fake       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`session`] - `PublishSession` lifecycle and `PublishPlan`
//! - [`catalog`] - Request helpers and existence queries
//! - [`cache`] - Per-session layer existence cache
//! - [`reconciler`] - Data paths: file upload, importer, PostGIS, raster
//! - [`styles`] - Layer, group and vector-tile styles
//! - [`groups`] - Layer group trees
//! - [`preview`] - OpenLayers preview page
//! - [`collaborators`] - Exporter, style converter and database seams
//! - [`report`] - Per-session outcome
//! - [`config`] - Servers, databases, HTTP settings
//! - [`transport`] - HTTP client and the `RestClient` trait
//! - [`error`] - Publish error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geobridge_publish::{BridgeConfig, HttpTransport, PublishPlan, PublishSession};
//!
//! let config = BridgeConfig::load(None)?;
//! let server = config.server(None)?;
//! let client = HttpTransport::new(&config.transport(), server.credentials())?;
//!
//! let mut session = PublishSession::new(server.profile(), Some(project), Arc::new(client), collaborators);
//! let errors = session.validate_before_publication(&plan.layer_names(), &|_: &str, _: &[String]| true).await;
//! let report = session.publish_all(&plan).await?;
//! println!("{}", report);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod catalog;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod groups;
pub mod preview;
pub mod reconciler;
pub mod report;
pub mod session;
pub mod styles;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::Catalog;
pub use collaborators::{
    Collaborators, DatabaseProfile, DatabaseRegistry, DeletionConfirmation, ExportedDataset,
    GroupStyle, LayerExporter, MapboxOutput, SpriteSheet, StyleConverter,
};
pub use config::{BridgeConfig, DatabaseEntry, HttpSettings, ServerEntry};
pub use error::{ConnectivityError, PublishError, PublishResult};
pub use report::{PublishFailure, PublishReport};
pub use session::{PublishPlan, PublishSession};
pub use transport::{
    Credentials, HttpTransport, Method, RequestBody, RestClient, RestRequest, RestResponse,
    TransportConfig,
};
