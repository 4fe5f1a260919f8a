//! # Collaborators
//!
//! Work the publisher delegates: exporting layer data, converting
//! symbology, loading data into external databases and asking the user
//! for confirmation.
//!
//! ```text
//! PublishSession
//!   ├── LayerExporter        layer → GeoPackage / Shapefile / GeoTIFF
//!   ├── StyleConverter       layer → zipped SLD, group → Mapbox GL + sprites
//!   ├── DatabaseRegistry     name → DatabaseProfile (PostGIS loader)
//!   └── DeletionConfirmation "these remote layers will be deleted, ok?"
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use geobridge_core::mapbox::MapboxStyle;
use geobridge_core::{ExportFormat, LayerGroup, PostgisConnection, SourceLayer};

use crate::error::PublishResult;

// =============================================================================
// Export
// =============================================================================

/// A layer materialized on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDataset {
    /// Main file (`.gpkg`, `.shp`, `.tif`).
    pub path: PathBuf,

    /// Table or feature type name inside the file.
    pub native_name: String,
}

#[async_trait]
pub trait LayerExporter: Send + Sync {
    /// Writes `layer` in `format` into `dir`.
    async fn export(
        &self,
        layer: &SourceLayer,
        fields: Option<&[String]>,
        format: ExportFormat,
        dir: &Path,
    ) -> PublishResult<ExportedDataset>;
}

// =============================================================================
// Styles
// =============================================================================

/// Sprite images and their index files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteSheet {
    pub png: Vec<u8>,
    pub png2x: Vec<u8>,
    pub json: String,
    pub json2x: String,
}

/// Converted style for a layer group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStyle {
    pub style: MapboxStyle,
    pub warnings: Vec<String>,
    pub sprite_sheet: Option<SpriteSheet>,
}

/// Converted style covering several layers.
#[derive(Debug, Clone, PartialEq)]
pub struct MapboxOutput {
    pub style: MapboxStyle,
    pub warnings: Vec<String>,
}

#[async_trait]
pub trait StyleConverter: Send + Sync {
    /// Writes the layer's symbology as a zipped SLD package to `dest`.
    /// Returns conversion warnings.
    async fn zipped_style(&self, layer: &SourceLayer, dest: &Path) -> PublishResult<Vec<String>>;

    async fn group_style(
        &self,
        group: &LayerGroup,
        layers: &[SourceLayer],
        base_url: &str,
        workspace: &str,
    ) -> PublishResult<GroupStyle>;

    async fn mapbox_style(&self, layers: &[SourceLayer]) -> PublishResult<MapboxOutput>;
}

// =============================================================================
// Databases
// =============================================================================

/// An external PostGIS database the publisher can load layers into.
#[async_trait]
pub trait DatabaseProfile: Send + Sync {
    fn connection(&self) -> PostgisConnection;

    async fn import_layer(&self, layer: &SourceLayer, fields: Option<&[String]>) -> PublishResult<()>;
}

pub trait DatabaseRegistry: Send + Sync {
    fn profile(&self, name: &str) -> Option<Arc<dyn DatabaseProfile>>;
}

impl DatabaseRegistry for HashMap<String, Arc<dyn DatabaseProfile>> {
    fn profile(&self, name: &str) -> Option<Arc<dyn DatabaseProfile>> {
        self.get(name).cloned()
    }
}

// =============================================================================
// Confirmation
// =============================================================================

pub trait DeletionConfirmation: Send + Sync {
    /// Asked when publishing would delete `layers` from `workspace`.
    fn confirm_layer_deletion(&self, workspace: &str, layers: &[String]) -> bool;
}

impl<F> DeletionConfirmation for F
where
    F: Fn(&str, &[String]) -> bool + Send + Sync,
{
    fn confirm_layer_deletion(&self, workspace: &str, layers: &[String]) -> bool {
        self(workspace, layers)
    }
}

// =============================================================================
// Bundle
// =============================================================================

/// Everything a session delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub exporter: Arc<dyn LayerExporter>,
    pub styles: Arc<dyn StyleConverter>,
    pub databases: Arc<dyn DatabaseRegistry>,
}
