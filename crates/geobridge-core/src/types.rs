//! # Domain Types
//!
//! Core domain types used throughout GeoBridge.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  ServerProfile  │   │   SourceLayer   │   │  PublishTarget  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  name           │   │  name           │   │  FileBased      │       │
//! │  │  url (…/rest)   │   │  source (key)   │   │  ServerManaged  │       │
//! │  │  storage        │   │  kind, extent   │   │  PublisherMgd   │       │
//! │  │  flags          │   │  crs            │   │  OriginalPostgis│       │
//! │  └─────────────────┘   └─────────────────┘   │  Raster         │       │
//! │                                              └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ StorageStrategy │   │  DatastoreRef   │   │ PostgisConnection│      │
//! │  │  FileBased      │   │  "ws:name"      │   │  host, port, …  │       │
//! │  │  PublisherMgd   │   └─────────────────┘   └─────────────────┘       │
//! │  │  ServerMgd      │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `PublishTarget` is the closed variant the reconciler switches on. It is
//! derived from a profile and a layer by [`ServerProfile::target_for`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::REST_SUFFIX;

// =============================================================================
// Datastore Reference
// =============================================================================

/// Reference to a datastore on the server, written `workspace:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatastoreRef {
    /// Workspace holding the datastore.
    pub workspace: String,
    /// Datastore name.
    pub name: String,
}

impl DatastoreRef {
    pub fn new(workspace: impl Into<String>, name: impl Into<String>) -> Self {
        DatastoreRef {
            workspace: workspace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DatastoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workspace, self.name)
    }
}

impl FromStr for DatastoreRef {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((ws, name)) if !ws.is_empty() && !name.is_empty() && !name.contains(':') => {
                Ok(DatastoreRef::new(ws, name))
            }
            _ => Err(ValidationError::InvalidFormat {
                field: "datastore".to_string(),
                reason: format!("expected 'workspace:name', got '{}'", s),
            }),
        }
    }
}

impl TryFrom<String> for DatastoreRef {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DatastoreRef> for String {
    fn from(value: DatastoreRef) -> Self {
        value.to_string()
    }
}

// =============================================================================
// Storage Strategy
// =============================================================================

/// Where vector data ends up on the server.
///
/// ## Strategy Comparison
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  FILE_BASED                                                             │
/// │  • Layer exported to GeoPackage, uploaded as a file datastore           │
/// │                                                                         │
/// │  POSTGIS_MANAGED_BY_PUBLISHER                                           │
/// │  • Data loaded by an external database profile                          │
/// │  • Server gets a datastore pointing at that database                    │
/// │                                                                         │
/// │  POSTGIS_MANAGED_BY_SERVER                                              │
/// │  • Shapefile bundle pushed through the importer extension               │
/// │  • Server loads it into a PostGIS datastore it already knows            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageStrategy {
    /// Upload exported files as file-based datastores.
    #[default]
    FileBased,

    /// Data is loaded by the named external database profile.
    PostgisManagedByPublisher { database: String },

    /// Data is imported by the server into an existing PostGIS datastore.
    PostgisManagedByServer { datastore: DatastoreRef },
}

impl fmt::Display for StorageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageStrategy::FileBased => write!(f, "file_based"),
            StorageStrategy::PostgisManagedByPublisher { database } => {
                write!(f, "postgis_managed_by_publisher({})", database)
            }
            StorageStrategy::PostgisManagedByServer { datastore } => {
                write!(f, "postgis_managed_by_server({})", datastore)
            }
        }
    }
}

// =============================================================================
// PostGIS Connection
// =============================================================================

/// Resolved connection parameters for a PostGIS database.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgisConnection {
    pub host: String,
    pub port: u16,
    pub schema: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for PostgisConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgisConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("schema", &self.schema)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// =============================================================================
// Source Layer
// =============================================================================

/// Geographic extent in the layer's native CRS.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Extent {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Formats the extent as `xmin,ymin,xmax,ymax` for WMS requests.
    pub fn to_bbox_param(&self) -> String {
        format!("{},{},{},{}", self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

/// Vector or raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerKind {
    Vector { feature_count: u64 },
    Raster,
}

/// A layer from the desktop project, as far as publishing is concerned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLayer {
    /// Layer name; becomes the remote layer and style name.
    pub name: String,

    /// Data source identifier. Two layers with the same source share one
    /// export and one upload per session.
    pub source: String,

    #[serde(flatten)]
    pub kind: LayerKind,

    #[serde(default)]
    pub extent: Extent,

    /// CRS authority id, e.g. `EPSG:4326`.
    #[serde(default = "default_crs")]
    pub crs: String,

    /// Set when the layer itself reads from PostGIS.
    #[serde(default)]
    pub postgis_source: Option<PostgisConnection>,

    /// Attribute subset to export; `None` exports every field.
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

fn default_crs() -> String {
    "EPSG:4326".to_string()
}

impl SourceLayer {
    /// Creates a vector layer with a default extent and CRS.
    pub fn vector(name: impl Into<String>, source: impl Into<String>, feature_count: u64) -> Self {
        SourceLayer {
            name: name.into(),
            source: source.into(),
            kind: LayerKind::Vector { feature_count },
            extent: Extent::default(),
            crs: default_crs(),
            postgis_source: None,
            fields: None,
        }
    }

    /// Creates a raster layer with a default extent and CRS.
    pub fn raster(name: impl Into<String>, source: impl Into<String>) -> Self {
        SourceLayer {
            name: name.into(),
            source: source.into(),
            kind: LayerKind::Raster,
            extent: Extent::default(),
            crs: default_crs(),
            postgis_source: None,
            fields: None,
        }
    }

    pub fn with_extent(mut self, extent: Extent) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = crs.into();
        self
    }

    pub fn with_postgis_source(mut self, connection: PostgisConnection) -> Self {
        self.postgis_source = Some(connection);
        self
    }

    pub fn is_vector(&self) -> bool {
        matches!(self.kind, LayerKind::Vector { .. })
    }

    /// Feature count for vector layers, `None` for rasters.
    pub fn feature_count(&self) -> Option<u64> {
        match self.kind {
            LayerKind::Vector { feature_count } => Some(feature_count),
            LayerKind::Raster => None,
        }
    }
}

// =============================================================================
// Export Format
// =============================================================================

/// Interchange formats the exporter collaborator can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    GeoPackage,
    Shapefile,
    GeoTiff,
}

impl ExportFormat {
    /// File extension written by the exporter.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::GeoPackage => "gpkg",
            ExportFormat::Shapefile => "shp",
            ExportFormat::GeoTiff => "tif",
        }
    }

    /// Format token used in `file.{fmt}` upload endpoints.
    pub fn upload_token(&self) -> &'static str {
        match self {
            ExportFormat::GeoPackage => "gpkg",
            ExportFormat::Shapefile => "shp",
            ExportFormat::GeoTiff => "geotiff",
        }
    }
}

// =============================================================================
// Publish Target
// =============================================================================

/// How one layer's data reaches the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTarget {
    /// GeoPackage upload into a file datastore named after the layer.
    FileBased,
    /// Shapefile bundle imported into a mirror of `datastore`.
    ServerManagedPostgis { datastore: DatastoreRef },
    /// Loaded by the named external database profile.
    PublisherManagedPostgis { database: String },
    /// Served straight from the PostGIS database the layer already uses.
    OriginalPostgis { connection: PostgisConnection },
    /// GeoTIFF upload into a coverage store.
    Raster,
}

impl PublishTarget {
    /// Export format needed before upload, if any.
    pub fn export_format(&self) -> Option<ExportFormat> {
        match self {
            PublishTarget::FileBased => Some(ExportFormat::GeoPackage),
            PublishTarget::ServerManagedPostgis { .. } => Some(ExportFormat::Shapefile),
            PublishTarget::Raster => Some(ExportFormat::GeoTiff),
            PublishTarget::PublisherManagedPostgis { .. }
            | PublishTarget::OriginalPostgis { .. } => None,
        }
    }
}

impl fmt::Display for PublishTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishTarget::FileBased => write!(f, "file"),
            PublishTarget::ServerManagedPostgis { datastore } => {
                write!(f, "server-managed postgis ({})", datastore)
            }
            PublishTarget::PublisherManagedPostgis { database } => {
                write!(f, "publisher-managed postgis ({})", database)
            }
            PublishTarget::OriginalPostgis { connection } => {
                write!(f, "original postgis ({}/{})", connection.host, connection.database)
            }
            PublishTarget::Raster => write!(f, "raster"),
        }
    }
}

// =============================================================================
// Server Profile
// =============================================================================

/// Connection and storage settings for one GeoServer instance.
///
/// The URL is normalized on construction so it always ends in `/rest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProfile {
    /// Display name.
    pub name: String,

    url: String,

    /// Reference into the caller's credential store.
    pub credential_ref: Option<String>,

    pub storage: StorageStrategy,

    /// Serve PostGIS-backed layers from their own database.
    pub use_original_data_source: bool,

    /// Publish a combined Mapbox style and enable vector tiles.
    pub use_vector_tiles: bool,
}

impl ServerProfile {
    /// Creates a file-based profile for the given server URL.
    pub fn new(name: impl Into<String>, url: &str) -> Self {
        ServerProfile {
            name: name.into(),
            url: normalize_rest_url(url),
            credential_ref: None,
            storage: StorageStrategy::FileBased,
            use_original_data_source: false,
            use_vector_tiles: false,
        }
    }

    pub fn with_storage(mut self, storage: StorageStrategy) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_vector_tiles(mut self, enabled: bool) -> Self {
        self.use_vector_tiles = enabled;
        self
    }

    pub fn with_original_data_source(mut self, enabled: bool) -> Self {
        self.use_original_data_source = enabled;
        self
    }

    pub fn with_credential_ref(mut self, credential_ref: impl Into<String>) -> Self {
        self.credential_ref = Some(credential_ref.into());
        self
    }

    /// REST API root, e.g. `http://host/geoserver/rest`.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Server root without the REST suffix, e.g. `http://host/geoserver`.
    pub fn base_url(&self) -> &str {
        self.url
            .strip_suffix(REST_SUFFIX)
            .map(|s| s.trim_end_matches('/'))
            .unwrap_or(&self.url)
    }

    /// Qualified `workspace:layer` name.
    pub fn full_layer_name(&self, workspace: &str, layer: &str) -> String {
        format!("{}:{}", workspace, layer)
    }

    /// WMS GetMap URL that renders the given layers with the OpenLayers viewer.
    pub fn layer_preview_url(&self, workspace: &str, names: &[&str], bbox: &str, srs: &str) -> String {
        let layers = names
            .iter()
            .map(|name| self.full_layer_name(workspace, name))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/{}/wms?service=WMS&version=1.1.0&request=GetMap&layers={}&format=application/openlayers&bbox={}&srs={}&width=800&height=600",
            self.base_url(),
            workspace,
            layers,
            bbox,
            srs
        )
    }

    pub fn wms_capabilities_url(&self) -> String {
        format!(
            "{}/wms?service=WMS&version=1.1.0&request=GetCapabilities",
            self.base_url()
        )
    }

    pub fn wfs_url(&self) -> String {
        format!("{}/wfs", self.base_url())
    }

    /// Picks the publish path for a layer.
    ///
    /// ```text
    /// raster                                   → Raster
    /// vector + postgis source + original flag  → OriginalPostgis
    /// vector otherwise                         → storage strategy
    /// ```
    pub fn target_for(&self, layer: &SourceLayer) -> PublishTarget {
        if !layer.is_vector() {
            return PublishTarget::Raster;
        }

        if self.use_original_data_source {
            if let Some(connection) = &layer.postgis_source {
                return PublishTarget::OriginalPostgis {
                    connection: connection.clone(),
                };
            }
        }

        match &self.storage {
            StorageStrategy::FileBased => PublishTarget::FileBased,
            StorageStrategy::PostgisManagedByPublisher { database } => {
                PublishTarget::PublisherManagedPostgis {
                    database: database.clone(),
                }
            }
            StorageStrategy::PostgisManagedByServer { datastore } => {
                PublishTarget::ServerManagedPostgis {
                    datastore: datastore.clone(),
                }
            }
        }
    }
}

/// Normalizes a server URL so it ends in exactly one `/rest`.
pub fn normalize_rest_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.ends_with(REST_SUFFIX) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, REST_SUFFIX)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pg() -> PostgisConnection {
        PostgisConnection {
            host: "db.local".into(),
            port: 5432,
            schema: "public".into(),
            database: "gis".into(),
            username: "gis".into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn test_url_normalization() {
        assert_eq!(normalize_rest_url("http://h/geoserver"), "http://h/geoserver/rest");
        assert_eq!(normalize_rest_url("http://h/geoserver/"), "http://h/geoserver/rest");
        assert_eq!(normalize_rest_url("http://h/geoserver/rest"), "http://h/geoserver/rest");
        assert_eq!(normalize_rest_url("http://h/geoserver/rest/"), "http://h/geoserver/rest");
        assert_eq!(normalize_rest_url("  "), "");
    }

    #[test]
    fn test_base_url_strips_rest() {
        let profile = ServerProfile::new("local", "http://h:8080/geoserver");
        assert_eq!(profile.url(), "http://h:8080/geoserver/rest");
        assert_eq!(profile.base_url(), "http://h:8080/geoserver");
        assert_eq!(profile.wfs_url(), "http://h:8080/geoserver/wfs");
    }

    #[test]
    fn test_datastore_ref_parsing() {
        let ds: DatastoreRef = "gis:roads_db".parse().unwrap();
        assert_eq!(ds.workspace, "gis");
        assert_eq!(ds.name, "roads_db");
        assert_eq!(ds.to_string(), "gis:roads_db");

        assert!("nocolon".parse::<DatastoreRef>().is_err());
        assert!(":name".parse::<DatastoreRef>().is_err());
        assert!("a:b:c".parse::<DatastoreRef>().is_err());
    }

    #[test]
    fn test_target_selection() {
        let vector = SourceLayer::vector("roads", "/data/roads.shp", 10);
        let raster = SourceLayer::raster("dem", "/data/dem.tif");

        let file = ServerProfile::new("s", "http://h/geoserver");
        assert_eq!(file.target_for(&vector), PublishTarget::FileBased);
        assert_eq!(file.target_for(&raster), PublishTarget::Raster);

        let managed = file.clone().with_storage(StorageStrategy::PostgisManagedByServer {
            datastore: DatastoreRef::new("gis", "pg"),
        });
        assert!(matches!(
            managed.target_for(&vector),
            PublishTarget::ServerManagedPostgis { .. }
        ));
        assert_eq!(managed.target_for(&raster), PublishTarget::Raster);

        // PostGIS-backed layer only uses its own source when asked to
        let pg_layer = vector.clone().with_postgis_source(pg());
        assert_eq!(file.target_for(&pg_layer), PublishTarget::FileBased);
        let original = file.with_original_data_source(true);
        assert!(matches!(
            original.target_for(&pg_layer),
            PublishTarget::OriginalPostgis { .. }
        ));
    }

    #[test]
    fn test_preview_url() {
        let profile = ServerProfile::new("s", "http://h/geoserver");
        let url = profile.layer_preview_url("ws", &["a", "b"], "0,0,1,1", "EPSG:4326");
        assert!(url.starts_with("http://h/geoserver/ws/wms?"));
        assert!(url.contains("layers=ws:a,ws:b"));
        assert!(url.contains("bbox=0,0,1,1"));
    }

    #[test]
    fn test_password_hidden_in_debug() {
        let rendered = format!("{:?}", pg());
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_storage_strategy_toml_shape() {
        #[derive(Deserialize)]
        struct Wrapper {
            storage: StorageStrategy,
        }
        let parsed: Wrapper = serde_json::from_str(
            r#"{"storage": {"kind": "postgis_managed_by_server", "datastore": "gis:pg"}}"#,
        )
        .unwrap();
        assert_eq!(
            parsed.storage,
            StorageStrategy::PostgisManagedByServer {
                datastore: DatastoreRef::new("gis", "pg")
            }
        );
    }

    #[test]
    fn test_source_layer_deserializes_kind() {
        let layer: SourceLayer = serde_json::from_str(
            r#"{"name": "roads", "source": "roads.shp", "type": "vector", "feature_count": 3}"#,
        )
        .unwrap();
        assert_eq!(layer.feature_count(), Some(3));
        assert_eq!(layer.crs, "EPSG:4326");
    }
}
