//! # REST Resources
//!
//! Bodies exchanged with the GeoServer REST API.
//!
//! ## Shapes
//! ```text
//! listing       {"layers": {"layer": [{"name": "a", "href": "..."}]}}
//!               {"layers": ""}                       (empty listing)
//! datastore     {"dataStore": {"name", "type", "enabled",
//!                              "connectionParameters": {"entry": [{"@key", "$"}]}}}
//! feature type  {"featureType": {"name", "title", "nativeBoundingBox", ...}}
//! layer         {"layer": {"name", "defaultStyle": {"name", "href"}, "resource": {...}}}
//! layer group   {"layerGroup": {"name", "title", "abstractTxt", "mode",
//!                               "publishables": {"published": [{"@type", "name"}]}}}
//! style (XML)   <style><name/><workspace/><format/><filename/></style>
//! ```
//!
//! Resources fetched from the server and sent back (feature types, layers)
//! keep every field they don't model in a flattened `extra` map, so a
//! read-modify-write cycle only changes what the publisher means to change.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::group::{GroupMember, LayerGroup};
use crate::types::{Extent, PostgisConnection};

/// Decimal places kept in native bounding boxes.
pub const BBOX_DECIMALS: i32 = 5;

/// Metadata standard attached by [`set_metadata_link`].
pub const METADATA_TYPE_ISO19115: &str = "ISO19115:2003";

// =============================================================================
// Listings
// =============================================================================

/// Catalog categories whose members can be listed by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceCategory {
    Workspace,
    Style,
    DataStore,
    Layer,
}

impl ResourceCategory {
    /// Key of each entry, e.g. `layer`.
    pub fn singular(&self) -> &'static str {
        match self {
            ResourceCategory::Workspace => "workspace",
            ResourceCategory::Style => "style",
            ResourceCategory::DataStore => "dataStore",
            ResourceCategory::Layer => "layer",
        }
    }

    /// Key of the listing root, e.g. `layers`.
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceCategory::Workspace => "workspaces",
            ResourceCategory::Style => "styles",
            ResourceCategory::DataStore => "dataStores",
            ResourceCategory::Layer => "layers",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.singular())
    }
}

/// A listed resource: its name and the URL of its full definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedLink {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Entries of a listing document.
///
/// The server reports an empty listing as `{"layers": ""}`; that form and a
/// missing root both yield no entries.
pub fn parse_listing(category: ResourceCategory, doc: &Value) -> CoreResult<Vec<NamedLink>> {
    let Some(items) = doc
        .get(category.plural())
        .and_then(|root| root.get(category.singular()))
    else {
        return Ok(Vec::new());
    };

    let items: OneOrMany<NamedLink> =
        serde_json::from_value(items.clone()).map_err(|e| CoreError::UnexpectedResource {
            resource: category.plural().to_string(),
            reason: e.to_string(),
        })?;
    Ok(items.into())
}

/// Names from a listing document, in server order.
pub fn listing_names(category: ResourceCategory, doc: &Value) -> CoreResult<Vec<String>> {
    Ok(parse_listing(category, doc)?
        .into_iter()
        .map(|link| link.name)
        .collect())
}

// =============================================================================
// Workspaces
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceEnvelope {
    pub workspace: WorkspaceDef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceDef {
    pub name: String,

    /// Link to the workspace's datastore listing (read only).
    #[serde(rename = "dataStores", default, skip_serializing_if = "Option::is_none")]
    pub data_stores: Option<String>,
}

impl WorkspaceEnvelope {
    pub fn named(name: impl Into<String>) -> Self {
        WorkspaceEnvelope {
            workspace: WorkspaceDef {
                name: name.into(),
                data_stores: None,
            },
        }
    }
}

// =============================================================================
// Datastores
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStoreEnvelope {
    #[serde(rename = "dataStore")]
    pub data_store: DataStore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStore {
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub store_type: Option<String>,

    #[serde(default)]
    pub enabled: bool,

    #[serde(rename = "connectionParameters", default)]
    pub connection_parameters: ConnectionParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionParameters {
    #[serde(default)]
    pub entry: Vec<ConnectionEntry>,
}

/// One `{"@key": ..., "$": ...}` connection parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    #[serde(rename = "@key")]
    pub key: String,
    #[serde(rename = "$")]
    pub value: String,
}

impl ConnectionEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        ConnectionEntry {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl DataStore {
    /// PostGIS datastore named `name` pointing at `connection`.
    pub fn postgis(name: impl Into<String>, connection: &PostgisConnection) -> Self {
        DataStore {
            name: name.into(),
            store_type: Some("PostGIS".to_string()),
            enabled: true,
            connection_parameters: ConnectionParameters {
                entry: vec![
                    ConnectionEntry::new("schema", connection.schema.as_str()),
                    ConnectionEntry::new("port", connection.port.to_string()),
                    ConnectionEntry::new("database", connection.database.as_str()),
                    ConnectionEntry::new("passwd", connection.password.as_str()),
                    ConnectionEntry::new("user", connection.username.as_str()),
                    ConnectionEntry::new("host", connection.host.as_str()),
                    ConnectionEntry::new("dbtype", "postgis"),
                ],
            },
        }
    }

    /// Copy of this store suitable for creating it in another workspace.
    pub fn mirrored(&self) -> Self {
        DataStore {
            name: self.name.clone(),
            store_type: self.store_type.clone(),
            enabled: true,
            connection_parameters: self.connection_parameters.clone(),
        }
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.connection_parameters
            .entry
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    /// Enabled and backed by PostGIS. The `type` field is unreliable for
    /// JNDI stores, so the `dbtype` parameter decides.
    pub fn is_enabled_postgis(&self) -> bool {
        self.enabled && self.parameter("dbtype") == Some("postgis")
    }

    pub fn into_envelope(self) -> DataStoreEnvelope {
        DataStoreEnvelope { data_store: self }
    }
}

// =============================================================================
// Feature Types
// =============================================================================

/// Native bounding box, rounded to [`BBOX_DECIMALS`] places.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub minx: f64,
    pub maxx: f64,
    pub miny: f64,
    pub maxy: f64,
}

/// Rounds a coordinate to [`BBOX_DECIMALS`] decimal places.
pub fn round_coordinate(value: f64) -> f64 {
    let factor = 10f64.powi(BBOX_DECIMALS);
    (value * factor).round() / factor
}

impl BoundingBox {
    pub fn from_extent(extent: &Extent) -> Self {
        BoundingBox {
            minx: round_coordinate(extent.xmin),
            maxx: round_coordinate(extent.xmax),
            miny: round_coordinate(extent.ymin),
            maxy: round_coordinate(extent.ymax),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTypeEnvelope {
    #[serde(rename = "featureType")]
    pub feature_type: FeatureType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureType {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srs: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeatureType {
    /// Minimal feature type published over an existing table.
    pub fn new(name: impl Into<String>, srs: impl Into<String>) -> Self {
        FeatureType {
            name: name.into(),
            title: None,
            srs: Some(srs.into()),
            extra: Map::new(),
        }
    }

    /// Publishes the feature type under `name`, also used as title.
    pub fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        self.title = Some(name.to_string());
    }

    /// Replaces `nativeBoundingBox`. The server's own form carries a `crs`
    /// object; ours carries a plain `srs` authority id.
    pub fn set_native_bounding_box(&mut self, extent: &Extent, srs: &str) {
        let bbox = BoundingBox::from_extent(extent);
        self.extra.insert(
            "nativeBoundingBox".to_string(),
            json!({
                "minx": bbox.minx,
                "maxx": bbox.maxx,
                "miny": bbox.miny,
                "maxy": bbox.maxy,
                "srs": srs,
            }),
        );
    }

    pub fn into_envelope(self) -> FeatureTypeEnvelope {
        FeatureTypeEnvelope { feature_type: self }
    }
}

/// Adds an ISO 19115 metadata link to a feature type or coverage document.
pub fn set_metadata_link(resource: &mut Value, url: &str) -> CoreResult<()> {
    let key = if resource.get("featureType").is_some() {
        "featureType"
    } else {
        "coverage"
    };
    let body = resource
        .get_mut(key)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| CoreError::UnexpectedResource {
            resource: "layer resource".to_string(),
            reason: "neither featureType nor coverage present".to_string(),
        })?;

    body.insert(
        "metadataLinks".to_string(),
        json!({
            "metadataLink": [{
                "type": "text/html",
                "metadataType": METADATA_TYPE_ISO19115,
                "content": url,
            }]
        }),
    );
    Ok(())
}

// =============================================================================
// Layers
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerEnvelope {
    pub layer: LayerDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "defaultStyle", default, skip_serializing_if = "Option::is_none")]
    pub default_style: Option<NamedLink>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceLink>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Link from a layer to the feature type or coverage it publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLink {
    #[serde(rename = "@class", default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default)]
    pub name: String,
    pub href: String,
}

impl LayerDescriptor {
    pub fn set_default_style(&mut self, name: &str, href: String) {
        self.default_style = Some(NamedLink {
            name: name.to_string(),
            href: Some(href),
        });
    }
}

// =============================================================================
// Layer Groups
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerGroupEnvelope {
    #[serde(rename = "layerGroup")]
    pub layer_group: LayerGroupDef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerGroupDef {
    pub name: String,
    pub title: String,
    #[serde(rename = "abstractTxt")]
    pub abstract_txt: String,
    pub mode: String,
    pub publishables: Publishables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publishables {
    pub published: Vec<Published>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishedKind {
    #[serde(rename = "layer")]
    Layer,
    #[serde(rename = "layerGroup")]
    LayerGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Published {
    #[serde(rename = "@type")]
    pub kind: PublishedKind,
    /// Workspace-qualified name.
    pub name: String,
}

impl LayerGroupDef {
    /// Server definition of `group`, members qualified with `workspace`.
    pub fn from_group(group: &LayerGroup, workspace: &str) -> Self {
        let published = group
            .layers
            .iter()
            .map(|member| Published {
                kind: match member {
                    GroupMember::Layer(_) => PublishedKind::Layer,
                    GroupMember::Group(_) => PublishedKind::LayerGroup,
                },
                name: format!("{}:{}", workspace, member.name()),
            })
            .collect();

        LayerGroupDef {
            name: group.name.clone(),
            title: group.title.clone(),
            abstract_txt: group.abstract_text.clone(),
            mode: "NAMED".to_string(),
            publishables: Publishables { published },
        }
    }

    pub fn into_envelope(self) -> LayerGroupEnvelope {
        LayerGroupEnvelope { layer_group: self }
    }
}

// =============================================================================
// Importer
// =============================================================================

/// Wrapper holding just a name, e.g. `{"name": "pg"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreTarget {
    #[serde(rename = "dataStore")]
    pub data_store: NameRef,
}

impl StoreTarget {
    pub fn datastore(name: impl Into<String>) -> Self {
        StoreTarget {
            data_store: NameRef { name: name.into() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceTarget {
    pub workspace: NameRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub import: ImportSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSpec {
    #[serde(rename = "targetStore")]
    pub target_store: StoreTarget,
    #[serde(rename = "targetWorkspace")]
    pub target_workspace: WorkspaceTarget,
}

impl ImportRequest {
    pub fn new(workspace: impl Into<String>, datastore: impl Into<String>) -> Self {
        ImportRequest {
            import: ImportSpec {
                target_store: StoreTarget::datastore(datastore),
                target_workspace: WorkspaceTarget {
                    workspace: NameRef {
                        name: workspace.into(),
                    },
                },
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: u64,
}

/// Response to `POST imports`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCreated {
    pub import: IdRef,
}

/// Response to `POST imports/{id}/tasks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCreated {
    pub task: IdRef,
}

// =============================================================================
// Server Version
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AboutVersion {
    pub about: About,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct About {
    #[serde(default)]
    pub resource: Vec<VersionResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionResource {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "Version", default)]
    pub version: Option<Value>,
}

impl AboutVersion {
    /// Version string reported for the `GeoServer` component, if any.
    pub fn geoserver_version(&self) -> Option<String> {
        self.about
            .resource
            .iter()
            .find(|resource| resource.name == "GeoServer")
            .and_then(|resource| match &resource.version {
                Some(Value::String(version)) => Some(version.clone()),
                Some(Value::Number(version)) => Some(version.to_string()),
                _ => None,
            })
    }
}

// =============================================================================
// Style Descriptor (XML)
// =============================================================================

/// Catalog entry announcing a style whose body is uploaded separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename = "style")]
pub struct StyleDescriptor {
    pub name: String,
    pub workspace: String,
    pub format: String,
    pub filename: String,
}

impl StyleDescriptor {
    pub fn mbstyle(name: impl Into<String>, workspace: impl Into<String>) -> Self {
        let name = name.into();
        StyleDescriptor {
            filename: format!("{}.json", name),
            name,
            workspace: workspace.into(),
            format: "mbstyle".to_string(),
        }
    }

    pub fn to_xml(&self) -> CoreResult<String> {
        quick_xml::se::to_string(self).map_err(|e| CoreError::Xml(e.to_string()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
