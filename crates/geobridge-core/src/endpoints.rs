//! # REST Endpoints
//!
//! Typed URL builders for every GeoServer resource the publisher touches.
//!
//! ## URL Families
//! ```text
//! {rest}/workspaces[.json]                         workspace listing / create
//! {rest}/workspaces/{ws}                           workspace
//! {rest}/workspaces/{ws}/datastores[/{ds}]         datastores
//! {rest}/workspaces/{ws}/datastores/{ds}/featuretypes[/{ft}.json]
//! {rest}/workspaces/{ws}/coveragestores/{cs}/file.{fmt}
//! {rest}/workspaces/{ws}/styles[/{name}]           styles
//! {rest}/workspaces/{ws}/layers[/{name}.json]      layers
//! {rest}/workspaces/{ws}/layergroups[/{name}]      layer groups
//! {rest}/imports[/{id}[/tasks[/{task}/target]]]    importer extension
//! {rest}/resource/{path}                           resource store
//! {rest}/about/version[.json]                      server info
//! {base}/gwc/rest/layers/{ws}:{name}.xml           tile cache layer
//! ```
//!
//! `{rest}` is the normalized profile URL, `{base}` the same URL without
//! the `/rest` suffix.

use std::fmt::Display;

use crate::types::{ExportFormat, ServerProfile};
use crate::VECTOR_TILE_MIME;

/// URL builder bound to one server and one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    rest: String,
    base: String,
    workspace: String,
}

impl Endpoints {
    pub fn new(profile: &ServerProfile, workspace: impl Into<String>) -> Self {
        Endpoints {
            rest: profile.url().to_string(),
            base: profile.base_url().to_string(),
            workspace: workspace.into(),
        }
    }

    pub fn workspace_name(&self) -> &str {
        &self.workspace
    }

    /// REST API root.
    pub fn rest(&self) -> &str {
        &self.rest
    }

    /// Server root without the REST suffix.
    pub fn base(&self) -> &str {
        &self.base
    }

    // =========================================================================
    // Workspaces
    // =========================================================================

    pub fn workspaces(&self) -> String {
        format!("{}/workspaces", self.rest)
    }

    pub fn workspaces_json(&self) -> String {
        format!("{}/workspaces.json", self.rest)
    }

    pub fn workspace(&self) -> String {
        format!("{}/workspaces/{}", self.rest, self.workspace)
    }

    pub fn workspace_delete(&self) -> String {
        format!("{}?recurse=true", self.workspace())
    }

    // =========================================================================
    // Datastores and feature types
    // =========================================================================

    pub fn datastores(&self) -> String {
        format!("{}/datastores", self.workspace())
    }

    pub fn datastores_json(&self) -> String {
        format!("{}/datastores.json", self.workspace())
    }

    pub fn datastore_delete(&self, name: &str) -> String {
        format!("{}/{}?recurse=true", self.datastores(), name)
    }

    /// Datastore definition in any workspace, used to mirror shared stores.
    pub fn foreign_datastore_json(&self, workspace: &str, name: &str) -> String {
        format!("{}/workspaces/{}/datastores/{}.json", self.rest, workspace, name)
    }

    /// Upload endpoint that creates or replaces a file datastore.
    pub fn datastore_file_upload(&self, name: &str, format: ExportFormat) -> String {
        format!(
            "{}/{}/file.{}?update=overwrite",
            self.datastores(),
            name,
            format.upload_token()
        )
    }

    pub fn featuretypes(&self, datastore: &str) -> String {
        format!("{}/{}/featuretypes", self.datastores(), datastore)
    }

    pub fn featuretype_json(&self, datastore: &str, name: &str) -> String {
        format!("{}/{}.json", self.featuretypes(datastore), name)
    }

    pub fn coverage_store_file(&self, name: &str, format: ExportFormat) -> String {
        format!(
            "{}/coveragestores/{}/file.{}",
            self.workspace(),
            name,
            format.upload_token()
        )
    }

    // =========================================================================
    // Styles
    // =========================================================================

    pub fn styles(&self) -> String {
        format!("{}/styles", self.workspace())
    }

    pub fn styles_json(&self) -> String {
        format!("{}/styles.json", self.workspace())
    }

    pub fn style(&self, name: &str) -> String {
        format!("{}/{}", self.styles(), name)
    }

    /// Create endpoint for a style package; the server names it from the query.
    pub fn style_create(&self, name: &str) -> String {
        format!("{}?name={}", self.styles(), name)
    }

    pub fn style_json(&self, name: &str) -> String {
        format!("{}/{}.json", self.styles(), name)
    }

    pub fn style_raw(&self, name: &str) -> String {
        format!("{}?raw=true", self.style(name))
    }

    pub fn style_purge(&self, name: &str) -> String {
        format!("{}?purge=true&recurse=true", self.style(name))
    }

    // =========================================================================
    // Layers and layer groups
    // =========================================================================

    pub fn layers_json(&self) -> String {
        format!("{}/layers.json", self.workspace())
    }

    pub fn layer_json(&self, name: &str) -> String {
        format!("{}/layers/{}.json", self.workspace(), name)
    }

    pub fn layer_delete(&self, name: &str, recurse: bool) -> String {
        if recurse {
            format!("{}?recurse=true", self.layer_json(name))
        } else {
            self.layer_json(name)
        }
    }

    pub fn layergroups(&self) -> String {
        format!("{}/layergroups", self.workspace())
    }

    pub fn layergroup(&self, name: &str) -> String {
        format!("{}/{}", self.layergroups(), name)
    }

    // =========================================================================
    // Importer
    // =========================================================================

    pub fn imports(&self) -> String {
        format!("{}/imports", self.rest)
    }

    pub fn import(&self, id: impl Display) -> String {
        format!("{}/{}", self.imports(), id)
    }

    pub fn import_tasks(&self, id: impl Display) -> String {
        format!("{}/tasks", self.import(id))
    }

    pub fn import_task_target(&self, id: impl Display, task: impl Display) -> String {
        format!("{}/{}/target", self.import_tasks(id), task)
    }

    // =========================================================================
    // Resource store and server info
    // =========================================================================

    pub fn resource(&self, path: &str) -> String {
        format!("{}/resource/{}", self.rest, path.trim_start_matches('/'))
    }

    /// Sprite sheet files live next to the workspace styles.
    pub fn sprite_resource(&self, file_name: &str) -> String {
        self.resource(&format!("workspaces/{}/styles/{}", self.workspace, file_name))
    }

    /// Preview page files, e.g. `index.html`.
    pub fn preview_resource(&self, file_name: &str) -> String {
        self.resource(&format!("{}/{}", self.workspace, file_name))
    }

    pub fn about_version(&self) -> String {
        format!("{}/about/version", self.rest)
    }

    pub fn about_version_json(&self) -> String {
        format!("{}/about/version.json", self.rest)
    }

    // =========================================================================
    // Tile cache
    // =========================================================================

    pub fn gwc_layer(&self, name: &str) -> String {
        format!("{}/gwc/rest/layers/{}:{}.xml", self.base, self.workspace, name)
    }

    /// WMTS GetTile template serving `{ws}:{layer}` as Mapbox vector tiles.
    pub fn wmts_vector_tiles(&self, layer: &str) -> String {
        format!(
            "{}/gwc/service/wmts?REQUEST=GetTile&SERVICE=WMTS&VERSION=1.0.0&LAYER={}:{}&STYLE=\
             &TILEMATRIX=EPSG:900913:{{z}}&TILEMATRIXSET=EPSG:900913&FORMAT={}\
             &TILECOL={{x}}&TILEROW={{y}}",
            self.base, self.workspace, layer, VECTOR_TILE_MIME
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
