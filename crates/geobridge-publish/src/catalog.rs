//! # Catalog
//!
//! Request layer over one workspace: typed GET/PUT/POST/DELETE helpers,
//! status checking, existence queries and the small create/delete
//! operations everything else is built from.
//!
//! ## Status Handling
//! ```text
//! transport error          → PublishError::Connectivity
//! non-2xx                  → PublishError::Request { method, url, status, body }
//! 2xx, unreadable body     → PublishError::UnexpectedResponse
//! ```
//!
//! Existence queries are the exception: a non-2xx listing means "absent"
//! and only connectivity failures surface.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use geobridge_core::resources::{
    listing_names, parse_listing, set_metadata_link, AboutVersion, DataStore, DataStoreEnvelope,
    LayerEnvelope, ResourceCategory, WorkspaceEnvelope,
};
use geobridge_core::Endpoints;

use crate::cache::ExistenceCache;
use crate::error::{ConnectivityError, PublishError, PublishResult};
use crate::transport::{Method, RequestBody, RestClient, RestRequest, RestResponse};

/// Requests against one server and workspace.
pub struct Catalog {
    client: Arc<dyn RestClient>,
    endpoints: Endpoints,
    cache: ExistenceCache,
}

impl Catalog {
    pub fn new(client: Arc<dyn RestClient>, endpoints: Endpoints) -> Self {
        Catalog {
            client,
            endpoints,
            cache: ExistenceCache::new(),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn workspace(&self) -> &str {
        self.endpoints.workspace_name()
    }

    // =========================================================================
    // Raw Requests
    // =========================================================================

    /// Sends a request and turns non-2xx answers into [`PublishError::Request`].
    pub async fn execute(&self, request: RestRequest) -> PublishResult<RestResponse> {
        let method = request.method;
        let url = request.url.clone();

        let response = self.client.send(request).await?;
        if response.is_success() {
            return Ok(response);
        }

        debug!(%method, %url, status = response.status, "Request rejected");
        Err(PublishError::Request {
            method,
            url,
            status: response.status,
            body: response.text(),
        })
    }

    pub async fn get(&self, url: &str) -> PublishResult<RestResponse> {
        self.execute(RestRequest::get(url)).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> PublishResult<T> {
        let response = self.get(url).await?;
        response.json().map_err(|e| PublishError::UnexpectedResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    pub async fn delete(&self, url: &str) -> PublishResult<RestResponse> {
        self.execute(RestRequest::delete(url)).await
    }

    pub async fn post(&self, url: &str, body: RequestBody) -> PublishResult<RestResponse> {
        self.execute(RestRequest::post(url, body)).await
    }

    pub async fn put(&self, url: &str, body: RequestBody) -> PublishResult<RestResponse> {
        self.execute(RestRequest::put(url, body)).await
    }

    pub async fn post_json<T: Serialize>(&self, url: &str, value: &T) -> PublishResult<RestResponse> {
        self.post(url, RequestBody::json(value)?).await
    }

    pub async fn put_json<T: Serialize>(&self, url: &str, value: &T) -> PublishResult<RestResponse> {
        self.put(url, RequestBody::json(value)?).await
    }

    /// Parses a 2xx body as JSON.
    pub fn decode<T: DeserializeOwned>(url: &str, response: &RestResponse) -> PublishResult<T> {
        response.json().map_err(|e| PublishError::UnexpectedResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    // =========================================================================
    // Existence
    // =========================================================================

    /// Whether `name` is listed under `category` in the session workspace
    /// (or, for workspaces, on the server).
    pub async fn exists(
        &mut self,
        category: ResourceCategory,
        name: &str,
    ) -> Result<bool, ConnectivityError> {
        let workspace = self.workspace().to_string();
        if let Some(known) = self.cache.lookup(&workspace, category, name) {
            return Ok(known);
        }

        let url = match category {
            ResourceCategory::Workspace => self.endpoints.workspaces_json(),
            ResourceCategory::Style => self.endpoints.styles_json(),
            ResourceCategory::DataStore => self.endpoints.datastores_json(),
            ResourceCategory::Layer => self.endpoints.layers_json(),
        };

        let response = self.client.send(RestRequest::get(&url)).await?;
        if !response.is_success() {
            debug!(%category, %url, status = response.status, "Listing unavailable, treating as absent");
            return Ok(false);
        }

        let names = match response
            .json::<Value>()
            .map_err(|e| e.to_string())
            .and_then(|doc| listing_names(category, &doc).map_err(|e| e.to_string()))
        {
            Ok(names) => names,
            Err(reason) => {
                warn!(%category, %url, %reason, "Unreadable listing, treating as absent");
                return Ok(false);
            }
        };

        let found = names.iter().any(|listed| listed == name);
        self.cache.store(&workspace, category, names);
        Ok(found)
    }

    pub async fn workspace_exists(&mut self) -> Result<bool, ConnectivityError> {
        let workspace = self.workspace().to_string();
        self.exists(ResourceCategory::Workspace, &workspace).await
    }

    pub async fn style_exists(&mut self, name: &str) -> Result<bool, ConnectivityError> {
        self.exists(ResourceCategory::Style, name).await
    }

    pub async fn datastore_exists(&mut self, name: &str) -> Result<bool, ConnectivityError> {
        self.exists(ResourceCategory::DataStore, name).await
    }

    pub async fn layer_exists(&mut self, name: &str) -> Result<bool, ConnectivityError> {
        self.exists(ResourceCategory::Layer, name).await
    }

    /// Drops cached layer listings for the session workspace.
    pub fn invalidate_layers(&mut self) {
        let workspace = self.workspace().to_string();
        self.cache.invalidate_layers(&workspace);
    }

    /// Forgets everything cached so far.
    pub fn reset_cache(&mut self) {
        self.cache.clear();
    }

    // =========================================================================
    // Workspace
    // =========================================================================

    pub async fn ensure_workspace(&mut self) -> PublishResult<()> {
        if self.workspace_exists().await? {
            return Ok(());
        }
        let url = self.endpoints.workspaces();
        self.post_json(&url, &WorkspaceEnvelope::named(self.workspace()))
            .await?;
        info!(workspace = %self.workspace(), "Workspace created");
        Ok(())
    }

    /// Deletes the workspace and everything in it, if it exists.
    pub async fn delete_workspace(&mut self) -> PublishResult<()> {
        if self.workspace_exists().await? {
            let url = self.endpoints.workspace_delete();
            self.delete(&url).await?;
            info!(workspace = %self.workspace(), "Workspace deleted");
        }
        self.invalidate_layers();
        Ok(())
    }

    // =========================================================================
    // Layers, Styles, Datastores
    // =========================================================================

    /// Names of all layers in the workspace.
    pub async fn layers(&self) -> PublishResult<Vec<String>> {
        let url = self.endpoints.layers_json();
        let doc: Value = self.get_json(&url).await?;
        Ok(listing_names(ResourceCategory::Layer, &doc)?)
    }

    pub async fn delete_layer(&mut self, name: &str, recurse: bool) -> PublishResult<()> {
        if self.layer_exists(name).await? {
            let url = self.endpoints.layer_delete(name, recurse);
            self.delete(&url).await?;
            info!(layer = %name, "Layer deleted");
            self.invalidate_layers();
        }
        Ok(())
    }

    /// Deletes a style and its files, if it exists.
    pub async fn delete_style(&mut self, name: &str) -> PublishResult<()> {
        if self.style_exists(name).await? {
            let url = self.endpoints.style_purge(name);
            self.delete(&url).await?;
            debug!(style = %name, "Style deleted");
        }
        Ok(())
    }

    /// Deletes a datastore recursively; a rejection (usually 404) is ignored.
    pub async fn delete_datastore_quietly(&self, name: &str) -> PublishResult<()> {
        let url = self.endpoints.datastore_delete(name);
        match self.delete(&url).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_request_error() => {
                debug!(datastore = %name, error = %err, "Datastore delete ignored");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Makes `style` the default style of `layer`.
    pub async fn set_layer_style(&self, layer: &str, style: &str) -> PublishResult<()> {
        let url = self.endpoints.layer_json(layer);
        let mut envelope: LayerEnvelope = self.get_json(&url).await?;
        envelope
            .layer
            .set_default_style(style, self.endpoints.style_json(style));
        self.put_json(&url, &envelope).await?;
        debug!(%layer, %style, "Default style set");
        Ok(())
    }

    /// Attaches an ISO 19115 metadata link to the resource behind `layer`.
    pub async fn set_layer_metadata_link(&self, layer: &str, metadata_url: &str) -> PublishResult<()> {
        let url = self.endpoints.layer_json(layer);
        let envelope: LayerEnvelope = self.get_json(&url).await?;
        let resource_url = envelope
            .layer
            .resource
            .map(|resource| resource.href)
            .ok_or_else(|| PublishError::UnexpectedResponse {
                url: url.clone(),
                reason: "layer has no resource link".to_string(),
            })?;

        let mut resource: Value = self.get_json(&resource_url).await?;
        set_metadata_link(&mut resource, metadata_url)?;
        self.put(&resource_url, RequestBody::Json(resource)).await?;
        info!(%layer, "Metadata link set");
        Ok(())
    }

    /// Every enabled PostGIS datastore on the server, as `workspace:name`.
    pub async fn postgis_datastores(&self) -> PublishResult<Vec<String>> {
        let mut found = Vec::new();
        let doc: Value = self.get_json(&self.endpoints.workspaces_json()).await?;

        for workspace_link in parse_listing(ResourceCategory::Workspace, &doc)? {
            let Some(href) = workspace_link.href else {
                continue;
            };
            let workspace: WorkspaceEnvelope = self.get_json(&href).await?;
            let Some(stores_url) = workspace.workspace.data_stores else {
                continue;
            };

            let stores: Value = self.get_json(&stores_url).await?;
            for store_link in parse_listing(ResourceCategory::DataStore, &stores)? {
                let Some(store_url) = store_link.href else {
                    continue;
                };
                let store: DataStoreEnvelope = self.get_json(&store_url).await?;
                if store.data_store.is_enabled_postgis() {
                    found.push(format!(
                        "{}:{}",
                        workspace.workspace.name, store.data_store.name
                    ));
                }
            }
        }
        Ok(found)
    }

    /// Registers a datastore definition in the session workspace.
    pub async fn add_datastore(&self, datastore: DataStore) -> PublishResult<()> {
        let url = self.endpoints.datastores();
        let name = datastore.name.clone();
        self.post_json(&url, &datastore.into_envelope()).await?;
        info!(datastore = %name, "Datastore registered");
        Ok(())
    }

    // =========================================================================
    // Server
    // =========================================================================

    /// GeoServer version from `about/version.json`; `None` when not reported.
    pub async fn server_version(&self) -> PublishResult<Option<String>> {
        let url = self.endpoints.about_version_json();
        let response = self.get(&url).await?;
        match response.json::<AboutVersion>() {
            Ok(about) => Ok(about.geoserver_version()),
            Err(e) => {
                warn!(%url, error = %e, "Unreadable version document");
                Ok(None)
            }
        }
    }

    pub async fn test_connection(&self) -> bool {
        match self.get(&self.endpoints.about_version()).await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "Connection test failed");
                false
            }
        }
    }

    /// Stores a file in the server's resource store.
    pub async fn upload_resource(&self, url: &str, body: RequestBody) -> PublishResult<()> {
        self.execute(RestRequest::new(Method::Put, url, body)).await?;
        debug!(%url, "Resource uploaded");
        Ok(())
    }
}
