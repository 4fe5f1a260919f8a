//! In-memory GeoServer and collaborator fakes shared by the unit tests.
//!
//! The fake understands just enough of the REST API to let a session run
//! end to end: workspaces, datastores, feature types, coverage stores,
//! layers, styles, layer groups, the importer, the resource store, the
//! tile-cache layer XML and `about/version`. Every request is recorded.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use geobridge_core::mapbox::MapboxStyle;
use geobridge_core::{ExportFormat, LayerGroup, PostgisConnection, ServerProfile, SourceLayer};

use crate::collaborators::{
    Collaborators, DatabaseProfile, DatabaseRegistry, ExportedDataset, GroupStyle, LayerExporter,
    MapboxOutput, SpriteSheet, StyleConverter,
};
use crate::error::{ConnectivityError, PublishError, PublishResult};
use crate::session::PublishSession;
use crate::transport::{Method, RequestBody, RestClient, RestRequest, RestResponse};

pub(crate) const BASE: &str = "http://geo.test/geoserver";
pub(crate) const REST: &str = "http://geo.test/geoserver/rest";

// =============================================================================
// Fake Server
// =============================================================================

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: Method,
    pub url: String,
    pub content_type: Option<String>,
    pub body: RequestBody,
}

#[derive(Default)]
struct Import {
    workspace: String,
    datastore: String,
    file_name: Option<String>,
}

#[derive(Default)]
struct ServerState {
    version: Option<String>,
    offline: bool,
    workspaces: Vec<String>,
    datastores: BTreeMap<(String, String), Value>,
    feature_types: BTreeMap<(String, String, String), Value>,
    coverages: BTreeMap<(String, String), Value>,
    layers: BTreeMap<(String, String), Value>,
    styles: BTreeMap<(String, String), Vec<u8>>,
    layergroups: BTreeMap<(String, String), Value>,
    gwc: BTreeMap<String, String>,
    resources: BTreeMap<String, Vec<u8>>,
    imports: BTreeMap<u64, Import>,
    failures: Vec<(Method, String, u16)>,
}

pub(crate) struct FakeGeoServer {
    state: Mutex<ServerState>,
    log: Mutex<Vec<Recorded>>,
}

fn ok(body: Value) -> RestResponse {
    RestResponse::new(200, body.to_string())
}

fn created() -> RestResponse {
    RestResponse::new(201, "")
}

fn status(code: u16, message: &str) -> RestResponse {
    RestResponse::new(code, message)
}

fn body_json(body: &RequestBody) -> Value {
    match body {
        RequestBody::Json(value) => value.clone(),
        RequestBody::Text { text, .. } => serde_json::from_str(text).unwrap_or(Value::Null),
        RequestBody::Bytes { data, .. } => serde_json::from_slice(data).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn body_bytes(body: &RequestBody) -> Vec<u8> {
    match body {
        RequestBody::Empty => Vec::new(),
        RequestBody::Bytes { data, .. } => data.clone(),
        RequestBody::Text { text, .. } => text.as_bytes().to_vec(),
        RequestBody::Json(value) => value.to_string().into_bytes(),
        RequestBody::Multipart { data, .. } => data.clone(),
    }
}

fn listing(plural: &str, singular: &str, items: Vec<(String, String)>) -> Value {
    if items.is_empty() {
        return json!({ plural: "" });
    }
    let entries: Vec<Value> = items
        .into_iter()
        .map(|(name, href)| json!({"name": name, "href": href}))
        .collect();
    json!({ plural: { singular: entries } })
}

fn strip_json(segment: &str) -> &str {
    segment.strip_suffix(".json").unwrap_or(segment)
}

fn layer_doc(workspace: &str, name: &str, class: &str, resource_href: String) -> Value {
    json!({
        "name": name,
        "type": if class == "coverage" { "RASTER" } else { "VECTOR" },
        "resource": {
            "@class": class,
            "name": format!("{}:{}", workspace, name),
            "href": resource_href,
        },
    })
}

fn default_gwc_xml(workspace: &str, name: &str) -> String {
    format!(
        "<GeoServerLayer><enabled>true</enabled><name>{}:{}</name>\
         <mimeFormats><string>image/png</string><string>image/jpeg</string></mimeFormats>\
         </GeoServerLayer>",
        workspace, name
    )
}

impl FakeGeoServer {
    pub fn new() -> Arc<Self> {
        let state = ServerState {
            version: Some("2.16.2".to_string()),
            ..ServerState::default()
        };
        Arc::new(FakeGeoServer {
            state: Mutex::new(state),
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn profile() -> ServerProfile {
        ServerProfile::new("test", BASE)
    }

    // -------------------------------------------------------------------------
    // Setup
    // -------------------------------------------------------------------------

    pub fn set_version(&self, version: Option<&str>) {
        self.state.lock().unwrap().version = version.map(str::to_string);
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Answers every matching request with `code`.
    pub fn fail(&self, method: Method, url_fragment: &str, code: u16) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((method, url_fragment.to_string(), code));
    }

    pub fn seed_workspace(&self, workspace: &str) {
        let mut state = self.state.lock().unwrap();
        if !state.workspaces.iter().any(|w| w == workspace) {
            state.workspaces.push(workspace.to_string());
        }
    }

    pub fn seed_layer(&self, workspace: &str, name: &str) {
        self.seed_workspace(workspace);
        let mut state = self.state.lock().unwrap();
        let href = format!(
            "{}/workspaces/{}/datastores/{}/featuretypes/{}.json",
            REST, workspace, name, name
        );
        state.datastores.insert(
            (workspace.to_string(), name.to_string()),
            json!({"name": name, "type": "GeoPackage", "enabled": true}),
        );
        state.feature_types.insert(
            (workspace.to_string(), name.to_string(), name.to_string()),
            json!({"name": name, "nativeName": name}),
        );
        state.layers.insert(
            (workspace.to_string(), name.to_string()),
            layer_doc(workspace, name, "featureType", href),
        );
    }

    pub fn seed_style(&self, workspace: &str, name: &str) {
        self.seed_workspace(workspace);
        self.state
            .lock()
            .unwrap()
            .styles
            .insert((workspace.to_string(), name.to_string()), b"seeded".to_vec());
    }

    pub fn seed_postgis_datastore(&self, workspace: &str, name: &str, enabled: bool) {
        self.seed_workspace(workspace);
        self.state.lock().unwrap().datastores.insert(
            (workspace.to_string(), name.to_string()),
            json!({
                "name": name,
                "type": "PostGIS",
                "enabled": enabled,
                "connectionParameters": {"entry": [
                    {"@key": "host", "$": "db.internal"},
                    {"@key": "port", "$": "5432"},
                    {"@key": "database", "$": "gis"},
                    {"@key": "dbtype", "$": "postgis"},
                ]},
            }),
        );
    }

    pub fn seed_gwc(&self, workspace: &str, name: &str, xml: &str) {
        self.state
            .lock()
            .unwrap()
            .gwc
            .insert(format!("{}:{}", workspace, name), xml.to_string());
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn clear_requests(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Requests with `method` whose URL contains `fragment`.
    pub fn count(&self, method: Method, fragment: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url.contains(fragment))
            .count()
    }

    /// Index of the first request with `method` whose URL ends with `suffix`.
    pub fn position(&self, method: Method, suffix: &str) -> Option<usize> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .position(|r| r.method == method && r.url.ends_with(suffix))
    }

    pub fn has_workspace(&self, workspace: &str) -> bool {
        self.state.lock().unwrap().workspaces.iter().any(|w| w == workspace)
    }

    pub fn layer(&self, workspace: &str, name: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .layers
            .get(&(workspace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn layer_names(&self, workspace: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .layers
            .keys()
            .filter(|(ws, _)| ws == workspace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn style(&self, workspace: &str, name: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .styles
            .get(&(workspace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn datastore(&self, workspace: &str, name: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .datastores
            .get(&(workspace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn feature_type(&self, workspace: &str, datastore: &str, name: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .feature_types
            .get(&(workspace.to_string(), datastore.to_string(), name.to_string()))
            .cloned()
    }

    pub fn layergroup(&self, workspace: &str, name: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .layergroups
            .get(&(workspace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn resource(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().resources.get(path).cloned()
    }

    pub fn gwc_xml(&self, workspace: &str, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .gwc
            .get(&format!("{}:{}", workspace, name))
            .cloned()
    }

    // -------------------------------------------------------------------------
    // Routing
    // -------------------------------------------------------------------------

    fn handle(&self, request: &RestRequest) -> RestResponse {
        let mut state = self.state.lock().unwrap();

        if let Some((_, _, code)) = state
            .failures
            .iter()
            .find(|(method, fragment, _)| *method == request.method && request.url.contains(fragment.as_str()))
        {
            return status(*code, "injected failure");
        }

        let (path, query) = match request.url.split_once('?') {
            Some((path, query)) => (path, query),
            None => (request.url.as_str(), ""),
        };

        if let Some(gwc) = path.strip_prefix(&format!("{}/gwc/rest/layers/", BASE)) {
            let key = gwc.trim_end_matches(".xml").to_string();
            return match request.method {
                Method::Get => match state.gwc.get(&key) {
                    Some(xml) => RestResponse::new(200, xml.clone()),
                    None => status(404, "no such tile layer"),
                },
                Method::Put => {
                    let text = String::from_utf8_lossy(&body_bytes(&request.body)).into_owned();
                    state.gwc.insert(key, text);
                    ok(json!({}))
                }
                _ => status(405, "method not allowed"),
            };
        }

        let Some(rest) = path.strip_prefix(&format!("{}/", REST)) else {
            return status(404, "not a rest url");
        };
        let segments: Vec<&str> = rest.split('/').collect();
        let query: HashMap<&str, &str> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .collect();

        match (request.method, segments.as_slice()) {
            (Method::Get, ["about", "version"]) => ok(json!({})),
            (Method::Get, ["about", "version.json"]) => {
                let mut resources = vec![json!({"@name": "GeoTools", "Version": "22.2"})];
                if let Some(version) = &state.version {
                    resources.push(json!({"@name": "GeoServer", "Version": version}));
                }
                ok(json!({"about": {"resource": resources}}))
            }

            (Method::Get, ["workspaces.json"]) => {
                let items = state
                    .workspaces
                    .iter()
                    .map(|ws| (ws.clone(), format!("{}/workspaces/{}.json", REST, ws)))
                    .collect();
                ok(listing("workspaces", "workspace", items))
            }
            (Method::Post, ["workspaces"]) => {
                let doc = body_json(&request.body);
                let Some(name) = doc["workspace"]["name"].as_str() else {
                    return status(400, "workspace name missing");
                };
                if state.workspaces.iter().any(|w| w == name) {
                    return status(409, "workspace exists");
                }
                state.workspaces.push(name.to_string());
                created()
            }
            (Method::Get, ["workspaces", ws]) => {
                let ws = strip_json(ws);
                if !state.workspaces.iter().any(|w| w == ws) {
                    return status(404, "no such workspace");
                }
                ok(json!({"workspace": {
                    "name": ws,
                    "dataStores": format!("{}/workspaces/{}/datastores.json", REST, ws),
                }}))
            }
            (Method::Delete, ["workspaces", ws]) => {
                let ws = ws.to_string();
                if !state.workspaces.contains(&ws) {
                    return status(404, "no such workspace");
                }
                state.workspaces.retain(|w| w != &ws);
                state.datastores.retain(|(w, _), _| w != &ws);
                state.feature_types.retain(|(w, _, _), _| w != &ws);
                state.coverages.retain(|(w, _), _| w != &ws);
                state.layers.retain(|(w, _), _| w != &ws);
                state.styles.retain(|(w, _), _| w != &ws);
                state.layergroups.retain(|(w, _), _| w != &ws);
                ok(json!({}))
            }

            (method, ["workspaces", ws, rest @ ..]) => {
                let ws = ws.to_string();
                if !state.workspaces.contains(&ws) {
                    return status(404, "no such workspace");
                }
                Self::route_workspace(&mut state, method, &ws, rest, &query, &request.body)
            }

            (Method::Post, ["imports"]) => {
                let doc = body_json(&request.body);
                let id = state.imports.len() as u64 + 1;
                state.imports.insert(
                    id,
                    Import {
                        workspace: doc["import"]["targetWorkspace"]["workspace"]["name"]
                            .as_str()
                            .unwrap_or_default()
                            .to_string(),
                        datastore: doc["import"]["targetStore"]["dataStore"]["name"]
                            .as_str()
                            .unwrap_or_default()
                            .to_string(),
                        file_name: None,
                    },
                );
                RestResponse::new(201, json!({"import": {"id": id}}).to_string())
            }
            (Method::Post, ["imports", id, "tasks"]) => {
                let Some(import) = id.parse().ok().and_then(|id: u64| state.imports.get_mut(&id)) else {
                    return status(404, "no such import");
                };
                let RequestBody::Multipart { file_name, .. } = &request.body else {
                    return status(400, "expected a file upload");
                };
                import.file_name = Some(file_name.clone());
                RestResponse::new(201, json!({"task": {"id": 0}}).to_string())
            }
            (Method::Put, ["imports", id, "tasks", _, "target"]) => {
                let Some(import) = id.parse().ok().and_then(|id: u64| state.imports.get_mut(&id)) else {
                    return status(404, "no such import");
                };
                if let Some(name) = body_json(&request.body)["dataStore"]["name"].as_str() {
                    import.datastore = name.to_string();
                }
                ok(json!({}))
            }
            (Method::Post, ["imports", id]) => {
                let Some(import) = id.parse().ok().and_then(|id: u64| state.imports.remove(&id)) else {
                    return status(404, "no such import");
                };
                let Some(file_name) = import.file_name else {
                    return status(400, "import has no tasks");
                };
                let key = (import.workspace.clone(), import.datastore.clone());
                if !state.datastores.contains_key(&key) {
                    return status(404, "target store missing");
                }
                let table = Path::new(&file_name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                state.feature_types.insert(
                    (import.workspace.clone(), import.datastore.clone(), table.clone()),
                    json!({"name": table, "nativeName": table}),
                );
                ok(json!({}))
            }

            (Method::Put, ["resource", path @ ..]) => {
                state.resources.insert(path.join("/"), body_bytes(&request.body));
                ok(json!({}))
            }

            _ => status(404, "no route"),
        }
    }

    fn route_workspace(
        state: &mut ServerState,
        method: Method,
        ws: &str,
        segments: &[&str],
        query: &HashMap<&str, &str>,
        body: &RequestBody,
    ) -> RestResponse {
        let key = |name: &str| (ws.to_string(), name.to_string());

        match (method, segments) {
            // --- datastores -------------------------------------------------
            (Method::Get, ["datastores.json"]) => {
                let items = state
                    .datastores
                    .keys()
                    .filter(|(w, _)| w == ws)
                    .map(|(_, name)| {
                        (name.clone(), format!("{}/workspaces/{}/datastores/{}.json", REST, ws, name))
                    })
                    .collect();
                ok(listing("dataStores", "dataStore", items))
            }
            (Method::Post, ["datastores"]) => {
                let doc = body_json(body);
                let Some(name) = doc["dataStore"]["name"].as_str() else {
                    return status(400, "datastore name missing");
                };
                if state.datastores.contains_key(&key(name)) {
                    return status(500, "datastore already exists");
                }
                state.datastores.insert(key(name), doc["dataStore"].clone());
                created()
            }
            (Method::Get, ["datastores", name]) => match state.datastores.get(&key(strip_json(name))) {
                Some(store) => ok(json!({"dataStore": store})),
                None => status(404, "no such datastore"),
            },
            (Method::Delete, ["datastores", name]) => {
                let name = name.to_string();
                if state.datastores.remove(&key(&name)).is_none() {
                    return status(404, "no such datastore");
                }
                let doomed: Vec<String> = state
                    .feature_types
                    .keys()
                    .filter(|(w, ds, _)| w == ws && ds == &name)
                    .map(|(_, _, ft)| ft.clone())
                    .collect();
                for ft in doomed {
                    state.feature_types.remove(&(ws.to_string(), name.clone(), ft.clone()));
                    state.layers.remove(&key(&ft));
                }
                ok(json!({}))
            }
            (Method::Put, ["datastores", name, file]) if file.starts_with("file.") => {
                let table = String::from_utf8_lossy(&body_bytes(body)).into_owned();
                state.datastores.insert(
                    key(name),
                    json!({"name": name, "type": "GeoPackage", "enabled": true}),
                );
                state.feature_types.insert(
                    (ws.to_string(), name.to_string(), table.clone()),
                    json!({"name": table, "nativeName": table, "srs": "EPSG:4326"}),
                );
                let href = format!(
                    "{}/workspaces/{}/datastores/{}/featuretypes/{}.json",
                    REST, ws, name, table
                );
                state.layers.insert(key(&table), layer_doc(ws, &table, "featureType", href));
                created()
            }

            // --- feature types ----------------------------------------------
            (Method::Post, ["datastores", ds, "featuretypes"]) => {
                if !state.datastores.contains_key(&key(ds)) {
                    return status(404, "no such datastore");
                }
                let doc = body_json(body);
                let Some(name) = doc["featureType"]["name"].as_str().map(str::to_string) else {
                    return status(400, "feature type name missing");
                };
                if state.layers.contains_key(&key(&name)) {
                    return status(500, "layer already exists");
                }
                state
                    .feature_types
                    .insert((ws.to_string(), ds.to_string(), name.clone()), doc["featureType"].clone());
                let href = format!(
                    "{}/workspaces/{}/datastores/{}/featuretypes/{}.json",
                    REST, ws, ds, name
                );
                state.layers.insert(key(&name), layer_doc(ws, &name, "featureType", href));
                created()
            }
            (Method::Get, ["datastores", ds, "featuretypes", name]) => {
                match state
                    .feature_types
                    .get(&(ws.to_string(), ds.to_string(), strip_json(name).to_string()))
                {
                    Some(ft) => ok(json!({"featureType": ft})),
                    None => status(404, "no such feature type"),
                }
            }
            (Method::Put, ["datastores", ds, "featuretypes", name]) => {
                let old = (ws.to_string(), ds.to_string(), strip_json(name).to_string());
                let Some(mut current) = state.feature_types.remove(&old) else {
                    return status(404, "no such feature type");
                };
                let doc = body_json(body);
                if let (Some(target), Some(update)) =
                    (current.as_object_mut(), doc["featureType"].as_object())
                {
                    for (field, value) in update {
                        target.insert(field.clone(), value.clone());
                    }
                }
                let new_name = current["name"].as_str().unwrap_or(&old.2).to_string();
                state
                    .feature_types
                    .insert((ws.to_string(), ds.to_string(), new_name.clone()), current.clone());
                if new_name != old.2 {
                    state.layers.remove(&key(&old.2));
                }
                let href = format!(
                    "{}/workspaces/{}/datastores/{}/featuretypes/{}.json",
                    REST, ws, ds, new_name
                );
                state
                    .layers
                    .entry(key(&new_name))
                    .or_insert_with(|| layer_doc(ws, &new_name, "featureType", href));
                ok(json!({}))
            }

            // --- coverages --------------------------------------------------
            (Method::Put, ["coveragestores", name, file]) if file.starts_with("file.") => {
                state
                    .coverages
                    .insert(key(name), json!({"name": name, "nativeName": name}));
                let href = format!(
                    "{}/workspaces/{}/coveragestores/{}/coverages/{}.json",
                    REST, ws, name, name
                );
                state.layers.insert(key(name), layer_doc(ws, name, "coverage", href));
                created()
            }
            (Method::Get, ["coveragestores", _, "coverages", name]) => {
                match state.coverages.get(&key(strip_json(name))) {
                    Some(coverage) => ok(json!({"coverage": coverage})),
                    None => status(404, "no such coverage"),
                }
            }
            (Method::Put, ["coveragestores", _, "coverages", name]) => {
                let name = strip_json(name);
                if !state.coverages.contains_key(&key(name)) {
                    return status(404, "no such coverage");
                }
                state.coverages.insert(key(name), body_json(body)["coverage"].clone());
                ok(json!({}))
            }

            // --- layers -----------------------------------------------------
            (Method::Get, ["layers.json"]) => {
                let items = state
                    .layers
                    .keys()
                    .filter(|(w, _)| w == ws)
                    .map(|(_, name)| {
                        (name.clone(), format!("{}/workspaces/{}/layers/{}.json", REST, ws, name))
                    })
                    .collect();
                ok(listing("layers", "layer", items))
            }
            (Method::Get, ["layers", name]) => match state.layers.get(&key(strip_json(name))) {
                Some(layer) => ok(json!({"layer": layer})),
                None => status(404, "no such layer"),
            },
            (Method::Put, ["layers", name]) => {
                let name = strip_json(name);
                if !state.layers.contains_key(&key(name)) {
                    return status(404, "no such layer");
                }
                state.layers.insert(key(name), body_json(body)["layer"].clone());
                ok(json!({}))
            }
            (Method::Delete, ["layers", name]) => {
                let name = strip_json(name).to_string();
                if state.layers.remove(&key(&name)).is_none() {
                    return status(404, "no such layer");
                }
                if query.get("recurse") == Some(&"true") {
                    state.feature_types.retain(|(w, _, ft), _| !(w == ws && ft == &name));
                    state.coverages.remove(&key(&name));
                }
                ok(json!({}))
            }

            // --- styles -----------------------------------------------------
            (Method::Get, ["styles.json"]) => {
                let items = state
                    .styles
                    .keys()
                    .filter(|(w, _)| w == ws)
                    .map(|(_, name)| {
                        (name.clone(), format!("{}/workspaces/{}/styles/{}.json", REST, ws, name))
                    })
                    .collect();
                ok(listing("styles", "style", items))
            }
            (Method::Post, ["styles"]) => {
                let name = match query.get("name") {
                    Some(name) => name.to_string(),
                    None => {
                        let text = String::from_utf8_lossy(&body_bytes(body)).into_owned();
                        match text
                            .split_once("<name>")
                            .and_then(|(_, rest)| rest.split_once("</name>"))
                        {
                            Some((name, _)) => name.to_string(),
                            None => return status(400, "style name missing"),
                        }
                    }
                };
                if state.styles.contains_key(&key(&name)) {
                    return status(403, "style already exists");
                }
                let content = if query.contains_key("name") {
                    body_bytes(body)
                } else {
                    Vec::new()
                };
                state.styles.insert(key(&name), content);
                created()
            }
            (Method::Put, ["styles", name]) => {
                if !state.styles.contains_key(&key(name)) {
                    return status(404, "no such style");
                }
                state.styles.insert(key(name), body_bytes(body));
                ok(json!({}))
            }
            (Method::Delete, ["styles", name]) => {
                if state.styles.remove(&key(name)).is_none() {
                    return status(404, "no such style");
                }
                ok(json!({}))
            }

            // --- layer groups -----------------------------------------------
            (Method::Post, ["layergroups"]) => {
                let doc = body_json(body);
                let Some(name) = doc["layerGroup"]["name"].as_str().map(str::to_string) else {
                    return status(400, "group name missing");
                };
                if state.layergroups.contains_key(&key(&name)) {
                    return status(500, "layer group already exists");
                }
                let members = doc["layerGroup"]["publishables"]["published"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default();
                for member in members {
                    let qualified = member["name"].as_str().unwrap_or_default();
                    let local = qualified.rsplit(':').next().unwrap_or_default();
                    let known = match member["@type"].as_str() {
                        Some("layerGroup") => state.layergroups.contains_key(&key(local)),
                        _ => state.layers.contains_key(&key(local)),
                    };
                    if !known {
                        return status(400, &format!("unknown publishable {}", qualified));
                    }
                }
                state.layergroups.insert(key(&name), doc["layerGroup"].clone());
                state
                    .gwc
                    .entry(format!("{}:{}", ws, name))
                    .or_insert_with(|| default_gwc_xml(ws, &name));
                created()
            }
            (Method::Put, ["layergroups", name]) => {
                state.layergroups.insert(key(name), body_json(body)["layerGroup"].clone());
                state
                    .gwc
                    .entry(format!("{}:{}", ws, name))
                    .or_insert_with(|| default_gwc_xml(ws, name));
                ok(json!({}))
            }
            (Method::Delete, ["layergroups", name]) => {
                if state.layergroups.remove(&key(name)).is_none() {
                    return status(404, "no such layer group");
                }
                ok(json!({}))
            }

            _ => status(404, "no route"),
        }
    }
}

#[async_trait]
impl RestClient for FakeGeoServer {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, ConnectivityError> {
        self.log.lock().unwrap().push(Recorded {
            method: request.method,
            url: request.url.clone(),
            content_type: request.content_type().map(str::to_string),
            body: request.body.clone(),
        });

        if self.state.lock().unwrap().offline {
            return Err(ConnectivityError {
                url: request.url,
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.handle(&request))
    }
}

// =============================================================================
// Fake Collaborators
// =============================================================================

/// Writes placeholder files; a GeoPackage's content is its table name.
#[derive(Default)]
pub(crate) struct FakeExporter {
    pub calls: Mutex<Vec<(String, ExportFormat)>>,
    /// Shapefile part left out of the export, e.g. `"prj"`.
    pub skip_part: Mutex<Option<&'static str>>,
}

impl FakeExporter {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LayerExporter for FakeExporter {
    async fn export(
        &self,
        layer: &SourceLayer,
        _fields: Option<&[String]>,
        format: ExportFormat,
        dir: &Path,
    ) -> PublishResult<ExportedDataset> {
        self.calls
            .lock()
            .unwrap()
            .push((layer.source.clone(), format));

        let native_name = Path::new(&layer.source)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| layer.name.clone());
        let path = dir.join(format!("{}.{}", native_name, format.extension()));

        match format {
            ExportFormat::GeoPackage => std::fs::write(&path, native_name.as_bytes())?,
            ExportFormat::GeoTiff => std::fs::write(&path, b"II*\0")?,
            ExportFormat::Shapefile => {
                let skip = *self.skip_part.lock().unwrap();
                for ext in ["shp", "shx", "prj", "dbf"] {
                    if Some(ext) != skip {
                        std::fs::write(path.with_extension(ext), ext.as_bytes())?;
                    }
                }
            }
        }
        Ok(ExportedDataset { path, native_name })
    }
}

#[derive(Default)]
pub(crate) struct FakeStyles {
    pub warnings: Vec<String>,
}

#[async_trait]
impl StyleConverter for FakeStyles {
    async fn zipped_style(&self, layer: &SourceLayer, dest: &Path) -> PublishResult<Vec<String>> {
        std::fs::write(dest, format!("sld:{}", layer.name))?;
        Ok(self.warnings.clone())
    }

    async fn group_style(
        &self,
        group: &LayerGroup,
        _layers: &[SourceLayer],
        _base_url: &str,
        _workspace: &str,
    ) -> PublishResult<GroupStyle> {
        let style = MapboxStyle::from_value(json!({
            "version": 8,
            "name": group.name,
            "sources": {},
            "layers": [],
        }))?;
        Ok(GroupStyle {
            style,
            warnings: self.warnings.clone(),
            sprite_sheet: Some(SpriteSheet {
                png: b"png".to_vec(),
                png2x: b"png2x".to_vec(),
                json: "{}".to_string(),
                json2x: "{}".to_string(),
            }),
        })
    }

    async fn mapbox_style(&self, layers: &[SourceLayer]) -> PublishResult<MapboxOutput> {
        let mut sources = serde_json::Map::new();
        for layer in layers {
            sources.insert(layer.name.clone(), json!({"type": "geojson", "data": {}}));
        }
        Ok(MapboxOutput {
            style: MapboxStyle::from_value(json!({
                "version": 8,
                "sources": sources,
                "layers": [],
            }))?,
            warnings: self.warnings.clone(),
        })
    }
}

pub(crate) struct FakeDatabase {
    pub imported: Mutex<Vec<String>>,
    pub fail: bool,
}

pub(crate) fn postgis_connection() -> PostgisConnection {
    PostgisConnection {
        host: "db.internal".into(),
        port: 5432,
        schema: "public".into(),
        database: "gis".into(),
        username: "loader".into(),
        password: "secret".into(),
    }
}

#[async_trait]
impl DatabaseProfile for FakeDatabase {
    fn connection(&self) -> PostgisConnection {
        postgis_connection()
    }

    async fn import_layer(&self, layer: &SourceLayer, _fields: Option<&[String]>) -> PublishResult<()> {
        if self.fail {
            return Err(PublishError::Import {
                layer: layer.name.clone(),
                reason: "relation already exists".to_string(),
            });
        }
        self.imported.lock().unwrap().push(layer.name.clone());
        Ok(())
    }
}

/// Server plus collaborators, with accessors for assertions.
pub(crate) struct Rig {
    pub server: Arc<FakeGeoServer>,
    pub exporter: Arc<FakeExporter>,
    pub database: Arc<FakeDatabase>,
    pub collaborators: Collaborators,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_styles(FakeStyles::default())
    }

    pub fn with_styles(styles: FakeStyles) -> Self {
        let exporter = Arc::new(FakeExporter::default());
        let database = Arc::new(FakeDatabase {
            imported: Mutex::new(Vec::new()),
            fail: false,
        });
        let mut databases: HashMap<String, Arc<dyn DatabaseProfile>> = HashMap::new();
        databases.insert("warehouse".to_string(), database.clone());
        let registry: Arc<dyn DatabaseRegistry> = Arc::new(databases);

        Rig {
            server: FakeGeoServer::new(),
            exporter: exporter.clone(),
            database,
            collaborators: Collaborators {
                exporter,
                styles: Arc::new(styles),
                databases: registry,
            },
        }
    }

    /// Session for project `/projects/ws.qgz`, so the workspace is `ws`.
    pub fn session(&self, profile: ServerProfile) -> PublishSession {
        self.session_for(profile, Some("/projects/ws.qgz"))
    }

    pub fn session_for(&self, profile: ServerProfile, project: Option<&str>) -> PublishSession {
        PublishSession::new(
            profile,
            project.map(Into::into),
            self.server.clone(),
            self.collaborators.clone(),
        )
    }
}

/// Checks the fake's own style-name extraction against a known descriptor.
#[test]
fn fake_reads_style_name_from_descriptor() {
    let server = FakeGeoServer::new();
    server.seed_workspace("ws");
    let request = RestRequest::post(
        format!("{}/workspaces/ws/styles", REST),
        RequestBody::text("<style><name>G</name></style>", "text/xml"),
    );
    assert_eq!(server.handle(&request).status, 201);
    assert_eq!(server.style("ws", "G"), Some(Vec::new()));
}
