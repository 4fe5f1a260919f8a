//! # Publish Session
//!
//! Orchestrates one publish of a project into its workspace.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       PublishSession Lifecycle                          │
//! │                                                                         │
//! │  new(profile, project, client, collaborators)                           │
//! │      │  workspace = project file stem                                   │
//! │      ▼                                                                  │
//! │  validate_before_publication(names, confirm) → Vec<error message>       │
//! │      │  local checks first, nothing sent when they fail                 │
//! │      ▼                                                                  │
//! │  prepare_for_publishing(only_symbology)                                 │
//! │      │  (delete workspace) → ensure workspace → fresh temp dir/caches   │
//! │      ▼                                                                  │
//! │  publish_style(layer) / publish_layer(layer) / create_groups(..)        │
//! │      │  failures recorded in the report, session continues              │
//! │      ▼                                                                  │
//! │  close_publishing() → PublishReport                                     │
//! │         vector tiles enabled: mb_{ws} style + OpenLayers preview        │
//! │         temp dir removed                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `publish_all` runs the whole sequence for a [`PublishPlan`].
//!
//! Requests go out one at a time; `&mut self` keeps a session from being
//! driven by two publishes at once.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use geobridge_core::group::validate_groups;
use geobridge_core::resources::{DataStore, FeatureType};
use geobridge_core::validation::{
    check_server_version, validate_workspace_name, workspace_name_for_project,
};
use geobridge_core::{Endpoints, ExportFormat, LayerGroup, ServerProfile, SourceLayer};

use crate::catalog::Catalog;
use crate::collaborators::{Collaborators, DeletionConfirmation, ExportedDataset};
use crate::error::{PublishError, PublishResult};
use crate::groups::GroupComposer;
use crate::preview::publish_preview;
use crate::reconciler::Reconciler;
use crate::report::PublishReport;
use crate::styles::{session_style_name, StylePublisher};
use crate::transport::RestClient;

/// Reported when the project has never been saved.
pub const UNSAVED_PROJECT: &str =
    "Project is not saved. Project must be saved before publishing layers to GeoServer";

/// Reported when the user refuses to lose remote layers.
pub const OVERWRITE_REFUSED: &str = "Cannot overwrite existing workspace";

/// Reported when the server cannot be reached during validation.
pub const CONNECTION_FAILED: &str =
    "Could not connect to Geoserver. Please check the server settings (including password).";

// =============================================================================
// Session State
// =============================================================================

/// A file uploaded this session and the feature type the server made of it.
#[derive(Debug, Clone)]
pub(crate) struct UploadedDataset {
    pub datastore: String,
    pub native_name: String,
    pub template: Option<FeatureType>,
}

impl UploadedDataset {
    pub fn new(datastore: &str, native_name: &str) -> Self {
        UploadedDataset {
            datastore: datastore.to_string(),
            native_name: native_name.to_string(),
            template: None,
        }
    }
}

/// Everything that lives between `prepare_for_publishing` and
/// `close_publishing`.
pub(crate) struct SessionState {
    pub temp_dir: TempDir,
    pub exports: HashMap<(String, ExportFormat), ExportedDataset>,
    pub uploads: HashMap<PathBuf, UploadedDataset>,
    pub mirrored_datastore: bool,
    /// Layers whose styles were published, in publish order.
    pub styled_layers: Vec<SourceLayer>,
}

impl SessionState {
    fn new() -> PublishResult<Self> {
        let temp_dir = tempfile::Builder::new().prefix("geobridge-").tempdir()?;
        debug!(dir = %temp_dir.path().display(), "Session directory created");
        Ok(SessionState {
            temp_dir,
            exports: HashMap::new(),
            uploads: HashMap::new(),
            mirrored_datastore: false,
            styled_layers: Vec::new(),
        })
    }
}

// =============================================================================
// Publish Plan
// =============================================================================

/// A complete publish, as run by [`PublishSession::publish_all`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishPlan {
    /// Keep the workspace and its data, only replace styles.
    #[serde(default)]
    pub only_symbology: bool,

    #[serde(default = "default_true")]
    pub publish_data: bool,

    #[serde(default = "default_true")]
    pub publish_styles: bool,

    #[serde(default)]
    pub layers: Vec<SourceLayer>,

    #[serde(default)]
    pub groups: Vec<LayerGroup>,
}

fn default_true() -> bool {
    true
}

impl Default for PublishPlan {
    fn default() -> Self {
        PublishPlan {
            only_symbology: false,
            publish_data: true,
            publish_styles: true,
            layers: Vec::new(),
            groups: Vec::new(),
        }
    }
}

impl PublishPlan {
    pub fn layer_names(&self) -> Vec<String> {
        self.layers.iter().map(|layer| layer.name.clone()).collect()
    }
}

// =============================================================================
// Publish Session
// =============================================================================

/// One publish of a project into the workspace named after it.
pub struct PublishSession {
    id: Uuid,
    profile: ServerProfile,
    project_path: Option<PathBuf>,
    catalog: Catalog,
    collaborators: Collaborators,
    state: Option<SessionState>,
    report: PublishReport,
}

impl PublishSession {
    pub fn new(
        profile: ServerProfile,
        project_path: Option<PathBuf>,
        client: Arc<dyn RestClient>,
        collaborators: Collaborators,
    ) -> Self {
        let id = Uuid::new_v4();
        let workspace = workspace_name_for_project(project_path.as_deref());
        let catalog = Catalog::new(client, Endpoints::new(&profile, workspace.as_str()));
        let report = PublishReport::new(id, &profile.name, &workspace);

        PublishSession {
            id,
            profile,
            project_path,
            catalog,
            collaborators,
            state: None,
            report,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn workspace(&self) -> &str {
        self.catalog.workspace()
    }

    pub fn profile(&self) -> &ServerProfile {
        &self.profile
    }

    pub fn project_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }

    /// Report so far; finalized by `close_publishing`.
    pub fn report(&self) -> &PublishReport {
        &self.report
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Collects every reason the publish should not go ahead.
    ///
    /// Local problems are reported without contacting the server.
    #[instrument(name = "publish_session", skip_all, fields(session = %self.id, workspace = %self.workspace()))]
    pub async fn validate_before_publication(
        &mut self,
        to_publish: &[String],
        confirm: &dyn DeletionConfirmation,
    ) -> Vec<String> {
        let mut errors = Vec::new();
        let workspace = self.workspace().to_string();

        if self.project_path.is_none() || workspace.is_empty() {
            errors.push(UNSAVED_PROJECT.to_string());
        } else if let Err(err) = validate_workspace_name(&workspace) {
            errors.push(format!(
                "Project name '{}' cannot be used as a workspace ({}). Save with a different name and try again",
                workspace, err
            ));
        }
        if !errors.is_empty() {
            return errors;
        }

        match self.remote_layers().await {
            Ok(remote) => {
                let doomed: Vec<String> = remote
                    .into_iter()
                    .filter(|name| !to_publish.contains(name))
                    .collect();
                if !doomed.is_empty() && !confirm.confirm_layer_deletion(&workspace, &doomed) {
                    errors.push(OVERWRITE_REFUSED.to_string());
                }
            }
            Err(err) if err.is_connectivity() => {
                warn!(error = %err, "Server unreachable during validation");
                errors.push(CONNECTION_FAILED.to_string());
                return errors;
            }
            Err(err) => warn!(error = %err, "Could not list remote layers"),
        }

        match self.catalog.server_version().await {
            Ok(version) => {
                if let Err(err) = check_server_version(version.as_deref()) {
                    errors.push(err.to_string());
                }
            }
            Err(err) => {
                warn!(error = %err, "Version check failed");
                errors.push(CONNECTION_FAILED.to_string());
            }
        }

        errors
    }

    async fn remote_layers(&mut self) -> PublishResult<Vec<String>> {
        if !self.catalog.workspace_exists().await? {
            return Ok(Vec::new());
        }
        self.catalog.layers().await
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Readies the workspace and starts fresh session state.
    ///
    /// Unless `only_symbology` is set the workspace is deleted first, so
    /// everything is republished from scratch.
    #[instrument(name = "publish_session", skip_all, fields(session = %self.id, workspace = %self.workspace()))]
    pub async fn prepare_for_publishing(&mut self, only_symbology: bool) -> PublishResult<()> {
        validate_workspace_name(self.workspace())?;

        if !only_symbology {
            self.catalog.delete_workspace().await?;
        }
        self.catalog.ensure_workspace().await?;
        self.catalog.reset_cache();

        self.state = Some(SessionState::new()?);
        self.report = PublishReport::new(self.id, &self.profile.name, self.catalog.workspace());
        info!(only_symbology, "Ready to publish");
        Ok(())
    }

    /// Ends the session. With vector tiles enabled the combined style and the
    /// preview page are published first.
    #[instrument(name = "publish_session", skip_all, fields(session = %self.id, workspace = %self.workspace()))]
    pub async fn close_publishing(&mut self) -> PublishResult<PublishReport> {
        let state = self.state.take().ok_or(PublishError::NoActiveSession)?;

        if self.profile.use_vector_tiles {
            if state.styled_layers.is_empty() {
                debug!("No styled layers, skipping vector tile style");
            } else if let Err(err) = self.finalize_vector_tiles(&state).await {
                let name = session_style_name(self.catalog.workspace());
                self.report.record_failure(&name, &err);
            }
        }

        drop(state);
        self.report.finish();
        info!(
            layers = self.report.layers.len(),
            styles = self.report.styles.len(),
            groups = self.report.groups.len(),
            errors = self.report.errors.len(),
            "Publish session closed"
        );
        Ok(self.report.clone())
    }

    async fn finalize_vector_tiles(&mut self, state: &SessionState) -> PublishResult<()> {
        let work_dir = state.temp_dir.path();
        let (style, warnings) = StylePublisher::new(
            &mut self.catalog,
            self.collaborators.styles.as_ref(),
            work_dir,
        )
        .publish_session_style(&state.styled_layers)
        .await?;

        self.report.record_warnings(warnings);
        self.report
            .record_style(&session_style_name(self.catalog.workspace()));
        publish_preview(&self.catalog, &style, work_dir).await
    }

    // =========================================================================
    // Publishing
    // =========================================================================

    /// Publishes the data of one layer. Failures are also recorded in the
    /// report.
    #[instrument(name = "publish_session", skip_all, fields(session = %self.id, layer = %layer.name))]
    pub async fn publish_layer(&mut self, layer: &SourceLayer) -> PublishResult<()> {
        let result = self.publish_layer_data(layer).await;
        self.catalog.invalidate_layers();

        match &result {
            Ok(()) => {
                info!("Layer published");
                self.report.record_layer(&layer.name);
            }
            Err(err) => self.report.record_failure(&layer.name, err),
        }
        result
    }

    async fn publish_layer_data(&mut self, layer: &SourceLayer) -> PublishResult<()> {
        if layer.feature_count() == Some(0) {
            return Err(PublishError::EmptyLayer {
                layer: layer.name.clone(),
            });
        }

        let target = self.profile.target_for(layer);
        let state = self.state.as_mut().ok_or(PublishError::NoActiveSession)?;
        Reconciler::new(&mut self.catalog, state, &self.collaborators)
            .publish(layer, &target)
            .await
    }

    /// Publishes the style named after `layer`.
    #[instrument(name = "publish_session", skip_all, fields(session = %self.id, layer = %layer.name))]
    pub async fn publish_style(&mut self, layer: &SourceLayer) -> PublishResult<()> {
        let result = self.publish_style_inner(layer).await;
        match &result {
            Ok(warnings) => {
                self.report.record_style(&layer.name);
                self.report.record_warnings(warnings.iter().cloned());
            }
            Err(err) => self.report.record_failure(&layer.name, err),
        }
        result.map(|_| ())
    }

    async fn publish_style_inner(&mut self, layer: &SourceLayer) -> PublishResult<Vec<String>> {
        let state = self.state.as_mut().ok_or(PublishError::NoActiveSession)?;
        let warnings = StylePublisher::new(
            &mut self.catalog,
            self.collaborators.styles.as_ref(),
            state.temp_dir.path(),
        )
        .publish_layer_style(layer)
        .await?;

        if !state.styled_layers.iter().any(|styled| styled.name == layer.name) {
            state.styled_layers.push(layer.clone());
        }
        Ok(warnings)
    }

    /// Publishes every group tree. A failing tree is recorded and skipped.
    #[instrument(name = "publish_session", skip_all, fields(session = %self.id, groups = groups.len()))]
    pub async fn create_groups(&mut self, groups: &[LayerGroup], layers: &[SourceLayer]) -> PublishResult<()> {
        validate_groups(groups)?;
        let state = self.state.as_ref().ok_or(PublishError::NoActiveSession)?;

        for group in groups {
            let mut composer = GroupComposer::new(
                &mut self.catalog,
                self.collaborators.styles.as_ref(),
                state.temp_dir.path(),
            );
            match composer.publish_tree(group, layers).await {
                Ok(outcome) => {
                    for name in &outcome.published {
                        self.report.record_group(name);
                        self.report.record_style(name);
                    }
                    self.report.record_warnings(outcome.warnings);
                }
                Err(err) => self.report.record_failure(&group.name, &err),
            }
        }
        Ok(())
    }

    /// Removes a layer and its style from the workspace.
    #[instrument(name = "publish_session", skip_all, fields(session = %self.id, layer = %name))]
    pub async fn unpublish_data(&mut self, name: &str) -> PublishResult<()> {
        self.catalog.delete_layer(name, true).await?;
        self.catalog.delete_style(name).await?;
        info!("Layer unpublished");
        Ok(())
    }

    /// Runs a whole plan: prepare, styles and data per layer, groups, close.
    ///
    /// Per-item failures end up in the returned report.
    pub async fn publish_all(&mut self, plan: &PublishPlan) -> PublishResult<PublishReport> {
        self.prepare_for_publishing(plan.only_symbology).await?;

        for layer in &plan.layers {
            if plan.publish_styles {
                if let Err(err) = self.publish_style(layer).await {
                    debug!(layer = %layer.name, error = %err, "Style skipped");
                }
            }
            if plan.publish_data && !plan.only_symbology {
                if let Err(err) = self.publish_layer(layer).await {
                    debug!(layer = %layer.name, error = %err, "Data skipped");
                }
            }
        }

        if !plan.groups.is_empty() {
            if let Err(err) = self.create_groups(&plan.groups, &plan.layers).await {
                self.report.record_failure("layer groups", &err);
            }
        }

        self.close_publishing().await
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    pub async fn test_connection(&self) -> bool {
        self.catalog.test_connection().await
    }

    /// Layer names currently in the workspace.
    pub async fn layers(&self) -> PublishResult<Vec<String>> {
        self.catalog.layers().await
    }

    pub async fn layer_exists(&mut self, name: &str) -> PublishResult<bool> {
        Ok(self.catalog.layer_exists(name).await?)
    }

    pub async fn set_layer_metadata_link(&self, layer: &str, metadata_url: &str) -> PublishResult<()> {
        self.catalog.set_layer_metadata_link(layer, metadata_url).await
    }

    /// Enabled PostGIS datastores across all workspaces, as `ws:name`.
    pub async fn postgis_datastores(&self) -> PublishResult<Vec<String>> {
        self.catalog.postgis_datastores().await
    }

    pub async fn add_postgis_datastore(&self, datastore: DataStore) -> PublishResult<()> {
        self.catalog.add_datastore(datastore).await
    }

    // =========================================================================
    // URLs
    // =========================================================================

    pub fn full_layer_name(&self, layer: &str) -> String {
        self.profile.full_layer_name(self.workspace(), layer)
    }

    pub fn layer_preview_url(&self, names: &[&str], bbox: &str, srs: &str) -> String {
        self.profile
            .layer_preview_url(self.workspace(), names, bbox, srs)
    }

    pub fn wms_url(&self) -> String {
        self.profile.wms_capabilities_url()
    }

    pub fn wfs_url(&self) -> String {
        self.profile.wfs_url()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
