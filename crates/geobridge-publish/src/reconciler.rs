//! # Data Reconciler
//!
//! Makes one layer's data exist on the server under the layer's name.
//!
//! ## Publish Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FileBased          export .gpkg (once per source)                      │
//! │                     upload file datastore (once per file)               │
//! │                     feature type: PUT renamed template (first layer)    │
//! │                                   POST new feature type (later layers)  │
//! │                                                                         │
//! │  ServerManaged      export .shp, zip .shp/.shx/.prj/.dbf                │
//! │                     mirror shared datastore into workspace (once)       │
//! │                     importer: create → upload task → target → run       │
//! │                     feature type: POST, PUT on rejection                │
//! │                                                                         │
//! │  PublisherManaged   database profile loads the layer                    │
//! │                     then as OriginalPostgis                             │
//! │                                                                         │
//! │  OriginalPostgis    replace datastore named after layer, POST ft        │
//! │                                                                         │
//! │  Raster             export .tif, PUT into coverage store                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every path ends by making the layer's own style its default style.

use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use geobridge_core::resources::{
    DataStore, DataStoreEnvelope, FeatureType, FeatureTypeEnvelope, ImportCreated, ImportRequest,
    StoreTarget, TaskCreated,
};
use geobridge_core::{DatastoreRef, ExportFormat, PostgisConnection, PublishTarget, SourceLayer};

use crate::catalog::Catalog;
use crate::collaborators::{Collaborators, ExportedDataset};
use crate::error::{PublishError, PublishResult};
use crate::session::{SessionState, UploadedDataset};
use crate::transport::{RequestBody, CONTENT_TYPE_OCTET_STREAM};

/// Files bundled for the importer, by extension.
pub const SHAPEFILE_PARTS: [&str; 4] = ["shp", "shx", "prj", "dbf"];

const CONTENT_TYPE_GEOTIFF: &str = "image/tiff";

pub(crate) struct Reconciler<'a> {
    catalog: &'a mut Catalog,
    state: &'a mut SessionState,
    collaborators: &'a Collaborators,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        catalog: &'a mut Catalog,
        state: &'a mut SessionState,
        collaborators: &'a Collaborators,
    ) -> Self {
        Reconciler {
            catalog,
            state,
            collaborators,
        }
    }

    pub async fn publish(&mut self, layer: &SourceLayer, target: &PublishTarget) -> PublishResult<()> {
        info!(layer = %layer.name, %target, "Publishing layer data");

        match target {
            PublishTarget::FileBased => self.publish_file_based(layer).await?,
            PublishTarget::ServerManagedPostgis { datastore } => {
                self.publish_through_importer(layer, datastore).await?
            }
            PublishTarget::PublisherManagedPostgis { database } => {
                self.publish_to_database(layer, database).await?
            }
            PublishTarget::OriginalPostgis { connection } => {
                self.publish_from_postgis(layer, connection).await?
            }
            PublishTarget::Raster => self.publish_raster(layer).await?,
        }

        self.catalog.set_layer_style(&layer.name, &layer.name).await
    }

    // =========================================================================
    // Export bookkeeping
    // =========================================================================

    /// Exports `layer` unless its source was already exported in `format`.
    async fn export_once(&mut self, layer: &SourceLayer, format: ExportFormat) -> PublishResult<ExportedDataset> {
        let key = (layer.source.clone(), format);
        if let Some(dataset) = self.state.exports.get(&key) {
            debug!(layer = %layer.name, file = %dataset.path.display(), "Reusing export");
            return Ok(dataset.clone());
        }

        let dir = self.state.temp_dir.path().to_path_buf();
        let exported = self
            .collaborators
            .exporter
            .export(layer, layer.fields.as_deref(), format, &dir)
            .await?;

        let dataset = match format {
            ExportFormat::Shapefile => bundle_shapefile(exported).await?,
            _ => exported,
        };

        info!(layer = %layer.name, file = %dataset.path.display(), "Layer exported");
        self.state.exports.insert(key, dataset.clone());
        Ok(dataset)
    }

    /// Feature type the server created for an uploaded file, fetched once.
    async fn template(&mut self, path: &Path) -> PublishResult<(String, String, FeatureType)> {
        let Some(upload) = self.state.uploads.get_mut(path) else {
            return Err(PublishError::Export {
                layer: path.display().to_string(),
                reason: "dataset was never uploaded".to_string(),
            });
        };

        if upload.template.is_none() {
            let url = self
                .catalog
                .endpoints()
                .featuretype_json(&upload.datastore, &upload.native_name);
            let envelope: FeatureTypeEnvelope = self.catalog.get_json(&url).await?;
            upload.template = Some(envelope.feature_type);
        }

        let template = upload.template.clone().ok_or_else(|| PublishError::UnexpectedResponse {
            url: path.display().to_string(),
            reason: "feature type template missing".to_string(),
        })?;
        Ok((upload.datastore.clone(), upload.native_name.clone(), template))
    }

    // =========================================================================
    // File based
    // =========================================================================

    async fn publish_file_based(&mut self, layer: &SourceLayer) -> PublishResult<()> {
        let dataset = self.export_once(layer, ExportFormat::GeoPackage).await?;
        let fresh = !self.state.uploads.contains_key(&dataset.path);

        if fresh {
            self.catalog.delete_datastore_quietly(&layer.name).await?;
            let data = tokio::fs::read(&dataset.path).await?;
            let url = self
                .catalog
                .endpoints()
                .datastore_file_upload(&layer.name, ExportFormat::GeoPackage);
            self.catalog
                .put(&url, RequestBody::bytes(data, CONTENT_TYPE_OCTET_STREAM))
                .await?;
            info!(layer = %layer.name, file = %dataset.path.display(), "GeoPackage uploaded");
            self.state.uploads.insert(
                dataset.path.clone(),
                UploadedDataset::new(&layer.name, &dataset.native_name),
            );
        }

        let (datastore, native_name, mut feature_type) = self.template(&dataset.path).await?;
        feature_type.rename(&layer.name);
        feature_type.set_native_bounding_box(&layer.extent, &layer.crs);
        let envelope = feature_type.into_envelope();

        // The upload created a feature type for the file's table; the first
        // layer takes it over, later layers sharing the file get their own.
        if fresh {
            let url = self.catalog.endpoints().featuretype_json(&datastore, &native_name);
            self.catalog.put_json(&url, &envelope).await?;
        } else {
            let url = self.catalog.endpoints().featuretypes(&datastore);
            self.catalog.post_json(&url, &envelope).await?;
        }
        Ok(())
    }

    // =========================================================================
    // PostGIS managed by the server
    // =========================================================================

    async fn publish_through_importer(&mut self, layer: &SourceLayer, source: &DatastoreRef) -> PublishResult<()> {
        let dataset = self.export_once(layer, ExportFormat::Shapefile).await?;
        self.ensure_mirrored_datastore(source).await?;

        if !self.state.uploads.contains_key(&dataset.path) {
            self.run_import(&dataset, &source.name).await?;
            self.state.uploads.insert(
                dataset.path.clone(),
                UploadedDataset::new(&source.name, &dataset.native_name),
            );
        }

        let (datastore, native_name, mut feature_type) = self.template(&dataset.path).await?;
        feature_type.rename(&layer.name);
        let envelope = feature_type.into_envelope();

        let create_url = self.catalog.endpoints().featuretypes(&datastore);
        match self.catalog.post_json(&create_url, &envelope).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_request_error() => {
                warn!(layer = %layer.name, error = %err, "Feature type create rejected, updating instead");
                let url = self.catalog.endpoints().featuretype_json(&datastore, &native_name);
                self.catalog.put_json(&url, &envelope).await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Copies the shared datastore into the session workspace, once.
    async fn ensure_mirrored_datastore(&mut self, source: &DatastoreRef) -> PublishResult<()> {
        if self.state.mirrored_datastore {
            return Ok(());
        }

        if !self.catalog.datastore_exists(&source.name).await? {
            let url = self
                .catalog
                .endpoints()
                .foreign_datastore_json(&source.workspace, &source.name);
            let envelope: DataStoreEnvelope = self.catalog.get_json(&url).await?;
            self.catalog.add_datastore(envelope.data_store.mirrored()).await?;
            info!(datastore = %source, "Shared datastore mirrored into workspace");
        }

        self.state.mirrored_datastore = true;
        Ok(())
    }

    async fn run_import(&self, dataset: &ExportedDataset, datastore: &str) -> PublishResult<()> {
        let endpoints = self.catalog.endpoints().clone();

        let imports_url = endpoints.imports();
        let request = ImportRequest::new(endpoints.workspace_name(), datastore);
        let response = self.catalog.post_json(&imports_url, &request).await?;
        let created: ImportCreated = Catalog::decode(&imports_url, &response)?;
        let import_id = created.import.id;

        let file_name = dataset
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.zip", dataset.native_name));
        let data = tokio::fs::read(&dataset.path).await?;
        let tasks_url = endpoints.import_tasks(import_id);
        let response = self
            .catalog
            .post(&tasks_url, RequestBody::Multipart { file_name, data })
            .await?;
        let task: TaskCreated = Catalog::decode(&tasks_url, &response)?;

        let target_url = endpoints.import_task_target(import_id, task.task.id);
        self.catalog
            .put_json(&target_url, &StoreTarget::datastore(datastore))
            .await?;

        self.catalog
            .post(&endpoints.import(import_id), RequestBody::Empty)
            .await?;
        info!(import = import_id, %datastore, "Import executed");
        Ok(())
    }

    // =========================================================================
    // PostGIS managed by the publisher / original source
    // =========================================================================

    async fn publish_to_database(&mut self, layer: &SourceLayer, database: &str) -> PublishResult<()> {
        let profile = self
            .collaborators
            .databases
            .profile(database)
            .ok_or_else(|| PublishError::UnknownDatabase(database.to_string()))?;

        profile.import_layer(layer, layer.fields.as_deref()).await?;
        info!(layer = %layer.name, %database, "Layer loaded into database");
        self.publish_from_postgis(layer, &profile.connection()).await
    }

    async fn publish_from_postgis(&mut self, layer: &SourceLayer, connection: &PostgisConnection) -> PublishResult<()> {
        self.catalog.delete_datastore_quietly(&layer.name).await?;
        self.catalog
            .add_datastore(DataStore::postgis(&layer.name, connection))
            .await?;

        let url = self.catalog.endpoints().featuretypes(&layer.name);
        let feature_type = FeatureType::new(&layer.name, &layer.crs);
        self.catalog.post_json(&url, &feature_type.into_envelope()).await?;
        Ok(())
    }

    // =========================================================================
    // Raster
    // =========================================================================

    async fn publish_raster(&mut self, layer: &SourceLayer) -> PublishResult<()> {
        let dataset = self.export_once(layer, ExportFormat::GeoTiff).await?;
        let data = tokio::fs::read(&dataset.path).await?;
        let url = self
            .catalog
            .endpoints()
            .coverage_store_file(&layer.name, ExportFormat::GeoTiff);
        self.catalog
            .put(&url, RequestBody::bytes(data, CONTENT_TYPE_GEOTIFF))
            .await?;
        info!(layer = %layer.name, "Coverage uploaded");
        Ok(())
    }
}

// =============================================================================
// Shapefile bundle
// =============================================================================

async fn bundle_shapefile(exported: ExportedDataset) -> PublishResult<ExportedDataset> {
    tokio::task::spawn_blocking(move || write_shapefile_zip(&exported.path))
        .await
        .map_err(|e| PublishError::Io(std::io::Error::other(e)))?
}

/// Zips the parts of the shapefile at `shp` next to it.
fn write_shapefile_zip(shp: &Path) -> PublishResult<ExportedDataset> {
    let stem = shp
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| PublishError::Export {
            layer: shp.display().to_string(),
            reason: "export path has no file name".to_string(),
        })?;

    let zip_path: PathBuf = shp.with_extension("zip");
    let mut writer = ZipWriter::new(File::create(&zip_path)?);
    let options = SimpleFileOptions::default();

    for extension in SHAPEFILE_PARTS {
        let part = shp.with_extension(extension);
        let mut file = File::open(&part).map_err(|e| PublishError::Export {
            layer: stem.clone(),
            reason: format!("missing {}: {}", part.display(), e),
        })?;
        writer.start_file(format!("{}.{}", stem, extension), options)?;
        std::io::copy(&mut file, &mut writer)?;
    }
    writer.finish()?;

    Ok(ExportedDataset {
        path: zip_path,
        native_name: stem,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
