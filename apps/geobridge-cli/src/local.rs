//! Collaborators backed by files prepared ahead of time.
//!
//! The CLI does not render projects itself: layer exports and converted
//! styles are expected on disk, and configured databases are assumed to
//! hold the layer tables already.
//!
//! ```text
//! data_dir/    {layer}.gpkg | {source stem}.gpkg
//!              {layer}.shp + .shx .prj .dbf
//!              {layer}.tif
//! styles_dir/  {layer}.zip | {layer}.sld
//!              {layer}.mbstyle.json | {group}.mbstyle.json
//!              {group}/spriteSheet.png, spriteSheet@2x.png, .json, @2x.json
//! ```

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use geobridge_core::mapbox::MapboxStyle;
use geobridge_core::{ExportFormat, LayerGroup, PostgisConnection, SourceLayer};
use geobridge_publish::reconciler::SHAPEFILE_PARTS;
use geobridge_publish::{
    BridgeConfig, Collaborators, DatabaseProfile, DatabaseRegistry, ExportedDataset, GroupStyle,
    LayerExporter, MapboxOutput, PublishError, PublishResult, SpriteSheet, StyleConverter,
};

const MBSTYLE_SUFFIX: &str = "mbstyle.json";

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
}

// =============================================================================
// Exports
// =============================================================================

/// Copies pre-exported files into the session directory.
pub struct PrebuiltExporter {
    data_dir: PathBuf,
}

impl PrebuiltExporter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        PrebuiltExporter {
            data_dir: data_dir.into(),
        }
    }

    /// First existing file for `layer` in `format`.
    fn locate(&self, layer: &SourceLayer, format: ExportFormat) -> Option<PathBuf> {
        let extension = format.extension();
        let source = PathBuf::from(&layer.source);

        let mut candidates = vec![self.data_dir.join(format!("{}.{}", layer.name, extension))];
        if let Some(stem) = file_stem(&source) {
            candidates.push(self.data_dir.join(format!("{}.{}", stem, extension)));
        }
        if source.extension().and_then(|ext| ext.to_str()) == Some(extension) {
            candidates.push(source);
        }
        candidates.into_iter().find(|path| path.is_file())
    }
}

#[async_trait]
impl LayerExporter for PrebuiltExporter {
    async fn export(
        &self,
        layer: &SourceLayer,
        fields: Option<&[String]>,
        format: ExportFormat,
        dir: &Path,
    ) -> PublishResult<ExportedDataset> {
        if fields.is_some() {
            warn!(layer = %layer.name, "Field selection ignored for prebuilt exports");
        }

        let found = self.locate(layer, format).ok_or_else(|| PublishError::Export {
            layer: layer.name.clone(),
            reason: format!(
                "no .{} file for '{}' in {}",
                format.extension(),
                layer.name,
                self.data_dir.display()
            ),
        })?;
        let native_name = file_stem(&found).unwrap_or_else(|| layer.name.clone());
        let target = dir.join(format!("{}.{}", native_name, format.extension()));

        match format {
            ExportFormat::Shapefile => {
                // Parts that are missing are reported when the bundle is zipped
                for part in SHAPEFILE_PARTS {
                    let from = found.with_extension(part);
                    if from.is_file() {
                        tokio::fs::copy(&from, target.with_extension(part)).await?;
                    }
                }
            }
            _ => {
                tokio::fs::copy(&found, &target).await?;
            }
        }

        debug!(layer = %layer.name, file = %found.display(), "Using prebuilt export");
        Ok(ExportedDataset {
            path: target,
            native_name,
        })
    }
}

// =============================================================================
// Styles
// =============================================================================

/// Serves converted styles from a directory.
pub struct PrebuiltStyles {
    dir: PathBuf,
}

impl PrebuiltStyles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        PrebuiltStyles { dir: dir.into() }
    }

    fn mapbox_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, MBSTYLE_SUFFIX))
    }

    async fn read_mapbox(&self, name: &str) -> PublishResult<Option<MapboxStyle>> {
        let path = self.mapbox_path(name);
        if !path.is_file() {
            return Ok(None);
        }
        let text = tokio::fs::read_to_string(&path).await?;
        let style = MapboxStyle::parse(&text).map_err(|e| PublishError::Style {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(style))
    }

    async fn read_sprites(&self, group: &str) -> PublishResult<Option<SpriteSheet>> {
        let dir = self.dir.join(group);
        let files = ["spriteSheet.png", "spriteSheet@2x.png", "spriteSheet.json", "spriteSheet@2x.json"];
        if !files.iter().all(|file| dir.join(file).is_file()) {
            return Ok(None);
        }

        Ok(Some(SpriteSheet {
            png: tokio::fs::read(dir.join(files[0])).await?,
            png2x: tokio::fs::read(dir.join(files[1])).await?,
            json: tokio::fs::read_to_string(dir.join(files[2])).await?,
            json2x: tokio::fs::read_to_string(dir.join(files[3])).await?,
        }))
    }
}

fn empty_style(name: &str) -> PublishResult<MapboxStyle> {
    Ok(MapboxStyle::from_value(json!({
        "version": 8,
        "name": name,
        "sources": {},
        "layers": [],
    }))?)
}

#[async_trait]
impl StyleConverter for PrebuiltStyles {
    async fn zipped_style(&self, layer: &SourceLayer, dest: &Path) -> PublishResult<Vec<String>> {
        let zipped = self.dir.join(format!("{}.zip", layer.name));
        if zipped.is_file() {
            tokio::fs::copy(&zipped, dest).await?;
            return Ok(Vec::new());
        }

        let sld = self.dir.join(format!("{}.sld", layer.name));
        if sld.is_file() {
            let dest = dest.to_path_buf();
            let entry = format!("{}.sld", layer.name);
            tokio::task::spawn_blocking(move || zip_single_file(&sld, &entry, &dest))
                .await
                .map_err(|e| PublishError::Io(std::io::Error::other(e)))??;
            return Ok(Vec::new());
        }

        Err(PublishError::Style {
            name: layer.name.clone(),
            reason: format!("no {}.zip or {}.sld in {}", layer.name, layer.name, self.dir.display()),
        })
    }

    async fn group_style(
        &self,
        group: &LayerGroup,
        _layers: &[SourceLayer],
        _base_url: &str,
        _workspace: &str,
    ) -> PublishResult<GroupStyle> {
        let mut warnings = Vec::new();
        let style = match self.read_mapbox(&group.name).await? {
            Some(style) => style,
            None => {
                warnings.push(format!("No Mapbox style for group '{}', publishing an empty one", group.name));
                empty_style(&group.name)?
            }
        };

        Ok(GroupStyle {
            style,
            warnings,
            sprite_sheet: self.read_sprites(&group.name).await?,
        })
    }

    async fn mapbox_style(&self, layers: &[SourceLayer]) -> PublishResult<MapboxOutput> {
        let mut sources = Map::new();
        let mut style_layers = Vec::new();
        let mut warnings = Vec::new();

        for layer in layers {
            match self.read_mapbox(&layer.name).await? {
                Some(style) => {
                    let document = style.document();
                    if let Some(own) = document.get("sources").and_then(Value::as_object) {
                        sources.extend(own.clone());
                    }
                    if let Some(own) = document.get("layers").and_then(Value::as_array) {
                        style_layers.extend(own.iter().cloned());
                    }
                }
                None => {
                    warnings.push(format!("No Mapbox style for layer '{}', source only", layer.name));
                    sources.insert(layer.name.clone(), json!({"type": "geojson", "data": {}}));
                }
            }
        }

        Ok(MapboxOutput {
            style: MapboxStyle::from_value(json!({
                "version": 8,
                "sources": sources,
                "layers": style_layers,
            }))?,
            warnings,
        })
    }
}

fn zip_single_file(source: &Path, entry: &str, dest: &Path) -> PublishResult<()> {
    let content = std::fs::read(source)?;
    let mut writer = ZipWriter::new(File::create(dest)?);
    writer.start_file(entry, SimpleFileOptions::default())?;
    writer.write_all(&content)?;
    writer.finish()?;
    Ok(())
}

// =============================================================================
// Databases
// =============================================================================

/// A configured database whose tables are loaded outside this tool.
pub struct PreloadedDatabase {
    name: String,
    connection: PostgisConnection,
}

#[async_trait]
impl DatabaseProfile for PreloadedDatabase {
    fn connection(&self) -> PostgisConnection {
        self.connection.clone()
    }

    async fn import_layer(&self, layer: &SourceLayer, _fields: Option<&[String]>) -> PublishResult<()> {
        info!(layer = %layer.name, database = %self.name, "Expecting table to be loaded already");
        Ok(())
    }
}

/// Registry holding every database in `config`.
pub fn database_registry(config: &BridgeConfig) -> Arc<dyn DatabaseRegistry> {
    let databases: HashMap<String, Arc<dyn DatabaseProfile>> = config
        .databases
        .iter()
        .map(|entry| {
            let profile: Arc<dyn DatabaseProfile> = Arc::new(PreloadedDatabase {
                name: entry.name.clone(),
                connection: entry.connection.clone(),
            });
            (entry.name.clone(), profile)
        })
        .collect();
    Arc::new(databases)
}

pub fn collaborators(config: &BridgeConfig, data_dir: &Path, styles_dir: &Path) -> Collaborators {
    Collaborators {
        exporter: Arc::new(PrebuiltExporter::new(data_dir)),
        styles: Arc::new(PrebuiltStyles::new(styles_dir)),
        databases: database_registry(config),
    }
}
