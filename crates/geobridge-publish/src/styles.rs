//! # Style Publisher
//!
//! Uploads converter output as workspace styles.
//!
//! ```text
//! layer style     zipped SLD    PUT styles/{name}        when it exists
//!                               POST styles?name={name}  otherwise
//!
//! group style     Mapbox GL     purge old style
//!                               POST <style> descriptor (text/xml)
//!                               PUT styles/{name}?raw=true (mbstyle)
//!                               PUT 4 sprite files into the resource store
//!
//! session style   Mapbox GL     sources rewritten to WMTS vector tiles,
//!                               written to style.mapbox, uploaded as mb_{ws}
//! ```

use std::path::Path;
use tracing::{debug, info, warn};

use geobridge_core::mapbox::MapboxStyle;
use geobridge_core::resources::StyleDescriptor;
use geobridge_core::{LayerGroup, SourceLayer, MBSTYLE_CONTENT_TYPE};

use crate::catalog::Catalog;
use crate::collaborators::{SpriteSheet, StyleConverter};
use crate::error::PublishResult;
use crate::transport::{RequestBody, CONTENT_TYPE_JSON, CONTENT_TYPE_XML, CONTENT_TYPE_ZIP};

/// Prefix of the combined vector-tile style, followed by the workspace.
pub const SESSION_STYLE_PREFIX: &str = "mb_";

/// Local copy of the combined style, kept in the session directory.
pub const SESSION_STYLE_FILE: &str = "style.mapbox";

/// Name of the combined style for `workspace`.
pub fn session_style_name(workspace: &str) -> String {
    format!("{}{}", SESSION_STYLE_PREFIX, workspace)
}

fn log_warnings(item: &str, warnings: &[String]) {
    for warning in warnings {
        warn!(%item, %warning, "Style conversion warning");
    }
}

pub(crate) struct StylePublisher<'a> {
    catalog: &'a mut Catalog,
    converter: &'a dyn StyleConverter,
    work_dir: &'a Path,
}

impl<'a> StylePublisher<'a> {
    pub fn new(catalog: &'a mut Catalog, converter: &'a dyn StyleConverter, work_dir: &'a Path) -> Self {
        StylePublisher {
            catalog,
            converter,
            work_dir,
        }
    }

    /// Converts and uploads the style named after `layer`.
    pub async fn publish_layer_style(&mut self, layer: &SourceLayer) -> PublishResult<Vec<String>> {
        let dest = self.work_dir.join(format!("{}.zip", layer.name));
        let warnings = self.converter.zipped_style(layer, &dest).await?;
        log_warnings(&layer.name, &warnings);

        let data = tokio::fs::read(&dest).await?;
        self.upload_style(&layer.name, RequestBody::bytes(data, CONTENT_TYPE_ZIP))
            .await?;
        info!(style = %layer.name, "Layer style published");
        Ok(warnings)
    }

    /// Creates or replaces a style body.
    pub async fn upload_style(&mut self, name: &str, body: RequestBody) -> PublishResult<()> {
        let endpoints = self.catalog.endpoints().clone();
        if self.catalog.style_exists(name).await? {
            debug!(style = %name, "Replacing existing style");
            self.catalog.put(&endpoints.style(name), body).await?;
        } else {
            self.catalog.post(&endpoints.style_create(name), body).await?;
        }
        Ok(())
    }

    /// Publishes the Mapbox style of one layer group, sprites included.
    pub async fn publish_group_style(
        &mut self,
        group: &LayerGroup,
        layers: &[SourceLayer],
    ) -> PublishResult<Vec<String>> {
        let endpoints = self.catalog.endpoints().clone();
        let converted = self
            .converter
            .group_style(group, layers, endpoints.base(), endpoints.workspace_name())
            .await?;
        log_warnings(&group.name, &converted.warnings);

        self.catalog.delete_style(&group.name).await?;

        let descriptor = StyleDescriptor::mbstyle(&group.name, endpoints.workspace_name()).to_xml()?;
        self.catalog
            .post(&endpoints.styles(), RequestBody::text(descriptor, CONTENT_TYPE_XML))
            .await?;
        self.catalog
            .put(
                &endpoints.style_raw(&group.name),
                RequestBody::text(converted.style.to_json(), MBSTYLE_CONTENT_TYPE),
            )
            .await?;

        if let Some(sheet) = converted.sprite_sheet {
            self.upload_sprites(sheet).await?;
        }

        info!(group = %group.name, "Group style published");
        Ok(converted.warnings)
    }

    async fn upload_sprites(&self, sheet: SpriteSheet) -> PublishResult<()> {
        let endpoints = self.catalog.endpoints();
        let files = [
            ("spriteSheet.png", RequestBody::bytes(sheet.png, "image/png")),
            ("spriteSheet@2x.png", RequestBody::bytes(sheet.png2x, "image/png")),
            ("spriteSheet.json", RequestBody::text(sheet.json, CONTENT_TYPE_JSON)),
            ("spriteSheet@2x.json", RequestBody::text(sheet.json2x, CONTENT_TYPE_JSON)),
        ];
        for (file_name, body) in files {
            self.catalog
                .upload_resource(&endpoints.sprite_resource(file_name), body)
                .await?;
        }
        Ok(())
    }

    /// Publishes the combined vector-tile style for `layers` as `mb_{ws}`.
    pub async fn publish_session_style(
        &mut self,
        layers: &[SourceLayer],
    ) -> PublishResult<(MapboxStyle, Vec<String>)> {
        let output = self.converter.mapbox_style(layers).await?;
        let name = session_style_name(self.catalog.workspace());
        log_warnings(&name, &output.warnings);

        let mut style = output.style;
        style.rewrite_sources_as_vector_tiles(self.catalog.endpoints())?;

        let json = style.to_json();
        tokio::fs::write(self.work_dir.join(SESSION_STYLE_FILE), &json).await?;
        self.upload_style(&name, RequestBody::text(json, MBSTYLE_CONTENT_TYPE))
            .await?;

        info!(style = %name, layers = layers.len(), "Vector tile style published");
        Ok((style, output.warnings))
    }
}
