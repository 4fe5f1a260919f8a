//! OpenLayers preview page for the vector-tile style.
//!
//! Two files land next to each other in the workspace resource folder:
//! the static `index.html` bundled with this crate and a `mapbox.js` that
//! applies the published style.

use std::path::Path;
use tracing::info;

use geobridge_core::mapbox::MapboxStyle;

use crate::catalog::Catalog;
use crate::error::PublishResult;
use crate::transport::RequestBody;

const INDEX_HTML: &str = include_str!("../resources/openlayers/index.html");

pub const PREVIEW_PAGE: &str = "index.html";
pub const PREVIEW_SCRIPT: &str = "mapbox.js";

/// Writes the preview files into `dir` and uploads them.
pub(crate) async fn publish_preview(catalog: &Catalog, style: &MapboxStyle, dir: &Path) -> PublishResult<()> {
    let script = style.preview_script();
    tokio::fs::write(dir.join(PREVIEW_SCRIPT), &script).await?;
    tokio::fs::write(dir.join(PREVIEW_PAGE), INDEX_HTML).await?;

    let endpoints = catalog.endpoints();
    catalog
        .upload_resource(
            &endpoints.preview_resource(PREVIEW_PAGE),
            RequestBody::text(INDEX_HTML, "text/html"),
        )
        .await?;
    catalog
        .upload_resource(
            &endpoints.preview_resource(PREVIEW_SCRIPT),
            RequestBody::text(script, "application/javascript"),
        )
        .await?;

    info!(workspace = %catalog.workspace(), "OpenLayers preview published");
    Ok(())
}
