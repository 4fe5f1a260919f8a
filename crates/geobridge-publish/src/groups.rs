//! # Layer Group Composer
//!
//! Publishes a group tree bottom-up so every nested group exists before
//! the group that lists it.
//!
//! ```text
//! G ─┬─ L1              order: G2, G
//!    └─ G2 ── L2
//!
//! per group:  Mapbox style (+ sprites)
//!             delete existing group (rejection ignored)
//!             POST layergroups, PUT layergroups/{name} on rejection
//!             tile cache: add vector-tile MIME type if missing
//! ```

use std::path::Path;
use tracing::{debug, info, warn};

use geobridge_core::mapbox::ensure_vector_tile_format;
use geobridge_core::resources::LayerGroupDef;
use geobridge_core::{LayerGroup, SourceLayer};

use crate::catalog::Catalog;
use crate::collaborators::StyleConverter;
use crate::error::PublishResult;
use crate::styles::StylePublisher;
use crate::transport::{RequestBody, CONTENT_TYPE_XML};

/// What one tree produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GroupOutcome {
    /// Group names, in creation order.
    pub published: Vec<String>,
    pub warnings: Vec<String>,
}

pub(crate) struct GroupComposer<'a> {
    catalog: &'a mut Catalog,
    converter: &'a dyn StyleConverter,
    work_dir: &'a Path,
}

impl<'a> GroupComposer<'a> {
    pub fn new(catalog: &'a mut Catalog, converter: &'a dyn StyleConverter, work_dir: &'a Path) -> Self {
        GroupComposer {
            catalog,
            converter,
            work_dir,
        }
    }

    /// Publishes `group` and every group nested in it.
    pub async fn publish_tree(&mut self, group: &LayerGroup, layers: &[SourceLayer]) -> PublishResult<GroupOutcome> {
        group.validate()?;

        let mut outcome = GroupOutcome::default();
        for current in group.publish_order() {
            let warnings = StylePublisher::new(&mut *self.catalog, self.converter, self.work_dir)
                .publish_group_style(current, layers)
                .await?;
            outcome.warnings.extend(warnings);

            self.publish_group(current).await?;
            self.ensure_tile_format(&current.name).await?;
            outcome.published.push(current.name.clone());
        }
        Ok(outcome)
    }

    async fn publish_group(&self, group: &LayerGroup) -> PublishResult<()> {
        let endpoints = self.catalog.endpoints();
        let url = endpoints.layergroup(&group.name);

        match self.catalog.delete(&url).await {
            Ok(_) => debug!(group = %group.name, "Existing layer group removed"),
            Err(err) if err.is_request_error() => {}
            Err(err) => return Err(err),
        }

        let definition = LayerGroupDef::from_group(group, endpoints.workspace_name()).into_envelope();
        match self.catalog.post_json(&endpoints.layergroups(), &definition).await {
            Ok(_) => {}
            Err(err) if err.is_request_error() => {
                warn!(group = %group.name, error = %err, "Layer group create rejected, updating instead");
                self.catalog.put_json(&url, &definition).await?;
            }
            Err(err) => return Err(err),
        }

        info!(group = %group.name, members = group.layers.len(), "Layer group published");
        Ok(())
    }

    /// Returns whether the tile cache definition had to be updated.
    async fn ensure_tile_format(&self, name: &str) -> PublishResult<bool> {
        let url = self.catalog.endpoints().gwc_layer(name);
        let xml = self.catalog.get(&url).await?.text();

        match ensure_vector_tile_format(&xml) {
            None => Ok(false),
            Some(updated) => {
                self.catalog
                    .put(&url, RequestBody::text(updated, CONTENT_TYPE_XML))
                    .await?;
                debug!(group = %name, "Vector tile format enabled");
                Ok(true)
            }
        }
    }
}
