//! # Mapbox Styles and Vector Tiles
//!
//! Edits applied to converter output before it reaches the server.
//!
//! ## Vector-tile finalization
//! ```text
//! converter style               published style (mb_{ws})
//! ───────────────────────       ─────────────────────────────────────────
//! "sources": {                  "sources": {
//!   "roads": {...geojson...}  →   "roads": {"type": "vector",
//! }                                         "tiles": [WMTS GetTile URL],
//!                                           "minZoom": 0, "maxZoom": 14}
//!                               }
//! ```
//!
//! The tile cache must also advertise the vector-tile MIME type for every
//! layer group; [`ensure_vector_tile_format`] edits its XML definition.

use serde_json::{json, Value};

use crate::endpoints::Endpoints;
use crate::error::{CoreError, CoreResult};
use crate::VECTOR_TILE_MIME;

/// Highest zoom level served from the vector tile cache.
pub const VECTOR_TILE_MAX_ZOOM: u8 = 14;

/// A Mapbox GL style document.
#[derive(Debug, Clone, PartialEq)]
pub struct MapboxStyle {
    document: Value,
}

impl MapboxStyle {
    /// Wraps a style document; it must be a JSON object.
    pub fn from_value(document: Value) -> CoreResult<Self> {
        if !document.is_object() {
            return Err(CoreError::InvalidStyleDocument(
                "style root must be an object".to_string(),
            ));
        }
        Ok(MapboxStyle { document })
    }

    pub fn parse(text: &str) -> CoreResult<Self> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| CoreError::InvalidStyleDocument(e.to_string()))?;
        Self::from_value(document)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Names of the declared sources, in document order.
    pub fn source_names(&self) -> Vec<String> {
        self.document
            .get("sources")
            .and_then(Value::as_object)
            .map(|sources| sources.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Points every source at the server's WMTS vector tiles for
    /// `{ws}:{source}`.
    pub fn rewrite_sources_as_vector_tiles(&mut self, endpoints: &Endpoints) -> CoreResult<()> {
        let sources = self
            .document
            .get_mut("sources")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| CoreError::InvalidStyleDocument("missing 'sources' object".to_string()))?;

        for (name, source) in sources.iter_mut() {
            *source = json!({
                "type": "vector",
                "tiles": [endpoints.wmts_vector_tiles(name)],
                "minZoom": 0,
                "maxZoom": VECTOR_TILE_MAX_ZOOM,
            });
        }
        Ok(())
    }

    pub fn to_json(&self) -> String {
        self.document.to_string()
    }

    /// Script consumed by the bundled OpenLayers preview page.
    pub fn preview_script(&self) -> String {
        format!(
            "var style = {};\nvar map = olms.apply('map', style);",
            self.to_json()
        )
    }
}

/// Adds the vector-tile MIME type to a tile-cache layer definition.
///
/// Returns `None` when the format is already listed, so callers can skip the
/// update entirely. Otherwise the type is inserted at the start of
/// `<mimeFormats>`, creating that element when the definition has none.
pub fn ensure_vector_tile_format(xml: &str) -> Option<String> {
    if xml.contains(VECTOR_TILE_MIME) {
        return None;
    }

    let entry = format!("<string>{}</string>", VECTOR_TILE_MIME);

    if xml.contains("<mimeFormats>") {
        return Some(xml.replacen("<mimeFormats>", &format!("<mimeFormats>{}", entry), 1));
    }
    if xml.contains("<mimeFormats/>") {
        return Some(xml.replacen(
            "<mimeFormats/>",
            &format!("<mimeFormats>{}</mimeFormats>", entry),
            1,
        ));
    }

    // No element at all: append one as the last child of the root
    let close = xml.trim_end().rfind("</")?;
    let mut updated = String::with_capacity(xml.len() + entry.len() + 32);
    updated.push_str(&xml[..close]);
    updated.push_str("<mimeFormats>");
    updated.push_str(&entry);
    updated.push_str("</mimeFormats>");
    updated.push_str(&xml[close..]);
    Some(updated)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServerProfile;

    fn endpoints() -> Endpoints {
        Endpoints::new(&ServerProfile::new("s", "http://geo.test/geoserver"), "ws")
    }

    #[test]
    fn test_sources_rewritten_to_wmts() {
        let mut style = MapboxStyle::parse(
            r#"{"version": 8, "sources": {"roads": {"type": "geojson", "data": {}}}, "layers": []}"#,
        )
        .unwrap();
        style.rewrite_sources_as_vector_tiles(&endpoints()).unwrap();

        let source = &style.document()["sources"]["roads"];
        assert_eq!(source["type"], "vector");
        assert_eq!(source["minZoom"], 0);
        assert_eq!(source["maxZoom"], 14);
        let tile = source["tiles"][0].as_str().unwrap();
        assert!(tile.contains("LAYER=ws:roads"));
        assert!(tile.contains("TILEMATRIXSET=EPSG:900913"));
        assert!(tile.contains("FORMAT=application/vnd.mapbox-vector-tile"));
        assert_eq!(style.document()["version"], 8);
    }

    #[test]
    fn test_style_without_sources_is_rejected() {
        let mut style = MapboxStyle::parse(r#"{"version": 8}"#).unwrap();
        assert!(style.rewrite_sources_as_vector_tiles(&endpoints()).is_err());
        assert!(MapboxStyle::parse("[1, 2]").is_err());
    }

    #[test]
    fn test_preview_script() {
        let style = MapboxStyle::from_value(json!({"version": 8})).unwrap();
        assert_eq!(
            style.preview_script(),
            "var style = {\"version\":8};\nvar map = olms.apply('map', style);"
        );
    }

    #[test]
    fn test_tile_format_already_present() {
        let xml = "<GeoServerLayer><mimeFormats><string>application/vnd.mapbox-vector-tile</string></mimeFormats></GeoServerLayer>";
        assert_eq!(ensure_vector_tile_format(xml), None);
    }

    #[test]
    fn test_tile_format_inserted_into_existing_list() {
        let xml = "<GeoServerLayer><mimeFormats><string>image/png</string></mimeFormats></GeoServerLayer>";
        let updated = ensure_vector_tile_format(xml).unwrap();
        assert_eq!(
            updated,
            "<GeoServerLayer><mimeFormats><string>application/vnd.mapbox-vector-tile</string><string>image/png</string></mimeFormats></GeoServerLayer>"
        );
        assert_eq!(ensure_vector_tile_format(&updated), None);
    }

    #[test]
    fn test_tile_format_element_created() {
        let xml = "<GeoServerLayer><name>ws:G</name></GeoServerLayer>\n";
        let updated = ensure_vector_tile_format(xml).unwrap();
        assert!(updated.starts_with("<GeoServerLayer><name>ws:G</name><mimeFormats><string>"));
        assert!(updated.ends_with("</mimeFormats></GeoServerLayer>\n"));

        let empty = "<GeoServerLayer><mimeFormats/></GeoServerLayer>";
        assert!(ensure_vector_tile_format(empty)
            .unwrap()
            .contains("<mimeFormats><string>application/vnd.mapbox-vector-tile</string></mimeFormats>"));
    }
}
