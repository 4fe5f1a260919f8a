//! Publish manifest: which project, which layers, where the local files are.
//!
//! ```toml
//! project = "projects/roads.qgz"
//! data_dir = "exports"
//! styles_dir = "styles"
//!
//! [plan]
//! only_symbology = false
//!
//! [[plan.layers]]
//! name = "streets"
//! source = "/data/streets.shp"
//! type = "vector"
//! feature_count = 1200
//!
//! [[plan.groups]]
//! name = "transport"
//! layers = ["streets"]
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use geobridge_publish::PublishPlan;

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Project file; its name becomes the workspace name.
    pub project: PathBuf,

    /// Pre-exported layer files (`.gpkg`, `.shp` + parts, `.tif`).
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Converted styles: `{layer}.zip` or `{layer}.sld`, `{name}.mbstyle.json`.
    #[serde(default)]
    pub styles_dir: Option<PathBuf>,

    #[serde(default)]
    pub plan: PublishPlan,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;

        let mut manifest: Manifest = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("parsing manifest {}", path.display()))?,
            _ => toml::from_str(&text).with_context(|| format!("parsing manifest {}", path.display()))?,
        };

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        manifest.resolve_paths(base);
        Ok(manifest)
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.project = base.join(&self.project);
        self.data_dir = self.data_dir.as_ref().map(|dir| base.join(dir));
        self.styles_dir = self.styles_dir.as_ref().map(|dir| base.join(dir));
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| self.project_dir())
    }

    pub fn styles_dir(&self) -> PathBuf {
        self.styles_dir.clone().unwrap_or_else(|| self.project_dir())
    }

    fn project_dir(&self) -> PathBuf {
        self.project
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
