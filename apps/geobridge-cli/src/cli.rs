//! Command-line arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Publish project layers, styles and groups to GeoServer.
#[derive(Debug, Parser)]
#[command(name = "geobridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file; defaults to the per-user config directory.
    #[arg(long, global = true, env = "GEOBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server name from the config file.
    #[arg(long, short = 's', global = true)]
    pub server: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Publish everything a manifest describes.
    Publish(PublishArgs),
    /// Run the pre-publish checks only.
    Validate(ManifestArgs),
    /// Check that the server answers.
    TestConnection,
    /// List the layers of a project's workspace.
    Layers(ProjectArgs),
    /// List enabled PostGIS datastores across all workspaces.
    Datastores,
    /// Register a configured database as a datastore in a project's workspace.
    AddDatastore(AddDatastoreArgs),
    /// Attach an ISO 19115 metadata link to a published layer.
    MetadataLink(MetadataLinkArgs),
    /// Remove layers and their styles from a project's workspace.
    Unpublish(UnpublishArgs),
    /// Print a WMS preview URL for published layers.
    PreviewUrl(PreviewUrlArgs),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct ManifestArgs {
    /// Publish manifest (TOML or JSON).
    pub manifest: PathBuf,
}

#[derive(Debug, Args)]
pub struct PublishArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Delete remote layers missing from the manifest without asking.
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Replace styles only; keep the workspace and its data.
    #[arg(long)]
    pub only_symbology: bool,
}

#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Project file; its name is the workspace name.
    #[arg(long, short = 'p')]
    pub project: PathBuf,
}

#[derive(Debug, Args)]
pub struct AddDatastoreArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Database name from the config file.
    #[arg(long)]
    pub database: String,

    /// Datastore name; defaults to the database name.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Args)]
pub struct MetadataLinkArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[arg(long, short = 'l')]
    pub layer: String,

    /// Metadata record URL.
    #[arg(long)]
    pub url: String,
}

#[derive(Debug, Args)]
pub struct UnpublishArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[arg(required = true)]
    pub layers: Vec<String>,
}

#[derive(Debug, Args)]
pub struct PreviewUrlArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[arg(required = true)]
    pub layers: Vec<String>,

    /// `minx,miny,maxx,maxy`
    #[arg(long, default_value = "-180,-90,180,90")]
    pub bbox: String,

    #[arg(long, default_value = "EPSG:4326")]
    pub srs: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_flags() {
        let cli = Cli::parse_from([
            "geobridge",
            "--server",
            "staging",
            "publish",
            "site.toml",
            "--yes",
            "--format",
            "json",
        ]);

        assert_eq!(cli.server.as_deref(), Some("staging"));
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Publish(args) => {
                assert_eq!(args.manifest.manifest, PathBuf::from("site.toml"));
                assert!(args.yes);
                assert!(!args.only_symbology);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unpublish_needs_layers() {
        assert!(Cli::try_parse_from(["geobridge", "unpublish", "-p", "a.qgz"]).is_err());

        let cli = Cli::try_parse_from(["geobridge", "unpublish", "-p", "a.qgz", "roads", "rivers"]).unwrap();
        match cli.command {
            Commands::Unpublish(args) => assert_eq!(args.layers, vec!["roads", "rivers"]),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_preview_defaults() {
        let cli = Cli::parse_from(["geobridge", "preview-url", "-p", "a.qgz", "roads"]);
        match cli.command {
            Commands::PreviewUrl(args) => {
                assert_eq!(args.bbox, "-180,-90,180,90");
                assert_eq!(args.srs, "EPSG:4326");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
