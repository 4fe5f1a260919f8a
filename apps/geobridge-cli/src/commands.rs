//! Command handlers.
//!
//! Each handler returns `Ok(false)` when the command ran but the outcome was
//! a failure the user should see in the exit code.

use anyhow::{Context as _, Result};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use geobridge_core::resources::DataStore;
use geobridge_publish::{BridgeConfig, HttpTransport, PublishSession, RestClient, ServerEntry};

use crate::cli::{
    AddDatastoreArgs, Cli, ManifestArgs, MetadataLinkArgs, OutputFormat, ProjectArgs, PublishArgs,
    PreviewUrlArgs, UnpublishArgs,
};
use crate::local;
use crate::manifest::Manifest;

/// Settings shared by every command.
pub struct Context {
    pub config: BridgeConfig,
    pub server: Option<String>,
    pub format: OutputFormat,
}

impl Context {
    pub fn load(cli: &Cli) -> Result<Self> {
        let config = BridgeConfig::load(cli.config.clone()).context("loading configuration")?;
        Ok(Context {
            config,
            server: cli.server.clone(),
            format: cli.format,
        })
    }

    fn server(&self) -> Result<&ServerEntry> {
        Ok(self.config.server(self.server.as_deref())?)
    }

    fn client(&self, server: &ServerEntry) -> Result<Arc<dyn RestClient>> {
        let transport = HttpTransport::new(&self.config.transport(), server.credentials())
            .context("building HTTP client")?;
        Ok(Arc::new(transport))
    }

    /// Session whose local files live next to the project.
    fn project_session(&self, project: Option<&Path>) -> Result<PublishSession> {
        let dir = project
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.session(project.map(Path::to_path_buf), &dir, &dir)
    }

    fn session(&self, project: Option<PathBuf>, data_dir: &Path, styles_dir: &Path) -> Result<PublishSession> {
        let server = self.server()?;
        let session = PublishSession::new(
            server.profile(),
            project,
            self.client(server)?,
            local::collaborators(&self.config, data_dir, styles_dir),
        );
        info!(session = %session.id(), server = %server.name, workspace = session.workspace(), "Session opened");
        Ok(session)
    }

    fn manifest_session(&self, manifest: &Manifest) -> Result<PublishSession> {
        self.session(
            Some(manifest.project.clone()),
            &manifest.data_dir(),
            &manifest.styles_dir(),
        )
    }

    fn print<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Text => println!("{}", text()),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        }
        Ok(())
    }
}

fn ask_user(workspace: &str, layers: &[String]) -> bool {
    eprintln!(
        "Publishing will delete these layers from workspace '{}':\n  {}",
        workspace,
        layers.join("\n  ")
    );
    eprint!("Continue? [y/N] ");
    if std::io::stderr().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn print_errors(errors: &[String]) {
    for error in errors {
        eprintln!("error: {}", error);
    }
}

// =============================================================================
// Publishing
// =============================================================================

pub async fn publish(ctx: &Context, args: PublishArgs) -> Result<bool> {
    let manifest = Manifest::load(&args.manifest.manifest)?;
    let mut plan = manifest.plan.clone();
    plan.only_symbology |= args.only_symbology;

    let mut session = ctx.manifest_session(&manifest)?;

    let errors = if args.yes {
        let accept = |_: &str, _: &[String]| true;
        session
            .validate_before_publication(&plan.layer_names(), &accept)
            .await
    } else {
        session
            .validate_before_publication(&plan.layer_names(), &ask_user)
            .await
    };
    if !errors.is_empty() {
        print_errors(&errors);
        return Ok(false);
    }

    let report = session.publish_all(&plan).await.context("publishing")?;
    ctx.print(&report, || report.to_string())?;
    Ok(report.is_success())
}

pub async fn validate(ctx: &Context, args: ManifestArgs) -> Result<bool> {
    let manifest = Manifest::load(&args.manifest)?;
    let mut session = ctx.manifest_session(&manifest)?;

    // Nothing is deleted here, so the question is answered with "no".
    let decline = |workspace: &str, layers: &[String]| {
        warn!(workspace, layers = ?layers, "Layers would be deleted by publishing");
        false
    };
    let errors = session
        .validate_before_publication(&manifest.plan.layer_names(), &decline)
        .await;

    ctx.print(&errors, || {
        if errors.is_empty() {
            "Ready to publish".to_string()
        } else {
            errors.join("\n")
        }
    })?;
    Ok(errors.is_empty())
}

// =============================================================================
// Catalog
// =============================================================================

pub async fn test_connection(ctx: &Context) -> Result<bool> {
    let session = ctx.project_session(None)?;
    let ok = session.test_connection().await;
    ctx.print(&ok, || {
        if ok {
            format!("Connected to {}", session.profile().url())
        } else {
            format!("Could not connect to {}", session.profile().url())
        }
    })?;
    Ok(ok)
}

pub async fn layers(ctx: &Context, args: ProjectArgs) -> Result<bool> {
    let session = ctx.project_session(Some(&args.project))?;
    let layers = session.layers().await.context("listing layers")?;
    ctx.print(&layers, || layers.join("\n"))?;
    Ok(true)
}

pub async fn datastores(ctx: &Context) -> Result<bool> {
    let session = ctx.project_session(None)?;
    let stores = session
        .postgis_datastores()
        .await
        .context("listing datastores")?;
    ctx.print(&stores, || stores.join("\n"))?;
    Ok(true)
}

pub async fn add_datastore(ctx: &Context, args: AddDatastoreArgs) -> Result<bool> {
    let database = ctx
        .config
        .database(&args.database)
        .with_context(|| format!("no database named '{}' in the configuration", args.database))?;
    let name = args.name.unwrap_or_else(|| database.name.clone());

    let session = ctx.project_session(Some(&args.project.project))?;
    session
        .add_postgis_datastore(DataStore::postgis(name.as_str(), &database.connection))
        .await
        .with_context(|| format!("adding datastore '{}'", name))?;

    ctx.print(&name, || format!("Datastore '{}' added to '{}'", name, session.workspace()))?;
    Ok(true)
}

pub async fn metadata_link(ctx: &Context, args: MetadataLinkArgs) -> Result<bool> {
    let session = ctx.project_session(Some(&args.project.project))?;
    session
        .set_layer_metadata_link(&args.layer, &args.url)
        .await
        .with_context(|| format!("linking metadata for '{}'", args.layer))?;

    let full_name = session.full_layer_name(&args.layer);
    ctx.print(&full_name, || format!("Metadata link set on {}", full_name))?;
    Ok(true)
}

pub async fn unpublish(ctx: &Context, args: UnpublishArgs) -> Result<bool> {
    let mut session = ctx.project_session(Some(&args.project.project))?;
    let mut removed = Vec::new();
    let mut ok = true;

    for layer in &args.layers {
        match session.unpublish_data(layer).await {
            Ok(()) => removed.push(layer.clone()),
            Err(e) => {
                eprintln!("error: {}: {}", layer, e);
                ok = false;
            }
        }
    }

    ctx.print(&removed, || format!("Removed {}", removed.join(", ")))?;
    Ok(ok)
}

pub fn preview_url(ctx: &Context, args: PreviewUrlArgs) -> Result<bool> {
    let session = ctx.project_session(Some(&args.project.project))?;
    let names: Vec<&str> = args.layers.iter().map(String::as_str).collect();
    let url = session.layer_preview_url(&names, &args.bbox, &args.srs);
    ctx.print(&url, || url.clone())?;
    Ok(true)
}
