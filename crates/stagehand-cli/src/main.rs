use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, response::Html, routing::get, Extension, Router};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use handlebars::Handlebars;
use log::{error, info};
use serde_json::json;
use stagehand_core::groups::group_from_value;
use stagehand_core::source;
use stagehand_core::{
    AugmentationRegistry, ClientRuntime, Environment, ExtensionOptions, GroupRegistry,
    HostFramework, LangFromHeader, LoaderExtension, RequestScope, SeedList, StaticRuntime,
    TemplateLocals, DEFAULT_NAMESPACE,
};
use stagehand_server::with_exposure;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;

const PAGE_TEMPLATE: &str = include_str!("../templates/page.hbs");

/// Path the runtime build directory is served under with `--local-runtime`.
const RUNTIME_MOUNT: &str = "/loader";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bootstrap script a page would receive
    Config {
        #[command(flatten)]
        loader: LoaderArgs,

        /// Accept-Language value to resolve the script for
        #[arg(long)]
        lang: Option<String>,
    },

    /// Run a demo app rendering a page with the bootstrap script
    Serve {
        #[command(flatten)]
        loader: LoaderArgs,

        /// Port to listen on
        #[arg(long, default_value_t = 3000)]
        port: u16,

        /// Serve the runtime's build directory from the app instead of the CDN
        #[arg(long)]
        local_runtime: bool,
    },
}

#[derive(Args)]
struct LoaderArgs {
    /// Deployment mode (falls back to STAGEHAND_ENV, then production)
    #[arg(short, long, value_enum)]
    env: Option<EnvironmentArg>,

    /// Preset to apply before the configuration files
    #[arg(short, long)]
    preset: Option<String>,

    /// JSON or YAML configuration files, merged left to right
    #[arg(short, long = "config")]
    config: Vec<PathBuf>,

    /// Module group loaded from a JSON or YAML file (format: name=path)
    #[arg(long)]
    group: Vec<String>,

    /// Seed modules loaded before the loader (comma separated)
    #[arg(long, value_delimiter = ',')]
    seed: Vec<String>,

    /// Global the bootstrap script assigns to
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Assume this runtime version instead of locating an installed package
    #[arg(long)]
    runtime_version: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum EnvironmentArg {
    Development,
    Production,
}

impl From<EnvironmentArg> for Environment {
    fn from(arg: EnvironmentArg) -> Self {
        match arg {
            EnvironmentArg::Development => Environment::Development,
            EnvironmentArg::Production => Environment::Production,
        }
    }
}

impl LoaderArgs {
    fn options(&self) -> ExtensionOptions {
        let mut options = ExtensionOptions::from_env();
        if let Some(env) = self.env {
            options = options.with_environment(env.into());
        }
        if let Some(version) = &self.runtime_version {
            options = options
                .with_runtime_source(Arc::new(StaticRuntime(ClientRuntime::new("yui", version))));
        }
        options
    }

    /// Apply the preset, configuration files and contributors to `extension`.
    async fn prepare(&self, extension: &LoaderExtension) -> Result<()> {
        if let Some(preset) = &self.preset {
            extension
                .apply_preset(preset, None)
                .with_context(|| format!("Failed to apply preset '{}'", preset))?;
        }

        for path in &self.config {
            info!("Merging configuration from {:?}", path);
            let source = source::load_file(path)
                .await
                .with_context(|| format!("Failed to load configuration file {:?}", path))?;
            extension.configure([source])?;
        }

        if !self.group.is_empty() {
            let groups = GroupRegistry::new();
            for entry in &self.group {
                let (name, path) = entry
                    .split_once('=')
                    .with_context(|| format!("Invalid group '{}', expected name=path", entry))?;
                let source = source::load_file(path)
                    .await
                    .with_context(|| format!("Failed to load group file {:?}", path))?;
                groups.register_group(name, group_from_value(source)?)?;
            }
            extension.add_contributor(Arc::new(groups))?;
        }

        if !self.seed.is_empty() {
            let seed = SeedList::new(self.seed.iter().cloned()).context("Invalid seed module")?;
            extension.add_contributor(Arc::new(seed))?;
        }
        extension.add_contributor(Arc::new(LangFromHeader))?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenv().ok();

    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cli = Cli::parse();

    match &cli.command {
        Commands::Config { loader, lang } => print_config(loader, lang.as_deref()).await?,
        Commands::Serve {
            loader,
            port,
            local_runtime,
        } => serve(loader, *port, *local_runtime).await?,
    }

    Ok(())
}

async fn print_config(loader: &LoaderArgs, lang: Option<&str>) -> Result<()> {
    let extension =
        LoaderExtension::new(&loader.options()).context("Failed to set up the loader extension")?;
    loader.prepare(&extension).await?;

    let mut scope = RequestScope::new("/");
    if let Some(lang) = lang {
        scope = scope.with_header("accept-language", lang);
    }

    let snapshot = extension
        .snapshot(&scope)
        .await
        .context("Failed to build the exposure snapshot")?;
    println!("{}", snapshot.to_inline_script(&loader.namespace)?);
    Ok(())
}

struct PageView {
    views: Handlebars<'static>,
    namespace: String,
    title: String,
}

async fn serve(loader: &LoaderArgs, port: u16, local_runtime: bool) -> Result<()> {
    let registry = AugmentationRegistry::install_global(loader.options());
    let framework = HostFramework::new("stagehand-demo");
    registry.patch_framework(&framework);

    let app = framework
        .create_app("demo")
        .context("Failed to create the demo application")?;
    let extension = app
        .extension()
        .context("Demo application was not augmented")?;

    let build_dir = prepare_demo(loader, &extension, local_runtime).await?;

    let mut views = Handlebars::new();
    views
        .register_template_string("page", PAGE_TEMPLATE)
        .context("Failed to compile the page template")?;
    let view = Arc::new(PageView {
        views,
        namespace: loader.namespace.clone(),
        title: format!("{} demo", app.name()),
    });

    let pages = Router::new().route("/", get(page)).with_state(view);
    let mut router = with_exposure(pages, extension);
    if let Some(dir) = build_dir {
        info!("Serving runtime build from {:?} at {}", dir, RUNTIME_MOUNT);
        router = router.nest_service(RUNTIME_MOUNT, ServeDir::new(dir));
    }

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Demo app available at http://localhost:{}", port);
    axum::serve(listener, router).await?;
    Ok(())
}

/// Prepare the demo extension. With `local_runtime` the app origin override
/// goes last so no preset or config file can point the page back at the CDN.
/// Returns the runtime build directory to serve, if any.
async fn prepare_demo(
    loader: &LoaderArgs,
    extension: &LoaderExtension,
    local_runtime: bool,
) -> Result<Option<PathBuf>> {
    loader.prepare(extension).await?;
    if !local_runtime {
        return Ok(None);
    }

    let dir = extension
        .runtime()
        .build_dir()
        .context("--local-runtime needs a runtime installed on disk")?;
    extension.set_core_from_app_origin(RUNTIME_MOUNT)?;
    Ok(Some(dir))
}

async fn page(
    State(view): State<Arc<PageView>>,
    Extension(locals): Extension<TemplateLocals>,
) -> Result<Html<String>, (StatusCode, String)> {
    let bootstrap = locals
        .bootstrap_script(&view.namespace)
        .map_err(internal_error)?
        .unwrap_or_default();
    let state = locals.state().cloned().unwrap_or_default();
    let lang = state["config"]["lang"].as_str().unwrap_or("en").to_string();

    let data = json!({
        "title": view.title,
        "namespace": view.namespace,
        "bootstrap": bootstrap,
        "lang": lang,
        "state": state,
    });
    view.views
        .render("page", &data)
        .map(Html)
        .map_err(internal_error)
}

fn internal_error(err: impl std::fmt::Display) -> (StatusCode, String) {
    error!("Page render failed: {}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
