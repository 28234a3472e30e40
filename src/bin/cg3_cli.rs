//! CG3 CLI - Command-line access to assets and publishing
//!
//! Commands: assets, versions, path, create, new-version, promote, stages, publish
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when a publish run aborts or a stage fails

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::cell::RefCell;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

use cg3_core::{
    logging::{init_logging, DEFAULT_FILTER},
    providers::{attach, JsonTable},
    publish::SceneGraph,
    split_names, Action, AssetContext, AssetCreator, AssetProvider, EventBus, FilesystemProvider,
    FixtureProvider, Playlist, ProjectSettings, Publisher, StageRegistry, TabularProvider,
    UserSettings, VersionSelector,
};

type CliResult = Result<ExitCode, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "cg3-cli")]
#[command(about = "CG3 CLI - Asset versions and publish stages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to project settings JSON (defaults to the one named in user settings)
    #[arg(long)]
    project: Option<PathBuf>,

    /// Path to user settings JSON
    #[arg(long, default_value = "user.json")]
    user: PathBuf,

    /// Source of truth for existing assets
    #[arg(long, value_enum, default_value_t = ProviderKind::Fs)]
    provider: ProviderKind,

    /// Table JSON file for the table provider
    #[arg(long)]
    table: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderKind {
    Fs,
    Fixture,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// List all assets
    Assets,

    /// List the versions of one department
    Versions { name: String, dep: String },

    /// Resolve the path of a version
    Path {
        name: String,
        dep: String,

        /// "latest" or a version number
        #[arg(long, default_value = "latest")]
        version: String,
    },

    /// Create assets from a comma-separated list of names
    Create { kind: String, names: String },

    /// Append the next version of a department
    NewVersion { name: String, dep: String },

    /// Copy a version to the department's release
    Promote {
        name: String,
        dep: String,

        /// "latest" or a version number
        #[arg(long, default_value = "latest")]
        version: String,
    },

    /// List available publish stages
    Stages,

    /// Run a publish playlist against a scene
    Publish {
        /// Scene JSON (SceneGraph)
        #[arg(long)]
        scene: PathBuf,

        /// Playlist JSON
        #[arg(long)]
        playlist: PathBuf,
    },
}

fn load_context(cli: &Cli) -> Result<Arc<AssetContext>, Box<dyn Error>> {
    let user = UserSettings::load(&cli.user)?;
    let project = match cli.project.as_ref().or(user.project_settings.as_ref()) {
        Some(path) => ProjectSettings::load(path)?,
        None => ProjectSettings::default(),
    };
    Ok(AssetContext::new(&project, &user)?)
}

fn open_provider(cli: &Cli) -> Result<Rc<RefCell<dyn AssetProvider>>, Box<dyn Error>> {
    let context = load_context(cli)?;
    let provider: Rc<RefCell<dyn AssetProvider>> = match cli.provider {
        ProviderKind::Fs => Rc::new(RefCell::new(FilesystemProvider::open(context)?)),
        ProviderKind::Fixture => Rc::new(RefCell::new(FixtureProvider::new(context)?)),
        ProviderKind::Table => {
            let path = cli.table.clone().ok_or("--table is required for the table provider")?;
            Rc::new(RefCell::new(TabularProvider::open(context, JsonTable::new(path))?))
        }
    };
    Ok(provider)
}

fn print_json(value: &serde_json::Value) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { DEFAULT_FILTER };
    if let Err(e) = init_logging(filter, true) {
        eprintln!("Logging unavailable: {}", e);
    }

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            let output = json!({ "error": e.to_string() });
            println!("{}", output);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> CliResult {
    match &cli.command {
        Commands::Stages => {
            let registry = StageRegistry::builtin();
            let stages: Vec<_> = [Action::Collect, Action::Check, Action::Export]
                .into_iter()
                .flat_map(|action| registry.list(action))
                .filter_map(|name| registry.get(name))
                .map(|stage| {
                    json!({
                        "name": stage.name(),
                        "label": stage.label(),
                        "action": stage.action(),
                        "description": stage.description(),
                        "parameters": registry.parameters(stage.name()),
                    })
                })
                .collect();
            print_json(&json!(stages))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Publish { scene, playlist } => {
            let scene = SceneGraph::load(scene)?;
            let playlist = Playlist::load(playlist)?;
            let mut publisher = Publisher::default();
            let report = publisher.publish(&playlist, &scene)?;
            print_json(&json!(report))?;
            if report.passed() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(2))
            }
        }

        Commands::Assets => {
            let provider = open_provider(cli)?;
            let provider = provider.borrow();
            print_json(&json!(provider.list_assets()))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Versions { name, dep } => {
            let provider = open_provider(cli)?;
            let provider = provider.borrow();
            let asset = provider.get(name).ok_or_else(|| format!("Unknown asset: {}", name))?;
            print_json(&json!(asset.versions(dep).unwrap_or_default()))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Path { name, dep, version } => {
            let selector: VersionSelector = version.parse()?;
            let provider = open_provider(cli)?;
            let provider = provider.borrow();
            let asset = provider.get(name).ok_or_else(|| format!("Unknown asset: {}", name))?;
            let path = asset.get_version(dep, selector)?;
            print_json(&json!({ "path": path }))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Create { kind, names } => {
            let provider = open_provider(cli)?;
            let creator = AssetCreator::new(provider.borrow().context().clone());
            let bus = EventBus::new();
            attach(&bus, provider.clone());

            let mut created = vec![];
            let mut skipped = vec![];
            for name in split_names(names) {
                match creator.create(&*provider, &bus, kind, &name)? {
                    Some(asset) => created.push(asset.name),
                    None => skipped.push(name),
                }
            }
            print_json(&json!({ "created": created, "skipped": skipped }))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::NewVersion { name, dep } => {
            let provider = open_provider(cli)?;
            let mut provider = provider.borrow_mut();
            let creator = AssetCreator::new(provider.context().clone());
            let asset = provider
                .get_mut(name)
                .ok_or_else(|| format!("Unknown asset: {}", name))?;
            let (version, path) = creator.new_version(asset, dep)?;
            provider.on_version_added(&version)?;
            debug!("Recorded {} {} v{}", name, dep, version.padded());
            print_json(&json!({ "version": version, "path": path }))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Promote { name, dep, version } => {
            let selector: VersionSelector = version.parse()?;
            let provider = open_provider(cli)?;
            let provider = provider.borrow();
            let creator = AssetCreator::new(provider.context().clone());
            let asset = provider.get(name).ok_or_else(|| format!("Unknown asset: {}", name))?;
            let release = creator.promote(asset, dep, selector)?;
            print_json(&json!({ "release": release }))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
