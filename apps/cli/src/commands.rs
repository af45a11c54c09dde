//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use quire_core::{BuildSummary, Bundle, Engine, ProgressReporter, SilentProgress, init_site};
use quire_shared::{format_timestamp, load_config, now_minute};
use serde_json::Value;
use tracing::info;

use crate::serve;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// quire: assemble content bundles into a static site.
#[derive(Parser)]
#[command(
    name = "quire",
    version,
    about = "Assemble directories of content into bundles and render them into a static site.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Site source directory (holds site.yaml or site.toml).
    #[arg(short, long, default_value = ".", global = true)]
    pub src: PathBuf,

    /// Output directory (overrides the site's `output` setting).
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Assemble every bundle and run the site's pipelines.
    Build {
        /// Build into an existing, non-empty output directory.
        #[arg(short, long)]
        force: bool,
    },

    /// Serve the output directory over HTTP.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
    },

    /// Scaffold a new site.
    Init {
        /// Directory to create.
        name: PathBuf,
    },

    /// Show or change a bundle's metadata.
    Meta {
        /// Bundle key.
        key: String,

        /// Property to show or set.
        prop: Option<String>,

        /// New value (parsed as YAML, so `true`, `3` and `[a, b]` keep their types).
        value: Option<String>,
    },

    /// Stamp a bundle property with the current time.
    Update {
        /// Bundle key.
        key: String,

        /// Property to stamp.
        #[arg(default_value = "updated_time")]
        prop: String,
    },

    /// Mark a bundle as published now.
    Publish {
        /// Bundle key.
        key: String,
    },

    /// List every tag used across bundles.
    Tags,

    /// Show which bundle a file belongs to.
    Which {
        /// File path, relative to the working directory, the site or any bundle root.
        path: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "quire=info,quire_core=info,quire_shared=info",
        1 => "quire=debug,quire_core=debug,quire_shared=debug",
        _ => "quire=trace,quire_core=trace,quire_shared=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let src = cli.src.as_path();
    let output = cli.output.as_deref();
    match &cli.command {
        Command::Build { force } => cmd_build(src, output, *force).await,
        Command::Serve { port, bind } => cmd_serve(src, output, bind, *port).await,
        Command::Init { name } => cmd_init(name).await,
        Command::Meta { key, prop, value } => {
            cmd_meta(src, key, prop.as_deref(), value.as_deref()).await
        }
        Command::Update { key, prop } => cmd_update(src, key, prop).await,
        Command::Publish { key } => cmd_publish(src, key).await,
        Command::Tags => cmd_tags(src).await,
        Command::Which { path } => cmd_which(src, path).await,
        Command::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(src).await,
        },
    }
}

/// Load the site and apply the `--output` override.
fn open_engine(src: &Path, output: Option<&Path>) -> Result<Engine> {
    let mut engine =
        Engine::load(src).wrap_err_with(|| format!("cannot load site at {}", src.display()))?;
    if let Some(out) = output {
        engine.set_output_dir(out);
    }
    Ok(engine)
}

/// Load and assemble the site, for the metadata commands.
fn prepared_engine(src: &Path) -> Result<Engine> {
    let mut engine = open_engine(src, None)?;
    engine.prepare(&SilentProgress)?;
    Ok(engine)
}

fn bundle_mut<'a>(engine: &'a mut Engine, key: &str) -> Result<&'a mut Bundle> {
    engine
        .bundle_mut(key)
        .ok_or_else(|| eyre!("no bundle with key '{key}'"))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(src: &Path, output: Option<&Path>, force: bool) -> Result<()> {
    let mut engine = open_engine(src, output)?;
    let out = engine.output_dir().to_path_buf();

    let occupied = std::fs::read_dir(&out).is_ok_and(|mut entries| entries.next().is_some());
    if occupied {
        if !force {
            return Err(eyre!(
                "output directory '{}' is not empty; pass --force to build into it",
                out.display()
            ));
        }
        info!(output = %out.display(), "building over existing output");
    }

    info!(src = %src.display(), output = %out.display(), "building site");

    let reporter = CliProgress::new();
    let summary = engine.build(&reporter)?;

    println!();
    println!("  Site built successfully!");
    println!("  Bundles:   {}", summary.bundles);
    println!("  Pipelines: {}", summary.pipelines);
    println!("  Output:    {}", summary.output_dir.display());
    println!("  Time:      {:.1}s", summary.elapsed_ms as f64 / 1000.0);
    println!();

    Ok(())
}

async fn cmd_serve(src: &Path, output: Option<&Path>, bind: &str, port: u16) -> Result<()> {
    let root = match output {
        Some(out) => out.to_path_buf(),
        None => open_engine(src, None)?.output_dir().to_path_buf(),
    };
    if !root.is_dir() {
        return Err(eyre!(
            "nothing to serve: '{}' does not exist (run `quire build` first)",
            root.display()
        ));
    }
    serve::serve(&root, bind, port).await
}

async fn cmd_init(name: &Path) -> Result<()> {
    let path = init_site(name)?;
    println!("Site created at: {}", path.display());
    println!("Build it with:   quire --src {} build", path.display());
    Ok(())
}

async fn cmd_meta(src: &Path, key: &str, prop: Option<&str>, value: Option<&str>) -> Result<()> {
    let mut engine = prepared_engine(src)?;
    let bundle = bundle_mut(&mut engine, key)?;

    match (prop, value) {
        (None, _) => {
            print!("{}", serde_yaml::to_string(&bundle.meta().to_value())?);
        }
        (Some(prop), None) => match bundle.meta().lookup(prop) {
            Some(Value::String(s)) => println!("{s}"),
            Some(other) => println!("{other}"),
            None => return Err(eyre!("bundle '{key}' has no property '{prop}'")),
        },
        (Some(prop), Some(raw)) => {
            let parsed = parse_value(raw);
            bundle.meta_mut().set(prop, parsed.clone());
            let path = bundle.write_meta()?;
            info!(key, prop, value = %parsed, "meta updated");
            println!("{key}: {prop} = {parsed} ({})", path.display());
        }
    }
    Ok(())
}

async fn cmd_update(src: &Path, key: &str, prop: &str) -> Result<()> {
    let mut engine = prepared_engine(src)?;
    let bundle = bundle_mut(&mut engine, key)?;

    let stamp = format_timestamp(&now_minute());
    bundle.meta_mut().set(prop, stamp.clone());
    bundle.write_meta()?;

    println!("{key}: {prop} = {stamp}");
    Ok(())
}

async fn cmd_publish(src: &Path, key: &str) -> Result<()> {
    let mut engine = prepared_engine(src)?;
    let bundle = bundle_mut(&mut engine, key)?;

    let stamp = format_timestamp(&now_minute());
    let meta = bundle.meta_mut();
    meta.set("publish_time", stamp.clone());
    meta.set("updated_time", stamp.clone());
    meta.set("status", "published");
    bundle.write_meta()?;

    info!(key, "bundle published");
    println!("{key}: published at {stamp}");
    Ok(())
}

async fn cmd_tags(src: &Path) -> Result<()> {
    let engine = prepared_engine(src)?;
    for tag in engine.tags() {
        println!("{tag}");
    }
    Ok(())
}

async fn cmd_which(src: &Path, path: &Path) -> Result<()> {
    let engine = prepared_engine(src)?;
    let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let (bundle, file) = engine
        .find_file(&path)
        .ok_or_else(|| eyre!("'{}' does not belong to any bundle", path.display()))?;
    println!("{}\t{}", bundle.key(), file.path.display());
    Ok(())
}

async fn cmd_config_show(src: &Path) -> Result<()> {
    let config = load_config(src)?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

/// Interpret a command-line value as YAML, falling back to a plain string.
fn parse_value(raw: &str) -> Value {
    serde_yaml::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn bundle_assembled(&self, key: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Assembling [{current}/{total}] {key}"));
    }

    fn done(&self, _summary: &BuildSummary) {
        self.spinner.finish_and_clear();
    }
}
