use clap::{Parser, Subcommand};
use prompt_composer::compiler::loader::{load_config_from_yaml, load_prompt_from_yaml};
use prompt_composer::config::ComposerConfig;
use prompt_composer::dsl::{Overrides, PromptDocument};
use prompt_composer::runtime::engine::Engine;
use prompt_composer::runtime::sampler::ValueSelection;
use prompt_composer::sources::{DirectoryExtensionSource, ExtensionSource, HttpExtensionSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::Result;
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Session config (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding extension files (<name>.yaml / .json)
    #[arg(long, global = true)]
    extensions: Option<PathBuf>,

    /// Base URL serving <name>.json extension files
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every block for one composition
    Resolve {
        /// Path to the prompt YAML file
        #[arg(long, short)]
        file: PathBuf,

        /// Composition id
        #[arg(long, default_value_t = 0)]
        id: u64,

        /// Pinned value (scope:name=value, scope is a block path or *)
        #[arg(long, short = 'P', value_parser = parse_pin)]
        pin: Vec<(String, String, String)>,
    },

    /// Print the deduplicated terminal outputs of one composition
    Outputs {
        #[arg(long, short)]
        file: PathBuf,

        #[arg(long, default_value_t = 0)]
        id: u64,

        #[arg(long, short = 'P', value_parser = parse_pin)]
        pin: Vec<(String, String, String)>,
    },

    /// Evenly sample the composition space around an id
    Sample {
        #[arg(long, short)]
        file: PathBuf,

        /// Number of samples (defaults to the config's sample_size)
        #[arg(long, short)]
        n: Option<u64>,

        #[arg(long, default_value_t = 0)]
        id: u64,
    },

    /// Count compositions whose wildcards take only the selected values
    Count {
        #[arg(long, short)]
        file: PathBuf,

        /// Allowed value (name=value), repeatable
        #[arg(long, short = 'S', value_parser = parse_key_val)]
        select: Vec<(String, String)>,
    },

    /// Print total and effective (bucketed) composition counts
    Total {
        #[arg(long, short)]
        file: PathBuf,
    },

    /// Map a bucket composition id to its raw composition id
    Bucket {
        #[arg(long, short)]
        file: PathBuf,

        #[arg(long, default_value_t = 0)]
        id: u64,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s.find('=').ok_or_else(|| format!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn parse_pin(s: &str) -> Result<(String, String, String), String> {
    let (scope, rest) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid scope:name=value: no `:` found in `{}`", s))?;
    let (name, value) = parse_key_val(rest)?;
    Ok((scope.to_string(), name, value))
}

fn overrides_from(pins: Vec<(String, String, String)>) -> Overrides {
    let mut overrides = Overrides::new();
    for (scope, name, value) in pins {
        overrides.pin(&scope, name, value);
    }
    overrides
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_engine(cli: &Cli, doc_path: &Path) -> Result<Engine> {
    let config = match &cli.config {
        Some(path) => load_config_from_yaml(path)?,
        None => ComposerConfig::default(),
    };

    let url = cli.url.clone().or_else(|| config.extension_url.clone());
    let source: Arc<dyn ExtensionSource> = match url {
        Some(url) => {
            info!("Extensions from {}", url);
            Arc::new(HttpExtensionSource::new(&url))
        }
        None => {
            let dir = cli
                .extensions
                .clone()
                .or_else(|| config.extension_dir.clone())
                .or_else(|| doc_path.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from("."));
            info!("Extensions from {}", dir.display());
            Arc::new(DirectoryExtensionSource::new(dir))
        }
    };

    Ok(Engine::with_config(source, config))
}

fn load(cli: &Cli, file: &Path) -> Result<(Engine, PromptDocument)> {
    let doc = load_prompt_from_yaml(file)?;
    let engine = build_engine(cli, file)?;
    Ok((engine, doc))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Resolve { file, id, pin } => {
            let (engine, doc) = load(&cli, file)?;
            let pass = engine.resolve(&doc, *id, &overrides_from(pin.clone())).await?;
            print_json(&pass)?;
        }
        Commands::Outputs { file, id, pin } => {
            let (engine, doc) = load(&cli, file)?;
            let outputs = engine.terminal_outputs(&doc, *id, &overrides_from(pin.clone())).await?;
            print_json(&outputs)?;
        }
        Commands::Sample { file, n, id } => {
            let (engine, doc) = load(&cli, file)?;
            let n = n.unwrap_or(engine.config().sample_size);
            let explorations = engine.explore(&doc, n, *id).await?;
            print_json(&explorations)?;
        }
        Commands::Count { file, select } => {
            let (engine, doc) = load(&cli, file)?;
            let mut selected = ValueSelection::new();
            for (name, value) in select {
                selected.entry(name.clone()).or_default().insert(value.clone());
            }
            let matching = engine.count_filtered(&doc, &selected).await?;
            let totals = engine.totals(&doc).await?;
            print_json(&serde_json::json!({
                "matching": matching,
                "total": totals.total,
                "effective_total": totals.effective_total,
            }))?;
        }
        Commands::Total { file } => {
            let (engine, doc) = load(&cli, file)?;
            print_json(&engine.totals(&doc).await?)?;
        }
        Commands::Bucket { file, id } => {
            let (engine, doc) = load(&cli, file)?;
            let raw = engine.bucket_composition(&doc, *id).await?;
            print_json(&serde_json::json!({ "bucket_id": id, "composition_id": raw }))?;
        }
    }

    Ok(())
}
