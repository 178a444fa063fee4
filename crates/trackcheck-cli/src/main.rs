use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use track_features::ExtractConfig;
use track_requests::{handle_analyze, AnalyzeRequest, InputPayload, Limits};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// trackcheck: bounded feature extraction for mix feedback.
#[derive(Parser, Debug)]
#[command(name = "trackcheck", version, about = "Extract bounded audio features as JSON")]
struct Cli {
    /// Directory the JSON artifacts are written to
    #[arg(long, global = true, default_value = "outputs")]
    out_dir: PathBuf,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract features from a track (and optionally a reference track)
    Features {
        #[arg(long)]
        input: PathBuf,

        /// Reference track to compare against
        #[arg(long)]
        reference: Option<PathBuf>,

        /// JSON file with extraction overrides; omitted fields keep their defaults
        #[arg(long)]
        config: Option<PathBuf>,

        /// Optional request id echoed into the output
        #[arg(long)]
        request_id: Option<String>,
    },

    /// Print the default extraction config as JSON
    DefaultConfig,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_config(path: &Path) -> Result<ExtractConfig> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed reading config: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid config JSON: {}", path.display()))
}

fn write_artifacts(out_dir: &Path, prefix: &str, artifacts: &[(&str, Value)]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).with_context(|| format!("failed creating {}", out_dir.display()))?;
    let mut written = Vec::with_capacity(artifacts.len());
    for (name, data) in artifacts {
        let p = out_dir.join(format!("{prefix}_{name}.json"));
        fs::write(&p, serde_json::to_string_pretty(data)?).with_context(|| format!("failed writing {}", p.display()))?;
        eprintln!("✓ wrote {}", p.display());
        written.push(p);
    }
    Ok(written)
}

fn run_features(
    out_dir: &Path,
    input: PathBuf,
    reference: Option<PathBuf>,
    config: Option<PathBuf>,
    request_id: Option<String>,
) -> Result<Vec<PathBuf>> {
    let config = config.as_deref().map(read_config).transpose()?;
    let limits = Limits::from_env()?;
    let req = AnalyzeRequest {
        request_id,
        main: InputPayload::Path { path: input },
        reference: reference.map(|path| InputPayload::Path { path }),
        config,
    };
    let resp = handle_analyze(req, &limits)?;

    let mut artifacts = vec![("main", serde_json::to_value(&resp.main)?)];
    if let Some(reference) = &resp.reference {
        artifacts.push(("reference", serde_json::to_value(reference)?));
    }
    let written = write_artifacts(out_dir, &format!("features_{}", resp.request_id), &artifacts)?;
    tracing::info!(request_id = %resp.request_id, files = written.len(), "features written");
    Ok(written)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.cmd {
        Commands::Features { input, reference, config, request_id } => {
            run_features(&cli.out_dir, input, reference, config, request_id)?;
        }
        Commands::DefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&ExtractConfig::default())?);
        }
    }
    Ok(())
}
