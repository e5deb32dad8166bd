use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing::{error, info, warn};

use sp_download::core::cleanup::clean_up_after;
use sp_download::utils::{ensure_dir_exists, init_tracing};
use sp_download::{
    build_orchestrator, load_catalog, AppConfig, EpisodeId, ProcessRunner, RunSummary, Tools,
    NAME, VERSION,
};

/// Download episodes and merge their language tracks into one file each
#[derive(Parser, Debug)]
#[command(name = "sp-download", version, about)]
#[command(group(ArgGroup::new("target").required(true).multiple(true).args(["episode", "season"])))]
struct Cli {
    /// Also download the german version and add it as an audio track
    #[arg(short, long)]
    multilanguage: bool,

    /// Download a specific episode, e.g. 02:03
    #[arg(short, long, value_name = "SS:EE")]
    episode: Option<EpisodeId>,

    /// Download a whole season
    #[arg(short, long)]
    season: Option<u32>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to download and merge in
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// Refetch the episode list even if the cache is fresh
    #[arg(long)]
    refresh_catalog: bool,

    /// Keep intermediate files
    #[arg(long)]
    no_cleanup: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(summary) if summary.has_failures() => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<RunSummary> {
    let (mut config, origin) = AppConfig::load_with_origin(cli.config.as_deref())?;
    init_tracing(&config.log_level);
    info!("📚 {} v{}", NAME, VERSION);
    info!("{}", origin);

    if cli.multilanguage {
        config.download.multilanguage = true;
    }
    if let Some(dir) = cli.work_dir {
        config.work_dir = dir;
    }
    config.validate().context("Invalid configuration")?;
    ensure_dir_exists(&config.work_dir)
        .with_context(|| format!("Failed to create work directory {:?}", config.work_dir))?;

    let tools = Tools::locate(&config).context("Required tool missing")?;

    let catalog = match load_catalog(&config, cli.refresh_catalog).await {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!("Episode list unavailable ({}), using built-in defaults", e);
            None
        }
    };

    let orchestrator = build_orchestrator(&config, &tools, Arc::new(ProcessRunner), catalog);
    let mut summary = RunSummary::default();

    if let Some(id) = cli.episode {
        summary.record(&orchestrator.download_episode(id).await);
    }

    if let Some(season) = cli.season {
        summary.extend(&orchestrator.download_season(season).await);
    }

    if config.cleanup.enabled && !cli.no_cleanup {
        clean_up_after(
            &config.work_dir,
            &config.cleanup.patterns,
            &summary.outputs,
            Duration::from_secs(config.cleanup.delay_secs),
        )
        .await;
    }

    summary.log();
    Ok(summary)
}
