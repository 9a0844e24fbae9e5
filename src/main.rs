mod context;
mod logging;
mod notify;
mod settings;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use mercury_logs::StartPosition;

use crate::context::AppContext;
use crate::logging::LogFormat;
use crate::notify::Notifier;
use crate::settings::SettingsStore;

/// Mercury - trade and area notifications from the game client log
#[derive(Parser, Debug)]
#[command(name = "mercury")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (defaults to ~/.mercury/settings.json)
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Client log file to tail, overrides the stored setting
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Poll period in milliseconds, overrides the stored setting
    #[arg(long, value_name = "N")]
    poll_interval_ms: Option<u64>,

    /// Read the whole log instead of only new lines
    #[arg(long)]
    from_start: bool,

    /// Store the command line overrides in the settings file
    #[arg(long)]
    remember: bool,

    /// Diagnostic log format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_tracing(args.log_format, "info")?;

    let result = run_app(args).await;

    if let Err(e) = &result {
        tracing::error!(error = %format!("{:#}", e), "mercury exited with an error");
    }

    result
}

async fn run_app(args: Args) -> Result<()> {
    let store = SettingsStore::load(args.settings.unwrap_or_else(settings::default_path));

    // Command line values apply to this session only, unless remembered
    let mut config = store.tracker_config();
    if let Some(path) = args.log_file {
        if args.remember {
            store.set(settings::LOG_FILE_PATH, path.to_string_lossy().into_owned());
        }
        config.log_file_path = path;
    }
    if let Some(ms) = args.poll_interval_ms {
        if args.remember {
            store.set(settings::POLL_INTERVAL_MS, ms);
        }
        config.poll_interval_ms = ms;
    }
    if args.from_start {
        if args.remember {
            store.set(settings::READ_FROM_START, true);
        }
        config.start_position = StartPosition::Beginning;
    }

    let mut ctx = AppContext::new(store, config.history_capacity)?;
    ctx.attach_notifier(&Notifier::stdout())?;

    let tracker = ctx.start_tracker(&config)?;
    tracing::info!(
        settings = %ctx.settings.path().display(),
        "watching client log, press Ctrl+C to stop"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    let stats = ctx.shutdown(tracker).await?;
    let counts = ctx.history.counts();
    tracing::info!(
        polls = stats.polls,
        lines = stats.lines,
        published = stats.published,
        retained = counts.total(),
        "session summary"
    );
    for (topic, count) in counts.iter() {
        tracing::debug!(topic = %topic, count, "events retained");
    }

    Ok(())
}
