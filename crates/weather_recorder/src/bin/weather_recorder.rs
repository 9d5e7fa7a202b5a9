use argh::FromArgs;
use std::path::PathBuf;
use tokio::sync::watch;

use weather_recorder::{
    run_cycle, run_schedule, Acquirer, Cadence, Config, HttpSource, Recorder, SaveOutcome,
    SqliteStore,
};

/// Records the latest api.weather.gov observation for a station into SQLite.
#[derive(FromArgs)]
struct Args {
    /// path to the configuration file (optional, uses defaults)
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// SQLite database path, overrides the configured one
    #[argh(option, short = 'd')]
    database: Option<PathBuf>,

    /// run a single cycle and exit
    #[argh(switch)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = argh::from_env();

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading config from: {}", path.display());
            Config::from_file(path)?
        }
        None => {
            log::info!("No config file specified, using defaults");
            Config::default()
        }
    };
    if let Some(database) = args.database {
        config.database_path = Some(database);
    }

    let store = SqliteStore::open(&config.database_path())?;
    match store.latest()? {
        Some(record) => log::info!("Latest recorded observation: {}", record.observation),
        None => log::info!("No observations recorded yet"),
    }
    let recorder = Recorder::new(store);
    let source = HttpSource::new(
        config.observation_url(),
        &config.accept,
        &config.user_agent,
        config.request_timeout(),
    )?;
    log::info!("Station: {}, endpoint: {}", config.station, source.url());

    // Graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, shutting down gracefully...");
        let _ = shutdown_tx.send(());
    })?;

    let mut acquirer =
        Acquirer::new(source, config.retry_policy()).with_shutdown(shutdown_rx.clone());
    log::info!("Retry policy: {:?}", acquirer.policy());

    if args.once {
        match run_cycle(&mut acquirer, &recorder).await {
            Ok(SaveOutcome::Inserted { id }) => log::info!("Recorded new observation {}", id),
            Ok(SaveOutcome::AlreadyRecorded) => log::info!("Observation already recorded"),
            Err(e) => {
                log::error!("Cycle failed: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cadence = Cadence::from_config(config.sample_rate_secs, config.cron.as_deref())?;
    let completed = run_schedule(&mut acquirer, &recorder, &cadence, shutdown_rx).await;
    if let Some(last) = acquirer.last_reading() {
        log::info!("Last reading: {}", last);
    }
    log::info!("Recorder shut down after {} successful cycles", completed);

    Ok(())
}
