//! Ditto Replay Server - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use ditto_replay::{ReplayConfig, ReplayServer, Replayer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "ditto-replay",
    about = "HTTP replay server - answers requests from recorded request/response pairs",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "ditto.yaml")]
    config: PathBuf,

    /// Directory of recording files (overrides the configuration)
    #[arg(short, long, value_name = "DIR")]
    recordings: Option<PathBuf>,

    /// Address to listen on (overrides the configuration)
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and recordings, then exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Print default config if requested
    if args.print_config {
        let default_config = include_str!("../config/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    // Load configuration
    let mut config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        ReplayConfig::from_file(&args.config)?
    } else if args.validate && args.recordings.is_none() {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration");
        ReplayConfig::default()
    };

    if let Some(dir) = args.recordings {
        config.recordings.directory = Some(dir);
    }
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    config.validate()?;

    // Recording failures are fatal at startup
    let replayer = Arc::new(Replayer::from_config(&config).await?);

    let counts = replayer.recording_counts().await;
    let total: usize = counts.iter().map(|(_, n)| n).sum();

    // Validate and exit if requested
    if args.validate {
        println!("Configuration is valid ({} recordings loaded)", total);
        return Ok(());
    }

    for (method, count) in &counts {
        info!(method = %method, recordings = count, "Recordings loaded");
    }
    if total == 0 {
        warn!("No recordings loaded; every request will be answered with 404");
    }

    if config.recordings.reload_on_signal && replayer.can_reload() {
        spawn_reload_on_hangup(Arc::clone(&replayer))?;
    }

    let server = ReplayServer::new(Arc::clone(&replayer))
        .with_request_timeout(config.server.request_timeout());

    tokio::select! {
        result = server.run(config.server.listen) => result?,
        _ = tokio::signal::ctrl_c() => {
            let dispatcher = replayer.dispatcher();
            info!(
                requests = dispatcher.total_requests(),
                matched = dispatcher.total_matched(),
                unmatched = dispatcher.total_unmatched(),
                "Shutting down"
            );
        }
    }

    Ok(())
}

/// Reload recordings whenever the process receives SIGHUP.
#[cfg(unix)]
fn spawn_reload_on_hangup(replayer: Arc<Replayer>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reloading recordings");
            if let Err(err) = replayer.reload().await {
                warn!(error = %err, "Reload failed, keeping previous recordings");
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_replayer: Arc<Replayer>) -> Result<()> {
    warn!("Reload on signal is only supported on unix");
    Ok(())
}
