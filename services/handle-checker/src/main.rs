//! Handle availability checker
//!
//! Single-binary batch run that:
//! 1. Loads account credentials and tunables from TOML
//! 2. Reads a list of candidate handles
//! 3. Spreads the checks across every enabled account, backing off on rate limits
//! 4. Appends available handles to the output file as they are found
//! 5. Prints a JSON run summary to stdout

mod config;
mod error;
mod handles;
mod metrics;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use handle_pool::{Distributor, FileSink, RunReport};
use probe::HttpProbe;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, ProbeConfig};

/// Exit code when no enabled account is left to run with.
const EXIT_NO_CREDENTIALS: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(handle_pool::Error::NoEligibleCredentials { configured }) =
                e.downcast_ref::<handle_pool::Error>()
            {
                error!(configured, "no enabled accounts, nothing to do");
                return ExitCode::from(EXIT_NO_CREDENTIALS);
            }
            error!(error = format!("{e:#}"), "handle-checker failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    info!("starting handle-checker");

    // CLI: simple --config / --handles flag parsing
    let args: Vec<String> = std::env::args().collect();
    let config_path = Config::resolve_path(flag_value(&args, "--config"));
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.probe.base_url,
        proxy = config.probe.proxy_url.is_some(),
        accounts = config.accounts.len(),
        enabled = config.accounts.iter().filter(|a| a.enabled).count(),
        "configuration loaded"
    );

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {e}"))?;

    let handles_path = flag_value(&args, "--handles")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.checker.handles_file.clone());
    let handles = handles::load_handles(&handles_path).await?;
    info!(
        path = %handles_path.display(),
        candidates = handles.len(),
        "handle list loaded"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let run_id = format!("run_{}", uuid::Uuid::new_v4().as_simple());
    let report = check_handles(&config, handles, cancel)
        .instrument(info_span!("run", %run_id))
        .await?;

    println!("{}", serde_json::to_string_pretty(&report.to_json())?);

    if let Some(ref path) = config.checker.metrics_file {
        metrics::write_snapshot(&prometheus, path).await?;
        info!(path = %path.display(), "metrics snapshot written");
    }

    if report.cancelled {
        warn!(pending = report.pending, "run cancelled before completion");
    }
    info!("shutdown complete");
    Ok(())
}

/// Probe every candidate with the configured accounts and write available
/// handles to the output file.
async fn check_handles(
    config: &Config,
    handles: Vec<String>,
    cancel: CancellationToken,
) -> Result<RunReport> {
    let client = build_client(&config.probe)?;
    let probe = Arc::new(HttpProbe::new(client, config.probe.base_url.as_str()));

    let output = &config.checker.output_file;
    let sink = FileSink::open(output)
        .await
        .map_err(|source| error::Error::Output {
            path: output.clone(),
            source,
        })?;

    let distributor = Distributor::new(config.to_settings(), probe, Box::new(sink))?;
    let report = distributor
        .run(handles, config.credentials(), cancel)
        .await?;
    Ok(report)
}

fn build_client(probe: &ProbeConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(ref proxy_url) = probe.proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url)
            .with_context(|| format!("invalid proxy_url {proxy_url}"))?;
        builder = builder.proxy(proxy);
    }
    builder.build().context("failed to build HTTP client")
}

/// Value following `flag` on the command line, if any.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

/// Cancel the run on SIGTERM or SIGINT.
async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, finishing in-flight checks"),
        _ = terminate => info!("received SIGTERM, finishing in-flight checks"),
    }
    cancel.cancel();
}
