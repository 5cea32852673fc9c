// # dnsync - single-pass DNS reconciliation
//
// This binary is a THIN integration layer:
// - All reconciliation logic lives in dnsync-core
// - All wire protocols live in the collaborator crates
//
// The dnsync binary is responsible for:
// 1. Reading its settings from environment variables
// 2. Loading and validating the JSON configuration file
// 3. Building the UniFi source, the Nginx Proxy Manager source and one
//    Pi-hole store per configured target
// 4. Running exactly one reconciliation pass and mapping the outcome to
//    an exit code
//
// ## Environment
//
// - `DNSYNC_CONFIG`: Path to the configuration file (default: `config.json`)
// - `DNSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default: `info`)
//
// ## Example
//
// ```bash
// export DNSYNC_CONFIG=/etc/dnsync/config.json
// dnsync
// ```

use anyhow::{Context, Result};
use dnsync_core::engine::ReconcileEvent;
use dnsync_core::{AppConfig, Error, Reconciler, RecordStore, RunReport};
use dnsync_source_npm::ProxyManagerSource;
use dnsync_source_unifi::UnifiSource;
use dnsync_store_pihole::PiholeStore;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes reported to the scheduler (cron, systemd timer, k8s CronJob)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DnsyncExitCode {
    /// Every target holds the desired record set
    Converged = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// A source could not be read, no target was touched
    SourceError = 2,
    /// At least one target did not converge
    TargetsFailed = 3,
}

impl From<DnsyncExitCode> for ExitCode {
    fn from(code: DnsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Process settings taken from the environment
struct Settings {
    config_path: String,
    log_level: String,
}

impl Settings {
    fn from_env() -> Self {
        Self {
            config_path: env::var("DNSYNC_CONFIG").unwrap_or_else(|_| "config.json".to_string()),
            log_level: env::var("DNSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "DNSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

fn main() -> ExitCode {
    let settings = Settings::from_env();

    let log_level = match settings.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DnsyncExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnsyncExitCode::ConfigError.into();
    }

    let config = match AppConfig::from_file(&settings.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {}", settings.config_path, e);
            return DnsyncExitCode::ConfigError.into();
        }
    };

    log_endpoints(&config);

    let (reconciler, events) = match build_reconciler(&config) {
        Ok(built) => built,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return DnsyncExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DnsyncExitCode::ConfigError.into();
        }
    };

    let code = rt.block_on(async {
        let drain = tokio::spawn(count_events(events));
        let result = reconciler.run().await;
        // Dropping the reconciler closes the event channel
        drop(reconciler);
        if let Ok(Ok(count)) = tokio::time::timeout(Duration::from_secs(1), drain).await {
            tracing::debug!("{} reconcile events emitted", count);
        }
        exit_code(result)
    });

    code.into()
}

/// Log what this run talks to (never credentials)
fn log_endpoints(config: &AppConfig) {
    info!("Starting dnsync");
    info!(
        "UniFi controller: {} (site: {})",
        config.controller.url, config.controller.site
    );
    info!("Nginx Proxy Manager: {}", config.proxy_manager.url);
    for target in &config.targets {
        info!("Pi-hole target: {} ({})", target.name, target.url);
    }
    info!(
        "Local domain: {}, edge host: {}, managed domain: {}",
        config.naming.local_domain, config.naming.edge_host, config.naming.filter_domain
    );
}

fn build_reconciler(config: &AppConfig) -> Result<(Reconciler, mpsc::Receiver<ReconcileEvent>)> {
    let timeout = Duration::from_secs(config.engine.http_timeout_secs);

    let unifi = UnifiSource::new(&config.controller, timeout)
        .context("Failed to create UniFi source")?;
    let npm = ProxyManagerSource::new(&config.proxy_manager, timeout)
        .context("Failed to create Nginx Proxy Manager source")?;

    let mut targets: Vec<Arc<dyn RecordStore>> = Vec::with_capacity(config.targets.len());
    for target in &config.targets {
        let store = PiholeStore::new(&target.name, &target.url, &target.password, timeout)
            .with_context(|| format!("Failed to create Pi-hole target {}", target.name))?;
        targets.push(Arc::new(store));
    }

    let built = Reconciler::new(
        Box::new(unifi),
        Box::new(npm),
        targets,
        config.naming.clone(),
        &config.engine,
    )?;
    Ok(built)
}

async fn count_events(mut events: mpsc::Receiver<ReconcileEvent>) -> usize {
    let mut count = 0;
    while events.recv().await.is_some() {
        count += 1;
    }
    count
}

fn exit_code(result: dnsync_core::Result<RunReport>) -> DnsyncExitCode {
    match result {
        Ok(report) if report.all_converged() => {
            info!("All {} targets converged", report.targets.len());
            DnsyncExitCode::Converged
        }
        Ok(report) => {
            for failed in report.failed() {
                if let Err(e) = &failed.outcome {
                    warn!("{}: {}", failed.target, e);
                }
            }
            error!(
                "{} of {} targets did not converge",
                report.failed().count(),
                report.targets.len()
            );
            DnsyncExitCode::TargetsFailed
        }
        Err(e @ Error::SourceFetch { .. }) => {
            error!("Desired state could not be built: {}", e);
            DnsyncExitCode::SourceError
        }
        Err(e) => {
            error!("Run aborted: {}", e);
            DnsyncExitCode::SourceError
        }
    }
}
