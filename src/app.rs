//! One export run, end to end.

use miette::Diagnostic;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, ConfigError};
use crate::grafana::{GrafanaClient, GrafanaError};
use crate::metrics::{ExportMetrics, push_best_effort};
use crate::sync::{Credentials, RealGit, SyncError, SyncManager, SyncReport};

#[derive(Error, Diagnostic, Debug)]
pub enum AppError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Grafana(#[from] GrafanaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sync(#[from] SyncError),
}

/// Initialize tracing subscriber with env filter
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grafana_backup=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// reqwest is built without a bundled TLS provider; install ring once.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

fn git_for(config: &Config) -> RealGit {
    let mut git = RealGit::new();
    if let Some((user, password)) = config.git_credentials() {
        git = git.with_credentials(Credentials::new(user, password));
    }
    if let Some(branch) = config.git_branch() {
        git = git.with_branch(branch);
    }
    git
}

/// Export from Grafana, sync to git, then push metrics if configured.
pub async fn run(config: &Config) -> Result<SyncReport, AppError> {
    config.validate()?;
    install_crypto_provider();

    let grafana = GrafanaClient::from_config(config)?;
    info!(url = %grafana.base_url(), "Exporting from Grafana");
    let dashboards = grafana.export_dashboards().await?;
    let rules = grafana.get_alert_rules().await?;

    let manager = SyncManager::from_config(git_for(config), config);
    let report = manager.sync(&dashboards, &rules)?;

    if let Some(url) = config.push_gateway_url() {
        push_best_effort(
            url,
            config.push_job_name(),
            config.http_timeout(),
            &ExportMetrics::from_report(&report),
        )
        .await;
    }

    Ok(report)
}
