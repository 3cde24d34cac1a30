//! Export metrics for a Prometheus push gateway.
//!
//! Short-lived jobs cannot be scraped, so the run pushes its counts once at
//! the end. A failed push never fails the run.

use std::fmt::Write as _;
use std::time::Duration;

use miette::Diagnostic;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use thiserror::Error;
use tracing::{info, warn};

use crate::sync::SyncReport;

pub const DASHBOARD_EXPORT_TOTAL: &str = "grafana_export_dashboard_export_total";
pub const ALERT_RULE_EXPORT_TOTAL: &str = "grafana_export_alert_rule_export_total";
pub const GIT_STATUS_TOTAL: &str = "grafana_export_git_status_total";

/// Text exposition format understood by the push gateway.
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Error, Diagnostic, Debug)]
pub enum MetricsError {
    #[error("Invalid push gateway URL {url}")]
    #[diagnostic(code(grafana_backup::metrics::invalid_url))]
    InvalidUrl { url: String },

    #[error("Failed to build HTTP client")]
    #[diagnostic(code(grafana_backup::metrics::client))]
    Client {
        #[source]
        source: reqwest::Error,
    },

    #[error("Push to {url} failed")]
    #[diagnostic(code(grafana_backup::metrics::request))]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Push gateway returned {status} for {url}: {body}")]
    #[diagnostic(code(grafana_backup::metrics::status))]
    Status {
        url: String,
        status: u16,
        body: String,
    },
}

/// Counts reported after each run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportMetrics {
    pub dashboards_exported: u64,
    pub alert_rules_exported: u64,
    pub git_status_entries: u64,
}

impl ExportMetrics {
    pub fn from_report(report: &SyncReport) -> Self {
        Self {
            dashboards_exported: report.export.dashboards as u64,
            alert_rules_exported: report.export.alert_rule_groups as u64,
            git_status_entries: report.changed as u64,
        }
    }

    /// Render in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let series = [
            (
                DASHBOARD_EXPORT_TOTAL,
                "Number of grafana dashboard exported",
                "counter",
                self.dashboards_exported,
            ),
            (
                ALERT_RULE_EXPORT_TOTAL,
                "Number of grafana alert rule exported",
                "counter",
                self.alert_rules_exported,
            ),
            (
                GIT_STATUS_TOTAL,
                "Number of item changed on git",
                "gauge",
                self.git_status_entries,
            ),
        ];

        let mut out = String::new();
        for (name, help, kind, value) in series {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} {}", name, kind);
            let _ = writeln!(out, "{} {}", name, value);
        }
        out
    }
}

/// Client for one push gateway job.
pub struct PushGateway {
    url: Url,
    client: Client,
}

impl PushGateway {
    /// Targets `{base_url}/metrics/job/{job}`.
    pub fn new(base_url: &str, job: &str, timeout: Duration) -> Result<Self, MetricsError> {
        let invalid = || MetricsError::InvalidUrl {
            url: base_url.to_string(),
        };
        let mut url = Url::parse(base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["metrics", "job", job]);

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| MetricsError::Client { source })?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Replace the job's metrics with `metrics` (HTTP PUT).
    pub async fn push(&self, metrics: &ExportMetrics) -> Result<(), MetricsError> {
        let url = self.url.to_string();
        let response = self
            .client
            .put(self.url.clone())
            .header(CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)
            .body(metrics.render())
            .send()
            .await
            .map_err(|source| MetricsError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetricsError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Push `metrics`, logging instead of failing.
pub async fn push_best_effort(base_url: &str, job: &str, timeout: Duration, metrics: &ExportMetrics) {
    let result = match PushGateway::new(base_url, job, timeout) {
        Ok(gateway) => gateway.push(metrics).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => info!(job, "Pushed metrics"),
        Err(e) => warn!(job, error = %e, "Metrics push failed"),
    }
}
