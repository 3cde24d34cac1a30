//! Runtime configuration.
//!
//! Every setting comes from the environment; the binary never reads its
//! argument list. The struct is parsed once at startup and passed down by
//! reference.

use std::fmt;
use std::time::Duration;

use clap::Parser;
use miette::Diagnostic;
use thiserror::Error;

/// Commit author used when `GIT_AUTHOR` is unset or empty.
pub const DEFAULT_AUTHOR: &str = "NO BODY";

/// Commit email used when `GIT_AUTHOR_EMAIL` is unset or empty.
pub const DEFAULT_AUTHOR_EMAIL: &str = "no-body@example.com";

/// Push gateway job name used when `PUSH_JOB_NAME` is unset or empty.
pub const DEFAULT_JOB_NAME: &str = "grafana_export";

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("{name} must not be empty")]
    #[diagnostic(
        code(grafana_backup::config::missing),
        help("Export the variable with a non-empty value before running the job.")
    )]
    Missing { name: &'static str },

    #[error("{name} must be greater than zero")]
    #[diagnostic(code(grafana_backup::config::invalid))]
    Invalid { name: &'static str },
}

#[derive(Parser, Clone)]
#[command(name = "grafana-backup")]
#[command(
    author,
    version,
    about = "Export Grafana dashboards and alert rules to a git repository",
    long_about = None
)]
pub struct Config {
    /// Grafana base URL, e.g. https://grafana.example.com
    #[arg(long, env = "GRAFANA_URL")]
    pub grafana_url: String,

    /// Grafana service account token
    #[arg(long, env = "GRAFANA_TOKEN", hide_env_values = true)]
    pub grafana_token: String,

    /// Remote repository the export is committed to
    #[arg(long, env = "GIT_REPO_URL")]
    pub git_repo_url: String,

    /// Basic-auth user for clone and push
    #[arg(long, env = "GIT_USER")]
    pub git_user: Option<String>,

    /// Basic-auth password for clone and push
    #[arg(long, env = "GIT_PASSWD", hide_env_values = true)]
    pub git_password: Option<String>,

    /// Commit author name
    #[arg(long, env = "GIT_AUTHOR")]
    pub git_author: Option<String>,

    /// Commit author email
    #[arg(long, env = "GIT_AUTHOR_EMAIL")]
    pub git_author_email: Option<String>,

    /// Branch to clone and push (defaults to the remote HEAD)
    #[arg(long, env = "GIT_BRANCH")]
    pub git_branch: Option<String>,

    /// Directory dashboards are written under, relative to the repository root
    #[arg(long, env = "DIR_PREFIX")]
    pub dir_prefix: Option<String>,

    /// Directory alert rule groups are written under
    #[arg(long, env = "ALERT_RULE_DIR_PREFIX")]
    pub alert_rule_dir_prefix: Option<String>,

    /// Prometheus push gateway URL; metrics are skipped when unset
    #[arg(long, env = "PUSH_GATEWAY_URL")]
    pub push_gateway_url: Option<String>,

    /// Job name metrics are pushed under
    #[arg(long, env = "PUSH_JOB_NAME")]
    pub push_job_name: Option<String>,

    /// Per-request timeout for HTTP calls, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Retries for transient Grafana failures
    #[arg(long, env = "HTTP_MAX_RETRIES", default_value_t = 3)]
    pub http_max_retries: u32,
}

/// Treats an empty value the same as an unset one.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl Config {
    /// Parse from environment variables alone.
    pub fn from_env() -> Result<Self, clap::Error> {
        Self::try_parse_from(["grafana-backup"])
    }

    /// Reject values that parse but cannot work, such as an exported-but-empty
    /// `GRAFANA_URL`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("GRAFANA_URL", &self.grafana_url),
            ("GRAFANA_TOKEN", &self.grafana_token),
            ("GIT_REPO_URL", &self.git_repo_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing { name });
            }
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "HTTP_TIMEOUT_SECS",
            });
        }
        Ok(())
    }

    pub fn author_name(&self) -> &str {
        non_empty(&self.git_author).unwrap_or(DEFAULT_AUTHOR)
    }

    pub fn author_email(&self) -> &str {
        non_empty(&self.git_author_email).unwrap_or(DEFAULT_AUTHOR_EMAIL)
    }

    /// `(user, password)` when a git user is configured.
    pub fn git_credentials(&self) -> Option<(&str, &str)> {
        non_empty(&self.git_user).map(|user| (user, self.git_password.as_deref().unwrap_or("")))
    }

    pub fn git_branch(&self) -> Option<&str> {
        non_empty(&self.git_branch)
    }

    pub fn dashboard_prefix(&self) -> &str {
        self.dir_prefix.as_deref().unwrap_or("")
    }

    pub fn alert_rule_prefix(&self) -> &str {
        self.alert_rule_dir_prefix.as_deref().unwrap_or("")
    }

    pub fn push_gateway_url(&self) -> Option<&str> {
        non_empty(&self.push_gateway_url)
    }

    pub fn push_job_name(&self) -> &str {
        non_empty(&self.push_job_name).unwrap_or(DEFAULT_JOB_NAME)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("grafana_url", &self.grafana_url)
            .field("grafana_token", &"<redacted>")
            .field("git_repo_url", &self.git_repo_url)
            .field("git_user", &self.git_user)
            .field("git_password", &self.git_password.as_ref().map(|_| "<redacted>"))
            .field("git_author", &self.author_name())
            .field("git_author_email", &self.author_email())
            .field("git_branch", &self.git_branch)
            .field("dir_prefix", &self.dashboard_prefix())
            .field("alert_rule_dir_prefix", &self.alert_rule_prefix())
            .field("push_gateway_url", &self.push_gateway_url)
            .field("push_job_name", &self.push_job_name())
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("http_max_retries", &self.http_max_retries)
            .finish()
    }
}
