use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum GrafanaError {
    #[error("Failed to build HTTP client")]
    #[diagnostic(code(grafana_backup::grafana::client))]
    Client {
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} failed")]
    #[diagnostic(
        code(grafana_backup::grafana::connection_failed),
        help("Is GRAFANA_URL reachable from this host?")
    )]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Grafana error ({status}) for {url}: {body}")]
    #[diagnostic(
        code(grafana_backup::grafana::api_error),
        help("A 401 or 403 usually means GRAFANA_TOKEN is invalid or lacks read access.")
    )]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {url}")]
    #[diagnostic(
        code(grafana_backup::grafana::invalid_response),
        help("The server returned data in an unexpected format.")
    )]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize dashboard {uid}")]
    #[diagnostic(code(grafana_backup::grafana::serialize))]
    Serialize {
        uid: String,
        #[source]
        source: serde_json::Error,
    },
}

impl GrafanaError {
    /// Connect failures, timeouts and overload statuses are worth another try.
    pub fn is_transient(&self) -> bool {
        match self {
            GrafanaError::Request { source, .. } => source.is_connect() || source.is_timeout(),
            GrafanaError::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}

pub type GrafanaResult<T> = Result<T, GrafanaError>;
