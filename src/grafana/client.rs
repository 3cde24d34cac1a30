use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::error::{GrafanaError, GrafanaResult};
use super::models::{DashboardDetail, ExportedItem, NamespaceRules, SearchResult};
use crate::config::Config;

pub const SEARCH_PATH: &str = "/api/search/";
pub const DASHBOARD_PATH: &str = "/api/dashboards/uid";
pub const ALERT_RULE_PATH: &str = "/api/ruler/grafana/api/v1/rules";

/// Exponential backoff for transient Grafana failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based): `base * 2^attempt`,
    /// capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Read-only client for the Grafana HTTP API.
pub struct GrafanaClient {
    base_url: String,
    token: String,
    client: Client,
    retry: RetryPolicy,
}

impl GrafanaClient {
    pub fn new(
        base_url: &str,
        token: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> GrafanaResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| GrafanaError::Client { source })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
            retry,
        })
    }

    pub fn from_config(config: &Config) -> GrafanaResult<Self> {
        let retry = RetryPolicy {
            max_retries: config.http_max_retries,
            ..RetryPolicy::default()
        };
        Self::new(
            &config.grafana_url,
            &config.grafana_token,
            config.http_timeout(),
            retry,
        )
    }

    /// Get the base URL being used
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create an authenticated GET request builder
    fn get(&self, url: &str) -> RequestBuilder {
        self.client
            .get(url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
    }

    /// GET `path` and decode the JSON body, retrying transient failures.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> GrafanaResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            let error = match self.fetch(&url, query).await {
                Ok(body) => {
                    return serde_json::from_slice(&body)
                        .map_err(|source| GrafanaError::Decode { url, source });
                }
                Err(error) => error,
            };

            if !error.is_transient() || attempt >= self.retry.max_retries {
                return Err(error);
            }

            let delay = self.retry.backoff(attempt);
            attempt += 1;
            warn!(
                url = %url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying Grafana request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One request; the raw body on 2xx, a typed error otherwise.
    async fn fetch(&self, url: &str, query: &[(&str, &str)]) -> GrafanaResult<Vec<u8>> {
        let response = self
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|source| GrafanaError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GrafanaError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| GrafanaError::Request {
                url: url.to_string(),
                source,
            })?;
        Ok(body.to_vec())
    }

    /// List every dashboard (folders excluded).
    pub async fn search_dashboards(&self) -> GrafanaResult<Vec<SearchResult>> {
        self.get_json(SEARCH_PATH, &[("type", "dash-db")]).await
    }

    pub async fn get_dashboard(&self, uid: &str) -> GrafanaResult<DashboardDetail> {
        self.get_json(&format!("{}/{}", DASHBOARD_PATH, uid), &[])
            .await
    }

    /// All Grafana-managed rule groups, keyed by namespace (folder).
    pub async fn get_alert_rules(&self) -> GrafanaResult<NamespaceRules> {
        let rules: NamespaceRules = self.get_json(ALERT_RULE_PATH, &[]).await?;
        info!(
            namespaces = rules.len(),
            groups = rules.values().map(Vec::len).sum::<usize>(),
            "Fetched alert rules"
        );
        Ok(rules)
    }

    /// Fetch every dashboard's detail in turn and keep the ones this tool
    /// owns, i.e. everything not provisioned.
    pub async fn export_dashboards(&self) -> GrafanaResult<Vec<ExportedItem>> {
        let results = self.search_dashboards().await?;
        let mut items = Vec::with_capacity(results.len());

        for result in &results {
            let detail = self.get_dashboard(&result.uid).await?;
            let projected =
                ExportedItem::project(result, &detail).map_err(|source| {
                    GrafanaError::Serialize {
                        uid: result.uid.clone(),
                        source,
                    }
                })?;
            match projected {
                Some(item) => items.push(item),
                None => debug!(uid = %result.uid, title = %result.title, "Skipping provisioned dashboard"),
            }
        }

        info!(
            found = results.len(),
            exported = items.len(),
            "Fetched dashboards"
        );
        Ok(items)
    }
}
