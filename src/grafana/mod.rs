//! Grafana API access: the HTTP client, response models and the
//! provisioned-dashboard filter.

mod client;
mod error;
mod models;

pub use client::{ALERT_RULE_PATH, DASHBOARD_PATH, GrafanaClient, RetryPolicy, SEARCH_PATH};
pub use error::{GrafanaError, GrafanaResult};
pub use models::{
    DashboardDetail, DashboardMeta, ExportedItem, GrafanaRule, NamespaceRules, RuleGroup,
    RuleNode, SearchResult, to_pretty_json,
};
