//! Shapes of the Grafana API responses this tool reads.
//!
//! Alert rule types model the fields Grafana's ruler API documents and keep
//! everything else in a flattened map, so a group written back to disk
//! carries every field the server sent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Entry of `GET /api/search/?type=dash-db`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub uid: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardMeta {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub provisioned: bool,
}

/// Response of `GET /api/dashboards/uid/{uid}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardDetail {
    #[serde(default)]
    pub meta: DashboardMeta,
    pub dashboard: Value,
}

impl DashboardDetail {
    /// Provisioned dashboards are owned by file or API provisioning and must
    /// not get a second source of truth in the backup repository.
    pub fn is_provisioned(&self) -> bool {
        self.meta.provisioned
    }
}

/// A dashboard ready to be written: identity plus pretty-printed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedItem {
    pub uid: String,
    pub title: String,
    pub body: Vec<u8>,
}

impl ExportedItem {
    /// Projects a search hit and its detail into an exported item.
    ///
    /// Returns `Ok(None)` for provisioned dashboards.
    pub fn project(
        search: &SearchResult,
        detail: &DashboardDetail,
    ) -> Result<Option<Self>, serde_json::Error> {
        if detail.is_provisioned() {
            return Ok(None);
        }
        Ok(Some(Self {
            uid: search.uid.clone(),
            title: search.title.clone(),
            body: to_pretty_json(&detail.dashboard)?,
        }))
    }
}

/// Two-space indented JSON. Object keys come out sorted, so unchanged
/// upstream state always serializes to the same bytes.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(value)
}

/// Response of `GET /api/ruler/grafana/api/v1/rules`: namespace to groups.
pub type NamespaceRules = BTreeMap<String, Vec<RuleGroup>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_tenants: Vec<String>,
    #[serde(default)]
    pub rules: Vec<RuleNode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleNode {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub record: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alert: String,
    #[serde(default)]
    pub expr: String,
    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub for_duration: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grafana_alert: Option<GrafanaRule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Grafana-managed alert definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrafanaRule {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "orgId", default)]
    pub org_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(rename = "intervalSeconds", default)]
    pub interval_seconds: i64,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub namespace_uid: String,
    #[serde(default)]
    pub namespace_id: i64,
    #[serde(default)]
    pub rule_group: String,
    #[serde(default)]
    pub no_data_state: String,
    #[serde(default)]
    pub exec_err_state: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provenance: String,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
