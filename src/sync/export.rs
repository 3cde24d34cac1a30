//! Write exported dashboards and rule groups into the working copy.

use std::fs;
use std::path::{Component, Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, warn};

use crate::grafana::{ExportedItem, NamespaceRules, RuleGroup, to_pretty_json};

/// Errors that can occur during export.
#[derive(Error, Diagnostic, Debug)]
pub enum ExportError {
    #[error("Failed to write {}: {source}", .path.display())]
    #[diagnostic(code(grafana_backup::sync::export::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize rule group {namespace}/{group}: {source}")]
    #[diagnostic(code(grafana_backup::sync::export::serialize))]
    Serialize {
        namespace: String,
        group: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Refusing to write outside the repository: {}", .path.display())]
    #[diagnostic(
        code(grafana_backup::sync::export::unsafe_path),
        help("Rename the dashboard, folder or group so its '..' segments do not climb above the repository root.")
    )]
    UnsafePath { path: PathBuf },
}

/// Directory prefixes inside the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportLayout {
    pub dashboard_prefix: String,
    pub alert_rule_prefix: String,
}

impl ExportLayout {
    pub fn new(dashboard_prefix: impl Into<String>, alert_rule_prefix: impl Into<String>) -> Self {
        Self {
            dashboard_prefix: dashboard_prefix.into(),
            alert_rule_prefix: alert_rule_prefix.into(),
        }
    }

    /// `<dashboard_prefix>/<uid>/<title>.json`
    pub fn dashboard_path(&self, item: &ExportedItem) -> PathBuf {
        join_segments(&[
            self.dashboard_prefix.as_str(),
            item.uid.as_str(),
            format!("{}.json", item.title).as_str(),
        ])
    }

    /// `<alert_rule_prefix>/<namespace>/<group>.json`
    pub fn rule_group_path(&self, namespace: &str, group: &RuleGroup) -> PathBuf {
        join_segments(&[
            self.alert_rule_prefix.as_str(),
            namespace,
            format!("{}.json", group.name).as_str(),
        ])
    }
}

/// Join segments as path strings and clean the result lexically.
///
/// A leading `/` inside a segment is just a separator, so a title such as
/// `/var disk usage` stays under its prefix. `..` cancels the previous
/// element; one that climbs above the root is kept for `ensure_contained`
/// to reject.
pub fn join_segments(segments: &[&str]) -> PathBuf {
    let mut parts: Vec<&str> = Vec::new();
    for element in segments.iter().flat_map(|s| s.split('/')) {
        match element {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(&last) if last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Relative paths must stay below the repository root.
fn ensure_contained(path: &Path) -> Result<(), ExportError> {
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || path.as_os_str().is_empty() {
        return Err(ExportError::UnsafePath {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Overwrite `root/relative` with `body`, creating parent directories.
pub fn write_file(root: &Path, relative: &Path, body: &[u8]) -> Result<(), ExportError> {
    ensure_contained(relative)?;
    let target = root.join(relative);

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(&target, body).map_err(|source| ExportError::Io {
        path: target.clone(),
        source,
    })?;

    debug!(path = %relative.display(), bytes = body.len(), "Wrote file");
    Ok(())
}

/// Write every dashboard and rule group under `root`.
///
/// Files are overwritten unconditionally; the returned summary lists every
/// written path, relative to `root`, for staging. An item whose path would
/// leave `root` is skipped with a warning.
pub fn export_all(
    root: &Path,
    layout: &ExportLayout,
    dashboards: &[ExportedItem],
    rules: &NamespaceRules,
) -> Result<ExportSummary, ExportError> {
    let mut summary = ExportSummary::default();

    for item in dashboards {
        let relative = layout.dashboard_path(item);
        match write_file(root, &relative, &item.body) {
            Ok(()) => {
                summary.paths.push(relative);
                summary.dashboards += 1;
            }
            Err(ExportError::UnsafePath { path }) => {
                warn!(uid = %item.uid, path = %path.display(), "Skipping dashboard with unsafe path");
                summary.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    for (namespace, groups) in rules {
        for group in groups {
            let relative = layout.rule_group_path(namespace, group);
            let body = to_pretty_json(group).map_err(|source| ExportError::Serialize {
                namespace: namespace.clone(),
                group: group.name.clone(),
                source,
            })?;
            match write_file(root, &relative, &body) {
                Ok(()) => {
                    summary.paths.push(relative);
                    summary.alert_rule_groups += 1;
                }
                Err(ExportError::UnsafePath { path }) => {
                    warn!(
                        namespace = %namespace,
                        group = %group.name,
                        path = %path.display(),
                        "Skipping rule group with unsafe path"
                    );
                    summary.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(summary)
}

/// Summary of written files.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub dashboards: usize,
    pub alert_rule_groups: usize,
    /// Items not written because their path would leave the repository.
    pub skipped: usize,
    pub paths: Vec<PathBuf>,
}

impl ExportSummary {
    pub fn total(&self) -> usize {
        self.dashboards + self.alert_rule_groups
    }
}
