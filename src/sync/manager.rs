//! Sync manager - high-level sync operations.
//!
//! Coordinates the working copy: clone, write, stage, status, commit, push.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use tempfile::TempDir;
use thiserror::Error;
use tracing::info;

use super::export::{ExportError, ExportLayout, ExportSummary, export_all};
use super::git::{Author, GitError, GitOps, parse_status};
use crate::config::Config;
use crate::grafana::{ExportedItem, NamespaceRules};

/// Remote pushed to after a commit.
pub const REMOTE: &str = "origin";

/// Paths per `git add` invocation, keeping argv well under OS limits.
const STAGE_BATCH: usize = 200;

/// Errors that can occur during sync operations.
#[derive(Error, Diagnostic, Debug)]
pub enum SyncError {
    #[error("Failed to create temporary working directory: {0}")]
    #[diagnostic(code(grafana_backup::sync::tempdir))]
    TempDir(#[source] std::io::Error),

    #[error("Can't check out git repository")]
    #[diagnostic(
        code(grafana_backup::sync::clone),
        help("Check GIT_REPO_URL, GIT_USER and GIT_PASSWD.")
    )]
    Clone(#[source] GitError),

    #[error("Commit failed")]
    #[diagnostic(code(grafana_backup::sync::commit))]
    Commit(#[source] GitError),

    #[error("Push to git remote failed")]
    #[diagnostic(
        code(grafana_backup::sync::push),
        help("The local commit is discarded; re-run the job once the remote is reachable.")
    )]
    Push(#[source] GitError),

    #[error("Git error: {0}")]
    #[diagnostic(code(grafana_backup::sync::git))]
    Git(#[from] GitError),

    #[error("Export error: {0}")]
    #[diagnostic(code(grafana_backup::sync::export))]
    Export(#[from] ExportError),
}

/// What the sync did with the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    NothingChanged,
    Pushed,
}

/// Result of one sync.
#[derive(Debug, PartialEq, Eq)]
pub struct SyncReport {
    pub export: ExportSummary,
    /// Working-copy status entries after staging.
    pub changed: usize,
    pub outcome: SyncOutcome,
}

/// `"<N> file(s) content updated."`
pub fn commit_message(changed: usize) -> String {
    format!("{} file(s) content updated.", changed)
}

/// Sync manager handles all sync operations.
pub struct SyncManager<G: GitOps> {
    git: G,
    remote_url: String,
    author: Author,
    layout: ExportLayout,
}

impl<G: GitOps> SyncManager<G> {
    /// Create a new sync manager with the given git operations handler.
    pub fn new(git: G, remote_url: impl Into<String>, author: Author, layout: ExportLayout) -> Self {
        Self {
            git,
            remote_url: remote_url.into(),
            author,
            layout,
        }
    }

    pub fn from_config(git: G, config: &Config) -> Self {
        Self::new(
            git,
            config.git_repo_url.clone(),
            Author::new(config.author_name(), config.author_email()),
            ExportLayout::new(config.dashboard_prefix(), config.alert_rule_prefix()),
        )
    }

    /// Clone the remote into a fresh temporary directory.
    ///
    /// The directory is removed when the returned guard drops.
    pub fn checkout(&self) -> Result<TempDir, SyncError> {
        let workdir = tempfile::Builder::new()
            .prefix("grafana-backup-")
            .tempdir()
            .map_err(SyncError::TempDir)?;

        self.git
            .clone_repo(&self.remote_url, workdir.path())
            .map_err(SyncError::Clone)?;

        info!(path = %workdir.path().display(), "Cloned repository");
        Ok(workdir)
    }

    /// Clone, write the export, and commit + push if anything changed.
    pub fn sync(
        &self,
        dashboards: &[ExportedItem],
        rules: &NamespaceRules,
    ) -> Result<SyncReport, SyncError> {
        let workdir = self.checkout()?;
        self.commit_export(workdir.path(), dashboards, rules)
    }

    /// Write the export into an existing working copy and publish it.
    pub fn commit_export(
        &self,
        workdir: &Path,
        dashboards: &[ExportedItem],
        rules: &NamespaceRules,
    ) -> Result<SyncReport, SyncError> {
        let export = export_all(workdir, &self.layout, dashboards, rules)?;
        self.stage(workdir, &export.paths)?;

        let status = self.git.status_porcelain(workdir)?;
        let changed = parse_status(&status.stdout).len();

        if changed == 0 {
            info!("Nothing changed.");
            return Ok(SyncReport {
                export,
                changed,
                outcome: SyncOutcome::NothingChanged,
            });
        }

        let message = commit_message(changed);
        self.git
            .commit(workdir, &message, &self.author)
            .map_err(SyncError::Commit)?;
        self.git
            .push(workdir, REMOTE, "HEAD")
            .map_err(SyncError::Push)?;

        info!(changed, "Change pushed to repo.");
        Ok(SyncReport {
            export,
            changed,
            outcome: SyncOutcome::Pushed,
        })
    }

    /// Stage written paths; unchanged files are a no-op for git.
    fn stage(&self, workdir: &Path, paths: &[PathBuf]) -> Result<(), SyncError> {
        let files: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        for batch in files.chunks(STAGE_BATCH) {
            self.git.add_files(workdir, batch)?;
        }
        Ok(())
    }
}
