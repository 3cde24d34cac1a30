//! Sync module - git-backed persistence of the Grafana export.
//!
//! This module writes exported dashboards and alert rule groups into a
//! fresh clone of the backup repository and publishes any difference as a
//! single commit.

mod export;
mod git;
mod manager;

pub use export::{ExportError, ExportLayout, ExportSummary, export_all, write_file};
#[cfg(test)]
pub use git::MockGitOps;
pub use git::{Author, Credentials, GitError, GitOps, RealGit, StatusEntry, parse_status};
pub use manager::{REMOTE, SyncError, SyncManager, SyncOutcome, SyncReport, commit_message};
