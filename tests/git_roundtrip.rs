//! End-to-end sync against a local bare repository using the git CLI.
//!
//! Run with `--features git-tests`.
#![cfg(feature = "git-tests")]

use std::path::Path;
use std::process::Command;

use grafana_backup::grafana::{ExportedItem, NamespaceRules, RuleGroup};
use grafana_backup::sync::{Author, ExportLayout, RealGit, SyncManager, SyncOutcome};
use tempfile::TempDir;

fn git(args: &[&str]) -> String {
    let output = Command::new("git").args(args).output().unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn bare_repo(dir: &Path) -> String {
    let path = dir.join("remote.git");
    let path = path.to_str().unwrap().to_string();
    git(&["init", "--quiet", "--bare", &path]);
    path
}

fn commit_count(remote: &str) -> usize {
    git(&["--git-dir", remote, "rev-list", "--all", "--count"])
        .parse()
        .unwrap()
}

fn manager(remote: &str) -> SyncManager<RealGit> {
    SyncManager::new(
        RealGit::new(),
        remote,
        Author::new("Backup Bot", "backup@example.com"),
        ExportLayout::new("dashboards", "alerts"),
    )
}

fn dashboard(body: &str) -> Vec<ExportedItem> {
    vec![ExportedItem {
        uid: "abc".to_string(),
        title: "My Dash".to_string(),
        body: body.as_bytes().to_vec(),
    }]
}

fn rules() -> NamespaceRules {
    let mut rules = NamespaceRules::new();
    rules.insert(
        "Infra".to_string(),
        vec![RuleGroup {
            name: "disk".to_string(),
            interval: Some("1m".to_string()),
            ..RuleGroup::default()
        }],
    );
    rules
}

#[test]
fn test_first_run_commits_and_rerun_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let remote = bare_repo(temp_dir.path());

    let first = manager(&remote)
        .sync(&dashboard("{\n  \"title\": \"My Dash\"\n}"), &rules())
        .unwrap();

    assert_eq!(first.outcome, SyncOutcome::Pushed);
    assert_eq!(first.changed, 2);
    assert_eq!(commit_count(&remote), 1);
    assert_eq!(
        git(&["--git-dir", &remote, "log", "-1", "--format=%s|%an|%ae"]),
        "2 file(s) content updated.|Backup Bot|backup@example.com"
    );
    assert_eq!(
        git(&["--git-dir", &remote, "show", "HEAD:dashboards/abc/My Dash.json"]),
        "{\n  \"title\": \"My Dash\"\n}"
    );

    let second = manager(&remote)
        .sync(&dashboard("{\n  \"title\": \"My Dash\"\n}"), &rules())
        .unwrap();

    assert_eq!(second.outcome, SyncOutcome::NothingChanged);
    assert_eq!(second.changed, 0);
    assert_eq!(commit_count(&remote), 1);
}

#[test]
fn test_changed_dashboard_produces_one_commit() {
    let temp_dir = TempDir::new().unwrap();
    let remote = bare_repo(temp_dir.path());

    manager(&remote)
        .sync(&dashboard("{\n  \"version\": 1\n}"), &rules())
        .unwrap();
    let report = manager(&remote)
        .sync(&dashboard("{\n  \"version\": 2\n}"), &rules())
        .unwrap();

    assert_eq!(report.outcome, SyncOutcome::Pushed);
    assert_eq!(report.changed, 1);
    assert_eq!(commit_count(&remote), 2);
    assert_eq!(
        git(&["--git-dir", &remote, "log", "-1", "--format=%s"]),
        "1 file(s) content updated."
    );
}
