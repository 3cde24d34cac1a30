use crate::app::*;
use crate::config::Config;
use clap::Parser;
use serial_test::serial;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(grafana_url: &str, token: &str) -> Config {
    Config::try_parse_from([
        "grafana-backup",
        "--grafana-url",
        grafana_url,
        "--grafana-token",
        token,
        "--git-repo-url",
        "https://git.example.com/ops/dashboards.git",
        "--http-max-retries",
        "0",
    ])
    .unwrap()
}

#[tokio::test]
#[serial]
async fn test_run_rejects_blank_token_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = run(&config(&server.uri(), "")).await.unwrap_err();

    assert!(matches!(err, AppError::Config(_)));
}

#[tokio::test]
#[serial]
async fn test_run_stops_on_grafana_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid API key"))
        .expect(1)
        .mount(&server)
        .await;

    let err = run(&config(&server.uri(), "bad-token")).await.unwrap_err();

    assert!(matches!(err, AppError::Grafana(_)));
    assert!(err.to_string().contains("401"));
}

#[cfg(feature = "git-tests")]
mod git {
    use super::*;
    use crate::sync::SyncOutcome;
    use std::path::Path;
    use std::process::Command;
    use tempfile::TempDir;

    fn git(args: &[&str]) -> String {
        let output = Command::new("git").args(args).output().unwrap();
        assert!(output.status.success(), "git {:?} failed", args);
        String::from_utf8(output.stdout).unwrap()
    }

    fn bare_repo(dir: &Path) -> String {
        let path = dir.join("remote.git").to_str().unwrap().to_string();
        git(&["init", "--quiet", "--bare", &path]);
        path
    }

    async fn grafana() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"uid": "abc", "title": "/var disk usage"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/dashboards/uid/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "meta": {"slug": "var-disk-usage", "provisioned": false},
                "dashboard": {"uid": "abc", "title": "/var disk usage"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/ruler/grafana/api/v1/rules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "/Infra": [{"name": "disk", "interval": "1m", "rules": []}]
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    #[serial]
    async fn test_run_commits_once_and_pushes_metrics_every_run() {
        let temp_dir = TempDir::new().unwrap();
        let remote = bare_repo(temp_dir.path());
        let grafana = grafana().await;
        let gateway = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/metrics/job/grafana_export"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&gateway)
            .await;

        let grafana_url = grafana.uri();
        let gateway_url = gateway.uri();
        let config = Config::try_parse_from([
            "grafana-backup",
            "--grafana-url",
            grafana_url.as_str(),
            "--grafana-token",
            "token",
            "--git-repo-url",
            remote.as_str(),
            "--dir-prefix",
            "dash",
            "--alert-rule-dir-prefix",
            "alerts",
            "--push-gateway-url",
            gateway_url.as_str(),
        ])
        .unwrap();

        let first = run(&config).await.unwrap();
        assert_eq!(first.outcome, SyncOutcome::Pushed);
        assert_eq!(first.changed, 2);

        let files = git(&["--git-dir", &remote, "ls-tree", "-r", "--name-only", "HEAD"]);
        assert_eq!(
            files.lines().collect::<Vec<_>>(),
            vec!["alerts/Infra/disk.json", "dash/abc/var disk usage.json"]
        );

        let second = run(&config).await.unwrap();
        assert_eq!(second.outcome, SyncOutcome::NothingChanged);

        let bodies: Vec<String> = gateway
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect();
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].contains("grafana_export_dashboard_export_total 1\n"));
        assert!(bodies[0].contains("grafana_export_alert_rule_export_total 1\n"));
        assert!(bodies[0].contains("grafana_export_git_status_total 2\n"));
        assert!(bodies[1].contains("grafana_export_git_status_total 0\n"));
    }
}
