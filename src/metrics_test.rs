use crate::metrics::*;
use std::time::Duration;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_crypto() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

fn sample() -> ExportMetrics {
    ExportMetrics {
        dashboards_exported: 3,
        alert_rules_exported: 2,
        git_status_entries: 1,
    }
}

#[test]
fn test_render_exposition_format() {
    let expected = "\
# HELP grafana_export_dashboard_export_total Number of grafana dashboard exported
# TYPE grafana_export_dashboard_export_total counter
grafana_export_dashboard_export_total 3
# HELP grafana_export_alert_rule_export_total Number of grafana alert rule exported
# TYPE grafana_export_alert_rule_export_total counter
grafana_export_alert_rule_export_total 2
# HELP grafana_export_git_status_total Number of item changed on git
# TYPE grafana_export_git_status_total gauge
grafana_export_git_status_total 1
";
    assert_eq!(sample().render(), expected);
}

#[test]
fn test_gateway_url_layout() {
    init_crypto();
    let gateway =
        PushGateway::new("http://pushgateway:9091/", "grafana_export", Duration::from_secs(1))
            .unwrap();
    assert_eq!(
        gateway.url(),
        "http://pushgateway:9091/metrics/job/grafana_export"
    );
}

#[test]
fn test_job_name_is_escaped() {
    init_crypto();
    let gateway =
        PushGateway::new("http://pushgateway:9091", "nightly/export", Duration::from_secs(1))
            .unwrap();
    assert_eq!(
        gateway.url(),
        "http://pushgateway:9091/metrics/job/nightly%2Fexport"
    );
}

#[test]
fn test_invalid_gateway_url() {
    init_crypto();
    let result = PushGateway::new("not a url", "job", Duration::from_secs(1));
    assert!(matches!(result, Err(MetricsError::InvalidUrl { .. })));
}

#[tokio::test]
async fn test_push_puts_metrics() {
    init_crypto();
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/metrics/job/grafana_export"))
        .and(header("Content-Type", "text/plain; version=0.0.4"))
        .and(body_string(sample().render()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = PushGateway::new(&server.uri(), "grafana_export", Duration::from_secs(5)).unwrap();
    gateway.push(&sample()).await.unwrap();
}

#[tokio::test]
async fn test_push_error_status() {
    init_crypto();
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let gateway = PushGateway::new(&server.uri(), "grafana_export", Duration::from_secs(5)).unwrap();
    let err = gateway.push(&sample()).await.unwrap_err();

    assert!(matches!(err, MetricsError::Status { status: 500, .. }));
}

#[tokio::test]
async fn test_best_effort_swallows_failure() {
    init_crypto();
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    // Must return normally despite the 503.
    push_best_effort(&server.uri(), "grafana_export", Duration::from_secs(5), &sample()).await;
}
