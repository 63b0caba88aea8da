//! End-to-end bootstrap tests with a fake kubelet, recorder and engine

#[path = "support.rs"]
mod support;

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use criboot::app::options::{BootstrapConfig, BootstrapOptions};
use criboot::app::run::{BootstrapOutcome, Bootstrapper};
use criboot::cluster::recorder::{RECORD_DATA_KEY, RECORD_NAMESPACE};
use criboot::deploy::readiness::ReadinessOptions;
use criboot::deploy::spec::MARKER_LABEL;
use criboot::errors::BootstrapError;
use criboot::kubelet::overrides::CRI_PROXY_OVERRIDES;
use criboot::models::kubelet::LiveConfig;

use support::{spawn_kubelet, stats_for, EngineBehavior, FakeConnector, FakeEngine, FakeRecorder};

fn options() -> BootstrapOptions {
    BootstrapOptions {
        readiness: ReadinessOptions {
            timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(10),
        },
        ..Default::default()
    }
}

fn config(base_url: &str, dir: &Path) -> BootstrapConfig {
    BootstrapConfig {
        configz_base_url: base_url.to_string(),
        stats_base_url: base_url.to_string(),
        saved_config_path: dir.join("saved").join("kubelet.conf"),
        proxy_path: "/usr/local/bin/criproxy".to_string(),
        proxy_args: vec!["-v".to_string(), "3".to_string()],
        proxy_socket_path: dir.join("criproxy.sock"),
    }
}

fn already_patched() -> Value {
    json!({
        "dockerEndpoint": "unix:///var/run/docker.sock",
        "containerRuntime": "remote",
        "enableCRI": true,
        "remoteRuntimeEndpoint": "/run/criproxy.sock",
        "remoteImageEndpoint": "/run/criproxy.sock",
    })
}

#[tokio::test]
async fn test_bootstrap_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let original = json!({ "dockerEndpoint": "unix:///var/run/docker.sock" });
    let kubelet = spawn_kubelet(original.clone(), stats_for("node-1")).await;
    let config = config(&kubelet.base_url, dir.path());

    let engine = FakeEngine::with_behavior(EngineBehavior {
        listen_on_start: Some(config.proxy_socket_path.clone()),
        ..Default::default()
    });
    engine.add_container("stale", &[(MARKER_LABEL, "true")]);
    let connector = FakeConnector::new(engine.clone());
    let recorder = FakeRecorder::default();

    let bootstrapper = Bootstrapper::new(options(), Arc::new(recorder.clone()), Arc::new(connector.clone()));
    let outcome = bootstrapper.run(&config).await.unwrap();

    assert!(outcome.patched());
    let BootstrapOutcome::Bootstrapped { container_id } = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };

    // backup holds the pre-override config
    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&config.saved_config_path).unwrap()).unwrap();
    assert_eq!(saved, original);

    // record carries every override
    let records = recorder.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "kubelet-node-1");
    assert_eq!(records[0].namespace, RECORD_NAMESPACE);
    let published: LiveConfig = serde_json::from_str(&records[0].data[RECORD_DATA_KEY]).unwrap();
    for (key, value) in CRI_PROXY_OVERRIDES.iter() {
        assert_eq!(published.get(key), Some(value), "key {key}");
    }
    assert_eq!(published["dockerEndpoint"], "unix:///var/run/docker.sock");

    // exactly one proxy container, the new one
    let proxies = engine.containers_with_label(MARKER_LABEL);
    assert_eq!(proxies.len(), 1);
    assert_eq!(proxies[0].id, container_id);
    let spec = proxies[0].spec.clone().unwrap();
    assert_eq!(spec.engine_host(), Some("unix:///var/run/docker.sock"));
    assert!(spec
        .binds
        .contains(&"/var/run/docker.sock:/var/run/docker.sock".to_string()));
    assert_eq!(spec.cmd, vec!["/criproxy", "-v", "3"]);
}

#[tokio::test]
async fn test_bootstrap_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let kubelet = spawn_kubelet(already_patched(), stats_for("node-1")).await;
    let config = config(&kubelet.base_url, dir.path());

    let connector = FakeConnector::default();
    let recorder = FakeRecorder::default();
    let bootstrapper = Bootstrapper::new(options(), Arc::new(recorder.clone()), Arc::new(connector.clone()));

    let outcome = bootstrapper.run(&config).await.unwrap();

    assert_eq!(outcome, BootstrapOutcome::AlreadyConfigured);
    assert!(!outcome.patched());
    assert!(!config.saved_config_path.exists());
    assert!(recorder.records().is_empty());
    assert_eq!(connector.connect_count(), 0);
    assert_eq!(kubelet.stats_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bootstrap_missing_engine_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let kubelet = spawn_kubelet(json!({ "maxPods": 110 }), stats_for("node-1")).await;
    let config = config(&kubelet.base_url, dir.path());

    let connector = FakeConnector::default();
    let recorder = FakeRecorder::default();
    let bootstrapper = Bootstrapper::new(options(), Arc::new(recorder.clone()), Arc::new(connector.clone()));

    let result = bootstrapper.run(&config).await;

    assert!(matches!(result, Err(BootstrapError::MissingFieldError(_))));
    assert!(recorder.records().is_empty());
    assert_eq!(connector.connect_count(), 0);
}

#[tokio::test]
async fn test_bootstrap_publish_failure_skips_install() {
    let dir = tempfile::tempdir().unwrap();
    let kubelet = spawn_kubelet(
        json!({ "dockerEndpoint": "unix:///var/run/docker.sock" }),
        stats_for("node-1"),
    )
    .await;
    let config = config(&kubelet.base_url, dir.path());

    let connector = FakeConnector::default();
    let recorder = FakeRecorder {
        fail: true,
        ..Default::default()
    };
    let bootstrapper = Bootstrapper::new(options(), Arc::new(recorder), Arc::new(connector.clone()));

    let result = bootstrapper.run(&config).await;

    assert!(matches!(result, Err(BootstrapError::PublishError(_))));
    assert!(config.saved_config_path.exists());
    assert_eq!(connector.connect_count(), 0);
}

#[tokio::test]
async fn test_bootstrap_times_out_without_socket() {
    let dir = tempfile::tempdir().unwrap();
    let kubelet = spawn_kubelet(
        json!({ "dockerEndpoint": "unix:///var/run/docker.sock" }),
        stats_for("node-1"),
    )
    .await;
    let config = config(&kubelet.base_url, dir.path());

    let engine = FakeEngine::default();
    let connector = FakeConnector::new(engine.clone());
    let recorder = FakeRecorder::default();
    let bootstrapper = Bootstrapper::new(options(), Arc::new(recorder.clone()), Arc::new(connector));

    let result = bootstrapper.run(&config).await;

    assert!(matches!(result, Err(BootstrapError::TimeoutError(_))));
    assert_eq!(recorder.records().len(), 1);
    assert_eq!(engine.containers_with_label(MARKER_LABEL).len(), 1);
}

#[tokio::test]
async fn test_bootstrap_rejects_invalid_config_before_io() {
    let dir = tempfile::tempdir().unwrap();
    let kubelet = spawn_kubelet(already_patched(), stats_for("node-1")).await;
    let config = BootstrapConfig {
        proxy_path: String::new(),
        ..config(&kubelet.base_url, dir.path())
    };

    let bootstrapper = Bootstrapper::new(
        options(),
        Arc::new(FakeRecorder::default()),
        Arc::new(FakeConnector::default()),
    );
    let result = bootstrapper.run(&config).await;

    assert!(matches!(result, Err(BootstrapError::ValidationError(_))));
    assert_eq!(kubelet.configz_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_liveness_check_reinstalls_dead_proxy() {
    let dir = tempfile::tempdir().unwrap();
    let kubelet = spawn_kubelet(already_patched(), stats_for("node-1")).await;
    let config = config(&kubelet.base_url, dir.path());

    let engine = FakeEngine::with_behavior(EngineBehavior {
        listen_on_start: Some(config.proxy_socket_path.clone()),
        ..Default::default()
    });
    let connector = FakeConnector::new(engine.clone());
    let recorder = FakeRecorder::default();
    let options = BootstrapOptions {
        verify_proxy_liveness: true,
        ..options()
    };
    let bootstrapper = Bootstrapper::new(options, Arc::new(recorder.clone()), Arc::new(connector.clone()));

    let outcome = bootstrapper.run(&config).await.unwrap();
    assert!(matches!(outcome, BootstrapOutcome::Reinstalled { .. }));
    assert!(!outcome.patched());
    assert!(!config.saved_config_path.exists());
    assert!(recorder.records().is_empty());
    assert_eq!(engine.containers_with_label(MARKER_LABEL).len(), 1);

    // the proxy now answers, so a second run leaves everything alone
    let outcome = bootstrapper.run(&config).await.unwrap();
    assert_eq!(outcome, BootstrapOutcome::AlreadyConfigured);
    assert_eq!(connector.connect_count(), 1);
}
