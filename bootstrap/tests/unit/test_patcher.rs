//! Config patcher unit tests

use serde_json::{json, Value};

use criboot::errors::BootstrapError;
use criboot::filesys::file::File;
use criboot::kubelet::overrides::CRI_PROXY_OVERRIDES;
use criboot::kubelet::patcher::{extract_engine_endpoint, ConfigPatcher, PatchOutcome};
use criboot::models::kubelet::{load_kubelet_config, LiveConfig};

fn live(value: Value) -> LiveConfig {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn patched_config() -> LiveConfig {
    live(json!({
        "containerRuntime": "remote",
        "enableCRI": true,
        "remoteRuntimeEndpoint": "/run/criproxy.sock",
        "remoteImageEndpoint": "/run/criproxy.sock",
        "dockerEndpoint": "unix:///var/run/docker.sock",
    }))
}

#[test]
fn test_already_patched_requires_every_key() {
    let patcher = ConfigPatcher::new(&CRI_PROXY_OVERRIDES);
    assert!(patcher.is_already_patched(&patched_config()));

    let mut partial = patched_config();
    partial.remove("remoteImageEndpoint");
    assert!(!patcher.is_already_patched(&partial));

    assert!(!patcher.is_already_patched(&LiveConfig::new()));
}

#[test]
fn test_already_patched_does_not_coerce_types() {
    let patcher = ConfigPatcher::new(&CRI_PROXY_OVERRIDES);

    let mut stringly = patched_config();
    stringly.insert("enableCRI".to_string(), json!("true"));
    assert!(!patcher.is_already_patched(&stringly));

    let mut docker = patched_config();
    docker.insert("containerRuntime".to_string(), json!("docker"));
    assert!(!patcher.is_already_patched(&docker));
}

#[test]
fn test_apply_overrides_overwrites_everything() {
    let patcher = ConfigPatcher::new(&CRI_PROXY_OVERRIDES);
    let mut config = live(json!({
        "containerRuntime": "docker",
        "enableCRI": "yes",
        "remoteRuntimeEndpoint": 12,
        "maxPods": 110,
    }));

    patcher.apply_overrides(&mut config);

    assert!(patcher.is_already_patched(&config));
    for (key, value) in CRI_PROXY_OVERRIDES.iter() {
        assert_eq!(config.get(key), Some(value), "key {key}");
    }
    assert_eq!(config["maxPods"].to_string(), "110");
}

#[test]
fn test_extract_engine_endpoint() {
    let config = patched_config();
    assert_eq!(
        extract_engine_endpoint(&config).unwrap(),
        "unix:///var/run/docker.sock"
    );

    let wrong_type = live(json!({ "dockerEndpoint": 2375 }));
    assert!(matches!(
        extract_engine_endpoint(&wrong_type),
        Err(BootstrapError::MissingFieldError(_))
    ));

    assert!(matches!(
        extract_engine_endpoint(&LiveConfig::new()),
        Err(BootstrapError::MissingFieldError(_))
    ));
}

#[tokio::test]
async fn test_patch_backs_up_original() {
    let dir = tempfile::tempdir().unwrap();
    let backup = File::new(dir.path().join("kubelet.conf"));
    let original: LiveConfig = serde_json::from_str(
        r#"{
            "dockerEndpoint": "unix:///var/run/docker.sock",
            "containerRuntime": "docker",
            "evictionHard": { "memory.available": "100Mi" },
            "kubeAPIQPS": 5,
            "imageGCHighThresholdPercent": 85.00000000000000000001
        }"#,
    )
    .unwrap();

    let patcher = ConfigPatcher::new(&CRI_PROXY_OVERRIDES);
    let outcome = patcher.patch(original.clone(), &backup).await.unwrap();

    match outcome {
        PatchOutcome::Patched {
            config,
            engine_endpoint,
        } => {
            assert_eq!(engine_endpoint, "unix:///var/run/docker.sock");
            assert!(patcher.is_already_patched(&config));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let saved: LiveConfig = backup.read_json().await.unwrap();
    assert_eq!(saved, original);
    assert_eq!(
        saved["imageGCHighThresholdPercent"].to_string(),
        "85.00000000000000000001"
    );

    let typed = load_kubelet_config(backup.path()).await.unwrap();
    assert_eq!(typed.container_runtime.as_deref(), Some("docker"));
    assert!(typed.enable_cri.is_none());
}

#[tokio::test]
async fn test_patch_noop_when_already_patched() {
    let dir = tempfile::tempdir().unwrap();
    let backup = File::new(dir.path().join("kubelet.conf"));

    let patcher = ConfigPatcher::new(&CRI_PROXY_OVERRIDES);
    let outcome = patcher.patch(patched_config(), &backup).await.unwrap();

    assert_eq!(outcome, PatchOutcome::AlreadyPatched(patched_config()));
    assert!(!backup.exists().await);
}

#[tokio::test]
async fn test_patch_fails_when_backup_fails() {
    let dir = tempfile::tempdir().unwrap();
    // a regular file where the parent directory should be
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    let backup = File::new(blocker.join("kubelet.conf"));

    let patcher = ConfigPatcher::new(&CRI_PROXY_OVERRIDES);
    let result = patcher
        .patch(live(json!({ "dockerEndpoint": "unix:///x.sock" })), &backup)
        .await;

    assert!(matches!(result, Err(BootstrapError::PersistenceError(_))));
}

#[tokio::test]
async fn test_patch_missing_endpoint_after_backup() {
    let dir = tempfile::tempdir().unwrap();
    let backup = File::new(dir.path().join("kubelet.conf"));

    let patcher = ConfigPatcher::new(&CRI_PROXY_OVERRIDES);
    let result = patcher.patch(live(json!({ "maxPods": 10 })), &backup).await;

    assert!(matches!(result, Err(BootstrapError::MissingFieldError(_))));
    let saved: LiveConfig = backup.read_json().await.unwrap();
    assert_eq!(saved, live(json!({ "maxPods": 10 })));
}
