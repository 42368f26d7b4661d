mod common;

use common::{bridge, resumed_host, RecordingEngine};
use std::time::Duration;
use subbundle_core::{
    AttachOutcome, BundleCatalog, CatalogError, HostContainer, DEFAULT_LOAD_TIMEOUT,
};
use tempfile::TempDir;

const CATALOG: &str = r#"{
  "package": "com.example.host",
  "load_timeout_ms": 5000,
  "bundles": [
    { "name": "sample_a", "asset": "packagea/index.bundle", "component": "SampleA" },
    { "name": "sample_b", "asset": "packageb/index.bundle", "component": "SampleB" }
  ]
}"#;

#[test]
fn catalog_loads_from_disk() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("bundles.json");
    std::fs::write(&path, CATALOG).expect("write catalog");

    let catalog = BundleCatalog::from_path(&path).expect("catalog");
    assert_eq!(catalog.package.as_deref(), Some("com.example.host"));
    assert_eq!(catalog.names(), vec!["sample_a", "sample_b"]);
    assert_eq!(
        catalog.loader_options().load_timeout,
        Some(Duration::from_millis(5000))
    );
}

#[test]
fn missing_catalog_file_is_an_io_error() {
    let dir = TempDir::new().expect("tempdir");
    let err = BundleCatalog::from_path(&dir.path().join("absent.json")).expect_err("missing");
    assert!(matches!(err, CatalogError::Io { .. }));
}

#[test]
fn catalog_without_timeout_uses_loader_default() {
    let catalog = BundleCatalog::from_json_str(
        r#"{"bundles":[{"name":"main","asset":"main.bundle.js","component":"Main"}]}"#,
    )
    .expect("catalog");
    assert_eq!(catalog.loader_options().load_timeout, Some(DEFAULT_LOAD_TIMEOUT));
}

#[tokio::test]
async fn every_catalog_entry_becomes_a_working_container() {
    let engine = RecordingEngine::new();
    let (host, generation) = resumed_host(&engine).await;
    let catalog = BundleCatalog::from_json_str(CATALOG).expect("catalog");

    for entry in &catalog.bundles {
        let container = HostContainer::new(
            entry.container_config(),
            bridge(&host),
            catalog.loader_options(),
        )
        .expect("container");
        assert_eq!(container.surface().module_name(), entry.component);
        assert_eq!(
            container.dispatch().await.expect("dispatch"),
            AttachOutcome::Attached(generation.id())
        );
    }

    assert_eq!(
        engine.evaluations_for(generation.id()),
        vec![
            "assets://packagea/index.bundle".to_string(),
            "assets://packageb/index.bundle".to_string()
        ]
    );
}
