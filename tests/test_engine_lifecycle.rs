mod common;

use common::{harness, harness_with, test_config, FlakyStore, RecordingHooks};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tenantry::{
    CollectionsEngine, DocumentStore, EngineManager, EngineManifest, EngineRecord,
    MemoryLockProvider, MemoryStore, TenantryError,
};

#[tokio::test]
async fn test_init_prepares_registry_and_calls_hooks_once() {
    let h = harness().await;

    assert!(h.store.index_exists("tenantry").await.unwrap());
    assert!(h.store.collection_exists("tenantry", "config").await.unwrap());
    assert_eq!(h.hooks.calls(), vec!["init:asset"]);
}

#[tokio::test]
async fn test_create_provisions_and_registers() {
    let h = harness().await;

    let provisioned = h.manager.create("acme", None).await.unwrap();
    assert_eq!(provisioned.collections, vec!["assets"]);
    assert!(h.store.index_exists("acme").await.unwrap());
    assert!(h.manager.exists("acme").await.unwrap());
    assert_eq!(h.hooks.count("create:acme:commons"), 1);

    let doc = h
        .store
        .document_get("tenantry", "config", "engine-asset--acme")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.source["type"], "engine-asset");
    assert_eq!(doc.source["engine"]["index"], "acme");
}

#[tokio::test]
async fn test_create_twice_fails_with_already_exists() {
    let h = harness().await;
    h.manager.create("acme", None).await.unwrap();

    let err = h.manager.create("acme", None).await.unwrap_err();
    assert!(matches!(err, TenantryError::EngineAlreadyExists { .. }));
    assert_eq!(err.to_string(), "Asset engine on index \"acme\" already exists");
    assert_eq!(h.hooks.count("create:"), 1);
}

#[tokio::test]
async fn test_never_created_engine_is_not_found() {
    let h = harness().await;

    assert!(!h.manager.exists("ghost").await.unwrap());

    let err = h.manager.update("ghost", None).await.unwrap_err();
    assert!(matches!(err, TenantryError::EngineNotFound { .. }));

    let err = h.manager.delete("ghost").await.unwrap_err();
    assert!(matches!(err, TenantryError::EngineNotFound { .. }));
    assert_eq!(err.to_string(), "Asset engine on index \"ghost\" does not exist");

    assert_eq!(h.hooks.count("update:"), 0);
    assert_eq!(h.hooks.count("delete:"), 0);
}

#[tokio::test]
async fn test_list_filters_by_group() {
    let h = harness().await;
    h.manager.create("acme", Some("g1")).await.unwrap();
    h.manager.create("globex", None).await.unwrap();

    let g1 = h.manager.list(Some("g1")).await.unwrap();
    assert_eq!(
        g1,
        vec![EngineRecord {
            tenant_index: "acme".to_string(),
            group: "g1".to_string(),
            plugin_name: "asset".to_string(),
        }]
    );
    assert!(h.manager.list(Some("g2")).await.unwrap().is_empty());

    let all = h.manager.list(None).await.unwrap();
    let mut indexes: Vec<_> = all.iter().map(|r| r.tenant_index.as_str()).collect();
    indexes.sort();
    assert_eq!(indexes, vec!["acme", "globex"]);
}

#[tokio::test]
async fn test_concurrent_creates_create_index_once() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(2)));
    let h = harness_with(store, RecordingHooks::new(&["assets"])).await;
    let before = h.store.calls().index_create;

    let results =
        futures::future::join_all((0..8).map(|_| h.manager.create("acme", Some("g1")))).await;

    assert_eq!(h.store.calls().index_create - before, 1);
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            result,
            Err(TenantryError::EngineAlreadyExists { .. })
        ));
    }
    assert_eq!(h.manager.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_two_plugins_provision_same_tenant_concurrently() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(2)));
    let locks = Arc::new(MemoryLockProvider::new());
    let plugin = |name: &str, collections: &[&str]| {
        EngineManager::new(
            name,
            Arc::new(RecordingHooks::new(collections)),
            store.clone(),
            locks.clone(),
            &test_config(),
        )
        .unwrap()
    };
    let asset = plugin("asset", &["assets"]);
    let device = plugin("device", &["devices"]);

    let (asset_init, device_init) = tokio::join!(asset.init(), device.init());
    asset_init.unwrap();
    device_init.unwrap();

    let (asset_created, device_created) =
        tokio::join!(asset.create("acme", None), device.create("acme", None));
    assert_eq!(asset_created.unwrap().collections, vec!["assets"]);
    assert_eq!(device_created.unwrap().collections, vec!["devices"]);

    assert!(asset.exists("acme").await.unwrap());
    assert!(device.exists("acme").await.unwrap());
}

#[tokio::test]
async fn test_update_reruns_hooks_and_rewrites_group() {
    let h = harness().await;
    h.manager.create("acme", Some("g1")).await.unwrap();

    let provisioned = h.manager.update("acme", Some("g2")).await.unwrap();
    assert_eq!(provisioned.collections, vec!["assets"]);
    assert_eq!(h.hooks.count("update:acme:g2"), 1);

    assert!(h.manager.list(Some("g1")).await.unwrap().is_empty());
    assert_eq!(h.manager.list(Some("g2")).await.unwrap().len(), 1);
    assert!(h.manager.exists("acme").await.unwrap());
}

#[tokio::test]
async fn test_update_without_group_keeps_stored_group() {
    let h = harness().await;
    h.manager.create("acme", Some("g1")).await.unwrap();

    h.manager.update("acme", None).await.unwrap();
    assert_eq!(h.hooks.count("update:acme:g1"), 1);

    let g1 = h.manager.list(Some("g1")).await.unwrap();
    assert_eq!(g1.len(), 1);
    assert_eq!(g1[0].tenant_index, "acme");
    assert!(h.manager.list(Some("commons")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_exists_is_false_before_init() {
    let manager = EngineManager::new(
        "asset",
        Arc::new(RecordingHooks::new(&["assets"])),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryLockProvider::new()),
        &test_config(),
    )
    .unwrap();

    assert!(!manager.exists("acme").await.unwrap());
    assert!(matches!(
        manager.update("acme", None).await,
        Err(TenantryError::EngineNotFound { .. })
    ));
}

#[tokio::test]
async fn test_delete_removes_record() {
    let h = harness().await;
    h.manager.create("acme", None).await.unwrap();

    let provisioned = h.manager.delete("acme").await.unwrap();
    assert_eq!(provisioned.collections, vec!["assets"]);
    assert!(!h.manager.exists("acme").await.unwrap());

    // The tenant can be provisioned again.
    h.manager.create("acme", None).await.unwrap();
    assert_eq!(h.hooks.count("create:acme"), 2);
}

#[tokio::test]
async fn test_failing_teardown_still_removes_record() {
    let h = harness().await;
    h.manager.create("acme", None).await.unwrap();
    h.hooks.fail_on_delete.store(true, Ordering::SeqCst);

    let err = h.manager.delete("acme").await.unwrap_err();
    assert_eq!(err.to_string(), "Store error: teardown failed");
    assert!(!h.manager.exists("acme").await.unwrap());
    assert_eq!(h.hooks.count("delete:acme"), 1);
}

#[tokio::test]
async fn test_failing_provisioning_writes_no_record() {
    let h = harness().await;
    h.hooks.fail_on_create.store(true, Ordering::SeqCst);

    assert!(h.manager.create("acme", None).await.is_err());
    assert!(!h.manager.exists("acme").await.unwrap());
}

#[tokio::test]
async fn test_index_creation_failure_releases_lock() {
    let h = harness_with(Arc::new(FlakyStore::default()), RecordingHooks::new(&[])).await;
    h.store.fail_index_create.store(true, Ordering::SeqCst);

    let err = h.manager.create("acme", None).await.unwrap_err();
    assert!(matches!(err, TenantryError::Store(_)));
    assert!(h.locks.lease("asset/initIndex/acme").is_none());
    assert!(!h.manager.exists("acme").await.unwrap());
    assert_eq!(h.hooks.count("create:"), 0);

    h.store.fail_index_create.store(false, Ordering::SeqCst);
    h.manager.create("acme", None).await.unwrap();
    assert!(h.manager.exists("acme").await.unwrap());
}

#[tokio::test]
async fn test_registry_write_failure_surfaces_after_provisioning() {
    let h = harness_with(Arc::new(FlakyStore::default()), RecordingHooks::new(&["assets"])).await;
    h.store.fail_document_create.store(true, Ordering::SeqCst);

    let err = h.manager.create("acme", None).await.unwrap_err();
    assert!(matches!(err, TenantryError::Store(_)));
    assert_eq!(h.hooks.count("create:acme"), 1);
    assert!(h.store.inner.index_exists("acme").await.unwrap());
    assert!(!h.manager.exists("acme").await.unwrap());
}

#[tokio::test]
async fn test_invalid_plugin_names_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let locks = Arc::new(MemoryLockProvider::new());

    for name in ["", "a/b", "asset--v2"] {
        let result = EngineManager::new(
            name,
            RecordingHooks::default(),
            store.clone(),
            locks.clone(),
            &common::test_config(),
        );
        assert!(matches!(result, Err(TenantryError::Implementation(_))));
    }
}

#[tokio::test]
async fn test_collections_engine_lifecycle() {
    let store = Arc::new(MemoryStore::new());
    let manifest = EngineManifest::from_json(
        r#"{"collections": {"assets": {"properties": {"model": {"type": "keyword"}}}, "measures": {}}}"#,
    )
    .unwrap();
    let manager = EngineManager::new(
        "device",
        CollectionsEngine::new(store.clone(), manifest),
        store.clone(),
        Arc::new(MemoryLockProvider::new()),
        &common::test_config(),
    )
    .unwrap();
    manager.init().await.unwrap();

    let created = manager.create("acme", None).await.unwrap();
    assert_eq!(created.collections, vec!["assets", "measures"]);
    assert!(store.collection_exists("acme", "measures").await.unwrap());

    // Migration: mappings are re-applied on update.
    store
        .collection_create("acme", "assets", &json!({}))
        .await
        .unwrap();
    manager.update("acme", None).await.unwrap();
    assert_eq!(
        store.mappings("acme", "assets"),
        Some(json!({"properties": {"model": {"type": "keyword"}}}))
    );

    manager.delete("acme").await.unwrap();
    assert!(!store.collection_exists("acme", "assets").await.unwrap());
    assert!(!manager.exists("acme").await.unwrap());
}
