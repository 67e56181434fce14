//! Redis store tests. Need a local Redis; run with `--ignored`.
//!
//! Every test works in database 15 and flushes it first.

use beacon_common::{
    AccessRule, ApiKey, ConfigEntry, Environment, Heartbeat, License, LicenseStatus, LicenseType,
    Project, RuleType,
};
use beacon_control_plane::{BindOutcome, RedisStore, Store};
use chrono::Utc;
use serde_json::json;

const REDIS_URL: &str = "redis://127.0.0.1:6379/15";

async fn fresh_store() -> RedisStore {
    let client = redis::Client::open(REDIS_URL).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await.unwrap();

    RedisStore::new(REDIS_URL).await.unwrap()
}

#[tokio::test]
#[ignore]
async fn test_project_and_api_keys() {
    let store = fresh_store().await;
    store.health_check().await.unwrap();

    let project = Project::new(
        "proj-1".to_string(),
        "pub-1".to_string(),
        "Demo".to_string(),
        "sk_master".to_string(),
    );
    store.save_project(&project).await.unwrap();

    let key = ApiKey::new(
        "key-1".to_string(),
        "ci".to_string(),
        "ak_ci".to_string(),
        vec![],
        Utc::now(),
    );
    store.put_api_key("proj-1", &key).await.unwrap();

    let now = Utc::now();
    assert!(store.touch_api_key("proj-1", "key-1", now).await.unwrap());
    assert!(!store.touch_api_key("proj-1", "gone", now).await.unwrap());

    let found = store.find_project("pub-1").await.unwrap().unwrap();
    assert_eq!(found.name, "Demo");
    assert_eq!(found.api_keys.len(), 1);
    assert!(found.api_keys[0].last_used.is_some());

    assert!(store.remove_api_key("proj-1", "key-1").await.unwrap());
    let found = store.find_project("pub-1").await.unwrap().unwrap();
    assert!(found.api_keys.is_empty());
    assert!(store.find_project("pub-2").await.unwrap().is_none());
}

#[tokio::test]
#[ignore]
async fn test_config_and_rules() {
    let store = fresh_store().await;

    let entry = ConfigEntry::new("proj-1", Environment::Prod, "limit", json!(5), true).unwrap();
    store.put_config_entry(&entry).await.unwrap();

    let entries = store
        .config_entries("proj-1", Environment::Prod)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].value.to_json(), json!(5));
    assert!(store
        .config_entries("proj-1", Environment::Dev)
        .await
        .unwrap()
        .is_empty());

    for value in ["1.0.0", "2.0.0"] {
        store
            .push_access_rule(&AccessRule::block("proj-1", RuleType::Version, value, "old", "Update"))
            .await
            .unwrap();
    }
    let rules = store.access_rules("proj-1").await.unwrap();
    assert_eq!(rules[0].value, "1.0.0");
    assert_eq!(rules[1].value, "2.0.0");
}

#[tokio::test]
#[ignore]
async fn test_instance_upsert() {
    let store = fresh_store().await;
    let heartbeat = Heartbeat {
        instance_id: "i-1".to_string(),
        platform: Some("linux".to_string()),
        ..Default::default()
    };

    store
        .upsert_instance("proj-1", &heartbeat, Utc::now())
        .await
        .unwrap();
    let second = store
        .upsert_instance("proj-1", &heartbeat, Utc::now())
        .await
        .unwrap();

    assert_eq!(second.request_count, 2);
    assert_eq!(store.list_instances("proj-1").await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore]
async fn test_license_lifecycle() {
    let store = fresh_store().await;
    let license = License::issue(
        "PRO-AAAA-BBBB-CCCC".to_string(),
        "proj-1".to_string(),
        "Ada".to_string(),
        String::new(),
        LicenseType::Lifetime,
        None,
        Utc::now(),
    );

    assert!(store.insert_license(&license).await.unwrap());
    assert!(!store.insert_license(&license).await.unwrap());

    let key = license.key.as_str();
    assert_eq!(
        store.bind_hardware("proj-1", key, "A").await.unwrap(),
        BindOutcome::Bound
    );
    assert_eq!(
        store.bind_hardware("proj-1", key, "B").await.unwrap(),
        BindOutcome::AlreadyBound("A".to_string())
    );
    assert_eq!(
        store.bind_hardware("proj-1", "PRO-0000-0000-0000", "A").await.unwrap(),
        BindOutcome::Missing
    );

    assert!(store.mark_validated("proj-1", key, Utc::now()).await.unwrap());
    assert!(store
        .set_license_status("proj-1", key, LicenseStatus::Suspended)
        .await
        .unwrap());
    assert!(store.clear_hardware("proj-1", key).await.unwrap());

    let stored = store.find_license("proj-1", key).await.unwrap().unwrap();
    assert_eq!(stored.status, LicenseStatus::Suspended);
    assert!(stored.hardware_id.is_none());
    assert!(stored.last_validated.is_some());
}
