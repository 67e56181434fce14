//! In-process [`Store`] with the same semantics as the Redis backend.
//!
//! Every operation runs under one lock, which makes the conditional bind and
//! the instance upsert atomic.

use anyhow::Result;
use async_trait::async_trait;
use beacon_common::{
    AccessRule, ApiKey, ConfigEntry, Environment, Heartbeat, Instance, License, LicenseStatus,
    Project,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use crate::storage::{BindOutcome, Store};

#[derive(Default)]
struct Inner {
    projects: HashMap<String, Project>,
    api_keys: HashMap<String, Vec<ApiKey>>,
    config: HashMap<(String, Environment), BTreeMap<String, ConfigEntry>>,
    rules: HashMap<String, Vec<AccessRule>>,
    instances: HashMap<String, BTreeMap<String, Instance>>,
    licenses: HashMap<(String, String), License>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn license_slot(project_id: &str, key: &str) -> (String, String) {
    (project_id.to_string(), key.to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_project(&self, public_id: &str) -> Result<Option<Project>> {
        let inner = self.inner.lock().await;

        Ok(inner.projects.get(public_id).map(|project| {
            let mut project = project.clone();
            project.api_keys = inner.api_keys.get(&project.id).cloned().unwrap_or_default();
            project
        }))
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        let mut stored = project.clone();
        stored.api_keys.clear();

        let mut inner = self.inner.lock().await;
        inner.projects.insert(stored.public_id.clone(), stored);
        Ok(())
    }

    async fn put_api_key(&self, project_id: &str, key: &ApiKey) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let keys = inner.api_keys.entry(project_id.to_string()).or_default();

        match keys.iter_mut().find(|k| k.id == key.id) {
            Some(existing) => *existing = key.clone(),
            None => keys.push(key.clone()),
        }
        Ok(())
    }

    async fn remove_api_key(&self, project_id: &str, key_id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let Some(keys) = inner.api_keys.get_mut(project_id) else {
            return Ok(false);
        };

        let before = keys.len();
        keys.retain(|k| k.id != key_id);
        Ok(keys.len() != before)
    }

    async fn touch_api_key(&self, project_id: &str, key_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let key = inner
            .api_keys
            .get_mut(project_id)
            .and_then(|keys| keys.iter_mut().find(|k| k.id == key_id));

        match key {
            Some(key) => {
                key.last_used = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn put_config_entry(&self, entry: &ConfigEntry) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .config
            .entry((entry.project_id.clone(), entry.environment))
            .or_default()
            .insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn config_entries(&self, project_id: &str, env: Environment) -> Result<Vec<ConfigEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .config
            .get(&(project_id.to_string(), env))
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn push_access_rule(&self, rule: &AccessRule) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .rules
            .entry(rule.project_id.clone())
            .or_default()
            .push(rule.clone());
        Ok(())
    }

    async fn access_rules(&self, project_id: &str) -> Result<Vec<AccessRule>> {
        let inner = self.inner.lock().await;
        Ok(inner.rules.get(project_id).cloned().unwrap_or_default())
    }

    async fn upsert_instance(
        &self,
        project_id: &str,
        heartbeat: &Heartbeat,
        at: DateTime<Utc>,
    ) -> Result<Instance> {
        let mut inner = self.inner.lock().await;
        let instances = inner.instances.entry(project_id.to_string()).or_default();

        let instance = match instances.get_mut(&heartbeat.instance_id) {
            Some(existing) => {
                existing.refresh(heartbeat, at);
                existing.clone()
            }
            None => {
                let created = Instance::first_sight(project_id, heartbeat, at);
                instances.insert(heartbeat.instance_id.clone(), created.clone());
                created
            }
        };

        Ok(instance)
    }

    async fn list_instances(&self, project_id: &str) -> Result<Vec<Instance>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .instances
            .get(project_id)
            .map(|instances| instances.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_license(&self, license: &License) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let slot = license_slot(&license.project_id, &license.key);

        if inner.licenses.contains_key(&slot) {
            return Ok(false);
        }
        inner.licenses.insert(slot, license.clone());
        Ok(true)
    }

    async fn find_license(&self, project_id: &str, key: &str) -> Result<Option<License>> {
        let inner = self.inner.lock().await;
        Ok(inner.licenses.get(&license_slot(project_id, key)).cloned())
    }

    async fn bind_hardware(&self, project_id: &str, key: &str, hwid: &str) -> Result<BindOutcome> {
        let mut inner = self.inner.lock().await;
        let Some(license) = inner.licenses.get_mut(&license_slot(project_id, key)) else {
            return Ok(BindOutcome::Missing);
        };

        match &license.hardware_id {
            Some(holder) => Ok(BindOutcome::AlreadyBound(holder.clone())),
            None => {
                license.hardware_id = Some(hwid.to_string());
                Ok(BindOutcome::Bound)
            }
        }
    }

    async fn mark_validated(&self, project_id: &str, key: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.licenses.get_mut(&license_slot(project_id, key)) {
            Some(license) => {
                license.last_validated = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_license_status(
        &self,
        project_id: &str,
        key: &str,
        status: LicenseStatus,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.licenses.get_mut(&license_slot(project_id, key)) {
            Some(license) => {
                license.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear_hardware(&self, project_id: &str, key: &str) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.licenses.get_mut(&license_slot(project_id, key)) {
            Some(license) => {
                license.hardware_id = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_common::LicenseType;
    use chrono::Duration;

    fn license(key: &str) -> License {
        License::issue(
            key.to_string(),
            "p1".to_string(),
            "Ada".to_string(),
            "ada@example.com".to_string(),
            LicenseType::Trial,
            None,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_project_round_trip_keeps_keys_separate() {
        let store = MemoryStore::new();
        let mut project = Project::new(
            "p1".to_string(),
            "pub_1".to_string(),
            "App".to_string(),
            "sk".to_string(),
        );
        let key = ApiKey::new(
            "k1".to_string(),
            "ci".to_string(),
            "ak_1".to_string(),
            vec![],
            Utc::now(),
        );
        project.api_keys.push(key.clone());

        store.save_project(&project).await.unwrap();
        let loaded = store.find_project("pub_1").await.unwrap().unwrap();
        assert!(loaded.api_keys.is_empty());

        store.put_api_key("p1", &key).await.unwrap();
        let at = Utc::now();
        assert!(store.touch_api_key("p1", "k1", at).await.unwrap());
        assert!(!store.touch_api_key("p1", "missing", at).await.unwrap());

        let loaded = store.find_project("pub_1").await.unwrap().unwrap();
        assert_eq!(loaded.api_keys.len(), 1);
        assert_eq!(loaded.api_keys[0].last_used, Some(at));

        assert!(store.remove_api_key("p1", "k1").await.unwrap());
        assert!(!store.remove_api_key("p1", "k1").await.unwrap());
    }

    #[tokio::test]
    async fn test_rules_keep_insertion_order() {
        use beacon_common::RuleType;

        let store = MemoryStore::new();
        for value in ["c", "a", "b"] {
            let rule = AccessRule::block("p1", RuleType::Ip, value, value, value);
            store.push_access_rule(&rule).await.unwrap();
        }

        let values: Vec<String> = store
            .access_rules("p1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_upsert_instance_never_duplicates() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        let heartbeat = Heartbeat {
            instance_id: "i-1".to_string(),
            ..Default::default()
        };

        store.upsert_instance("p1", &heartbeat, t0).await.unwrap();
        let second = store
            .upsert_instance("p1", &heartbeat, t0 + Duration::seconds(5))
            .await
            .unwrap();

        assert_eq!(second.request_count, 2);
        assert_eq!(second.first_seen, t0);
        assert_eq!(store.list_instances("p1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bind_is_compare_and_set() {
        let store = MemoryStore::new();
        assert!(store.insert_license(&license("PRO-AAAA-BBBB-CCCC")).await.unwrap());
        assert!(!store.insert_license(&license("PRO-AAAA-BBBB-CCCC")).await.unwrap());

        assert_eq!(
            store.bind_hardware("p1", "PRO-AAAA-BBBB-CCCC", "A").await.unwrap(),
            BindOutcome::Bound
        );
        assert_eq!(
            store.bind_hardware("p1", "PRO-AAAA-BBBB-CCCC", "B").await.unwrap(),
            BindOutcome::AlreadyBound("A".to_string())
        );
        assert_eq!(
            store.bind_hardware("p1", "PRO-XXXX-XXXX-XXXX", "A").await.unwrap(),
            BindOutcome::Missing
        );

        assert!(store.clear_hardware("p1", "PRO-AAAA-BBBB-CCCC").await.unwrap());
        assert_eq!(
            store.bind_hardware("p1", "PRO-AAAA-BBBB-CCCC", "B").await.unwrap(),
            BindOutcome::Bound
        );
    }
}
