//! Storage seam and its Redis backend.
//!
//! Redis data model:
//! - project:{public_id} → Project JSON (API keys stripped)
//! - apikeys:{project_id} → Hash key_id → ApiKey JSON
//! - apikeys:{project_id}:last_used → Hash key_id → RFC 3339 timestamp
//! - config:{project_id}:{env} → Hash config key → ConfigEntry JSON
//! - rules:{project_id} → List of AccessRule JSON, insertion order
//! - instance:{project_id}:{instance_id} → Hash with instance fields
//! - instances:{project_id} → Set of instance ids
//! - license:{project_id}:{key} → Hash with license fields, `hardware_id` absent when unbound

use anyhow::{Context, Result};
use async_trait::async_trait;
use beacon_common::{
    mask_secret, AccessRule, ApiKey, ConfigEntry, Environment, Heartbeat, Instance, License,
    LicenseStatus, Project,
};
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::{debug, info};

/// Result of the conditional hardware bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// The license was unbound and now carries the presented hardware id
    Bound,
    /// Someone already holds the license (possibly the same hardware id)
    AlreadyBound(String),
    Missing,
}

/// Persistence primitives the control plane relies on.
///
/// `upsert_instance` and `bind_hardware` must be atomic: concurrent callers
/// never create duplicate instances, and at most one caller binds an
/// unbound license.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_project(&self, public_id: &str) -> Result<Option<Project>>;

    /// Persist project fields. `project.api_keys` is ignored; keys are
    /// managed through [`Store::put_api_key`] and [`Store::remove_api_key`].
    async fn save_project(&self, project: &Project) -> Result<()>;

    async fn put_api_key(&self, project_id: &str, key: &ApiKey) -> Result<()>;

    async fn remove_api_key(&self, project_id: &str, key_id: &str) -> Result<bool>;

    /// Returns false when the key no longer exists.
    async fn touch_api_key(&self, project_id: &str, key_id: &str, at: DateTime<Utc>) -> Result<bool>;

    async fn put_config_entry(&self, entry: &ConfigEntry) -> Result<()>;

    async fn config_entries(&self, project_id: &str, env: Environment) -> Result<Vec<ConfigEntry>>;

    async fn push_access_rule(&self, rule: &AccessRule) -> Result<()>;

    /// All rules of a project, in insertion order.
    async fn access_rules(&self, project_id: &str) -> Result<Vec<AccessRule>>;

    async fn upsert_instance(
        &self,
        project_id: &str,
        heartbeat: &Heartbeat,
        at: DateTime<Utc>,
    ) -> Result<Instance>;

    async fn list_instances(&self, project_id: &str) -> Result<Vec<Instance>>;

    /// Returns false when a license with the same key already exists.
    async fn insert_license(&self, license: &License) -> Result<bool>;

    async fn find_license(&self, project_id: &str, key: &str) -> Result<Option<License>>;

    /// Set `hardware_id` only if it is currently unset.
    async fn bind_hardware(&self, project_id: &str, key: &str, hwid: &str) -> Result<BindOutcome>;

    async fn mark_validated(&self, project_id: &str, key: &str, at: DateTime<Utc>) -> Result<bool>;

    async fn set_license_status(
        &self,
        project_id: &str,
        key: &str,
        status: LicenseStatus,
    ) -> Result<bool>;

    async fn clear_hardware(&self, project_id: &str, key: &str) -> Result<bool>;

    async fn health_check(&self) -> Result<()>;
}

const INSERT_IF_ABSENT_LUA: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1], unpack(ARGV))
return 1
"#;

const BIND_HARDWARE_LUA: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return {0, ''}
end
local current = redis.call('HGET', KEYS[1], 'hardware_id')
if not current or current == '' then
    redis.call('HSET', KEYS[1], 'hardware_id', ARGV[1])
    return {1, ARGV[1]}
end
return {2, current}
"#;

const SET_FIELD_IF_EXISTS_LUA: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
return 1
"#;

const CLEAR_FIELD_IF_EXISTS_LUA: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
redis.call('HDEL', KEYS[1], ARGV[1])
return 1
"#;

const TOUCH_API_KEY_LUA: &str = r#"
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 0 then
    return 0
end
redis.call('HSET', KEYS[2], ARGV[1], ARGV[2])
return 1
"#;

/// Redis-backed [`Store`].
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn new(redis_url: &str) -> Result<Self> {
        info!("Connecting to Redis at {}", redis_url);

        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Successfully connected to Redis");

        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

fn project_key(public_id: &str) -> String {
    format!("project:{}", public_id)
}

fn api_keys_key(project_id: &str) -> String {
    format!("apikeys:{}", project_id)
}

fn api_keys_last_used_key(project_id: &str) -> String {
    format!("apikeys:{}:last_used", project_id)
}

fn config_key(project_id: &str, env: Environment) -> String {
    format!("config:{}:{}", project_id, env)
}

fn rules_key(project_id: &str) -> String {
    format!("rules:{}", project_id)
}

fn instance_key(project_id: &str, instance_id: &str) -> String {
    format!("instance:{}:{}", project_id, instance_id)
}

fn instances_key(project_id: &str) -> String {
    format!("instances:{}", project_id)
}

fn license_key(project_id: &str, key: &str) -> String {
    format!("license:{}:{}", project_id, key)
}

fn parse_time(map: &HashMap<String, String>, field: &str) -> Result<Option<DateTime<Utc>>> {
    match map.get(field).filter(|s| !s.is_empty()) {
        Some(raw) => {
            let parsed = DateTime::parse_from_rfc3339(raw)
                .with_context(|| format!("Invalid timestamp in field {}", field))?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
        None => Ok(None),
    }
}

fn required<'a>(map: &'a HashMap<String, String>, field: &str) -> Result<&'a str> {
    map.get(field)
        .map(String::as_str)
        .with_context(|| format!("Missing field {}", field))
}

fn optional(map: &HashMap<String, String>, field: &str) -> Option<String> {
    map.get(field).filter(|s| !s.is_empty()).cloned()
}

fn instance_from_hash(project_id: &str, map: &HashMap<String, String>) -> Result<Instance> {
    Ok(Instance {
        project_id: project_id.to_string(),
        instance_id: required(map, "instance_id")?.to_string(),
        hardware_id: optional(map, "hardware_id"),
        platform: optional(map, "platform"),
        version: optional(map, "version"),
        ip: optional(map, "ip"),
        first_seen: parse_time(map, "first_seen")?.context("Missing field first_seen")?,
        last_heartbeat: parse_time(map, "last_heartbeat")?
            .context("Missing field last_heartbeat")?,
        request_count: required(map, "request_count")?
            .parse()
            .context("Invalid request_count")?,
    })
}

fn license_from_hash(map: &HashMap<String, String>) -> Result<License> {
    Ok(License {
        key: required(map, "key")?.to_string(),
        project_id: required(map, "project_id")?.to_string(),
        holder_name: required(map, "holder_name")?.to_string(),
        email: required(map, "email")?.to_string(),
        license_type: required(map, "license_type")?
            .parse()
            .context("Invalid license_type")?,
        status: required(map, "status")?.parse().context("Invalid status")?,
        hardware_id: optional(map, "hardware_id"),
        expires_at: parse_time(map, "expires_at")?,
        last_validated: parse_time(map, "last_validated")?,
        created_at: parse_time(map, "created_at")?.context("Missing field created_at")?,
    })
}

fn license_to_fields(license: &License) -> Vec<String> {
    let mut fields = vec![
        ("key", license.key.clone()),
        ("project_id", license.project_id.clone()),
        ("holder_name", license.holder_name.clone()),
        ("email", license.email.clone()),
        ("license_type", license.license_type.to_string()),
        ("status", license.status.to_string()),
        ("created_at", license.created_at.to_rfc3339()),
    ];
    if let Some(hwid) = &license.hardware_id {
        fields.push(("hardware_id", hwid.clone()));
    }
    if let Some(expires_at) = license.expires_at {
        fields.push(("expires_at", expires_at.to_rfc3339()));
    }
    if let Some(last_validated) = license.last_validated {
        fields.push(("last_validated", last_validated.to_rfc3339()));
    }

    fields
        .into_iter()
        .flat_map(|(name, value)| [name.to_string(), value])
        .collect()
}

#[async_trait]
impl Store for RedisStore {
    async fn find_project(&self, public_id: &str) -> Result<Option<Project>> {
        let mut conn = self.conn();

        let json: Option<String> = conn.get(project_key(public_id)).await?;
        let mut project: Project = match json {
            Some(data) => serde_json::from_str(&data).context("Failed to deserialize project")?,
            None => {
                debug!("Project not found: {}", public_id);
                return Ok(None);
            }
        };

        let raw_keys: HashMap<String, String> = conn.hgetall(api_keys_key(&project.id)).await?;
        let last_used: HashMap<String, String> =
            conn.hgetall(api_keys_last_used_key(&project.id)).await?;

        let mut api_keys = Vec::with_capacity(raw_keys.len());
        for (key_id, data) in raw_keys {
            let mut key: ApiKey =
                serde_json::from_str(&data).context("Failed to deserialize API key")?;
            if let Some(at) = parse_time(&last_used, &key_id)? {
                key.last_used = Some(at);
            }
            api_keys.push(key);
        }
        api_keys.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        project.api_keys = api_keys;

        Ok(Some(project))
    }

    async fn save_project(&self, project: &Project) -> Result<()> {
        let mut stored = project.clone();
        stored.api_keys.clear();

        let json = serde_json::to_string(&stored).context("Failed to serialize project")?;
        let _: () = self.conn().set(project_key(&project.public_id), json).await?;

        info!("Saved project: {}", project.public_id);
        Ok(())
    }

    async fn put_api_key(&self, project_id: &str, key: &ApiKey) -> Result<()> {
        let json = serde_json::to_string(key).context("Failed to serialize API key")?;
        let _: () = self.conn().hset(api_keys_key(project_id), &key.id, json).await?;

        info!(
            "Stored API key {} ({}) for project {}",
            key.id,
            mask_secret(&key.key),
            project_id
        );
        Ok(())
    }

    async fn remove_api_key(&self, project_id: &str, key_id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let removed: i64 = conn.hdel(api_keys_key(project_id), key_id).await?;
        let _: i64 = conn.hdel(api_keys_last_used_key(project_id), key_id).await?;
        Ok(removed > 0)
    }

    async fn touch_api_key(&self, project_id: &str, key_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let touched: i64 = redis::Script::new(TOUCH_API_KEY_LUA)
            .key(api_keys_key(project_id))
            .key(api_keys_last_used_key(project_id))
            .arg(key_id)
            .arg(at.to_rfc3339())
            .invoke_async(&mut self.conn())
            .await?;
        Ok(touched == 1)
    }

    async fn put_config_entry(&self, entry: &ConfigEntry) -> Result<()> {
        let json = serde_json::to_string(entry).context("Failed to serialize config entry")?;
        let _: () = self
            .conn()
            .hset(config_key(&entry.project_id, entry.environment), &entry.key, json)
            .await?;
        Ok(())
    }

    async fn config_entries(&self, project_id: &str, env: Environment) -> Result<Vec<ConfigEntry>> {
        let raw: Vec<String> = self.conn().hvals(config_key(project_id, env)).await?;

        let mut entries = raw
            .iter()
            .map(|data| serde_json::from_str(data).context("Failed to deserialize config entry"))
            .collect::<Result<Vec<ConfigEntry>>>()?;
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(entries)
    }

    async fn push_access_rule(&self, rule: &AccessRule) -> Result<()> {
        let json = serde_json::to_string(rule).context("Failed to serialize access rule")?;
        let _: () = self.conn().rpush(rules_key(&rule.project_id), json).await?;
        Ok(())
    }

    async fn access_rules(&self, project_id: &str) -> Result<Vec<AccessRule>> {
        let raw: Vec<String> = self.conn().lrange(rules_key(project_id), 0, -1).await?;

        raw.iter()
            .map(|data| serde_json::from_str(data).context("Failed to deserialize access rule"))
            .collect()
    }

    async fn upsert_instance(
        &self,
        project_id: &str,
        heartbeat: &Heartbeat,
        at: DateTime<Utc>,
    ) -> Result<Instance> {
        let key = instance_key(project_id, &heartbeat.instance_id);
        let now = at.to_rfc3339();

        let reported = [
            ("hardware_id", &heartbeat.hardware_id),
            ("platform", &heartbeat.platform),
            ("version", &heartbeat.version),
            ("ip", &heartbeat.ip),
        ];

        let mut present = vec![
            ("instance_id", heartbeat.instance_id.clone()),
            ("last_heartbeat", now.clone()),
        ];
        let mut absent = Vec::new();
        for (field, value) in reported {
            match value {
                Some(v) => present.push((field, v.clone())),
                None => absent.push(field),
            }
        }

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_nx(&key, "first_seen", &now)
            .ignore()
            .hset_multiple(&key, &present)
            .ignore();
        if !absent.is_empty() {
            pipe.hdel(&key, &absent).ignore();
        }
        pipe.hincr(&key, "request_count", 1)
            .ignore()
            .sadd(instances_key(project_id), &heartbeat.instance_id)
            .ignore()
            .hgetall(&key);

        let (fields,): (HashMap<String, String>,) = pipe.query_async(&mut self.conn()).await?;
        let instance = instance_from_hash(project_id, &fields)?;

        debug!(
            "Heartbeat for instance {} in project {} (count={})",
            instance.instance_id, project_id, instance.request_count
        );
        Ok(instance)
    }

    async fn list_instances(&self, project_id: &str) -> Result<Vec<Instance>> {
        let mut conn = self.conn();
        let mut ids: Vec<String> = conn.smembers(instances_key(project_id)).await?;
        ids.sort();

        let mut instances = Vec::with_capacity(ids.len());
        for instance_id in ids {
            let fields: HashMap<String, String> =
                conn.hgetall(instance_key(project_id, &instance_id)).await?;
            if !fields.is_empty() {
                instances.push(instance_from_hash(project_id, &fields)?);
            }
        }

        Ok(instances)
    }

    async fn insert_license(&self, license: &License) -> Result<bool> {
        let created: i64 = redis::Script::new(INSERT_IF_ABSENT_LUA)
            .key(license_key(&license.project_id, &license.key))
            .arg(license_to_fields(license))
            .invoke_async(&mut self.conn())
            .await?;

        if created == 1 {
            info!(
                "Issued license {} for project {}",
                mask_secret(&license.key),
                license.project_id
            );
        }
        Ok(created == 1)
    }

    async fn find_license(&self, project_id: &str, key: &str) -> Result<Option<License>> {
        let fields: HashMap<String, String> =
            self.conn().hgetall(license_key(project_id, key)).await?;

        if fields.is_empty() {
            return Ok(None);
        }
        license_from_hash(&fields).map(Some)
    }

    async fn bind_hardware(&self, project_id: &str, key: &str, hwid: &str) -> Result<BindOutcome> {
        let (code, holder): (i64, String) = redis::Script::new(BIND_HARDWARE_LUA)
            .key(license_key(project_id, key))
            .arg(hwid)
            .invoke_async(&mut self.conn())
            .await?;

        Ok(match code {
            0 => BindOutcome::Missing,
            1 => BindOutcome::Bound,
            _ => BindOutcome::AlreadyBound(holder),
        })
    }

    async fn mark_validated(&self, project_id: &str, key: &str, at: DateTime<Utc>) -> Result<bool> {
        let updated: i64 = redis::Script::new(SET_FIELD_IF_EXISTS_LUA)
            .key(license_key(project_id, key))
            .arg("last_validated")
            .arg(at.to_rfc3339())
            .invoke_async(&mut self.conn())
            .await?;
        Ok(updated == 1)
    }

    async fn set_license_status(
        &self,
        project_id: &str,
        key: &str,
        status: LicenseStatus,
    ) -> Result<bool> {
        let updated: i64 = redis::Script::new(SET_FIELD_IF_EXISTS_LUA)
            .key(license_key(project_id, key))
            .arg("status")
            .arg(status.as_str())
            .invoke_async(&mut self.conn())
            .await?;
        Ok(updated == 1)
    }

    async fn clear_hardware(&self, project_id: &str, key: &str) -> Result<bool> {
        let cleared: i64 = redis::Script::new(CLEAR_FIELD_IF_EXISTS_LUA)
            .key(license_key(project_id, key))
            .arg("hardware_id")
            .invoke_async(&mut self.conn())
            .await?;
        Ok(cleared == 1)
    }

    async fn health_check(&self) -> Result<()> {
        let _: String = redis::cmd("PING")
            .query_async(&mut self.conn())
            .await
            .context("Redis health check failed")?;
        Ok(())
    }
}
