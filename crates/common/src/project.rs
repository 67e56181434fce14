//! Project: identity and policy root for one client application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Internal identifier, keys every child record
    pub id: String,

    /// Stable routing identifier disclosed to clients
    pub public_id: String,

    pub name: String,

    /// Master credential. Grants the admin tier when presented with `public_id`.
    pub secret_key: String,

    #[serde(default)]
    pub maintenance_mode: bool,

    #[serde(default)]
    pub min_version: String,

    #[serde(default)]
    pub latest_version: String,

    #[serde(default)]
    pub update_url: String,

    #[serde(default)]
    pub client_auth: ClientAuth,

    /// Secondary credentials, in creation order
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,

    pub created_at: DateTime<Utc>,
}

/// Opt-in gate on anonymous disclosure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAuth {
    #[serde(default)]
    pub enabled: bool,

    /// Field names from the `project` and `config` namespaces visible to
    /// anonymous callers
    #[serde(default)]
    pub public_fields: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub id: String,
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(id: String, public_id: String, name: String, secret_key: String) -> Self {
        Self {
            id,
            public_id,
            name,
            secret_key,
            maintenance_mode: false,
            min_version: String::new(),
            latest_version: String::new(),
            update_url: String::new(),
            client_auth: ClientAuth::default(),
            api_keys: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

impl ApiKey {
    pub fn new(
        id: String,
        name: String,
        key: String,
        scopes: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            key,
            scopes,
            created_at,
            last_used: None,
        }
    }
}

/// Short prefix of a credential for log lines.
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(6).collect();
    format!("{}…", prefix)
}
