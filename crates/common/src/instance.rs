//! Instance telemetry, refreshed by heartbeats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness record, unique on (project, instance id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub project_id: String,
    pub instance_id: String,
    #[serde(default)]
    pub hardware_id: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    /// Incremented by every heartbeat, retries included
    pub request_count: u64,
}

/// Attributes reported by one heartbeat call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Heartbeat {
    pub instance_id: String,
    pub hardware_id: Option<String>,
    pub platform: Option<String>,
    pub version: Option<String>,
    pub ip: Option<String>,
}

impl Instance {
    /// Record for an instance seen for the first time.
    pub fn first_sight(project_id: &str, heartbeat: &Heartbeat, at: DateTime<Utc>) -> Self {
        Self {
            project_id: project_id.to_string(),
            instance_id: heartbeat.instance_id.clone(),
            hardware_id: heartbeat.hardware_id.clone(),
            platform: heartbeat.platform.clone(),
            version: heartbeat.version.clone(),
            ip: heartbeat.ip.clone(),
            first_seen: at,
            last_heartbeat: at,
            request_count: 1,
        }
    }

    /// Overwrite reported attributes and count the call.
    pub fn refresh(&mut self, heartbeat: &Heartbeat, at: DateTime<Utc>) {
        self.hardware_id = heartbeat.hardware_id.clone();
        self.platform = heartbeat.platform.clone();
        self.version = heartbeat.version.clone();
        self.ip = heartbeat.ip.clone();
        self.last_heartbeat = at;
        self.request_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_refresh_overwrites_and_counts() {
        let t0 = Utc::now();
        let mut instance = Instance::first_sight(
            "p1",
            &Heartbeat {
                instance_id: "i-1".to_string(),
                platform: Some("linux".to_string()),
                version: Some("1.0.0".to_string()),
                ..Default::default()
            },
            t0,
        );
        assert_eq!(instance.request_count, 1);

        let t1 = t0 + Duration::seconds(30);
        instance.refresh(
            &Heartbeat {
                instance_id: "i-1".to_string(),
                version: Some("1.1.0".to_string()),
                ..Default::default()
            },
            t1,
        );

        assert_eq!(instance.request_count, 2);
        assert_eq!(instance.version.as_deref(), Some("1.1.0"));
        assert_eq!(instance.platform, None);
        assert_eq!(instance.first_seen, t0);
        assert_eq!(instance.last_heartbeat, t1);
    }
}
