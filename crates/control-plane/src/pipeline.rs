//! Config fetch and heartbeat recording.

use beacon_common::{Environment, Error, Heartbeat, Instance, Result};
use beacon_policy::{
    evaluate_access, filter_response, is_at_least, resolve_tier, AccessDecision, ConfigResponse,
    Credentials, RequestAttributes,
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::service::ControlPlane;
use crate::worker::ApiKeyTouch;

/// Everything a config fetch carries besides the project id and credentials.
#[derive(Debug, Clone, Default)]
pub struct ConfigRequest {
    pub env: Environment,
    /// Version, instance id and hardware id from the query; ip from the transport
    pub attributes: RequestAttributes,
}

impl ControlPlane {
    /// Resolve the config response for a client.
    ///
    /// Order: project lookup, maintenance short-circuit, access rules,
    /// response assembly, then credential tier and disclosure filtering when
    /// the project gates anonymous callers.
    pub async fn resolve_config(
        &self,
        public_id: &str,
        request: &ConfigRequest,
        credentials: Credentials<'_>,
    ) -> Result<ConfigResponse> {
        let project = self.project(public_id).await?;

        if project.maintenance_mode {
            debug!("Project {} is in maintenance mode", public_id);
            return Err(Error::MaintenanceActive {
                message: self.maintenance_message.clone(),
            });
        }

        let rules: Vec<_> = self
            .store
            .access_rules(&project.id)
            .await?
            .into_iter()
            .filter(|rule| rule.is_active)
            .collect();

        if let AccessDecision::Blocked { reason, message } =
            evaluate_access(&rules, &request.attributes)
        {
            warn!("Config fetch blocked for project {}: {}", public_id, reason);
            return Err(Error::AccessBlocked { reason, message });
        }

        let update_required =
            !is_at_least(request.attributes.version.as_deref(), &project.min_version);

        let mut project_ns = Map::new();
        project_ns.insert("name".to_string(), Value::from(project.name.clone()));
        project_ns.insert(
            "latestVersion".to_string(),
            Value::from(project.latest_version.clone()),
        );
        project_ns.insert(
            "minVersion".to_string(),
            Value::from(project.min_version.clone()),
        );
        project_ns.insert(
            "updateUrl".to_string(),
            Value::from(project.update_url.clone()),
        );
        project_ns.insert("updateRequired".to_string(), Value::Bool(update_required));

        let config_ns: Map<String, Value> = self
            .store
            .config_entries(&project.id, request.env)
            .await?
            .into_iter()
            .filter(|entry| entry.is_enabled)
            .map(|entry| (entry.key, entry.value.to_json()))
            .collect();

        let response = ConfigResponse {
            project: project_ns,
            config: config_ns,
        };

        if !project.client_auth.enabled {
            return Ok(response);
        }

        let resolution = resolve_tier(&project, credentials);
        if let Some(key_id) = resolution.api_key_id {
            self.touches.fire(ApiKeyTouch {
                project_id: project.id.clone(),
                key_id,
                at: self.clock.now_utc(),
            });
        }

        debug!(
            "Config for project {} resolved at tier {:?}",
            public_id, resolution.tier
        );
        Ok(filter_response(
            response,
            &project.client_auth.public_fields,
            resolution.tier,
        ))
    }

    /// Record a heartbeat. Existence is idempotent; `requestCount` is not.
    pub async fn record_heartbeat(&self, public_id: &str, heartbeat: Heartbeat) -> Result<Instance> {
        if heartbeat.instance_id.trim().is_empty() {
            return Err(Error::invalid_request("instanceId is required"));
        }

        let project = self.project(public_id).await?;
        let instance = self
            .store
            .upsert_instance(&project.id, &heartbeat, self.clock.now_utc())
            .await?;

        if instance.request_count == 1 {
            info!(
                "New instance {} registered for project {}",
                instance.instance_id, public_id
            );
        }
        Ok(instance)
    }
}
