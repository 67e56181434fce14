//! Request and response bodies of the HTTP surface.

use beacon_common::{ApiKey, Instance, License, LicenseType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Query string of `GET /v1/config/{publicId}`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigQuery {
    pub env: Option<String>,
    pub version: Option<String>,
    pub instance_id: Option<String>,
    pub hardware_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    pub instance_id: Option<String>,
    pub hardware_id: Option<String>,
    pub platform: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub status: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateLicenseRequest {
    pub key: Option<String>,
    pub hwid: Option<String>,
    pub public_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateLicenseRequest {
    pub holder_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "type")]
    pub license_type: LicenseType,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct LicenseResponse {
    pub license: License,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretResponse {
    pub secret_key: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    pub api_key: ApiKey,
}

#[derive(Debug, Serialize)]
pub struct InstancesResponse {
    pub instances: Vec<Instance>,
    pub total: usize,
}

/// Outcome of a state-changing admin call
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}
