//! API request handlers for the control plane

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, FromRequestParts, Path, Query, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use beacon_common::{Environment, Error, ErrorKind, Heartbeat};
use beacon_policy::{ConfigResponse, Credentials, LicenseVerdict};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::licensing::NewLicense;
use crate::models::{
    ActionResponse, ApiKeyResponse, ConfigQuery, CreateApiKeyRequest, GenerateLicenseRequest,
    HeartbeatRequest, HeartbeatResponse, InstancesResponse, LicenseResponse, SecretResponse,
    ValidateLicenseRequest,
};
use crate::pipeline::ConfigRequest;
use crate::reauth::{ElevatedGrant, ReAuthenticate};
use crate::service::ControlPlane;

pub const CLIENT_ID_HEADER: &str = "x-client-id";
pub const SECRET_HEADER: &str = "x-secret";
pub const ADMIN_USER_HEADER: &str = "x-admin-user";
pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

/// Shared application state
pub struct AppState {
    pub plane: ControlPlane,
    pub authority: Arc<dyn ReAuthenticate>,
    /// Take the client IP from `x-forwarded-for` instead of the socket
    pub trust_proxy: bool,
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: Value,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match (&err, err.kind()) {
            (Error::MaintenanceActive { .. }, _) => StatusCode::SERVICE_UNAVAILABLE,
            (_, ErrorKind::PolicyBlocked) => StatusCode::FORBIDDEN,
            (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
            (_, ErrorKind::InvalidRequest) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::AuthenticationFailed) => StatusCode::UNAUTHORIZED,
            (_, ErrorKind::StateConflict) => StatusCode::CONFLICT,
            (_, ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &err {
            Error::ProjectNotFound | Error::LicenseNotFound => json!({ "error": err.to_string() }),
            Error::InvalidRequest(message) | Error::InvalidConfigValue(message) => json!({
                "error": "Invalid request",
                "message": message
            }),
            Error::MaintenanceActive { message } => json!({
                "error": "Maintenance mode",
                "maintenance": true,
                "message": message
            }),
            Error::AccessBlocked { reason, message } => json!({
                "error": "Access denied",
                "reason": reason,
                "message": message
            }),
            Error::ReAuthenticationFailed => json!({ "error": "Authentication failed" }),
            Error::GrantExpired => json!({ "error": "Re-authentication required" }),
            Error::Json(_) | Error::Storage(_) => {
                error!("Request failed: {:#}", err);
                json!({ "error": "Internal server error" })
            }
        };

        ApiError { status, body }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // Parser positions stay in the log
        debug!("Rejected request body: {}", rejection.body_text());
        ApiError {
            status: StatusCode::BAD_REQUEST,
            body: json!({
                "error": "Invalid request",
                "message": "Malformed JSON body"
            }),
        }
    }
}

/// Client IP as seen by the control plane.
///
/// Missing when neither a socket address nor a trusted forwarded header is
/// available; an absent IP never matches an ip rule.
pub struct ClientIp(pub Option<String>);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if state.trust_proxy {
            let forwarded = parts
                .headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());

            if let Some(ip) = forwarded {
                return Ok(ClientIp(Some(ip.to_string())));
            }
        }

        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientIp(ip))
    }
}

/// An admin who passed re-authentication on this request.
pub struct AdminGrant(pub ElevatedGrant);

impl FromRequestParts<Arc<AppState>> for AdminGrant {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = header(&parts.headers, ADMIN_USER_HEADER).unwrap_or_default();
        let password = header(&parts.headers, ADMIN_PASSWORD_HEADER).unwrap_or_default();

        let grant = state
            .authority
            .reauthenticate(user, password, state.plane.clock.now_utc())?;

        Ok(AdminGrant(grant))
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.plane.store().health_check().await {
        Ok(()) => Json(json!({
            "status": "healthy",
            "service": "beacon-control-plane"
        }))
        .into_response(),
        Err(e) => {
            error!("Health check failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "beacon-control-plane"
                })),
            )
                .into_response()
        }
    }
}

/// Resolve the config response for a client
pub async fn config_handler(
    State(state): State<Arc<AppState>>,
    Path(public_id): Path<String>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    Query(query): Query<ConfigQuery>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let env = match query.env.as_deref().filter(|e| !e.is_empty()) {
        Some(env) => env.parse::<Environment>()?,
        None => Environment::default(),
    };

    let request = ConfigRequest {
        env,
        attributes: beacon_policy::RequestAttributes {
            version: non_empty(query.version),
            ip,
            instance_id: non_empty(query.instance_id),
            hardware_id: non_empty(query.hardware_id),
        },
    };

    let credentials = Credentials {
        client_id: header(&headers, CLIENT_ID_HEADER),
        secret: header(&headers, SECRET_HEADER),
    };

    let response = state
        .plane
        .resolve_config(&public_id, &request, credentials)
        .await?;

    Ok(Json(response))
}

/// Record a heartbeat from a running instance
pub async fn heartbeat_handler(
    State(state): State<Arc<AppState>>,
    Path(public_id): Path<String>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let Json(payload) = payload?;
    let heartbeat = Heartbeat {
        instance_id: payload.instance_id.unwrap_or_default(),
        hardware_id: non_empty(payload.hardware_id),
        platform: non_empty(payload.platform),
        version: non_empty(payload.version),
        ip,
    };

    state.plane.record_heartbeat(&public_id, heartbeat).await?;

    Ok(Json(HeartbeatResponse { status: "ok" }))
}

/// Validate a license key for a hardware id
pub async fn validate_license_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ValidateLicenseRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let rejected = |status: StatusCode, message: &str| {
        (status, Json(json!({ "valid": false, "message": message }))).into_response()
    };

    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            debug!("Rejected license validation body: {}", rejection.body_text());
            return Ok(rejected(StatusCode::BAD_REQUEST, "Missing required fields"));
        }
    };

    let outcome = state
        .plane
        .validate_license(
            payload.key.as_deref(),
            payload.hwid.as_deref(),
            payload.public_id.as_deref(),
        )
        .await;

    match outcome {
        Ok(verdict) => {
            let status = if verdict.valid {
                StatusCode::OK
            } else {
                StatusCode::FORBIDDEN
            };
            Ok((status, Json::<LicenseVerdict>(verdict)).into_response())
        }
        Err(Error::InvalidRequest(_)) => {
            Ok(rejected(StatusCode::BAD_REQUEST, "Missing required fields"))
        }
        Err(Error::ProjectNotFound) => Ok(rejected(StatusCode::NOT_FOUND, "Project not found")),
        Err(e) => Err(e.into()),
    }
}

/// Issue a new license
pub async fn generate_license_handler(
    State(state): State<Arc<AppState>>,
    AdminGrant(grant): AdminGrant,
    Path(public_id): Path<String>,
    payload: Result<Json<GenerateLicenseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LicenseResponse>), ApiError> {
    let Json(payload) = payload?;
    info!(
        "{} generating license for project {}",
        grant.principal(),
        public_id
    );

    let license = state
        .plane
        .generate_license(
            &public_id,
            NewLicense {
                holder_name: payload.holder_name,
                email: payload.email,
                license_type: payload.license_type,
                expires_at: payload.expires_at,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(LicenseResponse { license })))
}

/// Suspend a license
pub async fn revoke_license_handler(
    State(state): State<Arc<AppState>>,
    AdminGrant(_grant): AdminGrant,
    Path((public_id, key)): Path<(String, String)>,
) -> Result<Json<ActionResponse>, ApiError> {
    state.plane.revoke_license(&public_id, &key).await?;

    Ok(Json(ActionResponse {
        success: true,
        message: "License revoked".to_string(),
    }))
}

/// Clear the hardware binding of a license
pub async fn reset_hardware_handler(
    State(state): State<Arc<AppState>>,
    AdminGrant(_grant): AdminGrant,
    Path((public_id, key)): Path<(String, String)>,
) -> Result<Json<ActionResponse>, ApiError> {
    state.plane.reset_hardware(&public_id, &key).await?;

    Ok(Json(ActionResponse {
        success: true,
        message: "Hardware binding reset".to_string(),
    }))
}

/// List instance telemetry
pub async fn list_instances_handler(
    State(state): State<Arc<AppState>>,
    AdminGrant(_grant): AdminGrant,
    Path(public_id): Path<String>,
) -> Result<Json<InstancesResponse>, ApiError> {
    let instances = state.plane.list_instances(&public_id).await?;
    let total = instances.len();

    Ok(Json(InstancesResponse { instances, total }))
}

/// Reveal the master secret
pub async fn reveal_secret_handler(
    State(state): State<Arc<AppState>>,
    AdminGrant(grant): AdminGrant,
    Path(public_id): Path<String>,
) -> Result<Json<SecretResponse>, ApiError> {
    let secret_key = state.plane.reveal_secret(&grant, &public_id).await?;

    Ok(Json(SecretResponse { secret_key }))
}

/// Rotate the master secret
pub async fn rotate_secret_handler(
    State(state): State<Arc<AppState>>,
    AdminGrant(grant): AdminGrant,
    Path(public_id): Path<String>,
) -> Result<Json<SecretResponse>, ApiError> {
    let secret_key = state.plane.rotate_secret(&grant, &public_id).await?;

    Ok(Json(SecretResponse { secret_key }))
}

/// Create an API key; the key is only ever shown here
pub async fn create_api_key_handler(
    State(state): State<Arc<AppState>>,
    AdminGrant(grant): AdminGrant,
    Path(public_id): Path<String>,
    payload: Result<Json<CreateApiKeyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiKeyResponse>), ApiError> {
    let Json(payload) = payload?;
    let api_key = state
        .plane
        .create_api_key(&grant, &public_id, &payload.name, payload.scopes)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiKeyResponse { api_key })))
}

/// Revoke an API key
pub async fn revoke_api_key_handler(
    State(state): State<Arc<AppState>>,
    AdminGrant(_grant): AdminGrant,
    Path((public_id, key_id)): Path<(String, String)>,
) -> Result<Json<ActionResponse>, ApiError> {
    state.plane.revoke_api_key(&public_id, &key_id).await?;

    Ok(Json(ActionResponse {
        success: true,
        message: format!("API key {} revoked", key_id),
    }))
}
