use thiserror::Error;

/// Coarse category of a failure, used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidRequest,
    PolicyBlocked,
    AuthenticationFailed,
    StateConflict,
    Internal,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Project not found")]
    ProjectNotFound,

    #[error("License not found")]
    LicenseNotFound,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Maintenance mode")]
    MaintenanceActive { message: String },

    #[error("Access denied: {reason}")]
    AccessBlocked { reason: String, message: String },

    #[error("Invalid config value: {0}")]
    InvalidConfigValue(String),

    #[error("Re-authentication failed")]
    ReAuthenticationFailed,

    #[error("Elevated grant expired")]
    GrantExpired,

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ProjectNotFound | Error::LicenseNotFound => ErrorKind::NotFound,
            Error::InvalidRequest(_) | Error::InvalidConfigValue(_) => ErrorKind::InvalidRequest,
            Error::MaintenanceActive { .. } | Error::AccessBlocked { .. } => {
                ErrorKind::PolicyBlocked
            }
            Error::ReAuthenticationFailed | Error::GrantExpired => ErrorKind::AuthenticationFailed,
            Error::Json(_) | Error::Storage(_) => ErrorKind::Internal,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Error::InvalidRequest(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
