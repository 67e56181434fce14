//! Software licenses and their hardware lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    Lifetime,
    Subscription,
    Trial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Suspended,
    Expired,
}

macro_rules! lowercase_enum_str {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(Error::invalid_request(format!(
                        "unknown {} '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

lowercase_enum_str!(LicenseType {
    Lifetime => "lifetime",
    Subscription => "subscription",
    Trial => "trial",
});

lowercase_enum_str!(LicenseStatus {
    Active => "active",
    Suspended => "suspended",
    Expired => "expired",
});

/// A license, bound to at most one hardware identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    /// `PRO-XXXX-XXXX-XXXX`, unique
    pub key: String,

    pub project_id: String,

    pub holder_name: String,

    pub email: String,

    #[serde(rename = "type")]
    pub license_type: LicenseType,

    pub status: LicenseStatus,

    /// `None` until the first successful validation claims the license
    #[serde(default)]
    pub hardware_id: Option<String>,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_validated: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl License {
    /// Fresh, active, unbound license.
    pub fn issue(
        key: String,
        project_id: String,
        holder_name: String,
        email: String,
        license_type: LicenseType,
        expires_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            project_id,
            holder_name,
            email,
            license_type,
            status: LicenseStatus::Active,
            hardware_id: None,
            expires_at,
            last_validated: None,
            created_at,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.hardware_id.is_some()
    }
}
