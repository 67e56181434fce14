//! License assessment.
//!
//! States, as seen by a validating client:
//!
//! - active-unbound: status active, no hardware id. The next validator claims it.
//! - active-bound: status active, hardware id set. Only that id validates.
//! - suspended: terminal for clients.
//! - expired-by-date: status active but `expiresAt` has passed (computed).
//!
//! [`assess_license`] only decides. Claiming an unbound license must be done
//! by the caller as an atomic conditional update, since two validators can
//! both observe the unbound state.

use beacon_common::{License, LicenseStatus, LicenseType};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

pub const KEY_PREFIX: &str = "PRO";

const KEY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const KEY_GROUPS: usize = 3;
const GROUP_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InvalidKey,
    Suspended,
    Expired,
    HardwareMismatch,
}

impl Rejection {
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::InvalidKey => "Invalid license key",
            Rejection::Suspended => "License suspended",
            Rejection::Expired => "License expired",
            Rejection::HardwareMismatch => "HWID Mismatch. License is locked to another device.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assessment {
    Reject(Rejection),
    /// Unbound: bind to the presented hardware id, then authorize
    Claim,
    /// Bound to exactly the presented hardware id
    Matched,
}

/// Decide what a validation attempt does to `license`.
///
/// Order: status, then expiry, then the hardware lock. Any stored status
/// other than active is terminal and reported as suspended.
pub fn assess_license(license: &License, hwid: &str, now: DateTime<Utc>) -> Assessment {
    if license.status != LicenseStatus::Active {
        return Assessment::Reject(Rejection::Suspended);
    }

    if let Some(expires_at) = license.expires_at {
        if now > expires_at {
            return Assessment::Reject(Rejection::Expired);
        }
    }

    match license.hardware_id.as_deref() {
        None => Assessment::Claim,
        Some(bound) if bound == hwid => Assessment::Matched,
        Some(_) => Assessment::Reject(Rejection::HardwareMismatch),
    }
}

/// What a successful validation discloses. Never the key or hardware id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseDisclosure {
    pub holder: String,
    #[serde(rename = "type")]
    pub license_type: LicenseType,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseVerdict {
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseDisclosure>,
}

impl LicenseVerdict {
    pub fn authorized(license: &License) -> Self {
        Self {
            valid: true,
            message: "Authorized".to_string(),
            license: Some(LicenseDisclosure {
                holder: license.holder_name.clone(),
                license_type: license.license_type,
                expires_at: license.expires_at,
            }),
        }
    }

    pub fn rejected(rejection: Rejection) -> Self {
        Self {
            valid: false,
            message: rejection.message().to_string(),
            license: None,
        }
    }
}

/// New key in the `PRO-XXXX-XXXX-XXXX` format.
pub fn generate_license_key<R: Rng>(rng: &mut R) -> String {
    let mut key = String::from(KEY_PREFIX);
    for _ in 0..KEY_GROUPS {
        key.push('-');
        for _ in 0..GROUP_LEN {
            let idx = rng.gen_range(0..KEY_ALPHABET.len());
            key.push(KEY_ALPHABET[idx] as char);
        }
    }
    key
}

pub fn is_well_formed_key(key: &str) -> bool {
    let mut parts = key.split('-');
    if parts.next() != Some(KEY_PREFIX) {
        return false;
    }

    let groups: Vec<&str> = parts.collect();
    groups.len() == KEY_GROUPS
        && groups
            .iter()
            .all(|g| g.len() == GROUP_LEN && g.bytes().all(|b| KEY_ALPHABET.contains(&b)))
}
