//! Re-authentication for sensitive admin operations.
//!
//! Revealing or rotating a project secret and minting API keys require an
//! [`ElevatedGrant`]. Grants only come out of a [`ReAuthenticate`]
//! implementation and expire after a fixed lifetime.

use beacon_common::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

/// Proof that `principal` re-presented their credential recently.
#[derive(Debug, Clone)]
pub struct ElevatedGrant {
    principal: String,
    expires_at: DateTime<Utc>,
}

impl ElevatedGrant {
    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn ensure_active(&self, now: DateTime<Utc>) -> Result<()> {
        if now >= self.expires_at {
            return Err(Error::GrantExpired);
        }
        Ok(())
    }
}

pub trait ReAuthenticate: Send + Sync {
    fn reauthenticate(
        &self,
        principal: &str,
        credential: &str,
        now: DateTime<Utc>,
    ) -> Result<ElevatedGrant>;
}

struct PrincipalRecord {
    salt: [u8; 16],
    digest: [u8; 32],
}

fn digest(salt: &[u8], credential: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(credential.as_bytes());
    hasher.finalize().into()
}

/// In-process credential check against salted SHA-256 digests.
pub struct CredentialAuthority {
    principals: HashMap<String, PrincipalRecord>,
    grant_ttl: Duration,
}

impl CredentialAuthority {
    pub fn new(grant_ttl: Duration) -> Self {
        Self {
            principals: HashMap::new(),
            grant_ttl,
        }
    }

    pub fn with_principal(mut self, principal: &str, credential: &str) -> Self {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let record = PrincipalRecord {
            salt,
            digest: digest(&salt, credential),
        };
        self.principals.insert(principal.to_string(), record);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

impl ReAuthenticate for CredentialAuthority {
    fn reauthenticate(
        &self,
        principal: &str,
        credential: &str,
        now: DateTime<Utc>,
    ) -> Result<ElevatedGrant> {
        let Some(record) = self.principals.get(principal) else {
            // Hash anyway so unknown principals cost the same
            let _ = digest(&[0u8; 16], credential);
            warn!("Re-authentication for unknown principal {}", principal);
            return Err(Error::ReAuthenticationFailed);
        };

        let presented = digest(&record.salt, credential);
        if !bool::from(presented.ct_eq(&record.digest)) {
            warn!("Re-authentication failed for {}", principal);
            return Err(Error::ReAuthenticationFailed);
        }

        info!("Elevated grant issued to {}", principal);
        Ok(ElevatedGrant {
            principal: principal.to_string(),
            expires_at: now + self.grant_ttl,
        })
    }
}
