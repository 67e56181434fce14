//! License validation and lifecycle.

use beacon_common::{Error, License, LicenseStatus, LicenseType, Result};
use beacon_policy::{
    assess_license, generate_license_key, Assessment, LicenseVerdict, Rejection,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::service::ControlPlane;
use crate::storage::BindOutcome;

/// Attempts before giving up on finding an unused key.
const KEY_ALLOCATION_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct NewLicense {
    pub holder_name: String,
    pub email: String,
    pub license_type: LicenseType,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Blank counts as missing. The value itself is passed on untouched; the
/// hardware lock only accepts an exact match.
fn required(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl ControlPlane {
    /// Validate `key` for `hwid`, claiming the license on first use.
    ///
    /// Business outcomes come back as a verdict. Only missing inputs,
    /// unknown projects and storage failures are errors.
    pub async fn validate_license(
        &self,
        key: Option<&str>,
        hwid: Option<&str>,
        public_id: Option<&str>,
    ) -> Result<LicenseVerdict> {
        let (Some(key), Some(hwid), Some(public_id)) =
            (required(key), required(hwid), required(public_id))
        else {
            return Err(Error::invalid_request("Missing required fields"));
        };

        let project = self.project(public_id).await?;
        let now = self.clock.now_utc();

        let Some(license) = self.store.find_license(&project.id, key).await? else {
            debug!("Unknown license key presented for project {}", public_id);
            return Ok(LicenseVerdict::rejected(Rejection::InvalidKey));
        };

        match assess_license(&license, hwid, now) {
            Assessment::Reject(rejection) => {
                if rejection == Rejection::HardwareMismatch {
                    warn!("Hardware mismatch on license for {}", license.holder_name);
                }
                return Ok(LicenseVerdict::rejected(rejection));
            }
            Assessment::Matched => {}
            Assessment::Claim => match self.store.bind_hardware(&project.id, key, hwid).await? {
                BindOutcome::Bound => {
                    info!("License for {} bound to new hardware", license.holder_name)
                }
                BindOutcome::AlreadyBound(bound) if bound == hwid => {}
                BindOutcome::AlreadyBound(_) => {
                    warn!(
                        "License for {} claimed concurrently by other hardware",
                        license.holder_name
                    );
                    return Ok(LicenseVerdict::rejected(Rejection::HardwareMismatch));
                }
                BindOutcome::Missing => {
                    return Ok(LicenseVerdict::rejected(Rejection::InvalidKey));
                }
            },
        }

        self.store.mark_validated(&project.id, key, now).await?;
        Ok(LicenseVerdict::authorized(&license))
    }

    /// Issue a new active, unbound license with a fresh key.
    pub async fn generate_license(&self, public_id: &str, request: NewLicense) -> Result<License> {
        if request.holder_name.trim().is_empty() {
            return Err(Error::invalid_request("holderName is required"));
        }

        let project = self.project(public_id).await?;
        let now = self.clock.now_utc();

        for _ in 0..KEY_ALLOCATION_ATTEMPTS {
            let key = generate_license_key(&mut rand::thread_rng());
            let license = License::issue(
                key,
                project.id.clone(),
                request.holder_name.clone(),
                request.email.clone(),
                request.license_type,
                request.expires_at,
                now,
            );

            if self.store.insert_license(&license).await? {
                info!(
                    "Issued {} license for {} on project {}",
                    license.license_type, license.holder_name, public_id
                );
                return Ok(license);
            }
            debug!("License key collision, retrying");
        }

        Err(anyhow::anyhow!("Failed to allocate a unique license key").into())
    }

    /// Suspend a license. Clients see "License suspended" from now on.
    pub async fn revoke_license(&self, public_id: &str, key: &str) -> Result<()> {
        let project = self.project(public_id).await?;
        if !self
            .store
            .set_license_status(&project.id, key, LicenseStatus::Suspended)
            .await?
        {
            return Err(Error::LicenseNotFound);
        }
        info!("License revoked on project {}", public_id);
        Ok(())
    }

    /// Unbind the hardware id so the next validator claims the license.
    pub async fn reset_hardware(&self, public_id: &str, key: &str) -> Result<()> {
        let project = self.project(public_id).await?;
        if !self.store.clear_hardware(&project.id, key).await? {
            return Err(Error::LicenseNotFound);
        }
        info!("License hardware binding reset on project {}", public_id);
        Ok(())
    }
}
