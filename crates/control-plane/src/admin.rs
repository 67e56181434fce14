//! Admin operations on project credentials and telemetry.

use beacon_common::{mask_secret, ApiKey, Error, Instance, Result};
use rand::RngCore;
use tracing::info;

use crate::reauth::ElevatedGrant;
use crate::service::ControlPlane;

const SECRET_PREFIX: &str = "sk_";
const API_KEY_PREFIX: &str = "ak_";

fn random_token(prefix: &str, len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", prefix, hex::encode(bytes))
}

pub fn generate_secret_key() -> String {
    random_token(SECRET_PREFIX, 32)
}

pub fn generate_api_key() -> String {
    random_token(API_KEY_PREFIX, 24)
}

impl ControlPlane {
    pub async fn reveal_secret(&self, grant: &ElevatedGrant, public_id: &str) -> Result<String> {
        grant.ensure_active(self.clock.now_utc())?;
        let project = self.project(public_id).await?;

        info!(
            "Secret of project {} revealed to {}",
            public_id,
            grant.principal()
        );
        Ok(project.secret_key)
    }

    /// Replace the master secret. The old one stops working immediately.
    pub async fn rotate_secret(&self, grant: &ElevatedGrant, public_id: &str) -> Result<String> {
        grant.ensure_active(self.clock.now_utc())?;
        let mut project = self.project(public_id).await?;

        project.secret_key = generate_secret_key();
        self.store.save_project(&project).await?;

        info!(
            "Secret of project {} rotated by {} (now {})",
            public_id,
            grant.principal(),
            mask_secret(&project.secret_key)
        );
        Ok(project.secret_key)
    }

    pub async fn create_api_key(
        &self,
        grant: &ElevatedGrant,
        public_id: &str,
        name: &str,
        scopes: Vec<String>,
    ) -> Result<ApiKey> {
        grant.ensure_active(self.clock.now_utc())?;
        if name.trim().is_empty() {
            return Err(Error::invalid_request("name is required"));
        }
        if scopes.is_empty() {
            return Err(Error::invalid_request("at least one scope is required"));
        }

        let project = self.project(public_id).await?;
        let key = ApiKey::new(
            uuid::Uuid::new_v4().to_string(),
            name.to_string(),
            generate_api_key(),
            scopes,
            self.clock.now_utc(),
        );
        self.store.put_api_key(&project.id, &key).await?;

        info!(
            "API key {} ({}) created on project {} by {}",
            key.id,
            mask_secret(&key.key),
            public_id,
            grant.principal()
        );
        Ok(key)
    }

    pub async fn revoke_api_key(&self, public_id: &str, key_id: &str) -> Result<()> {
        let project = self.project(public_id).await?;
        if !self.store.remove_api_key(&project.id, key_id).await? {
            return Err(Error::invalid_request(format!("Unknown API key: {}", key_id)));
        }
        info!("API key {} revoked on project {}", key_id, public_id);
        Ok(())
    }

    pub async fn list_instances(&self, public_id: &str) -> Result<Vec<Instance>> {
        let project = self.project(public_id).await?;
        Ok(self.store.list_instances(&project.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_credentials_shape() {
        let secret = generate_secret_key();
        assert!(secret.starts_with("sk_"));
        assert_eq!(secret.len(), 3 + 64);

        let key = generate_api_key();
        assert!(key.starts_with("ak_"));
        assert_eq!(key.len(), 3 + 48);
        assert_ne!(generate_api_key(), key);
    }
}
