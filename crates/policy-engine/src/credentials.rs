//! Client credential resolution.

use beacon_common::Project;
use serde::Serialize;
use subtle::ConstantTimeEq;

/// Privilege level of a client-facing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Admin,
    Scoped,
    Anonymous,
}

impl Tier {
    /// Admin and scoped callers see the full response.
    pub fn sees_everything(&self) -> bool {
        !matches!(self, Tier::Anonymous)
    }
}

/// Claimed credentials, straight from `x-client-id` / `x-secret`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    pub client_id: Option<&'a str>,
    pub secret: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierResolution {
    pub tier: Tier,
    /// API key that authenticated a scoped caller
    pub api_key_id: Option<String>,
}

impl TierResolution {
    fn of(tier: Tier) -> Self {
        Self {
            tier,
            api_key_id: None,
        }
    }
}

/// Resolve the caller's tier against a project.
///
/// Projects without client auth treat every caller as admin. Otherwise the
/// master secret wins over API keys. An API key counts when it carries at
/// least one scope; which scopes it carries is not checked. Failed credentials degrade to anonymous, never to an error.
pub fn resolve_tier(project: &Project, credentials: Credentials<'_>) -> TierResolution {
    if !project.client_auth.enabled {
        return TierResolution::of(Tier::Admin);
    }

    let (client_id, secret) = match (credentials.client_id, credentials.secret) {
        (Some(id), Some(secret)) if !secret.is_empty() => (id, secret),
        _ => return TierResolution::of(Tier::Anonymous),
    };

    if !secure_eq(client_id, &project.public_id) {
        return TierResolution::of(Tier::Anonymous);
    }

    if secure_eq(secret, &project.secret_key) {
        return TierResolution::of(Tier::Admin);
    }

    let matched = project
        .api_keys
        .iter()
        .find(|k| secure_eq(secret, &k.key) && !k.scopes.is_empty());

    match matched {
        Some(key) => TierResolution {
            tier: Tier::Scoped,
            api_key_id: Some(key.id.clone()),
        },
        None => TierResolution::of(Tier::Anonymous),
    }
}

fn secure_eq(presented: &str, stored: &str) -> bool {
    presented.as_bytes().ct_eq(stored.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_common::ApiKey;
    use chrono::Utc;

    fn project(auth_enabled: bool) -> Project {
        let mut project = Project::new(
            "p1".to_string(),
            "pub_1".to_string(),
            "App".to_string(),
            "sk_master".to_string(),
        );
        project.client_auth.enabled = auth_enabled;
        project.api_keys.push(ApiKey::new(
            "k1".to_string(),
            "ci".to_string(),
            "ak_reader".to_string(),
            vec!["read".to_string()],
            Utc::now(),
        ));
        project.api_keys.push(ApiKey::new(
            "k2".to_string(),
            "no scopes".to_string(),
            "ak_bare".to_string(),
            Vec::new(),
            Utc::now(),
        ));
        project
    }

    fn creds<'a>(id: &'a str, secret: &'a str) -> Credentials<'a> {
        Credentials {
            client_id: Some(id),
            secret: Some(secret),
        }
    }

    #[test]
    fn test_auth_disabled_is_admin_for_everyone() {
        let resolution = resolve_tier(&project(false), Credentials::default());
        assert_eq!(resolution.tier, Tier::Admin);
        assert_eq!(resolution.api_key_id, None);
    }

    #[test]
    fn test_master_secret_is_admin() {
        let resolution = resolve_tier(&project(true), creds("pub_1", "sk_master"));
        assert_eq!(resolution.tier, Tier::Admin);
    }

    #[test]
    fn test_api_key_is_scoped_and_reports_key_id() {
        let resolution = resolve_tier(&project(true), creds("pub_1", "ak_reader"));
        assert_eq!(resolution.tier, Tier::Scoped);
        assert_eq!(resolution.api_key_id.as_deref(), Some("k1"));

    }

    #[test]
    fn test_api_key_without_scopes_is_anonymous() {
        let bare = resolve_tier(&project(true), creds("pub_1", "ak_bare"));
        assert_eq!(bare.tier, Tier::Anonymous);
        assert_eq!(bare.api_key_id, None);
    }

    #[test]
    fn test_wrong_client_id_degrades_to_anonymous() {
        let resolution = resolve_tier(&project(true), creds("pub_other", "sk_master"));
        assert_eq!(resolution.tier, Tier::Anonymous);
    }

    #[test]
    fn test_missing_or_wrong_secret_is_anonymous() {
        let p = project(true);
        assert_eq!(resolve_tier(&p, creds("pub_1", "nope")).tier, Tier::Anonymous);
        assert_eq!(resolve_tier(&p, creds("pub_1", "")).tier, Tier::Anonymous);
        assert_eq!(
            resolve_tier(
                &p,
                Credentials {
                    client_id: Some("pub_1"),
                    secret: None,
                }
            )
            .tier,
            Tier::Anonymous
        );
    }

    #[test]
    fn test_rotated_secret_stops_granting_admin() {
        let mut p = project(true);
        p.secret_key = "sk_rotated".to_string();

        assert_eq!(resolve_tier(&p, creds("pub_1", "sk_master")).tier, Tier::Anonymous);
        assert_eq!(resolve_tier(&p, creds("pub_1", "sk_rotated")).tier, Tier::Admin);
    }
}
