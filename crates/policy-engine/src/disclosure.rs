//! Anonymous disclosure filtering for config responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::credentials::Tier;

/// Body of a successful config fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub project: Map<String, Value>,
    pub config: Map<String, Value>,
}

/// Prune `response` to what `tier` may see.
///
/// Admin and scoped callers get everything. Anonymous callers get, in each
/// namespace, only the keys named in `public_fields`; an empty allow-list
/// discloses nothing rather than denying the request.
pub fn filter_response(
    response: ConfigResponse,
    public_fields: &BTreeSet<String>,
    tier: Tier,
) -> ConfigResponse {
    if tier.sees_everything() {
        return response;
    }

    ConfigResponse {
        project: retain_public(response.project, public_fields),
        config: retain_public(response.config, public_fields),
    }
}

fn retain_public(namespace: Map<String, Value>, public_fields: &BTreeSet<String>) -> Map<String, Value> {
    namespace
        .into_iter()
        .filter(|(key, _)| public_fields.contains(key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response() -> ConfigResponse {
        serde_json::from_value(json!({
            "project": {
                "name": "App",
                "latestVersion": "1.0.0",
                "updateRequired": false
            },
            "config": {
                "theme": "dark",
                "maxUploads": 5
            }
        }))
        .unwrap()
    }

    fn fields(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_privileged_tiers_are_unfiltered() {
        for tier in [Tier::Admin, Tier::Scoped] {
            assert_eq!(filter_response(response(), &BTreeSet::new(), tier), response());
        }
    }

    #[test]
    fn test_anonymous_sees_only_public_fields_in_both_namespaces() {
        let filtered = filter_response(response(), &fields(&["latestVersion", "theme"]), Tier::Anonymous);
        assert_eq!(
            serde_json::to_value(&filtered).unwrap(),
            json!({"project": {"latestVersion": "1.0.0"}, "config": {"theme": "dark"}})
        );
    }

    #[test]
    fn test_unknown_public_fields_are_skipped() {
        let filtered = filter_response(response(), &fields(&["doesNotExist"]), Tier::Anonymous);
        assert!(filtered.project.is_empty());
        assert!(filtered.config.is_empty());
    }

    #[test]
    fn test_empty_allow_list_discloses_nothing() {
        let filtered = filter_response(response(), &BTreeSet::new(), Tier::Anonymous);
        assert_eq!(
            serde_json::to_value(&filtered).unwrap(),
            json!({"project": {}, "config": {}})
        );
    }
}
