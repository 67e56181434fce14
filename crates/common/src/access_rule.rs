//! Access rules: per-project block directives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request attribute a rule matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleType {
    Version,
    Ip,
    InstanceId,
    HardwareId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Block,
    Allow,
}

/// Stored alongside a rule. Matching is exact equality whatever this says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCondition {
    #[default]
    Equals,
    Contains,
    Gte,
    Lte,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRule {
    pub project_id: String,

    #[serde(rename = "type")]
    pub rule_type: RuleType,

    pub value: String,

    #[serde(default)]
    pub condition: RuleCondition,

    pub action: RuleAction,

    /// Machine-readable reason returned to blocked clients
    pub reason: String,

    /// User-facing message returned to blocked clients
    pub message: String,

    pub is_active: bool,

    /// Stored, not enforced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessRule {
    /// Active equality block rule.
    pub fn block(
        project_id: impl Into<String>,
        rule_type: RuleType,
        value: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            rule_type,
            value: value.into(),
            condition: RuleCondition::Equals,
            action: RuleAction::Block,
            reason: reason.into(),
            message: message.into(),
            is_active: true,
            expires_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_wire_names() {
        let rule = AccessRule::block("p1", RuleType::InstanceId, "i-1", "abuse", "Blocked");
        let json = serde_json::to_value(&rule).unwrap();

        assert_eq!(json["type"], "instanceId");
        assert_eq!(json["action"], "block");
        assert_eq!(json["condition"], "equals");
        assert_eq!(json["isActive"], true);
        assert!(json.get("expiresAt").is_none());
    }
}
