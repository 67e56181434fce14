//! Access rule evaluation.
//!
//! Rules are checked in the order they were stored. The first active block
//! rule whose value equals the matching request attribute wins; there is no
//! priority field. Only `block` rules are consulted, and matching is exact
//! string equality whatever condition the rule carries.

use beacon_common::{AccessRule, RuleAction, RuleType};
use tracing::debug;

/// Request attributes a rule can match. Absent attributes never match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestAttributes {
    pub version: Option<String>,
    pub ip: Option<String>,
    pub instance_id: Option<String>,
    pub hardware_id: Option<String>,
}

impl RequestAttributes {
    fn get(&self, rule_type: RuleType) -> Option<&str> {
        let value = match rule_type {
            RuleType::Version => self.version.as_deref(),
            RuleType::Ip => self.ip.as_deref(),
            RuleType::InstanceId => self.instance_id.as_deref(),
            RuleType::HardwareId => self.hardware_id.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Blocked { reason: String, message: String },
}

impl AccessDecision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, AccessDecision::Blocked { .. })
    }
}

pub fn evaluate_access(rules: &[AccessRule], request: &RequestAttributes) -> AccessDecision {
    let hit = rules
        .iter()
        .filter(|rule| rule.is_active && rule.action == RuleAction::Block)
        .find(|rule| request.get(rule.rule_type) == Some(rule.value.as_str()));

    match hit {
        Some(rule) => {
            debug!(
                "Access rule matched: type={:?} reason={}",
                rule.rule_type, rule.reason
            );
            AccessDecision::Blocked {
                reason: rule.reason.clone(),
                message: rule.message.clone(),
            }
        }
        None => AccessDecision::Allowed,
    }
}
