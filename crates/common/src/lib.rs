//! Shared data model for Beacon.
//!
//! Every crate in the workspace speaks in these types: the stored entities
//! (projects, config entries, access rules, instances, licenses), the error
//! taxonomy returned to callers, and the clock seam used for anything that
//! depends on wall time.

pub mod access_rule;
pub mod clock;
pub mod config_value;
pub mod error;
pub mod instance;
pub mod license;
pub mod project;

pub use access_rule::{AccessRule, RuleAction, RuleCondition, RuleType};
pub use clock::{Clock, SharedClock, SystemClock};
pub use config_value::{ConfigEntry, ConfigValue, Environment};
pub use error::{Error, ErrorKind, Result};
pub use instance::{Heartbeat, Instance};
pub use license::{License, LicenseStatus, LicenseType};
pub use project::{mask_secret, ApiKey, ClientAuth, Project};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
