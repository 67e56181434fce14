//! Beacon policy engine
//!
//! Pure request-time decisions for client-facing endpoints. Nothing here
//! touches storage or the network; the control plane feeds these functions
//! records it has already loaded and acts on what they return.
//!
//! - [`version`]: numeric-aware dotted version ordering
//! - [`access`]: first-match block rule evaluation
//! - [`credentials`]: admin / scoped / anonymous tier resolution
//! - [`disclosure`]: anonymous field filtering of config responses
//! - [`license`]: license assessment, verdicts and key generation

pub mod access;
pub mod credentials;
pub mod disclosure;
pub mod license;
pub mod version;

pub use access::{evaluate_access, AccessDecision, RequestAttributes};
pub use credentials::{resolve_tier, Credentials, Tier, TierResolution};
pub use disclosure::{filter_response, ConfigResponse};
pub use license::{
    assess_license, generate_license_key, is_well_formed_key, Assessment, LicenseDisclosure,
    LicenseVerdict, Rejection,
};
pub use version::{compare_versions, is_at_least};
