// ── Domain model ──
//
// Typed rule records for the three rulebase families. Each record embeds
// the shared `RuleCommon` skeleton and implements `PolicyRule`, which is
// all the engine needs to know about a family.

pub mod common;
pub mod decryption;
pub mod nat;
pub mod rule;
pub mod security;

pub use common::{ANY, RuleCommon, Targets, normalize_set, or_any};
pub use decryption::{DecryptionAction, DecryptionRule, DecryptionType};
pub use nat::{
    DestinationTranslation, DynamicIpAndPort, NatRule, NatType, SourceTranslation,
};
pub use rule::PolicyRule;
pub use security::{ProfileSetting, SecurityAction, SecurityProfiles, SecurityRule, SecurityRuleType};
