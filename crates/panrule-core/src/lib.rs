// panrule-core: Policy rule-group reconciliation engine between panrule-api
// and the host (the panrule CLI, or any other driver of the resources).

pub mod appliance;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod location;
pub mod migrate;
pub mod model;
pub mod position;
pub mod resource;
pub mod rulebase;
pub mod schema;

// ── Primary re-exports ──────────────────────────────────────────────
pub use appliance::Appliance;
pub use codec::{Attributes, AuditComments};
pub use config::{ApplianceConfig, AuthCredentials, TlsVerification};
pub use error::CoreError;
pub use identity::{GroupIdentity, PolicyIdentity};
pub use location::{Family, Location, RulebaseSlot, Topology};
pub use migrate::{MigrationContext, SCHEMA_VERSION, StoredState};
pub use position::{Placement, Position};
pub use resource::{
    PolicyResource, ResourceData, ResourceKind, RuleGroupResource, RulebaseDataSource, Timeouts,
};
pub use rulebase::{ConfigureRequest, EditSummary, RulebaseClient, RulebaseEdit};
pub use schema::Schema;

pub use model::{DecryptionRule, NatRule, PolicyRule, SecurityRule};
