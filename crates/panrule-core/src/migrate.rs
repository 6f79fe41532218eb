// ── State migration ──
//
// Stored state is upgraded one schema version at a time before it is read.
// Migrators only rewrite the stored bag and identity; they never talk to
// the appliance.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::codec::{Attributes, RULE_BLOCK};
use crate::error::CoreError;
use crate::identity::{GroupIdentity, PolicyIdentity};
use crate::location::{Family, Location, Topology};
use crate::resource::ResourceKind;

/// Current version of every resource schema.
pub const SCHEMA_VERSION: u32 = 2;

/// State as persisted by the host between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub attributes: Attributes,
}

/// What a migrator may depend on besides the stored state itself.
#[derive(Debug, Clone, Copy)]
pub struct MigrationContext {
    pub kind: ResourceKind,
    pub topology: Topology,
    pub family: Family,
}

type Migrator = fn(&mut StoredState, &MigrationContext) -> Result<(), CoreError>;

/// `MIGRATIONS[v]` upgrades version `v` to `v + 1`.
const MIGRATIONS: [Migrator; SCHEMA_VERSION as usize] = [v0_location_defaults, v1_nat_labels];

/// Upgrade `state` in place to [`SCHEMA_VERSION`].
///
/// Returns whether anything was migrated.
pub fn upgrade(state: &mut StoredState, ctx: &MigrationContext) -> Result<bool, CoreError> {
    let from = state.schema_version;
    if from > SCHEMA_VERSION {
        return Err(CoreError::Config {
            message: format!(
                "state was written by schema version {from}, newer than the supported {SCHEMA_VERSION}"
            ),
        });
    }

    for (version, migrate) in MIGRATIONS.iter().enumerate().skip(from as usize) {
        debug!(version, kind = %ctx.kind, "migrating stored state");
        migrate(state, ctx)?;
    }
    state.schema_version = SCHEMA_VERSION;

    let migrated = from < SCHEMA_VERSION;
    if migrated {
        info!(from, to = SCHEMA_VERSION, kind = %ctx.kind, "upgraded stored state");
    }
    Ok(migrated)
}

// ── v0 → v1 ──────────────────────────────────────────────────────────

/// Early releases stored only the pieces of the location the topology
/// needed. Re-encode the identity in the full form and write the location
/// attributes back into the bag.
fn v0_location_defaults(state: &mut StoredState, ctx: &MigrationContext) -> Result<(), CoreError> {
    let location = if state.id.is_empty() {
        location_from_bag(&state.attributes, ctx)?
    } else {
        match ctx.kind {
            ResourceKind::RuleGroup => {
                let identity = GroupIdentity::decode(&state.id, ctx.topology, ctx.family)?;
                state.id = identity.encode();
                identity.location
            }
            ResourceKind::Policy => {
                let identity = PolicyIdentity::decode(&state.id, ctx.topology, ctx.family)?;
                state.id = identity.encode();
                identity.location
            }
        }
    };

    let attrs = &mut state.attributes;
    for (key, value) in [
        ("device_group", location.device_group.clone()),
        ("rulebase", location.rulebase.to_string()),
        ("vsys", location.vsys.clone()),
    ] {
        let unset = attrs
            .get(key)
            .is_none_or(|v| v.is_null() || v.as_str() == Some(""));
        if unset {
            attrs.insert(key.to_owned(), Value::String(value));
        }
    }
    Ok(())
}

fn location_from_bag(attrs: &Attributes, ctx: &MigrationContext) -> Result<Location, CoreError> {
    let text = |key: &str| attrs.get(key).and_then(Value::as_str);
    let rulebase = text("rulebase")
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| CoreError::validation("rulebase", format!("unknown rulebase {s:?}")))
        })
        .transpose()?;
    Location::resolve(
        ctx.topology,
        ctx.family,
        text("device_group"),
        rulebase,
        text("vsys"),
    )
}

// ── v1 → v2 ──────────────────────────────────────────────────────────

/// NAT source translation labels gained an `-ip` suffix.
fn v1_nat_labels(state: &mut StoredState, ctx: &MigrationContext) -> Result<(), CoreError> {
    if ctx.family != Family::Nat {
        return Ok(());
    }
    rename_enum_values(
        &mut state.attributes,
        "sat_type",
        &[("static", "static-ip"), ("dynamic", "dynamic-ip")],
    );
    Ok(())
}

/// Rename enumerated values of attribute `key` in every `rule` block.
///
/// Values not listed in `renames` are left alone. Returns how many values
/// were rewritten.
pub fn rename_enum_values(attrs: &mut Attributes, key: &str, renames: &[(&str, &str)]) -> usize {
    let Some(Value::Array(rules)) = attrs.get_mut(RULE_BLOCK) else {
        return 0;
    };

    let mut renamed = 0;
    for rule in rules.iter_mut().filter_map(Value::as_object_mut) {
        let Some(Value::String(current)) = rule.get_mut(key) else {
            continue;
        };
        if let Some((_, new)) = renames.iter().find(|(old, _)| *old == current.as_str()) {
            *current = (*new).to_owned();
            renamed += 1;
        }
    }
    renamed
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::location::RulebaseSlot;
    use crate::position::{Placement, Position};

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => Attributes::new(),
        }
    }

    fn ctx(kind: ResourceKind, topology: Topology, family: Family) -> MigrationContext {
        MigrationContext {
            kind,
            topology,
            family,
        }
    }

    #[test]
    fn legacy_group_identity_gains_topology_defaults() {
        let names = GroupIdentity {
            location: Location::resolve(Topology::Controller, Family::Security, None, None, None)
                .expect("valid"),
            placement: Placement::new(Position::Top, ""),
            names: vec!["a".into(), "b".into()],
        }
        .encode();
        let legacy = names.splitn(4, ':').nth(3).expect("has a tail").to_owned();
        assert_eq!(legacy.split(':').count(), 3);

        let mut state = StoredState {
            schema_version: 0,
            id: legacy,
            attributes: attrs(json!({ "rule": [{ "name": "a" }, { "name": "b" }] })),
        };
        let changed = upgrade(
            &mut state,
            &ctx(ResourceKind::RuleGroup, Topology::Controller, Family::Security),
        )
        .expect("migrates");

        assert!(changed);
        assert_eq!(state.schema_version, SCHEMA_VERSION);
        assert!(state.id.starts_with("shared:pre-rulebase:vsys1:5::"));
        assert_eq!(state.attributes.get("rulebase"), Some(&json!("pre-rulebase")));
        assert_eq!(state.attributes.get("device_group"), Some(&json!("shared")));

        let decoded = GroupIdentity::decode(&state.id, Topology::Controller, Family::Security)
            .expect("current form");
        assert_eq!(decoded.names, vec!["a", "b"]);
    }

    #[test]
    fn legacy_policy_identity_on_firewall() {
        let mut state = StoredState {
            schema_version: 0,
            id: "vsys2".into(),
            attributes: Attributes::new(),
        };
        upgrade(
            &mut state,
            &ctx(ResourceKind::Policy, Topology::Standalone, Family::Decryption),
        )
        .expect("migrates");
        assert_eq!(state.id, "shared:rulebase:vsys2");
        assert_eq!(state.attributes.get("vsys"), Some(&json!("vsys2")));
        assert_eq!(
            state.attributes.get("rulebase"),
            Some(&json!(RulebaseSlot::Rulebase.to_string()))
        );
    }

    #[test]
    fn declared_location_is_kept() {
        let mut state = StoredState {
            schema_version: 0,
            id: String::new(),
            attributes: attrs(json!({ "device_group": "branch", "rulebase": "post-rulebase" })),
        };
        upgrade(
            &mut state,
            &ctx(ResourceKind::RuleGroup, Topology::Controller, Family::Security),
        )
        .expect("migrates");
        assert_eq!(state.attributes.get("device_group"), Some(&json!("branch")));
        assert_eq!(state.attributes.get("rulebase"), Some(&json!("post-rulebase")));
    }

    #[test]
    fn nat_source_translation_labels_are_renamed() {
        let mut state = StoredState {
            schema_version: 1,
            id: String::new(),
            attributes: attrs(json!({ "rule": [
                { "name": "a", "sat_type": "static" },
                { "name": "b", "sat_type": "dynamic-ip-and-port" },
                { "name": "c", "sat_type": "dynamic" }
            ]})),
        };
        upgrade(
            &mut state,
            &ctx(ResourceKind::RuleGroup, Topology::Standalone, Family::Nat),
        )
        .expect("migrates");
        let types: Vec<_> = state.attributes["rule"]
            .as_array()
            .expect("list")
            .iter()
            .map(|r| r["sat_type"].clone())
            .collect();
        assert_eq!(types, vec![json!("static-ip"), json!("dynamic-ip-and-port"), json!("dynamic-ip")]);
    }

    #[test]
    fn rename_leaves_other_values_alone() {
        let mut bag = attrs(json!({ "rule": [
            { "name": "a", "kind": "predefined" },
            { "name": "b", "kind": "custom" },
            { "name": "c" }
        ]}));
        let renamed = rename_enum_values(&mut bag, "kind", &[("predefined", "predefined-ip")]);
        assert_eq!(renamed, 1);
        assert_eq!(bag["rule"][0]["kind"], json!("predefined-ip"));
        assert_eq!(bag["rule"][1]["kind"], json!("custom"));
    }

    #[test]
    fn current_state_is_untouched() {
        let original = StoredState {
            schema_version: SCHEMA_VERSION,
            id: "shared:rulebase:vsys1".into(),
            attributes: attrs(json!({ "vsys": "vsys1" })),
        };
        let mut state = original.clone();
        let changed = upgrade(
            &mut state,
            &ctx(ResourceKind::Policy, Topology::Standalone, Family::Security),
        )
        .expect("no-op");
        assert!(!changed);
        assert_eq!(state, original);
    }

    #[test]
    fn newer_state_is_rejected() {
        let mut state = StoredState {
            schema_version: SCHEMA_VERSION + 1,
            ..StoredState::default()
        };
        let err = upgrade(
            &mut state,
            &ctx(ResourceKind::Policy, Topology::Standalone, Family::Security),
        )
        .expect_err("too new");
        assert!(matches!(err, CoreError::Config { .. }));
    }
}
