//! `identity` subcommand: decode and encode composite ids, offline.

use serde::Serialize;

use panrule_core::{GroupIdentity, Location, Placement, PolicyIdentity, Topology};

use crate::cli::{GlobalOpts, IdentityArgs, IdentityCommand};
use crate::error::CliError;
use crate::output;

use super::util;

/// A decoded identity, re-encoded in the current layout.
#[derive(Debug, Serialize)]
struct Decoded {
    id: String,
    #[serde(flatten)]
    location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    placement: Option<Placement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    names: Option<Vec<String>>,
}

impl From<GroupIdentity> for Decoded {
    fn from(identity: GroupIdentity) -> Self {
        Self {
            id: identity.encode(),
            location: identity.location,
            placement: Some(identity.placement),
            names: Some(identity.names),
        }
    }
}

impl From<PolicyIdentity> for Decoded {
    fn from(identity: PolicyIdentity) -> Self {
        Self {
            id: identity.encode(),
            location: identity.location,
            placement: None,
            names: None,
        }
    }
}

fn detail(decoded: &Decoded) -> String {
    let loc = &decoded.location;
    let mut lines = vec![
        format!("ID:           {}", decoded.id),
        format!("Family:       {}", loc.family),
        format!("Device group: {}", loc.device_group),
        format!("Rulebase:     {}", loc.rulebase),
        format!("Vsys:         {}", loc.vsys),
    ];
    if let Some(placement) = &decoded.placement {
        let position = match (placement.position.to_string().as_str(), placement.reference.as_str()) {
            ("", _) => "(none)".to_owned(),
            (keyword, "") => keyword.to_owned(),
            (keyword, reference) => format!("{keyword} {reference:?}"),
        };
        lines.push(format!("Position:     {position}"));
    }
    if let Some(names) = &decoded.names {
        lines.push(format!("Rules ({}):", names.len()));
        lines.extend(names.iter().map(|n| format!("  {n}")));
    }
    lines.join("\n")
}

pub fn handle(args: IdentityArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Offline: fall back to the firewall layout unless told otherwise.
    let topology = global.topology.map_or(Topology::Standalone, Topology::from);

    let decoded: Decoded = match args.command {
        IdentityCommand::Decode { id, family, policy } => {
            let family = util::family(family);
            if policy {
                PolicyIdentity::decode(&id, topology, family)?.into()
            } else {
                GroupIdentity::decode(&id, topology, family)?.into()
            }
        }
        IdentityCommand::Encode {
            location,
            position,
            reference,
            names,
        } => {
            let identity = GroupIdentity {
                location: util::location(&location, topology)?,
                placement: util::placement(position, reference.as_deref()),
                names,
            };
            identity.placement.validate(&identity.names)?;
            identity.into()
        }
    };

    let out = output::render_single(&global.output, &decoded, detail, |d| d.id.clone())?;
    output::print_output(&out, global.quiet)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use panrule_core::{Family, Position};

    use super::*;

    #[test]
    fn legacy_group_id_is_re_encoded() {
        let identity = GroupIdentity::decode("vsys2:0::eA==", Topology::Standalone, Family::Security)
            .expect("legacy layout decodes");
        let decoded = Decoded::from(identity);
        assert_eq!(decoded.id, "shared:rulebase:vsys2:0::eA==");
        assert_eq!(decoded.names.as_deref(), Some(&["x".to_owned()][..]));
        assert_eq!(
            decoded.placement.map(|p| p.position),
            Some(Position::Unspecified)
        );
    }

    #[test]
    fn detail_omits_group_fields_for_policies() {
        let identity = PolicyIdentity::decode("vsys1", Topology::Standalone, Family::Nat)
            .expect("decodes");
        let text = detail(&Decoded::from(identity));
        assert!(text.contains("Family:       nat"));
        assert!(!text.contains("Rules"));
    }
}
