// ── Composite identity codec ──
//
// The host stores a single string per managed resource. For a rule group it
// is `device-group:rulebase:vsys:position-code:reference:base64(names)`,
// the names being the newline-joined declared order at the last apply.
// Older releases stored shorter forms; `decode` upgrades them using the
// defaults of the current topology.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::error::CoreError;
use crate::location::{
    DEFAULT_DEVICE_GROUP, DEFAULT_VSYS, Family, Location, RulebaseSlot, Topology,
};
use crate::position::{Placement, Position};

pub const SEPARATOR: char = ':';

/// Typed form of a rule-group identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupIdentity {
    pub location: Location,
    pub placement: Placement,
    /// Declared rule names, in order, as of the last apply.
    pub names: Vec<String>,
}

impl GroupIdentity {
    pub fn encode(&self) -> String {
        let loc = &self.location;
        format!(
            "{dg}{s}{rb}{s}{vsys}{s}{code}{s}{reference}{s}{names}",
            s = SEPARATOR,
            dg = loc.device_group,
            rb = loc.rulebase,
            vsys = loc.vsys,
            code = self.placement.position.code(),
            reference = self.placement.reference,
            names = encode_names(&self.names),
        )
    }

    /// Decode an identity, accepting every historical layout.
    ///
    /// | tokens | layout                                       |
    /// |--------|----------------------------------------------|
    /// | 6      | `dg:rulebase:vsys:code:ref:names` (current)  |
    /// | 5      | `dg:rulebase:code:ref:names` (Panorama)      |
    /// | 4      | `vsys:code:ref:names` (firewall)             |
    /// | 3      | `code:ref:names`                             |
    pub fn decode(id: &str, topology: Topology, family: Family) -> Result<Self, CoreError> {
        let tokens: Vec<&str> = id.split(SEPARATOR).collect();
        let invalid = |message: String| CoreError::Identity {
            id: id.to_owned(),
            message,
        };

        let (device_group, rulebase, vsys, rest) = match tokens.as_slice() {
            [dg, rb, vsys, rest @ ..] if rest.len() == 3 => {
                (*dg, parse_slot(rb).map_err(invalid)?, *vsys, rest)
            }
            [dg, rb, rest @ ..] if rest.len() == 3 => {
                if topology != Topology::Controller {
                    return Err(invalid(
                        "device-group identity used against a standalone firewall".into(),
                    ));
                }
                (*dg, parse_slot(rb).map_err(invalid)?, DEFAULT_VSYS, rest)
            }
            [vsys, rest @ ..] if rest.len() == 3 => {
                if topology != Topology::Standalone {
                    return Err(invalid("vsys identity used against Panorama".into()));
                }
                (DEFAULT_DEVICE_GROUP, RulebaseSlot::Rulebase, *vsys, rest)
            }
            rest if rest.len() == 3 => (
                DEFAULT_DEVICE_GROUP,
                RulebaseSlot::default_for(topology),
                DEFAULT_VSYS,
                rest,
            ),
            _ => {
                return Err(invalid(format!(
                    "expected 3 to 6 '{SEPARATOR}'-separated fields, found {}",
                    tokens.len()
                )));
            }
        };

        let [code, reference, names] = rest else {
            return Err(invalid("truncated identity".into()));
        };
        let position = code
            .parse::<u8>()
            .ok()
            .and_then(Position::from_code)
            .ok_or_else(|| invalid(format!("unknown position code {code:?}")))?;
        let names = decode_names(names).map_err(invalid)?;

        Ok(Self {
            location: Location {
                device_group: device_group.to_owned(),
                rulebase,
                vsys: vsys.to_owned(),
                family,
            },
            placement: Placement::new(position, *reference),
            names,
        })
    }
}

impl std::fmt::Display for GroupIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Identity of a whole-rulebase policy: just the location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyIdentity {
    pub location: Location,
}

impl PolicyIdentity {
    pub fn encode(&self) -> String {
        let loc = &self.location;
        format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            loc.device_group, loc.rulebase, loc.vsys
        )
    }

    /// Decode `dg:rulebase:vsys`, or the legacy `dg:rulebase` (Panorama)
    /// and `vsys` (firewall) forms.
    pub fn decode(id: &str, topology: Topology, family: Family) -> Result<Self, CoreError> {
        let invalid = |message: String| CoreError::Identity {
            id: id.to_owned(),
            message,
        };
        let tokens: Vec<&str> = id.split(SEPARATOR).collect();

        let (device_group, rulebase, vsys) = match (tokens.as_slice(), topology) {
            ([dg, rb, vsys], _) => (*dg, parse_slot(rb).map_err(invalid)?, *vsys),
            ([dg, rb], Topology::Controller) => (*dg, parse_slot(rb).map_err(invalid)?, DEFAULT_VSYS),
            ([vsys], Topology::Standalone) => (DEFAULT_DEVICE_GROUP, RulebaseSlot::Rulebase, *vsys),
            _ => {
                return Err(invalid(format!(
                    "{} field(s) is not a valid {topology} policy identity",
                    tokens.len()
                )));
            }
        };

        Ok(Self {
            location: Location {
                device_group: device_group.to_owned(),
                rulebase,
                vsys: vsys.to_owned(),
                family,
            },
        })
    }
}

fn parse_slot(token: &str) -> Result<RulebaseSlot, String> {
    token
        .parse::<RulebaseSlot>()
        .map_err(|_| format!("unknown rulebase {token:?}"))
}

fn encode_names(names: &[String]) -> String {
    BASE64.encode(names.join("\n"))
}

fn decode_names(token: &str) -> Result<Vec<String>, String> {
    let bytes = BASE64
        .decode(token)
        .map_err(|e| format!("rule names are not valid base64: {e}"))?;
    let joined = String::from_utf8(bytes).map_err(|e| format!("rule names are not UTF-8: {e}"))?;
    if joined.is_empty() {
        return Ok(Vec::new());
    }
    Ok(joined.split('\n').map(String::from).collect())
}
