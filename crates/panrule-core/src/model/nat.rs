// ── NAT rules ──
//
// Translation settings are nested elements on the wire and tagged enums in
// the model. The attribute bag flattens them into `sat_*` (source) and
// `dat_*` (destination) attributes keyed by a type selector.

use panrule_api::XmlNode;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::common::{
    RuleCommon, push_flag, push_members, read_enum, read_flag, read_set,
    read_set_or_any, text,
};
use super::rule::PolicyRule;
use crate::codec::{AttrWriter, Attributes, Bag};
use crate::error::CoreError;
use crate::location::Family;
use crate::schema::Attribute;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum NatType {
    #[default]
    Ipv4,
    Nat64,
    Nptv6,
}

/// Selector for the source translation flavour, as written in the bag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
enum SatType {
    #[default]
    None,
    DynamicIpAndPort,
    DynamicIp,
    StaticIp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
enum DatType {
    #[default]
    None,
    Static,
    Dynamic,
}

/// Address source for dynamic IP and port translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DynamicIpAndPort {
    TranslatedAddresses(Vec<String>),
    InterfaceAddress { interface: String, ip: Option<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTranslation {
    #[default]
    None,
    DynamicIpAndPort(DynamicIpAndPort),
    DynamicIp { translated_addresses: Vec<String> },
    StaticIp { translated_address: String, bi_directional: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestinationTranslation {
    #[default]
    None,
    Static { address: String, port: Option<u16> },
    Dynamic {
        address: String,
        port: Option<u16>,
        distribution: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatRule {
    #[serde(flatten)]
    pub common: RuleCommon,
    pub nat_type: NatType,
    pub source_zones: Vec<String>,
    pub destination_zone: String,
    pub to_interface: String,
    pub service: String,
    pub source_addresses: Vec<String>,
    pub destination_addresses: Vec<String>,
    pub source_translation: SourceTranslation,
    pub destination_translation: DestinationTranslation,
}

impl NatRule {
    pub fn new(name: impl Into<String>) -> Self {
        let any = || super::ANY.to_owned();
        Self {
            common: RuleCommon::new(name),
            source_zones: vec![any()],
            destination_zone: any(),
            to_interface: any(),
            service: any(),
            source_addresses: vec![any()],
            destination_addresses: vec![any()],
            ..Self::default()
        }
    }
}

fn port_from_bag(bag: &Bag<'_>, key: &str) -> Result<Option<u16>, CoreError> {
    match bag.int(key)? {
        None | Some(0) => Ok(None),
        Some(port) => u16::try_from(port).map(Some).map_err(|_| {
            CoreError::validation(bag.path_of(key), format!("{port} is not a valid port"))
        }),
    }
}

fn port_from_xml(node: &XmlNode) -> Result<Option<u16>, CoreError> {
    match node.get_text(&["translated-port"]) {
        None | Some("") => Ok(None),
        Some(port) => port.parse().map(Some).map_err(|_| CoreError::Api {
            message: format!("unexpected translated port {port:?}"),
            code: None,
        }),
    }
}

fn required(bag: &Bag<'_>, key: &str, why: &str) -> Result<String, CoreError> {
    bag.string(key)?
        .ok_or_else(|| CoreError::validation(bag.path_of(key), format!("required when {why}")))
}

impl SourceTranslation {
    fn from_bag(bag: &Bag<'_>) -> Result<Self, CoreError> {
        Ok(match bag.enum_or("sat_type", SatType::None)? {
            SatType::None => Self::None,
            SatType::DynamicIpAndPort => {
                let address_type = bag.string_or("sat_address_type", "translated-address")?;
                match address_type.as_str() {
                    "translated-address" => {
                        let addresses = bag.set("sat_translated_addresses")?;
                        if addresses.is_empty() {
                            return Err(CoreError::validation(
                                bag.path_of("sat_translated_addresses"),
                                "required when sat_type is dynamic-ip-and-port",
                            ));
                        }
                        Self::DynamicIpAndPort(DynamicIpAndPort::TranslatedAddresses(addresses))
                    }
                    "interface-address" => Self::DynamicIpAndPort(DynamicIpAndPort::InterfaceAddress {
                        interface: required(bag, "sat_interface", "sat_address_type is interface-address")?,
                        ip: bag.string("sat_ip_address")?,
                    }),
                    other => {
                        return Err(CoreError::validation(
                            bag.path_of("sat_address_type"),
                            format!("unsupported value {other:?}"),
                        ));
                    }
                }
            }
            SatType::DynamicIp => {
                let translated_addresses = bag.set("sat_translated_addresses")?;
                if translated_addresses.is_empty() {
                    return Err(CoreError::validation(
                        bag.path_of("sat_translated_addresses"),
                        "required when sat_type is dynamic-ip",
                    ));
                }
                Self::DynamicIp {
                    translated_addresses,
                }
            }
            SatType::StaticIp => Self::StaticIp {
                translated_address: required(
                    bag,
                    "sat_static_translated_address",
                    "sat_type is static-ip",
                )?,
                bi_directional: bag.bool_or("sat_static_bi_directional", false)?,
            },
        })
    }

    fn write_bag(&self, out: &mut AttrWriter) {
        let (sat_type, address_type) = match self {
            Self::None => (SatType::None, ""),
            Self::DynamicIpAndPort(DynamicIpAndPort::TranslatedAddresses(_)) => {
                (SatType::DynamicIpAndPort, "translated-address")
            }
            Self::DynamicIpAndPort(DynamicIpAndPort::InterfaceAddress { .. }) => {
                (SatType::DynamicIpAndPort, "interface-address")
            }
            Self::DynamicIp { .. } => (SatType::DynamicIp, ""),
            Self::StaticIp { .. } => (SatType::StaticIp, ""),
        };
        out.string("sat_type", &sat_type.to_string());
        out.string("sat_address_type", address_type);

        let empty = Vec::new();
        let addresses = match self {
            Self::DynamicIpAndPort(DynamicIpAndPort::TranslatedAddresses(a))
            | Self::DynamicIp {
                translated_addresses: a,
            } => a,
            _ => &empty,
        };
        out.set("sat_translated_addresses", addresses);

        let (interface, ip) = match self {
            Self::DynamicIpAndPort(DynamicIpAndPort::InterfaceAddress { interface, ip }) => {
                (Some(interface.as_str()), ip.as_deref())
            }
            _ => (None, None),
        };
        out.opt_string("sat_interface", interface);
        out.opt_string("sat_ip_address", ip);

        let (static_address, bi_directional) = match self {
            Self::StaticIp {
                translated_address,
                bi_directional,
            } => (Some(translated_address.as_str()), *bi_directional),
            _ => (None, false),
        };
        out.opt_string("sat_static_translated_address", static_address);
        out.bool("sat_static_bi_directional", bi_directional);
    }

    fn to_xml(&self) -> Option<XmlNode> {
        let inner = match self {
            Self::None => return None,
            Self::DynamicIpAndPort(DynamicIpAndPort::TranslatedAddresses(addresses)) => {
                XmlNode::new("dynamic-ip-and-port").with_child(XmlNode::members(
                    "translated-address",
                    addresses.iter().map(String::as_str),
                ))
            }
            Self::DynamicIpAndPort(DynamicIpAndPort::InterfaceAddress { interface, ip }) => {
                let mut iface = XmlNode::new("interface-address")
                    .with_child(XmlNode::leaf("interface", interface.as_str()));
                iface.push_opt("ip", ip.as_deref());
                XmlNode::new("dynamic-ip-and-port").with_child(iface)
            }
            Self::DynamicIp {
                translated_addresses,
            } => XmlNode::new("dynamic-ip").with_child(XmlNode::members(
                "translated-address",
                translated_addresses.iter().map(String::as_str),
            )),
            Self::StaticIp {
                translated_address,
                bi_directional,
            } => {
                let mut node = XmlNode::new("static-ip")
                    .with_child(XmlNode::leaf("translated-address", translated_address.as_str()));
                push_flag(&mut node, "bi-directional", *bi_directional, false);
                node
            }
        };
        Some(XmlNode::new("source-translation").with_child(inner))
    }

    fn from_xml(entry: &XmlNode) -> Self {
        let Some(st) = entry.get_child("source-translation") else {
            return Self::None;
        };
        if let Some(dipp) = st.get_child("dynamic-ip-and-port") {
            if let Some(iface) = dipp.get_child("interface-address") {
                return Self::DynamicIpAndPort(DynamicIpAndPort::InterfaceAddress {
                    interface: text(iface, "interface").unwrap_or_default(),
                    ip: text(iface, "ip"),
                });
            }
            return Self::DynamicIpAndPort(DynamicIpAndPort::TranslatedAddresses(read_set(
                dipp,
                "translated-address",
            )));
        }
        if let Some(dip) = st.get_child("dynamic-ip") {
            return Self::DynamicIp {
                translated_addresses: read_set(dip, "translated-address"),
            };
        }
        if let Some(sip) = st.get_child("static-ip") {
            return Self::StaticIp {
                translated_address: text(sip, "translated-address").unwrap_or_default(),
                bi_directional: read_flag(sip, "bi-directional", false),
            };
        }
        Self::None
    }
}

impl DestinationTranslation {
    fn from_bag(bag: &Bag<'_>) -> Result<Self, CoreError> {
        Ok(match bag.enum_or("dat_type", DatType::None)? {
            DatType::None => Self::None,
            DatType::Static => Self::Static {
                address: required(bag, "dat_address", "dat_type is static")?,
                port: port_from_bag(bag, "dat_port")?,
            },
            DatType::Dynamic => Self::Dynamic {
                address: required(bag, "dat_address", "dat_type is dynamic")?,
                port: port_from_bag(bag, "dat_port")?,
                distribution: bag.string("dat_dynamic_distribution")?,
            },
        })
    }

    fn write_bag(&self, out: &mut AttrWriter) {
        let (dat_type, address, port, distribution) = match self {
            Self::None => (DatType::None, None, None, None),
            Self::Static { address, port } => (DatType::Static, Some(address.as_str()), *port, None),
            Self::Dynamic {
                address,
                port,
                distribution,
            } => (
                DatType::Dynamic,
                Some(address.as_str()),
                *port,
                distribution.as_deref(),
            ),
        };
        out.string("dat_type", &dat_type.to_string());
        out.opt_string("dat_address", address);
        out.int("dat_port", port.map(i64::from));
        out.opt_string("dat_dynamic_distribution", distribution);
    }

    fn to_xml(&self) -> Option<XmlNode> {
        match self {
            Self::None => None,
            Self::Static { address, port } => {
                let mut node = XmlNode::new("destination-translation")
                    .with_child(XmlNode::leaf("translated-address", address.as_str()));
                if let Some(port) = port {
                    node.push(XmlNode::leaf("translated-port", port.to_string()));
                }
                Some(node)
            }
            Self::Dynamic {
                address,
                port,
                distribution,
            } => {
                let mut node = XmlNode::new("dynamic-destination-translation")
                    .with_child(XmlNode::leaf("translated-address", address.as_str()));
                if let Some(port) = port {
                    node.push(XmlNode::leaf("translated-port", port.to_string()));
                }
                node.push_opt("distribution", distribution.as_deref());
                Some(node)
            }
        }
    }

    fn from_xml(entry: &XmlNode) -> Result<Self, CoreError> {
        if let Some(node) = entry.get_child("destination-translation") {
            return Ok(Self::Static {
                address: text(node, "translated-address").unwrap_or_default(),
                port: port_from_xml(node)?,
            });
        }
        if let Some(node) = entry.get_child("dynamic-destination-translation") {
            return Ok(Self::Dynamic {
                address: text(node, "translated-address").unwrap_or_default(),
                port: port_from_xml(node)?,
                distribution: text(node, "distribution"),
            });
        }
        Ok(Self::None)
    }
}

impl PolicyRule for NatRule {
    const FAMILY: Family = Family::Nat;

    fn common(&self) -> &RuleCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut RuleCommon {
        &mut self.common
    }

    fn to_xml(&self) -> XmlNode {
        let mut e = self.common.to_entry();
        if self.nat_type != NatType::Ipv4 {
            e.push(XmlNode::leaf("nat-type", self.nat_type.to_string()));
        }
        push_members(&mut e, "from", &self.source_zones);
        e.push(XmlNode::members("to", [self.destination_zone.as_str()]));
        e.push(XmlNode::leaf("to-interface", self.to_interface.as_str()));
        e.push(XmlNode::leaf("service", self.service.as_str()));
        push_members(&mut e, "source", &self.source_addresses);
        push_members(&mut e, "destination", &self.destination_addresses);
        if let Some(st) = self.source_translation.to_xml() {
            e.push(st);
        }
        if let Some(dt) = self.destination_translation.to_xml() {
            e.push(dt);
        }
        e
    }

    fn from_xml(entry: &XmlNode) -> Result<Self, CoreError> {
        let or_any = |value: Option<String>| value.unwrap_or_else(|| super::ANY.to_owned());
        Ok(Self {
            common: RuleCommon::from_entry(entry)?,
            nat_type: read_enum(entry, "nat-type", NatType::Ipv4)?,
            source_zones: read_set_or_any(entry, "from"),
            destination_zone: or_any(entry.member_texts("to").into_iter().next()),
            to_interface: or_any(text(entry, "to-interface")),
            service: or_any(text(entry, "service")),
            source_addresses: read_set_or_any(entry, "source"),
            destination_addresses: read_set_or_any(entry, "destination"),
            source_translation: SourceTranslation::from_xml(entry),
            destination_translation: DestinationTranslation::from_xml(entry)?,
        })
    }

    fn family_attributes() -> Vec<Attribute> {
        vec![
            Attribute::string("nat_type")
                .one_of(&["ipv4", "nat64", "nptv6"])
                .default_value("ipv4"),
            Attribute::string_set("source_zones").default_value(vec!["any"]),
            Attribute::string("destination_zone").default_value("any"),
            Attribute::string("to_interface").default_value("any"),
            Attribute::string("service").default_value("any"),
            Attribute::string_set("source_addresses").default_value(vec!["any"]),
            Attribute::string_set("destination_addresses").default_value(vec!["any"]),
            Attribute::string("sat_type")
                .one_of(&["none", "dynamic-ip-and-port", "dynamic-ip", "static-ip"])
                .default_value("none"),
            Attribute::string("sat_address_type")
                .one_of(&["translated-address", "interface-address"]),
            Attribute::string_set("sat_translated_addresses"),
            Attribute::string("sat_interface"),
            Attribute::string("sat_ip_address"),
            Attribute::string("sat_static_translated_address"),
            Attribute::bool("sat_static_bi_directional").default_value(false),
            Attribute::string("dat_type")
                .one_of(&["none", "static", "dynamic"])
                .default_value("none"),
            Attribute::string("dat_address"),
            Attribute::int("dat_port"),
            Attribute::string("dat_dynamic_distribution").one_of(&[
                "round-robin",
                "source-ip-hash",
                "ip-modulo",
                "ip-hash",
                "least-sessions",
            ]),
        ]
    }

    fn from_bag(bag: &Bag<'_>) -> Result<Self, CoreError> {
        let destination_zone = bag.string_or("destination_zone", super::ANY)?;
        Ok(Self {
            common: RuleCommon::from_bag(bag)?,
            nat_type: bag.enum_or("nat_type", NatType::Ipv4)?,
            source_zones: bag.set_or_any("source_zones")?,
            destination_zone,
            to_interface: bag.string_or("to_interface", super::ANY)?,
            service: bag.string_or("service", super::ANY)?,
            source_addresses: bag.set_or_any("source_addresses")?,
            destination_addresses: bag.set_or_any("destination_addresses")?,
            source_translation: SourceTranslation::from_bag(bag)?,
            destination_translation: DestinationTranslation::from_bag(bag)?,
        })
    }

    fn to_bag(&self) -> Attributes {
        let mut out = AttrWriter::new();
        self.common.write_bag(&mut out);
        out.string("nat_type", &self.nat_type.to_string());
        out.set("source_zones", &self.source_zones);
        out.string("destination_zone", &self.destination_zone);
        out.string("to_interface", &self.to_interface);
        out.string("service", &self.service);
        out.set("source_addresses", &self.source_addresses);
        out.set("destination_addresses", &self.destination_addresses);
        self.source_translation.write_bag(&mut out);
        self.destination_translation.write_bag(&mut out);
        out.finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;

    fn load(value: Value) -> Result<NatRule, CoreError> {
        let Value::Object(map) = value else {
            panic!("expected an object");
        };
        NatRule::from_bag(&Bag::new(&map))
    }

    #[test]
    fn outbound_pat_round_trips() {
        let rule = load(json!({
            "name": "outbound",
            "source_zones": ["trust"],
            "destination_zone": "untrust",
            "sat_type": "dynamic-ip-and-port",
            "sat_address_type": "interface-address",
            "sat_interface": "ethernet1/1"
        }))
        .expect("loads");

        let xml = rule.to_xml();
        assert_eq!(
            xml.get_text(&["source-translation", "dynamic-ip-and-port", "interface-address", "interface"]),
            Some("ethernet1/1")
        );
        assert_eq!(NatRule::from_xml(&xml).expect("parses"), rule);

        let dumped = rule.to_bag();
        assert_eq!(dumped.get("sat_type"), Some(&json!("dynamic-ip-and-port")));
        assert_eq!(dumped.get("dat_port"), Some(&json!(0)));
        assert_eq!(NatRule::from_bag(&Bag::new(&dumped)).expect("reloads"), rule);
    }

    #[test]
    fn static_destination_with_port() {
        let rule = load(json!({
            "name": "web-in",
            "destination_zone": "untrust",
            "destination_addresses": ["203.0.113.10"],
            "sat_type": "static-ip",
            "sat_static_translated_address": "198.51.100.1",
            "sat_static_bi_directional": true,
            "dat_type": "static",
            "dat_address": "10.0.0.10",
            "dat_port": 8080
        }))
        .expect("loads");
        assert_eq!(
            rule.destination_translation,
            DestinationTranslation::Static {
                address: "10.0.0.10".into(),
                port: Some(8080)
            }
        );
        assert_eq!(NatRule::from_xml(&rule.to_xml()).expect("parses"), rule);
    }

    #[test]
    fn dynamic_destination_with_distribution() {
        let rule = load(json!({
            "name": "lb",
            "dat_type": "dynamic",
            "dat_address": "pool",
            "dat_dynamic_distribution": "round-robin"
        }))
        .expect("loads");
        assert_eq!(NatRule::from_xml(&rule.to_xml()).expect("parses"), rule);
    }

    #[test]
    fn missing_translation_address_is_rejected() {
        let err = load(json!({ "name": "r", "sat_type": "dynamic-ip" })).expect_err("invalid");
        assert!(
            matches!(err, CoreError::Validation { ref attribute, .. } if attribute == "sat_translated_addresses")
        );
        assert!(load(json!({ "name": "r", "dat_type": "static", "dat_address": "x", "dat_port": 70000 })).is_err());
    }

    #[test]
    fn legacy_sat_labels_are_not_accepted_directly() {
        assert!(load(json!({ "name": "r", "sat_type": "static" })).is_err());
    }

    #[test]
    fn defaults_match_new() {
        assert_eq!(load(json!({ "name": "r" })).expect("loads"), NatRule::new("r"));
    }
}
