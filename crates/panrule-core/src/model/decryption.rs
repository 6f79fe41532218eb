// ── Decryption rules ──

use panrule_api::XmlNode;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::common::{
    RuleCommon, push_flag, push_members, read_enum, read_flag, read_set, read_set_or_any, text,
};
use super::rule::PolicyRule;
use crate::codec::{AttrWriter, Attributes, Bag};
use crate::error::CoreError;
use crate::location::Family;
use crate::schema::Attribute;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DecryptionAction {
    #[default]
    NoDecrypt,
    Decrypt,
    DecryptAndForward,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DecryptionType {
    #[default]
    SslForwardProxy,
    SshProxy,
    /// Needs the server certificate in `ssl_certificate`.
    SslInboundInspection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionRule {
    #[serde(flatten)]
    pub common: RuleCommon,
    pub source_zones: Vec<String>,
    pub destination_zones: Vec<String>,
    pub source_addresses: Vec<String>,
    pub destination_addresses: Vec<String>,
    pub negate_source: bool,
    pub negate_destination: bool,
    pub source_users: Vec<String>,
    pub source_hip: Vec<String>,
    pub destination_hip: Vec<String>,
    pub services: Vec<String>,
    pub url_categories: Vec<String>,
    pub source_devices: Vec<String>,
    pub destination_devices: Vec<String>,
    pub action: DecryptionAction,
    pub decryption_type: DecryptionType,
    pub ssl_certificate: Option<String>,
    pub decryption_profile: Option<String>,
    pub forwarding_profile: Option<String>,
    pub log_successful_tls_handshakes: bool,
    pub log_failed_tls_handshakes: bool,
    pub log_setting: Option<String>,
}

impl DecryptionRule {
    pub fn new(name: impl Into<String>) -> Self {
        let any = || vec![super::ANY.to_owned()];
        Self {
            common: RuleCommon::new(name),
            source_zones: any(),
            destination_zones: any(),
            source_addresses: any(),
            destination_addresses: any(),
            source_users: any(),
            services: any(),
            url_categories: any(),
            log_failed_tls_handshakes: true,
            ..Self::default()
        }
    }

    fn check_certificate(&self, path: &str) -> Result<(), CoreError> {
        match (self.decryption_type, &self.ssl_certificate) {
            (DecryptionType::SslInboundInspection, None) => Err(CoreError::validation(
                path,
                "ssl-inbound-inspection requires ssl_certificate",
            )),
            (DecryptionType::SslInboundInspection, Some(_)) | (_, None) => Ok(()),
            (other, Some(cert)) => Err(CoreError::validation(
                path,
                format!("certificate {cert:?} is only valid with ssl-inbound-inspection, not {other}"),
            )),
        }
    }
}

impl PolicyRule for DecryptionRule {
    const FAMILY: Family = Family::Decryption;

    fn common(&self) -> &RuleCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut RuleCommon {
        &mut self.common
    }

    fn to_xml(&self) -> XmlNode {
        let mut e = self.common.to_entry();
        push_members(&mut e, "from", &self.source_zones);
        push_members(&mut e, "to", &self.destination_zones);
        push_members(&mut e, "source", &self.source_addresses);
        push_members(&mut e, "destination", &self.destination_addresses);
        push_flag(&mut e, "negate-source", self.negate_source, false);
        push_flag(&mut e, "negate-destination", self.negate_destination, false);
        push_members(&mut e, "source-user", &self.source_users);
        push_members(&mut e, "source-hip", &self.source_hip);
        push_members(&mut e, "destination-hip", &self.destination_hip);
        push_members(&mut e, "service", &self.services);
        push_members(&mut e, "category", &self.url_categories);
        push_members(&mut e, "source-device", &self.source_devices);
        push_members(&mut e, "destination-device", &self.destination_devices);
        e.push(XmlNode::leaf("action", self.action.to_string()));

        let kind = match (&self.decryption_type, &self.ssl_certificate) {
            (DecryptionType::SslInboundInspection, Some(cert)) => {
                XmlNode::leaf("ssl-inbound-inspection", cert.as_str())
            }
            (kind, _) => XmlNode::new(kind.to_string()),
        };
        e.push(XmlNode::new("type").with_child(kind));

        e.push_opt("profile", self.decryption_profile.as_deref());
        e.push_opt("forwarding-profile", self.forwarding_profile.as_deref());
        push_flag(&mut e, "log-success", self.log_successful_tls_handshakes, false);
        push_flag(&mut e, "log-fail", self.log_failed_tls_handshakes, true);
        e.push_opt("log-setting", self.log_setting.as_deref());
        e
    }

    fn from_xml(entry: &XmlNode) -> Result<Self, CoreError> {
        let kind = entry.get_child("type").and_then(|t| t.children.first());
        let decryption_type = match kind {
            None => DecryptionType::default(),
            Some(node) => node.tag.parse().map_err(|_| CoreError::Api {
                message: format!("unexpected decryption type <{}>", node.tag),
                code: None,
            })?,
        };
        let ssl_certificate = kind
            .filter(|_| decryption_type == DecryptionType::SslInboundInspection)
            .and_then(|node| node.text.clone())
            .filter(|t| !t.is_empty());

        Ok(Self {
            common: RuleCommon::from_entry(entry)?,
            source_zones: read_set_or_any(entry, "from"),
            destination_zones: read_set_or_any(entry, "to"),
            source_addresses: read_set_or_any(entry, "source"),
            destination_addresses: read_set_or_any(entry, "destination"),
            negate_source: read_flag(entry, "negate-source", false),
            negate_destination: read_flag(entry, "negate-destination", false),
            source_users: read_set_or_any(entry, "source-user"),
            source_hip: read_set(entry, "source-hip"),
            destination_hip: read_set(entry, "destination-hip"),
            services: read_set_or_any(entry, "service"),
            url_categories: read_set_or_any(entry, "category"),
            source_devices: read_set(entry, "source-device"),
            destination_devices: read_set(entry, "destination-device"),
            action: read_enum(entry, "action", DecryptionAction::NoDecrypt)?,
            decryption_type,
            ssl_certificate,
            decryption_profile: text(entry, "profile"),
            forwarding_profile: text(entry, "forwarding-profile"),
            log_successful_tls_handshakes: read_flag(entry, "log-success", false),
            log_failed_tls_handshakes: read_flag(entry, "log-fail", true),
            log_setting: text(entry, "log-setting"),
        })
    }

    fn family_attributes() -> Vec<Attribute> {
        vec![
            Attribute::string_set("source_zones").default_value(vec!["any"]),
            Attribute::string_set("destination_zones").default_value(vec!["any"]),
            Attribute::string_set("source_addresses").default_value(vec!["any"]),
            Attribute::string_set("destination_addresses").default_value(vec!["any"]),
            Attribute::bool("negate_source").default_value(false),
            Attribute::bool("negate_destination").default_value(false),
            Attribute::string_set("source_users").default_value(vec!["any"]),
            Attribute::string_set("source_hip"),
            Attribute::string_set("destination_hip"),
            Attribute::string_set("services").default_value(vec!["any"]),
            Attribute::string_set("url_categories").default_value(vec!["any"]),
            Attribute::string_set("source_devices"),
            Attribute::string_set("destination_devices"),
            Attribute::string("action")
                .one_of(&["no-decrypt", "decrypt", "decrypt-and-forward"])
                .default_value("no-decrypt"),
            Attribute::string("decryption_type")
                .one_of(&["ssl-forward-proxy", "ssh-proxy", "ssl-inbound-inspection"])
                .default_value("ssl-forward-proxy"),
            Attribute::string("ssl_certificate").describe("Only with ssl-inbound-inspection"),
            Attribute::string("decryption_profile"),
            Attribute::string("forwarding_profile"),
            Attribute::bool("log_successful_tls_handshakes").default_value(false),
            Attribute::bool("log_failed_tls_handshakes").default_value(true),
            Attribute::string("log_setting"),
        ]
    }

    fn from_bag(bag: &Bag<'_>) -> Result<Self, CoreError> {
        let rule = Self {
            common: RuleCommon::from_bag(bag)?,
            source_zones: bag.set_or_any("source_zones")?,
            destination_zones: bag.set_or_any("destination_zones")?,
            source_addresses: bag.set_or_any("source_addresses")?,
            destination_addresses: bag.set_or_any("destination_addresses")?,
            negate_source: bag.bool_or("negate_source", false)?,
            negate_destination: bag.bool_or("negate_destination", false)?,
            source_users: bag.set_or_any("source_users")?,
            source_hip: bag.set("source_hip")?,
            destination_hip: bag.set("destination_hip")?,
            services: bag.set_or_any("services")?,
            url_categories: bag.set_or_any("url_categories")?,
            source_devices: bag.set("source_devices")?,
            destination_devices: bag.set("destination_devices")?,
            action: bag.enum_or("action", DecryptionAction::NoDecrypt)?,
            decryption_type: bag.enum_or("decryption_type", DecryptionType::SslForwardProxy)?,
            ssl_certificate: bag.string("ssl_certificate")?,
            decryption_profile: bag.string("decryption_profile")?,
            forwarding_profile: bag.string("forwarding_profile")?,
            log_successful_tls_handshakes: bag.bool_or("log_successful_tls_handshakes", false)?,
            log_failed_tls_handshakes: bag.bool_or("log_failed_tls_handshakes", true)?,
            log_setting: bag.string("log_setting")?,
        };
        rule.check_certificate(&bag.path_of("ssl_certificate"))?;
        Ok(rule)
    }

    fn to_bag(&self) -> Attributes {
        let mut out = AttrWriter::new();
        self.common.write_bag(&mut out);
        out.set("source_zones", &self.source_zones);
        out.set("destination_zones", &self.destination_zones);
        out.set("source_addresses", &self.source_addresses);
        out.set("destination_addresses", &self.destination_addresses);
        out.bool("negate_source", self.negate_source);
        out.bool("negate_destination", self.negate_destination);
        out.set("source_users", &self.source_users);
        out.set("source_hip", &self.source_hip);
        out.set("destination_hip", &self.destination_hip);
        out.set("services", &self.services);
        out.set("url_categories", &self.url_categories);
        out.set("source_devices", &self.source_devices);
        out.set("destination_devices", &self.destination_devices);
        out.string("action", &self.action.to_string());
        out.string("decryption_type", &self.decryption_type.to_string());
        out.opt_string("ssl_certificate", self.ssl_certificate.as_deref());
        out.opt_string("decryption_profile", self.decryption_profile.as_deref());
        out.opt_string("forwarding_profile", self.forwarding_profile.as_deref());
        out.bool("log_successful_tls_handshakes", self.log_successful_tls_handshakes);
        out.bool("log_failed_tls_handshakes", self.log_failed_tls_handshakes);
        out.opt_string("log_setting", self.log_setting.as_deref());
        out.finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;

    fn load(value: Value) -> Result<DecryptionRule, CoreError> {
        let Value::Object(map) = value else {
            panic!("expected an object");
        };
        DecryptionRule::from_bag(&Bag::new(&map))
    }

    #[test]
    fn inbound_inspection_round_trips_with_certificate() {
        let rule = load(json!({
            "name": "inbound-web",
            "action": "decrypt",
            "decryption_type": "ssl-inbound-inspection",
            "ssl_certificate": "web-cert",
            "destination_zones": ["dmz"]
        }))
        .expect("loads");

        let xml = rule.to_xml();
        assert_eq!(
            xml.get_text(&["type", "ssl-inbound-inspection"]),
            Some("web-cert")
        );
        assert_eq!(DecryptionRule::from_xml(&xml).expect("parses"), rule);
    }

    #[test]
    fn forward_proxy_is_the_default_type() {
        let rule = load(json!({ "name": "r" })).expect("loads");
        assert_eq!(rule, DecryptionRule::new("r"));
        let xml = rule.to_xml();
        assert!(xml.get_child("type").and_then(|t| t.get_child("ssl-forward-proxy")).is_some());
        assert_eq!(DecryptionRule::from_xml(&xml).expect("parses"), rule);
    }

    #[test]
    fn certificate_requires_inbound_inspection() {
        assert!(load(json!({ "name": "r", "ssl_certificate": "c" })).is_err());
        assert!(load(json!({ "name": "r", "decryption_type": "ssl-inbound-inspection" })).is_err());
    }
}
