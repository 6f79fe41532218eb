// Xpath builders for rulebase locations.
//
// Names are embedded inside single-quoted predicates, so any name carrying
// a single quote is rejected rather than escaped.

use crate::error::Error;

const LOCALHOST: &str = "/config/devices/entry[@name='localhost.localdomain']";

/// Device-group name meaning "the shared scope" on Panorama.
pub const SHARED: &str = "shared";

/// Reject names that cannot be quoted inside an xpath predicate.
pub fn check_name(kind: &str, name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::InvalidRequest(format!("{kind} name must not be empty")));
    }
    if name.contains('\'') {
        return Err(Error::InvalidRequest(format!(
            "{kind} name {name:?} must not contain a single quote"
        )));
    }
    Ok(())
}

/// `/config/devices/entry[@name='localhost.localdomain']/vsys/entry[@name='<vsys>']/rulebase/<family>/rules`
pub fn firewall_rules(vsys: &str, family: &str) -> Result<String, Error> {
    check_name("vsys", vsys)?;
    Ok(format!(
        "{LOCALHOST}/vsys/entry[@name='{vsys}']/rulebase/{family}/rules"
    ))
}

/// Rules container on Panorama.
///
/// `slot` is `pre-rulebase` or `post-rulebase`. The device-group
/// [`SHARED`] addresses `/config/shared`.
pub fn panorama_rules(device_group: &str, slot: &str, family: &str) -> Result<String, Error> {
    check_name("device-group", device_group)?;
    if device_group == SHARED {
        Ok(format!("/config/shared/{slot}/{family}/rules"))
    } else {
        Ok(format!(
            "{LOCALHOST}/device-group/entry[@name='{device_group}']/{slot}/{family}/rules"
        ))
    }
}

/// Address one entry under a container xpath.
pub fn entry(base: &str, name: &str) -> Result<String, Error> {
    check_name("entry", name)?;
    Ok(format!("{base}/entry[@name='{name}']"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn firewall_security_rules() {
        assert_eq!(
            firewall_rules("vsys1", "security").expect("valid"),
            "/config/devices/entry[@name='localhost.localdomain']/vsys/entry[@name='vsys1']/rulebase/security/rules"
        );
    }

    #[test]
    fn panorama_shared_and_device_group() {
        assert_eq!(
            panorama_rules("shared", "pre-rulebase", "nat").expect("valid"),
            "/config/shared/pre-rulebase/nat/rules"
        );
        assert_eq!(
            panorama_rules("branch", "post-rulebase", "decryption").expect("valid"),
            "/config/devices/entry[@name='localhost.localdomain']/device-group/entry[@name='branch']/post-rulebase/decryption/rules"
        );
    }

    #[test]
    fn single_quotes_are_rejected() {
        assert!(entry("/x", "it's").is_err());
        assert!(firewall_rules("", "security").is_err());
        assert_eq!(
            entry("/x/rules", "web").expect("valid"),
            "/x/rules/entry[@name='web']"
        );
    }
}
