// Sensitive attributes are kept twice: the plaintext the user supplied and
// the encrypted echo the appliance returns for it. The appliance never
// hands the plaintext back, so a read can only tell whether the value was
// changed behind our back by comparing echoes. When the echo moves the
// plaintext is cleared and the host plans a re-entry.

use serde_json::Value;

use super::Attributes;

/// Attribute holding the encrypted echo of sensitive attribute `name`.
pub fn echo_key(name: &str) -> String {
    format!("{name}_enc")
}

/// One sensitive value with its encrypted echo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensitiveField {
    pub plain: Option<String>,
    pub encrypted: Option<String>,
}

impl SensitiveField {
    /// Record the value just written and the echo the appliance returned.
    pub fn after_write(plain: impl Into<String>, encrypted: Option<String>) -> Self {
        Self {
            plain: Some(plain.into()),
            encrypted,
        }
    }

    /// State after a read that observed `echo`.
    ///
    /// Keeps the plaintext only while the echo is unchanged.
    pub fn after_read(&self, echo: Option<&str>) -> Self {
        let unchanged = self.encrypted.as_deref() == echo;
        Self {
            plain: if unchanged { self.plain.clone() } else { None },
            encrypted: echo.map(String::from),
        }
    }

    fn from_block(block: &Attributes, name: &str) -> Self {
        let text = |key: &str| {
            block
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        Self {
            plain: text(name),
            encrypted: text(&echo_key(name)),
        }
    }
}

/// Carry plaintexts of `fields` from `prior` rule blocks into the freshly
/// read `observed` blocks, matching rules by name.
pub fn reconcile(prior: &[Attributes], observed: &mut [Attributes], fields: &[&str]) {
    if fields.is_empty() {
        return;
    }

    for block in observed.iter_mut() {
        let name = block.get("name").and_then(Value::as_str).map(String::from);
        let previous = prior
            .iter()
            .find(|p| p.get("name").and_then(Value::as_str) == name.as_deref());

        for field in fields {
            let echo = block
                .get(&echo_key(field))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from);
            let recorded = previous
                .map(|p| SensitiveField::from_block(p, field))
                .unwrap_or_default();
            let current = recorded.after_read(echo.as_deref());
            block.insert(
                (*field).to_owned(),
                Value::String(current.plain.unwrap_or_default()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn block(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => Attributes::new(),
        }
    }

    #[test]
    fn unchanged_echo_keeps_plaintext() {
        let field = SensitiveField::after_write("s3cret", Some("-AQ==abc".into()));
        let read = field.after_read(Some("-AQ==abc"));
        assert_eq!(read.plain.as_deref(), Some("s3cret"));
    }

    #[test]
    fn changed_echo_clears_plaintext() {
        let field = SensitiveField::after_write("s3cret", Some("-AQ==abc".into()));
        let read = field.after_read(Some("-AQ==xyz"));
        assert_eq!(read.plain, None);
        assert_eq!(read.encrypted.as_deref(), Some("-AQ==xyz"));
    }

    #[test]
    fn reconcile_matches_rules_by_name() {
        let prior = vec![
            block(json!({ "name": "a", "psk": "one", "psk_enc": "E1" })),
            block(json!({ "name": "b", "psk": "two", "psk_enc": "E2" })),
        ];
        let mut observed = vec![
            block(json!({ "name": "b", "psk_enc": "E2" })),
            block(json!({ "name": "a", "psk_enc": "E9" })),
        ];
        reconcile(&prior, &mut observed, &["psk"]);

        assert_eq!(observed[0].get("psk"), Some(&json!("two")));
        assert_eq!(observed[1].get("psk"), Some(&json!("")));
    }
}
