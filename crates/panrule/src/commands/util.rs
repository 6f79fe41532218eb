//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use panrule_core::{Attributes, Family, Location, Placement, Position, RulebaseSlot, Timeouts, Topology};

use crate::cli::{FamilyArg, GlobalOpts, LocationArgs, PositionArg, RulebaseArg};
use crate::error::CliError;

pub fn family(arg: FamilyArg) -> Family {
    match arg {
        FamilyArg::Security => Family::Security,
        FamilyArg::Nat => Family::Nat,
        FamilyArg::Decryption => Family::Decryption,
    }
}

pub fn position(arg: Option<PositionArg>) -> Position {
    match arg {
        None => Position::Unspecified,
        Some(PositionArg::Top) => Position::Top,
        Some(PositionArg::Bottom) => Position::Bottom,
        Some(PositionArg::Before) => Position::Before,
        Some(PositionArg::DirectlyBefore) => Position::DirectlyBefore,
        Some(PositionArg::After) => Position::After,
        Some(PositionArg::DirectlyAfter) => Position::DirectlyAfter,
    }
}

pub fn placement(arg: Option<PositionArg>, reference: Option<&str>) -> Placement {
    Placement::new(position(arg), reference.unwrap_or_default())
}

fn slot(arg: RulebaseArg) -> RulebaseSlot {
    match arg {
        RulebaseArg::Rulebase => RulebaseSlot::Rulebase,
        RulebaseArg::PreRulebase => RulebaseSlot::PreRulebase,
        RulebaseArg::PostRulebase => RulebaseSlot::PostRulebase,
    }
}

/// Resolve `--device-group/--rulebase/--vsys` against `topology`.
pub fn location(args: &LocationArgs, topology: Topology) -> Result<Location, CliError> {
    Ok(Location::resolve(
        topology,
        family(args.family),
        args.device_group.as_deref(),
        args.rulebase.map(slot),
        args.vsys.as_deref(),
    )?)
}

/// The same selection as an attribute bag, for resources that load it.
pub fn location_attributes(args: &LocationArgs) -> Attributes {
    let mut attrs = Attributes::new();
    if let Some(dg) = &args.device_group {
        attrs.insert("device_group".into(), dg.clone().into());
    }
    if let Some(rb) = args.rulebase {
        attrs.insert("rulebase".into(), slot(rb).to_string().into());
    }
    if let Some(vsys) = &args.vsys {
        attrs.insert("vsys".into(), vsys.clone().into());
    }
    attrs
}

/// Resolve the family from the flag and the state file, which must agree.
pub fn resolve_family(flag: Option<FamilyArg>, stored: Option<Family>) -> Result<Family, CliError> {
    match (flag.map(family), stored) {
        (Some(flag), Some(stored)) if flag != stored => Err(CliError::Validation {
            field: "family".into(),
            reason: format!("state file holds a {stored} resource, --family says {flag}"),
        }),
        (Some(family), _) | (None, Some(family)) => Ok(family),
        (None, None) => Ok(Family::Security),
    }
}

/// Per-operation deadlines, overridden by `--operation-timeout`.
pub fn timeouts(global: &GlobalOpts, base: Timeouts) -> Timeouts {
    match global.operation_timeout {
        Some(limit) => {
            let limit: Duration = limit.into();
            Timeouts {
                create: limit,
                read: limit,
                update: limit,
                delete: limit,
            }
        }
        None => base,
    }
}

/// Read a declaration file: JSON by extension, YAML otherwise.
pub fn read_declaration(path: &Path) -> Result<Attributes, CliError> {
    let contents = std::fs::read_to_string(path)?;
    let value: serde_json::Value = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&contents)?
    } else {
        serde_yaml::from_str(&contents)?
    };
    match value {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(Attributes::new()),
        other => Err(CliError::Validation {
            field: "file".into(),
            reason: format!("expected a mapping of attributes, found {}", kind_of(&other)),
        }),
    }
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "a mapping",
    }
}

/// A token cancelled on Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            child.cancel();
        }
    });
    token
}

/// Spinner on stderr for interactive runs; hidden otherwise.
pub fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_owned());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn yaml_and_json_declarations() {
        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().expect("temp");
        yaml.write_all(b"position_keyword: top\nrule:\n  - name: allow-dns\n")
            .expect("write");
        let attrs = read_declaration(yaml.path()).expect("yaml");
        assert_eq!(attrs["position_keyword"], "top");

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().expect("temp");
        json.write_all(br#"{"rule": [{"name": "a"}]}"#).expect("write");
        let attrs = read_declaration(json.path()).expect("json");
        assert!(attrs["rule"].is_array());
    }

    #[test]
    fn list_declaration_is_rejected() {
        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().expect("temp");
        yaml.write_all(b"- a\n- b\n").expect("write");
        assert!(matches!(
            read_declaration(yaml.path()),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn family_flag_must_match_state() {
        assert_eq!(
            resolve_family(None, Some(Family::Nat)).expect("from state"),
            Family::Nat
        );
        assert!(resolve_family(Some(FamilyArg::Security), Some(Family::Nat)).is_err());
        assert_eq!(resolve_family(None, None).expect("default"), Family::Security);
    }
}
