//! `rules` subcommand handlers.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

use panrule_core::{
    Appliance, DecryptionRule, Family, NatRule, PolicyRule, RulebaseClient, RulebaseDataSource,
    SecurityRule, Timeouts,
};

use crate::cli::{GlobalOpts, LocationArgs, PositionArg, RulesArgs, RulesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ────────────────────────────────────────────────────────

/// One listed rule, read back from its attribute block.
#[derive(Debug, Serialize)]
struct ListedRule {
    index: usize,
    #[serde(flatten)]
    attributes: serde_json::Map<String, Value>,
}

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Disabled")]
    disabled: String,
    #[tabled(rename = "Tags")]
    tags: String,
    #[tabled(rename = "UUID")]
    uuid: String,
}

fn text(rule: &ListedRule, key: &str) -> String {
    rule.attributes
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn row(rule: &ListedRule) -> RuleRow {
    let disabled = rule
        .attributes
        .get("disabled")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let tags = match rule.attributes.get("tags") {
        Some(Value::Array(tags)) => tags
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    };
    RuleRow {
        index: rule.index,
        name: text(rule, "name"),
        disabled: if disabled { "yes".into() } else { String::new() },
        tags,
        uuid: text(rule, "uuid"),
    }
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(appliance: Arc<Appliance>, args: RulesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        RulesCommand::List { location } => match util::family(location.family) {
            Family::Security => list::<SecurityRule>(appliance, &location, global).await,
            Family::Decryption => list::<DecryptionRule>(appliance, &location, global).await,
            Family::Nat => list::<NatRule>(appliance, &location, global).await,
        },
        RulesCommand::Move {
            location,
            position,
            reference,
            names,
        } => match util::family(location.family) {
            Family::Security => {
                move_group::<SecurityRule>(&appliance, &location, position, reference.as_deref(), &names, global).await
            }
            Family::Decryption => {
                move_group::<DecryptionRule>(&appliance, &location, position, reference.as_deref(), &names, global)
                    .await
            }
            Family::Nat => {
                move_group::<NatRule>(&appliance, &location, position, reference.as_deref(), &names, global).await
            }
        },
    }
}

async fn list<R: PolicyRule>(
    appliance: Arc<Appliance>,
    location: &LocationArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let source = RulebaseDataSource::<R, Appliance>::new(appliance)
        .with_timeouts(util::timeouts(global, Timeouts::data_source()));
    let cancel = util::cancel_on_ctrl_c();
    let data = source
        .read(&util::location_attributes(location), &cancel)
        .await?;

    let rules: Vec<ListedRule> = match data.attributes.get("rule") {
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(Value::as_object)
            .enumerate()
            .map(|(i, block)| ListedRule {
                index: i + 1,
                attributes: block.clone(),
            })
            .collect(),
        _ => Vec::new(),
    };

    let out = output::render_list(&global.output, &rules, row, |r| text(r, "name"))?;
    output::print_output(&out, global.quiet)?;
    Ok(())
}

async fn move_group<R: PolicyRule>(
    appliance: &Appliance,
    location: &LocationArgs,
    position: Option<PositionArg>,
    reference: Option<&str>,
    names: &[String],
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let target = util::location(location, appliance.topology())?;
    let placement = util::placement(position, reference);
    let cancel = util::cancel_on_ctrl_c();
    let limit = util::timeouts(global, Timeouts::rule_group()).update;

    let moved = panrule_core::resource::with_deadline(
        limit,
        &cancel,
        RulebaseClient::<R>::move_group(appliance, &target, &placement, names),
    )
    .await?;

    let message = if moved {
        format!("moved {} rule(s) in {target}", names.len())
    } else {
        format!("rules already in place in {target}")
    };
    output::print_output(&message, global.quiet)?;
    Ok(())
}
