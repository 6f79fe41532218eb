//! `group` and `policy` subcommand handlers.
//!
//! Both resources share one lifecycle over a local state file: apply
//! creates or updates, read refreshes (and forgets a vanished resource),
//! delete removes the managed rules and the file.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use panrule_core::{
    Appliance, Attributes, CoreError, DecryptionRule, Family, NatRule, PolicyResource,
    PolicyRule, ResourceData, ResourceKind, RuleGroupResource, SecurityRule, Timeouts, Topology,
};

use crate::cli::{GlobalOpts, ResourceCommand, StateArgs};
use crate::error::CliError;
use crate::output;
use crate::state::StateFile;

use super::util;

/// Which resource a `group`/`policy` command manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Managed {
    Group,
    Policy,
}

impl Managed {
    fn kind(self) -> ResourceKind {
        match self {
            Self::Group => ResourceKind::RuleGroup,
            Self::Policy => ResourceKind::Policy,
        }
    }
}

// ── Typed resource handle ────────────────────────────────────────────

enum Handle<R> {
    Group(RuleGroupResource<R, Appliance>),
    Policy(PolicyResource<R, Appliance>),
}

impl<R: PolicyRule> Handle<R> {
    fn new(managed: Managed, appliance: Arc<Appliance>, timeouts: Timeouts) -> Self {
        match managed {
            Managed::Group => Self::Group(RuleGroupResource::new(appliance).with_timeouts(timeouts)),
            Managed::Policy => Self::Policy(PolicyResource::new(appliance).with_timeouts(timeouts)),
        }
    }

    async fn create(&self, config: &Attributes, cancel: &CancellationToken) -> Result<ResourceData, CoreError> {
        match self {
            Self::Group(r) => r.create(config, cancel).await,
            Self::Policy(r) => r.create(config, cancel).await,
        }
    }

    async fn update(
        &self,
        prior: &ResourceData,
        config: &Attributes,
        cancel: &CancellationToken,
    ) -> Result<ResourceData, CoreError> {
        match self {
            Self::Group(r) => r.update(prior, config, cancel).await,
            Self::Policy(r) => r.update(prior, config, cancel).await,
        }
    }

    async fn read(
        &self,
        prior: &ResourceData,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceData>, CoreError> {
        match self {
            Self::Group(r) => r.read(prior, cancel).await,
            Self::Policy(r) => r.read(prior, cancel).await,
        }
    }

    async fn delete(&self, prior: &ResourceData, cancel: &CancellationToken) -> Result<Vec<String>, CoreError> {
        match self {
            Self::Group(r) => r.delete(prior, cancel).await,
            Self::Policy(r) => r.delete(prior, cancel).await,
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

pub async fn handle(
    managed: Managed,
    appliance: Arc<Appliance>,
    command: ResourceCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match command {
        ResourceCommand::Apply { state, file } => {
            let prior = load_current(managed, &state, appliance.topology(), false)?;
            let family = util::resolve_family(state.family, prior.as_ref().map(|s| s.family))?;
            let declared = util::read_declaration(&file)?;
            match family {
                Family::Security => {
                    apply::<SecurityRule>(managed, appliance, &state.state, prior, &declared, global).await
                }
                Family::Decryption => {
                    apply::<DecryptionRule>(managed, appliance, &state.state, prior, &declared, global).await
                }
                Family::Nat => apply::<NatRule>(managed, appliance, &state.state, prior, &declared, global).await,
            }
        }
        ResourceCommand::Read { state } => {
            let prior = require_current(managed, &state, appliance.topology())?;
            match prior.family {
                Family::Security => read::<SecurityRule>(managed, appliance, &state.state, &prior, global).await,
                Family::Decryption => {
                    read::<DecryptionRule>(managed, appliance, &state.state, &prior, global).await
                }
                Family::Nat => read::<NatRule>(managed, appliance, &state.state, &prior, global).await,
            }
        }
        ResourceCommand::Delete { state } => {
            let prior = require_current(managed, &state, appliance.topology())?;
            let count = rule_count(&prior.attributes);
            if !util::confirm(
                &format!("Delete {count} rule(s) managed by {}?", state.state.display()),
                global.yes,
            )? {
                return Ok(());
            }
            match prior.family {
                Family::Security => delete::<SecurityRule>(managed, appliance, &state.state, &prior, global).await,
                Family::Decryption => {
                    delete::<DecryptionRule>(managed, appliance, &state.state, &prior, global).await
                }
                Family::Nat => delete::<NatRule>(managed, appliance, &state.state, &prior, global).await,
            }
        }
        ResourceCommand::Migrate { state } => migrate_offline(managed, ResourceCommand::Migrate { state }, global),
    }
}

/// Upgrade a state file without contacting the appliance.
///
/// Without a connection the topology cannot be detected, so it must be
/// given with `--topology`.
pub fn migrate_offline(managed: Managed, command: ResourceCommand, global: &GlobalOpts) -> Result<(), CliError> {
    let ResourceCommand::Migrate { state } = command else {
        return Err(CliError::Internal("migrate_offline called for another command".into()));
    };
    let topology = global.topology.map(Topology::from).ok_or_else(|| CliError::Validation {
        field: "topology".into(),
        reason: "migrate runs offline; pass --topology standalone|controller".into(),
    })?;

    let mut current = StateFile::load_required(&state.state, managed.kind())?;
    util::resolve_family(state.family, Some(current.family))?;
    let changed = current.migrate(topology)?;
    if changed {
        current.save(&state.state)?;
    }

    let message = if changed {
        format!("migrated {} to schema version {}", state.state.display(), current.schema_version)
    } else {
        format!("{} is already at schema version {}", state.state.display(), current.schema_version)
    };
    output::print_output(&message, global.quiet)?;
    Ok(())
}

// ── Typed operations ─────────────────────────────────────────────────

async fn apply<R: PolicyRule>(
    managed: Managed,
    appliance: Arc<Appliance>,
    path: &Path,
    prior: Option<StateFile>,
    declared: &Attributes,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let handle = Handle::<R>::new(managed, appliance, util::timeouts(global, Timeouts::rule_group()));
    let cancel = util::cancel_on_ctrl_c();
    let bar = util::spinner("Applying rules...", global.quiet);

    let outcome = match &prior {
        Some(state) => handle.update(&state.data(), declared, &cancel).await,
        None => handle.create(declared, &cancel).await,
    };
    bar.finish_and_clear();
    let data = outcome?;

    let before = prior.as_ref().map(|s| rule_names(&s.attributes)).unwrap_or_default();
    let after = rule_names(&data.attributes);
    let next = StateFile::new(managed.kind(), R::FAMILY, data);
    next.save(path)?;
    info!(id = %next.id, path = %path.display(), "state written");

    if !global.quiet {
        let color = output::should_color(&global.color);
        let added: Vec<String> = after.iter().filter(|n| !before.contains(n)).cloned().collect();
        let removed: Vec<String> = before.iter().filter(|n| !after.contains(n)).cloned().collect();
        for line in [
            output::change_line("created", &added, color),
            output::change_line("deleted", &removed, color),
        ]
        .into_iter()
        .flatten()
        {
            eprintln!("{line}");
        }
    }
    print_state(&next, global)
}

async fn read<R: PolicyRule>(
    managed: Managed,
    appliance: Arc<Appliance>,
    path: &Path,
    prior: &StateFile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let handle = Handle::<R>::new(managed, appliance, util::timeouts(global, Timeouts::rule_group()));
    let cancel = util::cancel_on_ctrl_c();
    let bar = util::spinner("Reading rules...", global.quiet);
    let outcome = handle.read(&prior.data(), &cancel).await;
    bar.finish_and_clear();

    match outcome? {
        Some(data) => {
            let next = StateFile::new(managed.kind(), R::FAMILY, data);
            next.save(path)?;
            print_state(&next, global)
        }
        None => {
            warn!(path = %path.display(), "resource no longer exists on the appliance, forgetting it");
            StateFile::remove(path)?;
            Ok(())
        }
    }
}

async fn delete<R: PolicyRule>(
    managed: Managed,
    appliance: Arc<Appliance>,
    path: &Path,
    prior: &StateFile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let handle = Handle::<R>::new(managed, appliance, util::timeouts(global, Timeouts::rule_group()));
    let cancel = util::cancel_on_ctrl_c();
    let bar = util::spinner("Deleting rules...", global.quiet);
    let outcome = handle.delete(&prior.data(), &cancel).await;
    bar.finish_and_clear();

    let deleted = outcome?;
    StateFile::remove(path)?;
    let color = output::should_color(&global.color);
    let line = output::change_line("deleted", &deleted, color).unwrap_or_else(|| "nothing to delete".into());
    output::print_output(&line, global.quiet)?;
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Load the state at `args.state`, upgrading it to the current schema.
fn load_current(
    managed: Managed,
    args: &StateArgs,
    topology: Topology,
    required: bool,
) -> Result<Option<StateFile>, CliError> {
    let loaded = if required {
        Some(StateFile::load_required(&args.state, managed.kind())?)
    } else {
        StateFile::load(&args.state)?
    };
    let Some(mut state) = loaded else {
        return Ok(None);
    };
    state.expect_kind(&args.state, managed.kind())?;
    util::resolve_family(args.family, Some(state.family))?;
    if state.migrate(topology)? {
        state.save(&args.state)?;
    }
    Ok(Some(state))
}

fn require_current(managed: Managed, args: &StateArgs, topology: Topology) -> Result<StateFile, CliError> {
    load_current(managed, args, topology, true)?.ok_or_else(|| CliError::NoState {
        path: args.state.display().to_string(),
    })
}

fn rule_names(attrs: &Attributes) -> Vec<String> {
    match attrs.get("rule") {
        Some(Value::Array(rules)) => rules
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_str))
            .map(str::to_owned)
            .collect(),
        _ => Vec::new(),
    }
}

fn rule_count(attrs: &Attributes) -> usize {
    rule_names(attrs).len()
}

fn attr_str<'a>(attrs: &'a Attributes, key: &str) -> &'a str {
    attrs.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn detail(state: &StateFile) -> String {
    let attrs = &state.attributes;
    let mut lines = vec![
        format!("ID:           {}", state.id),
        format!("Resource:     {}", state.resource),
        format!("Family:       {}", state.family),
        format!("Device group: {}", attr_str(attrs, "device_group")),
        format!("Rulebase:     {}", attr_str(attrs, "rulebase")),
        format!("Vsys:         {}", attr_str(attrs, "vsys")),
    ];
    if state.resource == ResourceKind::RuleGroup {
        let keyword = attr_str(attrs, "position_keyword");
        let reference = attr_str(attrs, "position_reference");
        let position = match (keyword, reference) {
            ("", _) => "(none)".to_owned(),
            (keyword, "") => keyword.to_owned(),
            (keyword, reference) => format!("{keyword} {reference:?}"),
        };
        lines.push(format!("Position:     {position}"));
    }
    let names = rule_names(attrs);
    lines.push(format!("Rules ({}):", names.len()));
    lines.extend(names.iter().map(|n| format!("  {n}")));
    lines.join("\n")
}

fn print_state(state: &StateFile, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(&global.output, state, detail, |s| s.id.clone())?;
    output::print_output(&out, global.quiet)?;
    Ok(())
}
