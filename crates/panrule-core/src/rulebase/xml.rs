// XML API backed rulebases
//
// `Firewall` and `Panorama` differ only in which rulebase slots they can
// address and whether rules may carry push targets. Both turn a
// `RulebaseEdit` into a single strict multi-config transaction.

use std::sync::Arc;

use async_trait::async_trait;
use panrule_api::{MoveWhere, MultiConfigOp, XmlApiClient, xpath};
use tracing::debug;

use super::{RulebaseClient, RulebaseEdit};
use crate::error::CoreError;
use crate::location::{Location, Topology};
use crate::model::PolicyRule;
use crate::position::MoveStep;

/// A standalone firewall, addressed by vsys.
#[derive(Clone)]
pub struct Firewall {
    client: Arc<XmlApiClient>,
}

/// A Panorama controller, addressed by device group and pre/post slot.
#[derive(Clone)]
pub struct Panorama {
    client: Arc<XmlApiClient>,
}

impl Firewall {
    pub fn new(client: Arc<XmlApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &XmlApiClient {
        &self.client
    }
}

impl Panorama {
    pub fn new(client: Arc<XmlApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &XmlApiClient {
        &self.client
    }
}

fn check_topology(location: &Location, expected: Topology) -> Result<(), CoreError> {
    if location.topology() == expected {
        return Ok(());
    }
    Err(CoreError::validation(
        "rulebase",
        format!("{} cannot be addressed on a {expected} appliance", location.rulebase),
    ))
}

async fn read_rules<R: PolicyRule>(client: &XmlApiClient, location: &Location) -> Result<Vec<R>, CoreError> {
    let base = location.rules_xpath()?;
    let result = match client.get_config(&base).await {
        Ok(result) => result,
        Err(e) if e.is_not_found() => {
            debug!(%location, "rulebase not present, reading as empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    result
        .get_child("rules")
        .map(|rules| rules.get_children("entry"))
        .unwrap_or_default()
        .into_iter()
        .map(R::from_xml)
        .collect()
}

fn edit_ops<R: PolicyRule>(base: &str, edit: &RulebaseEdit<R>) -> Result<Vec<MultiConfigOp>, CoreError> {
    let mut ops = Vec::with_capacity(edit.deletes.len() + edit.writes.len() + edit.moves.len());

    for name in &edit.deletes {
        ops.push(MultiConfigOp::Delete {
            xpath: xpath::entry(base, name)?,
        });
    }
    for rule in &edit.writes {
        ops.push(MultiConfigOp::Edit {
            xpath: xpath::entry(base, rule.name())?,
            element: rule.to_xml(),
        });
    }
    for step in &edit.moves {
        let (whence, dst) = match step {
            MoveStep::Top { .. } => (MoveWhere::Top, None),
            MoveStep::Bottom { .. } => (MoveWhere::Bottom, None),
            MoveStep::Before { dst, .. } => (MoveWhere::Before, Some(dst.clone())),
            MoveStep::After { dst, .. } => (MoveWhere::After, Some(dst.clone())),
        };
        ops.push(MultiConfigOp::Move {
            xpath: xpath::entry(base, step.name())?,
            whence,
            dst,
        });
    }
    Ok(ops)
}

async fn write_edit<R: PolicyRule>(
    client: &XmlApiClient,
    location: &Location,
    edit: &RulebaseEdit<R>,
) -> Result<(), CoreError> {
    let base = location.rules_xpath()?;
    let ops = edit_ops(&base, edit)?;
    client.multi_config(&ops).await?;

    for (name, comment) in &edit.audit_comments {
        client
            .set_audit_comment(&xpath::entry(&base, name)?, comment)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl<R: PolicyRule> RulebaseClient<R> for Firewall {
    fn topology(&self) -> Topology {
        Topology::Standalone
    }

    async fn get_all(&self, location: &Location) -> Result<Vec<R>, CoreError> {
        check_topology(location, Topology::Standalone)?;
        read_rules(&self.client, location).await
    }

    async fn apply_edit(&self, location: &Location, edit: &RulebaseEdit<R>) -> Result<(), CoreError> {
        check_topology(location, Topology::Standalone)?;
        if let Some(rule) = edit.writes.iter().find(|r| {
            let common = r.common();
            !common.targets.is_empty() || common.negate_target
        }) {
            return Err(CoreError::validation(
                "target",
                format!("rule {:?} sets push targets, which only Panorama supports", rule.name()),
            ));
        }
        write_edit(&self.client, location, edit).await
    }
}

#[async_trait]
impl<R: PolicyRule> RulebaseClient<R> for Panorama {
    fn topology(&self) -> Topology {
        Topology::Controller
    }

    async fn get_all(&self, location: &Location) -> Result<Vec<R>, CoreError> {
        check_topology(location, Topology::Controller)?;
        read_rules(&self.client, location).await
    }

    async fn apply_edit(&self, location: &Location, edit: &RulebaseEdit<R>) -> Result<(), CoreError> {
        check_topology(location, Topology::Controller)?;
        write_edit(&self.client, location, edit).await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::location::Family;
    use crate::model::SecurityRule;

    #[test]
    fn edit_becomes_ordered_ops() {
        let edit = RulebaseEdit {
            deletes: vec!["old".to_owned()],
            writes: vec![SecurityRule::new("new")],
            moves: vec![MoveStep::Top {
                name: "new".to_owned(),
            }],
            audit_comments: Vec::new(),
        };
        let ops = edit_ops("/rules", &edit).expect("valid names");
        assert_eq!(ops.len(), 3);
        assert!(matches!(&ops[0], MultiConfigOp::Delete { xpath } if xpath == "/rules/entry[@name='old']"));
        assert!(matches!(&ops[1], MultiConfigOp::Edit { xpath, .. } if xpath == "/rules/entry[@name='new']"));
        assert!(matches!(
            &ops[2],
            MultiConfigOp::Move { whence: MoveWhere::Top, dst: None, .. }
        ));
    }

    #[test]
    fn firewall_rejects_panorama_slots() {
        let location =
            Location::resolve(Topology::Controller, Family::Security, None, None, None).expect("valid");
        let err = check_topology(&location, Topology::Standalone).expect_err("wrong topology");
        assert!(matches!(err, CoreError::Validation { .. }));
    }
}
