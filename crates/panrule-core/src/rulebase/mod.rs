// ── Rulebase addressing ──
//
// The engine talks to one `RulebaseClient` per appliance. Implementations
// only need to list a rulebase and apply an edit atomically; computing the
// minimal edit (writes, deletes, moves, audit comments) is shared and pure.

mod xml;

pub use xml::{Firewall, Panorama};

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::codec::AuditComments;
use crate::error::CoreError;
use crate::location::{Location, Topology};
use crate::model::PolicyRule;
use crate::position::{MoveStep, Placement, Position, group_position_is_ok, plan_group_move};

/// One atomic change to a rulebase.
///
/// Applied in field order: deletes, writes, moves. Audit comments are
/// recorded once the change has landed.
#[derive(Debug, Clone, PartialEq)]
pub struct RulebaseEdit<R> {
    pub deletes: Vec<String>,
    /// Full replacements; rules not yet present are appended at the bottom.
    pub writes: Vec<R>,
    pub moves: Vec<MoveStep>,
    /// `(rule name, comment)` pairs.
    pub audit_comments: Vec<(String, String)>,
}

impl<R> Default for RulebaseEdit<R> {
    fn default() -> Self {
        Self {
            deletes: Vec::new(),
            writes: Vec::new(),
            moves: Vec::new(),
            audit_comments: Vec::new(),
        }
    }
}

impl<R> RulebaseEdit<R> {
    /// Whether the edit changes nothing on the appliance.
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.writes.is_empty() && self.moves.is_empty()
    }
}

/// Everything `configure_rules` needs to reconcile a declared slice.
#[derive(Debug)]
pub struct ConfigureRequest<'a, R> {
    /// Declared rules, in order.
    pub rules: &'a [R],
    pub audit_comments: &'a AuditComments,
    /// `true` when the declared slice is the entire rulebase.
    pub whole_rulebase: bool,
    pub placement: &'a Placement,
    /// Names recorded by the previous apply; empty on create.
    pub previous_names: &'a [String],
}

/// What a `configure_rules` call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditSummary {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
    pub moved: bool,
}

impl EditSummary {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty() && !self.moved
    }
}

/// Compute the minimal edit turning `observed` into the requested state.
///
/// Rules whose content already matches are not rewritten, names recorded
/// previously but no longer declared are deleted, and the group is moved
/// only when the rulebase after the edit would not satisfy the placement.
pub fn plan_edit<R: PolicyRule>(
    observed: &[R],
    request: &ConfigureRequest<'_, R>,
) -> Result<(RulebaseEdit<R>, EditSummary), CoreError> {
    let declared: Vec<String> = request.rules.iter().map(|r| r.name().to_owned()).collect();
    let placement = if request.whole_rulebase {
        Placement::new(Position::Top, "")
    } else {
        request.placement.validate(&declared)?;
        request.placement.clone()
    };

    let by_name: HashMap<&str, &R> = observed.iter().map(|r| (r.name(), r)).collect();
    if let Some(reference) = placement.reference() {
        if !by_name.contains_key(reference) {
            return Err(CoreError::ReferenceMissing {
                position: placement.position.to_string(),
                reference: reference.to_owned(),
            });
        }
    }

    let wanted: HashSet<&str> = declared.iter().map(String::as_str).collect();
    let deletes: Vec<String> = if request.whole_rulebase {
        observed
            .iter()
            .map(|r| r.name())
            .filter(|name| !wanted.contains(name))
            .map(String::from)
            .collect()
    } else {
        request
            .previous_names
            .iter()
            .filter(|name| !wanted.contains(name.as_str()))
            .filter(|name| by_name.contains_key(name.as_str()))
            .filter(|name| placement.reference() != Some(name.as_str()))
            .cloned()
            .collect()
    };

    let mut summary = EditSummary {
        deleted: deletes.clone(),
        ..EditSummary::default()
    };
    let mut writes = Vec::new();
    for rule in request.rules {
        match by_name.get(rule.name()) {
            None => summary.created.push(rule.name().to_owned()),
            Some(current) if !current.same_config(rule) => {
                summary.updated.push(rule.name().to_owned());
            }
            Some(_) => continue,
        }
        writes.push(rule.clone());
    }

    // Order the appliance will hold once deletes and writes have landed.
    let removed: HashSet<&str> = deletes.iter().map(String::as_str).collect();
    let mut after: Vec<String> = observed
        .iter()
        .map(|r| r.name())
        .filter(|name| !removed.contains(name))
        .map(String::from)
        .collect();
    after.extend(summary.created.iter().cloned());

    let moves = if placement_holds(&placement, &after, &declared) {
        Vec::new()
    } else {
        let enforced = Placement::new(placement.position.enforced(), placement.reference.clone());
        plan_group_move(&enforced, &declared)
    };
    summary.moved = !moves.is_empty();

    let audit_comments = summary
        .created
        .iter()
        .chain(&summary.updated)
        .filter_map(|name| {
            request
                .audit_comments
                .get(name)
                .map(|comment| (name.clone(), comment.clone()))
        })
        .collect();

    Ok((
        RulebaseEdit {
            deletes,
            writes,
            moves,
            audit_comments,
        },
        summary,
    ))
}

fn placement_holds(placement: &Placement, order: &[String], declared: &[String]) -> bool {
    let Some(first) = declared.first() else {
        return true;
    };
    let Some(first_idx) = order.iter().position(|n| n == first) else {
        return false;
    };
    let ref_idx = placement
        .reference()
        .and_then(|reference| order.iter().position(|n| n == reference));
    group_position_is_ok(
        placement.position.enforced(),
        first_idx,
        ref_idx,
        order,
        declared,
    )
}

/// Access to the ordered rulebases of one appliance for rule family `R`.
#[async_trait]
pub trait RulebaseClient<R: PolicyRule>: Send + Sync {
    /// Deployment topology of the appliance behind this client.
    fn topology(&self) -> Topology;

    /// Every rule of the rulebase at `location`, in evaluation order.
    ///
    /// A rulebase that does not exist yet reads as empty.
    async fn get_all(&self, location: &Location) -> Result<Vec<R>, CoreError>;

    /// Apply `edit` as one transaction, then record its audit comments.
    async fn apply_edit(&self, location: &Location, edit: &RulebaseEdit<R>) -> Result<(), CoreError>;

    /// Reconcile the declared slice against the rulebase with one write.
    ///
    /// Sends nothing when the rulebase already matches.
    async fn configure_rules(
        &self,
        location: &Location,
        request: &ConfigureRequest<'_, R>,
    ) -> Result<EditSummary, CoreError> {
        let observed = self.get_all(location).await?;
        let (edit, summary) = plan_edit(&observed, request)?;
        if edit.is_empty() {
            debug!(%location, "rulebase already matches, nothing to send");
            return Ok(summary);
        }
        info!(
            %location,
            created = summary.created.len(),
            updated = summary.updated.len(),
            deleted = summary.deleted.len(),
            moved = summary.moved,
            "configuring rules"
        );
        self.apply_edit(location, &edit).await?;
        Ok(summary)
    }

    /// Delete the named rules. Names already gone are skipped.
    ///
    /// Returns the names actually deleted.
    async fn delete(&self, location: &Location, names: &[String]) -> Result<Vec<String>, CoreError> {
        let observed = match self.get_all(location).await {
            Ok(rules) => rules,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let present: HashSet<&str> = observed.iter().map(|r| r.name()).collect();
        let deletes: Vec<String> = names
            .iter()
            .filter(|name| present.contains(name.as_str()))
            .cloned()
            .collect();
        if deletes.is_empty() {
            debug!(%location, "no rules left to delete");
            return Ok(deletes);
        }

        info!(%location, count = deletes.len(), "deleting rules");
        let edit = RulebaseEdit {
            deletes: deletes.clone(),
            ..RulebaseEdit::default()
        };
        self.apply_edit(location, &edit).await?;
        Ok(deletes)
    }

    /// Move existing rules `names` as a contiguous group per `placement`.
    ///
    /// Returns whether a move was needed.
    async fn move_group(
        &self,
        location: &Location,
        placement: &Placement,
        names: &[String],
    ) -> Result<bool, CoreError> {
        placement.validate(names)?;
        let observed = self.get_all(location).await?;
        let order: Vec<String> = observed.iter().map(|r| r.name().to_owned()).collect();

        if let Some(missing) = names.iter().find(|n| !order.contains(n)) {
            return Err(CoreError::NotFound {
                what: format!("rule {missing:?} in {location}"),
            });
        }
        if let Some(reference) = placement.reference() {
            if !order.iter().any(|n| n == reference) {
                return Err(CoreError::ReferenceMissing {
                    position: placement.position.to_string(),
                    reference: reference.to_owned(),
                });
            }
        }
        if placement_holds(placement, &order, names) {
            debug!(%location, "group already in place");
            return Ok(false);
        }

        let enforced = Placement::new(placement.position.enforced(), placement.reference.clone());
        let edit = RulebaseEdit {
            moves: plan_group_move(&enforced, names),
            ..RulebaseEdit::default()
        };
        info!(%location, position = %placement.position, "moving rule group");
        self.apply_edit(location, &edit).await?;
        Ok(true)
    }

    /// Remove every rule of the rulebase.
    async fn delete_all(&self, location: &Location) -> Result<Vec<String>, CoreError> {
        let observed = match self.get_all(location).await {
            Ok(rules) => rules,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let names: Vec<String> = observed.iter().map(|r| r.name().to_owned()).collect();
        self.delete(location, &names).await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::SecurityRule;
    use crate::position::apply_move_steps;

    fn rules(names: &[&str]) -> Vec<SecurityRule> {
        names.iter().map(|n| SecurityRule::new(*n)).collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| (*n).to_owned()).collect()
    }

    fn request<'a>(
        declared: &'a [SecurityRule],
        comments: &'a AuditComments,
        placement: &'a Placement,
        previous: &'a [String],
    ) -> ConfigureRequest<'a, SecurityRule> {
        ConfigureRequest {
            rules: declared,
            audit_comments: comments,
            whole_rulebase: false,
            placement,
            previous_names: previous,
        }
    }

    /// Replay an edit against a name list the way the appliance would.
    fn replay(observed: &[&str], edit: &RulebaseEdit<SecurityRule>) -> Vec<String> {
        let mut list: Vec<String> = names(observed)
            .into_iter()
            .filter(|n| !edit.deletes.contains(n))
            .collect();
        for rule in &edit.writes {
            if !list.iter().any(|n| n == rule.name()) {
                list.push(rule.name().to_owned());
            }
        }
        apply_move_steps(&mut list, &edit.moves).expect("moves apply");
        list
    }

    #[test]
    fn insert_before_reference() {
        let observed = rules(&["a", "b", "c", "d"]);
        let declared = rules(&["x", "y"]);
        let placement = Placement::new(Position::Before, "c");
        let comments = AuditComments::new();
        let (edit, summary) =
            plan_edit(&observed, &request(&declared, &comments, &placement, &[])).expect("plans");

        assert_eq!(summary.created, vec!["x", "y"]);
        assert!(summary.moved);
        assert_eq!(replay(&["a", "b", "c", "d"], &edit), names(&["a", "b", "x", "y", "c", "d"]));
    }

    #[test]
    fn matching_rulebase_needs_nothing() {
        let observed = rules(&["x", "y", "a"]);
        let declared = rules(&["x", "y"]);
        let placement = Placement::new(Position::Top, "");
        let comments = AuditComments::from([("x".to_owned(), "CHG-7".to_owned())]);
        let (edit, summary) =
            plan_edit(&observed, &request(&declared, &comments, &placement, &names(&["x", "y"])))
                .expect("plans");
        assert!(edit.is_empty());
        assert!(summary.is_noop());
        assert!(edit.audit_comments.is_empty());
    }

    #[test]
    fn rename_deletes_old_and_gathers_new() {
        let observed = rules(&["a", "x", "y", "b"]);
        let declared = rules(&["x", "z"]);
        let placement = Placement::default();
        let comments = AuditComments::new();
        let previous = names(&["x", "y"]);
        let (edit, summary) =
            plan_edit(&observed, &request(&declared, &comments, &placement, &previous))
                .expect("plans");

        assert_eq!(summary.deleted, vec!["y"]);
        assert_eq!(summary.created, vec!["z"]);
        assert!(summary.updated.is_empty());
        assert_eq!(replay(&["a", "x", "y", "b"], &edit), names(&["a", "x", "z", "b"]));
    }

    #[test]
    fn missing_reference_fails_without_edit() {
        let declared = rules(&["x"]);
        let placement = Placement::new(Position::After, "c");
        let comments = AuditComments::new();
        let err = plan_edit(&rules(&["a"]), &request(&declared, &comments, &placement, &[]))
            .expect_err("reference missing");
        assert_eq!(err.to_string(), "cannot position group after \"c\": reference not present");
    }

    #[test]
    fn comments_only_for_written_rules() {
        let mut changed = SecurityRule::new("y");
        changed.common.description = Some("new".into());
        let observed = rules(&["x", "y"]);
        let declared = vec![SecurityRule::new("x"), changed];
        let placement = Placement::default();
        let comments = AuditComments::from([
            ("x".to_owned(), "untouched".to_owned()),
            ("y".to_owned(), "CHG-2".to_owned()),
        ]);
        let (edit, summary) =
            plan_edit(&observed, &request(&declared, &comments, &placement, &[])).expect("plans");
        assert_eq!(summary.updated, vec!["y"]);
        assert_eq!(edit.audit_comments, vec![("y".to_owned(), "CHG-2".to_owned())]);
    }

    #[test]
    fn whole_rulebase_replaces_everything() {
        let observed = rules(&["s1", "r2", "s2"]);
        let declared = rules(&["r1", "r2", "r3"]);
        let comments = AuditComments::new();
        let placement = Placement::default();
        let req = ConfigureRequest {
            whole_rulebase: true,
            ..request(&declared, &comments, &placement, &[])
        };
        let (edit, summary) = plan_edit(&observed, &req).expect("plans");
        assert_eq!(summary.deleted, vec!["s1", "s2"]);
        assert_eq!(replay(&["s1", "r2", "s2"], &edit), names(&["r1", "r2", "r3"]));
    }

    #[test]
    fn reference_is_never_deleted() {
        let observed = rules(&["c", "x"]);
        let declared = rules(&["x"]);
        let placement = Placement::new(Position::After, "c");
        let comments = AuditComments::new();
        let previous = names(&["c", "x"]);
        let (edit, _) =
            plan_edit(&observed, &request(&declared, &comments, &placement, &previous))
                .expect("plans");
        assert!(edit.deletes.is_empty());
    }
}
