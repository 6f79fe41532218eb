// Group mode: one resource owns a contiguous run of rules inside a rulebase
// it shares with others. The identity remembers the names placed by the
// last apply so renames and deletes never touch neighbours.

use tracing::{debug, info, warn};

use crate::codec::AuditComments;
use crate::error::CoreError;
use crate::identity::GroupIdentity;
use crate::location::Location;
use crate::model::PolicyRule;
use crate::position::{Placement, Position, group_position_is_ok};
use crate::rulebase::{ConfigureRequest, EditSummary, RulebaseClient};

/// A declared rule group, loaded and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec<R> {
    pub location: Location,
    pub placement: Placement,
    pub rules: Vec<R>,
    pub audit_comments: AuditComments,
}

impl<R: PolicyRule> GroupSpec<R> {
    pub fn names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.name().to_owned()).collect()
    }

    /// Identity the group will have once applied.
    pub fn identity(&self) -> GroupIdentity {
        GroupIdentity {
            location: self.location.clone(),
            placement: self.placement.clone(),
            names: self.names(),
        }
    }
}

/// Observed state of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupState<R> {
    pub identity: GroupIdentity,
    /// The placement as observed. The keyword is cleared when the rulebase
    /// no longer satisfies it, so the host plans a move.
    pub placement: Placement,
    /// The contiguous run still representing the group. Empty when the
    /// first declared rule is gone and the group must be recreated.
    pub rules: Vec<R>,
}

impl<R> GroupState<R> {
    pub fn needs_recreate(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<R> {
    Present(GroupState<R>),
    /// The rulebase itself is gone; the host should forget the resource.
    Gone,
}

/// Write the declared group and place it.
///
/// `previous` is the identity stored by the last apply, `None` on create.
/// Returns the identity to persist.
pub async fn apply<R, C>(
    client: &C,
    spec: &GroupSpec<R>,
    previous: Option<&GroupIdentity>,
) -> Result<(GroupIdentity, EditSummary), CoreError>
where
    R: PolicyRule,
    C: RulebaseClient<R> + ?Sized,
{
    let identity = spec.identity();
    spec.placement.validate(&identity.names)?;

    let previous_names: &[String] = match previous {
        Some(prev) if prev.location == spec.location => &prev.names,
        Some(prev) => {
            warn!(
                from = %prev.location,
                to = %spec.location,
                "group moved to another rulebase, previous rules are left in place"
            );
            &[]
        }
        None => &[],
    };

    let request = ConfigureRequest {
        rules: &spec.rules,
        audit_comments: &spec.audit_comments,
        whole_rulebase: false,
        placement: &spec.placement,
        previous_names,
    };
    let summary = client.configure_rules(&spec.location, &request).await?;
    if summary.is_noop() {
        debug!(location = %spec.location, "group already in the declared state");
    } else {
        info!(location = %spec.location, id = %identity, "group applied");
    }
    Ok((identity, summary))
}

/// Observe the group recorded in `identity`.
pub async fn read<R, C>(client: &C, identity: &GroupIdentity) -> Result<ReadOutcome<R>, CoreError>
where
    R: PolicyRule,
    C: RulebaseClient<R> + ?Sized,
{
    let location = &identity.location;
    let observed = match client.get_all(location).await {
        Ok(rules) => rules,
        Err(e) if e.is_not_found() => {
            warn!(%location, "rulebase not found, group will be recreated");
            return Ok(ReadOutcome::Gone);
        }
        Err(e) => return Err(e),
    };
    Ok(ReadOutcome::Present(observe(identity, observed)?))
}

/// Drift detection over an already fetched rulebase.
pub fn observe<R: PolicyRule>(identity: &GroupIdentity, observed: Vec<R>) -> Result<GroupState<R>, CoreError> {
    let declared = &identity.names;
    let declared_placement = &identity.placement;
    let order: Vec<&str> = observed.iter().map(|r| r.name()).collect();

    let first_idx = declared
        .first()
        .and_then(|first| order.iter().position(|n| n == first));
    let Some(first_idx) = first_idx else {
        warn!(
            location = %identity.location,
            first = declared.first().map_or("", String::as_str),
            "first rule of the group is missing, group will be recreated"
        );
        return Ok(GroupState {
            identity: identity.clone(),
            placement: declared_placement.clone(),
            rules: Vec::new(),
        });
    };

    let ref_idx = match declared_placement.reference() {
        Some(reference) => match order.iter().position(|n| *n == reference) {
            Some(idx) => Some(idx),
            None => {
                return Err(CoreError::ReferenceMissing {
                    position: declared_placement.position.to_string(),
                    reference: reference.to_owned(),
                });
            }
        },
        None => None,
    };

    let run = order
        .get(first_idx..)
        .unwrap_or_default()
        .iter()
        .zip(declared)
        .take_while(|(o, d)| **o == d.as_str())
        .count();
    let collected: Vec<String> = declared.iter().take(run).cloned().collect();

    let mut placement = declared_placement.clone();
    let in_place = group_position_is_ok(
        placement.position,
        first_idx,
        ref_idx,
        &order,
        &collected,
    );
    if !in_place && placement.position != Position::Unspecified {
        warn!(
            location = %identity.location,
            position = %placement.position,
            "group is out of position"
        );
        placement.position = Position::Unspecified;
    }
    if run < declared.len() {
        warn!(
            location = %identity.location,
            missing = declared.len() - run,
            "group is no longer contiguous"
        );
    }

    let rules = observed.into_iter().skip(first_idx).take(run).collect();
    Ok(GroupState {
        identity: identity.clone(),
        placement,
        rules,
    })
}

/// Delete exactly the rules recorded in `identity`.
///
/// The reference rule is never deleted, and rules already gone are
/// skipped. Returns the names deleted.
pub async fn delete<R, C>(client: &C, identity: &GroupIdentity) -> Result<Vec<String>, CoreError>
where
    R: PolicyRule,
    C: RulebaseClient<R> + ?Sized,
{
    let reference = identity.placement.reference();
    let names: Vec<String> = identity
        .names
        .iter()
        .filter(|name| Some(name.as_str()) != reference)
        .cloned()
        .collect();

    match client.delete(&identity.location, &names).await {
        Ok(deleted) => {
            info!(location = %identity.location, count = deleted.len(), "group deleted");
            Ok(deleted)
        }
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}
