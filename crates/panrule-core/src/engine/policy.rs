// Policy mode: the declared rules are the entire rulebase.

use tracing::{info, warn};

use crate::codec::AuditComments;
use crate::error::CoreError;
use crate::location::Location;
use crate::model::PolicyRule;
use crate::position::Placement;
use crate::rulebase::{ConfigureRequest, EditSummary, RulebaseClient};

/// Make the rulebase at `location` exactly `rules`, in order.
pub async fn apply<R, C>(
    client: &C,
    location: &Location,
    rules: &[R],
    audit_comments: &AuditComments,
) -> Result<EditSummary, CoreError>
where
    R: PolicyRule,
    C: RulebaseClient<R> + ?Sized,
{
    let placement = Placement::default();
    let request = ConfigureRequest {
        rules,
        audit_comments,
        whole_rulebase: true,
        placement: &placement,
        previous_names: &[],
    };
    let summary = client.configure_rules(location, &request).await?;
    if !summary.deleted.is_empty() {
        info!(%location, deleted = ?summary.deleted, "removed rules not in the policy");
    }
    Ok(summary)
}

/// Every rule of the rulebase, or `None` when the rulebase is gone.
pub async fn read<R, C>(client: &C, location: &Location) -> Result<Option<Vec<R>>, CoreError>
where
    R: PolicyRule,
    C: RulebaseClient<R> + ?Sized,
{
    match client.get_all(location).await {
        Ok(rules) => Ok(Some(rules)),
        Err(e) if e.is_not_found() => {
            warn!(%location, "rulebase not found");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Empty the rulebase.
pub async fn delete<R, C>(client: &C, location: &Location) -> Result<Vec<String>, CoreError>
where
    R: PolicyRule,
    C: RulebaseClient<R> + ?Sized,
{
    let deleted = client.delete_all(location).await?;
    info!(%location, count = deleted.len(), "rulebase emptied");
    Ok(deleted)
}
