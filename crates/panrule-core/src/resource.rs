// ── Host-boundary resources ──
//
// The only layer that sees raw attribute bags. Each operation validates and
// loads the bag into typed records, runs the engine under the operation's
// deadline and the host's cancellation token, and dumps the observed state
// back into a bag.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::codec::{self, Attributes, Bag, RULE_BLOCK, sensitive};
use crate::engine::{self, GroupSpec, GroupState, ReadOutcome};
use crate::error::CoreError;
use crate::identity::{GroupIdentity, PolicyIdentity};
use crate::location::{Location, RulebaseSlot};
use crate::model::PolicyRule;
use crate::position::{Placement, Position};
use crate::rulebase::RulebaseClient;
use crate::schema::{self, Schema};

/// Which resource a stored state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    RuleGroup,
    Policy,
}

/// Identity plus attribute bag, as exchanged with the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    pub id: String,
    pub attributes: Attributes,
}

/// Per-operation deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    const TEN_MINUTES: Duration = Duration::from_secs(10 * 60);
    const TWO_MINUTES: Duration = Duration::from_secs(2 * 60);

    /// Rule groups and policies: ten minutes for everything.
    pub const fn rule_group() -> Self {
        Self {
            create: Self::TEN_MINUTES,
            read: Self::TEN_MINUTES,
            update: Self::TEN_MINUTES,
            delete: Self::TEN_MINUTES,
        }
    }

    /// Read-only data sources: two minutes.
    pub const fn data_source() -> Self {
        Self {
            create: Self::TWO_MINUTES,
            read: Self::TWO_MINUTES,
            update: Self::TWO_MINUTES,
            delete: Self::TWO_MINUTES,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::rule_group()
    }
}

/// Run `fut` until it finishes, `limit` passes or `cancel` fires.
///
/// Dropping the future on expiry or cancellation aborts the in-flight
/// appliance request.
pub async fn with_deadline<T, F>(limit: Duration, cancel: &CancellationToken, fut: F) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, CoreError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CoreError::Cancelled),
        outcome = tokio::time::timeout(limit, fut) => outcome.unwrap_or(Err(CoreError::Timeout {
            timeout_secs: limit.as_secs(),
        })),
    }
}

// ── Bag helpers ──────────────────────────────────────────────────────

fn load_location<R: PolicyRule>(
    bag: &Bag<'_>,
    topology: crate::location::Topology,
) -> Result<Location, CoreError> {
    let rulebase = bag
        .string("rulebase")?
        .map(|slot| {
            slot.parse::<RulebaseSlot>().map_err(|_| {
                CoreError::validation("rulebase", format!("unknown rulebase {slot:?}"))
            })
        })
        .transpose()?;
    Location::resolve(
        topology,
        R::FAMILY,
        bag.string("device_group")?.as_deref(),
        rulebase,
        bag.string("vsys")?.as_deref(),
    )
}

fn write_location(out: &mut Attributes, location: &Location) {
    out.insert("device_group".into(), Value::String(location.device_group.clone()));
    out.insert("rulebase".into(), Value::String(location.rulebase.to_string()));
    out.insert("vsys".into(), Value::String(location.vsys.clone()));
}

fn prior_rule_blocks(attrs: &Attributes) -> Vec<Attributes> {
    match attrs.get(RULE_BLOCK) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_object().cloned())
            .collect(),
        _ => Vec::new(),
    }
}

/// Dump observed rules, carrying sensitive plaintexts over from `prior`.
fn dump_rules<R: PolicyRule>(schema: &Schema, rules: &[R], prior: &Attributes) -> Value {
    let mut blocks: Vec<Attributes> = rules.iter().map(R::to_bag).collect();
    sensitive::reconcile(
        &prior_rule_blocks(prior),
        &mut blocks,
        &schema.sensitive_rule_attributes(),
    );
    Value::Array(blocks.into_iter().map(Value::Object).collect())
}

// ── Rule group ───────────────────────────────────────────────────────

/// A contiguous group of rules inside a shared rulebase.
pub struct RuleGroupResource<R, C: ?Sized> {
    client: Arc<C>,
    timeouts: Timeouts,
    _family: PhantomData<fn() -> R>,
}

impl<R, C> RuleGroupResource<R, C>
where
    R: PolicyRule,
    C: RulebaseClient<R> + ?Sized,
{
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            timeouts: Timeouts::rule_group(),
            _family: PhantomData,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn schema() -> Schema {
        schema::rule_group_schema::<R>()
    }

    fn load(&self, config: &Attributes) -> Result<GroupSpec<R>, CoreError> {
        Self::schema().validate(config)?;
        let bag = Bag::new(config);
        let location = load_location::<R>(&bag, self.client.topology())?;
        let placement = Placement::new(
            bag.enum_or("position_keyword", Position::Unspecified)?,
            bag.string_or("position_reference", "")?,
        );
        let (rules, audit_comments) = codec::load_rules::<R>(config)?;
        placement.validate(&codec::rule_names(&rules))?;
        Ok(GroupSpec {
            location,
            placement,
            rules,
            audit_comments,
        })
    }

    fn decode(&self, id: &str) -> Result<GroupIdentity, CoreError> {
        GroupIdentity::decode(id, self.client.topology(), R::FAMILY)
    }

    fn dump(state: &GroupState<R>, prior: &Attributes) -> Attributes {
        let mut out = Attributes::new();
        write_location(&mut out, &state.identity.location);
        out.insert(
            "position_keyword".into(),
            Value::String(state.placement.position.to_string()),
        );
        out.insert(
            "position_reference".into(),
            Value::String(state.placement.reference.clone()),
        );
        out.insert(RULE_BLOCK.into(), dump_rules(&Self::schema(), &state.rules, prior));
        out
    }

    async fn apply_and_refresh(
        &self,
        config: &Attributes,
        previous: Option<GroupIdentity>,
    ) -> Result<ResourceData, CoreError> {
        let spec = self.load(config)?;
        let (identity, summary) = engine::group::apply(&*self.client, &spec, previous.as_ref()).await?;
        debug!(?summary, "apply finished, refreshing");

        match engine::group::read(&*self.client, &identity).await? {
            ReadOutcome::Present(state) => Ok(ResourceData {
                id: identity.encode(),
                attributes: Self::dump(&state, config),
            }),
            ReadOutcome::Gone => Err(CoreError::NotFound {
                what: format!("rulebase {} after apply", identity.location),
            }),
        }
    }

    #[instrument(skip_all, fields(family = %R::FAMILY))]
    pub async fn create(&self, config: &Attributes, cancel: &CancellationToken) -> Result<ResourceData, CoreError> {
        with_deadline(self.timeouts.create, cancel, self.apply_and_refresh(config, None)).await
    }

    #[instrument(skip_all, fields(family = %R::FAMILY, id = %prior.id))]
    pub async fn update(
        &self,
        prior: &ResourceData,
        config: &Attributes,
        cancel: &CancellationToken,
    ) -> Result<ResourceData, CoreError> {
        let previous = self.decode(&prior.id)?;
        with_deadline(
            self.timeouts.update,
            cancel,
            self.apply_and_refresh(config, Some(previous)),
        )
        .await
    }

    /// Observe the group. `None` means the host should forget it and plan
    /// a create.
    #[instrument(skip_all, fields(family = %R::FAMILY, id = %prior.id))]
    pub async fn read(
        &self,
        prior: &ResourceData,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceData>, CoreError> {
        let identity = self.decode(&prior.id)?;
        let outcome = with_deadline(
            self.timeouts.read,
            cancel,
            engine::group::read(&*self.client, &identity),
        )
        .await?;
        Ok(match outcome {
            ReadOutcome::Present(state) => Some(ResourceData {
                id: prior.id.clone(),
                attributes: Self::dump(&state, &prior.attributes),
            }),
            ReadOutcome::Gone => None,
        })
    }

    #[instrument(skip_all, fields(family = %R::FAMILY, id = %prior.id))]
    pub async fn delete(&self, prior: &ResourceData, cancel: &CancellationToken) -> Result<Vec<String>, CoreError> {
        let identity = self.decode(&prior.id)?;
        with_deadline(
            self.timeouts.delete,
            cancel,
            engine::group::delete(&*self.client, &identity),
        )
        .await
    }
}

// ── Policy ───────────────────────────────────────────────────────────

/// A whole rulebase managed as one resource.
pub struct PolicyResource<R, C: ?Sized> {
    client: Arc<C>,
    timeouts: Timeouts,
    _family: PhantomData<fn() -> R>,
}

impl<R, C> PolicyResource<R, C>
where
    R: PolicyRule,
    C: RulebaseClient<R> + ?Sized,
{
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            timeouts: Timeouts::rule_group(),
            _family: PhantomData,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn schema() -> Schema {
        schema::policy_schema::<R>()
    }

    fn decode(&self, id: &str) -> Result<PolicyIdentity, CoreError> {
        PolicyIdentity::decode(id, self.client.topology(), R::FAMILY)
    }

    fn dump(location: &Location, rules: &[R], prior: &Attributes) -> Attributes {
        let mut out = Attributes::new();
        write_location(&mut out, location);
        out.insert(RULE_BLOCK.into(), dump_rules(&Self::schema(), rules, prior));
        out
    }

    async fn apply_and_refresh(&self, config: &Attributes) -> Result<ResourceData, CoreError> {
        Self::schema().validate(config)?;
        let location = load_location::<R>(&Bag::new(config), self.client.topology())?;
        let (rules, comments) = codec::load_rules::<R>(config)?;

        engine::policy::apply(&*self.client, &location, &rules, &comments).await?;
        let observed = engine::policy::read(&*self.client, &location)
            .await?
            .unwrap_or_default();
        Ok(ResourceData {
            id: PolicyIdentity {
                location: location.clone(),
            }
            .encode(),
            attributes: Self::dump(&location, &observed, config),
        })
    }

    #[instrument(skip_all, fields(family = %R::FAMILY))]
    pub async fn create(&self, config: &Attributes, cancel: &CancellationToken) -> Result<ResourceData, CoreError> {
        with_deadline(self.timeouts.create, cancel, self.apply_and_refresh(config)).await
    }

    #[instrument(skip_all, fields(family = %R::FAMILY, id = %prior.id))]
    pub async fn update(
        &self,
        prior: &ResourceData,
        config: &Attributes,
        cancel: &CancellationToken,
    ) -> Result<ResourceData, CoreError> {
        self.decode(&prior.id)?;
        with_deadline(self.timeouts.update, cancel, self.apply_and_refresh(config)).await
    }

    #[instrument(skip_all, fields(family = %R::FAMILY, id = %prior.id))]
    pub async fn read(
        &self,
        prior: &ResourceData,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceData>, CoreError> {
        let identity = self.decode(&prior.id)?;
        let observed = with_deadline(
            self.timeouts.read,
            cancel,
            engine::policy::read(&*self.client, &identity.location),
        )
        .await?;
        Ok(observed.map(|rules| ResourceData {
            id: prior.id.clone(),
            attributes: Self::dump(&identity.location, &rules, &prior.attributes),
        }))
    }

    #[instrument(skip_all, fields(family = %R::FAMILY, id = %prior.id))]
    pub async fn delete(&self, prior: &ResourceData, cancel: &CancellationToken) -> Result<Vec<String>, CoreError> {
        let identity = self.decode(&prior.id)?;
        with_deadline(
            self.timeouts.delete,
            cancel,
            engine::policy::delete(&*self.client, &identity.location),
        )
        .await
    }
}

// ── Data source ──────────────────────────────────────────────────────

/// Read-only listing of one rulebase.
pub struct RulebaseDataSource<R, C: ?Sized> {
    client: Arc<C>,
    timeouts: Timeouts,
    _family: PhantomData<fn() -> R>,
}

impl<R, C> RulebaseDataSource<R, C>
where
    R: PolicyRule,
    C: RulebaseClient<R> + ?Sized,
{
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            timeouts: Timeouts::data_source(),
            _family: PhantomData,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn schema() -> Schema {
        schema::rulebase_data_source_schema::<R>()
    }

    /// List the rulebase selected by `config`. A missing rulebase lists as
    /// empty.
    #[instrument(skip_all, fields(family = %R::FAMILY))]
    pub async fn read(&self, config: &Attributes, cancel: &CancellationToken) -> Result<ResourceData, CoreError> {
        Self::schema().validate(config)?;
        let location = load_location::<R>(&Bag::new(config), self.client.topology())?;
        let rules = with_deadline(
            self.timeouts.read,
            cancel,
            engine::policy::read(&*self.client, &location),
        )
        .await?
        .unwrap_or_default();

        let mut attributes = Attributes::new();
        write_location(&mut attributes, &location);
        attributes.insert(
            "names".into(),
            Value::Array(
                codec::rule_names(&rules)
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ),
        );
        attributes.insert(RULE_BLOCK.into(), codec::save_rules(&rules));
        Ok(ResourceData {
            id: PolicyIdentity { location }.encode(),
            attributes,
        })
    }
}
