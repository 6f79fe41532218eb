// End-to-end reconciliation scenarios against an in-memory rulebase.
#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use common::MemoryRulebase;
use panrule_core::location::Topology;
use panrule_core::{
    Attributes, CoreError, GroupIdentity, PolicyResource, PolicyRule, ResourceData,
    RuleGroupResource, RulebaseDataSource, SecurityRule,
};

// ── Helpers ─────────────────────────────────────────────────────────

type Fake = MemoryRulebase<SecurityRule>;

fn setup(existing: &[&str]) -> (Arc<Fake>, RuleGroupResource<SecurityRule, Fake>) {
    let fake = Arc::new(Fake::new(Topology::Standalone));
    if !existing.is_empty() {
        fake.seed(existing, SecurityRule::new);
    }
    let resource = RuleGroupResource::new(Arc::clone(&fake));
    (fake, resource)
}

fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

fn group(keyword: &str, reference: &str, names: &[&str]) -> Attributes {
    let rules: Vec<Value> = names.iter().map(|n| json!({ "name": n })).collect();
    attrs(json!({
        "position_keyword": keyword,
        "position_reference": reference,
        "rule": rules,
    }))
}

fn rule_names(data: &ResourceData) -> Vec<String> {
    data.attributes["rule"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_owned())
        .collect()
}

fn strs(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_owned()).collect()
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_create_at_top() {
    let (fake, resource) = setup(&[]);
    let cancel = CancellationToken::new();

    let data = resource
        .create(&group("top", "", &["allow-dns", "allow-ntp"]), &cancel)
        .await
        .unwrap();

    assert_eq!(fake.names(), strs(&["allow-dns", "allow-ntp"]));
    let identity = GroupIdentity::decode(&data.id, Topology::Standalone, SecurityRule::FAMILY).unwrap();
    assert_eq!(identity.names, strs(&["allow-dns", "allow-ntp"]));
    assert_eq!(rule_names(&data), strs(&["allow-dns", "allow-ntp"]));
    assert_eq!(data.attributes["position_keyword"], json!("top"));
}

#[tokio::test]
async fn insertion_before_reference() {
    let (fake, resource) = setup(&["a", "b", "c", "d"]);
    let cancel = CancellationToken::new();

    resource
        .create(&group("before", "c", &["x", "y"]), &cancel)
        .await
        .unwrap();

    assert_eq!(fake.names(), strs(&["a", "b", "x", "y", "c", "d"]));
}

#[tokio::test]
async fn insertion_after_reference() {
    let (fake, resource) = setup(&["a", "c", "d"]);
    let cancel = CancellationToken::new();

    let created = resource
        .create(&group("after", "c", &["x", "y"]), &cancel)
        .await
        .unwrap();
    assert_eq!(fake.names(), strs(&["a", "c", "x", "y", "d"]));

    let observed = resource.read(&created, &cancel).await.unwrap().unwrap();
    assert_eq!(observed.attributes["position_keyword"], json!("after"));
    assert_eq!(observed.attributes["position_reference"], json!("c"));
}

#[tokio::test]
async fn gap_after_reference_is_kept_on_read_and_closed_on_apply() {
    let (fake, resource) = setup(&["a", "c", "d"]);
    let cancel = CancellationToken::new();
    let config = group("after", "c", &["x", "y"]);

    let created = resource.create(&config, &cancel).await.unwrap();

    // Someone slips a rule in between the reference and the group.
    fake.seed(&["a", "c", "d", "x", "y"], SecurityRule::new);
    let observed = resource.read(&created, &cancel).await.unwrap().unwrap();
    assert_eq!(observed.attributes["position_keyword"], json!("after"));

    resource.update(&observed, &config, &cancel).await.unwrap();
    assert_eq!(fake.names(), strs(&["a", "c", "x", "y", "d"]));
}

#[tokio::test]
async fn directly_after_moves_group_back_behind_reference() {
    let (fake, resource) = setup(&["a", "c", "d"]);
    let cancel = CancellationToken::new();
    let config = group("directly-after", "c", &["x", "y"]);

    let created = resource.create(&config, &cancel).await.unwrap();
    assert_eq!(fake.names(), strs(&["a", "c", "x", "y", "d"]));

    // The group is dragged above its reference.
    fake.seed(&["x", "y", "a", "c", "d"], SecurityRule::new);
    let drifted = resource.read(&created, &cancel).await.unwrap().unwrap();
    assert_eq!(drifted.attributes["position_keyword"], json!(""));
    assert_eq!(rule_names(&drifted), strs(&["x", "y"]));

    resource.update(&drifted, &config, &cancel).await.unwrap();
    assert_eq!(fake.names(), strs(&["a", "c", "x", "y", "d"]));
    let last = fake.edits().pop().unwrap();
    assert!(last.writes.is_empty());
    assert_eq!(last.moves, 2);

    let observed = resource.read(&created, &cancel).await.unwrap().unwrap();
    assert_eq!(observed.attributes["position_keyword"], json!("directly-after"));
    assert_eq!(observed.attributes["position_reference"], json!("c"));
}

#[tokio::test]
async fn bottom_moves_existing_rules_below_the_rest() {
    let (fake, resource) = setup(&["x", "y", "a", "b"]);
    let cancel = CancellationToken::new();

    let created = resource
        .create(&group("bottom", "", &["x", "y"]), &cancel)
        .await
        .unwrap();
    assert_eq!(fake.names(), strs(&["a", "b", "x", "y"]));
    let first = fake.edits().pop().unwrap();
    assert!(first.writes.is_empty());

    let observed = resource.read(&created, &cancel).await.unwrap().unwrap();
    assert_eq!(observed.attributes["position_keyword"], json!("bottom"));
    assert_eq!(rule_names(&observed), strs(&["x", "y"]));
}

#[tokio::test]
async fn rename_of_middle_rule() {
    let (fake, resource) = setup(&["a", "b"]);
    let cancel = CancellationToken::new();

    let created = resource
        .create(&group("after", "a", &["x", "y"]), &cancel)
        .await
        .unwrap();
    let x_uuid = fake.uuid_of("x").unwrap();
    assert_eq!(fake.names(), strs(&["a", "x", "y", "b"]));

    let updated = resource
        .update(&created, &group("after", "a", &["x", "z"]), &cancel)
        .await
        .unwrap();

    assert_eq!(fake.names(), strs(&["a", "x", "z", "b"]));
    assert_eq!(fake.uuid_of("x"), Some(x_uuid));
    assert_eq!(rule_names(&updated), strs(&["x", "z"]));

    let last = fake.edits().pop().unwrap();
    assert_eq!(last.deletes, strs(&["y"]));
    assert_eq!(last.writes, strs(&["z"]));
}

#[tokio::test]
async fn reference_deleted_out_of_band() {
    let (fake, resource) = setup(&["a", "c"]);
    let cancel = CancellationToken::new();
    let config = group("after", "c", &["x", "y"]);

    let created = resource.create(&config, &cancel).await.unwrap();
    assert_eq!(fake.names(), strs(&["a", "c", "x", "y"]));

    fake.remove_out_of_band("c");

    let err = resource.read(&created, &cancel).await.unwrap_err();
    assert_eq!(err.to_string(), "cannot position group after \"c\": reference not present");

    let err = resource.update(&created, &config, &cancel).await.unwrap_err();
    assert!(matches!(err, CoreError::ReferenceMissing { .. }));

    let edits_before = fake.edit_count();
    let relaxed = resource
        .update(&created, &group("", "", &["x", "y"]), &cancel)
        .await
        .unwrap();
    assert_eq!(fake.edit_count(), edits_before);
    assert_eq!(fake.names(), strs(&["a", "x", "y"]));
    assert_eq!(relaxed.attributes["position_keyword"], json!(""));
}

#[tokio::test]
async fn first_rule_deleted_out_of_band() {
    let (fake, resource) = setup(&["w"]);
    let cancel = CancellationToken::new();
    let config = group("top", "", &["x", "y", "z"]);

    let created = resource.create(&config, &cancel).await.unwrap();
    assert_eq!(fake.names(), strs(&["x", "y", "z", "w"]));

    fake.remove_out_of_band("x");
    let observed = resource.read(&created, &cancel).await.unwrap().unwrap();
    assert!(rule_names(&observed).is_empty());
    assert_eq!(fake.names(), strs(&["y", "z", "w"]));

    resource.update(&observed, &config, &cancel).await.unwrap();
    assert_eq!(fake.names(), strs(&["x", "y", "z", "w"]));
}

#[tokio::test]
async fn policy_mode_owns_the_rulebase() {
    let fake = Arc::new(Fake::new(Topology::Standalone));
    fake.seed(&["s1", "s2"], SecurityRule::new);
    let resource: PolicyResource<SecurityRule, Fake> = PolicyResource::new(Arc::clone(&fake));
    let cancel = CancellationToken::new();

    let config = attrs(json!({ "rule": [{ "name": "r1" }, { "name": "r2" }, { "name": "r3" }] }));
    let data = resource.create(&config, &cancel).await.unwrap();
    assert_eq!(fake.names(), strs(&["r1", "r2", "r3"]));
    assert_eq!(data.id, "shared:rulebase:vsys1");

    let deleted = resource.delete(&data, &cancel).await.unwrap();
    assert_eq!(deleted, strs(&["r1", "r2", "r3"]));
    assert!(fake.names().is_empty());
}

// ── Invariants ──────────────────────────────────────────────────────

#[tokio::test]
async fn second_apply_sends_nothing() {
    let (fake, resource) = setup(&["a", "b"]);
    let cancel = CancellationToken::new();
    let config = group("bottom", "", &["x", "y"]);

    let created = resource.create(&config, &cancel).await.unwrap();
    let edits = fake.edit_count();
    let again = resource.update(&created, &config, &cancel).await.unwrap();

    assert_eq!(fake.edit_count(), edits);
    assert_eq!(again, created);
}

#[tokio::test]
async fn delete_leaves_neighbours_alone() {
    let (fake, resource) = setup(&["a", "b"]);
    let cancel = CancellationToken::new();

    let created = resource
        .create(&group("", "", &["x", "y"]), &cancel)
        .await
        .unwrap();
    assert_eq!(fake.names(), strs(&["a", "b", "x", "y"]));

    let deleted = resource.delete(&created, &cancel).await.unwrap();
    assert_eq!(deleted, strs(&["x", "y"]));
    assert_eq!(fake.names(), strs(&["a", "b"]));

    let again = resource.delete(&created, &cancel).await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn out_of_order_group_is_flagged_then_fixed() {
    let (fake, resource) = setup(&["a"]);
    let cancel = CancellationToken::new();
    let config = group("top", "", &["x", "y"]);

    let created = resource.create(&config, &cancel).await.unwrap();
    assert_eq!(fake.names(), strs(&["x", "y", "a"]));

    // Someone inserts a rule above the group.
    fake.seed(&["q", "x", "y", "a"], SecurityRule::new);
    let observed = resource.read(&created, &cancel).await.unwrap().unwrap();
    assert_eq!(observed.attributes["position_keyword"], json!(""));
    assert_eq!(rule_names(&observed), strs(&["x", "y"]));

    resource.update(&observed, &config, &cancel).await.unwrap();
    assert_eq!(fake.names(), strs(&["x", "y", "q", "a"]));
    let last = fake.edits().pop().unwrap();
    assert!(last.writes.is_empty());
    assert!(last.moves > 0);
}

#[tokio::test]
async fn audit_comments_follow_written_rules() {
    let (fake, resource) = setup(&[]);
    let cancel = CancellationToken::new();
    let config = attrs(json!({
        "rule": [
            { "name": "x", "audit_comment": "CHG-100" },
            { "name": "y" }
        ]
    }));

    let created = resource.create(&config, &cancel).await.unwrap();
    assert_eq!(
        fake.edits()[0].comments,
        vec![("x".to_owned(), "CHG-100".to_owned())]
    );
    assert!(created.attributes["rule"][0].get("audit_comment").is_none());

    resource.update(&created, &config, &cancel).await.unwrap();
    assert_eq!(fake.edit_count(), 1);
}

#[tokio::test]
async fn vanished_rulebase_reads_as_gone() {
    let (fake, resource) = setup(&[]);
    let cancel = CancellationToken::new();
    let created = resource
        .create(&group("", "", &["x"]), &cancel)
        .await
        .unwrap();

    fake.vanish();
    assert_eq!(resource.read(&created, &cancel).await.unwrap(), None);
}

#[tokio::test]
async fn validation_fails_before_any_call() {
    let (fake, resource) = setup(&["a"]);
    let cancel = CancellationToken::new();

    let err = resource
        .create(&group("top", "a", &["x"]), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { ref attribute, .. } if attribute == "position_reference"));

    let err = resource
        .create(&group("after", "x", &["x", "y"]), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert_eq!(fake.read_count(), 0);
}

#[tokio::test]
async fn cancelled_apply_touches_nothing() {
    let (fake, resource) = setup(&[]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = resource
        .create(&group("top", "", &["x"]), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Cancelled));
    assert!(fake.names().is_empty());
}

#[tokio::test]
async fn data_source_lists_everything() {
    let fake = Arc::new(Fake::new(Topology::Standalone));
    fake.seed(&["a", "b"], SecurityRule::new);
    let source: RulebaseDataSource<SecurityRule, Fake> = RulebaseDataSource::new(Arc::clone(&fake));

    let data = source
        .read(&Attributes::new(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(data.attributes["names"], json!(["a", "b"]));
    assert_eq!(rule_names(&data), strs(&["a", "b"]));
}
