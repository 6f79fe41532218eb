// In-memory rulebase used by the engine scenario tests.
#![allow(clippy::unwrap_used, dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use panrule_core::location::{Location, Topology};
use panrule_core::position::apply_move_steps;
use panrule_core::{CoreError, PolicyRule, RulebaseClient, RulebaseEdit};
use uuid::Uuid;

/// One `apply_edit` call as the fake saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEdit {
    pub deletes: Vec<String>,
    pub writes: Vec<String>,
    pub moves: usize,
    pub comments: Vec<(String, String)>,
}

/// Rulebases held in memory, behaving like the appliance: new rules are
/// appended at the bottom, edits keep the uuid, moves reorder by name.
pub struct MemoryRulebase<R> {
    topology: Topology,
    rulebases: Mutex<HashMap<Location, Vec<R>>>,
    missing: Mutex<Vec<Location>>,
    edits: Mutex<Vec<RecordedEdit>>,
    reads: Mutex<usize>,
}

impl<R: PolicyRule> MemoryRulebase<R> {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            rulebases: Mutex::new(HashMap::new()),
            missing: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            reads: Mutex::new(0),
        }
    }

    pub fn location(&self) -> Location {
        Location::resolve(self.topology, R::FAMILY, None, None, None).unwrap()
    }

    /// Seed the default rulebase with rules built by `make`.
    pub fn seed<'a>(&self, names: &[&'a str], make: impl Fn(&'a str) -> R) {
        let rules = names
            .iter()
            .map(|name| {
                let mut rule = make(name);
                rule.set_uuid(Some(Uuid::new_v4()));
                rule
            })
            .collect();
        self.rulebases.lock().unwrap().insert(self.location(), rules);
    }

    pub fn names(&self) -> Vec<String> {
        self.rulebases
            .lock()
            .unwrap()
            .get(&self.location())
            .map(|rules| rules.iter().map(|r| r.name().to_owned()).collect())
            .unwrap_or_default()
    }

    pub fn uuid_of(&self, name: &str) -> Option<Uuid> {
        self.rulebases
            .lock()
            .unwrap()
            .get(&self.location())
            .and_then(|rules| rules.iter().find(|r| r.name() == name).and_then(|r| r.uuid()))
    }

    /// Delete a rule behind the engine's back.
    pub fn remove_out_of_band(&self, name: &str) {
        if let Some(rules) = self.rulebases.lock().unwrap().get_mut(&self.location()) {
            rules.retain(|r| r.name() != name);
        }
    }

    /// Make the default rulebase report "object not present".
    pub fn vanish(&self) {
        self.missing.lock().unwrap().push(self.location());
    }

    pub fn edits(&self) -> Vec<RecordedEdit> {
        self.edits.lock().unwrap().clone()
    }

    pub fn edit_count(&self) -> usize {
        self.edits.lock().unwrap().len()
    }

    pub fn read_count(&self) -> usize {
        *self.reads.lock().unwrap()
    }
}

#[async_trait]
impl<R: PolicyRule> RulebaseClient<R> for MemoryRulebase<R> {
    fn topology(&self) -> Topology {
        self.topology
    }

    async fn get_all(&self, location: &Location) -> Result<Vec<R>, CoreError> {
        *self.reads.lock().unwrap() += 1;
        if self.missing.lock().unwrap().contains(location) {
            return Err(CoreError::NotFound {
                what: location.to_string(),
            });
        }
        Ok(self
            .rulebases
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .unwrap_or_default())
    }

    async fn apply_edit(&self, location: &Location, edit: &RulebaseEdit<R>) -> Result<(), CoreError> {
        let mut all = self.rulebases.lock().unwrap();
        let mut rules = all.get(location).cloned().unwrap_or_default();

        rules.retain(|r| !edit.deletes.iter().any(|d| d == r.name()));
        for write in &edit.writes {
            let mut rule = write.clone();
            match rules.iter_mut().find(|r| r.name() == write.name()) {
                Some(existing) => {
                    rule.set_uuid(existing.uuid());
                    *existing = rule;
                }
                None => {
                    rule.set_uuid(Some(Uuid::new_v4()));
                    rules.push(rule);
                }
            }
        }

        let mut order: Vec<String> = rules.iter().map(|r| r.name().to_owned()).collect();
        apply_move_steps(&mut order, &edit.moves)?;
        let mut reordered = Vec::with_capacity(rules.len());
        for name in &order {
            let idx = rules.iter().position(|r| r.name() == name).unwrap();
            reordered.push(rules.remove(idx));
        }

        all.insert(location.clone(), reordered);
        self.edits.lock().unwrap().push(RecordedEdit {
            deletes: edit.deletes.clone(),
            writes: edit.writes.iter().map(|r| r.name().to_owned()).collect(),
            moves: edit.moves.len(),
            comments: edit.audit_comments.clone(),
        });
        Ok(())
    }
}
