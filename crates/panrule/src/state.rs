//! Local state files.
//!
//! One JSON document per managed resource, holding what the host would
//! persist between runs: the schema version it was written with, the
//! resource kind and family, the composite identity and the attribute bag.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use panrule_core::migrate;
use panrule_core::{
    Attributes, Family, MigrationContext, ResourceData, ResourceKind, SCHEMA_VERSION, StoredState,
    Topology,
};

use crate::error::CliError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub schema_version: u32,
    pub resource: ResourceKind,
    pub family: Family,
    pub id: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StateFile {
    pub fn new(resource: ResourceKind, family: Family, data: ResourceData) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            resource,
            family,
            id: data.id,
            attributes: data.attributes,
            updated_at: Some(Utc::now()),
        }
    }

    /// Load `path`; a missing file is `None`.
    pub fn load(path: &Path) -> Result<Option<Self>, CliError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Load `path`, requiring it to hold a `kind` resource.
    pub fn load_required(path: &Path, kind: ResourceKind) -> Result<Self, CliError> {
        let state = Self::load(path)?.ok_or_else(|| CliError::NoState {
            path: path.display().to_string(),
        })?;
        state.expect_kind(path, kind)?;
        Ok(state)
    }

    pub fn expect_kind(&self, path: &Path, kind: ResourceKind) -> Result<(), CliError> {
        if self.resource == kind {
            return Ok(());
        }
        Err(CliError::StateMismatch {
            path: path.display().to_string(),
            found: self.resource.to_string(),
            expected: kind.to_string(),
        })
    }

    /// Write atomically: a sibling temp file renamed over `path`.
    pub fn save(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "state saved");
        Ok(())
    }

    pub fn remove(path: &Path) -> Result<(), CliError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn data(&self) -> ResourceData {
        ResourceData {
            id: self.id.clone(),
            attributes: self.attributes.clone(),
        }
    }

    /// Upgrade state written by an older schema version. Returns whether
    /// anything changed.
    pub fn migrate(&mut self, topology: Topology) -> Result<bool, CliError> {
        let mut stored = StoredState {
            schema_version: self.schema_version,
            id: std::mem::take(&mut self.id),
            attributes: std::mem::take(&mut self.attributes),
        };
        let ctx = MigrationContext {
            kind: self.resource,
            topology,
            family: self.family,
        };
        let outcome = migrate::upgrade(&mut stored, &ctx);

        self.schema_version = stored.schema_version;
        self.id = stored.id;
        self.attributes = stored.attributes;
        let changed = outcome?;
        if changed {
            info!(id = %self.id, version = self.schema_version, "state migrated");
        }
        Ok(changed)
    }
}
