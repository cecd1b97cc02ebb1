//! Module group registry.
//!
//! Applications register groups of their own modules (served from the app
//! origin or a separate CDN path). Registered groups are exposed to the
//! client as `config.groups.<name>`.

use crate::contributor::{RequestScope, SnapshotContributor};
use crate::document::{into_document, Document};
use crate::snapshot::ExposureSnapshot;
use crate::{Result, StagehandError};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Loader settings for one module group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combine: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combo_base: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    /// Module metadata keyed by module name.
    #[serde(default, skip_serializing_if = "Document::is_empty")]
    pub modules: Document,
}

impl GroupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_combine(mut self, combine: bool) -> Self {
        self.combine = Some(combine);
        self
    }

    pub fn with_combo_base(mut self, combo_base: impl Into<String>) -> Self {
        self.combo_base = Some(combo_base.into());
        self
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Declare a module with its loader metadata (`requires`, `path`, ...).
    pub fn with_module(mut self, name: impl Into<String>, meta: Value) -> Self {
        self.modules.insert(name.into(), meta);
        self
    }
}

/// Collects module groups during setup and contributes them per request.
#[derive(Debug)]
pub struct GroupRegistry {
    draft: Mutex<Draft>,
    sealed: OnceCell<Arc<Document>>,
}

#[derive(Debug, Default)]
struct Draft {
    groups: Document,
    sealed: bool,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self {
            draft: Mutex::new(Draft::default()),
            sealed: OnceCell::new(),
        }
    }

    /// Register or replace a group. Fails once the owning extension froze.
    pub fn register_group(&self, name: impl Into<String>, group: GroupConfig) -> Result<&Self> {
        let name = name.into();
        let value = serde_json::to_value(&group)?;

        let mut draft = self.draft.lock().unwrap_or_else(PoisonError::into_inner);
        if draft.sealed {
            warn!("Module group '{}' registered after first exposure was rejected", name);
            return Err(StagehandError::ConfigurationFrozen(format!(
                "registration of group '{}'",
                name
            )));
        }
        debug!("Registering module group '{}'", name);
        if draft.groups.insert(name.clone(), value).is_some() {
            warn!("Module group '{}' replaced", name);
        }
        Ok(self)
    }

    /// Groups as currently registered.
    pub fn groups(&self) -> Arc<Document> {
        if let Some(sealed) = self.sealed.get() {
            return Arc::clone(sealed);
        }
        let draft = self.draft.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::new(draft.groups.clone())
    }

    fn seal(&self) -> &Arc<Document> {
        self.sealed.get_or_init(|| {
            let mut draft = self.draft.lock().unwrap_or_else(PoisonError::into_inner);
            draft.sealed = true;
            Arc::new(draft.groups.clone())
        })
    }
}

#[async_trait]
impl SnapshotContributor for GroupRegistry {
    fn name(&self) -> &str {
        "groups"
    }

    async fn contribute(
        &self,
        _scope: &RequestScope,
        snapshot: &mut ExposureSnapshot,
    ) -> Result<()> {
        let groups = self.seal();
        if groups.is_empty() {
            return Ok(());
        }
        let mut partial = Document::new();
        partial.insert("groups".to_string(), Value::Object((**groups).clone()));
        snapshot.merge_config(partial);
        Ok(())
    }

    fn on_freeze(&self) {
        self.seal();
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a group from a JSON/YAML mapping.
pub fn group_from_value(value: Value) -> Result<GroupConfig> {
    let doc = into_document(value)?;
    Ok(serde_json::from_value(Value::Object(doc))?)
}
