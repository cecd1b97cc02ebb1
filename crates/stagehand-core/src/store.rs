//! Mutable-then-frozen configuration storage.
//!
//! A [`ConfigStore`] accepts writes only during an application's setup
//! phase. The first exposure calls [`ConfigStore::freeze`], which publishes
//! the document into a write-once cell; every later read is lock-free and
//! every later write is rejected.

use crate::document::{deep_merge, into_document, Document};
use crate::{Result, StagehandError};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

struct Draft {
    document: Document,
    frozen: bool,
}

/// Holds a single configuration document with deep-merge updates.
pub struct ConfigStore {
    draft: Mutex<Draft>,
    frozen: OnceCell<Arc<Document>>,
}

impl ConfigStore {
    /// Create a store seeded with `defaults`.
    pub fn new(defaults: Document) -> Self {
        Self {
            draft: Mutex::new(Draft {
                document: defaults,
                frozen: false,
            }),
            frozen: OnceCell::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Draft> {
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deep-merge `sources` into the document, left to right.
    ///
    /// All sources are validated before any is applied, so a rejected call
    /// leaves the document as it was. Fails with
    /// [`StagehandError::ConfigurationFrozen`] once the store is frozen.
    pub fn merge<I>(&self, sources: I) -> Result<Document>
    where
        I: IntoIterator<Item = Value>,
    {
        if self.frozen.get().is_some() {
            return Err(self.rejected());
        }

        let sources = sources
            .into_iter()
            .map(into_document)
            .collect::<Result<Vec<_>>>()?;

        let mut draft = self.lock();
        if draft.frozen {
            return Err(self.rejected());
        }
        debug!(sources = sources.len(), "Merging configuration sources");
        for source in sources {
            deep_merge(&mut draft.document, source);
        }
        Ok(draft.document.clone())
    }

    fn rejected(&self) -> StagehandError {
        warn!("Configuration change after first exposure was rejected");
        StagehandError::ConfigurationFrozen("configuration merge".to_string())
    }

    /// The current document; a shared read-only view once frozen.
    pub fn get(&self) -> Arc<Document> {
        if let Some(frozen) = self.frozen.get() {
            return Arc::clone(frozen);
        }
        Arc::new(self.lock().document.clone())
    }

    /// Make the document read-only. Freezing twice is a no-op.
    pub fn freeze(&self) -> Arc<Document> {
        let frozen = self.frozen.get_or_init(|| {
            let mut draft = self.lock();
            draft.frozen = true;
            debug!(keys = draft.document.len(), "Configuration frozen");
            Arc::new(draft.document.clone())
        });
        Arc::clone(frozen)
    }

    /// Whether [`freeze`](Self::freeze) has run.
    pub fn is_frozen(&self) -> bool {
        self.frozen.get().is_some() || self.lock().frozen
    }
}
