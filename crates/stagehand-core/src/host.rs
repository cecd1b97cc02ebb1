//! Host application and framework handles.
//!
//! A [`HostApp`] carries named attachments, which is how extensions are bound
//! to it. A [`HostFramework`] builds applications and runs registered
//! initialization hooks on each new one.

use crate::{Result, StagehandError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::Any;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use uuid::Uuid;

type Attachment = Arc<dyn Any + Send + Sync>;

/// Hook run on every application a framework creates.
pub type InitHook = Arc<dyn Fn(&HostApp) -> Result<()> + Send + Sync>;

/// One host web application instance.
pub struct HostApp {
    id: Uuid,
    name: String,
    attachments: DashMap<String, Attachment>,
}

impl HostApp {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            attachments: DashMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value bound under `accessor`, if it has type `T`.
    pub fn attachment<T: Any + Send + Sync>(&self, accessor: &str) -> Option<Arc<T>> {
        self.attachments
            .get(accessor)
            .and_then(|entry| Arc::clone(entry.value()).downcast::<T>().ok())
    }

    pub fn has_attachment(&self, accessor: &str) -> bool {
        self.attachments.contains_key(accessor)
    }

    /// Bind the value produced by `init` under `accessor` unless one is
    /// already bound.
    ///
    /// Returns the bound value and whether this call created it. `init` runs
    /// at most once per accessor, even under concurrent calls. If `init`
    /// fails nothing is bound.
    pub fn attach_with<T, F>(&self, accessor: &str, init: F) -> Result<(Arc<T>, bool)>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T>,
    {
        match self.attachments.entry(accessor.to_string()) {
            Entry::Occupied(entry) => Arc::clone(entry.get())
                .downcast::<T>()
                .map(|value| (value, false))
                .map_err(|_| {
                    StagehandError::Setup(format!(
                        "accessor '{}' on application '{}' is bound to a different type",
                        accessor, self.name
                    ))
                }),
            Entry::Vacant(entry) => {
                let value = Arc::new(init()?);
                entry.insert(Arc::clone(&value) as Attachment);
                debug!(app = %self.name, "Bound '{}'", accessor);
                Ok((value, true))
            }
        }
    }
}

/// A framework that builds host applications.
///
/// The framework's own initializer always runs first; hooks registered with
/// [`on_init`](Self::on_init) run after it in registration order.
pub struct HostFramework {
    id: Uuid,
    name: String,
    initializer: Option<InitHook>,
    hooks: RwLock<Vec<Registered>>,
}

struct Registered {
    key: Option<String>,
    hook: InitHook,
}

impl HostFramework {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            initializer: None,
            hooks: RwLock::new(Vec::new()),
        }
    }

    /// Builder: Set the framework's own application initializer.
    pub fn with_initializer(mut self, initializer: InitHook) -> Self {
        self.initializer = Some(initializer);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a hook for every application created from now on.
    pub fn on_init(&self, hook: InitHook) {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registered { key: None, hook });
    }

    /// Register `hook` under `key` unless a hook with that key is already
    /// registered on this framework.
    ///
    /// Returns `false` when the key was taken; `hook` is dropped then.
    pub fn on_init_once(&self, key: &str, hook: InitHook) -> bool {
        let mut hooks = self.hooks.write().unwrap_or_else(PoisonError::into_inner);
        if hooks.iter().any(|h| h.key.as_deref() == Some(key)) {
            return false;
        }
        hooks.push(Registered {
            key: Some(key.to_string()),
            hook,
        });
        true
    }

    /// Whether a hook is registered under `key`.
    pub fn has_hook(&self, key: &str) -> bool {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|h| h.key.as_deref() == Some(key))
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Build an application and run the initializer and hooks on it.
    ///
    /// The first failing hook aborts creation.
    pub fn create_app(&self, name: impl Into<String>) -> Result<HostApp> {
        let app = HostApp::new(name);
        if let Some(initializer) = &self.initializer {
            initializer(&app)?;
        }

        let hooks: Vec<InitHook> = self
            .hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|h| Arc::clone(&h.hook))
            .collect();
        for hook in hooks.iter() {
            hook(&app)?;
        }

        debug!(framework = %self.name, app = %app.name, hooks = hooks.len(), "Application created");
        Ok(app)
    }
}
