//! Idempotent augmentation of host applications and frameworks.

use crate::config::ExtensionOptions;
use crate::extension::LoaderExtension;
use crate::host::{HostApp, HostFramework};
use crate::Result;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, info};

/// Accessor name the extension is bound under on every application.
pub const EXTENSION_ACCESSOR: &str = "loader";

impl HostApp {
    /// The loader extension bound to this application, if augmented.
    pub fn extension(&self) -> Option<Arc<LoaderExtension>> {
        self.attachment(EXTENSION_ACCESSOR)
    }
}

static GLOBAL: OnceCell<Arc<AugmentationRegistry>> = OnceCell::new();

/// Binds one [`LoaderExtension`] per application.
///
/// Whether a framework is patched is recorded on the framework itself, so
/// separate registries never stack hooks on the same framework.
pub struct AugmentationRegistry {
    options: ExtensionOptions,
}

impl AugmentationRegistry {
    pub fn new(options: ExtensionOptions) -> Self {
        Self { options }
    }

    /// Install the process-wide registry. Later calls return the first one
    /// and ignore their options.
    pub fn install_global(options: ExtensionOptions) -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new(options))))
    }

    /// The process-wide registry, if installed.
    pub fn global() -> Option<Arc<Self>> {
        GLOBAL.get().cloned()
    }

    pub fn options(&self) -> &ExtensionOptions {
        &self.options
    }

    /// Bind an extension to `app`, or return the one already bound.
    ///
    /// Fails with [`StagehandError::Setup`](crate::StagehandError::Setup)
    /// when the client runtime cannot be located; nothing is bound then.
    pub fn attach(&self, app: &HostApp) -> Result<Arc<LoaderExtension>> {
        let (extension, created) =
            app.attach_with(EXTENSION_ACCESSOR, || LoaderExtension::new(&self.options))?;

        if created {
            info!(app = %app.name(), extension = %extension.id(), "Application augmented");
        } else {
            debug!(
                app = %app.name(),
                "Application already augmented, reusing its loader extension"
            );
        }
        Ok(extension)
    }

    /// Augment every application `framework` creates from now on.
    ///
    /// Returns `false` if this framework was already patched, by this or any
    /// other registry; the hook is never registered twice.
    pub fn patch_framework(self: &Arc<Self>, framework: &HostFramework) -> bool {
        let registry = Arc::clone(self);
        let hook = Arc::new(move |app: &HostApp| -> Result<()> {
            registry.attach(app).map(|_| ())
        });

        if !framework.on_init_once(EXTENSION_ACCESSOR, hook) {
            debug!(framework = %framework.name(), "Framework already patched");
            return false;
        }
        info!(framework = %framework.name(), "Framework patched for automatic augmentation");
        true
    }

    pub fn is_patched(&self, framework: &HostFramework) -> bool {
        framework.has_hook(EXTENSION_ACCESSOR)
    }
}
