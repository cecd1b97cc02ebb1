//! # Stagehand Core
//!
//! Configuration for bootstrapping a client-side module loader, bound to
//! host web applications and exposed to each request.
//!
//! ## Features
//!
//! - Deep-merging configuration store that freezes on first exposure
//! - One loader extension per host application, attached idempotently
//! - Named presets (`debug`, `production`)
//! - Per-request snapshots with injectable contributors (groups, seed, lang)
//! - Script-safe serialization for inline bootstrap payloads
//!
//! ## Example
//!
//! ```rust,ignore
//! use stagehand_core::{AugmentationRegistry, ExtensionOptions, HostFramework, RequestScope};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(AugmentationRegistry::new(ExtensionOptions::from_env()));
//! let framework = HostFramework::new("web");
//! registry.patch_framework(&framework);
//!
//! let app = framework.create_app("blog")?;
//! let loader = app.extension().unwrap();
//! loader.debug_mode(None)?;
//!
//! let snapshot = loader.snapshot(&RequestScope::new("/")).await?;
//! let script = snapshot.to_inline_script(stagehand_core::DEFAULT_NAMESPACE)?;
//! ```

pub mod config;
pub mod contributor;
pub mod document;
pub mod error;
pub mod extension;
pub mod groups;
pub mod host;
pub mod preset;
pub mod registry;
pub mod runtime;
pub mod seed;
pub mod snapshot;
pub mod source;
pub mod store;

pub use config::{Environment, ExtensionOptions};
pub use contributor::{ContributorPtr, LangFromHeader, RequestScope, SnapshotContributor};
pub use document::Document;
pub use error::{Result, StagehandError};
pub use extension::LoaderExtension;
pub use groups::{GroupConfig, GroupRegistry};
pub use host::{HostApp, HostFramework, InitHook};
pub use preset::Preset;
pub use registry::{AugmentationRegistry, EXTENSION_ACCESSOR};
pub use runtime::{ClientRuntime, FsRuntime, RuntimeSource, StaticRuntime};
pub use seed::SeedList;
pub use snapshot::{ExposureSnapshot, TemplateLocals, DEFAULT_NAMESPACE, STATE_KEY};
pub use store::ConfigStore;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        AugmentationRegistry, Environment, ExposureSnapshot, ExtensionOptions, HostApp,
        HostFramework, LoaderExtension, Preset, RequestScope, Result, SnapshotContributor,
        StagehandError, TemplateLocals,
    };
}
