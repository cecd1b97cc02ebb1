//! The per-application loader extension.
//!
//! This module provides the configuration API an application uses during
//! setup and the snapshot builder the exposure middleware calls per request.

use crate::config::ExtensionOptions;
use crate::contributor::{ContributorPtr, RequestScope};
use crate::document::{into_document, Document};
use crate::preset::Preset;
use crate::runtime::ClientRuntime;
use crate::snapshot::ExposureSnapshot;
use crate::store::ConfigStore;
use crate::{Environment, Result, StagehandError};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// State captured at the freeze point and shared by every request.
struct Exposure {
    config: Arc<Document>,
    contributors: Arc<[ContributorPtr]>,
}

/// Loader configuration owned by one host application.
///
/// # Example
///
/// ```rust
/// use stagehand_core::{ClientRuntime, ExtensionOptions, LoaderExtension, StaticRuntime};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let options = ExtensionOptions::default()
///     .with_runtime_source(Arc::new(StaticRuntime(ClientRuntime::new("yui", "3.18.1"))));
/// let ext = LoaderExtension::new(&options).unwrap();
///
/// ext.configure([json!({ "fetchCSS": false })])
///     .unwrap()
///     .apply_preset("debug", Some(json!({ "combine": true })))
///     .unwrap();
///
/// let config = ext.get_config();
/// assert_eq!(config["debug"], true);
/// assert_eq!(config["combine"], true);
/// ```
pub struct LoaderExtension {
    id: Uuid,
    environment: Environment,
    runtime: ClientRuntime,
    store: ConfigStore,
    contributors: Mutex<Vec<ContributorPtr>>,
    exposure: OnceCell<Exposure>,
}

impl fmt::Debug for LoaderExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderExtension")
            .field("id", &self.id)
            .field("environment", &self.environment)
            .field("runtime", &self.runtime)
            .field("frozen", &self.is_frozen())
            .finish_non_exhaustive()
    }
}

impl LoaderExtension {
    /// Locate the client runtime and seed the configuration from it.
    ///
    /// Fails with [`StagehandError::Setup`] when the runtime is missing.
    pub fn new(options: &ExtensionOptions) -> Result<Self> {
        let runtime = options.runtime.locate()?;

        let mut defaults = runtime.defaults(&options.cdn_host);
        defaults.extend(into_document(json!({ "combine": true, "filter": "min" }))?);

        let extension = Self {
            id: Uuid::new_v4(),
            environment: options.environment,
            runtime,
            store: ConfigStore::new(defaults),
            contributors: Mutex::new(Vec::new()),
            exposure: OnceCell::new(),
        };

        if options.environment.is_development() {
            extension.debug_mode(None)?;
        }

        info!(
            id = %extension.id,
            environment = %extension.environment,
            "Loader extension ready for {}@{}",
            extension.runtime.name,
            extension.runtime.version
        );
        Ok(extension)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn runtime(&self) -> &ClientRuntime {
        &self.runtime
    }

    /// Deep-merge configuration sources, left to right.
    pub fn configure<I>(&self, sources: I) -> Result<&Self>
    where
        I: IntoIterator<Item = Value>,
    {
        self.store.merge(sources)?;
        Ok(self)
    }

    /// Apply a named preset, then `overrides` in the same merge.
    pub fn apply_preset(&self, name: &str, overrides: Option<Value>) -> Result<&Self> {
        let preset: Preset = name.parse()?;
        self.apply(preset, overrides)
    }

    /// Typed form of [`apply_preset`](Self::apply_preset).
    pub fn apply(&self, preset: Preset, overrides: Option<Value>) -> Result<&Self> {
        debug!(preset = %preset, "Applying preset");
        let mut sources = vec![Value::Object(preset.document())];
        sources.extend(overrides);
        self.configure(sources)
    }

    /// Shorthand for the `debug` preset.
    pub fn debug_mode(&self, overrides: Option<Value>) -> Result<&Self> {
        self.apply(Preset::Debug, overrides)
    }

    /// Serve the runtime from the application's own origin at `mount`.
    ///
    /// The app is expected to serve the runtime's build directory there.
    /// No combo handler is assumed: combining is switched off and
    /// `comboBase` is cleared, so a later `combine: true` still yields
    /// per-module URLs from the app origin.
    pub fn set_core_from_app_origin(&self, mount: &str) -> Result<&Self> {
        let base = format!("{}/", mount.trim_end_matches('/'));
        let root = base.trim_start_matches('/').to_string();
        self.configure([json!({
            "base": base,
            "root": root,
            "combine": false,
            "comboBase": Value::Null,
        })])
    }

    /// Current configuration; the frozen document after the first exposure.
    pub fn get_config(&self) -> Arc<Document> {
        self.store.get()
    }

    /// Add a snapshot contributor. Contributors run in registration order.
    pub fn add_contributor(&self, contributor: ContributorPtr) -> Result<&Self> {
        let mut contributors = self
            .contributors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.store.is_frozen() {
            warn!(
                "Contributor '{}' added after first exposure was rejected",
                contributor.name()
            );
            return Err(StagehandError::ConfigurationFrozen(format!(
                "contributor '{}'",
                contributor.name()
            )));
        }
        debug!("Adding snapshot contributor '{}'", contributor.name());
        contributors.push(contributor);
        Ok(self)
    }

    pub fn is_frozen(&self) -> bool {
        self.store.is_frozen()
    }

    /// Freeze the configuration. Runs once; later calls return the same
    /// document.
    pub fn freeze(&self) -> Arc<Document> {
        Arc::clone(&self.exposure().config)
    }

    fn exposure(&self) -> &Exposure {
        self.exposure.get_or_init(|| {
            let config = self.store.freeze();
            let contributors: Arc<[ContributorPtr]> = self
                .contributors
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .into();
            for contributor in contributors.iter() {
                contributor.on_freeze();
            }
            info!(
                id = %self.id,
                contributors = contributors.len(),
                "First exposure, configuration frozen"
            );
            Exposure {
                config,
                contributors,
            }
        })
    }

    /// Build a fresh snapshot for one request, freezing on first use.
    #[instrument(skip(self, scope), fields(extension = %self.id, path = %scope.path))]
    pub async fn snapshot(&self, scope: &RequestScope) -> Result<ExposureSnapshot> {
        let exposure = self.exposure();
        let mut snapshot = ExposureSnapshot::from_config(&exposure.config);

        for contributor in exposure.contributors.iter() {
            contributor
                .contribute(scope, &mut snapshot)
                .await
                .map_err(|e| match e {
                    StagehandError::Contributor { .. } => e,
                    other => StagehandError::Contributor {
                        name: contributor.name().to_string(),
                        message: other.to_string(),
                    },
                })?;
        }

        debug!("Snapshot built");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contributor::SnapshotContributor;
    use crate::runtime::StaticRuntime;
    use async_trait::async_trait;

    fn options() -> ExtensionOptions {
        ExtensionOptions::default()
            .with_cdn_host("https://cdn.test")
            .with_runtime_source(Arc::new(StaticRuntime(ClientRuntime::new("yui", "3.18.1"))))
    }

    struct Failing;

    #[async_trait]
    impl SnapshotContributor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn contribute(&self, _: &RequestScope, _: &mut ExposureSnapshot) -> Result<()> {
            Err(StagehandError::InvalidSource("no module metadata".to_string()))
        }
    }

    #[test]
    fn test_production_defaults() {
        let ext = LoaderExtension::new(&options()).unwrap();
        let config = ext.get_config();

        assert_eq!(config["combine"], true);
        assert_eq!(config["filter"], "min");
        assert_eq!(config["version"], "3.18.1");
        assert_eq!(config["base"], "https://cdn.test/3.18.1/build/");
        assert!(config.get("debug").is_none());
    }

    #[test]
    fn test_development_applies_debug_preset() {
        let options = options().with_environment(Environment::Development);
        let ext = LoaderExtension::new(&options).unwrap();
        let config = ext.get_config();

        assert_eq!(config["combine"], false);
        assert_eq!(config["debug"], true);
        assert_eq!(config["filter"], "debug");
        assert_eq!(config["logLevel"], "debug");
    }

    #[test]
    fn test_preset_overrides_win() {
        let ext = LoaderExtension::new(&options()).unwrap();
        ext.apply_preset("debug", Some(json!({ "combine": true }))).unwrap();

        let config = ext.get_config();
        assert_eq!(config["debug"], true);
        assert_eq!(config["combine"], true);
        assert_eq!(config["filter"], "debug");
    }

    #[test]
    fn test_unknown_preset() {
        let ext = LoaderExtension::new(&options()).unwrap();
        let before = ext.get_config();
        assert!(matches!(
            ext.apply_preset("turbo", None),
            Err(StagehandError::UnknownPreset(_))
        ));
        assert_eq!(ext.get_config(), before);
    }

    #[test]
    fn test_core_from_app_origin() {
        let ext = LoaderExtension::new(&options()).unwrap();
        ext.set_core_from_app_origin("/static/yui-3.18.1").unwrap();

        let config = ext.get_config();
        assert_eq!(config["base"], "/static/yui-3.18.1/");
        assert_eq!(config["root"], "static/yui-3.18.1/");
        assert_eq!(config["combine"], false);
        assert!(config["comboBase"].is_null());
    }

    #[tokio::test]
    async fn test_app_origin_survives_combining_preset() {
        let ext = LoaderExtension::new(&options()).unwrap();
        ext.set_core_from_app_origin("/loader")
            .unwrap()
            .apply_preset("production", None)
            .unwrap()
            .add_contributor(Arc::new(crate::seed::SeedList::new(["yui-base"]).unwrap()))
            .unwrap();

        let snapshot = ext.snapshot(&RequestScope::new("/")).await.unwrap();
        assert_eq!(snapshot.config()["combine"], true);
        assert_eq!(
            snapshot.get("seed"),
            Some(&json!(["/loader/yui-base/yui-base-min.js"]))
        );
    }

    #[tokio::test]
    async fn test_documented_scenario() {
        let ext = LoaderExtension::new(&options()).unwrap();
        ext.configure([json!({ "fetchCSS": false })])
            .unwrap()
            .debug_mode(None)
            .unwrap();

        ext.snapshot(&RequestScope::new("/")).await.unwrap();

        let config = ext.get_config();
        assert_eq!(config["combine"], false);
        assert_eq!(config["filter"], "debug");
        assert_eq!(config["debug"], true);
        assert_eq!(config["logLevel"], "debug");
        assert_eq!(config["fetchCSS"], false);
        assert_eq!(config["comboSep"], "&");

        let err = ext.configure([json!({ "combine": true })]).unwrap_err();
        assert!(err.is_frozen());
        assert_eq!(ext.get_config()["combine"], false);
    }

    #[tokio::test]
    async fn test_post_freeze_mutations_rejected() {
        let ext = LoaderExtension::new(&options()).unwrap();
        ext.snapshot(&RequestScope::new("/")).await.unwrap();
        let frozen = ext.get_config();

        assert!(ext.configure([json!({ "filter": "raw" })]).unwrap_err().is_frozen());
        assert!(ext.debug_mode(None).unwrap_err().is_frozen());
        assert!(ext.set_core_from_app_origin("/x").unwrap_err().is_frozen());
        assert!(ext
            .add_contributor(Arc::new(crate::contributor::LangFromHeader))
            .unwrap_err()
            .is_frozen());
        assert!(Arc::ptr_eq(&frozen, &ext.get_config()));
    }

    #[tokio::test]
    async fn test_contributor_errors_name_the_contributor() {
        let ext = LoaderExtension::new(&options()).unwrap();
        ext.add_contributor(Arc::new(Failing)).unwrap();

        let err = ext.snapshot(&RequestScope::new("/")).await.unwrap_err();
        assert!(matches!(
            err,
            StagehandError::Contributor { ref name, ref message }
                if name == "failing" && message.contains("no module metadata")
        ));
        assert!(ext.is_frozen());
    }

    #[tokio::test]
    async fn test_snapshots_are_independent() {
        let ext = LoaderExtension::new(&options()).unwrap();
        let mut first = ext.snapshot(&RequestScope::new("/a")).await.unwrap();
        let second = ext.snapshot(&RequestScope::new("/b")).await.unwrap();

        first.insert("seed", json!(["/only-first.js"])).unwrap();
        first.merge_config(into_document(json!({ "lang": "fr" })).unwrap());

        assert!(second.get("seed").is_none());
        assert!(second.config().get("lang").is_none());
        assert!(ext.get_config().get("lang").is_none());
    }
}
