//! # Stagehand Configuration
//!
//! Construction-time options for a [`LoaderExtension`](crate::LoaderExtension).
//! The core never reads the process environment on its own; the entry point
//! calls [`ExtensionOptions::from_env`] once and hands the result down.

use crate::runtime::{FsRuntime, RuntimeSourcePtr, DEFAULT_CDN_HOST};
use crate::{Result, StagehandError};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Default location of an npm-installed runtime, relative to the app root.
pub const DEFAULT_RUNTIME_DIR: &str = "node_modules/yui";

/// Deployment mode the extension seeds its defaults from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Unminified, uncombined modules with verbose client logging.
    Development,
    /// Minified, combined modules.
    #[default]
    Production,
}

impl Environment {
    /// Read `STAGEHAND_ENV`. Unset or unrecognised values mean production.
    pub fn from_env() -> Self {
        match env::var("STAGEHAND_ENV") {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                warn!("{}, falling back to production", e);
                Environment::Production
            }),
            Err(_) => Environment::Production,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl FromStr for Environment {
    type Err = StagehandError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(StagehandError::InvalidSource(format!(
                "unknown environment '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// Options an extension is constructed from.
///
/// # Example
/// ```rust
/// use stagehand_core::{ClientRuntime, Environment, ExtensionOptions, StaticRuntime};
/// use std::sync::Arc;
///
/// let options = ExtensionOptions::default()
///     .with_environment(Environment::Development)
///     .with_runtime_source(Arc::new(StaticRuntime(ClientRuntime::new("yui", "3.18.1"))));
/// assert!(options.environment.is_development());
/// ```
#[derive(Debug, Clone)]
pub struct ExtensionOptions {
    /// Deployment mode. Development applies the `debug` preset at construction.
    /// Default: production, Env: STAGEHAND_ENV=development
    pub environment: Environment,

    /// Host used to derive `base` and `comboBase`.
    /// Default: the public runtime CDN, Env: STAGEHAND_CDN_HOST
    pub cdn_host: String,

    /// Where the client runtime is located at construction time.
    /// Default: `node_modules/yui` on disk, Env: STAGEHAND_RUNTIME_DIR
    pub runtime: RuntimeSourcePtr,
}

impl Default for ExtensionOptions {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            cdn_host: DEFAULT_CDN_HOST.to_string(),
            runtime: Arc::new(FsRuntime::new(DEFAULT_RUNTIME_DIR)),
        }
    }
}

impl ExtensionOptions {
    /// Create options from environment variables.
    /// Falls back to defaults for missing variables.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        options.environment = Environment::from_env();

        if let Ok(v) = env::var("STAGEHAND_CDN_HOST") {
            options.cdn_host = v;
        }
        if let Ok(v) = env::var("STAGEHAND_RUNTIME_DIR") {
            options.runtime = Arc::new(FsRuntime::new(v));
        }

        options
    }

    /// Builder: Set the deployment mode.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Builder: Set the CDN host.
    pub fn with_cdn_host(mut self, host: impl Into<String>) -> Self {
        self.cdn_host = host.into();
        self
    }

    /// Builder: Set how the client runtime is located.
    pub fn with_runtime_source(mut self, source: RuntimeSourcePtr) -> Self {
        self.runtime = source;
        self
    }
}
