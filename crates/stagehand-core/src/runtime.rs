//! Locating the client-side loader runtime.
//!
//! An extension cannot be built without knowing which runtime release it is
//! bootstrapping. A [`RuntimeSource`] is asked once per extension
//! construction; a failure there is a deployment defect and surfaces as
//! [`StagehandError::Setup`].

use crate::document::Document;
use crate::{Result, StagehandError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Default CDN host serving runtime builds and the combo handler.
pub const DEFAULT_CDN_HOST: &str = "https://yui.yahooapis.com";

/// Default separator between modules in a combo URL.
pub const DEFAULT_COMBO_SEP: &str = "&";

/// A located client runtime release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRuntime {
    /// Package name (e.g. `yui`).
    pub name: String,

    /// Release version (e.g. `3.18.1`).
    pub version: String,

    /// Directory holding the runtime's `build/` output, when on disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ClientRuntime {
    /// Create a descriptor without a local path.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            path: None,
        }
    }

    /// Directory holding built modules, if this runtime lives on disk.
    pub fn build_dir(&self) -> Option<PathBuf> {
        self.path.as_ref().map(|p| p.join("build"))
    }

    /// Loader keys that point the client at this release on `cdn_host`.
    pub fn defaults(&self, cdn_host: &str) -> Document {
        let host = cdn_host.trim_end_matches('/');
        let defaults = json!({
            "version": self.version,
            "base": format!("{}/{}/build/", host, self.version),
            "comboBase": format!("{}/combo?", host),
            "comboSep": DEFAULT_COMBO_SEP,
            "root": format!("{}/build/", self.version),
        });
        match defaults {
            serde_json::Value::Object(map) => map,
            _ => Document::new(),
        }
    }
}

/// Trait for anything able to produce the runtime descriptor.
pub trait RuntimeSource: Send + Sync + Debug {
    /// Locate and load the runtime.
    fn locate(&self) -> Result<ClientRuntime>;
}

pub type RuntimeSourcePtr = Arc<dyn RuntimeSource>;

/// A runtime installed on disk as a package directory.
///
/// The directory must contain a `package.json` with `name` and `version`
/// and a `build/` directory with the compiled modules.
#[derive(Debug, Clone)]
pub struct FsRuntime {
    root: PathBuf,
}

#[derive(Deserialize)]
struct PackageManifest {
    name: String,
    version: String,
}

impl FsRuntime {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl RuntimeSource for FsRuntime {
    fn locate(&self) -> Result<ClientRuntime> {
        let manifest_path = self.root.join("package.json");
        debug!("Reading runtime manifest {:?}", manifest_path);

        let raw = std::fs::read_to_string(&manifest_path).map_err(|e| {
            StagehandError::Setup(format!(
                "client runtime not found at {}: {}",
                self.root.display(),
                e
            ))
        })?;
        let manifest: PackageManifest = serde_json::from_str(&raw).map_err(|e| {
            StagehandError::Setup(format!(
                "unreadable runtime manifest {}: {}",
                manifest_path.display(),
                e
            ))
        })?;

        if !self.root.join("build").is_dir() {
            return Err(StagehandError::Setup(format!(
                "client runtime at {} has no build directory",
                self.root.display()
            )));
        }

        info!("Located client runtime {}@{}", manifest.name, manifest.version);
        Ok(ClientRuntime {
            name: manifest.name,
            version: manifest.version,
            path: Some(self.root.clone()),
        })
    }
}

/// A fixed runtime descriptor, for CDN-only deployments and tests.
#[derive(Debug, Clone)]
pub struct StaticRuntime(pub ClientRuntime);

impl RuntimeSource for StaticRuntime {
    fn locate(&self) -> Result<ClientRuntime> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn install(dir: &TempDir, manifest: &str, with_build: bool) {
        std::fs::write(dir.path().join("package.json"), manifest).unwrap();
        if with_build {
            std::fs::create_dir(dir.path().join("build")).unwrap();
        }
    }

    #[test]
    fn test_fs_runtime_reads_manifest() {
        let dir = TempDir::new().unwrap();
        install(&dir, r#"{ "name": "yui", "version": "3.18.1", "main": "index.js" }"#, true);

        let runtime = FsRuntime::new(dir.path()).locate().unwrap();
        assert_eq!(runtime.name, "yui");
        assert_eq!(runtime.version, "3.18.1");
        assert_eq!(runtime.build_dir(), Some(dir.path().join("build")));
    }

    #[test]
    fn test_missing_runtime_is_setup_error() {
        let dir = TempDir::new().unwrap();
        let err = FsRuntime::new(dir.path().join("absent")).locate().unwrap_err();
        assert!(matches!(err, StagehandError::Setup(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_runtime_without_build_is_setup_error() {
        let dir = TempDir::new().unwrap();
        install(&dir, r#"{ "name": "yui", "version": "3.18.1" }"#, false);

        let err = FsRuntime::new(dir.path()).locate().unwrap_err();
        assert!(matches!(err, StagehandError::Setup(msg) if msg.contains("build")));
    }

    #[test]
    fn test_defaults_point_at_cdn() {
        let defaults = ClientRuntime::new("yui", "3.18.1").defaults("https://cdn.test/");
        assert_eq!(defaults["base"], "https://cdn.test/3.18.1/build/");
        assert_eq!(defaults["comboBase"], "https://cdn.test/combo?");
        assert_eq!(defaults["comboSep"], "&");
        assert_eq!(defaults["root"], "3.18.1/build/");
        assert_eq!(defaults["version"], "3.18.1");
    }
}
