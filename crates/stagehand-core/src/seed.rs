//! Seed module URLs for the bootstrap `<script>` tags.
//!
//! The seed is the set of modules a page loads before the loader takes
//! over. URLs are derived from the exposed configuration, so they follow
//! `combine`, `filter`, `base`, `comboBase`, `comboSep` and `root`,
//! including any per-request changes made by earlier contributors.

use crate::contributor::{RequestScope, SnapshotContributor};
use crate::document::Document;
use crate::runtime::DEFAULT_COMBO_SEP;
use crate::snapshot::ExposureSnapshot;
use crate::{Result, StagehandError};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const MODULE_PATTERN: &str = r"^[A-Za-z0-9_-]+$";

static MODULE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_module_regex() -> &'static Regex {
    MODULE_REGEX.get_or_init(|| Regex::new(MODULE_PATTERN).expect("Invalid module name regex"))
}

/// Modules loaded by the page before the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedList {
    modules: Vec<String>,
}

impl SeedList {
    /// Create a seed list. Every name must match `[A-Za-z0-9_-]+`.
    ///
    /// # Example
    ///
    /// ```
    /// use stagehand_core::SeedList;
    ///
    /// let seed = SeedList::new(["yui-base", "loader"]).unwrap();
    /// assert_eq!(seed.modules(), ["yui-base", "loader"]);
    /// assert!(SeedList::new(["../etc"]).is_err());
    /// ```
    pub fn new<I, S>(modules: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let modules = modules
            .into_iter()
            .map(Into::into)
            .map(|m: String| {
                if get_module_regex().is_match(&m) {
                    Ok(m)
                } else {
                    Err(StagehandError::InvalidModule(m))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { modules })
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Script URLs for these modules under `config`.
    pub fn urls(&self, config: &Document) -> Vec<String> {
        if self.modules.is_empty() {
            return Vec::new();
        }

        let suffix = filter_suffix(config);
        let combine = config.get("combine").and_then(Value::as_bool).unwrap_or(true);
        let combo_base = string_option(config, "comboBase");

        match combo_base {
            Some(combo_base) if combine => {
                let root = string_option(config, "root").unwrap_or("");
                let sep = string_option(config, "comboSep").unwrap_or(DEFAULT_COMBO_SEP);
                let paths: Vec<String> = self
                    .modules
                    .iter()
                    .map(|m| format!("{}{}/{}{}.js", root, m, m, suffix))
                    .collect();
                vec![format!("{}{}", combo_base, paths.join(sep))]
            }
            _ => {
                let base = string_option(config, "base").unwrap_or("");
                self.modules
                    .iter()
                    .map(|m| format!("{}{}/{}{}.js", base, m, m, suffix))
                    .collect()
            }
        }
    }
}

fn string_option<'a>(config: &'a Document, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

fn filter_suffix(config: &Document) -> &'static str {
    match string_option(config, "filter").map(str::to_ascii_lowercase).as_deref() {
        Some("raw") => "",
        Some("debug") => "-debug",
        _ => "-min",
    }
}

#[async_trait]
impl SnapshotContributor for SeedList {
    fn name(&self) -> &str {
        "seed"
    }

    async fn contribute(
        &self,
        _scope: &RequestScope,
        snapshot: &mut ExposureSnapshot,
    ) -> Result<()> {
        let urls = self.urls(snapshot.config());
        snapshot.insert(
            "seed",
            Value::Array(urls.into_iter().map(Value::String).collect()),
        )
    }
}
