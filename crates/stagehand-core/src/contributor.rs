use crate::document::Document;
use crate::snapshot::ExposureSnapshot;
use crate::Result;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// What a contributor may know about the request being served.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestScope {
    pub path: String,
    pub query: Option<String>,
    headers: BTreeMap<String, String>,
}

impl RequestScope {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Add a header. Names are case-insensitive.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Trait for collaborators that add request-scoped data to a snapshot
/// (module groups, seed lists, language selection).
#[async_trait]
pub trait SnapshotContributor: Send + Sync {
    /// Identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Add this contributor's data to `snapshot`.
    async fn contribute(
        &self,
        scope: &RequestScope,
        snapshot: &mut ExposureSnapshot,
    ) -> Result<()>;

    /// Called once when the owning extension freezes its configuration.
    fn on_freeze(&self) {}
}

pub type ContributorPtr = Arc<dyn SnapshotContributor>;

const LANG_TAG_PATTERN: &str = r"^[A-Za-z]{1,8}(-[A-Za-z0-9]{1,8})*$";

static LANG_TAG_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_lang_tag_regex() -> &'static Regex {
    LANG_TAG_REGEX.get_or_init(|| Regex::new(LANG_TAG_PATTERN).expect("Invalid language tag regex"))
}

/// Sets `config.lang` from the request's preferred `Accept-Language` tag.
#[derive(Debug, Clone, Default)]
pub struct LangFromHeader;

impl LangFromHeader {
    /// First usable language tag of an `Accept-Language` value.
    pub fn preferred(header: &str) -> Option<String> {
        header
            .split(',')
            .filter_map(|part| part.split(';').next())
            .map(str::trim)
            .find(|tag| get_lang_tag_regex().is_match(tag))
            .map(str::to_string)
    }
}

#[async_trait]
impl SnapshotContributor for LangFromHeader {
    fn name(&self) -> &str {
        "lang"
    }

    async fn contribute(
        &self,
        scope: &RequestScope,
        snapshot: &mut ExposureSnapshot,
    ) -> Result<()> {
        if let Some(lang) = scope.header("accept-language").and_then(Self::preferred) {
            let mut partial = Document::new();
            partial.insert("lang".to_string(), Value::String(lang));
            snapshot.merge_config(partial);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headers_are_case_insensitive() {
        let scope = RequestScope::new("/").with_header("Accept-Language", "fr");
        assert_eq!(scope.header("accept-language"), Some("fr"));
        assert_eq!(scope.header("ACCEPT-LANGUAGE"), Some("fr"));
        assert_eq!(scope.header("cookie"), None);
    }

    #[test]
    fn test_preferred_language() {
        assert_eq!(LangFromHeader::preferred("fr-CA,fr;q=0.9,en;q=0.8").as_deref(), Some("fr-CA"));
        assert_eq!(LangFromHeader::preferred("*, de;q=0.5").as_deref(), Some("de"));
        assert_eq!(LangFromHeader::preferred("*"), None);
    }

    #[tokio::test]
    async fn test_lang_contribution_only_touches_snapshot() {
        let config = json!({ "lang": "en" }).as_object().cloned().unwrap();
        let mut snapshot = ExposureSnapshot::from_config(&config);
        let scope = RequestScope::new("/").with_header("accept-language", "es-MX");

        LangFromHeader.contribute(&scope, &mut snapshot).await.unwrap();

        assert_eq!(snapshot.config()["lang"], "es-MX");
        assert_eq!(config["lang"], "en");
    }
}
