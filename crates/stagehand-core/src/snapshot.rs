//! Per-request exposure snapshots and template locals.
//!
//! A snapshot is built fresh for every request from the frozen configuration
//! document. Contributors add request-scoped data to it before it is placed
//! into the request's [`TemplateLocals`] under [`STATE_KEY`].

use crate::document::{deep_merge, Document};
use crate::{Result, StagehandError};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Template-local key under which the snapshot is placed.
pub const STATE_KEY: &str = "state";

/// Default global the bootstrap script assigns the snapshot to.
///
/// Kept apart from the loader's own `YUI_config` global, which every loader
/// instance picks up automatically; pages pass `<ns>.config` explicitly.
pub const DEFAULT_NAMESPACE: &str = "window.stagehand";

/// Dotted identifier path, e.g. `window.app.state`.
const NAMESPACE_PATTERN: &str = r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*$";

static NAMESPACE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_namespace_regex() -> &'static Regex {
    NAMESPACE_REGEX.get_or_init(|| Regex::new(NAMESPACE_PATTERN).expect("Invalid namespace regex"))
}

/// Serializable per-request state handed to templates.
///
/// Serializes as `{ "config": {...}, <extra keys>... }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureSnapshot {
    config: Document,

    #[serde(flatten)]
    extras: Document,
}

impl ExposureSnapshot {
    /// Start a snapshot from a copy of the configuration document.
    pub fn from_config(config: &Document) -> Self {
        Self {
            config: config.clone(),
            extras: Document::new(),
        }
    }

    /// Loader configuration as exposed to the client.
    pub fn config(&self) -> &Document {
        &self.config
    }

    /// Deep-merge request-scoped loader options into this snapshot only.
    pub fn merge_config(&mut self, partial: Document) {
        deep_merge(&mut self.config, partial);
    }

    /// Set a top-level key next to `config`. `config` itself is reserved.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        if key == "config" {
            return Err(StagehandError::InvalidSource(
                "'config' is reserved, use merge_config".to_string(),
            ));
        }
        self.extras.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        if key == "config" {
            return None;
        }
        self.extras.get(key)
    }

    pub fn to_value(&self) -> Value {
        let mut state = self.extras.clone();
        state.insert("config".to_string(), Value::Object(self.config.clone()));
        Value::Object(state)
    }

    /// Serialize to JSON that is safe to embed inside a `<script>` element.
    ///
    /// `<`, `>`, `&`, U+2028 and U+2029 are written as `\uXXXX` escapes, which
    /// only ever occur inside JSON strings, so the payload is still valid JSON
    /// and JavaScript.
    pub fn to_json_for_script(&self) -> Result<String> {
        let raw = serde_json::to_string(&canonical(&self.to_value()))?;
        Ok(escape_for_script(&raw))
    }

    /// Render `<namespace> = <snapshot>;` for inline bootstrap scripts.
    ///
    /// # Example
    ///
    /// ```
    /// use stagehand_core::ExposureSnapshot;
    /// use serde_json::json;
    ///
    /// let config = json!({ "combine": true }).as_object().unwrap().clone();
    /// let snapshot = ExposureSnapshot::from_config(&config);
    /// assert_eq!(
    ///     snapshot.to_inline_script("window.app").unwrap(),
    ///     r#"window.app = {"config":{"combine":true}};"#
    /// );
    /// ```
    pub fn to_inline_script(&self, namespace: &str) -> Result<String> {
        if !get_namespace_regex().is_match(namespace) {
            return Err(StagehandError::InvalidNamespace(namespace.to_string()));
        }
        Ok(format!("{} = {};", namespace, self.to_json_for_script()?))
    }
}

/// Rebuild `value` with every mapping's keys in sorted order, whichever map
/// backing `serde_json` was compiled with.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonical(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

fn escape_for_script(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            other => out.push(other),
        }
    }
    out
}

/// Data a request's templates render from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TemplateLocals(Document);

impl TemplateLocals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Place `snapshot` under [`STATE_KEY`], replacing any earlier one.
    pub fn insert_snapshot(&mut self, snapshot: &ExposureSnapshot) {
        self.0.insert(STATE_KEY.to_string(), snapshot.to_value());
    }

    /// The exposed state, if the exposure middleware ran.
    pub fn state(&self) -> Option<&Value> {
        self.0.get(STATE_KEY)
    }

    /// Bootstrap script for the exposed state, if any.
    pub fn bootstrap_script(&self, namespace: &str) -> Result<Option<String>> {
        if !get_namespace_regex().is_match(namespace) {
            return Err(StagehandError::InvalidNamespace(namespace.to_string()));
        }
        match self.state() {
            Some(state) => {
                let raw = serde_json::to_string(&canonical(state))?;
                Ok(Some(format!("{} = {};", namespace, escape_for_script(&raw))))
            }
            None => Ok(None),
        }
    }

    pub fn into_inner(self) -> Document {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::into_document;
    use serde_json::json;

    fn snapshot(config: Value) -> ExposureSnapshot {
        ExposureSnapshot::from_config(&into_document(config).unwrap())
    }

    #[test]
    fn test_script_payload_is_escaped() {
        let snap = snapshot(json!({ "note": "</script><!-- & \u{2028}" }));
        let script = snap.to_inline_script(DEFAULT_NAMESPACE).unwrap();

        assert!(!script.contains("</script>"));
        assert!(!script.contains("<!--"));
        assert!(script.contains(r"\u003c/script\u003e"));
        assert!(script.contains(r"\u0026"));
        assert!(script.contains(r"\u2028"));

        let json = script
            .trim_start_matches("window.stagehand = ")
            .trim_end_matches(';');
        let parsed: Value = serde_json::from_str(json).unwrap();
        assert_eq!(parsed["config"]["note"], "</script><!-- & \u{2028}");
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let mut a = snapshot(json!({ "filter": "min", "combine": true, "base": "/b/" }));
        let mut b = snapshot(json!({ "base": "/b/", "combine": true, "filter": "min" }));
        a.insert("seed", json!(["x"])).unwrap();
        b.insert("seed", json!(["x"])).unwrap();

        let script = a.to_inline_script("app").unwrap();
        assert_eq!(script, b.to_inline_script("app").unwrap());
        assert_eq!(
            script,
            r#"app = {"config":{"base":"/b/","combine":true,"filter":"min"},"seed":["x"]};"#
        );
    }

    #[test]
    fn test_namespace_must_be_identifier_path() {
        let snap = snapshot(json!({}));
        assert!(snap.to_inline_script("window.app.state").is_ok());
        assert!(matches!(
            snap.to_inline_script("alert(1);x"),
            Err(StagehandError::InvalidNamespace(_))
        ));
    }

    #[test]
    fn test_config_key_is_reserved() {
        let mut snap = snapshot(json!({ "combine": true }));
        assert!(snap.insert("config", json!({})).is_err());
        snap.merge_config(into_document(json!({ "lang": "fr" })).unwrap());
        assert_eq!(snap.config()["lang"], "fr");
        assert_eq!(snap.config()["combine"], true);
    }

    #[test]
    fn test_locals_carry_state() {
        let mut snap = snapshot(json!({ "combine": false }));
        snap.insert("seed", json!(["/a.js"])).unwrap();

        let mut locals = TemplateLocals::new();
        assert_eq!(locals.bootstrap_script("app").unwrap(), None);
        locals.insert("title", json!("Home"));
        locals.insert_snapshot(&snap);

        assert_eq!(locals.state(), Some(&snap.to_value()));
        assert_eq!(
            locals.bootstrap_script("app").unwrap().as_deref(),
            Some(r#"app = {"config":{"combine":false},"seed":["/a.js"]};"#)
        );
        assert_eq!(locals.get("title"), Some(&json!("Home")));
    }
}
