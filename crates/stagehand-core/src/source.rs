//! Configuration sources read from files.

use crate::document::into_document;
use crate::{Result, StagehandError};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Load a configuration mapping from a `.json`, `.yaml` or `.yml` file.
pub async fn load_file(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    debug!("Loading configuration source {:?}", path);
    let content = tokio::fs::read_to_string(path).await?;
    let value: Value = match extension.as_str() {
        "json" => serde_json::from_str(&content)?,
        "yaml" | "yml" => serde_yaml_ng::from_str(&content)?,
        other => {
            return Err(StagehandError::InvalidSource(format!(
                "unsupported file type '{}' for {}",
                other,
                path.display()
            )))
        }
    };

    // Reject non-mappings here so the error names the file.
    into_document(value).map(Value::Object).map_err(|e| {
        StagehandError::InvalidSource(format!("{}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_yaml_and_json() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("loader.yaml");
        let json_path = dir.path().join("loader.json");
        std::fs::write(&yaml, "combine: false\ngroups:\n  app:\n    base: /app/\n").unwrap();
        std::fs::write(&json_path, r#"{ "filter": "raw" }"#).unwrap();

        assert_eq!(
            load_file(&yaml).await.unwrap(),
            json!({ "combine": false, "groups": { "app": { "base": "/app/" } } })
        );
        assert_eq!(load_file(&json_path).await.unwrap(), json!({ "filter": "raw" }));
    }

    #[tokio::test]
    async fn test_rejects_non_mapping_and_unknown_types() {
        let dir = TempDir::new().unwrap();
        let list = dir.path().join("list.json");
        let toml = dir.path().join("loader.toml");
        std::fs::write(&list, "[1, 2]").unwrap();
        std::fs::write(&toml, "combine = true").unwrap();

        assert!(matches!(
            load_file(&list).await,
            Err(StagehandError::InvalidSource(msg)) if msg.contains("list.json")
        ));
        assert!(matches!(load_file(&toml).await, Err(StagehandError::InvalidSource(_))));
        assert!(matches!(
            load_file(dir.path().join("missing.json")).await,
            Err(StagehandError::IoError(_))
        ));
    }
}
