//! Named bundles of loader options.

use crate::document::{into_document, Document};
use crate::{Result, StagehandError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// A preset pre-populates a group of related options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Uncombined debug builds with verbose client logging.
    Debug,
    /// Combined minified builds, errors only.
    Production,
}

impl Preset {
    pub fn name(&self) -> &'static str {
        match self {
            Preset::Debug => "debug",
            Preset::Production => "production",
        }
    }

    /// The options this preset forces.
    pub fn document(&self) -> Document {
        let value = match self {
            Preset::Debug => json!({
                "combine": false,
                "debug": true,
                "filter": "debug",
                "logLevel": "debug",
            }),
            Preset::Production => json!({
                "combine": true,
                "debug": false,
                "filter": "min",
                "logLevel": "error",
            }),
        };
        into_document(value).unwrap_or_default()
    }
}

impl FromStr for Preset {
    type Err = StagehandError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "debug" => Ok(Preset::Debug),
            "production" => Ok(Preset::Production),
            other => Err(StagehandError::UnknownPreset(other.to_string())),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
