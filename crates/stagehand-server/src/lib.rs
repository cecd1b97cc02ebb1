//! # Stagehand Server
//!
//! Axum integration for the loader extension: a middleware that freezes the
//! configuration on first use and exposes a fresh snapshot to every request.

pub mod error;
pub mod middleware;

pub use error::{ExposeError, ExposeResult};
pub use middleware::{expose, with_exposure};
pub use stagehand_core::{TemplateLocals, STATE_KEY};
