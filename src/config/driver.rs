//! Driver configuration payloads.

use super::read_json;
use crate::error::ConfigResult;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

/// Per-driver settings, keyed by driver name. Each section is interpreted by
/// its driver's `Configurer`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Config {
    sections: Map<String, Value>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, driver: impl Into<String>, section: Value) -> Self {
        self.sections.insert(driver.into(), section);
        self
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        read_json(path)
    }

    /// The section for `driver`, if present.
    pub fn for_driver(&self, driver: &str) -> Option<&Value> {
        self.sections.get(driver)
    }

    pub fn drivers(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}
