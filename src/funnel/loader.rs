// SPDX-License-Identifier: MIT

//! Funnel loader - YAML file loading and parsing

use super::schema::FunnelDefinition;
use crate::error::Result;
use std::fs;
use std::path::Path;

/// Loads funnel definitions from YAML files
pub struct FunnelLoader;

impl FunnelLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load and validate a funnel definition from a YAML file
    pub fn load_definition<P: AsRef<Path>>(&self, path: P) -> Result<FunnelDefinition> {
        let path = path.as_ref();
        log::debug!("Loading funnel definition from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse and validate a funnel definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<FunnelDefinition> {
        let def: FunnelDefinition = serde_yaml::from_str(content)?;
        def.validate()?;
        Ok(def)
    }
}

impl Default for FunnelLoader {
    fn default() -> Self {
        Self::new()
    }
}
