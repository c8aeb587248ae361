use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of a module's `module.yaml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
    /// Defaults to the module directory name
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ModuleManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read module manifest {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse module manifest {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        // An empty file is a valid manifest with every field defaulted
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }
}
