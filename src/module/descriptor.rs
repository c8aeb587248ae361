use crate::constants::{LANDLORD_UNITS_SUBDIR, TENANT_UNITS_SUBDIR};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which store a schema-change unit is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The single shared landlord database
    Landlord,
    /// Every tenant's private database
    Tenant,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landlord => "landlord",
            Self::Tenant => "tenant",
        }
    }

    /// Subdirectory of a module directory holding units for this scope
    pub fn subdir(&self) -> &'static str {
        match self {
            Self::Landlord => LANDLORD_UNITS_SUBDIR,
            Self::Tenant => TENANT_UNITS_SUBDIR,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "landlord" => Ok(Self::Landlord),
            "tenant" => Ok(Self::Tenant),
            _ => Err(anyhow!("Unknown scope: {}", s)),
        }
    }
}

/// Transaction execution mode for a unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionMode {
    /// Wrap the unit in BEGIN/COMMIT, rollback on error
    #[default]
    Transactional,

    /// Execute without transaction wrapper (for CONCURRENTLY, etc.)
    NonTransactional,
}

/// One ordered step of schema evolution.
///
/// The apply and revert bodies are opaque to the engine; only a
/// [`TargetSession`](crate::session::TargetSession) interprets them.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaChangeUnit {
    /// Sortable identifier, e.g. `20240101120000_create_cards`
    pub id: String,
    pub scope: Scope,
    /// Informational only, e.g. the table a unit creates
    pub affected_entity: Option<String>,
    pub description: Option<String>,
    pub mode: TransactionMode,
    /// Overrides the configured per-unit timeout
    pub timeout: Option<Duration>,
    pub apply_sql: String,
    pub revert_sql: Option<String>,
}

impl SchemaChangeUnit {
    pub fn new(id: impl Into<String>, scope: Scope, apply_sql: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope,
            affected_entity: None,
            description: None,
            mode: TransactionMode::Transactional,
            timeout: None,
            apply_sql: apply_sql.into(),
            revert_sql: None,
        }
    }

    pub fn with_revert(mut self, revert_sql: impl Into<String>) -> Self {
        self.revert_sql = Some(revert_sql.into());
        self
    }

    pub fn affecting(mut self, entity: impl Into<String>) -> Self {
        self.affected_entity = Some(entity.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn has_revert(&self) -> bool {
        self.revert_sql
            .as_deref()
            .is_some_and(|sql| !sql.trim().is_empty())
    }

    /// Checksum of the apply body; an applied unit must never change
    pub fn checksum(&self) -> String {
        format!("{:x}", md5::compute(self.apply_sql.trim()))
    }
}

/// Everything the engine knows about one module
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDescriptor {
    /// Unique, stable slug
    pub name: String,
    pub display_name: String,
    pub version: String,
    /// Modules that must be installed first
    pub dependencies: BTreeSet<String>,
    pub landlord_units: Vec<SchemaChangeUnit>,
    pub tenant_units: Vec<SchemaChangeUnit>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            version: "0.0.0".to_string(),
            dependencies: BTreeSet::new(),
            landlord_units: Vec::new(),
            tenant_units: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn depends_on(mut self, module: impl Into<String>) -> Self {
        self.dependencies.insert(module.into());
        self
    }

    /// Append a unit to the list matching its scope
    pub fn with_unit(mut self, unit: SchemaChangeUnit) -> Self {
        match unit.scope {
            Scope::Landlord => self.landlord_units.push(unit),
            Scope::Tenant => self.tenant_units.push(unit),
        }
        self
    }

    pub fn units(&self, scope: Scope) -> &[SchemaChangeUnit] {
        match scope {
            Scope::Landlord => &self.landlord_units,
            Scope::Tenant => &self.tenant_units,
        }
    }

    pub fn has_units(&self, scope: Scope) -> bool {
        !self.units(scope).is_empty()
    }
}
