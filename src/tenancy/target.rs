use crate::constants::{LANDLORD_TARGET_KEY, TENANT_TARGET_PREFIX};
use crate::module::Scope;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetKind {
    Landlord,
    Tenant(String),
}

/// One isolated store that units are applied to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationTarget {
    pub kind: TargetKind,
    pub database_url: String,
}

impl InstallationTarget {
    pub fn landlord(database_url: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Landlord,
            database_url: database_url.into(),
        }
    }

    pub fn tenant(id: impl Into<String>, database_url: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Tenant(id.into()),
            database_url: database_url.into(),
        }
    }

    /// Stable key used by the ledger: `landlord` or `tenant:<id>`
    pub fn key(&self) -> String {
        match &self.kind {
            TargetKind::Landlord => LANDLORD_TARGET_KEY.to_string(),
            TargetKind::Tenant(id) => format!("{}{}", TENANT_TARGET_PREFIX, id),
        }
    }

    /// Which unit list of a module applies to this target
    pub fn scope(&self) -> Scope {
        match self.kind {
            TargetKind::Landlord => Scope::Landlord,
            TargetKind::Tenant(_) => Scope::Tenant,
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        match &self.kind {
            TargetKind::Landlord => None,
            TargetKind::Tenant(id) => Some(id),
        }
    }

    pub fn is_landlord(&self) -> bool {
        self.kind == TargetKind::Landlord
    }
}

impl fmt::Display for InstallationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
