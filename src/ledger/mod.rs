//! Durable record of which units have been applied to which targets.
//!
//! Entries are append-only: a unit is recorded once after it applies
//! successfully and never updated afterwards.

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

use crate::error::InstallResult;
use crate::module::{ModuleDescriptor, SchemaChangeUnit, Scope};
use crate::tenancy::InstallationTarget;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Applied,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
        }
    }
}

impl FromStr for EntryStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "applied" => Ok(Self::Applied),
            _ => Err(anyhow::anyhow!("Unknown ledger entry status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub module: String,
    pub target_key: String,
    pub unit_id: String,
    pub scope: Scope,
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
    pub status: EntryStatus,
}

impl LedgerEntry {
    /// Entry for a unit that has just been applied to `target`
    pub fn applied(module: &str, target: &InstallationTarget, unit: &SchemaChangeUnit) -> Self {
        Self {
            module: module.to_string(),
            target_key: target.key(),
            unit_id: unit.id.clone(),
            scope: unit.scope,
            checksum: unit.checksum(),
            applied_at: Utc::now(),
            status: EntryStatus::Applied,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallStatus {
    NotInstalled,
    PartiallyInstalled,
    FullyInstalled,
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotInstalled => "notInstalled",
            Self::PartiallyInstalled => "partiallyInstalled",
            Self::FullyInstalled => "fullyInstalled",
        })
    }
}

/// Compare applied entries with the units a module declares for one scope.
///
/// A module that declares nothing for a scope is trivially fully installed.
pub fn install_status(declared: &[SchemaChangeUnit], applied: &[LedgerEntry]) -> InstallStatus {
    let applied_ids: HashSet<&str> = applied.iter().map(|e| e.unit_id.as_str()).collect();
    let applied_count = declared
        .iter()
        .filter(|unit| applied_ids.contains(unit.id.as_str()))
        .count();

    if applied_count == declared.len() {
        InstallStatus::FullyInstalled
    } else if applied_count == 0 {
        InstallStatus::NotInstalled
    } else {
        InstallStatus::PartiallyInstalled
    }
}

/// Exclusive hold on one `(module, target)` pair
#[async_trait]
pub trait LedgerLock: Send {
    /// Release the lock; dropping the guard also releases it
    async fn release(&mut self) -> Result<()>;
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Entries for `(module, target)` ordered by unit id
    async fn applied_units(
        &self,
        module: &str,
        target: &InstallationTarget,
    ) -> InstallResult<Vec<LedgerEntry>>;

    /// Append an entry; recording the same unit twice is a
    /// [`DuplicateApplication`](crate::error::InstallError::DuplicateApplication)
    async fn record(&self, entry: &LedgerEntry) -> InstallResult<()>;

    /// `None` when another run currently holds the lock
    async fn try_lock(
        &self,
        module: &str,
        target: &InstallationTarget,
    ) -> InstallResult<Option<Box<dyn LedgerLock>>>;

    async fn status(
        &self,
        module: &ModuleDescriptor,
        target: &InstallationTarget,
    ) -> InstallResult<InstallStatus> {
        let applied = self.applied_units(&module.name, target).await?;
        Ok(install_status(module.units(target.scope()), &applied))
    }
}
