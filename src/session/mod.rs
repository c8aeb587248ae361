//! Execution of unit bodies against a concrete target store.
//!
//! The engine never interprets unit bodies; a [`TargetSession`] is the only
//! place they are executed.

pub mod postgres;

pub use postgres::PgSessionProvider;

use crate::module::SchemaChangeUnit;
use crate::tenancy::InstallationTarget;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Raised by a session when the store cancelled a statement for exceeding its timeout
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("statement timeout of {0:?} exceeded")]
pub struct StatementTimeout(pub Duration);

#[async_trait]
pub trait TargetSession: Send {
    /// Apply the unit's body; transactional units commit atomically or not at all
    async fn apply(&mut self, unit: &SchemaChangeUnit, timeout: Duration) -> Result<()>;

    /// Run the unit's revert body; callers only invoke this when one exists
    async fn revert(&mut self, unit: &SchemaChangeUnit, timeout: Duration) -> Result<()>;
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(&self, target: &InstallationTarget) -> Result<Box<dyn TargetSession>>;
}
