//! Ledger stored in a tracking table of the landlord database.

use crate::config::LedgerTable;
use crate::db::error_context::is_unique_violation;
use crate::db::identifier::{qualified_name, quoted};
use crate::error::{InstallError, InstallResult};
use crate::ledger::{EntryStatus, Ledger, LedgerEntry, LedgerLock};
use crate::module::Scope;
use crate::tenancy::InstallationTarget;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::sync::OnceCell;
use tracing::debug;

pub struct PgLedger {
    pool: PgPool,
    table: LedgerTable,
    initialized: OnceCell<()>,
}

impl PgLedger {
    pub fn new(pool: PgPool, table: LedgerTable) -> Self {
        Self {
            pool,
            table,
            initialized: OnceCell::new(),
        }
    }

    fn table_name(&self) -> Result<String> {
        qualified_name(&self.table.schema, &self.table.name)
    }

    /// Reads treat a missing table as an empty ledger so they never create it
    async fn table_exists(&self) -> Result<bool> {
        if self.initialized.initialized() {
            return Ok(true);
        }

        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(self.table_name()?)
            .fetch_one(&self.pool)
            .await
            .context("Failed to look up ledger table")?;
        Ok(exists)
    }

    /// Create the tracking table on first write
    async fn ensure_table(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| async {
                let table_name = self.table_name()?;

                sqlx::query(&format!(
                    "CREATE SCHEMA IF NOT EXISTS {}",
                    quoted(&self.table.schema)?
                ))
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to create schema {}", self.table.schema))?;

                sqlx::query(&format!(
                    r#"
                    CREATE TABLE IF NOT EXISTS {} (
                        module_name TEXT NOT NULL,
                        target_key TEXT NOT NULL,
                        unit_id TEXT NOT NULL,
                        scope TEXT NOT NULL,
                        checksum TEXT NOT NULL,
                        status TEXT NOT NULL DEFAULT 'applied',
                        applied_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
                        applied_by TEXT DEFAULT CURRENT_USER,
                        PRIMARY KEY (module_name, target_key, unit_id)
                    )
                    "#,
                    table_name
                ))
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to create ledger table {}", table_name))?;

                debug!("Ledger table {} ready", table_name);
                Ok::<(), anyhow::Error>(())
            })
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn applied_units(
        &self,
        module: &str,
        target: &InstallationTarget,
    ) -> InstallResult<Vec<LedgerEntry>> {
        if !self.table_exists().await? {
            return Ok(Vec::new());
        }
        let table_name = self.table_name()?;

        // Byte-order collation so ids sort the same way as on disk
        let rows = sqlx::query(&format!(
            r#"SELECT module_name, target_key, unit_id, scope, checksum, applied_at, status
               FROM {}
               WHERE module_name = $1 AND target_key = $2
               ORDER BY unit_id COLLATE "C""#,
            table_name
        ))
        .bind(module)
        .bind(target.key())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to read ledger for '{}' on {}", module, target))?;

        let entries = rows
            .iter()
            .map(|row| -> Result<LedgerEntry> {
                Ok(LedgerEntry {
                    module: row.try_get("module_name")?,
                    target_key: row.try_get("target_key")?,
                    unit_id: row.try_get("unit_id")?,
                    scope: row.try_get::<String, _>("scope")?.parse::<Scope>()?,
                    checksum: row.try_get("checksum")?,
                    applied_at: row.try_get::<DateTime<Utc>, _>("applied_at")?,
                    status: row.try_get::<String, _>("status")?.parse::<EntryStatus>()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(entries)
    }

    async fn record(&self, entry: &LedgerEntry) -> InstallResult<()> {
        self.ensure_table().await?;
        let table_name = self.table_name()?;

        let result = sqlx::query(&format!(
            "INSERT INTO {} (module_name, target_key, unit_id, scope, checksum, applied_at, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            table_name
        ))
        .bind(&entry.module)
        .bind(&entry.target_key)
        .bind(&entry.unit_id)
        .bind(entry.scope.as_str())
        .bind(&entry.checksum)
        .bind(entry.applied_at)
        .bind(entry.status.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(InstallError::DuplicateApplication {
                module: entry.module.clone(),
                target: entry.target_key.clone(),
                unit_id: entry.unit_id.clone(),
            }),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!(
                    "Failed to record unit '{}' of '{}' on {}",
                    entry.unit_id, entry.module, entry.target_key
                ))
                .into()),
        }
    }

    async fn try_lock(
        &self,
        module: &str,
        target: &InstallationTarget,
    ) -> InstallResult<Option<Box<dyn LedgerLock>>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open ledger lock transaction")?;

        // Transaction-scoped: the lock lives exactly as long as the open transaction
        let acquired: bool =
            sqlx::query_scalar("SELECT pg_try_advisory_xact_lock(hashtext($1), hashtext($2))")
                .bind(module)
                .bind(target.key())
                .fetch_one(&mut *tx)
                .await
                .with_context(|| format!("Failed to lock '{}' on {}", module, target))?;

        if !acquired {
            tx.rollback().await.context("Failed to roll back lock attempt")?;
            return Ok(None);
        }

        debug!("Acquired ledger lock for '{}' on {}", module, target);
        Ok(Some(Box::new(PgLedgerLock { tx: Some(tx) })))
    }
}

struct PgLedgerLock {
    tx: Option<Transaction<'static, Postgres>>,
}

#[async_trait]
impl LedgerLock for PgLedgerLock {
    async fn release(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.context("Failed to release ledger lock")?;
        }
        Ok(())
    }
}
