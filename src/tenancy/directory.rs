//! Where the set of tenants comes from.

use crate::config::{TenantEntry, TenantTable};
use crate::db::identifier::{qualified_name, quoted};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRecord {
    pub id: String,
    /// Explicit connection URL; falls back to the configured template when absent
    pub database_url: Option<String>,
}

impl From<&TenantEntry> for TenantRecord {
    fn from(entry: &TenantEntry) -> Self {
        Self {
            id: entry.id.clone(),
            database_url: entry.database_url.clone(),
        }
    }
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn tenants(&self) -> Result<Vec<TenantRecord>>;
}

/// Tenants listed up front, typically from `tenantry.yaml`
#[derive(Debug, Clone, Default)]
pub struct StaticTenantDirectory {
    tenants: Vec<TenantRecord>,
}

impl StaticTenantDirectory {
    pub fn new(tenants: Vec<TenantRecord>) -> Self {
        Self { tenants }
    }

    pub fn from_entries(entries: &[TenantEntry]) -> Self {
        Self::new(entries.iter().map(TenantRecord::from).collect())
    }
}

#[async_trait]
impl TenantDirectory for StaticTenantDirectory {
    async fn tenants(&self) -> Result<Vec<TenantRecord>> {
        Ok(self.tenants.clone())
    }
}

/// Reads tenants from a table in the landlord database
pub struct PgTenantDirectory {
    pool: PgPool,
    table: TenantTable,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool, table: TenantTable) -> Self {
        Self { pool, table }
    }

    fn query(&self) -> Result<String> {
        Ok(format!(
            "SELECT {id}::text AS id, {url}::text AS database_url FROM {table} ORDER BY 1",
            id = quoted(&self.table.id_column)?,
            url = quoted(&self.table.url_column)?,
            table = qualified_name(&self.table.schema, &self.table.name)?,
        ))
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn tenants(&self) -> Result<Vec<TenantRecord>> {
        let query = self.query()?;
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .with_context(|| {
                format!(
                    "Failed to read tenants from {}.{}",
                    self.table.schema, self.table.name
                )
            })?;

        rows.iter()
            .map(|row| {
                Ok(TenantRecord {
                    id: row.try_get("id")?,
                    database_url: row.try_get("database_url")?,
                })
            })
            .collect()
    }
}
