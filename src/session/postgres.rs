use crate::db::connection::{ConnectionConfig, connect_with_retry};
use crate::db::error_context::SqlErrorContext;
use crate::module::{SchemaChangeUnit, TransactionMode};
use crate::session::{SessionProvider, StatementTimeout, TargetSession};
use crate::tenancy::{InstallationTarget, TargetKind};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, Executor, PgPool, Postgres};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Format a SQL execution error with PostgreSQL context (DETAIL, HINT, line)
fn format_unit_error(error: sqlx::Error, sql: &str, label: &str, timeout: Duration) -> anyhow::Error {
    let ctx = SqlErrorContext::from_sqlx_error(&error, sql);
    let message = ctx.format(label, sql);

    if ctx.is_statement_timeout() {
        anyhow::Error::new(StatementTimeout(timeout)).context(message)
    } else {
        anyhow!("{}", message)
    }
}

/// Hands out connections to the landlord and tenant databases.
///
/// The landlord pool is shared with the ledger; tenant pools are opened on
/// first use and kept for the rest of the invocation.
pub struct PgSessionProvider {
    landlord: PgPool,
    tenant_pools: Mutex<HashMap<String, PgPool>>,
    connection: ConnectionConfig,
}

impl PgSessionProvider {
    pub fn new(landlord: PgPool, connection: ConnectionConfig) -> Self {
        Self {
            landlord,
            tenant_pools: Mutex::new(HashMap::new()),
            connection,
        }
    }

    async fn tenant_pool(&self, id: &str, url: &str) -> Result<PgPool> {
        if let Some(pool) = self.tenant_pools.lock().await.get(id) {
            return Ok(pool.clone());
        }

        // Connect without holding the map lock so tenants connect in parallel
        let pool = connect_with_retry(url, &format!("tenant '{}'", id), &self.connection).await?;

        let mut pools = self.tenant_pools.lock().await;
        Ok(pools.entry(id.to_string()).or_insert(pool).clone())
    }

    /// Close every tenant pool opened during this invocation
    pub async fn close(&self) {
        let pools: Vec<PgPool> = self.tenant_pools.lock().await.drain().map(|(_, p)| p).collect();
        for pool in pools {
            pool.close().await;
        }
    }
}

#[async_trait]
impl SessionProvider for PgSessionProvider {
    async fn open(&self, target: &InstallationTarget) -> Result<Box<dyn TargetSession>> {
        let pool = match &target.kind {
            TargetKind::Landlord => self.landlord.clone(),
            TargetKind::Tenant(id) => self.tenant_pool(id, &target.database_url).await?,
        };

        let conn = pool
            .acquire()
            .await
            .with_context(|| format!("Failed to acquire a connection to {}", target))?;

        Ok(Box::new(PgTargetSession {
            conn,
            target_key: target.key(),
        }))
    }
}

struct PgTargetSession {
    conn: PoolConnection<Postgres>,
    target_key: String,
}

impl PgTargetSession {
    async fn run_sql(
        &mut self,
        sql: &str,
        label: &str,
        mode: TransactionMode,
        timeout: Duration,
    ) -> Result<()> {
        let timeout_ms = timeout.as_millis();

        match mode {
            TransactionMode::Transactional => {
                let mut tx = self.conn.begin().await?;

                sqlx::query(&format!("SET LOCAL statement_timeout = '{}'", timeout_ms))
                    .execute(&mut *tx)
                    .await?;

                // Raw execute supports multiple statements per unit
                if let Err(e) = tx.execute(sql).await {
                    tx.rollback().await?;
                    return Err(format_unit_error(e, sql, label, timeout));
                }

                tx.commit().await?;
            }
            TransactionMode::NonTransactional => {
                sqlx::query(&format!("SET statement_timeout = '{}'", timeout_ms))
                    .execute(&mut *self.conn)
                    .await?;

                let result = self.conn.execute(sql).await;

                // Connection goes back to the pool; leave no session state behind
                if let Err(e) = sqlx::query("RESET statement_timeout")
                    .execute(&mut *self.conn)
                    .await
                {
                    warn!("Failed to reset statement_timeout on {}: {}", self.target_key, e);
                }

                result.map_err(|e| format_unit_error(e, sql, label, timeout))?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TargetSession for PgTargetSession {
    async fn apply(&mut self, unit: &SchemaChangeUnit, timeout: Duration) -> Result<()> {
        debug!("Applying unit '{}' on {}", unit.id, self.target_key);
        let label = format!("unit '{}'", unit.id);
        self.run_sql(&unit.apply_sql, &label, unit.mode, timeout).await
    }

    async fn revert(&mut self, unit: &SchemaChangeUnit, timeout: Duration) -> Result<()> {
        let Some(revert_sql) = unit.revert_sql.as_deref() else {
            return Ok(());
        };

        debug!("Reverting unit '{}' on {}", unit.id, self.target_key);
        let label = format!("revert of unit '{}'", unit.id);
        self.run_sql(revert_sql, &label, unit.mode, timeout).await
    }
}
