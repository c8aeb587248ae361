pub mod install;
pub mod list;
pub mod plan;
pub mod status;

pub use install::cmd_install;
pub use list::cmd_list;
pub use plan::cmd_plan;
pub use status::cmd_status;

use crate::config::{Config, TenantSourceKind};
use crate::constants::EXIT_TARGETS_FAILED;
use crate::db::connection::{ConnectionConfig, connect_lazy};
use crate::ledger::PgLedger;
use crate::module::DirectorySource;
use crate::orchestrator::Orchestrator;
use crate::registry::ModuleRegistry;
use crate::runner::MigrationRunner;
use crate::session::PgSessionProvider;
use crate::tenancy::{PgTenantDirectory, StaticTenantDirectory, TargetResolver, TenantDirectory};
use anyhow::Result;
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;

/// How a command finished when it did not abort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    /// One or more targets failed, were blocked, or were cancelled
    TargetsFailed,
}

impl CommandOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::TargetsFailed => EXIT_TARGETS_FAILED,
        }
    }
}

/// Everything one invocation needs, wired from configuration
pub struct Engine {
    pub orchestrator: Orchestrator,
    sessions: Arc<PgSessionProvider>,
    landlord_pool: PgPool,
}

impl Engine {
    /// Builds the engine without connecting; the landlord database is only
    /// contacted by the first query that needs it.
    pub fn from_config(config: &Config, root_dir: &Path) -> Result<Self> {
        let concurrency = config.execution.max_concurrent_targets;

        // One connection per concurrent lock holder plus ledger writes
        let landlord_pool = connect_lazy(
            &config.databases.landlord,
            &ConnectionConfig {
                max_connections: (concurrency + 2) as u32,
                ..ConnectionConfig::default()
            },
        )?;

        let sessions = Arc::new(PgSessionProvider::new(
            landlord_pool.clone(),
            ConnectionConfig {
                max_connections: 2,
                ..ConnectionConfig::default()
            },
        ));

        let ledger = Arc::new(PgLedger::new(landlord_pool.clone(), config.ledger.clone()));

        let directory: Arc<dyn TenantDirectory> = match config.tenants.source {
            TenantSourceKind::Config => {
                Arc::new(StaticTenantDirectory::from_entries(&config.tenants.list))
            }
            TenantSourceKind::Table => Arc::new(PgTenantDirectory::new(
                landlord_pool.clone(),
                config.tenants.table.clone(),
            )),
        };

        let registry = ModuleRegistry::new(Arc::new(DirectorySource::new(
            root_dir.join(&config.directories.modules),
        )));

        let targets = TargetResolver::new(
            &config.databases.landlord,
            config.databases.tenant_url_template.clone(),
            directory,
        );

        let runner = Arc::new(MigrationRunner::new(
            ledger.clone(),
            sessions.clone(),
            config.execution.unit_timeout,
            config.execution.lock_retry.clone(),
        ));

        Ok(Self {
            orchestrator: Orchestrator::new(registry, targets, ledger, runner, concurrency),
            sessions,
            landlord_pool,
        })
    }

    /// Close tenant pools and the landlord pool
    pub async fn shutdown(self) {
        self.sessions.close().await;
        self.landlord_pool.close().await;
    }
}
