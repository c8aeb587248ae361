use clap::Args;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw configuration input - all fields Optional for merging
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigInput {
    pub databases: Option<DatabasesInput>,
    pub directories: Option<DirectoriesInput>,
    pub tenants: Option<TenantsInput>,
    pub ledger: Option<LedgerInput>,
    pub execution: Option<ExecutionInput>,
}

/// Resolved configuration with all defaults applied
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub databases: Databases,
    pub directories: Directories,
    pub tenants: Tenants,
    pub ledger: LedgerTable,
    pub execution: Execution,
}

// Database configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabasesInput {
    pub landlord_url: Option<String>,
    pub tenant_url_template: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Databases {
    pub landlord: String,
    /// URL used for tenants that don't carry their own, `{tenant}` is replaced by the id
    pub tenant_url_template: Option<String>,
}

// Directory configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DirectoriesInput {
    pub modules_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Directories {
    pub modules: String,
}

// Tenant directory configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TenantsInput {
    pub source: Option<TenantSourceKind>,
    pub list: Option<Vec<TenantEntryInput>>,
    pub table: Option<TenantTableInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TenantEntryInput {
    pub id: String,
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TenantTableInput {
    pub schema: Option<String>,
    pub name: Option<String>,
    pub id_column: Option<String>,
    pub url_column: Option<String>,
}

/// Where the set of known tenants comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantSourceKind {
    /// Tenants listed under `tenants.list`
    #[default]
    Config,
    /// Tenants read from a table in the landlord database
    Table,
}

#[derive(Debug, Clone, Default)]
pub struct Tenants {
    pub source: TenantSourceKind,
    pub list: Vec<TenantEntry>,
    pub table: TenantTable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantEntry {
    pub id: String,
    pub database_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TenantTable {
    pub schema: String,
    pub name: String,
    pub id_column: String,
    pub url_column: String,
}

// Ledger configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LedgerInput {
    pub schema: Option<String>,
    pub table: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LedgerTable {
    pub schema: String,
    pub name: String,
}

// Execution configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExecutionInput {
    pub max_concurrent_targets: Option<usize>,
    pub unit_timeout: Option<String>,
    pub lock_retry_attempts: Option<u32>,
    pub lock_retry_delay: Option<String>,
    pub lock_retry_backoff: Option<BackoffStrategy>,
}

#[derive(Debug, Clone)]
pub struct Execution {
    pub max_concurrent_targets: usize,
    pub unit_timeout: Duration,
    pub lock_retry: RetryConfig,
}

/// Retry policy used while waiting for an installation lock
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Number of attempts (1 = no retry, try once)
    pub attempts: u32,

    /// Base delay between attempts
    pub delay: Duration,

    pub backoff: BackoffStrategy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Use constant delay between retries
    None,

    /// Exponential backoff: delay * 2^(attempt - 1)
    #[default]
    Exponential,
}

// CLI argument groups shared by every command
#[derive(Debug, Clone, Default, Args)]
pub struct DatabaseArgs {
    #[arg(long, global = true, help = "Landlord database URL")]
    pub landlord_url: Option<String>,

    #[arg(
        long,
        global = true,
        help = "Tenant database URL template, {tenant} is replaced by the tenant id"
    )]
    pub tenant_url_template: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct DirectoryArgs {
    #[arg(long, global = true, help = "Modules directory path")]
    pub modules_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ExecutionArgs {
    #[arg(long, global = true, help = "Maximum number of targets migrated at once")]
    pub max_concurrent_targets: Option<usize>,

    #[arg(long, global = true, help = "Per-unit timeout (e.g. 30s, 5m)")]
    pub unit_timeout: Option<String>,
}

// Conversion functions from CLI args to config input
impl From<DatabaseArgs> for DatabasesInput {
    fn from(args: DatabaseArgs) -> Self {
        Self {
            landlord_url: args.landlord_url,
            tenant_url_template: args.tenant_url_template,
        }
    }
}

impl From<DirectoryArgs> for DirectoriesInput {
    fn from(args: DirectoryArgs) -> Self {
        Self {
            modules_dir: args.modules_dir,
        }
    }
}

impl From<ExecutionArgs> for ExecutionInput {
    fn from(args: ExecutionArgs) -> Self {
        Self {
            max_concurrent_targets: args.max_concurrent_targets,
            unit_timeout: args.unit_timeout,
            lock_retry_attempts: None,
            lock_retry_delay: None,
            lock_retry_backoff: None,
        }
    }
}

impl From<TenantEntryInput> for TenantEntry {
    fn from(input: TenantEntryInput) -> Self {
        Self {
            id: input.id,
            database_url: input.database_url,
        }
    }
}
