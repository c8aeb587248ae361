use crate::config::{merge::Merge, types::*};
use crate::db::identifier::validate_sql_identifier;
use crate::module::unit_parser::parse_duration;
use anyhow::{Context, Result, anyhow};

pub struct ConfigBuilder {
    config_input: ConfigInput,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config_input: ConfigInput::default(),
        }
    }

    pub fn with_file(mut self, file_input: ConfigInput) -> Self {
        self.config_input = self.config_input.merge(file_input);
        self
    }

    pub fn with_cli_args(mut self, cli_input: ConfigInput) -> Self {
        self.config_input = self.config_input.merge(cli_input);
        self
    }

    pub fn resolve(self) -> Result<Config> {
        let defaults = Config::default();

        Ok(Config {
            databases: self.resolve_databases(&defaults.databases),
            directories: self.resolve_directories(&defaults.directories),
            tenants: self.resolve_tenants(&defaults.tenants)?,
            ledger: self.resolve_ledger(&defaults.ledger)?,
            execution: self.resolve_execution(&defaults.execution)?,
        })
    }

    fn resolve_databases(&self, defaults: &Databases) -> Databases {
        let db_input = self.config_input.databases.as_ref();

        let landlord = db_input
            .and_then(|d| d.landlord_url.as_ref())
            .cloned()
            .or_else(|| std::env::var("LANDLORD_DATABASE_URL").ok())
            .unwrap_or_else(|| defaults.landlord.clone());

        let tenant_url_template = db_input
            .and_then(|d| d.tenant_url_template.as_ref())
            .cloned()
            .or_else(|| std::env::var("TENANT_DATABASE_URL_TEMPLATE").ok())
            .or_else(|| defaults.tenant_url_template.clone());

        Databases {
            landlord,
            tenant_url_template,
        }
    }

    fn resolve_directories(&self, defaults: &Directories) -> Directories {
        let dir_input = self.config_input.directories.as_ref();

        Directories {
            modules: dir_input
                .and_then(|d| d.modules_dir.as_ref())
                .cloned()
                .unwrap_or_else(|| defaults.modules.clone()),
        }
    }

    fn resolve_tenants(&self, defaults: &Tenants) -> Result<Tenants> {
        let tenants_input = self.config_input.tenants.as_ref();

        let list: Vec<TenantEntry> = tenants_input
            .and_then(|t| t.list.as_ref())
            .map(|entries| entries.iter().cloned().map(TenantEntry::from).collect())
            .unwrap_or_else(|| defaults.list.clone());

        for entry in &list {
            if entry.id.trim().is_empty() {
                return Err(anyhow!("Tenant entries in config must have a non-empty id"));
            }
        }

        let table = tenants_input
            .and_then(|t| t.table.as_ref())
            .map(|t| TenantTable {
                schema: t
                    .schema
                    .as_ref()
                    .cloned()
                    .unwrap_or_else(|| defaults.table.schema.clone()),
                name: t
                    .name
                    .as_ref()
                    .cloned()
                    .unwrap_or_else(|| defaults.table.name.clone()),
                id_column: t
                    .id_column
                    .as_ref()
                    .cloned()
                    .unwrap_or_else(|| defaults.table.id_column.clone()),
                url_column: t
                    .url_column
                    .as_ref()
                    .cloned()
                    .unwrap_or_else(|| defaults.table.url_column.clone()),
            })
            .unwrap_or_else(|| defaults.table.clone());

        validate_sql_identifier("tenant table schema", &table.schema)?;
        validate_sql_identifier("tenant table name", &table.name)?;
        validate_sql_identifier("tenant id column", &table.id_column)?;
        validate_sql_identifier("tenant url column", &table.url_column)?;

        Ok(Tenants {
            source: tenants_input
                .and_then(|t| t.source)
                .unwrap_or(defaults.source),
            list,
            table,
        })
    }

    fn resolve_ledger(&self, defaults: &LedgerTable) -> Result<LedgerTable> {
        let ledger_input = self.config_input.ledger.as_ref();

        let ledger = LedgerTable {
            schema: ledger_input
                .and_then(|l| l.schema.as_ref())
                .cloned()
                .unwrap_or_else(|| defaults.schema.clone()),
            name: ledger_input
                .and_then(|l| l.table.as_ref())
                .cloned()
                .unwrap_or_else(|| defaults.name.clone()),
        };

        validate_sql_identifier("ledger schema", &ledger.schema)?;
        validate_sql_identifier("ledger table", &ledger.name)?;

        Ok(ledger)
    }

    fn resolve_execution(&self, defaults: &Execution) -> Result<Execution> {
        let exec_input = self.config_input.execution.as_ref();

        let max_concurrent_targets = exec_input
            .and_then(|e| e.max_concurrent_targets)
            .unwrap_or(defaults.max_concurrent_targets);
        if max_concurrent_targets == 0 {
            return Err(anyhow!("execution.max_concurrent_targets must be at least 1"));
        }

        let unit_timeout = match exec_input.and_then(|e| e.unit_timeout.as_ref()) {
            Some(value) => parse_duration(value)
                .with_context(|| format!("Invalid execution.unit_timeout '{}'", value))?,
            None => defaults.unit_timeout,
        };

        let attempts = exec_input
            .and_then(|e| e.lock_retry_attempts)
            .unwrap_or(defaults.lock_retry.attempts);
        if attempts == 0 {
            return Err(anyhow!("execution.lock_retry_attempts must be at least 1"));
        }

        let delay = match exec_input.and_then(|e| e.lock_retry_delay.as_ref()) {
            Some(value) => parse_duration(value)
                .with_context(|| format!("Invalid execution.lock_retry_delay '{}'", value))?,
            None => defaults.lock_retry.delay,
        };

        Ok(Execution {
            max_concurrent_targets,
            unit_timeout,
            lock_retry: RetryConfig {
                attempts,
                delay,
                backoff: exec_input
                    .and_then(|e| e.lock_retry_backoff)
                    .unwrap_or(defaults.lock_retry.backoff),
            },
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
