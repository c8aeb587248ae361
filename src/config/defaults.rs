use crate::config::types::*;
use crate::constants::{
    DEFAULT_LOCK_RETRY_ATTEMPTS, DEFAULT_LOCK_RETRY_DELAY, DEFAULT_MAX_CONCURRENT_TARGETS,
    DEFAULT_UNIT_TIMEOUT,
};

// Config derives Default

impl Default for Databases {
    fn default() -> Self {
        Self {
            landlord: "postgres://localhost/landlord".to_string(),
            tenant_url_template: None,
        }
    }
}

impl Default for Directories {
    fn default() -> Self {
        Self {
            modules: "modules".to_string(),
        }
    }
}

impl Default for TenantTable {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            name: "tenants".to_string(),
            id_column: "id".to_string(),
            url_column: "database_url".to_string(),
        }
    }
}

impl Default for LedgerTable {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            name: "tenantry_installations".to_string(),
        }
    }
}

impl Default for Execution {
    fn default() -> Self {
        Self {
            max_concurrent_targets: DEFAULT_MAX_CONCURRENT_TARGETS,
            unit_timeout: DEFAULT_UNIT_TIMEOUT,
            lock_retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_LOCK_RETRY_ATTEMPTS,
            delay: DEFAULT_LOCK_RETRY_DELAY,
            backoff: BackoffStrategy::Exponential,
        }
    }
}
