use crate::helpers::sessions::RecordingSessions;
use std::sync::Arc;
use std::time::Duration;
use tenantry::config::{BackoffStrategy, RetryConfig};
use tenantry::ledger::MemoryLedger;
use tenantry::module::{ModuleDescriptor, StaticSource};
use tenantry::orchestrator::Orchestrator;
use tenantry::registry::ModuleRegistry;
use tenantry::runner::MigrationRunner;
use tenantry::tenancy::{StaticTenantDirectory, TargetResolver, TenantRecord, TenantSelector};

pub const LANDLORD_URL: &str = "postgres://db/landlord";
pub const TENANT_URL_TEMPLATE: &str = "postgres://db/{tenant}";

/// Orchestrator wired to an in-memory ledger and a recording session provider
pub struct TestEngine {
    pub ledger: Arc<MemoryLedger>,
    pub sessions: RecordingSessions,
    pub orchestrator: Orchestrator,
    pub runner: Arc<MigrationRunner>,
}

pub struct TestEngineBuilder {
    modules: Vec<ModuleDescriptor>,
    tenants: Vec<String>,
    ledger: Arc<MemoryLedger>,
    sessions: RecordingSessions,
    max_concurrent: usize,
    unit_timeout: Duration,
    lock_retry: RetryConfig,
}

impl TestEngine {
    pub fn builder(modules: Vec<ModuleDescriptor>) -> TestEngineBuilder {
        TestEngineBuilder {
            modules,
            tenants: Vec::new(),
            ledger: Arc::new(MemoryLedger::new()),
            sessions: RecordingSessions::new(),
            max_concurrent: 4,
            unit_timeout: Duration::from_secs(5),
            lock_retry: fast_retry(2),
        }
    }

    pub fn new(modules: Vec<ModuleDescriptor>, tenants: &[&str]) -> Self {
        Self::builder(modules).tenants(tenants).build()
    }
}

impl TestEngineBuilder {
    pub fn tenants(mut self, tenants: &[&str]) -> Self {
        self.tenants = tenants.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Share a ledger with an earlier engine, e.g. to simulate a later invocation
    pub fn ledger(mut self, ledger: Arc<MemoryLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn sessions(mut self, sessions: RecordingSessions) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn unit_timeout(mut self, unit_timeout: Duration) -> Self {
        self.unit_timeout = unit_timeout;
        self
    }

    pub fn build(self) -> TestEngine {
        let directory = StaticTenantDirectory::new(
            self.tenants
                .iter()
                .map(|id| TenantRecord {
                    id: id.clone(),
                    database_url: None,
                })
                .collect(),
        );

        let targets = TargetResolver::new(
            LANDLORD_URL,
            Some(TENANT_URL_TEMPLATE.to_string()),
            Arc::new(directory),
        );

        let runner = Arc::new(MigrationRunner::new(
            self.ledger.clone(),
            Arc::new(self.sessions.clone()),
            self.unit_timeout,
            self.lock_retry,
        ));

        let orchestrator = Orchestrator::new(
            ModuleRegistry::new(Arc::new(StaticSource::new(self.modules))),
            targets,
            self.ledger.clone(),
            runner.clone(),
            self.max_concurrent,
        );

        TestEngine {
            ledger: self.ledger,
            sessions: self.sessions,
            orchestrator,
            runner,
        }
    }
}

/// Constant short delay so contention tests finish quickly
pub fn fast_retry(attempts: u32) -> RetryConfig {
    RetryConfig {
        attempts,
        delay: Duration::from_millis(10),
        backoff: BackoffStrategy::None,
    }
}

pub fn one(tenant: &str) -> TenantSelector {
    TenantSelector::One(tenant.to_string())
}

pub fn many(tenants: &[&str]) -> TenantSelector {
    TenantSelector::Many(tenants.iter().map(|t| t.to_string()).collect())
}
