use crate::config::types::*;

/// Trait for merging optional configuration values
pub trait Merge<T> {
    fn merge(self, other: T) -> T;
}

impl<T> Merge<Option<T>> for Option<T> {
    fn merge(self, other: Option<T>) -> Option<T> {
        other.or(self)
    }
}

impl Merge<ConfigInput> for ConfigInput {
    fn merge(self, other: ConfigInput) -> ConfigInput {
        ConfigInput {
            databases: match (self.databases, other.databases) {
                (None, None) => None,
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (Some(a), Some(b)) => Some(a.merge_with(b)),
            },
            directories: match (self.directories, other.directories) {
                (None, None) => None,
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (Some(a), Some(b)) => Some(a.merge_with(b)),
            },
            execution: match (self.execution, other.execution) {
                (None, None) => None,
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (Some(a), Some(b)) => Some(a.merge_with(b)),
            },
            tenants: self.tenants.merge(other.tenants),
            ledger: self.ledger.merge(other.ledger),
        }
    }
}

// Custom merge implementations for complex types
impl DatabasesInput {
    pub fn merge_with(self, other: DatabasesInput) -> DatabasesInput {
        DatabasesInput {
            landlord_url: other.landlord_url.or(self.landlord_url),
            tenant_url_template: other.tenant_url_template.or(self.tenant_url_template),
        }
    }
}

impl DirectoriesInput {
    pub fn merge_with(self, other: DirectoriesInput) -> DirectoriesInput {
        DirectoriesInput {
            modules_dir: other.modules_dir.or(self.modules_dir),
        }
    }
}

impl ExecutionInput {
    pub fn merge_with(self, other: ExecutionInput) -> ExecutionInput {
        ExecutionInput {
            max_concurrent_targets: other.max_concurrent_targets.or(self.max_concurrent_targets),
            unit_timeout: other.unit_timeout.or(self.unit_timeout),
            lock_retry_attempts: other.lock_retry_attempts.or(self.lock_retry_attempts),
            lock_retry_delay: other.lock_retry_delay.or(self.lock_retry_delay),
            lock_retry_backoff: other.lock_retry_backoff.or(self.lock_retry_backoff),
        }
    }
}
