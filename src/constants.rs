use std::time::Duration;

// Configuration file name
pub const CONFIG_FILENAME: &str = "tenantry.yaml";

// Module directory layout
pub const MODULE_MANIFEST_FILENAME: &str = "module.yaml";
pub const LANDLORD_UNITS_SUBDIR: &str = "landlord";
pub const TENANT_UNITS_SUBDIR: &str = "tenant";
pub const UNIT_FILE_EXTENSION: &str = "sql";

// Unit file directives
pub const DIRECTIVE_PREFIX: &str = "-- tenantry:";
pub const REVERT_MARKER: &str = "-- tenantry:revert";

// Target keys
pub const LANDLORD_TARGET_KEY: &str = "landlord";
pub const TENANT_TARGET_PREFIX: &str = "tenant:";
pub const TENANT_URL_PLACEHOLDER: &str = "{tenant}";

// Execution defaults
pub const DEFAULT_MAX_CONCURRENT_TARGETS: usize = 4;
pub const DEFAULT_UNIT_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_LOCK_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCK_RETRY_DELAY: Duration = Duration::from_millis(500);

// Process exit codes
pub const EXIT_TARGETS_FAILED: i32 = 1;
pub const EXIT_ABORTED: i32 = 2;
