pub mod directory;
pub mod resolver;
pub mod target;

pub use directory::{PgTenantDirectory, StaticTenantDirectory, TenantDirectory, TenantRecord};
pub use resolver::{TargetResolver, TenantSelector};
pub use target::{InstallationTarget, TargetKind};
