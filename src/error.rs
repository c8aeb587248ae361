//! Error taxonomy for module installation.
//!
//! Discovery and resolution errors are fatal and raised before any target is
//! touched. Application-time errors are captured per target in a
//! [`RunResult`](crate::runner::RunResult) and never abort other targets.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Invalid module definition: {0}")]
    Discovery(String),

    #[error("Module '{0}' not found")]
    ModuleNotFound(String),

    #[error("Unknown tenant '{0}'")]
    UnknownTenant(String),

    #[error("Cyclic module dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("Unit '{unit_id}' of module '{module}' failed on {target}: {message}")]
    UnitApplication {
        module: String,
        target: String,
        unit_id: String,
        message: String,
    },

    #[error("Unit '{unit_id}' of module '{module}' timed out on {target} after {timeout:?}")]
    UnitTimeout {
        module: String,
        target: String,
        unit_id: String,
        timeout: Duration,
    },

    #[error(
        "Unit '{unit_id}' of module '{module}' is already recorded as applied on {target}; this is a bug"
    )]
    DuplicateApplication {
        module: String,
        target: String,
        unit_id: String,
    },

    #[error("Another installation holds the lock for module '{module}' on {target}")]
    LockContention { module: String, target: String },

    #[error(
        "Unit '{unit_id}' of module '{module}' was modified after being applied on {target} \
         (recorded checksum {recorded}, current {current})"
    )]
    ChecksumMismatch {
        module: String,
        target: String,
        unit_id: String,
        recorded: String,
        current: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InstallError {
    /// Fatal errors abort an operation before any target is modified
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Discovery(_)
                | Self::ModuleNotFound(_)
                | Self::UnknownTenant(_)
                | Self::CyclicDependency(_)
                | Self::Other(_)
        )
    }
}

pub type InstallResult<T> = std::result::Result<T, InstallError>;
