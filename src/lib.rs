pub mod commands;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod ledger;
pub mod module;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod runner;
pub mod session;
pub mod tenancy;

pub use error::{InstallError, InstallResult};
