pub mod descriptor;
pub mod manifest;
pub mod source;
pub mod unit_parser;

pub use descriptor::{ModuleDescriptor, SchemaChangeUnit, Scope, TransactionMode};
pub use manifest::ModuleManifest;
pub use source::{DirectorySource, ModuleSource, StaticSource};
