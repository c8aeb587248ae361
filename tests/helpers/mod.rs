pub mod cli;
pub mod engine;
pub mod harness;
pub mod modules;
