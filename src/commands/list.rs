use crate::commands::{CommandOutcome, Engine};
use crate::config::Config;
use crate::report::{self, OutputFormat};
use anyhow::Result;
use std::path::Path;

/// List discoverable modules; never touches a database
pub async fn cmd_list(config: &Config, root_dir: &Path, format: OutputFormat) -> Result<CommandOutcome> {
    let engine = Engine::from_config(config, root_dir)?;

    let modules = engine.orchestrator.list()?;
    report::emit(format, || report::render_module_list(&modules), &modules)?;

    engine.shutdown().await;
    Ok(CommandOutcome::Success)
}
