use crate::commands::{CommandOutcome, Engine};
use crate::config::Config;
use crate::report::{self, OutputFormat};
use crate::tenancy::TenantSelector;
use anyhow::Result;
use std::path::Path;

pub async fn cmd_plan(
    config: &Config,
    root_dir: &Path,
    module: &str,
    selector: Option<TenantSelector>,
    format: OutputFormat,
) -> Result<CommandOutcome> {
    let engine = Engine::from_config(config, root_dir)?;

    let plan = engine.orchestrator.plan(module, selector.as_ref()).await?;
    report::emit(format, || report::render_plan(&plan), &plan)?;

    engine.shutdown().await;
    Ok(CommandOutcome::Success)
}
