use crate::commands::{CommandOutcome, Engine};
use crate::config::Config;
use crate::report::{self, OutputFormat};
use crate::runner::CancelSignal;
use crate::tenancy::TenantSelector;
use anyhow::Result;
use console::style;
use std::path::Path;
use tracing::info;

pub struct InstallOptions<'a> {
    pub module: &'a str,
    pub selector: Option<TenantSelector>,
    pub dry_run: bool,
    pub format: OutputFormat,
}

pub async fn cmd_install(
    config: &Config,
    root_dir: &Path,
    options: InstallOptions<'_>,
    cancel: &CancelSignal,
) -> Result<CommandOutcome> {
    let engine = Engine::from_config(config, root_dir)?;

    let outcome = if options.dry_run {
        let plan = engine
            .orchestrator
            .plan(options.module, options.selector.as_ref())
            .await?;
        report::emit(options.format, || report::render_plan(&plan), &plan)?;
        if options.format == OutputFormat::Human {
            println!("{} Dry run: nothing was applied", style("⚠").yellow());
        }
        CommandOutcome::Success
    } else {
        info!("Installing module '{}'", options.module);
        let result = engine
            .orchestrator
            .install(options.module, options.selector.as_ref(), cancel)
            .await?;

        report::emit(
            options.format,
            || report::render_report(&result),
            &report::report_to_json(&result),
        )?;

        if result.succeeded() {
            CommandOutcome::Success
        } else {
            CommandOutcome::TargetsFailed
        }
    };

    engine.shutdown().await;
    Ok(outcome)
}
