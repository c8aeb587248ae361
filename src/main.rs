use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use console::style;
use dotenv::dotenv;
use tenantry::commands::{self, CommandOutcome, install::InstallOptions};
use tenantry::config;
use tenantry::constants::{CONFIG_FILENAME, EXIT_ABORTED};
use tenantry::report::OutputFormat;
use tenantry::runner::CancelSignal;
use tenantry::tenancy::TenantSelector;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = CONFIG_FILENAME, global = true)]
    config_file: String,

    /// Enable verbose output (info level)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress all non-essential output (error level only)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Enable debug output (debug level)
    #[arg(long, global = true)]
    debug: bool,

    #[command(flatten)]
    database_args: config::DatabaseArgs,

    #[command(flatten)]
    directory_args: config::DirectoryArgs,

    #[command(flatten)]
    execution_args: config::ExecutionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct TenantArgs {
    /// Tenant to target; repeat for several
    #[arg(long = "tenant", value_name = "ID", conflicts_with = "all_tenants")]
    tenants: Vec<String>,

    /// Target every tenant known to the tenant directory
    #[arg(long)]
    all_tenants: bool,
}

impl TenantArgs {
    fn selector(&self) -> Option<TenantSelector> {
        TenantSelector::from_flags(&self.tenants, self.all_tenants)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Install a module and its dependencies on the landlord and selected tenants
    Install {
        module: String,

        #[command(flatten)]
        tenants: TenantArgs,

        /// Show the plan without applying anything
        #[arg(long)]
        dry_run: bool,

        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Show pending units per target without applying anything
    Plan {
        module: String,

        #[command(flatten)]
        tenants: TenantArgs,

        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Show installation status of a module and its dependencies per target
    Status {
        module: String,

        #[command(flatten)]
        tenants: TenantArgs,

        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// List discoverable modules
    List {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let cli = Cli::parse();
    initialize_logging(&cli);

    let cancel = CancelSignal::new();
    cancel.listen_for_shutdown();

    let code = match run_main(cli, &cancel).await {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            eprintln!("{} {:#}", style("✗").red(), e);
            EXIT_ABORTED
        }
    };

    std::process::exit(code);
}

fn initialize_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn" // default level
    };

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };

    // Logs go to stderr so --format json output stays parseable
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_main(cli: Cli, cancel: &CancelSignal) -> Result<CommandOutcome> {
    let (file_config, root_dir) = config::load_config(&cli.config_file)?;

    let cli_config = config::ConfigInput {
        databases: Some(cli.database_args.clone().into()),
        directories: Some(cli.directory_args.clone().into()),
        tenants: None,
        ledger: None,
        execution: Some(cli.execution_args.clone().into()),
    };

    let config = config::ConfigBuilder::new()
        .with_file(file_config)
        .with_cli_args(cli_config)
        .resolve()?;

    match &cli.command {
        Commands::Install {
            module,
            tenants,
            dry_run,
            format,
        } => {
            info!("Installing module {}", module);
            let options = InstallOptions {
                module,
                selector: tenants.selector(),
                dry_run: *dry_run,
                format: *format,
            };
            commands::cmd_install(&config, &root_dir, options, cancel).await
        }
        Commands::Plan {
            module,
            tenants,
            format,
        } => {
            info!("Planning module {}", module);
            commands::cmd_plan(&config, &root_dir, module, tenants.selector(), *format).await
        }
        Commands::Status {
            module,
            tenants,
            format,
        } => {
            info!("Checking status of module {}", module);
            commands::cmd_status(&config, &root_dir, module, tenants.selector(), *format).await
        }
        Commands::List { format } => {
            info!("Listing modules");
            commands::cmd_list(&config, &root_dir, *format).await
        }
    }
}
