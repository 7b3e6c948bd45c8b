use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(name = "vmcycle")]
#[command(about = "Provision a VM and drive repeated start/stop cycles against it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a VM, cycle it, and delete it
    Run(RunArgs),

    /// Show the steps a run would execute
    Plan {
        /// Number of start/stop pairs
        #[arg(short, long)]
        cycles: Option<usize>,
    },

    /// Inspect or change configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Image UUID to provision from (defaults to `image_uuid` in config)
    #[arg(short, long, env = "VMCYCLE_IMAGE")]
    pub image: Option<String>,

    /// Number of start/stop pairs
    #[arg(short, long)]
    pub cycles: Option<usize>,

    /// Outer timeout for the whole run, in milliseconds
    #[arg(short, long)]
    pub timeout_ms: Option<u64>,

    /// VM backend ("vmadm" or "simulated")
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Brand of the test VM
    #[arg(long)]
    pub brand: Option<String>,

    /// Alias of the test VM (default: autozone-<pid>)
    #[arg(short, long)]
    pub alias: Option<String>,

    /// Boot the VM on creation
    #[arg(long)]
    pub autoboot: bool,

    /// Keep the VM after the run
    #[arg(long)]
    pub keep: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "tap")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Tap,
    Json,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Set one configuration value and save the file
    Set {
        /// Field name (e.g. cycles, timeout_ms, backend, image_uuid)
        key: String,
        /// New value; empty clears optional fields
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let success = commands::run(args).await?;
            if !success {
                std::process::exit(1);
            }
        }

        Commands::Plan { cycles } => {
            commands::plan(cycles)?;
        }

        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => commands::config::show()?,
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Set { key, value } => commands::config::set(&key, &value)?,
        },
    }

    Ok(())
}
