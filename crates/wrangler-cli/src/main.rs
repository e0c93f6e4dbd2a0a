mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use cmd::runner::RunnerCommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "wrangler",
    about = "Class progression tooling: inspect step programs, preview leveling plans, talk to the order runner",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file
    #[arg(
        long,
        global = true,
        env = "WRANGLER_CONFIG",
        default_value = wrangler_core::config::DEFAULT_CONFIG_FILE
    )]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a step program and report what it contains
    Check {
        /// Program file
        program: PathBuf,

        /// Also parse every LoadProfile target, recursively
        #[arg(long)]
        follow: bool,
    },

    /// Show what the leveling loop would do for a class at a level
    Plan {
        /// Progression tables (YAML)
        #[arg(long)]
        tables: PathBuf,

        /// Class name, e.g. miner or ClassJobType.Weaver
        #[arg(long)]
        class: String,

        #[arg(long)]
        level: u32,

        /// Objective ids already completed (comma separated)
        #[arg(long, value_delimiter = ',')]
        completed: Vec<u32>,
    },

    /// Validate the configuration and, optionally, a tables file
    Validate {
        /// Progression tables (YAML)
        #[arg(long)]
        tables: Option<PathBuf>,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Submit one order to the order runner and wait for it to finish
    Order {
        #[arg(long)]
        item: u32,

        #[arg(long)]
        amount: u32,

        /// Producing class; gatherers submit a Gather order
        #[arg(long)]
        class: String,

        /// Request high quality
        #[arg(long)]
        hq: bool,

        /// Let the runner use quick synthesis
        #[arg(long)]
        quick_synth: bool,

        /// Runner base URL (overrides crafting.base_url)
        #[arg(long)]
        url: Option<String>,

        /// Print the order JSON instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Check that the order runner is up and answering
    Health {
        /// Runner base URL (overrides crafting.base_url)
        #[arg(long)]
        url: Option<String>,
    },

    /// Show the order runner's full status
    Status {
        #[arg(long)]
        url: Option<String>,
    },

    /// Ask the order runner to stop after its current step
    Stop {
        #[arg(long)]
        url: Option<String>,
    },

    /// Resume orders the runner left incomplete
    Resume {
        #[arg(long)]
        url: Option<String>,
    },

    /// Send the character to the runner's home location
    Home {
        #[arg(long)]
        url: Option<String>,
    },

    /// Start an order file that already exists on the runner's machine
    RunFile {
        /// Path as the runner sees it
        path: String,

        #[arg(long)]
        url: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Order { .. } | Commands::RunFile { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Check { program, follow } => cmd::check::run(&program, follow, cli.json),
        Commands::Plan {
            tables,
            class,
            level,
            completed,
        } => cmd::plan::run(&cli.config, &tables, &class, level, &completed, cli.json),
        Commands::Validate { tables } => cmd::validate::run(&cli.config, tables.as_deref(), cli.json),
        Commands::Config { subcommand } => cmd::config::run(&cli.config, subcommand, cli.json),
        Commands::Order {
            item,
            amount,
            class,
            hq,
            quick_synth,
            url,
            dry_run,
        } => cmd::order::run(
            &cli.config,
            cmd::order::OrderArgs {
                item,
                amount,
                class,
                hq,
                quick_synth,
                url,
                dry_run,
            },
            cli.json,
        ),
        Commands::Health { url } => cmd::health::run(&cli.config, url, cli.json),
        Commands::Status { url } => cmd::runner::status(&cli.config, url, cli.json),
        Commands::Stop { url } => cmd::runner::send(&cli.config, RunnerCommand::Stop, url, cli.json),
        Commands::Resume { url } => {
            cmd::runner::send(&cli.config, RunnerCommand::Resume, url, cli.json)
        }
        Commands::Home { url } => cmd::runner::send(&cli.config, RunnerCommand::Home, url, cli.json),
        Commands::RunFile { path, url } => {
            cmd::runner::send(&cli.config, RunnerCommand::RunFile(path), url, cli.json)
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
