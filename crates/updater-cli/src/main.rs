mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, serve::ServeArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "config-updater",
    about = "Run make targets for configuration files changed by merged pull requests",
    version,
    propagate_version = true
)]
struct Cli {
    /// Update configuration file (targets and matchers)
    #[arg(
        long,
        global = true,
        env = "CONFIG_UPDATER_CONFIG",
        default_value = "config.yaml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for GitHub webhooks and apply merged changes
    Serve(ServeArgs),

    /// Inspect the update configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Show the tasks a set of changed paths would produce, without running them
    Resolve {
        /// Local checkout the paths are relative to
        #[arg(long)]
        dir: PathBuf,

        /// Repository-relative changed paths
        #[arg(required = true)]
        paths: Vec<String>,

        /// Output as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Serve(args) => cmd::serve::run(&cli.config, args),
        Commands::Config { subcommand } => cmd::config::run(&cli.config, subcommand),
        Commands::Resolve { dir, paths, json } => {
            cmd::resolve::run(&cli.config, &dir, &paths, json)
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
