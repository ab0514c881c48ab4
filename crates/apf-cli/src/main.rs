//! APF command-line tool.
//!
//! Installs, upgrades, and removes plugin bundles in a plugins directory
//! and queries the capability registry they populate.
//!
//! # Examples
//!
//! ```bash
//! # Show what a bundle declares
//! apf inspect ./downloads/weather.bundle
//!
//! # Install it, then resolve an interface it provides
//! apf install ./downloads/weather.bundle
//! apf resolve --interface IForecast
//!
//! # Remove it without prompting
//! apf uninstall com.example.weather -y
//! ```

use anyhow::Result;
use apf_cli::commands::{self, common};
use apf_core::cli::{ExitCode, OutputFormat};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// APF - dynamic plugin loader.
///
/// Manages plugin bundles on disk and the capabilities they register.
#[derive(Parser, Debug)]
#[command(name = "apf")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Loader configuration file (TOML)
    #[arg(long, global = true, env = "APF_CONFIG")]
    config: Option<PathBuf>,

    /// Plugins directory, overriding the configuration
    #[arg(long, global = true, env = "APF_PLUGINS_DIR")]
    plugins_dir: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (json, text, pretty)
    #[arg(long = "format", global = true, default_value = "pretty")]
    format: String,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the manifest of a bundle without installing it.
    Inspect {
        /// Bundle file
        bundle: PathBuf,
    },

    /// Install a plugin, or upgrade it to a strictly newer version.
    ///
    /// The bundle is staged next to the active version and only replaces it
    /// once fully copied and bound. On failure the active version stays.
    Install {
        /// Bundle file
        bundle: PathBuf,
    },

    /// Uninstall a plugin.
    ///
    /// Its capabilities stop resolving immediately. Files that are in use
    /// are removed on the next reconcile.
    Uninstall {
        /// Package id
        package_id: String,

        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List installed plugins.
    List,

    /// Finish interrupted installs and removals, then load every plugin.
    Reconcile,

    /// Resolve an interface to a registered implementation.
    ///
    /// # Examples
    ///
    /// ```bash
    /// apf resolve --interface ISayable
    /// apf resolve --interface ISayable --id greet
    /// ```
    Resolve {
        /// Interface the implementation must satisfy
        #[arg(long)]
        interface: String,

        /// Only accept the implementation registered under this capability id
        #[arg(long)]
        id: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell for completion generation
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            common::exit_code_for(&e)
        }
    };

    std::process::exit(exit_code.as_i32());
}

/// Initializes logging infrastructure.
///
/// `--verbose` forces debug level; otherwise `RUST_LOG` applies, defaulting
/// to info. Logs go to stderr so stdout carries only command output.
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}

/// Resolves global options and routes the command to its handler.
fn run(cli: Cli) -> Result<ExitCode> {
    let Cli {
        command,
        config,
        plugins_dir,
        format,
        ..
    } = cli;
    let output_format = format.parse::<OutputFormat>()?;
    let load_config = move || common::load_config(config.as_deref(), plugins_dir);

    match command {
        Commands::Inspect { bundle } => {
            commands::inspect::run(&bundle, &load_config()?, output_format)
        }
        Commands::Install { bundle } => {
            commands::install::run(&bundle, load_config()?, output_format)
        }
        Commands::Uninstall { package_id, yes } => {
            commands::uninstall::run(&package_id, yes, load_config()?, output_format)
        }
        Commands::List => commands::list::run(load_config()?, output_format),
        Commands::Reconcile => commands::reconcile::run(load_config()?, output_format),
        Commands::Resolve { interface, id } => {
            commands::resolve::run(&interface, id.as_deref(), load_config()?, output_format)
        }
        Commands::Completions { shell } => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            commands::completions::run(shell, &mut cmd)
        }
    }
}
