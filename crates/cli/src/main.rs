mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use cmd::Invocation;
use output::OutputFormat;

/// loom - a meta build system that generates ninja build files
#[derive(Parser)]
#[command(name = "loom")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Set an option, overriding the settings file (repeatable)
  #[arg(short = 'O', long = "option", value_name = "KEY=VALUE", global = true)]
  options: Vec<String>,

  /// Settings file (default: .loom-settings.toml in the project directory)
  #[arg(long, value_name = "FILE", global = true)]
  settings_file: Option<PathBuf>,

  /// Additional directory to search for Lua modules (repeatable)
  #[arg(short = 'P', long = "path", value_name = "DIR", global = true)]
  path: Vec<PathBuf>,

  /// Root project directory
  #[arg(short = 'C', long = "directory", value_name = "DIR", default_value = ".", global = true)]
  directory: PathBuf,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the build scripts and write the ninja build file
  Configure {
    /// Targets that must exist in the configured graph
    targets: Vec<String>,
  },

  /// Build targets, reconfiguring first when the cached configuration is stale
  Build {
    /// Targets to build (default: every non-explicit target)
    targets: Vec<String>,

    /// Print what would happen without configuring or running ninja
    #[arg(long)]
    no_execute: bool,
  },

  /// List the targets recorded in the build file
  Targets {
    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Display platform information
  Info,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
  let filter = EnvFilter::try_from_env("LOOM_LOG")
    .or_else(|_| EnvFilter::try_from_default_env())
    .unwrap_or_else(|_| EnvFilter::new(default_level.as_str()));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let invocation = Invocation {
    directory: cli.directory,
    options: cli.options,
    settings_file: cli.settings_file,
    search_path: cli.path,
  };

  match cli.command {
    Commands::Configure { targets } => cmd::cmd_configure(&invocation, &targets),
    Commands::Build { targets, no_execute } => cmd::cmd_build(&invocation, &targets, no_execute),
    Commands::Targets { output } => cmd::cmd_targets(&invocation, output),
    Commands::Info => {
      cmd::cmd_info();
      Ok(())
    }
  }
}
