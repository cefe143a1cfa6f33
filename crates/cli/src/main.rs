mod cmd;
mod output;
mod progress;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use gamepack_lib::config::ToolConfig;
use gamepack_lib::platform::TargetPlatform;

/// gamepack - builds deployable native games from event-based projects
#[derive(Parser)]
#[command(name = "gamepack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
  #[arg(short, long, global = true, action = ArgAction::Count)]
  verbose: u8,

  /// Tool configuration file (default: <config dir>/config.toml)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Root for the working directory, instead of the system temp directory
  #[arg(long, global = true)]
  temp_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Target {
  Windows,
  Linux,
  Mac,
}

impl From<Target> for TargetPlatform {
  fn from(target: Target) -> Self {
    match target {
      Target::Windows => TargetPlatform::Windows,
      Target::Linux => TargetPlatform::Linux,
      Target::Mac => TargetPlatform::Mac,
    }
  }
}

#[derive(Subcommand)]
enum Commands {
  /// Build a project into a runnable game
  Build {
    /// Project file
    project: PathBuf,

    /// Output directory
    #[arg(short, long)]
    out: PathBuf,

    /// Target platform (repeatable; default: host platform)
    #[arg(short, long = "target", value_enum)]
    targets: Vec<Target>,

    /// Produce a single self-extracting executable (Windows only)
    #[arg(long)]
    compress: bool,

    /// Optimize compiled code
    #[arg(long)]
    optimize: bool,

    /// Abort a compiler job after this long (e.g. "90s", "5m")
    #[arg(long, value_parser = humantime::parse_duration)]
    job_timeout: Option<Duration>,

    /// Print plain progress lines instead of a status line
    #[arg(long)]
    plain: bool,

    /// Print the build report as JSON
    #[arg(long)]
    json: bool,
  },

  /// Show the translation units each scene depends on
  Deps {
    /// Project file
    project: PathBuf,

    /// Only this scene
    #[arg(short, long)]
    scene: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Decrypt an encrypted project descriptor
  Decrypt {
    /// Encrypted descriptor, or a container holding one
    input: PathBuf,

    /// Write the plaintext here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
  },

  /// List the entries of a resource container
  Inspect {
    /// Container file (gam.egd)
    container: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Display host and installation information
  Info,
}

fn init_logging(verbose: u8) {
  let default = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn load_config(cli: &Cli) -> Result<ToolConfig> {
  let mut config = ToolConfig::load(cli.config.as_deref()).context("Failed to load tool configuration")?;
  if let Some(dir) = &cli.temp_dir {
    config.temp_dir = Some(dir.clone());
  }
  Ok(config)
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  match &cli.command {
    Commands::Build {
      project,
      out,
      targets,
      compress,
      optimize,
      job_timeout,
      plain,
      json,
    } => {
      let mut config = load_config(&cli)?;
      if let Some(timeout) = job_timeout {
        config.job_timeout_secs = Some(timeout.as_secs().max(1));
      }
      let args = cmd::BuildArgs {
        project: project.clone(),
        out: out.clone(),
        targets: targets.iter().copied().map(TargetPlatform::from).collect(),
        compress: *compress,
        optimize: *optimize,
        plain: *plain,
        json: *json,
      };
      cmd::cmd_build(config, args)
    }
    Commands::Deps { project, scene, json } => cmd::cmd_deps(project, scene.as_deref(), *json),
    Commands::Decrypt { input, output } => cmd::cmd_decrypt(input, output.as_deref()),
    Commands::Inspect { container, json } => cmd::cmd_inspect(container, *json),
    Commands::Info => {
      let config = load_config(&cli)?;
      cmd::cmd_info(&config);
      Ok(())
    }
  }
}
