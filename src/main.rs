#![warn(clippy::all, rust_2018_idioms)]

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use stacksynth::app::cfn_template::{GraphEmitter, TemplateEmitter};
use stacksynth::app::cloudfront::DistributionConfig;
use stacksynth::app::iam_roles::RolesConfig;
use stacksynth::app::settings::{load_document, OutputFormat, SynthSettings};
use stacksynth::app::topology::TopologyConfig;
use stacksynth::{synthesize_distribution, synthesize_load_balancer, synthesize_roles};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "stacksynth",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("STACKSYNTH_COMMIT"), ")"),
    about = "Synthesize CloudFormation templates from topology documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// TOML settings file
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load balancer, target groups, listeners and alarms
    LoadBalancer(SynthArgs),
    /// EC2 and Lambda IAM roles
    Roles(SynthArgs),
    /// CloudFront distribution
    Cloudfront(SynthArgs),
}

#[derive(Debug, Args)]
struct SynthArgs {
    /// Topology document (JSON or YAML)
    config: PathBuf,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// json or yaml; defaults to the output extension, then the settings
    #[arg(short, long)]
    format: Option<String>,

    /// Print the deployment order instead of the template
    #[arg(long)]
    order: bool,
}

fn open_log_file(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    // Set restrictive permissions (owner read/write only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("Failed to restrict log file {}", path.display()))?;
    }

    Ok(file)
}

fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<()> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::builder().parse("stacksynth=info"))?,
        1 => EnvFilter::builder().parse("stacksynth=debug")?,
        _ => EnvFilter::builder().parse("stacksynth=trace")?,
    };

    let file_layer = match log_file {
        Some(path) => Some(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(open_log_file(path)?))
                .with_ansi(false),
        ),
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    tracing::debug!("Logging initialized");
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let mut settings = match &cli.settings {
        Some(path) => SynthSettings::load_from_path(path)?,
        None => SynthSettings::default(),
    };

    let (args, stack) = match &cli.command {
        Command::LoadBalancer(args) => {
            let config: TopologyConfig = load_document(&args.config)?;
            (args, synthesize_load_balancer(&config)?)
        }
        Command::Roles(args) => {
            let config: RolesConfig = load_document(&args.config)?;
            (args, synthesize_roles(&config)?)
        }
        Command::Cloudfront(args) => {
            let config: DistributionConfig = load_document(&args.config)?;
            (args, synthesize_distribution(&config)?)
        }
    };

    if let Some(format) = &args.format {
        settings.output_format = OutputFormat::parse(format)?;
    } else if let Some(format) = args.output.as_deref().and_then(OutputFormat::from_path) {
        settings.output_format = format;
    }

    let text = if args.order {
        let mut order = stack.graph.deployment_order()?.join("\n");
        order.push('\n');
        order
    } else {
        TemplateEmitter::new(settings).emit(&stack)?
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;
    run(&cli)
}
