use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "James Sturgis",
    version,
    about = "discsim - Metropolis Monte Carlo sampling of two-dimensional coarse-grained molecular ensembles.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a Monte Carlo trajectory in the canonical (NVT) ensemble.
    Nvt(SampleArgs),
    /// Run parallel-tempering replica exchange over a temperature ladder.
    Rx(RxArgs),
    /// Seed a random initial configuration without overlaps.
    Make(MakeArgs),
    /// Wrap a configuration in a convex-hull boundary.
    Wrap(WrapArgs),
}

/// Arguments shared by the sampling commands.
#[derive(Args, Debug)]
pub struct SampleArgs {
    /// The number of simulation steps to make.
    pub n_steps: u64,

    /// The number of steps between reports to the run log.
    pub print_freq: u64,

    /// The temperature parameter 1/(kB T) that scales the force-field
    /// energies.
    pub beta: f64,

    /// The pressure; accepted for compatibility with constant-pressure
    /// ensembles and unused by the NVT acceptance rule.
    pub pressure: f64,

    /// The topology file to use for the integration.
    #[arg(short = 't', long, required = true, value_name = "PATH")]
    pub topology: PathBuf,

    /// The force-field file to use for the integration.
    #[arg(short = 'f', long, required = true, value_name = "PATH")]
    pub forcefield: PathBuf,

    /// Initial configuration; read from standard input when omitted.
    #[arg(short = 'c', long, value_name = "PATH")]
    pub initial: Option<PathBuf>,

    /// Final configuration; written to standard output when omitted.
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Run log; written to standard error when omitted.
    #[arg(short = 'l', long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// The number of steps between trajectory frames (zero disables the
    /// trajectory).
    #[arg(short = 'n', long, value_name = "STEPS", default_value_t = 0)]
    pub frame_freq: u64,

    /// Gzipped trajectory file; required when --frame-freq is set.
    #[arg(short = 's', long, value_name = "PATH")]
    pub trajectory: Option<PathBuf>,

    /// Use periodic boundary conditions.
    #[arg(short = 'p', long)]
    pub periodic: bool,

    /// Master seed for the per-integrator random streams.
    #[arg(long, value_name = "SEED", default_value_t = 0)]
    pub seed: u64,
}

/// Arguments for the `rx` subcommand.
#[derive(Args, Debug)]
pub struct RxArgs {
    #[command(flatten)]
    pub sample: SampleArgs,

    /// The number of replicas on the temperature ladder.
    #[arg(short = 'r', long, value_name = "COUNT", default_value_t = 1)]
    pub replicas: usize,
}

/// Arguments for the `make` subcommand.
#[derive(Args, Debug)]
pub struct MakeArgs {
    /// Width of the new configuration.
    pub x_size: f64,

    /// Height of the new configuration.
    pub y_size: f64,

    /// Objects to place per molecule type, in type order.
    #[arg(required = true)]
    pub counts: Vec<usize>,

    /// Topology file; a default hard-disc topology is used when omitted.
    #[arg(short = 't', long, value_name = "PATH")]
    pub topology: Option<PathBuf>,

    /// Output configuration; written to standard output when omitted.
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Place into a boundary shrunk by this factor, then expand back.
    #[arg(short = 'd', long, value_name = "FACTOR", default_value_t = 1.0)]
    pub scale: f64,

    /// Placement attempts per object before giving up.
    #[arg(short = 'a', long, value_name = "COUNT", default_value_t = discsim::workflows::build::DEFAULT_MAX_ATTEMPTS)]
    pub attempts: usize,

    /// Use periodic boundary conditions.
    #[arg(short = 'p', long)]
    pub periodic: bool,

    /// Seed for the placement random stream.
    #[arg(long, value_name = "SEED", default_value_t = 0)]
    pub seed: u64,
}

/// Arguments for the `wrap` subcommand.
#[derive(Args, Debug)]
pub struct WrapArgs {
    /// Topology file; objects are treated as unit discs when omitted.
    #[arg(short = 't', long, value_name = "PATH")]
    pub topology: Option<PathBuf>,

    /// Input configuration; read from standard input when omitted.
    #[arg(short = 'c', long, value_name = "PATH")]
    pub initial: Option<PathBuf>,

    /// Output configuration; written to standard output when omitted.
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}
