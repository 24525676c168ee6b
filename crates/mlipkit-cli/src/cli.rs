use crate::utils::kwargs::parse_kwargs;
use clap::{Args, Parser, Subcommand, ValueEnum};
use mlipkit::calculator::{DEFAULT_ARCHITECTURE, DEFAULT_DEVICE};
use mlipkit::core::kwargs::Kwargs;
use mlipkit::core::models::properties::Property;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "mlipkit CLI - configure and run single-point evaluations and geometry optimizations against a pluggable interatomic-potential calculator.",
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

    /// Write diagnostic logs to a file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate energy, forces and/or stress for a structure in one shot.
    Singlepoint(SinglepointArgs),
    /// Relax a structure with the FIRE minimizer, optionally with cell
    /// degrees of freedom.
    Geomopt(GeomoptArgs),
}

/// A property the calculator can be asked for.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyArg {
    Energy,
    Forces,
    Stress,
}

impl From<PropertyArg> for Property {
    fn from(arg: PropertyArg) -> Self {
        match arg {
            PropertyArg::Energy => Property::Energy,
            PropertyArg::Forces => Property::Forces,
            PropertyArg::Stress => Property::Stress,
        }
    }
}

/// Arguments for the `singlepoint` subcommand.
#[derive(Args, Debug)]
pub struct SinglepointArgs {
    /// Path to the input structure file (extended XYZ).
    #[arg(long = "struct", required = true, value_name = "PATH")]
    pub struct_path: PathBuf,

    /// Calculator architecture to attach.
    #[arg(long, default_value = DEFAULT_ARCHITECTURE, value_name = "NAME")]
    pub arch: String,

    /// Device to run the calculator on.
    #[arg(long, default_value = DEFAULT_DEVICE, value_name = "NAME")]
    pub device: String,

    /// Property to compute. May be repeated; defaults to energy, forces and
    /// stress.
    #[arg(long = "property", value_enum, value_name = "NAME")]
    pub properties: Vec<PropertyArg>,

    /// Keyword arguments for the structure reader, as a Python-style dict
    /// literal. Example: --read-kwargs "{'index': 0}"
    #[arg(long, value_name = "DICT", value_parser = parse_kwargs)]
    pub read_kwargs: Option<Kwargs>,

    /// Keyword arguments for the calculator, as a Python-style dict literal.
    /// Example: --calc-kwargs "{'sigma': 3.4, 'epsilon': 0.01}"
    #[arg(long, value_name = "DICT", value_parser = parse_kwargs)]
    pub calc_kwargs: Option<Kwargs>,

    /// Keyword arguments for the results writer, as a Python-style dict
    /// literal. Example: --write-kwargs "{'filename': 'out.extxyz'}"
    #[arg(long, value_name = "DICT", value_parser = parse_kwargs)]
    pub write_kwargs: Option<Kwargs>,

    /// Session log file, opened fresh for this invocation.
    #[arg(long, default_value = "singlepoint.log", value_name = "PATH")]
    pub log: PathBuf,
}

/// Arguments for the `geomopt` subcommand.
#[derive(Args, Debug)]
pub struct GeomoptArgs {
    /// Path to the input structure file (extended XYZ).
    #[arg(long = "struct", required = true, value_name = "PATH")]
    pub struct_path: PathBuf,

    /// Force-convergence threshold in eV/Å.
    #[arg(long = "max-force", default_value_t = 0.1, value_name = "FLOAT")]
    pub max_force: f64,

    /// Maximum number of optimizer steps.
    #[arg(long, default_value_t = 1000, value_name = "INT")]
    pub steps: u64,

    /// Calculator architecture to attach.
    #[arg(long, default_value = DEFAULT_ARCHITECTURE, value_name = "NAME")]
    pub arch: String,

    /// Device to run the calculator on.
    #[arg(long, default_value = DEFAULT_DEVICE, value_name = "NAME")]
    pub device: String,

    /// Optimize the cell vectors together with the atomic positions.
    #[arg(long)]
    pub fully_opt: bool,

    /// Restrict the cell deformation to hydrostatic scaling, keeping cell
    /// angles fixed. Requires --fully-opt.
    #[arg(long)]
    pub vectors_only: bool,

    /// Keyword arguments for the structure reader, as a Python-style dict
    /// literal.
    #[arg(long, value_name = "DICT", value_parser = parse_kwargs)]
    pub read_kwargs: Option<Kwargs>,

    /// Keyword arguments for the calculator, as a Python-style dict literal.
    #[arg(long, value_name = "DICT", value_parser = parse_kwargs)]
    pub calc_kwargs: Option<Kwargs>,

    /// Keyword arguments for the optimizer, as a Python-style dict literal.
    /// Example: --opt-kwargs "{'maxstep': 0.1}"
    #[arg(long, value_name = "DICT", value_parser = parse_kwargs)]
    pub opt_kwargs: Option<Kwargs>,

    /// Keyword arguments for the results writer, as a Python-style dict
    /// literal.
    #[arg(long, value_name = "DICT", value_parser = parse_kwargs)]
    pub write_kwargs: Option<Kwargs>,

    /// Record the optimization trajectory to this file, one frame per step.
    #[arg(long = "traj", value_name = "PATH")]
    pub traj: Option<PathBuf>,

    /// Session log file, opened fresh for this invocation.
    #[arg(long, default_value = "geomopt.log", value_name = "PATH")]
    pub log: PathBuf,
}
