use crate::cli::GeomoptArgs;
use crate::error::{CliError, Result};
use crate::utils::kwargs::or_empty;
use mlipkit::logging::LogSpec;
use mlipkit::optimize::{FilterConfig, OptimizeSettings, OptimizerOptions, TrajectoryConfig};

/// Turns the geomopt flags into an immutable optimization plan.
///
/// Validation runs before anything is constructed so a rejected
/// configuration performs no observable work: no structure load, no file
/// creation. The caller-supplied opt-kwargs mapping is read, never mutated;
/// the trajectory destination lives only in the plan's `trajectory` field,
/// which is why a `trajectory` key inside the mapping is a conflict rather
/// than a merge.
pub fn assemble(args: &GeomoptArgs) -> Result<OptimizeSettings> {
    let opt_kwargs = or_empty(args.opt_kwargs.clone());

    if args.vectors_only && !args.fully_opt {
        return Err(CliError::Config(
            "--vectors-only refines --fully-opt and cannot be used without it".to_string(),
        ));
    }

    if opt_kwargs.contains_key("trajectory") {
        return Err(CliError::Config(
            "the 'trajectory' key is not accepted in --opt-kwargs; use --traj instead".to_string(),
        ));
    }

    let optimizer = OptimizerOptions::from_kwargs(&opt_kwargs).map_err(CliError::from)?;

    let trajectory = args
        .traj
        .as_ref()
        .map(|path| TrajectoryConfig { path: path.clone() });

    let filter = args.fully_opt.then_some(FilterConfig {
        hydrostatic_strain: args.vectors_only,
    });

    Ok(OptimizeSettings {
        fmax: args.max_force,
        max_steps: args.steps,
        filter,
        optimizer,
        trajectory,
        log: Some(LogSpec::append(&args.log)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use mlipkit::logging::LogMode;
    use std::path::PathBuf;

    fn geomopt_args(extra: &[&str]) -> GeomoptArgs {
        let mut argv = vec!["mlipkit", "geomopt", "--struct", "water.xyz"];
        argv.extend_from_slice(extra);
        let cli = Cli::try_parse_from(argv).expect("arguments should parse");
        match cli.command {
            Commands::Geomopt(args) => args,
            _ => panic!("expected geomopt"),
        }
    }

    #[test]
    fn defaults_produce_an_atoms_only_plan() {
        let settings = assemble(&geomopt_args(&[])).unwrap();
        assert_eq!(settings.fmax, 0.1);
        assert_eq!(settings.max_steps, 1000);
        assert!(settings.filter.is_none());
        assert!(settings.trajectory.is_none());
        let log = settings.log.unwrap();
        assert_eq!(log.mode, LogMode::Append);
        assert_eq!(log.path, PathBuf::from("geomopt.log"));
    }

    #[test]
    fn vectors_only_without_fully_opt_is_rejected() {
        let err = assemble(&geomopt_args(&["--vectors-only"])).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn vectors_only_is_rejected_regardless_of_other_options() {
        let err = assemble(&geomopt_args(&[
            "--vectors-only",
            "--max-force",
            "0.01",
            "--traj",
            "t.extxyz",
            "--opt-kwargs",
            "{'maxstep': 0.1}",
        ]))
        .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn trajectory_key_in_opt_kwargs_is_a_conflict() {
        let err = assemble(&geomopt_args(&[
            "--opt-kwargs",
            "{'trajectory': 'x.extxyz'}",
        ]))
        .unwrap_err();
        match err {
            CliError::Config(message) => assert!(message.contains("--traj")),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn trajectory_key_conflicts_even_without_the_traj_flag() {
        assert!(assemble(&geomopt_args(&["--opt-kwargs", "{'trajectory': None}"])).is_err());
    }

    #[test]
    fn fully_opt_enables_the_cell_filter() {
        let settings = assemble(&geomopt_args(&["--fully-opt"])).unwrap();
        assert_eq!(
            settings.filter,
            Some(FilterConfig {
                hydrostatic_strain: false
            })
        );
    }

    #[test]
    fn vectors_only_with_fully_opt_restricts_to_hydrostatic_strain() {
        let settings = assemble(&geomopt_args(&["--fully-opt", "--vectors-only"])).unwrap();
        assert_eq!(
            settings.filter,
            Some(FilterConfig {
                hydrostatic_strain: true
            })
        );
    }

    #[test]
    fn traj_flag_becomes_the_single_trajectory_destination() {
        let settings = assemble(&geomopt_args(&["--traj", "run.extxyz"])).unwrap();
        assert_eq!(
            settings.trajectory,
            Some(TrajectoryConfig {
                path: PathBuf::from("run.extxyz")
            })
        );
    }

    #[test]
    fn optimizer_options_are_decoded_from_opt_kwargs() {
        let settings =
            assemble(&geomopt_args(&["--opt-kwargs", "{'maxstep': 0.05, 'dt': 0.2}"])).unwrap();
        assert_eq!(settings.optimizer.fire.maxstep, 0.05);
        assert_eq!(settings.optimizer.fire.dt, 0.2);
    }

    #[test]
    fn unknown_optimizer_keys_are_rejected() {
        let err = assemble(&geomopt_args(&["--opt-kwargs", "{'scalar_pressure': 1.0}"])).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn caller_supplied_kwargs_are_not_mutated() {
        let args = geomopt_args(&["--opt-kwargs", "{'maxstep': 0.05}", "--traj", "t.extxyz"]);
        let before = args.opt_kwargs.clone();
        let _ = assemble(&args).unwrap();
        assert_eq!(args.opt_kwargs, before);
        assert!(!args.opt_kwargs.unwrap().contains_key("trajectory"));
    }

    #[test]
    fn scenario_fully_opt_with_explicit_thresholds() {
        let settings = assemble(&geomopt_args(&[
            "--max-force",
            "0.05",
            "--steps",
            "500",
            "--fully-opt",
        ]))
        .unwrap();
        assert_eq!(settings.fmax, 0.05);
        assert_eq!(settings.max_steps, 500);
        assert_eq!(
            settings.filter,
            Some(FilterConfig {
                hydrostatic_strain: false
            })
        );
        assert!(settings.trajectory.is_none());
    }
}
