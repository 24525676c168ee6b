use crate::cli::SinglepointArgs;
use crate::config;
use crate::error::{CliError, Result};
use crate::utils::kwargs::or_empty;
use mlipkit::core::models::properties::Property;
use mlipkit::workflows::single_point::Session;
use tracing::info;

pub fn run(args: SinglepointArgs) -> Result<()> {
    let read_kwargs = or_empty(args.read_kwargs);
    let calc_kwargs = or_empty(args.calc_kwargs);
    let write_kwargs = or_empty(args.write_kwargs);

    let output = config::session::resolve_output(&args.struct_path, &write_kwargs, "results")?;

    let spec = config::session::build_spec(
        &args.struct_path,
        &args.arch,
        &args.device,
        read_kwargs,
        calc_kwargs,
        &args.log,
    );

    info!("Building session for {:?}", &args.struct_path);
    let mut session =
        Session::build(&spec).map_err(|e| CliError::from_session(e, &args.struct_path))?;

    let properties: Vec<Property> = if args.properties.is_empty() {
        Property::DEFAULT.to_vec()
    } else {
        args.properties.iter().map(|p| Property::from(*p)).collect()
    };
    info!(
        "Computing {:?} with the '{}' calculator",
        properties, args.arch
    );

    let results = session
        .run(&properties, Some(&output))
        .map_err(|e| CliError::from_session(e, &args.struct_path))?;

    if let Some(energy) = results.energy {
        println!("Energy: {:.8} eV", energy);
    }
    if let Some(fmax) = results.max_force() {
        println!("Max force: {:.6} eV/Å", fmax);
    }
    if let Some(stress) = results.stress {
        println!(
            "Stress (Voigt, eV/Å³): [{:.6} {:.6} {:.6} {:.6} {:.6} {:.6}]",
            stress[0], stress[1], stress[2], stress[3], stress[4], stress[5]
        );
    }
    println!("✓ Results written to: {}", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    const WATER: &str = "3\n\
        Properties=species:S:1:pos:R:3\n\
        O 0.0 0.0 0.119\n\
        H 0.0 0.763 -0.477\n\
        H 0.0 -0.763 -0.477\n";

    fn singlepoint_args(dir: &Path, extra: &[&str]) -> SinglepointArgs {
        let structure = dir.join("water.xyz");
        fs::write(&structure, WATER).unwrap();
        let structure = structure.to_str().unwrap().to_string();
        let log = dir.join("singlepoint.log").to_str().unwrap().to_string();
        let mut argv = vec![
            "mlipkit",
            "singlepoint",
            "--struct",
            structure.as_str(),
            "--log",
            log.as_str(),
        ];
        argv.extend_from_slice(extra);
        let cli = Cli::try_parse_from(argv).expect("arguments should parse");
        match cli.command {
            Commands::Singlepoint(args) => args,
            _ => panic!("expected singlepoint"),
        }
    }

    #[test]
    fn default_invocation_writes_results_and_log() {
        let dir = tempdir().unwrap();
        let args = singlepoint_args(dir.path(), &[]);
        run(args).unwrap();

        let results = fs::read_to_string(dir.path().join("water-results.extxyz")).unwrap();
        assert!(results.contains("energy="));
        assert!(results.contains("forces:R:3"));

        let log = fs::read_to_string(dir.path().join("singlepoint.log")).unwrap();
        assert!(log.contains("calculator 'lj' attached"));
        assert!(log.contains("energy:"));
    }

    #[test]
    fn explicit_properties_limit_what_is_computed() {
        let dir = tempdir().unwrap();
        let args = singlepoint_args(dir.path(), &["--property", "energy"]);
        run(args).unwrap();

        let results = fs::read_to_string(dir.path().join("water-results.extxyz")).unwrap();
        assert!(results.contains("energy="));
        assert!(!results.contains("forces:R:3"));
    }

    #[test]
    fn write_kwargs_filename_overrides_the_default_output() {
        let dir = tempdir().unwrap();
        let custom = dir.path().join("custom.extxyz");
        let kwargs = format!("{{'filename': '{}'}}", custom.to_str().unwrap());
        let args = singlepoint_args(dir.path(), &["--write-kwargs", &kwargs]);
        run(args).unwrap();
        assert!(custom.exists());
        assert!(!dir.path().join("water-results.extxyz").exists());
    }

    #[test]
    fn missing_structure_reports_the_path() {
        let dir = tempdir().unwrap();
        let mut args = singlepoint_args(dir.path(), &[]);
        args.struct_path = dir.path().join("absent.xyz");
        let err = run(args).unwrap_err();
        assert!(err.to_string().contains("absent.xyz"));
    }

    #[test]
    fn bad_calc_kwargs_fail_as_configuration_errors() {
        let dir = tempdir().unwrap();
        let args = singlepoint_args(dir.path(), &["--calc-kwargs", "{'cutoff': 'far'}"]);
        let err = run(args).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }
}
