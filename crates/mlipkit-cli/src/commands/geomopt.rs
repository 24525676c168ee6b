use crate::cli::GeomoptArgs;
use crate::config;
use crate::error::{CliError, Result};
use crate::utils::kwargs::or_empty;
use crate::utils::progress::CliProgressHandler;
use mlipkit::core::models::properties::Property;
use mlipkit::optimize;
use mlipkit::progress::ProgressReporter;
use mlipkit::workflows::single_point::Session;
use tracing::{info, warn};

pub fn run(args: GeomoptArgs) -> Result<()> {
    // Flag validation happens before the structure is touched, so a
    // conflicting configuration leaves no files behind.
    let settings = config::opt::assemble(&args)?;

    let read_kwargs = or_empty(args.read_kwargs.clone());
    let calc_kwargs = or_empty(args.calc_kwargs.clone());
    let write_kwargs = or_empty(args.write_kwargs.clone());
    let output = config::session::resolve_output(&args.struct_path, &write_kwargs, "opt")?;

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

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting geometry optimization...");
    info!(
        "Optimizing to fmax {} eV/Å within {} step(s)",
        settings.fmax, settings.max_steps
    );

    let report = optimize::run(
        &mut session.structure,
        session.calculator.as_ref(),
        &settings,
        &reporter,
    )
    .map_err(CliError::from)?;

    if report.converged {
        println!(
            "✓ Converged after {} step(s): energy {:.8} eV, fmax {:.6} eV/Å",
            report.steps, report.energy, report.fmax
        );
    } else {
        warn!(
            "Optimization stopped after {} step(s) without converging.",
            report.steps
        );
        println!(
            "Warning: not converged after {} step(s): energy {:.8} eV, fmax {:.6} eV/Å",
            report.steps, report.energy, report.fmax
        );
    }

    // A final evaluation attaches energy and forces to the written frame and
    // lands the closing records in the session log.
    session
        .run(&Property::DEFAULT, Some(&output))
        .map_err(|e| CliError::from_session(e, &args.struct_path))?;
    println!("✓ Optimized structure written to: {}", output.display());

    Ok(())
}
