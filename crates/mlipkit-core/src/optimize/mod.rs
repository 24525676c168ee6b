pub mod fire;

use crate::calculator::{Calculator, CalculatorError};
use crate::core::io::xyz::{XyzError, XyzTrajectory};
use crate::core::kwargs::Kwargs;
use crate::core::models::properties::{CalcResults, Property};
use crate::core::models::structure::Structure;
use crate::logging::{self, LogSpec};
use crate::progress::{Progress, ProgressReporter};
use fire::{Fire, FireParams};
use nalgebra::{Matrix3, Vector3};
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("cell optimization requires a periodic structure with a cell")]
    MissingCell,

    #[error("unsupported optimizer option '{0}'")]
    UnsupportedOption(String),

    #[error("optimizer option '{key}' must be {expected}, got {got}")]
    InvalidOption {
        key: &'static str,
        expected: &'static str,
        got: String,
    },

    #[error(transparent)]
    Calculator(#[from] CalculatorError),

    #[error(transparent)]
    Trajectory(#[from] XyzError),

    #[error("failed to write log: {0}")]
    Log(#[from] io::Error),
}

/// Which cell degrees of freedom participate in the optimization.
///
/// Present: the cell deforms alongside the atomic positions;
/// `hydrostatic_strain` restricts the deformation to isotropic scaling.
/// Absent (`None` in [`OptimizeSettings`]): atomic positions only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    pub hydrostatic_strain: bool,
}

/// Typed form of the optimizer kwargs mapping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OptimizerOptions {
    pub fire: FireParams,
}

impl OptimizerOptions {
    /// Decodes the opt-kwargs mapping. Unknown keys are rejected so nothing
    /// the caller asked for is dropped silently.
    pub fn from_kwargs(kwargs: &Kwargs) -> Result<Self, OptimizeError> {
        let mut fire = FireParams::default();
        for (key, value) in kwargs {
            let name: &'static str = match key.as_str() {
                "maxstep" => "maxstep",
                "dt" => "dt",
                "dt_max" => "dt_max",
                other => return Err(OptimizeError::UnsupportedOption(other.to_string())),
            };
            let number = value.as_f64().ok_or_else(|| OptimizeError::InvalidOption {
                key: name,
                expected: "a number",
                got: value.to_string(),
            })?;
            match name {
                "maxstep" => fire.maxstep = number,
                "dt" => fire.dt = number,
                _ => fire.dt_max = number,
            }
        }
        Ok(Self { fire })
    }
}

/// Where optimization frames are recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrajectoryConfig {
    pub path: PathBuf,
}

/// The fully assembled optimization plan handed to [`run`].
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeSettings {
    /// Force-convergence threshold in eV/Å.
    pub fmax: f64,
    pub max_steps: u64,
    pub filter: Option<FilterConfig>,
    pub optimizer: OptimizerOptions,
    pub trajectory: Option<TrajectoryConfig>,
    pub log: Option<LogSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizeReport {
    pub converged: bool,
    pub steps: u64,
    pub energy: f64,
    pub fmax: f64,
}

/// Relaxes a structure in place with the FIRE minimizer.
///
/// With a cell filter the generalized degrees of freedom are the atomic
/// positions plus a strain scaled by the atom count; the generalized cell
/// force is the stress-derived -V sigma / cell_factor. Convergence is judged
/// on the largest row norm across both kinds of rows. Running out of steps
/// is reported, not an error.
pub fn run(
    structure: &mut Structure,
    calculator: &dyn Calculator,
    settings: &OptimizeSettings,
    reporter: &ProgressReporter,
) -> Result<OptimizeReport, OptimizeError> {
    if settings.filter.is_some() && !structure.is_periodic() {
        return Err(OptimizeError::MissingCell);
    }

    let mut log = logging::open_optional(settings.log.as_ref())?;
    let mut trajectory = settings
        .trajectory
        .as_ref()
        .map(|t| XyzTrajectory::create(&t.path))
        .transpose()?;

    let n = structure.len();
    let cell_rows = if settings.filter.is_some() { 3 } else { 0 };
    let cell_factor = n as f64;

    let properties: Vec<Property> = if settings.filter.is_some() {
        vec![Property::Energy, Property::Forces, Property::Stress]
    } else {
        vec![Property::Energy, Property::Forces]
    };

    reporter.report(Progress::PhaseStart { name: "optimize" });
    if let Some(log) = log.as_mut() {
        log.record(&format!(
            "FIRE: fmax={} max_steps={} cell_filter={}",
            settings.fmax,
            settings.max_steps,
            match settings.filter {
                None => "off",
                Some(FilterConfig {
                    hydrostatic_strain: true,
                }) => "hydrostatic",
                Some(_) => "full",
            }
        ))?;
    }

    let mut fire = Fire::new(n + cell_rows, settings.optimizer.fire);
    let mut step = 0u64;

    let mut results = calculator.calculate(structure, &properties)?;
    let mut rows = generalized_forces(structure, &results, settings.filter, cell_factor)?;
    let mut fmax = max_row_norm(&rows);

    record_state(&mut log, &mut trajectory, structure, &results, step, fmax)?;
    reporter.report(Progress::Step {
        step,
        energy: results.energy.unwrap_or(f64::NAN),
        fmax,
    });

    while fmax > settings.fmax && step < settings.max_steps {
        let displacements = fire.step(&rows);

        if let Some(filter) = settings.filter {
            let mut strain = Matrix3::zeros();
            for (row, d) in displacements[n..].iter().enumerate() {
                for col in 0..3 {
                    strain[(row, col)] = d[col] / cell_factor;
                }
            }
            // Keep the strain increment symmetric (no rigid rotations).
            strain = (strain + strain.transpose()) / 2.0;
            if filter.hydrostatic_strain {
                let iso = strain.trace() / 3.0;
                strain = Matrix3::from_diagonal(&Vector3::new(iso, iso, iso));
            }
            structure
                .apply_strain(&strain)
                .map_err(|_| OptimizeError::MissingCell)?;
        }
        for (pos, d) in structure.positions.iter_mut().zip(&displacements[..n]) {
            *pos += *d;
        }

        step += 1;
        results = calculator.calculate(structure, &properties)?;
        rows = generalized_forces(structure, &results, settings.filter, cell_factor)?;
        fmax = max_row_norm(&rows);

        record_state(&mut log, &mut trajectory, structure, &results, step, fmax)?;
        reporter.report(Progress::Step {
            step,
            energy: results.energy.unwrap_or(f64::NAN),
            fmax,
        });
    }

    let converged = fmax <= settings.fmax;
    let energy = results.energy.unwrap_or(f64::NAN);
    if let Some(log) = log.as_mut() {
        if converged {
            log.record(&format!(
                "converged after {} step(s): energy={:.8} eV, fmax={:.6} eV/A",
                step, energy, fmax
            ))?;
        } else {
            log.record(&format!(
                "NOT converged after {} step(s): energy={:.8} eV, fmax={:.6} eV/A",
                step, energy, fmax
            ))?;
        }
    }
    info!(steps = step, converged, "geometry optimization finished");
    reporter.report(Progress::PhaseFinish);

    Ok(OptimizeReport {
        converged,
        steps: step,
        energy,
        fmax,
    })
}

/// Builds the generalized force rows: one per atom, plus three cell rows
/// (-V sigma / cell_factor) when a filter is active.
fn generalized_forces(
    structure: &Structure,
    results: &CalcResults,
    filter: Option<FilterConfig>,
    cell_factor: f64,
) -> Result<Vec<Vector3<f64>>, OptimizeError> {
    let mut rows = results.forces.clone().unwrap_or_default();

    if let Some(filter) = filter {
        let stress = results.stress.ok_or(OptimizeError::MissingCell)?;
        let volume = structure.volume().map_err(|_| OptimizeError::MissingCell)?;
        let mut sigma = Matrix3::new(
            stress[0], stress[5], stress[4], //
            stress[5], stress[1], stress[3], //
            stress[4], stress[3], stress[2],
        );
        if filter.hydrostatic_strain {
            let iso = sigma.trace() / 3.0;
            sigma = Matrix3::from_diagonal(&Vector3::new(iso, iso, iso));
        }
        let cell_force = -volume / cell_factor * sigma;
        for row in 0..3 {
            rows.push(cell_force.row(row).transpose());
        }
    }
    Ok(rows)
}

fn max_row_norm(rows: &[Vector3<f64>]) -> f64 {
    rows.iter().map(|r| r.norm()).fold(0.0, f64::max)
}

fn record_state(
    log: &mut Option<logging::SessionLog>,
    trajectory: &mut Option<XyzTrajectory>,
    structure: &Structure,
    results: &CalcResults,
    step: u64,
    fmax: f64,
) -> Result<(), OptimizeError> {
    if let Some(log) = log.as_mut() {
        log.record(&format!(
            "FIRE: {:>5}  energy={:.8}  fmax={:.6}",
            step,
            results.energy.unwrap_or(f64::NAN),
            fmax
        ))?;
    }
    if let Some(trajectory) = trajectory.as_mut() {
        trajectory.record(structure, Some(results))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator;
    use crate::core::kwargs::Value;
    use nalgebra::Point3;
    use std::fs;
    use tempfile::tempdir;

    fn unit_lj() -> Box<dyn Calculator> {
        let mut params = Kwargs::new();
        params.insert("sigma".to_string(), Value::Float(1.0));
        params.insert("epsilon".to_string(), Value::Float(1.0));
        params.insert("cutoff".to_string(), Value::Float(10.0));
        calculator::create("lj", "cpu", &params).unwrap()
    }

    fn settings(fmax: f64, max_steps: u64) -> OptimizeSettings {
        OptimizeSettings {
            fmax,
            max_steps,
            filter: None,
            optimizer: OptimizerOptions::default(),
            trajectory: None,
            log: None,
        }
    }

    fn stretched_dimer() -> Structure {
        Structure::new(
            vec!["X".to_string(), "X".to_string()],
            vec![Point3::origin(), Point3::new(1.3, 0.0, 0.0)],
            None,
            false,
        )
    }

    #[test]
    fn dimer_relaxes_to_the_potential_minimum() {
        let calculator = unit_lj();
        let mut structure = stretched_dimer();
        let report = run(
            &mut structure,
            calculator.as_ref(),
            &settings(1e-4, 500),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert!(report.converged);
        assert!(report.steps > 0);
        let r = (structure.positions[1] - structure.positions[0]).norm();
        assert!((r - 2.0_f64.powf(1.0 / 6.0)).abs() < 1e-3);
    }

    #[test]
    fn exhausting_max_steps_reports_not_converged() {
        let calculator = unit_lj();
        let mut structure = stretched_dimer();
        let report = run(
            &mut structure,
            calculator.as_ref(),
            &settings(1e-12, 2),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!(!report.converged);
        assert_eq!(report.steps, 2);
    }

    #[test]
    fn already_converged_structure_takes_no_steps() {
        let calculator = unit_lj();
        let mut structure = stretched_dimer();
        structure.positions[1].x = 2.0_f64.powf(1.0 / 6.0);
        let report = run(
            &mut structure,
            calculator.as_ref(),
            &settings(1e-3, 500),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert!(report.converged);
        assert_eq!(report.steps, 0);
    }

    #[test]
    fn cell_filter_without_a_cell_is_rejected() {
        let calculator = unit_lj();
        let mut structure = stretched_dimer();
        let mut settings = settings(1e-3, 10);
        settings.filter = Some(FilterConfig {
            hydrostatic_strain: false,
        });
        let err = run(
            &mut structure,
            calculator.as_ref(),
            &settings,
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, OptimizeError::MissingCell));
    }

    #[test]
    fn hydrostatic_filter_expands_a_compressed_cell() {
        let calculator = unit_lj();
        // Single atom in a compressed cubic cell: equilibrium spacing for the
        // image lattice is larger than 1.0.
        let a = 1.0;
        let mut structure = Structure::new(
            vec!["X".to_string()],
            vec![Point3::origin()],
            Some(Matrix3::from_diagonal(&Vector3::new(a, a, a))),
            true,
        );
        let start_volume = structure.volume().unwrap();

        let mut settings = settings(1e-4, 1000);
        settings.filter = Some(FilterConfig {
            hydrostatic_strain: true,
        });
        let report = run(
            &mut structure,
            calculator.as_ref(),
            &settings,
            &ProgressReporter::new(),
        )
        .unwrap();

        assert!(report.converged);
        assert!(structure.volume().unwrap() > start_volume);
        // Hydrostatic deformation keeps the cell cubic.
        let cell = structure.cell.unwrap();
        assert!((cell[(0, 0)] - cell[(1, 1)]).abs() < 1e-9);
        assert!(cell[(0, 1)].abs() < 1e-12);
    }

    #[test]
    fn trajectory_records_initial_and_stepped_frames() {
        let dir = tempdir().unwrap();
        let traj_path = dir.path().join("opt.extxyz");
        let log_path = dir.path().join("opt.log");

        let calculator = unit_lj();
        let mut structure = stretched_dimer();
        let mut settings = settings(1e-4, 500);
        settings.trajectory = Some(TrajectoryConfig {
            path: traj_path.clone(),
        });
        settings.log = Some(LogSpec::append(&log_path));

        let report = run(
            &mut structure,
            calculator.as_ref(),
            &settings,
            &ProgressReporter::new(),
        )
        .unwrap();

        let content = fs::read_to_string(&traj_path).unwrap();
        let frames = content.matches("Properties=").count() as u64;
        assert_eq!(frames, report.steps + 1);

        let log = fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("FIRE:"));
        assert!(log.contains("converged"));
    }

    #[test]
    fn optimizer_options_reject_unknown_keys() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("interval".to_string(), Value::Int(2));
        let err = OptimizerOptions::from_kwargs(&kwargs).unwrap_err();
        assert!(matches!(err, OptimizeError::UnsupportedOption(key) if key == "interval"));
    }

    #[test]
    fn optimizer_options_decode_fire_params() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("maxstep".to_string(), Value::Float(0.1));
        kwargs.insert("dt".to_string(), Value::Float(0.05));
        let options = OptimizerOptions::from_kwargs(&kwargs).unwrap();
        assert!((options.fire.maxstep - 0.1).abs() < 1e-12);
        assert!((options.fire.dt - 0.05).abs() < 1e-12);
        assert!((options.fire.dt_max - 1.0).abs() < 1e-12);
    }
}
