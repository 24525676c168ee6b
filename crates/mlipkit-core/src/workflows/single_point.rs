use crate::calculator::{self, Calculator, CalculatorError};
use crate::core::io::xyz::{self, ReadOptions, XyzError};
use crate::core::kwargs::Kwargs;
use crate::core::models::properties::{CalcResults, Property};
use crate::core::models::structure::Structure;
use crate::logging::{LogSpec, SessionLog};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Structure(#[from] XyzError),

    #[error(transparent)]
    Calculator(#[from] CalculatorError),

    #[error("failed to open log '{path}': {source}", path = path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything needed to materialize a [`Session`]. Built once per command
/// invocation and owned by it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSpec {
    pub structure_path: PathBuf,
    pub architecture: String,
    pub device: String,
    pub read_params: Kwargs,
    pub calc_params: Kwargs,
    pub log: LogSpec,
}

/// A loaded structure with an attached calculator and an open session log:
/// the shared precondition for single-point evaluation and geometry
/// optimization.
#[derive(Debug)]
pub struct Session {
    pub structure: Structure,
    pub calculator: Box<dyn Calculator>,
    log: SessionLog,
    log_path: PathBuf,
}

impl Session {
    /// Loads the structure, instantiates the calculator, and opens the log.
    ///
    /// Any failure aborts the command; nothing is retried.
    pub fn build(spec: &SessionSpec) -> Result<Self, SessionError> {
        let mut log = SessionLog::open(&spec.log).map_err(|source| SessionError::Log {
            path: spec.log.path.clone(),
            source,
        })?;

        let read_options = ReadOptions::from_kwargs(&spec.read_params)?;
        let structure = xyz::load(&spec.structure_path, &read_options)?;
        info!(
            atoms = structure.len(),
            path = %spec.structure_path.display(),
            "structure loaded"
        );
        log.record(&format!(
            "loaded structure from '{}' ({} atom(s), periodic={})",
            spec.structure_path.display(),
            structure.len(),
            structure.is_periodic()
        ))
        .map_err(|source| SessionError::Log {
            path: spec.log.path.clone(),
            source,
        })?;

        let calculator = calculator::create(&spec.architecture, &spec.device, &spec.calc_params)?;
        log.record(&format!(
            "calculator '{}' attached (device: {})",
            calculator.name(),
            spec.device
        ))
        .map_err(|source| SessionError::Log {
            path: spec.log.path.clone(),
            source,
        })?;

        Ok(Self {
            structure,
            calculator,
            log,
            log_path: spec.log.path.clone(),
        })
    }

    /// Computes the requested properties and optionally persists structure
    /// plus results to `output`.
    ///
    /// Stress is silently skipped (with a log note) for aperiodic structures,
    /// since the virial is undefined without a cell.
    pub fn run(
        &mut self,
        properties: &[Property],
        output: Option<&Path>,
    ) -> Result<CalcResults, SessionError> {
        let mut requested: Vec<Property> = properties.to_vec();
        if !self.structure.is_periodic() && requested.contains(&Property::Stress) {
            requested.retain(|p| *p != Property::Stress);
            self.log
                .record("structure is not periodic; skipping stress")
                .map_err(|e| self.log_err(e))?;
        }

        let results = self.calculator.calculate(&self.structure, &requested)?;

        if let Some(energy) = results.energy {
            self.log
                .record(&format!("energy: {:.8} eV", energy))
                .map_err(|e| self.log_err(e))?;
        }
        if let Some(fmax) = results.max_force() {
            self.log
                .record(&format!("max force: {:.6} eV/A", fmax))
                .map_err(|e| self.log_err(e))?;
        }
        if let Some(stress) = results.stress {
            self.log
                .record(&format!(
                    "stress (Voigt, eV/A^3): [{:.6} {:.6} {:.6} {:.6} {:.6} {:.6}]",
                    stress[0], stress[1], stress[2], stress[3], stress[4], stress[5]
                ))
                .map_err(|e| self.log_err(e))?;
        }

        if let Some(output) = output {
            xyz::save(&self.structure, Some(&results), output)?;
            self.log
                .record(&format!("results written to '{}'", output.display()))
                .map_err(|e| self.log_err(e))?;
        }

        Ok(results)
    }

    /// Writes one record into the session log.
    pub fn log(&mut self, message: &str) -> Result<(), SessionError> {
        self.log.record(message).map_err(|e| self.log_err(e))
    }

    fn log_err(&self, source: io::Error) -> SessionError {
        SessionError::Log {
            path: self.log_path.clone(),
            source,
        }
    }
}
