pub mod lennard_jones;
pub mod pair_table;
mod pairwise;

use crate::core::kwargs::{Kwargs, Value};
use crate::core::models::properties::{CalcResults, Property};
use crate::core::models::structure::Structure;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalculatorError {
    #[error("unknown architecture '{0}' (available: lj, table)")]
    UnknownArchitecture(String),

    #[error("architecture '{arch}' does not support device '{device}'")]
    UnsupportedDevice { arch: &'static str, device: String },

    #[error("unsupported calculator option '{0}'")]
    UnsupportedParam(String),

    #[error("calculator option '{key}' must be {expected}, got {got}")]
    InvalidParam {
        key: &'static str,
        expected: &'static str,
        got: String,
    },

    #[error("failed to load model '{name}': {message}")]
    ModelLoad { name: String, message: String },

    #[error("no pair parameters for species pair {a}-{b}")]
    MissingPairParameters { a: String, b: String },

    #[error("stress requested for a structure without a periodic cell")]
    StressRequiresCell,
}

/// The interatomic-potential seam.
///
/// Implementations estimate energies, forces, and stresses for a structure.
/// The optimizer and the single-point workflow only see this trait, so a
/// machine-learned backend slots in exactly like the built-in reference
/// potentials.
pub trait Calculator: Send + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn calculate(
        &self,
        structure: &Structure,
        properties: &[Property],
    ) -> Result<CalcResults, CalculatorError>;
}

pub const DEFAULT_ARCHITECTURE: &str = "lj";
pub const DEFAULT_DEVICE: &str = "cpu";

/// Default parameters an architecture supplies for keys the caller left out.
///
/// Caller-supplied keys always win; injection never overwrites.
pub fn default_params(architecture: &str) -> Kwargs {
    let mut defaults = Kwargs::new();
    match architecture {
        "lj" => {
            defaults.insert(
                "sigma".to_string(),
                Value::Float(lennard_jones::ARGON_SIGMA),
            );
            defaults.insert(
                "epsilon".to_string(),
                Value::Float(lennard_jones::ARGON_EPSILON),
            );
        }
        "table" => {
            defaults.insert("model".to_string(), Value::Str("small".to_string()));
        }
        _ => {}
    }
    defaults
}

/// Creates a calculator for the requested architecture and device.
///
/// Unknown architectures are reported here; device validity is judged by the
/// backend itself and its verdict is surfaced unchanged.
pub fn create(
    architecture: &str,
    device: &str,
    params: &Kwargs,
) -> Result<Box<dyn Calculator>, CalculatorError> {
    let mut merged = params.clone();
    for (key, value) in default_params(architecture) {
        merged.entry(key).or_insert(value);
    }

    match architecture {
        "lj" => Ok(Box::new(lennard_jones::LennardJones::from_params(
            device, &merged,
        )?)),
        "table" => Ok(Box::new(pair_table::PairTable::from_params(
            device, &merged,
        )?)),
        other => Err(CalculatorError::UnknownArchitecture(other.to_string())),
    }
}

pub(crate) fn require_cpu(arch: &'static str, device: &str) -> Result<(), CalculatorError> {
    if device.eq_ignore_ascii_case("cpu") {
        Ok(())
    } else {
        Err(CalculatorError::UnsupportedDevice {
            arch,
            device: device.to_string(),
        })
    }
}

pub(crate) fn param_f64(
    params: &Kwargs,
    key: &'static str,
) -> Result<Option<f64>, CalculatorError> {
    match params.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| CalculatorError::InvalidParam {
                key,
                expected: "a number",
                got: value.to_string(),
            }),
    }
}

pub(crate) fn param_str<'a>(
    params: &'a Kwargs,
    key: &'static str,
) -> Result<Option<&'a str>, CalculatorError> {
    match params.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| CalculatorError::InvalidParam {
                key,
                expected: "a string",
                got: value.to_string(),
            }),
    }
}
