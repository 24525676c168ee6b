use super::pairwise::{self, PairWell};
use super::{Calculator, CalculatorError, param_f64, require_cpu};
use crate::core::kwargs::Kwargs;
use crate::core::models::properties::{CalcResults, Property};
use crate::core::models::structure::Structure;

/// Argon, the conventional reference parameterization.
pub const ARGON_SIGMA: f64 = 3.405;
pub const ARGON_EPSILON: f64 = 0.010325;

/// Single-species Lennard-Jones reference potential.
///
/// Parameters: `sigma` (Å), `epsilon` (eV), `cutoff` (Å, default 2.5 sigma).
/// The potential is shifted so the energy is continuous at the cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct LennardJones {
    well: PairWell,
    cutoff: f64,
}

impl LennardJones {
    pub fn from_params(device: &str, params: &Kwargs) -> Result<Self, CalculatorError> {
        require_cpu("lj", device)?;

        for key in params.keys() {
            if !matches!(key.as_str(), "sigma" | "epsilon" | "cutoff") {
                return Err(CalculatorError::UnsupportedParam(key.clone()));
            }
        }

        let sigma = param_f64(params, "sigma")?.unwrap_or(ARGON_SIGMA);
        let epsilon = param_f64(params, "epsilon")?.unwrap_or(ARGON_EPSILON);
        let cutoff = param_f64(params, "cutoff")?.unwrap_or(2.5 * sigma);

        if sigma <= 0.0 || epsilon <= 0.0 || cutoff <= 0.0 {
            return Err(CalculatorError::InvalidParam {
                key: if sigma <= 0.0 {
                    "sigma"
                } else if epsilon <= 0.0 {
                    "epsilon"
                } else {
                    "cutoff"
                },
                expected: "a positive number",
                got: format!("sigma={} epsilon={} cutoff={}", sigma, epsilon, cutoff),
            });
        }

        Ok(Self {
            well: PairWell { sigma, epsilon },
            cutoff,
        })
    }

    pub fn sigma(&self) -> f64 {
        self.well.sigma
    }

    pub fn epsilon(&self) -> f64 {
        self.well.epsilon
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }
}

impl Calculator for LennardJones {
    fn name(&self) -> &'static str {
        "lj"
    }

    fn calculate(
        &self,
        structure: &Structure,
        properties: &[Property],
    ) -> Result<CalcResults, CalculatorError> {
        let well = self.well;
        pairwise::evaluate(structure, properties, self.cutoff, &move |_, _| Ok(well))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kwargs::Value;
    use nalgebra::Point3;

    #[test]
    fn unset_params_fall_back_to_argon() {
        let lj = LennardJones::from_params("cpu", &Kwargs::new()).unwrap();
        assert!((lj.sigma() - ARGON_SIGMA).abs() < 1e-12);
        assert!((lj.epsilon() - ARGON_EPSILON).abs() < 1e-12);
        assert!((lj.cutoff() - 2.5 * ARGON_SIGMA).abs() < 1e-12);
    }

    #[test]
    fn caller_params_override_defaults() {
        let mut params = Kwargs::new();
        params.insert("sigma".to_string(), Value::Float(1.0));
        params.insert("epsilon".to_string(), Value::Int(2));
        let lj = LennardJones::from_params("cpu", &params).unwrap();
        assert!((lj.sigma() - 1.0).abs() < 1e-12);
        assert!((lj.epsilon() - 2.0).abs() < 1e-12);
        assert!((lj.cutoff() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn unknown_params_are_rejected() {
        let mut params = Kwargs::new();
        params.insert("model".to_string(), Value::Str("small".to_string()));
        let err = LennardJones::from_params("cpu", &params).unwrap_err();
        assert!(matches!(err, CalculatorError::UnsupportedParam(key) if key == "model"));
    }

    #[test]
    fn non_numeric_sigma_is_rejected() {
        let mut params = Kwargs::new();
        params.insert("sigma".to_string(), Value::Str("wide".to_string()));
        let err = LennardJones::from_params("cpu", &params).unwrap_err();
        assert!(matches!(err, CalculatorError::InvalidParam { key: "sigma", .. }));
    }

    #[test]
    fn dimer_energy_matches_the_analytic_well() {
        let mut params = Kwargs::new();
        params.insert("sigma".to_string(), Value::Float(1.0));
        params.insert("epsilon".to_string(), Value::Float(1.0));
        params.insert("cutoff".to_string(), Value::Float(100.0));
        let lj = LennardJones::from_params("cpu", &params).unwrap();

        let structure = Structure::new(
            vec!["X".to_string(), "X".to_string()],
            vec![
                Point3::origin(),
                Point3::new(2.0_f64.powf(1.0 / 6.0), 0.0, 0.0),
            ],
            None,
            false,
        );
        let results = lj.calculate(&structure, &[Property::Energy]).unwrap();
        assert!((results.energy.unwrap() - (-1.0)).abs() < 1e-9);
    }
}
