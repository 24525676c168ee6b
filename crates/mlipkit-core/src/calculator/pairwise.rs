use super::CalculatorError;
use crate::core::models::properties::{CalcResults, Property};
use crate::core::models::structure::Structure;
use nalgebra::{Matrix3, Vector3};

/// Lennard-Jones well for one species pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PairWell {
    pub sigma: f64,
    pub epsilon: f64,
}

impl PairWell {
    /// Energy and its distance derivative, shifted so u(cutoff) = 0.
    fn energy_and_derivative(&self, r: f64, cutoff: f64) -> (f64, f64) {
        let u = |r: f64| {
            let s6 = (self.sigma / r).powi(6);
            4.0 * self.epsilon * (s6 * s6 - s6)
        };
        let s6 = (self.sigma / r).powi(6);
        let du = 4.0 * self.epsilon * (-12.0 * s6 * s6 + 6.0 * s6) / r;
        (u(r) - u(cutoff), du)
    }
}

/// Evaluates a shifted pairwise potential over a structure.
///
/// Periodic structures are summed over all lattice images within the cutoff;
/// aperiodic structures over plain atom pairs. Stress is the Voigt virial
/// stress and requires a periodic cell.
pub(crate) fn evaluate(
    structure: &Structure,
    properties: &[Property],
    cutoff: f64,
    lookup: &dyn Fn(&str, &str) -> Result<PairWell, CalculatorError>,
) -> Result<CalcResults, CalculatorError> {
    let want_energy = properties.contains(&Property::Energy);
    let want_forces = properties.contains(&Property::Forces);
    let want_stress = properties.contains(&Property::Stress);

    if want_stress && !structure.is_periodic() {
        return Err(CalculatorError::StressRequiresCell);
    }

    let n = structure.len();
    let mut energy = 0.0;
    let mut forces = vec![Vector3::zeros(); n];
    let mut virial = Matrix3::zeros();

    let shifts = image_shifts(structure, cutoff);

    let mut accumulate = |i: usize,
                          j: usize,
                          d: Vector3<f64>,
                          weight: f64,
                          with_forces: bool|
     -> Result<(), CalculatorError> {
        let r = d.norm();
        if r < 1e-10 || r > cutoff {
            return Ok(());
        }
        let well = lookup(&structure.symbols[i], &structure.symbols[j])?;
        let (u, du) = well.energy_and_derivative(r, cutoff);
        energy += weight * u;
        let unit = d / r;
        if with_forces {
            forces[i] -= du * unit;
            forces[j] += du * unit;
        }
        virial += weight * du * (d * d.transpose()) / r;
        Ok(())
    };

    for i in 0..n {
        for j in i..n {
            for shift in &shifts {
                if i == j {
                    // Self-images: each pair appears under both +S and -S, and
                    // the force contributions cancel exactly.
                    if shift.norm() < 1e-10 {
                        continue;
                    }
                    let d = *shift;
                    accumulate(i, j, d, 0.5, false)?;
                } else {
                    let d = structure.positions[i] - structure.positions[j] + shift;
                    accumulate(i, j, d, 1.0, true)?;
                }
            }
        }
    }

    let mut results = CalcResults::default();
    if want_energy {
        results.energy = Some(energy);
    }
    if want_forces {
        results.forces = Some(forces);
    }
    if want_stress {
        let volume = structure
            .volume()
            .map_err(|_| CalculatorError::StressRequiresCell)?;
        let stress = virial / volume;
        results.stress = Some([
            stress[(0, 0)],
            stress[(1, 1)],
            stress[(2, 2)],
            stress[(1, 2)],
            stress[(0, 2)],
            stress[(0, 1)],
        ]);
    }
    Ok(results)
}

/// Cartesian lattice translations whose images can fall within the cutoff.
///
/// The zero shift is always included; aperiodic structures get only that.
fn image_shifts(structure: &Structure, cutoff: f64) -> Vec<Vector3<f64>> {
    let cell = match (structure.is_periodic(), structure.cell) {
        (true, Some(cell)) => cell,
        _ => return vec![Vector3::zeros()],
    };
    let volume = cell.determinant().abs();
    if volume < 1e-12 {
        return vec![Vector3::zeros()];
    }

    let rows: [Vector3<f64>; 3] = [
        cell.row(0).transpose(),
        cell.row(1).transpose(),
        cell.row(2).transpose(),
    ];
    // Perpendicular extent of the cell along each lattice direction.
    let heights = [
        volume / rows[1].cross(&rows[2]).norm(),
        volume / rows[2].cross(&rows[0]).norm(),
        volume / rows[0].cross(&rows[1]).norm(),
    ];
    let reps: Vec<i64> = heights
        .iter()
        .map(|h| (cutoff / h).ceil() as i64)
        .collect();

    let mut shifts = Vec::new();
    for a in -reps[0]..=reps[0] {
        for b in -reps[1]..=reps[1] {
            for c in -reps[2]..=reps[2] {
                shifts.push(a as f64 * rows[0] + b as f64 * rows[1] + c as f64 * rows[2]);
            }
        }
    }
    shifts
}
