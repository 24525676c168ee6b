use nalgebra::{Matrix3, Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum StructureError {
    #[error("structure has no cell; the operation requires a periodic structure")]
    MissingCell,
    #[error("cell is singular (zero volume)")]
    SingularCell,
}

/// An atomistic structure: chemical symbols, Cartesian positions, and an
/// optional periodic cell.
///
/// The cell is stored row-wise: rows of the matrix are the lattice vectors
/// a, b, c in Ångström. Positions are always Cartesian, also in Ångström.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub symbols: Vec<String>,
    pub positions: Vec<Point3<f64>>,
    pub cell: Option<Matrix3<f64>>,
    pub pbc: bool,
}

impl Structure {
    pub fn new(
        symbols: Vec<String>,
        positions: Vec<Point3<f64>>,
        cell: Option<Matrix3<f64>>,
        pbc: bool,
    ) -> Self {
        debug_assert_eq!(symbols.len(), positions.len());
        Self {
            symbols,
            positions,
            cell,
            pbc,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Whether minimum-image conventions apply to interatomic distances.
    pub fn is_periodic(&self) -> bool {
        self.pbc && self.cell.is_some()
    }

    pub fn volume(&self) -> Result<f64, StructureError> {
        let cell = self.cell.ok_or(StructureError::MissingCell)?;
        let volume = cell.determinant().abs();
        if volume < 1e-12 {
            return Err(StructureError::SingularCell);
        }
        Ok(volume)
    }

    /// Displacement from atom `j` to atom `i`, wrapped by the minimum-image
    /// convention when the structure is periodic.
    ///
    /// Valid for interaction cutoffs below half the smallest cell extent.
    pub fn displacement(&self, i: usize, j: usize) -> Vector3<f64> {
        let raw = self.positions[i] - self.positions[j];
        match (self.is_periodic(), self.cell) {
            (true, Some(cell)) => {
                // Rows are lattice vectors, so fractional coords solve s * C = r.
                match cell.transpose().try_inverse() {
                    Some(inv) => {
                        let mut s = inv * raw;
                        for k in 0..3 {
                            s[k] -= s[k].round();
                        }
                        cell.transpose() * s
                    }
                    None => raw,
                }
            }
            _ => raw,
        }
    }

    /// Applies an affine deformation `(I + strain)` to the cell and scales
    /// all atomic positions with it. Requires a cell.
    pub fn apply_strain(&mut self, strain: &Matrix3<f64>) -> Result<(), StructureError> {
        let cell = self.cell.ok_or(StructureError::MissingCell)?;
        let deform = Matrix3::identity() + strain;
        // Row-vector convention: each lattice vector v maps to v * (I + e)^T.
        self.cell = Some(cell * deform.transpose());
        for pos in &mut self.positions {
            let mapped = deform * pos.coords;
            *pos = Point3::from(mapped);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(a: f64) -> Matrix3<f64> {
        Matrix3::from_diagonal(&Vector3::new(a, a, a))
    }

    fn two_atoms(cell: Option<Matrix3<f64>>, pbc: bool, second: [f64; 3]) -> Structure {
        Structure::new(
            vec!["Ar".to_string(), "Ar".to_string()],
            vec![Point3::origin(), Point3::new(second[0], second[1], second[2])],
            cell,
            pbc,
        )
    }

    #[test]
    fn volume_of_cubic_cell() {
        let s = two_atoms(Some(cubic(4.0)), true, [1.0, 0.0, 0.0]);
        assert!((s.volume().unwrap() - 64.0).abs() < 1e-12);
    }

    #[test]
    fn volume_without_cell_is_an_error() {
        let s = two_atoms(None, false, [1.0, 0.0, 0.0]);
        assert_eq!(s.volume(), Err(StructureError::MissingCell));
    }

    #[test]
    fn displacement_wraps_across_the_periodic_boundary() {
        let s = two_atoms(Some(cubic(10.0)), true, [9.0, 0.0, 0.0]);
        let d = s.displacement(1, 0);
        assert!((d.x - (-1.0)).abs() < 1e-12);
        assert!(d.y.abs() < 1e-12 && d.z.abs() < 1e-12);
    }

    #[test]
    fn displacement_is_raw_for_aperiodic_structures() {
        let s = two_atoms(None, false, [9.0, 0.0, 0.0]);
        assert!((s.displacement(1, 0).x - 9.0).abs() < 1e-12);
    }

    #[test]
    fn isotropic_strain_scales_cell_and_positions() {
        let mut s = two_atoms(Some(cubic(4.0)), true, [2.0, 0.0, 0.0]);
        let strain = Matrix3::from_diagonal(&Vector3::new(0.1, 0.1, 0.1));
        s.apply_strain(&strain).unwrap();
        assert!((s.cell.unwrap()[(0, 0)] - 4.4).abs() < 1e-12);
        assert!((s.positions[1].x - 2.2).abs() < 1e-12);
    }
}
