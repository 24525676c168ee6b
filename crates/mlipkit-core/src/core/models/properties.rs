use nalgebra::Vector3;

/// A physical property a calculator can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Energy,
    Forces,
    Stress,
}

impl Property {
    /// The default request when the caller names no properties.
    pub const DEFAULT: [Property; 3] = [Property::Energy, Property::Forces, Property::Stress];

    pub fn name(&self) -> &'static str {
        match self {
            Property::Energy => "energy",
            Property::Forces => "forces",
            Property::Stress => "stress",
        }
    }
}

/// Results of one calculator evaluation.
///
/// Energy in eV, forces in eV/Å, stress in eV/Å³ as the Voigt vector
/// (xx, yy, zz, yz, xz, xy). Fields are present only when requested and
/// supported for the structure at hand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalcResults {
    pub energy: Option<f64>,
    pub forces: Option<Vec<Vector3<f64>>>,
    pub stress: Option<[f64; 6]>,
}

impl CalcResults {
    /// Largest per-atom force norm, if forces are present.
    pub fn max_force(&self) -> Option<f64> {
        self.forces
            .as_ref()
            .map(|forces| forces.iter().map(|f| f.norm()).fold(0.0, f64::max))
    }
}
