use nalgebra::Vector3;

const N_MIN: u32 = 5;
const F_INC: f64 = 1.1;
const F_DEC: f64 = 0.5;
const A_START: f64 = 0.1;
const F_A: f64 = 0.99;

/// Tunable FIRE parameters, decoded from the optimizer kwargs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireParams {
    /// Largest allowed displacement norm per step (Å).
    pub maxstep: f64,
    /// Initial timestep.
    pub dt: f64,
    /// Upper bound the adaptive timestep may grow to.
    pub dt_max: f64,
}

impl Default for FireParams {
    fn default() -> Self {
        Self {
            maxstep: 0.2,
            dt: 0.1,
            dt_max: 1.0,
        }
    }
}

/// The FIRE (Fast Inertial Relaxation Engine) integrator state.
///
/// Operates on an abstract set of force/displacement rows; the caller decides
/// what a row means (an atom, or a cell degree of freedom).
pub struct Fire {
    params: FireParams,
    velocities: Vec<Vector3<f64>>,
    dt: f64,
    alpha: f64,
    steps_since_reset: u32,
}

impl Fire {
    pub fn new(rows: usize, params: FireParams) -> Self {
        Self {
            params,
            velocities: vec![Vector3::zeros(); rows],
            dt: params.dt,
            alpha: A_START,
            steps_since_reset: 0,
        }
    }

    /// Advances one step and returns the displacement per row.
    pub fn step(&mut self, forces: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        debug_assert_eq!(forces.len(), self.velocities.len());

        let power: f64 = forces
            .iter()
            .zip(&self.velocities)
            .map(|(f, v)| f.dot(v))
            .sum();

        if power > 0.0 {
            let v_norm: f64 = self.velocities.iter().map(|v| v.norm_squared()).sum::<f64>().sqrt();
            let f_norm: f64 = forces.iter().map(|f| f.norm_squared()).sum::<f64>().sqrt();
            if f_norm > 1e-30 {
                for (v, f) in self.velocities.iter_mut().zip(forces) {
                    *v = (1.0 - self.alpha) * *v + self.alpha * v_norm * f / f_norm;
                }
            }
            if self.steps_since_reset > N_MIN {
                self.dt = (self.dt * F_INC).min(self.params.dt_max);
                self.alpha *= F_A;
            }
            self.steps_since_reset += 1;
        } else {
            for v in &mut self.velocities {
                *v = Vector3::zeros();
            }
            self.alpha = A_START;
            self.dt *= F_DEC;
            self.steps_since_reset = 0;
        }

        for (v, f) in self.velocities.iter_mut().zip(forces) {
            *v += self.dt * f;
        }

        let mut displacements: Vec<Vector3<f64>> =
            self.velocities.iter().map(|v| self.dt * v).collect();
        let norm: f64 = displacements
            .iter()
            .map(|d| d.norm_squared())
            .sum::<f64>()
            .sqrt();
        if norm > self.params.maxstep {
            let scale = self.params.maxstep / norm;
            for d in &mut displacements {
                *d *= scale;
            }
        }
        displacements
    }
}
