//! Post-processing of recorded trajectories.

use crate::core::models::structure::{Structure, StructureError};
use nalgebra::Vector3;
use std::f64::consts::PI;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no frames to analyse")]
    EmptyTrajectory,

    #[error("r_max and n_bins must be positive, got r_max={r_max} n_bins={n_bins}")]
    InvalidRange { r_max: f64, n_bins: usize },

    #[error(
        "r_max {r_max} exceeds half the smallest cell height ({limit:.4}); \
         minimum-image distances are ambiguous beyond that"
    )]
    RangeExceedsCell { r_max: f64, limit: f64 },

    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error("failed to write '{path}': {source}", path = path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How to bin a radial distribution function.
///
/// `elements`, when set, restricts the histogram to pairs whose symbols are
/// both in the list. A two-element list therefore includes the self pairs of
/// each species alongside the mixed pair.
#[derive(Debug, Clone, PartialEq)]
pub struct RdfOptions {
    pub r_max: f64,
    pub n_bins: usize,
    pub elements: Option<Vec<String>>,
}

impl Default for RdfOptions {
    fn default() -> Self {
        Self {
            r_max: 2.5,
            n_bins: 50,
            elements: None,
        }
    }
}

/// A radial distribution function: bin-center distances and g(r) values.
#[derive(Debug, Clone, PartialEq)]
pub struct Rdf {
    pub distances: Vec<f64>,
    pub values: Vec<f64>,
}

impl Rdf {
    /// Writes one `distance value` line per bin.
    pub fn write_to(&self, path: &Path) -> Result<(), AnalysisError> {
        let write_err = |source| AnalysisError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut file = std::fs::File::create(path).map_err(write_err)?;
        for (distance, value) in self.distances.iter().zip(&self.values) {
            writeln!(file, "{} {}", distance, value).map_err(write_err)?;
        }
        Ok(())
    }
}

/// Computes g(r) averaged over a sequence of frames.
///
/// Periodic frames use minimum-image distances and are normalized by the cell
/// volume. Aperiodic frames have no natural density, so the volume of a cube
/// enclosing the `r_max` sphere stands in for it.
pub fn compute_rdf(frames: &[Structure], options: &RdfOptions) -> Result<Rdf, AnalysisError> {
    if frames.is_empty() {
        return Err(AnalysisError::EmptyTrajectory);
    }
    if options.r_max <= 0.0 || options.n_bins == 0 {
        return Err(AnalysisError::InvalidRange {
            r_max: options.r_max,
            n_bins: options.n_bins,
        });
    }

    let bin_width = options.r_max / options.n_bins as f64;
    let mut values = vec![0.0; options.n_bins];

    for frame in frames {
        let volume = if frame.is_periodic() {
            let limit = min_cell_height(frame)? / 2.0;
            if options.r_max > limit {
                return Err(AnalysisError::RangeExceedsCell {
                    r_max: options.r_max,
                    limit,
                });
            }
            frame.volume()?
        } else {
            (2.0 * options.r_max).powi(3)
        };

        let selected: Vec<usize> = (0..frame.len())
            .filter(|&i| match &options.elements {
                Some(elements) => elements.iter().any(|e| *e == frame.symbols[i]),
                None => true,
            })
            .collect();
        if selected.len() < 2 {
            continue;
        }

        let mut counts = vec![0u64; options.n_bins];
        for (a, &i) in selected.iter().enumerate() {
            for &j in &selected[a + 1..] {
                let distance = frame.displacement(i, j).norm();
                if distance < options.r_max {
                    let bin = ((distance / bin_width) as usize).min(options.n_bins - 1);
                    counts[bin] += 2;
                }
            }
        }

        let n = selected.len() as f64;
        for (bin, &count) in counts.iter().enumerate() {
            let r = (bin as f64 + 0.5) * bin_width;
            let shell = 4.0 * PI * r * r * bin_width;
            values[bin] += count as f64 * volume / (n * n * shell);
        }
    }

    for value in &mut values {
        *value /= frames.len() as f64;
    }
    let distances = (0..options.n_bins)
        .map(|bin| (bin as f64 + 0.5) * bin_width)
        .collect();
    Ok(Rdf { distances, values })
}

/// Smallest perpendicular height of the cell, V / max(face area).
fn min_cell_height(frame: &Structure) -> Result<f64, AnalysisError> {
    let cell = frame.cell.ok_or(StructureError::MissingCell)?;
    let volume = frame.volume()?;
    let rows: [Vector3<f64>; 3] = [
        cell.row(0).transpose(),
        cell.row(1).transpose(),
        cell.row(2).transpose(),
    ];
    let max_area = rows[1]
        .cross(&rows[2])
        .norm()
        .max(rows[2].cross(&rows[0]).norm())
        .max(rows[0].cross(&rows[1]).norm());
    Ok(volume / max_area)
}
