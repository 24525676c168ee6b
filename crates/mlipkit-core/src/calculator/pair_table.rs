use super::pairwise::{self, PairWell};
use super::{Calculator, CalculatorError, param_str, require_cpu};
use crate::core::kwargs::Kwargs;
use crate::core::models::properties::{CalcResults, Property};
use crate::core::models::structure::Structure;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable naming the directory logical model names resolve in.
pub const MODEL_DIR_ENV: &str = "MLIPKIT_MODEL_DIR";

#[derive(Debug, Deserialize)]
struct ModelFile {
    #[allow(dead_code)]
    name: Option<String>,
    cutoff: f64,
    #[serde(default)]
    pairs: Vec<PairEntry>,
}

#[derive(Debug, Deserialize)]
struct PairEntry {
    species: [String; 2],
    sigma: f64,
    epsilon: f64,
}

/// Tabulated pair-potential backend.
///
/// Parameters per species pair come from a TOML model file; the `model`
/// option is either a filesystem path or a logical name resolved inside the
/// directory named by `MLIPKIT_MODEL_DIR`.
#[derive(Debug)]
pub struct PairTable {
    cutoff: f64,
    wells: HashMap<(String, String), PairWell>,
}

impl PairTable {
    pub fn from_params(device: &str, params: &Kwargs) -> Result<Self, CalculatorError> {
        require_cpu("table", device)?;

        for key in params.keys() {
            if key != "model" {
                return Err(CalculatorError::UnsupportedParam(key.clone()));
            }
        }
        let model = param_str(params, "model")?.unwrap_or("small");
        let path = resolve_model(model)?;
        Self::load(model, &path)
    }

    fn load(model: &str, path: &Path) -> Result<Self, CalculatorError> {
        let content = std::fs::read_to_string(path).map_err(|e| CalculatorError::ModelLoad {
            name: model.to_string(),
            message: format!("{}: {}", path.display(), e),
        })?;
        let file: ModelFile = toml::from_str(&content).map_err(|e| CalculatorError::ModelLoad {
            name: model.to_string(),
            message: e.to_string(),
        })?;
        if file.cutoff <= 0.0 {
            return Err(CalculatorError::ModelLoad {
                name: model.to_string(),
                message: "cutoff must be positive".to_string(),
            });
        }

        let mut wells = HashMap::new();
        for entry in file.pairs {
            let [a, b] = entry.species;
            wells.insert(
                pair_key(&a, &b),
                PairWell {
                    sigma: entry.sigma,
                    epsilon: entry.epsilon,
                },
            );
        }
        Ok(Self {
            cutoff: file.cutoff,
            wells,
        })
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Resolves a `model` option to a file path.
///
/// Anything that looks like a path is used as-is; bare names are looked up as
/// `<MLIPKIT_MODEL_DIR>/<name>.toml`.
fn resolve_model(model: &str) -> Result<PathBuf, CalculatorError> {
    let as_path = Path::new(model);
    if as_path.is_absolute() || model.contains(['/', '\\']) {
        if !as_path.exists() {
            return Err(CalculatorError::ModelLoad {
                name: model.to_string(),
                message: "model file does not exist".to_string(),
            });
        }
        return Ok(as_path.to_path_buf());
    }

    let dir = std::env::var_os(MODEL_DIR_ENV).ok_or_else(|| CalculatorError::ModelLoad {
        name: model.to_string(),
        message: format!(
            "cannot resolve logical model name.\nHint: set {} to the directory containing your model files.",
            MODEL_DIR_ENV
        ),
    })?;
    let resolved = PathBuf::from(dir).join(format!("{}.toml", model));
    if !resolved.exists() {
        return Err(CalculatorError::ModelLoad {
            name: model.to_string(),
            message: format!("no such model file: {}", resolved.display()),
        });
    }
    Ok(resolved)
}

impl Calculator for PairTable {
    fn name(&self) -> &'static str {
        "table"
    }

    fn calculate(
        &self,
        structure: &Structure,
        properties: &[Property],
    ) -> Result<CalcResults, CalculatorError> {
        pairwise::evaluate(structure, properties, self.cutoff, &|a, b| {
            self.wells
                .get(&pair_key(a, b))
                .copied()
                .ok_or_else(|| {
                    let (a, b) = pair_key(a, b);
                    CalculatorError::MissingPairParameters { a, b }
                })
        })
    }
}
