use mlipkit::calculator::CalculatorError;
use mlipkit::core::io::xyz::XyzError;
use mlipkit::optimize::OptimizeError;
use mlipkit::workflows::single_point::SessionError;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

/// The user-facing error taxonomy: configuration mistakes are separated from
/// structure-load failures and from backend failures, since only the first
/// kind is fixable by editing the command line.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load structure from '{path}': {source}", path = path.display())]
    StructureLoad {
        path: PathBuf,
        #[source]
        source: XyzError,
    },

    #[error("Calculation failed: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Maps a session-construction or evaluation failure onto the taxonomy.
    ///
    /// Option-decoding mistakes in read kwargs surface as configuration
    /// errors; anything wrong with the file itself keeps the structure path
    /// for context.
    pub fn from_session(err: SessionError, structure_path: &Path) -> Self {
        match err {
            SessionError::Structure(source) => match source {
                XyzError::UnsupportedOption(_)
                | XyzError::InvalidOption { .. }
                | XyzError::UnsupportedFormat(_) => CliError::Config(source.to_string()),
                other => CliError::StructureLoad {
                    path: structure_path.to_path_buf(),
                    source: other,
                },
            },
            SessionError::Calculator(source) => CliError::from(source),
            other => CliError::Other(anyhow::Error::new(other)),
        }
    }
}

impl From<CalculatorError> for CliError {
    fn from(err: CalculatorError) -> Self {
        match err {
            CalculatorError::UnknownArchitecture(_)
            | CalculatorError::UnsupportedParam(_)
            | CalculatorError::InvalidParam { .. } => CliError::Config(err.to_string()),
            // A device the backend cannot serve is the backend's verdict,
            // surfaced unchanged rather than reclassified.
            other => CliError::Backend(other.to_string()),
        }
    }
}

impl From<OptimizeError> for CliError {
    fn from(err: OptimizeError) -> Self {
        match err {
            OptimizeError::MissingCell
            | OptimizeError::UnsupportedOption(_)
            | OptimizeError::InvalidOption { .. } => CliError::Config(err.to_string()),
            OptimizeError::Calculator(source) => CliError::from(source),
            OptimizeError::Log(source) => CliError::Io(source),
            other => CliError::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_architecture_is_a_configuration_error() {
        let err = CliError::from(CalculatorError::UnknownArchitecture("mace".to_string()));
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn unavailable_device_is_a_backend_error() {
        let err = CliError::from(CalculatorError::UnsupportedDevice {
            arch: "lj",
            device: "cuda".to_string(),
        });
        match err {
            CliError::Backend(message) => assert!(message.contains("cuda")),
            other => panic!("expected Backend, got {other:?}"),
        }
    }

    #[test]
    fn unknown_read_option_is_a_configuration_error() {
        let err = CliError::from_session(
            SessionError::Structure(XyzError::UnsupportedOption("frames".to_string())),
            Path::new("a.xyz"),
        );
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn missing_structure_file_keeps_its_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = CliError::from_session(
            SessionError::Structure(XyzError::Read {
                path: PathBuf::from("missing.xyz"),
                source: io,
            }),
            Path::new("missing.xyz"),
        );
        match err {
            CliError::StructureLoad { path, .. } => {
                assert_eq!(path, PathBuf::from("missing.xyz"));
            }
            other => panic!("expected StructureLoad, got {other:?}"),
        }
    }

    #[test]
    fn cell_filter_without_cell_is_a_configuration_error() {
        let err = CliError::from(OptimizeError::MissingCell);
        assert!(matches!(err, CliError::Config(_)));
    }
}
