use crate::error::{CliError, Result};
use mlipkit::core::io::xyz::{WriteOptions, XyzError};
use mlipkit::core::kwargs::Kwargs;
use mlipkit::logging::LogSpec;
use mlipkit::workflows::single_point::SessionSpec;
use std::path::{Path, PathBuf};

/// Assembles the session spec shared by both commands. The session log is
/// always opened in write mode here; the optimizer later reopens it in
/// append mode so one invocation produces one continuous log file.
pub fn build_spec(
    struct_path: &Path,
    arch: &str,
    device: &str,
    read_kwargs: Kwargs,
    calc_kwargs: Kwargs,
    log: &Path,
) -> SessionSpec {
    SessionSpec {
        structure_path: struct_path.to_path_buf(),
        architecture: arch.to_string(),
        device: device.to_string(),
        read_params: read_kwargs,
        calc_params: calc_kwargs,
        log: LogSpec::write(log),
    }
}

/// Resolves where results are written: an explicit `filename` in the write
/// kwargs wins, otherwise `<stem>-<suffix>.extxyz` next to the input.
pub fn resolve_output(struct_path: &Path, write_kwargs: &Kwargs, suffix: &str) -> Result<PathBuf> {
    let options = WriteOptions::from_kwargs(write_kwargs).map_err(|err| match err {
        XyzError::UnsupportedOption(_)
        | XyzError::InvalidOption { .. }
        | XyzError::UnsupportedFormat(_) => CliError::Config(err.to_string()),
        other => CliError::Backend(other.to_string()),
    })?;

    if let Some(filename) = options.filename {
        return Ok(filename);
    }

    let stem = struct_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            CliError::Config(format!(
                "cannot derive an output filename from '{}'",
                struct_path.display()
            ))
        })?;
    Ok(struct_path.with_file_name(format!("{}-{}.extxyz", stem, suffix)))
}
