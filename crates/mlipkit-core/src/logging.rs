use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// How the session log destination is opened.
///
/// A command opens its log in `Write` mode when the session is built; a later
/// phase of the same command (the optimization run) reopens it in `Append`
/// mode so one invocation produces one continuous log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Write,
    Append,
}

/// Destination and mode for a session log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSpec {
    pub path: PathBuf,
    pub mode: LogMode,
}

impl LogSpec {
    pub fn write(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: LogMode::Write,
        }
    }

    pub fn append(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: LogMode::Append,
        }
    }
}

/// The per-command log file: the data-plane record of what a session did,
/// distinct from the process-level tracing diagnostics.
#[derive(Debug)]
pub struct SessionLog {
    writer: BufWriter<File>,
}

impl SessionLog {
    pub fn open(spec: &LogSpec) -> io::Result<Self> {
        // Write mode truncates and then reopens in append mode, so a handle
        // kept from session construction still lands at the end of the file
        // after the optimizer has appended through a second handle.
        if spec.mode == LogMode::Write {
            File::create(&spec.path)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&spec.path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Writes one timestamped record and flushes it, so records from the
    /// write and append phases of a command interleave in file order.
    pub fn record(&mut self, message: &str) -> io::Result<()> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        writeln!(self.writer, "[{:.3}] {}", stamp, message)?;
        self.writer.flush()
    }
}

/// Opens a log only when a destination was configured.
pub fn open_optional(spec: Option<&LogSpec>) -> io::Result<Option<SessionLog>> {
    spec.map(SessionLog::open).transpose()
}
