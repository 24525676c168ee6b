use crate::core::kwargs::Kwargs;
use crate::core::models::properties::CalcResults;
use crate::core::models::structure::Structure;
use nalgebra::{Matrix3, Point3};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("failed to read structure file '{path}': {source}", path = path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write structure file '{path}': {source}", path = path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed structure file '{path}' at line {line}: {message}", path = path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error(
        "frame index {index} is out of range for '{path}' ({frames} frame(s))",
        path = path.display()
    )]
    FrameIndex {
        path: PathBuf,
        index: isize,
        frames: usize,
    },

    #[error("unsupported read/write option '{0}'")]
    UnsupportedOption(String),

    #[error("option '{key}' must be {expected}, got {got}")]
    InvalidOption {
        key: &'static str,
        expected: &'static str,
        got: String,
    },

    #[error("unsupported structure format '{0}' (only 'xyz'/'extxyz' is supported)")]
    UnsupportedFormat(String),
}

/// Typed form of the read-kwargs mapping forwarded to the structure loader.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    /// Frame to select from a multi-frame file, Python-style: negative counts
    /// from the end. The default `-1` selects the last frame.
    pub index: isize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { index: -1 }
    }
}

impl ReadOptions {
    pub fn from_kwargs(kwargs: &Kwargs) -> Result<Self, XyzError> {
        let mut options = Self::default();
        for (key, value) in kwargs {
            match key.as_str() {
                "index" => {
                    options.index = value.as_i64().ok_or_else(|| XyzError::InvalidOption {
                        key: "index",
                        expected: "an integer",
                        got: value.to_string(),
                    })? as isize;
                }
                "format" => {
                    let format = value.as_str().ok_or_else(|| XyzError::InvalidOption {
                        key: "format",
                        expected: "a string",
                        got: value.to_string(),
                    })?;
                    if format != "xyz" && format != "extxyz" {
                        return Err(XyzError::UnsupportedFormat(format.to_string()));
                    }
                }
                other => return Err(XyzError::UnsupportedOption(other.to_string())),
            }
        }
        Ok(options)
    }
}

/// Typed form of the write-kwargs mapping used when persisting results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOptions {
    /// Output destination; callers fall back to a path derived from the input
    /// structure when this is unset.
    pub filename: Option<PathBuf>,
}

impl WriteOptions {
    pub fn from_kwargs(kwargs: &Kwargs) -> Result<Self, XyzError> {
        let mut options = Self::default();
        for (key, value) in kwargs {
            match key.as_str() {
                "filename" => {
                    let name = value.as_str().ok_or_else(|| XyzError::InvalidOption {
                        key: "filename",
                        expected: "a string",
                        got: value.to_string(),
                    })?;
                    options.filename = Some(PathBuf::from(name));
                }
                "format" => {
                    let format = value.as_str().ok_or_else(|| XyzError::InvalidOption {
                        key: "format",
                        expected: "a string",
                        got: value.to_string(),
                    })?;
                    if format != "xyz" && format != "extxyz" {
                        return Err(XyzError::UnsupportedFormat(format.to_string()));
                    }
                }
                other => return Err(XyzError::UnsupportedOption(other.to_string())),
            }
        }
        Ok(options)
    }
}

/// Loads one frame of an (extended) XYZ file.
pub fn load(path: &Path, options: &ReadOptions) -> Result<Structure, XyzError> {
    let file = File::open(path).map_err(|source| XyzError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let frames = read_frames(&mut reader, path)?;

    let count = frames.len() as isize;
    let resolved = if options.index < 0 {
        count + options.index
    } else {
        options.index
    };
    if resolved < 0 || resolved >= count {
        return Err(XyzError::FrameIndex {
            path: path.to_path_buf(),
            index: options.index,
            frames: frames.len(),
        });
    }
    Ok(frames.into_iter().nth(resolved as usize).unwrap())
}

/// Loads every frame of an (extended) XYZ file, in file order.
pub fn load_all(path: &Path) -> Result<Vec<Structure>, XyzError> {
    let file = File::open(path).map_err(|source| XyzError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    read_frames(&mut reader, path)
}

/// Writes a single frame, truncating any existing file.
pub fn save(
    structure: &Structure,
    results: Option<&CalcResults>,
    path: &Path,
) -> Result<(), XyzError> {
    let file = File::create(path).map_err(|source| XyzError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    write_frame(&mut writer, structure, results).map_err(|source| XyzError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// An open multi-frame XYZ file that optimization trajectories append to.
pub struct XyzTrajectory {
    path: PathBuf,
    writer: BufWriter<File>,
    frames: usize,
}

impl XyzTrajectory {
    /// Creates (truncates) the trajectory file.
    pub fn create(path: &Path) -> Result<Self, XyzError> {
        let file = File::create(path).map_err(|source| XyzError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            frames: 0,
        })
    }

    pub fn record(
        &mut self,
        structure: &Structure,
        results: Option<&CalcResults>,
    ) -> Result<(), XyzError> {
        write_frame(&mut self.writer, structure, results)
            .and_then(|()| self.writer.flush())
            .map_err(|source| XyzError::Write {
                path: self.path.clone(),
                source,
            })?;
        self.frames += 1;
        Ok(())
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

fn read_frames(reader: &mut impl BufRead, path: &Path) -> Result<Vec<Structure>, XyzError> {
    let parse_error = |line: usize, message: String| XyzError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut lines = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| XyzError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        lines.push((number + 1, line));
    }

    let mut frames = Vec::new();
    let mut cursor = 0;
    while cursor < lines.len() {
        let (line_no, ref count_line) = lines[cursor];
        if count_line.trim().is_empty() {
            cursor += 1;
            continue;
        }
        let natoms: usize = count_line
            .trim()
            .parse()
            .map_err(|_| parse_error(line_no, format!("expected atom count, got '{}'", count_line.trim())))?;
        if cursor + 2 + natoms > lines.len() {
            return Err(parse_error(
                line_no,
                format!("frame declares {} atoms but the file ends early", natoms),
            ));
        }
        let (_, ref comment) = lines[cursor + 1];
        let (cell, pbc) = parse_comment(comment);

        let mut symbols = Vec::with_capacity(natoms);
        let mut positions = Vec::with_capacity(natoms);
        for offset in 0..natoms {
            let (atom_line_no, ref atom_line) = lines[cursor + 2 + offset];
            let fields: Vec<&str> = atom_line.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(parse_error(
                    atom_line_no,
                    "expected 'symbol x y z' columns".to_string(),
                ));
            }
            let coords: Result<Vec<f64>, _> =
                fields[1..4].iter().map(|f| f.parse::<f64>()).collect();
            let coords = coords.map_err(|_| {
                parse_error(atom_line_no, format!("invalid coordinates in '{}'", atom_line))
            })?;
            symbols.push(fields[0].to_string());
            positions.push(Point3::new(coords[0], coords[1], coords[2]));
        }

        frames.push(Structure::new(symbols, positions, cell, pbc));
        cursor += 2 + natoms;
    }

    if frames.is_empty() {
        return Err(parse_error(1, "file contains no frames".to_string()));
    }
    Ok(frames)
}

/// Parses the extended-XYZ comment line for `Lattice="..."` and `pbc="..."`.
///
/// Unknown keys are ignored on input so files written by other tools load
/// cleanly. A present lattice implies periodicity unless pbc says otherwise.
fn parse_comment(comment: &str) -> (Option<Matrix3<f64>>, bool) {
    let mut cell = None;
    let mut pbc = None;

    for (key, value) in comment_tokens(comment) {
        match key.to_ascii_lowercase().as_str() {
            "lattice" => {
                let numbers: Result<Vec<f64>, _> =
                    value.split_whitespace().map(|v| v.parse::<f64>()).collect();
                if let Ok(numbers) = numbers {
                    if numbers.len() == 9 {
                        cell = Some(Matrix3::from_iterator(numbers).transpose());
                    }
                }
            }
            "pbc" => {
                let flags: Vec<&str> = value.split_whitespace().collect();
                if !flags.is_empty() {
                    pbc = Some(flags.iter().all(|f| matches!(*f, "T" | "t" | "true" | "True")));
                }
            }
            _ => {}
        }
    }

    let pbc = pbc.unwrap_or(cell.is_some());
    (cell, pbc)
}

/// Splits `key=value` tokens, honoring double quotes around values.
fn comment_tokens(comment: &str) -> Vec<(String, String)> {
    let mut tokens = Vec::new();
    let mut chars = comment.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c.is_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }
        if chars.peek() == Some(&'=') {
            chars.next();
            let mut value = String::new();
            if chars.peek() == Some(&'"') {
                chars.next();
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    value.push(c);
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
            }
            tokens.push((key, value));
        }
    }
    tokens
}

fn write_frame(
    writer: &mut impl Write,
    structure: &Structure,
    results: Option<&CalcResults>,
) -> io::Result<()> {
    writeln!(writer, "{}", structure.len())?;

    let mut comment = String::new();
    if let Some(cell) = structure.cell {
        let mut parts = Vec::with_capacity(9);
        for row in 0..3 {
            for col in 0..3 {
                parts.push(format!("{}", cell[(row, col)]));
            }
        }
        comment.push_str(&format!("Lattice=\"{}\" ", parts.join(" ")));
        let flag = if structure.pbc { "T T T" } else { "F F F" };
        comment.push_str(&format!("pbc=\"{}\" ", flag));
    }

    let with_forces = results.and_then(|r| r.forces.as_ref()).is_some();
    if with_forces {
        comment.push_str("Properties=species:S:1:pos:R:3:forces:R:3");
    } else {
        comment.push_str("Properties=species:S:1:pos:R:3");
    }
    if let Some(energy) = results.and_then(|r| r.energy) {
        comment.push_str(&format!(" energy={:.8}", energy));
    }
    if let Some(stress) = results.and_then(|r| r.stress) {
        let rendered: Vec<String> = stress.iter().map(|s| format!("{:.8}", s)).collect();
        comment.push_str(&format!(" stress=\"{}\"", rendered.join(" ")));
    }
    writeln!(writer, "{}", comment)?;

    let forces = results.and_then(|r| r.forces.as_ref());
    for (i, (symbol, pos)) in structure.symbols.iter().zip(&structure.positions).enumerate() {
        if let Some(forces) = forces {
            let f = forces[i];
            writeln!(
                writer,
                "{} {:.8} {:.8} {:.8} {:.8} {:.8} {:.8}",
                symbol, pos.x, pos.y, pos.z, f.x, f.y, f.z
            )?;
        } else {
            writeln!(writer, "{} {:.8} {:.8} {:.8}", symbol, pos.x, pos.y, pos.z)?;
        }
    }
    Ok(())
}
