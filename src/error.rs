use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error conditions that may occur while converting a session.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A required key path was absent from the session header file.
    #[error("Missing header field: {0}")]
    MissingHeaderField(&'static str),

    /// The session header file could not be parsed as XML.
    #[error("Malformed header file: {0}")]
    MalformedHeader(String),

    /// A header field was present but could not be parsed as a number.
    #[error("Invalid value for header field {field}: '{value}'")]
    InvalidHeaderValue { field: &'static str, value: String },

    /// The raw binary sample file does not exist. Some sessions legitimately
    /// have no raw data; callers that expect this branch on existence first.
    #[error("Raw sample file not found: {}", .0.display())]
    MissingRawFile(PathBuf),

    /// The raw file's byte length is not a whole number of sample frames.
    #[error("Raw file {} is {length} bytes, not a multiple of {frame_bytes} bytes per frame", .path.display())]
    RawFileSize {
        path: PathBuf,
        length: u64,
        frame_bytes: usize,
    },

    /// An auxiliary per-channel metadata array was present but its length
    /// did not match the resolved channel count.
    #[error("Auxiliary {name} array has {got} entries, expected {expected}")]
    AuxArrayLength {
        name: &'static str,
        got: usize,
        expected: usize,
    },

    /// An explicit electrode row index referred past the registered table.
    #[error("Electrode row index {index} out of range ({rows} rows registered)")]
    ElectrodeIndexOutOfRange { index: usize, rows: usize },

    /// A series was written before the electrode table was registered.
    #[error("Electrode table must be written before any series")]
    ElectrodeTableMissing,

    /// A section was written after the container was finalized.
    #[error("Container is already finalized")]
    ContainerFinalized,

    /// The requested band name is not one of the canonical bands.
    #[error("Unknown frequency band: '{0}'")]
    UnknownBand(String),

    /// The passband cutoffs are unusable for the given sampling rate.
    #[error("Invalid passband {low}-{high} Hz at {rate} Hz sampling rate")]
    InvalidPassband { low: f64, high: f64, rate: f64 },

    /// Only the Butterworth filter kind is implemented.
    #[error("Unsupported filter kind: {0}")]
    UnsupportedFilterKind(&'static str),

    /// An event file line did not match the `time<TAB>label` layout.
    #[error("Malformed event line {line} in {}", .path.display())]
    MalformedEventLine { path: PathBuf, line: usize },

    /// A spike-time or cluster file contained a non-numeric row.
    #[error("Malformed value at line {line} in {}", .path.display())]
    MalformedClusterFile { path: PathBuf, line: usize },

    /// An I/O error occurred during file reading or writing.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
