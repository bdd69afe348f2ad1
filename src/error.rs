//! Error types. The core only ever surfaces [`LftError`]; file, loader and
//! configuration problems have their own enums so the binary can tell them
//! apart.

use std::error::Error;
use std::path::PathBuf;

use thiserror::Error;

/// Catch-all error for the binary, as returned from `main`.
pub type DynError = Box<dyn Error + Send + Sync>;

/// Failures raised while assembling a long Fourier transform. Any of these
/// aborts the whole assembly; no partial transform is ever returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LftError {
    /// Empty input, zero-length buffers, mismatched segment metadata or a
    /// segment placed outside the long time series.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A buffer could not be allocated, or the requested buffer exceeds the
    /// configured sample limit.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// A transform plan could not be built or could not be executed.
    #[error("computation error: {0}")]
    Computation(String),
}

/// Errors reading or writing SFT files.
#[derive(Error, Debug)]
pub enum SftIoError {
    #[error("{path}: unsupported SFT version marker {version}")]
    BadVersion { path: PathBuf, version: f64 },

    #[error("{path}: truncated SFT block at byte {offset}")]
    Truncated { path: PathBuf, offset: u64 },

    #[error("{path}: invalid SFT header: {reason}")]
    BadHeader { path: PathBuf, reason: String },

    #[error("cannot write SFT: {0}")]
    Unwritable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors while discovering and loading the input SFTs.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("No matching SFTs for pattern '{0}'")]
    NoMatches(String),

    #[error("No SFTs left after applying the time constraints [{min_start}, {max_end})")]
    NothingInTimeRange { min_start: i64, max_end: i64 },

    #[error("Frequency band [{fmin}, {fmax}] Hz does not overlap the SFT band [{f0}, {f1}) Hz")]
    EmptyBand { fmin: f64, fmax: f64, f0: f64, f1: f64 },

    #[error("Invalid frequency band: fmin {fmin} Hz is above fmax {fmax} Hz")]
    InvertedBand { fmin: f64, fmax: f64 },

    #[error(transparent)]
    Glob(#[from] glob::GlobError),

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Sft(#[from] SftIoError),
}

/// Errors parsing a `key = value` configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{path}: line {line}: cannot parse value '{value}' for '{key}'")]
    BadValue {
        path: PathBuf,
        line: usize,
        key: String,
        value: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
