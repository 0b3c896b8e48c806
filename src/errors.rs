//! Custom error types for coordinate processing

use std::fmt;
use std::io;

/// Coordinate-specific error types
#[derive(Debug)]
pub enum CoordError {
    /// I/O error
    IoError(io::Error),
    /// Invalid altitude file magic number
    BadMagic(u64),
    /// Unsupported altitude file version
    UnsupportedVersion(u16),
    /// Unknown or unregistered geodetic datum
    UnknownDatum(String),
    /// Unknown or unregistered projection
    UnknownProjection(String),
    /// Malformed coordinate system descriptor, with the offending token
    DescriptorParse(String),
    /// Malformed MGRS string, with the position of the first bad character
    MgrsParse(String, usize),
    /// Malformed position string
    PositionParse(String),
    /// No altitude dataset covers the queried point
    AltitudeMiss(f64, f64),
    /// No transformer registered for the height model
    NoHeightTransformer(String),
    /// Iterative projection inverse exceeded its iteration bound
    NoConvergence,
    /// Coordinate outside the valid range of the requested transform
    OutOfRange(String),
    /// No position has been set on the conversion engine
    NoPosition,
    /// Generic error with message
    GenericError(String),
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::IoError(e) => write!(f, "I/O error: {}", e),
            CoordError::BadMagic(m) => write!(f, "Invalid altitude file magic: {:#018x}", m),
            CoordError::UnsupportedVersion(v) => write!(f, "Unsupported altitude file version: {}", v),
            CoordError::UnknownDatum(d) => write!(f, "Unknown geodetic datum: {}", d),
            CoordError::UnknownProjection(p) => write!(f, "Unknown projection: {}", p),
            CoordError::DescriptorParse(t) => write!(f, "Malformed coordinate system descriptor: {}", t),
            CoordError::MgrsParse(s, pos) => write!(f, "Malformed MGRS string '{}' at position {}", s, pos),
            CoordError::PositionParse(s) => write!(f, "Malformed position string: {}", s),
            CoordError::AltitudeMiss(lat, lon) => {
                write!(f, "No altitude dataset covers ({:.6}, {:.6})", lat, lon)
            }
            CoordError::NoHeightTransformer(m) => {
                write!(f, "No height model transformer registered for {}", m)
            }
            CoordError::NoConvergence => write!(f, "Projection inverse did not converge"),
            CoordError::OutOfRange(msg) => write!(f, "Coordinate out of range: {}", msg),
            CoordError::NoPosition => write!(f, "No position has been set"),
            CoordError::GenericError(msg) => write!(f, "Coordinate error: {}", msg),
        }
    }
}

impl std::error::Error for CoordError {}

impl From<io::Error> for CoordError {
    fn from(error: io::Error) -> Self {
        CoordError::IoError(error)
    }
}

impl From<String> for CoordError {
    fn from(msg: String) -> Self {
        CoordError::GenericError(msg)
    }
}

/// Result type for coordinate operations
pub type CoordResult<T> = Result<T, CoordError>;
