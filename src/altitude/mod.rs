//! Altitude dataset cache
//!
//! Gridded height datasets on disk, a spatial index over their
//! bounding boxes and a concurrent lookup cache with background
//! eviction.

pub mod dataset;
pub mod format;
pub mod lookup;
mod spatial;

pub use dataset::AltitudeDataset;
pub use format::{AltFileHeader, LatLongInfo, Serialize, ALT_MAGIC, ALT_VERSION};
pub use lookup::{AltitudeLookup, DEFAULT_PURGE_TIME};
