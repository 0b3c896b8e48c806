//! Altitude dataset: one gridded height tile
//!
//! A dataset is registered header-only when its directory is scanned
//! and promoted to loaded on the first query inside its bounding box.
//! The payload sits behind a per-dataset mutex so concurrent queries
//! for an unloaded dataset produce exactly one disk read. Eviction
//! drops the payload and demotes the dataset back to registered.

use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use lazy_static::lazy_static;

use crate::altitude::format::{AltFileHeader, LatLongInfo, Serialize, ALT_HEADER_SIZE};
use crate::errors::{CoordError, CoordResult};
use crate::io::byte_order::{ByteOrder, ByteOrderHandler};
use crate::io::seekable::{SeekableReader, SeekableWriter};

lazy_static! {
    // Common epoch for the access timestamps
    static ref EPOCH: Instant = Instant::now();
}

static NEXT_DATASET_ID: AtomicU64 = AtomicU64::new(1);

fn now_millis() -> u64 {
    EPOCH.elapsed().as_millis() as u64
}

/// One gridded altitude dataset
pub struct AltitudeDataset {
    /// Source path; empty for purely in-memory datasets
    url: String,
    info: LatLongInfo,
    byte_order: ByteOrder,
    /// Load lock and lazily resident sample grid
    data: Mutex<Option<Arc<Vec<f32>>>>,
    /// Milliseconds since the process epoch of the last query
    access_time: AtomicU64,
    /// Number of payload reads from disk
    load_count: AtomicU64,
    id: u64,
}

impl AltitudeDataset {
    /// Register a dataset header-only; the payload loads on first query
    pub fn new(url: &str, info: LatLongInfo) -> Self {
        AltitudeDataset {
            url: url.to_string(),
            info,
            byte_order: ByteOrder::default(),
            data: Mutex::new(None),
            access_time: AtomicU64::new(0),
            load_count: AtomicU64::new(0),
            id: NEXT_DATASET_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Build an in-memory dataset from its samples
    ///
    /// The sample vector length must match the grid geometry.
    pub fn with_samples(url: &str, info: LatLongInfo, samples: Vec<f32>) -> CoordResult<Self> {
        if samples.len() != info.sample_count() {
            return Err(CoordError::GenericError(format!(
                "sample count {} does not match grid {}x{}",
                samples.len(),
                info.latitude_rows,
                info.longitude_columns
            )));
        }
        let dataset = AltitudeDataset::new(url, info);
        *dataset.data.lock().unwrap() = Some(Arc::new(samples));
        Ok(dataset)
    }

    /// Read a dataset from an ALT file
    ///
    /// With `only_header` the payload stays on disk and the dataset is
    /// returned in the registered state.
    pub fn read_from(path: &Path, only_header: bool) -> CoordResult<AltitudeDataset> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let handler = ByteOrder::default().create_handler();

        let mut header = AltFileHeader::default();
        header.read(&mut reader, handler.as_ref())?;

        let url = path.to_string_lossy().to_string();
        let dataset = AltitudeDataset::new(&url, header.info);

        if !only_header {
            let samples = read_samples(&mut reader, handler.as_ref(), &header.info)?;
            *dataset.data.lock().unwrap() = Some(Arc::new(samples));
            dataset.load_count.fetch_add(1, Ordering::Relaxed);
        }

        debug!(
            "Read altitude dataset {} ({}x{} samples, header only: {})",
            url, header.info.latitude_rows, header.info.longitude_columns, only_header
        );

        Ok(dataset)
    }

    /// Write the full dataset to an ALT file
    pub fn write_to(&self, path: &Path) -> CoordResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let handler = self.byte_order.create_handler();
        self.write(&mut writer, handler.as_ref())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn info(&self) -> &LatLongInfo {
        &self.info
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_loaded(&self) -> bool {
        self.data.lock().unwrap().is_some()
    }

    /// Milliseconds since the last query touched this dataset
    pub fn idle_millis(&self) -> u64 {
        now_millis().saturating_sub(self.access_time.load(Ordering::Relaxed))
    }

    pub fn load_count(&self) -> u64 {
        self.load_count.load(Ordering::Relaxed)
    }

    /// Drop the resident payload, demoting the dataset to registered
    ///
    /// In-memory datasets without a source URL cannot be reloaded and
    /// keep their payload.
    pub(crate) fn unload(&self) {
        if self.url.is_empty() {
            return;
        }
        let mut guard = self.data.lock().unwrap();
        if guard.take().is_some() {
            info!("Evicted altitude dataset {}", self.url);
        }
    }

    /// Return the resident samples, loading them from disk if needed
    ///
    /// The per-dataset lock serializes the load so concurrent queries
    /// block on it instead of duplicating the read.
    fn ensure_loaded(&self) -> CoordResult<Arc<Vec<f32>>> {
        let mut guard = self.data.lock().unwrap();
        if let Some(samples) = guard.as_ref() {
            return Ok(Arc::clone(samples));
        }

        if self.url.is_empty() {
            return Err(CoordError::GenericError("dataset has no backing file".to_string()));
        }

        let file = File::open(Path::new(&self.url))?;
        let mut reader = BufReader::new(file);
        let handler = self.byte_order.create_handler();

        let mut header = AltFileHeader::default();
        header.read(&mut reader, handler.as_ref())?;

        let samples = Arc::new(read_samples(&mut reader, handler.as_ref(), &header.info)?);
        *guard = Some(Arc::clone(&samples));
        self.load_count.fetch_add(1, Ordering::Relaxed);
        info!("Loaded altitude dataset {} ({} samples)", self.url, samples.len());

        Ok(samples)
    }

    /// Sample the grid at a point given in degrees
    ///
    /// With `sample` the four surrounding nodes are combined by
    /// bilinear interpolation, otherwise the nearest node is returned.
    pub fn get_height(&self, latitude: f64, longitude: f64, sample: bool) -> CoordResult<f64> {
        if !self.info.contains(latitude, longitude) {
            return Err(CoordError::AltitudeMiss(latitude, longitude));
        }

        let samples = self.ensure_loaded()?;
        self.access_time.store(now_millis(), Ordering::Relaxed);

        let rows = self.info.latitude_rows as i64;
        let cols = self.info.longitude_columns as i64;

        // Degree/radian conversions leave sub-nanometer noise on the
        // grid position; queries meant to hit a node must return the
        // stored sample unblended
        let snap = |pos: f64| {
            if (pos - pos.round()).abs() < 1e-9 {
                pos.round()
            } else {
                pos
            }
        };
        let row_pos = snap((latitude - self.info.latitude) / self.info.latitude_delta);
        let col_pos = snap((longitude - self.info.longitude) / self.info.longitude_delta);

        let at = |row: i64, col: i64| -> f64 {
            let row = row.clamp(0, rows - 1);
            let col = col.clamp(0, cols - 1);
            samples[(row * cols + col) as usize] as f64
        };

        if sample {
            let row = row_pos.floor() as i64;
            let col = col_pos.floor() as i64;
            let row_frac = row_pos - row_pos.floor();
            let col_frac = col_pos - col_pos.floor();

            let v00 = at(row, col);
            let v01 = at(row, col + 1);
            let v10 = at(row + 1, col);
            let v11 = at(row + 1, col + 1);

            let south = v00 * (1.0 - col_frac) + v01 * col_frac;
            let north = v10 * (1.0 - col_frac) + v11 * col_frac;
            Ok(south * (1.0 - row_frac) + north * row_frac)
        } else {
            Ok(at(row_pos.round() as i64, col_pos.round() as i64))
        }
    }
}

fn read_samples(
    reader: &mut dyn SeekableReader,
    handler: &dyn ByteOrderHandler,
    info: &LatLongInfo,
) -> CoordResult<Vec<f32>> {
    let count = info.sample_count();
    let mut samples = Vec::with_capacity(count);
    for _ in 0..count {
        samples.push(handler.read_f32(reader)?);
    }
    Ok(samples)
}

impl Serialize for AltitudeDataset {
    fn write(
        &self,
        stream: &mut dyn SeekableWriter,
        handler: &dyn ByteOrderHandler,
    ) -> CoordResult<()> {
        let samples = self.ensure_loaded()?;
        AltFileHeader::new(self.info).write(stream, handler)?;
        for sample in samples.iter() {
            handler.write_f32(stream, *sample)?;
        }
        Ok(())
    }

    fn read(
        &mut self,
        stream: &mut dyn SeekableReader,
        handler: &dyn ByteOrderHandler,
    ) -> CoordResult<()> {
        let mut header = AltFileHeader::default();
        header.read(stream, handler)?;

        let samples = read_samples(stream, handler, &header.info)?;
        self.info = header.info;
        *self.data.lock().unwrap() = Some(Arc::new(samples));
        Ok(())
    }

    fn data_size(&self) -> u64 {
        ALT_HEADER_SIZE + self.info.sample_count() as u64 * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::byte_order::LittleEndianHandler;
    use std::io::Cursor;

    fn grid_2x2() -> (LatLongInfo, Vec<f32>) {
        let info = LatLongInfo {
            latitude: 59.0,
            longitude: 18.0,
            latitude_delta: 1.0,
            longitude_delta: 1.0,
            latitude_rows: 2,
            longitude_columns: 2,
        };
        // Row-major from the south-west corner
        (info, vec![10.0, 20.0, 30.0, 40.0])
    }

    #[test]
    fn test_origin_returns_stored_sample() {
        let (info, samples) = grid_2x2();
        let dataset = AltitudeDataset::with_samples("", info, samples).unwrap();

        assert_eq!(dataset.get_height(59.0, 18.0, true).unwrap(), 10.0);
        assert_eq!(dataset.get_height(59.0, 19.0, true).unwrap(), 20.0);
        assert_eq!(dataset.get_height(60.0, 18.0, true).unwrap(), 30.0);
        assert_eq!(dataset.get_height(60.0, 19.0, true).unwrap(), 40.0);
    }

    #[test]
    fn test_cell_center_is_corner_average() {
        let (info, samples) = grid_2x2();
        let dataset = AltitudeDataset::with_samples("", info, samples).unwrap();

        assert_eq!(dataset.get_height(59.5, 18.5, true).unwrap(), 25.0);
    }

    #[test]
    fn test_nearest_node_lookup() {
        let (info, samples) = grid_2x2();
        let dataset = AltitudeDataset::with_samples("", info, samples).unwrap();

        assert_eq!(dataset.get_height(59.1, 18.1, false).unwrap(), 10.0);
        assert_eq!(dataset.get_height(59.9, 18.9, false).unwrap(), 40.0);
    }

    #[test]
    fn test_outside_bounding_box_misses() {
        let (info, samples) = grid_2x2();
        let dataset = AltitudeDataset::with_samples("", info, samples).unwrap();

        assert!(matches!(
            dataset.get_height(58.9, 18.0, true),
            Err(CoordError::AltitudeMiss(_, _))
        ));
        assert!(dataset.get_height(59.5, 19.1, true).is_err());
    }

    #[test]
    fn test_wrong_sample_count_is_rejected() {
        let (info, _) = grid_2x2();
        assert!(AltitudeDataset::with_samples("", info, vec![1.0; 3]).is_err());
    }

    #[test]
    fn test_serialize_round_trip_is_byte_identical() {
        let (info, samples) = grid_2x2();
        let dataset = AltitudeDataset::with_samples("", info, samples).unwrap();

        let mut first = Cursor::new(Vec::new());
        dataset.write(&mut first, &LittleEndianHandler).unwrap();
        assert_eq!(first.get_ref().len() as u64, dataset.data_size());

        let mut decoded = AltitudeDataset::new("", LatLongInfo::default());
        first.set_position(0);
        decoded.read(&mut first, &LittleEndianHandler).unwrap();

        let mut second = Cursor::new(Vec::new());
        decoded.write(&mut second, &LittleEndianHandler).unwrap();
        assert_eq!(first.get_ref(), second.get_ref());
    }

    #[test]
    fn test_push_back_appends() {
        let (info, samples) = grid_2x2();
        let dataset = AltitudeDataset::with_samples("", info, samples).unwrap();

        let mut stream = Cursor::new(vec![0xAAu8; 4]);
        dataset.push_back(&mut stream, &LittleEndianHandler).unwrap();

        assert_eq!(stream.get_ref().len() as u64, 4 + dataset.data_size());
        assert_eq!(&stream.get_ref()[..4], &[0xAA; 4]);
    }

    #[test]
    fn test_disk_round_trip_and_lazy_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.alt");

        let (info, samples) = grid_2x2();
        let original = AltitudeDataset::with_samples("", info, samples).unwrap();
        original.write_to(&path).unwrap();

        let registered = AltitudeDataset::read_from(&path, true).unwrap();
        assert!(!registered.is_loaded());
        assert_eq!(registered.load_count(), 0);
        assert_eq!(*registered.info(), info);

        // First query promotes the dataset to loaded
        assert_eq!(registered.get_height(59.5, 18.5, true).unwrap(), 25.0);
        assert!(registered.is_loaded());
        assert_eq!(registered.load_count(), 1);

        // Further queries reuse the resident grid
        assert_eq!(registered.get_height(59.0, 18.0, true).unwrap(), 10.0);
        assert_eq!(registered.load_count(), 1);
    }

    #[test]
    fn test_unload_demotes_to_registered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.alt");

        let (info, samples) = grid_2x2();
        AltitudeDataset::with_samples("", info, samples)
            .unwrap()
            .write_to(&path)
            .unwrap();

        let dataset = AltitudeDataset::read_from(&path, false).unwrap();
        assert!(dataset.is_loaded());

        dataset.unload();
        assert!(!dataset.is_loaded());

        // The next query reloads from disk
        assert_eq!(dataset.get_height(59.0, 18.0, true).unwrap(), 10.0);
        assert_eq!(dataset.load_count(), 2);
    }

    #[test]
    fn test_in_memory_dataset_survives_unload() {
        let (info, samples) = grid_2x2();
        let dataset = AltitudeDataset::with_samples("", info, samples).unwrap();

        dataset.unload();
        assert!(dataset.is_loaded());
    }
}
