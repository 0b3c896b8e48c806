//! Altitude lookup cache
//!
//! Owns the spatial index of registered datasets, loads payloads on
//! demand and evicts idle ones from a background worker. Two
//! independent locks keep the cache safe under concurrent queries: a
//! read/write lock over the spatial index (many readers, exclusive
//! registration) and a separate mutex over the in-use set so eviction
//! never races a live grid read.

use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::altitude::dataset::AltitudeDataset;
use crate::altitude::format::Serialize;
use crate::altitude::spatial::SpatialIndex;
use crate::errors::{CoordError, CoordResult};
use crate::io::byte_order::{ByteOrder, ByteOrderHandler};
use crate::io::seekable::{SeekableReader, SeekableWriter};

/// Seconds a loaded dataset may sit idle before eviction
pub const DEFAULT_PURGE_TIME: f64 = 60.0;

/// Background sweep interval
const SWEEP_INTERVAL: Duration = Duration::from_millis(200);

struct LookupShared {
    spatial: RwLock<SpatialIndex>,
    /// Dataset id -> count of in-flight queries holding it
    in_use: Mutex<HashMap<u64, usize>>,
    purge_time: Mutex<f64>,
    added_dirs: Mutex<HashSet<PathBuf>>,
    stop: Mutex<bool>,
    wake: Condvar,
}

impl LookupShared {
    /// One eviction pass over the loaded datasets
    ///
    /// The in-use lock is held across the whole pass; a query either
    /// registered itself before the pass (and is skipped) or will
    /// reload the dataset afterwards.
    fn sweep(&self) {
        let candidates: Vec<Arc<AltitudeDataset>> = {
            let spatial = self.spatial.read().unwrap();
            spatial.iter().filter(|d| d.is_loaded()).cloned().collect()
        };
        if candidates.is_empty() {
            return;
        }

        let purge_millis = (*self.purge_time.lock().unwrap() * 1000.0).max(0.0) as u64;
        let in_use = self.in_use.lock().unwrap();

        for dataset in candidates {
            if dataset.idle_millis() >= purge_millis && !in_use.contains_key(&dataset.id()) {
                dataset.unload();
            }
        }
    }
}

/// Marks a dataset as held by an in-flight query for its lifetime
struct InUseGuard<'a> {
    shared: &'a LookupShared,
    id: u64,
}

impl<'a> InUseGuard<'a> {
    fn new(shared: &'a LookupShared, id: u64) -> Self {
        *shared.in_use.lock().unwrap().entry(id).or_insert(0) += 1;
        InUseGuard { shared, id }
    }
}

impl Drop for InUseGuard<'_> {
    fn drop(&mut self) {
        let mut in_use = self.shared.in_use.lock().unwrap();
        if let Some(count) = in_use.get_mut(&self.id) {
            *count -= 1;
            if *count == 0 {
                in_use.remove(&self.id);
            }
        }
    }
}

/// Disk-backed, spatially indexed altitude cache
pub struct AltitudeLookup {
    shared: Arc<LookupShared>,
    byte_order: ByteOrder,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AltitudeLookup {
    /// Create an empty cache and start its background eviction worker
    pub fn new() -> Self {
        let shared = Arc::new(LookupShared {
            spatial: RwLock::new(SpatialIndex::new()),
            in_use: Mutex::new(HashMap::new()),
            purge_time: Mutex::new(DEFAULT_PURGE_TIME),
            added_dirs: Mutex::new(HashSet::new()),
            stop: Mutex::new(false),
            wake: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("altitude-purge".to_string())
            .spawn(move || {
                let mut stop = worker_shared.stop.lock().unwrap();
                while !*stop {
                    let (guard, _) = worker_shared
                        .wake
                        .wait_timeout(stop, SWEEP_INTERVAL)
                        .unwrap();
                    stop = guard;
                    if *stop {
                        break;
                    }
                    drop(stop);
                    worker_shared.sweep();
                    stop = worker_shared.stop.lock().unwrap();
                }
            })
            .expect("failed to spawn the altitude purge worker");

        AltitudeLookup {
            shared,
            byte_order: ByteOrder::default(),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Scan a directory for `.alt` files and register their headers
    ///
    /// A corrupt file is logged and skipped; the scan itself only fails
    /// if the directory cannot be read. Re-adding an already scanned
    /// directory is a no-op and returns `false`.
    pub fn add_directory(&self, path: &Path, recursive: bool) -> CoordResult<bool> {
        // Held across the scan so concurrent adds of the same directory
        // cannot register its datasets twice; a failed scan stays
        // unmarked and can be retried
        let mut added = self.shared.added_dirs.lock().unwrap();
        if added.contains(path) {
            return Ok(false);
        }

        let registered = self.scan_directory(path, recursive)?;
        added.insert(path.to_path_buf());
        info!("Registered {} altitude datasets from {}", registered, path.display());
        Ok(true)
    }

    fn scan_directory(&self, path: &Path, recursive: bool) -> CoordResult<usize> {
        let mut registered = 0;

        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let entry_path = entry.path();

            if entry_path.is_dir() {
                if recursive {
                    registered += self.scan_directory(&entry_path, recursive)?;
                }
                continue;
            }

            let is_alt = entry_path
                .extension()
                .map(|e| e.eq_ignore_ascii_case("alt"))
                .unwrap_or(false);
            if !is_alt {
                continue;
            }

            match AltitudeDataset::read_from(&entry_path, true) {
                Ok(dataset) => {
                    self.shared.spatial.write().unwrap().insert(Arc::new(dataset));
                    registered += 1;
                }
                Err(e) => {
                    warn!("Skipping altitude dataset {}: {}", entry_path.display(), e);
                }
            }
        }

        Ok(registered)
    }

    /// Register a dataset built programmatically
    pub fn add_dataset(&self, dataset: AltitudeDataset) {
        self.shared.spatial.write().unwrap().insert(Arc::new(dataset));
    }

    /// Height at a point, latitude and longitude in radians
    ///
    /// With `sample` the result is bilinear over the four surrounding
    /// grid nodes, otherwise the nearest node. Blocks on disk I/O if
    /// the covering dataset is not resident. Returns a miss when no
    /// registered dataset covers the point.
    pub fn get_altitude(&self, latitude: f64, longitude: f64, sample: bool) -> CoordResult<f64> {
        let lat_deg = latitude.to_degrees();
        let lon_deg = longitude.to_degrees();

        let dataset = {
            let spatial = self.shared.spatial.read().unwrap();
            spatial.find(lat_deg, lon_deg)
        }
        .ok_or(CoordError::AltitudeMiss(lat_deg, lon_deg))?;

        // Held for the duration of the read so eviction skips the dataset
        let _guard = InUseGuard::new(&self.shared, dataset.id());
        dataset.get_height(lat_deg, lon_deg, sample)
    }

    /// Stop the worker and drop every registered dataset
    pub fn clear(&self) {
        self.stop_worker();
        self.shared.spatial.write().unwrap().clear();
        self.shared.in_use.lock().unwrap().clear();
        self.shared.added_dirs.lock().unwrap().clear();
    }

    fn stop_worker(&self) {
        {
            let mut stop = self.shared.stop.lock().unwrap();
            *stop = true;
        }
        self.shared.wake.notify_all();
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    pub fn set_purge_time(&self, seconds: f64) {
        *self.shared.purge_time.lock().unwrap() = seconds;
    }

    pub fn purge_time(&self) -> f64 {
        *self.shared.purge_time.lock().unwrap()
    }

    pub fn dataset_count(&self) -> usize {
        self.shared.spatial.read().unwrap().len()
    }

    /// Number of datasets currently holding their grid in memory
    pub fn loaded_count(&self) -> usize {
        self.shared.spatial.read().unwrap().iter().filter(|d| d.is_loaded()).count()
    }

    /// Total payload reads performed, across all datasets
    pub fn disk_read_count(&self) -> u64 {
        self.shared.spatial.read().unwrap().iter().map(|d| d.load_count()).sum()
    }

    pub fn latitude_min(&self) -> f64 {
        self.shared.spatial.read().unwrap().latitude_min()
    }

    pub fn latitude_max(&self) -> f64 {
        self.shared.spatial.read().unwrap().latitude_max()
    }

    pub fn longitude_min(&self) -> f64 {
        self.shared.spatial.read().unwrap().longitude_min()
    }

    pub fn longitude_max(&self) -> f64 {
        self.shared.spatial.read().unwrap().longitude_max()
    }

    /// Serialize every registered dataset into one archive file
    pub fn save_url(&self, path: &Path) -> CoordResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let handler = self.byte_order.create_handler();
        self.write(&mut writer, handler.as_ref())
    }

    /// Load an archive produced by [`save_url`](Self::save_url)
    pub fn load_url(&self, path: &Path) -> CoordResult<()> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let handler = self.byte_order.create_handler();
        self.read_records(&mut reader, handler.as_ref())
    }

    fn read_records(
        &self,
        stream: &mut dyn SeekableReader,
        handler: &dyn ByteOrderHandler,
    ) -> CoordResult<()> {
        let len = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(0))?;

        while stream.stream_position()? < len {
            let mut dataset = AltitudeDataset::new("", Default::default());
            dataset.read(stream, handler)?;
            self.add_dataset(dataset);
        }
        Ok(())
    }
}

impl Serialize for AltitudeLookup {
    fn write(
        &self,
        stream: &mut dyn SeekableWriter,
        handler: &dyn ByteOrderHandler,
    ) -> CoordResult<()> {
        let datasets: Vec<Arc<AltitudeDataset>> = {
            let spatial = self.shared.spatial.read().unwrap();
            spatial.iter().cloned().collect()
        };
        for dataset in datasets {
            dataset.write(stream, handler)?;
        }
        Ok(())
    }

    fn read(
        &mut self,
        stream: &mut dyn SeekableReader,
        handler: &dyn ByteOrderHandler,
    ) -> CoordResult<()> {
        self.read_records(stream, handler)
    }

    fn data_size(&self) -> u64 {
        self.shared.spatial.read().unwrap().iter().map(|d| d.data_size()).sum()
    }
}

impl Drop for AltitudeLookup {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

impl Default for AltitudeLookup {
    fn default() -> Self {
        AltitudeLookup::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::altitude::format::LatLongInfo;
    use std::io::Cursor;

    fn stockholm_info() -> LatLongInfo {
        LatLongInfo {
            latitude: 59.0,
            longitude: 18.0,
            latitude_delta: 1.0,
            longitude_delta: 1.0,
            latitude_rows: 2,
            longitude_columns: 2,
        }
    }

    fn stockholm_dataset(value: f32) -> AltitudeDataset {
        AltitudeDataset::with_samples("", stockholm_info(), vec![value; 4]).unwrap()
    }

    fn write_dataset_file(dir: &Path, name: &str, value: f32) -> PathBuf {
        let path = dir.join(name);
        stockholm_dataset(value).write_to(&path).unwrap();
        path
    }

    #[test]
    fn test_get_altitude_hit_and_miss() {
        let lookup = AltitudeLookup::new();
        lookup.add_dataset(stockholm_dataset(42.0));

        let lat = 59.5_f64.to_radians();
        let lon = 18.5_f64.to_radians();
        assert_eq!(lookup.get_altitude(lat, lon, true).unwrap(), 42.0);

        let miss = lookup.get_altitude(0.0, 0.0, true);
        assert!(matches!(miss, Err(CoordError::AltitudeMiss(_, _))));
        lookup.clear();
    }

    #[test]
    fn test_overlapping_datasets_newest_wins() {
        let lookup = AltitudeLookup::new();
        lookup.add_dataset(stockholm_dataset(1.0));
        lookup.add_dataset(stockholm_dataset(2.0));

        let lat = 59.5_f64.to_radians();
        let lon = 18.5_f64.to_radians();
        assert_eq!(lookup.get_altitude(lat, lon, true).unwrap(), 2.0);
        lookup.clear();
    }

    #[test]
    fn test_add_directory_registers_headers_only() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset_file(dir.path(), "a.alt", 5.0);
        write_dataset_file(dir.path(), "b.alt", 6.0);
        std::fs::write(dir.path().join("junk.alt"), b"not an alt file at all").unwrap();
        std::fs::write(dir.path().join("other.txt"), b"ignored").unwrap();

        let lookup = AltitudeLookup::new();
        assert!(lookup.add_directory(dir.path(), false).unwrap());

        // The corrupt file is skipped, nothing is loaded yet
        assert_eq!(lookup.dataset_count(), 2);
        assert_eq!(lookup.loaded_count(), 0);
        assert_eq!(lookup.disk_read_count(), 0);

        // Re-adding the same directory is a no-op
        assert!(!lookup.add_directory(dir.path(), false).unwrap());
        assert_eq!(lookup.dataset_count(), 2);
        lookup.clear();
    }

    #[test]
    fn test_add_directory_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("tiles");
        std::fs::create_dir(&sub).unwrap();
        write_dataset_file(&sub, "a.alt", 5.0);

        let lookup = AltitudeLookup::new();
        lookup.add_directory(dir.path(), false).unwrap();
        assert_eq!(lookup.dataset_count(), 0);
        lookup.clear();

        let lookup = AltitudeLookup::new();
        lookup.add_directory(dir.path(), true).unwrap();
        assert_eq!(lookup.dataset_count(), 1);
        lookup.clear();
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let lookup = AltitudeLookup::new();
        assert!(lookup.add_directory(Path::new("/no/such/dir"), true).is_err());
        lookup.clear();
    }

    #[test]
    fn test_query_promotes_and_sweep_evicts() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset_file(dir.path(), "a.alt", 7.0);

        let lookup = AltitudeLookup::new();
        lookup.add_directory(dir.path(), false).unwrap();

        let lat = 59.5_f64.to_radians();
        let lon = 18.5_f64.to_radians();
        assert_eq!(lookup.get_altitude(lat, lon, true).unwrap(), 7.0);
        assert_eq!(lookup.loaded_count(), 1);

        // Purge time zero: the next sweep drops the idle payload
        lookup.set_purge_time(0.0);
        lookup.shared.sweep();
        assert_eq!(lookup.loaded_count(), 0);

        // The dataset stays registered and reloads on demand
        assert_eq!(lookup.get_altitude(lat, lon, true).unwrap(), 7.0);
        assert_eq!(lookup.disk_read_count(), 2);
        lookup.clear();
    }

    #[test]
    fn test_in_use_dataset_survives_sweep() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset_file(dir.path(), "a.alt", 7.0);

        let lookup = AltitudeLookup::new();
        lookup.add_directory(dir.path(), false).unwrap();

        let lat = 59.5_f64.to_radians();
        let lon = 18.5_f64.to_radians();
        lookup.get_altitude(lat, lon, true).unwrap();

        let dataset = lookup.shared.spatial.read().unwrap().find(59.5, 18.5).unwrap();
        {
            // An in-flight query is never evicted, elapsed purge time or not
            let _guard = InUseGuard::new(&lookup.shared, dataset.id());
            lookup.set_purge_time(0.0);
            lookup.shared.sweep();
            assert_eq!(lookup.loaded_count(), 1);
        }

        lookup.shared.sweep();
        assert_eq!(lookup.loaded_count(), 0);
        lookup.clear();
    }

    #[test]
    fn test_long_purge_time_keeps_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset_file(dir.path(), "a.alt", 7.0);

        let lookup = AltitudeLookup::new();
        lookup.add_directory(dir.path(), false).unwrap();
        lookup.set_purge_time(3600.0);

        let lat = 59.5_f64.to_radians();
        let lon = 18.5_f64.to_radians();
        lookup.get_altitude(lat, lon, true).unwrap();

        lookup.shared.sweep();
        assert_eq!(lookup.loaded_count(), 1);
        lookup.clear();
    }

    #[test]
    fn test_extents() {
        let lookup = AltitudeLookup::new();
        lookup.add_dataset(stockholm_dataset(1.0));

        assert_eq!(lookup.latitude_min(), 59.0);
        assert_eq!(lookup.latitude_max(), 60.0);
        assert_eq!(lookup.longitude_min(), 18.0);
        assert_eq!(lookup.longitude_max(), 19.0);
        lookup.clear();
    }

    #[test]
    fn test_archive_round_trip() {
        let lookup = AltitudeLookup::new();
        lookup.add_dataset(stockholm_dataset(11.0));
        lookup.add_dataset(AltitudeDataset::with_samples(
            "",
            LatLongInfo {
                latitude: 40.0,
                longitude: -75.0,
                latitude_delta: 1.0,
                longitude_delta: 1.0,
                latitude_rows: 2,
                longitude_columns: 2,
            },
            vec![22.0; 4],
        )
        .unwrap());

        let handler = ByteOrder::default().create_handler();
        let mut buffer = Cursor::new(Vec::new());
        lookup.write(&mut buffer, handler.as_ref()).unwrap();
        assert_eq!(buffer.get_ref().len() as u64, lookup.data_size());

        let restored = AltitudeLookup::new();
        buffer.set_position(0);
        restored.read_records(&mut buffer, handler.as_ref()).unwrap();

        assert_eq!(restored.dataset_count(), 2);
        let lat = 40.5_f64.to_radians();
        let lon = (-74.5_f64).to_radians();
        assert_eq!(restored.get_altitude(lat, lon, true).unwrap(), 22.0);

        lookup.clear();
        restored.clear();
    }

    #[test]
    fn test_clear_empties_the_index() {
        let lookup = AltitudeLookup::new();
        lookup.add_dataset(stockholm_dataset(1.0));
        lookup.clear();

        assert_eq!(lookup.dataset_count(), 0);
        assert!(lookup.get_altitude(59.5_f64.to_radians(), 18.5_f64.to_radians(), true).is_err());
    }
}
