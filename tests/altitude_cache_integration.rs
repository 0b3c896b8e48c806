//! Integration tests for the altitude dataset cache

use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use coordkit::altitude::format::LatLongInfo;
use coordkit::altitude::{AltitudeDataset, AltitudeLookup};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

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

fn write_dataset(dir: &Path, name: &str, samples: Vec<f32>) {
    let dataset = AltitudeDataset::with_samples("", stockholm_info(), samples).unwrap();
    dataset.write_to(&dir.join(name)).unwrap();
}

#[test]
fn concurrent_queries_cause_exactly_one_disk_read() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "tile.alt", vec![42.0; 4]);

    let lookup = Arc::new(AltitudeLookup::new());
    lookup.add_directory(dir.path(), false).unwrap();
    assert_eq!(lookup.loaded_count(), 0);

    let thread_count = 8;
    let barrier = Arc::new(Barrier::new(thread_count));
    let mut handles = Vec::new();

    for _ in 0..thread_count {
        let lookup = Arc::clone(&lookup);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            lookup.get_altitude(59.5_f64.to_radians(), 18.5_f64.to_radians(), true)
        }));
    }

    for handle in handles {
        let height = handle.join().unwrap().unwrap();
        assert_eq!(height, 42.0);
    }

    // The per-dataset load lock collapses the concurrent loads
    assert_eq!(lookup.disk_read_count(), 1);
    assert_eq!(lookup.loaded_count(), 1);
    lookup.clear();
}

#[test]
fn background_worker_evicts_idle_datasets() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "tile.alt", vec![7.0; 4]);

    let lookup = AltitudeLookup::new();
    lookup.add_directory(dir.path(), false).unwrap();

    lookup.get_altitude(59.5_f64.to_radians(), 18.5_f64.to_radians(), true).unwrap();
    assert_eq!(lookup.loaded_count(), 1);

    // With a zero purge time the next background sweep drops the grid
    lookup.set_purge_time(0.0);
    let mut waited = Duration::ZERO;
    while lookup.loaded_count() > 0 && waited < Duration::from_secs(5) {
        thread::sleep(Duration::from_millis(50));
        waited += Duration::from_millis(50);
    }
    assert_eq!(lookup.loaded_count(), 0);

    // The dataset is still registered and answers again after a reload
    let height = lookup
        .get_altitude(59.5_f64.to_radians(), 18.5_f64.to_radians(), true)
        .unwrap();
    assert_eq!(height, 7.0);
    assert_eq!(lookup.dataset_count(), 1);
    lookup.clear();
}

#[test]
fn long_purge_time_keeps_grids_resident() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), "tile.alt", vec![7.0; 4]);

    let lookup = AltitudeLookup::new();
    lookup.add_directory(dir.path(), false).unwrap();
    lookup.set_purge_time(3600.0);

    lookup.get_altitude(59.5_f64.to_radians(), 18.5_f64.to_radians(), true).unwrap();
    thread::sleep(Duration::from_millis(600));

    assert_eq!(lookup.loaded_count(), 1);
    assert_eq!(lookup.disk_read_count(), 1);
    lookup.clear();
}

#[test]
fn interpolation_matches_grid_nodes_and_centers() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    // South row 10, 20; north row 30, 40
    write_dataset(dir.path(), "tile.alt", vec![10.0, 20.0, 30.0, 40.0]);

    let lookup = AltitudeLookup::new();
    lookup.add_directory(dir.path(), false).unwrap();

    // The exact grid origin returns the stored sample unmodified
    let origin = lookup
        .get_altitude(59.0_f64.to_radians(), 18.0_f64.to_radians(), true)
        .unwrap();
    assert_eq!(origin, 10.0);

    // The cell center blends all four corners equally
    let center = lookup
        .get_altitude(59.5_f64.to_radians(), 18.5_f64.to_radians(), true)
        .unwrap();
    assert_eq!(center, 25.0);

    // Nearest-node lookup snaps instead of blending
    let nearest = lookup
        .get_altitude(59.9_f64.to_radians(), 18.9_f64.to_radians(), false)
        .unwrap();
    assert_eq!(nearest, 40.0);
    lookup.clear();
}

#[test]
fn concurrent_queries_and_registration_do_not_block_each_other() {
    init_logging();

    let dir_a = tempfile::tempdir().unwrap();
    write_dataset(dir_a.path(), "tile.alt", vec![1.0; 4]);

    let other_info = LatLongInfo {
        latitude: 40.0,
        longitude: -75.0,
        latitude_delta: 1.0,
        longitude_delta: 1.0,
        latitude_rows: 2,
        longitude_columns: 2,
    };
    let dir_b = tempfile::tempdir().unwrap();
    AltitudeDataset::with_samples("", other_info, vec![2.0; 4])
        .unwrap()
        .write_to(&dir_b.path().join("tile.alt"))
        .unwrap();

    let lookup = Arc::new(AltitudeLookup::new());
    lookup.add_directory(dir_a.path(), false).unwrap();

    let query_lookup = Arc::clone(&lookup);
    let query = thread::spawn(move || {
        for _ in 0..200 {
            let _ = query_lookup.get_altitude(59.5_f64.to_radians(), 18.5_f64.to_radians(), true);
        }
    });

    let register_lookup = Arc::clone(&lookup);
    let register = thread::spawn(move || {
        register_lookup.add_directory(dir_b.path(), false).unwrap();
    });

    query.join().unwrap();
    register.join().unwrap();

    assert_eq!(lookup.dataset_count(), 2);
    let height = lookup
        .get_altitude(40.5_f64.to_radians(), (-74.5_f64).to_radians(), true)
        .unwrap();
    assert_eq!(height, 2.0);
    lookup.clear();
}
