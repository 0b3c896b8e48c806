//! Grid-based geoid transformers
//!
//! Two implementations of [`HeightModelTransformer`]: [`GeoidFile`]
//! reads undulations straight out of a raw binary grid under a mutex,
//! [`GeoidLookup`] samples them through the altitude dataset cache.

use log::info;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::altitude::lookup::AltitudeLookup;
use crate::coordinate::types::LatPos;
use crate::errors::{CoordError, CoordResult};
use crate::geodesy::datum::HeightModel;
use crate::geodesy::ellipsoid::Ellipsoid;
use crate::height::HeightModelTransformer;
use crate::io::byte_order::{ByteOrder, ByteOrderHandler};

/// EGM2008 2.5 minute grid geometry: 90..-90 by 0..360
const EGM2008_ROWS: u32 = 4321;
const EGM2008_COLUMNS: u32 = 8640;
const EGM2008_STEP: f64 = 2.5 / 60.0;

/// Geoid undulations from a raw binary grid file
///
/// The file holds row-major f32 undulations, first row at 90 degrees
/// north, first column at 0 degrees east. Samples are read on demand
/// with direct seeks, serialized by a mutex; nothing is cached in
/// memory.
pub struct GeoidFile {
    reader: Mutex<BufReader<File>>,
    handler: Box<dyn ByteOrderHandler>,
    rows: u32,
    columns: u32,
    step: f64,
    model: HeightModel,
}

impl GeoidFile {
    /// Open an EGM2008 2.5 minute undulation grid
    pub fn open(path: &Path) -> CoordResult<Self> {
        Self::with_geometry(path, EGM2008_ROWS, EGM2008_COLUMNS, EGM2008_STEP, HeightModel::Egm2008)
    }

    /// Open a grid with explicit geometry, for other global models
    pub fn with_geometry(
        path: &Path,
        rows: u32,
        columns: u32,
        step: f64,
        model: HeightModel,
    ) -> CoordResult<Self> {
        let file = File::open(path)?;
        let expected = rows as u64 * columns as u64 * 4;
        let actual = file.metadata()?.len();
        if actual != expected {
            return Err(CoordError::GenericError(format!(
                "geoid grid {} has {} bytes, expected {}",
                path.display(),
                actual,
                expected
            )));
        }

        info!("Opened geoid grid {} ({}x{})", path.display(), rows, columns);

        Ok(GeoidFile {
            reader: Mutex::new(BufReader::new(file)),
            handler: ByteOrder::default().create_handler(),
            rows,
            columns,
            step,
            model,
        })
    }

    /// Undulation sample at a grid node
    pub fn index_offset(&self, row: i64, column: i64) -> CoordResult<f64> {
        let row = row.clamp(0, self.rows as i64 - 1);
        let column = column.rem_euclid(self.columns as i64);

        let mut reader = self.reader.lock().unwrap();
        reader.seek(SeekFrom::Start((row * self.columns as i64 + column) as u64 * 4))?;
        Ok(self.handler.read_f32(&mut *reader)? as f64)
    }

    /// Bilinear undulation at a position given in degrees
    pub fn offset(&self, lat_deg: f64, lon_deg: f64) -> CoordResult<f64> {
        if !(-90.0..=90.0).contains(&lat_deg) {
            return Err(CoordError::AltitudeMiss(lat_deg, lon_deg));
        }
        let lon = lon_deg.rem_euclid(360.0);

        // Row 0 is the north pole
        let row_pos = (90.0 - lat_deg) / self.step;
        let col_pos = lon / self.step;

        let row = row_pos.floor() as i64;
        let col = col_pos.floor() as i64;
        let row_frac = row_pos - row_pos.floor();
        let col_frac = col_pos - col_pos.floor();

        let v00 = self.index_offset(row, col)?;
        let v01 = self.index_offset(row, col + 1)?;
        let v10 = self.index_offset(row + 1, col)?;
        let v11 = self.index_offset(row + 1, col + 1)?;

        let north = v00 * (1.0 - col_frac) + v01 * col_frac;
        let south = v10 * (1.0 - col_frac) + v11 * col_frac;
        Ok(north * (1.0 - row_frac) + south * row_frac)
    }
}

impl HeightModelTransformer for GeoidFile {
    fn height_to_ellipsoid(
        &self,
        pos: &mut LatPos,
        model: HeightModel,
        _ellipsoid: Ellipsoid,
    ) -> CoordResult<()> {
        if model != self.model {
            return Err(CoordError::NoHeightTransformer(model.table_key().to_string()));
        }
        let offset = self.offset(pos.latitude.to_degrees(), pos.longitude.to_degrees())?;
        pos.altitude += offset;
        Ok(())
    }

    fn ellipsoid_to_height(
        &self,
        pos: &mut LatPos,
        model: HeightModel,
        _ellipsoid: Ellipsoid,
    ) -> CoordResult<()> {
        if model != self.model {
            return Err(CoordError::NoHeightTransformer(model.table_key().to_string()));
        }
        let offset = self.offset(pos.latitude.to_degrees(), pos.longitude.to_degrees())?;
        pos.altitude -= offset;
        Ok(())
    }
}

/// Geoid undulations served by the altitude dataset cache
///
/// Registered grid tiles are loaded and evicted on demand by the
/// cache; a query outside every registered tile is a miss, letting a
/// lower-ranked transformer take over.
pub struct GeoidLookup {
    lookup: Arc<AltitudeLookup>,
    model: HeightModel,
    /// Bilinear sampling unless disabled
    sample: bool,
}

impl GeoidLookup {
    pub fn new(lookup: Arc<AltitudeLookup>, model: HeightModel) -> Self {
        GeoidLookup { lookup, model, sample: true }
    }

    /// Build a lookup-backed geoid from a directory of ALT tiles
    pub fn from_directory(path: &Path, recursive: bool, model: HeightModel) -> CoordResult<Self> {
        let lookup = AltitudeLookup::new();
        lookup.add_directory(path, recursive)?;
        Ok(GeoidLookup::new(Arc::new(lookup), model))
    }

    /// Switch between bilinear sampling and nearest-node lookups
    pub fn set_sample(&mut self, sample: bool) {
        self.sample = sample;
    }

    pub fn lookup(&self) -> &Arc<AltitudeLookup> {
        &self.lookup
    }

    /// Undulation at a position given in radians
    pub fn offset_in_rad(&self, lat_rad: f64, lon_rad: f64) -> CoordResult<f64> {
        self.lookup.get_altitude(lat_rad, lon_rad, self.sample)
    }

    /// Undulation at a position given in degrees
    pub fn offset(&self, lat_deg: f64, lon_deg: f64) -> CoordResult<f64> {
        self.offset_in_rad(lat_deg.to_radians(), lon_deg.to_radians())
    }
}

impl HeightModelTransformer for GeoidLookup {
    fn height_to_ellipsoid(
        &self,
        pos: &mut LatPos,
        model: HeightModel,
        _ellipsoid: Ellipsoid,
    ) -> CoordResult<()> {
        if model != self.model {
            return Err(CoordError::NoHeightTransformer(model.table_key().to_string()));
        }
        let offset = self.offset_in_rad(pos.latitude, pos.longitude)?;
        pos.altitude += offset;
        Ok(())
    }

    fn ellipsoid_to_height(
        &self,
        pos: &mut LatPos,
        model: HeightModel,
        _ellipsoid: Ellipsoid,
    ) -> CoordResult<()> {
        if model != self.model {
            return Err(CoordError::NoHeightTransformer(model.table_key().to_string()));
        }
        let offset = self.offset_in_rad(pos.latitude, pos.longitude)?;
        pos.altitude -= offset;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::altitude::dataset::AltitudeDataset;
    use crate::altitude::format::LatLongInfo;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::io::Write;

    fn write_grid(path: &Path, rows: u32, columns: u32, values: &[f32]) {
        let mut file = File::create(path).unwrap();
        for v in values {
            file.write_f32::<LittleEndian>(*v).unwrap();
        }
        file.flush().unwrap();
    }

    #[test]
    fn test_geoid_file_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geoid.bin");

        // 3x4 grid, 90 degree step: row 0 at the north pole
        let values: Vec<f32> = (0..12).map(|i| i as f32).collect();
        write_grid(&path, 3, 4, &values);

        let geoid =
            GeoidFile::with_geometry(&path, 3, 4, 90.0, HeightModel::Egm2008).unwrap();

        // Exact nodes
        assert_eq!(geoid.offset(90.0, 0.0).unwrap(), 0.0);
        assert_eq!(geoid.offset(90.0, 90.0).unwrap(), 1.0);
        assert_eq!(geoid.offset(0.0, 0.0).unwrap(), 4.0);
        assert_eq!(geoid.offset(-90.0, 270.0).unwrap(), 11.0);

        // Longitude wraps around
        assert_eq!(geoid.offset(0.0, 360.0).unwrap(), 4.0);

        // Midpoint between (90,0)=0 and (0,0)=4
        assert_eq!(geoid.offset(45.0, 0.0).unwrap(), 2.0);
    }

    #[test]
    fn test_geoid_file_rejects_wrong_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        write_grid(&path, 1, 2, &[1.0, 2.0]);

        assert!(GeoidFile::with_geometry(&path, 3, 4, 90.0, HeightModel::Egm2008).is_err());
    }

    #[test]
    fn test_geoid_file_converts_altitude() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geoid.bin");
        write_grid(&path, 2, 2, &[30.0, 30.0, 30.0, 30.0]);

        let geoid =
            GeoidFile::with_geometry(&path, 2, 2, 180.0, HeightModel::Egm2008).unwrap();

        let mut pos = LatPos::from_degrees(45.0, 10.0, 100.0);
        geoid.height_to_ellipsoid(&mut pos, HeightModel::Egm2008, Ellipsoid::Wgs84).unwrap();
        assert!((pos.altitude - 130.0).abs() < 1e-9);

        geoid.ellipsoid_to_height(&mut pos, HeightModel::Egm2008, Ellipsoid::Wgs84).unwrap();
        assert!((pos.altitude - 100.0).abs() < 1e-9);

        // Model mismatch lets the dispatcher fall through
        assert!(geoid
            .height_to_ellipsoid(&mut pos, HeightModel::Egm96, Ellipsoid::Wgs84)
            .is_err());
    }

    #[test]
    fn test_geoid_lookup_over_cache() {
        let lookup = Arc::new(AltitudeLookup::new());
        let info = LatLongInfo {
            latitude: 59.0,
            longitude: 18.0,
            latitude_delta: 1.0,
            longitude_delta: 1.0,
            latitude_rows: 2,
            longitude_columns: 2,
        };
        lookup.add_dataset(AltitudeDataset::with_samples("", info, vec![24.0; 4]).unwrap());

        let geoid = GeoidLookup::new(Arc::clone(&lookup), HeightModel::Egm2008);

        let mut pos = LatPos::from_degrees(59.5, 18.5, 10.0);
        geoid.height_to_ellipsoid(&mut pos, HeightModel::Egm2008, Ellipsoid::Wgs84).unwrap();
        assert_eq!(pos.altitude, 34.0);

        // Outside every registered tile the conversion misses and the
        // altitude is untouched
        let mut outside = LatPos::from_degrees(0.0, 0.0, 10.0);
        assert!(geoid
            .height_to_ellipsoid(&mut outside, HeightModel::Egm2008, Ellipsoid::Wgs84)
            .is_err());
        assert_eq!(outside.altitude, 10.0);
        lookup.clear();
    }
}
