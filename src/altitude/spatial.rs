//! Spatial index over registered altitude datasets
//!
//! Bounding boxes are axis-aligned in lat/long degrees. The index is a
//! registration-ordered list scanned newest first, so when two
//! datasets overlap the most recently registered one wins.

use std::sync::Arc;

use crate::altitude::dataset::AltitudeDataset;

#[derive(Default)]
pub(crate) struct SpatialIndex {
    entries: Vec<Arc<AltitudeDataset>>,
    latitude_min: f64,
    latitude_max: f64,
    longitude_min: f64,
    longitude_max: f64,
}

impl SpatialIndex {
    pub fn new() -> Self {
        SpatialIndex::default()
    }

    pub fn insert(&mut self, dataset: Arc<AltitudeDataset>) {
        let info = dataset.info();
        if self.entries.is_empty() {
            self.latitude_min = info.latitude;
            self.latitude_max = info.latitude_max();
            self.longitude_min = info.longitude;
            self.longitude_max = info.longitude_max();
        } else {
            self.latitude_min = self.latitude_min.min(info.latitude);
            self.latitude_max = self.latitude_max.max(info.latitude_max());
            self.longitude_min = self.longitude_min.min(info.longitude);
            self.longitude_max = self.longitude_max.max(info.longitude_max());
        }
        self.entries.push(dataset);
    }

    /// Dataset covering the point, most recently registered first
    pub fn find(&self, latitude: f64, longitude: f64) -> Option<Arc<AltitudeDataset>> {
        self.entries
            .iter()
            .rev()
            .find(|d| d.info().contains(latitude, longitude))
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AltitudeDataset>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        *self = SpatialIndex::default();
    }

    pub fn latitude_min(&self) -> f64 {
        self.latitude_min
    }

    pub fn latitude_max(&self) -> f64 {
        self.latitude_max
    }

    pub fn longitude_min(&self) -> f64 {
        self.longitude_min
    }

    pub fn longitude_max(&self) -> f64 {
        self.longitude_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::altitude::format::LatLongInfo;

    fn dataset(lat: f64, lon: f64, value: f32) -> Arc<AltitudeDataset> {
        let info = LatLongInfo {
            latitude: lat,
            longitude: lon,
            latitude_delta: 1.0,
            longitude_delta: 1.0,
            latitude_rows: 2,
            longitude_columns: 2,
        };
        Arc::new(AltitudeDataset::with_samples("", info, vec![value; 4]).unwrap())
    }

    #[test]
    fn test_find_and_extents() {
        let mut index = SpatialIndex::new();
        index.insert(dataset(59.0, 18.0, 1.0));
        index.insert(dataset(40.0, -75.0, 2.0));

        assert!(index.find(59.5, 18.5).is_some());
        assert!(index.find(40.5, -74.5).is_some());
        assert!(index.find(0.0, 0.0).is_none());

        assert_eq!(index.latitude_min(), 40.0);
        assert_eq!(index.latitude_max(), 60.0);
        assert_eq!(index.longitude_min(), -75.0);
        assert_eq!(index.longitude_max(), 19.0);
    }

    #[test]
    fn test_overlap_prefers_most_recently_registered() {
        let mut index = SpatialIndex::new();
        let first = dataset(59.0, 18.0, 1.0);
        let second = dataset(59.0, 18.0, 2.0);
        index.insert(Arc::clone(&first));
        index.insert(Arc::clone(&second));

        let found = index.find(59.5, 18.5).unwrap();
        assert_eq!(found.id(), second.id());
    }

    #[test]
    fn test_clear_resets() {
        let mut index = SpatialIndex::new();
        index.insert(dataset(59.0, 18.0, 1.0));
        index.clear();

        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert!(index.find(59.5, 18.5).is_none());
    }
}
