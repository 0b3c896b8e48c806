//! Reference ellipsoids

use crate::errors::{CoordError, CoordResult};
use crate::geodesy::parameters::PARAMETERS;

/// Identifier for the reference ellipsoids known to the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ellipsoid {
    /// WGS 84 (EPSG:4326)
    Wgs84,
    /// GRS 80
    Grs80,
    /// Bessel 1841 (EPSG:7004)
    Bessel1841,
    /// Clarke 1866 (EPSG:7008)
    Clarke1866,
    /// Airy 1830 (EPSG:7001)
    Airy1830,
    /// WGS 72 (EPSG:4985)
    Wgs72,
    /// Caller-supplied parameters
    UserDefined,
}

/// Defining constants of a reference ellipsoid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipsoidParameters {
    /// Semi-major axis in meters
    pub semi_axis: f64,
    /// Inverse flattening 1/f
    pub inverse_flattening: f64,
}

impl EllipsoidParameters {
    pub fn new(semi_axis: f64, inverse_flattening: f64) -> Self {
        EllipsoidParameters { semi_axis, inverse_flattening }
    }

    /// Flattening f
    pub fn flattening(&self) -> f64 {
        1.0 / self.inverse_flattening
    }

    /// Semi-minor axis b = a(1 - f)
    pub fn semi_minor_axis(&self) -> f64 {
        self.semi_axis * (1.0 - self.flattening())
    }

    /// First eccentricity squared e^2 = f(2 - f)
    pub fn eccentricity_squared(&self) -> f64 {
        let f = self.flattening();
        f * (2.0 - f)
    }

    /// Second eccentricity squared e'^2 = e^2 / (1 - e^2)
    pub fn second_eccentricity_squared(&self) -> f64 {
        let e2 = self.eccentricity_squared();
        e2 / (1.0 - e2)
    }
}

impl Ellipsoid {
    /// The table key used in coordinate_parameters.toml
    pub fn table_key(&self) -> &'static str {
        match self {
            Ellipsoid::Wgs84 => "WGS84",
            Ellipsoid::Grs80 => "GRS80",
            Ellipsoid::Bessel1841 => "BESSEL_1841",
            Ellipsoid::Clarke1866 => "CLARKE_1866",
            Ellipsoid::Airy1830 => "AIRY_1830",
            Ellipsoid::Wgs72 => "WGS72",
            Ellipsoid::UserDefined => "USER_DEFINED",
        }
    }

    pub fn from_table_key(key: &str) -> Option<Ellipsoid> {
        match key {
            "WGS84" => Some(Ellipsoid::Wgs84),
            "GRS80" => Some(Ellipsoid::Grs80),
            "BESSEL_1841" => Some(Ellipsoid::Bessel1841),
            "CLARKE_1866" => Some(Ellipsoid::Clarke1866),
            "AIRY_1830" => Some(Ellipsoid::Airy1830),
            "WGS72" => Some(Ellipsoid::Wgs72),
            _ => None,
        }
    }

    /// Resolve the defining constants from the parameter table
    ///
    /// `UserDefined` has no table entry; callers carrying a user-defined
    /// ellipsoid must pass its parameters explicitly.
    pub fn parameters(&self) -> CoordResult<EllipsoidParameters> {
        PARAMETERS
            .ellipsoids
            .get(self.table_key())
            .copied()
            .ok_or_else(|| CoordError::UnknownDatum(self.table_key().to_string()))
    }
}
