//! Gauss-Krueger (transverse Mercator) projections
//!
//! Snyder series forward projection and an iterative inverse. The
//! inverse solves the footpoint latitude by bounded Newton iteration;
//! the convergence tolerance is caller selectable.

use std::f64::consts::PI;

use crate::coordinate::types::{LatPos, UtmPos};
use crate::errors::{CoordError, CoordResult};
use crate::geodesy::datum::GeodeticDatum;
use crate::geodesy::ellipsoid::EllipsoidParameters;
use crate::geodesy::parameters::PARAMETERS;

/// Default tolerance for the iterative projection inverse, radians
pub const DEFAULT_CONVERGENCE: f64 = 1e-5;

/// Iteration bound for the footpoint latitude solver
const MAX_ITERATIONS: u32 = 16;

/// Latitudes closer to a pole than this cannot be projected
const MAX_PROJECTED_LATITUDE: f64 = 89.99 * PI / 180.0;

/// UTM is defined between 80 degrees south and 84 degrees north
const UTM_LATITUDE_MIN: f64 = -80.0 * PI / 180.0;
const UTM_LATITUDE_MAX: f64 = 84.0 * PI / 180.0;

/// The named flat projections known to the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlatProjection {
    /// RT90 2.5 gon V, the default Swedish grid
    Rt90,
    Sweref99,
    /// Zone-dependent; use the UTM conversion entry points
    Utm,
    Osgb36,
    Rt90Gon0,
    Rt90Gon5West,
    Rt90Gon75West,
    Rt90Gon25East,
    Rt90Gon5East,
    UserDefined,
}

impl FlatProjection {
    /// The table key used in coordinate_parameters.toml
    pub fn table_key(&self) -> &'static str {
        match self {
            FlatProjection::Rt90 => "RT90",
            FlatProjection::Sweref99 => "SWEREF99",
            FlatProjection::Utm => "UTM",
            FlatProjection::Osgb36 => "OSGB36",
            FlatProjection::Rt90Gon0 => "RT90_0_GON",
            FlatProjection::Rt90Gon5West => "RT90_5_GON_V",
            FlatProjection::Rt90Gon75West => "RT90_7_5_GON_V",
            FlatProjection::Rt90Gon25East => "RT90_2_5_GON_O",
            FlatProjection::Rt90Gon5East => "RT90_5_GON_O",
            FlatProjection::UserDefined => "USER_DEFINED",
        }
    }

    pub fn from_table_key(key: &str) -> Option<FlatProjection> {
        match key {
            "RT90" => Some(FlatProjection::Rt90),
            "SWEREF99" => Some(FlatProjection::Sweref99),
            "UTM" => Some(FlatProjection::Utm),
            "OSGB36" => Some(FlatProjection::Osgb36),
            "RT90_0_GON" => Some(FlatProjection::Rt90Gon0),
            "RT90_5_GON_V" => Some(FlatProjection::Rt90Gon5West),
            "RT90_7_5_GON_V" => Some(FlatProjection::Rt90Gon75West),
            "RT90_2_5_GON_O" => Some(FlatProjection::Rt90Gon25East),
            "RT90_5_GON_O" => Some(FlatProjection::Rt90Gon5East),
            _ => None,
        }
    }

    /// Resolve the projection parameters from the table
    ///
    /// `Utm` is zone dependent and `UserDefined` lives on the engine
    /// instance; neither has a table entry.
    pub fn parameters(&self) -> CoordResult<GaussProjection> {
        PARAMETERS
            .projections
            .get(self.table_key())
            .copied()
            .ok_or_else(|| CoordError::UnknownProjection(self.table_key().to_string()))
    }
}

/// Parameter set for one Gauss conformal projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussProjection {
    pub datum: GeodeticDatum,
    /// Longitude of the central meridian, radians
    pub central_meridian: f64,
    /// Latitude origin, radians
    pub latitude_origin: f64,
    pub scale_on_central_meridian: f64,
    /// Meters
    pub false_northing: f64,
    /// Meters
    pub false_easting: f64,
}

impl GaussProjection {
    /// The projection underlying one UTM zone
    pub fn utm(zone: i32, north: bool) -> GaussProjection {
        GaussProjection {
            datum: GeodeticDatum::Wgs84Ellipsoid,
            central_meridian: ((zone * 6 - 183) as f64).to_radians(),
            latitude_origin: 0.0,
            scale_on_central_meridian: 0.9996,
            false_northing: if north { 0.0 } else { 10_000_000.0 },
            false_easting: 500_000.0,
        }
    }
}

/// Natural UTM zone for a longitude in radians
pub fn utm_zone_for(longitude: f64) -> i32 {
    let mut deg = longitude.to_degrees() % 360.0;
    if deg >= 180.0 {
        deg -= 360.0;
    } else if deg < -180.0 {
        deg += 360.0;
    }
    let zone = ((deg + 180.0) / 6.0).floor() as i32 + 1;
    zone.clamp(1, 60)
}

/// Meridian arc length from the equator, Snyder 3-21
fn meridian_arc(lat: f64, e: &EllipsoidParameters) -> f64 {
    let a = e.semi_axis;
    let e2 = e.eccentricity_squared();
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    a * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

/// Meridian radius of curvature, the derivative of the arc length
fn meridian_curvature(lat: f64, e: &EllipsoidParameters) -> f64 {
    let e2 = e.eccentricity_squared();
    let s = lat.sin();
    e.semi_axis * (1.0 - e2) / (1.0 - e2 * s * s).powf(1.5)
}

/// Solve the footpoint latitude for a given meridian arc length
///
/// Newton iteration, stopping when the step falls below `tolerance`;
/// the iteration count is bounded and exceeding it is an error.
fn footpoint_latitude(arc: f64, e: &EllipsoidParameters, tolerance: f64) -> CoordResult<f64> {
    let a = e.semi_axis;
    let e2 = e.eccentricity_squared();
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    let mut lat = arc / (a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    for _ in 0..MAX_ITERATIONS {
        let step = (arc - meridian_arc(lat, e)) / meridian_curvature(lat, e);
        lat += step;
        if step.abs() <= tolerance {
            return Ok(lat);
        }
    }

    Err(CoordError::NoConvergence)
}

/// Project a geodetic position; returns (northing, easting) in meters
pub fn lat_to_gauss(
    pos: &LatPos,
    proj: &GaussProjection,
    e: &EllipsoidParameters,
) -> CoordResult<(f64, f64)> {
    if pos.latitude.abs() > MAX_PROJECTED_LATITUDE {
        return Err(CoordError::OutOfRange("latitude too close to the pole".to_string()));
    }

    let mut dlon = pos.longitude - proj.central_meridian;
    while dlon > PI {
        dlon -= 2.0 * PI;
    }
    while dlon < -PI {
        dlon += 2.0 * PI;
    }
    if dlon.abs() > 0.5 {
        return Err(CoordError::OutOfRange(
            "longitude too far from the central meridian".to_string(),
        ));
    }

    let k0 = proj.scale_on_central_meridian;
    let e2 = e.eccentricity_squared();
    let ep2 = e.second_eccentricity_squared();

    let sin_lat = pos.latitude.sin();
    let cos_lat = pos.latitude.cos();
    let tan_lat = sin_lat / cos_lat;

    let n = e.semi_axis / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = ep2 * cos_lat * cos_lat;
    let a_term = dlon * cos_lat;

    let a2 = a_term * a_term;
    let a3 = a2 * a_term;
    let a4 = a3 * a_term;
    let a5 = a4 * a_term;
    let a6 = a5 * a_term;

    let m = meridian_arc(pos.latitude, e);
    let m0 = meridian_arc(proj.latitude_origin, e);

    let easting = proj.false_easting
        + k0 * n
            * (a_term + (1.0 - t + c) * a3 / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a5 / 120.0);

    let northing = proj.false_northing
        + k0 * (m - m0
            + n * tan_lat
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0));

    Ok((northing, easting))
}

/// Invert a projected position back to geodetic coordinates
///
/// `tolerance` bounds the footpoint iteration; pass
/// [`DEFAULT_CONVERGENCE`] unless the caller needs something else.
pub fn gauss_to_lat(
    northing: f64,
    easting: f64,
    proj: &GaussProjection,
    e: &EllipsoidParameters,
    tolerance: f64,
) -> CoordResult<LatPos> {
    let k0 = proj.scale_on_central_meridian;
    let e2 = e.eccentricity_squared();
    let ep2 = e.second_eccentricity_squared();

    let m0 = meridian_arc(proj.latitude_origin, e);
    let arc = m0 + (northing - proj.false_northing) / k0;

    let fp = footpoint_latitude(arc, e, tolerance)?;

    let sin_fp = fp.sin();
    let cos_fp = fp.cos();
    if cos_fp.abs() < 1e-10 {
        return Err(CoordError::OutOfRange("footpoint at the pole".to_string()));
    }
    let tan_fp = sin_fp / cos_fp;

    let c1 = ep2 * cos_fp * cos_fp;
    let t1 = tan_fp * tan_fp;
    let n1 = e.semi_axis / (1.0 - e2 * sin_fp * sin_fp).sqrt();
    let r1 = e.semi_axis * (1.0 - e2) / (1.0 - e2 * sin_fp * sin_fp).powf(1.5);
    let d = (easting - proj.false_easting) / (n1 * k0);

    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d3 * d;
    let d5 = d4 * d;
    let d6 = d5 * d;

    let latitude = fp
        - (n1 * tan_fp / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let longitude = proj.central_meridian
        + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d5
                / 120.0)
            / cos_fp;

    Ok(LatPos::new(latitude, longitude, 0.0))
}

/// Project a geodetic position into UTM
///
/// `pref_zone`/`pref_north` bias the output to a caller preferred zone
/// or hemisphere instead of the natural one for the position; used to
/// keep points near a zone boundary in one consistent local zone.
pub fn lat_to_utm(
    pos: &LatPos,
    e: &EllipsoidParameters,
    pref_zone: Option<i32>,
    pref_north: Option<bool>,
) -> CoordResult<UtmPos> {
    if pos.latitude < UTM_LATITUDE_MIN || pos.latitude > UTM_LATITUDE_MAX {
        return Err(CoordError::OutOfRange(format!(
            "latitude {:.4} outside the UTM range",
            pos.latitude.to_degrees()
        )));
    }

    let zone = match pref_zone {
        Some(z) if (1..=60).contains(&z) => z,
        Some(z) => {
            return Err(CoordError::OutOfRange(format!("preferred UTM zone {} invalid", z)))
        }
        None => utm_zone_for(pos.longitude),
    };
    let north = pref_north.unwrap_or(pos.latitude >= 0.0);

    let proj = GaussProjection::utm(zone, north);
    let (northing, easting) = lat_to_gauss(pos, &proj, e)?;

    Ok(UtmPos::new(zone, north, northing, easting, pos.altitude))
}

/// Invert a UTM position back to geodetic coordinates
pub fn utm_to_lat(pos: &UtmPos, e: &EllipsoidParameters, tolerance: f64) -> CoordResult<LatPos> {
    if !(1..=60).contains(&pos.zone) {
        return Err(CoordError::OutOfRange(format!("UTM zone {} out of range", pos.zone)));
    }

    let proj = GaussProjection::utm(pos.zone, pos.north);
    let mut latpos = gauss_to_lat(pos.northing, pos.easting, &proj, e, tolerance)?;
    latpos.altitude = pos.height;
    Ok(latpos)
}
