//! Ellipsoid and datum math on cartesian (ECEF) coordinates
//!
//! Pure functions: geodetic <-> geocentric closed forms, the Helmert
//! 7-parameter datum shift and the local East-North-Up frame utilities.

use crate::coordinate::types::{CartPos, LatPos, Matrix3, Vec3D};
use crate::errors::{CoordError, CoordResult};
use crate::geodesy::datum::GeodeticTransform;
use crate::geodesy::ellipsoid::EllipsoidParameters;

const ARCSEC_TO_RAD: f64 = std::f64::consts::PI / (180.0 * 3600.0);

/// Convert a geodetic position to geocentric cartesian coordinates
pub fn lat_to_cart(pos: &LatPos, e: &EllipsoidParameters) -> CartPos {
    let e2 = e.eccentricity_squared();

    let sin_lat = pos.latitude.sin();
    let cos_lat = pos.latitude.cos();
    let sin_lon = pos.longitude.sin();
    let cos_lon = pos.longitude.cos();

    // Radius of curvature in the prime vertical
    let n = e.semi_axis / (1.0 - e2 * sin_lat * sin_lat).sqrt();

    CartPos::new(
        (n + pos.altitude) * cos_lat * cos_lon,
        (n + pos.altitude) * cos_lat * sin_lon,
        (n * (1.0 - e2) + pos.altitude) * sin_lat,
    )
}

/// Convert a geocentric cartesian position to geodetic coordinates
///
/// Bowring's single-step method; round-trips with [`lat_to_cart`]
/// within 1e-6 m anywhere inside the valid latitude range.
pub fn cart_to_lat(pos: &CartPos, e: &EllipsoidParameters) -> CoordResult<LatPos> {
    let a = e.semi_axis;
    let b = e.semi_minor_axis();
    let e2 = e.eccentricity_squared();
    let ep2 = e.second_eccentricity_squared();

    let p = (pos.x * pos.x + pos.y * pos.y).sqrt();

    // On the polar axis the longitude is undefined; report the pole itself
    if p < 1e-9 {
        let lat = if pos.z >= 0.0 {
            std::f64::consts::FRAC_PI_2
        } else {
            -std::f64::consts::FRAC_PI_2
        };
        return Ok(LatPos::new(lat, 0.0, pos.z.abs() - b));
    }

    let lon = pos.y.atan2(pos.x);

    let theta = (pos.z * a).atan2(p * b);
    let sin_theta = theta.sin();
    let cos_theta = theta.cos();

    let lat = (pos.z + ep2 * b * sin_theta * sin_theta * sin_theta)
        .atan2(p - e2 * a * cos_theta * cos_theta * cos_theta);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();

    // The cosine form degrades near the poles; switch to the sine form there
    let altitude = if cos_lat.abs() > 1e-8 {
        p / cos_lat - n
    } else {
        pos.z / sin_lat - n * (1.0 - e2)
    };

    Ok(LatPos::new(lat, lon, altitude))
}

fn rotation_rad(transform: &GeodeticTransform) -> [f64; 3] {
    [
        transform.rotation[0] * ARCSEC_TO_RAD,
        transform.rotation[1] * ARCSEC_TO_RAD,
        transform.rotation[2] * ARCSEC_TO_RAD,
    ]
}

/// Apply the Helmert shift in its stored direction, WGS84 -> datum
///
/// Position vector convention: X' = T + (1 + s)(R * X).
pub fn wgs_to_other(pos: &CartPos, transform: &GeodeticTransform) -> CartPos {
    let [rx, ry, rz] = rotation_rad(transform);
    let [tx, ty, tz] = transform.translation;
    let scale = 1.0 + transform.scale_ppm * 1e-6;

    CartPos::new(
        tx + scale * (pos.x - rz * pos.y + ry * pos.z),
        ty + scale * (rz * pos.x + pos.y - rx * pos.z),
        tz + scale * (-ry * pos.x + rx * pos.y + pos.z),
    )
}

/// Invert the Helmert shift, datum -> WGS84
///
/// Uses the same parameter set and solves the forward relation exactly,
/// so a shift followed by its inverse reproduces the input to double
/// precision for every registered datum.
pub fn other_to_wgs(pos: &CartPos, transform: &GeodeticTransform) -> CartPos {
    let [rx, ry, rz] = rotation_rad(transform);
    let [tx, ty, tz] = transform.translation;
    let scale = 1.0 + transform.scale_ppm * 1e-6;

    let ux = (pos.x - tx) / scale;
    let uy = (pos.y - ty) / scale;
    let uz = (pos.z - tz) / scale;

    // Exact inverse of R = [[1,-rz,ry],[rz,1,-rx],[-ry,rx,1]] by cofactors
    let det = 1.0 + rx * rx + ry * ry + rz * rz;

    let x = ((1.0 + rx * rx) * ux + (rz + rx * ry) * uy + (rx * rz - ry) * uz) / det;
    let y = ((rx * ry - rz) * ux + (1.0 + ry * ry) * uy + (rx + ry * rz) * uz) / det;
    let z = ((ry + rx * rz) * ux + (ry * rz - rx) * uy + (1.0 + rz * rz) * uz) / det;

    CartPos::new(x, y, z)
}

/// Local East-North-Up basis at a geodetic position
///
/// The rows of the returned matrix are the east, north and up unit
/// vectors, so multiplying an ECEF delta by it yields ENU components.
pub fn orientation_matrix(pos: &LatPos) -> Matrix3 {
    let sin_lat = pos.latitude.sin();
    let cos_lat = pos.latitude.cos();
    let sin_lon = pos.longitude.sin();
    let cos_lon = pos.longitude.cos();

    Matrix3::new([
        [-sin_lon, cos_lon, 0.0],
        [-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat],
        [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat],
    ])
}

/// Local East-North-Up basis at a cartesian position
pub fn orientation_matrix_cart(pos: &CartPos, e: &EllipsoidParameters) -> CoordResult<Matrix3> {
    let latpos = cart_to_lat(pos, e)?;
    Ok(orientation_matrix(&latpos))
}

/// Express a cartesian position in the ENU tangent frame of an origin
pub fn cart_to_local(pos: &CartPos, origin: &LatPos, e: &EllipsoidParameters) -> Vec3D {
    let origin_cart = lat_to_cart(origin, e);
    let delta = Vec3D::from(*pos) - Vec3D::from(origin_cart);
    orientation_matrix(origin).mul_vec(delta)
}

/// Resolve an ENU tangent-frame position back to cartesian coordinates
pub fn local_to_cart(local: &Vec3D, origin: &LatPos, e: &EllipsoidParameters) -> CartPos {
    let origin_cart = lat_to_cart(origin, e);
    let delta = orientation_matrix(origin).transposed().mul_vec(*local);
    origin_cart + delta
}

/// Unit direction from one geodetic position towards another, expressed
/// in the ENU frame of the first
pub fn spherical_direction(from: &LatPos, to: &LatPos, e: &EllipsoidParameters) -> CoordResult<Vec3D> {
    let from_cart = lat_to_cart(from, e);
    let to_cart = lat_to_cart(to, e);
    spherical_direction_cart(&from_cart, &to_cart, e)
}

/// Unit direction between two cartesian positions in the ENU frame of
/// the first
pub fn spherical_direction_cart(
    from: &CartPos,
    to: &CartPos,
    e: &EllipsoidParameters,
) -> CoordResult<Vec3D> {
    let delta = Vec3D::from(*to) - Vec3D::from(*from);
    if delta.length() == 0.0 {
        return Err(CoordError::OutOfRange("direction between identical points".to_string()));
    }
    let basis = orientation_matrix_cart(from, e)?;
    Ok(basis.mul_vec(delta).normalized())
}
