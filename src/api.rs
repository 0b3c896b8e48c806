//! Descriptor-to-descriptor conversion facade

use crate::coordinate::converter::Coordinate;
use crate::coordinate::descriptor;
use crate::coordinate::system::{CoordSystem, CoordSystemMetaData, CoordType};
use crate::coordinate::types::{CartPos, LatPos, ProjPos, UtmPos, Vec3D};
use crate::errors::{CoordError, CoordResult};

/// Convert a coordinate triple between two descriptor strings
///
/// The triple is interpreted per representation: geocentric `(x, y, z)`
/// in meters, geodetic `(latitude, longitude, altitude)` in degrees and
/// meters, projected and UTM `(northing, easting, height)` in meters,
/// flat-earth `(x east, y north, z up)` in meters against the origin in
/// the descriptor. MGRS has no numeric triple; use [`Coordinate`]
/// directly for MGRS strings.
///
/// ```
/// use coordkit::convert;
///
/// let (northing, easting, _h) =
///     convert(59.33, 18.06, 0.0, "WGS84:GEOD,ELLIPSOID", "SWEREF99:UTM,ZONE33,N").unwrap();
/// assert!((easting - 674079.3).abs() < 1.0);
/// assert!((northing - 6580798.4).abs() < 1.0);
/// ```
pub fn convert(
    x: f64,
    y: f64,
    z: f64,
    source_system: &str,
    destination_system: &str,
) -> CoordResult<(f64, f64, f64)> {
    let (source, source_meta) = descriptor::parse(source_system)?;
    let (destination, destination_meta) = descriptor::parse(destination_system)?;

    let mut coord = Coordinate::new();
    set_position(&mut coord, x, y, z, &source, &source_meta)?;
    get_position(&mut coord, &destination, &destination_meta)
}

fn set_position(
    coord: &mut Coordinate,
    x: f64,
    y: f64,
    z: f64,
    system: &CoordSystem,
    meta: &CoordSystemMetaData,
) -> CoordResult<()> {
    match system.coord_type {
        CoordType::Geocentric => {
            coord.set_cart_pos(&CartPos::new(x, y, z), system.datum);
        }
        CoordType::Geodetic => {
            coord.set_lat_pos(&LatPos::from_degrees(x, y, z), system.datum);
        }
        CoordType::Projected => {
            coord.set_proj_pos(&ProjPos::new(x, y, z), system.projection);
        }
        CoordType::Utm => {
            let (zone, north) = meta
                .utm()
                .filter(|(zone, _)| *zone >= 1)
                .ok_or_else(|| CoordError::DescriptorParse("UTM source needs a zone".to_string()))?;
            coord.set_utm_pos(&UtmPos::new(zone, north, x, y, z), system.datum);
        }
        CoordType::FlatEarth => {
            coord.set_flat_earth_pos(&Vec3D::new(x, y, z), meta, system.datum);
        }
        CoordType::Mgrs => {
            return Err(CoordError::GenericError(
                "an MGRS position is a string, not a numeric triple".to_string(),
            ));
        }
    }
    Ok(())
}

fn get_position(
    coord: &mut Coordinate,
    system: &CoordSystem,
    meta: &CoordSystemMetaData,
) -> CoordResult<(f64, f64, f64)> {
    match system.coord_type {
        CoordType::Geocentric => {
            let pos = coord.get_cart_pos(system.datum)?;
            Ok((pos.x, pos.y, pos.z))
        }
        CoordType::Geodetic => {
            let pos = coord.get_lat_pos(system.datum)?;
            Ok((pos.latitude.to_degrees(), pos.longitude.to_degrees(), pos.altitude))
        }
        CoordType::Projected => {
            let pos = coord.get_proj_pos(system.projection)?;
            Ok((pos.northing, pos.easting, pos.height))
        }
        CoordType::Utm => {
            if let Some((zone, north)) = meta.utm() {
                if zone >= 1 {
                    coord.set_pref_utm_zone(Some(zone));
                    coord.set_pref_utm_hemisphere(Some(north));
                }
            }
            let pos = coord.get_utm_pos(system.datum)?;
            Ok((pos.northing, pos.easting, pos.height))
        }
        CoordType::FlatEarth => {
            let pos = coord.get_flat_earth_pos(meta, system.datum)?;
            Ok((pos.x, pos.y, pos.z))
        }
        CoordType::Mgrs => Err(CoordError::GenericError(
            "an MGRS position is a string, not a numeric triple".to_string(),
        )),
    }
}
