//! MGRS string codec
//!
//! Maps UTM positions to Military Grid Reference System strings and
//! back: grid zone designator, 100 km square identifier and an
//! even-digit easting/northing offset at selectable precision.

use crate::coordinate::types::{LatPos, UtmPos};
use crate::errors::{CoordError, CoordResult};
use crate::geodesy::ellipsoid::EllipsoidParameters;
use crate::geodesy::gauss::{lat_to_utm, utm_to_lat, DEFAULT_CONVERGENCE};

/// Latitude band letters, 8 degree bands from 80S; X extends to 84N
const BAND_LETTERS: &[u8] = b"CDEFGHJKLMNPQRSTUVWX";

/// 100 km row letters, 2000 km cycle
const ROW_LETTERS: &[u8] = b"ABCDEFGHJKLMNPQRSTUV";

/// 100 km column letter sets, selected by zone number modulo 3
const COLUMN_SETS: [&[u8]; 3] = [b"ABCDEFGH", b"JKLMNPQR", b"STUVWXYZ"];

const SQUARE: f64 = 100_000.0;
const ROW_CYCLE: f64 = 2_000_000.0;

/// Index into [`BAND_LETTERS`] for a latitude in radians
fn band_index(latitude: f64) -> CoordResult<usize> {
    let deg = latitude.to_degrees();
    if !(-80.0..=84.0).contains(&deg) {
        return Err(CoordError::OutOfRange(format!("latitude {:.4} outside the MGRS bands", deg)));
    }
    // The X band is 12 degrees tall
    Ok((((deg + 80.0) / 8.0).floor() as usize).min(19))
}

/// Lowest latitude of a band, degrees
fn band_bottom(index: usize) -> f64 {
    (index as f64) * 8.0 - 80.0
}

/// Encode a UTM position as an MGRS string
///
/// `precision` is the digit count per axis, 0..=5 (5 digits resolve to
/// one meter). With `include_altitude` the height is appended as
/// `+<meters>` with one decimal.
pub fn utm_to_mgrs(
    pos: &UtmPos,
    e: &EllipsoidParameters,
    precision: usize,
    include_altitude: bool,
) -> CoordResult<String> {
    if precision > 5 {
        return Err(CoordError::OutOfRange(format!("MGRS precision {} out of range", precision)));
    }

    // The latitude band comes from the inverse projection
    let latpos = utm_to_lat(pos, e, DEFAULT_CONVERGENCE)?;
    let band = band_index(latpos.latitude)?;

    let column = (pos.easting / SQUARE).floor() as i64;
    if !(1..=8).contains(&column) {
        return Err(CoordError::OutOfRange(format!("easting {:.1} outside the zone", pos.easting)));
    }
    if !(0.0..10_000_000.0).contains(&pos.northing) {
        return Err(CoordError::OutOfRange(format!("northing {:.1} out of range", pos.northing)));
    }

    let column_set = COLUMN_SETS[((pos.zone - 1) % 3) as usize];
    let column_letter = column_set[(column - 1) as usize] as char;

    let mut row = ((pos.northing / SQUARE).floor() as i64) % 20;
    if pos.zone % 2 == 0 {
        row = (row + 5) % 20;
    }
    let row_letter = ROW_LETTERS[row as usize] as char;

    let mut out = format!(
        "{}{}{}{}",
        pos.zone, BAND_LETTERS[band] as char, column_letter, row_letter
    );

    if precision > 0 {
        let divisor = 10f64.powi(5 - precision as i32);
        let e_digits = ((pos.easting % SQUARE) / divisor).floor() as u64;
        let n_digits = ((pos.northing % SQUARE) / divisor).floor() as u64;
        out.push_str(&format!("{:0width$}", e_digits, width = precision));
        out.push_str(&format!("{:0width$}", n_digits, width = precision));
    }

    if include_altitude {
        out.push_str(&format!("+{:.1}", pos.height));
    }

    Ok(out)
}

/// Decode an MGRS string back to a UTM position
///
/// The decoded coordinates are the south-west corner of the referenced
/// cell. An altitude suffix (`+<meters>`) is accepted and applied
/// whether or not it was requested when encoding.
pub fn mgrs_to_utm(mgrs: &str, e: &EllipsoidParameters) -> CoordResult<UtmPos> {
    let text: String = mgrs.trim().to_uppercase();
    let bytes = text.as_bytes();

    // Optional altitude suffix
    let (body, height) = match text.find('+') {
        Some(idx) => {
            let h = text[idx + 1..]
                .parse::<f64>()
                .map_err(|_| CoordError::MgrsParse(mgrs.to_string(), idx + 1))?;
            (&bytes[..idx], h)
        }
        None => (bytes, 0.0),
    };

    // Zone number: one or two leading digits
    let digit_len = body.iter().take_while(|b| b.is_ascii_digit()).count();
    if digit_len == 0 || digit_len > 2 {
        return Err(CoordError::MgrsParse(mgrs.to_string(), 0));
    }
    let zone: i32 = std::str::from_utf8(&body[..digit_len])
        .unwrap()
        .parse()
        .map_err(|_| CoordError::MgrsParse(mgrs.to_string(), 0))?;
    if !(1..=60).contains(&zone) {
        return Err(CoordError::MgrsParse(mgrs.to_string(), 0));
    }

    if body.len() < digit_len + 3 {
        return Err(CoordError::MgrsParse(mgrs.to_string(), body.len()));
    }

    let band = BAND_LETTERS
        .iter()
        .position(|&b| b == body[digit_len])
        .ok_or_else(|| CoordError::MgrsParse(mgrs.to_string(), digit_len))?;
    let north = band >= 10;

    let column_set = COLUMN_SETS[((zone - 1) % 3) as usize];
    let column = column_set
        .iter()
        .position(|&b| b == body[digit_len + 1])
        .ok_or_else(|| CoordError::MgrsParse(mgrs.to_string(), digit_len + 1))?;

    let mut row = ROW_LETTERS
        .iter()
        .position(|&b| b == body[digit_len + 2])
        .ok_or_else(|| CoordError::MgrsParse(mgrs.to_string(), digit_len + 2))?
        as i64;
    if zone % 2 == 0 {
        row = (row - 5).rem_euclid(20);
    }

    // Even-digit offset, half easting and half northing
    let digits = &body[digit_len + 3..];
    if digits.len() % 2 != 0 || digits.len() > 10 {
        return Err(CoordError::MgrsParse(mgrs.to_string(), digit_len + 3));
    }
    if let Some(bad) = digits.iter().position(|b| !b.is_ascii_digit()) {
        return Err(CoordError::MgrsParse(mgrs.to_string(), digit_len + 3 + bad));
    }

    let precision = digits.len() / 2;
    let scale = 10f64.powi(5 - precision as i32);
    let parse_half = |half: &[u8]| -> f64 {
        let text = std::str::from_utf8(half).unwrap();
        if text.is_empty() {
            0.0
        } else {
            text.parse::<u64>().unwrap() as f64 * scale
        }
    };
    let e_offset = parse_half(&digits[..precision]);
    let n_offset = parse_half(&digits[precision..]);

    let easting = ((column + 1) as f64) * SQUARE + e_offset;

    // Resolve the 2000 km row ambiguity against the band's lowest
    // northing, taken on the central meridian where it is smallest
    let bottom = LatPos::from_degrees(band_bottom(band), (zone * 6 - 183) as f64, 0.0);
    let min_northing = if band == 10 {
        // Band N starts exactly at the equator
        0.0
    } else {
        lat_to_utm(&bottom, e, Some(zone), Some(north))?.northing
    };

    let mut northing = (row as f64) * SQUARE + n_offset;
    while northing + 1e-6 < min_northing {
        northing += ROW_CYCLE;
    }
    if northing >= 10_000_000.0 {
        return Err(CoordError::MgrsParse(mgrs.to_string(), digit_len + 2));
    }

    Ok(UtmPos::new(zone, north, northing, easting, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::ellipsoid::Ellipsoid;

    fn wgs84() -> EllipsoidParameters {
        Ellipsoid::Wgs84.parameters().unwrap()
    }

    #[test]
    fn test_equator_center_meridian() {
        let e = wgs84();
        let utm = UtmPos::new(33, true, 0.0, 500000.0, 0.0);
        let mgrs = utm_to_mgrs(&utm, &e, 5, false).unwrap();

        assert_eq!(mgrs, "33NWA0000000000");
        assert_eq!(mgrs.len(), 15);

        let back = mgrs_to_utm(&mgrs, &e).unwrap();
        assert_eq!(back.zone, 33);
        assert!(back.north);
        assert!((back.easting - 500000.0).abs() < 1.0);
        assert!(back.northing.abs() < 1.0);
    }

    #[test]
    fn test_precision_selects_length() {
        let e = wgs84();
        let utm = UtmPos::new(33, true, 6580798.0, 674079.0, 0.0);

        for precision in 0..=5 {
            let mgrs = utm_to_mgrs(&utm, &e, precision, false).unwrap();
            assert_eq!(mgrs.len(), 5 + 2 * precision, "precision {}", precision);
        }
    }

    #[test]
    fn test_stockholm_square() {
        let e = wgs84();
        let utm = UtmPos::new(33, true, 6580798.387, 674079.257, 0.0);
        let mgrs = utm_to_mgrs(&utm, &e, 5, false).unwrap();

        assert_eq!(mgrs, "33VXF7407980798");
    }

    #[test]
    fn test_cape_town_square() {
        // Even zone in the southern hemisphere exercises the row offset
        let e = wgs84();
        let utm = UtmPos::new(34, false, 6245888.0, 259583.0, 0.0);
        let mgrs = utm_to_mgrs(&utm, &e, 4, false).unwrap();

        assert_eq!(mgrs, "34HBH59584588");

        let back = mgrs_to_utm(&mgrs, &e).unwrap();
        assert_eq!(back.zone, 34);
        assert!(!back.north);
        assert!((back.easting - 259580.0).abs() < 10.0);
        assert!((back.northing - 6245880.0).abs() < 10.0);
    }

    #[test]
    fn test_round_trip_within_grid_resolution() {
        let e = wgs84();
        let points = [
            UtmPos::new(33, true, 6580798.387, 674079.257, 0.0),
            UtmPos::new(18, true, 4307395.0, 323394.0, 0.0),
            UtmPos::new(34, false, 6245888.045, 259583.222, 0.0),
            UtmPos::new(31, true, 5000.0, 500000.0, 0.0),
        ];

        for utm in points {
            let mgrs = utm_to_mgrs(&utm, &e, 5, false).unwrap();
            let back = mgrs_to_utm(&mgrs, &e).unwrap();

            assert_eq!(back.zone, utm.zone);
            assert_eq!(back.north, utm.north);
            // 5 digits resolve to one meter; the decode is the SW corner
            assert!((back.easting - utm.easting).abs() < 1.0, "{}", mgrs);
            assert!((back.northing - utm.northing).abs() < 1.0, "{}", mgrs);
        }
    }

    #[test]
    fn test_altitude_suffix() {
        let e = wgs84();
        let utm = UtmPos::new(33, true, 6580798.0, 674079.0, 44.5);
        let mgrs = utm_to_mgrs(&utm, &e, 5, true).unwrap();

        assert!(mgrs.ends_with("+44.5"));

        let back = mgrs_to_utm(&mgrs, &e).unwrap();
        assert_eq!(back.height, 44.5);

        // The suffix is optional on decode
        let plain = utm_to_mgrs(&utm, &e, 5, false).unwrap();
        assert_eq!(mgrs_to_utm(&plain, &e).unwrap().height, 0.0);
    }

    #[test]
    fn test_malformed_strings_fail() {
        let e = wgs84();

        for bad in [
            "",
            "XYZ123",
            "99NWA0000000000",  // zone out of range
            "33IWA0000000000",  // I is not a band letter
            "33NIA0000000000",  // I is not a column letter
            "33NWA000",         // odd digit count
            "33NWA00x0000000",  // non-digit offset
            "33NWA000000000000", // too many digits
            "33NWA00000+bad",   // malformed altitude
        ] {
            assert!(mgrs_to_utm(bad, &e).is_err(), "{:?} should fail", bad);
        }
    }

    #[test]
    fn test_parse_error_reports_position() {
        let e = wgs84();
        match mgrs_to_utm("33NIA0000000000", &e) {
            Err(CoordError::MgrsParse(_, pos)) => assert_eq!(pos, 3),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_band_x_is_twelve_degrees() {
        let e = wgs84();
        let pos = LatPos::from_degrees(83.0, 15.0, 0.0);
        let utm = lat_to_utm(&pos, &e, None, None).unwrap();
        let mgrs = utm_to_mgrs(&utm, &e, 2, false).unwrap();

        assert!(mgrs.starts_with("33X"), "{}", mgrs);
    }

    #[test]
    fn test_encode_rejects_bad_precision() {
        let e = wgs84();
        let utm = UtmPos::new(33, true, 0.0, 500000.0, 0.0);
        assert!(utm_to_mgrs(&utm, &e, 6, false).is_err());
    }
}
