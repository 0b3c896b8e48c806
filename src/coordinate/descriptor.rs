//! The coordinate system descriptor mini-language
//!
//! Descriptors are colon/comma delimited strings such as
//! `"WGS84:GEOD,ELLIPSOID"` or `"SWEREF99:UTM,ZONE33,N"`. Keywords are
//! case insensitive and whitespace is ignored. `parse` and `format`
//! are exact inverses of each other.

use crate::coordinate::system::{CoordSystem, CoordSystemMetaData, CoordType};
use crate::errors::{CoordError, CoordResult};
use crate::geodesy::datum::{GeodeticDatum, HeightModel};
use crate::geodesy::ellipsoid::Ellipsoid;
use crate::geodesy::gauss::FlatProjection;

/// Parse a descriptor string into a coordinate system and its metadata
pub fn parse(descriptor: &str) -> CoordResult<(CoordSystem, CoordSystemMetaData)> {
    let text: String = descriptor
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    let (name, rest) = text
        .split_once(':')
        .ok_or_else(|| CoordError::DescriptorParse(descriptor.to_string()))?;

    let mut tokens = rest.split(',');
    let type_token = tokens
        .next()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CoordError::DescriptorParse(descriptor.to_string()))?;

    let coord_type = match type_token {
        "GEOC" => CoordType::Geocentric,
        "GEOD" => CoordType::Geodetic,
        "PROJ" => CoordType::Projected,
        "UTM" => CoordType::Utm,
        "MGRS" => CoordType::Mgrs,
        "FLAT" => CoordType::FlatEarth,
        other => return Err(CoordError::DescriptorParse(other.to_string())),
    };

    // The leading name is either a datum or a projected system that
    // implies its datum
    let (ellipsoid, projection) = match name {
        "WGS84" => (Ellipsoid::Wgs84, FlatProjection::Utm),
        "GRS80" => (Ellipsoid::Grs80, FlatProjection::Sweref99),
        "BESSEL" => (Ellipsoid::Bessel1841, FlatProjection::Rt90),
        "CLARKE" => (Ellipsoid::Clarke1866, FlatProjection::Utm),
        "AIRY" => (Ellipsoid::Airy1830, FlatProjection::Osgb36),
        other => match FlatProjection::from_table_key(other) {
            Some(projection) if projection != FlatProjection::Utm => {
                let ellipsoid = projection
                    .parameters()?
                    .datum
                    .ellipsoid()?;
                (ellipsoid, projection)
            }
            _ => return Err(CoordError::DescriptorParse(other.to_string())),
        },
    };

    let mut height_model = HeightModel::Ellipsoid;
    let mut zone: i32 = -1;
    let mut north = true;
    let mut origin_latitude = 0.0;
    let mut origin_longitude = 0.0;
    let mut origin_height = 0.0;

    for token in tokens {
        if token.is_empty() {
            return Err(CoordError::DescriptorParse(descriptor.to_string()));
        }
        if let Some(model) = HeightModel::from_table_key(token) {
            height_model = model;
        } else if let Some(number) = token.strip_prefix("ZONE") {
            zone = number
                .parse::<i32>()
                .ok()
                .filter(|z| (1..=60).contains(z))
                .ok_or_else(|| CoordError::DescriptorParse(token.to_string()))?;
        } else if token == "N" {
            north = true;
        } else if token == "S" {
            north = false;
        } else if let Some(value) = token.strip_prefix("LAT") {
            origin_latitude = value
                .parse::<f64>()
                .map_err(|_| CoordError::DescriptorParse(token.to_string()))?;
        } else if let Some(value) = token.strip_prefix("LON") {
            origin_longitude = value
                .parse::<f64>()
                .map_err(|_| CoordError::DescriptorParse(token.to_string()))?;
        } else if let Some(value) = token.strip_prefix("ALT") {
            origin_height = value
                .parse::<f64>()
                .map_err(|_| CoordError::DescriptorParse(token.to_string()))?;
        } else {
            return Err(CoordError::DescriptorParse(token.to_string()));
        }
    }

    let datum = GeodeticDatum::for_pair(ellipsoid, height_model).ok_or_else(|| {
        CoordError::DescriptorParse(format!(
            "no datum for {} with {}",
            ellipsoid.table_key(),
            height_model.table_key()
        ))
    })?;

    let meta = match coord_type {
        CoordType::Utm => CoordSystemMetaData::Utm { zone, north },
        CoordType::FlatEarth => CoordSystemMetaData::FlatEarth {
            origin_latitude,
            origin_longitude,
            origin_height,
        },
        _ => CoordSystemMetaData::None,
    };

    Ok((CoordSystem::new(datum, projection, coord_type), meta))
}

/// Render a coordinate system and its metadata back into descriptor form
///
/// Exact inverse of [`parse`]: parsing the returned string yields an
/// equal system/metadata pair.
pub fn format(system: &CoordSystem, meta: &CoordSystemMetaData) -> CoordResult<String> {
    let name = match system.coord_type {
        CoordType::Projected => system.projection.table_key().to_string(),
        _ => {
            let ellipsoid = system.datum.ellipsoid()?;
            match ellipsoid {
                Ellipsoid::Wgs84 => "WGS84",
                Ellipsoid::Grs80 => "GRS80",
                Ellipsoid::Bessel1841 => "BESSEL",
                Ellipsoid::Clarke1866 => "CLARKE",
                Ellipsoid::Airy1830 => "AIRY",
                other => return Err(CoordError::UnknownDatum(other.table_key().to_string())),
            }
            .to_string()
        }
    };

    let type_token = match system.coord_type {
        CoordType::Geocentric => "GEOC",
        CoordType::Geodetic => "GEOD",
        CoordType::Projected => "PROJ",
        CoordType::Utm => "UTM",
        CoordType::Mgrs => "MGRS",
        CoordType::FlatEarth => "FLAT",
    };

    let mut out = format!("{}:{}", name, type_token);
    out.push(',');
    out.push_str(system.datum.height_model()?.table_key());

    match (system.coord_type, meta) {
        (CoordType::Utm, CoordSystemMetaData::Utm { zone, north }) => {
            if *zone >= 0 {
                out.push_str(&format!(",ZONE{}", zone));
            }
            out.push(',');
            out.push(if *north { 'N' } else { 'S' });
        }
        (CoordType::Utm, _) => {
            out.push_str(",N");
        }
        (
            CoordType::FlatEarth,
            CoordSystemMetaData::FlatEarth { origin_latitude, origin_longitude, origin_height },
        ) => {
            out.push_str(&format!(
                ",LAT{},LON{},ALT{}",
                origin_latitude, origin_longitude, origin_height
            ));
        }
        (CoordType::FlatEarth, _) => {
            out.push_str(",LAT0,LON0,ALT0");
        }
        _ => {}
    }

    Ok(out)
}
