//! Static parameter tables for ellipsoids, datums and projections
//!
//! The tables ship as an embedded TOML document and are parsed once at
//! first use. They are read-only at runtime; the single user-definable
//! slot lives on the conversion engine instance instead.

use std::collections::HashMap;
use lazy_static::lazy_static;

use crate::errors::{CoordError, CoordResult};
use crate::geodesy::datum::{GeodeticDatum, GeodeticTransform, HeightModel};
use crate::geodesy::ellipsoid::{Ellipsoid, EllipsoidParameters};
use crate::geodesy::gauss::GaussProjection;

lazy_static! {
    // Parse the embedded TOML document at first use
    pub static ref PARAMETERS: CoordinateParameters = {
        let content = include_str!("../../coordinate_parameters.toml");
        CoordinateParameters::from_str(content).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to parse coordinate parameter table: {}", e);
            CoordinateParameters::default()
        })
    };
}

/// Container for the built-in geodesy parameter tables
#[derive(Debug, Default)]
pub struct CoordinateParameters {
    /// Ellipsoid table key -> defining constants
    pub ellipsoids: HashMap<String, EllipsoidParameters>,
    /// Datum table key -> Helmert shift and metadata
    pub datums: HashMap<String, GeodeticTransform>,
    /// Projection table key -> Gauss-Krueger parameters
    pub projections: HashMap<String, GaussProjection>,
}

impl CoordinateParameters {
    /// Parse the parameter tables from a TOML string
    pub fn from_str(content: &str) -> CoordResult<Self> {
        let toml_value: toml::Value = content
            .parse()
            .map_err(|e| CoordError::GenericError(format!("Failed to parse TOML: {}", e)))?;

        let mut params = CoordinateParameters::default();

        if let Some(entries) = toml_value.get("ellipsoid").and_then(|v| v.as_array()) {
            for entry in entries {
                if let Some((name, parsed)) = Self::parse_ellipsoid(entry) {
                    params.ellipsoids.insert(name, parsed);
                }
            }
        }

        if let Some(entries) = toml_value.get("datum").and_then(|v| v.as_array()) {
            for entry in entries {
                if let Some((name, parsed)) = Self::parse_datum(entry) {
                    params.datums.insert(name, parsed);
                }
            }
        }

        if let Some(entries) = toml_value.get("projection").and_then(|v| v.as_array()) {
            for entry in entries {
                if let Some((name, parsed)) = Self::parse_projection(entry) {
                    params.projections.insert(name, parsed);
                }
            }
        }

        Ok(params)
    }

    fn get_f64(entry: &toml::Value, key: &str) -> Option<f64> {
        entry.get(key).and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
    }

    fn get_triple(entry: &toml::Value, key: &str) -> Option<[f64; 3]> {
        let array = entry.get(key)?.as_array()?;
        if array.len() != 3 {
            return None;
        }
        let mut out = [0.0; 3];
        for (i, v) in array.iter().enumerate() {
            out[i] = v.as_float().or_else(|| v.as_integer().map(|n| n as f64))?;
        }
        Some(out)
    }

    fn parse_ellipsoid(entry: &toml::Value) -> Option<(String, EllipsoidParameters)> {
        let name = entry.get("name")?.as_str()?.to_string();
        let semi_axis = Self::get_f64(entry, "semi_axis")?;
        let inverse_flattening = Self::get_f64(entry, "inverse_flattening")?;
        Some((name, EllipsoidParameters::new(semi_axis, inverse_flattening)))
    }

    fn parse_datum(entry: &toml::Value) -> Option<(String, GeodeticTransform)> {
        let name = entry.get("name")?.as_str()?.to_string();
        let ellipsoid = Ellipsoid::from_table_key(entry.get("ellipsoid")?.as_str()?)?;
        let height_model = HeightModel::from_table_key(entry.get("height_model")?.as_str()?)?;
        let translation = Self::get_triple(entry, "translation")?;
        let rotation = Self::get_triple(entry, "rotation")?;
        let scale_ppm = Self::get_f64(entry, "scale_ppm")?;
        Some((
            name,
            GeodeticTransform { ellipsoid, translation, rotation, scale_ppm, height_model },
        ))
    }

    fn parse_projection(entry: &toml::Value) -> Option<(String, GaussProjection)> {
        let name = entry.get("name")?.as_str()?.to_string();
        let datum = GeodeticDatum::from_table_key(entry.get("datum")?.as_str()?)?;
        let central_meridian = Self::get_f64(entry, "central_meridian")?.to_radians();
        let latitude_origin = Self::get_f64(entry, "latitude_origin")?.to_radians();
        let scale = Self::get_f64(entry, "scale")?;
        let false_northing = Self::get_f64(entry, "false_northing")?;
        let false_easting = Self::get_f64(entry, "false_easting")?;
        Some((
            name,
            GaussProjection {
                datum,
                central_meridian,
                latitude_origin,
                scale_on_central_meridian: scale,
                false_northing,
                false_easting,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_table_parses() {
        assert!(PARAMETERS.ellipsoids.len() >= 6);
        assert!(PARAMETERS.datums.len() >= 7);
        assert!(PARAMETERS.projections.len() >= 8);
    }

    #[test]
    fn test_sweref99_projection_entry() {
        let p = PARAMETERS.projections.get("SWEREF99").unwrap();
        assert_eq!(p.datum, GeodeticDatum::Grs80Ellipsoid);
        assert!((p.central_meridian.to_degrees() - 15.0).abs() < 1e-12);
        assert_eq!(p.scale_on_central_meridian, 0.9996);
        assert_eq!(p.false_easting, 500000.0);
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        assert!(CoordinateParameters::from_str("[[ellipsoid").is_err());
    }

    #[test]
    fn test_incomplete_entries_are_skipped() {
        let params =
            CoordinateParameters::from_str("[[ellipsoid]]\nname = \"HALF\"\nsemi_axis = 1.0\n")
                .unwrap();
        assert!(params.ellipsoids.is_empty());
    }
}
