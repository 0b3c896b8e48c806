//! Geodetic datums, height models and Helmert datum shifts

use crate::errors::{CoordError, CoordResult};
use crate::geodesy::ellipsoid::Ellipsoid;
use crate::geodesy::parameters::PARAMETERS;

/// Geodetic datum: one per reference ellipsoid, plus one per
/// ellipsoid/height-model combination in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeodeticDatum {
    Wgs84Ellipsoid,
    Grs80Ellipsoid,
    Bessel1841Ellipsoid,
    Clarke1866Ellipsoid,
    /// OSGB36
    Airy1830Ellipsoid,
    Wgs84Egm2008,
    BesselRh70,
    UserDefined,
}

/// Vertical datum the altitude of a position is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeightModel {
    /// Height above the reference ellipsoid; the analytic identity model
    Ellipsoid,
    Egm2008,
    Egm96,
    Rh2000,
    Rh70,
}

impl HeightModel {
    pub fn table_key(&self) -> &'static str {
        match self {
            HeightModel::Ellipsoid => "ELLIPSOID",
            HeightModel::Egm2008 => "EGM2008",
            HeightModel::Egm96 => "EGM96",
            HeightModel::Rh2000 => "RH2000",
            HeightModel::Rh70 => "RH70",
        }
    }

    pub fn from_table_key(key: &str) -> Option<HeightModel> {
        match key {
            "ELLIPSOID" => Some(HeightModel::Ellipsoid),
            "EGM2008" => Some(HeightModel::Egm2008),
            "EGM96" => Some(HeightModel::Egm96),
            "RH2000" => Some(HeightModel::Rh2000),
            "RH70" => Some(HeightModel::Rh70),
            _ => None,
        }
    }
}

/// Helmert 7-parameter similarity transform in the WGS84 -> datum
/// direction, plus the datum's reference ellipsoid and height model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodeticTransform {
    pub ellipsoid: Ellipsoid,
    /// Translation in meters
    pub translation: [f64; 3],
    /// Rotation in arc seconds
    pub rotation: [f64; 3],
    /// Scale correction in ppm
    pub scale_ppm: f64,
    pub height_model: HeightModel,
}

impl GeodeticTransform {
    /// The identity transform on WGS84 with ellipsoidal heights
    pub fn identity() -> Self {
        GeodeticTransform {
            ellipsoid: Ellipsoid::Wgs84,
            translation: [0.0; 3],
            rotation: [0.0; 3],
            scale_ppm: 0.0,
            height_model: HeightModel::Ellipsoid,
        }
    }
}

impl GeodeticDatum {
    /// The table key used in coordinate_parameters.toml
    pub fn table_key(&self) -> &'static str {
        match self {
            GeodeticDatum::Wgs84Ellipsoid => "WGS84_ELLIPSOID",
            GeodeticDatum::Grs80Ellipsoid => "GRS80_ELLIPSOID",
            GeodeticDatum::Bessel1841Ellipsoid => "BESSEL_1841_ELLIPSOID",
            GeodeticDatum::Clarke1866Ellipsoid => "CLARKE_1866_ELLIPSOID",
            GeodeticDatum::Airy1830Ellipsoid => "AIRY_1830_ELLIPSOID",
            GeodeticDatum::Wgs84Egm2008 => "WGS84_EGM2008",
            GeodeticDatum::BesselRh70 => "BESSEL_RH70",
            GeodeticDatum::UserDefined => "USER_DEFINED",
        }
    }

    pub fn from_table_key(key: &str) -> Option<GeodeticDatum> {
        match key {
            "WGS84_ELLIPSOID" => Some(GeodeticDatum::Wgs84Ellipsoid),
            "GRS80_ELLIPSOID" => Some(GeodeticDatum::Grs80Ellipsoid),
            "BESSEL_1841_ELLIPSOID" => Some(GeodeticDatum::Bessel1841Ellipsoid),
            "CLARKE_1866_ELLIPSOID" => Some(GeodeticDatum::Clarke1866Ellipsoid),
            "AIRY_1830_ELLIPSOID" => Some(GeodeticDatum::Airy1830Ellipsoid),
            "WGS84_EGM2008" => Some(GeodeticDatum::Wgs84Egm2008),
            "BESSEL_RH70" => Some(GeodeticDatum::BesselRh70),
            _ => None,
        }
    }

    fn builtin() -> &'static [GeodeticDatum] {
        &[
            GeodeticDatum::Wgs84Ellipsoid,
            GeodeticDatum::Grs80Ellipsoid,
            GeodeticDatum::Bessel1841Ellipsoid,
            GeodeticDatum::Clarke1866Ellipsoid,
            GeodeticDatum::Airy1830Ellipsoid,
            GeodeticDatum::Wgs84Egm2008,
            GeodeticDatum::BesselRh70,
        ]
    }

    /// Resolve the Helmert shift and datum metadata from the parameter
    /// table. `UserDefined` has no table entry; the conversion engine
    /// carries a per-instance transform for it.
    pub fn transform(&self) -> CoordResult<GeodeticTransform> {
        PARAMETERS
            .datums
            .get(self.table_key())
            .copied()
            .ok_or_else(|| CoordError::UnknownDatum(self.table_key().to_string()))
    }

    /// The datum's reference ellipsoid
    pub fn ellipsoid(&self) -> CoordResult<Ellipsoid> {
        Ok(self.transform()?.ellipsoid)
    }

    /// The datum's vertical height model
    pub fn height_model(&self) -> CoordResult<HeightModel> {
        Ok(self.transform()?.height_model)
    }

    /// Find the registered datum matching an ellipsoid/height-model pair
    pub fn for_pair(ellipsoid: Ellipsoid, model: HeightModel) -> Option<GeodeticDatum> {
        for datum in Self::builtin() {
            if let Ok(t) = datum.transform() {
                if t.ellipsoid == ellipsoid && t.height_model == model {
                    return Some(*datum);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_datums_resolve() {
        for datum in GeodeticDatum::builtin() {
            assert!(datum.transform().is_ok(), "missing table entry for {:?}", datum);
        }
    }

    #[test]
    fn test_wgs84_is_identity() {
        let t = GeodeticDatum::Wgs84Ellipsoid.transform().unwrap();
        assert_eq!(t.translation, [0.0; 3]);
        assert_eq!(t.rotation, [0.0; 3]);
        assert_eq!(t.scale_ppm, 0.0);
        assert_eq!(t.height_model, HeightModel::Ellipsoid);
    }

    #[test]
    fn test_datum_for_pair() {
        assert_eq!(
            GeodeticDatum::for_pair(Ellipsoid::Wgs84, HeightModel::Ellipsoid),
            Some(GeodeticDatum::Wgs84Ellipsoid)
        );
        assert_eq!(
            GeodeticDatum::for_pair(Ellipsoid::Wgs84, HeightModel::Egm2008),
            Some(GeodeticDatum::Wgs84Egm2008)
        );
        assert_eq!(
            GeodeticDatum::for_pair(Ellipsoid::Bessel1841, HeightModel::Rh70),
            Some(GeodeticDatum::BesselRh70)
        );
        assert_eq!(GeodeticDatum::for_pair(Ellipsoid::Wgs72, HeightModel::Ellipsoid), None);
    }

    #[test]
    fn test_height_model_of_datum() {
        assert_eq!(
            GeodeticDatum::Wgs84Egm2008.height_model().unwrap(),
            HeightModel::Egm2008
        );
        assert_eq!(
            GeodeticDatum::Bessel1841Ellipsoid.height_model().unwrap(),
            HeightModel::Ellipsoid
        );
    }

    #[test]
    fn test_user_defined_has_no_table_entry() {
        assert!(GeodeticDatum::UserDefined.transform().is_err());
    }
}
