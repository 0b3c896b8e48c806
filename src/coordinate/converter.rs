//! The coordinate conversion engine
//!
//! A [`Coordinate`] holds one position in whatever representation it
//! was last set in, and converts lazily when another representation is
//! requested. Every conversion routes through canonical WGS84 geodetic
//! coordinates with ellipsoidal height; datum shifts, height model
//! corrections and projections are applied on the way in and out.
//! Results are cached per representation until the next `set_*` call.
//!
//! One engine instance serves one thread; it carries no internal
//! locking.

use log::debug;

use crate::coordinate::system::CoordSystemMetaData;
use crate::coordinate::types::{CartPos, LatPos, ProjPos, UtmPos, Vec3D};
use crate::errors::{CoordError, CoordResult};
use crate::geodesy::cartesian::{cart_to_lat, lat_to_cart, other_to_wgs, wgs_to_other};
use crate::geodesy::datum::{GeodeticDatum, GeodeticTransform};
use crate::geodesy::ellipsoid::{Ellipsoid, EllipsoidParameters};
use crate::geodesy::gauss::{
    gauss_to_lat, lat_to_gauss, lat_to_utm, utm_to_lat, FlatProjection, GaussProjection,
    DEFAULT_CONVERGENCE,
};
use crate::geodesy::mgrs::{mgrs_to_utm, utm_to_mgrs};
use crate::height;

/// The representation a `set_*` call made authoritative
#[derive(Debug, Clone)]
enum Source {
    Cart(CartPos, GeodeticDatum),
    Geodetic(LatPos, GeodeticDatum),
    Projected(ProjPos, FlatProjection),
    Utm(UtmPos, GeodeticDatum),
    Mgrs(String, GeodeticDatum),
    FlatEarth(Vec3D, CoordSystemMetaData, GeodeticDatum),
}

/// Lazily filled per-representation results
#[derive(Debug, Clone, Default)]
struct Cache {
    /// WGS84 geodetic with ellipsoidal height, the routing intermediate
    canonical: Option<LatPos>,
    cart: Option<(CartPos, GeodeticDatum)>,
    geodetic: Option<(LatPos, GeodeticDatum)>,
    projected: Option<(ProjPos, FlatProjection)>,
    utm: Option<(UtmPos, GeodeticDatum)>,
    mgrs: Option<(String, GeodeticDatum)>,
    flat: Option<(Vec3D, CoordSystemMetaData, GeodeticDatum)>,
}

/// Multi-representation position with lazy conversion
pub struct Coordinate {
    source: Option<Source>,
    cache: Cache,

    mgrs_altitude: bool,
    mgrs_precision: usize,
    pref_utm_zone: Option<i32>,
    pref_utm_hemisphere: Option<bool>,

    user_projection: Option<GaussProjection>,
    user_ellipsoid: Option<EllipsoidParameters>,
    user_transform: Option<GeodeticTransform>,
}

impl Coordinate {
    pub fn new() -> Self {
        Coordinate {
            source: None,
            cache: Cache::default(),
            mgrs_altitude: false,
            mgrs_precision: 5,
            pref_utm_zone: None,
            pref_utm_hemisphere: None,
            user_projection: None,
            user_ellipsoid: None,
            user_transform: None,
        }
    }

    // --- property control ---------------------------------------------------

    /// Append the altitude to generated MGRS strings
    pub fn set_mgrs_altitude(&mut self, enabled: bool) {
        self.mgrs_altitude = enabled;
        self.cache.mgrs = None;
    }

    /// MGRS digit count per axis, 0..=5
    pub fn set_mgrs_precision(&mut self, precision: usize) {
        self.mgrs_precision = precision;
        self.cache.mgrs = None;
    }

    /// Bias UTM output into a fixed zone; `None` restores the natural
    /// zone of the position
    pub fn set_pref_utm_zone(&mut self, zone: Option<i32>) {
        self.pref_utm_zone = zone;
        self.cache.utm = None;
        self.cache.mgrs = None;
    }

    /// Bias UTM output into a hemisphere; `None` follows the latitude
    pub fn set_pref_utm_hemisphere(&mut self, north: Option<bool>) {
        self.pref_utm_hemisphere = north;
        self.cache.utm = None;
        self.cache.mgrs = None;
    }

    /// Parameters used when the `UserDefined` projection is requested
    pub fn set_user_defined_projection(&mut self, projection: GaussProjection) {
        self.user_projection = Some(projection);
    }

    /// Parameters used when the `UserDefined` ellipsoid is referenced
    pub fn set_user_defined_ellipsoid(&mut self, parameters: EllipsoidParameters) {
        self.user_ellipsoid = Some(parameters);
    }

    /// Helmert shift used when the `UserDefined` datum is referenced
    pub fn set_user_defined_transform(&mut self, transform: GeodeticTransform) {
        self.user_transform = Some(transform);
    }

    // --- set: store verbatim, invalidate everything else --------------------

    pub fn set_cart_pos(&mut self, pos: &CartPos, datum: GeodeticDatum) {
        self.source = Some(Source::Cart(*pos, datum));
        self.cache = Cache::default();
        self.cache.cart = Some((*pos, datum));
    }

    pub fn set_lat_pos(&mut self, pos: &LatPos, datum: GeodeticDatum) {
        self.source = Some(Source::Geodetic(*pos, datum));
        self.cache = Cache::default();
        self.cache.geodetic = Some((*pos, datum));
    }

    pub fn set_proj_pos(&mut self, pos: &ProjPos, projection: FlatProjection) {
        self.source = Some(Source::Projected(*pos, projection));
        self.cache = Cache::default();
        self.cache.projected = Some((*pos, projection));
    }

    pub fn set_utm_pos(&mut self, pos: &UtmPos, datum: GeodeticDatum) {
        self.source = Some(Source::Utm(*pos, datum));
        self.cache = Cache::default();
        self.cache.utm = Some((*pos, datum));
    }

    pub fn set_mgrs(&mut self, mgrs: &str, datum: GeodeticDatum) {
        self.source = Some(Source::Mgrs(mgrs.to_string(), datum));
        self.cache = Cache::default();
        self.cache.mgrs = Some((mgrs.to_string(), datum));
    }

    /// Local flat-earth position against an origin carried in the
    /// metadata (degrees); `x` east, `y` north, `z` up
    pub fn set_flat_earth_pos(
        &mut self,
        pos: &Vec3D,
        origin: &CoordSystemMetaData,
        datum: GeodeticDatum,
    ) {
        self.source = Some(Source::FlatEarth(*pos, *origin, datum));
        self.cache = Cache::default();
        self.cache.flat = Some((*pos, *origin, datum));
    }

    // --- get: transfer state lazily -----------------------------------------

    pub fn get_cart_pos(&mut self, datum: GeodeticDatum) -> CoordResult<CartPos> {
        if let Some((pos, cached_datum)) = self.cache.cart {
            if cached_datum == datum {
                return Ok(pos);
            }
        }

        let canonical = self.canonical()?;
        let pos = self.canonical_to_cart(&canonical, datum)?;
        self.cache.cart = Some((pos, datum));
        Ok(pos)
    }

    pub fn get_lat_pos(&mut self, datum: GeodeticDatum) -> CoordResult<LatPos> {
        if let Some((pos, cached_datum)) = self.cache.geodetic {
            if cached_datum == datum {
                return Ok(pos);
            }
        }

        let canonical = self.canonical()?;
        let pos = self.canonical_to_geodetic(&canonical, datum)?;
        self.cache.geodetic = Some((pos, datum));
        Ok(pos)
    }

    pub fn get_proj_pos(&mut self, projection: FlatProjection) -> CoordResult<ProjPos> {
        if let Some((pos, cached_projection)) = self.cache.projected {
            if cached_projection == projection {
                return Ok(pos);
            }
        }

        let canonical = self.canonical()?;
        let params = self.projection_params(projection)?;
        let geodetic = self.canonical_to_geodetic(&canonical, params.datum)?;
        let ellipsoid = self.ellipsoid_params_of(params.datum)?;
        let (northing, easting) = lat_to_gauss(&geodetic, &params, &ellipsoid)?;

        let pos = ProjPos::new(northing, easting, geodetic.altitude);
        self.cache.projected = Some((pos, projection));
        Ok(pos)
    }

    pub fn get_utm_pos(&mut self, datum: GeodeticDatum) -> CoordResult<UtmPos> {
        if let Some((pos, cached_datum)) = self.cache.utm.clone() {
            if cached_datum == datum {
                return Ok(pos);
            }
        }

        let canonical = self.canonical()?;
        let pos = self.canonical_to_utm(&canonical, datum)?;
        self.cache.utm = Some((pos, datum));
        Ok(pos)
    }

    pub fn get_mgrs(&mut self, datum: GeodeticDatum) -> CoordResult<String> {
        if let Some((mgrs, cached_datum)) = self.cache.mgrs.clone() {
            if cached_datum == datum {
                return Ok(mgrs);
            }
        }

        let canonical = self.canonical()?;
        let utm = self.canonical_to_utm(&canonical, datum)?;
        let ellipsoid = self.ellipsoid_params_of(datum)?;
        let mgrs = utm_to_mgrs(&utm, &ellipsoid, self.mgrs_precision, self.mgrs_altitude)?;

        self.cache.utm = Some((utm, datum));
        self.cache.mgrs = Some((mgrs.clone(), datum));
        Ok(mgrs)
    }

    pub fn get_flat_earth_pos(
        &mut self,
        origin: &CoordSystemMetaData,
        datum: GeodeticDatum,
    ) -> CoordResult<Vec3D> {
        if let Some((pos, cached_origin, cached_datum)) = self.cache.flat {
            if cached_datum == datum && cached_origin == *origin {
                return Ok(pos);
            }
        }

        let canonical = self.canonical()?;
        let geodetic = self.canonical_to_geodetic(&canonical, datum)?;
        let ellipsoid = self.ellipsoid_params_of(datum)?;
        let pos = flat_from_geodetic(&geodetic, origin, &ellipsoid)?;

        self.cache.flat = Some((pos, *origin, datum));
        Ok(pos)
    }

    // --- canonical routing ---------------------------------------------------

    /// The authoritative position as WGS84 geodetic with ellipsoidal
    /// height, computing and caching it on first use
    fn canonical(&mut self) -> CoordResult<LatPos> {
        if let Some(pos) = self.cache.canonical {
            return Ok(pos);
        }

        let source = self.source.clone().ok_or(CoordError::NoPosition)?;
        let canonical = match &source {
            Source::Cart(pos, datum) => self.cart_to_canonical(pos, *datum)?,
            Source::Geodetic(pos, datum) => self.geodetic_to_canonical(pos, *datum)?,
            Source::Projected(pos, projection) => {
                let params = self.projection_params(*projection)?;
                let ellipsoid = self.ellipsoid_params_of(params.datum)?;
                let mut geodetic = gauss_to_lat(
                    pos.northing,
                    pos.easting,
                    &params,
                    &ellipsoid,
                    DEFAULT_CONVERGENCE,
                )?;
                geodetic.altitude = pos.height;
                self.geodetic_to_canonical(&geodetic, params.datum)?
            }
            Source::Utm(pos, datum) => {
                let ellipsoid = self.ellipsoid_params_of(*datum)?;
                let geodetic = utm_to_lat(pos, &ellipsoid, DEFAULT_CONVERGENCE)?;
                self.geodetic_to_canonical(&geodetic, *datum)?
            }
            Source::Mgrs(mgrs, datum) => {
                let ellipsoid = self.ellipsoid_params_of(*datum)?;
                let utm = mgrs_to_utm(mgrs, &ellipsoid)?;
                let geodetic = utm_to_lat(&utm, &ellipsoid, DEFAULT_CONVERGENCE)?;
                self.geodetic_to_canonical(&geodetic, *datum)?
            }
            Source::FlatEarth(pos, origin, datum) => {
                let ellipsoid = self.ellipsoid_params_of(*datum)?;
                let geodetic = flat_to_geodetic(pos, origin, &ellipsoid)?;
                self.geodetic_to_canonical(&geodetic, *datum)?
            }
        };

        debug!(
            "Resolved canonical position {:.6} {:.6} {:.2}",
            canonical.latitude.to_degrees(),
            canonical.longitude.to_degrees(),
            canonical.altitude
        );

        self.cache.canonical = Some(canonical);
        Ok(canonical)
    }

    /// Geocentric position in `datum` -> canonical
    fn cart_to_canonical(&self, pos: &CartPos, datum: GeodeticDatum) -> CoordResult<LatPos> {
        let transform = self.datum_transform(datum)?;
        let wgs_cart = other_to_wgs(pos, &transform);
        cart_to_lat(&wgs_cart, &Ellipsoid::Wgs84.parameters()?)
    }

    /// Geodetic position in `datum` (altitude in the datum's height
    /// model) -> canonical
    fn geodetic_to_canonical(&self, pos: &LatPos, datum: GeodeticDatum) -> CoordResult<LatPos> {
        let transform = self.datum_transform(datum)?;
        let ellipsoid = self.ellipsoid_params_of(datum)?;

        let mut local = *pos;
        height::height_to_ellipsoid(&mut local, transform.height_model, transform.ellipsoid)?;

        let cart = lat_to_cart(&local, &ellipsoid);
        let wgs_cart = other_to_wgs(&cart, &transform);
        cart_to_lat(&wgs_cart, &Ellipsoid::Wgs84.parameters()?)
    }

    /// Canonical -> geocentric in `datum`
    fn canonical_to_cart(&self, canonical: &LatPos, datum: GeodeticDatum) -> CoordResult<CartPos> {
        let transform = self.datum_transform(datum)?;
        let wgs_cart = lat_to_cart(canonical, &Ellipsoid::Wgs84.parameters()?);
        Ok(wgs_to_other(&wgs_cart, &transform))
    }

    /// Canonical -> geodetic in `datum`, altitude in the datum's height
    /// model
    fn canonical_to_geodetic(
        &self,
        canonical: &LatPos,
        datum: GeodeticDatum,
    ) -> CoordResult<LatPos> {
        let transform = self.datum_transform(datum)?;
        let ellipsoid = self.ellipsoid_params_of(datum)?;

        let datum_cart = self.canonical_to_cart(canonical, datum)?;
        let mut geodetic = cart_to_lat(&datum_cart, &ellipsoid)?;
        height::ellipsoid_to_height(&mut geodetic, transform.height_model, transform.ellipsoid)?;
        Ok(geodetic)
    }

    fn canonical_to_utm(&self, canonical: &LatPos, datum: GeodeticDatum) -> CoordResult<UtmPos> {
        let geodetic = self.canonical_to_geodetic(canonical, datum)?;
        let ellipsoid = self.ellipsoid_params_of(datum)?;
        lat_to_utm(&geodetic, &ellipsoid, self.pref_utm_zone, self.pref_utm_hemisphere)
    }

    // --- parameter resolution -------------------------------------------------

    /// Helmert transform for a datum, honoring the user-defined slot
    fn datum_transform(&self, datum: GeodeticDatum) -> CoordResult<GeodeticTransform> {
        match datum {
            GeodeticDatum::UserDefined => self
                .user_transform
                .ok_or_else(|| CoordError::UnknownDatum("USER_DEFINED".to_string())),
            _ => datum.transform(),
        }
    }

    /// Ellipsoid constants for a datum, honoring the user-defined slot
    fn ellipsoid_params_of(&self, datum: GeodeticDatum) -> CoordResult<EllipsoidParameters> {
        let ellipsoid = self.datum_transform(datum)?.ellipsoid;
        match ellipsoid {
            Ellipsoid::UserDefined => self
                .user_ellipsoid
                .ok_or_else(|| CoordError::UnknownDatum("USER_DEFINED".to_string())),
            _ => ellipsoid.parameters(),
        }
    }

    /// Projection parameters, honoring the user-defined slot
    fn projection_params(&self, projection: FlatProjection) -> CoordResult<GaussProjection> {
        match projection {
            FlatProjection::UserDefined => self
                .user_projection
                .ok_or_else(|| CoordError::UnknownProjection("USER_DEFINED".to_string())),
            FlatProjection::Utm => {
                Err(CoordError::UnknownProjection("UTM is zone dependent".to_string()))
            }
            _ => projection.parameters(),
        }
    }
}

impl Default for Coordinate {
    fn default() -> Self {
        Coordinate::new()
    }
}

/// Flat-earth local position -> geodetic, linearized around the origin
fn flat_to_geodetic(
    pos: &Vec3D,
    origin: &CoordSystemMetaData,
    e: &EllipsoidParameters,
) -> CoordResult<LatPos> {
    let (lat0_deg, lon0_deg, h0) = origin
        .flat_earth()
        .ok_or_else(|| CoordError::GenericError("flat-earth origin missing".to_string()))?;
    let origin_pos = LatPos::from_degrees(lat0_deg, lon0_deg, h0);

    let (m, n) = curvature_radii(origin_pos.latitude, e);
    let cos_lat = origin_pos.latitude.cos();
    if cos_lat.abs() < 1e-12 {
        return Err(CoordError::OutOfRange("flat-earth origin at the pole".to_string()));
    }

    Ok(LatPos::new(
        origin_pos.latitude + pos.y / m,
        origin_pos.longitude + pos.x / (n * cos_lat),
        h0 + pos.z,
    ))
}

/// Geodetic -> flat-earth local position, the inverse linearization
fn flat_from_geodetic(
    pos: &LatPos,
    origin: &CoordSystemMetaData,
    e: &EllipsoidParameters,
) -> CoordResult<Vec3D> {
    let (lat0_deg, lon0_deg, h0) = origin
        .flat_earth()
        .ok_or_else(|| CoordError::GenericError("flat-earth origin missing".to_string()))?;
    let origin_pos = LatPos::from_degrees(lat0_deg, lon0_deg, h0);

    let (m, n) = curvature_radii(origin_pos.latitude, e);
    let cos_lat = origin_pos.latitude.cos();
    if cos_lat.abs() < 1e-12 {
        return Err(CoordError::OutOfRange("flat-earth origin at the pole".to_string()));
    }

    Ok(Vec3D::new(
        (pos.longitude - origin_pos.longitude) * n * cos_lat,
        (pos.latitude - origin_pos.latitude) * m,
        pos.altitude - h0,
    ))
}

/// Meridian and prime vertical curvature radii at a latitude
fn curvature_radii(latitude: f64, e: &EllipsoidParameters) -> (f64, f64) {
    let e2 = e.eccentricity_squared();
    let s = latitude.sin();
    let w2 = 1.0 - e2 * s * s;
    let m = e.semi_axis * (1.0 - e2) / w2.powf(1.5);
    let n = e.semi_axis / w2.sqrt();
    (m, n)
}
