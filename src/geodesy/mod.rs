//! Geodetic transform library
//!
//! Pure, stateless math: ellipsoid and datum tables, geodetic and
//! cartesian closed forms, Gauss-Krueger projections and the MGRS
//! string codec. Safe to call from any thread without synchronization.

pub mod cartesian;
pub mod datum;
pub mod ellipsoid;
pub mod gauss;
pub mod mgrs;
pub mod parameters;

pub use cartesian::{
    cart_to_lat, cart_to_local, lat_to_cart, local_to_cart, orientation_matrix,
    orientation_matrix_cart, other_to_wgs, spherical_direction, spherical_direction_cart,
    wgs_to_other,
};
pub use datum::{GeodeticDatum, GeodeticTransform, HeightModel};
pub use ellipsoid::{Ellipsoid, EllipsoidParameters};
pub use gauss::{
    gauss_to_lat, lat_to_gauss, lat_to_utm, utm_to_lat, utm_zone_for, FlatProjection,
    GaussProjection, DEFAULT_CONVERGENCE,
};
pub use mgrs::{mgrs_to_utm, utm_to_mgrs};
