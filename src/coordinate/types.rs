//! Position value types for the coordinate representations
//!
//! Every representation denotes the same physical point; these are
//! alternative encodings of it, never independently authoritative.

use std::fmt;
use std::f64::consts::PI;

use crate::errors::{CoordError, CoordResult};

/// Geodetic position, latitude/longitude in radians, altitude in meters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatPos {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl LatPos {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        LatPos { latitude, longitude, altitude }
    }

    /// Create a position from latitude/longitude given in degrees
    pub fn from_degrees(latitude: f64, longitude: f64, altitude: f64) -> Self {
        LatPos {
            latitude: latitude.to_radians(),
            longitude: longitude.to_radians(),
            altitude,
        }
    }

    /// Convert the angular fields from radians to degrees in place
    pub fn rad_to_deg(&mut self) {
        self.latitude = self.latitude.to_degrees();
        self.longitude = self.longitude.to_degrees();
    }

    /// Convert the angular fields from degrees to radians in place
    pub fn deg_to_rad(&mut self) {
        self.latitude = self.latitude.to_radians();
        self.longitude = self.longitude.to_radians();
    }

    /// Fold latitude into [-pi/2, pi/2] and wrap longitude into (-pi, pi]
    pub fn normalize(&mut self) {
        // Fold over the poles, shifting longitude by half a turn
        let mut lat = self.latitude;
        let mut lon = self.longitude;

        lat = lat % (2.0 * PI);
        if lat > PI {
            lat -= 2.0 * PI;
        } else if lat < -PI {
            lat += 2.0 * PI;
        }
        if lat > PI / 2.0 {
            lat = PI - lat;
            lon += PI;
        } else if lat < -PI / 2.0 {
            lat = -PI - lat;
            lon += PI;
        }

        lon = lon % (2.0 * PI);
        if lon > PI {
            lon -= 2.0 * PI;
        } else if lon <= -PI {
            lon += 2.0 * PI;
        }

        self.latitude = lat;
        self.longitude = lon;
    }

    /// Parse a whitespace or comma separated "lat lon [alt]" triple in degrees
    pub fn from_string(text: &str) -> CoordResult<Self> {
        let parts: Vec<&str> = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();
        if parts.len() != 2 && parts.len() != 3 {
            return Err(CoordError::PositionParse(text.to_string()));
        }
        let lat = parts[0]
            .parse::<f64>()
            .map_err(|_| CoordError::PositionParse(text.to_string()))?;
        let lon = parts[1]
            .parse::<f64>()
            .map_err(|_| CoordError::PositionParse(text.to_string()))?;
        let alt = match parts.get(2) {
            Some(s) => s
                .parse::<f64>()
                .map_err(|_| CoordError::PositionParse(text.to_string()))?,
            None => 0.0,
        };
        Ok(LatPos::from_degrees(lat, lon, alt))
    }
}

impl fmt::Display for LatPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6} {:.6} {:.2}",
            self.latitude.to_degrees(),
            self.longitude.to_degrees(),
            self.altitude
        )
    }
}

/// Geocentric cartesian position (ECEF), meters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CartPos {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CartPos {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        CartPos { x, y, z }
    }

    /// Parse a whitespace or comma separated "x y z" triple in meters
    pub fn from_string(text: &str) -> CoordResult<Self> {
        let parts: Vec<&str> = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();
        if parts.len() != 3 {
            return Err(CoordError::PositionParse(text.to_string()));
        }
        let mut v = [0.0f64; 3];
        for (i, part) in parts.iter().enumerate() {
            v[i] = part
                .parse::<f64>()
                .map_err(|_| CoordError::PositionParse(text.to_string()))?;
        }
        Ok(CartPos::new(v[0], v[1], v[2]))
    }
}

impl From<CartPos> for Vec3D {
    fn from(p: CartPos) -> Self {
        Vec3D::new(p.x, p.y, p.z)
    }
}

impl std::ops::Add<Vec3D> for CartPos {
    type Output = CartPos;

    fn add(self, offset: Vec3D) -> CartPos {
        CartPos::new(self.x + offset.x, self.y + offset.y, self.z + offset.z)
    }
}

impl std::ops::Sub<Vec3D> for CartPos {
    type Output = CartPos;

    fn sub(self, offset: Vec3D) -> CartPos {
        CartPos::new(self.x - offset.x, self.y - offset.y, self.z - offset.z)
    }
}

impl fmt::Display for CartPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} {:.3} {:.3}", self.x, self.y, self.z)
    }
}

/// Projected (Gauss-Krueger) position, meters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProjPos {
    pub northing: f64,
    pub easting: f64,
    pub height: f64,
}

impl ProjPos {
    pub fn new(northing: f64, easting: f64, height: f64) -> Self {
        ProjPos { northing, easting, height }
    }
}

impl fmt::Display for ProjPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}N {:.3}E {:.2}", self.northing, self.easting, self.height)
    }
}

/// UTM position: zone, hemisphere flag and grid coordinates in meters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtmPos {
    pub zone: i32,
    pub north: bool,
    pub northing: f64,
    pub easting: f64,
    pub height: f64,
}

impl UtmPos {
    pub fn new(zone: i32, north: bool, northing: f64, easting: f64, height: f64) -> Self {
        UtmPos { zone, north, northing, easting, height }
    }
}

impl Default for UtmPos {
    fn default() -> Self {
        UtmPos::new(0, true, 0.0, 0.0, 0.0)
    }
}

impl fmt::Display for UtmPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} {:.3}N {:.3}E {:.2}",
            self.zone,
            if self.north { 'N' } else { 'S' },
            self.northing,
            self.easting,
            self.height
        )
    }
}

/// Plain 3D vector, used for local and flat-earth positions
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3D { x, y, z }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction, or the zero vector unchanged
    pub fn normalized(&self) -> Vec3D {
        let len = self.length();
        if len == 0.0 {
            *self
        } else {
            Vec3D::new(self.x / len, self.y / len, self.z / len)
        }
    }
}

impl std::ops::Sub for Vec3D {
    type Output = Vec3D;

    fn sub(self, rhs: Vec3D) -> Vec3D {
        Vec3D::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Add for Vec3D {
    type Output = Vec3D;

    fn add(self, rhs: Vec3D) -> Vec3D {
        Vec3D::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// Row-major 3x3 matrix; orientation matrices hold the east, north and
/// up basis vectors as rows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3 {
    pub rows: [[f64; 3]; 3],
}

impl Matrix3 {
    pub fn new(rows: [[f64; 3]; 3]) -> Self {
        Matrix3 { rows }
    }

    pub fn identity() -> Self {
        Matrix3::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    pub fn mul_vec(&self, v: Vec3D) -> Vec3D {
        Vec3D::new(
            self.rows[0][0] * v.x + self.rows[0][1] * v.y + self.rows[0][2] * v.z,
            self.rows[1][0] * v.x + self.rows[1][1] * v.y + self.rows[1][2] * v.z,
            self.rows[2][0] * v.x + self.rows[2][1] * v.y + self.rows[2][2] * v.z,
        )
    }

    pub fn transposed(&self) -> Matrix3 {
        let r = &self.rows;
        Matrix3::new([
            [r[0][0], r[1][0], r[2][0]],
            [r[0][1], r[1][1], r[2][1]],
            [r[0][2], r[1][2], r[2][2]],
        ])
    }
}
