use super::{Ecef, Geodetic, LngLat, Vec3, ecef_to_geodetic, geodetic_to_ecef};

/// Local East-North-Up coordinates (meters).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Enu {
    pub east: f64,
    pub north: f64,
    pub up: f64,
}

impl Enu {
    pub fn new(east: f64, north: f64, up: f64) -> Self {
        Self { east, north, up }
    }
}

pub fn ecef_to_enu(point: Ecef, origin: Geodetic) -> Enu {
    let origin_ecef = geodetic_to_ecef(origin);
    let dx = point.x - origin_ecef.x;
    let dy = point.y - origin_ecef.y;
    let dz = point.z - origin_ecef.z;

    let sin_lat = origin.lat_rad.sin();
    let cos_lat = origin.lat_rad.cos();
    let sin_lon = origin.lon_rad.sin();
    let cos_lon = origin.lon_rad.cos();

    let east = -sin_lon * dx + cos_lon * dy;
    let north = -sin_lat * cos_lon * dx - sin_lat * sin_lon * dy + cos_lat * dz;
    let up = cos_lat * cos_lon * dx + cos_lat * sin_lon * dy + sin_lat * dz;

    Enu::new(east, north, up)
}

pub fn enu_to_ecef(enu: Enu, origin: Geodetic) -> Ecef {
    let origin_ecef = geodetic_to_ecef(origin);

    let sin_lat = origin.lat_rad.sin();
    let cos_lat = origin.lat_rad.cos();
    let sin_lon = origin.lon_rad.sin();
    let cos_lon = origin.lon_rad.cos();

    let dx = -sin_lon * enu.east - sin_lat * cos_lon * enu.north + cos_lat * cos_lon * enu.up;
    let dy = cos_lon * enu.east - sin_lat * sin_lon * enu.north + cos_lat * sin_lon * enu.up;
    let dz = cos_lat * enu.north + sin_lat * enu.up;

    Ecef::new(origin_ecef.x + dx, origin_ecef.y + dy, origin_ecef.z + dz)
}

/// Tangent-plane frame anchored at a fixed geographic origin.
///
/// Scene coordinates are meters: x east, y north, z up. The map scene is a few
/// kilometers across, so `f64` ENU keeps sub-millimeter precision everywhere.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocalFrame {
    origin: Geodetic,
}

impl LocalFrame {
    pub fn new(origin: LngLat) -> Self {
        Self {
            origin: origin.to_geodetic(0.0),
        }
    }

    pub fn origin(&self) -> LngLat {
        LngLat::from(self.origin)
    }

    pub fn to_local(&self, p: LngLat, alt_m: f64) -> Vec3 {
        let ecef = geodetic_to_ecef(p.to_geodetic(alt_m));
        let enu = ecef_to_enu(ecef, self.origin);
        Vec3::new(enu.east, enu.north, enu.up)
    }

    pub fn to_lng_lat(&self, p: Vec3) -> LngLat {
        let ecef = enu_to_ecef(Enu::new(p.x, p.y, p.z), self.origin);
        LngLat::from(ecef_to_geodetic(ecef))
    }
}

#[cfg(test)]
mod tests {
    use super::{Enu, LocalFrame, ecef_to_enu, enu_to_ecef};
    use crate::math::{Geodetic, LngLat, geodetic_to_ecef};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn enu_round_trip_at_equator() {
        let origin = Geodetic::new(0.0, 0.0, 0.0);
        let enu = Enu::new(15.0, -8.0, 2.5);
        let ecef = enu_to_ecef(enu, origin);
        let enu_rt = ecef_to_enu(ecef, origin);

        assert_close(enu_rt.east, enu.east, 1e-9);
        assert_close(enu_rt.north, enu.north, 1e-9);
        assert_close(enu_rt.up, enu.up, 1e-9);
    }

    #[test]
    fn enu_zero_at_origin() {
        let origin = Geodetic::new(0.1, -0.2, 35.0);
        let origin_ecef = geodetic_to_ecef(origin);
        let enu = ecef_to_enu(origin_ecef, origin);
        assert_close(enu.east, 0.0, 1e-9);
        assert_close(enu.north, 0.0, 1e-9);
        assert_close(enu.up, 0.0, 1e-9);
    }

    #[test]
    fn local_frame_axes_point_east_and_north() {
        let frame = LocalFrame::new(LngLat::new(15.9819, 45.815));
        let east = frame.to_local(LngLat::new(15.9829, 45.815), 0.0);
        let north = frame.to_local(LngLat::new(15.9819, 45.816), 0.0);
        assert!(east.x > 70.0 && east.x < 80.0, "east offset {east:?}");
        assert_close(east.y, 0.0, 0.01);
        assert!(north.y > 110.0 && north.y < 112.0, "north offset {north:?}");
        assert_close(north.x, 0.0, 1e-6);
    }

    #[test]
    fn local_frame_round_trip() {
        let frame = LocalFrame::new(LngLat::new(15.9819, 45.815));
        let p = LngLat::new(15.9901, 45.8093);
        let back = frame.to_lng_lat(frame.to_local(p, 0.0));
        assert_close(back.lng, p.lng, 1e-9);
        assert_close(back.lat, p.lat, 1e-9);
    }
}
