//! Geographic to projected coordinate conversion.
//!
//! The tile grid lives in PUWG 1992 (EPSG:2180): a transverse Mercator
//! projection of the GRS80 ellipsoid with the central meridian at 19°E,
//! scale 0.9993 and false origin (500 000, -5 300 000). The series below are
//! the classic Snyder expansions; a forward and inverse round trip stays
//! within a few centimeters across Poland.

use crate::config::GeoBbox;
use treefind_fetch::ProjectedBbox;

/// Conversion between latitude/longitude (degrees) and projected meters.
pub trait CrsTransform {
    /// `(lat, lon)` to `(x, y)`.
    fn to_projected(&self, lat: f64, lon: f64) -> (f64, f64);

    /// `(x, y)` to `(lat, lon)`.
    fn to_geographic(&self, x: f64, y: f64) -> (f64, f64);
}

/// Transverse Mercator on an ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    /// Semi-major axis (m).
    pub semi_major: f64,
    /// Flattening.
    pub flattening: f64,
    /// Central meridian (degrees).
    pub central_meridian: f64,
    /// Scale on the central meridian.
    pub scale: f64,
    /// Added to x (m).
    pub false_easting: f64,
    /// Added to y (m).
    pub false_northing: f64,
}

/// PUWG 1992, EPSG:2180.
pub const PUWG_1992: TransverseMercator = TransverseMercator {
    semi_major: 6_378_137.0,
    flattening: 1.0 / 298.257_222_101,
    central_meridian: 19.0,
    scale: 0.9993,
    false_easting: 500_000.0,
    false_northing: -5_300_000.0,
};

/// The projection of the tile grid.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Puwg1992;

impl CrsTransform for Puwg1992 {
    fn to_projected(&self, lat: f64, lon: f64) -> (f64, f64) {
        PUWG_1992.to_projected(lat, lon)
    }

    fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        PUWG_1992.to_geographic(x, y)
    }
}

impl TransverseMercator {
    fn e2(&self) -> f64 {
        self.flattening * (2.0 - self.flattening)
    }

    /// Meridian arc length from the equator to `phi` (radians).
    fn meridian_arc(&self, phi: f64) -> f64 {
        let e2 = self.e2();
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        self.semi_major
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
    }
}

impl CrsTransform for TransverseMercator {
    fn to_projected(&self, lat: f64, lon: f64) -> (f64, f64) {
        let e2 = self.e2();
        let ep2 = e2 / (1.0 - e2);
        let phi = lat.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();

        let n = self.semi_major / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let a = (lon - self.central_meridian).to_radians() * cos_phi;
        let m = self.meridian_arc(phi);

        let x = self.scale
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0);
        let y = self.scale
            * (m + n
                * tan_phi
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

        (x + self.false_easting, y + self.false_northing)
    }

    fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        let e2 = self.e2();
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let ep2 = e2 / (1.0 - e2);

        let m = (y - self.false_northing) / self.scale;
        let mu = m / (self.semi_major * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
        let root = (1.0 - e2).sqrt();
        let e1 = (1.0 - root) / (1.0 + root);

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let (sin1, cos1) = phi1.sin_cos();
        let tan1 = phi1.tan();
        let c1 = ep2 * cos1 * cos1;
        let t1 = tan1 * tan1;
        let w = 1.0 - e2 * sin1 * sin1;
        let n1 = self.semi_major / w.sqrt();
        let r1 = self.semi_major * (1.0 - e2) / w.powf(1.5);
        let d = (x - self.false_easting) / (n1 * self.scale);

        let phi = phi1
            - (n1 * tan1 / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let lambda = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5)
                / 120.0)
            / cos1;

        (phi.to_degrees(), self.central_meridian + lambda.to_degrees())
    }
}

/// Project a geographic box: north-west corner to upper-left, south-east
/// corner to lower-right.
pub fn project_bbox<C: CrsTransform + ?Sized>(crs: &C, bbox: &GeoBbox) -> ProjectedBbox {
    let (ulx, uly) = crs.to_projected(bbox.lat_max, bbox.lon_min);
    let (lrx, lry) = crs.to_projected(bbox.lat_min, bbox.lon_max);
    ProjectedBbox { ulx, uly, lrx, lry }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_central_meridian_has_false_easting() {
        let (x, _) = Puwg1992.to_projected(52.0, 19.0);
        assert_abs_diff_eq!(x, 500_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_symmetric_about_central_meridian() {
        let (xw, yw) = Puwg1992.to_projected(50.5, 17.0);
        let (xe, ye) = Puwg1992.to_projected(50.5, 21.0);
        assert_abs_diff_eq!(xw + xe, 1_000_000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(yw, ye, epsilon = 1e-6);
    }

    #[test]
    fn test_known_point_warsaw() {
        let (x, y) = Puwg1992.to_projected(52.2297, 21.0122);
        assert_abs_diff_eq!(x, 637_382.2, epsilon = 1.0);
        assert_abs_diff_eq!(y, 486_757.2, epsilon = 1.0);
    }

    #[test]
    fn test_round_trip() {
        for (lat, lon) in [(49.1, 14.2), (50.05, 19.85), (52.2297, 21.0122), (54.8, 24.1)] {
            let (x, y) = Puwg1992.to_projected(lat, lon);
            let (lat2, lon2) = Puwg1992.to_geographic(x, y);
            assert_abs_diff_eq!(lat, lat2, epsilon = 1e-6);
            assert_abs_diff_eq!(lon, lon2, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_project_bbox_orientation() {
        let bbox = GeoBbox::default();
        let projected = project_bbox(&Puwg1992, &bbox);
        assert!(projected.ulx < projected.lrx);
        assert!(projected.uly > projected.lry);
        assert_abs_diff_eq!(projected.ulx, 559_309.7, epsilon = 1.0);
        assert_abs_diff_eq!(projected.uly, 244_538.8, epsilon = 1.0);
    }
}
