// src/analysis/rectifier.rs
//
// Perspective correction from image pixels onto the road ground plane.
//
// The four calibration corners give eight linear equations in the eight
// unknown homography coefficients (h33 fixed to 1). Solved once at
// construction; every frame afterwards is a 3x3 multiply per anchor.
//
// Invariant: neither quadrilateral may have three collinear (or two
// coincident) corners. Construction fails on such input.

use crate::types::Point2;
use anyhow::{anyhow, bail, Result};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

/// Relative tolerance for the collinearity check, scaled by the squared
/// extent of the quadrilateral.
const COLLINEAR_EPS: f64 = 1e-9;

/// Relative tolerance on the projective denominator below which a point is
/// treated as lying on the horizon line.
const HORIZON_EPS: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct PlanarRectifier {
    homography: Matrix3<f64>,
}

impl PlanarRectifier {
    pub fn new(source: &[Point2; 4], target: &[Point2; 4]) -> Result<Self> {
        ensure_general_position(source, "source")?;
        ensure_general_position(target, "target")?;

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for (i, (s, t)) in source.iter().zip(target.iter()).enumerate() {
            let r = 2 * i;
            // u = (h11 x + h12 y + h13) / (h31 x + h32 y + 1)
            a[(r, 0)] = s.x;
            a[(r, 1)] = s.y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -t.x * s.x;
            a[(r, 7)] = -t.x * s.y;
            b[r] = t.x;
            // v = (h21 x + h22 y + h23) / (h31 x + h32 y + 1)
            a[(r + 1, 3)] = s.x;
            a[(r + 1, 4)] = s.y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -t.y * s.x;
            a[(r + 1, 7)] = -t.y * s.y;
            b[r + 1] = t.y;
        }

        let h = a
            .lu()
            .solve(&b)
            .ok_or_else(|| anyhow!("Calibration corners do not define a homography"))?;

        let homography = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        if homography.iter().any(|v| !v.is_finite()) {
            bail!("Calibration homography is not finite");
        }

        Ok(Self { homography })
    }

    /// None for points on the horizon line, which have no finite image on
    /// the ground plane.
    pub fn rectify_point(&self, p: Point2) -> Option<Point2> {
        let h = &self.homography;
        let v = h * Vector3::new(p.x, p.y, 1.0);
        let scale = (h[(2, 0)] * p.x).abs() + (h[(2, 1)] * p.y).abs() + h[(2, 2)].abs();
        if v.z.abs() <= HORIZON_EPS * scale {
            return None;
        }
        Some(Point2::new(v.x / v.z, v.y / v.z))
    }

    /// Map pixel points onto the ground plane, one entry per input point.
    /// Empty in, empty out.
    pub fn rectify(&self, points: &[Point2]) -> Vec<Option<Point2>> {
        points.iter().map(|p| self.rectify_point(*p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CalibrationConfig;

    fn close(a: Point2, b: Point2, eps: f64) -> bool {
        (a.x - b.x).abs() < eps && (a.y - b.y).abs() < eps
    }

    #[test]
    fn test_source_corners_map_to_target_corners() {
        let cal = CalibrationConfig::default();
        let target = cal.target();
        let rectifier = PlanarRectifier::new(&cal.source, &target).unwrap();

        let mapped = rectifier.rectify(&cal.source);
        assert_eq!(mapped.len(), 4);
        for (m, t) in mapped.iter().zip(target.iter()) {
            let m = m.expect("calibration corner must map");
            assert!(close(m, *t, 1e-6), "expected {:?}, got {:?}", t, m);
        }
    }

    #[test]
    fn test_scaling_square() {
        let source = [
            Point2::new(0.0, 0.0),
            Point2::new(200.0, 0.0),
            Point2::new(200.0, 200.0),
            Point2::new(0.0, 200.0),
        ];
        let target = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];
        let rectifier = PlanarRectifier::new(&source, &target).unwrap();
        let p = rectifier.rectify_point(Point2::new(100.0, 50.0)).unwrap();
        assert!(close(p, Point2::new(5.0, 2.5), 1e-9), "got {:?}", p);
    }

    #[test]
    fn test_symmetric_trapezoid_keeps_center_line() {
        // Road narrowing towards the horizon
        let source = [
            Point2::new(400.0, 100.0),
            Point2::new(600.0, 100.0),
            Point2::new(900.0, 700.0),
            Point2::new(100.0, 700.0),
        ];
        let target = [
            Point2::new(0.0, 0.0),
            Point2::new(20.0, 0.0),
            Point2::new(20.0, 100.0),
            Point2::new(0.0, 100.0),
        ];
        let rectifier = PlanarRectifier::new(&source, &target).unwrap();

        let near = rectifier.rectify_point(Point2::new(500.0, 600.0)).unwrap();
        let far = rectifier.rectify_point(Point2::new(500.0, 200.0)).unwrap();
        assert!((near.x - 10.0).abs() < 1e-6);
        assert!((far.x - 10.0).abs() < 1e-6);
        // Equal pixel steps cover more ground far away than near the camera
        let mid = rectifier.rectify_point(Point2::new(500.0, 400.0)).unwrap();
        assert!(mid.y - far.y > near.y - mid.y);
    }

    #[test]
    fn test_horizon_line_has_no_ground_image() {
        // Road edges meet at (500, -100); the horizon is the line y = -100
        let source = [
            Point2::new(400.0, 100.0),
            Point2::new(600.0, 100.0),
            Point2::new(900.0, 700.0),
            Point2::new(100.0, 700.0),
        ];
        let target = [
            Point2::new(0.0, 0.0),
            Point2::new(20.0, 0.0),
            Point2::new(20.0, 100.0),
            Point2::new(0.0, 100.0),
        ];
        let rectifier = PlanarRectifier::new(&source, &target).unwrap();
        assert_eq!(rectifier.rectify_point(Point2::new(500.0, -100.0)), None);
        assert_eq!(rectifier.rectify_point(Point2::new(1200.0, -100.0)), None);

        let mapped = rectifier.rectify(&[Point2::new(500.0, -100.0), Point2::new(500.0, 400.0)]);
        assert_eq!(mapped.len(), 2);
        assert!(mapped[0].is_none());
        assert!(mapped[1].is_some());
    }

    #[test]
    fn test_empty_input_returns_empty() {
        let cal = CalibrationConfig::default();
        let rectifier = PlanarRectifier::new(&cal.source, &cal.target()).unwrap();
        assert!(rectifier.rectify(&[]).is_empty());
    }

    #[test]
    fn test_collinear_source_rejected() {
        let source = [
            Point2::new(0.0, 0.0),
            Point2::new(50.0, 50.0),
            Point2::new(100.0, 100.0),
            Point2::new(0.0, 100.0),
        ];
        let target = CalibrationConfig::default().target();
        assert!(PlanarRectifier::new(&source, &target).is_err());
    }

    #[test]
    fn test_duplicate_corner_rejected() {
        let source = [
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 100.0),
            Point2::new(0.0, 100.0),
        ];
        let target = CalibrationConfig::default().target();
        assert!(PlanarRectifier::new(&source, &target).is_err());
    }
}
