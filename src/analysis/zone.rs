// src/analysis/zone.rs
//
// Pixel-space monitoring polygon. Only detections whose anchor falls inside
// (edges included) are speed-evaluated.

use crate::types::Point2;
use geo::{Intersects, LineString, Polygon};

#[derive(Debug, Clone)]
pub struct MonitoringZone {
    /// None when fewer than 3 vertices were given
    polygon: Option<Polygon<f64>>,
}

impl MonitoringZone {
    pub fn new(vertices: Vec<Point2>) -> Self {
        let polygon = (vertices.len() >= 3).then(|| {
            let ring: LineString<f64> = vertices.iter().map(|p| (p.x, p.y)).collect();
            Polygon::new(ring, vec![])
        });
        Self { polygon }
    }

    /// Boundary points count as inside.
    pub fn contains(&self, p: Point2) -> bool {
        self.polygon
            .as_ref()
            .is_some_and(|poly| poly.intersects(&geo::Point::new(p.x, p.y)))
    }
}
