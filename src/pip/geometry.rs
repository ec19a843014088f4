//! Geometry conversion and repair for boundary polygons.

use geo::{Area, Coord, InteriorPoint, LineString, MultiPolygon, Point, Polygon};

/// Outcome of repairing a multipolygon
#[derive(Debug, Clone)]
pub struct Sanitized {
    /// `None` when nothing usable remained
    pub geometry: Option<MultiPolygon<f64>>,
    /// Rings dropped because they were degenerate
    pub dropped_rings: usize,
}

/// Convert a GeoJSON geometry into a multipolygon.
///
/// Only `Polygon` and `MultiPolygon` are accepted. Positions with fewer than
/// two ordinates are skipped.
pub fn multipolygon_from_geojson(geometry: &geojson::Geometry) -> Option<MultiPolygon<f64>> {
    match &geometry.value {
        geojson::Value::Polygon(rings) => Some(MultiPolygon::new(vec![polygon_from_rings(rings)?])),
        geojson::Value::MultiPolygon(polygons) => {
            let polygons: Vec<Polygon<f64>> = polygons
                .iter()
                .filter_map(|rings| polygon_from_rings(rings))
                .collect();
            if polygons.is_empty() {
                None
            } else {
                Some(MultiPolygon::new(polygons))
            }
        }
        _ => None,
    }
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| {
        LineString::new(
            ring.iter()
                .filter(|pos| pos.len() >= 2)
                .map(|pos| Coord { x: pos[0], y: pos[1] })
                .collect(),
        )
    });
    let exterior = rings.next()?;
    Some(Polygon::new(exterior, rings.collect()))
}

/// Close open rings and drop degenerate ones.
///
/// A ring is degenerate when it has fewer than 4 positions once closed, a
/// non-finite coordinate, or (for an exterior) zero area. A polygon whose
/// exterior is degenerate is dropped along with its holes.
pub fn sanitize_multipolygon(geometry: MultiPolygon<f64>) -> Sanitized {
    let mut dropped_rings = 0;
    let mut polygons = Vec::with_capacity(geometry.0.len());

    for polygon in geometry {
        let (exterior, interiors) = polygon.into_inner();
        let exterior = match close_ring(exterior.0) {
            Some(ring) => ring,
            None => {
                dropped_rings += 1 + interiors.len();
                continue;
            }
        };

        let mut kept = Vec::with_capacity(interiors.len());
        for interior in interiors {
            match close_ring(interior.0) {
                Some(ring) => kept.push(ring),
                None => dropped_rings += 1,
            }
        }

        let polygon = Polygon::new(exterior, kept);
        if polygon.unsigned_area() <= 0.0 {
            dropped_rings += 1 + polygon.interiors().len();
            continue;
        }
        polygons.push(polygon);
    }

    Sanitized {
        geometry: if polygons.is_empty() {
            None
        } else {
            Some(MultiPolygon::new(polygons))
        },
        dropped_rings,
    }
}

fn close_ring(coords: Vec<Coord<f64>>) -> Option<LineString<f64>> {
    if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return None;
    }

    let mut ring = coords;
    if ring.len() < 3 {
        return None;
    }

    // Close the ring if needed
    if ring.first() != ring.last() {
        ring.push(ring[0]);
    }

    if ring.len() < 4 {
        return None;
    }

    Some(LineString::new(ring))
}

/// A point guaranteed to lie inside the geometry, used to locate a boundary
/// within its enclosing boundaries.
pub fn representative_point(geometry: &MultiPolygon<f64>) -> Option<Point<f64>> {
    geometry.interior_point()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Contains;

    #[test]
    fn test_close_open_ring() {
        let coords = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
            Coord { x: 0.0, y: 1.0 },
        ];
        let ring = close_ring(coords).unwrap();
        assert_eq!(ring.0.len(), 5);
        assert_eq!(ring.0.first(), ring.0.last());
    }

    #[test]
    fn test_short_ring_rejected() {
        let coords = vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 0.0 }];
        assert!(close_ring(coords).is_none());
    }

    #[test]
    fn test_sanitize_drops_degenerate_polygon() {
        let good = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0), (0.0, 0.0)]),
            vec![],
        );
        let flat = Polygon::new(
            LineString::from(vec![(5.0, 5.0), (6.0, 5.0), (7.0, 5.0), (5.0, 5.0)]),
            vec![],
        );
        let result = sanitize_multipolygon(MultiPolygon::new(vec![good, flat]));
        assert_eq!(result.dropped_rings, 1);
        assert_eq!(result.geometry.unwrap().0.len(), 1);
    }

    #[test]
    fn test_sanitize_all_degenerate() {
        let flat = Polygon::new(
            LineString::from(vec![(5.0, 5.0), (6.0, 5.0), (5.0, 5.0)]),
            vec![],
        );
        let result = sanitize_multipolygon(MultiPolygon::new(vec![flat]));
        assert!(result.geometry.is_none());
        assert_eq!(result.dropped_rings, 1);
    }

    #[test]
    fn test_geojson_polygon() {
        let geometry: geojson::Geometry = serde_json::from_str(
            r#"{"type":"Polygon","coordinates":[[[0,0],[4,0],[4,4],[0,4],[0,0]],[[1,1],[2,1],[2,2],[1,2],[1,1]]]}"#,
        )
        .unwrap();
        let mp = multipolygon_from_geojson(&geometry).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert!(mp.contains(&Point::new(3.0, 3.0)));
        assert!(!mp.contains(&Point::new(1.5, 1.5)));
    }

    #[test]
    fn test_geojson_point_rejected() {
        let geometry: geojson::Geometry =
            serde_json::from_str(r#"{"type":"Point","coordinates":[1,2]}"#).unwrap();
        assert!(multipolygon_from_geojson(&geometry).is_none());
    }

    #[test]
    fn test_representative_point_inside_concave_shape() {
        // U shape: the centroid falls in the notch, the interior point does not
        let u = MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (3.0, 0.0),
                (3.0, 3.0),
                (2.0, 3.0),
                (2.0, 1.0),
                (1.0, 1.0),
                (1.0, 3.0),
                (0.0, 3.0),
                (0.0, 0.0),
            ]),
            vec![],
        )]);
        let p = representative_point(&u).unwrap();
        assert!(u.contains(&p));
    }
}
