//! Conversion des géométries GeoJSON en `GeometryCollection`
//!
//! Toute géométrie importée est stockée sous forme de collection:
//! - `null` → collection vide
//! - `GeometryCollection` → chaque sous-géométrie est parsée séparément,
//!   la première en échec invalide toute la collection
//! - autre type → collection d'un seul élément

use geo::{Geometry, GeometryCollection, LineString, Polygon};
use serde_json::Value;

use crate::MapFeaturesError;

/// Parse le membre `geometry` d'une feature
pub fn parse(index: usize, value: &Value) -> Result<GeometryCollection<f64>, MapFeaturesError> {
    if value.is_null() {
        return Ok(GeometryCollection(Vec::new()));
    }

    let geometry_type = value.get("type").and_then(Value::as_str);
    if geometry_type == Some("GeometryCollection") {
        let members = value
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                MapFeaturesError::invalid_geometry(index, "GeometryCollection without geometries")
            })?;

        let geometries = members
            .iter()
            .map(|member| parse_single(index, member))
            .collect::<Result<Vec<_>, _>>()?;

        return Ok(GeometryCollection(geometries));
    }

    parse_single(index, value).map(|geometry| GeometryCollection(vec![geometry]))
}

/// Parse une géométrie simple (Point, LineString, Polygon, Multi*)
fn parse_single(index: usize, value: &Value) -> Result<Geometry<f64>, MapFeaturesError> {
    let geometry = geojson::Geometry::from_json_value(value.clone())
        .map_err(|e| MapFeaturesError::invalid_geometry(index, e.to_string()))?;

    // geojson indexe les positions sans vérifier leur longueur
    check_positions(&geometry.value)
        .map_err(|reason| MapFeaturesError::invalid_geometry(index, reason))?;

    let geometry = Geometry::<f64>::try_from(geometry)
        .map_err(|e| MapFeaturesError::invalid_geometry(index, e.to_string()))?;

    if !geometry_is_valid(&geometry) {
        return Err(MapFeaturesError::invalid_geometry(
            index,
            "degenerate line or unclosed polygon ring",
        ));
    }

    Ok(geometry)
}

fn check_positions(value: &geojson::Value) -> Result<(), String> {
    use geojson::Value as G;

    fn position(p: &[f64]) -> Result<(), String> {
        if p.len() < 2 {
            return Err(format!("position needs at least 2 numbers, got {}", p.len()));
        }
        if p.iter().any(|n| !n.is_finite()) {
            return Err("position contains a non-finite number".to_string());
        }
        Ok(())
    }

    // geo_types ferme les anneaux à la construction: la fermeture se vérifie ici
    fn ring(r: &[Vec<f64>]) -> Result<(), String> {
        r.iter().try_for_each(|p| position(p))?;
        if r.len() < 4 {
            return Err(format!("polygon ring needs at least 4 positions, got {}", r.len()));
        }
        if r.first() != r.last() {
            return Err("polygon ring is not closed".to_string());
        }
        Ok(())
    }

    match value {
        G::Point(p) => position(p),
        G::MultiPoint(ps) | G::LineString(ps) => ps.iter().try_for_each(|p| position(p)),
        G::MultiLineString(lines) => lines
            .iter()
            .flatten()
            .try_for_each(|p| position(p)),
        G::Polygon(rings) => rings.iter().try_for_each(|r| ring(r)),
        G::MultiPolygon(polygons) => polygons
            .iter()
            .flatten()
            .try_for_each(|r| ring(r)),
        G::GeometryCollection(members) => members
            .iter()
            .try_for_each(|member| check_positions(&member.value)),
    }
}

/// Vérifie qu'une géométrie serait acceptée par PostGIS
pub fn geometry_is_valid(geometry: &Geometry<f64>) -> bool {
    fn ring_ok(r: &LineString<f64>) -> bool {
        // LinearRing: >= 4 points, first == last
        r.0.len() >= 4 && r.0.first() == r.0.last()
    }

    fn polygon_ok(p: &Polygon<f64>) -> bool {
        ring_ok(p.exterior()) && p.interiors().iter().all(ring_ok)
    }

    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => true,
        Geometry::LineString(ls) => ls.0.len() >= 2,
        Geometry::MultiLineString(mls) => mls.0.iter().all(|ls| ls.0.len() >= 2),
        Geometry::Polygon(p) => polygon_ok(p),
        Geometry::MultiPolygon(mp) => mp.0.iter().all(polygon_ok),
        Geometry::GeometryCollection(gc) => gc.0.iter().all(geometry_is_valid),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_geometry_is_empty_collection() {
        let gc = parse(0, &Value::Null).unwrap();
        assert!(gc.0.is_empty());
    }

    #[test]
    fn test_point_wrapped_in_collection() {
        let gc = parse(0, &json!({"type": "Point", "coordinates": [1, 2]})).unwrap();
        assert_eq!(gc.0.len(), 1);
        assert_eq!(gc.0[0], Geometry::Point(geo::Point::new(1.0, 2.0)));
    }

    #[test]
    fn test_geometry_collection_members() {
        let value = json!({
            "type": "GeometryCollection",
            "geometries": [
                {"type": "Point", "coordinates": [10.0, 55.0]},
                {"type": "LineString", "coordinates": [[10.0, 55.0], [10.1, 55.1]]}
            ]
        });
        let gc = parse(4, &value).unwrap();
        assert_eq!(gc.0.len(), 2);
    }

    #[test]
    fn test_geometry_collection_fails_as_a_unit() {
        let value = json!({
            "type": "GeometryCollection",
            "geometries": [
                {"type": "Point", "coordinates": [10.0, 55.0]},
                {"type": "Point", "coordinates": [10.0]}
            ]
        });
        let err = parse(2, &value).unwrap_err();
        assert_eq!(err.feature_index(), Some(2));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(parse(0, &json!({"type": "Circle", "coordinates": [1, 2]})).is_err());
    }

    #[test]
    fn test_short_position_rejected() {
        assert!(parse(0, &json!({"type": "Point", "coordinates": [1]})).is_err());
    }

    #[test]
    fn test_non_numeric_coordinates_rejected() {
        assert!(parse(0, &json!({"type": "Point", "coordinates": ["a", "b"]})).is_err());
    }

    #[test]
    fn test_unclosed_ring_rejected() {
        let value = json!({
            "type": "Polygon",
            "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1]]]
        });
        assert!(parse(0, &value).is_err());
    }

    #[test]
    fn test_short_unclosed_ring_rejected() {
        let value = json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1]]]});
        let err = parse(0, &value).unwrap_err();
        assert!(err.to_string().contains("at least 4 positions"));
    }

    #[test]
    fn test_unclosed_multipolygon_ring_rejected() {
        let value = json!({
            "type": "MultiPolygon",
            "coordinates": [
                [[[0, 0], [1, 0], [1, 1], [0, 0]]],
                [[[5, 5], [6, 5], [6, 6], [5, 6]]]
            ]
        });
        let err = parse(0, &value).unwrap_err();
        assert!(err.to_string().contains("not closed"));
    }

    #[test]
    fn test_unclosed_ring_inside_collection_rejects_collection() {
        let value = json!({
            "type": "GeometryCollection",
            "geometries": [
                {"type": "Point", "coordinates": [9.941, 55.389]},
                {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1]]]}
            ]
        });
        assert_eq!(parse(4, &value).unwrap_err().feature_index(), Some(4));
    }

    #[test]
    fn test_closed_ring_accepted() {
        let value = json!({
            "type": "Polygon",
            "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]
        });
        assert!(parse(0, &value).is_ok());
    }

    #[test]
    fn test_single_point_line_rejected() {
        let value = json!({"type": "LineString", "coordinates": [[0, 0]]});
        assert!(parse(0, &value).is_err());
    }
}
