//! Parser pour le document `FeatureCollection` de premier niveau

use serde_json::Value;
use tracing::{debug, warn};

use crate::parser::{geometry, properties};
use crate::types::{ParseResult, ParsedFeature};
use crate::MapFeaturesError;

/// Parse un payload GeoJSON `FeatureCollection`
///
/// Les erreurs de premier niveau (JSON invalide, mauvais type, `features`
/// absent) sont fatales. Les erreurs d'une feature sont collectées dans
/// `ParseResult::errors` et n'interrompent pas le parsing.
pub fn parse(payload: &str) -> Result<ParseResult, MapFeaturesError> {
    let document: Value = serde_json::from_str(payload)?;

    match document.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {}
        Some(other) => return Err(MapFeaturesError::NotAFeatureCollection(other.to_string())),
        None => return Err(MapFeaturesError::NotAFeatureCollection("no type".to_string())),
    }

    let elements = document
        .get("features")
        .and_then(Value::as_array)
        .ok_or(MapFeaturesError::MissingFeatures)?;

    let mut result = ParseResult::default();

    for (index, element) in elements.iter().enumerate() {
        match parse_feature(index, element) {
            Ok(feature) => result.features.push(feature),
            Err(e) => {
                warn!(index, error = %e, "Skipping feature");
                result.errors.push(e);
            }
        }
    }

    debug!(
        features = result.features.len(),
        errors = result.errors.len(),
        "Parsed FeatureCollection"
    );

    Ok(result)
}

/// Parse un élément du tableau `features`
pub fn parse_feature(index: usize, element: &Value) -> Result<ParsedFeature, MapFeaturesError> {
    let object = element
        .as_object()
        .ok_or_else(|| MapFeaturesError::invalid_feature(index, "not a JSON object"))?;

    match object.get("type").and_then(Value::as_str) {
        Some("Feature") => {}
        Some(other) => {
            return Err(MapFeaturesError::invalid_feature(
                index,
                format!("expected type Feature, got {}", other),
            ))
        }
        None => return Err(MapFeaturesError::invalid_feature(index, "missing type")),
    }

    let properties =
        properties::parse(index, object.get("properties").and_then(Value::as_object))?;
    let geometry = geometry::parse(index, object.get("geometry").unwrap_or(&Value::Null))?;

    Ok(ParsedFeature {
        index,
        properties,
        geometry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_json_is_fatal() {
        let err = parse("{not json").unwrap_err();
        assert!(matches!(err, MapFeaturesError::InvalidJson(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_wrong_top_level_type() {
        let err = parse(r#"{"type":"Feature","geometry":null,"properties":{}}"#).unwrap_err();
        assert!(matches!(err, MapFeaturesError::NotAFeatureCollection(ref t) if t == "Feature"));

        let err = parse("[]").unwrap_err();
        assert!(matches!(err, MapFeaturesError::NotAFeatureCollection(_)));
    }

    #[test]
    fn test_missing_features_array() {
        let err = parse(r#"{"type":"FeatureCollection"}"#).unwrap_err();
        assert!(matches!(err, MapFeaturesError::MissingFeatures));
    }

    #[test]
    fn test_empty_collection() {
        let result = parse(r#"{"type":"FeatureCollection","features":[]}"#).unwrap();
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_mixed_collection() {
        let payload = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 2]},
                 "properties": {"name": "A"}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": "oops"},
                 "properties": {"name": "B"}},
                {"type": "Feature", "geometry": null, "properties": {"name": "C"}},
                {"type": "Point", "coordinates": [1, 2]}
            ]
        }"#;

        let result = parse(payload).unwrap();
        assert_eq!(result.features.len(), 2);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.features[0].properties.name, "A");
        assert_eq!(result.features[1].index, 2);
        assert!(result.features[1].geometry.0.is_empty());
        assert_eq!(result.errors[0].feature_index(), Some(1));
        assert_eq!(result.errors[1].feature_index(), Some(3));
    }

    #[test]
    fn test_missing_geometry_member_treated_as_null() {
        let element = serde_json::json!({"type": "Feature", "properties": {"name": "A"}});
        let feature = parse_feature(0, &element).unwrap();
        assert!(feature.geometry.0.is_empty());
    }
}
