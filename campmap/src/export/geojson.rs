//! Export d'un layer en FeatureCollection GeoJSON (carte publique)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geo::Geometry;
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use serde_json::{json, Map, Value};

use crate::models::{Feature, Layer};

/// Sérialise les features d'un layer en FeatureCollection
pub fn layer_to_geojson(layer: &Layer, features: &[Feature]) -> Result<String> {
    let features = features
        .iter()
        .map(feature_to_value)
        .collect::<Result<Vec<_>>>()?;

    let collection = json!({
        "type": "FeatureCollection",
        "name": layer.slug,
        "features": features,
    });
    Ok(serde_json::to_string(&collection)?)
}

/// Écrit l'export d'un layer dans un fichier
pub fn export_layer_to_file(layer: &Layer, features: &[Feature], output_path: &Path) -> Result<()> {
    let json = layer_to_geojson(layer, features)?;
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(json.as_bytes())?;
    writer.flush()?;
    Ok(())
}

fn feature_to_value(feature: &Feature) -> Result<Value> {
    let mut properties = Map::new();
    properties.insert("name".into(), Value::from(feature.name.as_str()));
    properties.insert("description".into(), Value::from(feature.description.as_str()));
    properties.insert("topic".into(), Value::from(feature.topic.as_str()));
    properties.insert("processing".into(), Value::from(feature.processing));
    properties.insert("color".into(), Value::from(feature.color.as_str()));
    properties.insert("icon".into(), Value::from(feature.icon.as_str()));
    properties.insert(
        "url".into(),
        feature.url.as_deref().map_or(Value::Null, Value::from),
    );

    Ok(json!({
        "type": "Feature",
        "id": feature.uuid,
        "geometry": geometry_to_value(feature)?,
        "properties": properties,
    }))
}

/// Géométrie via geozero, relue en `Value` pour l'intégrer au document
fn geometry_to_value(feature: &Feature) -> Result<Value> {
    let geometry = Geometry::GeometryCollection(feature.geometry.clone());
    let mut buf = Vec::new();
    let mut writer = GeoJsonWriter::new(&mut buf);
    geometry
        .process_geom(&mut writer)
        .with_context(|| format!("Failed to write geometry of feature {}", feature.uuid))?;
    serde_json::from_slice(&buf).context("geozero produced invalid GeoJSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{GeometryCollection, Point};

    fn layer() -> Layer {
        Layer {
            id: 1,
            uuid: "11111111-1111-1111-1111-111111111111".to_string(),
            name: "Power".to_string(),
            slug: "power".to_string(),
            description: String::new(),
            icon: "fas fa-bolt".to_string(),
            group: String::new(),
            camp: None,
        }
    }

    fn feature(geometry: GeometryCollection<f64>) -> Feature {
        Feature {
            id: 7,
            uuid: "22222222-2222-2222-2222-222222222222".to_string(),
            layer_id: 1,
            name: "Generator \"A\"".to_string(),
            description: "Diesel".to_string(),
            url: None,
            topic: "power".to_string(),
            processing: true,
            icon: "fas fa-bolt".to_string(),
            color: "#ff0000".to_string(),
            geometry,
        }
    }

    #[test]
    fn test_layer_to_geojson() {
        let gc = GeometryCollection(vec![Geometry::Point(Point::new(9.94, 55.38))]);
        let json = layer_to_geojson(&layer(), &[feature(gc)]).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["name"], "power");
        let f = &value["features"][0];
        assert_eq!(f["id"], "22222222-2222-2222-2222-222222222222");
        assert_eq!(f["properties"]["name"], "Generator \"A\"");
        assert_eq!(f["properties"]["processing"], true);
        assert!(f["properties"]["url"].is_null());
        assert_eq!(f["geometry"]["type"], "GeometryCollection");
        assert_eq!(f["geometry"]["geometries"][0]["type"], "Point");
    }

    #[test]
    fn test_empty_geometry_exported() {
        let json = layer_to_geojson(&layer(), &[feature(GeometryCollection(vec![]))]).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        let geometries = &value["features"][0]["geometry"]["geometries"];
        assert_eq!(geometries.as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn test_export_to_file() {
        let output_path = std::env::temp_dir().join("campmap_export_test.geojson");
        export_layer_to_file(&layer(), &[], &output_path).unwrap();

        let content = std::fs::read_to_string(&output_path).unwrap();
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["features"].as_array().map(Vec::len), Some(0));

        std::fs::remove_file(output_path).ok();
    }
}
