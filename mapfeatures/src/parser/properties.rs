//! Lecture du membre `properties` d'une feature

use serde_json::{Map, Value};
use url::Url;

use crate::types::{FeatureProperties, DEFAULT_COLOR};
use crate::MapFeaturesError;

/// Parse les attributs d'une feature
///
/// `name` est obligatoire, les autres attributs ont une valeur par défaut.
pub fn parse(
    index: usize,
    properties: Option<&Map<String, Value>>,
) -> Result<FeatureProperties, MapFeaturesError> {
    let empty = Map::new();
    let props = properties.unwrap_or(&empty);

    let name = optional_text(index, props, "name")?
        .filter(|name| !name.trim().is_empty())
        .ok_or(MapFeaturesError::MissingProperty {
            index,
            property: "name",
        })?;

    let processing = match props.get("processing") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            return Err(MapFeaturesError::InvalidProperty {
                index,
                property: "processing",
                reason: format!("expected a boolean, got {}", other),
            })
        }
    };

    let url = optional_text(index, props, "url")?.filter(|u| !u.is_empty());
    if let Some(ref raw) = url {
        validate_url(raw).map_err(|reason| MapFeaturesError::InvalidProperty {
            index,
            property: "url",
            reason,
        })?;
    }

    Ok(FeatureProperties {
        name,
        description: optional_text(index, props, "description")?.unwrap_or_default(),
        topic: optional_text(index, props, "topic")?.unwrap_or_default(),
        processing,
        color: optional_text(index, props, "color")?
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        url,
        icon: optional_text(index, props, "icon")?.filter(|i| !i.is_empty()),
    })
}

/// Vérifie qu'une URL est absolue et en http(s)
pub fn validate_url(raw: &str) -> Result<(), String> {
    let parsed = Url::parse(raw).map_err(|e| e.to_string())?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}

fn optional_text(
    index: usize,
    props: &Map<String, Value>,
    property: &'static str,
) -> Result<Option<String>, MapFeaturesError> {
    match props.get(property) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        // Les exports QGIS écrivent parfois des nombres à la place du texte
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(MapFeaturesError::InvalidProperty {
            index,
            property,
            reason: format!("expected a string, got {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_full_properties() {
        let p = props(json!({
            "name": "A",
            "description": "d",
            "topic": "t",
            "processing": true,
            "color": "#fff",
            "url": "https://bornhack.dk/",
            "icon": "fas fa-tent"
        }));
        let parsed = parse(0, Some(&p)).unwrap();
        assert_eq!(parsed.name, "A");
        assert_eq!(parsed.description, "d");
        assert_eq!(parsed.topic, "t");
        assert!(parsed.processing);
        assert_eq!(parsed.color, "#fff");
        assert_eq!(parsed.url.as_deref(), Some("https://bornhack.dk/"));
        assert_eq!(parsed.icon.as_deref(), Some("fas fa-tent"));
    }

    #[test]
    fn test_defaults() {
        let p = props(json!({"name": "Only a name"}));
        let parsed = parse(0, Some(&p)).unwrap();
        assert_eq!(parsed, FeatureProperties::named("Only a name"));
    }

    #[test]
    fn test_missing_name() {
        let p = props(json!({"description": "no name"}));
        assert!(matches!(
            parse(3, Some(&p)),
            Err(MapFeaturesError::MissingProperty { index: 3, property: "name" })
        ));
        assert!(parse(0, None).is_err());
    }

    #[test]
    fn test_processing_must_be_bool() {
        let p = props(json!({"name": "A", "processing": "yes"}));
        assert!(parse(0, Some(&p)).is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(validate_url("http://example.org/map").is_ok());
        assert!(validate_url("ftp://example.org/").is_err());
        assert!(validate_url("not a url").is_err());

        let p = props(json!({"name": "A", "url": "javascript:alert(1)"}));
        assert!(parse(0, Some(&p)).is_err());
    }
}
