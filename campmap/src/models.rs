//! Modèles du domaine: layers, features et layers externes

use geo::GeometryCollection;
use mapfeatures::parser::geometry::geometry_is_valid;
use mapfeatures::{collection_hash, validate_url, ParsedFeature, DEFAULT_COLOR};
use serde::Serialize;

use crate::error::CampMapError;

/// Icône par défaut d'un layer
pub const DEFAULT_LAYER_ICON: &str = "fas fa-list";

/// Icône par défaut d'une feature
pub const DEFAULT_FEATURE_ICON: &str = "fas fa-location-dot";

/// Groupe nommé de features, global (`camp: None`) ou propre à un camp
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub icon: String,
    pub group: String,
    pub camp: Option<String>,
}

/// Saisie de création ou de modification d'un layer
#[derive(Debug, Clone, Default)]
pub struct LayerDraft {
    pub name: String,
    /// Dérivé du nom si absent
    pub slug: Option<String>,
    pub description: String,
    pub icon: Option<String>,
    pub group: String,
    pub camp: Option<String>,
}

impl LayerDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Slug effectif du layer
    pub fn resolved_slug(&self) -> String {
        match self.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slugify(slug),
            _ => slugify(&self.name),
        }
    }

    pub fn resolved_icon(&self) -> &str {
        self.icon
            .as_deref()
            .filter(|i| !i.is_empty())
            .unwrap_or(DEFAULT_LAYER_ICON)
    }

    pub fn validate(&self) -> Result<(), CampMapError> {
        if self.name.trim().is_empty() {
            return Err(CampMapError::validation("layer name is required"));
        }
        if self.resolved_slug().is_empty() {
            return Err(CampMapError::validation(format!(
                "cannot derive a slug from '{}'",
                self.name
            )));
        }
        Ok(())
    }

    /// Reprend les valeurs d'un layer existant (base d'une modification)
    pub fn from_layer(layer: &Layer) -> Self {
        Self {
            name: layer.name.clone(),
            slug: Some(layer.slug.clone()),
            description: layer.description.clone(),
            icon: Some(layer.icon.clone()),
            group: layer.group.clone(),
            camp: layer.camp.clone(),
        }
    }
}

/// Une géométrie de carte rattachée à exactement un layer
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: i64,
    pub uuid: String,
    pub layer_id: i64,
    pub name: String,
    pub description: String,
    pub url: Option<String>,
    pub topic: String,
    pub processing: bool,
    pub icon: String,
    pub color: String,
    pub geometry: GeometryCollection<f64>,
}

impl Feature {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            layer_id: self.layer_id,
            name: self.name.clone(),
            description: self.description.clone(),
            topic: self.topic.clone(),
            processing: self.processing,
            color: self.color.clone(),
            geom_hash: collection_hash(&self.geometry),
        }
    }
}

/// Saisie de création ou de modification d'une feature
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDraft {
    pub name: String,
    pub description: String,
    pub url: Option<String>,
    pub topic: String,
    pub processing: bool,
    pub icon: Option<String>,
    pub color: String,
    pub geometry: GeometryCollection<f64>,
}

impl FeatureDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            url: None,
            topic: String::new(),
            processing: false,
            icon: None,
            color: DEFAULT_COLOR.to_string(),
            geometry: GeometryCollection(Vec::new()),
        }
    }

    pub fn from_feature(feature: &Feature) -> Self {
        Self {
            name: feature.name.clone(),
            description: feature.description.clone(),
            url: feature.url.clone(),
            topic: feature.topic.clone(),
            processing: feature.processing,
            icon: Some(feature.icon.clone()),
            color: feature.color.clone(),
            geometry: feature.geometry.clone(),
        }
    }

    pub fn resolved_icon(&self) -> &str {
        self.icon
            .as_deref()
            .filter(|i| !i.is_empty())
            .unwrap_or(DEFAULT_FEATURE_ICON)
    }

    pub fn validate(&self) -> Result<(), CampMapError> {
        if self.name.trim().is_empty() {
            return Err(CampMapError::validation("feature name is required"));
        }
        if self.color.trim().is_empty() {
            return Err(CampMapError::validation("feature color is required"));
        }
        if let Some(ref url) = self.url {
            validate_url(url)
                .map_err(|e| CampMapError::validation(format!("invalid url '{}': {}", url, e)))?;
        }
        if let Some(position) = self.geometry.0.iter().position(|g| !geometry_is_valid(g)) {
            return Err(CampMapError::validation(format!(
                "geometry #{} is degenerate (short line or unclosed ring)",
                position
            )));
        }
        Ok(())
    }

    /// Clé naturelle de la feature une fois rattachée à `layer_id`
    pub fn natural_key(&self, layer_id: i64) -> NaturalKey {
        NaturalKey {
            layer_id,
            name: self.name.clone(),
            description: self.description.clone(),
            topic: self.topic.clone(),
            processing: self.processing,
            color: self.color.clone(),
            geom_hash: collection_hash(&self.geometry),
        }
    }
}

impl From<ParsedFeature> for FeatureDraft {
    fn from(parsed: ParsedFeature) -> Self {
        let props = parsed.properties;
        Self {
            name: props.name,
            description: props.description,
            url: props.url,
            topic: props.topic,
            processing: props.processing,
            icon: props.icon,
            color: props.color,
            geometry: parsed.geometry,
        }
    }
}

/// Clé naturelle d'une feature: (name, description, topic, processing,
/// color, layer, geometry). La géométrie est représentée par son empreinte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub layer_id: i64,
    pub name: String,
    pub description: String,
    pub topic: String,
    pub processing: bool,
    pub color: String,
    pub geom_hash: [u8; 32],
}

/// Layer hébergé ailleurs, référencé par son URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalLayer {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub camp: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExternalLayerDraft {
    pub name: String,
    pub description: String,
    pub camp: Option<String>,
    pub url: String,
}

impl ExternalLayerDraft {
    pub fn validate(&self) -> Result<(), CampMapError> {
        if self.name.trim().is_empty() {
            return Err(CampMapError::validation("external layer name is required"));
        }
        validate_url(&self.url).map_err(|e| {
            CampMapError::validation(format!("invalid url '{}': {}", self.url, e))
        })
    }

    pub fn from_external_layer(layer: &ExternalLayer) -> Self {
        Self {
            name: layer.name.clone(),
            description: layer.description.clone(),
            camp: layer.camp.clone(),
            url: layer.url.clone(),
        }
    }
}

/// Convertit un texte en slug: minuscules ASCII, chiffres et tirets
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }

    slug
}
