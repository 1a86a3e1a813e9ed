//! Types de données pour le crate mapfeatures

use geo::GeometryCollection;

use crate::MapFeaturesError;

/// Couleur appliquée quand la feature n'en précise pas
pub const DEFAULT_COLOR: &str = "#ffffff";

/// Résultat du parsing d'un payload `FeatureCollection`
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Features prêtes à être upsertées, dans l'ordre du payload
    pub features: Vec<ParsedFeature>,

    /// Erreurs non fatales (une par feature rejetée)
    pub errors: Vec<MapFeaturesError>,
}

impl ParseResult {
    /// Nombre d'éléments présents dans le payload
    pub fn total(&self) -> usize {
        self.features.len() + self.errors.len()
    }
}

/// Une feature validée avec sa géométrie et ses attributs
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFeature {
    /// Position dans le tableau `features`
    pub index: usize,

    /// Attributs issus de `properties`
    pub properties: FeatureProperties,

    /// Géométrie, toujours sous forme de collection (vide si `geometry: null`)
    pub geometry: GeometryCollection<f64>,
}

/// Attributs d'une feature de carte
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureProperties {
    pub name: String,
    pub description: String,
    pub topic: String,
    pub processing: bool,
    pub color: String,
    pub url: Option<String>,
    pub icon: Option<String>,
}

impl FeatureProperties {
    /// Attributs minimaux: seul le nom est obligatoire
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            topic: String::new(),
            processing: false,
            color: DEFAULT_COLOR.to_string(),
            url: None,
            icon: None,
        }
    }
}
