//! # mapfeatures
//!
//! Parser pour les payloads GeoJSON `FeatureCollection` importés dans les
//! layers de la carte du camp.
//!
//! ## Features
//!
//! - Validation du document de premier niveau (fatale) séparée de la
//!   validation de chaque feature (non fatale, comptée)
//! - Géométries normalisées en `GeometryCollection` (types `geo`)
//! - Empreinte stable des géométries pour la clé naturelle des features
//!
//! ## Usage
//!
//! ```rust,ignore
//! let result = mapfeatures::parse(&payload)?;
//! for feature in &result.features {
//!     println!("{}: {} geometries", feature.properties.name, feature.geometry.0.len());
//! }
//! println!("{} features rejected", result.errors.len());
//! ```

pub mod error;
pub mod hash;
pub mod parser;
pub mod types;

pub use error::MapFeaturesError;
pub use hash::collection_hash;
pub use parser::properties::validate_url;
pub use types::{FeatureProperties, ParseResult, ParsedFeature, DEFAULT_COLOR};

/// Parse un payload GeoJSON `FeatureCollection`.
///
/// # Errors
///
/// Retourne `MapFeaturesError` si le payload n'est pas du JSON, si son type
/// n'est pas `FeatureCollection` ou s'il n'a pas de tableau `features`.
/// Les features invalides ne font pas échouer l'appel: elles sont listées
/// dans `ParseResult::errors`.
pub fn parse(payload: &str) -> Result<ParseResult, MapFeaturesError> {
    parser::collection::parse(payload)
}

impl ParsedFeature {
    /// Empreinte de la géométrie (partie de la clé naturelle)
    pub fn geometry_hash(&self) -> [u8; 32] {
        collection_hash(&self.geometry)
    }
}
