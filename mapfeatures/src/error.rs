//! Types d'erreurs pour le crate mapfeatures

use thiserror::Error;

/// Erreurs pouvant survenir lors du parsing d'un payload GeoJSON
#[derive(Debug, Error)]
pub enum MapFeaturesError {
    /// Le payload n'est pas du JSON valide
    #[error("Invalid GeoJSON data: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Le type de premier niveau n'est pas `FeatureCollection`
    #[error("Invalid GeoJSON format: expected FeatureCollection, got {0}")]
    NotAFeatureCollection(String),

    /// Membre `features` absent ou qui n'est pas un tableau
    #[error("Invalid GeoJSON format: missing features array")]
    MissingFeatures,

    /// Élément de `features` qui n'est pas une Feature
    #[error("Invalid feature #{index}: {reason}")]
    InvalidFeature { index: usize, reason: String },

    /// Géométrie invalide
    #[error("Invalid geometry for feature #{index}: {reason}")]
    InvalidGeometry { index: usize, reason: String },

    /// Propriété obligatoire absente
    #[error("Feature #{index} is missing property '{property}'")]
    MissingProperty { index: usize, property: &'static str },

    /// Propriété présente mais inutilisable
    #[error("Feature #{index} has an invalid '{property}': {reason}")]
    InvalidProperty {
        index: usize,
        property: &'static str,
        reason: String,
    },
}

impl MapFeaturesError {
    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            index,
            reason: reason.into(),
        }
    }

    /// Crée une erreur de feature invalide
    pub fn invalid_feature(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidFeature {
            index,
            reason: reason.into(),
        }
    }

    /// Vrai si l'erreur rejette tout le payload (et pas une seule feature)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidJson(_) | Self::NotAFeatureCollection(_) | Self::MissingFeatures
        )
    }

    /// Index de la feature concernée, pour les erreurs non fatales
    pub fn feature_index(&self) -> Option<usize> {
        match self {
            Self::InvalidFeature { index, .. }
            | Self::InvalidGeometry { index, .. }
            | Self::MissingProperty { index, .. }
            | Self::InvalidProperty { index, .. } => Some(*index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(MapFeaturesError::MissingFeatures.is_fatal());
        assert!(MapFeaturesError::NotAFeatureCollection("Feature".into()).is_fatal());
        assert!(!MapFeaturesError::invalid_geometry(3, "bad ring").is_fatal());
    }

    #[test]
    fn test_feature_index() {
        let err = MapFeaturesError::MissingProperty {
            index: 7,
            property: "name",
        };
        assert_eq!(err.feature_index(), Some(7));
        assert_eq!(MapFeaturesError::MissingFeatures.feature_index(), None);
    }
}
