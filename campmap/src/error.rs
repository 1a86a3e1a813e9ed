//! Erreurs métier du back office carto

use mapfeatures::MapFeaturesError;
use thiserror::Error;

/// Erreurs remontées par les opérations du back office
///
/// Elles sont transportées dans `anyhow::Error`; utiliser
/// `err.downcast_ref::<CampMapError>()` pour les distinguer.
#[derive(Debug, Error)]
pub enum CampMapError {
    /// Objet introuvable
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// Objet rattaché à un autre camp
    #[error("{kind} {key} belongs to camp {owner}, not to {camp}")]
    OutOfScope {
        kind: &'static str,
        key: String,
        owner: String,
        camp: String,
    },

    /// Données saisies invalides
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Payload d'import rejeté avant toute écriture
    #[error("Import rejected: {0}")]
    Rejected(#[from] MapFeaturesError),
}

impl CampMapError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
