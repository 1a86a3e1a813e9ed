//! Périmètre camp des opérations du back office
//!
//! Un objet est visible et modifiable depuis le camp `C` s'il appartient
//! à `C` ou s'il est global (`camp: None`). Le contrôle des permissions
//! d'équipe reste du ressort de l'appelant.

use crate::error::CampMapError;
use crate::models::{ExternalLayer, Layer};

/// Camp depuis lequel les opérations sont exécutées
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampScope {
    camp: String,
}

impl CampScope {
    pub fn new(camp: impl Into<String>) -> Self {
        Self { camp: camp.into() }
    }

    pub fn camp(&self) -> &str {
        &self.camp
    }

    /// Vrai si un objet rattaché à `owner` est accessible depuis ce camp
    pub fn allows(&self, owner: Option<&str>) -> bool {
        owner.map_or(true, |owner| owner == self.camp)
    }

    pub fn check_layer(&self, layer: &Layer) -> Result<(), CampMapError> {
        self.check("layer", &layer.slug, layer.camp.as_deref())
    }

    pub fn check_external_layer(&self, layer: &ExternalLayer) -> Result<(), CampMapError> {
        self.check("external layer", &layer.uuid, layer.camp.as_deref())
    }

    /// Refuse qu'une saisie rattache un objet à un autre camp
    pub fn check_assignment(&self, kind: &'static str, key: &str, camp: Option<&str>) -> Result<(), CampMapError> {
        self.check(kind, key, camp)
    }

    fn check(&self, kind: &'static str, key: &str, owner: Option<&str>) -> Result<(), CampMapError> {
        if self.allows(owner) {
            return Ok(());
        }
        Err(CampMapError::OutOfScope {
            kind,
            key: key.to_string(),
            owner: owner.unwrap_or_default().to_string(),
            camp: self.camp.clone(),
        })
    }
}
