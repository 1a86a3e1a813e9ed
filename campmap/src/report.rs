//! Rapport d'import d'une FeatureCollection
//!
//! Collecte les compteurs created/updated/errors d'un import et produit
//! les messages flash affichés à l'opérateur.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

/// Statut global de l'import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportStatus {
    /// Toutes les features ont été importées
    Success,
    /// Des features importées, d'autres rejetées
    PartialSuccess,
    /// Aucune feature importée
    Failed,
}

/// Feature rejetée pendant l'import
#[derive(Debug, Clone, Serialize)]
pub struct ImportError {
    /// Position dans le tableau `features`
    pub index: Option<usize>,
    pub message: String,
}

/// Niveau d'un message flash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageLevel {
    Success,
    Error,
}

/// Message destiné à l'opérateur après un import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashMessage {
    pub level: MessageLevel,
    pub text: String,
}

/// Rapport complet d'import
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    /// Slug du layer cible
    pub layer: String,
    pub duration_secs: f64,
    pub status: ImportStatus,
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<ImportError>,
}

impl ImportReport {
    pub fn new(layer: &str) -> Self {
        Self {
            layer: layer.to_string(),
            duration_secs: 0.0,
            status: ImportStatus::Success,
            created: 0,
            updated: 0,
            errors: Vec::new(),
        }
    }

    pub fn record_created(&mut self) {
        self.created += 1;
    }

    pub fn record_updated(&mut self) {
        self.updated += 1;
    }

    /// Enregistre une feature rejetée
    pub fn record_error(&mut self, index: Option<usize>, message: impl Into<String>) {
        self.errors.push(ImportError {
            index,
            message: message.into(),
        });
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final à partir des compteurs
    pub fn finalize(&mut self) {
        let imported = self.imported();
        self.status = match (imported, self.errors.len()) {
            (_, 0) => ImportStatus::Success,
            (0, _) => ImportStatus::Failed,
            _ => ImportStatus::PartialSuccess,
        };
    }

    /// Features créées ou mises à jour
    pub fn imported(&self) -> usize {
        self.created + self.updated
    }

    /// Nombre de features examinées (importées + rejetées)
    pub fn total(&self) -> usize {
        self.imported() + self.errors.len()
    }

    /// Messages flash: succès si au moins une feature importée, erreur si
    /// au moins une feature rejetée. Aucun message pour une collection vide.
    pub fn messages(&self) -> Vec<FlashMessage> {
        let mut messages = Vec::new();
        if self.imported() > 0 {
            messages.push(FlashMessage {
                level: MessageLevel::Success,
                text: format!(
                    "{} features created, {} features updated",
                    self.created, self.updated
                ),
            });
        }
        if !self.errors.is_empty() {
            messages.push(FlashMessage {
                level: MessageLevel::Error,
                text: format!("{} features with errors not imported", self.errors.len()),
            });
        }
        messages
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("IMPORT REPORT - Layer {}", self.layer);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Features: {} created, {} updated, {} errors",
            self.created,
            self.updated,
            self.errors.len()
        );

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in self.errors.iter().take(20) {
                match e.index {
                    Some(index) => println!("  [#{}] {}", index, e.message),
                    None => println!("  {}", e.message),
                }
            }
            if self.errors.len() > 20 {
                println!("  ... and {} more", self.errors.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Résumé sur une ligne
    pub fn summary(&self) -> String {
        format!(
            "{}: {} created, {} updated, {} errors",
            self.layer,
            self.created,
            self.updated,
            self.errors.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report() {
        let report = ImportReport::new("power");
        assert_eq!(report.status, ImportStatus::Success);
        assert_eq!(report.total(), 0);
        assert!(report.messages().is_empty());
    }

    #[test]
    fn test_finalize_success() {
        let mut report = ImportReport::new("power");
        report.record_created();
        report.record_updated();
        report.finalize();
        assert_eq!(report.status, ImportStatus::Success);
    }

    #[test]
    fn test_finalize_partial_success() {
        let mut report = ImportReport::new("power");
        report.record_created();
        report.record_error(Some(3), "Invalid geometry");
        report.finalize();
        assert_eq!(report.status, ImportStatus::PartialSuccess);
    }

    #[test]
    fn test_finalize_failed() {
        let mut report = ImportReport::new("power");
        report.record_error(Some(0), "missing name");
        report.finalize();
        assert_eq!(report.status, ImportStatus::Failed);
    }

    #[test]
    fn test_messages() {
        let mut report = ImportReport::new("power");
        report.record_created();
        report.record_created();
        report.record_updated();
        report.record_error(Some(4), "bad");

        assert_eq!(
            report.messages(),
            vec![
                FlashMessage {
                    level: MessageLevel::Success,
                    text: "2 features created, 1 features updated".to_string(),
                },
                FlashMessage {
                    level: MessageLevel::Error,
                    text: "1 features with errors not imported".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_only_errors_gives_single_message() {
        let mut report = ImportReport::new("power");
        report.record_error(None, "bad");
        let messages = report.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, MessageLevel::Error);
    }

    #[test]
    fn test_summary() {
        let mut report = ImportReport::new("power");
        report.record_created();
        report.record_error(Some(1), "bad");
        assert_eq!(report.summary(), "power: 1 created, 0 updated, 1 errors");
    }
}
