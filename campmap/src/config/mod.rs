//! Configuration du back office carto

use serde::{Deserialize, Serialize};
use std::path::Path;

use anyhow::{Context, Result};

/// Configuration principale
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Schéma PostgreSQL des tables carto
    #[serde(default = "default_schema")]
    pub schema: String,

    /// SRID des géométries stockées
    #[serde(default = "default_srid")]
    pub srid: u32,

    /// Camp depuis lequel les commandes sont exécutées (aucun = global)
    #[serde(default)]
    pub camp: Option<String>,
}

fn default_schema() -> String {
    "maps".to_string()
}

fn default_srid() -> u32 {
    4326
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            srid: default_srid(),
            camp: None,
        }
    }
}

impl Config {
    /// Charge une configuration depuis un fichier JSON
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Valeurs par défaut surchargées par `CAMPMAP_SCHEMA`, `CAMPMAP_SRID`, `CAMPMAP_CAMP`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            schema: std::env::var("CAMPMAP_SCHEMA").unwrap_or(defaults.schema),
            srid: std::env::var("CAMPMAP_SRID")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.srid),
            camp: std::env::var("CAMPMAP_CAMP").ok().filter(|c| !c.is_empty()),
        }
    }

    /// Fichier si fourni, sinon environnement
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::from_env();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        // Le schéma est interpolé dans le SQL
        let valid = !self.schema.is_empty()
            && self
                .schema
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !self.schema.starts_with(|c: char| c.is_ascii_digit());
        if !valid {
            anyhow::bail!("Invalid schema name: {:?}", self.schema);
        }
        if self.srid == 0 {
            anyhow::bail!("Invalid SRID: 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.schema, "maps");
        assert_eq!(config.srid, 4326);
        assert!(config.camp.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config: Config = serde_json::from_str(r#"{"camp": "bornhack-2025"}"#).unwrap();
        assert_eq!(config.schema, "maps");
        assert_eq!(config.camp.as_deref(), Some("bornhack-2025"));
    }

    #[test]
    fn test_invalid_schema() {
        let config = Config {
            schema: "maps; DROP TABLE x".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            schema: "1maps".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join("campmap_config_test.json");
        std::fs::write(&path, r#"{"schema": "camp_maps", "srid": 3857}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.schema, "camp_maps");
        assert_eq!(config.srid, 3857);
        std::fs::remove_file(path).ok();
    }
}
