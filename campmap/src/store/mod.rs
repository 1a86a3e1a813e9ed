//! Persistance des layers et features
//!
//! `MapStore` est implémenté par `PgStore` (PostGIS) et par `MemoryStore`
//! (dry-run et tests).

pub mod memory;
pub mod pool;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ExternalLayer, ExternalLayerDraft, Feature, FeatureDraft, Layer, LayerDraft};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Résultat d'un upsert par clé naturelle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
    /// Aucune feature avec cette clé: nouvelle ligne
    Created,
    /// Une feature avec la même clé existait déjà
    Updated,
}

#[async_trait]
pub trait MapStore: Send + Sync {
    /// Layers du camp et layers globaux, triés par nom. `None` = tous.
    async fn list_layers(&self, camp: Option<&str>) -> Result<Vec<Layer>>;
    async fn get_layer(&self, slug: &str) -> Result<Option<Layer>>;
    async fn get_layer_by_id(&self, id: i64) -> Result<Option<Layer>>;
    async fn create_layer(&self, draft: &LayerDraft) -> Result<Layer>;
    async fn update_layer(&self, id: i64, draft: &LayerDraft) -> Result<Layer>;
    /// Supprime le layer et ses features; retourne le nombre de features supprimées
    async fn delete_layer(&self, id: i64) -> Result<u64>;

    async fn list_features(&self, layer_id: i64) -> Result<Vec<Feature>>;
    async fn get_feature(&self, uuid: &str) -> Result<Option<Feature>>;
    async fn create_feature(&self, layer_id: i64, draft: &FeatureDraft) -> Result<Feature>;
    /// Le layer d'une feature existante ne change pas
    async fn update_feature(&self, id: i64, draft: &FeatureDraft) -> Result<Feature>;
    async fn delete_feature(&self, id: i64) -> Result<()>;
    /// Insère ou met à jour par clé naturelle
    async fn upsert_feature(&self, layer_id: i64, draft: &FeatureDraft) -> Result<UpsertResult>;

    async fn list_external_layers(&self, camp: Option<&str>) -> Result<Vec<ExternalLayer>>;
    async fn get_external_layer(&self, uuid: &str) -> Result<Option<ExternalLayer>>;
    async fn create_external_layer(&self, draft: &ExternalLayerDraft) -> Result<ExternalLayer>;
    async fn update_external_layer(
        &self,
        id: i64,
        draft: &ExternalLayerDraft,
    ) -> Result<ExternalLayer>;
    async fn delete_external_layer(&self, id: i64) -> Result<()>;
}
