//! Store en mémoire (dry-run et tests)

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{MapStore, UpsertResult};
use crate::error::CampMapError;
use crate::models::{ExternalLayer, ExternalLayerDraft, Feature, FeatureDraft, Layer, LayerDraft};

#[derive(Debug, Default)]
struct State {
    layers: Vec<Layer>,
    features: Vec<Feature>,
    external_layers: Vec<ExternalLayer>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Implémentation de `MapStore` sans base de données
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nombre total de features, tous layers confondus
    pub async fn feature_count(&self) -> usize {
        self.state.lock().await.features.len()
    }
}

/// UUID déterministe dérivé du type d'objet et de son id
fn memory_uuid(kind: &str, id: i64) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.as_bytes());
    hasher.update(&id.to_le_bytes());
    let hex = hex::encode(&hasher.finalize().as_bytes()[..16]);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

fn build_layer(id: i64, uuid: String, draft: &LayerDraft) -> Layer {
    Layer {
        id,
        uuid,
        name: draft.name.clone(),
        slug: draft.resolved_slug(),
        description: draft.description.clone(),
        icon: draft.resolved_icon().to_string(),
        group: draft.group.clone(),
        camp: draft.camp.clone(),
    }
}

fn build_feature(id: i64, uuid: String, layer_id: i64, draft: &FeatureDraft) -> Feature {
    Feature {
        id,
        uuid,
        layer_id,
        name: draft.name.clone(),
        description: draft.description.clone(),
        url: draft.url.clone(),
        topic: draft.topic.clone(),
        processing: draft.processing,
        icon: draft.resolved_icon().to_string(),
        color: draft.color.clone(),
        geometry: draft.geometry.clone(),
    }
}

fn build_external_layer(id: i64, uuid: String, draft: &ExternalLayerDraft) -> ExternalLayer {
    ExternalLayer {
        id,
        uuid,
        name: draft.name.clone(),
        description: draft.description.clone(),
        camp: draft.camp.clone(),
        url: draft.url.clone(),
    }
}

fn in_camp(owner: &Option<String>, camp: Option<&str>) -> bool {
    match camp {
        None => true,
        Some(camp) => owner.as_deref().map_or(true, |o| o == camp),
    }
}

#[async_trait]
impl MapStore for MemoryStore {
    async fn list_layers(&self, camp: Option<&str>) -> Result<Vec<Layer>> {
        let state = self.state.lock().await;
        let mut layers: Vec<Layer> = state
            .layers
            .iter()
            .filter(|l| in_camp(&l.camp, camp))
            .cloned()
            .collect();
        layers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(layers)
    }

    async fn get_layer(&self, slug: &str) -> Result<Option<Layer>> {
        let state = self.state.lock().await;
        Ok(state.layers.iter().find(|l| l.slug == slug).cloned())
    }

    async fn get_layer_by_id(&self, id: i64) -> Result<Option<Layer>> {
        let state = self.state.lock().await;
        Ok(state.layers.iter().find(|l| l.id == id).cloned())
    }

    async fn create_layer(&self, draft: &LayerDraft) -> Result<Layer> {
        let mut state = self.state.lock().await;
        let slug = draft.resolved_slug();
        if state.layers.iter().any(|l| l.slug == slug) {
            return Err(CampMapError::validation(format!("layer slug '{}' already exists", slug)).into());
        }
        let id = state.next_id();
        let layer = build_layer(id, memory_uuid("layer", id), draft);
        state.layers.push(layer.clone());
        Ok(layer)
    }

    async fn update_layer(&self, id: i64, draft: &LayerDraft) -> Result<Layer> {
        let mut state = self.state.lock().await;
        let slug = draft.resolved_slug();
        if state.layers.iter().any(|l| l.slug == slug && l.id != id) {
            return Err(CampMapError::validation(format!("layer slug '{}' already exists", slug)).into());
        }
        let layer = state
            .layers
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| CampMapError::not_found("layer", id.to_string()))?;
        *layer = build_layer(id, layer.uuid.clone(), draft);
        Ok(layer.clone())
    }

    async fn delete_layer(&self, id: i64) -> Result<u64> {
        let mut state = self.state.lock().await;
        let before = state.features.len();
        state.features.retain(|f| f.layer_id != id);
        let removed = (before - state.features.len()) as u64;
        state.layers.retain(|l| l.id != id);
        Ok(removed)
    }

    async fn list_features(&self, layer_id: i64) -> Result<Vec<Feature>> {
        let state = self.state.lock().await;
        Ok(state
            .features
            .iter()
            .filter(|f| f.layer_id == layer_id)
            .cloned()
            .collect())
    }

    async fn get_feature(&self, uuid: &str) -> Result<Option<Feature>> {
        let state = self.state.lock().await;
        Ok(state.features.iter().find(|f| f.uuid == uuid).cloned())
    }

    async fn create_feature(&self, layer_id: i64, draft: &FeatureDraft) -> Result<Feature> {
        let mut state = self.state.lock().await;
        if !state.layers.iter().any(|l| l.id == layer_id) {
            return Err(CampMapError::not_found("layer", layer_id.to_string()).into());
        }
        let id = state.next_id();
        let feature = build_feature(id, memory_uuid("feature", id), layer_id, draft);
        state.features.push(feature.clone());
        Ok(feature)
    }

    async fn update_feature(&self, id: i64, draft: &FeatureDraft) -> Result<Feature> {
        let mut state = self.state.lock().await;
        let feature = state
            .features
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| CampMapError::not_found("feature", id.to_string()))?;
        *feature = build_feature(id, feature.uuid.clone(), feature.layer_id, draft);
        Ok(feature.clone())
    }

    async fn delete_feature(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.features.retain(|f| f.id != id);
        Ok(())
    }

    async fn upsert_feature(&self, layer_id: i64, draft: &FeatureDraft) -> Result<UpsertResult> {
        let mut state = self.state.lock().await;
        if !state.layers.iter().any(|l| l.id == layer_id) {
            return Err(CampMapError::not_found("layer", layer_id.to_string()).into());
        }

        let key = draft.natural_key(layer_id);
        if let Some(existing) = state
            .features
            .iter_mut()
            .find(|f| f.natural_key() == key)
        {
            *existing = build_feature(existing.id, existing.uuid.clone(), layer_id, draft);
            return Ok(UpsertResult::Updated);
        }

        let id = state.next_id();
        let feature = build_feature(id, memory_uuid("feature", id), layer_id, draft);
        state.features.push(feature);
        Ok(UpsertResult::Created)
    }

    async fn list_external_layers(&self, camp: Option<&str>) -> Result<Vec<ExternalLayer>> {
        let state = self.state.lock().await;
        let mut layers: Vec<ExternalLayer> = state
            .external_layers
            .iter()
            .filter(|l| in_camp(&l.camp, camp))
            .cloned()
            .collect();
        layers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(layers)
    }

    async fn get_external_layer(&self, uuid: &str) -> Result<Option<ExternalLayer>> {
        let state = self.state.lock().await;
        Ok(state.external_layers.iter().find(|l| l.uuid == uuid).cloned())
    }

    async fn create_external_layer(&self, draft: &ExternalLayerDraft) -> Result<ExternalLayer> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let layer = build_external_layer(id, memory_uuid("external_layer", id), draft);
        state.external_layers.push(layer.clone());
        Ok(layer)
    }

    async fn update_external_layer(
        &self,
        id: i64,
        draft: &ExternalLayerDraft,
    ) -> Result<ExternalLayer> {
        let mut state = self.state.lock().await;
        let layer = state
            .external_layers
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| CampMapError::not_found("external layer", id.to_string()))?;
        *layer = build_external_layer(id, layer.uuid.clone(), draft);
        Ok(layer.clone())
    }

    async fn delete_external_layer(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.external_layers.retain(|l| l.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_uuid_format() {
        let uuid = memory_uuid("feature", 42);
        assert_eq!(uuid.len(), 36);
        assert_eq!(uuid.matches('-').count(), 4);
        assert_ne!(uuid, memory_uuid("layer", 42));
        assert_eq!(uuid, memory_uuid("feature", 42));
    }

    #[tokio::test]
    async fn test_upsert_by_natural_key() {
        let store = MemoryStore::new();
        let layer = store.create_layer(&LayerDraft::new("Power")).await.unwrap();

        let draft = FeatureDraft::new("Generator");
        assert_eq!(
            store.upsert_feature(layer.id, &draft).await.unwrap(),
            UpsertResult::Created
        );
        assert_eq!(
            store.upsert_feature(layer.id, &draft).await.unwrap(),
            UpsertResult::Updated
        );

        let mut renamed = draft.clone();
        renamed.description = "Diesel".to_string();
        assert_eq!(
            store.upsert_feature(layer.id, &renamed).await.unwrap(),
            UpsertResult::Created
        );
        assert_eq!(store.feature_count().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let store = MemoryStore::new();
        store.create_layer(&LayerDraft::new("Power")).await.unwrap();
        assert!(store.create_layer(&LayerDraft::new("power")).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_layer_cascades() {
        let store = MemoryStore::new();
        let power = store.create_layer(&LayerDraft::new("Power")).await.unwrap();
        let toilets = store.create_layer(&LayerDraft::new("Toilets")).await.unwrap();
        store
            .create_feature(power.id, &FeatureDraft::new("Generator"))
            .await
            .unwrap();
        store
            .create_feature(power.id, &FeatureDraft::new("Cable"))
            .await
            .unwrap();
        store
            .create_feature(toilets.id, &FeatureDraft::new("North"))
            .await
            .unwrap();

        assert_eq!(store.delete_layer(power.id).await.unwrap(), 2);
        assert_eq!(store.feature_count().await, 1);
        assert!(store.get_layer("power").await.unwrap().is_none());
    }
}
