//! Opérations du back office carto
//!
//! `Backoffice` applique la validation des saisies et le périmètre camp
//! avant de déléguer au `MapStore`.

use anyhow::Result;
use tracing::info;

use crate::access::CampScope;
use crate::error::CampMapError;
use crate::export::geojson::layer_to_geojson;
use crate::import::import_feature_collection;
use crate::models::{ExternalLayer, ExternalLayerDraft, Feature, FeatureDraft, Layer, LayerDraft};
use crate::report::ImportReport;
use crate::store::MapStore;

pub struct Backoffice<S> {
    store: S,
    scope: Option<CampScope>,
}

impl<S: MapStore> Backoffice<S> {
    /// Back office restreint au camp `scope`
    pub fn new(store: S, scope: CampScope) -> Self {
        Self {
            store,
            scope: Some(scope),
        }
    }

    /// Back office sans restriction de camp (administration globale)
    pub fn unscoped(store: S) -> Self {
        Self { store, scope: None }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn camp(&self) -> Option<&str> {
        self.scope.as_ref().map(CampScope::camp)
    }

    fn check_layer(&self, layer: &Layer) -> Result<(), CampMapError> {
        match self.scope {
            Some(ref scope) => scope.check_layer(layer),
            None => Ok(()),
        }
    }

    fn check_assignment(&self, kind: &'static str, key: &str, camp: Option<&str>) -> Result<(), CampMapError> {
        match self.scope {
            Some(ref scope) => scope.check_assignment(kind, key, camp),
            None => Ok(()),
        }
    }

    // --- Layers ---

    pub async fn list_layers(&self) -> Result<Vec<Layer>> {
        self.store.list_layers(self.camp()).await
    }

    pub async fn get_layer(&self, slug: &str) -> Result<Layer> {
        let layer = self
            .store
            .get_layer(slug)
            .await?
            .ok_or_else(|| CampMapError::not_found("layer", slug))?;
        self.check_layer(&layer)?;
        Ok(layer)
    }

    pub async fn create_layer(&self, draft: &LayerDraft) -> Result<Layer> {
        draft.validate()?;
        let slug = draft.resolved_slug();
        self.check_assignment("layer", &slug, draft.camp.as_deref())?;
        if self.store.get_layer(&slug).await?.is_some() {
            return Err(CampMapError::validation(format!("layer slug '{}' already exists", slug)).into());
        }

        let layer = self.store.create_layer(draft).await?;
        info!(slug = %layer.slug, camp = ?layer.camp, "Layer created");
        Ok(layer)
    }

    pub async fn update_layer(&self, slug: &str, draft: &LayerDraft) -> Result<Layer> {
        let layer = self.get_layer(slug).await?;
        draft.validate()?;
        self.check_assignment("layer", slug, draft.camp.as_deref())?;

        let new_slug = draft.resolved_slug();
        if new_slug != layer.slug {
            if let Some(other) = self.store.get_layer(&new_slug).await? {
                if other.id != layer.id {
                    return Err(CampMapError::validation(format!(
                        "layer slug '{}' already exists",
                        new_slug
                    ))
                    .into());
                }
            }
        }

        let updated = self.store.update_layer(layer.id, draft).await?;
        info!(slug = %updated.slug, "Layer updated");
        Ok(updated)
    }

    /// Supprime le layer et ses features; retourne le nombre de features supprimées
    pub async fn delete_layer(&self, slug: &str) -> Result<u64> {
        let layer = self.get_layer(slug).await?;
        let removed = self.store.delete_layer(layer.id).await?;
        info!(slug = %layer.slug, features = removed, "Layer deleted");
        Ok(removed)
    }

    // --- Features ---

    pub async fn list_features(&self, layer_slug: &str) -> Result<Vec<Feature>> {
        let layer = self.get_layer(layer_slug).await?;
        self.store.list_features(layer.id).await
    }

    pub async fn get_feature(&self, uuid: &str) -> Result<Feature> {
        let feature = self
            .store
            .get_feature(uuid)
            .await?
            .ok_or_else(|| CampMapError::not_found("feature", uuid))?;
        // Le périmètre d'une feature est celui de son layer
        let layer = self
            .store
            .get_layer_by_id(feature.layer_id)
            .await?
            .ok_or_else(|| CampMapError::not_found("layer", feature.layer_id.to_string()))?;
        self.check_layer(&layer)?;
        Ok(feature)
    }

    pub async fn create_feature(&self, layer_slug: &str, draft: &FeatureDraft) -> Result<Feature> {
        let layer = self.get_layer(layer_slug).await?;
        draft.validate()?;
        let feature = self.store.create_feature(layer.id, draft).await?;
        info!(layer = %layer.slug, uuid = %feature.uuid, "Feature created");
        Ok(feature)
    }

    pub async fn update_feature(&self, uuid: &str, draft: &FeatureDraft) -> Result<Feature> {
        let feature = self.get_feature(uuid).await?;
        draft.validate()?;
        let updated = self.store.update_feature(feature.id, draft).await?;
        info!(uuid = %updated.uuid, "Feature updated");
        Ok(updated)
    }

    pub async fn delete_feature(&self, uuid: &str) -> Result<()> {
        let feature = self.get_feature(uuid).await?;
        self.store.delete_feature(feature.id).await?;
        info!(uuid = %feature.uuid, "Feature deleted");
        Ok(())
    }

    // --- Layers externes ---

    pub async fn list_external_layers(&self) -> Result<Vec<ExternalLayer>> {
        self.store.list_external_layers(self.camp()).await
    }

    pub async fn get_external_layer(&self, uuid: &str) -> Result<ExternalLayer> {
        let layer = self
            .store
            .get_external_layer(uuid)
            .await?
            .ok_or_else(|| CampMapError::not_found("external layer", uuid))?;
        if let Some(ref scope) = self.scope {
            scope.check_external_layer(&layer)?;
        }
        Ok(layer)
    }

    pub async fn create_external_layer(&self, draft: &ExternalLayerDraft) -> Result<ExternalLayer> {
        draft.validate()?;
        self.check_assignment("external layer", &draft.name, draft.camp.as_deref())?;
        let layer = self.store.create_external_layer(draft).await?;
        info!(uuid = %layer.uuid, url = %layer.url, "External layer created");
        Ok(layer)
    }

    pub async fn update_external_layer(
        &self,
        uuid: &str,
        draft: &ExternalLayerDraft,
    ) -> Result<ExternalLayer> {
        let layer = self.get_external_layer(uuid).await?;
        draft.validate()?;
        self.check_assignment("external layer", uuid, draft.camp.as_deref())?;
        self.store.update_external_layer(layer.id, draft).await
    }

    pub async fn delete_external_layer(&self, uuid: &str) -> Result<()> {
        let layer = self.get_external_layer(uuid).await?;
        self.store.delete_external_layer(layer.id).await?;
        info!(uuid = %layer.uuid, "External layer deleted");
        Ok(())
    }

    // --- Import / export ---

    /// Importe une FeatureCollection GeoJSON dans le layer `layer_slug`
    pub async fn import_geojson(&self, layer_slug: &str, payload: &str) -> Result<ImportReport> {
        let layer = self.get_layer(layer_slug).await?;
        import_feature_collection(&self.store, &layer, payload).await
    }

    /// Exporte le layer `layer_slug` en FeatureCollection GeoJSON
    pub async fn export_layer(&self, layer_slug: &str) -> Result<String> {
        let layer = self.get_layer(layer_slug).await?;
        let features = self.store.list_features(layer.id).await?;
        layer_to_geojson(&layer, &features)
    }
}
