//! Store PostgreSQL/PostGIS

use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use geo::{Geometry, GeometryCollection};
use mapfeatures::hash::hash_to_hex;
use tokio_postgres::Row;
use tracing::{debug, info, warn};
use wkb::geom_to_wkb;

use super::{MapStore, UpsertResult};
use crate::error::CampMapError;
use crate::models::{ExternalLayer, ExternalLayerDraft, Feature, FeatureDraft, Layer, LayerDraft};

const LAYER_COLUMNS: &str = "id, uuid::text AS uuid, name, slug, description, icon, layer_group, camp";

const FEATURE_COLUMNS: &str = "id, uuid::text AS uuid, layer_id, name, description, url, topic, \
     processing, icon, color, ST_AsGeoJSON(geom) AS geom_json";

const EXTERNAL_LAYER_COLUMNS: &str = "id, uuid::text AS uuid, name, description, camp, url";

/// Store adossé à un schéma PostGIS
pub struct PgStore {
    pool: Pool,
    schema: String,
    srid: u32,
}

impl PgStore {
    pub fn new(pool: Pool, schema: impl Into<String>, srid: u32) -> Self {
        Self {
            pool,
            schema: schema.into(),
            srid,
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Crée le schéma et les tables `layers`, `features`, `external_layers`
    pub async fn init_schema(&self, drop_existing: bool) -> Result<()> {
        let client = self.pool.get().await?;
        let schema = &self.schema;

        if drop_existing {
            client
                .execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema), &[])
                .await
                .context("Failed to drop schema")?;
        }

        client
            .execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema), &[])
            .await
            .context("Failed to create schema")?;

        // Peut nécessiter des droits superuser: on accepte une extension déjà installée
        if let Err(e) = client
            .execute("CREATE EXTENSION IF NOT EXISTS postgis", &[])
            .await
        {
            warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
            let exists = client
                .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
                .await
                .context("Failed to check pg_extension")?
                .is_some();
            if !exists {
                anyhow::bail!("PostGIS extension is not installed and could not be created: {e}");
            }
        }

        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.layers (
                id BIGSERIAL PRIMARY KEY,
                uuid UUID NOT NULL UNIQUE DEFAULT gen_random_uuid(),
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                icon TEXT NOT NULL,
                layer_group TEXT NOT NULL DEFAULT '',
                camp TEXT,
                created_at TIMESTAMPTZ DEFAULT NOW(),
                updated_at TIMESTAMPTZ DEFAULT NOW()
            );

            CREATE TABLE IF NOT EXISTS {schema}.features (
                id BIGSERIAL PRIMARY KEY,
                uuid UUID NOT NULL UNIQUE DEFAULT gen_random_uuid(),
                layer_id BIGINT NOT NULL REFERENCES {schema}.layers(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                url TEXT,
                topic TEXT NOT NULL DEFAULT '',
                processing BOOLEAN NOT NULL DEFAULT FALSE,
                icon TEXT NOT NULL,
                color TEXT NOT NULL,
                geom geometry(GeometryCollection, {srid}) NOT NULL,
                geom_hash BYTEA NOT NULL,
                created_at TIMESTAMPTZ DEFAULT NOW(),
                updated_at TIMESTAMPTZ DEFAULT NOW()
            );

            CREATE INDEX IF NOT EXISTS idx_{schema}_features_natural_key
                ON {schema}.features (layer_id, name, geom_hash);
            CREATE INDEX IF NOT EXISTS idx_{schema}_features_geom
                ON {schema}.features USING GIST (geom);

            CREATE TABLE IF NOT EXISTS {schema}.external_layers (
                id BIGSERIAL PRIMARY KEY,
                uuid UUID NOT NULL UNIQUE DEFAULT gen_random_uuid(),
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                camp TEXT,
                url TEXT NOT NULL,
                created_at TIMESTAMPTZ DEFAULT NOW(),
                updated_at TIMESTAMPTZ DEFAULT NOW()
            );
            "#,
            schema = schema,
            srid = self.srid
        );

        client
            .batch_execute(&sql)
            .await
            .with_context(|| format!("Failed to create tables in schema {}", schema))?;

        info!(schema = %schema, srid = self.srid, "Map schema ready");
        Ok(())
    }

    fn layer_from_row(row: &Row) -> Result<Layer> {
        Ok(Layer {
            id: row.try_get("id")?,
            uuid: row.try_get("uuid")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            icon: row.try_get("icon")?,
            group: row.try_get("layer_group")?,
            camp: row.try_get("camp")?,
        })
    }

    fn feature_from_row(row: &Row) -> Result<Feature> {
        let geom_json: String = row.try_get("geom_json")?;
        Ok(Feature {
            id: row.try_get("id")?,
            uuid: row.try_get("uuid")?,
            layer_id: row.try_get("layer_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            url: row.try_get("url")?,
            topic: row.try_get("topic")?,
            processing: row.try_get("processing")?,
            icon: row.try_get("icon")?,
            color: row.try_get("color")?,
            geometry: collection_from_geojson(&geom_json)?,
        })
    }

    fn external_layer_from_row(row: &Row) -> Result<ExternalLayer> {
        Ok(ExternalLayer {
            id: row.try_get("id")?,
            uuid: row.try_get("uuid")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            camp: row.try_get("camp")?,
            url: row.try_get("url")?,
        })
    }
}

#[async_trait]
impl MapStore for PgStore {
    async fn list_layers(&self, camp: Option<&str>) -> Result<Vec<Layer>> {
        let client = self.pool.get().await?;
        let rows = match camp {
            Some(camp) => {
                client
                    .query(
                        &format!(
                            "SELECT {} FROM {}.layers WHERE camp = $1 OR camp IS NULL ORDER BY name",
                            LAYER_COLUMNS, self.schema
                        ),
                        &[&camp],
                    )
                    .await
            }
            None => {
                client
                    .query(
                        &format!("SELECT {} FROM {}.layers ORDER BY name", LAYER_COLUMNS, self.schema),
                        &[],
                    )
                    .await
            }
        }
        .context("Failed to list layers")?;

        rows.iter().map(Self::layer_from_row).collect()
    }

    async fn get_layer(&self, slug: &str) -> Result<Option<Layer>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM {}.layers WHERE slug = $1", LAYER_COLUMNS, self.schema),
                &[&slug],
            )
            .await
            .context("Failed to fetch layer")?;
        row.as_ref().map(Self::layer_from_row).transpose()
    }

    async fn get_layer_by_id(&self, id: i64) -> Result<Option<Layer>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM {}.layers WHERE id = $1", LAYER_COLUMNS, self.schema),
                &[&id],
            )
            .await
            .context("Failed to fetch layer")?;
        row.as_ref().map(Self::layer_from_row).transpose()
    }

    async fn create_layer(&self, draft: &LayerDraft) -> Result<Layer> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO {}.layers (name, slug, description, icon, layer_group, camp)
                     VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
                    self.schema, LAYER_COLUMNS
                ),
                &[
                    &draft.name,
                    &draft.resolved_slug(),
                    &draft.description,
                    &draft.resolved_icon(),
                    &draft.group,
                    &draft.camp,
                ],
            )
            .await
            .context("Failed to insert layer")?;
        Self::layer_from_row(&row)
    }

    async fn update_layer(&self, id: i64, draft: &LayerDraft) -> Result<Layer> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE {}.layers
                     SET name = $2, slug = $3, description = $4, icon = $5, layer_group = $6,
                         camp = $7, updated_at = NOW()
                     WHERE id = $1 RETURNING {}",
                    self.schema, LAYER_COLUMNS
                ),
                &[
                    &id,
                    &draft.name,
                    &draft.resolved_slug(),
                    &draft.description,
                    &draft.resolved_icon(),
                    &draft.group,
                    &draft.camp,
                ],
            )
            .await
            .context("Failed to update layer")?
            .ok_or_else(|| CampMapError::not_found("layer", id.to_string()))?;
        Self::layer_from_row(&row)
    }

    async fn delete_layer(&self, id: i64) -> Result<u64> {
        let mut client = self.pool.get().await?;
        let tx = client
            .transaction()
            .await
            .context("Failed to begin transaction")?;

        let removed = tx
            .execute(
                &format!("DELETE FROM {}.features WHERE layer_id = $1", self.schema),
                &[&id],
            )
            .await
            .context("Failed to delete layer features")?;
        tx.execute(&format!("DELETE FROM {}.layers WHERE id = $1", self.schema), &[&id])
            .await
            .context("Failed to delete layer")?;

        tx.commit().await.context("Failed to commit layer deletion")?;
        Ok(removed)
    }

    async fn list_features(&self, layer_id: i64) -> Result<Vec<Feature>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM {}.features WHERE layer_id = $1 ORDER BY name, id",
                    FEATURE_COLUMNS, self.schema
                ),
                &[&layer_id],
            )
            .await
            .context("Failed to list features")?;
        rows.iter().map(Self::feature_from_row).collect()
    }

    async fn get_feature(&self, uuid: &str) -> Result<Option<Feature>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {} FROM {}.features WHERE uuid::text = $1",
                    FEATURE_COLUMNS, self.schema
                ),
                &[&uuid],
            )
            .await
            .context("Failed to fetch feature")?;
        row.as_ref().map(Self::feature_from_row).transpose()
    }

    async fn create_feature(&self, layer_id: i64, draft: &FeatureDraft) -> Result<Feature> {
        let ewkb = collection_to_ewkb(&draft.geometry, self.srid)?;
        let hash = mapfeatures::collection_hash(&draft.geometry);

        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO {}.features
                        (layer_id, name, description, url, topic, processing, icon, color, geom, geom_hash)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, ST_GeomFromEWKB($9::bytea), $10)
                     RETURNING {}",
                    self.schema, FEATURE_COLUMNS
                ),
                &[
                    &layer_id,
                    &draft.name,
                    &draft.description,
                    &draft.url,
                    &draft.topic,
                    &draft.processing,
                    &draft.resolved_icon(),
                    &draft.color,
                    &ewkb,
                    &hash.as_slice(),
                ],
            )
            .await
            .context("Failed to insert feature")?;
        Self::feature_from_row(&row)
    }

    async fn update_feature(&self, id: i64, draft: &FeatureDraft) -> Result<Feature> {
        let ewkb = collection_to_ewkb(&draft.geometry, self.srid)?;
        let hash = mapfeatures::collection_hash(&draft.geometry);

        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE {}.features
                     SET name = $2, description = $3, url = $4, topic = $5, processing = $6,
                         icon = $7, color = $8, geom = ST_GeomFromEWKB($9::bytea), geom_hash = $10,
                         updated_at = NOW()
                     WHERE id = $1 RETURNING {}",
                    self.schema, FEATURE_COLUMNS
                ),
                &[
                    &id,
                    &draft.name,
                    &draft.description,
                    &draft.url,
                    &draft.topic,
                    &draft.processing,
                    &draft.resolved_icon(),
                    &draft.color,
                    &ewkb,
                    &hash.as_slice(),
                ],
            )
            .await
            .context("Failed to update feature")?
            .ok_or_else(|| CampMapError::not_found("feature", id.to_string()))?;
        Self::feature_from_row(&row)
    }

    async fn delete_feature(&self, id: i64) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(&format!("DELETE FROM {}.features WHERE id = $1", self.schema), &[&id])
            .await
            .context("Failed to delete feature")?;
        Ok(())
    }

    async fn upsert_feature(&self, layer_id: i64, draft: &FeatureDraft) -> Result<UpsertResult> {
        let ewkb = collection_to_ewkb(&draft.geometry, self.srid)?;
        let hash = mapfeatures::collection_hash(&draft.geometry);

        let mut client = self.pool.get().await?;
        let tx = client
            .transaction()
            .await
            .context("Failed to begin transaction")?;

        let existing = tx
            .query_opt(
                &format!(
                    "SELECT id FROM {}.features
                     WHERE layer_id = $1 AND name = $2 AND description = $3 AND topic = $4
                       AND processing = $5 AND color = $6 AND geom_hash = $7
                     ORDER BY id LIMIT 1 FOR UPDATE",
                    self.schema
                ),
                &[
                    &layer_id,
                    &draft.name,
                    &draft.description,
                    &draft.topic,
                    &draft.processing,
                    &draft.color,
                    &hash.as_slice(),
                ],
            )
            .await
            .context("Failed to look up feature by natural key")?;

        let result = match existing {
            Some(row) => {
                let id: i64 = row.try_get("id")?;
                tx.execute(
                    &format!(
                        "UPDATE {}.features
                         SET url = $2, icon = $3, geom = ST_GeomFromEWKB($4::bytea), updated_at = NOW()
                         WHERE id = $1",
                        self.schema
                    ),
                    &[&id, &draft.url, &draft.resolved_icon(), &ewkb],
                )
                .await
                .context("Failed to update feature")?;
                debug!(id, name = %draft.name, hash = %hash_to_hex(&hash), "Feature updated");
                UpsertResult::Updated
            }
            None => {
                tx.execute(
                    &format!(
                        "INSERT INTO {}.features
                            (layer_id, name, description, url, topic, processing, icon, color, geom, geom_hash)
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, ST_GeomFromEWKB($9::bytea), $10)",
                        self.schema
                    ),
                    &[
                        &layer_id,
                        &draft.name,
                        &draft.description,
                        &draft.url,
                        &draft.topic,
                        &draft.processing,
                        &draft.resolved_icon(),
                        &draft.color,
                        &ewkb,
                        &hash.as_slice(),
                    ],
                )
                .await
                .context("Failed to insert feature")?;
                debug!(layer_id, name = %draft.name, hash = %hash_to_hex(&hash), "Feature created");
                UpsertResult::Created
            }
        };

        tx.commit().await.context("Failed to commit feature upsert")?;
        Ok(result)
    }

    async fn list_external_layers(&self, camp: Option<&str>) -> Result<Vec<ExternalLayer>> {
        let client = self.pool.get().await?;
        let rows = match camp {
            Some(camp) => {
                client
                    .query(
                        &format!(
                            "SELECT {} FROM {}.external_layers WHERE camp = $1 OR camp IS NULL ORDER BY name",
                            EXTERNAL_LAYER_COLUMNS, self.schema
                        ),
                        &[&camp],
                    )
                    .await
            }
            None => {
                client
                    .query(
                        &format!(
                            "SELECT {} FROM {}.external_layers ORDER BY name",
                            EXTERNAL_LAYER_COLUMNS, self.schema
                        ),
                        &[],
                    )
                    .await
            }
        }
        .context("Failed to list external layers")?;

        rows.iter().map(Self::external_layer_from_row).collect()
    }

    async fn get_external_layer(&self, uuid: &str) -> Result<Option<ExternalLayer>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {} FROM {}.external_layers WHERE uuid::text = $1",
                    EXTERNAL_LAYER_COLUMNS, self.schema
                ),
                &[&uuid],
            )
            .await
            .context("Failed to fetch external layer")?;
        row.as_ref().map(Self::external_layer_from_row).transpose()
    }

    async fn create_external_layer(&self, draft: &ExternalLayerDraft) -> Result<ExternalLayer> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO {}.external_layers (name, description, camp, url)
                     VALUES ($1, $2, $3, $4) RETURNING {}",
                    self.schema, EXTERNAL_LAYER_COLUMNS
                ),
                &[&draft.name, &draft.description, &draft.camp, &draft.url],
            )
            .await
            .context("Failed to insert external layer")?;
        Self::external_layer_from_row(&row)
    }

    async fn update_external_layer(
        &self,
        id: i64,
        draft: &ExternalLayerDraft,
    ) -> Result<ExternalLayer> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE {}.external_layers
                     SET name = $2, description = $3, camp = $4, url = $5, updated_at = NOW()
                     WHERE id = $1 RETURNING {}",
                    self.schema, EXTERNAL_LAYER_COLUMNS
                ),
                &[&id, &draft.name, &draft.description, &draft.camp, &draft.url],
            )
            .await
            .context("Failed to update external layer")?
            .ok_or_else(|| CampMapError::not_found("external layer", id.to_string()))?;
        Self::external_layer_from_row(&row)
    }

    async fn delete_external_layer(&self, id: i64) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                &format!("DELETE FROM {}.external_layers WHERE id = $1", self.schema),
                &[&id],
            )
            .await
            .context("Failed to delete external layer")?;
        Ok(())
    }
}

/// Relit une géométrie renvoyée par `ST_AsGeoJSON`
fn collection_from_geojson(raw: &str) -> Result<GeometryCollection<f64>> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("PostGIS returned invalid GeoJSON")?;
    mapfeatures::parser::geometry::parse(0, &value)
        .map_err(|e| anyhow::anyhow!("Stored geometry cannot be read back: {}", e))
}

/// Convertit une collection en EWKB PostGIS
fn collection_to_ewkb(collection: &GeometryCollection<f64>, srid: u32) -> Result<Vec<u8>> {
    let geometry = Geometry::GeometryCollection(collection.clone());
    let wkb = geom_to_wkb(&geometry)
        .map_err(|e| anyhow::anyhow!("Failed to convert geometry to WKB: {:?}", e))?;
    Ok(add_srid_to_wkb(&wkb, srid))
}

/// Ajoute le SRID au WKB pour créer du EWKB
fn add_srid_to_wkb(wkb: &[u8], srid: u32) -> Vec<u8> {
    if wkb.len() < 5 {
        return wkb.to_vec();
    }

    let mut ewkb = Vec::with_capacity(wkb.len() + 4);
    ewkb.push(wkb[0]);

    // Type avec flag SRID (0x20000000)
    let type_bytes = [wkb[1], wkb[2], wkb[3], wkb[4]];
    if wkb[0] == 1 {
        let geom_type = u32::from_le_bytes(type_bytes) | 0x20000000;
        ewkb.extend_from_slice(&geom_type.to_le_bytes());
        ewkb.extend_from_slice(&srid.to_le_bytes());
    } else {
        let geom_type = u32::from_be_bytes(type_bytes) | 0x20000000;
        ewkb.extend_from_slice(&geom_type.to_be_bytes());
        ewkb.extend_from_slice(&srid.to_be_bytes());
    }

    ewkb.extend_from_slice(&wkb[5..]);
    ewkb
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    #[test]
    fn test_collection_to_ewkb_sets_srid() {
        let gc = GeometryCollection(vec![Geometry::Point(Point::new(9.94, 55.38))]);
        let ewkb = collection_to_ewkb(&gc, 4326).unwrap();

        assert!(ewkb.len() > 9);
        if ewkb[0] == 1 {
            let type_word = u32::from_le_bytes([ewkb[1], ewkb[2], ewkb[3], ewkb[4]]);
            assert!(type_word & 0x20000000 != 0, "SRID flag should be set");
            assert_eq!(type_word & 0xff, 7, "GeometryCollection type code");
            let srid = u32::from_le_bytes([ewkb[5], ewkb[6], ewkb[7], ewkb[8]]);
            assert_eq!(srid, 4326);
        }
    }

    #[test]
    fn test_empty_collection_to_ewkb() {
        let gc = GeometryCollection::<f64>(vec![]);
        let ewkb = collection_to_ewkb(&gc, 4326).unwrap();
        assert!(ewkb.len() >= 9);
    }

    #[test]
    fn test_add_srid_to_short_wkb() {
        assert_eq!(add_srid_to_wkb(&[1, 2], 4326), vec![1, 2]);
    }

    #[test]
    fn test_collection_from_geojson() {
        let gc = collection_from_geojson(
            r#"{"type":"GeometryCollection","geometries":[{"type":"Point","coordinates":[1,2]}]}"#,
        )
        .unwrap();
        assert_eq!(gc.0, vec![Geometry::Point(Point::new(1.0, 2.0))]);

        let empty = collection_from_geojson(r#"{"type":"GeometryCollection","geometries":[]}"#).unwrap();
        assert!(empty.0.is_empty());

        assert!(collection_from_geojson("garbage").is_err());
    }
}
