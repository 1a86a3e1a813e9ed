//! Import d'une FeatureCollection GeoJSON dans un layer

use std::time::Instant;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::error::CampMapError;
use crate::models::{FeatureDraft, Layer};
use crate::report::ImportReport;
use crate::store::{MapStore, UpsertResult};

/// Importe `payload` dans `layer`.
///
/// Le document est entièrement parsé avant la première écriture: un JSON
/// invalide ou un type autre que `FeatureCollection` est rejeté
/// (`CampMapError::Rejected`) sans rien persister. Les features invalides
/// sont comptées dans le rapport et n'interrompent pas l'import. Une erreur
/// du store, elle, est propagée.
pub async fn import_feature_collection<S: MapStore + ?Sized>(
    store: &S,
    layer: &Layer,
    payload: &str,
) -> Result<ImportReport> {
    let start = Instant::now();
    let mut report = ImportReport::new(&layer.slug);

    let parsed = mapfeatures::parse(payload).map_err(CampMapError::from)?;
    debug!(
        layer = %layer.slug,
        valid = parsed.features.len(),
        invalid = parsed.errors.len(),
        "Payload parsed"
    );

    for error in &parsed.errors {
        report.record_error(error.feature_index(), error.to_string());
    }

    for feature in parsed.features {
        let index = feature.index;
        let draft = FeatureDraft::from(feature);
        if let Err(e) = draft.validate() {
            warn!(layer = %layer.slug, index, "Feature skipped: {e}");
            report.record_error(Some(index), e.to_string());
            continue;
        }

        match store.upsert_feature(layer.id, &draft).await? {
            UpsertResult::Created => report.record_created(),
            UpsertResult::Updated => report.record_updated(),
        }
    }

    report.set_duration(start.elapsed());
    report.finalize();

    info!(
        layer = %layer.slug,
        created = report.created,
        updated = report.updated,
        errors = report.errors.len(),
        "GeoJSON import finished"
    );

    Ok(report)
}
