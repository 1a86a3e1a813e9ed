//! # campmap
//!
//! Back office de la carte du camp: layers, features, layers externes et
//! import de FeatureCollections GeoJSON dans PostGIS.
//!
//! ## Features
//!
//! - Import GeoJSON avec upsert par clé naturelle et rapport created/updated/errors
//! - Périmètre camp sur toutes les opérations
//! - Store PostgreSQL/PostGIS avec pool de connexions, store en mémoire pour le dry-run
//! - Export GeoJSON d'un layer
//!
//! ## Usage CLI
//!
//! ```bash
//! campmap init-schema
//! campmap layer-create "Power grid" --icon "fas fa-bolt"
//! campmap import --layer power-grid --path ./power.geojson
//! campmap import --layer power-grid --path ./power.geojson --dry-run
//! campmap export power-grid --output ./power.geojson
//! ```

pub mod access;
pub mod backoffice;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod models;
pub mod report;
pub mod store;

pub use access::CampScope;
pub use backoffice::Backoffice;
pub use config::Config;
pub use error::CampMapError;
pub use import::import_feature_collection;
pub use report::{FlashMessage, ImportReport, ImportStatus, MessageLevel};
pub use store::pool::{create_pool, DatabaseConfig};
pub use store::{MapStore, MemoryStore, PgStore, UpsertResult};
