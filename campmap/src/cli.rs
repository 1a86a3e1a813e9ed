//! Définition et implémentation des commandes CLI
//!
//! - `import`: FeatureCollection GeoJSON → layer
//! - `export`: layer → FeatureCollection GeoJSON
//! - gestion des layers, features et layers externes

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use geo::Geometry;
use geozero::wkt::WktWriter;
use geozero::GeozeroGeometry;
use tracing::info;

use campmap::access::CampScope;
use campmap::backoffice::Backoffice;
use campmap::config::Config;
use campmap::export::geojson::export_layer_to_file;
use campmap::models::{ExternalLayerDraft, Feature, LayerDraft};
use campmap::report::MessageLevel;
use campmap::store::pool::{create_pool, test_connection, DatabaseConfig, DatabaseOverrides};
use campmap::store::{MapStore, MemoryStore, PgStore};

/// Connexion PostgreSQL (défauts: variables PG* puis valeurs intégrées)
#[derive(Args, Debug, Clone, Default)]
pub struct DatabaseArgs {
    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// PostgreSQL database name (défaut : env PGDATABASE / bornhack)
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / bornhack)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long, global = true)]
    pub ssl: Option<String>,
}

impl From<&DatabaseArgs> for DatabaseOverrides {
    fn from(args: &DatabaseArgs) -> Self {
        Self {
            host: args.host.clone(),
            database: args.database.clone(),
            user: args.user.clone(),
            password: args.password.clone(),
            port: args.port,
            ssl: args.ssl.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the map schema and tables
    InitSchema {
        /// Drop the schema (and all map data) first
        #[arg(long)]
        drop: bool,
    },

    /// Import a GeoJSON FeatureCollection into a layer
    Import {
        /// Target layer slug
        #[arg(short, long)]
        layer: String,

        /// GeoJSON file (stdin when omitted or "-")
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Validate against an in-memory store, nothing is written
        #[arg(long)]
        dry_run: bool,

        /// Save the JSON import report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List layers
    Layers,

    /// Create a layer
    LayerCreate {
        /// Layer name
        name: String,

        /// Slug (derived from the name when omitted)
        #[arg(long)]
        slug: Option<String>,

        #[arg(long, default_value = "")]
        description: String,

        /// Font Awesome icon class
        #[arg(long)]
        icon: Option<String>,

        /// Group shown in the map legend
        #[arg(long, default_value = "")]
        group: String,

        /// Owning camp (global when omitted)
        #[arg(long)]
        camp: Option<String>,
    },

    /// Update a layer, unspecified fields are kept
    LayerUpdate {
        /// Slug of the layer to update
        slug: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        new_slug: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        icon: Option<String>,

        #[arg(long)]
        group: Option<String>,

        #[arg(long)]
        camp: Option<String>,
    },

    /// Delete a layer and all of its features
    LayerDelete {
        slug: String,
    },

    /// List the features of a layer
    Features {
        /// Layer slug
        layer: String,

        /// Print geometries as WKT
        #[arg(long)]
        wkt: bool,
    },

    /// Delete a feature
    FeatureDelete {
        uuid: String,
    },

    /// List external layers
    ExternalLayers,

    /// Register an external layer
    ExternalLayerCreate {
        name: String,

        /// Absolute http(s) URL of the layer
        #[arg(long)]
        url: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long)]
        camp: Option<String>,
    },

    /// Update an external layer, unspecified fields are kept
    ExternalLayerUpdate {
        uuid: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        camp: Option<String>,
    },

    /// Delete an external layer
    ExternalLayerDelete {
        uuid: String,
    },

    /// Export a layer as a GeoJSON FeatureCollection
    Export {
        /// Layer slug
        layer: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Exécute une commande
pub async fn run(command: Commands, config: &Config, db: &DatabaseArgs) -> Result<()> {
    if let Commands::Import {
        layer,
        path,
        dry_run: true,
        report,
    } = &command
    {
        return cmd_import_dry_run(config, layer, path.as_deref(), report.as_deref()).await;
    }

    let store = connect(config, db).await?;

    match command {
        Commands::InitSchema { drop } => {
            info!(schema = %config.schema, drop, "Initializing schema");
            store.init_schema(drop).await?;
            println!("Schema {} ready", config.schema);
        }
        Commands::Import {
            layer, path, report, ..
        } => {
            let backoffice = backoffice(store, config);
            cmd_import(&backoffice, &layer, path.as_deref(), report.as_deref()).await?;
        }
        Commands::Layers => {
            let backoffice = backoffice(store, config);
            for layer in backoffice.list_layers().await? {
                println!(
                    "{:<24} {:<32} {:<16} {}",
                    layer.slug,
                    layer.name,
                    layer.group,
                    layer.camp.as_deref().unwrap_or("(global)")
                );
            }
        }
        Commands::LayerCreate {
            name,
            slug,
            description,
            icon,
            group,
            camp,
        } => {
            let backoffice = backoffice(store, config);
            let draft = LayerDraft {
                name,
                slug,
                description,
                icon,
                group,
                camp: camp.or_else(|| config.camp.clone()),
            };
            let layer = backoffice.create_layer(&draft).await?;
            println!("Layer {} created ({})", layer.slug, layer.uuid);
        }
        Commands::LayerUpdate {
            slug,
            name,
            new_slug,
            description,
            icon,
            group,
            camp,
        } => {
            let backoffice = backoffice(store, config);
            let current = backoffice.get_layer(&slug).await?;
            let mut draft = LayerDraft::from_layer(&current);
            if let Some(name) = name {
                draft.name = name;
            }
            if new_slug.is_some() {
                draft.slug = new_slug;
            }
            if let Some(description) = description {
                draft.description = description;
            }
            if icon.is_some() {
                draft.icon = icon;
            }
            if let Some(group) = group {
                draft.group = group;
            }
            if camp.is_some() {
                draft.camp = camp;
            }
            let layer = backoffice.update_layer(&slug, &draft).await?;
            println!("Layer {} updated", layer.slug);
        }
        Commands::LayerDelete { slug } => {
            let backoffice = backoffice(store, config);
            let removed = backoffice.delete_layer(&slug).await?;
            println!("Layer {} deleted ({} features removed)", slug, removed);
        }
        Commands::Features { layer, wkt } => {
            let backoffice = backoffice(store, config);
            for feature in backoffice.list_features(&layer).await? {
                print_feature(&feature, wkt)?;
            }
        }
        Commands::FeatureDelete { uuid } => {
            let backoffice = backoffice(store, config);
            backoffice.delete_feature(&uuid).await?;
            println!("Feature {} deleted", uuid);
        }
        Commands::ExternalLayers => {
            let backoffice = backoffice(store, config);
            for layer in backoffice.list_external_layers().await? {
                println!(
                    "{} {:<32} {} {}",
                    layer.uuid,
                    layer.name,
                    layer.url,
                    layer.camp.as_deref().unwrap_or("(global)")
                );
            }
        }
        Commands::ExternalLayerCreate {
            name,
            url,
            description,
            camp,
        } => {
            let backoffice = backoffice(store, config);
            let draft = ExternalLayerDraft {
                name,
                description,
                camp: camp.or_else(|| config.camp.clone()),
                url,
            };
            let layer = backoffice.create_external_layer(&draft).await?;
            println!("External layer {} created", layer.uuid);
        }
        Commands::ExternalLayerUpdate {
            uuid,
            name,
            url,
            description,
            camp,
        } => {
            let backoffice = backoffice(store, config);
            let current = backoffice.get_external_layer(&uuid).await?;
            let mut draft = ExternalLayerDraft::from_external_layer(&current);
            if let Some(name) = name {
                draft.name = name;
            }
            if let Some(url) = url {
                draft.url = url;
            }
            if let Some(description) = description {
                draft.description = description;
            }
            if camp.is_some() {
                draft.camp = camp;
            }
            let layer = backoffice.update_external_layer(&uuid, &draft).await?;
            println!("External layer {} updated", layer.uuid);
        }
        Commands::ExternalLayerDelete { uuid } => {
            let backoffice = backoffice(store, config);
            backoffice.delete_external_layer(&uuid).await?;
            println!("External layer {} deleted", uuid);
        }
        Commands::Export { layer, output } => {
            let backoffice = backoffice(store, config);
            cmd_export(&backoffice, &layer, output.as_deref()).await?;
        }
    }

    Ok(())
}

async fn connect(config: &Config, db: &DatabaseArgs) -> Result<PgStore> {
    let mut db_config = DatabaseConfig::from_env();
    db_config.apply(db.into())?;
    info!(
        database = %db_config.label(),
        ssl = %db_config.ssl_mode,
        "Connecting to PostgreSQL"
    );

    let pool = create_pool(&db_config)?;
    test_connection(&pool).await?;

    Ok(PgStore::new(pool, config.schema.clone(), config.srid))
}

fn backoffice<S: MapStore>(store: S, config: &Config) -> Backoffice<S> {
    match config.camp {
        Some(ref camp) => Backoffice::new(store, CampScope::new(camp.clone())),
        None => Backoffice::unscoped(store),
    }
}

fn read_payload(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut payload = String::new();
            std::io::stdin()
                .read_to_string(&mut payload)
                .context("Failed to read GeoJSON from stdin")?;
            Ok(payload)
        }
    }
}

/// Exécute la commande import
async fn cmd_import<S: MapStore>(
    backoffice: &Backoffice<S>,
    layer: &str,
    path: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<()> {
    let payload = read_payload(path)?;
    let report = backoffice.import_geojson(layer, &payload).await?;

    for message in report.messages() {
        match message.level {
            MessageLevel::Success => println!("{}", message.text),
            MessageLevel::Error => eprintln!("{}", message.text),
        }
    }
    report.display();

    if let Some(report_path) = report_path {
        report.save_to_file(report_path)?;
        info!(path = %report_path.display(), "Report saved");
    }

    Ok(())
}

/// Import à blanc: le layer est recréé dans un store en mémoire
async fn cmd_import_dry_run(
    config: &Config,
    layer: &str,
    path: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<()> {
    let store = MemoryStore::new();
    let draft = LayerDraft {
        name: layer.to_string(),
        slug: Some(layer.to_string()),
        camp: config.camp.clone(),
        ..Default::default()
    };
    let created = store.create_layer(&draft).await?;

    let backoffice = backoffice(store, config);
    println!("Dry run: nothing will be written");
    cmd_import(&backoffice, &created.slug, path, report_path).await
}

/// Exécute la commande export
async fn cmd_export<S: MapStore>(
    backoffice: &Backoffice<S>,
    layer_slug: &str,
    output: Option<&Path>,
) -> Result<()> {
    match output {
        Some(output) => {
            let layer = backoffice.get_layer(layer_slug).await?;
            let features = backoffice.list_features(layer_slug).await?;
            export_layer_to_file(&layer, &features, output)?;
            println!(
                "Layer {}: {} features written to {}",
                layer.slug,
                features.len(),
                output.display()
            );
        }
        None => println!("{}", backoffice.export_layer(layer_slug).await?),
    }
    Ok(())
}

fn print_feature(feature: &Feature, wkt: bool) -> Result<()> {
    let mut line = format!(
        "{} {:<32} {:<12} {}",
        feature.uuid,
        feature.name,
        feature.topic,
        feature.color
    );
    if feature.processing {
        line.push_str(" [processing]");
    }
    if wkt {
        line.push(' ');
        line.push_str(&geometry_wkt(feature)?);
    }
    println!("{}", line);
    Ok(())
}

fn geometry_wkt(feature: &Feature) -> Result<String> {
    let geometry = Geometry::GeometryCollection(feature.geometry.clone());
    let mut buf = Vec::new();
    {
        let mut writer = WktWriter::new(&mut buf);
        geometry
            .process_geom(&mut writer)
            .context("Failed to encode geometry to WKT")?;
    }
    String::from_utf8(buf).context("WKT output is not UTF-8")
}
