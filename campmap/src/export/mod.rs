//! Export des layers (GeoJSON)

pub mod geojson;
