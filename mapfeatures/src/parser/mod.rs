//! Parsers GeoJSON

pub mod collection;
pub mod geometry;
pub mod properties;
