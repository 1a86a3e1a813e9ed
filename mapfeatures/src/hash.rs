//! Empreinte stable des géométries
//!
//! L'empreinte sert à comparer deux géométries dans la clé naturelle d'une
//! feature. Elle est indépendante du vertex de départ des anneaux de
//! polygones et arrondit les coordonnées à 7 décimales (~1cm en WGS84).

use blake3::Hasher;
use geo::{Coord, Geometry, GeometryCollection, LineString, Polygon};

/// Calcule l'empreinte d'une collection de géométries
pub fn collection_hash(collection: &GeometryCollection<f64>) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hash_collection(&mut hasher, collection);
    *hasher.finalize().as_bytes()
}

/// Convertit une empreinte en hexadécimal
pub fn hash_to_hex(hash: &[u8; 32]) -> String {
    hex::encode(hash)
}

fn hash_collection(hasher: &mut Hasher, collection: &GeometryCollection<f64>) {
    hasher.update(b"GEOMETRYCOLLECTION");
    hasher.update(&(collection.0.len() as u64).to_le_bytes());
    for geom in collection.0.iter() {
        hash_geometry(hasher, geom);
    }
}

fn hash_geometry(hasher: &mut Hasher, geom: &Geometry<f64>) {
    match geom {
        Geometry::Point(p) => {
            hasher.update(b"POINT");
            hash_coord(hasher, p.0);
        }
        Geometry::Line(l) => {
            hasher.update(b"LINE");
            hash_coord(hasher, l.start);
            hash_coord(hasher, l.end);
        }
        Geometry::LineString(ls) => {
            hasher.update(b"LINESTRING");
            hash_line(hasher, ls);
        }
        Geometry::Polygon(p) => {
            hasher.update(b"POLYGON");
            hash_polygon(hasher, p);
        }
        Geometry::MultiPoint(mp) => {
            hasher.update(b"MULTIPOINT");
            for point in mp.0.iter() {
                hash_coord(hasher, point.0);
            }
        }
        Geometry::MultiLineString(mls) => {
            hasher.update(b"MULTILINESTRING");
            for ls in mls.0.iter() {
                hasher.update(b"LS");
                hash_line(hasher, ls);
            }
        }
        Geometry::MultiPolygon(mp) => {
            hasher.update(b"MULTIPOLYGON");
            for poly in mp.0.iter() {
                hasher.update(b"POLY");
                hash_polygon(hasher, poly);
            }
        }
        Geometry::GeometryCollection(gc) => hash_collection(hasher, gc),
        Geometry::Rect(r) => hash_polygon(hasher, &r.to_polygon()),
        Geometry::Triangle(t) => hash_polygon(hasher, &t.to_polygon()),
    }
}

fn hash_line(hasher: &mut Hasher, ls: &LineString<f64>) {
    hasher.update(&(ls.0.len() as u64).to_le_bytes());
    for coord in ls.0.iter() {
        hash_coord(hasher, *coord);
    }
}

fn hash_polygon(hasher: &mut Hasher, p: &Polygon<f64>) {
    hasher.update(b"EXT");
    hash_ring_normalized(hasher, p.exterior());
    for interior in p.interiors() {
        hasher.update(b"INT");
        hash_ring_normalized(hasher, interior);
    }
}

/// Hash un anneau en le faisant commencer au vertex lexicographiquement
/// le plus petit.
fn hash_ring_normalized(hasher: &mut Hasher, ring: &LineString<f64>) {
    // Le dernier point d'un anneau fermé répète le premier
    let len = if ring.0.len() > 1 && ring.0.first() == ring.0.last() {
        ring.0.len() - 1
    } else {
        ring.0.len()
    };

    if len == 0 {
        return;
    }

    let min_idx = (0..len)
        .min_by(|&a, &b| {
            let ca = &ring.0[a];
            let cb = &ring.0[b];
            ca.x.partial_cmp(&cb.x)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| ca.y.partial_cmp(&cb.y).unwrap_or(std::cmp::Ordering::Equal))
        })
        .unwrap_or(0);

    hasher.update(&(len as u64).to_le_bytes());
    for i in 0..len {
        hash_coord(hasher, ring.0[(min_idx + i) % len]);
    }
}

fn hash_coord(hasher: &mut Hasher, coord: Coord<f64>) {
    let x = (coord.x * 10_000_000.0).round() as i64;
    let y = (coord.y * 10_000_000.0).round() as i64;
    hasher.update(&x.to_le_bytes());
    hasher.update(&y.to_le_bytes());
}
