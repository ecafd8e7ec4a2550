//! Geohash encoding and decoding.
//!
//! Longitude and latitude are bisected independently; bits are interleaved
//! starting with longitude and every 5 bits become one base-32 symbol.

use onestop_core::error::{OnestopError, Result};

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Default and longest geohash length used by the identifier scheme
pub const MAX_LENGTH: usize = 12;

/// Latitude/longitude extent of a geohash cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    /// Center of the cell as `(lat, lon)`
    pub fn center(&self) -> (f64, f64) {
        ((self.min_lat + self.max_lat) / 2.0, (self.min_lon + self.max_lon) / 2.0)
    }
}

/// Encode a latitude/longitude pair to a geohash of `length` symbols.
///
/// A coordinate equal to a bisection midpoint falls into the upper half.
pub fn encode(lat: f64, lon: f64, length: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(length);
    let mut even = true;
    let mut symbol = 0usize;
    let mut bits = 0;

    while hash.len() < length {
        let (range, value) = if even { (&mut lon_range, lon) } else { (&mut lat_range, lat) };
        let mid = (range.0 + range.1) / 2.0;
        symbol <<= 1;
        if value >= mid {
            symbol |= 1;
            range.0 = mid;
        } else {
            range.1 = mid;
        }
        even = !even;
        bits += 1;

        if bits == 5 {
            hash.push(BASE32[symbol] as char);
            symbol = 0;
            bits = 0;
        }
    }
    hash
}

/// Cell bounds of a geohash
pub fn bounds(geohash: &str) -> Result<Bounds> {
    let mut cell = Bounds { min_lat: -90.0, max_lat: 90.0, min_lon: -180.0, max_lon: 180.0 };
    let mut even = true;

    for c in geohash.chars() {
        let symbol = BASE32
            .iter()
            .position(|&b| b as char == c)
            .ok_or_else(|| OnestopError::InvalidGeohash {
                geohash: geohash.to_string(),
                character: c,
            })?;

        for shift in (0..5).rev() {
            let upper = (symbol >> shift) & 1 == 1;
            let (min, max) = if even {
                (&mut cell.min_lon, &mut cell.max_lon)
            } else {
                (&mut cell.min_lat, &mut cell.max_lat)
            };
            let mid = (*min + *max) / 2.0;
            if upper {
                *min = mid;
            } else {
                *max = mid;
            }
            even = !even;
        }
    }
    Ok(cell)
}

/// Decode a geohash to the `(lat, lon)` center of its cell
pub fn decode(geohash: &str) -> Result<(f64, f64)> {
    Ok(bounds(geohash)?.center())
}

/// The adjacent cells of a geohash at the same length.
///
/// Longitude wraps around the antimeridian; cells past a pole are omitted, so
/// polar cells have fewer than 8 neighbors.
pub fn neighbors(geohash: &str) -> Result<Vec<String>> {
    let cell = bounds(geohash)?;
    let (lat, lon) = cell.center();
    let height = cell.max_lat - cell.min_lat;
    let width = cell.max_lon - cell.min_lon;
    let length = geohash.chars().count();

    let mut result = Vec::with_capacity(8);
    for dy in [-1.0, 0.0, 1.0] {
        let neighbor_lat = lat + dy * height;
        if !(-90.0..=90.0).contains(&neighbor_lat) {
            continue;
        }
        for dx in [-1.0, 0.0, 1.0] {
            if dy == 0.0 && dx == 0.0 {
                continue;
            }
            let mut neighbor_lon = lon + dx * width;
            if neighbor_lon > 180.0 {
                neighbor_lon -= 360.0;
            } else if neighbor_lon < -180.0 {
                neighbor_lon += 360.0;
            }
            let neighbor = encode(neighbor_lat, neighbor_lon, length);
            if neighbor != geohash && !result.contains(&neighbor) {
                result.push(neighbor);
            }
        }
    }
    Ok(result)
}
