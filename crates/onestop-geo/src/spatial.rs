use crate::geohash::{encode, neighbors, MAX_LENGTH};

/// Longest geohash `neighbor_fit` returns
pub const FIT_MAX_LENGTH: usize = MAX_LENGTH - 2;
use geo::algorithm::centroid::Centroid;
use geo::{Coord, MultiPoint, Point};
use onestop_core::error::{OnestopError, Result};

/// Anything that may have a single representative location
pub trait Located {
    /// `(x = lon, y = lat)`, `None` when no valid coordinate is known
    fn location(&self) -> Option<Coord<f64>>;
}

impl Located for Coord<f64> {
    fn location(&self) -> Option<Coord<f64>> {
        Some(*self)
    }
}

impl Located for [f64; 2] {
    fn location(&self) -> Option<Coord<f64>> {
        Some(Coord { x: self[0], y: self[1] })
    }
}

impl<T: Located> Located for Option<T> {
    fn location(&self) -> Option<Coord<f64>> {
        self.as_ref().and_then(Located::location)
    }
}

impl<T: Located + ?Sized> Located for &T {
    fn location(&self) -> Option<Coord<f64>> {
        (**self).location()
    }
}

/// Arithmetic mean of a set of points
pub fn centroid(points: &[Coord<f64>]) -> Result<Coord<f64>> {
    let multi: MultiPoint<f64> = points.iter().map(|c| Point::from(*c)).collect();
    multi.centroid().map(Coord::from).ok_or(OnestopError::NoPoints)
}

/// Longest geohash prefix of `centroid` whose cell, together with its
/// neighbors, contains every point.
///
/// Lengths 1 through 11 are tried in order; the first length at which some
/// point falls outside the neighborhood ends the search and the previous
/// length wins. The result is never longer than `FIT_MAX_LENGTH`.
pub fn neighbor_fit(centroid: Coord<f64>, points: &[Coord<f64>]) -> Result<String> {
    let center = encode(centroid.y, centroid.x, MAX_LENGTH);
    let hashes: Vec<String> = points.iter().map(|p| encode(p.y, p.x, MAX_LENGTH)).collect();

    for length in 1..MAX_LENGTH {
        let prefix = &center[..length];
        let mut cells = neighbors(prefix)?;
        cells.push(prefix.to_string());

        let escaped = hashes.iter().any(|hash| !cells.iter().any(|cell| *cell == hash[..length]));
        if escaped {
            return Ok(center[..length - 1].to_string());
        }
    }
    Ok(center[..FIT_MAX_LENGTH].to_string())
}

/// Geohash describing the spatial spread of a set of features.
///
/// Features without a valid location are ignored; `NoPoints` is returned
/// when none remain.
pub fn geohash_features<I>(features: I) -> Result<String>
where
    I: IntoIterator,
    I::Item: Located,
{
    let points: Vec<Coord<f64>> = features.into_iter().filter_map(|f| f.location()).collect();
    if points.is_empty() {
        return Err(OnestopError::NoPoints);
    }
    let center = centroid(&points)?;
    tracing::trace!("Fitting {} points around ({}, {})", points.len(), center.x, center.y);
    neighbor_fit(center, &points)
}
