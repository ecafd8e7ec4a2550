//! Neighbor-fit over a real station set
//!
//! Caltrain platforms stretch from San Francisco to Gilroy; their fit must
//! settle on a short prefix covering the whole peninsula.

use geo::Coord;
use onestop_geo::geohash::{decode, encode, neighbors};
use onestop_geo::{centroid, geohash_features, neighbor_fit};

const CALTRAIN: [[f64; 2]; 64] = [
    [-122.297461, 37.537814], [-122.19779, 37.464645], [-121.610049, 37.085225],
    [-122.197869, 37.464584], [-122.392404, 37.757583], [-121.997135, 37.370484],
    [-122.3449, 37.580197], [-121.901985, 37.330196], [-122.275816, 37.520844],
    [-122.386832, 37.599797], [-122.26015, 37.50805], [-121.566225, 37.003485],
    [-122.164697, 37.443405], [-121.842037, 37.284062], [-122.405018, 37.655946],
    [-121.841955, 37.284102], [-121.650304, 37.129321], [-121.797643, 37.252422],
    [-121.566088, 37.003538], [-122.412076, 37.631108], [-122.260266, 37.507933],
    [-122.36265, 37.58764], [-122.39188, 37.757599], [-122.401586, 37.709537],
    [-122.231936, 37.486159], [-122.309338, 37.552938], [-122.107125, 37.407277],
    [-122.141978, 37.429333], [-122.40198, 37.709544], [-122.182297, 37.454856],
    [-122.031423, 37.378789], [-122.141927, 37.429365], [-122.386647, 37.59988],
    [-121.610936, 37.086653], [-121.650244, 37.129363], [-122.182405, 37.454745],
    [-121.914677, 37.342338], [-122.164614, 37.443475], [-122.362708, 37.587552],
    [-122.031372, 37.378916], [-122.394992, 37.77639], [-121.9146, 37.342384],
    [-122.394935, 37.776348], [-122.411968, 37.631128], [-122.324092, 37.568294],
    [-122.345075, 37.580186], [-122.323851, 37.568087], [-122.232, 37.486101],
    [-122.107069, 37.407323], [-121.883999, 37.31175], [-121.797683, 37.252379],
    [-121.936135, 37.353189], [-121.883721, 37.31174], [-122.075956, 37.394459],
    [-122.075994, 37.394402], [-122.297349, 37.537868], [-121.903011, 37.329239],
    [-122.40487, 37.65589], [-121.93608, 37.353238], [-121.903173, 37.329231],
    [-122.309608, 37.552994], [-121.997114, 37.370598], [-122.275738, 37.52089],
    [-121.883403, 37.311638],
];

fn coords() -> Vec<Coord<f64>> {
    CALTRAIN.iter().map(|[x, y]| Coord { x: *x, y: *y }).collect()
}

#[test]
fn test_centroid_of_stations() {
    let c = centroid(&coords()).unwrap();
    assert!((c.x - -122.11545060937499).abs() < 1e-9);
    assert!((c.y - 37.44463196875001).abs() < 1e-9);
}

#[test]
fn test_fit_of_stations() {
    assert_eq!(geohash_features(CALTRAIN).unwrap(), "9q9");
}

#[test]
fn test_every_station_lies_in_the_fit_neighborhood() {
    let points = coords();
    let fit = neighbor_fit(centroid(&points).unwrap(), &points).unwrap();

    let mut cells = neighbors(&fit).unwrap();
    cells.push(fit.clone());
    for p in &points {
        let hash = encode(p.y, p.x, fit.len());
        assert!(cells.contains(&hash), "{} outside {:?}", hash, cells);
    }
}

#[test]
fn test_fit_is_a_prefix_of_the_centroid_hash() {
    let points = coords();
    let c = centroid(&points).unwrap();
    let fit = neighbor_fit(c, &points).unwrap();

    let (lat, lon) = decode(&fit).unwrap();
    assert_eq!(encode(lat, lon, fit.len()), fit);
    assert!(encode(c.y, c.x, 12).starts_with(&fit));
}
