//! GTFS reader
//!
//! Loads the five tables needed to build transit entities (agency, stops,
//! routes, trips, stop_times) from either a zip archive or an unpacked
//! directory. Rows are deserialized into plain records; columns outside the
//! records are ignored.

use crate::error::{OnestopError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::ZipArchive;

/// Source of raw GTFS tables
trait TableSource {
    /// Bytes of the named table, `None` when the table is absent
    fn table(&mut self, name: &str) -> Result<Option<Vec<u8>>>;
}

struct DirSource(PathBuf);

impl TableSource for DirSource {
    fn table(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.0.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read(path)?))
    }
}

impl<R: Read + Seek> TableSource for ZipArchive<R> {
    fn table(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let suffix = format!("/{}", name);
        let entry = self
            .file_names()
            .find(|n| *n == name || n.ends_with(&suffix))
            .map(str::to_string);
        let Some(entry) = entry else {
            return Ok(None);
        };

        let mut file = match self.by_name(&entry) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(err) => {
                return Err(OnestopError::Gtfs { name: entry, reason: err.to_string() });
            }
        };
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(Some(buf))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Agency {
    #[serde(default)]
    pub agency_id: Option<String>,
    #[serde(default)]
    pub agency_name: String,
    #[serde(default)]
    pub agency_url: Option<String>,
    #[serde(default)]
    pub agency_timezone: Option<String>,
    #[serde(default)]
    pub agency_lang: Option<String>,
    #[serde(default)]
    pub agency_phone: Option<String>,
    #[serde(default)]
    pub agency_fare_url: Option<String>,
    #[serde(default)]
    pub agency_email: Option<String>,
}

impl Agency {
    pub fn tags(&self) -> BTreeMap<String, String> {
        collect_tags([
            ("agency_url", &self.agency_url),
            ("agency_timezone", &self.agency_timezone),
            ("agency_lang", &self.agency_lang),
            ("agency_phone", &self.agency_phone),
            ("agency_fare_url", &self.agency_fare_url),
            ("agency_email", &self.agency_email),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    #[serde(default)]
    pub stop_name: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub stop_lat: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub stop_lon: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub location_type: Option<u8>,
    #[serde(default)]
    pub parent_station: Option<String>,
    #[serde(default)]
    pub stop_code: Option<String>,
    #[serde(default)]
    pub stop_desc: Option<String>,
    #[serde(default)]
    pub stop_url: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub stop_timezone: Option<String>,
    #[serde(default)]
    pub wheelchair_boarding: Option<String>,
}

impl Stop {
    /// `[lon, lat]`, `None` unless both coordinates are present and in range
    pub fn point(&self) -> Option<[f64; 2]> {
        let (lat, lon) = (self.stop_lat?, self.stop_lon?);
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some([lon, lat])
    }

    pub fn is_station(&self) -> bool {
        self.location_type == Some(1)
    }

    pub fn tags(&self) -> BTreeMap<String, String> {
        collect_tags([
            ("stop_code", &self.stop_code),
            ("stop_desc", &self.stop_desc),
            ("stop_url", &self.stop_url),
            ("zone_id", &self.zone_id),
            ("stop_timezone", &self.stop_timezone),
            ("wheelchair_boarding", &self.wheelchair_boarding),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Route {
    pub route_id: String,
    #[serde(default)]
    pub agency_id: Option<String>,
    #[serde(default)]
    pub route_short_name: Option<String>,
    #[serde(default)]
    pub route_long_name: Option<String>,
    #[serde(default)]
    pub route_desc: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub route_type: Option<u16>,
    #[serde(default)]
    pub route_url: Option<String>,
    #[serde(default)]
    pub route_color: Option<String>,
    #[serde(default)]
    pub route_text_color: Option<String>,
}

impl Route {
    /// Short name, falling back to the long name
    pub fn name(&self) -> Option<&str> {
        self.route_short_name
            .as_deref()
            .or(self.route_long_name.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// Human readable mode of the basic GTFS route types
    pub fn vehicle_type(&self) -> Option<&'static str> {
        let vehicle = match self.route_type? {
            0 => "tram",
            1 => "metro",
            2 => "rail",
            3 => "bus",
            4 => "ferry",
            5 => "cablecar",
            6 => "gondola",
            7 => "funicular",
            11 => "trolleybus",
            12 => "monorail",
            _ => return None,
        };
        Some(vehicle)
    }

    pub fn tags(&self) -> BTreeMap<String, String> {
        let vehicle_type = self.vehicle_type().map(str::to_string);
        collect_tags([
            ("route_long_name", &self.route_long_name),
            ("route_desc", &self.route_desc),
            ("route_url", &self.route_url),
            ("route_color", &self.route_color),
            ("route_text_color", &self.route_text_color),
            ("vehicle_type", &vehicle_type),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StopTime {
    pub trip_id: String,
    pub stop_id: String,
    pub stop_sequence: u32,
}

fn collect_tags<'a>(
    fields: impl IntoIterator<Item = (&'a str, &'a Option<String>)>,
) -> BTreeMap<String, String> {
    fields
        .into_iter()
        .filter_map(|(key, value)| {
            value.as_ref().filter(|v| !v.is_empty()).map(|v| (key.to_string(), v.clone()))
        })
        .collect()
}

/// The GTFS tables used to build transit entities
#[derive(Debug, Clone, Default)]
pub struct GtfsFeed {
    pub agencies: Vec<Agency>,
    pub stops: Vec<Stop>,
    pub routes: Vec<Route>,
    pub trips: Vec<Trip>,
    pub stop_times: Vec<StopTime>,
}

impl GtfsFeed {
    /// Open a GTFS zip archive or an unpacked GTFS directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            tracing::debug!("Reading GTFS directory {}", path.display());
            return Self::load(&mut DirSource(path.to_path_buf()));
        }

        tracing::debug!("Reading GTFS archive {}", path.display());
        Self::from_zip(File::open(path)?)
    }

    /// Read a GTFS zip archive
    pub fn from_zip<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader).map_err(|e| OnestopError::Gtfs {
            name: "archive".to_string(),
            reason: e.to_string(),
        })?;
        Self::load(&mut archive)
    }

    fn load(source: &mut impl TableSource) -> Result<Self> {
        Ok(Self {
            agencies: load_table(source, "agency.txt")?,
            stops: load_table(source, "stops.txt")?,
            routes: load_table(source, "routes.txt")?,
            trips: load_table(source, "trips.txt")?,
            stop_times: load_table(source, "stop_times.txt")?,
        })
    }

    /// Distinct stop sequences of each route's trips, in trip order
    pub fn stop_patterns(&self) -> HashMap<&str, Vec<Vec<&str>>> {
        let mut by_trip: HashMap<&str, Vec<&StopTime>> = HashMap::new();
        for stop_time in &self.stop_times {
            by_trip.entry(stop_time.trip_id.as_str()).or_default().push(stop_time);
        }

        let mut patterns: HashMap<&str, Vec<Vec<&str>>> = HashMap::new();
        for trip in &self.trips {
            let Some(stop_times) = by_trip.get_mut(trip.trip_id.as_str()) else {
                continue;
            };
            stop_times.sort_by_key(|st| st.stop_sequence);
            let pattern: Vec<&str> = stop_times.iter().map(|&st| st.stop_id.as_str()).collect();

            let route_patterns = patterns.entry(trip.route_id.as_str()).or_default();
            if !pattern.is_empty() && !route_patterns.contains(&pattern) {
                route_patterns.push(pattern);
            }
        }
        patterns
    }
}

fn load_table<T: DeserializeOwned>(source: &mut impl TableSource, name: &str) -> Result<Vec<T>> {
    let bytes = source
        .table(name)?
        .ok_or_else(|| OnestopError::MissingGtfsFile { name: name.to_string() })?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let mut rows = Vec::new();
    for rec in reader.deserialize() {
        let rec: T = rec.map_err(|e| OnestopError::Gtfs {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        rows.push(rec);
    }
    tracing::debug!("Read {} rows from {}", rows.len(), name);
    Ok(rows)
}
