//! Raw GTFS tables
//!
//! Tables are kept as CSV records, so columns the typed reader ignores
//! survive a rewrite. Used to add columns to a dataset and to compare two
//! datasets by key columns.

use crate::error::{OnestopError, Result};
use csv::StringRecord;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{Read, Seek, Write};
use std::path::Path;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

fn zip_error(err: ZipError) -> OnestopError {
    OnestopError::Gtfs { name: "archive".to_string(), reason: err.to_string() }
}

/// One CSV table with its header row
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    headers: StringRecord,
    records: Vec<StringRecord>,
}

impl Table {
    pub fn parse(name: &str, bytes: &[u8]) -> Result<Self> {
        let failed = |e: csv::Error| OnestopError::Gtfs { name: name.to_string(), reason: e.to_string() };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(bytes);
        let headers = reader.headers().map_err(failed)?.clone();
        let records = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(failed)?;
        Ok(Self { name: name.to_string(), headers, records })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.headers.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Values of a column, empty for short rows; `None` when the column is absent
    pub fn values(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.column(name)?;
        Some(self.records.iter().map(|record| record.get(index).unwrap_or_default()).collect())
    }

    /// Replace a column, or append it when absent
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.records.len() {
            return Err(OnestopError::Gtfs {
                name: self.name.clone(),
                reason: format!("expected {} values for {}, got {}", self.records.len(), name, values.len()),
            });
        }

        let index = match self.column(name) {
            Some(index) => index,
            None => {
                self.headers.push_field(name);
                self.headers.len() - 1
            }
        };
        let width = self.headers.len();
        for (record, value) in self.records.iter_mut().zip(values) {
            let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
            if fields.len() < width {
                fields.resize(width, String::new());
            }
            fields[index] = value;
            *record = StringRecord::from(fields);
        }
        Ok(())
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let failed = |e: csv::Error| OnestopError::Gtfs { name: self.name.clone(), reason: e.to_string() };
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
        writer.write_record(&self.headers).map_err(failed)?;
        for record in &self.records {
            writer.write_record(record).map_err(failed)?;
        }
        writer.into_inner().map_err(|e| OnestopError::Serialization(e.to_string()))
    }

    /// Distinct key tuples, trimmed and lowercased; absent columns read as empty
    pub fn keys(&self, columns: &[String]) -> BTreeSet<Vec<String>> {
        let indexes: Vec<Option<usize>> = columns.iter().map(|column| self.column(column)).collect();
        self.records
            .iter()
            .map(|record| {
                indexes
                    .iter()
                    .map(|index| {
                        index
                            .and_then(|i| record.get(i))
                            .unwrap_or_default()
                            .trim()
                            .to_lowercase()
                    })
                    .collect()
            })
            .collect()
    }
}

/// Key tuples shared by two tables, only in the first, and only in the second
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeyDiff {
    pub found: BTreeSet<Vec<String>>,
    pub lost: BTreeSet<Vec<String>>,
    pub new: BTreeSet<Vec<String>>,
}

pub fn diff_keys(before: &Table, after: &Table, columns: &[String]) -> KeyDiff {
    let before = before.keys(columns);
    let after = after.keys(columns);
    KeyDiff {
        found: before.intersection(&after).cloned().collect(),
        lost: before.difference(&after).cloned().collect(),
        new: after.difference(&before).cloned().collect(),
    }
}

/// Every file of a GTFS dataset, by base name, in archive order
#[derive(Debug, Clone, Default)]
pub struct GtfsFiles {
    files: Vec<(String, Vec<u8>)>,
}

impl GtfsFiles {
    /// Read a GTFS zip archive or an unpacked GTFS directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Self::from_zip(File::open(path)?);
        }

        let mut entries = fs::read_dir(path)?.collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.file_name());
        let mut files = Vec::new();
        for entry in entries {
            if entry.file_type()?.is_file() {
                files.push((entry.file_name().to_string_lossy().into_owned(), fs::read(entry.path())?));
            }
        }
        Ok(Self { files })
    }

    pub fn from_zip<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader).map_err(zip_error)?;
        let mut files = Vec::new();
        for index in 0..archive.len() {
            let mut file = archive.by_index(index).map_err(zip_error)?;
            if !file.is_file() {
                continue;
            }
            let name = file.name().rsplit('/').next().unwrap_or_default().to_string();
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            files.push((name, buf));
        }
        Ok(Self { files })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().any(|n| n == name)
    }

    pub fn table(&self, name: &str) -> Result<Table> {
        let (_, bytes) = self
            .files
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| OnestopError::MissingGtfsFile { name: name.to_string() })?;
        Table::parse(name, bytes)
    }

    /// Store a table under its name, replacing a file of the same name
    pub fn set_table(&mut self, table: &Table) -> Result<()> {
        let bytes = table.to_csv()?;
        match self.files.iter_mut().find(|(n, _)| n == table.name()) {
            Some((_, existing)) => *existing = bytes,
            None => self.files.push((table.name().to_string(), bytes)),
        }
        Ok(())
    }

    pub fn write_zip<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = ZipWriter::new(File::create(path.as_ref())?);
        for (name, bytes) in &self.files {
            writer.start_file(name.as_str(), SimpleFileOptions::default()).map_err(zip_error)?;
            writer.write_all(bytes)?;
        }
        writer.finish().map_err(zip_error)?;
        tracing::debug!("Wrote {} files to {}", self.files.len(), path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::GtfsFeed;
    use std::io::Cursor;

    const ROUTES: &str = "route_id,route_short_name,route_long_name\nAB,10,Airport - Bullfrog\nCITY,40\n";

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_values() {
        let table = Table::parse("routes.txt", ROUTES.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.values("route_id").unwrap(), vec!["AB", "CITY"]);
        assert_eq!(table.values("route_long_name").unwrap(), vec!["Airport - Bullfrog", ""]);
        assert!(table.values("onestop_id").is_none());
    }

    #[test]
    fn test_set_column_appends_and_replaces() {
        let mut table = Table::parse("routes.txt", ROUTES.as_bytes()).unwrap();
        table.set_column("onestop_id", columns(&["r-1", "r-2"])).unwrap();
        assert_eq!(table.column("onestop_id"), Some(3));
        assert_eq!(table.values("onestop_id").unwrap(), vec!["r-1", "r-2"]);
        // Short rows are padded
        assert_eq!(table.values("route_long_name").unwrap(), vec!["Airport - Bullfrog", ""]);

        table.set_column("onestop_id", columns(&["r-3", ""])).unwrap();
        assert_eq!(table.headers().count(), 4);
        assert_eq!(table.values("onestop_id").unwrap(), vec!["r-3", ""]);

        assert!(table.set_column("onestop_id", columns(&["r-4"])).is_err());
    }

    #[test]
    fn test_to_csv_keeps_quoting() {
        let mut table = Table::parse("routes.txt", ROUTES.as_bytes()).unwrap();
        table.set_column("route_desc", columns(&["a, b", "c"])).unwrap();
        let csv = String::from_utf8(table.to_csv().unwrap()).unwrap();
        assert!(csv.starts_with("route_id,route_short_name,route_long_name,route_desc\n"));
        assert!(csv.contains("AB,10,Airport - Bullfrog,\"a, b\"\n"));
        assert_eq!(Table::parse("routes.txt", csv.as_bytes()).unwrap(), table);
    }

    #[test]
    fn test_diff_keys() {
        let before = Table::parse("routes.txt", ROUTES.as_bytes()).unwrap();
        let after = Table::parse(
            "routes.txt",
            b"route_id,route_short_name\nAB, 10 \nNEW,60\n".as_slice(),
        )
        .unwrap();

        let diff = diff_keys(&before, &after, &columns(&["route_short_name"]));
        assert_eq!(diff.found, BTreeSet::from([vec!["10".to_string()]]));
        assert_eq!(diff.lost, BTreeSet::from([vec!["40".to_string()]]));
        assert_eq!(diff.new, BTreeSet::from([vec!["60".to_string()]]));

        // Missing key columns compare as empty
        let diff = diff_keys(&before, &after, &columns(&["route_long_name"]));
        assert_eq!(diff.found, BTreeSet::from([vec![String::new()]]));
        assert_eq!(diff.lost, BTreeSet::from([vec!["airport - bullfrog".to_string()]]));
        assert!(diff.new.is_empty());
    }

    #[test]
    fn test_zip_round_trip() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.add_directory("gtfs/", SimpleFileOptions::default()).unwrap();
        writer.start_file("gtfs/routes.txt", SimpleFileOptions::default()).unwrap();
        writer.write_all(ROUTES.as_bytes()).unwrap();
        writer.start_file("gtfs/shapes.txt", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"shape_id\nS1\n").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let mut files = GtfsFiles::from_zip(Cursor::new(bytes)).unwrap();
        assert_eq!(files.names().collect::<Vec<_>>(), vec!["routes.txt", "shapes.txt"]);
        assert!(matches!(files.table("stops.txt"), Err(OnestopError::MissingGtfsFile { .. })));

        let mut routes = files.table("routes.txt").unwrap();
        routes.set_column("onestop_id", columns(&["r-1", "r-2"])).unwrap();
        files.set_table(&routes).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.zip");
        files.write_zip(&path).unwrap();

        let reread = GtfsFiles::open(&path).unwrap();
        assert!(reread.contains("shapes.txt"));
        assert_eq!(reread.table("routes.txt").unwrap().values("onestop_id").unwrap(), vec!["r-1", "r-2"]);
    }

    #[test]
    fn test_directory_files_feed_the_reader() {
        let dir = tempfile::tempdir().unwrap();
        let source = concat!(env!("CARGO_MANIFEST_DIR"), "/../../testdata/gtfs/dta");
        let files = GtfsFiles::open(source).unwrap();
        assert_eq!(files.names().count(), 5);

        let path = dir.path().join("dta.zip");
        files.write_zip(&path).unwrap();
        let feed = GtfsFeed::open(&path).unwrap();
        assert_eq!(feed.stops.len(), 9);
        assert_eq!(feed.routes.len(), 5);
    }
}
