//! File codecs for CSV, JSON, and JSONL import/export.
//!
//! The on-disk formats mirror each other:
//!
//! - **CSV** — header row with the key column first, then the attribute
//!   columns in declared order; empty cells mean the attribute is absent.
//! - **JSON** — a single object keyed by filename, each value an object of
//!   attributes.
//! - **JSONL** — one object per line, carrying the key in a
//!   [`KEY_FIELD`](crate::KEY_FIELD) field alongside the attributes.
//!
//! The format is chosen by file extension; anything else fails with
//! [`CoreError::UnsupportedFormat`]. Null attribute values are never
//! written: an absent attribute is an absent map entry, consistently on
//! both the read and write side.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::value::{AttributeMap, KEY_FIELD, Value};

/// Supported file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Comma-separated values with a header row.
    Csv,
    /// One JSON object keyed by filename.
    Json,
    /// JSON Lines, one record object per line.
    Jsonl,
}

impl Format {
    /// Determines the format from a path's extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedFormat`] for a missing or unknown
    /// extension.
    pub fn from_path(path: &Path) -> Result<Format> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "jsonl" => Ok(Format::Jsonl),
            other => Err(CoreError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Writes records to `path` in the format chosen by its extension.
///
/// `attributes` fixes the CSV column order; JSON and JSONL ignore it since
/// their records are self-describing.
pub fn write_records<'a, I>(path: &Path, attributes: &[String], records: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a AttributeMap)>,
{
    match Format::from_path(path)? {
        Format::Csv => write_csv(path, attributes, records),
        Format::Json => write_json(path, records),
        Format::Jsonl => write_jsonl(path, records),
    }
}

/// Reads records from `path` in the format chosen by its extension.
///
/// Returns `(key, attributes)` pairs in file order.
pub fn read_records(path: &Path) -> Result<Vec<(String, AttributeMap)>> {
    match Format::from_path(path)? {
        Format::Csv => read_csv(path),
        Format::Json => read_json(path),
        Format::Jsonl => read_jsonl(path),
    }
}

fn write_csv<'a, I>(path: &Path, attributes: &[String], records: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a AttributeMap)>,
{
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = Vec::with_capacity(attributes.len() + 1);
    header.push(KEY_FIELD);
    header.extend(attributes.iter().map(String::as_str));
    writer.write_record(&header)?;

    for (key, map) in records {
        let mut record = Vec::with_capacity(attributes.len() + 1);
        record.push(key.to_string());
        for attribute in attributes {
            record.push(map.get(attribute).map(Value::to_string).unwrap_or_default());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json<'a, I>(path: &Path, records: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a AttributeMap)>,
{
    let mut root = serde_json::Map::new();
    for (key, map) in records {
        root.insert(key.to_string(), record_to_json(map));
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &root)?;
    Ok(())
}

fn write_jsonl<'a, I>(path: &Path, records: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a AttributeMap)>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    for (key, map) in records {
        let mut object = serde_json::Map::new();
        object.insert(KEY_FIELD.to_string(), serde_json::Value::from(key));
        if let serde_json::Value::Object(fields) = record_to_json(map) {
            object.extend(fields);
        }
        serde_json::to_writer(&mut writer, &serde_json::Value::Object(object))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn record_to_json(map: &AttributeMap) -> serde_json::Value {
    let fields: serde_json::Map<String, serde_json::Value> = map
        .iter()
        .map(|(name, value)| (name.clone(), serde_json::Value::from(value)))
        .collect();
    serde_json::Value::Object(fields)
}

fn read_csv(path: &Path) -> Result<Vec<(String, AttributeMap)>> {
    let mut reader = csv::Reader::from_path(path)?;
    // The first header column is the key column, whatever it is named.
    let attributes: Vec<String> = reader
        .headers()?
        .iter()
        .skip(1)
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let key = record
            .get(0)
            .ok_or_else(|| CoreError::Import("row without a key column".to_string()))?
            .to_string();
        let mut map = AttributeMap::new();
        for (attribute, cell) in attributes.iter().zip(record.iter().skip(1)) {
            if !cell.is_empty() {
                map.insert(attribute.clone(), Value::infer(cell));
            }
        }
        records.push((key, map));
    }
    Ok(records)
}

fn read_json(path: &Path) -> Result<Vec<(String, AttributeMap)>> {
    let reader = BufReader::new(File::open(path)?);
    let root: serde_json::Map<String, serde_json::Value> = serde_json::from_reader(reader)?;

    let mut records = Vec::with_capacity(root.len());
    for (key, value) in root {
        let fields = value.as_object().ok_or_else(|| {
            CoreError::Import(format!("entry '{key}' is not an attribute object"))
        })?;
        records.push((key, json_to_record(fields)?));
    }
    Ok(records)
}

fn read_jsonl(path: &Path) -> Result<Vec<(String, AttributeMap)>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&line)?;
        let key = match fields.remove(KEY_FIELD) {
            Some(serde_json::Value::String(key)) => key,
            Some(other) => {
                return Err(CoreError::Import(format!(
                    "'{KEY_FIELD}' field must be a string, got {other}"
                )));
            }
            None => {
                return Err(CoreError::Import(format!(
                    "record without a '{KEY_FIELD}' field"
                )));
            }
        };
        records.push((key, json_to_record(&fields)?));
    }
    Ok(records)
}

fn json_to_record(fields: &serde_json::Map<String, serde_json::Value>) -> Result<AttributeMap> {
    let mut map = AttributeMap::new();
    for (name, value) in fields {
        if let Some(value) = Value::from_json(value)? {
            map.insert(name.clone(), value);
        }
    }
    Ok(map)
}
