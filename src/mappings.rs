use crate::error::{EtlError, Result};
use crate::table::Table;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Country-name to 2-letter-code lookup, keyed by trimmed lowercase name.
///
/// Loaded once at pipeline start and passed by reference into the name
/// normalizer; read-only for the lifetime of a run.
#[derive(Debug, Clone, Default)]
pub struct CountryMapping {
    entries: HashMap<String, String>,
}

impl CountryMapping {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        Self { entries }
    }

    /// Load the country mapping YAML. A missing file is a configuration
    /// error: the weather enricher cannot resolve any pair without it.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "country mapping file not found at '{}': {}",
                path.display(),
                e
            ))
        })?;
        let parsed: HashMap<String, String> = serde_yaml::from_str(&raw)?;
        let mapping = Self::from_pairs(parsed);
        info!("Loaded country codes for {} countries", mapping.len());
        Ok(mapping)
    }

    pub fn get(&self, lowercase_key: &str) -> Option<&str> {
        self.entries.get(lowercase_key).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct CityMappingFile {
    #[serde(default)]
    city_name_mapping: HashMap<String, String>,
}

/// City-name to canonical API-facing spelling lookup. Optional: an empty
/// mapping is valid and simply means every city falls back to
/// transliteration.
#[derive(Debug, Clone, Default)]
pub struct CityMapping {
    entries: HashMap<String, String>,
}

impl CityMapping {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        Self { entries }
    }

    /// Load the city mapping YAML, degrading to an empty mapping with a
    /// warning when the file is absent.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "City mapping file not found at '{}', proceeding without it",
                path.display()
            );
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let parsed: CityMappingFile = serde_yaml::from_str(&raw)?;
        let mapping = Self::from_pairs(parsed.city_name_mapping);
        info!("Loaded city mappings for {} cities", mapping.len());
        Ok(mapping)
    }

    pub fn get(&self, lowercase_key: &str) -> Option<&str> {
        self.entries.get(lowercase_key).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Load the region mapping spreadsheet (CSV export, one row per country,
/// arbitrary region-label columns) into a table. Empty cells become nulls.
pub fn load_region_mapping(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Err(EtlError::Config(format!(
            "region mapping file not found at '{}'",
            path.display()
        )));
    }
    info!("Loading region mapping from {}", path.display());
    let mut reader = csv::Reader::from_path(path)?;
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut table = Table::new(columns);
    for record in reader.records() {
        let record = record?;
        let cells: Vec<Value> = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    Value::Null
                } else {
                    Value::String(field.to_string())
                }
            })
            .collect();
        table.push_row(cells)?;
    }
    Ok(table)
}
