//! Static catalog of bookable service offices.
//!
//! The catalog is loaded once at process start, either from the built-in
//! YAML document or from an override file, and is never mutated afterwards.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const BUILTIN_CATALOG: &str = include_str!("../../../config/locations.yaml");

/// A service office searched for open appointments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub city: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LocationsFile {
    pub locations: Vec<Location>,
}

/// Parse and validate the catalog compiled into the binary.
///
/// # Errors
///
/// Returns `ConfigError` if the embedded document fails to parse or validate.
pub fn builtin_catalog() -> Result<Vec<Location>, ConfigError> {
    parse_catalog(BUILTIN_CATALOG)
}

/// Load and validate a location catalog from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_catalog(path: &Path) -> Result<Vec<Location>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LocationsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_catalog(&content)
}

fn parse_catalog(content: &str) -> Result<Vec<Location>, ConfigError> {
    let file: LocationsFile = serde_yaml::from_str(content)?;
    validate_locations(&file.locations)?;
    Ok(file.locations)
}

fn validate_locations(locations: &[Location]) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();

    for location in locations {
        if location.city.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "location {} has an empty city",
                location.id
            )));
        }

        if location.display_name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "location {} has an empty display name",
                location.id
            )));
        }

        if !seen_ids.insert(location.id) {
            return Err(ConfigError::Validation(format!(
                "duplicate location id: {}",
                location.id
            )));
        }
    }

    Ok(())
}

/// Keep the catalog entries whose city is one of `cities`.
///
/// Catalog order is preserved because it is the order the worker searches in.
/// City names are compared case-insensitively after trimming.
#[must_use]
pub fn filter_by_cities(catalog: &[Location], cities: &BTreeSet<String>) -> Vec<Location> {
    let wanted: HashSet<String> = cities.iter().map(|c| normalize_city(c)).collect();
    catalog
        .iter()
        .filter(|location| wanted.contains(&normalize_city(&location.city)))
        .cloned()
        .collect()
}

fn normalize_city(city: &str) -> String {
    city.trim().to_lowercase()
}

#[cfg(test)]
#[path = "locations_test.rs"]
mod tests;
