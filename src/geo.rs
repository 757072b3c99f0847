//! GeoNames gazetteer lookup.
//!
//! Loads a GeoNames dump (<http://download.geonames.org/export/dump/>)
//! into a country-code indexed map used to reverse-geocode place names
//! that carry no coordinates. A missing or malformed file yields an
//! empty gazetteer; reverse geocoding then simply never matches.

use std::collections::HashMap;
use std::path::Path;

use log::{info, warn};

use crate::schema::detect_delimiter_in;

/// Coordinates and id for one gazetteer entry.
#[derive(Debug, Clone)]
pub struct GeoEntry {
    pub latitude: String,
    pub longitude: String,
    pub geoname_id: String,
}

/// Place-name lookup indexed by country code, then lowercased name.
#[derive(Debug, Default)]
pub struct Gazetteer {
    by_country: HashMap<String, HashMap<String, GeoEntry>>,
}

impl Gazetteer {
    /// Load a gazetteer file. Any failure (absent file, unreadable rows)
    /// degrades to an empty gazetteer.
    pub fn load(path: Option<&Path>) -> Gazetteer {
        let mut gazetteer = Gazetteer::default();
        let Some(path) = path else {
            return gazetteer;
        };
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("unable to read gazetteer {}: {e}", path.display());
                return gazetteer;
            }
        };
        let delimiter = raw
            .lines()
            .next()
            .and_then(detect_delimiter_in)
            .unwrap_or(b'\t');
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(raw.as_bytes());
        for record in reader.records() {
            let Ok(record) = record else { continue };
            // GeoNames columns: 0 id, 1 name, 4 latitude, 5 longitude,
            // 8 country code.
            let (Some(id), Some(name), Some(lat), Some(lon), Some(cc)) = (
                record.get(0),
                record.get(1),
                record.get(4),
                record.get(5),
                record.get(8),
            ) else {
                continue;
            };
            gazetteer
                .by_country
                .entry(cc.to_string())
                .or_default()
                .insert(
                    name.to_lowercase(),
                    GeoEntry {
                        latitude: lat.to_string(),
                        longitude: lon.to_string(),
                        geoname_id: id.to_string(),
                    },
                );
        }
        let countries = gazetteer.by_country.len();
        if countries > 0 {
            info!(
                "loaded {countries} gazetteer{}",
                if countries > 1 { "s" } else { "" }
            );
        }
        gazetteer
    }

    /// Look up a normalized place name under a country code. Returns
    /// latitude, longitude and the "Approximate (ID …)" label used in
    /// the locations output.
    pub fn lookup(&self, place: &str, country_code: &str) -> Option<(String, String, String)> {
        let entry = self.by_country.get(country_code)?.get(place)?;
        Some((
            entry.latitude.clone(),
            entry.longitude.clone(),
            format!("Approximate (ID {})", entry.geoname_id),
        ))
    }

    pub fn is_empty(&self) -> bool {
        self.by_country.is_empty()
    }
}
