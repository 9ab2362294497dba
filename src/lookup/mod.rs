use anyhow::{Context, Result};
use arrow::array::StringArray;
use serde::Deserialize;
use std::{collections::HashMap, path::Path};
use tracing::{info, instrument, warn};

#[derive(Debug, Deserialize)]
struct MappingRow {
    #[serde(rename = "POSTCODE")]
    postcode: String,
    #[serde(rename = "LSOA_CODE")]
    lsoa_code: String,
}

/// The ONS postcode → LSOA reference table. Postcodes are unique keys and
/// resolution is exact-match string equality; no fuzzy matching and no
/// normalization of spacing or case.
pub struct PostcodeLookup {
    areas: HashMap<String, String>,
}

impl PostcodeLookup {
    #[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())
            .with_context(|| format!("opening postcode lookup {}", path.as_ref().display()))?;

        let mut areas = HashMap::new();
        for row in reader.deserialize::<MappingRow>() {
            let MappingRow {
                postcode,
                lsoa_code,
            } = row.context("reading postcode lookup row")?;
            if let Some(previous) = areas.get(&postcode) {
                if previous != &lsoa_code {
                    warn!(%postcode, "duplicate postcode in lookup, keeping the last area code");
                }
            }
            areas.insert(postcode, lsoa_code);
        }
        info!(postcodes = areas.len(), "loaded postcode lookup");

        Ok(Self { areas })
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            areas: pairs.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn resolve(&self, postcode: &str) -> Option<&str> {
        self.areas.get(postcode).map(String::as_str)
    }

    /// Resolve a whole postcode column; unmatched or missing postcodes come
    /// back null.
    pub fn resolve_column(&self, postcodes: &StringArray) -> StringArray {
        postcodes
            .iter()
            .map(|postcode| postcode.and_then(|p| self.resolve(p)))
            .collect()
    }
}
