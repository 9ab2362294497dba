pub mod rules;

use crate::regions::{CONSTRUCTION_AGE_BAND, TENURE, WINDOWS_DESCRIPTION};
use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{ArrayRef, StringArray},
    record_batch::RecordBatch,
};
use once_cell::sync::Lazy;
use regex::Regex;
use self::rules::{FieldCleaner, Rule};
use std::sync::Arc;
use tracing::debug;

/// Fallback for window descriptions outside the controlled vocabulary.
pub const OTHER: &str = "other";
/// Fallback for tenure and for unusable construction age bands.
pub const UNKNOWN: &str = "unknown";

pub const WINDOW_TYPES: &[&str] = &[
    "full double glazing",
    "high performance glazing",
    "mixed glazing",
    "single glazing",
    "full triple glazing",
    "full secondary glazing",
];

pub const TENURE_TYPES: &[&str] = &["rented (social)", "owner-occupied", "rented (private)"];

pub static WINDOWS_CLEANER: Lazy<FieldCleaner> = Lazy::new(|| {
    FieldCleaner::new(
        WINDOWS_DESCRIPTION,
        vec![
            Rule::StripPrefix {
                prefix: "description: ",
            },
            Rule::Replace {
                from: "glazed",
                to: "glazing",
            },
            Rule::Replace {
                from: "fully",
                to: "full",
            },
            Rule::Replace {
                from: "partial",
                to: "multiple",
            },
            Rule::Replace {
                from: "mostly",
                to: "multiple",
            },
            Rule::Replace {
                from: "some",
                to: "multiple",
            },
            // must run after the substitutions above so "partial"/"mostly"/
            // "some" variants are caught by the substring check
            Rule::CollapseContains {
                needle: "multiple",
                to: "mixed glazing",
            },
        ],
    )
    .with_vocabulary(WINDOW_TYPES, OTHER)
});

pub static TENURE_CLEANER: Lazy<FieldCleaner> = Lazy::new(|| {
    FieldCleaner::new(
        TENURE,
        vec![Rule::Replace {
            from: "rental",
            to: "rented",
        }],
    )
    .with_vocabulary(TENURE_TYPES, UNKNOWN)
});

pub static AGE_BAND_CLEANER: Lazy<FieldCleaner> = Lazy::new(|| {
    FieldCleaner::new(
        CONSTRUCTION_AGE_BAND,
        vec![
            Rule::StripPrefix {
                prefix: "england and wales: ",
            },
            Rule::Replace {
                from: "no data!",
                to: UNKNOWN,
            },
            Rule::Replace {
                from: "invalid!",
                to: UNKNOWN,
            },
            Rule::CollapseMatching {
                pattern: Regex::new(r"\b(200[7-9]|20[1-9][0-9])\b").expect("year band pattern"),
                to: "2007 onwards",
            },
            // only out-of-range bare years survive to here; in-range ones
            // were already rewritten to "2007 onwards"
            Rule::CollapseMatching {
                pattern: Regex::new(r"^\d{4}$").expect("bare year pattern"),
                to: UNKNOWN,
            },
        ],
    )
});

/// Normalize the three free-text categorical columns of a regional batch.
pub fn clean_categoricals(batch: &RecordBatch) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    for cleaner in [&*WINDOWS_CLEANER, &*TENURE_CLEANER, &*AGE_BAND_CLEANER] {
        let index = batch
            .schema()
            .index_of(cleaner.column())
            .with_context(|| format!("column {} missing before cleaning", cleaner.column()))?;
        let values = columns[index]
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| anyhow!("column {} is not a string column", cleaner.column()))?;
        columns[index] = Arc::new(cleaner.clean_column(values)) as ArrayRef;
        debug!(column = cleaner.column(), "normalized categorical column");
    }
    RecordBatch::try_new(batch.schema(), columns).map_err(Into::into)
}
