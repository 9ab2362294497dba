use crate::table::{self, ColumnSpec};
use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{ArrayRef, StringArray},
    record_batch::RecordBatch,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{path::Path, sync::Arc};
use tracing::{info, instrument};

pub const POSTCODE: &str = "POSTCODE";
pub const DATA_ZONE: &str = "DATA_ZONE";
pub const LSOA_CODE: &str = "LSOA_CODE";
pub const LOCAL_AUTHORITY_LABEL: &str = "LOCAL_AUTHORITY_LABEL";
pub const ENERGY_CONSUMPTION_CURRENT: &str = "ENERGY_CONSUMPTION_CURRENT";
pub const ENERGY_CONSUMPTION_POTENTIAL: &str = "ENERGY_CONSUMPTION_POTENTIAL";
pub const CURRENT_ENERGY_RATING: &str = "CURRENT_ENERGY_RATING";
pub const POTENTIAL_ENERGY_RATING: &str = "POTENTIAL_ENERGY_RATING";
pub const CURRENT_ENERGY_EFFICIENCY: &str = "CURRENT_ENERGY_EFFICIENCY";
pub const POTENTIAL_ENERGY_EFFICIENCY: &str = "POTENTIAL_ENERGY_EFFICIENCY";
pub const ENVIRONMENT_IMPACT_CURRENT: &str = "ENVIRONMENT_IMPACT_CURRENT";
pub const ENVIRONMENT_IMPACT_POTENTIAL: &str = "ENVIRONMENT_IMPACT_POTENTIAL";
pub const TOTAL_FLOOR_AREA: &str = "TOTAL_FLOOR_AREA";
pub const WINDOWS_DESCRIPTION: &str = "WINDOWS_DESCRIPTION";
pub const CONSTRUCTION_AGE_BAND: &str = "CONSTRUCTION_AGE_BAND";
pub const TENURE: &str = "TENURE";
pub const BUILT_FORM: &str = "BUILT_FORM";
pub const PROPERTY_TYPE: &str = "PROPERTY_TYPE";

/// Scottish data zones arrive as `"S01006506 (Culter)"`; only the bare code
/// is kept.
static DATA_ZONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(S\d+)\s\(.+\)$").expect("data zone pattern"));

/// The common schema both regions are reduced to, minus the leading
/// geographic key columns.
fn shared_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::utf8(LOCAL_AUTHORITY_LABEL),
        ColumnSpec::float64(ENERGY_CONSUMPTION_CURRENT),
        ColumnSpec::float64(ENERGY_CONSUMPTION_POTENTIAL),
        ColumnSpec::utf8(CURRENT_ENERGY_RATING),
        ColumnSpec::utf8(POTENTIAL_ENERGY_RATING),
        ColumnSpec::float64(CURRENT_ENERGY_EFFICIENCY),
        ColumnSpec::float64(POTENTIAL_ENERGY_EFFICIENCY),
        ColumnSpec::float64(ENVIRONMENT_IMPACT_CURRENT),
        ColumnSpec::float64(ENVIRONMENT_IMPACT_POTENTIAL),
        ColumnSpec::float64(TOTAL_FLOOR_AREA),
        ColumnSpec::utf8(WINDOWS_DESCRIPTION),
        ColumnSpec::utf8(CONSTRUCTION_AGE_BAND),
        ColumnSpec::utf8(TENURE),
        ColumnSpec::utf8(BUILT_FORM),
        ColumnSpec::utf8(PROPERTY_TYPE),
    ]
}

pub fn england_columns() -> Vec<ColumnSpec> {
    let mut columns = vec![ColumnSpec::utf8(POSTCODE)];
    columns.extend(shared_columns());
    columns
}

pub fn scotland_columns() -> Vec<ColumnSpec> {
    let mut columns = vec![ColumnSpec::utf8(POSTCODE), ColumnSpec::utf8(DATA_ZONE)];
    columns.extend(shared_columns());
    columns
}

#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_england<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    let batch = table::read_columns(path.as_ref(), &england_columns())?;
    info!(rows = batch.num_rows(), "loaded Manchester EPC records");
    Ok(batch)
}

#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_scotland<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    let batch = table::read_columns(path.as_ref(), &scotland_columns())?;
    let batch = extract_data_zone(&batch)?;
    info!(rows = batch.num_rows(), "loaded Scottish EPC records");
    Ok(batch)
}

/// Reduce the raw `DATA_ZONE` labels to bare codes; values that do not fit
/// the `"CODE (Name)"` shape become null. The column is discarded after the
/// LSOA join anyway, since Scottish data zones and ONS LSOA codes are not
/// drawn from the same coding scheme.
fn extract_data_zone(batch: &RecordBatch) -> Result<RecordBatch> {
    let index = batch
        .schema()
        .index_of(DATA_ZONE)
        .context("Scottish dataset has no DATA_ZONE column")?;
    let raw = batch
        .column(index)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("{DATA_ZONE} is not a string column"))?;

    let extracted: StringArray = raw
        .iter()
        .map(|value| {
            value.and_then(|v| {
                DATA_ZONE_PATTERN
                    .captures(v)
                    .and_then(|captures| captures.get(1))
                    .map(|code| code.as_str())
            })
        })
        .collect();

    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    columns[index] = Arc::new(extracted);
    RecordBatch::try_new(batch.schema(), columns).map_err(Into::into)
}
