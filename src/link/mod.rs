use crate::error::PipelineError;
use crate::lookup::PostcodeLookup;
use crate::regions::{LSOA_CODE, POSTCODE};
use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, ArrayRef, BooleanArray, StringArray},
    compute::filter_record_batch,
    datatypes::{DataType, Field, FieldRef, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Largest tolerable share of rows whose postcode has no LSOA entry. At or
/// above this the join cannot be trusted and the run is aborted.
pub const MAX_UNMATCHED_FRACTION: f64 = 0.01;

/// Resolve a regional batch's postcodes to LSOA codes, gate on the unmatched
/// fraction, drop the rows that failed to resolve, and drop the named key
/// columns that the LSOA code supersedes.
#[instrument(level = "info", skip_all, fields(dataset = %name))]
pub fn link_to_areas(
    name: &str,
    batch: &RecordBatch,
    lookup: &PostcodeLookup,
    drop: &[&str],
) -> Result<RecordBatch> {
    let index = batch
        .schema()
        .index_of(POSTCODE)
        .with_context(|| format!("{name} dataset has no {POSTCODE} column"))?;
    let postcodes = batch
        .column(index)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("{POSTCODE} is not a string column in the {name} dataset"))?;

    let resolved = lookup.resolve_column(postcodes);
    let total = batch.num_rows();
    let unmatched = resolved.null_count();
    let unmatched_fraction = if total == 0 {
        0.0
    } else {
        unmatched as f64 / total as f64
    };
    if unmatched_fraction >= MAX_UNMATCHED_FRACTION {
        return Err(PipelineError::DataQuality {
            dataset: name.to_string(),
            unmatched_fraction,
        }
        .into());
    }
    if unmatched > 0 {
        warn!(unmatched, total, "dropping rows with unresolved postcodes");
    }

    let keep: Vec<bool> = (0..total).map(|i| resolved.is_valid(i)).collect();

    let mut fields: Vec<FieldRef> = batch.schema().fields().iter().cloned().collect();
    fields.push(Arc::new(Field::new(LSOA_CODE, DataType::Utf8, true)));
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    columns.push(Arc::new(resolved));
    let joined = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
    let linked = filter_record_batch(&joined, &BooleanArray::from(keep))
        .context("filtering unresolved rows")?;

    // the key columns are redundant once every row carries an LSOA code
    let schema = linked.schema();
    let keep_indices: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, field)| !drop.contains(&field.name().as_str()))
        .map(|(i, _)| i)
        .collect();
    let out = linked.project(&keep_indices)?;

    info!(
        rows_in = total,
        rows_out = out.num_rows(),
        "linked dataset to LSOA codes"
    );
    Ok(out)
}
