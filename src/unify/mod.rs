use crate::error::PipelineError;
use crate::regions::{
    CURRENT_ENERGY_EFFICIENCY, ENERGY_CONSUMPTION_CURRENT, ENERGY_CONSUMPTION_POTENTIAL,
    ENVIRONMENT_IMPACT_CURRENT, ENVIRONMENT_IMPACT_POTENTIAL, LSOA_CODE,
    POTENTIAL_ENERGY_EFFICIENCY,
};
use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Array, Float64Builder},
    compute::concat_batches,
    datatypes::{DataType, Field, FieldRef, Schema},
    record_batch::RecordBatch,
};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{info, instrument};

pub const ENERGY_CONSUMPTION_GAP: &str = "ENERGY_CONSUMPTION_GAP";
pub const ENERGY_EFFICIENCY_GAP: &str = "ENERGY_EFFICIENCY_GAP";
pub const ENVIRONMENT_IMPACT_GAP: &str = "ENVIRONMENT_IMPACT_GAP";

/// Concatenate the two cleaned regional batches into the unified dataset:
/// LSOA code first, every row kept, the three gap columns appended last.
#[instrument(level = "info", skip(left, right))]
pub fn unify(left: &RecordBatch, right: &RecordBatch) -> Result<RecordBatch> {
    check_matching_columns(left, right)?;
    let right_aligned = align_columns(right, &left.schema())?;
    let combined = concat_batches(&left.schema(), [left, &right_aligned])
        .context("concatenating regional datasets")?;
    let combined = area_code_first(&combined)?;
    let combined = append_gap_columns(&combined)?;
    info!(
        rows = combined.num_rows(),
        columns = combined.num_columns(),
        "unified regional datasets"
    );
    Ok(combined)
}

/// The schemas must agree as column *sets*; order is aligned afterwards.
fn check_matching_columns(left: &RecordBatch, right: &RecordBatch) -> Result<()> {
    let (left_schema, right_schema) = (left.schema(), right.schema());
    let left_names: BTreeSet<&str> = left_schema.fields().iter().map(|f| f.name().as_str()).collect();
    let right_names: BTreeSet<&str> =
        right_schema.fields().iter().map(|f| f.name().as_str()).collect();
    if left_names == right_names {
        return Ok(());
    }
    Err(PipelineError::SchemaMismatch {
        left_only: left_names
            .difference(&right_names)
            .map(|n| n.to_string())
            .collect(),
        right_only: right_names
            .difference(&left_names)
            .map(|n| n.to_string())
            .collect(),
    }
    .into())
}

fn align_columns(batch: &RecordBatch, target: &Schema) -> Result<RecordBatch> {
    let schema = batch.schema();
    let indices = target
        .fields()
        .iter()
        .map(|field| schema.index_of(field.name()))
        .collect::<Result<Vec<_>, _>>()
        .context("aligning regional column order")?;
    batch.project(&indices).map_err(Into::into)
}

fn area_code_first(batch: &RecordBatch) -> Result<RecordBatch> {
    let lsoa = batch
        .schema()
        .index_of(LSOA_CODE)
        .context("unified dataset has no LSOA_CODE column")?;
    let mut indices = vec![lsoa];
    indices.extend((0..batch.num_columns()).filter(|&i| i != lsoa));
    batch.project(&indices).map_err(Into::into)
}

/// Current-versus-potential differences; a missing operand leaves the gap
/// missing.
fn append_gap_columns(batch: &RecordBatch) -> Result<RecordBatch> {
    let gaps = [
        (
            ENERGY_CONSUMPTION_GAP,
            ENERGY_CONSUMPTION_CURRENT,
            ENERGY_CONSUMPTION_POTENTIAL,
        ),
        (
            ENERGY_EFFICIENCY_GAP,
            POTENTIAL_ENERGY_EFFICIENCY,
            CURRENT_ENERGY_EFFICIENCY,
        ),
        (
            ENVIRONMENT_IMPACT_GAP,
            ENVIRONMENT_IMPACT_POTENTIAL,
            ENVIRONMENT_IMPACT_CURRENT,
        ),
    ];

    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    for (name, minuend, subtrahend) in gaps {
        let gap = difference(batch, minuend, subtrahend)?;
        fields.push(Arc::new(Field::new(name, DataType::Float64, true)));
        columns.push(Arc::new(gap) as ArrayRef);
    }
    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).map_err(Into::into)
}

fn difference(batch: &RecordBatch, minuend: &str, subtrahend: &str) -> Result<Float64Array> {
    let a = float_column(batch, minuend)?;
    let b = float_column(batch, subtrahend)?;
    let mut builder = Float64Builder::with_capacity(a.len());
    for i in 0..a.len() {
        if a.is_valid(i) && b.is_valid(i) {
            builder.append_value(a.value(i) - b.value(i));
        } else {
            builder.append_null();
        }
    }
    Ok(builder.finish())
}

fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    let index = batch
        .schema()
        .index_of(name)
        .with_context(|| format!("missing numeric column {name}"))?;
    batch
        .column(index)
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| anyhow!("column {name} is not a Float64 column"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::StringArray;

    /// Smallest regional shape the unifier accepts: the LSOA code plus the
    /// six numeric columns the gaps are derived from.
    fn regional_batch(
        lsoa: Vec<&str>,
        consumption: Vec<(Option<f64>, Option<f64>)>,
        efficiency: Vec<(f64, f64)>,
        impact: Vec<(f64, f64)>,
    ) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new(ENERGY_CONSUMPTION_CURRENT, DataType::Float64, true),
            Field::new(ENERGY_CONSUMPTION_POTENTIAL, DataType::Float64, true),
            Field::new(CURRENT_ENERGY_EFFICIENCY, DataType::Float64, true),
            Field::new(POTENTIAL_ENERGY_EFFICIENCY, DataType::Float64, true),
            Field::new(ENVIRONMENT_IMPACT_CURRENT, DataType::Float64, true),
            Field::new(ENVIRONMENT_IMPACT_POTENTIAL, DataType::Float64, true),
            Field::new(LSOA_CODE, DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Float64Array::from(
                    consumption.iter().map(|c| c.0).collect::<Vec<_>>(),
                )) as ArrayRef,
                Arc::new(Float64Array::from(
                    consumption.iter().map(|c| c.1).collect::<Vec<_>>(),
                )) as ArrayRef,
                Arc::new(Float64Array::from(
                    efficiency.iter().map(|e| Some(e.0)).collect::<Vec<_>>(),
                )) as ArrayRef,
                Arc::new(Float64Array::from(
                    efficiency.iter().map(|e| Some(e.1)).collect::<Vec<_>>(),
                )) as ArrayRef,
                Arc::new(Float64Array::from(
                    impact.iter().map(|i| Some(i.0)).collect::<Vec<_>>(),
                )) as ArrayRef,
                Arc::new(Float64Array::from(
                    impact.iter().map(|i| Some(i.1)).collect::<Vec<_>>(),
                )) as ArrayRef,
                Arc::new(StringArray::from(lsoa)) as ArrayRef,
            ],
        )
        .unwrap()
    }

    fn single_row_batch() -> RecordBatch {
        regional_batch(
            vec!["E01005061"],
            vec![(Some(150.0), Some(90.0))],
            vec![(70.0, 85.0)],
            vec![(60.0, 80.0)],
        )
    }

    #[test]
    fn unified_output_leads_with_the_area_code_and_derives_gaps() -> Result<()> {
        let scotland = regional_batch(
            vec!["S01010232"],
            vec![(Some(120.0), Some(80.0))],
            vec![(65.0, 80.0)],
            vec![(55.0, 70.0)],
        );
        let england = single_row_batch();

        let unified = unify(&scotland, &england)?;

        assert_eq!(unified.num_rows(), 2);
        assert_eq!(unified.schema().field(0).name(), LSOA_CODE);

        let consumption_gap = float_column(&unified, ENERGY_CONSUMPTION_GAP)?;
        let efficiency_gap = float_column(&unified, ENERGY_EFFICIENCY_GAP)?;
        let impact_gap = float_column(&unified, ENVIRONMENT_IMPACT_GAP)?;
        // scotland row first, then england
        assert_eq!(consumption_gap.value(0), 40.0);
        assert_eq!(consumption_gap.value(1), 60.0);
        assert_eq!(efficiency_gap.value(1), 15.0);
        assert_eq!(impact_gap.value(1), 20.0);
        Ok(())
    }

    #[test]
    fn concatenation_is_row_count_additive() -> Result<()> {
        let left = regional_batch(
            vec!["S1", "S2", "S3"],
            vec![(Some(1.0), Some(1.0)); 3],
            vec![(1.0, 1.0); 3],
            vec![(1.0, 1.0); 3],
        );
        let right = regional_batch(
            vec!["E1", "E2"],
            vec![(Some(1.0), Some(1.0)); 2],
            vec![(1.0, 1.0); 2],
            vec![(1.0, 1.0); 2],
        );

        let unified = unify(&left, &right)?;
        assert_eq!(unified.num_rows(), left.num_rows() + right.num_rows());
        Ok(())
    }

    #[test]
    fn column_order_differences_are_tolerated() -> Result<()> {
        let left = single_row_batch();
        // same columns, shuffled: LSOA code first instead of last
        let right_schema = left.schema();
        let mut indices: Vec<usize> = (0..right_schema.fields().len()).collect();
        indices.rotate_right(1);
        let right = single_row_batch().project(&indices)?;

        let unified = unify(&left, &right)?;
        assert_eq!(unified.num_rows(), 2);

        let expected = unify(&left, &single_row_batch())?;
        assert_eq!(unified.schema(), expected.schema());
        Ok(())
    }

    #[test]
    fn differing_column_sets_are_a_schema_mismatch() {
        let left = single_row_batch();
        // drop a column from the right-hand side
        let right = single_row_batch().project(&[0, 1, 2, 3, 4, 6]).unwrap();

        let err = unify(&left, &right).unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::SchemaMismatch {
                left_only,
                right_only,
            }) => {
                assert_eq!(left_only, &[ENVIRONMENT_IMPACT_POTENTIAL.to_string()]);
                assert!(right_only.is_empty());
            }
            other => panic!("expected a schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn missing_operands_leave_the_gap_missing() -> Result<()> {
        let left = regional_batch(
            vec!["S1"],
            vec![(Some(100.0), None)],
            vec![(60.0, 75.0)],
            vec![(50.0, 65.0)],
        );
        let right = regional_batch(
            vec!["E1"],
            vec![(None, None)],
            vec![(60.0, 75.0)],
            vec![(50.0, 65.0)],
        );

        let unified = unify(&left, &right)?;
        let consumption_gap = float_column(&unified, ENERGY_CONSUMPTION_GAP)?;
        assert!(consumption_gap.is_null(0));
        assert!(consumption_gap.is_null(1));
        Ok(())
    }
}
