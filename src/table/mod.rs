use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Builder, StringArray},
    csv::{ReaderBuilder, WriterBuilder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    sync::Arc,
};
use tracing::debug;

const BATCH_SIZE: usize = 8192;

/// One column the pipeline wants out of an input file: its header name and
/// the type it should end up as. Anything not `Utf8` is parsed from the raw
/// string form after reading.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub data_type: DataType,
}

impl ColumnSpec {
    pub fn utf8(name: &'static str) -> Self {
        Self {
            name,
            data_type: DataType::Utf8,
        }
    }

    pub fn float64(name: &'static str) -> Self {
        Self {
            name,
            data_type: DataType::Float64,
        }
    }
}

/// Trim whitespace + strip outer quotes if present.
fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

fn read_header(path: &Path) -> Result<Vec<String>> {
    let file =
        File::open(path).with_context(|| format!("opening {} for header", path.display()))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .with_context(|| format!("reading header of {}", path.display()))?;
    if line.trim().is_empty() {
        bail!("{} has no header row", path.display());
    }
    Ok(line
        .trim_end_matches(['\r', '\n'])
        .split(',')
        .map(clean_str)
        .collect())
}

/// Read the named columns of a CSV file into a `RecordBatch`, in the order
/// the specs are given. The whole file is decoded as nullable strings first;
/// `Float64` columns are then parsed cell-by-cell, with unparseable or empty
/// cells becoming null.
pub fn read_columns(path: &Path, specs: &[ColumnSpec]) -> Result<RecordBatch> {
    let headers = read_header(path)?;
    let raw_fields: Vec<Field> = headers
        .iter()
        .map(|name| Field::new(name, DataType::Utf8, true))
        .collect();
    let raw_schema = Arc::new(Schema::new(raw_fields));

    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = ReaderBuilder::new(raw_schema.clone())
        .with_header(true)
        .with_batch_size(BATCH_SIZE)
        .build(file)
        .with_context(|| format!("creating CSV reader for {}", path.display()))?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch.with_context(|| format!("reading CSV batch from {}", path.display()))?);
    }
    let raw = if batches.is_empty() {
        RecordBatch::new_empty(raw_schema.clone())
    } else {
        arrow::compute::concat_batches(&raw_schema, &batches)
            .with_context(|| format!("concatenating CSV batches from {}", path.display()))?
    };
    debug!(rows = raw.num_rows(), columns = raw.num_columns(), "decoded raw CSV");

    let indices = specs
        .iter()
        .map(|spec| {
            raw_schema
                .index_of(spec.name)
                .map_err(|_| anyhow!("column {} missing from {}", spec.name, path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    let projected = raw
        .project(&indices)
        .context("projecting requested columns")?;

    let mut fields = Vec::with_capacity(specs.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(specs.len());
    for (i, spec) in specs.iter().enumerate() {
        let column = projected.column(i);
        match spec.data_type {
            DataType::Float64 => {
                let strings = column
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| anyhow!("column {} did not decode as strings", spec.name))?;
                let mut builder = Float64Builder::with_capacity(strings.len());
                for value in strings.iter() {
                    builder.append_option(value.and_then(|s| clean_str(s).parse::<f64>().ok()));
                }
                columns.push(Arc::new(builder.finish()) as ArrayRef);
            }
            _ => columns.push(column.clone()),
        }
        fields.push(Field::new(spec.name, spec.data_type.clone(), true));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).map_err(Into::into)
}

/// Write a batch out as CSV with a header row; nulls become empty cells.
pub fn write_csv<P: AsRef<Path>>(batch: &RecordBatch, path: P) -> Result<()> {
    let file = File::create(path.as_ref())
        .with_context(|| format!("creating {}", path.as_ref().display()))?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer
        .write(batch)
        .with_context(|| format!("writing {}", path.as_ref().display()))
}
