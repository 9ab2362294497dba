use thiserror::Error;

/// Fatal pipeline failures. Everything below these thresholds is tolerated
/// (rows silently dropped, values sent to a fallback category) and surfaced
/// through logging only.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Too many postcodes in a regional dataset failed to resolve to an
    /// LSOA code for the join to be trusted.
    #[error("{pct:.2}% of {dataset} postcodes do not match to an LSOA", pct = .unmatched_fraction * 100.0)]
    DataQuality {
        dataset: String,
        unmatched_fraction: f64,
    },

    /// The cleaned regional datasets no longer share an identical column
    /// set, so concatenating them would misalign fields.
    #[error(
        "schema mismatch between regional datasets: [{}] missing from one side, [{}] from the other",
        .left_only.join(", "),
        .right_only.join(", ")
    )]
    SchemaMismatch {
        left_only: Vec<String>,
        right_only: Vec<String>,
    },
}
