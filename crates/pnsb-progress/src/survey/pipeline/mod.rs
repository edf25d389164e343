//! Municipality pipeline: the static 25-state taxonomy, the legacy visit
//! status table and the bucketing over it.

mod bucketer;
mod legacy;
mod taxonomy;

pub use bucketer::{
    bucket_all, bucket_municipality, classify_visits, PhaseCount, PipelineBuckets,
    PipelineClassification, PipelineSummary, StateCount, TriageEntry, NEEDS_TRIAGE,
};
pub use legacy::{contact_outcome_for_label, state_for_label, ContactOutcome, LegacyVisitStatus};
pub use taxonomy::{PipelinePhase, PipelineState, PipelineStateView};
