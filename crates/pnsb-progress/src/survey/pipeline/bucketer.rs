use std::collections::BTreeMap;

use serde::Serialize;

use super::legacy::state_for_label;
use super::taxonomy::{PipelinePhase, PipelineState};
use crate::survey::domain::Visit;

/// Where a municipality lands in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineClassification {
    State { state: PipelineState },
    /// Latest visit carries a status the lookup table does not know.
    NeedsTriage { label: String },
}

impl PipelineClassification {
    pub fn state(&self) -> Option<PipelineState> {
        match self {
            Self::State { state } => Some(*state),
            Self::NeedsTriage { .. } => None,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::State { state } => state.id(),
            Self::NeedsTriage { .. } => NEEDS_TRIAGE,
        }
    }
}

pub const NEEDS_TRIAGE: &str = "needs_triage";

/// Classify from the visits of one municipality.
///
/// The most recent dated visit decides; ties and undated visits fall back
/// to list order with the last one winning.
pub fn classify_visits(visits: &[&Visit]) -> PipelineClassification {
    let latest = visits
        .iter()
        .enumerate()
        .max_by_key(|(index, visit)| (visit.date, *index))
        .map(|(_, visit)| *visit);

    let Some(visit) = latest else {
        return PipelineClassification::State {
            state: PipelineState::SemVisita,
        };
    };

    match state_for_label(&visit.status) {
        Some(state) => PipelineClassification::State { state },
        None => PipelineClassification::NeedsTriage {
            label: visit.status.clone(),
        },
    }
}

pub fn bucket_municipality(municipality: &str, visits: &[Visit]) -> PipelineClassification {
    let own: Vec<&Visit> = visits.iter().filter(|v| v.belongs_to(municipality)).collect();
    classify_visits(&own)
}

/// Partition every municipality into exactly one bucket.
pub fn bucket_all<S: AsRef<str>>(municipalities: &[S], visits: &[Visit]) -> PipelineBuckets {
    let mut buckets = PipelineBuckets::empty();
    for municipality in municipalities {
        let name = municipality.as_ref();
        buckets.insert(name, bucket_municipality(name, visits));
    }
    buckets
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriageEntry {
    pub municipality: String,
    pub label: String,
}

/// All 25 states are always present, empty or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineBuckets {
    pub states: BTreeMap<PipelineState, Vec<String>>,
    pub needs_triage: Vec<TriageEntry>,
}

impl PipelineBuckets {
    pub fn empty() -> Self {
        Self {
            states: PipelineState::ALL
                .into_iter()
                .map(|state| (state, Vec::new()))
                .collect(),
            needs_triage: Vec::new(),
        }
    }

    pub fn insert(&mut self, municipality: &str, classification: PipelineClassification) {
        match classification {
            PipelineClassification::State { state } => self
                .states
                .entry(state)
                .or_default()
                .push(municipality.to_string()),
            PipelineClassification::NeedsTriage { label } => self.needs_triage.push(TriageEntry {
                municipality: municipality.to_string(),
                label,
            }),
        }
    }

    pub fn members(&self, state: PipelineState) -> &[String] {
        self.states.get(&state).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, state: PipelineState) -> usize {
        self.members(state).len()
    }

    pub fn total(&self) -> usize {
        self.states.values().map(Vec::len).sum::<usize>() + self.needs_triage.len()
    }

    pub fn summary(&self) -> PipelineSummary {
        let states = PipelineState::ALL
            .into_iter()
            .map(|state| StateCount {
                id: state.id(),
                name: state.name(),
                color: state.color(),
                phase: state.phase().id(),
                count: self.count(state),
            })
            .collect();

        let phases = PipelinePhase::ordered()
            .into_iter()
            .map(|phase| PhaseCount {
                id: phase.id(),
                label: phase.label(),
                count: phase.states().map(|state| self.count(state)).sum(),
            })
            .collect();

        PipelineSummary {
            states,
            phases,
            in_progress: PipelineState::IN_FLIGHT
                .into_iter()
                .map(|state| self.count(state))
                .sum(),
            finalized: self.count(PipelineState::Finalizada),
            needs_triage: self.needs_triage.len(),
            total: self.total(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateCount {
    pub id: &'static str,
    pub name: &'static str,
    pub color: &'static str,
    pub phase: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseCount {
    pub id: &'static str,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub states: Vec<StateCount>,
    pub phases: Vec<PhaseCount>,
    pub in_progress: usize,
    pub finalized: usize,
    pub needs_triage: usize,
    pub total: usize,
}
