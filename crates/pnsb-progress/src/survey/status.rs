//! Per-municipality status classification and progress percentages.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::domain::{Entity, Track, Visit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MunicipalityStatus {
    NoVisit,
    InProgress,
    Done,
}

impl MunicipalityStatus {
    pub const fn ordered() -> [Self; 3] {
        [Self::NoVisit, Self::InProgress, Self::Done]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::NoVisit => "Sem visita",
            Self::InProgress => "Em andamento",
            Self::Done => "Concluído",
        }
    }
}

/// Status and integer progress percentages for one municipality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MunicipalityProgress {
    pub status: MunicipalityStatus,
    pub progress_mrs: u8,
    pub progress_map: u8,
    pub progress_p1: u8,
    pub last_visit: Option<NaiveDateTime>,
}

impl MunicipalityProgress {
    pub fn empty() -> Self {
        Self {
            status: MunicipalityStatus::NoVisit,
            progress_mrs: 0,
            progress_map: 0,
            progress_p1: 0,
            last_visit: None,
        }
    }
}

/// Classify a municipality from its own entities and visits only.
///
/// Visits never change the status; they only contribute `last_visit`.
pub fn resolve_status(entities: &[&Entity], visits: &[&Visit]) -> MunicipalityProgress {
    let p1: Vec<&Entity> = entities.iter().copied().filter(|e| e.is_p1()).collect();
    let p1_validated = p1.iter().filter(|e| e.fully_validated()).count();

    let status = if !p1.is_empty() && p1_validated == p1.len() {
        MunicipalityStatus::Done
    } else if p1.iter().any(|e| e.any_started()) {
        MunicipalityStatus::InProgress
    } else {
        MunicipalityStatus::NoVisit
    };

    MunicipalityProgress {
        status,
        progress_mrs: track_progress(entities, Track::Mrs),
        progress_map: track_progress(entities, Track::Map),
        progress_p1: percent(p1_validated, p1.len()),
        last_visit: visits.iter().filter_map(|visit| visit.date).max(),
    }
}

fn track_progress(entities: &[&Entity], track: Track) -> u8 {
    let obligated: Vec<&&Entity> = entities.iter().filter(|e| e.required_for(track)).collect();
    let validated = obligated
        .iter()
        .filter(|e| e.status_for(track).is_validated())
        .count();
    percent(validated, obligated.len())
}

/// `part / total * 100` rounded half-up; 0 when `total` is 0.
pub fn percent(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let part = part.min(total) as u64;
    let total = total as u64;
    ((part * 200 + total) / (total * 2)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::domain::{Priority, QuestionnaireStatus};

    fn entity(priority: Priority, mrs: QuestionnaireStatus, map: QuestionnaireStatus) -> Entity {
        Entity {
            municipality: "Penha".to_string(),
            priority: Some(priority),
            mrs_required: true,
            map_required: true,
            status_mrs: mrs,
            status_map: map,
            ..Entity::default()
        }
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(5, 4), 100);
    }

    #[test]
    fn zero_entities_is_no_visit() {
        let progress = resolve_status(&[], &[]);
        assert_eq!(progress, MunicipalityProgress::empty());
    }

    #[test]
    fn answered_p1_marks_in_progress() {
        use QuestionnaireStatus::*;
        let started = entity(Priority::P1, Answered, NotStarted);
        let idle = entity(Priority::P1, NotStarted, NotStarted);
        let progress = resolve_status(&[&started, &idle], &[]);
        assert_eq!(progress.status, MunicipalityStatus::InProgress);
        assert_eq!(progress.progress_p1, 0);
    }

    #[test]
    fn only_p2_activity_stays_no_visit() {
        use QuestionnaireStatus::*;
        let p2 = entity(Priority::P2, ValidatedComplete, ValidatedComplete);
        let progress = resolve_status(&[&p2], &[]);
        assert_eq!(progress.status, MunicipalityStatus::NoVisit);
        assert_eq!(progress.progress_mrs, 100);
        assert_eq!(progress.progress_p1, 0);
    }

    #[test]
    fn all_p1_validated_is_done() {
        use QuestionnaireStatus::*;
        let done = entity(Priority::P1, ValidatedComplete, ValidatedComplete);
        let mut optional = entity(Priority::P3, NotStarted, NotStarted);
        optional.map_required = false;
        let progress = resolve_status(&[&done, &optional], &[]);

        assert_eq!(progress.status, MunicipalityStatus::Done);
        assert_eq!(progress.progress_p1, 100);
        assert_eq!(progress.progress_mrs, 50);
        assert_eq!(progress.progress_map, 100);
    }
}
