//! Caller-side acknowledgement ledger for alert candidates.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::domain::{Alert, AlertStatus};

pub const HISTORY_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub id: String,
    pub status: AlertStatus,
    pub timestamp: NaiveDateTime,
    #[serde(default, alias = "resolvidoEm", skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlertLifecycleError {
    #[error("alert {id} is already {}", .status.label())]
    AlreadyClosed { id: String, status: AlertStatus },
    #[error("alerts can only move from active to resolved or ignored")]
    InvalidTransition,
    #[error("alert {0} is not known")]
    UnknownAlert(String),
}

/// Acknowledged alerts, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertHistory {
    records: Vec<AlertRecord>,
}

impl AlertHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(mut records: Vec<AlertRecord>) -> Self {
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Self { records }
    }

    pub fn records(&self) -> &[AlertRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&AlertRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn status_of(&self, id: &str) -> AlertStatus {
        self.get(id)
            .map(|record| record.status)
            .unwrap_or(AlertStatus::Active)
    }

    pub fn resolve(&mut self, id: &str, now: NaiveDateTime) -> Result<&AlertRecord, AlertLifecycleError> {
        self.transition(id, AlertStatus::Resolved, now)
    }

    pub fn ignore(&mut self, id: &str, now: NaiveDateTime) -> Result<&AlertRecord, AlertLifecycleError> {
        self.transition(id, AlertStatus::Ignored, now)
    }

    /// Close an alert. Ids not yet in the ledger are recorded as new
    /// entries; closed alerts cannot be closed again.
    pub fn transition(
        &mut self,
        id: &str,
        status: AlertStatus,
        now: NaiveDateTime,
    ) -> Result<&AlertRecord, AlertLifecycleError> {
        if !status.is_closed() {
            return Err(AlertLifecycleError::InvalidTransition);
        }

        let index = match self.records.iter().position(|record| record.id == id) {
            Some(index) => {
                let record = &mut self.records[index];
                if record.status.is_closed() {
                    return Err(AlertLifecycleError::AlreadyClosed {
                        id: id.to_string(),
                        status: record.status,
                    });
                }
                record.status = status;
                record.closed_at = Some(now);
                index
            }
            None => {
                self.records.insert(
                    0,
                    AlertRecord {
                        id: id.to_string(),
                        status,
                        timestamp: now,
                        closed_at: Some(now),
                    },
                );
                0
            }
        };

        Ok(&self.records[index])
    }

    /// Drop candidates the user already resolved or ignored.
    pub fn suppress_acknowledged(&self, alerts: Vec<Alert>) -> Vec<Alert> {
        alerts
            .into_iter()
            .filter(|alert| !self.status_of(&alert.id).is_closed())
            .collect()
    }

    /// Keep only records from the retention window.
    pub fn retain_recent(&mut self, now: NaiveDateTime) {
        let cutoff = now - Duration::days(HISTORY_RETENTION_DAYS);
        self.records.retain(|record| record.timestamp > cutoff);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AlertHistoryError {
    #[error("alert history unavailable: {0}")]
    Unavailable(String),
}

/// Storage for the acknowledgement ledger.
pub trait AlertHistoryRepository: Send + Sync {
    fn load(&self) -> Result<AlertHistory, AlertHistoryError>;
    fn save(&self, history: &AlertHistory) -> Result<(), AlertHistoryError>;

    /// Load, update and save as one step; concurrent updates never
    /// overwrite each other. Nothing is saved when `update` fails.
    fn modify<T, E, F>(&self, update: F) -> Result<T, E>
    where
        F: FnOnce(&mut AlertHistory) -> Result<T, E>,
        E: From<AlertHistoryError>;
}
