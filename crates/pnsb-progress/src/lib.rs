//! Derived progress metrics for the PNSB sanitation survey dashboard.
//!
//! The `survey` module holds the pure computations (KPIs, municipality
//! status, workflow pipeline and alert rules). `ingest` decodes backend
//! snapshots and `poller` keeps a refreshed dashboard for the HTTP layer.

pub mod config;
pub mod error;
pub mod ingest;
pub mod poller;
pub mod survey;
pub mod telemetry;
