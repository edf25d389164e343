//! Snapshot ingestion: lenient decoding of backend payloads and the
//! sources the poller fetches from.

pub(crate) mod lenient;
mod normalizer;
mod source;

pub use lenient::parse_datetime;
pub use normalizer::{fold_label, normalize_label, same_municipality};
pub use source::{JsonFileSource, SnapshotError, SnapshotImporter, SnapshotSource, StaticSource};
