//! Upload & metadata pipeline
//!
//! Persists the output of each successfully stopped track: bytes to durable
//! storage, then an evidence record to the metadata store. Runs once per
//! track per session, independently per track.

pub mod pipeline;

pub use pipeline::{EvidenceIndex, EvidencePipeline, EvidenceStorage, StoredObject};
