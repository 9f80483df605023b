//! Application task pipeline for AutoApply.
//!
//! Takes one queued job-application task end to end: duplicate
//! pre-check, browser session acquisition, site detection, the
//! form-filling state machine, screenshot evidence, and the atomic
//! fingerprint insert that makes the recorded outcome duplicate-safe.

pub mod engine;
pub mod sites;

mod dedupe;
mod error;
mod evidence;
mod fingerprint;
mod pipeline;
mod result;
mod store;
mod task;

pub use dedupe::{DuplicateGuard, Freshness};
pub use error::{ApplyError, FailureCause, FailureKind};
pub use evidence::EvidenceCapture;
pub use fingerprint::ApplicationFingerprint;
pub use pipeline::TaskPipeline;
pub use result::{TaskResult, TaskStatus};
pub use store::{
    ApplicationStore, InsertOutcome, MemoryApplicationStore, MemoryObjectStore, ObjectStore,
    StoreError,
};
pub use task::{ApplicantProfile, ApplicationTask};
