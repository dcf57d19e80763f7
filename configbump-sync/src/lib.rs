//! # configbump-sync
//!
//! Keeps one directory in step with a set of configuration resources.
//!
//! Build a [`SyncEngine`] over a [`configbump_core::ResourceStore`], call
//! [`SyncEngine::full_sync`] once to establish the baseline, then feed it
//! change events through [`SyncEngine::on_resource_event`].

pub mod cache;
pub mod diff;
pub mod digest;
pub mod engine;
pub mod error;
pub mod full;
pub mod reconcile;
pub mod report;
pub mod writer;

pub use cache::SyncCache;
pub use digest::{fingerprint, FileDigests, Fingerprint};
pub use engine::{SyncEngine, SyncHook};
pub use error::SyncError;
pub use report::{FileChange, PassKind, SkippedFile, SyncReport};
