//! configbump core library: resource types, label selectors and resource stores.
//!
//! - [`types`]: identities, snapshots, resources and change events
//! - [`selector`]: [`LabelSelector`] and [`Selector`]
//! - [`store`]: the [`ResourceStore`] trait and [`MemoryStore`]
//! - [`manifest`]: [`ManifestDirStore`], ConfigMap manifests on disk
//! - [`error`]: [`StoreError`]

pub mod error;
pub mod manifest;
pub mod selector;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use manifest::ManifestDirStore;
pub use selector::{LabelSelector, Selector};
pub use store::{MemoryStore, ResourceStore};
pub use types::{Labels, Resource, ResourceEvent, ResourceId, Snapshot};
