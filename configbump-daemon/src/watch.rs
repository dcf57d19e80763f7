//! Turn store listings into per-resource change events.

use std::collections::BTreeMap;

use notify::{Event, EventKind};

use configbump_core::manifest::is_manifest_path;
use configbump_core::{ResourceEvent, ResourceId, Snapshot};

/// The matching resources as of one store listing.
pub type Listing = BTreeMap<ResourceId, Snapshot>;

pub fn listing_from(resources: Vec<(ResourceId, Snapshot)>) -> Listing {
    resources.into_iter().collect()
}

/// Events that bring a consumer of `previous` up to date with `current`:
/// `Some` for every added or changed resource, `None` for every vanished one.
pub fn diff_listings(previous: &Listing, current: &Listing) -> Vec<ResourceEvent> {
    let mut events = Vec::new();
    for (id, snapshot) in current {
        if previous.get(id) != Some(snapshot) {
            events.push(ResourceEvent::changed(id.clone(), snapshot.clone()));
        }
    }
    for id in previous.keys() {
        if !current.contains_key(id) {
            events.push(ResourceEvent::gone(id.clone()));
        }
    }
    events.sort_by(|a, b| a.id.cmp(&b.id));
    events
}

pub(crate) fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// True when a filesystem event may have changed the manifest store.
pub(crate) fn touches_manifests(event: &Event) -> bool {
    is_relevant_event_kind(&event.kind) && event.paths.iter().any(|p| is_manifest_path(p))
}
