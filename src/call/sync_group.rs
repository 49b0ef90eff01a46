use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::debug;

use crate::stream::Syncable;

struct Member {
    owner: u64,
    stream: Weak<dyn Syncable>,
}

/// Sync group name -> streams that joined it.
///
/// Holds only weak references; a dropped stream simply stops showing up.
#[derive(Default)]
pub struct SyncGroupRegistry {
    groups: DashMap<String, Vec<Member>>,
}

impl SyncGroupRegistry {
    /// Empty group names are ignored.
    pub fn join(&self, group: &str, owner: u64, stream: Weak<dyn Syncable>) {
        if group.is_empty() {
            return;
        }
        let mut members = self.groups.entry(group.to_string()).or_default();
        members.retain(|m| m.owner != owner && m.stream.strong_count() > 0);
        members.push(Member { owner, stream });
        debug!("Stream {} joined sync group '{}'", owner, group);
    }

    pub fn leave(&self, group: &str, owner: u64) {
        if group.is_empty() {
            return;
        }
        if let Some(mut members) = self.groups.get_mut(group) {
            members.retain(|m| m.owner != owner);
            debug!("Stream {} left sync group '{}'", owner, group);
        }
        self.groups.remove_if(group, |_, members| members.is_empty());
    }

    /// Live members, in join order.
    pub fn members(&self, group: &str) -> Vec<Arc<dyn Syncable>> {
        self.groups
            .get(group)
            .map(|members| members.iter().filter_map(|m| m.stream.upgrade()).collect())
            .unwrap_or_default()
    }
}
