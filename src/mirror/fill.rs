//! Lazy-fill bookkeeping for mirrored submenus.
//!
//! A submenu is filled from the host when the service is about to show it
//! and its cached host references are dropped again some time after it
//! closes. The timestamps here decide whether a fill can be skipped.

use super::MirrorNode;
use crate::timer::TimerId;
use crate::types::HostNodeId;
use std::time::{Duration, Instant};

/// Per-node fill and clear history.
#[derive(Debug, Default, Clone)]
pub struct FillState {
    pub last_filled: Option<Instant>,
    pub last_cleared: Option<Instant>,
    /// Pending clear timer on the native loop, if the node was closed.
    pub clear_timer: Option<TimerId>,
}

impl FillState {
    /// Filled less than `debounce` ago and not cleared since.
    pub fn is_fresh(&self, now: Instant, debounce: Duration) -> bool {
        let Some(filled) = self.last_filled else {
            return false;
        };
        let recent = now.saturating_duration_since(filled) < debounce;
        let untouched = match self.last_cleared {
            None => true,
            Some(cleared) => cleared < filled,
        };
        recent && untouched
    }

    pub fn mark_filled(&mut self, now: Instant) {
        self.last_filled = Some(now);
    }

    pub fn mark_cleared(&mut self, now: Instant) {
        self.last_cleared = Some(now);
    }
}

/// Take the pending clear timers of every node along `path`, the node
/// itself included.
pub(crate) fn take_clear_timers(root: &mut MirrorNode, path: &[usize]) -> Vec<TimerId> {
    let mut timers = Vec::new();
    let mut node = root;
    timers.extend(node.fill.clear_timer.take());
    for &i in path {
        let Some(next) = node.children.get_mut(i) else {
            break;
        };
        node = next;
        timers.extend(node.fill.clear_timer.take());
    }
    timers
}

/// Drop the cached host references below `node` and stamp the clear on the
/// node and every descendant. Returns how many descendants lost a host
/// reference.
pub(crate) fn clear_subtree(node: &mut MirrorNode, now: Instant) -> usize {
    let mut detached = 0;
    node.fill.mark_cleared(now);
    node.fill.clear_timer = None;
    for child in &mut node.children {
        child.for_each_mut(&mut |n| {
            if n.host.take().is_some() {
                detached += 1;
            }
            n.fill.mark_cleared(now);
        });
    }
    detached
}

/// Host node whose materialised children should be released after a clear.
pub(crate) fn release_target(node: &MirrorNode) -> Option<HostNodeId> {
    node.host
}
