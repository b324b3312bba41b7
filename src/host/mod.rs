//! Host UI side of the mirror.
//!
//! The host owns the real menu tree and is the only thread allowed to read
//! it or invoke its actions. It exposes the tree through [`HostMenuTree`];
//! the mirror never holds host objects, only [`HostNodeId`] keys that it
//! hands back when it needs fresh state.
//!
//! - `snapshot`: owned copies of host subtrees, captured on the host thread
//! - `queue`: task channel from the native loop to the host thread

mod queue;
mod snapshot;

pub use queue::{HostLink, HostPump, HostQueue, HostTask, host_channel};
pub use snapshot::{HostItem, capture_children, capture_items};

use crate::types::{ActionId, HostNodeId, Shortcut, WindowId};
use std::sync::Arc;

/// How the host classifies one of its menu nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostClass {
    Action,
    Submenu,
    Separator,
    /// Not a menu item the mirror understands; skipped entirely.
    Unknown,
}

/// Check decoration of an action item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckStyle {
    #[default]
    None,
    Check,
    Radio,
}

/// Capability the host UI framework provides to the mirror.
///
/// Every method is called on the host thread. Query methods must tolerate
/// ids of nodes the host has already dropped and answer with empty/neutral
/// values.
pub trait HostMenuTree {
    /// Current children of `node`, in display order.
    fn children(&self, node: HostNodeId) -> Vec<HostNodeId>;

    fn classify(&self, node: HostNodeId) -> HostClass;

    fn label(&self, node: HostNodeId) -> Option<String>;

    fn is_enabled(&self, node: HostNodeId) -> bool;

    fn mnemonic(&self, _node: HostNodeId) -> Option<char> {
        None
    }

    fn is_checked(&self, _node: HostNodeId) -> bool {
        false
    }

    fn check_style(&self, _node: HostNodeId) -> CheckStyle {
        CheckStyle::None
    }

    fn icon(&self, _node: HostNodeId) -> Option<Arc<[u8]>> {
        None
    }

    fn shortcut(&self, _node: HostNodeId) -> Option<Shortcut> {
        None
    }

    /// Identity of the action behind an item, if the framework has one.
    fn action_id(&self, _node: HostNodeId) -> Option<ActionId> {
        None
    }

    /// Deliver a click. Returns false if the node no longer exists.
    fn invoke_action(&mut self, node: HostNodeId) -> bool;

    /// Native id of an on-screen window, or 0 while it is not available yet.
    fn native_window_id(&self, window: WindowId) -> u64;

    /// The window's menu is (or stopped being) shown by the global menu
    /// service. Hosts hide their own menu bar while `presented` is true.
    fn set_native_menu_presented(&mut self, _window: WindowId, _presented: bool) {}

    /// The submenu's materialised children are no longer needed.
    fn release_children(&mut self, _node: HostNodeId) {}

    /// Close any in-app popup menus before a submenu is filled.
    fn close_popups(&mut self) {}

    /// The window's native mirror has been released; drop back-references.
    fn window_released(&mut self, _window: WindowId) {}
}
