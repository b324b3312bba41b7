//! Owned snapshots of host menu subtrees.
//!
//! Snapshots are captured on the host thread and moved to the native loop,
//! where reconciliation runs against them. This keeps host objects off the
//! native loop entirely.

use super::{CheckStyle, HostClass, HostMenuTree};
use crate::types::{ActionId, HostNodeId, ItemKind, Presentation};

/// One host menu item with its presentation and, when captured within the
/// depth budget, its children.
#[derive(Debug, Clone, PartialEq)]
pub struct HostItem {
    pub id: HostNodeId,
    /// `None` when the host could not classify the node.
    pub kind: Option<ItemKind>,
    pub action: Option<ActionId>,
    pub presentation: Presentation,
    /// `Some` for submenus captured within the depth budget.
    pub children: Option<Vec<HostItem>>,
}

impl HostItem {
    pub fn action(id: u64, label: &str) -> Self {
        Self {
            id: HostNodeId(id),
            kind: Some(ItemKind::Action),
            action: None,
            presentation: Presentation::labeled(label),
            children: None,
        }
    }

    pub fn submenu(id: u64, label: &str, children: Vec<HostItem>) -> Self {
        Self {
            id: HostNodeId(id),
            kind: Some(ItemKind::Submenu),
            action: None,
            presentation: Presentation::labeled(label),
            children: Some(children),
        }
    }

    /// A submenu whose children were not captured.
    pub fn collapsed_submenu(id: u64, label: &str) -> Self {
        Self {
            children: None,
            ..Self::submenu(id, label, Vec::new())
        }
    }

    pub fn separator(id: u64) -> Self {
        Self {
            id: HostNodeId(id),
            kind: Some(ItemKind::Separator),
            action: None,
            presentation: Presentation::default(),
            children: None,
        }
    }

    pub fn checkable(id: u64, label: &str, checked: bool) -> Self {
        Self {
            kind: Some(ItemKind::CheckableAction),
            presentation: Presentation {
                checked,
                ..Presentation::labeled(label)
            },
            ..Self::action(id, label)
        }
    }

    pub fn radio(id: u64, label: &str, checked: bool) -> Self {
        Self {
            kind: Some(ItemKind::RadioAction),
            ..Self::checkable(id, label, checked)
        }
    }

    pub fn unknown(id: u64) -> Self {
        Self {
            id: HostNodeId(id),
            kind: None,
            action: None,
            presentation: Presentation::default(),
            children: None,
        }
    }

    pub fn with_action(mut self, action: ActionId) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_presentation(mut self, presentation: Presentation) -> Self {
        self.presentation = presentation;
        self
    }

    pub fn is_submenu(&self) -> bool {
        self.kind == Some(ItemKind::Submenu)
    }
}

fn item_kind(class: HostClass, check: CheckStyle) -> Option<ItemKind> {
    match (class, check) {
        (HostClass::Unknown, _) => None,
        (HostClass::Separator, _) => Some(ItemKind::Separator),
        (HostClass::Submenu, _) => Some(ItemKind::Submenu),
        (HostClass::Action, CheckStyle::None) => Some(ItemKind::Action),
        (HostClass::Action, CheckStyle::Check) => Some(ItemKind::CheckableAction),
        (HostClass::Action, CheckStyle::Radio) => Some(ItemKind::RadioAction),
    }
}

fn capture_one(tree: &dyn HostMenuTree, id: HostNodeId, depth: usize) -> HostItem {
    let kind = item_kind(tree.classify(id), tree.check_style(id));
    let presentation = match kind {
        None | Some(ItemKind::Separator) => Presentation::default(),
        Some(kind) => Presentation {
            label: tree.label(id),
            mnemonic: tree.mnemonic(id),
            enabled: tree.is_enabled(id),
            checked: kind.is_checkable() && tree.is_checked(id),
            icon: tree.icon(id),
            shortcut: tree.shortcut(id),
        },
    };
    let children = if kind == Some(ItemKind::Submenu) && depth > 1 {
        Some(capture_children(tree, id, depth - 1))
    } else {
        None
    };
    HostItem {
        id,
        kind,
        action: tree.action_id(id),
        presentation,
        children,
    }
}

/// Capture the children of `parent`. Submenu children get their own
/// children captured while `depth > 1`, mirroring the reconciliation depth
/// budget.
pub fn capture_children(
    tree: &dyn HostMenuTree,
    parent: HostNodeId,
    depth: usize,
) -> Vec<HostItem> {
    let ids = tree.children(parent);
    capture_items(tree, &ids, depth)
}

/// Capture an explicit list of nodes, e.g. a window's menu bar roots.
pub fn capture_items(tree: &dyn HostMenuTree, ids: &[HostNodeId], depth: usize) -> Vec<HostItem> {
    ids.iter().map(|&id| capture_one(tree, id, depth)).collect()
}
