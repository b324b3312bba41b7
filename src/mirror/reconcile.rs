//! Structural reconciliation of a mirror subtree against a host snapshot.
//!
//! A pass has three steps. `mark` tentatively deletes every child, `match_children`
//! walks the host children in order and claims an existing mirror child for
//! each one (or creates a new node), and `apply` pushes the outcome to the
//! native side: deletes, creations, reorders, then presentation changes.
//! Matching runs against an owned snapshot, so the whole pass executes on
//! the native loop once the host thread has answered.
//!
//! Nothing here fails: unknown host items are skipped, and a native call
//! that errors leaves only the affected node behind until the next pass.

use super::{MirrorNode, Position, UidAllocator};
use crate::bridge::{NativeHandle, NativeMenuBridge};
use crate::debug::{TraceCategory, Tracer};
use crate::error::{BridgeError, MirrorError};
use crate::host::HostItem;
use crate::types::{ItemKind, Presentation};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub created: usize,
    pub deleted: usize,
    pub updated: usize,
}

impl SyncStats {
    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.deleted == 0 && self.updated == 0
    }
}

impl std::fmt::Display for SyncStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "created={} deleted={} updated={}",
            self.created, self.deleted, self.updated
        )
    }
}

pub struct ReconciliationEngine<'a> {
    bridge: &'a mut dyn NativeMenuBridge,
    uids: &'a mut UidAllocator,
    tracer: Tracer,
    /// Counts for the node passed to `reconcile`.
    top: SyncStats,
    /// Counts for pre-filled levels below it, traced only.
    nested: SyncStats,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(
        bridge: &'a mut dyn NativeMenuBridge,
        uids: &'a mut UidAllocator,
        tracer: Tracer,
    ) -> Self {
        Self {
            bridge,
            uids,
            tracer,
            top: SyncStats::default(),
            nested: SyncStats::default(),
        }
    }

    /// Make the children of `node` match `host`, pre-populating submenus
    /// down to `depth` levels. Returns the counts for `node`'s direct
    /// children.
    pub fn reconcile(
        &mut self,
        node: &mut MirrorNode,
        host: &[HostItem],
        depth: usize,
    ) -> SyncStats {
        self.top = SyncStats::default();
        self.nested = SyncStats::default();

        Self::mark(node);
        self.match_children(node, host, depth, 0);
        self.apply(node, 0);

        self.tracer.trace(
            TraceCategory::SyncStats,
            format_args!(
                "uid {} ({}): {} nested[{}] -> {:?}",
                node.uid,
                node.label().unwrap_or("<root>"),
                self.top,
                self.nested,
                node.children
                    .iter()
                    .map(|c| c.label().unwrap_or("-"))
                    .collect::<Vec<_>>()
            ),
        );
        self.top
    }

    fn stats(&mut self, level: usize) -> &mut SyncStats {
        if level == 0 { &mut self.top } else { &mut self.nested }
    }

    /// Drop host references and mark every child for deletion.
    pub(crate) fn mark(node: &mut MirrorNode) {
        for child in &mut node.children {
            child.host = None;
            child.position = Position::PendingDelete;
        }
    }

    fn candidates(
        children: &[MirrorNode],
        kind: ItemKind,
    ) -> impl Iterator<Item = (usize, &MirrorNode)> {
        children
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.position == Position::PendingDelete && c.kind == kind)
    }

    /// Separators match the first unclaimed separator, everything else by
    /// label first and by action identity second.
    fn find_match(children: &[MirrorNode], item: &HostItem, kind: ItemKind) -> Option<usize> {
        if kind.is_separator() {
            return Self::candidates(children, kind).map(|(i, _)| i).next();
        }
        if let Some(label) = item.presentation.match_label()
            && let Some((i, _)) = Self::candidates(children, kind)
                .find(|(_, c)| c.presentation.match_label() == Some(label))
        {
            return Some(i);
        }
        let action = item.action?;
        Self::candidates(children, kind)
            .find(|(_, c)| c.action == Some(action))
            .map(|(i, _)| i)
    }

    /// Claim or create a mirror child for each host child, in host order.
    pub(crate) fn match_children(
        &mut self,
        node: &mut MirrorNode,
        host: &[HostItem],
        depth: usize,
        level: usize,
    ) {
        let mut index = 0u32;
        for item in host {
            let Some(kind) = item.kind else {
                let err = MirrorError::HierarchyMismatch {
                    uid: node.uid,
                    reason: "host child of unknown type skipped",
                };
                self.tracer
                    .trace(TraceCategory::Hierarchy, format_args!("{} (host {:?})", err, item.id));
                continue;
            };

            let at = match Self::find_match(&node.children, item, kind) {
                Some(i) => {
                    let child = &mut node.children[i];
                    child.host = Some(item.id);
                    child.action = item.action.or(child.action);
                    if !child.presentation.same_as(&item.presentation) {
                        child.presentation = item.presentation.clone();
                        self.stats(level).updated += 1;
                    }
                    i
                }
                None => {
                    let uid = self.uids.next();
                    node.children.push(MirrorNode::from_host(uid, kind, item));
                    self.stats(level).created += 1;
                    node.children.len() - 1
                }
            };
            node.children[at].position = Position::Ordered(index);
            index += 1;

            if depth > 1
                && kind == ItemKind::Submenu
                && let Some(grandchildren) = &item.children
            {
                let child = &mut node.children[at];
                Self::mark(child);
                self.match_children(child, grandchildren, depth - 1, level + 1);
            }
        }
    }

    /// Push the matched layout of `node`'s children to the native side.
    pub(crate) fn apply(&mut self, node: &mut MirrorNode, level: usize) {
        let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut node.children)
            .into_iter()
            .partition(|c| c.position == Position::PendingDelete);

        for child in gone {
            if let (Some(parent), Some(item)) = (node.native, child.native)
                && let Err(e) = self.bridge.remove_item(parent, item)
            {
                log::debug!("remove of uid {} failed: {}", child.uid, e);
            }
            self.stats(level).deleted += 1;
        }

        // Native order as last applied; `children` still holds it before sorting.
        let mut native_order: Vec<NativeHandle> = kept.iter().filter_map(|c| c.native).collect();
        node.children = kept;
        node.sort_by_position();

        let container = node.is_container();
        let Some(parent) = node.native else {
            // Nothing to push, but nested levels still need their deletes settled.
            for (i, child) in node.children.iter_mut().enumerate() {
                child.position = Position::Ordered(i as u32);
                if child.kind == ItemKind::Submenu {
                    self.apply(child, level + 1);
                }
            }
            return;
        };

        let mut slot = 0usize;
        for (i, child) in node.children.iter_mut().enumerate() {
            child.position = Position::Ordered(i as u32);
            let placed = match child.native {
                None => self.create(parent, child, slot, container, &mut native_order),
                Some(handle) => self.place(parent, handle, slot, &mut native_order),
            };
            if !placed {
                continue;
            }
            slot += 1;
            self.push_presentation(child);
        }
        if container {
            Self::index_roots(&mut node.children);
        }

        for child in &mut node.children {
            if child.kind == ItemKind::Submenu {
                self.apply(child, level + 1);
            }
        }
    }

    /// Root indices survive reorders but are rebuilt whenever the set of
    /// natively present roots changes, so they always cover `0..count`
    /// exactly once.
    fn index_roots(roots: &mut [MirrorNode]) {
        let count = roots.iter().filter(|r| r.native.is_some()).count();
        let mut seen = vec![false; count];
        let intact = roots
            .iter()
            .filter(|r| r.native.is_some())
            .all(|r| match r.root_index {
                Some(i) if i < count && !seen[i] => {
                    seen[i] = true;
                    true
                }
                _ => false,
            });

        let mut next = 0;
        for root in roots {
            if root.native.is_none() {
                root.root_index = None;
                continue;
            }
            if !intact {
                root.root_index = Some(next);
            }
            next += 1;
        }
    }

    fn create(
        &mut self,
        parent: NativeHandle,
        child: &mut MirrorNode,
        slot: usize,
        container: bool,
        native_order: &mut Vec<NativeHandle>,
    ) -> bool {
        let label = child.presentation.native_label();
        let created = if container {
            self.bridge.add_root(parent, child.uid, &label)
        } else if child.kind.is_separator() {
            self.bridge.add_separator(parent, child.uid, slot)
        } else {
            self.bridge.add_item(parent, child.uid, &label, child.kind, slot)
        };
        let handle = match created {
            Ok(handle) => handle,
            Err(e) => {
                log::debug!("create of uid {} failed: {}", child.uid, e);
                return false;
            }
        };
        child.native = Some(handle);
        child.applied = Some(Self::baseline(&child.presentation, child.kind));

        if container {
            // Roots are appended by the service; move into place if needed.
            native_order.push(handle);
            self.place(parent, handle, slot, native_order)
        } else {
            native_order.insert(slot.min(native_order.len()), handle);
            true
        }
    }

    fn place(
        &mut self,
        parent: NativeHandle,
        handle: NativeHandle,
        slot: usize,
        native_order: &mut Vec<NativeHandle>,
    ) -> bool {
        let current = native_order.iter().position(|h| *h == handle);
        if current == Some(slot) {
            return true;
        }
        if let Err(e) = self.bridge.reorder_item(parent, handle, slot) {
            log::debug!("reorder of {:?} failed: {}", handle, e);
            return false;
        }
        if let Some(from) = current {
            native_order.remove(from);
        }
        native_order.insert(slot.min(native_order.len()), handle);
        true
    }

    /// What a freshly created native item shows.
    fn baseline(presentation: &Presentation, kind: ItemKind) -> Presentation {
        if kind.is_separator() {
            return presentation.clone();
        }
        Presentation {
            label: presentation.label.clone(),
            mnemonic: presentation.mnemonic,
            ..Presentation::default()
        }
    }

    fn push_presentation(&mut self, child: &mut MirrorNode) {
        let Some(item) = child.native else {
            return;
        };
        if child.kind.is_separator() {
            return;
        }
        let wanted = &child.presentation;
        let shown = child.applied.clone().unwrap_or_default();
        if wanted.same_as(&shown) {
            return;
        }
        let pushed = Self::push_fields(&mut *self.bridge, item, child.kind, wanted, &shown);
        match pushed {
            Ok(()) => child.applied = Some(wanted.clone()),
            Err(e) => log::debug!("update of uid {} failed: {}", child.uid, e),
        }
    }

    fn push_fields(
        bridge: &mut dyn NativeMenuBridge,
        item: NativeHandle,
        kind: ItemKind,
        wanted: &Presentation,
        shown: &Presentation,
    ) -> Result<(), BridgeError> {
        if wanted.label != shown.label || wanted.mnemonic != shown.mnemonic {
            bridge.set_label(item, &wanted.native_label())?;
        }
        if wanted.enabled != shown.enabled {
            bridge.set_enabled(item, wanted.enabled)?;
        }
        if kind.is_checkable() && wanted.checked != shown.checked {
            bridge.set_checked(item, wanted.checked)?;
        }
        if wanted.icon_differs(shown) {
            bridge.set_icon(item, wanted.icon.as_deref())?;
        }
        if wanted.shortcut != shown.shortcut {
            bridge.set_shortcut(item, wanted.shortcut)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeCall, RecordingBridge, RecordingOptions, RecordingProbe};
    use crate::mirror::{MirrorTree, Uid};

    fn setup() -> (RecordingBridge, RecordingProbe, MirrorTree) {
        let (mut bridge, probe) = RecordingBridge::new(RecordingOptions::default());
        let mut tree = MirrorTree::new();
        let window = bridge.register_window(1).unwrap();
        tree.set_native_window(Some(window));
        probe.clear_calls();
        (bridge, probe, tree)
    }

    fn sync(
        bridge: &mut RecordingBridge,
        tree: &mut MirrorTree,
        path: &[usize],
        host: &[HostItem],
        depth: usize,
    ) -> SyncStats {
        let (node, uids) = tree.split_at(path).unwrap();
        ReconciliationEngine::new(bridge, uids, Tracer::default()).reconcile(node, host, depth)
    }

    fn five() -> Vec<HostItem> {
        vec![
            HostItem::action(1, "New"),
            HostItem::action(2, "Open"),
            HostItem::separator(3),
            HostItem::action(4, "Save"),
            HostItem::action(5, "Quit"),
        ]
    }

    fn file_menu(children: Vec<HostItem>) -> Vec<HostItem> {
        vec![HostItem::submenu(100, "File", children)]
    }

    #[test]
    fn test_creates_in_order() {
        let (mut bridge, probe, mut tree) = setup();
        let stats = sync(&mut bridge, &mut tree, &[], &file_menu(five()), 2);
        assert_eq!(stats, SyncStats { created: 1, deleted: 0, updated: 0 });
        assert_eq!(probe.labels_at(1, &["File"]), vec!["New", "Open", "-", "Save", "Quit"]);
        assert_eq!(tree.labels_at(&[0]), vec!["New", "Open", "-", "Save", "Quit"]);
    }

    #[test]
    fn test_idempotent() {
        let (mut bridge, probe, mut tree) = setup();
        sync(&mut bridge, &mut tree, &[], &file_menu(five()), 2);
        probe.clear_calls();
        let stats = sync(&mut bridge, &mut tree, &[], &file_menu(five()), 2);
        assert!(stats.is_empty());
        assert_eq!(probe.mutations(), 0);
    }

    #[test]
    fn test_delete_one_child() {
        let (mut bridge, probe, mut tree) = setup();
        sync(&mut bridge, &mut tree, &[], &file_menu(Vec::new()), 1);
        sync(&mut bridge, &mut tree, &[0], &five(), 1);
        probe.clear_calls();

        let mut host = five();
        host.remove(3);
        let stats = sync(&mut bridge, &mut tree, &[0], &host, 1);
        assert_eq!(stats, SyncStats { created: 0, deleted: 1, updated: 0 });
        assert_eq!(probe.count(|c| matches!(c, BridgeCall::Remove { .. })), 1);
        assert_eq!(probe.mutations(), 1);
        assert_eq!(probe.labels_at(1, &["File"]), vec!["New", "Open", "-", "Quit"]);
    }

    #[test]
    fn test_reorder_keeps_uids() {
        let (mut bridge, probe, mut tree) = setup();
        sync(&mut bridge, &mut tree, &[], &file_menu(five()), 2);
        let uids: Vec<Uid> = tree.node_at(&[0]).unwrap().children.iter().map(|c| c.uid).collect();

        let mut host = five();
        host.reverse();
        let stats = sync(&mut bridge, &mut tree, &[0], &host, 1);
        assert_eq!(stats.created + stats.deleted, 0);
        assert_eq!(probe.labels_at(1, &["File"]), vec!["Quit", "Save", "-", "Open", "New"]);

        let file = tree.node_at(&[0]).unwrap();
        let mut after: Vec<Uid> = file.children.iter().map(|c| c.uid).collect();
        after.reverse();
        assert_eq!(after, uids);
    }

    #[test]
    fn test_presentation_update_pushed() {
        let (mut bridge, probe, mut tree) = setup();
        sync(&mut bridge, &mut tree, &[], &file_menu(five()), 2);
        probe.clear_calls();

        let mut host = five();
        host[1].presentation.enabled = false;
        let stats = sync(&mut bridge, &mut tree, &[0], &host, 1);
        assert_eq!(stats, SyncStats { created: 0, deleted: 0, updated: 1 });
        assert_eq!(probe.calls().len(), 1);
        assert!(matches!(probe.calls()[0], BridgeCall::SetEnabled { enabled: false, .. }));
    }

    #[test]
    fn test_label_change_matched_by_action() {
        let (mut bridge, probe, mut tree) = setup();
        let host = vec![HostItem::action(1, "Play").with_action(crate::types::ActionId(9))];
        sync(&mut bridge, &mut tree, &[], &file_menu(host), 2);
        let uid = tree.node_at(&[0, 0]).unwrap().uid;
        probe.clear_calls();

        let host = vec![HostItem::action(1, "").with_action(crate::types::ActionId(9))];
        let stats = sync(&mut bridge, &mut tree, &[0], &host, 1);
        assert_eq!(stats, SyncStats { created: 0, deleted: 0, updated: 1 });
        assert_eq!(tree.node_at(&[0, 0]).unwrap().uid, uid);
    }

    #[test]
    fn test_kind_change_recreates() {
        let (mut bridge, _probe, mut tree) = setup();
        sync(&mut bridge, &mut tree, &[], &file_menu(vec![HostItem::action(1, "Wrap")]), 2);
        let stats = sync(&mut bridge, &mut tree, &[0], &[HostItem::checkable(1, "Wrap", true)], 1);
        assert_eq!(stats, SyncStats { created: 1, deleted: 1, updated: 0 });
        assert_eq!(tree.node_at(&[0, 0]).unwrap().kind, ItemKind::CheckableAction);
    }

    #[test]
    fn test_checked_state_applied_after_create() {
        let (mut bridge, probe, mut tree) = setup();
        sync(&mut bridge, &mut tree, &[], &file_menu(vec![HostItem::radio(1, "Tabs", true)]), 2);
        assert_eq!(probe.count(|c| matches!(c, BridgeCall::SetChecked { checked: true, .. })), 1);
    }

    #[test]
    fn test_unknown_child_skipped() {
        let (mut bridge, probe, mut tree) = setup();
        let host = vec![HostItem::action(1, "A"), HostItem::unknown(2), HostItem::action(3, "B")];
        let stats = sync(&mut bridge, &mut tree, &[], &file_menu(host), 2);
        assert_eq!(stats.created, 1);
        assert_eq!(probe.labels_at(1, &["File"]), vec!["A", "B"]);
    }

    #[test]
    fn test_separators_match_positionally() {
        let (mut bridge, probe, mut tree) = setup();
        let host = vec![
            HostItem::action(1, "A"),
            HostItem::separator(2),
            HostItem::action(3, "B"),
            HostItem::separator(4),
        ];
        sync(&mut bridge, &mut tree, &[], &file_menu(host), 2);
        probe.clear_calls();

        let host = vec![HostItem::separator(4), HostItem::action(1, "A"), HostItem::action(3, "B")];
        let stats = sync(&mut bridge, &mut tree, &[0], &host, 1);
        assert_eq!(stats, SyncStats { created: 0, deleted: 1, updated: 0 });
        assert_eq!(probe.labels_at(1, &["File"]), vec!["-", "A", "B"]);
    }

    #[test]
    fn test_roots_get_stable_indices() {
        let (mut bridge, _probe, mut tree) = setup();
        let roots = vec![
            HostItem::collapsed_submenu(1, "File"),
            HostItem::collapsed_submenu(2, "Edit"),
        ];
        sync(&mut bridge, &mut tree, &[], &roots, 1);
        assert_eq!(tree.roots()[0].root_index, Some(0));
        assert_eq!(tree.roots()[1].root_index, Some(1));

        let roots = vec![
            HostItem::collapsed_submenu(2, "Edit"),
            HostItem::collapsed_submenu(1, "File"),
        ];
        sync(&mut bridge, &mut tree, &[], &roots, 1);
        assert_eq!(tree.roots()[0].label(), Some("Edit"));
        assert_eq!(tree.roots()[0].root_index, Some(1));
    }

    #[test]
    fn test_root_indices_follow_root_list() {
        let (mut bridge, _probe, mut tree) = setup();
        let roots = |labels: &[(u64, &str)]| -> Vec<HostItem> {
            labels
                .iter()
                .map(|&(id, label)| HostItem::collapsed_submenu(id, label))
                .collect()
        };
        sync(&mut bridge, &mut tree, &[], &roots(&[(1, "A"), (2, "B"), (3, "C")]), 1);
        sync(&mut bridge, &mut tree, &[], &roots(&[(2, "B"), (3, "C"), (4, "D")]), 1);

        let labels: Vec<_> = tree.roots().iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec![Some("B"), Some("C"), Some("D")]);
        let indices: Vec<_> = tree.roots().iter().map(|r| r.root_index).collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2)]);

        sync(&mut bridge, &mut tree, &[], &roots(&[(4, "D")]), 1);
        assert_eq!(tree.roots()[0].root_index, Some(0));
    }

    #[test]
    fn test_detached_tree_drops_stale_nested_children() {
        let (mut bridge, _probe, _) = setup();
        let mut tree = MirrorTree::new();
        for n in 0..4u64 {
            let recent = vec![HostItem::action(10 + n, &format!("recent-{n}"))];
            sync(&mut bridge, &mut tree, &[], &file_menu(recent), 2);
        }
        let file = tree.node_at(&[0]).unwrap();
        assert_eq!(file.children.len(), 1);
        assert_eq!(file.children[0].label(), Some("recent-3"));
        assert_eq!(file.children[0].position, Position::Ordered(0));
    }

    #[test]
    fn test_no_window_handle_creates_nothing() {
        let (mut bridge, probe, _) = setup();
        let mut tree = MirrorTree::new();
        let stats = sync(&mut bridge, &mut tree, &[], &file_menu(five()), 2);
        assert_eq!(stats.created, 1);
        assert_eq!(probe.mutations(), 0);
        assert!(tree.roots()[0].native.is_none());
    }
}
