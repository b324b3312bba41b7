//! In-process shadow of a window's native menu.
//!
//! A [`MirrorTree`] is owned by the native loop thread and never shared. Its
//! top level is a container node standing for the window registration;
//! the container's children are the window's root menus.
//!
//! - `reconcile`: diff a mirror subtree against a host snapshot and apply it
//! - `fill`: lazy-fill bookkeeping (debounce and clear timers)

pub mod fill;
pub mod reconcile;

pub use fill::FillState;
pub use reconcile::{ReconciliationEngine, SyncStats};

use crate::bridge::{NativeHandle, NativeMenuBridge};
use crate::debug::Tracer;
use crate::host::HostItem;
use crate::types::{ActionId, HostNodeId, ItemKind, Presentation};
use std::fmt;

/// Identity of a mirrored item within one window's mirror. Handed to the
/// native service, which reports it back in events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(pub u32);

impl Uid {
    /// The container standing for the window registration itself.
    pub const ROOT: Uid = Uid(0);
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out uids for one tree, starting after [`Uid::ROOT`].
#[derive(Debug)]
pub struct UidAllocator {
    next: u32,
}

impl Default for UidAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl UidAllocator {
    pub fn next(&mut self) -> Uid {
        let uid = Uid(self.next);
        self.next = self.next.wrapping_add(1).max(1);
        uid
    }
}

/// Scratch slot of a child during one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Target index among the parent's children.
    Ordered(u32),
    /// Not matched by any host child yet; deleted at apply unless matched.
    PendingDelete,
}

impl Position {
    fn sort_key(self) -> u32 {
        match self {
            Position::Ordered(i) => i,
            Position::PendingDelete => u32::MAX,
        }
    }
}

/// One mirrored menu entity.
#[derive(Debug)]
pub struct MirrorNode {
    pub(crate) uid: Uid,
    pub(crate) kind: ItemKind,
    /// Last snapshot read from the host.
    pub(crate) presentation: Presentation,
    /// What the native item currently shows; `None` until created.
    pub(crate) applied: Option<Presentation>,
    pub(crate) native: Option<NativeHandle>,
    /// Back-reference used only to re-query the host.
    pub(crate) host: Option<HostNodeId>,
    pub(crate) action: Option<ActionId>,
    pub(crate) children: Vec<MirrorNode>,
    pub(crate) position: Position,
    pub(crate) fill: FillState,
    /// Set once for root menus when they are first created natively.
    pub(crate) root_index: Option<usize>,
}

impl MirrorNode {
    pub(crate) fn container() -> Self {
        Self::new(Uid::ROOT, ItemKind::Submenu, Presentation::default())
    }

    pub(crate) fn new(uid: Uid, kind: ItemKind, presentation: Presentation) -> Self {
        Self {
            uid,
            kind,
            presentation,
            applied: None,
            native: None,
            host: None,
            action: None,
            children: Vec::new(),
            position: Position::Ordered(0),
            fill: FillState::default(),
            root_index: None,
        }
    }

    pub(crate) fn from_host(uid: Uid, kind: ItemKind, item: &HostItem) -> Self {
        let mut node = Self::new(uid, kind, item.presentation.clone());
        node.host = Some(item.id);
        node.action = item.action;
        node
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn native(&self) -> Option<NativeHandle> {
        self.native
    }

    pub fn host(&self) -> Option<HostNodeId> {
        self.host
    }

    pub fn children(&self) -> &[MirrorNode] {
        &self.children
    }

    pub fn root_index(&self) -> Option<usize> {
        self.root_index
    }

    pub fn fill(&self) -> &FillState {
        &self.fill
    }

    pub fn label(&self) -> Option<&str> {
        self.presentation.label.as_deref()
    }

    pub fn is_container(&self) -> bool {
        self.uid == Uid::ROOT
    }

    fn path_to(&self, uid: Uid, path: &mut Vec<usize>) -> bool {
        for (i, child) in self.children.iter().enumerate() {
            path.push(i);
            if child.uid == uid || child.path_to(uid, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    /// Visit this node and every descendant.
    pub(crate) fn for_each_mut(&mut self, f: &mut impl FnMut(&mut MirrorNode)) {
        f(self);
        for child in &mut self.children {
            child.for_each_mut(f);
        }
    }

    pub(crate) fn sort_by_position(&mut self) {
        self.children.sort_by_key(|c| c.position.sort_key());
    }
}

/// The mirror of one top-level window.
#[derive(Debug)]
pub struct MirrorTree {
    pub(crate) root: MirrorNode,
    pub(crate) uids: UidAllocator,
    /// Host ids of the window's root menus, as last set by the host.
    pub(crate) root_ids: Vec<HostNodeId>,
}

impl Default for MirrorTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorTree {
    pub fn new() -> Self {
        Self {
            root: MirrorNode::container(),
            uids: UidAllocator::default(),
            root_ids: Vec::new(),
        }
    }

    /// Container whose children are the root menus.
    pub fn container(&self) -> &MirrorNode {
        &self.root
    }

    pub fn roots(&self) -> &[MirrorNode] {
        &self.root.children
    }

    pub fn root_count(&self) -> usize {
        self.root.children.len()
    }

    pub fn native_window(&self) -> Option<NativeHandle> {
        self.root.native
    }

    /// Attach the tree to a window registration, or detach it with `None`.
    pub fn set_native_window(&mut self, handle: Option<NativeHandle>) {
        self.root.native = handle;
    }

    /// Forget everything pushed to the native side. The uid counter keeps
    /// running so stale events cannot hit a new node.
    pub(crate) fn reset(&mut self) {
        self.root = MirrorNode::container();
    }

    /// Child indices leading from the container to `uid`.
    pub fn path_of(&self, uid: Uid) -> Option<Vec<usize>> {
        if uid == Uid::ROOT {
            return Some(Vec::new());
        }
        let mut path = Vec::new();
        self.root.path_to(uid, &mut path).then_some(path)
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&MirrorNode> {
        let mut node = &self.root;
        for &i in path {
            node = node.children.get(i)?;
        }
        Some(node)
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut MirrorNode> {
        let mut node = &mut self.root;
        for &i in path {
            node = node.children.get_mut(i)?;
        }
        Some(node)
    }

    pub fn node(&self, uid: Uid) -> Option<&MirrorNode> {
        self.path_of(uid).and_then(|p| self.node_at(&p))
    }

    /// Node at `path` together with the uid allocator, for reconciliation.
    pub(crate) fn split_at(
        &mut self,
        path: &[usize],
    ) -> Option<(&mut MirrorNode, &mut UidAllocator)> {
        let MirrorTree { root, uids, .. } = self;
        let mut node = root;
        for &i in path {
            node = node.children.get_mut(i)?;
        }
        Some((node, uids))
    }

    /// Reconcile the children of `uid` against `host`. `None` if `uid` is
    /// not in this tree.
    pub fn reconcile_at(
        &mut self,
        bridge: &mut dyn NativeMenuBridge,
        uid: Uid,
        host: &[HostItem],
        depth: usize,
        tracer: Tracer,
    ) -> Option<SyncStats> {
        let path = self.path_of(uid)?;
        let (node, uids) = self.split_at(&path)?;
        Some(ReconciliationEngine::new(bridge, uids, tracer).reconcile(node, host, depth))
    }

    /// Root index of the root menu containing `uid`.
    pub fn root_index_of(&self, uid: Uid) -> Option<usize> {
        let path = self.path_of(uid)?;
        let first = *path.first()?;
        self.root.children.get(first)?.root_index
    }

    /// Labels of the children at `path`, for logging and tests.
    pub fn labels_at(&self, path: &[usize]) -> Vec<String> {
        self.node_at(path)
            .map(|n| {
                n.children
                    .iter()
                    .map(|c| c.label().unwrap_or("-").to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}
