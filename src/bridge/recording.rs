//! In-process bridge that records every call and models the resulting
//! native tree.
//!
//! Used by the test suites and by hosts that want to run the mirror without
//! a desktop service (e.g. headless CI). A [`RecordingProbe`] shares the
//! state with the bridge so the other side can inspect it and inject
//! service events while the bridge lives on the native loop thread.

use super::{EventSink, NativeHandle, NativeMenuBridge, ReleaseCallback};
use crate::error::BridgeError;
use crate::mirror::Uid;
use crate::types::{EventKind, ItemKind, Shortcut};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One recorded bridge call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCall {
    Start,
    RegisterWindow { native_id: u64 },
    ReleaseWindow { window: NativeHandle },
    AddRoot { window: NativeHandle, uid: Uid, label: String },
    AddItem { parent: NativeHandle, uid: Uid, label: String, kind: ItemKind, position: usize },
    AddSeparator { parent: NativeHandle, uid: Uid, position: usize },
    Reorder { parent: NativeHandle, item: NativeHandle, position: usize },
    Remove { parent: NativeHandle, item: NativeHandle },
    SetLabel { item: NativeHandle, label: String },
    SetEnabled { item: NativeHandle, enabled: bool },
    SetIcon { item: NativeHandle, icon: Option<Vec<u8>> },
    SetShortcut { item: NativeHandle, shortcut: Option<Shortcut> },
    SetChecked { item: NativeHandle, checked: bool },
}

impl BridgeCall {
    /// Calls that change the shape of the native tree.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            BridgeCall::AddRoot { .. }
                | BridgeCall::AddItem { .. }
                | BridgeCall::AddSeparator { .. }
                | BridgeCall::Reorder { .. }
                | BridgeCall::Remove { .. }
        )
    }

    /// Calls that touch the native tree at all.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            BridgeCall::Start | BridgeCall::RegisterWindow { .. } | BridgeCall::ReleaseWindow { .. }
        )
    }
}

/// Behaviour switches for [`RecordingBridge`].
#[derive(Debug, Clone)]
pub struct RecordingOptions {
    /// `start` fails as if no service library were installed.
    pub unavailable: bool,
    /// `register_window` is refused for every window.
    pub refuse_registration: bool,
    /// Announce the service right after `start`.
    pub announce_on_start: bool,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            unavailable: false,
            refuse_registration: false,
            announce_on_start: true,
        }
    }
}

/// Modelled state of one native item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeItem {
    pub uid: Uid,
    /// `None` for window registrations.
    pub kind: Option<ItemKind>,
    pub label: String,
    pub enabled: bool,
    pub checked: bool,
    pub icon: Option<Vec<u8>>,
    pub shortcut: Option<Shortcut>,
    pub children: Vec<NativeHandle>,
}

impl NativeItem {
    fn new(uid: Uid, kind: Option<ItemKind>, label: &str) -> Self {
        Self {
            uid,
            kind,
            label: label.to_string(),
            enabled: true,
            checked: false,
            icon: None,
            shortcut: None,
            children: Vec::new(),
        }
    }
}

#[derive(Default)]
struct State {
    calls: Vec<BridgeCall>,
    next_handle: u64,
    items: HashMap<NativeHandle, NativeItem>,
    windows: HashMap<u64, NativeHandle>,
    sink: Option<EventSink>,
}

impl State {
    fn alloc(&mut self) -> NativeHandle {
        self.next_handle += 1;
        NativeHandle::new(self.next_handle)
    }

    fn insert_child(
        &mut self,
        parent: NativeHandle,
        item: NativeItem,
        position: usize,
    ) -> Result<NativeHandle, BridgeError> {
        if !self.items.contains_key(&parent) {
            return Err(BridgeError::StaleHandle(parent.raw()));
        }
        let handle = self.alloc();
        self.items.insert(handle, item);
        if let Some(p) = self.items.get_mut(&parent) {
            let at = position.min(p.children.len());
            p.children.insert(at, handle);
        }
        Ok(handle)
    }

    fn drop_subtree(&mut self, handle: NativeHandle) {
        if let Some(item) = self.items.remove(&handle) {
            for child in item.children {
                self.drop_subtree(child);
            }
        }
    }

    fn item_mut(&mut self, handle: NativeHandle) -> Result<&mut NativeItem, BridgeError> {
        self.items
            .get_mut(&handle)
            .ok_or(BridgeError::StaleHandle(handle.raw()))
    }
}

/// Bridge half, moved onto the native loop thread.
pub struct RecordingBridge {
    options: RecordingOptions,
    state: Arc<Mutex<State>>,
}

/// Inspection half, kept by the test or host.
#[derive(Clone)]
pub struct RecordingProbe {
    state: Arc<Mutex<State>>,
}

impl RecordingBridge {
    pub fn new(options: RecordingOptions) -> (Self, RecordingProbe) {
        let state = Arc::new(Mutex::new(State::default()));
        (
            Self {
                options,
                state: state.clone(),
            },
            RecordingProbe { state },
        )
    }
}

impl NativeMenuBridge for RecordingBridge {
    fn start(&mut self, sink: EventSink) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        state.calls.push(BridgeCall::Start);
        if self.options.unavailable {
            return Err(BridgeError::Unavailable("recording bridge set unavailable".into()));
        }
        if self.options.announce_on_start {
            sink.service_appeared();
        }
        state.sink = Some(sink);
        Ok(())
    }

    fn register_window(&mut self, native_window_id: u64) -> Result<NativeHandle, BridgeError> {
        let mut state = self.state.lock();
        state.calls.push(BridgeCall::RegisterWindow {
            native_id: native_window_id,
        });
        if self.options.refuse_registration {
            return Err(BridgeError::Refused(native_window_id));
        }
        if let Some(old) = state.windows.remove(&native_window_id) {
            state.drop_subtree(old);
        }
        let handle = state.alloc();
        state
            .items
            .insert(handle, NativeItem::new(Uid::ROOT, None, ""));
        state.windows.insert(native_window_id, handle);
        Ok(handle)
    }

    fn release_window(&mut self, window: NativeHandle, on_released: ReleaseCallback) {
        {
            let mut state = self.state.lock();
            state.calls.push(BridgeCall::ReleaseWindow { window });
            state.windows.retain(|_, h| *h != window);
            state.drop_subtree(window);
        }
        on_released();
    }

    fn add_root(
        &mut self,
        window: NativeHandle,
        uid: Uid,
        label: &str,
    ) -> Result<NativeHandle, BridgeError> {
        let mut state = self.state.lock();
        state.calls.push(BridgeCall::AddRoot {
            window,
            uid,
            label: label.to_string(),
        });
        let item = NativeItem::new(uid, Some(ItemKind::Submenu), label);
        state.insert_child(window, item, usize::MAX)
    }

    fn add_item(
        &mut self,
        parent: NativeHandle,
        uid: Uid,
        label: &str,
        kind: ItemKind,
        position: usize,
    ) -> Result<NativeHandle, BridgeError> {
        let mut state = self.state.lock();
        state.calls.push(BridgeCall::AddItem {
            parent,
            uid,
            label: label.to_string(),
            kind,
            position,
        });
        state.insert_child(parent, NativeItem::new(uid, Some(kind), label), position)
    }

    fn add_separator(
        &mut self,
        parent: NativeHandle,
        uid: Uid,
        position: usize,
    ) -> Result<NativeHandle, BridgeError> {
        let mut state = self.state.lock();
        state.calls.push(BridgeCall::AddSeparator {
            parent,
            uid,
            position,
        });
        let item = NativeItem::new(uid, Some(ItemKind::Separator), "");
        state.insert_child(parent, item, position)
    }

    fn reorder_item(
        &mut self,
        parent: NativeHandle,
        item: NativeHandle,
        position: usize,
    ) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        state.calls.push(BridgeCall::Reorder {
            parent,
            item,
            position,
        });
        let p = state.item_mut(parent)?;
        let Some(from) = p.children.iter().position(|h| *h == item) else {
            return Err(BridgeError::StaleHandle(item.raw()));
        };
        p.children.remove(from);
        let at = position.min(p.children.len());
        p.children.insert(at, item);
        Ok(())
    }

    fn remove_item(&mut self, parent: NativeHandle, item: NativeHandle) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        state.calls.push(BridgeCall::Remove { parent, item });
        let p = state.item_mut(parent)?;
        p.children.retain(|h| *h != item);
        state.drop_subtree(item);
        Ok(())
    }

    fn set_label(&mut self, item: NativeHandle, label: &str) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        state.calls.push(BridgeCall::SetLabel {
            item,
            label: label.to_string(),
        });
        state.item_mut(item)?.label = label.to_string();
        Ok(())
    }

    fn set_enabled(&mut self, item: NativeHandle, enabled: bool) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        state.calls.push(BridgeCall::SetEnabled { item, enabled });
        state.item_mut(item)?.enabled = enabled;
        Ok(())
    }

    fn set_icon(&mut self, item: NativeHandle, png: Option<&[u8]>) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        let icon = png.map(<[u8]>::to_vec);
        state.calls.push(BridgeCall::SetIcon {
            item,
            icon: icon.clone(),
        });
        state.item_mut(item)?.icon = icon;
        Ok(())
    }

    fn set_shortcut(
        &mut self,
        item: NativeHandle,
        shortcut: Option<Shortcut>,
    ) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        state.calls.push(BridgeCall::SetShortcut { item, shortcut });
        state.item_mut(item)?.shortcut = shortcut;
        Ok(())
    }

    fn set_checked(&mut self, item: NativeHandle, checked: bool) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        state.calls.push(BridgeCall::SetChecked { item, checked });
        state.item_mut(item)?.checked = checked;
        Ok(())
    }
}

impl RecordingProbe {
    pub fn calls(&self) -> Vec<BridgeCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&BridgeCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn structural_calls(&self) -> usize {
        self.count(BridgeCall::is_structural)
    }

    pub fn mutations(&self) -> usize {
        self.count(BridgeCall::is_mutation)
    }

    /// Handle of the registration for `native_id`, if it is registered.
    pub fn window(&self, native_id: u64) -> Option<NativeHandle> {
        self.state.lock().windows.get(&native_id).copied()
    }

    pub fn item(&self, handle: NativeHandle) -> Option<NativeItem> {
        self.state.lock().items.get(&handle).cloned()
    }

    /// Labels of the native children of `handle`, in native order.
    /// Separators show up as `"-"`.
    pub fn labels(&self, handle: NativeHandle) -> Vec<String> {
        let state = self.state.lock();
        let Some(item) = state.items.get(&handle) else {
            return Vec::new();
        };
        item.children
            .iter()
            .filter_map(|h| state.items.get(h))
            .map(|c| match c.kind {
                Some(ItemKind::Separator) => "-".to_string(),
                _ => c.label.clone(),
            })
            .collect()
    }

    pub fn root_labels(&self, native_id: u64) -> Vec<String> {
        self.window(native_id)
            .map(|w| self.labels(w))
            .unwrap_or_default()
    }

    /// Follow `path` of labels from the window registration down.
    pub fn find(&self, native_id: u64, path: &[&str]) -> Option<(NativeHandle, Uid)> {
        let state = self.state.lock();
        let mut current = *state.windows.get(&native_id)?;
        let mut uid = Uid::ROOT;
        for label in path {
            let item = state.items.get(&current)?;
            let (handle, child) = item
                .children
                .iter()
                .filter_map(|h| state.items.get(h).map(|c| (*h, c)))
                .find(|(_, c)| c.label == *label)?;
            current = handle;
            uid = child.uid;
        }
        Some((current, uid))
    }

    /// Labels below the item reached by `path`.
    pub fn labels_at(&self, native_id: u64, path: &[&str]) -> Vec<String> {
        self.find(native_id, path)
            .map(|(h, _)| self.labels(h))
            .unwrap_or_default()
    }

    fn sink(&self) -> Option<EventSink> {
        self.state.lock().sink.clone()
    }

    /// Inject a user interaction as the service would report it.
    pub fn emit(&self, native_id: u64, uid: Uid, kind: EventKind) -> bool {
        let (Some(window), Some(sink)) = (self.window(native_id), self.sink()) else {
            return false;
        };
        sink.event(window, uid, kind);
        true
    }

    /// Inject an event addressed to the item reached by `path`.
    pub fn emit_at(&self, native_id: u64, path: &[&str], kind: EventKind) -> bool {
        match self.find(native_id, path) {
            Some((_, uid)) => self.emit(native_id, uid, kind),
            None => false,
        }
    }

    pub fn appear(&self) {
        if let Some(sink) = self.sink() {
            sink.service_appeared();
        }
    }

    /// Drop every registration, as a restarting service would, and report it.
    pub fn vanish(&self) {
        let sink = {
            let mut state = self.state.lock();
            state.windows.clear();
            state.items.clear();
            state.sink.clone()
        };
        if let Some(sink) = sink {
            sink.service_vanished();
        }
    }
}
