//! Native menu bridge.
//!
//! [`NativeMenuBridge`] is the only boundary with the platform's global
//! menu service. All calls happen on the native loop thread; the bridge is
//! built there by a factory closure and never leaves it, so implementations
//! need not be `Send`. Events and service state changes travel back to the
//! loop through an [`EventSink`].

mod recording;

pub use recording::{BridgeCall, RecordingBridge, RecordingOptions, RecordingProbe};

use crate::error::BridgeError;
use crate::mirror::Uid;
use crate::native_loop::LoopMsg;
use crate::types::{EventKind, ItemKind, Shortcut};
use std::sync::mpsc::Sender;

/// Opaque handle of a native window registration or menu item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(u64);

impl NativeHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Callback invoked once the native side has finished tearing a window down.
pub type ReleaseCallback = Box<dyn FnOnce() + Send>;

/// Channel back into the native loop, handed to [`NativeMenuBridge::start`].
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<LoopMsg>,
}

impl EventSink {
    pub(crate) fn new(tx: Sender<LoopMsg>) -> Self {
        Self { tx }
    }

    /// The user interacted with the item `uid` in the menu of `native_window`.
    pub fn event(&self, native_window: NativeHandle, uid: Uid, kind: EventKind) {
        let _ = self.tx.send(LoopMsg::Event {
            native_window,
            uid,
            kind,
        });
    }

    /// The global menu service became available.
    pub fn service_appeared(&self) {
        let _ = self.tx.send(LoopMsg::ServiceAppeared);
    }

    /// The global menu service went away.
    pub fn service_vanished(&self) {
        let _ = self.tx.send(LoopMsg::ServiceVanished);
    }
}

/// Primitive operations the mirror needs from the native menu service.
///
/// Positions are indices among the parent's native children. Items are
/// identified to the service by their [`Uid`], which comes back in events.
pub trait NativeMenuBridge {
    /// Connect to the service and begin delivering events into `sink`.
    /// An error means the environment cannot host a global menu at all.
    fn start(&mut self, sink: EventSink) -> Result<(), BridgeError>;

    /// Register a top-level window by its native id.
    fn register_window(&mut self, native_window_id: u64) -> Result<NativeHandle, BridgeError>;

    /// Tear down a window registration. `on_released` runs once the
    /// service is done with it.
    fn release_window(&mut self, window: NativeHandle, on_released: ReleaseCallback);

    /// Add a top-level menu to a registered window.
    fn add_root(
        &mut self,
        window: NativeHandle,
        uid: Uid,
        label: &str,
    ) -> Result<NativeHandle, BridgeError>;

    fn add_item(
        &mut self,
        parent: NativeHandle,
        uid: Uid,
        label: &str,
        kind: ItemKind,
        position: usize,
    ) -> Result<NativeHandle, BridgeError>;

    fn add_separator(
        &mut self,
        parent: NativeHandle,
        uid: Uid,
        position: usize,
    ) -> Result<NativeHandle, BridgeError>;

    fn reorder_item(
        &mut self,
        parent: NativeHandle,
        item: NativeHandle,
        position: usize,
    ) -> Result<(), BridgeError>;

    fn remove_item(&mut self, parent: NativeHandle, item: NativeHandle) -> Result<(), BridgeError>;

    fn set_label(&mut self, item: NativeHandle, label: &str) -> Result<(), BridgeError>;

    fn set_enabled(&mut self, item: NativeHandle, enabled: bool) -> Result<(), BridgeError>;

    /// `None` clears the icon.
    fn set_icon(&mut self, item: NativeHandle, png: Option<&[u8]>) -> Result<(), BridgeError>;

    /// `None` clears the shortcut. Modifiers are sent as
    /// [`KeyModifiers::to_mask`](crate::types::KeyModifiers::to_mask).
    fn set_shortcut(
        &mut self,
        item: NativeHandle,
        shortcut: Option<Shortcut>,
    ) -> Result<(), BridgeError>;

    fn set_checked(&mut self, item: NativeHandle, checked: bool) -> Result<(), BridgeError>;
}
