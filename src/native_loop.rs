//! The native loop: the one thread that talks to the menu service.
//!
//! It owns the bridge, every window's [`MirrorTree`], the event filters and
//! the clear/idle timers. Everything reaches it as a [`LoopMsg`]: requests
//! from the registry, events and service transitions from the bridge, and
//! staged root snapshots from the host thread. Host state is only read via
//! [`HostLink`], either by a fire-and-forget task or by a bounded `ask`
//! during a fill.

use crate::bridge::{NativeHandle, NativeMenuBridge};
use crate::debug::{TraceCategory, Tracer};
use crate::error::MirrorError;
use crate::filter::{EventFilter, FilterVerdict, QueuedNativeEvent};
use crate::host::{HostItem, HostLink, capture_children, capture_items};
use crate::mirror::fill::{clear_subtree, release_target, take_clear_timers};
use crate::mirror::{MirrorTree, ReconciliationEngine, Uid};
use crate::timer::{TimerId, TimerQueue};
use crate::types::{EventKind, ItemKind, WindowId};
use par_global_menu_config::MirrorConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::Instant;

/// Messages processed by the native loop.
pub(crate) enum LoopMsg {
    Bind {
        window: WindowId,
        native_id: u64,
        shared: Arc<WindowShared>,
    },
    /// A root snapshot was staged in the window's [`WindowShared`].
    SetRoots {
        window: WindowId,
    },
    Unbind {
        window: WindowId,
    },
    /// The service finished releasing an unbound window.
    Released {
        window: WindowId,
    },
    SetEnabled(bool),
    Event {
        native_window: NativeHandle,
        uid: Uid,
        kind: EventKind,
    },
    ServiceAppeared,
    ServiceVanished,
    Shutdown,
}

/// State a window shares between the host thread and the native loop.
#[derive(Default)]
pub(crate) struct WindowShared {
    /// Latest root snapshot not yet reconciled. While it is `Some`, a
    /// `SetRoots` is already queued and newer snapshots just replace it.
    pending_roots: Mutex<Option<Vec<HostItem>>>,
    /// The global menu shows this window's menu.
    presented: AtomicBool,
}

impl WindowShared {
    /// Stage `roots`; returns true if the caller must queue a `SetRoots`.
    pub(crate) fn stage_roots(&self, roots: Vec<HostItem>) -> bool {
        self.pending_roots.lock().replace(roots).is_none()
    }

    fn take_roots(&self) -> Option<Vec<HostItem>> {
        self.pending_roots.lock().take()
    }

    pub(crate) fn is_presented(&self) -> bool {
        self.presented.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopTimer {
    Clear { window: WindowId, uid: Uid },
    FilterIdle(WindowId),
}

struct WindowMirror {
    tree: MirrorTree,
    shared: Arc<WindowShared>,
    native_id: u64,
    filter: EventFilter,
    filter_timer: Option<TimerId>,
    /// The service refused this window; it keeps its own menu bar for good.
    refused: bool,
}

pub(crate) struct NativeLoop<B: NativeMenuBridge, H: HostLink> {
    bridge: B,
    host: H,
    config: MirrorConfig,
    tracer: Tracer,
    windows: HashMap<WindowId, WindowMirror>,
    by_native: HashMap<NativeHandle, WindowId>,
    timers: TimerQueue<LoopTimer>,
    service_up: bool,
    enabled: bool,
    self_tx: Sender<LoopMsg>,
}

impl<B: NativeMenuBridge, H: HostLink> NativeLoop<B, H> {
    pub(crate) fn new(bridge: B, host: H, config: MirrorConfig, self_tx: Sender<LoopMsg>) -> Self {
        Self {
            bridge,
            host,
            tracer: Tracer::new(config.trace),
            enabled: config.enabled,
            config,
            windows: HashMap::new(),
            by_native: HashMap::new(),
            timers: TimerQueue::new(),
            service_up: false,
            self_tx,
        }
    }

    /// Process messages until shutdown or until every sender is gone.
    pub(crate) fn run(mut self, rx: Receiver<LoopMsg>) {
        log::info!("native menu loop started");
        loop {
            self.fire_due(Instant::now());
            let msg = match self.next_deadline() {
                Some(deadline) => {
                    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                        Ok(msg) => msg,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match rx.recv() {
                    Ok(msg) => msg,
                    Err(_) => break,
                },
            };
            if !self.handle(msg, Instant::now()) {
                break;
            }
        }
        self.detach_all();
        log::info!("native menu loop stopped");
    }

    /// Handle one message. Returns false on shutdown.
    pub(crate) fn handle(&mut self, msg: LoopMsg, now: Instant) -> bool {
        match msg {
            LoopMsg::Bind {
                window,
                native_id,
                shared,
            } => self.bind(window, native_id, shared),
            LoopMsg::SetRoots { window } => self.set_roots(window),
            LoopMsg::Unbind { window } => self.unbind(window),
            LoopMsg::Released { window } => {
                self.host.post(Box::new(move |tree| tree.window_released(window)));
            }
            LoopMsg::SetEnabled(enabled) => self.set_enabled(enabled),
            LoopMsg::Event {
                native_window,
                uid,
                kind,
            } => self.on_event(native_window, uid, kind, now),
            LoopMsg::ServiceAppeared => self.service_appeared(),
            LoopMsg::ServiceVanished => self.service_vanished(),
            LoopMsg::Shutdown => return false,
        }
        true
    }

    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Run every timer due at `now`.
    pub(crate) fn fire_due(&mut self, now: Instant) {
        for timer in self.timers.pop_due(now) {
            match timer {
                LoopTimer::Clear { window, uid } => self.clear(window, uid, now),
                LoopTimer::FilterIdle(window) => self.filter_idle(window, now),
            }
        }
    }

    // ---- window lifecycle ----

    fn bind(&mut self, window: WindowId, native_id: u64, shared: Arc<WindowShared>) {
        if let Some(existing) = self.windows.get(&window) {
            if existing.native_id == native_id {
                return;
            }
            self.unbind(window);
        }
        log::debug!("binding {} to native window {:#x}", window, native_id);
        self.windows.insert(
            window,
            WindowMirror {
                tree: MirrorTree::new(),
                shared,
                native_id,
                filter: EventFilter::new(
                    self.config.filter_idle(),
                    self.config.filter_timeout(),
                    self.config.suppress_fake_segments,
                ),
                filter_timer: None,
                refused: false,
            },
        );
        self.attach(window);
        // Roots staged before the window could be bound.
        self.set_roots(window);
    }

    /// Register `window` with the service and resync it from scratch.
    fn attach(&mut self, window: WindowId) {
        if !(self.enabled && self.service_up) {
            return;
        }
        let Some(wm) = self.windows.get_mut(&window) else {
            return;
        };
        if wm.refused || wm.tree.native_window().is_some() {
            return;
        }
        match self.bridge.register_window(wm.native_id) {
            Ok(handle) => {
                log::info!("registered {} with the global menu", window);
                debug_info!("GLOBAL_MENU", "{} registered as {:?}", window, handle);
                wm.tree.reset();
                wm.tree.set_native_window(Some(handle));
                self.by_native.insert(handle, window);
            }
            Err(e) => {
                let err = MirrorError::RegistrationRefused(e);
                log::warn!("{}: {}", window, err);
                debug_error!("GLOBAL_MENU", "{}: {}", window, err);
                wm.refused = true;
                return;
            }
        }
        self.request_roots(window);
    }

    /// Ask the host for a fresh root snapshot of `window`.
    fn request_roots(&mut self, window: WindowId) {
        let Some(wm) = self.windows.get(&window) else {
            return;
        };
        if wm.tree.root_ids.is_empty() {
            return;
        }
        let ids = wm.tree.root_ids.clone();
        let depth = self.config.root_depth();
        let shared = wm.shared.clone();
        let tx = self.self_tx.clone();
        self.host.post(Box::new(move |tree| {
            let roots = capture_items(tree, &ids, depth);
            if shared.stage_roots(roots) {
                let _ = tx.send(LoopMsg::SetRoots { window });
            }
        }));
    }

    fn set_roots(&mut self, window: WindowId) {
        // Unbound windows keep their snapshot staged until `bind`.
        let Some(wm) = self.windows.get_mut(&window) else {
            return;
        };
        let Some(roots) = wm.shared.take_roots() else {
            return;
        };
        wm.tree.root_ids = roots.iter().map(|r| r.id).collect();
        let depth = self.config.root_depth();
        let Some(stats) = wm
            .tree
            .reconcile_at(&mut self.bridge, Uid::ROOT, &roots, depth, self.tracer)
        else {
            return;
        };
        debug_log!("GLOBAL_MENU", "{} roots synced: {}", window, stats);

        let registered = wm.tree.native_window().is_some();
        self.set_presented(window, registered);
    }

    fn unbind(&mut self, window: WindowId) {
        let Some(mut wm) = self.windows.remove(&window) else {
            log::debug!("unbind of unknown {} ignored", window);
            return;
        };
        Self::cancel_filter(&mut self.timers, &mut wm);
        wm.shared.presented.store(false, Ordering::Release);
        match wm.tree.native_window() {
            Some(handle) => {
                self.by_native.remove(&handle);
                let tx = self.self_tx.clone();
                self.bridge.release_window(
                    handle,
                    Box::new(move || {
                        let _ = tx.send(LoopMsg::Released { window });
                    }),
                );
            }
            None => {
                self.host.post(Box::new(move |tree| tree.window_released(window)));
            }
        }
    }

    /// Drop the native side of every window, keeping the windows bound.
    fn detach_all(&mut self) {
        let windows: Vec<WindowId> = self.windows.keys().copied().collect();
        for window in windows {
            if let Some(wm) = self.windows.get_mut(&window) {
                if self.service_up
                    && let Some(handle) = wm.tree.native_window()
                {
                    self.bridge.release_window(handle, Box::new(|| {}));
                }
                Self::reset_window(&mut self.timers, wm);
            }
            self.set_presented(window, false);
        }
        self.by_native.clear();
    }

    fn reset_window(timers: &mut TimerQueue<LoopTimer>, wm: &mut WindowMirror) {
        Self::cancel_filter(timers, wm);
        let dropped = wm.filter.drain();
        if !dropped.is_empty() {
            log::debug!("dropping {} held events of a detached window", dropped.len());
        }
        wm.tree.reset();
    }

    fn cancel_filter(timers: &mut TimerQueue<LoopTimer>, wm: &mut WindowMirror) {
        if let Some(id) = wm.filter_timer.take() {
            timers.cancel(id);
        }
    }

    fn set_presented(&mut self, window: WindowId, presented: bool) {
        let Some(wm) = self.windows.get(&window) else {
            return;
        };
        if wm.shared.presented.swap(presented, Ordering::AcqRel) != presented {
            self.host
                .post(Box::new(move |tree| tree.set_native_menu_presented(window, presented)));
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        log::info!("global menu {}", if enabled { "enabled" } else { "disabled" });
        if enabled {
            self.enabled = true;
            self.attach_all();
        } else {
            self.detach_all();
            self.enabled = false;
        }
    }

    fn attach_all(&mut self) {
        let windows: Vec<WindowId> = self.windows.keys().copied().collect();
        for window in windows {
            self.attach(window);
        }
    }

    fn service_appeared(&mut self) {
        if self.service_up {
            return;
        }
        log::info!("global menu service appeared");
        self.service_up = true;
        self.attach_all();
    }

    fn service_vanished(&mut self) {
        if !self.service_up {
            return;
        }
        log::info!("global menu service vanished, hosts fall back to their own menu bars");
        // The service took its registrations with it; nothing to release.
        self.service_up = false;
        self.detach_all();
    }

    // ---- events ----

    fn on_event(&mut self, native_window: NativeHandle, uid: Uid, kind: EventKind, now: Instant) {
        let Some(&window) = self.by_native.get(&native_window) else {
            self.tracer.trace(
                TraceCategory::Hierarchy,
                format_args!(
                    "{:?} for uid {} on unknown native window {:?} dropped",
                    kind, uid, native_window
                ),
            );
            return;
        };
        self.tracer
            .trace(TraceCategory::Events, format_args!("{} uid {} {:?}", window, uid, kind));

        let Some(wm) = self.windows.get_mut(&window) else {
            return;
        };
        let root_index = wm.tree.root_index_of(uid);
        let (Some(root_index), false) = (root_index, self.config.disable_event_filtering) else {
            self.dispatch(window, uid, kind, now);
            return;
        };

        let verdict = wm.filter.on_event(QueuedNativeEvent {
            uid,
            kind,
            root_index,
            at: now,
        });
        match verdict {
            FilterVerdict::Deliver(events) => {
                Self::cancel_filter(&mut self.timers, wm);
                for event in events {
                    self.dispatch(window, event.uid, event.kind, now);
                }
            }
            FilterVerdict::Held { idle_deadline } => {
                Self::cancel_filter(&mut self.timers, wm);
                let timer = self.timers.schedule(idle_deadline, LoopTimer::FilterIdle(window));
                wm.filter_timer = Some(timer);
            }
        }
    }

    fn filter_idle(&mut self, window: WindowId, now: Instant) {
        let Some(wm) = self.windows.get_mut(&window) else {
            return;
        };
        wm.filter_timer = None;
        let root_count = wm.tree.root_count();
        for event in wm.filter.on_idle(root_count) {
            self.dispatch(window, event.uid, event.kind, now);
        }
    }

    /// Act on an event that got through the filter.
    fn dispatch(&mut self, window: WindowId, uid: Uid, kind: EventKind, now: Instant) {
        match kind {
            EventKind::AboutToShow => self.fill(window, uid, now),
            EventKind::Opened if !self.config.skip_open_fill => self.fill(window, uid, now),
            EventKind::Closed => self.schedule_clear(window, uid, now),
            EventKind::Clicked => self.click(window, uid),
            EventKind::Opened
            | EventKind::Activated
            | EventKind::Shown
            | EventKind::ChildAdded => {}
        }
    }

    fn mismatch(&self, uid: Uid, reason: &'static str) {
        let err = MirrorError::HierarchyMismatch { uid, reason };
        self.tracer.trace(TraceCategory::Hierarchy, format_args!("{}", err));
    }

    /// Lazily populate the submenu `uid` from the host.
    pub(crate) fn fill(&mut self, window: WindowId, uid: Uid, now: Instant) {
        let Some(wm) = self.windows.get_mut(&window) else {
            return;
        };
        let Some(path) = wm.tree.path_of(uid) else {
            self.mismatch(uid, "event for unknown uid dropped");
            return;
        };
        if path.is_empty() {
            return;
        }
        // Reopened: it and its ancestors are in use again.
        for id in take_clear_timers(&mut wm.tree.root, &path) {
            self.timers.cancel(id);
        }
        let Some(node) = wm.tree.node_at(&path) else {
            return;
        };
        if node.kind() != ItemKind::Submenu {
            self.mismatch(uid, "fill requested for a non-submenu item");
            return;
        }
        if node.fill().is_fresh(now, self.config.fill_debounce()) {
            log::trace!("uid {} filled recently, skipping", uid);
            return;
        }
        let Some(host_id) = node.host() else {
            self.mismatch(uid, "submenu has no host node to fill from");
            return;
        };

        let depth = self.config.fill_depth();
        let close_popups = !self.config.keep_popups_on_fill;
        let items = self.host.ask(self.config.host_wait(), move |tree| {
            if close_popups {
                tree.close_popups();
            }
            capture_children(tree, host_id, depth)
        });
        let Some(items) = items else {
            let err = MirrorError::HostTimeout(self.config.host_wait_ms);
            log::warn!("fill of uid {} skipped: {}", uid, err);
            return;
        };

        let Some((node, uids)) = wm.tree.split_at(&path) else {
            return;
        };
        let stats = ReconciliationEngine::new(&mut self.bridge, uids, self.tracer)
            .reconcile(node, &items, depth);
        node.fill.mark_filled(now);
        debug_log!("GLOBAL_MENU", "{} filled uid {}: {}", window, uid, stats);
    }

    /// Arm the clear timer of a closed submenu.
    pub(crate) fn schedule_clear(&mut self, window: WindowId, uid: Uid, now: Instant) {
        let Some(wm) = self.windows.get_mut(&window) else {
            return;
        };
        let Some(path) = wm.tree.path_of(uid).filter(|p| !p.is_empty()) else {
            return;
        };
        let Some(node) = wm.tree.node_at_mut(&path) else {
            return;
        };
        if node.kind != ItemKind::Submenu {
            return;
        }
        if let Some(old) = node.fill.clear_timer.take() {
            self.timers.cancel(old);
        }
        let at = now + self.config.clear_delay();
        node.fill.clear_timer = Some(self.timers.schedule(at, LoopTimer::Clear { window, uid }));
    }

    /// Clear timer fired: drop host references below `uid`.
    pub(crate) fn clear(&mut self, window: WindowId, uid: Uid, now: Instant) {
        let Some(wm) = self.windows.get_mut(&window) else {
            return;
        };
        let Some(path) = wm.tree.path_of(uid) else {
            return;
        };
        let Some(node) = wm.tree.node_at_mut(&path) else {
            return;
        };
        let detached = clear_subtree(node, now);
        self.tracer.trace(
            TraceCategory::Clearing,
            format_args!("{} uid {} cleared, {} host references dropped", window, uid, detached),
        );
        if let Some(host_id) = release_target(node) {
            self.host.post(Box::new(move |tree| tree.release_children(host_id)));
        }
    }

    fn click(&mut self, window: WindowId, uid: Uid) {
        let Some(node) = self.windows.get(&window).and_then(|wm| wm.tree.node(uid)) else {
            self.mismatch(uid, "click on unknown uid dropped");
            return;
        };
        if !node.kind().is_invokable() {
            self.mismatch(uid, "click on an item without an action");
            return;
        }
        let Some(host_id) = node.host() else {
            self.mismatch(uid, "click on an item without a host node");
            return;
        };
        debug_trace!("GLOBAL_MENU", "{} click on uid {} -> host {:?}", window, uid, host_id);
        self.host.post(Box::new(move |tree| {
            if !tree.invoke_action(host_id) {
                log::debug!("host node {:?} vanished before its click", host_id);
            }
        }));
    }
}
