//! Shared integration test helpers for par-global-menu.
//!
//! This module provides an in-memory host menu tree, a canonical sample
//! menu, and helpers for driving a threaded registry from the test thread,
//! which plays the part of the host UI thread.
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::{FakeHost, sample_menu, spawn_registry};
//! ```
//!
//! The `#[allow(dead_code)]` attribute suppresses warnings when only a
//! subset of helpers are used per file.

#![allow(dead_code)]

use par_global_menu::config::MirrorConfig;
use par_global_menu::{
    CheckStyle, HostClass, HostItem, HostMenuTree, HostNodeId, HostPump, RecordingBridge,
    RecordingOptions, RecordingProbe, WindowId, WindowMirrorRegistry, host_channel,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Native id handed out for [`MAIN`].
pub const MAIN_NATIVE: u64 = 0x0400_0001;
pub const MAIN: WindowId = WindowId(1);

/// Upper bound for anything the native loop has to do in a test.
pub const SETTLE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct FakeNode {
    pub class: HostClass,
    pub label: String,
    pub enabled: bool,
    pub checked: bool,
    pub check: CheckStyle,
    pub mnemonic: Option<char>,
    pub children: Vec<u64>,
}

impl FakeNode {
    fn new(class: HostClass, label: &str) -> Self {
        Self {
            class,
            label: label.to_string(),
            enabled: true,
            checked: false,
            check: CheckStyle::None,
            mnemonic: None,
            children: Vec::new(),
        }
    }
}

/// In-memory host menu tree that records what the mirror asks of it.
#[derive(Debug, Default)]
pub struct FakeHost {
    pub nodes: HashMap<u64, FakeNode>,
    pub native_ids: HashMap<WindowId, u64>,
    pub invoked: Vec<HostNodeId>,
    pub presented: HashMap<WindowId, bool>,
    pub released_children: Vec<HostNodeId>,
    pub released_windows: Vec<WindowId>,
    pub popups_closed: usize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submenu(&mut self, id: u64, label: &str, children: &[u64]) -> &mut Self {
        let mut node = FakeNode::new(HostClass::Submenu, label);
        node.children = children.to_vec();
        self.nodes.insert(id, node);
        self
    }

    pub fn action(&mut self, id: u64, label: &str) -> &mut Self {
        self.nodes.insert(id, FakeNode::new(HostClass::Action, label));
        self
    }

    pub fn checkable(&mut self, id: u64, label: &str, checked: bool) -> &mut Self {
        let mut node = FakeNode::new(HostClass::Action, label);
        node.check = CheckStyle::Check;
        node.checked = checked;
        self.nodes.insert(id, node);
        self
    }

    pub fn separator(&mut self, id: u64) -> &mut Self {
        self.nodes.insert(id, FakeNode::new(HostClass::Separator, ""));
        self
    }

    pub fn window(&mut self, window: WindowId, native_id: u64) -> &mut Self {
        self.native_ids.insert(window, native_id);
        self
    }

    pub fn set_children(&mut self, id: u64, children: &[u64]) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.children = children.to_vec();
        }
    }

    pub fn node_mut(&mut self, id: u64) -> &mut FakeNode {
        self.nodes.get_mut(&id).expect("node exists")
    }

    pub fn is_presented(&self, window: WindowId) -> bool {
        self.presented.get(&window).copied().unwrap_or(false)
    }
}

impl HostMenuTree for FakeHost {
    fn children(&self, node: HostNodeId) -> Vec<HostNodeId> {
        self.nodes
            .get(&node.0)
            .map(|n| n.children.iter().map(|&c| HostNodeId(c)).collect())
            .unwrap_or_default()
    }

    fn classify(&self, node: HostNodeId) -> HostClass {
        self.nodes.get(&node.0).map_or(HostClass::Unknown, |n| n.class)
    }

    fn label(&self, node: HostNodeId) -> Option<String> {
        self.nodes.get(&node.0).map(|n| n.label.clone())
    }

    fn is_enabled(&self, node: HostNodeId) -> bool {
        self.nodes.get(&node.0).is_some_and(|n| n.enabled)
    }

    fn mnemonic(&self, node: HostNodeId) -> Option<char> {
        self.nodes.get(&node.0).and_then(|n| n.mnemonic)
    }

    fn is_checked(&self, node: HostNodeId) -> bool {
        self.nodes.get(&node.0).is_some_and(|n| n.checked)
    }

    fn check_style(&self, node: HostNodeId) -> CheckStyle {
        self.nodes.get(&node.0).map_or(CheckStyle::None, |n| n.check)
    }

    fn invoke_action(&mut self, node: HostNodeId) -> bool {
        if !self.nodes.contains_key(&node.0) {
            return false;
        }
        self.invoked.push(node);
        true
    }

    fn native_window_id(&self, window: WindowId) -> u64 {
        self.native_ids.get(&window).copied().unwrap_or(0)
    }

    fn set_native_menu_presented(&mut self, window: WindowId, presented: bool) {
        self.presented.insert(window, presented);
    }

    fn release_children(&mut self, node: HostNodeId) {
        self.released_children.push(node);
    }

    fn close_popups(&mut self) {
        self.popups_closed += 1;
    }

    fn window_released(&mut self, window: WindowId) {
        self.released_windows.push(window);
    }
}

/// The menu used across the suites:
///
/// ```text
/// File(10): Open(11) Recent(12 > a.txt(14)) ---(15) Quit(13)
/// Edit(20): Undo(21) Redo(22)
/// View(30): Wrap(31, checkable)
/// ```
pub fn sample_menu() -> FakeHost {
    let mut host = FakeHost::new();
    host.submenu(10, "File", &[11, 12, 15, 13])
        .action(11, "Open")
        .submenu(12, "Recent", &[14])
        .action(14, "a.txt")
        .separator(15)
        .action(13, "Quit")
        .submenu(20, "Edit", &[21, 22])
        .action(21, "Undo")
        .action(22, "Redo")
        .submenu(30, "View", &[31])
        .checkable(31, "Wrap", false)
        .window(MAIN, MAIN_NATIVE);
    host
}

pub const SAMPLE_ROOTS: [HostNodeId; 3] = [HostNodeId(10), HostNodeId(20), HostNodeId(30)];

/// Host snapshot of a flat list of actions, for engine-level tests.
pub fn actions(labels: &[&str]) -> Vec<HostItem> {
    labels
        .iter()
        .enumerate()
        .map(|(i, l)| HostItem::action(i as u64 + 1, l))
        .collect()
}

pub struct Running {
    pub registry: WindowMirrorRegistry,
    pub probe: RecordingProbe,
    pub pump: HostPump,
    pub host: FakeHost,
}

impl Running {
    /// Pump host tasks until `cond` holds or [`SETTLE`] passes.
    pub fn wait_for(&mut self, mut cond: impl FnMut(&FakeHost, &RecordingProbe) -> bool) -> bool {
        let deadline = Instant::now() + SETTLE;
        loop {
            self.pump.run_pending(&mut self.host);
            if cond(&self.host, &self.probe) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            self.pump.run_for(&mut self.host, Duration::from_millis(5));
        }
    }

    /// Pump host tasks for a fixed period.
    pub fn settle(&mut self, period: Duration) {
        self.pump.run_for(&mut self.host, period);
    }

    /// Bind [`MAIN`] and publish the sample roots.
    pub fn bind_main(&mut self) -> bool {
        let bound = self.registry.bind_window(&self.host, MAIN);
        self.registry.set_roots(&self.host, MAIN, &SAMPLE_ROOTS);
        bound
    }
}

/// Start a registry over a recording bridge with the sample menu as host.
pub fn spawn_registry(config: MirrorConfig, options: RecordingOptions) -> Running {
    let (queue, pump) = host_channel();
    let (bridge, probe) = RecordingBridge::new(options);
    let registry = WindowMirrorRegistry::spawn(config, queue, move || Ok(bridge));
    Running {
        registry,
        probe,
        pump,
        host: sample_menu(),
    }
}
