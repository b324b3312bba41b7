//! Process-wide entry point for mirroring window menus.
//!
//! The host constructs one [`WindowMirrorRegistry`] and calls it from its
//! UI thread. The registry owns the native loop thread and forwards every
//! request to it as a message; it never blocks on the loop except while
//! starting and shutting down.

use crate::bridge::{EventSink, NativeMenuBridge};
use crate::error::{BridgeError, MirrorError};
use crate::host::{HostMenuTree, HostQueue, capture_items};
use crate::native_loop::{LoopMsg, NativeLoop, WindowShared};
use crate::types::{HostNodeId, WindowId};
use par_global_menu_config::MirrorConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long `spawn` waits for the bridge to connect.
const START_TIMEOUT: Duration = Duration::from_secs(5);

const LOOP_THREAD_NAME: &str = "par-global-menu";

/// Service transitions a host may observe on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEvent {
    Appeared,
    Vanished,
}

pub struct WindowMirrorRegistry {
    config: MirrorConfig,
    /// `None` when the environment has no global menu; every call is a no-op.
    tx: Option<Sender<LoopMsg>>,
    thread: Option<JoinHandle<()>>,
    windows: HashMap<WindowId, Arc<WindowShared>>,
}

impl WindowMirrorRegistry {
    /// Start the native loop. `factory` runs on the loop thread and builds
    /// the bridge there. If the bridge cannot be built or started, the
    /// registry comes up in no-op mode and hosts keep their own menu bars.
    pub fn spawn<B, F>(config: MirrorConfig, host: HostQueue, factory: F) -> Self
    where
        B: NativeMenuBridge + 'static,
        F: FnOnce() -> Result<B, BridgeError> + Send + 'static,
    {
        Self::start(config, host, factory, START_TIMEOUT)
    }

    fn start<B, F>(config: MirrorConfig, host: HostQueue, factory: F, timeout: Duration) -> Self
    where
        B: NativeMenuBridge + 'static,
        F: FnOnce() -> Result<B, BridgeError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), BridgeError>>(1);
        let loop_tx = tx.clone();
        let loop_config = config.clone();

        let spawned = thread::Builder::new()
            .name(LOOP_THREAD_NAME.to_string())
            .spawn(move || {
                let mut bridge = match factory() {
                    Ok(bridge) => bridge,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = bridge.start(EventSink::new(loop_tx.clone())) {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
                let _ = ready_tx.send(Ok(()));
                NativeLoop::new(bridge, host, loop_config, loop_tx).run(rx);
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                log::error!("failed to spawn native menu loop: {}", e);
                return Self::unavailable(config);
            }
        };

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(())) => {
                log::info!("global menu bridge started");
                Self {
                    config,
                    tx: Some(tx),
                    thread: Some(thread),
                    windows: HashMap::new(),
                }
            }
            Ok(Err(e)) => {
                log::warn!("{}", MirrorError::Unavailable(e));
                let _ = thread.join();
                Self::unavailable(config)
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "global menu bridge did not start within {} ms, running without it",
                    timeout.as_millis()
                );
                // The loop exits on this once the factory returns.
                let _ = tx.send(LoopMsg::Shutdown);
                Self {
                    config,
                    tx: None,
                    thread: Some(thread),
                    windows: HashMap::new(),
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::error!("native menu loop exited during startup");
                let _ = thread.join();
                Self::unavailable(config)
            }
        }
    }

    /// A registry that never mirrors anything.
    pub fn unavailable(config: MirrorConfig) -> Self {
        Self {
            config,
            tx: None,
            thread: None,
            windows: HashMap::new(),
        }
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// The bridge is running; windows may be mirrored.
    pub fn is_available(&self) -> bool {
        self.tx.is_some()
    }

    fn send(&self, msg: LoopMsg) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        if tx.send(msg).is_err() {
            log::warn!("{}", MirrorError::LoopGone);
            return false;
        }
        true
    }

    /// Start mirroring `window`. Returns false if the host cannot name the
    /// native window yet (retry later) or the feature is unavailable.
    pub fn bind_window(&mut self, tree: &dyn HostMenuTree, window: WindowId) -> bool {
        if !self.is_available() {
            return false;
        }
        let native_id = tree.native_window_id(window);
        if native_id == 0 {
            log::debug!("{} has no native id yet", window);
            return false;
        }
        let shared = self.windows.entry(window).or_default().clone();
        self.send(LoopMsg::Bind {
            window,
            native_id,
            shared,
        })
    }

    /// Replace the root menus of `window`. Snapshots the roots on the
    /// calling (host) thread; rapid calls coalesce into one sync.
    pub fn set_roots(&mut self, tree: &dyn HostMenuTree, window: WindowId, roots: &[HostNodeId]) {
        if !self.is_available() {
            return;
        }
        let snapshot = capture_items(tree, roots, self.config.root_depth());
        let shared = self.windows.entry(window).or_default().clone();
        if shared.stage_roots(snapshot) {
            self.send(LoopMsg::SetRoots { window });
        }
    }

    /// Stop mirroring `window`. Safe to call repeatedly. The host is told
    /// through [`HostMenuTree::window_released`] once the service let go.
    pub fn unbind_window(&mut self, window: WindowId) {
        if self.windows.remove(&window).is_some() {
            self.send(LoopMsg::Unbind { window });
        }
    }

    /// Switch mirroring on or off at runtime.
    pub fn set_enabled(&self, enabled: bool) {
        self.send(LoopMsg::SetEnabled(enabled));
    }

    /// The global menu currently shows `window`'s menu, so the host should
    /// hide its own menu bar. Only a hint: it may change at any moment.
    pub fn is_presented(&self, window: WindowId) -> bool {
        self.windows.get(&window).is_some_and(|s| s.is_presented())
    }

    /// Forward a service transition observed by the host.
    pub fn broadcast(&self, event: ServiceEvent) {
        self.send(match event {
            ServiceEvent::Appeared => LoopMsg::ServiceAppeared,
            ServiceEvent::Vanished => LoopMsg::ServiceVanished,
        });
    }

    /// Release every window and stop the native loop. A loop whose bridge
    /// never finished starting is joined only once it has exited; until
    /// then it stays detached.
    pub fn shutdown(&mut self) {
        self.windows.clear();
        let running = match self.tx.take() {
            Some(tx) => {
                let _ = tx.send(LoopMsg::Shutdown);
                true
            }
            None => false,
        };
        let Some(thread) = self.thread.take() else {
            return;
        };
        if !running && !thread.is_finished() {
            log::warn!("native menu loop still stuck in bridge startup, leaving it detached");
            self.thread = Some(thread);
            return;
        }
        if thread.join().is_err() {
            log::error!("native menu loop panicked");
        }
    }
}

impl Drop for WindowMirrorRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{RecordingBridge, RecordingOptions};
    use crate::host::host_channel;

    #[test]
    fn test_unavailable_bridge_gives_noop_registry() {
        let (queue, _pump) = host_channel();
        let (bridge, _probe) = RecordingBridge::new(RecordingOptions {
            unavailable: true,
            ..RecordingOptions::default()
        });
        let mut registry =
            WindowMirrorRegistry::spawn(MirrorConfig::default(), queue, move || Ok(bridge));
        assert!(!registry.is_available());
        registry.unbind_window(WindowId(1));
        assert!(!registry.is_presented(WindowId(1)));
        registry.shutdown();
    }

    #[test]
    fn test_factory_error_gives_noop_registry() {
        let (queue, _pump) = host_channel();
        let registry = WindowMirrorRegistry::spawn(MirrorConfig::default(), queue, || {
            Err::<RecordingBridge, _>(BridgeError::Unavailable("no session bus".into()))
        });
        assert!(!registry.is_available());
    }

    #[test]
    fn test_shutdown_twice() {
        let (queue, _pump) = host_channel();
        let (bridge, _probe) = RecordingBridge::new(RecordingOptions::default());
        let mut registry =
            WindowMirrorRegistry::spawn(MirrorConfig::default(), queue, move || Ok(bridge));
        assert!(registry.is_available());
        registry.shutdown();
        registry.shutdown();
        assert!(!registry.is_available());
    }

    #[test]
    fn test_stalled_start_joined_after_it_exits() {
        let (queue, _pump) = host_channel();
        let (bridge, _probe) = RecordingBridge::new(RecordingOptions::default());
        let (release, blocked) = mpsc::channel::<()>();
        let factory = move || {
            let _ = blocked.recv();
            Ok(bridge)
        };
        let timeout = Duration::from_millis(20);
        let mut registry =
            WindowMirrorRegistry::start(MirrorConfig::default(), queue, factory, timeout);
        assert!(!registry.is_available());
        assert!(registry.thread.is_some());

        // Must not block while the factory is still stuck.
        registry.shutdown();
        assert!(registry.thread.is_some());

        release.send(()).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while registry.thread.as_ref().is_some_and(|t| !t.is_finished())
            && std::time::Instant::now() < deadline
        {
            thread::sleep(Duration::from_millis(5));
        }
        registry.shutdown();
        assert!(registry.thread.is_none());
    }
}
