// Library exports for the global menu mirror
//
// # Thread Ownership Policy
//
// Two threads take part, never more:
//
//   - Host UI thread: owns the host menu tree and is the only thread that
//     reads host widget state or invokes host actions. Reached through
//     `HostQueue` tasks drained by `HostPump`.
//
//   - Native loop thread: owns the `NativeMenuBridge` and every `MirrorTree`
//     and is the only thread that calls into the menu service. Reached
//     through `LoopMsg` messages.
//
// Mirror state is never locked. Between the two threads, a `parking_lot::Mutex`
// guards only the staged root snapshot handed from the host thread to the
// loop; presentation status is an atomic the host may read at any time.

/// Library version (root crate version, for use by embedders).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[macro_use]
pub mod debug;

pub mod bridge;
pub mod config {
    //! Configuration re-exports from the par-global-menu-config crate.
    pub use par_global_menu_config::{ConfigError, ENV_PREFIX, MirrorConfig, TraceConfig, defaults};
}
pub mod error;
pub mod filter;
pub mod host;
pub mod mirror;
pub(crate) mod native_loop;
pub mod registry;
pub mod timer;
pub mod types;

pub use bridge::{
    EventSink, NativeHandle, NativeMenuBridge, RecordingBridge, RecordingOptions, RecordingProbe,
};
pub use error::{BridgeError, MirrorError};
pub use host::{CheckStyle, HostClass, HostItem, HostMenuTree, HostPump, HostQueue, host_channel};
pub use mirror::{MirrorTree, SyncStats, Uid};
pub use registry::{ServiceEvent, WindowMirrorRegistry};
pub use types::{
    ActionId, EventKind, HostNodeId, ItemKind, KeyModifiers, Presentation, Shortcut, WindowId,
};
