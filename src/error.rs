//! Typed error types for par-global-menu.
//!
//! None of these escape the public registry API: every failure is absorbed
//! where it happens and surfaced through logging, so a mirroring glitch can
//! never break the host application. They exist so the bridge adapter and
//! the internals can say *what* went wrong.

use crate::mirror::Uid;
use thiserror::Error;

/// Failure reported by a [`NativeMenuBridge`](crate::bridge::NativeMenuBridge)
/// call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The native library or the menu service is not present.
    #[error("native menu service unavailable: {0}")]
    Unavailable(String),

    /// The service refused to register a window.
    #[error("native menu service refused window {0:#x}")]
    Refused(u64),

    /// The handle passed to the call is no longer known to the service,
    /// typically because its window is being torn down.
    #[error("stale native handle {0}")]
    StaleHandle(u64),

    /// Any other failure of the native call.
    #[error("native call failed: {0}")]
    Call(String),
}

/// Errors produced inside the mirror.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The native environment is missing; the feature is disabled.
    #[error("global menu unavailable: {0}")]
    Unavailable(#[source] BridgeError),

    /// The service refused to register the window; it keeps its own menu bar.
    #[error("window registration refused: {0}")]
    RegistrationRefused(#[source] BridgeError),

    /// An event or host item does not fit the mirrored hierarchy.
    #[error("hierarchy mismatch for uid {uid}: {reason}")]
    HierarchyMismatch { uid: Uid, reason: &'static str },

    /// The native loop thread has exited.
    #[error("native loop is not running")]
    LoopGone,

    /// The host thread did not answer within the bounded wait.
    #[error("host thread did not answer within {0} ms")]
    HostTimeout(u64),
}
