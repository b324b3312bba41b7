//! Default values referenced by `#[serde(default = ...)]` attributes.

// ── Primitive helpers ──────────────────────────────────────────────────────

pub fn bool_false() -> bool {
    false
}

pub fn bool_true() -> bool {
    true
}

// ── Lazy fill ──────────────────────────────────────────────────────────────

/// Window during which a repeated fill trigger for the same submenu is ignored.
pub fn fill_debounce_ms() -> u64 {
    1500
}

/// Idle time after a submenu closes before its cached host children are released.
pub fn clear_delay_ms() -> u64 {
    2000
}

/// Upper bound on how long the native loop waits for the host thread to
/// materialise a submenu.
pub fn host_wait_ms() -> u64 {
    500
}

// ── Event filter ───────────────────────────────────────────────────────────

/// Quiet period that ends an event burst.
pub fn filter_idle_ms() -> u64 {
    50
}

/// Safety valve: a burst held longer than this is flushed unfiltered.
pub fn filter_timeout_ms() -> u64 {
    2000
}
