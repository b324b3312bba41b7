//! Task channel from the native loop to the host thread.
//!
//! The native loop never touches the host tree directly. It posts boxed
//! closures that the host runs on its own thread, either fire-and-forget
//! ([`HostLink::post`]) or with a bounded wait for the result
//! ([`HostLink::ask`]). The host drains the queue from its event loop through
//! [`HostPump`]; an optional waker lets the host schedule that drain.

use super::HostMenuTree;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};

/// A unit of work executed on the host thread.
pub type HostTask = Box<dyn FnOnce(&mut dyn HostMenuTree) + Send>;

type Waker = Arc<dyn Fn() + Send + Sync>;

/// How the native loop reaches the host thread.
pub trait HostLink {
    /// Queue `task` for the host thread. Returns false if the host side is gone.
    fn post(&self, task: HostTask) -> bool;

    /// Run `f` on the host thread and wait up to `timeout` for its result.
    /// `None` means the host did not answer in time or is gone; a late
    /// answer is discarded.
    fn ask<T, F>(&self, timeout: Duration, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn HostMenuTree) -> T + Send + 'static;
}

/// Sending half, cloned freely between the registry and the native loop.
#[derive(Clone)]
pub struct HostQueue {
    tx: Sender<HostTask>,
    waker: Option<Waker>,
}

impl std::fmt::Debug for HostQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostQueue")
            .field("waker", &self.waker.is_some())
            .finish()
    }
}

impl HostQueue {
    /// Call `waker` after every posted task so the host event loop knows to
    /// run [`HostPump::run_pending`].
    pub fn with_waker(mut self, waker: impl Fn() + Send + Sync + 'static) -> Self {
        self.waker = Some(Arc::new(waker));
        self
    }

    fn wake(&self) {
        if let Some(waker) = &self.waker {
            waker();
        }
    }
}

impl HostLink for HostQueue {
    fn post(&self, task: HostTask) -> bool {
        if self.tx.send(task).is_err() {
            log::debug!("host queue closed, dropping task");
            return false;
        }
        self.wake();
        true
    }

    fn ask<T, F>(&self, timeout: Duration, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn HostMenuTree) -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let task: HostTask = Box::new(move |tree| {
            // The asker may have given up already.
            let _ = reply_tx.send(f(tree));
        });
        if !self.post(task) {
            return None;
        }
        match reply_rx.recv_timeout(timeout) {
            Ok(value) => Some(value),
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("host thread did not answer within {} ms", timeout.as_millis());
                None
            }
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Receiving half, owned by the host thread.
pub struct HostPump {
    rx: Receiver<HostTask>,
}

impl HostPump {
    /// Run every task queued so far. Returns how many ran.
    pub fn run_pending(&self, tree: &mut dyn HostMenuTree) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    task(tree);
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return ran,
            }
        }
    }

    /// Block for up to `duration`, running tasks as they arrive. For hosts
    /// without an event loop of their own, and for tests.
    pub fn run_for(&self, tree: &mut dyn HostMenuTree, duration: Duration) -> usize {
        let deadline = Instant::now() + duration;
        let mut ran = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return ran + self.run_pending(tree);
            }
            match self.rx.recv_timeout(remaining) {
                Ok(task) => {
                    task(tree);
                    ran += 1;
                }
                Err(RecvTimeoutError::Timeout) => return ran,
                Err(RecvTimeoutError::Disconnected) => return ran,
            }
        }
    }
}

/// Create a connected queue/pump pair.
pub fn host_channel() -> (HostQueue, HostPump) {
    let (tx, rx) = mpsc::channel();
    (HostQueue { tx, waker: None }, HostPump { rx })
}
