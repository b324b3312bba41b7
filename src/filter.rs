//! Suppression of spurious native event bursts.
//!
//! Some global menu applets answer the first interaction with a menu bar by
//! opening and closing every root in turn. Reacting to each of those
//! signals would fill and clear every root menu. The filter holds events
//! starting at the first root for a short idle period, strips the
//! recognisable fake sweep from the held sequence and releases the rest in
//! order.
//!
//! The filter never drops an event outside a recognised fake segment, and a
//! held sequence is released no later than the timeout.

use crate::mirror::Uid;
use crate::types::EventKind;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// An event as seen by the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedNativeEvent {
    pub uid: Uid,
    pub kind: EventKind,
    /// Index of the root menu the event belongs to.
    pub root_index: usize,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    Open,
    /// Holding events since the given instant.
    Closed(Instant),
}

/// What the caller should do with an incoming event.
#[derive(Debug, PartialEq, Eq)]
pub enum FilterVerdict {
    /// Act on these now, in order.
    Deliver(Vec<QueuedNativeEvent>),
    /// Held; call [`EventFilter::on_idle`] once `idle_deadline` passes
    /// without further events.
    Held { idle_deadline: Instant },
}

#[derive(Debug)]
pub struct EventFilter {
    state: FilterState,
    queue: VecDeque<QueuedNativeEvent>,
    idle: Duration,
    timeout: Duration,
    suppress_fake_segments: bool,
}

impl EventFilter {
    pub fn new(idle: Duration, timeout: Duration, suppress_fake_segments: bool) -> Self {
        Self {
            state: FilterState::Open,
            queue: VecDeque::new(),
            idle,
            timeout,
            suppress_fake_segments,
        }
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    pub fn held(&self) -> usize {
        self.queue.len()
    }

    pub fn on_event(&mut self, event: QueuedNativeEvent) -> FilterVerdict {
        match self.state {
            FilterState::Closed(since)
                if event.at.saturating_duration_since(since) > self.timeout =>
            {
                log::debug!(
                    "event filter closed for {} ms, flushing {} held events",
                    event.at.saturating_duration_since(since).as_millis(),
                    self.queue.len()
                );
                self.state = FilterState::Open;
                let mut flushed: Vec<_> = self.queue.drain(..).collect();
                flushed.push(event);
                FilterVerdict::Deliver(flushed)
            }
            FilterState::Closed(_) => {
                self.queue.push_back(event);
                FilterVerdict::Held {
                    idle_deadline: event.at + self.idle,
                }
            }
            FilterState::Open if event.root_index != 0 => FilterVerdict::Deliver(vec![event]),
            FilterState::Open => {
                self.queue.push_back(event);
                self.state = FilterState::Closed(event.at);
                FilterVerdict::Held {
                    idle_deadline: event.at + self.idle,
                }
            }
        }
    }

    /// The idle period passed: drop fake segments and release the rest.
    pub fn on_idle(&mut self, root_count: usize) -> Vec<QueuedNativeEvent> {
        let mut held: Vec<_> = self.queue.drain(..).collect();
        if self.suppress_fake_segments {
            let before = held.len();
            remove_fake_segments(&mut held, root_count);
            if held.len() != before {
                log::debug!("event filter dropped {} burst events", before - held.len());
            }
        }
        self.state = FilterState::Open;
        held
    }

    /// Release everything without filtering, e.g. when the window goes away.
    pub fn drain(&mut self) -> Vec<QueuedNativeEvent> {
        self.state = FilterState::Open;
        self.queue.drain(..).collect()
    }
}

/// Remove every run that starts with an event of root 1 directly after
/// root 0 and ends with the run of last-root events that follows it.
/// Needs at least three roots; with fewer the sweep cannot be told apart
/// from real navigation. A click is never part of a sweep, so a run
/// containing one is kept.
pub fn remove_fake_segments(events: &mut Vec<QueuedNativeEvent>, root_count: usize) {
    if root_count < 3 {
        return;
    }
    let last = root_count - 1;
    let clicked = |e: &QueuedNativeEvent| e.kind == EventKind::Clicked;
    let mut from = 1;
    while from < events.len() {
        let Some(start) = (from..events.len()).find(|&i| {
            events[i].root_index == 1 && events[i - 1].root_index == 0 && !clicked(&events[i])
        }) else {
            return;
        };
        let Some(mut end) = (start + 1..events.len())
            .find(|&j| events[j].root_index == last || clicked(&events[j]))
        else {
            return;
        };
        if clicked(&events[end]) {
            from = end + 1;
            continue;
        }
        while end + 1 < events.len()
            && events[end + 1].root_index == last
            && !clicked(&events[end + 1])
        {
            end += 1;
        }
        events.drain(start..=end);
        from = start.max(1);
    }
}
