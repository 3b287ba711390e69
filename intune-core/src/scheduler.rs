//! Cooperative timer queue on a monotonic timeline.
//!
//! Each scheduled action gets a [`TimerToken`]; cancelling the token guarantees
//! the action is never returned by [`Scheduler::pop_due`]. Actions due at the
//! same instant fire in the order they were scheduled.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

#[derive(Debug)]
struct Entry<A> {
    fire_at: Duration,
    token: TimerToken,
    action: A,
}

// Ordering looks only at (fire_at, token); tokens increase monotonically.
impl<A> PartialEq for Entry<A> {
    fn eq(&self, other: &Self) -> bool {
        (self.fire_at, self.token) == (other.fire_at, other.token)
    }
}

impl<A> Eq for Entry<A> {}

impl<A> PartialOrd for Entry<A> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<A> Ord for Entry<A> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.fire_at, self.token).cmp(&(other.fire_at, other.token))
    }
}

#[derive(Debug)]
pub struct Scheduler<A> {
    queue: BinaryHeap<Reverse<Entry<A>>>,
    live: HashSet<TimerToken>,
    next_token: u64,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self {
            queue: BinaryHeap::new(),
            live: HashSet::new(),
            next_token: 0,
        }
    }
}

impl<A> Scheduler<A> {
    pub fn schedule_at(&mut self, fire_at: Duration, action: A) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        self.live.insert(token);
        self.queue.push(Reverse(Entry { fire_at, token, action }));
        token
    }

    pub fn schedule_after(&mut self, now: Duration, delay: Duration, action: A) -> TimerToken {
        self.schedule_at(now + delay, action)
    }

    /// Returns true if the timer was still pending.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        self.live.remove(&token)
    }

    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.live.contains(&token)
    }

    /// Removes and returns the earliest live action due at or before `now`,
    /// together with its scheduled fire time.
    pub fn pop_due(&mut self, now: Duration) -> Option<(Duration, A)> {
        loop {
            let due = matches!(self.queue.peek(), Some(Reverse(entry)) if entry.fire_at <= now);
            if !due {
                return None;
            }
            let Reverse(entry) = self.queue.pop()?;
            if self.live.remove(&entry.token) {
                return Some((entry.fire_at, entry.action));
            }
        }
    }

    /// Fire time of the earliest live action.
    pub fn next_deadline(&mut self) -> Option<Duration> {
        while let Some(Reverse(entry)) = self.queue.peek() {
            if self.live.contains(&entry.token) {
                return Some(entry.fire_at);
            }
            self.queue.pop();
        }
        None
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.live.clear();
    }
}
