//! Deterministic timer scheduling.
//!
//! The [`Scheduler`] never sleeps or spawns; the owner asks it which tasks are due at a given
//! [`Clock`] reading. Tests drive a [`ManualClock`] and the service thread a [`SystemClock`].

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time elapsed since the clock's origin.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall clock measured from its construction.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to.
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn set(&self, to: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.lock().map(|now| *now).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

#[derive(Debug)]
struct Entry<T> {
    id: TaskId,
    task: T,
    next_due: Duration,
    /// `Some` for periodic tasks.
    interval: Option<Duration>,
}

/// Periodic and one-shot tasks keyed by [`TaskId`].
#[derive(Debug)]
pub struct Scheduler<T> {
    entries: Vec<Entry<T>>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T: Copy> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Runs `task` every `interval`, first at `now + interval`.
    ///
    /// A zero interval is bumped to one nanosecond.
    pub fn schedule_periodic(&mut self, task: T, interval: Duration, now: Duration) -> TaskId {
        let interval = interval.max(Duration::from_nanos(1));
        let id = self.allocate_id();
        self.entries.push(Entry {
            id,
            task,
            next_due: now.saturating_add(interval),
            interval: Some(interval),
        });
        id
    }

    /// Runs `task` once at `now + delay`.
    pub fn schedule_once(&mut self, task: T, delay: Duration, now: Duration) -> TaskId {
        let id = self.allocate_id();
        self.entries.push(Entry {
            id,
            task,
            next_due: now.saturating_add(delay),
            interval: None,
        });
        id
    }

    /// Returns `true` if the task was still pending.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Collects every task due at `now`, earliest first.
    ///
    /// One-shots are removed. A periodic task fires at most once per call and
    /// skips the intervals it missed while keeping its phase.
    pub fn due(&mut self, now: Duration) -> Vec<T> {
        let mut fired: Vec<(Duration, TaskId, T)> = Vec::new();

        self.entries.retain_mut(|entry| {
            if entry.next_due > now {
                return true;
            }
            fired.push((entry.next_due, entry.id, entry.task));

            match entry.interval {
                Some(interval) => {
                    let missed = (now - entry.next_due).as_nanos() / interval.as_nanos();
                    let skip = u32::try_from(missed + 1).unwrap_or(u32::MAX);
                    entry.next_due = entry.next_due.saturating_add(interval.saturating_mul(skip));
                    true
                }
                None => false,
            }
        });

        // Ties resolve in scheduling order.
        fired.sort_by_key(|(due, id, _)| (*due, id.0));
        fired.into_iter().map(|(_, _, task)| task).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Job {
        Poll,
        Alarm,
        Other,
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(ms(150));
        clock.advance(ms(50));
        assert_eq!(clock.now(), ms(200));
        clock.set(ms(10));
        assert_eq!(clock.now(), ms(10));
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_periodic_fires_every_interval() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_periodic(Job::Poll, ms(100), Duration::ZERO);

        assert!(scheduler.due(ms(99)).is_empty());
        assert_eq!(scheduler.due(ms(100)), vec![Job::Poll]);
        assert!(scheduler.due(ms(150)).is_empty());
        assert_eq!(scheduler.due(ms(200)), vec![Job::Poll]);
    }

    #[test]
    fn test_periodic_coalesces_missed_ticks_and_keeps_phase() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_periodic(Job::Poll, ms(100), Duration::ZERO);

        assert_eq!(scheduler.due(ms(450)), vec![Job::Poll]);
        assert!(scheduler.due(ms(499)).is_empty());
        assert_eq!(scheduler.due(ms(500)), vec![Job::Poll]);
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_once(Job::Alarm, ms(10_000), Duration::ZERO);

        assert!(scheduler.due(ms(9_999)).is_empty());
        assert_eq!(scheduler.due(ms(10_000)), vec![Job::Alarm]);
        assert!(scheduler.due(ms(20_000)).is_empty());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = Scheduler::new();
        let alarm = scheduler.schedule_once(Job::Alarm, ms(10), Duration::ZERO);
        let poll = scheduler.schedule_periodic(Job::Poll, ms(10), Duration::ZERO);

        assert!(scheduler.cancel(alarm));
        assert!(!scheduler.cancel(alarm));
        assert!(!scheduler.is_scheduled(alarm));
        assert!(scheduler.is_scheduled(poll));
        assert_eq!(scheduler.due(ms(10)), vec![Job::Poll]);
    }

    #[test]
    fn test_due_orders_by_due_time() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_once(Job::Alarm, ms(300), Duration::ZERO);
        scheduler.schedule_periodic(Job::Poll, ms(100), Duration::ZERO);
        scheduler.schedule_once(Job::Other, ms(50), Duration::ZERO);

        assert_eq!(
            scheduler.due(ms(300)),
            vec![Job::Other, Job::Poll, Job::Alarm]
        );
    }

    #[test]
    fn test_ties_keep_scheduling_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_once(Job::Alarm, ms(100), Duration::ZERO);
        scheduler.schedule_once(Job::Other, ms(100), Duration::ZERO);

        assert_eq!(scheduler.due(ms(100)), vec![Job::Alarm, Job::Other]);
    }

    #[test]
    fn test_schedule_relative_to_now() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_once(Job::Alarm, ms(100), ms(1_000));

        assert!(scheduler.due(ms(1_050)).is_empty());
        assert_eq!(scheduler.due(ms(1_100)), vec![Job::Alarm]);
    }

    #[test]
    fn test_huge_delay_saturates() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule_once(Job::Alarm, Duration::MAX, ms(1_000));
        scheduler.schedule_periodic(Job::Poll, Duration::MAX, ms(1_000));

        assert!(scheduler.due(ms(1_000_000)).is_empty());
        assert!(scheduler.is_scheduled(id));
    }
}
