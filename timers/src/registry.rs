//! Registry of independently running, named countdown timers.
//!
//! Every timer is its own tokio task ticking at the interval it was started
//! with. On each tick the task recomputes the remaining time; once it reaches
//! zero the task invokes the timer's callback exactly once, removes the entry
//! and exits. While the timer is still running every tick is published as a
//! [`TimerEvent::Tick`] so a countdown display can follow along.
//!
//! Timer names are resources: starting a timer under a name that is still
//! live is rejected and leaves the running timer untouched. There is no
//! per-timer cancel; [`TimerRegistry::dispose`] tears everything down.

use chrono::{DateTime, Utc};
use log::debug;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{duration::parse_duration, error::TimerError};

/// Callback fired once when a timer runs out.
pub type OnElapsed = Box<dyn FnOnce() + Send + 'static>;

/// Ordered sequence of absolute end times owned by external, persisted state.
pub type SharedDeadlines = Arc<Mutex<Vec<DateTime<Utc>>>>;

const EVENT_CHANNEL_CAPACITY: usize = 256;
// roughly 30 years
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// An addressable slot in an external [`SharedDeadlines`] sequence.
///
/// When a timer is started with a backing slot, its absolute end time is
/// written into the slot so it can be persisted and restored after a restart.
#[derive(Clone, Debug)]
pub struct BackingSlot {
    deadlines: SharedDeadlines,
    index: usize,
}

impl BackingSlot {
    pub fn new(deadlines: SharedDeadlines, index: usize) -> Self {
        Self { deadlines, index }
    }

    /// Write `end_time` into the slot. An index past the end of the sequence is ignored.
    fn store(&self, end_time: DateTime<Utc>) {
        let mut deadlines = self
            .deadlines
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = deadlines.get_mut(self.index) {
            *slot = end_time;
        }
    }
}

/// Updates published by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// A live timer ticked and still has `remaining` left.
    Tick { name: String, remaining: Duration },
    /// The timer ran out; its callback has already been invoked.
    Elapsed { name: String },
}

struct TimerEntry {
    id: u64,
    end_time: DateTime<Utc>,
    deadline: Instant,
    task: JoinHandle<()>,
}

struct Inner {
    timers: Mutex<HashMap<String, TimerEntry>>,
    events: broadcast::Sender<TimerEvent>,
    next_id: AtomicU64,
}

impl Inner {
    fn timers(&self) -> MutexGuard<'_, HashMap<String, TimerEntry>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: TimerEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

/// Cloneable handle to a set of named timers.
///
/// Must be used from within a tokio runtime: every started timer spawns a task.
#[derive(Clone)]
pub struct TimerRegistry {
    inner: Arc<Inner>,
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                timers: Mutex::new(HashMap::new()),
                events,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Start a timer that runs for `duration_text` (see [`crate::duration`]).
    ///
    /// ## Rejections (logged, no timer created):
    /// - a live timer already uses `name`
    /// - `duration_text` does not parse to a strictly positive duration
    ///
    /// If `backing_slot` is given, the computed end time is written into it.
    pub fn start_timer(
        &self,
        name: &str,
        duration_text: &str,
        interval_ms: u64,
        on_elapsed: OnElapsed,
        backing_slot: Option<BackingSlot>,
    ) -> Result<DateTime<Utc>, TimerError> {
        let duration = parse_duration(duration_text);
        if duration.is_zero() {
            debug!("[TimerRegistry] Invalid time format for timer '{name}': {duration_text:?}");
            return Err(TimerError::InvalidDuration {
                name: name.to_string(),
                input: duration_text.to_string(),
            });
        }

        let end_time = end_time_after(duration);
        self.insert(name, end_time, duration, interval_ms, on_elapsed, backing_slot)?;
        Ok(end_time)
    }

    /// Restart a timer from a previously persisted absolute end time.
    ///
    /// An end time that already passed fires on the first tick.
    pub fn resume_timer(
        &self,
        name: &str,
        end_time: DateTime<Utc>,
        interval_ms: u64,
        on_elapsed: OnElapsed,
    ) -> Result<(), TimerError> {
        let remaining = (end_time - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        self.insert(name, end_time, remaining, interval_ms, on_elapsed, None)
    }

    fn insert(
        &self,
        name: &str,
        end_time: DateTime<Utc>,
        remaining: Duration,
        interval_ms: u64,
        on_elapsed: OnElapsed,
        backing_slot: Option<BackingSlot>,
    ) -> Result<(), TimerError> {
        let mut timers = self.inner.timers();
        if timers.contains_key(name) {
            debug!("[TimerRegistry] Timer with name '{name}' already exists. Use a different name.");
            return Err(TimerError::DuplicateName(name.to_string()));
        }

        if let Some(slot) = backing_slot {
            slot.store(end_time);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let period = Duration::from_millis(interval_ms.max(1));
        let task = tokio::spawn(run_timer(
            self.inner.clone(),
            name.to_string(),
            id,
            period,
            on_elapsed,
        ));

        timers.insert(
            name.to_string(),
            TimerEntry {
                id,
                end_time,
                deadline: deadline_after(remaining),
                task,
            },
        );
        debug!("[TimerRegistry] Started timer '{name}' ending at {end_time}");
        Ok(())
    }

    /// Whether a timer named `name` is currently live.
    pub fn is_active(&self, name: &str) -> bool {
        self.inner.timers().contains_key(name)
    }

    pub fn active_count(&self) -> usize {
        self.inner.timers().len()
    }

    /// Time left on a live timer.
    pub fn remaining(&self, name: &str) -> Option<Duration> {
        self.inner
            .timers()
            .get(name)
            .map(|entry| entry.deadline.saturating_duration_since(Instant::now()))
    }

    /// Absolute end time of a live timer.
    pub fn end_time(&self, name: &str) -> Option<DateTime<Utc>> {
        self.inner.timers().get(name).map(|entry| entry.end_time)
    }

    /// Subscribe to tick and expiry updates.
    ///
    /// Events are delivered in the order the registry produced them.
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.inner.events.subscribe()
    }

    /// Stop and release every live timer. No callback fires afterwards.
    pub fn dispose(&self) {
        let drained: Vec<(String, TimerEntry)> = self.inner.timers().drain().collect();
        for (name, entry) in drained {
            entry.task.abort();
            debug!("[TimerRegistry] Disposed timer '{name}'");
        }
    }
}

async fn run_timer(inner: Arc<Inner>, name: String, id: u64, period: Duration, on_elapsed: OnElapsed) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let remaining = {
            let timers = inner.timers();
            match timers.get(&name) {
                Some(entry) if entry.id == id => {
                    entry.deadline.saturating_duration_since(Instant::now())
                }
                // torn down, or the name now belongs to a newer timer
                _ => return,
            }
        };

        if remaining.is_zero() {
            debug!("[TimerRegistry] Timer '{name}' expired.");
            on_elapsed();
            {
                let mut timers = inner.timers();
                if timers.get(&name).is_some_and(|entry| entry.id == id) {
                    timers.remove(&name);
                }
            }
            inner.publish(TimerEvent::Elapsed { name });
            return;
        }

        inner.publish(TimerEvent::Tick {
            name: name.clone(),
            remaining,
        });
    }
}

fn end_time_after(duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn deadline_after(remaining: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(remaining)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_callback(counter: &Arc<AtomicUsize>) -> OnElapsed {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_backing_slot_receives_end_time() {
        let registry = TimerRegistry::new();
        let deadlines: SharedDeadlines = Arc::new(Mutex::new(vec![DateTime::<Utc>::default(); 3]));

        let end = registry
            .start_timer(
                "lock-0-1",
                "10m",
                1000,
                Box::new(|| {}),
                Some(BackingSlot::new(deadlines.clone(), 1)),
            )
            .expect("timer should start");

        let stored = deadlines.lock().unwrap().clone();
        assert_eq!(stored[1], end);
        assert_eq!(stored[0], DateTime::<Utc>::default());
        assert_eq!(stored[2], DateTime::<Utc>::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backing_slot_out_of_range_is_ignored() {
        let registry = TimerRegistry::new();
        let deadlines: SharedDeadlines = Arc::new(Mutex::new(vec![DateTime::<Utc>::default()]));

        registry
            .start_timer(
                "lock",
                "1m",
                1000,
                Box::new(|| {}),
                Some(BackingSlot::new(deadlines.clone(), 5)),
            )
            .expect("timer should still start");

        assert!(registry.is_active("lock"));
        assert_eq!(deadlines.lock().unwrap()[0], DateTime::<Utc>::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        registry
            .start_timer("fast", "1s", 0, counting_callback(&fired), None)
            .expect("timer should start");

        time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!registry.is_active("fast"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_with_past_end_time_fires_on_first_tick() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        registry
            .resume_timer(
                "restored",
                Utc::now() - chrono::Duration::minutes(5),
                100,
                counting_callback(&fired),
            )
            .expect("resume should be accepted");
        assert!(registry.is_active("restored"));

        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!registry.is_active("restored"));
    }
}
