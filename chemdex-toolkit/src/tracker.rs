//! Wave-scoped cleanup tracking for toolkit-backed resources.
//!
//! Molecule handles are not reclaimed by scope exit; they are registered here
//! as `(handle-id, release_fn)` pairs under a *wave* — a numeric label for a
//! logical block of allocations — and released in one sweep when the wave is
//! cleaned up. The quarantine mode defers the sweep for allocations that may
//! still be referenced by an in-flight search.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

/// The default wave for allocations registered without an explicit scope.
pub const DEFAULT_WAVE: u64 = 0;

/// Delay before a quarantined snapshot is swept.
pub const DEFAULT_QUARANTINE_DELAY: Duration = Duration::from_secs(60);

type ReleaseFn = Box<dyn FnOnce() + Send + 'static>;

struct Tracked {
    id: u64,
    release: Option<ReleaseFn>,
}

/// Tracks resources whose release must be explicit, grouped by wave.
pub struct CleanupTracker {
    ledger: Mutex<HashMap<u64, Vec<Tracked>>>,
    next_wave: AtomicU64,
    quarantine_delay: Duration,
}

impl Default for CleanupTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CleanupTracker {
    pub fn new() -> Self {
        Self::with_quarantine_delay(DEFAULT_QUARANTINE_DELAY)
    }

    pub fn with_quarantine_delay(quarantine_delay: Duration) -> Self {
        CleanupTracker {
            ledger: Mutex::new(HashMap::new()),
            next_wave: AtomicU64::new(1),
            quarantine_delay,
        }
    }

    /// A process-unique, monotonically increasing wave id (never 0).
    pub fn fresh_wave_id(&self) -> u64 {
        self.next_wave.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a resource under `wave`. Registering the same id twice in one
    /// wave is a no-op. With `move_from_other_wave`, the id is first removed
    /// from every other wave so it is released exactly once, with this wave.
    pub fn mark<F>(&self, id: u64, wave: u64, move_from_other_wave: bool, release: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut ledger = self.ledger.lock();

        if move_from_other_wave {
            ledger.retain(|&other_wave, list| {
                if other_wave != wave {
                    list.retain(|t| t.id != id);
                }
                !list.is_empty()
            });
        }

        let list = ledger.entry(wave).or_default();
        if list.iter().any(|t| t.id == id) {
            return;
        }
        list.push(Tracked {
            id,
            release: Some(Box::new(release)),
        });
    }

    /// Release every resource tracked for `wave`, then forget the wave.
    ///
    /// The wave's entries leave the ledger before any release runs, so a
    /// resource can never be released twice. A release that panics is logged
    /// and does not abort the sweep.
    pub fn cleanup(&self, wave: u64) {
        let Some(list) = self.ledger.lock().remove(&wave) else {
            return;
        };
        release_all(list, wave);
    }

    /// `cleanup` for every known wave.
    pub fn cleanup_all(&self) {
        let drained: Vec<(u64, Vec<Tracked>)> = self.ledger.lock().drain().collect();
        for (wave, list) in drained {
            release_all(list, wave);
        }
    }

    /// Snapshot the ledger, clear it, and sweep the snapshot on a background
    /// thread after the quarantine delay. New registrations made after this
    /// call are unaffected.
    pub fn quarantine_and_cleanup(&self) {
        let drained: Vec<(u64, Vec<Tracked>)> = self.ledger.lock().drain().collect();
        if drained.is_empty() {
            return;
        }

        let delay = self.quarantine_delay;
        let result = thread::Builder::new()
            .name("chemdex-quarantine-cleanup".into())
            .spawn(move || {
                thread::sleep(delay);
                for (wave, list) in drained {
                    release_all(list, wave);
                }
            });
        if let Err(err) = result {
            warn!(error = %err, "quarantine cleanup thread could not be spawned");
        }
    }

    /// Number of resources currently awaiting release, across all waves.
    pub fn tracked_count(&self) -> usize {
        self.ledger.lock().values().map(Vec::len).sum()
    }

    /// Number of resources awaiting release in one wave.
    pub fn tracked_in_wave(&self, wave: u64) -> usize {
        self.ledger.lock().get(&wave).map_or(0, Vec::len)
    }
}

fn release_all(list: Vec<Tracked>, wave: u64) {
    debug!(wave, count = list.len(), "releasing tracked resources");
    for mut tracked in list {
        let Some(release) = tracked.release.take() else {
            warn!(id = tracked.id, wave, "tracked resource has no release capability");
            continue;
        };
        if catch_unwind(AssertUnwindSafe(release)).is_err() {
            warn!(id = tracked.id, wave, "releasing a tracked resource panicked");
        }
    }
}

/// RAII scope for a fresh wave: allocations marked under [`WaveGuard::wave`]
/// are released when the guard drops, on every exit path.
pub struct WaveGuard<'a> {
    tracker: &'a CleanupTracker,
    wave: u64,
}

impl<'a> WaveGuard<'a> {
    pub fn new(tracker: &'a CleanupTracker) -> Self {
        let wave = tracker.fresh_wave_id();
        WaveGuard { tracker, wave }
    }

    pub fn wave(&self) -> u64 {
        self.wave
    }
}

impl Drop for WaveGuard<'_> {
    fn drop(&mut self) {
        self.tracker.cleanup(self.wave);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting_release(counter: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn wave_ids_are_unique_and_positive() {
        let tracker = CleanupTracker::new();
        let a = tracker.fresh_wave_id();
        let b = tracker.fresh_wave_id();
        assert!(a >= 1);
        assert!(b > a);
    }

    #[test]
    fn cleanup_releases_only_the_given_wave() {
        let tracker = CleanupTracker::new();
        let released = Arc::new(AtomicUsize::new(0));

        tracker.mark(1, 10, false, counting_release(&released));
        tracker.mark(2, 10, false, counting_release(&released));
        tracker.mark(3, 20, false, counting_release(&released));
        assert_eq!(tracker.tracked_count(), 3);

        tracker.cleanup(10);
        assert_eq!(released.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.tracked_count(), 1);

        tracker.cleanup_all();
        assert_eq!(released.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.tracked_count(), 0);
    }

    #[test]
    fn duplicate_registration_is_noop() {
        let tracker = CleanupTracker::new();
        let released = Arc::new(AtomicUsize::new(0));

        tracker.mark(7, DEFAULT_WAVE, false, counting_release(&released));
        tracker.mark(7, DEFAULT_WAVE, false, counting_release(&released));
        assert_eq!(tracker.tracked_count(), 1);

        tracker.cleanup(DEFAULT_WAVE);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn move_from_other_wave_relocates() {
        let tracker = CleanupTracker::new();
        let released = Arc::new(AtomicUsize::new(0));

        tracker.mark(7, 10, false, counting_release(&released));
        tracker.mark(7, 20, true, counting_release(&released));
        assert_eq!(tracker.tracked_in_wave(10), 0);
        assert_eq!(tracker.tracked_in_wave(20), 1);

        // Cleaning the old wave must not touch the moved resource
        tracker.cleanup(10);
        assert_eq!(released.load(Ordering::SeqCst), 0);

        tracker.cleanup(20);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_release_does_not_abort_sweep() {
        let tracker = CleanupTracker::new();
        let released = Arc::new(AtomicUsize::new(0));

        tracker.mark(1, 5, false, || panic!("release failed"));
        tracker.mark(2, 5, false, counting_release(&released));

        tracker.cleanup(5);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.tracked_count(), 0);
    }

    #[test]
    fn quarantine_defers_release() {
        let tracker = CleanupTracker::with_quarantine_delay(Duration::from_millis(20));
        let released = Arc::new(AtomicUsize::new(0));

        tracker.mark(1, DEFAULT_WAVE, false, counting_release(&released));
        tracker.quarantine_and_cleanup();

        // The ledger is clear immediately, the release happens later
        assert_eq!(tracker.tracked_count(), 0);
        assert_eq!(released.load(Ordering::SeqCst), 0);

        thread::sleep(Duration::from_millis(200));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wave_guard_cleans_on_drop_and_on_panic() {
        let tracker = CleanupTracker::new();
        let released = Arc::new(AtomicUsize::new(0));

        {
            let guard = WaveGuard::new(&tracker);
            tracker.mark(1, guard.wave(), false, counting_release(&released));
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let result = catch_unwind(AssertUnwindSafe(|| {
            let guard = WaveGuard::new(&tracker);
            tracker.mark(2, guard.wave(), false, counting_release(&released));
            panic!("search blew up");
        }));
        assert!(result.is_err());
        assert_eq!(released.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.tracked_count(), 0);
    }
}
