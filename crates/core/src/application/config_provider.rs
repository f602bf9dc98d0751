//! Config provider - atomically swappable configuration snapshot
//!
//! Grounded on the `arc_swap::ArcSwap` idiom used elsewhere in production
//! Rust services for lock-free snapshot publication: readers never observe
//! a partially-updated snapshot, and `update` never blocks a concurrent
//! `get`.

use crate::application::scheduler::SnapshotSource;
use crate::domain::ConfigSnapshot;
use arc_swap::ArcSwap;
use std::sync::Arc;

pub struct ConfigProvider {
    current: ArcSwap<ConfigSnapshot>,
}

impl ConfigProvider {
    pub fn new(initial: ConfigSnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Returns the current snapshot. Readers may briefly observe a
    /// snapshot that predates a concurrent `update`; there is no
    /// read/write synchronisation beyond the atomic swap.
    pub fn get(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    /// Publishes a new snapshot atomically. The old snapshot remains valid
    /// (and usable) for any reader still holding an `Arc` to it.
    pub fn update(&self, new: ConfigSnapshot) {
        self.current.store(Arc::new(new));
    }
}

impl SnapshotSource for ConfigProvider {
    fn current(&self) -> Arc<ConfigSnapshot> {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_is_visible_to_subsequent_get() {
        let provider = ConfigProvider::new(ConfigSnapshot::default());
        let mut next = ConfigSnapshot::default();
        next.scheduler.max_jobs_per_tick = 99;
        provider.update(next);

        assert_eq!(provider.get().scheduler.max_jobs_per_tick, 99);
    }

    #[test]
    fn stale_reference_survives_a_swap() {
        let provider = ConfigProvider::new(ConfigSnapshot::default());
        let held = provider.get();
        provider.update({
            let mut s = ConfigSnapshot::default();
            s.scheduler.max_jobs_per_tick = 7;
            s
        });

        // The Arc held before the swap is untouched: no torn view.
        assert_eq!(held.scheduler.max_jobs_per_tick, 50);
        assert_eq!(provider.get().scheduler.max_jobs_per_tick, 7);
    }
}
