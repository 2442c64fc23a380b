//! Ephemeral atom collection for Environment.

use tracing::{debug, trace};

use super::Environment;
use crate::backend::atoms::{EphemeralStats, SweepStats};
use crate::backend::config::GcConfig;

/// Ephemeral backlog levels that trigger [`Environment::periodic_cleanup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupThresholds {
    pub count_max: usize,
    pub size_max: usize,
    count_increment: usize,
    size_increment: usize,
}

impl CleanupThresholds {
    pub fn new(config: &GcConfig) -> Self {
        CleanupThresholds {
            count_max: config.ephemeral_count_increment,
            size_max: config.ephemeral_size_increment,
            count_increment: config.ephemeral_count_increment,
            size_increment: config.ephemeral_size_increment,
        }
    }

    fn exceeded_by(&self, stats: EphemeralStats) -> bool {
        stats.item_count > self.count_max || stats.item_size > self.size_max
    }

    /// Raise each threshold to what is left after a sweep plus its increment.
    fn adapt(&mut self, remaining: EphemeralStats) {
        self.count_max = self.count_max.max(remaining.item_count + self.count_increment);
        self.size_max = self.size_max.max(remaining.item_size + self.size_increment);
    }
}

impl Environment {
    /// Sweep every table at `current_depth`: free zero-count entries that
    /// became ephemeral deeper than it, and return retained ones to live.
    pub fn sweep(&mut self, current_depth: usize) -> SweepStats {
        let Environment {
            atoms,
            memory,
            address_types,
            ..
        } = self;

        let mut stats = SweepStats::default();
        stats.add(atoms.symbols.sweep(current_depth, memory, |_| {}));
        stats.add(atoms.floats.sweep(current_depth, memory, |_| {}));
        stats.add(atoms.integers.sweep(current_depth, memory, |_| {}));
        stats.add(atoms.bitmaps.sweep(current_depth, memory, |_| {}));
        stats.add(atoms.external_addresses.sweep(current_depth, memory, |stored| {
            let discard = address_types
                .get_mut(stored.type_id as usize)
                .and_then(|kind| kind.discard.as_mut());
            if let Some(discard) = discard {
                discard(stored.address);
            }
        }));

        trace!(
            target: "atomtron::gc",
            current_depth,
            freed = stats.freed,
            restored = stats.restored,
            pending = stats.pending,
            "Swept atom tables"
        );
        stats
    }

    /// Sweep at the current evaluation depth.
    pub fn remove_ephemeral_atoms(&mut self) -> SweepStats {
        self.sweep(self.depth)
    }

    /// Sweep only when the ephemeral backlog is over either threshold, then
    /// move the thresholds above what the sweep left behind. Returns `None`
    /// when no sweep was needed.
    pub fn periodic_cleanup(&mut self) -> Option<SweepStats> {
        let backlog = self.atoms.ephemeral_stats();
        if !self.cleanup.exceeded_by(backlog) {
            return None;
        }

        let stats = self.remove_ephemeral_atoms();
        let remaining = self.atoms.ephemeral_stats();
        self.cleanup.adapt(remaining);

        debug!(
            target: "atomtron::gc",
            items_before = backlog.item_count,
            items_after = remaining.item_count,
            count_max = self.cleanup.count_max,
            size_max = self.cleanup.size_max,
            "Periodic cleanup"
        );
        Some(stats)
    }

    pub fn ephemeral_stats(&self) -> EphemeralStats {
        self.atoms.ephemeral_stats()
    }

    pub fn cleanup_thresholds(&self) -> CleanupThresholds {
        self.cleanup
    }
}
