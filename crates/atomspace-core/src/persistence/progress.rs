//! Progress reporting for long saves and loads.
//!
//! The hook observes; it cannot abort or alter a save or load.

use crate::primitives::DEFAULT_PROGRESS_INTERVAL;
use std::fmt;

/// Section being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    SaveNodes,
    SaveLinks,
    LoadNodes,
    LoadLinks,
    Remap,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SaveNodes => "saving nodes",
            Self::SaveLinks => "saving links",
            Self::LoadNodes => "loading nodes",
            Self::LoadLinks => "loading links",
            Self::Remap => "remapping handles",
        };
        f.write_str(label)
    }
}

/// Snapshot of progress handed to the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub phase: Phase,
    pub done: u64,
    pub total: u64,
}

impl Progress {
    /// Completed share of the phase, 0..=100.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = u128::from(self.done.min(self.total)) * 100 / u128::from(self.total);
        u8::try_from(pct).unwrap_or(100)
    }
}

/// Side-effect-only callback invoked with progress updates.
pub type ProgressHook = Box<dyn FnMut(&Progress)>;

/// Throttles progress updates to one every `interval` records.
pub(crate) struct ProgressReporter {
    interval: u64,
    hook: Option<ProgressHook>,
}

impl ProgressReporter {
    pub(crate) fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            hook: None,
        }
    }

    pub(crate) fn set_interval(&mut self, interval: u64) {
        self.interval = interval.max(1);
    }

    pub(crate) fn set_hook(&mut self, hook: ProgressHook) {
        self.hook = Some(hook);
    }

    /// Record that `done` of `total` records of `phase` are processed.
    pub(crate) fn tick(&mut self, phase: Phase, done: u64, total: u64) {
        if done % self.interval == 0 {
            self.emit(Progress { phase, done, total });
        }
    }

    /// Report the end of a phase.
    pub(crate) fn finish(&mut self, phase: Phase, total: u64) {
        self.emit(Progress {
            phase,
            done: total,
            total,
        });
    }

    fn emit(&mut self, progress: Progress) {
        tracing::debug!(
            phase = %progress.phase,
            done = progress.done,
            total = progress.total,
            "progress"
        );
        if let Some(hook) = self.hook.as_mut() {
            hook(&progress);
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_INTERVAL)
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("interval", &self.interval)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
