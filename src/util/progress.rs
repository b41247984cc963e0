//! Sequenced progress bars.
//!
//! Dependency fetching reports two phases (object transfer, then worktree
//! checkout) through a single callback surface. `SequentialProgress` queues
//! one bar per phase and advances the front bar to completion before the
//! next one becomes active.

use std::cell::RefCell;
use std::collections::VecDeque;

use indicatif::{ProgressBar, ProgressStyle};

/// A queue of progress bars driven by a single `update(fraction)` entry
/// point. The front bar is the active one; once it completes, the next
/// update activates the following bar.
///
/// Single-threaded by design: callers update it from sequential callbacks.
pub struct SequentialProgress {
    bars: RefCell<VecDeque<ProgressBar>>,
}

impl SequentialProgress {
    pub fn new() -> Self {
        SequentialProgress {
            bars: RefCell::new(VecDeque::new()),
        }
    }

    /// Sequence a bar. It only starts once all bars before it have
    /// completed.
    pub fn add_bar(&self, bar: ProgressBar) {
        self.bars.borrow_mut().push_back(bar);
    }

    /// Update the current bar in the sequence with a completion fraction
    /// in `0.0..=1.0`. Does nothing if the sequence is empty or becomes
    /// empty.
    pub fn update(&self, fraction: f64) {
        let mut bars = self.bars.borrow_mut();
        if bars.is_empty() {
            return;
        }

        // A finished front bar plus a fresh fraction means the next phase
        // has begun.
        if bars[0].is_finished() && fraction < 1.0 {
            bars.pop_front();
            if bars.is_empty() {
                return;
            }
        }

        let bar = &bars[0];
        let position = (fraction.clamp(0.0, 1.0) * 100.0) as u64;
        if bar.position() != position {
            bar.set_position(position);
        }
        if position >= 100 && !bar.is_finished() {
            bar.finish();
        }
    }
}

impl Default for SequentialProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// A styled percentage bar with the given prefix.
pub fn styled_bar(prefix: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {prefix:>10.bold} [{bar:50}] {pos:>3}% ({elapsed})")
            .unwrap()
            .progress_chars("=> "),
    );
    bar.set_prefix(prefix);
    bar
}
