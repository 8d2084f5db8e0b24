use chrono::NaiveDateTime;
use itertools::Itertools;

use crate::timeline::{Backfill, ClockFormat, Symbol, Timeline, SECONDS_PER_MINUTE};

/// Running counters for the whole process lifetime.
///
/// Counters only move in lockstep with timeline mutations made by the
/// session; `tick_count + idle_count` is the number of unpaused seconds
/// recorded so far.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub tick_count: u64,
    pub idle_count: u64,
    pub drift_correction_count: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tick(&mut self) {
        self.tick_count += 1;
    }

    pub fn on_idle(&mut self) {
        self.idle_count += 1;
    }

    /// Counts a symbol that landed in the timeline. A pause mark stands in
    /// for an idle second; resume marks and paused seconds are not counted.
    pub fn on_recorded(&mut self, symbol: Symbol) {
        match symbol {
            Symbol::Tick => self.on_tick(),
            Symbol::Idle | Symbol::PauseMark => self.on_idle(),
            Symbol::Blank | Symbol::ResumeMark | Symbol::Filler => {}
        }
    }

    /// Takes back a symbol whose slot was handed to another one
    pub fn on_replaced(&mut self, symbol: Symbol) {
        match symbol {
            Symbol::Tick => self.tick_count = self.tick_count.saturating_sub(1),
            Symbol::Idle | Symbol::PauseMark => {
                self.idle_count = self.idle_count.saturating_sub(1)
            }
            Symbol::Blank | Symbol::ResumeMark | Symbol::Filler => {}
        }
    }

    /// Only valid after `Timeline::undo_last` succeeded: the undone tick
    /// becomes an idle second.
    pub fn on_undo(&mut self) {
        debug_assert!(self.tick_count > 0, "undo without a counted tick");
        self.tick_count = self.tick_count.saturating_sub(1);
        self.idle_count += 1;
    }

    /// Backfilled `Idle` seconds count as idle time; backfilled `Blank`
    /// seconds were paused and only show up in the correction count.
    pub fn on_drift_correction(&mut self, backfill: &Backfill) {
        let count = backfill.count as u64;
        self.drift_correction_count += count;
        if backfill.symbol == Symbol::Idle {
            self.idle_count += count;
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.tick_count + self.idle_count
    }

    /// `MM:SS`, minutes are not wrapped into hours
    pub fn elapsed_text(&self) -> String {
        let secs = self.elapsed_seconds();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }

    pub fn average_per_minute(&self) -> f64 {
        match self.elapsed_seconds() {
            0 => 0.0,
            elapsed => self.tick_count as f64 / (elapsed as f64 / 60.0),
        }
    }

    pub fn last_minute_count(&self, timeline: &Timeline) -> usize {
        timeline
            .recent(SECONDS_PER_MINUTE)
            .into_iter()
            .filter(|s| *s == Symbol::Tick)
            .count()
    }

    /// The stats line shown under the timeline. `None` until something has
    /// been counted.
    pub fn summary_text(
        &self,
        timeline: &Timeline,
        now: NaiveDateTime,
        format: ClockFormat,
    ) -> Option<String> {
        if self.tick_count == 0 {
            return None;
        }

        let parts = [
            now.format(format.second_pattern()).to_string(),
            format!("Total: {}", self.tick_count),
            format!("Elapsed: {}", self.elapsed_text()),
            format!("Avg: {:5.2}", self.average_per_minute()),
            format!("Last: {}", self.last_minute_count(timeline)),
        ];
        Some(parts.iter().join("     "))
    }
}
