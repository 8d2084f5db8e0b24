//! Second-resolution sliding window of activity.
//!
//! The timeline holds ten minute lines, oldest first. The newest line is open
//! and receives one symbol per elapsed second; the nine before it are closed.
//! When a new minute begins the oldest line is evicted.

use std::collections::VecDeque;

use chrono::{Duration, NaiveDateTime, Timelike};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::clock::truncate_to_minute;

pub const SECONDS_PER_MINUTE: usize = 60;
pub const VISIBLE_MINUTES: usize = 10;
/// How far the open line may lag behind the clock before it is backfilled.
pub const DEFAULT_DRIFT_TOLERANCE: usize = 1;

/// One second of recorded history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Tick,
    Idle,
    Blank,
    PauseMark,
    ResumeMark,
    Filler,
}

impl Symbol {
    pub fn glyph(self) -> char {
        match self {
            Symbol::Tick => '#',
            Symbol::Idle => '.',
            Symbol::Blank => ' ',
            Symbol::PauseMark => '<',
            Symbol::ResumeMark => '>',
            Symbol::Filler => '*',
        }
    }

    /// Only "nothing happened" seconds may be repeated to cover missed cycles.
    pub fn repeats_on_drift(self) -> bool {
        matches!(self, Symbol::Idle | Symbol::Blank)
    }
}

/// How minute and second labels are written
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ClockFormat {
    #[default]
    TwelveHour,
    TwentyFourHour,
}

impl ClockFormat {
    pub fn minute_pattern(self) -> &'static str {
        match self {
            ClockFormat::TwelveHour => "%l:%M %P",
            ClockFormat::TwentyFourHour => "%H:%M",
        }
    }

    pub fn second_pattern(self) -> &'static str {
        match self {
            ClockFormat::TwelveHour => "%l:%M:%S",
            ClockFormat::TwentyFourHour => "%H:%M:%S",
        }
    }
}

/// A minute's worth of symbols, labeled with the minute it covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinuteLine {
    minute: NaiveDateTime,
    symbols: Vec<Symbol>,
}

impl MinuteLine {
    fn new(minute: NaiveDateTime) -> Self {
        Self {
            minute,
            symbols: Vec::with_capacity(SECONDS_PER_MINUTE),
        }
    }

    fn filled(minute: NaiveDateTime, symbol: Symbol, len: usize) -> Self {
        Self {
            minute,
            symbols: vec![symbol; len],
        }
    }

    pub fn minute(&self) -> NaiveDateTime {
        self.minute
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.symbols.len() >= SECONDS_PER_MINUTE
    }

    pub fn label(&self, format: ClockFormat) -> String {
        self.minute.format(format.minute_pattern()).to_string()
    }

    pub fn text(&self, format: ClockFormat) -> String {
        let glyphs: String = self.symbols.iter().map(|s| s.glyph()).collect();
        format!("{} {}", self.label(format), glyphs)
    }
}

/// Symbols repeated into the open line to cover seconds the loop missed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backfill {
    pub symbol: Symbol,
    pub count: usize,
}

/// Where an appended symbol ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// took the next second
    Pushed,
    /// took over the slot of a second that was already recorded
    Replaced(Symbol),
    /// the second was already recorded and keeps its symbol
    Dropped,
}

/// What one `Timeline::append` did to the open line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    pub backfill: Option<Backfill>,
    pub placement: Placement,
}

#[derive(Debug, Clone)]
pub struct Timeline {
    closed: VecDeque<MinuteLine>,
    open: MinuteLine,
    drift_tolerance: usize,
    last_recorded: Option<NaiveDateTime>,
}

impl Timeline {
    pub fn new(now: NaiveDateTime) -> Self {
        Self::with_tolerance(now, DEFAULT_DRIFT_TOLERANCE)
    }

    /// Builds a window of `Filler` anchored to `now`: nine full minutes before
    /// the current one, plus the seconds already gone in the current minute.
    pub fn with_tolerance(now: NaiveDateTime, drift_tolerance: usize) -> Self {
        let minute = truncate_to_minute(now);
        let closed = (1..VISIBLE_MINUTES)
            .rev()
            .map(|back| {
                MinuteLine::filled(
                    minute - Duration::minutes(back as i64),
                    Symbol::Filler,
                    SECONDS_PER_MINUTE,
                )
            })
            .collect();

        Self {
            closed,
            open: MinuteLine::filled(minute, Symbol::Filler, now.second() as usize),
            drift_tolerance: drift_tolerance.max(1),
            last_recorded: None,
        }
    }

    pub fn drift_tolerance(&self) -> usize {
        self.drift_tolerance
    }

    /// Visible lines, oldest first; the open line is last
    pub fn lines(&self) -> impl DoubleEndedIterator<Item = &MinuteLine> {
        self.closed.iter().chain(std::iter::once(&self.open))
    }

    pub fn open_line(&self) -> &MinuteLine {
        &self.open
    }

    pub fn line_count(&self) -> usize {
        self.closed.len() + 1
    }

    pub fn last_symbol(&self) -> Option<Symbol> {
        self.lines()
            .rev()
            .find_map(|line| line.symbols.last().copied())
    }

    /// Records one second of history at `now`.
    ///
    /// Before the symbol lands, the open line is checked against the clock. A
    /// line that fell behind by more than the drift tolerance is backfilled by
    /// repeating its last symbol, provided that symbol is `Idle` or `Blank`.
    /// The symbol recorded during second 0 of a new minute still closes the
    /// previous line; the new line opens on the next cycle.
    ///
    /// A second already recorded keeps its single slot: see `overwrite_last`.
    /// A clock that steps back to an earlier minute opens a fresh line for it.
    pub fn append(&mut self, symbol: Symbol, now: NaiveDateTime) -> Appended {
        let secs = now.second() as usize;
        let minute = truncate_to_minute(now);

        let already_recorded = self.last_recorded.is_some_and(|last| now <= last);
        if already_recorded && minute >= self.open.minute {
            return Appended {
                backfill: None,
                placement: self.overwrite_last(symbol),
            };
        }

        let mut backfilled: Option<Backfill> = None;
        if minute < self.open.minute {
            log::warn!(
                "clock stepped back from {} to {now}; opening a new line",
                self.open.minute
            );
            // second 0 belongs to the line of the minute before it
            let (opened, elapsed) = match secs {
                0 => (minute - Duration::minutes(1), SECONDS_PER_MINUTE),
                _ => (minute, secs),
            };
            self.roll_over(MinuteLine::filled(opened, Symbol::Filler, elapsed - 1));
        } else if minute > self.open.minute && (secs >= 1 || self.open.is_full()) {
            merge(&mut backfilled, self.close_out());
            self.roll_over(MinuteLine::new(minute));
        }

        let target = if minute > self.open.minute {
            SECONDS_PER_MINUTE
        } else {
            secs
        };
        merge(&mut backfilled, self.backfill(target));

        let placement = if self.open.is_full() {
            self.overwrite_last(symbol)
        } else {
            self.open.symbols.push(symbol);
            Placement::Pushed
        };
        self.last_recorded = Some(now);
        Appended {
            backfill: backfilled,
            placement,
        }
    }

    /// Folds a symbol into the slot of the second recorded last. Something
    /// that happened (a tick or a mark) replaces an `Idle` or `Blank`
    /// second; anything else is dropped.
    fn overwrite_last(&mut self, symbol: Symbol) -> Placement {
        match self.open.symbols.last_mut() {
            Some(last) if last.repeats_on_drift() && !symbol.repeats_on_drift() => {
                let replaced = std::mem::replace(last, symbol);
                log::debug!("second already recorded: {replaced:?} replaced by {symbol:?}");
                Placement::Replaced(replaced)
            }
            _ => {
                log::debug!("second already recorded: dropped {symbol:?}");
                Placement::Dropped
            }
        }
    }

    fn backfill(&mut self, target: usize) -> Option<Backfill> {
        let shortfall = target.saturating_sub(self.open.len());
        if shortfall <= self.drift_tolerance {
            return None;
        }
        // one slot stays free for the symbol being appended
        self.repeat_last(shortfall - 1)
    }

    fn close_out(&mut self) -> Option<Backfill> {
        let missing = SECONDS_PER_MINUTE.saturating_sub(self.open.len());
        self.repeat_last(missing)
    }

    fn repeat_last(&mut self, count: usize) -> Option<Backfill> {
        if count == 0 {
            return None;
        }
        let symbol = self.last_symbol().filter(|s| s.repeats_on_drift())?;
        self.open
            .symbols
            .extend(std::iter::repeat(symbol).take(count));
        log::debug!(
            "drift: backfilled {count} x {symbol:?} into {}",
            self.open.minute
        );
        Some(Backfill { symbol, count })
    }

    fn roll_over(&mut self, line: MinuteLine) {
        let opened = line.minute;
        let closed = std::mem::replace(&mut self.open, line);
        self.closed.push_back(closed);
        while self.closed.len() >= VISIBLE_MINUTES {
            if let Some(evicted) = self.closed.pop_front() {
                log::debug!("rollover: evicted {}, opened {opened}", evicted.minute);
            }
        }
    }

    /// Turns the most recent visible `Tick` into `Idle`. Ticks that have
    /// already scrolled out of the window cannot be undone.
    pub fn undo_last(&mut self) -> bool {
        let hit = std::iter::once(&mut self.open)
            .chain(self.closed.iter_mut().rev())
            .find_map(|line| line.symbols.iter_mut().rev().find(|s| **s == Symbol::Tick));

        match hit {
            Some(symbol) => {
                *symbol = Symbol::Idle;
                true
            }
            None => false,
        }
    }

    /// The trailing `n` symbols of the window, oldest first
    pub fn recent(&self, n: usize) -> Vec<Symbol> {
        let mut out: Vec<Symbol> = self
            .lines()
            .rev()
            .flat_map(|line| line.symbols.iter().rev().copied())
            .take(n)
            .collect();
        out.reverse();
        out
    }

    pub fn count(&self, symbol: Symbol) -> usize {
        self.lines()
            .flat_map(|line| line.symbols.iter())
            .filter(|s| **s == symbol)
            .count()
    }

    /// Labeled text lines, newest last
    pub fn render_text(&self, format: ClockFormat) -> Vec<String> {
        self.lines().map(|line| line.text(format)).collect()
    }
}

fn merge(acc: &mut Option<Backfill>, next: Option<Backfill>) {
    if let Some(n) = next {
        *acc = Some(match acc.take() {
            Some(a) => Backfill {
                count: a.count + n.count,
                ..a
            },
            None => n,
        });
    }
}
