use crate::clock::Clock;
use crate::stats::Stats;
use crate::timeline::{Placement, Symbol, Timeline, DEFAULT_DRIFT_TOLERANCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionState {
    Stopped,
    Paused,
    Running,
}

/// One input per cycle, already mapped from a raw key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    Increment,
    Pause,
    StartOrResume,
    Undo,
    Other,
}

/// Owns the timeline and counters and applies one command per cycle
#[derive(Debug)]
pub struct Session<C: Clock> {
    clock: C,
    state: SessionState,
    timeline: Timeline,
    stats: Stats,
    last_command: Option<Command>,
}

impl<C: Clock> Session<C> {
    pub fn new(clock: C) -> Self {
        Self::with_tolerance(clock, DEFAULT_DRIFT_TOLERANCE)
    }

    pub fn with_tolerance(clock: C, drift_tolerance: usize) -> Self {
        let timeline = Timeline::with_tolerance(clock.now(), drift_tolerance);
        Self {
            clock,
            state: SessionState::Stopped,
            timeline,
            stats: Stats::new(),
            last_command: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn last_command(&self) -> Option<Command> {
        self.last_command
    }

    pub fn is_stopped(&self) -> bool {
        self.state == SessionState::Stopped
    }

    /// Starts the loop. A new session waits in `Paused` until resumed.
    pub fn start(&mut self) {
        if self.state == SessionState::Stopped {
            self.state = SessionState::Paused;
            log::info!("session started");
        }
    }

    pub fn handle(&mut self, command: Command) -> SessionState {
        self.last_command = Some(command);

        let next = match (self.state, command) {
            (SessionState::Stopped, _) => SessionState::Stopped,
            (_, Command::Quit) => SessionState::Stopped,
            (SessionState::Running, Command::Increment) => {
                self.record(Symbol::Tick);
                SessionState::Running
            }
            (SessionState::Running, Command::Pause) => {
                self.record(Symbol::PauseMark);
                SessionState::Paused
            }
            (SessionState::Running, Command::Undo) => {
                if self.timeline.undo_last() {
                    self.stats.on_undo();
                    log::debug!("undo: last tick reverted");
                } else {
                    log::debug!("undo: no tick in the visible window");
                }
                SessionState::Running
            }
            (SessionState::Running, _) => {
                self.record(Symbol::Idle);
                SessionState::Running
            }
            (SessionState::Paused, Command::StartOrResume) => {
                self.record(Symbol::ResumeMark);
                SessionState::Running
            }
            (SessionState::Paused, _) => {
                self.record(Symbol::Blank);
                SessionState::Paused
            }
        };

        if next != self.state {
            log::debug!("state: {} -> {next}", self.state);
            self.state = next;
        }
        next
    }

    /// Appends to the timeline and keeps the counters in step with wherever
    /// the symbol landed
    fn record(&mut self, symbol: Symbol) {
        let appended = self.timeline.append(symbol, self.clock.now());
        if let Some(backfill) = appended.backfill {
            self.stats.on_drift_correction(&backfill);
        }
        match appended.placement {
            Placement::Pushed => self.stats.on_recorded(symbol),
            Placement::Replaced(previous) => {
                self.stats.on_replaced(previous);
                self.stats.on_recorded(symbol);
            }
            Placement::Dropped => {}
        }
    }
}
