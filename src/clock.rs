use std::cell::Cell;

use chrono::{Duration, Local, NaiveDateTime, Timelike};

/// Source of local wall-clock time, truncated to whole seconds
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Production clock backed by the local timezone
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        truncate_to_second(Local::now().naive_local())
    }
}

/// Hand-driven clock for tests and headless runs
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Cell::new(truncate_to_second(start)),
        }
    }

    pub fn set(&self, t: NaiveDateTime) {
        self.now.set(truncate_to_second(t));
    }

    pub fn advance(&self, secs: i64) {
        self.now.set(self.now.get() + Duration::seconds(secs));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

pub fn truncate_to_second(t: NaiveDateTime) -> NaiveDateTime {
    t.with_nanosecond(0).unwrap_or(t)
}

pub fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    truncate_to_second(t).with_second(0).unwrap_or(t)
}
