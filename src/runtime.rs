use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use clap::ValueEnum;
use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::session::{Command, Session};

/// Source of key presses for the render loop
pub trait KeySource: Send + 'static {
    /// Block for up to `timeout` waiting for a key.
    /// Returns Ok(None) if the timeout expires first.
    fn read_key(&self, timeout: Duration) -> io::Result<Option<KeyEvent>>;
}

/// Which `KeySource` the binary wires in at startup
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
pub enum InputBackend {
    /// poll the terminal from the loop thread
    #[default]
    Poll,
    /// read the terminal on a dedicated thread
    Thread,
}

impl InputBackend {
    pub fn key_source(self) -> Box<dyn KeySource> {
        match self {
            InputBackend::Poll => Box::new(PollKeySource),
            InputBackend::Thread => Box::new(ThreadKeySource::new()),
        }
    }
}

impl<K: KeySource + ?Sized> KeySource for Box<K> {
    fn read_key(&self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        (**self).read_key(timeout)
    }
}

/// Reads the raw-mode terminal directly with `crossterm::event::poll`
#[derive(Debug, Default, Clone, Copy)]
pub struct PollKeySource;

impl KeySource for PollKeySource {
    fn read_key(&self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !event::poll(remaining)? {
                return Ok(None);
            }
            // resize and mouse events are dropped; the next frame redraws anyway
            if let CtEvent::Key(key) = event::read()? {
                return Ok(Some(key));
            }
        }
    }
}

/// Reads the terminal on a background thread and hands keys over a channel
pub struct ThreadKeySource {
    rx: Receiver<KeyEvent>,
}

impl ThreadKeySource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if tx.send(key).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    log::warn!("key reader stopped: {err}");
                    break;
                }
            }
        });

        Self { rx }
    }
}

impl Default for ThreadKeySource {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for ThreadKeySource {
    fn read_key(&self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        match self.rx.recv_timeout(timeout) {
            Ok(key) => Ok(Some(key)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(io::Error::other("key reader stopped")),
        }
    }
}

/// Test key source fed through a channel
pub struct TestKeySource {
    rx: Receiver<KeyEvent>,
}

impl TestKeySource {
    pub fn new(rx: Receiver<KeyEvent>) -> Self {
        Self { rx }
    }
}

impl KeySource for TestKeySource {
    fn read_key(&self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        match self.rx.recv_timeout(timeout) {
            Ok(key) => Ok(Some(key)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Maps a raw key to the command alphabet
pub fn command_for_key(key: &KeyEvent) -> Command {
    if key.kind != KeyEventKind::Press {
        return Command::Other;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Command::Quit,
        KeyCode::Char('q') => Command::Quit,
        KeyCode::Enter | KeyCode::Char(' ') => Command::Increment,
        KeyCode::Char('p') => Command::Pause,
        KeyCode::Char('s') => Command::StartOrResume,
        KeyCode::Char('u') => Command::Undo,
        _ => Command::Other,
    }
}

/// Drives the one-command-per-interval cadence
pub struct Runner<K: KeySource, T: Ticker> {
    key_source: K,
    ticker: T,
}

impl<K: KeySource, T: Ticker> Runner<K, T> {
    pub fn new(key_source: K, ticker: T) -> Self {
        Self { key_source, ticker }
    }

    /// Waits out one interval and returns the first key pressed in it, if any.
    /// Keys after the first stay queued for later cycles.
    pub fn step(&self) -> io::Result<Option<KeyEvent>> {
        let interval = self.ticker.interval();
        let started = Instant::now();
        let key = self.key_source.read_key(interval)?;
        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
        Ok(key)
    }

    /// Like `step`, mapped to a command; no key is `Command::Other`
    pub fn next_command(&self) -> io::Result<Command> {
        Ok(self
            .step()?
            .map_or(Command::Other, |key| command_for_key(&key)))
    }
}

/// Runs a session until it stops: render, wait one interval for a key, apply it.
pub fn drive<C, K, T, F>(
    session: &mut Session<C>,
    runner: &Runner<K, T>,
    mut render: F,
) -> io::Result<()>
where
    C: Clock,
    K: KeySource,
    T: Ticker,
    F: FnMut(&Session<C>) -> io::Result<()>,
{
    session.start();
    while !session.is_stopped() {
        render(session)?;
        let command = runner.next_command()?;
        session.handle(command);
    }
    Ok(())
}
