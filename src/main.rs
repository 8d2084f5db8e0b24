use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::{
    error::Error,
    fs::{self, File},
    io::{self, stdin},
    path::{Path, PathBuf},
};
use tally::{
    app_dirs::AppDirs,
    clock::SystemClock,
    config::{Config, ConfigStore, FileConfigStore, MIN_TICK_INTERVAL_MS},
    runtime::{self, FixedTicker, InputBackend, Runner},
    session::Session,
    timeline::ClockFormat,
    ui::SessionView,
};

/// terminal tally counter with a rolling ten-minute timeline
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Counts events one keypress at a time and draws the last ten minutes as a timeline, one symbol per second: # counted, . idle, < pause, > resume."
)]
pub struct Cli {
    /// milliseconds per cycle (one recorded second), at least 1000
    #[clap(long, value_parser = clap::value_parser!(u64).range(MIN_TICK_INTERVAL_MS..))]
    interval_ms: Option<u64>,

    /// seconds the timeline may fall behind the clock before it is backfilled
    #[clap(long)]
    drift_tolerance: Option<usize>,

    /// how minute labels and the clock are written
    #[clap(long, value_enum)]
    clock: Option<ClockFormat>,

    /// how keys are read from the terminal
    #[clap(long, value_enum)]
    input: Option<InputBackend>,

    /// disable colors
    #[clap(long)]
    no_color: bool,

    /// config file to read (and write with --save-config)
    #[clap(long)]
    config: Option<PathBuf>,

    /// persist the effective settings to the config file
    #[clap(long)]
    save_config: bool,

    /// file to write logs to
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// log verbosity
    #[clap(long, default_value_t = LevelFilter::Info, value_parser = parse_level)]
    log_level: LevelFilter,
}

fn parse_level(s: &str) -> Result<LevelFilter, String> {
    s.parse()
        .map_err(|_| format!("unknown log level `{s}` (off, error, warn, info, debug, trace)"))
}

impl Cli {
    /// Layer command line flags over the stored config
    fn apply(&self, mut config: Config) -> Config {
        if let Some(ms) = self.interval_ms {
            config.tick_interval_ms = ms;
        }
        if let Some(tolerance) = self.drift_tolerance {
            config.drift_tolerance = tolerance;
        }
        if let Some(clock) = self.clock {
            config.clock_format = clock;
        }
        if let Some(input) = self.input {
            config.input = input;
        }
        if self.no_color {
            config.color = false;
        }
        config
    }

    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }

    fn log_path(&self) -> Option<PathBuf> {
        self.log_file.clone().or_else(AppDirs::log_path)
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

/// Logging is optional: problems are reported on stderr before the
/// terminal switches to raw mode, and the counter runs without a log.
fn init_logging(cli: &Cli) {
    let Some(path) = cli.log_path() else {
        return;
    };

    let log_file = match open_log_file(&path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("warning: logging disabled, cannot open {}: {err}", path.display());
            return;
        }
    };

    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Err(err) = WriteLogger::init(cli.log_level, log_config, log_file) {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    init_logging(&cli);

    let store = cli.config_store();
    let config = cli.apply(store.load());
    if cli.save_config {
        store.save(&config)?;
        log::info!("saved config to {}", store.path().display());
    }
    log::info!("tally starting with {config:?}");

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &config);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result?;
    println!("Bye!");
    Ok(())
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, config: &Config) -> io::Result<()> {
    let runner = Runner::new(
        config.input.key_source(),
        FixedTicker::new(config.tick_interval()),
    );
    let mut session = Session::with_tolerance(SystemClock, config.drift_tolerance);

    runtime::drive(&mut session, &runner, |session| {
        terminal
            .draw(|f| {
                f.render_widget(
                    SessionView::new(session, config.clock_format, config.color),
                    f.area(),
                )
            })
            .map(|_| ())
    })?;

    let stats = session.stats();
    log::info!(
        "session stopped: total {} elapsed {} drift corrections {}",
        stats.tick_count,
        stats.elapsed_text(),
        stats.drift_correction_count
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["tally"]);

        assert_eq!(cli.interval_ms, None);
        assert_eq!(cli.drift_tolerance, None);
        assert_eq!(cli.clock, None);
        assert_eq!(cli.input, None);
        assert!(!cli.no_color);
        assert!(!cli.save_config);
        assert_eq!(cli.log_level, LevelFilter::Info);
    }

    #[test]
    fn test_cli_defaults_keep_stored_config() {
        let cli = Cli::parse_from(["tally"]);
        let stored = Config {
            tick_interval_ms: 2000,
            ..Config::default()
        };
        assert_eq!(cli.apply(stored.clone()), stored);
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "tally",
            "--interval-ms",
            "1250",
            "--drift-tolerance",
            "2",
            "--clock",
            "twenty-four-hour",
            "--input",
            "thread",
            "--no-color",
        ]);
        let config = cli.apply(Config::default());

        assert_eq!(config.tick_interval_ms, 1250);
        assert_eq!(config.drift_tolerance, 2);
        assert_eq!(config.clock_format, ClockFormat::TwentyFourHour);
        assert_eq!(config.input, InputBackend::Thread);
        assert!(!config.color);
    }

    #[test]
    fn test_cli_rejects_sub_second_interval() {
        assert!(Cli::try_parse_from(["tally", "--interval-ms", "50"]).is_err());
        assert!(Cli::try_parse_from(["tally", "--interval-ms", "1000"]).is_ok());
    }

    #[test]
    fn test_open_log_file_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("tally").join("tally.log");
        assert!(open_log_file(&path).is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_open_log_file_reports_unusable_path() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();
        assert!(open_log_file(&blocker.join("tally.log")).is_err());
    }

    #[test]
    fn test_cli_rejects_unknown_clock() {
        assert!(Cli::try_parse_from(["tally", "--clock", "sundial"]).is_err());
    }

    #[test]
    fn test_cli_log_level() {
        let cli = Cli::parse_from(["tally", "--log-level", "debug"]);
        assert_eq!(cli.log_level, LevelFilter::Debug);
        assert!(Cli::try_parse_from(["tally", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn test_cli_paths() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("c.json");
        let log_path = dir.path().join("t.log");
        let cli = Cli::parse_from([
            "tally",
            "--config",
            config_path.to_str().unwrap(),
            "--log-file",
            log_path.to_str().unwrap(),
        ]);

        assert_eq!(cli.config_store().path(), config_path.as_path());
        assert_eq!(cli.log_path(), Some(log_path));
    }

    #[test]
    fn test_start_tui_stops_on_quit_key() {
        // drives the real loop body through a TestBackend; only the key
        // source differs from production
        use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
        use ratatui::backend::TestBackend;
        use std::{sync::mpsc, time::Duration};
        use tally::runtime::TestKeySource;

        let (tx, rx) = mpsc::channel();
        tx.send(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE))
            .unwrap();
        let runner = Runner::new(
            TestKeySource::new(rx),
            FixedTicker::new(Duration::from_millis(5)),
        );
        let mut terminal = Terminal::new(TestBackend::new(90, 20)).unwrap();
        let mut session = Session::new(SystemClock);
        let mut frames = 0;

        runtime::drive(&mut session, &runner, |session| {
            frames += 1;
            terminal
                .draw(|f| {
                    f.render_widget(
                        SessionView::new(session, ClockFormat::TwelveHour, true),
                        f.area(),
                    )
                })
                .map(|_| ())
        })
        .unwrap();

        assert!(session.is_stopped());
        assert_eq!(frames, 1);
    }
}
