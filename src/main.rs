// SPDX-License-Identifier: MIT
//
// conio: terminal event inspector.
//
// Opens the console through conio-term and echoes every canonical event it
// receives, newest at the bottom, so the key and mouse mapping of each
// backend can be checked by hand. `q` or Ctrl+Q quits.
//
//   conio [config.toml]
//
// Logs go to a file (`CONIO_LOG` sets the filter, default `info`) because
// the terminal itself is the thing being inspected.

use std::collections::VecDeque;
use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

use conio_term::{
    Action, App, Color, ConsoleDriver, DriverConfig, Key, KeyCode, KeyEvent, KeyPhase, Modifiers,
    MouseEvent, Size, TerminalResponse,
};

const DEFAULT_CONFIG: &str = "conio.toml";
const LOG_FILE: &str = "conio.log";

/// Lines kept regardless of screen height, so growing the window shows
/// older events again.
const HISTORY: usize = 500;

// ─── Inspector ──────────────────────────────────────────────────────────────

struct Inspector {
    lines: VecDeque<String>,
    size: Size,
}

impl Inspector {
    fn new(size: Size) -> Self {
        Self {
            lines: VecDeque::with_capacity(HISTORY),
            size,
        }
    }

    fn record(&mut self, line: String) {
        info!(target: "conio::event", "{line}");
        if self.lines.len() == HISTORY {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }
}

fn is_quit(key: Key) -> bool {
    key == Key::plain(KeyCode::Char('q')) || key == Key::new(KeyCode::Char('q'), Modifiers::CTRL)
}

impl App for Inspector {
    fn on_key(&mut self, event: KeyEvent) -> Action {
        let phase = match event.phase {
            KeyPhase::Down => "down",
            KeyPhase::Up => "up",
        };
        self.record(format!("key    {} ({phase}, {:#010x})", event.key, event.key.bits()));
        if event.phase == KeyPhase::Down && is_quit(event.key) {
            Action::Quit
        } else {
            Action::Continue
        }
    }

    fn on_mouse(&mut self, event: MouseEvent) -> Action {
        self.record(format!("mouse  {},{} {:?}", event.x, event.y, event.flags));
        Action::Continue
    }

    fn on_resize(&mut self, size: Size) {
        self.size = size;
        self.record(format!("resize {size}"));
    }

    fn on_response(&mut self, response: &TerminalResponse) {
        self.record(format!("reply  {response:?}"));
    }

    fn paint(&mut self, driver: &mut ConsoleDriver) {
        let rows = driver.rows();
        if rows == 0 {
            return;
        }

        let body = driver.make_attribute(Color::Default, Color::Default);
        driver.set_attribute(body);
        driver.fill(' ');

        let title = driver.make_attribute(Color::BLACK, Color::CYAN);
        driver.set_attribute(title);
        driver.move_to(0, 0);
        let header = format!(
            " conio · {} backend · {} · q quits ",
            driver.kind(),
            self.size
        );
        driver.add_str(&header);

        driver.set_attribute(body);
        let visible = usize::from(rows - 1);
        let skip = self.lines.len().saturating_sub(visible);
        for (row, line) in (1..rows).zip(self.lines.iter().skip(skip)) {
            driver.move_to(row, 0);
            driver.add_str(line);
        }
        driver.set_cursor(None);
    }
}

// ─── Setup ──────────────────────────────────────────────────────────────────

fn init_logging() -> Result<()> {
    let path = env::temp_dir().join(LOG_FILE);
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let filter = EnvFilter::try_from_env("CONIO_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}

fn load_config(arg: Option<PathBuf>) -> Result<DriverConfig> {
    match arg {
        Some(path) => DriverConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            DriverConfig::load(Path::new(DEFAULT_CONFIG))
                .with_context(|| format!("loading config {DEFAULT_CONFIG}"))
        }
        None => Ok(DriverConfig::default()),
    }
}

fn main() -> Result<()> {
    init_logging()?;
    let config = load_config(env::args_os().nth(1).map(PathBuf::from))?;
    info!(backend = ?config.backend, "conio starting");

    let mut driver = ConsoleDriver::open(&config).context("opening the console")?;
    let mut inspector = Inspector::new(driver.size());
    inspector.record(format!(
        "opened {} backend, {}, true color {}",
        driver.kind(),
        driver.size(),
        driver.capabilities().true_color
    ));

    driver.run(&mut inspector);
    driver.end().context("restoring the console")?;
    info!(events = inspector.lines.len(), "conio exiting");
    Ok(())
}
