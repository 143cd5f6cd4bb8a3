// SPDX-License-Identifier: MIT
//
// Library-managed backend.
//
// crossterm owns raw mode, the alternate screen, mouse capture and input
// decoding; we only translate its vocabulary. Keys go through the
// `CURSES` key table, mouse reports map onto `MouseFlags`, and resize
// events arrive from the library itself. Frames are still rendered by
// our own screen buffer and written as plain ANSI.
//
// Colors: attribute codes are color-pair indices, allocated on first use
// and stable for the life of the backend.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use tracing::{debug, trace};

use super::{
    Backend, BackendKind, InputReader, ReadOutcome, ResizeStrategy, Size, SizeProbe,
    install_panic_hook,
};
use crate::ansi::{self, MouseMode};
use crate::cell::Attribute;
use crate::color::Color;
use crate::config::DriverConfig;
use crate::error::{Error, Result};
use crate::event_loop::RawInputFrame;
use crate::key::KeyEvent;
use crate::keymap;
use crate::mouse::{MouseButton, MouseEvent, MouseFlags};

fn query_size() -> Option<Size> {
    terminal::size()
        .ok()
        .map(|(cols, rows)| Size::new(cols, rows))
        .filter(|s| !s.is_empty())
}

// ─── Translation ────────────────────────────────────────────────────────────

/// crossterm key event → canonical key event.
#[must_use]
pub fn map_key(ev: &event::KeyEvent) -> Option<KeyEvent> {
    let key = keymap::map_crossterm(ev.code, ev.modifiers)?;
    Some(match ev.kind {
        KeyEventKind::Press | KeyEventKind::Repeat => KeyEvent::down(key),
        KeyEventKind::Release => KeyEvent::up(key),
    })
}

/// crossterm mouse event → canonical mouse event.
///
/// crossterm always captures all motion; `mode` filters it back down to
/// what was asked for.
#[must_use]
pub fn map_mouse(ev: &event::MouseEvent, mode: MouseMode) -> Option<MouseEvent> {
    use crossterm::event::{KeyModifiers as Km, MouseButton as Cb};

    let button = |b: Cb| match b {
        Cb::Left => MouseButton::Button1,
        Cb::Middle => MouseButton::Button2,
        Cb::Right => MouseButton::Button3,
    };
    let mut flags = match ev.kind {
        MouseEventKind::Down(b) => button(b).pressed() | MouseFlags::REPORT_MOUSE_POSITION,
        MouseEventKind::Up(b) => button(b).released(),
        MouseEventKind::Drag(b) if mode != MouseMode::Click => {
            button(b).pressed() | MouseFlags::REPORT_MOUSE_POSITION
        }
        MouseEventKind::Moved if mode == MouseMode::Motion => MouseFlags::REPORT_MOUSE_POSITION,
        MouseEventKind::ScrollUp => MouseFlags::WHEELED_UP,
        MouseEventKind::ScrollDown => MouseFlags::WHEELED_DOWN,
        MouseEventKind::ScrollLeft => MouseFlags::WHEELED_LEFT,
        MouseEventKind::ScrollRight => MouseFlags::WHEELED_RIGHT,
        MouseEventKind::Drag(_) | MouseEventKind::Moved => return None,
    };

    if ev.modifiers.contains(Km::SHIFT) {
        flags |= MouseFlags::SHIFT;
    }
    if ev.modifiers.contains(Km::CONTROL) {
        flags |= MouseFlags::CTRL;
    }
    if ev.modifiers.contains(Km::ALT) {
        flags |= MouseFlags::ALT;
    }
    Some(MouseEvent::new(ev.column, ev.row, flags))
}

/// crossterm event → frame. `None` for events outside the canonical model
/// (focus changes, pastes).
#[must_use]
pub fn map_event(ev: &Event, mode: Option<MouseMode>) -> Option<RawInputFrame> {
    match ev {
        Event::Key(key) => map_key(key).map(RawInputFrame::Key),
        Event::Mouse(mouse) => mode
            .and_then(|mode| map_mouse(mouse, mode))
            .map(RawInputFrame::Mouse),
        Event::Resize(cols, rows) => Some(RawInputFrame::Resize(Size::new(*cols, *rows))),
        Event::FocusGained | Event::FocusLost | Event::Paste(_) => None,
    }
}

// ─── CursesBackend ──────────────────────────────────────────────────────────

pub struct CursesBackend {
    alternate_screen: bool,
    mouse: Option<MouseMode>,
    poll_interval: Duration,
    size: Size,
    /// Color pairs in allocation order; the code of a pair is index + 1.
    pairs: Vec<(Color, Color)>,
    reader_taken: bool,
    active: bool,
}

impl CursesBackend {
    #[must_use]
    pub fn new(config: &DriverConfig) -> Self {
        Self {
            alternate_screen: config.alternate_screen,
            mouse: config.mouse.mode(),
            poll_interval: config.poll_interval(),
            size: Size::FALLBACK,
            pairs: Vec::new(),
            reader_taken: false,
            active: false,
        }
    }

    fn enter(&self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        if self.alternate_screen {
            execute!(out, EnterAlternateScreen)?;
        }
        if self.mouse.is_some() {
            execute!(out, EnableMouseCapture)?;
        }
        let mut seq = Vec::new();
        ansi::cursor_hide(&mut seq)?;
        ansi::clear_screen(&mut seq)?;
        out.write_all(&seq)?;
        out.flush()
    }

    /// Color-pair code for `(fg, bg)`, allocating a new pair on first use.
    fn pair_code(&mut self, fg: Color, bg: Color) -> u32 {
        let index = match self.pairs.iter().position(|&p| p == (fg, bg)) {
            Some(index) => index,
            None => {
                self.pairs.push((fg, bg));
                self.pairs.len() - 1
            }
        };
        u32::try_from(index + 1).unwrap_or(u32::MAX)
    }
}

impl Backend for CursesBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Curses
    }

    fn init(&mut self) -> Result<Size> {
        if self.active {
            return Ok(self.size);
        }
        install_panic_hook();
        if let Err(err) = self.enter() {
            let _ = terminal::disable_raw_mode();
            return Err(Error::init(BackendKind::Curses, err));
        }
        self.active = true;
        self.size = query_size().unwrap_or(Size::FALLBACK);
        debug!(size = %self.size, mouse = ?self.mouse, "curses backend ready");
        Ok(self.size)
    }

    fn take_reader(&mut self) -> Option<Box<dyn InputReader>> {
        if self.reader_taken || !self.active {
            return None;
        }
        self.reader_taken = true;
        Some(Box::new(CursesReader {
            mouse: self.mouse,
            poll_interval: self.poll_interval,
        }))
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()
    }

    fn size(&self) -> Size {
        query_size().unwrap_or(self.size)
    }

    fn make_attribute(&mut self, fg: Color, bg: Color) -> Attribute {
        Attribute::new(fg, bg, self.pair_code(fg, bg))
    }

    fn request_cursor_position(&mut self) -> io::Result<Option<(u16, u16)>> {
        let (col, row) = crossterm::cursor::position()?;
        Ok(Some((row, col)))
    }

    fn resize_strategy(&self) -> ResizeStrategy {
        ResizeStrategy::Reported
    }

    fn size_probe(&self) -> SizeProbe {
        Arc::new(query_size)
    }

    fn end(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        let restored = restore(&mut io::stdout(), self.mouse.is_some(), self.alternate_screen);
        let raw = terminal::disable_raw_mode();
        restored.and(raw)
    }
}

/// Undo what `enter` switched on. Every step runs even when an earlier
/// one fails; the first error is returned.
fn restore(out: &mut impl Write, mouse: bool, alternate_screen: bool) -> io::Result<()> {
    let mut seq = Vec::new();
    ansi::reset(&mut seq)?;
    ansi::set_cursor_style(&mut seq, ansi::CursorStyle::Default)?;
    ansi::cursor_show(&mut seq)?;

    let mut steps = Vec::with_capacity(4);
    if mouse {
        steps.push(execute!(out, DisableMouseCapture));
    }
    steps.push(out.write_all(&seq));
    if alternate_screen {
        steps.push(execute!(out, LeaveAlternateScreen));
    }
    steps.push(out.flush());
    steps.into_iter().collect()
}

impl Drop for CursesBackend {
    fn drop(&mut self) {
        let _ = self.end();
    }
}

// ─── CursesReader ───────────────────────────────────────────────────────────

struct CursesReader {
    mouse: Option<MouseMode>,
    poll_interval: Duration,
}

impl InputReader for CursesReader {
    fn read_raw_event(&mut self) -> io::Result<ReadOutcome> {
        if !event::poll(self.poll_interval)? {
            return Ok(ReadOutcome::Idle);
        }
        let ev = event::read()?;
        Ok(match map_event(&ev, self.mouse) {
            Some(frame) => ReadOutcome::Frame(frame),
            None => {
                trace!(?ev, "ignored");
                ReadOutcome::Idle
            }
        })
    }

    fn is_cancellable(&self) -> bool {
        true
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
