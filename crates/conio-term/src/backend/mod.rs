// SPDX-License-Identifier: MIT
//
// Platform backends.
//
// A backend owns one way of talking to a console: putting it into raw
// mode, writing frames to it, reading native input and folding that input
// into canonical frames. The driver holds exactly one, chosen at startup:
//
//   curses   crossterm owns raw mode and key decoding (library-managed)
//   net      raw termios + our own escape decoder over stdin/stdout
//   windows  Win32 console API, one input record at a time
//   null     no console at all; scripted input, captured output
//
// Reading happens on a separate thread, so the reading half is split off
// as an `InputReader` the driver moves into its reader thread.
//
// Terminal restore on panic lives here too: every backend that changes
// terminal modes installs the same hook, which writes a pre-built restore
// sequence straight to the stdout descriptor (bypassing the stdout lock
// the panicking frame may hold) and puts the saved termios back.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Once};

use tracing::warn;

use crate::capabilities::Capabilities;
use crate::cell::Attribute;
use crate::color::Color;
use crate::config::DriverConfig;
use crate::error::{Error, Result};
use crate::event_loop::RawInputFrame;

pub mod console_record;
pub mod curses;
pub mod net;
pub mod null;
#[cfg(windows)]
pub mod windows;

pub use null::{NullBackend, NullHandle};

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub cols: u16,
    pub rows: u16,
}

impl Size {
    /// Used when the real size cannot be determined.
    pub const FALLBACK: Self = Self { cols: 80, rows: 24 };

    #[inline]
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Total number of cells.
    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.cols as u32 * self.rows as u32
    }

    /// A size with no cells is never a real terminal size.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.cols == 0 || self.rows == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

// ─── Backend traits ─────────────────────────────────────────────────────────

/// Backend identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Curses,
    Net,
    Windows,
    Null,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Curses => "curses",
            Self::Net => "net",
            Self::Windows => "windows",
            Self::Null => "null",
        })
    }
}

/// How the driver learns about size changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeStrategy {
    /// The reader emits `Resize` frames itself (SIGWINCH, crossterm).
    Reported,
    /// Nobody signals; the size must be sampled periodically.
    Sampled,
}

/// Queries the live console size from any thread.
pub type SizeProbe = Arc<dyn Fn() -> Option<Size> + Send + Sync>;

/// What one `read_raw_event` call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Frame(RawInputFrame),
    /// Nothing arrived within the reader's poll timeout.
    Idle,
    /// The input stream ended; the reader thread should stop.
    Closed,
}

/// The reading half of a backend. Runs on the reader thread.
pub trait InputReader: Send {
    /// Read one frame.
    ///
    /// Cancellable readers return `Idle` after a bounded wait, so the
    /// thread can check for shutdown between calls.
    ///
    /// # Errors
    ///
    /// Any error is treated as an empty read by the reader thread.
    fn read_raw_event(&mut self) -> io::Result<ReadOutcome>;

    /// Whether `read_raw_event` returns within a bounded time. Readers
    /// that block indefinitely are detached at shutdown rather than joined.
    fn is_cancellable(&self) -> bool;
}

/// One way of driving a console.
pub trait Backend: Send {
    fn kind(&self) -> BackendKind;

    /// Acquire the console and switch it to full-screen raw mode.
    ///
    /// # Errors
    ///
    /// `Error::Init` when the console cannot be put in the needed mode.
    fn init(&mut self) -> Result<Size>;

    /// The reading half. Available once, after `init`.
    fn take_reader(&mut self) -> Option<Box<dyn InputReader>>;

    /// Write raw bytes (a rendered frame or a control sequence).
    ///
    /// # Errors
    ///
    /// Returns the console's write error.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Current console size.
    fn size(&self) -> Size;

    /// Build the attribute for a color pair, with this backend's code.
    fn make_attribute(&mut self, fg: Color, bg: Color) -> Attribute;

    /// Ask for the cursor position. `Some` when the backend can answer
    /// synchronously; `None` when the answer arrives later as a
    /// `TerminalResponse::CursorPosition` frame.
    ///
    /// # Errors
    ///
    /// Returns the write error of the request.
    fn request_cursor_position(&mut self) -> io::Result<Option<(u16, u16)>>;

    fn resize_strategy(&self) -> ResizeStrategy;

    /// A thread-safe size query for the resize sampler.
    fn size_probe(&self) -> SizeProbe;

    /// Restore the console. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the first failure while restoring modes.
    fn end(&mut self) -> io::Result<()>;
}

/// `io::Write` view of a backend, for the screen renderer.
pub struct BackendWriter<'a>(pub &'a mut dyn Backend);

impl Write for BackendWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)?;
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ─── Selection ──────────────────────────────────────────────────────────────

/// Create the backend `config` asks for.
///
/// Without an attached console every real backend degrades to the null
/// backend (or fails with `Error::NoConsole` when that is not allowed).
///
/// # Errors
///
/// `Error::NoConsole`, or `Error::Unsupported` for the Windows backend on
/// other platforms.
pub fn open(config: &DriverConfig, caps: &Capabilities) -> Result<Box<dyn Backend>> {
    let kind = config.backend.resolve();
    if kind == BackendKind::Null {
        return Ok(Box::new(NullBackend::new(Size::FALLBACK)));
    }
    if !caps.console_attached {
        if !config.fallback_to_null {
            return Err(Error::NoConsole);
        }
        warn!(backend = %kind, "no console attached, using the null backend");
        return Ok(Box::new(NullBackend::new(Size::FALLBACK)));
    }
    match kind {
        BackendKind::Curses => Ok(Box::new(curses::CursesBackend::new(config))),
        BackendKind::Net => Ok(Box::new(net::NetBackend::new(config))),
        #[cfg(windows)]
        BackendKind::Windows => Ok(Box::new(windows::WindowsBackend::new(config))),
        #[cfg(not(windows))]
        BackendKind::Windows => Err(Error::Unsupported(BackendKind::Windows)),
        BackendKind::Null => Ok(Box::new(NullBackend::new(Size::FALLBACK))),
    }
}

// ─── Panic-safe restore ─────────────────────────────────────────────────────

/// Everything a backend may have switched on, switched off: mouse
/// tracking, colors, cursor style and visibility, then the alternate
/// screen last so the shell's content comes back clean.
#[rustfmt::skip]
pub(crate) const EMERGENCY_RESTORE: &[u8] = b"\
    \x1b[?1006l\x1b[?1003l\x1b[?1002l\x1b[?1000l\
    \x1b[0m\
    \x1b[0 q\
    \x1b[?25h\
    \x1b[?1049l";

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Install, once per process, a panic hook that restores the terminal
/// before the original hook prints the panic message.
pub(crate) fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            emergency_restore();
            original(info);
        }));
    });
}

#[allow(unsafe_code)]
fn emergency_restore() {
    #[cfg(unix)]
    {
        // SAFETY: a single write(2) of a static buffer to fd 1.
        unsafe {
            let _ = libc::write(
                libc::STDOUT_FILENO,
                EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
                EMERGENCY_RESTORE.len(),
            );
        }
        net::restore_termios_from_backup();
    }

    #[cfg(not(unix))]
    {
        let mut out = io::stdout();
        let _ = out.write_all(EMERGENCY_RESTORE);
        let _ = out.flush();
    }

    let _ = crossterm::terminal::disable_raw_mode();
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendChoice;
    use pretty_assertions::assert_eq;

    #[test]
    fn size_area_and_display() {
        let size = Size::new(80, 24);
        assert_eq!(size.area(), 1920);
        assert_eq!(size.to_string(), "80x24");
        assert!(Size::new(0, 24).is_empty());
    }

    #[test]
    fn kind_displays_lowercase() {
        assert_eq!(BackendKind::Curses.to_string(), "curses");
        assert_eq!(BackendKind::Windows.to_string(), "windows");
    }

    #[test]
    fn headless_degrades_to_null() {
        let config = DriverConfig {
            backend: BackendChoice::Net,
            ..DriverConfig::default()
        };
        let backend = open(&config, &Capabilities::headless()).unwrap();
        assert_eq!(backend.kind(), BackendKind::Null);
    }

    #[test]
    fn headless_without_fallback_fails() {
        let config = DriverConfig {
            backend: BackendChoice::Curses,
            fallback_to_null: false,
            ..DriverConfig::default()
        };
        assert!(matches!(
            open(&config, &Capabilities::headless()),
            Err(Error::NoConsole)
        ));
    }

    #[test]
    fn explicit_null_needs_no_console() {
        let config = DriverConfig {
            backend: BackendChoice::Null,
            fallback_to_null: false,
            ..DriverConfig::default()
        };
        assert_eq!(
            open(&config, &Capabilities::headless()).unwrap().kind(),
            BackendKind::Null
        );
    }

    #[test]
    fn backend_writer_forwards() {
        let mut backend = NullBackend::new(Size::new(10, 2));
        let handle = backend.handle();
        BackendWriter(&mut backend).write_all(b"abc").unwrap();
        assert_eq!(handle.take_output(), b"abc");
    }

    #[test]
    fn emergency_restore_exits_alt_screen_last() {
        let s = std::str::from_utf8(EMERGENCY_RESTORE).unwrap();
        assert!(s.ends_with("\x1b[?1049l"));
        assert!(s.contains("\x1b[?1000l"));
        assert!(s.contains("\x1b[?25h"));
    }
}
