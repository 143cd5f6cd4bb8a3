// SPDX-License-Identifier: MIT
//
// Direct ANSI backend.
//
// Talks VT100/xterm over plain stdin/stdout: termios raw mode, the
// alternate screen, SGR mouse tracking. Input bytes go through our own
// escape sequence decoder; nothing between us and the terminal makes
// decisions on our behalf.
//
// Safety: termios (tcgetattr, tcsetattr), ioctl (TIOCGWINSZ), poll, read
// and sigaction have no safe std equivalents. Each unsafe block is
// minimal and documented.
#![allow(unsafe_code)]
//
// Reading: the reader polls stdin with the poll interval as timeout, so
// it returns `Idle` regularly and the reader thread can stop promptly.
// While the decoder holds a partial sequence the timeout shrinks to the
// escape timeout; if it passes with no more input, the pending bytes are
// flushed (a lone ESC becomes the Escape key).
//
// Resize: SIGWINCH sets a flag; the reader turns it into a `Resize` frame
// at its next wakeup. poll() returns EINTR when the signal lands, so the
// frame follows the resize immediately.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::{
    Backend, BackendKind, InputReader, ReadOutcome, ResizeStrategy, Size, SizeProbe,
    install_panic_hook,
};
use crate::ansi::{self, MouseMode};
use crate::cell::Attribute;
use crate::color::Color;
use crate::config::DriverConfig;
use crate::decoder::{Decoder, PendingReports};
use crate::error::{Error, Result};
use crate::event_loop::RawInputFrame;

/// Bytes read from stdin per call. A keypress is 1–6 bytes; a paste or a
/// burst of mouse motion can be much more.
const READ_BUF_SIZE: usize = 4096;

// ─── Terminal queries ───────────────────────────────────────────────────────

/// Query the terminal size via `ioctl(TIOCGWINSZ)`.
#[cfg(unix)]
#[must_use]
pub fn get_size() -> Option<Size> {
    // SAFETY: winsize is plain old data; ioctl fills it or fails.
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &raw mut ws) };
    (result == 0 && ws.ws_col > 0 && ws.ws_row > 0).then(|| Size::new(ws.ws_col, ws.ws_row))
}

#[cfg(not(unix))]
#[must_use]
pub fn get_size() -> Option<Size> {
    crossterm::terminal::size()
        .ok()
        .map(|(cols, rows)| Size::new(cols, rows))
        .filter(|s| !s.is_empty())
}

// ─── termios backup ─────────────────────────────────────────────────────────

/// Original termios for the panic hook, which cannot reach the backend.
#[cfg(unix)]
static TERMIOS_BACKUP: std::sync::Mutex<Option<libc::termios>> = std::sync::Mutex::new(None);

/// Put the saved termios back. Best-effort.
#[cfg(unix)]
pub(crate) fn restore_termios_from_backup() {
    if let Ok(guard) = TERMIOS_BACKUP.lock() {
        if let Some(ref original) = *guard {
            // SAFETY: restoring a termios previously read from the same fd.
            unsafe {
                let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, original);
            }
        }
    }
}

// ─── SIGWINCH ───────────────────────────────────────────────────────────────

#[cfg(unix)]
static SIGWINCH_RECEIVED: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn sigwinch_handler(_sig: libc::c_int) {
    SIGWINCH_RECEIVED.store(true, std::sync::atomic::Ordering::Relaxed);
}

/// Install the SIGWINCH handler. Without SA_RESTART, so a blocked poll()
/// wakes up with EINTR.
#[cfg(unix)]
fn install_sigwinch_handler() -> io::Result<()> {
    // SAFETY: the handler only stores to an atomic, which is
    // async-signal-safe.
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigwinch_handler as *const () as usize;
        sa.sa_flags = 0;
        libc::sigemptyset(&raw mut sa.sa_mask);
        if libc::sigaction(libc::SIGWINCH, &raw const sa, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(unix)]
fn take_sigwinch() -> bool {
    SIGWINCH_RECEIVED.swap(false, std::sync::atomic::Ordering::Relaxed)
}

// ─── StreamFramer ───────────────────────────────────────────────────────────

/// Bytes in, frames out, with the escape timeout applied.
///
/// This is the platform-independent half of the reader: it owns the
/// decoder and the queue of decoded frames, and decides when pending
/// bytes have waited long enough.
#[derive(Debug)]
pub struct StreamFramer {
    decoder: Decoder,
    frames: VecDeque<RawInputFrame>,
    escape_timeout: Duration,
    last_input: Instant,
}

impl StreamFramer {
    #[must_use]
    pub fn new(reports: PendingReports, escape_timeout: Duration) -> Self {
        Self {
            decoder: Decoder::with_reports(reports),
            frames: VecDeque::new(),
            escape_timeout,
            last_input: Instant::now(),
        }
    }

    /// Decode a chunk read at `now`.
    pub fn ingest(&mut self, bytes: &[u8], now: Instant) {
        self.last_input = now;
        self.frames.extend(
            self.decoder
                .advance(bytes)
                .into_iter()
                .filter_map(RawInputFrame::from_decoded),
        );
    }

    /// No input arrived until `now`. Flushes pending bytes once the
    /// escape timeout has passed since the last chunk.
    pub fn idle(&mut self, now: Instant) {
        if self.decoder.has_pending() && now.duration_since(self.last_input) >= self.escape_timeout {
            trace!(pending = ?self.decoder.pending_bytes(), "escape timeout");
            if let Some(frame) = self.decoder.flush().and_then(RawInputFrame::from_decoded) {
                self.frames.push_back(frame);
            }
        }
    }

    /// How long the next read may wait.
    #[must_use]
    pub fn timeout(&self, poll_interval: Duration) -> Duration {
        if self.decoder.has_pending() {
            self.escape_timeout.min(poll_interval)
        } else {
            poll_interval
        }
    }

    pub fn next_frame(&mut self) -> Option<RawInputFrame> {
        self.frames.pop_front()
    }

    pub fn push_frame(&mut self, frame: RawInputFrame) {
        self.frames.push_back(frame);
    }
}

// ─── NetBackend ─────────────────────────────────────────────────────────────

/// Plain ANSI terminal over stdin/stdout.
pub struct NetBackend {
    alternate_screen: bool,
    mouse: Option<MouseMode>,
    poll_interval: Duration,
    escape_timeout: Duration,
    size: Size,
    reports: PendingReports,
    reader: Option<NetReader>,
    active: bool,
    #[cfg(unix)]
    original_termios: Option<libc::termios>,
}

impl NetBackend {
    #[must_use]
    pub fn new(config: &DriverConfig) -> Self {
        Self {
            alternate_screen: config.alternate_screen,
            mouse: config.mouse.mode(),
            poll_interval: config.poll_interval(),
            escape_timeout: config.escape_timeout(),
            size: Size::FALLBACK,
            reports: PendingReports::new(),
            reader: None,
            active: false,
            #[cfg(unix)]
            original_termios: None,
        }
    }

    // ── Raw mode (termios) ──────────────────────────────────────────

    #[cfg(unix)]
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        let fd = libc::STDIN_FILENO;

        // SAFETY: termios is plain old data, filled by tcgetattr and only
        // modified through its public fields before being written back.
        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }

            self.original_termios = Some(termios);
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = Some(termios);
            }

            // cfmakeraw equivalent.
            termios.c_iflag &= !(libc::IGNBRK
                | libc::BRKINT
                | libc::PARMRK
                | libc::ISTRIP
                | libc::INLCR
                | libc::IGNCR
                | libc::ICRNL
                | libc::IXON);
            termios.c_oflag &= !libc::OPOST;
            termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
            termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
            termios.c_cflag |= libc::CS8;
            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;

            if libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const termios) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        debug!("raw mode on");
        Ok(())
    }

    #[cfg(not(unix))]
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        crossterm::terminal::enable_raw_mode()
    }

    #[cfg(unix)]
    fn disable_raw_mode(&mut self) -> io::Result<()> {
        if let Some(ref original) = self.original_termios {
            // SAFETY: writing back the termios read in enable_raw_mode.
            unsafe {
                if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, original) != 0 {
                    return Err(io::Error::last_os_error());
                }
            }
            if let Ok(mut guard) = TERMIOS_BACKUP.lock() {
                *guard = None;
            }
            self.original_termios = None;
            debug!("raw mode off");
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn disable_raw_mode(&mut self) -> io::Result<()> {
        crossterm::terminal::disable_raw_mode()
    }

    fn enter(&mut self) -> io::Result<()> {
        self.enable_raw_mode()?;
        #[cfg(unix)]
        install_sigwinch_handler()?;

        let mut seq = Vec::new();
        if self.alternate_screen {
            ansi::enter_alt_screen(&mut seq)?;
        }
        ansi::cursor_hide(&mut seq)?;
        ansi::clear_screen(&mut seq)?;
        if let Some(mode) = self.mouse {
            ansi::enable_mouse(&mut seq, mode)?;
        }
        self.write(&seq)
    }
}

impl Backend for NetBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Net
    }

    fn init(&mut self) -> Result<Size> {
        if self.active {
            return Ok(self.size);
        }
        install_panic_hook();
        if let Err(err) = self.enter() {
            let _ = self.disable_raw_mode();
            return Err(Error::init(BackendKind::Net, err));
        }
        self.active = true;
        self.size = get_size().unwrap_or(Size::FALLBACK);
        self.reader = Some(NetReader::new(
            StreamFramer::new(self.reports.clone(), self.escape_timeout),
            self.poll_interval,
        ));
        debug!(size = %self.size, mouse = ?self.mouse, "net backend ready");
        Ok(self.size)
    }

    fn take_reader(&mut self) -> Option<Box<dyn InputReader>> {
        self.reader
            .take()
            .map(|reader| Box::new(reader) as Box<dyn InputReader>)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()
    }

    fn size(&self) -> Size {
        get_size().unwrap_or(self.size)
    }

    fn make_attribute(&mut self, fg: Color, bg: Color) -> Attribute {
        Attribute::new(fg, bg, 0)
    }

    fn request_cursor_position(&mut self) -> io::Result<Option<(u16, u16)>> {
        self.reports.register();
        let mut seq = Vec::new();
        ansi::request_cursor_position(&mut seq)?;
        self.write(&seq)?;
        Ok(None)
    }

    fn resize_strategy(&self) -> ResizeStrategy {
        if cfg!(unix) {
            ResizeStrategy::Reported
        } else {
            ResizeStrategy::Sampled
        }
    }

    fn size_probe(&self) -> SizeProbe {
        Arc::new(get_size)
    }

    fn end(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        let mut seq = Vec::new();
        if self.mouse.is_some() {
            ansi::disable_mouse(&mut seq)?;
        }
        ansi::reset(&mut seq)?;
        ansi::set_cursor_style(&mut seq, ansi::CursorStyle::Default)?;
        ansi::cursor_show(&mut seq)?;
        if self.alternate_screen {
            ansi::exit_alt_screen(&mut seq)?;
        }
        let written = self.write(&seq);
        self.disable_raw_mode()?;
        written
    }
}

impl Drop for NetBackend {
    fn drop(&mut self) {
        let _ = self.end();
    }
}

// ─── NetReader ──────────────────────────────────────────────────────────────

struct NetReader {
    framer: StreamFramer,
    poll_interval: Duration,
    buf: Box<[u8; READ_BUF_SIZE]>,
}

impl NetReader {
    fn new(framer: StreamFramer, poll_interval: Duration) -> Self {
        Self {
            framer,
            poll_interval,
            buf: Box::new([0; READ_BUF_SIZE]),
        }
    }

    /// Wait up to `timeout` for stdin to become readable.
    #[cfg(unix)]
    fn poll_stdin(timeout: Duration) -> io::Result<bool> {
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let mut pfd = libc::pollfd {
            fd: libc::STDIN_FILENO,
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: one valid pollfd on the stack.
        let ready = unsafe { libc::poll(&raw mut pfd, 1, millis) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            return if err.kind() == io::ErrorKind::Interrupted {
                Ok(false)
            } else {
                Err(err)
            };
        }
        Ok(ready > 0)
    }

    #[cfg(unix)]
    fn read_stdin(&mut self) -> io::Result<usize> {
        // SAFETY: reading into an owned buffer of the stated length.
        let n = unsafe { libc::read(libc::STDIN_FILENO, self.buf.as_mut_ptr().cast(), self.buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        #[allow(clippy::cast_sign_loss)] // n >= 0 checked above.
        Ok(n as usize)
    }
}

#[cfg(unix)]
impl InputReader for NetReader {
    fn read_raw_event(&mut self) -> io::Result<ReadOutcome> {
        if take_sigwinch() {
            if let Some(size) = get_size() {
                self.framer.push_frame(RawInputFrame::Resize(size));
            }
        }
        if let Some(frame) = self.framer.next_frame() {
            return Ok(ReadOutcome::Frame(frame));
        }

        let timeout = self.framer.timeout(self.poll_interval);
        if Self::poll_stdin(timeout)? {
            let n = self.read_stdin()?;
            if n == 0 {
                return Ok(ReadOutcome::Closed);
            }
            self.framer.ingest(&self.buf[..n], Instant::now());
        } else {
            self.framer.idle(Instant::now());
        }

        Ok(self
            .framer
            .next_frame()
            .map_or(ReadOutcome::Idle, ReadOutcome::Frame))
    }

    fn is_cancellable(&self) -> bool {
        true
    }
}

/// Without poll() the read blocks, so a chunk that ends on a lone ESC is
/// resolved right away: a terminal writes a whole sequence in one go.
#[cfg(not(unix))]
impl InputReader for NetReader {
    fn read_raw_event(&mut self) -> io::Result<ReadOutcome> {
        use std::io::Read;

        if let Some(frame) = self.framer.next_frame() {
            return Ok(ReadOutcome::Frame(frame));
        }
        let n = io::stdin().lock().read(&mut self.buf[..])?;
        if n == 0 {
            return Ok(ReadOutcome::Closed);
        }
        let now = Instant::now();
        self.framer.ingest(&self.buf[..n], now);
        self.framer.idle(now + self.framer.escape_timeout);
        Ok(self
            .framer
            .next_frame()
            .map_or(ReadOutcome::Idle, ReadOutcome::Frame))
    }

    fn is_cancellable(&self) -> bool {
        false
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
