// SPDX-License-Identifier: MIT
//
// ConsoleDriver: the one surface the widget layer talks to.
//
// The driver composes a backend, the screen buffer, the event loop and the
// background threads that feed it. Painting goes into the screen buffer
// at a drawing position with a current attribute; `refresh` sends the
// dirty cells to the backend. Input arrives as frames on the loop's queue
// and is dispatched to an `App`:
//
//   reader thread ──┐
//                   ├─► InputQueue ─► iteration() ─► App::on_* ─► App::paint ─► refresh
//   resize sampler ─┘                     │
//                                         └─► timers, idle handlers
//
// Mouse events also pass through a click synthesizer, so the App sees
// `*_CLICKED` events right after the release that completed them.
//
// Shutdown is `end()`, idempotent and also run on drop: stop the threads,
// then let the backend restore the console.

use std::io;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::ansi::{self, CursorStyle};
use crate::backend::{self, Backend, BackendKind, BackendWriter, ResizeStrategy, Size};
use crate::capabilities::Capabilities;
use crate::cell::Attribute;
use crate::clipboard::{Clipboard, MemoryClipboard, Osc52Clipboard};
use crate::color::Color;
use crate::config::DriverConfig;
use crate::error::Result;
use crate::event_loop::{
    EventLoop, IdleToken, RawInputFrame, TerminalResponse, TimerToken, Waker,
};
use crate::key::KeyEvent;
use crate::mouse::{ClickSynthesizer, MouseEvent};
use crate::reader::ReaderThread;
use crate::resize::ResizeSampler;
use crate::screen::ScreenBuffer;

// ─── App ────────────────────────────────────────────────────────────────────

/// What the application tells the driver after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
}

/// Application interface for [`ConsoleDriver::iteration`].
///
/// Only [`paint`](App::paint) is required.
pub trait App {
    /// A key went down (or up, on consoles that report releases).
    fn on_key(&mut self, _event: KeyEvent) -> Action {
        Action::Continue
    }

    /// A mouse event, including synthesized clicks.
    fn on_mouse(&mut self, _event: MouseEvent) -> Action {
        Action::Continue
    }

    /// The console changed size. The screen buffer is already
    /// reallocated (and blank) when this runs.
    fn on_resize(&mut self, _size: Size) {}

    /// The terminal answered a query.
    fn on_response(&mut self, _response: &TerminalResponse) {}

    /// Draw into the driver. Called after events arrived and on the first
    /// iteration; `refresh` follows automatically.
    fn paint(&mut self, driver: &mut ConsoleDriver);
}

// ─── ConsoleDriver ──────────────────────────────────────────────────────────

/// The console façade.
pub struct ConsoleDriver {
    backend: Box<dyn Backend>,
    caps: Capabilities,
    screen: ScreenBuffer,
    event_loop: EventLoop,
    reader: Option<ReaderThread>,
    sampler: Option<ResizeSampler>,
    clicks: ClickSynthesizer,
    clipboard: Box<dyn Clipboard>,
    /// Drawing position for `add_rune`.
    pos: (u16, u16),
    attr: Attribute,
    cursor: Option<(u16, u16)>,
    needs_paint: bool,
    ended: bool,
}

impl ConsoleDriver {
    /// Detect capabilities, open the backend `config` selects and start
    /// the session.
    ///
    /// # Errors
    ///
    /// `Error::NoConsole`, `Error::Unsupported`, or `Error::Init` when the
    /// backend cannot take over the console.
    pub fn open(config: &DriverConfig) -> Result<Self> {
        let caps = Self::capabilities_for(config);
        let backend = backend::open(config, &caps)?;
        Self::with_capabilities(backend, config, caps)
    }

    /// Start a session on an already-constructed backend.
    ///
    /// # Errors
    ///
    /// `Error::Init` when the backend cannot take over the console, or
    /// `Error::Io` when a background thread cannot be spawned.
    pub fn with_backend(backend: Box<dyn Backend>, config: &DriverConfig) -> Result<Self> {
        Self::with_capabilities(backend, config, Self::capabilities_for(config))
    }

    /// Start a session with explicit capabilities.
    ///
    /// # Errors
    ///
    /// As [`with_backend`](Self::with_backend).
    pub fn with_capabilities(
        mut backend: Box<dyn Backend>,
        config: &DriverConfig,
        caps: Capabilities,
    ) -> Result<Self> {
        let size = backend.init()?;
        let size = if size.is_empty() { Size::FALLBACK } else { size };

        let clipboard: Box<dyn Clipboard> = if backend.kind() == BackendKind::Null {
            Box::new(MemoryClipboard::new())
        } else {
            Box::new(Osc52Clipboard::new(io::stdout()))
        };

        let mut driver = Self {
            screen: ScreenBuffer::new(size, caps, config.placeholder),
            event_loop: EventLoop::new(config.poll_interval()),
            backend,
            caps,
            reader: None,
            sampler: None,
            clicks: ClickSynthesizer::new(),
            clipboard,
            pos: (0, 0),
            attr: Attribute::DEFAULT,
            cursor: None,
            needs_paint: true,
            ended: false,
        };
        // On failure the driver drops here, which restores the console.
        driver.start_threads(config)?;

        debug!(
            backend = %driver.backend.kind(),
            %size,
            true_color = caps.true_color,
            non_bmp = caps.non_bmp,
            "console driver started"
        );
        Ok(driver)
    }

    fn capabilities_for(config: &DriverConfig) -> Capabilities {
        let mut caps = Capabilities::detect();
        if let Some(true_color) = config.true_color {
            caps.true_color = true_color;
        }
        caps
    }

    fn start_threads(&mut self, config: &DriverConfig) -> io::Result<()> {
        if let Some(reader) = self.backend.take_reader() {
            self.reader = Some(ReaderThread::spawn(reader, self.event_loop.queue())?);
        }
        let sampled = config
            .sample_resize
            .unwrap_or(self.backend.resize_strategy() == ResizeStrategy::Sampled);
        if sampled {
            self.sampler = Some(ResizeSampler::spawn(
                self.backend.size_probe(),
                self.screen.size(),
                config.resize_sample_interval(),
                self.event_loop.queue(),
            )?);
        }
        Ok(())
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.screen.cols()
    }

    #[must_use]
    pub const fn rows(&self) -> u16 {
        self.screen.rows()
    }

    #[must_use]
    pub const fn size(&self) -> Size {
        self.screen.size()
    }

    /// The screen as painted so far (not necessarily refreshed).
    #[must_use]
    pub const fn screen(&self) -> &ScreenBuffer {
        &self.screen
    }

    // ─── Drawing ─────────────────────────────────────────────────────────

    /// Set the drawing position for the next `add_rune`.
    pub const fn move_to(&mut self, row: u16, col: u16) {
        self.pos = (row, col);
    }

    #[must_use]
    pub const fn position(&self) -> (u16, u16) {
        self.pos
    }

    /// Draw `rune` at the drawing position in the current attribute and
    /// advance past it. Drawing outside the screen is clipped.
    pub fn add_rune(&mut self, rune: char) {
        let (row, col) = self.pos;
        let width = self.screen.set_cell(row, col, rune, self.attr);
        self.pos.1 = col.saturating_add(width.max(1));
    }

    pub fn add_str(&mut self, text: &str) {
        for rune in text.chars() {
            self.add_rune(rune);
        }
    }

    /// The attribute subsequent drawing uses.
    pub const fn set_attribute(&mut self, attr: Attribute) {
        self.attr = attr;
    }

    #[must_use]
    pub const fn attribute(&self) -> Attribute {
        self.attr
    }

    /// Build an attribute through the backend. RGB colors are reduced to
    /// the 256-color palette when the terminal lacks true color.
    pub fn make_attribute(&mut self, fg: Color, bg: Color) -> Attribute {
        let (fg, bg) = if self.caps.true_color {
            (fg, bg)
        } else {
            (fg.to_indexed(), bg.to_indexed())
        };
        self.backend.make_attribute(fg, bg)
    }

    /// Fill the whole screen with `rune` in the current attribute.
    pub fn fill(&mut self, rune: char) {
        self.screen.fill(rune, self.attr);
    }

    /// Where to show the cursor after the next refresh; `None` hides it.
    pub const fn set_cursor(&mut self, cursor: Option<(u16, u16)>) {
        self.cursor = cursor;
    }

    pub fn set_cursor_style(&mut self, style: CursorStyle) {
        let mut seq = Vec::new();
        let written = ansi::set_cursor_style(&mut seq, style).and_then(|()| self.backend.write(&seq));
        if let Err(err) = written {
            warn!(%err, "cursor style not applied");
        }
    }

    /// Force every cell to be redrawn on the next refresh.
    pub fn invalidate(&mut self) {
        self.screen.invalidate();
    }

    /// Send everything painted since the last refresh to the console.
    ///
    /// A failed write is logged, and the next refresh redraws the whole
    /// screen.
    pub fn refresh(&mut self) {
        let mut out = BackendWriter(self.backend.as_mut());
        if let Err(err) = self.screen.render(&mut out, self.cursor) {
            warn!(%err, "frame write failed, full redraw queued");
        }
    }

    /// Ask for the cursor position. `Some` when the backend answers at
    /// once; otherwise the answer arrives as
    /// [`TerminalResponse::CursorPosition`] through `App::on_response`.
    ///
    /// # Errors
    ///
    /// Returns the write or console error of the request.
    pub fn query_cursor_position(&mut self) -> io::Result<Option<(u16, u16)>> {
        self.backend.request_cursor_position()
    }

    // ─── Clipboard ───────────────────────────────────────────────────────

    pub fn clipboard(&mut self) -> &mut dyn Clipboard {
        self.clipboard.as_mut()
    }

    pub fn set_clipboard(&mut self, clipboard: Box<dyn Clipboard>) {
        self.clipboard = clipboard;
    }

    // ─── Loop ────────────────────────────────────────────────────────────

    /// See [`EventLoop::events_pending`].
    pub fn events_pending(&mut self, timeout: Option<Duration>) -> bool {
        self.event_loop.events_pending(timeout)
    }

    #[must_use]
    pub fn waker(&self) -> Waker {
        self.event_loop.waker()
    }

    pub fn add_timeout(
        &mut self,
        period: Duration,
        callback: impl FnMut() -> bool + 'static,
    ) -> TimerToken {
        self.event_loop.add_timeout(period, callback)
    }

    pub fn remove_timeout(&mut self, token: TimerToken) -> bool {
        self.event_loop.remove_timeout(token)
    }

    pub fn add_idle(&mut self, callback: impl FnMut() -> bool + 'static) -> IdleToken {
        self.event_loop.add_idle(callback)
    }

    pub fn remove_idle(&mut self, token: IdleToken) -> bool {
        self.event_loop.remove_idle(token)
    }

    /// Dispatch queued input to `app`, run timers and idle handlers, then
    /// paint and refresh if anything arrived.
    ///
    /// Returns `Quit` when the app asks for it or the input stream has
    /// closed.
    pub fn iteration(&mut self, app: &mut impl App) -> Action {
        // Sampled before draining: every frame a finished reader pushed is
        // already queued.
        let closed = self.reader.as_ref().is_some_and(ReaderThread::is_finished);

        let mut frames = Vec::new();
        let count = self.event_loop.iteration(&mut |frame| frames.push(frame));
        for frame in frames {
            if self.dispatch(app, frame) == Action::Quit {
                return Action::Quit;
            }
        }

        if count > 0 || self.needs_paint {
            self.needs_paint = false;
            app.paint(self);
        }
        self.refresh();

        if closed && count == 0 {
            debug!("input closed, leaving loop");
            return Action::Quit;
        }
        Action::Continue
    }

    fn dispatch(&mut self, app: &mut impl App, frame: RawInputFrame) -> Action {
        match frame {
            RawInputFrame::Key(event) => app.on_key(event),
            RawInputFrame::Mouse(event) => {
                if app.on_mouse(event) == Action::Quit {
                    return Action::Quit;
                }
                match self.clicks.process(&event, Instant::now()) {
                    Some(click) => app.on_mouse(click),
                    None => Action::Continue,
                }
            }
            RawInputFrame::Resize(size) => {
                if !size.is_empty() && size != self.screen.size() {
                    debug!(%size, "resize");
                    self.screen.resize(size);
                    let (row, col) = self.pos;
                    self.pos = (row.min(size.rows), col.min(size.cols));
                    app.on_resize(size);
                }
                Action::Continue
            }
            RawInputFrame::Response(response) => {
                app.on_response(&response);
                Action::Continue
            }
        }
    }

    /// Run [`iteration`](Self::iteration) until it returns `Quit`, waiting
    /// for input in between.
    pub fn run(&mut self, app: &mut impl App) {
        while self.iteration(app) == Action::Continue {
            self.events_pending(None);
        }
    }

    /// Stop the background threads and restore the console. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the backend's failure while restoring modes.
    pub fn end(&mut self) -> io::Result<()> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;
        if let Some(mut reader) = self.reader.take() {
            reader.stop();
        }
        if let Some(mut sampler) = self.sampler.take() {
            sampler.stop();
        }
        // A loop thread still parked in `events_pending` must not wait out
        // a detached reader.
        self.event_loop.waker().wake();
        self.screen.clear();
        debug!(backend = %self.backend.kind(), "console driver ending");
        self.backend.end()
    }
}

impl Drop for ConsoleDriver {
    fn drop(&mut self) {
        if let Err(err) = self.end() {
            warn!(%err, "console restore failed");
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
