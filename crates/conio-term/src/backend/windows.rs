// SPDX-License-Identifier: MIT
//
// Win32 console backend.
//
// Output goes through the console's VT processing, so frames are the same
// ANSI bytes every other backend writes; a console without VT support is
// refused at init. Input comes from `ReadConsoleInputW`, one record at a
// time, and is folded by the `RecordMapper`. The console does not signal
// window resizes (buffer-size records describe the scrollback buffer), so
// the driver samples the visible window instead.
//
// Attribute codes are console attribute words: foreground nibble in bits
// 0-3, background nibble in bits 4-7.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::{debug, trace};
use ::windows::Win32::Foundation::HANDLE;
use ::windows::Win32::System::Console::{
    CONSOLE_MODE, CONSOLE_SCREEN_BUFFER_INFO, DISABLE_NEWLINE_AUTO_RETURN, ENABLE_EXTENDED_FLAGS,
    ENABLE_MOUSE_INPUT, ENABLE_PROCESSED_OUTPUT, ENABLE_QUICK_EDIT_MODE,
    ENABLE_VIRTUAL_TERMINAL_PROCESSING, ENABLE_WINDOW_INPUT, FOCUS_EVENT, GetConsoleMode,
    GetConsoleScreenBufferInfo, GetStdHandle, INPUT_RECORD, KEY_EVENT, MENU_EVENT, MOUSE_EVENT,
    ReadConsoleInputW, STD_HANDLE, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE, SetConsoleMode,
    SetConsoleOutputCP, WINDOW_BUFFER_SIZE_EVENT,
};

use super::console_record::{
    ControlKeyState, InputRecord, KeyRecord, MouseRecord, RecordMapper, mouse_wanted,
};
use super::{
    Backend, BackendKind, InputReader, ReadOutcome, ResizeStrategy, Size, SizeProbe,
    install_panic_hook,
};
use crate::ansi::{self, MouseMode};
use crate::cell::Attribute;
use crate::color::{Color, console_nibble};
use crate::config::DriverConfig;
use crate::error::{Error, Result};

const CP_UTF8: u32 = 65001;

/// A console handle. Console handles are process-wide and usable from
/// any thread.
#[derive(Debug, Clone, Copy)]
struct Console(HANDLE);

// SAFETY: console handles are not thread-affine; the API serializes access.
#[allow(unsafe_code)]
unsafe impl Send for Console {}
#[allow(unsafe_code)]
unsafe impl Sync for Console {}

#[allow(unsafe_code)]
impl Console {
    fn std(which: STD_HANDLE) -> io::Result<Self> {
        // SAFETY: GetStdHandle has no preconditions.
        let handle = unsafe { GetStdHandle(which) }.map_err(io::Error::other)?;
        if handle.is_invalid() {
            return Err(io::Error::other("no console handle"));
        }
        Ok(Self(handle))
    }

    fn mode(self) -> io::Result<CONSOLE_MODE> {
        let mut mode = CONSOLE_MODE(0);
        // SAFETY: `mode` outlives the call.
        unsafe { GetConsoleMode(self.0, &raw mut mode) }.map_err(io::Error::other)?;
        Ok(mode)
    }

    fn set_mode(self, mode: CONSOLE_MODE) -> io::Result<()> {
        // SAFETY: plain value argument.
        unsafe { SetConsoleMode(self.0, mode) }.map_err(io::Error::other)
    }

    /// Visible window size.
    fn window_size(self) -> Option<Size> {
        let mut info = CONSOLE_SCREEN_BUFFER_INFO::default();
        // SAFETY: `info` outlives the call.
        unsafe { GetConsoleScreenBufferInfo(self.0, &raw mut info) }.ok()?;
        let window = info.srWindow;
        let cols = u16::try_from(window.Right - window.Left + 1).ok()?;
        let rows = u16::try_from(window.Bottom - window.Top + 1).ok()?;
        Some(Size::new(cols, rows)).filter(|s| !s.is_empty())
    }

    /// Cursor position relative to the visible window, 0-based.
    fn cursor(self) -> io::Result<(u16, u16)> {
        let mut info = CONSOLE_SCREEN_BUFFER_INFO::default();
        // SAFETY: `info` outlives the call.
        unsafe { GetConsoleScreenBufferInfo(self.0, &raw mut info) }.map_err(io::Error::other)?;
        let row = info.dwCursorPosition.Y - info.srWindow.Top;
        let col = info.dwCursorPosition.X - info.srWindow.Left;
        Ok((
            u16::try_from(row.max(0)).unwrap_or(0),
            u16::try_from(col.max(0)).unwrap_or(0),
        ))
    }

    /// Block for one input record.
    fn read_record(self) -> io::Result<Option<InputRecord>> {
        let mut records = [INPUT_RECORD::default()];
        let mut read = 0u32;
        // SAFETY: the buffer and counter outlive the call.
        unsafe { ReadConsoleInputW(self.0, &mut records, &raw mut read) }
            .map_err(io::Error::other)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(convert(&records[0]))
    }
}

/// Copy a native record out of its union.
#[allow(unsafe_code)]
fn convert(record: &INPUT_RECORD) -> Option<InputRecord> {
    let kind = u32::from(record.EventType);
    // SAFETY: each arm reads the union member `EventType` names.
    unsafe {
        match kind {
            KEY_EVENT => {
                let k = record.Event.KeyEvent;
                Some(InputRecord::Key(KeyRecord {
                    key_down: k.bKeyDown.as_bool(),
                    repeat_count: k.wRepeatCount,
                    virtual_key: k.wVirtualKeyCode,
                    scan_code: k.wVirtualScanCode,
                    unicode: k.uChar.UnicodeChar,
                    control: ControlKeyState::from_bits_truncate(k.dwControlKeyState),
                }))
            }
            MOUSE_EVENT => {
                let m = record.Event.MouseEvent;
                Some(InputRecord::Mouse(MouseRecord {
                    x: m.dwMousePosition.X,
                    y: m.dwMousePosition.Y,
                    buttons: m.dwButtonState,
                    control: ControlKeyState::from_bits_truncate(m.dwControlKeyState),
                    event_flags: m.dwEventFlags,
                }))
            }
            WINDOW_BUFFER_SIZE_EVENT => {
                let size = record.Event.WindowBufferSizeEvent.dwSize;
                Some(InputRecord::BufferSize(Size::new(
                    u16::try_from(size.X).unwrap_or(0),
                    u16::try_from(size.Y).unwrap_or(0),
                )))
            }
            FOCUS_EVENT => Some(InputRecord::Focus(
                record.Event.FocusEvent.bSetFocus.as_bool(),
            )),
            MENU_EVENT => Some(InputRecord::Menu(record.Event.MenuEvent.dwCommandId)),
            _ => None,
        }
    }
}

// ─── WindowsBackend ─────────────────────────────────────────────────────────

pub struct WindowsBackend {
    alternate_screen: bool,
    mouse: Option<MouseMode>,
    size: Size,
    handles: Option<(Console, Console)>,
    saved_modes: Option<(CONSOLE_MODE, CONSOLE_MODE)>,
    reader_taken: bool,
}

impl WindowsBackend {
    #[must_use]
    pub fn new(config: &DriverConfig) -> Self {
        Self {
            alternate_screen: config.alternate_screen,
            mouse: config.mouse.mode(),
            size: Size::FALLBACK,
            handles: None,
            saved_modes: None,
            reader_taken: false,
        }
    }

    #[allow(unsafe_code)]
    fn enter(&mut self) -> io::Result<()> {
        let input = Console::std(STD_INPUT_HANDLE)?;
        let output = Console::std(STD_OUTPUT_HANDLE)?;
        let saved_in = input.mode()?;
        let saved_out = output.mode()?;

        let mut in_mode = CONSOLE_MODE(
            (ENABLE_WINDOW_INPUT.0 | ENABLE_EXTENDED_FLAGS.0) & !ENABLE_QUICK_EDIT_MODE.0,
        );
        if self.mouse.is_some() {
            in_mode |= ENABLE_MOUSE_INPUT;
        }
        input.set_mode(in_mode)?;

        let out_mode =
            ENABLE_PROCESSED_OUTPUT | ENABLE_VIRTUAL_TERMINAL_PROCESSING | DISABLE_NEWLINE_AUTO_RETURN;
        if let Err(err) = output.set_mode(out_mode) {
            let _ = input.set_mode(saved_in);
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("virtual terminal processing unavailable: {err}"),
            ));
        }

        // SAFETY: plain value argument.
        if let Err(err) = unsafe { SetConsoleOutputCP(CP_UTF8) } {
            debug!(%err, "could not switch output code page to UTF-8");
        }

        self.handles = Some((input, output));
        self.saved_modes = Some((saved_in, saved_out));

        let mut seq = Vec::new();
        if self.alternate_screen {
            ansi::enter_alt_screen(&mut seq)?;
        }
        ansi::cursor_hide(&mut seq)?;
        ansi::clear_screen(&mut seq)?;
        self.write(&seq)
    }

    fn restore_modes(&mut self) -> io::Result<()> {
        if let (Some((input, output)), Some((saved_in, saved_out))) =
            (self.handles, self.saved_modes.take())
        {
            input.set_mode(saved_in)?;
            output.set_mode(saved_out)?;
            debug!("console modes restored");
        }
        Ok(())
    }
}

impl Backend for WindowsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Windows
    }

    fn init(&mut self) -> Result<Size> {
        if self.saved_modes.is_some() {
            return Ok(self.size);
        }
        install_panic_hook();
        if let Err(err) = self.enter() {
            let _ = self.restore_modes();
            return Err(Error::init(BackendKind::Windows, err));
        }
        self.size = self.size();
        debug!(size = %self.size, mouse = ?self.mouse, "windows backend ready");
        Ok(self.size)
    }

    fn take_reader(&mut self) -> Option<Box<dyn InputReader>> {
        let (input, _) = self.handles?;
        if self.reader_taken {
            return None;
        }
        self.reader_taken = true;
        Some(Box::new(WindowsReader {
            input,
            mouse: self.mouse,
            mapper: RecordMapper::new(),
        }))
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()
    }

    fn size(&self) -> Size {
        self.handles
            .and_then(|(_, output)| output.window_size())
            .unwrap_or(self.size)
    }

    fn make_attribute(&mut self, fg: Color, bg: Color) -> Attribute {
        let code = u32::from(console_nibble(fg, 7)) | (u32::from(console_nibble(bg, 0)) << 4);
        Attribute::new(fg, bg, code)
    }

    fn request_cursor_position(&mut self) -> io::Result<Option<(u16, u16)>> {
        let (_, output) = self
            .handles
            .ok_or_else(|| io::Error::other("console not initialized"))?;
        output.cursor().map(Some)
    }

    fn resize_strategy(&self) -> ResizeStrategy {
        ResizeStrategy::Sampled
    }

    fn size_probe(&self) -> SizeProbe {
        let output = self.handles.map(|(_, output)| output);
        Arc::new(move || output.and_then(Console::window_size))
    }

    fn end(&mut self) -> io::Result<()> {
        if self.saved_modes.is_none() {
            return Ok(());
        }
        let mut seq = Vec::new();
        ansi::reset(&mut seq)?;
        ansi::set_cursor_style(&mut seq, ansi::CursorStyle::Default)?;
        ansi::cursor_show(&mut seq)?;
        if self.alternate_screen {
            ansi::exit_alt_screen(&mut seq)?;
        }
        let written = self.write(&seq);
        self.restore_modes()?;
        written
    }
}

impl Drop for WindowsBackend {
    fn drop(&mut self) {
        let _ = self.end();
    }
}

// ─── WindowsReader ──────────────────────────────────────────────────────────

struct WindowsReader {
    input: Console,
    mouse: Option<MouseMode>,
    mapper: RecordMapper,
}

impl InputReader for WindowsReader {
    fn read_raw_event(&mut self) -> io::Result<ReadOutcome> {
        let Some(record) = self.input.read_record()? else {
            return Ok(ReadOutcome::Idle);
        };
        if let InputRecord::Mouse(mouse) = &record {
            match self.mouse {
                Some(mode) if mouse_wanted(mouse, mode) => {}
                _ => return Ok(ReadOutcome::Idle),
            }
        }
        Ok(match self.mapper.map(&record) {
            Some(frame) => ReadOutcome::Frame(frame),
            None => {
                trace!(?record, "no event");
                ReadOutcome::Idle
            }
        })
    }

    fn is_cancellable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::RawInputFrame;
    use pretty_assertions::assert_eq;

    #[test]
    fn attribute_code_packs_nibbles() {
        let mut backend = WindowsBackend::new(&DriverConfig::default());
        assert_eq!(backend.make_attribute(Color::Default, Color::Default).code, 0x07);
        // ANSI red (1) is console red (4); ANSI blue (4) is console blue (1).
        assert_eq!(backend.make_attribute(Color::Indexed(1), Color::Indexed(4)).code, 0x14);
    }

    #[test]
    fn reader_needs_init() {
        let mut backend = WindowsBackend::new(&DriverConfig::default());
        assert!(backend.take_reader().is_none());
        assert!(backend.end().is_ok());
    }

    #[test]
    fn frames_from_converted_records() {
        let mut mapper = RecordMapper::new();
        let record = InputRecord::Key(KeyRecord {
            key_down: true,
            repeat_count: 1,
            virtual_key: 0x26,
            ..KeyRecord::default()
        });
        assert!(matches!(mapper.map(&record), Some(RawInputFrame::Key(_))));
    }
}
