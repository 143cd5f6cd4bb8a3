// SPDX-License-Identifier: MIT
//
// Headless backend.
//
// Chosen when no console is attached, and used by tests as a scripted
// console: frames pushed through a `NullHandle` come out of the reader,
// and every byte the driver writes is captured for inspection.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use super::{Backend, BackendKind, InputReader, ReadOutcome, ResizeStrategy, Size, SizeProbe};
use crate::ansi;
use crate::cell::Attribute;
use crate::color::Color;
use crate::error::Result;
use crate::event_loop::RawInputFrame;

/// How long the reader waits for scripted input before reporting `Idle`.
const READ_TIMEOUT: Duration = Duration::from_millis(20);

#[derive(Debug, Default)]
struct Script {
    input: VecDeque<RawInputFrame>,
    output: Vec<u8>,
    size: Option<Size>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Inner {
    script: Mutex<Script>,
    input_ready: Condvar,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Test-side handle to a [`NullBackend`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct NullHandle {
    inner: Arc<Inner>,
}

impl NullHandle {
    /// Script one input frame.
    pub fn push(&self, frame: RawInputFrame) {
        self.inner.lock().input.push_back(frame);
        self.inner.input_ready.notify_one();
    }

    /// Change the size the backend reports. Does not emit a frame.
    pub fn set_size(&self, size: Size) {
        self.inner.lock().size = Some(size);
    }

    /// End the input stream: the reader returns `Closed` once drained.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.inner.input_ready.notify_one();
    }

    /// Everything written so far, clearing the capture.
    #[must_use]
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.lock().output)
    }
}

/// A backend with no console behind it.
#[derive(Debug)]
pub struct NullBackend {
    size: Size,
    handle: NullHandle,
    reader_taken: bool,
}

impl NullBackend {
    #[must_use]
    pub fn new(size: Size) -> Self {
        Self {
            size,
            handle: NullHandle::default(),
            reader_taken: false,
        }
    }

    /// A handle for scripting input and reading captured output.
    #[must_use]
    pub fn handle(&self) -> NullHandle {
        self.handle.clone()
    }
}

impl Backend for NullBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }

    fn init(&mut self) -> Result<Size> {
        debug!(size = %self.size, "null backend ready");
        Ok(self.size())
    }

    fn take_reader(&mut self) -> Option<Box<dyn InputReader>> {
        if self.reader_taken {
            return None;
        }
        self.reader_taken = true;
        Some(Box::new(NullReader {
            inner: Arc::clone(&self.handle.inner),
        }))
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.handle.inner.lock().output.extend_from_slice(bytes);
        Ok(())
    }

    fn size(&self) -> Size {
        self.handle.inner.lock().size.unwrap_or(self.size)
    }

    fn make_attribute(&mut self, fg: Color, bg: Color) -> Attribute {
        Attribute::new(fg, bg, 0)
    }

    fn request_cursor_position(&mut self) -> io::Result<Option<(u16, u16)>> {
        let mut request = Vec::new();
        ansi::request_cursor_position(&mut request)?;
        self.write(&request)?;
        Ok(None)
    }

    fn resize_strategy(&self) -> ResizeStrategy {
        ResizeStrategy::Reported
    }

    fn size_probe(&self) -> SizeProbe {
        let inner = Arc::clone(&self.handle.inner);
        let fallback = self.size;
        Arc::new(move || Some(inner.lock().size.unwrap_or(fallback)))
    }

    fn end(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct NullReader {
    inner: Arc<Inner>,
}

impl InputReader for NullReader {
    fn read_raw_event(&mut self) -> io::Result<ReadOutcome> {
        let guard = self.inner.lock();
        let (mut script, _) = self
            .inner
            .input_ready
            .wait_timeout_while(guard, READ_TIMEOUT, |s| s.input.is_empty() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        Ok(match script.input.pop_front() {
            Some(frame) => ReadOutcome::Frame(frame),
            None if script.closed => ReadOutcome::Closed,
            None => ReadOutcome::Idle,
        })
    }

    fn is_cancellable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{Key, KeyCode, KeyEvent};
    use pretty_assertions::assert_eq;

    #[test]
    fn scripted_frames_come_back_in_order() {
        let mut backend = NullBackend::new(Size::new(10, 5));
        let handle = backend.handle();
        let mut reader = backend.take_reader().unwrap();
        assert!(backend.take_reader().is_none());

        let a = RawInputFrame::Key(KeyEvent::down(Key::plain(KeyCode::Char('a'))));
        let resize = RawInputFrame::Resize(Size::new(20, 5));
        handle.push(a.clone());
        handle.push(resize.clone());
        assert_eq!(reader.read_raw_event().unwrap(), ReadOutcome::Frame(a));
        assert_eq!(reader.read_raw_event().unwrap(), ReadOutcome::Frame(resize));
        assert_eq!(reader.read_raw_event().unwrap(), ReadOutcome::Idle);

        handle.close();
        assert_eq!(reader.read_raw_event().unwrap(), ReadOutcome::Closed);
    }

    #[test]
    fn cursor_request_is_written() {
        let mut backend = NullBackend::new(Size::new(10, 5));
        let handle = backend.handle();
        assert_eq!(backend.request_cursor_position().unwrap(), None);
        assert_eq!(handle.take_output(), b"\x1b[6n");
        assert!(handle.take_output().is_empty());
    }

    #[test]
    fn size_override_reaches_probe() {
        let backend = NullBackend::new(Size::new(10, 5));
        let probe = backend.size_probe();
        assert_eq!(probe(), Some(Size::new(10, 5)));
        backend.handle().set_size(Size::new(30, 9));
        assert_eq!(probe(), Some(Size::new(30, 9)));
        assert_eq!(backend.size(), Size::new(30, 9));
    }
}
