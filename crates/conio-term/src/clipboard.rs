// SPDX-License-Identifier: MIT
//
// Clipboard access.
//
// The widget layer only needs to get and set a string. Terminals can set
// the system clipboard through OSC 52 but cannot be asked for it back
// reliably, so the OSC 52 clipboard also remembers the last text it set
// and answers `get` from that.

use std::io::{self, Write};

use tracing::debug;

use crate::ansi;

/// A get/set string clipboard.
pub trait Clipboard: Send {
    /// Current clipboard text.
    ///
    /// # Errors
    ///
    /// Returns an error when the clipboard cannot be read.
    fn get(&mut self) -> io::Result<String>;

    /// Replace the clipboard text.
    ///
    /// # Errors
    ///
    /// Returns an error when the clipboard cannot be written.
    fn set(&mut self, text: &str) -> io::Result<()>;
}

/// Process-local clipboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryClipboard {
    text: String,
}

impl MemoryClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for MemoryClipboard {
    fn get(&mut self) -> io::Result<String> {
        Ok(self.text.clone())
    }

    fn set(&mut self, text: &str) -> io::Result<()> {
        text.clone_into(&mut self.text);
        Ok(())
    }
}

/// Sets the terminal's clipboard with OSC 52.
pub struct Osc52Clipboard<W: Write + Send> {
    out: W,
    last: MemoryClipboard,
}

impl<W: Write + Send> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last: MemoryClipboard::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Clipboard for Osc52Clipboard<W> {
    fn get(&mut self) -> io::Result<String> {
        self.last.get()
    }

    fn set(&mut self, text: &str) -> io::Result<()> {
        ansi::osc52_copy(&mut self.out, text)?;
        self.out.flush()?;
        debug!(len = text.len(), "clipboard set via OSC 52");
        self.last.set(text)
    }
}
