// SPDX-License-Identifier: MIT
//
// Cell and attribute: the atoms of the screen grid.
//
// Every character position holds a rune, an attribute and a dirty flag.
// The attribute is a pair of colors plus the backend's own code for that
// pair (console attribute word on Windows, color-pair index for the
// library-managed backend, 0 for plain ANSI). Only the active backend
// produces attributes, through `Backend::make_attribute`, so the code is
// always meaningful for the backend that will render it.
//
// Wide characters occupy two columns. The first cell holds the rune; the
// second is a padding cell (rune `'\0'`) that the renderer skips.

use std::fmt;

use crate::color::Color;

// ─── Attribute ──────────────────────────────────────────────────────────────

/// Foreground/background pair plus the backend-specific code for it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Attribute {
    pub fg: Color,
    pub bg: Color,
    /// Backend color code. Opaque outside the backend that made it.
    pub code: u32,
}

impl Attribute {
    /// Default colors, code 0.
    pub const DEFAULT: Self = Self {
        fg: Color::Default,
        bg: Color::Default,
        code: 0,
    };

    #[inline]
    #[must_use]
    pub const fn new(fg: Color, bg: Color, code: u32) -> Self {
        Self { fg, bg, code }
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}#{}", self.fg, self.bg, self.code)
    }
}

// ─── Cell ───────────────────────────────────────────────────────────────────

/// Rune of a padding cell (second column of a wide character).
pub const PADDING: char = '\0';

/// One character position.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub rune: char,
    pub attr: Attribute,
    /// Queued for the next render pass.
    pub dirty: bool,
}

impl Cell {
    /// A space with default colors, queued for drawing.
    pub const BLANK: Self = Self {
        rune: ' ',
        attr: Attribute::DEFAULT,
        dirty: true,
    };

    #[inline]
    #[must_use]
    pub const fn new(rune: char, attr: Attribute) -> Self {
        Self {
            rune,
            attr,
            dirty: true,
        }
    }

    /// Whether this cell is the second column of a wide character.
    #[inline]
    #[must_use]
    pub const fn is_padding(self) -> bool {
        self.rune == PADDING
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::BLANK
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.dirty { "*" } else { "" };
        if self.is_padding() {
            write!(f, "Cell(pad {:?}){mark}", self.attr)
        } else {
            write!(f, "Cell({:?} {:?}){mark}", self.rune, self.attr)
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
