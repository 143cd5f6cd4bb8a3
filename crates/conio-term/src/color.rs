// SPDX-License-Identifier: MIT
//
// Cell colors and palette math.
//
// A cell color is one of three things: the terminal's default, an index
// into the xterm 256-color palette, or a 24-bit RGB triple. The renderer
// emits whichever form the color is stored in; the driver downgrades RGB
// to the nearest palette entry up front when the terminal has no
// true-color support, so the hot render loop never decides.
//
// The Windows console speaks a fourth dialect: a 4-bit color nibble with
// red and blue swapped relative to ANSI. `console_nibble` produces it for
// the attribute word the Windows backend stores as its color code.

use std::fmt;

// ─── Color ───────────────────────────────────────────────────────────────────

/// Compact color stored in every cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Terminal default color (inherits the user's theme).
    #[default]
    Default,
    /// xterm 256-color palette index. 0–15 are the ANSI colors.
    Indexed(u8),
    /// 24-bit true color.
    Rgb(u8, u8, u8),
}

impl Color {
    pub const BLACK: Self = Self::Indexed(0);
    pub const RED: Self = Self::Indexed(1);
    pub const GREEN: Self = Self::Indexed(2);
    pub const YELLOW: Self = Self::Indexed(3);
    pub const BLUE: Self = Self::Indexed(4);
    pub const MAGENTA: Self = Self::Indexed(5);
    pub const CYAN: Self = Self::Indexed(6);
    pub const GRAY: Self = Self::Indexed(7);
    pub const DARK_GRAY: Self = Self::Indexed(8);
    pub const BRIGHT_RED: Self = Self::Indexed(9);
    pub const BRIGHT_GREEN: Self = Self::Indexed(10);
    pub const BRIGHT_YELLOW: Self = Self::Indexed(11);
    pub const BRIGHT_BLUE: Self = Self::Indexed(12);
    pub const BRIGHT_MAGENTA: Self = Self::Indexed(13);
    pub const BRIGHT_CYAN: Self = Self::Indexed(14);
    pub const WHITE: Self = Self::Indexed(15);

    /// Whether this is the terminal default color.
    #[inline]
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }

    /// RGB value of this color, `None` for [`Color::Default`].
    #[must_use]
    pub fn to_rgb(self) -> Option<(u8, u8, u8)> {
        match self {
            Self::Default => None,
            Self::Indexed(idx) => Some(palette::ansi256_to_rgb(idx)),
            Self::Rgb(r, g, b) => Some((r, g, b)),
        }
    }

    /// Downgrade an RGB color to the nearest 256-palette entry.
    #[must_use]
    pub fn to_indexed(self) -> Self {
        match self {
            Self::Rgb(r, g, b) => Self::Indexed(palette::nearest_ansi256((r, g, b))),
            other => other,
        }
    }

    /// Nearest ANSI-16 index (0–15), `None` for [`Color::Default`].
    #[must_use]
    pub fn to_ansi16(self) -> Option<u8> {
        match self {
            Self::Default => None,
            Self::Indexed(idx) if idx < 16 => Some(idx),
            other => other.to_rgb().map(palette::nearest_ansi16),
        }
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgb(r, g, b) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
            Self::Indexed(idx) => write!(f, "ansi({idx})"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ─── Windows console nibble ──────────────────────────────────────────────────

/// Convert a color to a Windows console 4-bit color value.
///
/// Console bit order is `intensity | red | green | blue`, ANSI order is
/// `bright | blue | green | red`, so bits 0 and 2 swap. `fallback` is
/// used for [`Color::Default`].
#[must_use]
pub fn console_nibble(color: Color, fallback: u8) -> u8 {
    color.to_ansi16().map_or(fallback, |idx| {
        let red = idx & 0b001;
        let blue = (idx & 0b100) >> 2;
        (idx & 0b1010) | (red << 2) | blue
    })
}

// ─── Palette ─────────────────────────────────────────────────────────────────

pub mod palette {
    //! The xterm 256-color palette:
    //!
    //! - Colors 0–15: the ANSI colors
    //! - Colors 16–231: a 6×6×6 RGB color cube
    //! - Colors 232–255: a 24-step grayscale ramp

    /// The standard ANSI-16 palette as RGB values (xterm defaults).
    pub const ANSI16_RGB: [(u8, u8, u8); 16] = [
        (0, 0, 0),       // 0: Black
        (128, 0, 0),     // 1: Red
        (0, 128, 0),     // 2: Green
        (128, 128, 0),   // 3: Yellow
        (0, 0, 128),     // 4: Blue
        (128, 0, 128),   // 5: Magenta
        (0, 128, 128),   // 6: Cyan
        (192, 192, 192), // 7: White
        (128, 128, 128), // 8: Bright Black
        (255, 0, 0),     // 9: Bright Red
        (0, 255, 0),     // 10: Bright Green
        (255, 255, 0),   // 11: Bright Yellow
        (0, 0, 255),     // 12: Bright Blue
        (255, 0, 255),   // 13: Bright Magenta
        (0, 255, 255),   // 14: Bright Cyan
        (255, 255, 255), // 15: Bright White
    ];

    /// Convert an ANSI-256 palette index to RGB values.
    #[must_use]
    pub fn ansi256_to_rgb(idx: u8) -> (u8, u8, u8) {
        match idx {
            0..=15 => ANSI16_RGB[idx as usize],
            16..=231 => {
                let idx = idx - 16;
                let to_value = |i: u8| -> u8 { if i == 0 { 0 } else { 55 + 40 * i } };
                (to_value(idx / 36), to_value((idx % 36) / 6), to_value(idx % 6))
            }
            232..=255 => {
                let v = 8 + 10 * (idx - 232);
                (v, v, v)
            }
        }
    }

    /// Weighted squared RGB distance ("redmean" approximation).
    fn distance((r1, g1, b1): (u8, u8, u8), (r2, g2, b2): (u8, u8, u8)) -> u32 {
        let rmean = (u32::from(r1) + u32::from(r2)) / 2;
        let dr = u32::from(r1.abs_diff(r2));
        let dg = u32::from(g1.abs_diff(g2));
        let db = u32::from(b1.abs_diff(b2));
        (((512 + rmean) * dr * dr) >> 8) + 4 * dg * dg + (((767 - rmean) * db * db) >> 8)
    }

    fn nearest(rgb: (u8, u8, u8), range: std::ops::RangeInclusive<u8>) -> u8 {
        range
            .min_by_key(|&idx| distance(rgb, ansi256_to_rgb(idx)))
            .unwrap_or(0)
    }

    /// Nearest ANSI-256 palette index.
    #[must_use]
    pub fn nearest_ansi256(rgb: (u8, u8, u8)) -> u8 {
        nearest(rgb, 0..=255)
    }

    /// Nearest ANSI-16 palette index.
    #[must_use]
    pub fn nearest_ansi16(rgb: (u8, u8, u8)) -> u8 {
        nearest(rgb, 0..=15)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
