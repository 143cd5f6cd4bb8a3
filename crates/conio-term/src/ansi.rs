// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about when to emit: that's the screen renderer's job. This
// module just knows the byte-level encoding of every terminal command the
// console core sends, plus the encoders for the input sequences a terminal
// sends back (keys and SGR mouse reports) so the decoder can be tested
// against the exact bytes a real terminal produces.
//
// All positions are 0-indexed (row, col) in our API and converted to
// 1-indexed for the terminal.

use std::io::{self, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::color::Color;
use crate::key::{Key, KeyCode, Modifiers};
use crate::keymap::{self, CSI_FINAL, CSI_TILDE};
use crate::mouse::{self, MouseEvent};

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(row, col)` using CUP.
#[inline]
pub fn cursor_to(w: &mut impl Write, row: u16, col: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(row) + 1, u32::from(col) + 1)
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

/// Save cursor position and attributes (DECSC).
#[inline]
pub fn cursor_save(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b7")
}

/// Restore what [`cursor_save`] saved (DECRC).
#[inline]
pub fn cursor_restore(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b8")
}

/// Ask for the cursor position (DSR 6). The answer is `ESC [ row ; col R`.
#[inline]
pub fn request_cursor_position(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[6n")
}

/// Ask for primary device attributes (DA1).
#[inline]
pub fn request_device_attributes(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[c")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Reset all SGR attributes to terminal defaults (SGR 0).
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

/// Enter the alternate screen buffer (DEC Private Mode 1049).
#[inline]
pub fn enter_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049h")
}

/// Exit the alternate screen buffer and restore original content.
#[inline]
pub fn exit_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049l")
}

// ─── Colors ──────────────────────────────────────────────────────────────────

/// SGR parameters for a foreground color, without the `ESC [` / `m`.
///
/// Compact codes for the 16 ANSI colors (30–37, 90–97), the 256-color
/// form for palette indices 16–255, and 24-bit `TrueColor` for RGB.
fn fg_params(w: &mut impl Write, color: Color) -> io::Result<()> {
    match color {
        Color::Default => w.write_all(b"39"),
        Color::Indexed(idx @ 0..=7) => write!(w, "{}", 30 + u16::from(idx)),
        Color::Indexed(idx @ 8..=15) => write!(w, "{}", 82 + u16::from(idx)),
        Color::Indexed(idx) => write!(w, "38;5;{idx}"),
        Color::Rgb(r, g, b) => write!(w, "38;2;{r};{g};{b}"),
    }
}

/// Background counterpart of [`fg_params`] (40–47, 100–107, 48;…).
fn bg_params(w: &mut impl Write, color: Color) -> io::Result<()> {
    match color {
        Color::Default => w.write_all(b"49"),
        Color::Indexed(idx @ 0..=7) => write!(w, "{}", 40 + u16::from(idx)),
        Color::Indexed(idx @ 8..=15) => write!(w, "{}", 92 + u16::from(idx)),
        Color::Indexed(idx) => write!(w, "48;5;{idx}"),
        Color::Rgb(r, g, b) => write!(w, "48;2;{r};{g};{b}"),
    }
}

/// Set the foreground color.
pub fn fg(w: &mut impl Write, color: Color) -> io::Result<()> {
    w.write_all(b"\x1b[")?;
    fg_params(w, color)?;
    w.write_all(b"m")
}

/// Set the background color.
pub fn bg(w: &mut impl Write, color: Color) -> io::Result<()> {
    w.write_all(b"\x1b[")?;
    bg_params(w, color)?;
    w.write_all(b"m")
}

/// Set both colors in one SGR sequence.
pub fn colors(w: &mut impl Write, fg: Color, bg: Color) -> io::Result<()> {
    w.write_all(b"\x1b[")?;
    fg_params(w, fg)?;
    w.write_all(b";")?;
    bg_params(w, bg)?;
    w.write_all(b"m")
}

// ─── Mouse Protocol ─────────────────────────────────────────────────────────

/// Mouse tracking granularity for SGR mouse protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseMode {
    /// Report button press and release events (DEC 1000).
    Click,
    /// Report button events and drag motion (DEC 1000 + 1002).
    Drag,
    /// Report all mouse motion, even without buttons held (DEC 1000 + 1002 + 1003).
    Motion,
}

/// Enable SGR mouse tracking at the specified granularity.
///
/// Uses SGR format (DEC 1006) which supports coordinates beyond column 223
/// and distinguishes button press from release.
pub fn enable_mouse(w: &mut impl Write, mode: MouseMode) -> io::Result<()> {
    w.write_all(b"\x1b[?1000h")?;
    if matches!(mode, MouseMode::Drag | MouseMode::Motion) {
        w.write_all(b"\x1b[?1002h")?;
    }
    if mode == MouseMode::Motion {
        w.write_all(b"\x1b[?1003h")?;
    }
    w.write_all(b"\x1b[?1006h")
}

/// Disable all mouse tracking.
pub fn disable_mouse(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1006l")?;
    w.write_all(b"\x1b[?1003l")?;
    w.write_all(b"\x1b[?1002l")?;
    w.write_all(b"\x1b[?1000l")
}

// ─── Cursor Style ───────────────────────────────────────────────────────────

/// Terminal cursor style (DECSCUSR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorStyle {
    /// Terminal default (usually blinking block).
    #[default]
    Default,
    BlinkBlock,
    SteadyBlock,
    BlinkUnderline,
    SteadyUnderline,
    BlinkBar,
    SteadyBar,
}

/// Set the cursor style using DECSCUSR.
#[inline]
pub fn set_cursor_style(w: &mut impl Write, style: CursorStyle) -> io::Result<()> {
    let n: u8 = match style {
        CursorStyle::Default => 0,
        CursorStyle::BlinkBlock => 1,
        CursorStyle::SteadyBlock => 2,
        CursorStyle::BlinkUnderline => 3,
        CursorStyle::SteadyUnderline => 4,
        CursorStyle::BlinkBar => 5,
        CursorStyle::SteadyBar => 6,
    };
    write!(w, "\x1b[{n} q")
}

// ─── Clipboard ──────────────────────────────────────────────────────────────

/// Put `text` on the system clipboard through the terminal (OSC 52).
pub fn osc52_copy(w: &mut impl Write, text: &str) -> io::Result<()> {
    write!(w, "\x1b]52;c;{}\x07", BASE64.encode(text))
}

// ─── Input encoders ─────────────────────────────────────────────────────────

/// The bytes an xterm-compatible terminal sends for `key`.
///
/// `None` for keys the legacy encoding cannot express (Ctrl+Shift+letter,
/// modified Enter, F21 and up, Print Screen, Pause).
#[must_use]
pub fn encode_key(key: Key) -> Option<Vec<u8>> {
    let mods = key.modifiers();
    let code = key.code();
    let param = keymap::encode_modifier_param(mods);

    if let KeyCode::Char(_) | KeyCode::Enter | KeyCode::Backspace | KeyCode::Escape = code {
        if mods.contains(Modifiers::ALT) {
            let mut out = vec![0x1B];
            out.extend(encode_key(key.without_modifiers().with(mods - Modifiers::ALT))?);
            return Some(out);
        }
    }

    match code {
        KeyCode::Char(ch) => encode_char(ch, mods),
        KeyCode::Enter if mods.is_empty() => Some(b"\r".to_vec()),
        KeyCode::Backspace if mods.is_empty() => Some(vec![0x7F]),
        KeyCode::Escape if mods.is_empty() => Some(vec![0x1B]),
        KeyCode::Tab if mods.is_empty() => Some(b"\t".to_vec()),
        KeyCode::Tab if mods == Modifiers::SHIFT => Some(b"\x1b[Z".to_vec()),
        _ => {
            if let Some(final_byte) = CSI_FINAL.reverse(code, Modifiers::empty()) {
                return Some(if param == 1 {
                    vec![0x1B, b'[', final_byte]
                } else {
                    format!("\x1b[1;{param}{}", char::from(final_byte)).into_bytes()
                });
            }
            let n = CSI_TILDE.reverse(code, Modifiers::empty())?;
            Some(if param == 1 {
                format!("\x1b[{n}~").into_bytes()
            } else {
                format!("\x1b[{n};{param}~").into_bytes()
            })
        }
    }
}

fn encode_char(ch: char, mods: Modifiers) -> Option<Vec<u8>> {
    if mods.contains(Modifiers::CTRL) {
        if mods.contains(Modifiers::SHIFT) {
            return None;
        }
        let byte = match ch {
            ' ' => 0,
            'a'..='z' => ch as u8 - b'a' + 1,
            '4'..='7' => ch as u8 - b'4' + 28,
            _ => return None,
        };
        // Ctrl+I and Ctrl+M are Tab and Enter on the wire.
        return (byte != 9 && byte != 13 && byte != 8).then(|| vec![byte]);
    }
    let ch = if mods.contains(Modifiers::SHIFT) {
        let mut upper = ch.to_uppercase();
        match (upper.next(), upper.next()) {
            (Some(u), None) if u != ch => u,
            _ => return None,
        }
    } else {
        ch
    };
    let mut buf = [0; 4];
    Some(ch.encode_utf8(&mut buf).as_bytes().to_vec())
}

/// Write the SGR report a terminal sends for `event`.
pub fn sgr_mouse(w: &mut impl Write, event: &MouseEvent) -> io::Result<()> {
    let Some((cb, cx, cy, release)) = mouse::to_sgr(event) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "mouse event has no SGR encoding",
        ));
    };
    let terminator = if release { 'm' } else { 'M' };
    write!(w, "\x1b[<{cb};{cx};{cy}{terminator}")
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Decoded, Decoder};
    use crate::mouse::MouseFlags;
    use pretty_assertions::assert_eq;

    /// Helper: run an ANSI function and return its output as a string.
    fn emit<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn cursor_to_is_one_based() {
        assert_eq!(emit(|w| cursor_to(w, 0, 0)), "\x1b[1;1H");
        assert_eq!(emit(|w| cursor_to(w, 4, 9)), "\x1b[5;10H");
        assert_eq!(emit(|w| cursor_to(w, u16::MAX, u16::MAX)), "\x1b[65536;65536H");
    }

    #[test]
    fn cursor_save_restore_and_queries() {
        assert_eq!(emit(|w| cursor_save(w)), "\x1b7");
        assert_eq!(emit(|w| cursor_restore(w)), "\x1b8");
        assert_eq!(emit(|w| request_cursor_position(w)), "\x1b[6n");
        assert_eq!(emit(|w| request_device_attributes(w)), "\x1b[c");
    }

    #[test]
    fn color_encodings() {
        assert_eq!(emit(|w| fg(w, Color::Default)), "\x1b[39m");
        assert_eq!(emit(|w| fg(w, Color::RED)), "\x1b[31m");
        assert_eq!(emit(|w| fg(w, Color::BRIGHT_RED)), "\x1b[91m");
        assert_eq!(emit(|w| fg(w, Color::Indexed(200))), "\x1b[38;5;200m");
        assert_eq!(emit(|w| bg(w, Color::Rgb(1, 2, 3))), "\x1b[48;2;1;2;3m");
        assert_eq!(emit(|w| bg(w, Color::WHITE)), "\x1b[107m");
    }

    #[test]
    fn combined_colors_single_sequence() {
        assert_eq!(
            emit(|w| colors(w, Color::GREEN, Color::Default)),
            "\x1b[32;49m"
        );
    }

    #[test]
    fn mouse_modes() {
        assert_eq!(
            emit(|w| enable_mouse(w, MouseMode::Click)),
            "\x1b[?1000h\x1b[?1006h"
        );
        assert_eq!(
            emit(|w| enable_mouse(w, MouseMode::Motion)),
            "\x1b[?1000h\x1b[?1002h\x1b[?1003h\x1b[?1006h"
        );
        assert_eq!(
            emit(|w| disable_mouse(w)),
            "\x1b[?1006l\x1b[?1003l\x1b[?1002l\x1b[?1000l"
        );
    }

    #[test]
    fn cursor_styles() {
        assert_eq!(emit(|w| set_cursor_style(w, CursorStyle::Default)), "\x1b[0 q");
        assert_eq!(emit(|w| set_cursor_style(w, CursorStyle::SteadyBar)), "\x1b[6 q");
    }

    #[test]
    fn osc52_payload_is_base64() {
        assert_eq!(emit(|w| osc52_copy(w, "hi")), "\x1b]52;c;aGk=\x07");
    }

    #[test]
    fn sgr_mouse_report() {
        let ev = MouseEvent::new(
            10,
            3,
            MouseFlags::BUTTON1_PRESSED | MouseFlags::REPORT_MOUSE_POSITION,
        );
        assert_eq!(emit(|w| sgr_mouse(w, &ev)), "\x1b[<0;11;4M");
    }

    #[test]
    fn encode_known_keys() {
        let enc = |k| encode_key(k).unwrap();
        assert_eq!(enc(Key::plain(KeyCode::Up)), b"\x1b[A");
        assert_eq!(enc(Key::new(KeyCode::Up, Modifiers::CTRL)), b"\x1b[1;5A");
        assert_eq!(enc(Key::plain(KeyCode::F(5))), b"\x1b[15~");
        assert_eq!(enc(Key::new(KeyCode::Delete, Modifiers::SHIFT)), b"\x1b[3;2~");
        assert_eq!(enc(Key::new(KeyCode::Char('a'), Modifiers::CTRL)), b"\x01");
        assert_eq!(enc(Key::new(KeyCode::Char('x'), Modifiers::ALT)), b"\x1bx");
        assert_eq!(enc(Key::new(KeyCode::Char('q'), Modifiers::SHIFT)), b"Q");
    }

    #[test]
    fn unencodable_keys() {
        assert_eq!(
            encode_key(Key::new(KeyCode::Char('a'), Modifiers::CTRL | Modifiers::SHIFT)),
            None
        );
        assert_eq!(encode_key(Key::plain(KeyCode::F(21))), None);
        assert_eq!(encode_key(Key::plain(KeyCode::Pause)), None);
    }

    #[test]
    fn encoded_keys_decode_back() {
        let keys = [
            Key::plain(KeyCode::Home),
            Key::new(KeyCode::End, Modifiers::ALT),
            Key::plain(KeyCode::PageDown),
            Key::new(KeyCode::F(12), Modifiers::CTRL | Modifiers::SHIFT),
            Key::plain(KeyCode::Enter),
            Key::plain(KeyCode::Backspace),
            Key::new(KeyCode::Backspace, Modifiers::ALT),
            Key::new(KeyCode::Char(' '), Modifiers::CTRL),
            Key::new(KeyCode::Char('j'), Modifiers::CTRL),
            Key::new(KeyCode::Char('é'), Modifiers::ALT | Modifiers::SHIFT),
        ];
        for key in keys {
            let bytes = encode_key(key).unwrap();
            let decoded = Decoder::new().advance(&bytes);
            assert_eq!(decoded, vec![Decoded::Key(key)], "{key}");
        }
    }
}
