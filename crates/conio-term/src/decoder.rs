// SPDX-License-Identifier: MIT
//
// Escape sequence decoder.
//
// Turns the raw byte stream of an ANSI/VT terminal into canonical keys,
// mouse events, cursor position reports and capability responses. The
// decoder is a byte-at-a-time state machine:
//
//   Ground ──ESC──▶ Escape ──[──▶ Csi ──final──▶ Ground
//      │              │ └────O──▶ Ss3 ──final──▶ Ground
//      │              └──printable──▶ Alt+key
//      └──UTF-8 lead──▶ Utf8 ──last continuation──▶ Ground
//
// Every byte is validated once, when it arrives. A sequence split across
// reads simply leaves the machine in a non-Ground state; the next `feed`
// continues from there. Nothing ever blocks and nothing ever errors:
// malformed runs come back as `Unrecognized` and are dropped, never
// forwarded as literal text.
//
// The one ambiguity a byte stream cannot resolve is a lone ESC: it is
// either the Escape key or the first byte of a sequence still in flight.
// The decoder leaves it pending; the reader calls `flush` once the
// escape timeout passes without further input.
//
// Key tables (CSI final letters, `~` codes, modifier parameters) live in
// `keymap.rs` as data.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::key::{Key, KeyCode, Modifiers};
use crate::keymap::{self, CSI_FINAL, CSI_TILDE};
use crate::mouse::{self, MouseEvent};

/// Longest sequence the decoder accumulates before giving up on it.
pub const MAX_SEQUENCE: usize = 64;

const ESC: u8 = 0x1B;

// ─── Output types ───────────────────────────────────────────────────────────

/// A terminal's answer to a capability query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityResponse {
    /// `ESC [ ? Ps ; … c`: DA1, the terminal class and feature list.
    PrimaryDeviceAttributes(Vec<u16>),
    /// `ESC [ > Ps ; … c`: DA2, terminal type, firmware version, ROM.
    SecondaryDeviceAttributes(Vec<u16>),
    /// `ESC [ ? Ps ; Pm $ y`: DECRPM. `status` 1 = set, 2 = reset,
    /// 0 = unknown mode.
    ModeReport { mode: u16, status: u16 },
    /// `ESC [ 8 ; rows ; cols t`: text area size in cells.
    TextAreaSize { rows: u16, cols: u16 },
}

/// Result of feeding one byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// The byte was consumed; more are needed.
    Incomplete,
    Key(Key),
    Mouse(MouseEvent),
    /// `ESC [ row ; col R`, converted to 0-based.
    CursorReport { row: u16, col: u16 },
    CapabilityResponse(CapabilityResponse),
    /// A malformed or unknown run was dropped.
    Unrecognized,
}

// ─── Pending cursor reports ─────────────────────────────────────────────────

/// Count of cursor position requests (`ESC [ 6 n`) still unanswered.
///
/// `ESC [ 1 ; 5 R` is both Ctrl+F3 and "cursor at row 1, column 5". The
/// writer registers every request it sends; the decoder reads a report
/// only while one is outstanding, and a key otherwise. Clones share the
/// counter.
#[derive(Debug, Clone, Default)]
pub struct PendingReports(Arc<AtomicUsize>);

impl PendingReports {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a request was sent.
    pub fn register(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    /// Consume one outstanding request. False when none was outstanding.
    pub fn take(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

// ─── Decoder ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    Csi,
    /// A CSI sequence outgrew `MAX_SEQUENCE`: swallow through its final
    /// byte.
    CsiIgnore,
    Ss3,
    /// Inside a multi-byte character: `need` continuation bytes to go.
    /// `alt` when the character was preceded by ESC.
    Utf8 { need: usize, alt: bool },
}

/// Byte stream → canonical event decoder.
#[derive(Debug)]
pub struct Decoder {
    state: State,
    /// Bytes of the sequence in progress, starting at its first byte.
    buf: Vec<u8>,
    /// Scratch for CSI parameters, reused across sequences.
    params: Vec<u16>,
    pending: PendingReports,
}

impl Decoder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_reports(PendingReports::new())
    }

    /// A decoder sharing its outstanding-report counter with a writer.
    #[must_use]
    pub fn with_reports(pending: PendingReports) -> Self {
        Self {
            state: State::Ground,
            buf: Vec::with_capacity(MAX_SEQUENCE),
            params: Vec::with_capacity(8),
            pending,
        }
    }

    /// The counter this decoder consults for cursor reports.
    #[must_use]
    pub const fn reports(&self) -> &PendingReports {
        &self.pending
    }

    /// Feed one byte.
    pub fn feed(&mut self, byte: u8) -> Decoded {
        match self.state {
            State::Ground => self.ground(byte),
            State::Escape => self.escape(byte),
            State::Csi => self.csi(byte),
            State::CsiIgnore => self.csi_ignore(byte),
            State::Ss3 => self.ss3(byte),
            State::Utf8 { need, alt } => self.utf8(byte, need, alt),
        }
    }

    /// Feed a chunk and collect everything it completes. `Incomplete` and
    /// `Unrecognized` results are dropped.
    pub fn advance(&mut self, data: &[u8]) -> Vec<Decoded> {
        let mut out = Vec::new();
        for &byte in data {
            match self.feed(byte) {
                Decoded::Incomplete => {}
                Decoded::Unrecognized => trace!(byte, "dropped unrecognized input"),
                decoded => out.push(decoded),
            }
        }
        out
    }

    /// Resolve whatever is pending after the escape timeout.
    ///
    /// A lone ESC is the Escape key. `ESC [` and `ESC O` with nothing after
    /// them are Alt+`[` and Alt+Shift+`o`. Anything else still pending is
    /// a truncated sequence and comes back as `Unrecognized`. `None` when
    /// nothing was pending.
    pub fn flush(&mut self) -> Option<Decoded> {
        let resolved = match (self.state, self.buf.as_slice()) {
            (State::Ground, _) => return None,
            (State::Escape, _) => Decoded::Key(Key::plain(KeyCode::Escape)),
            (State::Csi, [ESC, b'[']) => keymap::fold_char('[', Modifiers::ALT)
                .map_or(Decoded::Unrecognized, Decoded::Key),
            (State::Ss3, [ESC, b'O']) => keymap::fold_char('O', Modifiers::ALT)
                .map_or(Decoded::Unrecognized, Decoded::Key),
            _ => Decoded::Unrecognized,
        };
        self.reset();
        Some(resolved)
    }

    /// Whether a sequence is in progress.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.state != State::Ground
    }

    /// The bytes of the sequence in progress.
    #[must_use]
    pub fn pending_bytes(&self) -> &[u8] {
        &self.buf
    }

    fn reset(&mut self) {
        self.state = State::Ground;
        self.buf.clear();
    }

    /// Abandon the sequence in progress and reprocess `byte` from Ground.
    fn restart(&mut self, byte: u8) -> Decoded {
        trace!(dropped = ?self.buf, "sequence interrupted");
        self.reset();
        self.feed(byte)
    }

    fn key(&mut self, key: Option<Key>) -> Decoded {
        self.reset();
        key.map_or(Decoded::Unrecognized, Decoded::Key)
    }

    // ── States ──────────────────────────────────────────────────────────

    fn ground(&mut self, byte: u8) -> Decoded {
        match byte {
            ESC => {
                self.buf.push(byte);
                self.state = State::Escape;
                Decoded::Incomplete
            }
            0x00..=0x1F | 0x7F => self.key(keymap::fold_control(u32::from(byte), Modifiers::empty())),
            0x20..=0x7E => self.key(keymap::fold_char(char::from(byte), Modifiers::empty())),
            lead => match utf8_char_len(lead) {
                0 | 1 => Decoded::Unrecognized,
                len => {
                    self.buf.push(lead);
                    self.state = State::Utf8 {
                        need: len - 1,
                        alt: false,
                    };
                    Decoded::Incomplete
                }
            },
        }
    }

    fn escape(&mut self, byte: u8) -> Decoded {
        match byte {
            b'[' => {
                self.buf.push(byte);
                self.state = State::Csi;
                Decoded::Incomplete
            }
            b'O' => {
                self.buf.push(byte);
                self.state = State::Ss3;
                Decoded::Incomplete
            }
            ESC => self.key(Some(Key::new(KeyCode::Escape, Modifiers::ALT))),
            0x00..=0x1F | 0x7F => self.key(keymap::fold_control(u32::from(byte), Modifiers::ALT)),
            0x20..=0x7E => self.key(keymap::fold_char(char::from(byte), Modifiers::ALT)),
            lead => match utf8_char_len(lead) {
                0 | 1 => {
                    self.reset();
                    Decoded::Unrecognized
                }
                len => {
                    self.buf.push(lead);
                    self.state = State::Utf8 {
                        need: len - 1,
                        alt: true,
                    };
                    Decoded::Incomplete
                }
            },
        }
    }

    fn csi(&mut self, byte: u8) -> Decoded {
        match byte {
            ESC => self.restart(byte),
            0x20..=0x3F if self.buf.len() >= MAX_SEQUENCE => {
                trace!(len = self.buf.len(), "sequence too long, skipping to its end");
                self.buf.clear();
                self.state = State::CsiIgnore;
                Decoded::Incomplete
            }
            // Parameter bytes (digits ; : < = > ?) and intermediates.
            0x20..=0x3F => {
                self.buf.push(byte);
                Decoded::Incomplete
            }
            0x40..=0x7E => {
                let decoded = self.finish_csi(byte);
                self.reset();
                decoded
            }
            _ => {
                self.reset();
                Decoded::Unrecognized
            }
        }
    }

    fn csi_ignore(&mut self, byte: u8) -> Decoded {
        match byte {
            ESC => self.restart(byte),
            0x20..=0x3F => Decoded::Incomplete,
            _ => {
                self.reset();
                Decoded::Unrecognized
            }
        }
    }

    fn ss3(&mut self, byte: u8) -> Decoded {
        match byte {
            ESC => self.restart(byte),
            // Some terminals put a modifier digit between `O` and the final.
            b'0'..=b'9' if self.buf.len() == 2 => {
                self.buf.push(byte);
                Decoded::Incomplete
            }
            0x40..=0x7E => {
                let mods = match self.buf.get(2) {
                    Some(&digit) => keymap::decode_modifier_param(u16::from(digit - b'0')),
                    None => Modifiers::empty(),
                };
                self.key(CSI_FINAL.map(byte, mods, None))
            }
            _ => {
                self.reset();
                Decoded::Unrecognized
            }
        }
    }

    fn utf8(&mut self, byte: u8, need: usize, alt: bool) -> Decoded {
        if byte & 0xC0 != 0x80 {
            // Broken character: drop what we have, start over at `byte`.
            return self.restart(byte);
        }
        self.buf.push(byte);
        if need > 1 {
            self.state = State::Utf8 {
                need: need - 1,
                alt,
            };
            return Decoded::Incomplete;
        }

        let start = usize::from(alt);
        let mods = if alt { Modifiers::ALT } else { Modifiers::empty() };
        let key = std::str::from_utf8(&self.buf[start..])
            .ok()
            .and_then(|s| s.chars().next())
            .and_then(|ch| keymap::fold_char(ch, mods));
        self.key(key)
    }

    // ── CSI dispatch ────────────────────────────────────────────────────

    fn finish_csi(&mut self, final_byte: u8) -> Decoded {
        // buf = ESC [ <marker>? <params> <intermediates>; final not pushed.
        let body = &self.buf[2..];
        let (marker, body) = match body.first() {
            Some(&m @ (b'<' | b'=' | b'>' | b'?')) => (Some(m), &body[1..]),
            _ => (None, body),
        };
        let split = body
            .iter()
            .position(|b| (0x20..=0x2F).contains(b))
            .unwrap_or(body.len());
        let (raw_params, intermediates) = body.split_at(split);
        if !parse_params(raw_params, &mut self.params) {
            return Decoded::Unrecognized;
        }
        let p = &self.params;
        let param = |i: usize| p.get(i).copied().unwrap_or(0);

        match (marker, intermediates, final_byte) {
            (Some(b'<'), [], b'M' | b'm') if p.len() == 3 => {
                mouse::from_sgr(param(0), param(1), param(2), final_byte == b'm')
                    .map_or(Decoded::Unrecognized, Decoded::Mouse)
            }
            (Some(b'?'), [], b'R') if p.len() == 2 => cursor_report(param(0), param(1)),
            (None, [], b'R') if p.len() == 2 && self.pending.take() => {
                cursor_report(param(0), param(1))
            }
            (Some(b'?'), [], b'c') => Decoded::CapabilityResponse(
                CapabilityResponse::PrimaryDeviceAttributes(p.clone()),
            ),
            (Some(b'>'), [], b'c') => Decoded::CapabilityResponse(
                CapabilityResponse::SecondaryDeviceAttributes(p.clone()),
            ),
            (Some(b'?') | None, [b'$'], b'y') if p.len() == 2 => {
                Decoded::CapabilityResponse(CapabilityResponse::ModeReport {
                    mode: param(0),
                    status: param(1),
                })
            }
            (None, [], b't') if p.len() == 3 && param(0) == 8 => {
                Decoded::CapabilityResponse(CapabilityResponse::TextAreaSize {
                    rows: param(1),
                    cols: param(2),
                })
            }
            (None, [], b'~') => {
                let mods = keymap::decode_modifier_param(param(1));
                CSI_TILDE
                    .map(param(0), mods, None)
                    .map_or(Decoded::Unrecognized, Decoded::Key)
            }
            (None, [], final_byte) => {
                // `ESC [ 1 ; 5 A`: the leading 1 is a placeholder.
                let mods = keymap::decode_modifier_param(param(1));
                CSI_FINAL
                    .map(final_byte, mods, None)
                    .map_or(Decoded::Unrecognized, Decoded::Key)
            }
            _ => Decoded::Unrecognized,
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

const fn cursor_report(row: u16, col: u16) -> Decoded {
    Decoded::CursorReport {
        row: row.saturating_sub(1),
        col: col.saturating_sub(1),
    }
}

/// Parse `;`-separated decimal parameters into `out`. Colon sub-parameters
/// are skipped; empty parameters read as 0. False when a parameter byte
/// other than a digit, `;` or `:` appears.
fn parse_params(raw: &[u8], out: &mut Vec<u16>) -> bool {
    out.clear();
    if raw.is_empty() {
        return true;
    }
    let mut value: u16 = 0;
    let mut in_sub = false;
    for &b in raw {
        match b {
            b'0'..=b'9' if !in_sub => {
                value = value.saturating_mul(10).saturating_add(u16::from(b - b'0'));
            }
            b'0'..=b'9' => {}
            b':' => in_sub = true,
            b';' => {
                out.push(value);
                value = 0;
                in_sub = false;
            }
            _ => return false,
        }
    }
    out.push(value);
    true
}

/// Expected byte length of a UTF-8 character from its lead byte.
/// Returns 0 for invalid lead bytes (continuation bytes, 0xF8 and up).
const fn utf8_char_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 0,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mouse::MouseFlags;
    use pretty_assertions::assert_eq;

    fn keys(input: &[u8]) -> Vec<Decoded> {
        Decoder::new().advance(input)
    }

    fn key(code: KeyCode, mods: Modifiers) -> Decoded {
        Decoded::Key(Key::new(code, mods))
    }

    fn ch(c: char) -> Decoded {
        key(KeyCode::Char(c), Modifiers::empty())
    }

    // ── Plain bytes ─────────────────────────────────────────────────────

    #[test]
    fn ascii_text() {
        assert_eq!(keys(b"hi"), vec![ch('h'), ch('i')]);
    }

    #[test]
    fn uppercase_is_shift() {
        assert_eq!(keys(b"Q"), vec![key(KeyCode::Char('q'), Modifiers::SHIFT)]);
    }

    #[test]
    fn control_bytes() {
        assert_eq!(
            keys(b"\x00\x01\x09\x0a\x0d\x7f\x08\x1c"),
            vec![
                key(KeyCode::Char(' '), Modifiers::CTRL),
                key(KeyCode::Char('a'), Modifiers::CTRL),
                key(KeyCode::Tab, Modifiers::empty()),
                key(KeyCode::Char('j'), Modifiers::CTRL),
                key(KeyCode::Enter, Modifiers::empty()),
                key(KeyCode::Backspace, Modifiers::empty()),
                key(KeyCode::Backspace, Modifiers::empty()),
                key(KeyCode::Char('4'), Modifiers::CTRL),
            ]
        );
    }

    #[test]
    fn utf8_characters() {
        assert_eq!(keys("é日🦀".as_bytes()), vec![ch('é'), ch('日'), ch('🦀')]);
    }

    #[test]
    fn broken_utf8_drops_lead_and_keeps_next() {
        assert_eq!(keys(&[0xE6, b'x']), vec![ch('x')]);
    }

    #[test]
    fn stray_continuation_is_unrecognized() {
        let mut d = Decoder::new();
        assert_eq!(d.feed(0x80), Decoded::Unrecognized);
        assert!(!d.has_pending());
    }

    // ── Escape / Alt ────────────────────────────────────────────────────

    #[test]
    fn lone_escape_waits_for_flush() {
        let mut d = Decoder::new();
        assert_eq!(d.feed(ESC), Decoded::Incomplete);
        assert!(d.has_pending());
        assert_eq!(d.pending_bytes(), &[ESC]);
        assert_eq!(d.flush(), Some(key(KeyCode::Escape, Modifiers::empty())));
        assert!(!d.has_pending());
        assert_eq!(d.flush(), None);
    }

    #[test]
    fn escape_letter_is_alt() {
        assert_eq!(keys(b"\x1bx"), vec![key(KeyCode::Char('x'), Modifiers::ALT)]);
        assert_eq!(
            keys(b"\x1bX"),
            vec![key(KeyCode::Char('x'), Modifiers::ALT | Modifiers::SHIFT)]
        );
    }

    #[test]
    fn escape_control_is_alt_ctrl() {
        assert_eq!(
            keys(b"\x1b\x01"),
            vec![key(KeyCode::Char('a'), Modifiers::ALT | Modifiers::CTRL)]
        );
    }

    #[test]
    fn double_escape_is_alt_escape() {
        assert_eq!(keys(b"\x1b\x1b"), vec![key(KeyCode::Escape, Modifiers::ALT)]);
    }

    #[test]
    fn escape_utf8_is_alt() {
        assert_eq!(
            keys("\x1bé".as_bytes()),
            vec![key(KeyCode::Char('é'), Modifiers::ALT)]
        );
    }

    #[test]
    fn flush_of_bare_introducers() {
        let mut d = Decoder::new();
        d.advance(b"\x1b[");
        assert_eq!(d.flush(), Some(key(KeyCode::Char('['), Modifiers::ALT)));

        d.advance(b"\x1bO");
        assert_eq!(
            d.flush(),
            Some(key(KeyCode::Char('o'), Modifiers::ALT | Modifiers::SHIFT))
        );
    }

    #[test]
    fn flush_of_truncated_sequence_is_unrecognized() {
        let mut d = Decoder::new();
        d.advance(b"\x1b[1;");
        assert_eq!(d.flush(), Some(Decoded::Unrecognized));
        assert!(!d.has_pending());
    }

    // ── CSI keys ────────────────────────────────────────────────────────

    #[test]
    fn arrows_and_modifiers() {
        assert_eq!(keys(b"\x1b[A"), vec![key(KeyCode::Up, Modifiers::empty())]);
        assert_eq!(keys(b"\x1b[1;5A"), vec![key(KeyCode::Up, Modifiers::CTRL)]);
        assert_eq!(
            keys(b"\x1b[1;6D"),
            vec![key(KeyCode::Left, Modifiers::SHIFT | Modifiers::CTRL)]
        );
    }

    #[test]
    fn tilde_keys() {
        assert_eq!(keys(b"\x1b[3~"), vec![key(KeyCode::Delete, Modifiers::empty())]);
        assert_eq!(keys(b"\x1b[5;3~"), vec![key(KeyCode::PageUp, Modifiers::ALT)]);
        assert_eq!(keys(b"\x1b[24~"), vec![key(KeyCode::F(12), Modifiers::empty())]);
        assert_eq!(keys(b"\x1b[34~"), vec![key(KeyCode::F(20), Modifiers::empty())]);
    }

    #[test]
    fn unknown_tilde_code_is_dropped() {
        assert_eq!(keys(b"\x1b[99~x"), vec![ch('x')]);
    }

    #[test]
    fn back_tab() {
        assert_eq!(keys(b"\x1b[Z"), vec![key(KeyCode::Tab, Modifiers::SHIFT)]);
    }

    #[test]
    fn ss3_keys() {
        assert_eq!(keys(b"\x1bOP"), vec![key(KeyCode::F(1), Modifiers::empty())]);
        assert_eq!(keys(b"\x1bOH"), vec![key(KeyCode::Home, Modifiers::empty())]);
        assert_eq!(keys(b"\x1bO5C"), vec![key(KeyCode::Right, Modifiers::CTRL)]);
    }

    #[test]
    fn sub_parameters_are_skipped() {
        assert_eq!(keys(b"\x1b[1;5:1A"), vec![key(KeyCode::Up, Modifiers::CTRL)]);
    }

    #[test]
    fn escape_inside_sequence_restarts() {
        assert_eq!(
            keys(b"\x1b[1;\x1b[B"),
            vec![key(KeyCode::Down, Modifiers::empty())]
        );
    }

    #[test]
    fn overlong_sequence_is_dropped() {
        let mut input = b"\x1b[".to_vec();
        input.extend(std::iter::repeat_n(b'1', MAX_SEQUENCE + 4));
        input.extend_from_slice(b"Ax");
        assert_eq!(keys(&input), vec![ch('x')]);
    }

    #[test]
    fn overlong_sequence_stays_pending_until_final_byte() {
        let mut d = Decoder::new();
        let mut input = b"\x1b[".to_vec();
        input.extend(std::iter::repeat_n(b';', MAX_SEQUENCE * 2));
        assert!(d.advance(&input).is_empty());
        assert!(d.has_pending());
        assert_eq!(d.feed(b'm'), Decoded::Unrecognized);
        assert!(!d.has_pending());
    }

    #[test]
    fn escape_restarts_an_overlong_sequence() {
        let mut input = b"\x1b[".to_vec();
        input.extend(std::iter::repeat_n(b'1', MAX_SEQUENCE + 1));
        input.extend_from_slice(b"\x1b[B");
        assert_eq!(keys(&input), vec![key(KeyCode::Down, Modifiers::empty())]);
    }

    #[test]
    fn control_byte_inside_csi_is_unrecognized() {
        let mut d = Decoder::new();
        d.advance(b"\x1b[1");
        assert_eq!(d.feed(0x07), Decoded::Unrecognized);
        assert!(!d.has_pending());
    }

    // ── Mouse ───────────────────────────────────────────────────────────

    #[test]
    fn sgr_mouse_press_and_release() {
        assert_eq!(
            keys(b"\x1b[<0;11;4M\x1b[<0;11;4m"),
            vec![
                Decoded::Mouse(MouseEvent::new(
                    10,
                    3,
                    MouseFlags::BUTTON1_PRESSED | MouseFlags::REPORT_MOUSE_POSITION
                )),
                Decoded::Mouse(MouseEvent::new(10, 3, MouseFlags::BUTTON1_RELEASED)),
            ]
        );
    }

    #[test]
    fn sgr_mouse_with_wrong_arity_is_dropped() {
        assert!(keys(b"\x1b[<0;11M").is_empty());
    }

    // ── Responses ───────────────────────────────────────────────────────

    #[test]
    fn cursor_report_only_when_requested() {
        let mut d = Decoder::new();
        assert_eq!(
            d.advance(b"\x1b[1;5R"),
            vec![key(KeyCode::F(3), Modifiers::CTRL)]
        );

        d.reports().register();
        assert_eq!(
            d.advance(b"\x1b[1;5R"),
            vec![Decoded::CursorReport { row: 0, col: 4 }]
        );
        assert_eq!(d.reports().count(), 0);
    }

    #[test]
    fn private_cursor_report_is_unambiguous() {
        assert_eq!(
            keys(b"\x1b[?12;40R"),
            vec![Decoded::CursorReport { row: 11, col: 39 }]
        );
    }

    #[test]
    fn shared_counter() {
        let reports = PendingReports::new();
        let mut d = Decoder::with_reports(reports.clone());
        reports.register();
        assert_eq!(d.advance(b"\x1b[3;7R"), vec![Decoded::CursorReport { row: 2, col: 6 }]);
        assert!(!reports.take());
    }

    #[test]
    fn device_attributes() {
        assert_eq!(
            keys(b"\x1b[?62;22c"),
            vec![Decoded::CapabilityResponse(
                CapabilityResponse::PrimaryDeviceAttributes(vec![62, 22])
            )]
        );
        assert_eq!(
            keys(b"\x1b[>1;4000;0c"),
            vec![Decoded::CapabilityResponse(
                CapabilityResponse::SecondaryDeviceAttributes(vec![1, 4000, 0])
            )]
        );
    }

    #[test]
    fn mode_report() {
        assert_eq!(
            keys(b"\x1b[?2026;2$y"),
            vec![Decoded::CapabilityResponse(CapabilityResponse::ModeReport {
                mode: 2026,
                status: 2
            })]
        );
    }

    #[test]
    fn text_area_size() {
        assert_eq!(
            keys(b"\x1b[8;24;80t"),
            vec![Decoded::CapabilityResponse(CapabilityResponse::TextAreaSize {
                rows: 24,
                cols: 80
            })]
        );
    }

    // ── Framing ─────────────────────────────────────────────────────────

    #[test]
    fn split_at_every_point_matches_whole() {
        let stream: &[u8] = b"a\x1b[1;5A\x1b[<0;11;4M\xe6\x97\xa5\x1bx\x1b[24~\x1bOQz";
        let whole = keys(stream);
        for split in 0..=stream.len() {
            let mut d = Decoder::new();
            let mut out = d.advance(&stream[..split]);
            out.extend(d.advance(&stream[split..]));
            assert_eq!(out, whole, "split at {split}");
        }
    }

    #[test]
    fn params_parse() {
        let mut out = Vec::new();
        assert!(parse_params(b"1;;30", &mut out));
        assert_eq!(out, vec![1, 0, 30]);
        assert!(parse_params(b"5:3;2", &mut out));
        assert_eq!(out, vec![5, 2]);
        assert!(!parse_params(b"1<2", &mut out));
        assert!(parse_params(b"99999", &mut out));
        assert_eq!(out, vec![u16::MAX]);
    }
}
