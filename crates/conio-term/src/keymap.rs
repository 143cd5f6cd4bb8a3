// SPDX-License-Identifier: MIT
//
// Native key code → canonical key tables.
//
// Each backend names keys differently: xterm sends `ESC [ 5 ~` for Page Up,
// the Windows console sends virtual-key 0x21, crossterm hands us
// `KeyCode::PageUp`. A `KeyMapTable` is a static slice of
// `(native, base key, implied modifiers)` rows that folds one backend's
// vocabulary onto the canonical `Key`. Lookups are linear: the tables are
// a few dozen rows and sit in one or two cache lines.
//
// Characters that no table names go through `fold_char`, the one place
// that decides letter case and control-character meaning. Every backend
// shares it, so Ctrl+A, Shift+a and Ctrl+Space mean the same thing no
// matter which backend produced them.

use crate::key::{Key, KeyCode, Modifiers};

// ─── KeyMapTable ────────────────────────────────────────────────────────────

/// A static native-code → canonical-key table.
#[derive(Debug, Clone, Copy)]
pub struct KeyMapTable<N: 'static> {
    entries: &'static [(N, KeyCode, Modifiers)],
}

impl<N: PartialEq + Copy> KeyMapTable<N> {
    #[must_use]
    pub const fn new(entries: &'static [(N, KeyCode, Modifiers)]) -> Self {
        Self { entries }
    }

    /// Base key and implied modifiers for a native code.
    #[must_use]
    pub fn lookup(&self, native: N) -> Option<(KeyCode, Modifiers)> {
        self.entries
            .iter()
            .find(|(n, ..)| *n == native)
            .map(|&(_, code, implied)| (code, implied))
    }

    /// Map a native code to a canonical key.
    ///
    /// Table rows win. Otherwise the printable character the backend
    /// reported, if any, is folded with [`fold_char`]. `modifiers` are the
    /// modifiers the backend saw held; they combine with the row's implied
    /// modifiers.
    #[must_use]
    pub fn map(&self, native: N, modifiers: Modifiers, printable: Option<char>) -> Option<Key> {
        if let Some((code, implied)) = self.lookup(native) {
            return Some(Key::new(code, implied | modifiers));
        }
        printable.and_then(|ch| fold_char(ch, modifiers))
    }

    /// Native code producing `code` with exactly `implied` modifiers.
    #[must_use]
    pub fn reverse(&self, code: KeyCode, implied: Modifiers) -> Option<N> {
        self.entries
            .iter()
            .find(|&&(_, c, m)| c == code && m == implied)
            .map(|&(native, ..)| native)
    }

    #[must_use]
    pub const fn entries(&self) -> &'static [(N, KeyCode, Modifiers)] {
        self.entries
    }
}

// ─── Folding rules ──────────────────────────────────────────────────────────

/// Fold a character a backend reported into a canonical key.
///
/// - Uppercase letters become lowercase plus Shift; lowercase letters drop
///   any Shift the backend reported (Caps Lock produced them).
/// - Other printable characters drop Shift: the glyph already says it.
/// - Control characters go through [`fold_control`].
#[must_use]
pub fn fold_char(ch: char, modifiers: Modifiers) -> Option<Key> {
    if ch.is_ascii_control() {
        return fold_control(u32::from(ch), modifiers);
    }
    if ch.is_control() {
        return None;
    }

    let mut lower = ch.to_lowercase();
    let (code, shifted) = match (lower.next(), lower.next()) {
        (Some(lc), None) if lc != ch => (lc, true),
        _ => (ch, false),
    };

    let mut mods = modifiers - Modifiers::SHIFT;
    if shifted {
        mods |= Modifiers::SHIFT;
    }
    Some(Key::new(KeyCode::Char(code), mods))
}

/// Fold an ASCII control code (0x00–0x1F, 0x7F) into a canonical key.
///
/// 0 is Ctrl+Space. 1–26 are Ctrl+A..Z, except Tab (9) and Enter (13);
/// 10 stays Ctrl+J so it is never confused with a literal Enter. 8 and
/// 127 are Backspace, 27 is Escape, 28–31 are Ctrl+4..7.
#[must_use]
pub fn fold_control(code: u32, modifiers: Modifiers) -> Option<Key> {
    let (base, implied) = match code {
        0 => (KeyCode::Char(' '), Modifiers::CTRL),
        8 | 0x7F => (KeyCode::Backspace, Modifiers::empty()),
        9 => (KeyCode::Tab, Modifiers::empty()),
        13 => (KeyCode::Enter, Modifiers::empty()),
        27 => (KeyCode::Escape, Modifiers::empty()),
        1..=26 => (
            KeyCode::Char(char::from_u32(code - 1 + u32::from(b'a'))?),
            Modifiers::CTRL,
        ),
        28..=31 => (
            KeyCode::Char(char::from_u32(code - 28 + u32::from(b'4'))?),
            Modifiers::CTRL,
        ),
        _ => return None,
    };
    Some(Key::new(base, implied | modifiers))
}

// ─── xterm CSI / SS3 ────────────────────────────────────────────────────────

/// `ESC [ n ~` leading parameter → key.
pub static CSI_TILDE: KeyMapTable<u16> = KeyMapTable::new(&[
    (1, KeyCode::Home, Modifiers::empty()),
    (2, KeyCode::Insert, Modifiers::empty()),
    (3, KeyCode::Delete, Modifiers::empty()),
    (4, KeyCode::End, Modifiers::empty()),
    (5, KeyCode::PageUp, Modifiers::empty()),
    (6, KeyCode::PageDown, Modifiers::empty()),
    (7, KeyCode::Home, Modifiers::empty()),
    (8, KeyCode::End, Modifiers::empty()),
    (11, KeyCode::F(1), Modifiers::empty()),
    (12, KeyCode::F(2), Modifiers::empty()),
    (13, KeyCode::F(3), Modifiers::empty()),
    (14, KeyCode::F(4), Modifiers::empty()),
    (15, KeyCode::F(5), Modifiers::empty()),
    (17, KeyCode::F(6), Modifiers::empty()),
    (18, KeyCode::F(7), Modifiers::empty()),
    (19, KeyCode::F(8), Modifiers::empty()),
    (20, KeyCode::F(9), Modifiers::empty()),
    (21, KeyCode::F(10), Modifiers::empty()),
    (23, KeyCode::F(11), Modifiers::empty()),
    (24, KeyCode::F(12), Modifiers::empty()),
    (25, KeyCode::F(13), Modifiers::empty()),
    (26, KeyCode::F(14), Modifiers::empty()),
    (28, KeyCode::F(15), Modifiers::empty()),
    (29, KeyCode::F(16), Modifiers::empty()),
    (31, KeyCode::F(17), Modifiers::empty()),
    (32, KeyCode::F(18), Modifiers::empty()),
    (33, KeyCode::F(19), Modifiers::empty()),
    (34, KeyCode::F(20), Modifiers::empty()),
]);

/// CSI and SS3 final byte → key.
pub static CSI_FINAL: KeyMapTable<u8> = KeyMapTable::new(&[
    (b'A', KeyCode::Up, Modifiers::empty()),
    (b'B', KeyCode::Down, Modifiers::empty()),
    (b'C', KeyCode::Right, Modifiers::empty()),
    (b'D', KeyCode::Left, Modifiers::empty()),
    (b'H', KeyCode::Home, Modifiers::empty()),
    (b'F', KeyCode::End, Modifiers::empty()),
    (b'P', KeyCode::F(1), Modifiers::empty()),
    (b'Q', KeyCode::F(2), Modifiers::empty()),
    (b'R', KeyCode::F(3), Modifiers::empty()),
    (b'S', KeyCode::F(4), Modifiers::empty()),
    (b'Z', KeyCode::Tab, Modifiers::SHIFT),
]);

/// xterm modifier parameter values (`1 + bitmask`).
static MODIFIER_PARAMS: [(u16, Modifiers); 7] = [
    (2, Modifiers::SHIFT),
    (3, Modifiers::ALT),
    (4, Modifiers::SHIFT.union(Modifiers::ALT)),
    (5, Modifiers::CTRL),
    (6, Modifiers::SHIFT.union(Modifiers::CTRL)),
    (7, Modifiers::ALT.union(Modifiers::CTRL)),
    (8, Modifiers::SHIFT.union(Modifiers::ALT).union(Modifiers::CTRL)),
];

/// Decode an xterm modifier parameter. 0 and 1 mean none; values beyond
/// the table keep their low three bits (Super/Meta are not modelled).
#[must_use]
pub fn decode_modifier_param(param: u16) -> Modifiers {
    if let Some(&(_, mods)) = MODIFIER_PARAMS.iter().find(|(p, _)| *p == param) {
        return mods;
    }
    let mask = param.saturating_sub(1);
    let mut mods = Modifiers::empty();
    if mask & 1 != 0 {
        mods |= Modifiers::SHIFT;
    }
    if mask & 2 != 0 {
        mods |= Modifiers::ALT;
    }
    if mask & 4 != 0 {
        mods |= Modifiers::CTRL;
    }
    mods
}

/// Encode modifiers as an xterm modifier parameter. 1 means none.
#[must_use]
pub fn encode_modifier_param(modifiers: Modifiers) -> u16 {
    MODIFIER_PARAMS
        .iter()
        .find(|(_, m)| *m == modifiers)
        .map_or(1, |&(p, _)| p)
}

// ─── Windows virtual keys ───────────────────────────────────────────────────

/// Windows virtual-key code → key. Letters and digits are not listed:
/// they arrive with their character and go through [`fold_char`].
pub static WINDOWS_VK: KeyMapTable<u16> = KeyMapTable::new(&[
    (0x08, KeyCode::Backspace, Modifiers::empty()),
    (0x09, KeyCode::Tab, Modifiers::empty()),
    (0x0D, KeyCode::Enter, Modifiers::empty()),
    (0x13, KeyCode::Pause, Modifiers::empty()),
    (0x1B, KeyCode::Escape, Modifiers::empty()),
    (0x21, KeyCode::PageUp, Modifiers::empty()),
    (0x22, KeyCode::PageDown, Modifiers::empty()),
    (0x23, KeyCode::End, Modifiers::empty()),
    (0x24, KeyCode::Home, Modifiers::empty()),
    (0x25, KeyCode::Left, Modifiers::empty()),
    (0x26, KeyCode::Up, Modifiers::empty()),
    (0x27, KeyCode::Right, Modifiers::empty()),
    (0x28, KeyCode::Down, Modifiers::empty()),
    (0x2C, KeyCode::PrintScreen, Modifiers::empty()),
    (0x2D, KeyCode::Insert, Modifiers::empty()),
    (0x2E, KeyCode::Delete, Modifiers::empty()),
    (0x70, KeyCode::F(1), Modifiers::empty()),
    (0x71, KeyCode::F(2), Modifiers::empty()),
    (0x72, KeyCode::F(3), Modifiers::empty()),
    (0x73, KeyCode::F(4), Modifiers::empty()),
    (0x74, KeyCode::F(5), Modifiers::empty()),
    (0x75, KeyCode::F(6), Modifiers::empty()),
    (0x76, KeyCode::F(7), Modifiers::empty()),
    (0x77, KeyCode::F(8), Modifiers::empty()),
    (0x78, KeyCode::F(9), Modifiers::empty()),
    (0x79, KeyCode::F(10), Modifiers::empty()),
    (0x7A, KeyCode::F(11), Modifiers::empty()),
    (0x7B, KeyCode::F(12), Modifiers::empty()),
    (0x7C, KeyCode::F(13), Modifiers::empty()),
    (0x7D, KeyCode::F(14), Modifiers::empty()),
    (0x7E, KeyCode::F(15), Modifiers::empty()),
    (0x7F, KeyCode::F(16), Modifiers::empty()),
    (0x80, KeyCode::F(17), Modifiers::empty()),
    (0x81, KeyCode::F(18), Modifiers::empty()),
    (0x82, KeyCode::F(19), Modifiers::empty()),
    (0x83, KeyCode::F(20), Modifiers::empty()),
    (0x84, KeyCode::F(21), Modifiers::empty()),
    (0x85, KeyCode::F(22), Modifiers::empty()),
    (0x86, KeyCode::F(23), Modifiers::empty()),
    (0x87, KeyCode::F(24), Modifiers::empty()),
]);

// ─── crossterm ──────────────────────────────────────────────────────────────

/// crossterm key code → key, for the library-managed backend.
pub static CURSES: KeyMapTable<crossterm::event::KeyCode> = {
    use crossterm::event::KeyCode as Ct;
    KeyMapTable::new(&[
        (Ct::Backspace, KeyCode::Backspace, Modifiers::empty()),
        (Ct::Enter, KeyCode::Enter, Modifiers::empty()),
        (Ct::Tab, KeyCode::Tab, Modifiers::empty()),
        (Ct::BackTab, KeyCode::Tab, Modifiers::SHIFT),
        (Ct::Esc, KeyCode::Escape, Modifiers::empty()),
        (Ct::Delete, KeyCode::Delete, Modifiers::empty()),
        (Ct::Insert, KeyCode::Insert, Modifiers::empty()),
        (Ct::Up, KeyCode::Up, Modifiers::empty()),
        (Ct::Down, KeyCode::Down, Modifiers::empty()),
        (Ct::Left, KeyCode::Left, Modifiers::empty()),
        (Ct::Right, KeyCode::Right, Modifiers::empty()),
        (Ct::Home, KeyCode::Home, Modifiers::empty()),
        (Ct::End, KeyCode::End, Modifiers::empty()),
        (Ct::PageUp, KeyCode::PageUp, Modifiers::empty()),
        (Ct::PageDown, KeyCode::PageDown, Modifiers::empty()),
        (Ct::PrintScreen, KeyCode::PrintScreen, Modifiers::empty()),
        (Ct::Pause, KeyCode::Pause, Modifiers::empty()),
        (Ct::Null, KeyCode::Char(' '), Modifiers::CTRL),
        (Ct::F(1), KeyCode::F(1), Modifiers::empty()),
        (Ct::F(2), KeyCode::F(2), Modifiers::empty()),
        (Ct::F(3), KeyCode::F(3), Modifiers::empty()),
        (Ct::F(4), KeyCode::F(4), Modifiers::empty()),
        (Ct::F(5), KeyCode::F(5), Modifiers::empty()),
        (Ct::F(6), KeyCode::F(6), Modifiers::empty()),
        (Ct::F(7), KeyCode::F(7), Modifiers::empty()),
        (Ct::F(8), KeyCode::F(8), Modifiers::empty()),
        (Ct::F(9), KeyCode::F(9), Modifiers::empty()),
        (Ct::F(10), KeyCode::F(10), Modifiers::empty()),
        (Ct::F(11), KeyCode::F(11), Modifiers::empty()),
        (Ct::F(12), KeyCode::F(12), Modifiers::empty()),
        (Ct::F(13), KeyCode::F(13), Modifiers::empty()),
        (Ct::F(14), KeyCode::F(14), Modifiers::empty()),
        (Ct::F(15), KeyCode::F(15), Modifiers::empty()),
        (Ct::F(16), KeyCode::F(16), Modifiers::empty()),
        (Ct::F(17), KeyCode::F(17), Modifiers::empty()),
        (Ct::F(18), KeyCode::F(18), Modifiers::empty()),
        (Ct::F(19), KeyCode::F(19), Modifiers::empty()),
        (Ct::F(20), KeyCode::F(20), Modifiers::empty()),
        (Ct::F(21), KeyCode::F(21), Modifiers::empty()),
        (Ct::F(22), KeyCode::F(22), Modifiers::empty()),
        (Ct::F(23), KeyCode::F(23), Modifiers::empty()),
        (Ct::F(24), KeyCode::F(24), Modifiers::empty()),
    ])
};

/// crossterm modifier flags → canonical modifiers.
#[must_use]
pub fn from_crossterm_modifiers(mods: crossterm::event::KeyModifiers) -> Modifiers {
    use crossterm::event::KeyModifiers as Km;
    let mut out = Modifiers::empty();
    if mods.contains(Km::SHIFT) {
        out |= Modifiers::SHIFT;
    }
    if mods.contains(Km::ALT) {
        out |= Modifiers::ALT;
    }
    if mods.contains(Km::CONTROL) {
        out |= Modifiers::CTRL;
    }
    out
}

/// Map a crossterm key code plus modifiers through [`CURSES`].
#[must_use]
pub fn map_crossterm(
    code: crossterm::event::KeyCode,
    mods: crossterm::event::KeyModifiers,
) -> Option<Key> {
    let printable = match code {
        crossterm::event::KeyCode::Char(ch) => Some(ch),
        _ => None,
    };
    CURSES.map(code, from_crossterm_modifiers(mods), printable)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
