// SPDX-License-Identifier: MIT
//
// Canonical key model.
//
// Every backend folds its native input onto one representation: a `Key`,
// which is a 32-bit bitset. The low 21 bits hold either a Unicode scalar
// value or a special-key ordinal placed just above the last codepoint
// (0x10FFFF), so the two ranges never collide. Three independent flag
// bits carry Shift, Ctrl and Alt.
//
//   31   30   29   28   27 .. 21   20 ........................... 0
//  ┌────┬────┬────┬────┬─────────┬──────────────────────────────────┐
//  │Alt │Ctrl│ -  │Shft│    -    │ codepoint  or  0x110000 + ordinal│
//  └────┴────┴────┴────┴─────────┴──────────────────────────────────┘
//
// Letters are stored lowercase; an uppercase letter is the lowercase
// letter plus Shift. Other printable characters carry their glyph as-is
// (the Shift that produced `!` is already part of the character).

use std::fmt;

use bitflags::bitflags;

// ─── Modifiers ──────────────────────────────────────────────────────────────

bitflags! {
    /// Modifier flags, positioned at their bits inside a [`Key`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 28;
        const CTRL  = 1 << 30;
        const ALT   = 1 << 31;
    }
}

// ─── KeyCode ────────────────────────────────────────────────────────────────

/// Identity of a key, without modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A Unicode character.
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Delete,
    Insert,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    PrintScreen,
    Pause,
    /// F1 through F24.
    F(u8),
}

/// First value of the special-key range (one past the last codepoint).
pub const SPECIAL_BASE: u32 = 0x11_0000;

/// Mask selecting the codepoint / ordinal bits of a [`Key`].
pub const CODE_MASK: u32 = 0x001F_FFFF;

/// Ordinal of F1; F(n) is `FN_BASE + n - 1`.
const FN_BASE: u32 = 32;

/// Highest function key representable.
pub const MAX_FN: u8 = 24;

impl KeyCode {
    /// Low bits of the key bitset for this code.
    #[must_use]
    pub const fn bits(self) -> u32 {
        let ordinal = match self {
            Self::Char(ch) => return ch as u32,
            Self::Enter => 0,
            Self::Tab => 1,
            Self::Backspace => 2,
            Self::Escape => 3,
            Self::Delete => 4,
            Self::Insert => 5,
            Self::Up => 6,
            Self::Down => 7,
            Self::Left => 8,
            Self::Right => 9,
            Self::Home => 10,
            Self::End => 11,
            Self::PageUp => 12,
            Self::PageDown => 13,
            Self::PrintScreen => 14,
            Self::Pause => 15,
            Self::F(n) => FN_BASE + n as u32 - 1,
        };
        SPECIAL_BASE + ordinal
    }

    /// Inverse of [`bits`](Self::bits). `None` for unassigned ordinals.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Option<Self> {
        let bits = bits & CODE_MASK;
        if bits < SPECIAL_BASE {
            return match char::from_u32(bits) {
                Some(ch) => Some(Self::Char(ch)),
                None => None,
            };
        }
        let code = match bits - SPECIAL_BASE {
            0 => Self::Enter,
            1 => Self::Tab,
            2 => Self::Backspace,
            3 => Self::Escape,
            4 => Self::Delete,
            5 => Self::Insert,
            6 => Self::Up,
            7 => Self::Down,
            8 => Self::Left,
            9 => Self::Right,
            10 => Self::Home,
            11 => Self::End,
            12 => Self::PageUp,
            13 => Self::PageDown,
            14 => Self::PrintScreen,
            15 => Self::Pause,
            #[allow(clippy::cast_possible_truncation)] // Range bounds n to 1..=24.
            ord @ FN_BASE..=55 => Self::F((ord - FN_BASE + 1) as u8),
            _ => return None,
        };
        Some(code)
    }

    /// Whether this is a special (non-character) key.
    #[inline]
    #[must_use]
    pub const fn is_special(self) -> bool {
        !matches!(self, Self::Char(_))
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(' ') => f.write_str("Space"),
            Self::Char(ch) => write!(f, "{ch}"),
            Self::F(n) => write!(f, "F{n}"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

// ─── Key ────────────────────────────────────────────────────────────────────

/// A canonical key: code bits plus modifier flags in one `u32`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(u32);

impl Key {
    /// Build a key from a code and modifiers.
    #[inline]
    #[must_use]
    pub const fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        Self(code.bits() | modifiers.bits())
    }

    /// A key with no modifiers.
    #[inline]
    #[must_use]
    pub const fn plain(code: KeyCode) -> Self {
        Self(code.bits())
    }

    /// Reinterpret raw bits. `None` when the code bits are unassigned.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Option<Self> {
        let known = CODE_MASK | Modifiers::all().bits();
        if bits & !known != 0 {
            return None;
        }
        match KeyCode::from_bits(bits) {
            Some(_) => Some(Self(bits)),
            None => None,
        }
    }

    /// The raw bitset.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// The key identity without modifiers.
    #[must_use]
    pub const fn code(self) -> KeyCode {
        match KeyCode::from_bits(self.0) {
            Some(code) => code,
            // Unreachable for keys built through the constructors.
            None => KeyCode::Char('\u{FFFD}'),
        }
    }

    /// The modifier flags.
    #[inline]
    #[must_use]
    pub const fn modifiers(self) -> Modifiers {
        Modifiers::from_bits_truncate(self.0)
    }

    /// This key with extra modifiers added.
    #[inline]
    #[must_use]
    pub const fn with(self, modifiers: Modifiers) -> Self {
        Self(self.0 | modifiers.bits())
    }

    /// This key with all modifiers cleared.
    #[inline]
    #[must_use]
    pub const fn without_modifiers(self) -> Self {
        Self(self.0 & CODE_MASK)
    }

    /// The character this key types, if it is a printable character key
    /// with no Ctrl/Alt. Shifted letters come back uppercase.
    #[must_use]
    pub fn printable(self) -> Option<char> {
        let mods = self.modifiers();
        if mods.intersects(Modifiers::CTRL | Modifiers::ALT) {
            return None;
        }
        match self.code() {
            KeyCode::Char(ch) if !ch.is_control() => {
                if mods.contains(Modifiers::SHIFT) {
                    ch.to_uppercase().next()
                } else {
                    Some(ch)
                }
            }
            _ => None,
        }
    }
}

impl From<KeyCode> for Key {
    fn from(code: KeyCode) -> Self {
        Self::plain(code)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self})")
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mods = self.modifiers();
        if mods.contains(Modifiers::CTRL) {
            f.write_str("Ctrl+")?;
        }
        if mods.contains(Modifiers::ALT) {
            f.write_str("Alt+")?;
        }
        if mods.contains(Modifiers::SHIFT) {
            f.write_str("Shift+")?;
        }
        write!(f, "{}", self.code())
    }
}

// ─── KeyEvent ───────────────────────────────────────────────────────────────

/// Key transition. Terminals only report `Down`; the Windows console
/// also reports releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum KeyPhase {
    #[default]
    Down,
    Up,
}

/// A canonical keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub key: Key,
    pub phase: KeyPhase,
}

impl KeyEvent {
    /// A key press.
    #[inline]
    #[must_use]
    pub const fn down(key: Key) -> Self {
        Self {
            key,
            phase: KeyPhase::Down,
        }
    }

    /// A key release.
    #[inline]
    #[must_use]
    pub const fn up(key: Key) -> Self {
        Self {
            key,
            phase: KeyPhase::Up,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
