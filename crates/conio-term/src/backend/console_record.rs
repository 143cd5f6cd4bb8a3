// SPDX-License-Identifier: MIT
//
// Win32 console input records, modelled without the Win32 API.
//
// `ReadConsoleInputW` hands us one `INPUT_RECORD` at a time. The Windows
// backend copies each one into the plain structs below, and the
// `RecordMapper` folds them into canonical frames. Keeping the mapping free
// of Win32 types means every platform builds and tests it.
//
// The mapping carries the console's quirks:
//
//   - `VK_PACKET` records (injected text, IME output) carry only a UTF-16
//     unit. Characters outside the BMP come as two records, high then low
//     surrogate, and are joined here.
//   - AltGr arrives as Right Alt + Left Ctrl. When it produced a printable
//     character, that character is the key; the modifiers are dropped.
//   - When the console reports no character (Ctrl+Alt+letter, say), the
//     letter is rebuilt from the virtual key, with Caps Lock inverting
//     the Shift decision.
//   - Mouse records report the full button state, not transitions. The
//     mapper diffs against the previous state to find presses and
//     releases.

use bitflags::bitflags;
use tracing::trace;

use crate::ansi::MouseMode;
use crate::key::{Key, KeyCode, KeyEvent, KeyPhase, Modifiers};
use crate::keymap::{self, WINDOWS_VK};
use crate::mouse::{MouseButton, MouseEvent, MouseFlags};

use super::Size;
use crate::event_loop::RawInputFrame;

/// Virtual key of records that carry a bare UTF-16 unit.
pub const VK_PACKET: u16 = 0xE7;

bitflags! {
    /// `dwControlKeyState`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ControlKeyState: u32 {
        const RIGHT_ALT_PRESSED  = 0x0001;
        const LEFT_ALT_PRESSED   = 0x0002;
        const RIGHT_CTRL_PRESSED = 0x0004;
        const LEFT_CTRL_PRESSED  = 0x0008;
        const SHIFT_PRESSED      = 0x0010;
        const NUMLOCK_ON         = 0x0020;
        const SCROLLLOCK_ON      = 0x0040;
        const CAPSLOCK_ON        = 0x0080;
        const ENHANCED_KEY       = 0x0100;
    }
}

impl ControlKeyState {
    const ALT: Self = Self::RIGHT_ALT_PRESSED.union(Self::LEFT_ALT_PRESSED);
    const CTRL: Self = Self::RIGHT_CTRL_PRESSED.union(Self::LEFT_CTRL_PRESSED);

    /// Shift, Ctrl and Alt as canonical modifiers.
    #[must_use]
    pub fn modifiers(self) -> Modifiers {
        let mut mods = Modifiers::empty();
        if self.contains(Self::SHIFT_PRESSED) {
            mods |= Modifiers::SHIFT;
        }
        if self.intersects(Self::CTRL) {
            mods |= Modifiers::CTRL;
        }
        if self.intersects(Self::ALT) {
            mods |= Modifiers::ALT;
        }
        mods
    }

    /// AltGr: the console reports it as Right Alt plus Left Ctrl.
    #[must_use]
    pub const fn is_altgr(self) -> bool {
        self.contains(Self::RIGHT_ALT_PRESSED.union(Self::LEFT_CTRL_PRESSED))
    }
}

/// `dwButtonState` bits for the four buttons of the canonical model.
const BUTTON_BITS: [(u32, MouseButton); 4] = [
    (0x0001, MouseButton::Button1), // FROM_LEFT_1ST_BUTTON_PRESSED
    (0x0004, MouseButton::Button2), // FROM_LEFT_2ND_BUTTON_PRESSED
    (0x0002, MouseButton::Button3), // RIGHTMOST_BUTTON_PRESSED
    (0x0008, MouseButton::Button4), // FROM_LEFT_3RD_BUTTON_PRESSED
];

const BUTTON_MASK: u32 = 0x000F;

/// `dwEventFlags`.
pub const MOUSE_MOVED: u32 = 0x0001;
pub const DOUBLE_CLICK: u32 = 0x0002;
pub const MOUSE_WHEELED: u32 = 0x0004;
pub const MOUSE_HWHEELED: u32 = 0x0008;

// ─── Records ────────────────────────────────────────────────────────────────

/// `KEY_EVENT_RECORD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyRecord {
    pub key_down: bool,
    pub repeat_count: u16,
    pub virtual_key: u16,
    pub scan_code: u16,
    /// UTF-16 unit the key produced, 0 for none.
    pub unicode: u16,
    pub control: ControlKeyState,
}

/// `MOUSE_EVENT_RECORD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseRecord {
    pub x: i16,
    pub y: i16,
    /// Button bits in the low word, signed wheel delta in the high word.
    pub buttons: u32,
    pub control: ControlKeyState,
    pub event_flags: u32,
}

/// One console input record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRecord {
    Key(KeyRecord),
    Mouse(MouseRecord),
    /// `WINDOW_BUFFER_SIZE_EVENT`: the screen buffer, not the window.
    BufferSize(Size),
    Focus(bool),
    Menu(u32),
}

// ─── RecordMapper ───────────────────────────────────────────────────────────

/// Virtual keys that only change modifier state.
fn is_modifier_vk(vk: u16) -> bool {
    matches!(vk, 0x10..=0x12 | 0x14 | 0x5B | 0x5C | 0x90 | 0x91 | 0xA0..=0xA5)
}

/// The character a letter, digit or space virtual key stands for.
fn char_from_vk(vk: u16, upper: bool) -> Option<char> {
    let ch = char::from_u32(u32::from(vk))?;
    match ch {
        'A'..='Z' if upper => Some(ch),
        'A'..='Z' => Some(ch.to_ascii_lowercase()),
        '0'..='9' | ' ' => Some(ch),
        _ => None,
    }
}

/// Put back the Shift that folding dropped when no glyph carries it: a
/// space, or a digit rebuilt from the virtual key because the console
/// reported no character.
fn restore_shift(key: Key, mods: Modifiers, reported: bool) -> Key {
    let KeyCode::Char(c) = key.code() else {
        return key;
    };
    let glyphless = c == ' ' || (!reported && !c.is_alphabetic());
    if glyphless && mods.contains(Modifiers::SHIFT) {
        Key::new(key.code(), key.modifiers() | Modifiers::SHIFT)
    } else {
        key
    }
}

/// Stateful record → frame mapping.
#[derive(Debug, Default)]
pub struct RecordMapper {
    /// Pending high surrogate, per key phase: a pair's down and up
    /// records interleave.
    high_surrogate: [Option<u16>; 2],
    buttons: u32,
}

impl RecordMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map one record. `None` for records that complete no event.
    pub fn map(&mut self, record: &InputRecord) -> Option<RawInputFrame> {
        match record {
            InputRecord::Key(key) => self.map_key(key).map(RawInputFrame::Key),
            InputRecord::Mouse(mouse) => self.map_mouse(mouse).map(RawInputFrame::Mouse),
            other => {
                trace!(record = ?other, "ignoring console record");
                None
            }
        }
    }

    /// Map a key record.
    pub fn map_key(&mut self, rec: &KeyRecord) -> Option<KeyEvent> {
        let phase = if rec.key_down { KeyPhase::Down } else { KeyPhase::Up };
        let event = |key: Key| match phase {
            KeyPhase::Down => KeyEvent::down(key),
            KeyPhase::Up => KeyEvent::up(key),
        };

        if rec.virtual_key == VK_PACKET || (0xD800..=0xDFFF).contains(&rec.unicode) {
            return self.map_unit(rec.unicode, phase).map(event);
        }
        if is_modifier_vk(rec.virtual_key) {
            return None;
        }

        let mut mods = rec.control.modifiers();
        let ch = char::from_u32(u32::from(rec.unicode)).filter(|&c| c != '\0');
        if rec.control.is_altgr() && ch.is_some_and(|c| !c.is_control()) {
            mods -= Modifiers::CTRL | Modifiers::ALT;
        }
        let printable = ch.or_else(|| {
            let shift = rec.control.contains(ControlKeyState::SHIFT_PRESSED);
            let caps = rec.control.contains(ControlKeyState::CAPSLOCK_ON);
            char_from_vk(rec.virtual_key, shift ^ caps)
        });

        WINDOWS_VK
            .map(rec.virtual_key, mods, printable)
            .map(|key| restore_shift(key, mods, ch.is_some()))
            .map(event)
    }

    /// A bare UTF-16 unit, joining surrogate pairs.
    fn map_unit(&mut self, unit: u16, phase: KeyPhase) -> Option<Key> {
        let slot = &mut self.high_surrogate[usize::from(phase == KeyPhase::Up)];
        let ch = match unit {
            0xD800..=0xDBFF => {
                *slot = Some(unit);
                return None;
            }
            0xDC00..=0xDFFF => {
                let high = slot.take()?;
                char::decode_utf16([high, unit]).next()?.ok()?
            }
            _ => {
                *slot = None;
                char::from_u32(u32::from(unit))?
            }
        };
        keymap::fold_char(ch, Modifiers::empty())
    }

    /// Map a mouse record.
    pub fn map_mouse(&mut self, rec: &MouseRecord) -> Option<MouseEvent> {
        let mut flags = MouseFlags::empty();

        if rec.event_flags & (MOUSE_WHEELED | MOUSE_HWHEELED) != 0 {
            // The high word is a signed delta.
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let delta = (rec.buttons >> 16) as u16 as i16;
            flags |= match (rec.event_flags & MOUSE_HWHEELED != 0, delta > 0) {
                (false, true) => MouseFlags::WHEELED_UP,
                (false, false) => MouseFlags::WHEELED_DOWN,
                (true, true) => MouseFlags::WHEELED_RIGHT,
                (true, false) => MouseFlags::WHEELED_LEFT,
            };
        } else {
            let now = rec.buttons & BUTTON_MASK;
            let pressed = now & !self.buttons;
            let released = self.buttons & !now;
            self.buttons = now;

            for (bit, button) in BUTTON_BITS {
                if pressed & bit != 0 {
                    flags |= button.pressed() | MouseFlags::REPORT_MOUSE_POSITION;
                } else if released & bit != 0 {
                    flags |= button.released();
                } else if now & bit != 0 && rec.event_flags & MOUSE_MOVED != 0 {
                    flags |= button.pressed() | MouseFlags::REPORT_MOUSE_POSITION;
                }
            }
            if flags.is_empty() && rec.event_flags & MOUSE_MOVED != 0 {
                flags = MouseFlags::REPORT_MOUSE_POSITION;
            }
            if flags.is_empty() {
                return None;
            }
        }

        let mods = rec.control.modifiers();
        if mods.contains(Modifiers::SHIFT) {
            flags |= MouseFlags::SHIFT;
        }
        if mods.contains(Modifiers::CTRL) {
            flags |= MouseFlags::CTRL;
        }
        if mods.contains(Modifiers::ALT) {
            flags |= MouseFlags::ALT;
        }

        let x = u16::try_from(rec.x.max(0)).unwrap_or(0);
        let y = u16::try_from(rec.y.max(0)).unwrap_or(0);
        Some(MouseEvent::new(x, y, flags))
    }
}

/// Whether a mouse record belongs to the tracking `mode` asked for. The
/// console reports all motion once mouse input is on.
#[must_use]
pub const fn mouse_wanted(rec: &MouseRecord, mode: MouseMode) -> bool {
    if rec.event_flags & MOUSE_MOVED == 0 {
        return true;
    }
    match mode {
        MouseMode::Click => false,
        MouseMode::Drag => rec.buttons & BUTTON_MASK != 0,
        MouseMode::Motion => true,
    }
}

// ─── Encoding ───────────────────────────────────────────────────────────────

/// The key-down record the console produces for `key`.
///
/// `None` for keys no single record expresses.
#[must_use]
pub fn encode_key(key: Key) -> Option<KeyRecord> {
    let mods = key.modifiers();
    let mut control = ControlKeyState::empty();
    if mods.contains(Modifiers::SHIFT) {
        control |= ControlKeyState::SHIFT_PRESSED;
    }
    if mods.contains(Modifiers::CTRL) {
        control |= ControlKeyState::LEFT_CTRL_PRESSED;
    }
    if mods.contains(Modifiers::ALT) {
        control |= ControlKeyState::LEFT_ALT_PRESSED;
    }

    let (virtual_key, unicode) = match key.code() {
        KeyCode::Char(ch) => encode_char(ch, mods)?,
        code => (WINDOWS_VK.reverse(code, Modifiers::empty())?, 0),
    };
    Some(KeyRecord {
        key_down: true,
        repeat_count: 1,
        virtual_key,
        scan_code: 0,
        unicode,
        control,
    })
}

fn encode_char(ch: char, mods: Modifiers) -> Option<(u16, u16)> {
    let ctrl = mods.contains(Modifiers::CTRL);
    let alt = mods.contains(Modifiers::ALT);
    let shift = mods.contains(Modifiers::SHIFT);

    if ch.is_ascii_lowercase() {
        let vk = u16::try_from(u32::from(ch.to_ascii_uppercase())).ok()?;
        let unicode = match (ctrl, alt) {
            (true, true) => 0,
            (true, false) => vk - u16::from(b'A') + 1,
            _ if shift => vk,
            _ => vk + 0x20,
        };
        return Some((vk, unicode));
    }
    // Ctrl or Shift on a digit, and Ctrl on space, leave the console
    // with no character to report.
    if ch == ' ' {
        return Some((0x20, if ctrl { 0 } else { 0x20 }));
    }
    if ch.is_ascii_digit() && (ctrl || shift) {
        let vk = u16::try_from(u32::from(ch)).ok()?;
        return Some((vk, 0));
    }

    let mut units = [0u16; 2];
    match ch.encode_utf16(&mut units) {
        [unit] => Some((0, *unit)),
        _ => None,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
