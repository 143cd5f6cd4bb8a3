// SPDX-License-Identifier: MIT
//
// Canonical mouse model, SGR wire mapping, and click synthesis.
//
// A mouse event is a position plus one bitset. The bitset says what
// happened (press, release, click, double/triple click per button, wheel
// direction, plain motion) and which modifiers were held. Backends report
// presses, releases, motion and wheel; clicks are derived afterwards by
// the `ClickSynthesizer`, so every backend gets identical click timing.
//
// SGR reports (`ESC [ < Cb ; Cx ; Cy M|m`) are decoded here rather than in
// the decoder so that the encoder for the same mapping sits right next to
// it. Press reports always carry a position, so a press decodes to
// `BUTTONn_PRESSED | REPORT_MOUSE_POSITION`; motion with a button held
// decodes the same way, and motion with no button is position only.

use std::time::{Duration, Instant};

use bitflags::bitflags;

// ─── MouseFlags ─────────────────────────────────────────────────────────────

bitflags! {
    /// What a mouse event reports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct MouseFlags: u32 {
        const BUTTON1_PRESSED        = 1 << 0;
        const BUTTON1_RELEASED       = 1 << 1;
        const BUTTON1_CLICKED        = 1 << 2;
        const BUTTON1_DOUBLE_CLICKED = 1 << 3;
        const BUTTON1_TRIPLE_CLICKED = 1 << 4;
        const BUTTON2_PRESSED        = 1 << 5;
        const BUTTON2_RELEASED       = 1 << 6;
        const BUTTON2_CLICKED        = 1 << 7;
        const BUTTON2_DOUBLE_CLICKED = 1 << 8;
        const BUTTON2_TRIPLE_CLICKED = 1 << 9;
        const BUTTON3_PRESSED        = 1 << 10;
        const BUTTON3_RELEASED       = 1 << 11;
        const BUTTON3_CLICKED        = 1 << 12;
        const BUTTON3_DOUBLE_CLICKED = 1 << 13;
        const BUTTON3_TRIPLE_CLICKED = 1 << 14;
        const BUTTON4_PRESSED        = 1 << 15;
        const BUTTON4_RELEASED       = 1 << 16;
        const BUTTON4_CLICKED        = 1 << 17;
        const BUTTON4_DOUBLE_CLICKED = 1 << 18;
        const BUTTON4_TRIPLE_CLICKED = 1 << 19;
        const WHEELED_UP             = 1 << 20;
        const WHEELED_DOWN           = 1 << 21;
        const WHEELED_LEFT           = 1 << 22;
        const WHEELED_RIGHT          = 1 << 23;
        const REPORT_MOUSE_POSITION  = 1 << 24;
        const SHIFT                  = 1 << 25;
        const CTRL                   = 1 << 26;
        const ALT                    = 1 << 27;
    }
}

impl MouseFlags {
    /// The modifier subset.
    pub const MODIFIERS: Self = Self::SHIFT.union(Self::CTRL).union(Self::ALT);

    /// Every `*_PRESSED` flag.
    pub const ANY_PRESSED: Self = Self::BUTTON1_PRESSED
        .union(Self::BUTTON2_PRESSED)
        .union(Self::BUTTON3_PRESSED)
        .union(Self::BUTTON4_PRESSED);

    /// Every `*_RELEASED` flag.
    pub const ANY_RELEASED: Self = Self::BUTTON1_RELEASED
        .union(Self::BUTTON2_RELEASED)
        .union(Self::BUTTON3_RELEASED)
        .union(Self::BUTTON4_RELEASED);

    /// Every wheel flag.
    pub const ANY_WHEEL: Self = Self::WHEELED_UP
        .union(Self::WHEELED_DOWN)
        .union(Self::WHEELED_LEFT)
        .union(Self::WHEELED_RIGHT);
}

// ─── MouseButton ────────────────────────────────────────────────────────────

/// Button identity. Button 1 is the primary (left) button, 2 the middle,
/// 3 the secondary (right), 4 the first extra button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Button1,
    Button2,
    Button3,
    Button4,
}

impl MouseButton {
    pub const ALL: [Self; 4] = [Self::Button1, Self::Button2, Self::Button3, Self::Button4];

    const fn shift(self) -> u32 {
        match self {
            Self::Button1 => 0,
            Self::Button2 => 5,
            Self::Button3 => 10,
            Self::Button4 => 15,
        }
    }

    const fn flag(self, offset: u32) -> MouseFlags {
        MouseFlags::from_bits_truncate(1 << (self.shift() + offset))
    }

    #[must_use]
    pub const fn pressed(self) -> MouseFlags {
        self.flag(0)
    }

    #[must_use]
    pub const fn released(self) -> MouseFlags {
        self.flag(1)
    }

    #[must_use]
    pub const fn clicked(self) -> MouseFlags {
        self.flag(2)
    }

    #[must_use]
    pub const fn double_clicked(self) -> MouseFlags {
        self.flag(3)
    }

    #[must_use]
    pub const fn triple_clicked(self) -> MouseFlags {
        self.flag(4)
    }
}

// ─── MouseEvent ─────────────────────────────────────────────────────────────

/// A canonical mouse event. Coordinates are 0-based cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseEvent {
    pub x: u16,
    pub y: u16,
    pub flags: MouseFlags,
}

impl MouseEvent {
    #[inline]
    #[must_use]
    pub const fn new(x: u16, y: u16, flags: MouseFlags) -> Self {
        Self { x, y, flags }
    }
}

// ─── SGR mapping ────────────────────────────────────────────────────────────

const SGR_SHIFT: u16 = 4;
const SGR_ALT: u16 = 8;
const SGR_CTRL: u16 = 16;
const SGR_MOTION: u16 = 32;
const SGR_WHEEL: u16 = 64;
const SGR_EXTRA: u16 = 128;

/// Decode an SGR mouse report.
///
/// `cb` is the button byte, `cx`/`cy` the 1-based wire coordinates, and
/// `release` is true for the `m` terminator. Returns `None` for button
/// codes outside the canonical model.
#[must_use]
pub fn from_sgr(cb: u16, cx: u16, cy: u16, release: bool) -> Option<MouseEvent> {
    let mut flags = MouseFlags::empty();
    if cb & SGR_SHIFT != 0 {
        flags |= MouseFlags::SHIFT;
    }
    if cb & SGR_ALT != 0 {
        flags |= MouseFlags::ALT;
    }
    if cb & SGR_CTRL != 0 {
        flags |= MouseFlags::CTRL;
    }

    let base = cb & 3;
    let button = if cb & SGR_EXTRA != 0 {
        (base == 0).then_some(MouseButton::Button4)
    } else {
        match base {
            0 => Some(MouseButton::Button1),
            1 => Some(MouseButton::Button2),
            2 => Some(MouseButton::Button3),
            _ => None,
        }
    };

    if cb & SGR_WHEEL != 0 {
        flags |= match base {
            0 => MouseFlags::WHEELED_UP,
            1 => MouseFlags::WHEELED_DOWN,
            2 => MouseFlags::WHEELED_LEFT,
            _ => MouseFlags::WHEELED_RIGHT,
        };
    } else if cb & SGR_MOTION != 0 {
        flags |= MouseFlags::REPORT_MOUSE_POSITION;
        if let Some(button) = button {
            flags |= button.pressed();
        }
    } else {
        let button = button?;
        flags |= if release {
            button.released()
        } else {
            button.pressed() | MouseFlags::REPORT_MOUSE_POSITION
        };
    }

    Some(MouseEvent::new(
        cx.saturating_sub(1),
        cy.saturating_sub(1),
        flags,
    ))
}

/// Encode a mouse event as an SGR report: `(cb, cx, cy, release)`.
///
/// Inverse of [`from_sgr`] for the events it produces. Click flags have
/// no wire form and yield `None`.
#[must_use]
pub fn to_sgr(event: &MouseEvent) -> Option<(u16, u16, u16, bool)> {
    let flags = event.flags;
    let mut cb = 0;
    if flags.contains(MouseFlags::SHIFT) {
        cb |= SGR_SHIFT;
    }
    if flags.contains(MouseFlags::ALT) {
        cb |= SGR_ALT;
    }
    if flags.contains(MouseFlags::CTRL) {
        cb |= SGR_CTRL;
    }

    let button_bits = |button: MouseButton| match button {
        MouseButton::Button1 => 0,
        MouseButton::Button2 => 1,
        MouseButton::Button3 => 2,
        MouseButton::Button4 => SGR_EXTRA,
    };

    let mut release = false;
    if flags.intersects(MouseFlags::ANY_WHEEL) {
        cb |= SGR_WHEEL;
        cb |= if flags.contains(MouseFlags::WHEELED_UP) {
            0
        } else if flags.contains(MouseFlags::WHEELED_DOWN) {
            1
        } else if flags.contains(MouseFlags::WHEELED_LEFT) {
            2
        } else {
            3
        };
    } else if let Some(button) = MouseButton::ALL
        .into_iter()
        .find(|b| flags.contains(b.pressed()))
    {
        cb |= button_bits(button);
    } else if let Some(button) = MouseButton::ALL
        .into_iter()
        .find(|b| flags.contains(b.released()))
    {
        cb |= button_bits(button);
        release = true;
    } else if flags.contains(MouseFlags::REPORT_MOUSE_POSITION) {
        cb |= SGR_MOTION | 3;
    } else {
        return None;
    }

    Some((cb, event.x.saturating_add(1), event.y.saturating_add(1), release))
}

// ─── ClickSynthesizer ───────────────────────────────────────────────────────

/// Maximum delay between successive clicks of a double/triple click.
pub const MULTI_CLICK_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
struct ButtonState {
    /// Where the button went down, if it is currently held.
    pressed_at: Option<(u16, u16)>,
    /// Position, time, and count of the last completed click.
    last_click: Option<((u16, u16), Instant, u8)>,
}

impl ButtonState {
    const IDLE: Self = Self {
        pressed_at: None,
        last_click: None,
    };
}

/// Derives click, double-click, and triple-click events from press/release
/// pairs.
///
/// A release at the cell where the same button went down is a click. A
/// click within [`MULTI_CLICK_INTERVAL`] of the previous one at the same
/// cell upgrades to double, then triple; a fourth starts over.
#[derive(Debug, Clone)]
pub struct ClickSynthesizer {
    buttons: [ButtonState; 4],
    interval: Duration,
}

impl ClickSynthesizer {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_interval(MULTI_CLICK_INTERVAL)
    }

    #[must_use]
    pub const fn with_interval(interval: Duration) -> Self {
        Self {
            buttons: [ButtonState::IDLE; 4],
            interval,
        }
    }

    /// Feed one backend event. Returns the synthesized click event, if the
    /// event completes one. The input event itself is always delivered
    /// by the caller unchanged.
    pub fn process(&mut self, event: &MouseEvent, now: Instant) -> Option<MouseEvent> {
        let pos = (event.x, event.y);
        let mut clicks = MouseFlags::empty();

        for (idx, button) in MouseButton::ALL.into_iter().enumerate() {
            let state = &mut self.buttons[idx];
            let motion = event.flags.contains(MouseFlags::REPORT_MOUSE_POSITION);

            if event.flags.contains(button.pressed()) {
                if state.pressed_at.is_none() {
                    state.pressed_at = Some(pos);
                } else if motion && state.pressed_at != Some(pos) {
                    // Dragged away: whatever happens next is not a click.
                    state.pressed_at = Some((u16::MAX, u16::MAX));
                }
            } else if event.flags.contains(button.released()) {
                let Some(down) = state.pressed_at.take() else {
                    continue;
                };
                if down != pos {
                    state.last_click = None;
                    continue;
                }
                let count = match state.last_click {
                    Some((at, when, n))
                        if at == pos && now.duration_since(when) <= self.interval && n < 3 =>
                    {
                        n + 1
                    }
                    _ => 1,
                };
                state.last_click = Some((pos, now, count));
                clicks |= match count {
                    1 => button.clicked(),
                    2 => button.double_clicked(),
                    _ => button.triple_clicked(),
                };
            }
        }

        (!clicks.is_empty()).then(|| {
            MouseEvent::new(event.x, event.y, clicks | (event.flags & MouseFlags::MODIFIERS))
        })
    }
}

impl Default for ClickSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn button_flag_layout() {
        assert_eq!(MouseButton::Button1.pressed(), MouseFlags::BUTTON1_PRESSED);
        assert_eq!(MouseButton::Button2.released(), MouseFlags::BUTTON2_RELEASED);
        assert_eq!(MouseButton::Button3.clicked(), MouseFlags::BUTTON3_CLICKED);
        assert_eq!(
            MouseButton::Button4.double_clicked(),
            MouseFlags::BUTTON4_DOUBLE_CLICKED
        );
        assert_eq!(
            MouseButton::Button1.triple_clicked(),
            MouseFlags::BUTTON1_TRIPLE_CLICKED
        );
    }

    #[test]
    fn press_at_origin_of_wire_coordinates() {
        let ev = from_sgr(0, 11, 4, false).unwrap();
        assert_eq!(
            ev,
            MouseEvent::new(
                10,
                3,
                MouseFlags::BUTTON1_PRESSED | MouseFlags::REPORT_MOUSE_POSITION
            )
        );
    }

    #[test]
    fn release_is_lowercase_m() {
        let ev = from_sgr(2, 1, 1, true).unwrap();
        assert_eq!(ev.flags, MouseFlags::BUTTON3_RELEASED);
        assert_eq!((ev.x, ev.y), (0, 0));
    }

    #[test]
    fn wheel_directions() {
        assert_eq!(from_sgr(64, 1, 1, false).unwrap().flags, MouseFlags::WHEELED_UP);
        assert_eq!(from_sgr(65, 1, 1, false).unwrap().flags, MouseFlags::WHEELED_DOWN);
        assert_eq!(from_sgr(66, 1, 1, false).unwrap().flags, MouseFlags::WHEELED_LEFT);
        assert_eq!(from_sgr(67, 1, 1, false).unwrap().flags, MouseFlags::WHEELED_RIGHT);
    }

    #[test]
    fn motion_without_button_is_position_only() {
        let ev = from_sgr(35, 5, 6, false).unwrap();
        assert_eq!(ev.flags, MouseFlags::REPORT_MOUSE_POSITION);
    }

    #[test]
    fn modifiers_decode() {
        let ev = from_sgr(4 | 8 | 16, 1, 1, false).unwrap();
        assert!(ev.flags.contains(MouseFlags::SHIFT | MouseFlags::ALT | MouseFlags::CTRL));
    }

    #[test]
    fn extra_button_is_button4() {
        let ev = from_sgr(128, 2, 2, false).unwrap();
        assert!(ev.flags.contains(MouseFlags::BUTTON4_PRESSED));
    }

    #[test]
    fn unknown_button_code_is_rejected() {
        assert_eq!(from_sgr(3, 1, 1, false), None);
        assert_eq!(from_sgr(129, 1, 1, false), None);
    }

    #[test]
    fn encode_decode_round_trip() {
        let events = [
            MouseEvent::new(
                10,
                3,
                MouseFlags::BUTTON1_PRESSED | MouseFlags::REPORT_MOUSE_POSITION,
            ),
            MouseEvent::new(0, 0, MouseFlags::BUTTON2_RELEASED),
            MouseEvent::new(7, 9, MouseFlags::WHEELED_DOWN | MouseFlags::CTRL),
            MouseEvent::new(40, 2, MouseFlags::REPORT_MOUSE_POSITION),
            MouseEvent::new(
                1,
                1,
                MouseFlags::BUTTON3_PRESSED | MouseFlags::REPORT_MOUSE_POSITION | MouseFlags::SHIFT,
            ),
        ];
        for event in events {
            let (cb, cx, cy, release) = to_sgr(&event).unwrap();
            assert_eq!(from_sgr(cb, cx, cy, release), Some(event));
        }
    }

    #[test]
    fn button1_press_encodes_as_code_zero() {
        let event = MouseEvent::new(
            10,
            3,
            MouseFlags::BUTTON1_PRESSED | MouseFlags::REPORT_MOUSE_POSITION,
        );
        assert_eq!(to_sgr(&event), Some((0, 11, 4, false)));
    }

    #[test]
    fn clicks_have_no_wire_form() {
        let event = MouseEvent::new(1, 1, MouseFlags::BUTTON1_CLICKED);
        assert_eq!(to_sgr(&event), None);
    }

    // ── ClickSynthesizer ────────────────────────────────────────────────

    fn press(x: u16, y: u16) -> MouseEvent {
        MouseEvent::new(
            x,
            y,
            MouseFlags::BUTTON1_PRESSED | MouseFlags::REPORT_MOUSE_POSITION,
        )
    }

    fn release(x: u16, y: u16) -> MouseEvent {
        MouseEvent::new(x, y, MouseFlags::BUTTON1_RELEASED)
    }

    #[test]
    fn press_release_in_place_is_click() {
        let mut clicks = ClickSynthesizer::new();
        let t0 = Instant::now();
        assert_eq!(clicks.process(&press(3, 4), t0), None);
        let click = clicks.process(&release(3, 4), t0).unwrap();
        assert_eq!(click, MouseEvent::new(3, 4, MouseFlags::BUTTON1_CLICKED));
    }

    #[test]
    fn quick_repeats_escalate_to_triple() {
        let mut clicks = ClickSynthesizer::new();
        let t0 = Instant::now();
        let step = Duration::from_millis(100);
        let mut seen = Vec::new();
        for i in 0..4u32 {
            let now = t0 + step * i;
            clicks.process(&press(1, 1), now);
            seen.push(clicks.process(&release(1, 1), now).unwrap().flags);
        }
        assert_eq!(
            seen,
            vec![
                MouseFlags::BUTTON1_CLICKED,
                MouseFlags::BUTTON1_DOUBLE_CLICKED,
                MouseFlags::BUTTON1_TRIPLE_CLICKED,
                MouseFlags::BUTTON1_CLICKED,
            ]
        );
    }

    #[test]
    fn slow_repeat_is_single_click() {
        let mut clicks = ClickSynthesizer::new();
        let t0 = Instant::now();
        clicks.process(&press(1, 1), t0);
        clicks.process(&release(1, 1), t0);
        let later = t0 + Duration::from_secs(2);
        clicks.process(&press(1, 1), later);
        let click = clicks.process(&release(1, 1), later).unwrap();
        assert_eq!(click.flags, MouseFlags::BUTTON1_CLICKED);
    }

    #[test]
    fn release_elsewhere_is_not_click() {
        let mut clicks = ClickSynthesizer::new();
        let t0 = Instant::now();
        clicks.process(&press(1, 1), t0);
        assert_eq!(clicks.process(&release(5, 1), t0), None);
    }

    #[test]
    fn drag_and_return_is_not_click() {
        let mut clicks = ClickSynthesizer::new();
        let t0 = Instant::now();
        clicks.process(&press(1, 1), t0);
        clicks.process(&press(2, 1), t0);
        assert_eq!(clicks.process(&release(1, 1), t0), None);
    }

    #[test]
    fn release_without_press_is_ignored() {
        let mut clicks = ClickSynthesizer::new();
        assert_eq!(clicks.process(&release(1, 1), Instant::now()), None);
    }

    #[test]
    fn click_keeps_modifiers() {
        let mut clicks = ClickSynthesizer::new();
        let t0 = Instant::now();
        let mut down = press(0, 0);
        down.flags |= MouseFlags::CTRL;
        let mut up = release(0, 0);
        up.flags |= MouseFlags::CTRL;
        clicks.process(&down, t0);
        let click = clicks.process(&up, t0).unwrap();
        assert_eq!(click.flags, MouseFlags::BUTTON1_CLICKED | MouseFlags::CTRL);
    }
}
