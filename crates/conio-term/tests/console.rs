// SPDX-License-Identifier: MIT
//
// End-to-end properties of the console core, through the public API only.

use std::time::{Duration, Instant};

use conio_term::ansi;
use conio_term::backend::console_record::{self, RecordMapper};
use conio_term::backend::curses;
use conio_term::backend::{NullBackend, NullHandle};
use conio_term::config::BackendChoice;
use conio_term::decoder::{Decoded, Decoder};
use conio_term::keymap::{self, WINDOWS_VK};
use conio_term::resize::ResizeDebouncer;
use conio_term::screen::ScreenBuffer;
use conio_term::{
    Action, App, Attribute, Capabilities, Color, ConsoleDriver, DriverConfig, Key, KeyCode,
    KeyEvent, Modifiers, MouseEvent, MouseFlags, RawInputFrame, Size,
};
use pretty_assertions::assert_eq;

// ─── Helpers ────────────────────────────────────────────────────────────────

const MODIFIER_SETS: [Modifiers; 8] = [
    Modifiers::empty(),
    Modifiers::SHIFT,
    Modifiers::ALT,
    Modifiers::SHIFT.union(Modifiers::ALT),
    Modifiers::CTRL,
    Modifiers::SHIFT.union(Modifiers::CTRL),
    Modifiers::ALT.union(Modifiers::CTRL),
    Modifiers::SHIFT.union(Modifiers::ALT).union(Modifiers::CTRL),
];

fn crossterm_modifiers(mods: Modifiers) -> crossterm::event::KeyModifiers {
    use crossterm::event::KeyModifiers as Km;
    let mut out = Km::NONE;
    if mods.contains(Modifiers::SHIFT) {
        out |= Km::SHIFT;
    }
    if mods.contains(Modifiers::CTRL) {
        out |= Km::CONTROL;
    }
    if mods.contains(Modifiers::ALT) {
        out |= Km::ALT;
    }
    out
}

fn special_keys() -> Vec<KeyCode> {
    let mut codes = vec![
        KeyCode::Up,
        KeyCode::Down,
        KeyCode::Left,
        KeyCode::Right,
        KeyCode::Home,
        KeyCode::End,
        KeyCode::Insert,
        KeyCode::Delete,
        KeyCode::PageUp,
        KeyCode::PageDown,
    ];
    codes.extend((1..=20).map(KeyCode::F));
    codes
}

fn null_driver(size: Size) -> (ConsoleDriver, NullHandle) {
    let backend = NullBackend::new(size);
    let handle = backend.handle();
    let config = DriverConfig {
        backend: BackendChoice::Null,
        ..DriverConfig::default()
    };
    let driver =
        ConsoleDriver::with_capabilities(Box::new(backend), &config, Capabilities::headless())
            .unwrap();
    (driver, handle)
}

// ─── Backend tables ─────────────────────────────────────────────────────────

#[test]
fn xterm_sequences_round_trip() {
    for code in special_keys() {
        for mods in MODIFIER_SETS {
            let key = Key::new(code, mods);
            let bytes = ansi::encode_key(key).unwrap();
            assert_eq!(Decoder::new().advance(&bytes), vec![Decoded::Key(key)], "{key}");
        }
    }
}

#[test]
fn xterm_characters_round_trip() {
    let keys = [
        Key::plain(KeyCode::Char('a')),
        Key::new(KeyCode::Char('a'), Modifiers::SHIFT),
        Key::new(KeyCode::Char('x'), Modifiers::CTRL),
        Key::new(KeyCode::Char('x'), Modifiers::ALT),
        Key::new(KeyCode::Char(' '), Modifiers::CTRL),
        Key::plain(KeyCode::Char('ß')),
        Key::plain(KeyCode::Enter),
        Key::plain(KeyCode::Tab),
        Key::new(KeyCode::Tab, Modifiers::SHIFT),
        Key::plain(KeyCode::Backspace),
    ];
    for key in keys {
        let bytes = ansi::encode_key(key).unwrap();
        assert_eq!(Decoder::new().advance(&bytes), vec![Decoded::Key(key)], "{key}");
    }
}

#[test]
fn windows_records_round_trip() {
    let mut mapper = RecordMapper::new();
    for &(_, code, implied) in WINDOWS_VK.entries() {
        for mods in MODIFIER_SETS {
            let key = Key::new(code, implied | mods);
            let record = console_record::encode_key(key).unwrap();
            assert_eq!(mapper.map_key(&record), Some(KeyEvent::down(key)), "{key}");
        }
    }
    for ch in ['a', 'z', '1', '0', ' '] {
        for mods in MODIFIER_SETS {
            let key = Key::new(KeyCode::Char(ch), mods);
            let record = console_record::encode_key(key).unwrap();
            assert_eq!(mapper.map_key(&record), Some(KeyEvent::down(key)), "{key}");
        }
    }
}

#[test]
fn curses_table_round_trip() {
    use crossterm::event::{KeyEvent as CtEvent, KeyEventKind, KeyEventState};

    for &(native, code, implied) in keymap::CURSES.entries() {
        for mods in MODIFIER_SETS {
            let event = CtEvent {
                code: native,
                modifiers: crossterm_modifiers(mods),
                kind: KeyEventKind::Press,
                state: KeyEventState::NONE,
            };
            assert_eq!(
                curses::map_key(&event),
                Some(KeyEvent::down(Key::new(code, implied | mods))),
                "{native:?} {mods:?}"
            );
        }
    }
}

// ─── Decoder ────────────────────────────────────────────────────────────────

#[test]
fn modifier_table() {
    let mut d = Decoder::new();
    assert_eq!(d.advance(b"\x1b[A"), vec![Decoded::Key(Key::plain(KeyCode::Up))]);
    assert_eq!(
        d.advance(b"\x1b[1;5A"),
        vec![Decoded::Key(Key::new(KeyCode::Up, Modifiers::CTRL))]
    );
}

#[test]
fn every_split_point_decodes_the_same() {
    let input: &[u8] = "a\x1b[1;5A\x1b[<0;11;4M\x1b[3~é\x1bx\x1bOP\x1b[?1;2c\x1b[<0;11;4mz".as_bytes();
    let whole = Decoder::new().advance(input);
    assert_eq!(whole.len(), 10);

    for split in 0..=input.len() {
        let mut d = Decoder::new();
        let mut out = d.advance(&input[..split]);
        out.extend(d.advance(&input[split..]));
        assert_eq!(out, whole, "split at {split}");
        assert!(!d.has_pending());
    }
}

#[test]
fn byte_at_a_time_decodes_the_same() {
    let input = b"\x1b[1;6D\x1b[<2;1;1M\x1b\x1b";
    let whole = Decoder::new().advance(input);
    let mut d = Decoder::new();
    let fed: Vec<Decoded> = input
        .iter()
        .map(|&b| d.feed(b))
        .filter(|r| !matches!(r, Decoded::Incomplete | Decoded::Unrecognized))
        .collect();
    assert_eq!(fed, whole);
}

#[test]
fn sgr_mouse_round_trip() {
    let press = MouseEvent::new(
        10,
        3,
        MouseFlags::BUTTON1_PRESSED | MouseFlags::REPORT_MOUSE_POSITION,
    );
    let mut wire = Vec::new();
    ansi::sgr_mouse(&mut wire, &press).unwrap();
    assert_eq!(wire, b"\x1b[<0;11;4M");
    assert_eq!(Decoder::new().advance(&wire), vec![Decoded::Mouse(press)]);
}

// ─── Rendering ──────────────────────────────────────────────────────────────

#[test]
fn render_is_idempotent() {
    let mut screen = ScreenBuffer::new(Size::new(8, 2), Capabilities::headless(), '?');
    let red = Attribute::new(Color::RED, Color::Default, 0);
    for (col, ch) in "hello".chars().enumerate() {
        screen.set_cell(0, u16::try_from(col).unwrap(), ch, red);
    }

    let mut first = Vec::new();
    assert!(screen.render(&mut first, Some((1, 0))).unwrap() > 0);

    let mut second = Vec::new();
    assert_eq!(screen.render(&mut second, Some((1, 0))).unwrap(), 0);
    assert!(second.is_empty());

    // Repainting identical content changes nothing either.
    screen.set_cell(0, 0, 'h', red);
    let mut third = Vec::new();
    assert_eq!(screen.render(&mut third, Some((1, 0))).unwrap(), 0);
}

#[test]
fn runs_coalesce_into_one_move_and_one_color() {
    let mut screen = ScreenBuffer::new(Size::new(6, 1), Capabilities::headless(), '?');
    screen.render(&mut Vec::new(), None).unwrap();

    let green = Attribute::new(Color::GREEN, Color::Default, 0);
    for col in 1..4 {
        screen.set_cell(0, col, 'x', green);
    }
    let mut out = Vec::new();
    screen.render(&mut out, None).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "\x1b[1;2H\x1b[32;49mxxx");
}

// ─── Resize ─────────────────────────────────────────────────────────────────

#[test]
fn resize_debounce_publishes_once() {
    let mut debouncer = ResizeDebouncer::new(Size::new(80, 24));
    let samples = [
        Size::new(81, 24),
        Size::new(82, 25),
        Size::new(83, 26),
        Size::new(90, 30),
        Size::new(90, 30),
    ];
    let published: Vec<Size> = samples
        .into_iter()
        .filter_map(|s| debouncer.sample(s))
        .collect();
    assert_eq!(published, vec![Size::new(90, 30)]);
}

// ─── Driver ─────────────────────────────────────────────────────────────────

struct Echo {
    keys: Vec<Key>,
}

impl App for Echo {
    fn on_key(&mut self, event: KeyEvent) -> Action {
        self.keys.push(event.key);
        if event.key == Key::plain(KeyCode::Char('q')) {
            Action::Quit
        } else {
            Action::Continue
        }
    }

    fn paint(&mut self, driver: &mut ConsoleDriver) {
        let attr = driver.make_attribute(Color::Default, Color::Default);
        driver.set_attribute(attr);
        driver.move_to(0, 0);
        driver.add_str(&self.keys.len().to_string());
        driver.set_cursor(Some((0, 1)));
    }
}

#[test]
fn driver_runs_until_quit() {
    let (mut driver, handle) = null_driver(Size::new(5, 1));
    for ch in ['a', 'b', 'q', 'z'] {
        handle.push(RawInputFrame::Key(KeyEvent::down(Key::plain(KeyCode::Char(ch)))));
    }

    let mut app = Echo { keys: Vec::new() };
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        driver.events_pending(Some(Duration::from_millis(10)));
        if driver.iteration(&mut app) == Action::Quit {
            break;
        }
    }
    assert_eq!(
        app.keys,
        vec![
            Key::plain(KeyCode::Char('a')),
            Key::plain(KeyCode::Char('b')),
            Key::plain(KeyCode::Char('q')),
        ]
    );

    let output = String::from_utf8(handle.take_output()).unwrap();
    assert!(output.starts_with("\x1b[1;1H\x1b[39;49m"), "{output:?}");
    assert!(output.contains("\x1b[?25h"), "{output:?}");
    driver.end().unwrap();
}

#[test]
fn timers_fire_from_the_loop() {
    use std::cell::Cell;
    use std::rc::Rc;

    let (mut driver, _handle) = null_driver(Size::new(5, 1));
    let fired = Rc::new(Cell::new(0));
    let counter = Rc::clone(&fired);
    driver.add_timeout(Duration::from_millis(1), move || {
        counter.set(counter.get() + 1);
        counter.get() < 3
    });

    struct Idle;
    impl App for Idle {
        fn paint(&mut self, _driver: &mut ConsoleDriver) {}
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while fired.get() < 3 && Instant::now() < deadline {
        driver.events_pending(None);
        driver.iteration(&mut Idle);
    }
    assert_eq!(fired.get(), 3);
}
