// SPDX-License-Identifier: MIT
//
// conio-term: console I/O core for conio.
//
// One canonical key/mouse event model and one cell grid, over several
// ways of reaching a console: a library-managed backend (crossterm), a
// direct ANSI backend over termios and our own escape decoder, the Win32
// console API, and a headless stub. The widget layer above only ever sees
// `ConsoleDriver`, `KeyEvent`, `MouseEvent` and `Size`.
//
// Rendering is differential: the screen buffer tracks dirty cells, and a
// refresh sends only those, coalesced into runs with redundant cursor
// moves and color changes skipped.

pub mod ansi;
pub mod backend;
pub mod capabilities;
pub mod cell;
pub mod clipboard;
pub mod color;
pub mod config;
pub mod decoder;
pub mod driver;
pub mod error;
pub mod event_loop;
pub mod key;
pub mod keymap;
pub mod mouse;
pub mod output;
pub mod reader;
pub mod resize;
pub mod screen;

pub use backend::{Backend, BackendKind, Size};
pub use capabilities::Capabilities;
pub use cell::{Attribute, Cell};
pub use color::Color;
pub use config::DriverConfig;
pub use driver::{Action, App, ConsoleDriver};
pub use error::{Error, Result};
pub use event_loop::{RawInputFrame, TerminalResponse};
pub use key::{Key, KeyCode, KeyEvent, KeyPhase, Modifiers};
pub use mouse::{MouseEvent, MouseFlags};
