// SPDX-License-Identifier: MIT
//
// Driver configuration.
//
// Every field has a default, so an empty TOML file (or none at all) is a
// valid configuration. Fields that override platform detection are
// `Option`s: `None` means "decide from the platform".

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::ansi::MouseMode;
use crate::backend::BackendKind;
use crate::error::Result;

/// Which backend the driver should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Windows console on Windows, the direct ANSI backend elsewhere.
    #[default]
    Auto,
    Curses,
    Net,
    Windows,
    Null,
}

impl BackendChoice {
    /// The concrete backend this choice resolves to on this platform.
    #[must_use]
    pub const fn resolve(self) -> BackendKind {
        match self {
            Self::Auto => {
                if cfg!(windows) {
                    BackendKind::Windows
                } else {
                    BackendKind::Net
                }
            }
            Self::Curses => BackendKind::Curses,
            Self::Net => BackendKind::Net,
            Self::Windows => BackendKind::Windows,
            Self::Null => BackendKind::Null,
        }
    }
}

/// Mouse reporting granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseSetting {
    Off,
    Click,
    #[default]
    Drag,
    Motion,
}

impl MouseSetting {
    /// Tracking mode to enable, `None` when mouse input is off.
    #[must_use]
    pub const fn mode(self) -> Option<MouseMode> {
        match self {
            Self::Off => None,
            Self::Click => Some(MouseMode::Click),
            Self::Drag => Some(MouseMode::Drag),
            Self::Motion => Some(MouseMode::Motion),
        }
    }
}

/// Everything the driver can be told at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    pub backend: BackendChoice,
    /// Draw on the alternate screen and restore the shell's screen at exit.
    pub alternate_screen: bool,
    pub mouse: MouseSetting,
    /// Longest time `events_pending` waits with nothing scheduled.
    pub poll_interval_ms: u64,
    /// How long a lone ESC waits for the rest of a sequence before it is
    /// taken as the Escape key.
    pub escape_timeout_ms: u64,
    /// Interval of the resize sampler.
    pub resize_sample_ms: u64,
    /// Force the resize sampler on or off. Defaults to on for the Windows
    /// console and off where the OS signals resizes.
    pub sample_resize: Option<bool>,
    /// Drawn in place of characters the terminal cannot render.
    pub placeholder: char,
    /// Override 24-bit color detection.
    pub true_color: Option<bool>,
    /// Open the headless backend when no console is attached instead of
    /// failing with `Error::NoConsole`.
    pub fallback_to_null: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Auto,
            alternate_screen: true,
            mouse: MouseSetting::Drag,
            poll_interval_ms: 50,
            escape_timeout_ms: 50,
            resize_sample_ms: 100,
            sample_resize: None,
            placeholder: '\u{FFFD}',
            true_color: None,
            fallback_to_null: true,
        }
    }
}

/// Zero would make the pollers spin.
const fn millis_at_least_one(ms: u64) -> Duration {
    Duration::from_millis(if ms == 0 { 1 } else { ms })
}

impl DriverConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for malformed TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file exists but cannot be read, and
    /// `Error::Config` if it does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        millis_at_least_one(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn escape_timeout(&self) -> Duration {
        millis_at_least_one(self.escape_timeout_ms)
    }

    #[must_use]
    pub const fn resize_sample_interval(&self) -> Duration {
        millis_at_least_one(self.resize_sample_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(DriverConfig::from_toml_str("").unwrap(), DriverConfig::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = DriverConfig::from_toml_str(
            r#"
            backend = "curses"
            mouse = "off"
            escape_timeout_ms = 25
            placeholder = "?"
            sample_resize = true
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendChoice::Curses);
        assert_eq!(config.mouse.mode(), None);
        assert_eq!(config.escape_timeout(), Duration::from_millis(25));
        assert_eq!(config.placeholder, '?');
        assert_eq!(config.sample_resize, Some(true));
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert!(config.alternate_screen);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = DriverConfig::from_toml_str("colour = true").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn bad_backend_name_is_rejected() {
        assert!(DriverConfig::from_toml_str("backend = \"ncurses\"").is_err());
    }

    #[test]
    fn auto_resolves_per_platform() {
        let kind = BackendChoice::Auto.resolve();
        if cfg!(windows) {
            assert_eq!(kind, BackendKind::Windows);
        } else {
            assert_eq!(kind, BackendKind::Net);
        }
        assert_eq!(BackendChoice::Null.resolve(), BackendKind::Null);
    }

    #[test]
    fn zero_intervals_become_one_millisecond() {
        let config = DriverConfig::from_toml_str(
            "poll_interval_ms = 0\nescape_timeout_ms = 0\nresize_sample_ms = 0",
        )
        .unwrap();
        let ms = Duration::from_millis(1);
        assert_eq!(config.poll_interval(), ms);
        assert_eq!(config.escape_timeout(), ms);
        assert_eq!(config.resize_sample_interval(), ms);
    }

    #[test]
    fn missing_file_is_default() {
        let path = Path::new("/nonexistent/conio/config.toml");
        assert_eq!(DriverConfig::load(path).unwrap(), DriverConfig::default());
    }
}
