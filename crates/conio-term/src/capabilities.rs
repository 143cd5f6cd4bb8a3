// SPDX-License-Identifier: MIT
//
// Terminal capabilities, computed once per session.
//
// Two questions decide how cells are rendered: can the terminal show
// 24-bit color, and can it be trusted with characters outside the Basic
// Multilingual Plane? Both are answered from the environment at startup
// and the answer travels down explicitly to the screen buffer. Nothing
// re-reads the environment later.
//
//   true color  COLORTERM=truecolor|24bit, or Windows Terminal (WT_SESSION)
//   non-BMP     always on Unix; on Windows only inside Windows Terminal,
//               the classic console host draws them as two boxes

#![allow(unsafe_code)]

/// Host platform family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    /// The platform this binary was built for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Unix }
    }
}

/// What the attached terminal can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// 24-bit RGB colors render as such. When false, RGB colors are
    /// downgraded to the nearest 256-palette entry before rendering.
    pub true_color: bool,
    /// Characters above U+FFFF render reliably. When false they are
    /// replaced by the placeholder.
    pub non_bmp: bool,
    /// An interactive console is attached to stdin/stdout.
    pub console_attached: bool,
    pub platform: Platform,
}

impl Capabilities {
    /// Derive capabilities from environment variables.
    ///
    /// `lookup` stands in for `std::env::var` so detection is testable.
    #[must_use]
    pub fn from_env(
        lookup: impl Fn(&str) -> Option<String>,
        platform: Platform,
        console_attached: bool,
    ) -> Self {
        let windows_terminal = lookup("WT_SESSION").is_some_and(|v| !v.is_empty());
        let colorterm = lookup("COLORTERM").unwrap_or_default().to_ascii_lowercase();
        let true_color = windows_terminal || colorterm == "truecolor" || colorterm == "24bit";
        let non_bmp = match platform {
            Platform::Unix => true,
            Platform::Windows => windows_terminal,
        };
        Self {
            true_color,
            non_bmp,
            console_attached,
            platform,
        }
    }

    /// Detect from the real process environment.
    #[must_use]
    pub fn detect() -> Self {
        Self::from_env(
            |name| std::env::var(name).ok(),
            Platform::current(),
            console_attached(),
        )
    }

    /// Capabilities of a headless session: no console, everything renders.
    #[must_use]
    pub const fn headless() -> Self {
        Self {
            true_color: true,
            non_bmp: true,
            console_attached: false,
            platform: Platform::current(),
        }
    }
}

/// Whether stdin and stdout are both an interactive console.
#[cfg(unix)]
#[must_use]
pub fn console_attached() -> bool {
    // SAFETY: isatty only inspects the descriptor.
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 && libc::isatty(libc::STDOUT_FILENO) != 0 }
}

/// Whether stdin and stdout are both an interactive console.
#[cfg(windows)]
#[must_use]
pub fn console_attached() -> bool {
    use windows::Win32::System::Console::{
        CONSOLE_MODE, GetConsoleMode, GetStdHandle, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
    };

    [STD_INPUT_HANDLE, STD_OUTPUT_HANDLE].into_iter().all(|which| {
        // SAFETY: GetStdHandle/GetConsoleMode only query process state; a
        // redirected or missing handle makes GetConsoleMode fail.
        unsafe {
            let Ok(handle) = GetStdHandle(which) else {
                return false;
            };
            let mut mode = CONSOLE_MODE::default();
            GetConsoleMode(handle, &raw mut mode).is_ok()
        }
    })
}

#[cfg(not(any(unix, windows)))]
#[must_use]
pub fn console_attached() -> bool {
    false
}

// ─── Tests ──────────────────────────────────────────────────────────────────
