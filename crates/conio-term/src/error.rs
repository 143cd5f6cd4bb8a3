// SPDX-License-Identifier: MIT
//
// Error type for the console core.
//
// Only initialization and configuration can fail loudly. Everything that
// happens mid-session (write failures, reader hiccups, malformed escape
// sequences) is logged and absorbed where it occurs, so the widget layer
// never sees a transient terminal problem as an error.

use std::io;

use crate::backend::BackendKind;

/// Errors surfaced by `conio-term`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A backend could not acquire its console or switch modes.
    ///
    /// Fatal for that backend only: the caller may pick another one.
    #[error("failed to initialize the {backend} backend: {source}")]
    Init {
        backend: BackendKind,
        #[source]
        source: io::Error,
    },

    /// No interactive console is attached and the stub was not allowed.
    #[error("no console is attached to this process")]
    NoConsole,

    /// The requested backend does not exist on this platform.
    #[error("the {0} backend is not available on this platform")]
    Unsupported(BackendKind),

    /// Plain I/O failure outside of the frame loop.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A Win32 console call failed outside of initialization.
    #[cfg(windows)]
    #[error(transparent)]
    Windows(#[from] windows::core::Error),

    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Wrap an I/O error as an initialization failure of `backend`.
    #[must_use]
    pub const fn init(backend: BackendKind, source: io::Error) -> Self {
        Self::Init { backend, source }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
