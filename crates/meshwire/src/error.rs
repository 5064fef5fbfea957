// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type for discovery operations.

use std::fmt;
use std::io;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the discovery service.
///
/// Network conditions never fail a public engine call: send and receive
/// problems are logged and absorbed, and the protocol self-heals through
/// periodic re-announcement. The variants below therefore cover decoding,
/// caller misuse, and resource construction only.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Wire errors
    // ========================================================================
    /// A datagram or record could not be decoded: short buffer, truncated
    /// length-prefixed string, unknown message type or scope, or a wire
    /// version this build does not speak. Malformed input is dropped.
    Malformed(String),

    /// A record with a missing required field was handed to the encoder.
    /// Reported synchronously to the caller; no state is mutated.
    Incomplete(String),

    // ========================================================================
    // Resource errors
    // ========================================================================
    /// Socket construction, bind, or address lookup failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Malformed(msg) => write!(f, "malformed wire data: {}", msg),
            Error::Incomplete(msg) => write!(f, "incomplete record: {}", msg),
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats() {
        let err = Error::Malformed("truncated topic".into());
        assert_eq!(err.to_string(), "malformed wire data: truncated topic");

        let err = Error::Incomplete("empty topic".into());
        assert_eq!(err.to_string(), "incomplete record: empty topic");
    }

    #[test]
    fn test_io_source_preserved() {
        use std::error::Error as _;

        let err = Error::from(io::Error::new(io::ErrorKind::AddrInUse, "busy"));
        assert!(err.source().is_some());
    }
}
