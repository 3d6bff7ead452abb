//! Unified error type for netstage.
//!
//! A single `Copy` enum every subsystem converts into, so the boot path in
//! `main` can handle failures uniformly.  Collaborator outcomes inside the
//! tick are booleans and never surface here.

use core::fmt;

use crate::app::ports::{LinkError, SendError};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The link driver refused a request, or credentials are invalid.
    Link(LinkError),
    /// A message could not be sent.
    Send(SendError),
    /// Configuration is invalid or could not be parsed.
    Config(&'static str),
    /// Peripheral or collaborator initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Send(e) => write!(f, "send: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<SendError> for Error {
    fn from(e: SendError) -> Self {
        Self::Send(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, Error>;
