// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors at the windowing layer.

use std::fmt;
use std::sync::Arc;

use crate::backend::error as backend;

/// Windowing errors.
///
/// Calling an operation whose precondition the caller is responsible for (such as looking up
/// an atom that was never interned) is a bug and panics instead of returning one of these.
#[derive(Debug, Clone)]
pub enum Error {
    /// Allocating the native window or one of its resources failed, or the window description
    /// asked for something this backend cannot provide. The window is unusable.
    Creation(Arc<anyhow::Error>),
    /// The operation is not allowed in the window's current lifecycle state.
    State(StateError),
    /// A request or query to the display server failed.
    Platform(backend::Error),
    /// Other miscellaneous error.
    Other(Arc<anyhow::Error>),
}

/// Lifecycle states that forbid an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// The window is not mapped.
    Unmapped,
    /// The window has already been destroyed.
    Destroyed,
}

impl Error {
    pub(crate) fn creation(err: impl Into<anyhow::Error>) -> Error {
        Error::Creation(Arc::new(err.into()))
    }

    /// Returns `true` if this error reports that the window was unmapped.
    pub fn is_unmapped(&self) -> bool {
        matches!(self, Error::State(StateError::Unmapped))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::Creation(err) => write!(f, "Window creation failed: {err:#}"),
            Error::State(state) => fmt::Display::fmt(state, f),
            Error::Platform(err) => fmt::Display::fmt(err, f),
            Error::Other(s) => write!(f, "{s}"),
        }
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            StateError::Unmapped => write!(f, "The window is not mapped."),
            StateError::Destroyed => write!(f, "The window has already been destroyed."),
        }
    }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
    fn from(src: anyhow::Error) -> Error {
        Error::Other(Arc::new(src))
    }
}

impl From<backend::Error> for Error {
    fn from(src: backend::Error) -> Error {
        Error::Platform(src)
    }
}

impl From<StateError> for Error {
    fn from(src: StateError) -> Error {
        Error::State(src)
    }
}
