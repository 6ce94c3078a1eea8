// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors reported by the X11 connection.

use std::fmt;
use std::sync::Arc;

use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

#[derive(Debug, Clone)]
pub enum Error {
    /// Opening the connection to the display failed.
    Connect(Arc<ConnectError>),
    /// A request failed, either because the connection broke or because the server
    /// answered it with an error.
    XError(Arc<ReplyError>),
    /// The server has no more resource ids to hand out.
    IdsExhausted,
    /// A wake or exit pipe could not be used.
    Pipe(nix::errno::Errno),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::Connect(e) => write!(f, "Failed to connect to the X server: {e}"),
            Error::XError(e) => fmt::Display::fmt(e, f),
            Error::IdsExhausted => write!(f, "X11 resource ids exhausted"),
            Error::Pipe(e) => write!(f, "Signal pipe failure: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConnectError> for Error {
    fn from(err: ConnectError) -> Error {
        Error::Connect(Arc::new(err))
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Error {
        Error::XError(Arc::new(ReplyError::ConnectionError(err)))
    }
}

impl From<x11rb::x11_utils::X11Error> for Error {
    fn from(err: x11rb::x11_utils::X11Error) -> Error {
        Error::XError(Arc::new(ReplyError::X11Error(err)))
    }
}

impl From<ReplyError> for Error {
    fn from(err: ReplyError) -> Error {
        Error::XError(Arc::new(err))
    }
}

impl From<ReplyOrIdError> for Error {
    fn from(err: ReplyOrIdError) -> Error {
        match err {
            ReplyOrIdError::IdsExhausted => Error::IdsExhausted,
            ReplyOrIdError::ConnectionError(e) => e.into(),
            ReplyOrIdError::X11Error(e) => e.into(),
        }
    }
}

impl From<nix::errno::Errno> for Error {
    fn from(err: nix::errno::Errno) -> Error {
        Error::Pipe(err)
    }
}
