// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! X11 implementation of the windowing layer.

// # Notes on error handling in X11
//
// X11 errors are reported asynchronously by default, by sending them to the event loop.
// Window creation checks its requests synchronously; everything else takes the async route
// and is logged when it fails to be sent.
//
// When checking for X11 errors synchronously, there are two places where the error could
// happen. An error on the request means the connection is broken, and needs no extra
// context. An error on the reply means there was something wrong with the request, and so we
// add context. This convention is used throughout the x11 backend.
//
// Failures while translating a single event never escape the dispatch loop: they are logged
// there and the loop carries on with the next event.

#[macro_use]
mod util;

pub mod atoms;
pub mod connection;
pub mod error;
pub mod input;
pub mod message_queue;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;
