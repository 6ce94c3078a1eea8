// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! Platform specific implementations.

#[cfg(any(target_os = "freebsd", target_os = "linux", target_os = "openbsd"))]
pub mod x11;
#[cfg(any(target_os = "freebsd", target_os = "linux", target_os = "openbsd"))]
pub use x11::*;
