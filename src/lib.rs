// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! The windowing layer of an X11 toolkit.
//!
//! This crate owns native top-level windows on an X server: it creates them,
//! tracks their geometry and window-manager state, and turns the raw event
//! stream into calls on a per-window [`WinHandler`]. Events are pumped by a
//! single [`MessageQueue`] which also keeps the registry of live windows.
//!
//! Everything here is single-threaded. The only handle that may cross threads
//! is [`QueueProxy`], which can post work back to the queue and wake it up.

#[cfg(not(any(target_os = "freebsd", target_os = "linux", target_os = "openbsd")))]
compile_error!("xwin-shell only supports X11 platforms");

// Re-export `kurbo` and `keyboard_types` so downstream crates don't need to
// depend on them directly.
pub use keyboard_types;
pub use kurbo;

pub mod backend;
mod error;
mod keyboard;
mod mouse;
mod scale;
mod window;

pub use error::{Error, StateError};
pub use keyboard::{KeyEvent, KeyState, Modifiers};
pub use mouse::{MouseButton, MouseButtons, MouseEvent};
pub use scale::{Scalable, Scale};
pub use window::{Cursor, Placement, Positioning, WinHandler, WindowDesc, WindowType};

pub use backend::x11::atoms::{AtomCache, StateAction};
pub use backend::x11::connection::{ScreenInfo, Visual, X11Connection, XConnection};
pub use backend::x11::message_queue::{Membership, MessageQueue, QueueProxy};
pub use backend::x11::window::{Window, WindowHandle};
