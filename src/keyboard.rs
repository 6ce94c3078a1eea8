// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! Keyboard event types.

pub use keyboard_types::{KeyState, Modifiers};

/// A keyboard event, generated on every key press and key release.
///
/// Keys are reported by their hardware keycode; turning keycodes into symbols is left to
/// a keymap layer above this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Whether the key was pressed or released.
    pub state: KeyState,
    /// The X11 hardware keycode.
    pub keycode: u8,
    /// The modifiers active when the event was generated.
    pub mods: Modifiers,
    /// `true` if the key was already held down.
    pub repeat: bool,
}
