// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! Keyboard and mouse adapters, turning raw X11 input records into the crate's input events.

use std::collections::HashSet;

use tracing::warn;
use x11rb::protocol::xproto;

use crate::keyboard::{KeyEvent, KeyState, Modifiers};
use crate::kurbo::{Point, Vec2};
use crate::mouse::{MouseButton, MouseButtons, MouseEvent};

/// Tracks which keys are held down.
///
/// X11 reports auto-repeat as repeated presses without releases in between (when detectable
/// auto-repeat is on), so a press of a key that is already down is a repeat.
#[derive(Debug, Default)]
pub struct Keyboard {
    pressed: HashSet<u8>,
    mods: Modifiers,
}

impl Keyboard {
    pub fn new() -> Keyboard {
        Keyboard::default()
    }

    /// Record a key press or release and build the matching event.
    pub fn key_event(&mut self, keycode: u8, state: u16, key_state: KeyState) -> KeyEvent {
        let mods = key_mods(state);
        self.mods = mods;
        let repeat = match key_state {
            KeyState::Down => !self.pressed.insert(keycode),
            KeyState::Up => {
                self.pressed.remove(&keycode);
                false
            }
        };
        KeyEvent {
            state: key_state,
            keycode,
            mods,
            repeat,
        }
    }

    pub fn is_key_down(&self, keycode: u8) -> bool {
        self.pressed.contains(&keycode)
    }

    /// The modifiers of the most recent key event.
    pub fn modifiers(&self) -> Modifiers {
        self.mods
    }

    /// Forget all held keys, for example when focus is lost and releases won't be seen.
    pub fn reset(&mut self) {
        self.pressed.clear();
        self.mods = Modifiers::empty();
    }
}

/// A translated pointer event, tagged with the handler method it goes to.
#[derive(Debug, Clone, PartialEq)]
pub enum MouseInput {
    Down(MouseEvent),
    Up(MouseEvent),
    Move(MouseEvent),
    Wheel(MouseEvent),
}

/// Tracks the pointer's last known position and button state.
///
/// Positions passed in are already in display points and in the coordinate space of the
/// window receiving the event.
#[derive(Debug, Default)]
pub struct Mouse {
    pos: Point,
    buttons: MouseButtons,
    mods: Modifiers,
}

impl Mouse {
    pub fn new() -> Mouse {
        Mouse::default()
    }

    /// A button press. Buttons 4 to 7 are scroll wheel ticks.
    pub fn button_press(&mut self, detail: u8, state: u16, pos: Point) -> MouseInput {
        let mods = key_mods(state);
        self.update(pos, mods);
        if (4..=7).contains(&detail) {
            // We use a delta of 120 per tick to match the behavior of Windows.
            let delta = match detail {
                4 if mods.contains(Modifiers::SHIFT) => (-120.0, 0.0),
                4 => (0.0, -120.0),
                5 if mods.contains(Modifiers::SHIFT) => (120.0, 0.0),
                5 => (0.0, 120.0),
                6 => (-120.0, 0.0),
                _ => (120.0, 0.0),
            };
            self.buttons = mouse_buttons(state);
            return MouseInput::Wheel(self.event(MouseButton::None, delta.into()));
        }
        let button = mouse_button(detail);
        // The state field doesn't include the newly pressed button.
        self.buttons = mouse_buttons(state).with(button);
        MouseInput::Down(self.event(button, Vec2::ZERO))
    }

    /// A button release. Releases of the scroll buttons carry no information and yield
    /// `None`.
    pub fn button_release(&mut self, detail: u8, state: u16, pos: Point) -> Option<MouseInput> {
        let mods = key_mods(state);
        self.update(pos, mods);
        if (4..=7).contains(&detail) {
            return None;
        }
        let button = mouse_button(detail);
        // The state field still includes the released button.
        self.buttons = mouse_buttons(state).without(button);
        Some(MouseInput::Up(self.event(button, Vec2::ZERO)))
    }

    pub fn motion(&mut self, state: u16, pos: Point) -> MouseInput {
        self.update(pos, key_mods(state));
        self.buttons = mouse_buttons(state);
        MouseInput::Move(self.event(MouseButton::None, Vec2::ZERO))
    }

    pub fn position(&self) -> Point {
        self.pos
    }

    pub fn buttons(&self) -> MouseButtons {
        self.buttons
    }

    pub fn modifiers(&self) -> Modifiers {
        self.mods
    }

    fn update(&mut self, pos: Point, mods: Modifiers) {
        self.pos = pos;
        self.mods = mods;
    }

    fn event(&self, button: MouseButton, wheel_delta: Vec2) -> MouseEvent {
        MouseEvent {
            pos: self.pos,
            buttons: self.buttons,
            mods: self.mods,
            button,
            wheel_delta,
        }
    }
}

// Converts from, e.g., the `detail` field of `xproto::ButtonPressEvent`
pub(crate) fn mouse_button(button: u8) -> MouseButton {
    match button {
        1 => MouseButton::Left,
        2 => MouseButton::Middle,
        3 => MouseButton::Right,
        // buttons 4 through 7 are for scrolling.
        4..=7 => MouseButton::None,
        8 => MouseButton::X1,
        9 => MouseButton::X2,
        _ => {
            warn!("unknown mouse button code {}", button);
            MouseButton::None
        }
    }
}

// Extracts the mouse buttons from, e.g., the `state` field of
// `xproto::ButtonPressEvent`
pub(crate) fn mouse_buttons(mods: u16) -> MouseButtons {
    let mut buttons = MouseButtons::new();
    let button_masks = &[
        (xproto::ButtonMask::M1, MouseButton::Left),
        (xproto::ButtonMask::M2, MouseButton::Middle),
        (xproto::ButtonMask::M3, MouseButton::Right),
        // BUTTON_MASK_4/5 do not work: they are for scroll events.
    ];
    for (mask, button) in button_masks {
        if mods & u16::from(*mask) != 0 {
            buttons.insert(*button);
        }
    }
    buttons
}

// Extracts the keyboard modifiers from, e.g., the `state` field of
// `xproto::ButtonPressEvent`
pub(crate) fn key_mods(mods: u16) -> Modifiers {
    let mut ret = Modifiers::default();
    let mut key_masks = [
        (xproto::ModMask::SHIFT, Modifiers::SHIFT),
        (xproto::ModMask::CONTROL, Modifiers::CONTROL),
        // X11's mod keys are configurable, but this seems
        // like a reasonable default for US keyboards, at least,
        // where the "windows" key seems to be MOD_MASK_4.
        (xproto::ModMask::M1, Modifiers::ALT),
        (xproto::ModMask::M2, Modifiers::NUM_LOCK),
        (xproto::ModMask::M4, Modifiers::META),
        (xproto::ModMask::LOCK, Modifiers::CAPS_LOCK),
    ];
    for (mask, modifiers) in &mut key_masks {
        if mods & u16::from(*mask) != 0 {
            ret |= *modifiers;
        }
    }
    ret
}
