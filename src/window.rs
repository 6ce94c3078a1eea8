// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! Platform independent window types.

use crate::keyboard::KeyEvent;
use crate::kurbo::{Point, Rect, Size};
use crate::mouse::MouseEvent;

/// App behavior, supplied by the app.
///
/// Window lifecycle and input events are translated into calls to this trait. The methods
/// are called from the dispatch loop of the thread that owns the window; implementers that
/// call back into the window should keep any borrows short.
pub trait WinHandler {
    /// Called when the window manager asks the window to close, for example because the
    /// user clicked the "X" in the titlebar.
    ///
    /// The window is not closed by this. Call `Window::destroy` to actually close it.
    fn request_close(&mut self);

    /// Called when this window becomes the focused window.
    fn got_focus(&mut self) {}

    /// Called when this window stops being the focused window.
    fn lost_focus(&mut self) {}

    /// Request the handler to paint the window contents. `invalid` is the region in
    /// display points that the server reported as damaged.
    #[allow(unused_variables)]
    fn paint(&mut self, invalid: Rect) {}

    /// Called when the client area moved. `pos` is its new top-left corner on screen, in
    /// display points.
    #[allow(unused_variables)]
    fn moved(&mut self, pos: Point) {}

    /// Called when the size of the client area has changed.
    ///
    /// The `size` parameter is the new size in [display points](crate::Scale).
    #[allow(unused_variables)]
    fn resized(&mut self, size: Size) {}

    /// Called when the window manager minimized (iconified) the window.
    fn minimized(&mut self) {}

    /// Called when a window minimized by the window manager is shown again.
    fn restored(&mut self) {}

    /// Called on a key down event.
    ///
    /// Return `true` if the event is handled.
    #[allow(unused_variables)]
    fn key_down(&mut self, event: &KeyEvent) -> bool {
        false
    }

    /// Called when a key is released.
    #[allow(unused_variables)]
    fn key_up(&mut self, event: &KeyEvent) {}

    /// Called on a mouse wheel event.
    ///
    /// The polarity is the amount to be added to the scroll position,
    /// in other words the opposite of the direction the content should
    /// move on scrolling.
    #[allow(unused_variables)]
    fn wheel(&mut self, event: &MouseEvent) {}

    /// Called when the mouse moves.
    #[allow(unused_variables)]
    fn mouse_move(&mut self, event: &MouseEvent) {}

    /// Called on mouse button down.
    #[allow(unused_variables)]
    fn mouse_down(&mut self, event: &MouseEvent) {}

    /// Called on mouse button up.
    #[allow(unused_variables)]
    fn mouse_up(&mut self, event: &MouseEvent) {}
}

/// Which rectangle a requested position refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Positioning {
    /// The position is the top-left corner of the drawable client area.
    #[default]
    ClientArea,
    /// The position is the top-left corner of the decorated frame that the window
    /// manager draws around the client area.
    Frame,
}

/// The outcome of a geometry request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Placement {
    /// The request was sent to the server.
    Applied,
    /// The window is not mapped, so the request was stored and will be sent once the
    /// window is mapped.
    Deferred,
}

/// The semantic role of a window, advertised to the window manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowType {
    #[default]
    Normal,
    Dialog,
    Utility,
    Toolbar,
    Menu,
    Splash,
    Tooltip,
    Notification,
    Popup,
    DropDown,
    Combo,
    Dnd,
    Dock,
    Desktop,
}

/// Mouse cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Arrow,
    IBeam,
    Pointer,
    Crosshair,
    NotAllowed,
    ResizeLeftRight,
    ResizeUpDown,
}

/// Everything needed to create a window.
#[derive(Debug, Clone)]
pub struct WindowDesc {
    pub(crate) title: String,
    pub(crate) size: Size,
    pub(crate) position: Option<Point>,
    pub(crate) positioning: Positioning,
    pub(crate) resizable: bool,
    pub(crate) visible: bool,
    pub(crate) fullscreen: bool,
    pub(crate) input_focus: bool,
    pub(crate) window_type: WindowType,
    pub(crate) pixel_ratio: Option<f64>,
}

impl Default for WindowDesc {
    fn default() -> WindowDesc {
        WindowDesc {
            title: String::new(),
            size: Size::new(640.0, 480.0),
            position: None,
            positioning: Positioning::ClientArea,
            resizable: true,
            visible: false,
            fullscreen: false,
            input_focus: true,
            window_type: WindowType::Normal,
            pixel_ratio: None,
        }
    }
}

impl WindowDesc {
    /// A resizable, initially hidden 640×480 window.
    pub fn new() -> WindowDesc {
        WindowDesc::default()
    }

    /// Set the window title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the client area size, in display points.
    pub fn size(mut self, size: impl Into<Size>) -> Self {
        self.size = size.into();
        self
    }

    /// Request an initial position, in display points.
    ///
    /// Window managers are free to ignore this.
    pub fn position(mut self, position: impl Into<Point>, positioning: Positioning) -> Self {
        self.position = Some(position.into());
        self.positioning = positioning;
        self
    }

    /// Set whether the user may resize the window.
    pub fn resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    /// Set whether the window is mapped as soon as it has been created.
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Set whether the window starts out fullscreen.
    pub fn fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }

    /// Set whether the window wants the window manager to give it keyboard focus.
    pub fn input_focus(mut self, input_focus: bool) -> Self {
        self.input_focus = input_focus;
        self
    }

    /// Set the window's semantic type.
    pub fn window_type(mut self, window_type: WindowType) -> Self {
        self.window_type = window_type;
        self
    }

    /// Force a pixel ratio instead of deriving one from the screen.
    pub fn pixel_ratio(mut self, ratio: f64) -> Self {
        self.pixel_ratio = Some(ratio);
        self
    }
}
