// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! The seam between the windowing layer and the X server.
//!
//! Windows and the message queue only ever talk to the server through [`XConnection`]. The
//! real implementation wraps an x11rb [`XCBConnection`]; tests substitute an in-memory one.

use std::cell::RefCell;
use std::collections::HashMap;
use std::os::unix::io::{AsRawFd, RawFd};

use x11rb::connection::Connection;
use x11rb::cursor::Handle as CursorHandle;
use x11rb::errors::ConnectionError;
use x11rb::properties::{WmHints, WmSizeHints};
use x11rb::protocol::xproto::{
    self, Atom, AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ColormapAlloc,
    ConfigureWindowAux, ConnectionExt as _, CreateWindowAux, EventMask, MapState, PropMode,
    Visualid, WindowClass,
};
use x11rb::protocol::Event;
use x11rb::resource_manager::{new_from_default as new_resource_db_from_default, Database};
use x11rb::wrapper::ConnectionExt as _;
use x11rb::xcb_ffi::XCBConnection;

use super::error::Error;

/// The parts of the connection setup a window needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenInfo {
    /// Index of the screen on the display.
    pub num: usize,
    pub root: xproto::Window,
    pub root_visual: Visualid,
    pub root_depth: u8,
    pub width_px: u16,
    pub height_px: u16,
    pub width_mm: u16,
    pub height_mm: u16,
}

/// The visual a window is created with, usually picked by a rendering context binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visual {
    pub id: Visualid,
    pub depth: u8,
}

impl Visual {
    /// The root window's visual.
    pub fn root(screen: &ScreenInfo) -> Visual {
        Visual {
            id: screen.root_visual,
            depth: screen.root_depth,
        }
    }
}

/// Parameters of a `CreateWindow` request.
#[derive(Debug, Clone)]
pub struct CreateWindow {
    pub id: xproto::Window,
    pub parent: xproto::Window,
    pub visual: Visual,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub aux: CreateWindowAux,
}

/// Requests and queries against the display server.
///
/// Methods that return a value wait for the server's reply. The others only queue the
/// request; call [`flush`](XConnection::flush) to send it.
pub trait XConnection {
    /// The screen this connection was opened for.
    fn screen(&self) -> &ScreenInfo;

    /// Allocate a new resource id.
    fn generate_id(&self) -> Result<u32, Error>;

    /// Intern an atom. With `only_if_exists`, a name the server has never seen yields
    /// `x11rb::NONE`.
    fn intern_atom(&self, name: &str, only_if_exists: bool) -> Result<Atom, Error>;

    /// Read a whole 32-bit property. `Ok(None)` if the window has no such property or it
    /// is not made of 32-bit items.
    fn get_property32(&self, window: xproto::Window, property: Atom)
        -> Result<Option<Vec<u32>>, Error>;

    fn change_property32(
        &self,
        window: xproto::Window,
        property: Atom,
        type_: Atom,
        data: &[u32],
    ) -> Result<(), Error>;

    fn change_property8(
        &self,
        window: xproto::Window,
        property: Atom,
        type_: Atom,
        data: &[u8],
    ) -> Result<(), Error>;

    fn send_client_message(
        &self,
        destination: xproto::Window,
        mask: EventMask,
        event: &ClientMessageEvent,
    ) -> Result<(), Error>;

    /// Create a private colormap for `visual` on the root window.
    fn create_colormap(&self, visual: Visualid) -> Result<xproto::Colormap, Error>;

    fn free_colormap(&self, colormap: xproto::Colormap) -> Result<(), Error>;

    /// Create a window and wait for the server to accept it.
    fn create_window(&self, request: &CreateWindow) -> Result<(), Error>;

    fn destroy_window(&self, window: xproto::Window) -> Result<(), Error>;

    fn map_window(&self, window: xproto::Window) -> Result<(), Error>;

    fn unmap_window(&self, window: xproto::Window) -> Result<(), Error>;

    fn configure_window(
        &self,
        window: xproto::Window,
        changes: &ConfigureWindowAux,
    ) -> Result<(), Error>;

    fn change_window_attributes(
        &self,
        window: xproto::Window,
        changes: &ChangeWindowAttributesAux,
    ) -> Result<(), Error>;

    fn map_state(&self, window: xproto::Window) -> Result<MapState, Error>;

    /// The window that currently has keyboard focus.
    fn input_focus(&self) -> Result<xproto::Window, Error>;

    fn set_input_focus(&self, window: xproto::Window) -> Result<(), Error>;

    /// Translate a point from `src`'s coordinate space to `dst`'s.
    fn translate_coordinates(
        &self,
        src: xproto::Window,
        dst: xproto::Window,
        x: i16,
        y: i16,
    ) -> Result<(i16, i16), Error>;

    /// Create a 1×1 pixmap of depth 1 and a cursor drawn from it, which shows nothing.
    fn create_blank_cursor(&self) -> Result<(xproto::Pixmap, xproto::Cursor), Error>;

    fn free_cursor(&self, cursor: xproto::Cursor) -> Result<(), Error>;

    fn free_pixmap(&self, pixmap: xproto::Pixmap) -> Result<(), Error>;

    /// Load a cursor from the user's cursor theme. Loaded cursors are shared by all windows.
    fn load_cursor(&self, name: &'static str) -> Option<xproto::Cursor>;

    fn set_normal_hints(&self, window: xproto::Window, hints: &WmSizeHints)
        -> Result<(), Error>;

    fn set_wm_hints(&self, window: xproto::Window, hints: &WmHints) -> Result<(), Error>;

    /// Clear the whole window, generating exposures.
    fn clear_area(&self, window: xproto::Window) -> Result<(), Error>;

    /// The `Xft.dpi` resource, if the user set one.
    fn xft_dpi(&self) -> Option<f64>;

    fn poll_for_event(&self) -> Result<Option<Event>, Error>;

    fn flush(&self) -> Result<(), Error>;

    /// The descriptor that becomes readable when the server sent something.
    fn as_raw_fd(&self) -> RawFd;
}

/// An [`XConnection`] backed by libxcb.
pub struct X11Connection {
    conn: XCBConnection,
    screen: ScreenInfo,
    rdb: Database,
    cursor_handle: Option<CursorHandle>,
    cursors: RefCell<HashMap<&'static str, Option<xproto::Cursor>>>,
}

impl X11Connection {
    /// Connect to the display named by `$DISPLAY`.
    pub fn connect() -> Result<X11Connection, Error> {
        let (conn, screen_num) = XCBConnection::connect(None)?;
        let rdb = new_resource_db_from_default(&conn)?;
        let cursor_handle = match CursorHandle::new(&conn, screen_num, &rdb) {
            Ok(cookie) => match cookie.reply() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!("Unable to load cursor theme: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Unable to load cursor theme: {}", e);
                None
            }
        };
        let screen = {
            let screen = conn
                .setup()
                .roots
                .get(screen_num)
                .ok_or_else(|| Error::from(ConnectionError::UnknownError))?;
            ScreenInfo {
                num: screen_num,
                root: screen.root,
                root_visual: screen.root_visual,
                root_depth: screen.root_depth,
                width_px: screen.width_in_pixels,
                height_px: screen.height_in_pixels,
                width_mm: screen.width_in_millimeters,
                height_mm: screen.height_in_millimeters,
            }
        };
        tracing::debug!("Connected to X11 screen {}", screen_num);
        Ok(X11Connection {
            conn,
            screen,
            rdb,
            cursor_handle,
            cursors: RefCell::new(HashMap::new()),
        })
    }
}

impl XConnection for X11Connection {
    fn screen(&self) -> &ScreenInfo {
        &self.screen
    }

    fn generate_id(&self) -> Result<u32, Error> {
        Ok(self.conn.generate_id()?)
    }

    fn intern_atom(&self, name: &str, only_if_exists: bool) -> Result<Atom, Error> {
        Ok(self
            .conn
            .intern_atom(only_if_exists, name.as_bytes())?
            .reply()?
            .atom)
    }

    fn get_property32(
        &self,
        window: xproto::Window,
        property: Atom,
    ) -> Result<Option<Vec<u32>>, Error> {
        let reply = self
            .conn
            .get_property(false, window, property, AtomEnum::ANY, 0, u32::MAX)?
            .reply()?;
        if reply.type_ == x11rb::NONE {
            return Ok(None);
        }
        Ok(reply.value32().map(|values| values.collect()))
    }

    fn change_property32(
        &self,
        window: xproto::Window,
        property: Atom,
        type_: Atom,
        data: &[u32],
    ) -> Result<(), Error> {
        self.conn
            .change_property32(PropMode::REPLACE, window, property, type_, data)?;
        Ok(())
    }

    fn change_property8(
        &self,
        window: xproto::Window,
        property: Atom,
        type_: Atom,
        data: &[u8],
    ) -> Result<(), Error> {
        self.conn
            .change_property8(PropMode::REPLACE, window, property, type_, data)?;
        Ok(())
    }

    fn send_client_message(
        &self,
        destination: xproto::Window,
        mask: EventMask,
        event: &ClientMessageEvent,
    ) -> Result<(), Error> {
        self.conn.send_event(false, destination, mask, event)?;
        Ok(())
    }

    fn create_colormap(&self, visual: Visualid) -> Result<xproto::Colormap, Error> {
        let colormap = self.conn.generate_id()?;
        self.conn
            .create_colormap(ColormapAlloc::NONE, colormap, self.screen.root, visual)?;
        Ok(colormap)
    }

    fn free_colormap(&self, colormap: xproto::Colormap) -> Result<(), Error> {
        self.conn.free_colormap(colormap)?;
        Ok(())
    }

    fn create_window(&self, request: &CreateWindow) -> Result<(), Error> {
        self.conn
            .create_window(
                request.visual.depth,
                request.id,
                request.parent,
                request.x,
                request.y,
                request.width,
                request.height,
                0,
                WindowClass::INPUT_OUTPUT,
                request.visual.id,
                &request.aux,
            )?
            .check()?;
        Ok(())
    }

    fn destroy_window(&self, window: xproto::Window) -> Result<(), Error> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn map_window(&self, window: xproto::Window) -> Result<(), Error> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap_window(&self, window: xproto::Window) -> Result<(), Error> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn configure_window(
        &self,
        window: xproto::Window,
        changes: &ConfigureWindowAux,
    ) -> Result<(), Error> {
        self.conn.configure_window(window, changes)?;
        Ok(())
    }

    fn change_window_attributes(
        &self,
        window: xproto::Window,
        changes: &ChangeWindowAttributesAux,
    ) -> Result<(), Error> {
        self.conn.change_window_attributes(window, changes)?;
        Ok(())
    }

    fn map_state(&self, window: xproto::Window) -> Result<MapState, Error> {
        Ok(self.conn.get_window_attributes(window)?.reply()?.map_state)
    }

    fn input_focus(&self) -> Result<xproto::Window, Error> {
        Ok(self.conn.get_input_focus()?.reply()?.focus)
    }

    fn set_input_focus(&self, window: xproto::Window) -> Result<(), Error> {
        self.conn.set_input_focus(
            xproto::InputFocus::POINTER_ROOT,
            window,
            x11rb::CURRENT_TIME,
        )?;
        Ok(())
    }

    fn translate_coordinates(
        &self,
        src: xproto::Window,
        dst: xproto::Window,
        x: i16,
        y: i16,
    ) -> Result<(i16, i16), Error> {
        let reply = self.conn.translate_coordinates(src, dst, x, y)?.reply()?;
        Ok((reply.dst_x, reply.dst_y))
    }

    fn create_blank_cursor(&self) -> Result<(xproto::Pixmap, xproto::Cursor), Error> {
        let pixmap = self.conn.generate_id()?;
        self.conn.create_pixmap(1, pixmap, self.screen.root, 1, 1)?;
        let cursor = self.conn.generate_id()?;
        self.conn
            .create_cursor(cursor, pixmap, pixmap, 0, 0, 0, 0, 0, 0, 0, 0)?;
        Ok((pixmap, cursor))
    }

    fn free_cursor(&self, cursor: xproto::Cursor) -> Result<(), Error> {
        self.conn.free_cursor(cursor)?;
        Ok(())
    }

    fn free_pixmap(&self, pixmap: xproto::Pixmap) -> Result<(), Error> {
        self.conn.free_pixmap(pixmap)?;
        Ok(())
    }

    fn load_cursor(&self, name: &'static str) -> Option<xproto::Cursor> {
        let handle = self.cursor_handle.as_ref()?;
        *self.cursors.borrow_mut().entry(name).or_insert_with(|| {
            handle
                .load_cursor(&self.conn, name)
                .map_err(|e| tracing::warn!("Unable to load cursor {}, error: {}", name, e))
                .ok()
        })
    }

    fn set_normal_hints(
        &self,
        window: xproto::Window,
        hints: &WmSizeHints,
    ) -> Result<(), Error> {
        hints.set_normal_hints(&self.conn, window)?;
        Ok(())
    }

    fn set_wm_hints(&self, window: xproto::Window, hints: &WmHints) -> Result<(), Error> {
        hints.set(&self.conn, window)?;
        Ok(())
    }

    fn clear_area(&self, window: xproto::Window) -> Result<(), Error> {
        self.conn.clear_area(true, window, 0, 0, 0, 0)?;
        Ok(())
    }

    fn xft_dpi(&self) -> Option<f64> {
        match self.rdb.get_value::<f64>("Xft.dpi", "") {
            Ok(dpi) => dpi,
            Err(e) => {
                tracing::warn!("Unable to parse Xft.dpi: {:?}", e);
                None
            }
        }
    }

    fn poll_for_event(&self) -> Result<Option<Event>, Error> {
        Ok(self.conn.poll_for_event()?)
    }

    fn flush(&self) -> Result<(), Error> {
        self.conn.flush()?;
        Ok(())
    }

    fn as_raw_fd(&self) -> RawFd {
        self.conn.as_raw_fd()
    }
}
