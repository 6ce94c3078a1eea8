// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! X11 window creation, window manager negotiation and event translation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::Location;
use std::rc::{Rc, Weak};

use anyhow::{anyhow, Context};
use tracing::{debug, error, info, trace, warn};
use x11rb::properties::{WmHints, WmSizeHints};
use x11rb::protocol::xproto::{
    self, AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ConfigureNotifyEvent,
    ConfigureWindowAux, CreateWindowAux, EventMask, ExposeEvent, Gravity, MapState,
    PropertyNotifyEvent, StackMode,
};
use x11rb::protocol::Event;

use super::atoms::{AtomCache, StateAction};
use super::connection::{CreateWindow, ScreenInfo, Visual, XConnection};
use super::error::Error as BackendError;
use super::input::{Keyboard, Mouse, MouseInput};
use super::message_queue::MessageQueue;
use super::util;
use crate::error::{Error, StateError};
use crate::keyboard::KeyState;
use crate::kurbo::{Insets, Point, Rect, Size, Vec2};
use crate::scale::{self, Scalable, Scale};
use crate::window::{Cursor, Positioning, Placement, WinHandler, WindowDesc, WindowType};

/// No side of a window may be smaller than this many pixels.
pub const RESIZE_MINIMUM: f64 = 8.0;

/// Overrides the screen density used to pick a pixel ratio.
const DPI_ENV_VAR: &str = "XWIN_SHELL_X11_DPI";

/// ICCCM `IconicState`, the argument of a `WM_CHANGE_STATE` request.
const ICONIC_STATE: u32 = 3;

/// Identifies a native window to a rendering context binding.
#[derive(Clone, Default)]
pub struct WindowHandle {
    /// The connection the window was created on. `None` once the window is destroyed.
    pub connection: Option<Rc<dyn XConnection>>,
    /// Index of the screen the window lives on.
    pub screen: usize,
    /// The X11 window id, or 0 once the window is destroyed.
    pub window: xproto::Window,
}

impl fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WindowHandle")
            .field("connected", &self.connection.is_some())
            .field("screen", &self.screen)
            .field("window", &self.window)
            .finish()
    }
}

/// Cached geometry. Everything is in pixels; positions are in root window coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Geometry {
    /// Where we last asked the client area to go.
    requested_position: Option<Point>,
    /// The client area size we last asked for.
    requested_size: Size,
    min_size: Size,
    max_size: Option<Size>,
    /// Decoration thickness added by the window manager.
    frame_extents: Insets,
    /// Confirmed client area position.
    position: Point,
    /// Confirmed client area size.
    size: Size,
}

impl Default for Geometry {
    fn default() -> Geometry {
        Geometry {
            requested_position: None,
            requested_size: Size::ZERO,
            min_size: Size::ZERO,
            max_size: None,
            frame_extents: Insets::ZERO,
            position: Point::ORIGIN,
            size: Size::ZERO,
        }
    }
}

impl Geometry {
    fn client_rect(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Lifecycle {
    mapped: bool,
    /// The window manager unmapped us, most likely to minimize.
    externally_minimized: bool,
    /// Unmaps we requested whose `UnmapNotify` hasn't arrived yet.
    pending_unmaps: u32,
    fullscreen_requested: bool,
    /// A frame-relative position is waiting for the frame extents, which are only known
    /// once the window manager has decorated the mapped window.
    frame_compensation_pending: bool,
    frame_extents_known: bool,
}

/// Geometry requests made while unmapped, sent on the next `MapNotify`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Deferred {
    position: Option<Point>,
    size: Option<Size>,
    /// A frame position that still needs the left and top frame extents added.
    frame_position: Option<Point>,
    /// A frame size that still needs the frame extents taken off.
    frame_size: Option<Size>,
}

/// A top-level X11 window.
///
/// Windows are owned by the thread that created them and are driven by that thread's
/// [`MessageQueue`]. Event handling only takes `&self`, so all state lives in cells.
pub struct Window {
    conn: Rc<dyn XConnection>,
    queue: Weak<MessageQueue>,
    this: Weak<Window>,
    screen: ScreenInfo,
    id: Cell<xproto::Window>,
    handler: RefCell<Box<dyn WinHandler>>,
    atoms: RefCell<AtomCache>,
    scale: Cell<Scale>,
    ppi: Cell<f64>,
    geometry: Cell<Geometry>,
    state: Cell<Lifecycle>,
    deferred: Cell<Deferred>,
    colormap: Cell<Option<xproto::Colormap>>,
    /// The pixmap and cursor used to hide the pointer, created on first use.
    blank_cursor: Cell<Option<(xproto::Pixmap, xproto::Cursor)>>,
    title: RefCell<String>,
    input_focus: bool,
    enabled: Cell<bool>,
    /// The union of the exposed rectangles of the current batch, in pixels.
    invalid: Cell<Option<Rect>>,
    keyboard: RefCell<Keyboard>,
    mouse: RefCell<Mouse>,
    click_predicate: RefCell<Option<Box<dyn FnMut(Point) -> bool>>>,
    resize_hook: RefCell<Option<Box<dyn FnMut(Size)>>>,
}

/// The event mask every window selects.
fn event_mask() -> EventMask {
    EventMask::EXPOSURE
        | EventMask::STRUCTURE_NOTIFY
        | EventMask::FOCUS_CHANGE
        | EventMask::PROPERTY_CHANGE
        | EventMask::KEY_PRESS
        | EventMask::KEY_RELEASE
        | EventMask::BUTTON_PRESS
        | EventMask::BUTTON_RELEASE
        | EventMask::POINTER_MOTION
}

fn clamp_size(size: Size) -> Size {
    Size::new(
        size.width.max(RESIZE_MINIMUM),
        size.height.max(RESIZE_MINIMUM),
    )
}

fn size_hints(min_size: Size, max_size: Option<Size>) -> WmSizeHints {
    let mut size_hints = WmSizeHints::new();
    size_hints.min_size = Some((min_size.width as i32, min_size.height as i32));
    size_hints.max_size = max_size.map(|max| (max.width as i32, max.height as i32));
    // Configure requests then place the client area, not the frame.
    size_hints.win_gravity = Some(Gravity::STATIC);
    size_hints
}

fn window_type_atom(window_type: WindowType) -> &'static str {
    match window_type {
        WindowType::Normal => "_NET_WM_WINDOW_TYPE_NORMAL",
        WindowType::Dialog => "_NET_WM_WINDOW_TYPE_DIALOG",
        WindowType::Utility => "_NET_WM_WINDOW_TYPE_UTILITY",
        WindowType::Toolbar => "_NET_WM_WINDOW_TYPE_TOOLBAR",
        WindowType::Menu => "_NET_WM_WINDOW_TYPE_MENU",
        WindowType::Splash => "_NET_WM_WINDOW_TYPE_SPLASH",
        WindowType::Tooltip => "_NET_WM_WINDOW_TYPE_TOOLTIP",
        WindowType::Notification => "_NET_WM_WINDOW_TYPE_NOTIFICATION",
        WindowType::Popup => "_NET_WM_WINDOW_TYPE_POPUP_MENU",
        WindowType::DropDown => "_NET_WM_WINDOW_TYPE_DROPDOWN_MENU",
        WindowType::Combo => "_NET_WM_WINDOW_TYPE_COMBO",
        WindowType::Dnd => "_NET_WM_WINDOW_TYPE_DND",
        WindowType::Dock => "_NET_WM_WINDOW_TYPE_DOCK",
        WindowType::Desktop => "_NET_WM_WINDOW_TYPE_DESKTOP",
    }
}

fn cursor_name(cursor: Cursor) -> &'static str {
    match cursor {
        Cursor::Arrow => "default",
        Cursor::IBeam => "text",
        Cursor::Pointer => "pointer",
        Cursor::Crosshair => "crosshair",
        Cursor::NotAllowed => "not-allowed",
        Cursor::ResizeLeftRight => "col-resize",
        Cursor::ResizeUpDown => "row-resize",
    }
}

/// Picks the pixel ratio for a new window: an explicit ratio wins, then the DPI from the
/// environment or from `Xft.dpi`, then the physical density of the screen.
fn resolve_scale(conn: &dyn XConnection, desc: &WindowDesc) -> (Scale, f64) {
    let screen = conn.screen();
    let ppi = scale::screen_ppi(screen.width_px, screen.width_mm);
    if let Some(ratio) = desc.pixel_ratio {
        return (Scale::uniform(ratio), ppi);
    }
    let env_dpi = std::env::var(DPI_ENV_VAR)
        .ok()
        .and_then(|dpi| match dpi.parse::<f64>() {
            Ok(dpi) => Some(dpi),
            Err(err) => {
                warn!("Unable to parse {}={:?}: {}", DPI_ENV_VAR, dpi, err);
                None
            }
        });
    let dpi = env_dpi.or_else(|| conn.xft_dpi()).unwrap_or(ppi);
    (Scale::from_ppi(dpi), ppi)
}

/// Turns a failed creation step into a [`Error::Creation`].
fn creation<T>(result: Result<T, BackendError>, step: &'static str) -> Result<T, Error> {
    result.context(step).map_err(Error::creation)
}

impl Window {
    /// Create a window and register it with `queue`.
    ///
    /// `visual` is the visual a rendering context binding wants; `None` uses the root
    /// window's.
    pub fn create(
        queue: &Rc<MessageQueue>,
        visual: Option<Visual>,
        handler: Box<dyn WinHandler>,
        desc: &WindowDesc,
    ) -> Result<Rc<Window>, Error> {
        let conn = Rc::clone(queue.connection());
        let screen = *conn.screen();

        let mut atoms = AtomCache::new();
        creation(atoms.populate(conn.as_ref(), screen.root), "populate atoms")?;
        // Closing through the window manager needs these even on a bare server.
        for name in ["WM_PROTOCOLS", "WM_DELETE_WINDOW"] {
            if !atoms.exists(name) {
                creation(atoms.intern(conn.as_ref(), name, false), "intern WM_PROTOCOLS")?;
            }
        }
        if desc.position.is_some()
            && desc.positioning == Positioning::Frame
            && !atoms.is_supported("_NET_FRAME_EXTENTS")
        {
            return Err(Error::creation(anyhow!(
                "frame positioning needs a window manager that supports _NET_FRAME_EXTENTS"
            )));
        }

        let (scale, ppi) = resolve_scale(conn.as_ref(), desc);
        let size = clamp_size(desc.size.to_px(scale).round());
        let (min_size, max_size) = if desc.resizable {
            (Size::new(RESIZE_MINIMUM, RESIZE_MINIMUM), None)
        } else {
            (size, Some(size))
        };
        let position = desc.position.map(|pos| pos.to_px(scale).round());
        let origin = position.unwrap_or(Point::ORIGIN);
        let visual = visual.unwrap_or_else(|| Visual::root(&screen));

        let id = creation(conn.generate_id(), "allocate window id")?;
        let colormap = creation(conn.create_colormap(visual.id), "create colormap")?;
        let request = CreateWindow {
            id,
            parent: screen.root,
            visual,
            x: origin.x as i16,
            y: origin.y as i16,
            width: size.width as u16,
            height: size.height as u16,
            aux: CreateWindowAux::new()
                .event_mask(event_mask())
                .border_pixel(0)
                .colormap(colormap),
        };
        if let Err(err) = conn.create_window(&request) {
            log_x11!(conn.free_colormap(colormap));
            return Err(Error::creation(anyhow::Error::new(err).context("create window")));
        }
        debug!("Created window {:#x} ({}x{} px)", id, size.width, size.height);

        let window = Rc::new_cyclic(|this| Window {
            conn: Rc::clone(&conn),
            queue: Rc::downgrade(queue),
            this: this.clone(),
            screen,
            id: Cell::new(id),
            handler: RefCell::new(handler),
            atoms: RefCell::new(atoms),
            scale: Cell::new(scale),
            ppi: Cell::new(ppi),
            geometry: Cell::new(Geometry {
                requested_position: None,
                requested_size: size,
                min_size,
                max_size,
                frame_extents: Insets::ZERO,
                position: origin,
                size,
            }),
            state: Cell::new(Lifecycle::default()),
            deferred: Cell::new(Deferred::default()),
            colormap: Cell::new(Some(colormap)),
            blank_cursor: Cell::new(None),
            title: RefCell::new(String::new()),
            input_focus: desc.input_focus,
            enabled: Cell::new(true),
            invalid: Cell::new(None),
            keyboard: RefCell::new(Keyboard::new()),
            mouse: RefCell::new(Mouse::new()),
            click_predicate: RefCell::new(None),
            resize_hook: RefCell::new(None),
        });

        if let Err(err) = window.initialize(desc, position) {
            window.destroy();
            return Err(err);
        }
        queue.add_client(&window);
        if desc.visible {
            window.show(false);
        }
        log_x11!(conn.flush());
        Ok(window)
    }

    /// Set the properties and hints of a freshly created window.
    fn initialize(&self, desc: &WindowDesc, position: Option<Point>) -> Result<(), Error> {
        let conn = self.conn.as_ref();
        let id = self.id();
        let atoms = self.atoms.borrow();

        self.push_size_hints()
            .context("set WM_NORMAL_HINTS")
            .map_err(Error::creation)?;
        creation(
            conn.set_wm_hints(id, &self.wm_hints()),
            "set WM_HINTS",
        )?;

        if atoms.exists("_NET_WM_PID") {
            if let Ok(pid) = u32::try_from(nix::unistd::Pid::this().as_raw()) {
                creation(
                    conn.change_property32(
                        id,
                        atoms.lookup("_NET_WM_PID"),
                        AtomEnum::CARDINAL.into(),
                        &[pid],
                    ),
                    "set _NET_WM_PID",
                )?;
            }
        }
        if let Some(hostname) = util::hostname() {
            creation(
                conn.change_property8(
                    id,
                    AtomEnum::WM_CLIENT_MACHINE.into(),
                    AtomEnum::STRING.into(),
                    hostname.as_bytes(),
                ),
                "set WM_CLIENT_MACHINE",
            )?;
        }
        if let Some(name) = util::program_name() {
            creation(
                conn.change_property8(
                    id,
                    AtomEnum::WM_CLASS.into(),
                    AtomEnum::STRING.into(),
                    &util::wm_class(&name),
                ),
                "set WM_CLASS",
            )?;
        }

        // Replace the window's WM_PROTOCOLS with the following.
        let mut protocols = vec![atoms.lookup("WM_DELETE_WINDOW")];
        if atoms.is_supported("_NET_WM_PING") {
            protocols.push(atoms.lookup("_NET_WM_PING"));
        }
        creation(
            conn.change_property32(
                id,
                atoms.lookup("WM_PROTOCOLS"),
                AtomEnum::ATOM.into(),
                &protocols,
            ),
            "set WM_PROTOCOLS",
        )?;

        let window_type = window_type_atom(desc.window_type);
        if atoms.exists("_NET_WM_WINDOW_TYPE") && atoms.exists(window_type) {
            creation(
                conn.change_property32(
                    id,
                    atoms.lookup("_NET_WM_WINDOW_TYPE"),
                    AtomEnum::ATOM.into(),
                    &[atoms.lookup(window_type)],
                ),
                "set _NET_WM_WINDOW_TYPE",
            )?;
        } else {
            info!("Window type {} is not supported by the server", window_type);
        }

        if desc.fullscreen {
            if atoms.is_supported("_NET_WM_STATE_FULLSCREEN") {
                // Unmapped windows set their initial state directly.
                creation(
                    conn.change_property32(
                        id,
                        atoms.lookup("_NET_WM_STATE"),
                        AtomEnum::ATOM.into(),
                        &[atoms.lookup("_NET_WM_STATE_FULLSCREEN")],
                    ),
                    "set _NET_WM_STATE",
                )?;
                self.update_state(|state| state.fullscreen_requested = true);
            } else {
                info!("_NET_WM_STATE_FULLSCREEN is not supported by the window manager");
            }
        }
        drop(atoms);

        self.set_title(&desc.title);

        if let (Some(position), Positioning::Frame) = (position, desc.positioning) {
            self.request_frame_extents();
            match self.refresh_frame_extents() {
                Some(extents) => {
                    let client = position + Vec2::new(extents.x0, extents.y0);
                    self.update_geometry(|geometry| geometry.requested_position = Some(client));
                    creation(
                        conn.configure_window(
                            id,
                            &ConfigureWindowAux::new()
                                .x(client.x as i32)
                                .y(client.y as i32),
                        ),
                        "move window inside its frame",
                    )?;
                }
                None => {
                    debug!("Frame extents unknown, positioning window {:#x} once mapped", id);
                    self.update_deferred(|deferred| deferred.frame_position = Some(position));
                    self.update_state(|state| state.frame_compensation_pending = true);
                }
            }
        } else if let Some(position) = position {
            self.update_geometry(|geometry| geometry.requested_position = Some(position));
        }
        Ok(())
    }

    /// Release the native window and everything it owns.
    ///
    /// All cached state goes back to its defaults. Calling this again does nothing.
    pub fn destroy(&self) {
        let id = self.id.replace(0);
        if id == 0 {
            return;
        }
        debug!("Destroying window {:#x}", id);
        let conn = self.conn.as_ref();
        if let Some((pixmap, cursor)) = self.blank_cursor.take() {
            log_x11!(conn.free_cursor(cursor));
            log_x11!(conn.free_pixmap(pixmap));
        }
        log_x11!(conn.destroy_window(id));
        if let Some(colormap) = self.colormap.take() {
            log_x11!(conn.free_colormap(colormap));
        }
        log_x11!(conn.flush());
        if let Some(queue) = self.queue.upgrade() {
            queue.remove_client(id);
        }

        self.geometry.set(Geometry::default());
        self.state.set(Lifecycle::default());
        self.deferred.set(Deferred::default());
        self.invalid.set(None);
        self.enabled.set(true);
        match self.title.try_borrow_mut() {
            Ok(mut title) => title.clear(),
            Err(_) => error!("title was borrowed while destroying window {:#x}", id),
        }
        match self.atoms.try_borrow_mut() {
            Ok(mut atoms) => atoms.clear(),
            Err(_) => error!("atoms were borrowed while destroying window {:#x}", id),
        }
        if let Ok(mut keyboard) = self.keyboard.try_borrow_mut() {
            keyboard.reset();
        }
        if let Ok(mut mouse) = self.mouse.try_borrow_mut() {
            *mouse = Mouse::new();
        }
    }

    /// The X11 window id, 0 once destroyed.
    pub fn id(&self) -> xproto::Window {
        self.id.get()
    }

    pub fn handle(&self) -> WindowHandle {
        let window = self.id();
        WindowHandle {
            connection: (window != 0).then(|| Rc::clone(&self.conn)),
            screen: self.screen.num,
            window,
        }
    }

    fn destroyed(&self) -> bool {
        self.id() == 0
    }

    fn alive(&self) -> Result<xproto::Window, Error> {
        match self.id() {
            0 => Err(StateError::Destroyed.into()),
            id => Ok(id),
        }
    }

    #[track_caller]
    fn with_handler<T, F: FnOnce(&mut dyn WinHandler) -> T>(&self, f: F) -> Option<T> {
        match self.handler.try_borrow_mut() {
            Ok(mut h) => Some(f(&mut **h)),
            Err(_) => {
                error!("failed to borrow WinHandler at {}", Location::caller());
                None
            }
        }
    }

    fn update_geometry(&self, f: impl FnOnce(&mut Geometry)) {
        let mut geometry = self.geometry.get();
        f(&mut geometry);
        self.geometry.set(geometry);
    }

    fn update_state(&self, f: impl FnOnce(&mut Lifecycle)) {
        let mut state = self.state.get();
        f(&mut state);
        self.state.set(state);
    }

    fn update_deferred(&self, f: impl FnOnce(&mut Deferred)) {
        let mut deferred = self.deferred.get();
        f(&mut deferred);
        self.deferred.set(deferred);
    }

    fn wm_hints(&self) -> WmHints {
        let mut hints = WmHints::new();
        hints.input = Some(self.input_focus && self.enabled.get());
        hints
    }

    fn push_size_hints(&self) -> Result<(), BackendError> {
        let geometry = self.geometry.get();
        self.conn.set_normal_hints(
            self.id(),
            &size_hints(geometry.min_size, geometry.max_size),
        )
    }

    fn send_to_root(&self, event: &ClientMessageEvent) -> Result<(), BackendError> {
        self.conn.send_client_message(
            self.screen.root,
            EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT,
            event,
        )?;
        self.conn.flush()
    }

    /// Ask the window manager to compute our frame extents before we are mapped.
    fn request_frame_extents(&self) {
        let atoms = self.atoms.borrow();
        if !atoms.is_supported("_NET_REQUEST_FRAME_EXTENTS") {
            return;
        }
        let event = ClientMessageEvent::new(
            32,
            self.id(),
            atoms.lookup("_NET_REQUEST_FRAME_EXTENTS"),
            [0u32; 5],
        );
        log_x11!(self.send_to_root(&event));
    }

    /// Re-read `_NET_FRAME_EXTENTS` into the cache. Returns the extents if the window
    /// manager has set them.
    fn refresh_frame_extents(&self) -> Option<Insets> {
        let extents = {
            let atoms = self.atoms.borrow();
            if !atoms.exists("_NET_FRAME_EXTENTS") {
                return None;
            }
            match self
                .conn
                .get_property32(self.id(), atoms.lookup("_NET_FRAME_EXTENTS"))
            {
                Ok(Some(values)) if values.len() >= 4 => {
                    let side = |i: usize| f64::from(values[i]);
                    // The property is ordered left, right, top, bottom.
                    Insets::new(side(0), side(2), side(1), side(3))
                }
                Ok(_) => return None,
                Err(err) => {
                    debug!("Failed to read _NET_FRAME_EXTENTS: {}", err);
                    return None;
                }
            }
        };
        self.update_geometry(|geometry| geometry.frame_extents = extents);
        self.update_state(|state| state.frame_extents_known = true);
        Some(extents)
    }

    fn configure(&self, changes: &ConfigureWindowAux) {
        log_x11!(self.conn.configure_window(self.id(), changes));
        log_x11!(self.conn.flush());
    }

    /// Move the window, in display points.
    ///
    /// With `client_area` the position is the top-left corner of the client area,
    /// otherwise it is the top-left corner of the frame. An unmapped window stores the
    /// request and applies it when it is mapped, which is reported as
    /// [`Placement::Deferred`].
    pub fn set_position(&self, position: Point, client_area: bool) -> Result<Placement, Error> {
        self.alive()?;
        let state = self.state.get();
        let position = position.to_px(self.scale.get()).round();
        if !client_area && !state.frame_extents_known && !state.mapped {
            self.update_deferred(|deferred| deferred.frame_position = Some(position));
            self.update_state(|state| state.frame_compensation_pending = true);
            return Ok(Placement::Deferred);
        }
        let position = if client_area {
            position
        } else {
            let extents = self.geometry.get().frame_extents;
            position + Vec2::new(extents.x0, extents.y0)
        };
        self.update_geometry(|geometry| geometry.requested_position = Some(position));
        if !state.mapped {
            self.update_deferred(|deferred| {
                deferred.position = Some(position);
                deferred.frame_position = None;
            });
            return Ok(Placement::Deferred);
        }
        self.configure(
            &ConfigureWindowAux::new()
                .x(position.x as i32)
                .y(position.y as i32),
        );
        Ok(Placement::Applied)
    }

    /// Resize the window, in display points.
    ///
    /// Without `client_area` the size includes the frame. Like
    /// [`set_position`](Window::set_position), unmapped windows defer the request, and a
    /// frame size waits for the frame extents if they are not known yet.
    pub fn set_size(&self, size: Size, client_area: bool) -> Result<Placement, Error> {
        self.alive()?;
        let state = self.state.get();
        let geometry = self.geometry.get();
        let mut size = size.to_px(self.scale.get()).round();
        if !client_area && !state.frame_extents_known && !state.mapped {
            self.update_deferred(|deferred| {
                deferred.frame_size = Some(size);
                deferred.size = None;
            });
            self.update_state(|state| state.frame_compensation_pending = true);
            return Ok(Placement::Deferred);
        }
        if !client_area {
            let extents = geometry.frame_extents;
            size = Size::new(
                size.width - extents.x_value(),
                size.height - extents.y_value(),
            );
        }
        let size = clamp_size(size);
        self.update_geometry(|geometry| geometry.requested_size = size);
        if !state.mapped {
            self.update_deferred(|deferred| {
                deferred.size = Some(size);
                deferred.frame_size = None;
            });
            return Ok(Placement::Deferred);
        }
        self.configure(
            &ConfigureWindowAux::new()
                .width(size.width as u32)
                .height(size.height as u32),
        );
        Ok(Placement::Applied)
    }

    /// Set the smallest client area size the window manager should allow, in display
    /// points. A maximum size below it is raised to match.
    pub fn set_minimum_size(&self, size: Size) {
        if self.destroyed() {
            return;
        }
        let min = clamp_size(size.to_px(self.scale.get()).round());
        self.update_geometry(|geometry| {
            geometry.min_size = min;
            geometry.max_size = geometry.max_size.map(|max| {
                Size::new(max.width.max(min.width), max.height.max(min.height))
            });
        });
        log_x11!(self.push_size_hints());
        log_x11!(self.conn.flush());
    }

    /// Set the largest client area size the window manager should allow, in display
    /// points. It is never below the minimum size.
    pub fn set_maximum_size(&self, size: Size) {
        if self.destroyed() {
            return;
        }
        let max = size.to_px(self.scale.get()).round();
        self.update_geometry(|geometry| {
            geometry.max_size = Some(Size::new(
                max.width.max(geometry.min_size.width),
                max.height.max(geometry.min_size.height),
            ));
        });
        log_x11!(self.push_size_hints());
        log_x11!(self.conn.flush());
    }

    pub fn set_title(&self, title: &str) {
        if self.destroyed() {
            return;
        }
        let atoms = self.atoms.borrow();
        // This is technically incorrect. STRING encoding is *not* UTF8. Hopefully, nothing
        // cares about this as long as _NET_WM_NAME is also set (which uses UTF8).
        log_x11!(self.conn.change_property8(
            self.id(),
            AtomEnum::WM_NAME.into(),
            AtomEnum::STRING.into(),
            title.as_bytes(),
        ));
        if atoms.exists("_NET_WM_NAME") && atoms.exists("UTF8_STRING") {
            log_x11!(self.conn.change_property8(
                self.id(),
                atoms.lookup("_NET_WM_NAME"),
                atoms.lookup("UTF8_STRING"),
                title.as_bytes(),
            ));
        }
        title.clone_into(&mut self.title.borrow_mut());
    }

    pub fn title(&self) -> String {
        self.title.borrow().clone()
    }

    /// Enable or disable keyboard and pointer input.
    pub fn set_enabled(&self, enabled: bool) {
        if self.destroyed() || self.enabled.get() == enabled {
            return;
        }
        self.enabled.set(enabled);
        log_x11!(self.conn.set_wm_hints(self.id(), &self.wm_hints()));
        log_x11!(self.conn.flush());
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn set_cursor_attribute(&self, cursor: xproto::Cursor) {
        let changes = ChangeWindowAttributesAux::new().cursor(cursor);
        if let Err(e) = self.conn.change_window_attributes(self.id(), &changes) {
            error!("Changing cursor window attribute failed {}", e);
        }
        log_x11!(self.conn.flush());
    }

    /// Use the parent window's cursor again.
    pub fn show_system_cursor(&self) {
        if !self.destroyed() {
            self.set_cursor_attribute(x11rb::NONE);
        }
    }

    /// Make the pointer invisible over this window.
    pub fn hide_system_cursor(&self) {
        if self.destroyed() {
            return;
        }
        let cursor = match self.blank_cursor.get() {
            Some((_, cursor)) => cursor,
            None => match self.conn.create_blank_cursor() {
                Ok((pixmap, cursor)) => {
                    self.blank_cursor.set(Some((pixmap, cursor)));
                    cursor
                }
                Err(e) => {
                    error!("Failed to create a blank cursor: {}", e);
                    return;
                }
            },
        };
        self.set_cursor_attribute(cursor);
    }

    pub fn set_cursor(&self, cursor: Cursor) {
        if self.destroyed() {
            return;
        }
        match self.conn.load_cursor(cursor_name(cursor)) {
            Some(native) => self.set_cursor_attribute(native),
            None => warn!("Unable to load cursor {:?}", cursor),
        }
    }

    /// Map the window. With `activate`, also raise it and give it focus.
    pub fn show(&self, activate: bool) {
        if self.destroyed() {
            return;
        }
        self.update_state(|state| state.mapped = true);
        log_x11!(self.conn.map_window(self.id()));
        if activate {
            self.bring_to_front();
        }
        log_x11!(self.conn.flush());
    }

    /// Unmap the window. This is not reported as a minimize.
    pub fn hide(&self) {
        if self.destroyed() || !self.state.get().mapped {
            return;
        }
        self.update_state(|state| {
            state.mapped = false;
            state.pending_unmaps += 1;
        });
        log_x11!(self.conn.unmap_window(self.id()));
        log_x11!(self.conn.flush());
    }

    /// Bring this window to the front of the window stack and give it focus.
    pub fn bring_to_front(&self) {
        if self.destroyed() {
            return;
        }
        log_x11!(self
            .conn
            .configure_window(self.id(), &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE)));
        log_x11!(self.conn.set_input_focus(self.id()));
        log_x11!(self.conn.flush());
    }

    /// Ask the server for a full-window `Expose`, which ends up in
    /// [`WinHandler::paint`].
    pub fn request_repaint(&self) {
        if self.destroyed() {
            return;
        }
        log_x11!(self.conn.clear_area(self.id()));
        log_x11!(self.conn.flush());
    }

    /// Ask the window manager to enter or leave fullscreen.
    ///
    /// Returns whether a request was made. The change itself is up to the window manager;
    /// query [`is_fullscreen`](Window::is_fullscreen) to observe it.
    pub fn set_fullscreen(&self, fullscreen: bool) -> bool {
        if self.destroyed() {
            return false;
        }
        if !self.atoms.borrow().is_supported("_NET_WM_STATE_FULLSCREEN") {
            info!("_NET_WM_STATE_FULLSCREEN is not supported by the window manager");
            return false;
        }
        if self.is_fullscreen() == fullscreen {
            debug!("Window {:#x} fullscreen is already {}", self.id(), fullscreen);
            return false;
        }
        self.update_state(|state| state.fullscreen_requested = fullscreen);
        let atoms = self.atoms.borrow();
        if !self.state.get().mapped {
            // Window managers only read the property of unmapped windows.
            let property = atoms.lookup("_NET_WM_STATE");
            let flag = atoms.lookup("_NET_WM_STATE_FULLSCREEN");
            let mut data = match self.conn.get_property32(self.id(), property) {
                Ok(Some(data)) => data,
                Ok(None) => Vec::new(),
                Err(err) => {
                    warn!("Failed to read _NET_WM_STATE of {:#x}: {}", self.id(), err);
                    Vec::new()
                }
            };
            data.retain(|&atom| atom != flag);
            if fullscreen {
                data.push(flag);
            }
            let result = self.conn.change_property32(
                self.id(),
                property,
                AtomEnum::ATOM.into(),
                &data,
            );
            log_x11!(&result);
            return result.is_ok();
        }
        let action = if fullscreen {
            StateAction::Add
        } else {
            StateAction::Remove
        };
        atoms.request_state_change(
            self.conn.as_ref(),
            self.screen.root,
            self.id(),
            action,
            "_NET_WM_STATE_FULLSCREEN",
            None,
        )
    }

    /// Ask the window manager to iconify the window, following ICCCM.
    pub fn minimize(&self) -> Result<(), Error> {
        let id = self.alive()?;
        if !self.state.get().mapped {
            return Err(StateError::Unmapped.into());
        }
        let atoms = self.atoms.borrow();
        if !atoms.exists("WM_CHANGE_STATE") {
            info!("WM_CHANGE_STATE is not provided by the server");
            return Ok(());
        }
        let event = ClientMessageEvent::new(
            32,
            id,
            atoms.lookup("WM_CHANGE_STATE"),
            [ICONIC_STATE, 0, 0, 0, 0],
        );
        self.send_to_root(&event)?;
        Ok(())
    }

    /// Ask the window manager to maximize the window in both directions.
    pub fn maximize(&self) -> bool {
        if self.destroyed() {
            return false;
        }
        let atoms = self.atoms.borrow();
        if !atoms.is_supported("_NET_WM_STATE_MAXIMIZED_HORZ")
            || !atoms.is_supported("_NET_WM_STATE_MAXIMIZED_VERT")
        {
            info!("Maximizing is not supported by the window manager");
            return false;
        }
        atoms.request_state_change(
            self.conn.as_ref(),
            self.screen.root,
            self.id(),
            StateAction::Add,
            "_NET_WM_STATE_MAXIMIZED_HORZ",
            Some("_NET_WM_STATE_MAXIMIZED_VERT"),
        )
    }

    /// Undo a minimize or a maximize. Does nothing if the window is neither.
    pub fn restore(&self) -> Result<(), Error> {
        let id = self.alive()?;
        if self.is_minimized() {
            debug!("Restoring minimized window {:#x}", id);
            self.conn.map_window(id)?;
            self.conn.flush()?;
        } else if self.is_maximized() {
            debug!("Restoring maximized window {:#x}", id);
            self.atoms.borrow().request_state_change(
                self.conn.as_ref(),
                self.screen.root,
                id,
                StateAction::Remove,
                "_NET_WM_STATE_MAXIMIZED_HORZ",
                Some("_NET_WM_STATE_MAXIMIZED_VERT"),
            );
        }
        Ok(())
    }

    /// Route pointer events of every window on this queue to this one, or stop doing so.
    pub fn capture_mouse(&self, capture: bool) {
        if let (Some(queue), Some(this)) = (self.queue.upgrade(), self.this.upgrade()) {
            queue.set_mouse_capture(&this, capture);
        }
    }

    /// Filter pointer events before they are translated. The predicate gets the
    /// window-local position in display points; returning `false` drops the event.
    pub fn set_click_predicate(&self, predicate: Option<Box<dyn FnMut(Point) -> bool>>) {
        *self.click_predicate.borrow_mut() = predicate;
    }

    /// Called with the new client area size in pixels, before [`WinHandler::resized`].
    pub fn set_resize_hook(&self, hook: Option<Box<dyn FnMut(Size)>>) {
        *self.resize_hook.borrow_mut() = hook;
    }

    pub fn has_focus(&self) -> Result<bool, Error> {
        let id = self.alive()?;
        Ok(self.conn.input_focus()? == id)
    }

    /// Whether the server considers the window viewable.
    pub fn is_visible(&self) -> Result<bool, Error> {
        let id = self.alive()?;
        Ok(self.conn.map_state(id)? == MapState::VIEWABLE)
    }

    /// Whether `_NET_WM_STATE` currently contains all of `names`.
    fn has_state(&self, names: &[&str]) -> bool {
        if self.destroyed() {
            return false;
        }
        let flags = self
            .atoms
            .borrow()
            .read_state_flags(self.conn.as_ref(), self.id(), names);
        !flags.is_empty() && flags.iter().all(|&flag| flag)
    }

    pub fn is_fullscreen(&self) -> bool {
        self.has_state(&["_NET_WM_STATE_FULLSCREEN"])
    }

    pub fn is_maximized(&self) -> bool {
        self.has_state(&["_NET_WM_STATE_MAXIMIZED_HORZ", "_NET_WM_STATE_MAXIMIZED_VERT"])
    }

    pub fn is_minimized(&self) -> bool {
        self.state.get().externally_minimized || self.has_state(&["_NET_WM_STATE_HIDDEN"])
    }

    /// Whether the window is mapped, as far as this side knows.
    pub fn is_mapped(&self) -> bool {
        self.state.get().mapped
    }

    pub fn scale(&self) -> Scale {
        self.scale.get()
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.scale.get().x()
    }

    /// Change the pixel ratio. `None` derives it from the screen density again.
    ///
    /// Later events and queries use the new ratio. Nothing already reported is replayed.
    pub fn set_pixel_ratio(&self, ratio: Option<f64>) {
        let scale = match ratio {
            Some(ratio) if ratio > 0.0 => Scale::uniform(ratio),
            _ => Scale::from_ppi(self.ppi()),
        };
        debug!("Window {:#x} pixel ratio is now {}", self.id(), scale.x());
        self.scale.set(scale);
    }

    /// The physical density of the screen.
    pub fn ppi(&self) -> f64 {
        self.ppi.get()
    }

    /// The frame rectangle on screen, decorations included.
    pub fn geometry(&self) -> Rect {
        let geometry = self.geometry.get();
        (geometry.client_rect() + geometry.frame_extents).to_dp(self.scale.get())
    }

    /// The client area in its own coordinates.
    pub fn viewport(&self) -> Rect {
        Rect::from_origin_size(Point::ORIGIN, self.geometry.get().size).to_dp(self.scale.get())
    }

    /// The client area on screen.
    pub fn screen_position(&self) -> Rect {
        self.geometry.get().client_rect().to_dp(self.scale.get())
    }

    pub fn frame_extents(&self) -> Insets {
        self.geometry.get().frame_extents.to_dp(self.scale.get())
    }

    pub fn minimum_size(&self) -> Size {
        self.geometry.get().min_size.to_dp(self.scale.get())
    }

    pub fn maximum_size(&self) -> Option<Size> {
        let scale = self.scale.get();
        self.geometry.get().max_size.map(|max| max.to_dp(scale))
    }

    /// The client area position most recently requested, if it is final.
    pub fn last_requested_position(&self) -> Option<Point> {
        let scale = self.scale.get();
        self.geometry
            .get()
            .requested_position
            .map(|pos| pos.to_dp(scale))
    }

    pub fn last_requested_size(&self) -> Size {
        self.geometry.get().requested_size.to_dp(self.scale.get())
    }

    pub fn client_to_screen(&self, point: Point) -> Point {
        point + self.screen_position().origin().to_vec2()
    }

    pub fn screen_to_client(&self, point: Point) -> Point {
        point - self.screen_position().origin().to_vec2()
    }

    /// The keyboard adapter of this window.
    pub fn keyboard(&self) -> std::cell::Ref<'_, Keyboard> {
        self.keyboard.borrow()
    }

    /// The mouse adapter of this window.
    pub fn mouse(&self) -> std::cell::Ref<'_, Mouse> {
        self.mouse.borrow()
    }

    /// Translate one event for this window and call the handler.
    ///
    /// `capture` is the window holding the mouse capture, or this window if there is
    /// none. Pointer events are delivered to it.
    pub fn process_event(&self, event: &Event, capture: &Window) -> anyhow::Result<()> {
        if self.destroyed() {
            trace!("Dropping event for destroyed window");
            return Ok(());
        }
        match event {
            Event::KeyPress(ev) => self.handle_key(ev.detail, ev.state, KeyState::Down)?,
            Event::KeyRelease(ev) => self.handle_key(ev.detail, ev.state, KeyState::Up)?,
            Event::ButtonPress(ev) => self.handle_pointer(
                Pointer::Press(ev.detail),
                ev.event_x,
                ev.event_y,
                ev.state,
                capture,
            )?,
            Event::ButtonRelease(ev) => self.handle_pointer(
                Pointer::Release(ev.detail),
                ev.event_x,
                ev.event_y,
                ev.state,
                capture,
            )?,
            Event::MotionNotify(ev) => {
                self.handle_pointer(Pointer::Motion, ev.event_x, ev.event_y, ev.state, capture)?
            }
            Event::FocusIn(_) => self.handle_focus(true)?,
            Event::FocusOut(_) => self.handle_focus(false)?,
            Event::Expose(ev) => self.handle_expose(ev),
            Event::ConfigureNotify(ev) => self.handle_configure_notify(ev)?,
            Event::MapNotify(_) => self.handle_map_notify(),
            Event::UnmapNotify(_) => self.handle_unmap_notify(),
            Event::ClientMessage(ev) => self.handle_client_message(ev)?,
            Event::PropertyNotify(ev) => self.handle_property_notify(ev),
            Event::DestroyNotify(_) => debug!("Ignoring DestroyNotify"),
            Event::ReparentNotify(_) => debug!("Ignoring ReparentNotify"),
            Event::GravityNotify(_) => debug!("Ignoring GravityNotify"),
            Event::CirculateNotify(_) => debug!("Ignoring CirculateNotify"),
            Event::VisibilityNotify(_) => debug!("Ignoring VisibilityNotify"),
            Event::EnterNotify(_) => debug!("Ignoring EnterNotify"),
            Event::LeaveNotify(_) => debug!("Ignoring LeaveNotify"),
            Event::KeymapNotify(_) => debug!("Ignoring KeymapNotify"),
            Event::MappingNotify(_) => debug!("Ignoring MappingNotify"),
            Event::GraphicsExposure(_) => debug!("Ignoring GraphicsExposure"),
            Event::NoExposure(_) => debug!("Ignoring NoExposure"),
            Event::ColormapNotify(_) => debug!("Ignoring ColormapNotify"),
            Event::CreateNotify(_) => debug!("Ignoring CreateNotify"),
            Event::SelectionClear(_) => debug!("Ignoring SelectionClear"),
            Event::SelectionNotify(_) => debug!("Ignoring SelectionNotify"),
            Event::SelectionRequest(_) => debug!("Ignoring SelectionRequest"),
            Event::MapRequest(_) => debug!("Ignoring MapRequest"),
            Event::ConfigureRequest(_) => debug!("Ignoring ConfigureRequest"),
            Event::CirculateRequest(_) => debug!("Ignoring CirculateRequest"),
            Event::ResizeRequest(_) => debug!("Ignoring ResizeRequest"),
            Event::Error(e) => warn!("X11 error: {:?}", e),
            ev => debug!("Ignoring unhandled event {:?}", ev),
        }
        Ok(())
    }

    fn handle_key(&self, keycode: u8, state: u16, key_state: KeyState) -> anyhow::Result<()> {
        if !self.enabled.get() {
            trace!("Dropping key event for disabled window");
            return Ok(());
        }
        let event = borrow_mut!(self.keyboard)?.key_event(keycode, state, key_state);
        self.with_handler(|h| match key_state {
            KeyState::Down => {
                h.key_down(&event);
            }
            KeyState::Up => h.key_up(&event),
        });
        Ok(())
    }

    fn handle_pointer(
        &self,
        pointer: Pointer,
        x: i16,
        y: i16,
        state: u16,
        capture: &Window,
    ) -> anyhow::Result<()> {
        if !self.enabled.get() {
            trace!("Dropping pointer event for disabled window");
            return Ok(());
        }
        let raw = Point::new(x.into(), y.into());
        if let Some(predicate) = borrow_mut!(self.click_predicate)?.as_mut() {
            if !predicate(raw.to_dp(self.scale.get())) {
                trace!("Pointer event at {:?} rejected by the click predicate", raw);
                return Ok(());
            }
        }
        // Under capture, express the position relative to the capturing window's client
        // area.
        let pos = if std::ptr::eq(self, capture) {
            raw
        } else {
            raw + (self.geometry.get().position - capture.geometry.get().position)
        };
        capture.dispatch_pointer(pointer, state, pos.to_dp(capture.scale.get()))
    }

    fn dispatch_pointer(&self, pointer: Pointer, state: u16, pos: Point) -> anyhow::Result<()> {
        let input = {
            let mut mouse = borrow_mut!(self.mouse)?;
            match pointer {
                Pointer::Press(button) => Some(mouse.button_press(button, state, pos)),
                Pointer::Release(button) => mouse.button_release(button, state, pos),
                Pointer::Motion => Some(mouse.motion(state, pos)),
            }
        };
        match input {
            Some(MouseInput::Down(event)) => self.with_handler(|h| h.mouse_down(&event)),
            Some(MouseInput::Up(event)) => self.with_handler(|h| h.mouse_up(&event)),
            Some(MouseInput::Move(event)) => self.with_handler(|h| h.mouse_move(&event)),
            Some(MouseInput::Wheel(event)) => self.with_handler(|h| h.wheel(&event)),
            None => None,
        };
        Ok(())
    }

    fn handle_focus(&self, gained: bool) -> anyhow::Result<()> {
        let focused = self.has_focus().context("query input focus")?;
        if focused != gained {
            warn!(
                "Ignoring focus {} event for window {:#x}, which does {}have focus",
                if gained { "in" } else { "out" },
                self.id(),
                if focused { "" } else { "not " }
            );
            return Ok(());
        }
        if gained {
            self.with_handler(|h| h.got_focus());
        } else {
            borrow_mut!(self.keyboard)?.reset();
            self.with_handler(|h| h.lost_focus());
        }
        Ok(())
    }

    fn handle_expose(&self, expose: &ExposeEvent) {
        let rect = Rect::from_origin_size(
            (f64::from(expose.x), f64::from(expose.y)),
            (f64::from(expose.width), f64::from(expose.height)),
        );
        let invalid = match self.invalid.get() {
            Some(invalid) => invalid.union(rect),
            None => rect,
        };
        // Only the last event of a batch has a count of zero.
        if expose.count > 0 {
            self.invalid.set(Some(invalid));
            return;
        }
        self.invalid.set(None);
        let invalid = invalid.to_dp(self.scale.get());
        self.with_handler(|h| h.paint(invalid));
    }

    fn handle_configure_notify(&self, event: &ConfigureNotifyEvent) -> anyhow::Result<()> {
        // Synthetic events come from the window manager and carry root coordinates. Real
        // ones are relative to the parent, which is the frame once we are reparented.
        let (x, y) = if event.response_type & 0x80 != 0 {
            (event.x, event.y)
        } else {
            self.conn
                .translate_coordinates(self.id(), self.screen.root, 0, 0)
                .context("translate window position")?
        };
        let position = Point::new(x.into(), y.into());
        let size = Size::new(event.width.into(), event.height.into());

        let old = self.geometry.get();
        let moved = position != old.position;
        let resized = size != old.size;
        if moved && self.state.get().frame_compensation_pending {
            debug!("Ignoring provisional position {:?} until the frame is known", position);
        } else if moved {
            self.update_geometry(|geometry| geometry.position = position);
            let position = position.to_dp(self.scale.get());
            self.with_handler(|h| h.moved(position));
        }
        if resized {
            self.update_geometry(|geometry| geometry.size = size);
            if let Some(hook) = borrow_mut!(self.resize_hook)?.as_mut() {
                hook(size);
            }
            let size = size.to_dp(self.scale.get());
            self.with_handler(|h| h.resized(size));
        }
        Ok(())
    }

    fn handle_map_notify(&self) {
        // With our own unmap still in flight the window is on its way out again.
        self.update_state(|state| {
            if state.pending_unmaps == 0 {
                state.mapped = true;
            }
        });

        if self.state.get().frame_compensation_pending {
            if self.refresh_frame_extents().is_none() {
                debug!("Frame extents still unknown after map, assuming no frame");
            }
            self.update_state(|state| state.frame_compensation_pending = false);
            let extents = self.geometry.get().frame_extents;
            let deferred = self.deferred.get();
            if let Some(frame_position) = deferred.frame_position {
                let position = frame_position + Vec2::new(extents.x0, extents.y0);
                self.update_geometry(|geometry| geometry.requested_position = Some(position));
                self.update_deferred(|deferred| {
                    deferred.frame_position = None;
                    deferred.position = Some(position);
                });
            }
            if let Some(frame_size) = deferred.frame_size {
                let size = clamp_size(Size::new(
                    frame_size.width - extents.x_value(),
                    frame_size.height - extents.y_value(),
                ));
                self.update_geometry(|geometry| geometry.requested_size = size);
                self.update_deferred(|deferred| {
                    deferred.frame_size = None;
                    deferred.size = Some(size);
                });
            }
        }

        let deferred = self.deferred.replace(Deferred::default());
        if deferred.position.is_some() || deferred.size.is_some() {
            let mut changes = ConfigureWindowAux::new();
            if let Some(position) = deferred.position {
                changes = changes.x(position.x as i32).y(position.y as i32);
            }
            if let Some(size) = deferred.size {
                changes = changes.width(size.width as u32).height(size.height as u32);
            }
            self.configure(&changes);
        }

        if self.state.get().externally_minimized {
            self.update_state(|state| state.externally_minimized = false);
            self.with_handler(|h| h.restored());
        }
    }

    fn handle_unmap_notify(&self) {
        if self.state.get().pending_unmaps > 0 {
            self.update_state(|state| state.pending_unmaps -= 1);
            return;
        }
        self.update_state(|state| {
            state.mapped = false;
            state.externally_minimized = true;
        });
        self.with_handler(|h| h.minimized());
    }

    fn handle_client_message(&self, message: &ClientMessageEvent) -> anyhow::Result<()> {
        // https://www.x.org/releases/X11R7.6/doc/xorg-docs/specs/ICCCM/icccm.html#window_deletion
        let atoms = self.atoms.borrow();
        if message.type_ != atoms.lookup("WM_PROTOCOLS") || message.format != 32 {
            debug!("Ignoring client message of type {}", message.type_);
            return Ok(());
        }
        let protocol = message.data.as_data32()[0];
        if atoms.exists("_NET_WM_PING") && protocol == atoms.lookup("_NET_WM_PING") {
            // Send the ping back to the root window to show we are alive.
            let mut reply = message.clone();
            reply.window = self.screen.root;
            drop(atoms);
            self.send_to_root(&reply).context("answer _NET_WM_PING")?;
        } else if protocol == atoms.lookup("WM_DELETE_WINDOW") {
            drop(atoms);
            self.with_handler(|h| h.request_close());
        } else {
            debug!("Ignoring WM_PROTOCOLS message for protocol {}", protocol);
        }
        Ok(())
    }

    fn handle_property_notify(&self, event: &PropertyNotifyEvent) {
        let is_frame_extents = {
            let atoms = self.atoms.borrow();
            atoms.exists("_NET_FRAME_EXTENTS") && event.atom == atoms.lookup("_NET_FRAME_EXTENTS")
        };
        if is_frame_extents {
            if let Some(extents) = self.refresh_frame_extents() {
                debug!("Frame extents of window {:#x} are now {:?}", self.id(), extents);
            }
        } else {
            trace!("Ignoring change of property {}", event.atom);
        }
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.id())
            .field("geometry", &self.geometry.get())
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
enum Pointer {
    Press(u8),
    Release(u8),
    Motion,
}
