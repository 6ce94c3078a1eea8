// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! An in-memory display server for tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::os::unix::io::RawFd;
use std::rc::Rc;

use nix::fcntl::OFlag;
use x11rb::errors::ConnectionError;
use x11rb::properties::{WmHints, WmSizeHints};
use x11rb::protocol::xproto::{
    self, Atom, ButtonPressEvent, ChangeWindowAttributesAux, ClientMessageEvent,
    ConfigureNotifyEvent, ConfigureWindowAux, EventMask, ExposeEvent, FocusInEvent,
    KeyPressEvent, MapNotifyEvent, MapState, MotionNotifyEvent, PropertyNotifyEvent,
    UnmapNotifyEvent,
};
use x11rb::protocol::Event;

use super::connection::{CreateWindow, ScreenInfo, XConnection};
use super::error::Error;
use crate::keyboard::KeyEvent;
use crate::kurbo::{Point, Rect, Size};
use crate::mouse::MouseEvent;
use crate::window::WinHandler;

pub(crate) const ROOT: xproto::Window = 1;

/// The parts of a `ConfigureWindow` request tests look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Configure {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub stack_mode: Option<u32>,
}

/// A request that changes server state, in the order it was made.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Request {
    CreateWindow {
        id: xproto::Window,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
        event_mask: Option<u32>,
        colormap: Option<xproto::Colormap>,
    },
    DestroyWindow(xproto::Window),
    Map(xproto::Window),
    Unmap(xproto::Window),
    Configure(xproto::Window, Configure),
    SetCursor(xproto::Window, Option<xproto::Cursor>),
    SetInputFocus(xproto::Window),
    ClearArea(xproto::Window),
    FreeColormap(xproto::Colormap),
    FreeCursor(xproto::Cursor),
    FreePixmap(xproto::Pixmap),
}

/// The size hints most recently set on a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SizeHints {
    pub min_size: Option<(i32, i32)>,
    pub max_size: Option<(i32, i32)>,
    pub win_gravity: Option<u32>,
}

/// An [`XConnection`] that answers from memory.
///
/// Atoms get increasing ids in the order they are first interned. Every name is known to
/// the "server" unless it was [forgotten](FakeConnection::forget_atom).
pub(crate) struct FakeConnection {
    screen: ScreenInfo,
    next_id: Cell<u32>,
    atoms: RefCell<HashMap<String, Atom>>,
    next_atom: Cell<Atom>,
    forgotten: RefCell<HashSet<String>>,
    properties32: RefCell<HashMap<(xproto::Window, Atom), (Atom, Vec<u32>)>>,
    properties8: RefCell<HashMap<(xproto::Window, Atom), (Atom, Vec<u8>)>>,
    map_states: RefCell<HashMap<xproto::Window, MapState>>,
    origins: RefCell<HashMap<xproto::Window, (i16, i16)>>,
    focus: Cell<xproto::Window>,
    requests: RefCell<Vec<Request>>,
    messages: RefCell<Vec<(xproto::Window, EventMask, ClientMessageEvent)>>,
    size_hints: RefCell<HashMap<xproto::Window, SizeHints>>,
    input_hints: RefCell<HashMap<xproto::Window, Option<bool>>>,
    events: RefCell<VecDeque<Event>>,
    fail_queries: Cell<bool>,
    fail_create: Cell<bool>,
    xft_dpi: Cell<Option<f64>>,
    flushes: Cell<usize>,
    pipe: (RawFd, RawFd),
}

impl FakeConnection {
    pub fn new() -> FakeConnection {
        let pipe = nix::unistd::pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC).expect("pipe");
        FakeConnection {
            screen: ScreenInfo {
                num: 0,
                root: ROOT,
                root_visual: 0x21,
                root_depth: 24,
                width_px: 1920,
                height_px: 1080,
                width_mm: 508,
                height_mm: 286,
            },
            next_id: Cell::new(0x0040_0000),
            atoms: RefCell::new(HashMap::new()),
            next_atom: Cell::new(100),
            forgotten: RefCell::new(HashSet::new()),
            properties32: RefCell::new(HashMap::new()),
            properties8: RefCell::new(HashMap::new()),
            map_states: RefCell::new(HashMap::new()),
            origins: RefCell::new(HashMap::new()),
            focus: Cell::new(ROOT),
            requests: RefCell::new(Vec::new()),
            messages: RefCell::new(Vec::new()),
            size_hints: RefCell::new(HashMap::new()),
            input_hints: RefCell::new(HashMap::new()),
            events: RefCell::new(VecDeque::new()),
            fail_queries: Cell::new(false),
            fail_create: Cell::new(false),
            xft_dpi: Cell::new(None),
            flushes: Cell::new(0),
            pipe,
        }
    }

    /// The atom for `name`, interning it if needed.
    pub fn atom(&self, name: &str) -> Atom {
        let mut atoms = self.atoms.borrow_mut();
        if let Some(&atom) = atoms.get(name) {
            return atom;
        }
        let atom = self.next_atom.get();
        self.next_atom.set(atom + 1);
        atoms.insert(name.to_owned(), atom);
        atom
    }

    /// Make the server pretend it has never heard of `name`.
    pub fn forget_atom(&self, name: &str) {
        self.forgotten.borrow_mut().insert(name.to_owned());
    }

    /// Publish `names` in the root window's `_NET_SUPPORTED`.
    pub fn advertise(&self, names: &[&str]) {
        let supported: Vec<u32> = names.iter().map(|name| self.atom(name)).collect();
        let net_supported = self.atom("_NET_SUPPORTED");
        let atom_type = u32::from(xproto::AtomEnum::ATOM);
        self.properties32
            .borrow_mut()
            .insert((ROOT, net_supported), (atom_type, supported));
    }

    pub fn set_property32(&self, window: xproto::Window, property: Atom, data: &[u32]) {
        self.properties32.borrow_mut().insert(
            (window, property),
            (u32::from(xproto::AtomEnum::CARDINAL), data.to_vec()),
        );
    }

    pub fn property32(&self, window: xproto::Window, property: Atom) -> Option<(Atom, Vec<u32>)> {
        self.properties32.borrow().get(&(window, property)).cloned()
    }

    pub fn property8(&self, window: xproto::Window, property: Atom) -> Option<(Atom, Vec<u8>)> {
        self.properties8.borrow().get(&(window, property)).cloned()
    }

    /// Set `_NET_FRAME_EXTENTS` as `[left, right, top, bottom]`.
    pub fn set_frame_extents(&self, window: xproto::Window, extents: [u32; 4]) {
        let property = self.atom("_NET_FRAME_EXTENTS");
        self.set_property32(window, property, &extents);
    }

    pub fn set_map_state(&self, window: xproto::Window, state: MapState) {
        self.map_states.borrow_mut().insert(window, state);
    }

    /// Place `window`'s client area at `origin` on the root window.
    pub fn set_origin(&self, window: xproto::Window, origin: (i16, i16)) {
        self.origins.borrow_mut().insert(window, origin);
    }

    pub fn set_focus(&self, window: xproto::Window) {
        self.focus.set(window);
    }

    pub fn set_xft_dpi(&self, dpi: Option<f64>) {
        self.xft_dpi.set(dpi);
    }

    /// Make property and attribute queries fail.
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.set(fail);
    }

    /// Make the server reject the next `CreateWindow`.
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.set(fail);
    }

    /// Queue an event for [`poll_for_event`](XConnection::poll_for_event).
    pub fn push_event(&self, event: Event) {
        self.events.borrow_mut().push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.borrow().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.borrow_mut().clear();
        self.messages.borrow_mut().clear();
    }

    pub fn sent_messages(&self) -> Vec<(xproto::Window, EventMask, ClientMessageEvent)> {
        self.messages.borrow().clone()
    }

    pub fn size_hints(&self, window: xproto::Window) -> Option<SizeHints> {
        self.size_hints.borrow().get(&window).copied()
    }

    pub fn input_hint(&self, window: xproto::Window) -> Option<bool> {
        self.input_hints.borrow().get(&window).copied().flatten()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.get()
    }

    fn query_error() -> Error {
        Error::from(ConnectionError::UnknownError)
    }

    fn record(&self, request: Request) {
        self.requests.borrow_mut().push(request);
    }

    fn origin(&self, window: xproto::Window) -> (i16, i16) {
        if window == ROOT {
            return (0, 0);
        }
        self.origins.borrow().get(&window).copied().unwrap_or((0, 0))
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        let _ = nix::unistd::close(self.pipe.0);
        let _ = nix::unistd::close(self.pipe.1);
    }
}

impl XConnection for FakeConnection {
    fn screen(&self) -> &ScreenInfo {
        &self.screen
    }

    fn generate_id(&self) -> Result<u32, Error> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Ok(id)
    }

    fn intern_atom(&self, name: &str, only_if_exists: bool) -> Result<Atom, Error> {
        if self.forgotten.borrow().contains(name) {
            if only_if_exists {
                return Ok(x11rb::NONE);
            }
            self.forgotten.borrow_mut().remove(name);
        }
        Ok(self.atom(name))
    }

    fn get_property32(
        &self,
        window: xproto::Window,
        property: Atom,
    ) -> Result<Option<Vec<u32>>, Error> {
        if self.fail_queries.get() {
            return Err(Self::query_error());
        }
        Ok(self
            .properties32
            .borrow()
            .get(&(window, property))
            .map(|(_, data)| data.clone()))
    }

    fn change_property32(
        &self,
        window: xproto::Window,
        property: Atom,
        type_: Atom,
        data: &[u32],
    ) -> Result<(), Error> {
        self.properties32
            .borrow_mut()
            .insert((window, property), (type_, data.to_vec()));
        Ok(())
    }

    fn change_property8(
        &self,
        window: xproto::Window,
        property: Atom,
        type_: Atom,
        data: &[u8],
    ) -> Result<(), Error> {
        self.properties8
            .borrow_mut()
            .insert((window, property), (type_, data.to_vec()));
        Ok(())
    }

    fn send_client_message(
        &self,
        destination: xproto::Window,
        mask: EventMask,
        event: &ClientMessageEvent,
    ) -> Result<(), Error> {
        self.messages
            .borrow_mut()
            .push((destination, mask, event.clone()));
        Ok(())
    }

    fn create_colormap(&self, _visual: xproto::Visualid) -> Result<xproto::Colormap, Error> {
        self.generate_id()
    }

    fn free_colormap(&self, colormap: xproto::Colormap) -> Result<(), Error> {
        self.record(Request::FreeColormap(colormap));
        Ok(())
    }

    fn create_window(&self, request: &CreateWindow) -> Result<(), Error> {
        if self.fail_create.get() {
            return Err(Self::query_error());
        }
        self.record(Request::CreateWindow {
            id: request.id,
            x: request.x,
            y: request.y,
            width: request.width,
            height: request.height,
            event_mask: request.aux.event_mask.map(u32::from),
            colormap: request.aux.colormap,
        });
        self.map_states
            .borrow_mut()
            .insert(request.id, MapState::UNMAPPED);
        Ok(())
    }

    fn destroy_window(&self, window: xproto::Window) -> Result<(), Error> {
        self.record(Request::DestroyWindow(window));
        Ok(())
    }

    fn map_window(&self, window: xproto::Window) -> Result<(), Error> {
        self.record(Request::Map(window));
        Ok(())
    }

    fn unmap_window(&self, window: xproto::Window) -> Result<(), Error> {
        self.record(Request::Unmap(window));
        Ok(())
    }

    fn configure_window(
        &self,
        window: xproto::Window,
        changes: &ConfigureWindowAux,
    ) -> Result<(), Error> {
        self.record(Request::Configure(
            window,
            Configure {
                x: changes.x,
                y: changes.y,
                width: changes.width,
                height: changes.height,
                stack_mode: changes.stack_mode.map(u32::from),
            },
        ));
        Ok(())
    }

    fn change_window_attributes(
        &self,
        window: xproto::Window,
        changes: &ChangeWindowAttributesAux,
    ) -> Result<(), Error> {
        self.record(Request::SetCursor(window, changes.cursor));
        Ok(())
    }

    fn map_state(&self, window: xproto::Window) -> Result<MapState, Error> {
        if self.fail_queries.get() {
            return Err(Self::query_error());
        }
        Ok(self
            .map_states
            .borrow()
            .get(&window)
            .copied()
            .unwrap_or(MapState::UNMAPPED))
    }

    fn input_focus(&self) -> Result<xproto::Window, Error> {
        if self.fail_queries.get() {
            return Err(Self::query_error());
        }
        Ok(self.focus.get())
    }

    fn set_input_focus(&self, window: xproto::Window) -> Result<(), Error> {
        self.record(Request::SetInputFocus(window));
        Ok(())
    }

    fn translate_coordinates(
        &self,
        src: xproto::Window,
        dst: xproto::Window,
        x: i16,
        y: i16,
    ) -> Result<(i16, i16), Error> {
        if self.fail_queries.get() {
            return Err(Self::query_error());
        }
        let (src_x, src_y) = self.origin(src);
        let (dst_x, dst_y) = self.origin(dst);
        Ok((x + src_x - dst_x, y + src_y - dst_y))
    }

    fn create_blank_cursor(&self) -> Result<(xproto::Pixmap, xproto::Cursor), Error> {
        Ok((self.generate_id()?, self.generate_id()?))
    }

    fn free_cursor(&self, cursor: xproto::Cursor) -> Result<(), Error> {
        self.record(Request::FreeCursor(cursor));
        Ok(())
    }

    fn free_pixmap(&self, pixmap: xproto::Pixmap) -> Result<(), Error> {
        self.record(Request::FreePixmap(pixmap));
        Ok(())
    }

    fn load_cursor(&self, name: &'static str) -> Option<xproto::Cursor> {
        // Themed cursors get stable ids derived from their name.
        Some(0x0100_0000 + name.len() as u32)
    }

    fn set_normal_hints(
        &self,
        window: xproto::Window,
        hints: &WmSizeHints,
    ) -> Result<(), Error> {
        self.size_hints.borrow_mut().insert(
            window,
            SizeHints {
                min_size: hints.min_size,
                max_size: hints.max_size,
                win_gravity: hints.win_gravity.map(u32::from),
            },
        );
        Ok(())
    }

    fn set_wm_hints(&self, window: xproto::Window, hints: &WmHints) -> Result<(), Error> {
        self.input_hints.borrow_mut().insert(window, hints.input);
        Ok(())
    }

    fn clear_area(&self, window: xproto::Window) -> Result<(), Error> {
        self.record(Request::ClearArea(window));
        Ok(())
    }

    fn xft_dpi(&self) -> Option<f64> {
        self.xft_dpi.get()
    }

    fn poll_for_event(&self) -> Result<Option<Event>, Error> {
        Ok(self.events.borrow_mut().pop_front())
    }

    fn flush(&self) -> Result<(), Error> {
        self.flushes.set(self.flushes.get() + 1);
        Ok(())
    }

    fn as_raw_fd(&self) -> RawFd {
        self.pipe.0
    }
}

/// A handler callback, as observed by [`RecordingHandler`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    RequestClose,
    GotFocus,
    LostFocus,
    Paint(Rect),
    Moved(Point),
    Resized(Size),
    Minimized,
    Restored,
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    MouseDown(MouseEvent),
    MouseUp(MouseEvent),
    MouseMove(MouseEvent),
    Wheel(MouseEvent),
}

/// A [`WinHandler`] that writes down every call it gets.
#[derive(Clone, Default)]
pub(crate) struct RecordingHandler {
    calls: Rc<RefCell<Vec<Call>>>,
}

impl RecordingHandler {
    pub fn new() -> RecordingHandler {
        RecordingHandler::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    fn push(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl WinHandler for RecordingHandler {
    fn request_close(&mut self) {
        self.push(Call::RequestClose);
    }

    fn got_focus(&mut self) {
        self.push(Call::GotFocus);
    }

    fn lost_focus(&mut self) {
        self.push(Call::LostFocus);
    }

    fn paint(&mut self, invalid: Rect) {
        self.push(Call::Paint(invalid));
    }

    fn moved(&mut self, pos: Point) {
        self.push(Call::Moved(pos));
    }

    fn resized(&mut self, size: Size) {
        self.push(Call::Resized(size));
    }

    fn minimized(&mut self) {
        self.push(Call::Minimized);
    }

    fn restored(&mut self) {
        self.push(Call::Restored);
    }

    fn key_down(&mut self, event: &KeyEvent) -> bool {
        self.push(Call::KeyDown(event.clone()));
        true
    }

    fn key_up(&mut self, event: &KeyEvent) {
        self.push(Call::KeyUp(event.clone()));
    }

    fn wheel(&mut self, event: &MouseEvent) {
        self.push(Call::Wheel(event.clone()));
    }

    fn mouse_move(&mut self, event: &MouseEvent) {
        self.push(Call::MouseMove(event.clone()));
    }

    fn mouse_down(&mut self, event: &MouseEvent) {
        self.push(Call::MouseDown(event.clone()));
    }

    fn mouse_up(&mut self, event: &MouseEvent) {
        self.push(Call::MouseUp(event.clone()));
    }
}

// Event builders. Fields the windowing layer doesn't read are zero.

const SYNTHETIC: u8 = 0x80;

pub(crate) fn key_press(window: xproto::Window, keycode: u8, state: u16) -> Event {
    Event::KeyPress(KeyPressEvent {
        response_type: xproto::KEY_PRESS_EVENT,
        detail: keycode,
        sequence: 0,
        time: 0,
        root: ROOT,
        event: window,
        child: x11rb::NONE,
        root_x: 0,
        root_y: 0,
        event_x: 0,
        event_y: 0,
        state,
        same_screen: true,
    })
}

pub(crate) fn button_press(window: xproto::Window, button: u8, x: i16, y: i16) -> Event {
    Event::ButtonPress(ButtonPressEvent {
        response_type: xproto::BUTTON_PRESS_EVENT,
        detail: button,
        sequence: 0,
        time: 0,
        root: ROOT,
        event: window,
        child: x11rb::NONE,
        root_x: x,
        root_y: y,
        event_x: x,
        event_y: y,
        state: 0,
        same_screen: true,
    })
}

pub(crate) fn motion(window: xproto::Window, x: i16, y: i16) -> Event {
    Event::MotionNotify(MotionNotifyEvent {
        response_type: xproto::MOTION_NOTIFY_EVENT,
        detail: xproto::Motion::NORMAL,
        sequence: 0,
        time: 0,
        root: ROOT,
        event: window,
        child: x11rb::NONE,
        root_x: x,
        root_y: y,
        event_x: x,
        event_y: y,
        state: 0,
        same_screen: true,
    })
}

fn focus_event(response_type: u8, window: xproto::Window) -> FocusInEvent {
    FocusInEvent {
        response_type,
        detail: xproto::NotifyDetail::NONLINEAR,
        sequence: 0,
        event: window,
        mode: xproto::NotifyMode::NORMAL,
    }
}

pub(crate) fn focus_in(window: xproto::Window) -> Event {
    Event::FocusIn(focus_event(xproto::FOCUS_IN_EVENT, window))
}

pub(crate) fn focus_out(window: xproto::Window) -> Event {
    Event::FocusOut(focus_event(xproto::FOCUS_OUT_EVENT, window))
}

pub(crate) fn expose(
    window: xproto::Window,
    x: u16,
    y: u16,
    width: u16,
    height: u16,
    count: u16,
) -> Event {
    Event::Expose(ExposeEvent {
        response_type: xproto::EXPOSE_EVENT,
        sequence: 0,
        window,
        x,
        y,
        width,
        height,
        count,
    })
}

/// A synthetic `ConfigureNotify`, which reports the position in root coordinates.
pub(crate) fn configure_notify(
    window: xproto::Window,
    x: i16,
    y: i16,
    width: u16,
    height: u16,
) -> Event {
    Event::ConfigureNotify(ConfigureNotifyEvent {
        response_type: xproto::CONFIGURE_NOTIFY_EVENT | SYNTHETIC,
        sequence: 0,
        event: window,
        window,
        above_sibling: x11rb::NONE,
        x,
        y,
        width,
        height,
        border_width: 0,
        override_redirect: false,
    })
}

pub(crate) fn map_notify(window: xproto::Window) -> Event {
    Event::MapNotify(MapNotifyEvent {
        response_type: xproto::MAP_NOTIFY_EVENT,
        sequence: 0,
        event: window,
        window,
        override_redirect: false,
    })
}

pub(crate) fn unmap_notify(window: xproto::Window) -> Event {
    Event::UnmapNotify(UnmapNotifyEvent {
        response_type: xproto::UNMAP_NOTIFY_EVENT,
        sequence: 0,
        event: window,
        window,
        from_configure: false,
    })
}

pub(crate) fn client_message(window: xproto::Window, type_: Atom, data: [u32; 5]) -> Event {
    Event::ClientMessage(ClientMessageEvent::new(32, window, type_, data))
}

pub(crate) fn property_notify(window: xproto::Window, atom: Atom) -> Event {
    Event::PropertyNotify(PropertyNotifyEvent {
        response_type: xproto::PROPERTY_NOTIFY_EVENT,
        sequence: 0,
        window,
        atom,
        time: 0,
        state: xproto::Property::NEW_VALUE,
    })
}
