// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! The per-thread event loop: window registry, event dispatch and cross-thread wake-ups.

use std::cell::{RefCell, RefMut};
use std::collections::{HashMap, HashSet, VecDeque};
use std::os::unix::io::RawFd;
use std::rc::{Rc, Weak};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::poll::{poll, PollFd, PollFlags};
use tracing::{debug, error, trace};
use x11rb::protocol::xproto;
use x11rb::protocol::Event;

use super::connection::{ScreenInfo, X11Connection, XConnection};
use super::error::Error as BackendError;
use super::window::Window;
use crate::error::Error;

type Work = Box<dyn FnOnce() + Send>;

/// A level-triggered flag backed by a non-blocking pipe, so it can be polled next to the
/// X connection.
#[derive(Debug)]
struct Signal {
    read: RawFd,
    write: RawFd,
}

impl Signal {
    fn new() -> Result<Signal, BackendError> {
        let (read, write) = nix::unistd::pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC)?;
        Ok(Signal { read, write })
    }

    fn set(&self) {
        loop {
            match nix::unistd::write(self.write, &[0]) {
                Err(Errno::EINTR) => {}
                // The pipe is full, so the signal is already set.
                Err(Errno::EAGAIN) => break,
                Err(e) => {
                    error!("Failed to write to signal pipe: {}", e);
                    break;
                }
                Ok(_) => break,
            }
        }
    }

    fn reset(&self) {
        let mut buf = [0u8; 16];
        loop {
            match nix::unistd::read(self.read, &mut buf) {
                Err(Errno::EINTR) => {}
                Ok(0) | Err(Errno::EAGAIN) => break,
                Ok(_) => {}
                Err(e) => {
                    error!("Failed to read from signal pipe: {}", e);
                    break;
                }
            }
        }
    }
}

impl Drop for Signal {
    fn drop(&mut self) {
        let _ = nix::unistd::close(self.read);
        let _ = nix::unistd::close(self.write);
    }
}

/// A handle to a [`MessageQueue`] that can be sent to other threads.
///
/// This is the only sanctioned way to talk to a queue from another thread: everything
/// else must be posted as work and run on the queue's own thread.
#[derive(Clone)]
pub struct QueueProxy {
    wake: Arc<Signal>,
    exit: Arc<Signal>,
    work: Arc<Mutex<Vec<Work>>>,
}

impl QueueProxy {
    /// Run `work` on the queue's thread, during its next wake-up.
    pub fn post<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.work
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(work));
        self.wake.set();
    }

    /// Wake the queue up so that it runs its async work handler.
    pub fn post_async_work_needed(&self) {
        self.wake.set();
    }

    /// Make the queue's current or next [`process`](MessageQueue::process) return `false`.
    pub fn exit(&self) {
        self.exit.set();
    }
}

/// Where a window id is in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Registered, but events are held back until the next housekeeping step.
    Born,
    /// Receiving events.
    Live,
    /// Being removed; its events are dropped.
    Dying,
}

/// The windows of one thread.
///
/// Membership only changes state between `born`, `live` and `dying` in
/// [`MessageQueue::dispatch_pending`], after all available events have been handled.
#[derive(Default)]
struct ThreadData {
    born: Vec<(xproto::Window, Rc<Window>)>,
    live: HashMap<xproto::Window, Rc<Window>>,
    dying: HashSet<xproto::Window>,
}

/// The event loop of the thread that owns a set of windows.
///
/// A `MessageQueue` owns the display connection. Windows created on it register
/// themselves and have their events dispatched by [`process`](MessageQueue::process).
pub struct MessageQueue {
    conn: Rc<dyn XConnection>,
    /// Events held back for windows that were still being constructed.
    pending: RefCell<VecDeque<Event>>,
    thread_data: RefCell<Option<ThreadData>>,
    capture: RefCell<Option<Weak<Window>>>,
    wake: Arc<Signal>,
    exit: Arc<Signal>,
    work: Arc<Mutex<Vec<Work>>>,
    async_handler: RefCell<Option<Box<dyn FnMut()>>>,
}

impl MessageQueue {
    /// Connect to the display named by `$DISPLAY`.
    pub fn new() -> Result<Rc<MessageQueue>, Error> {
        let conn = X11Connection::connect()?;
        MessageQueue::with_connection(Rc::new(conn))
    }

    pub fn with_connection(conn: Rc<dyn XConnection>) -> Result<Rc<MessageQueue>, Error> {
        Ok(Rc::new(MessageQueue {
            conn,
            pending: RefCell::new(VecDeque::new()),
            thread_data: RefCell::new(None),
            capture: RefCell::new(None),
            wake: Arc::new(Signal::new()?),
            exit: Arc::new(Signal::new()?),
            work: Arc::new(Mutex::new(Vec::new())),
            async_handler: RefCell::new(None),
        }))
    }

    pub fn connection(&self) -> &Rc<dyn XConnection> {
        &self.conn
    }

    pub fn screen(&self) -> &ScreenInfo {
        self.conn.screen()
    }

    /// The window registry, created on first use.
    fn thread_data(&self) -> RefMut<'_, ThreadData> {
        RefMut::map(self.thread_data.borrow_mut(), |data| {
            data.get_or_insert_with(|| {
                debug!("Creating window registry");
                ThreadData::default()
            })
        })
    }

    /// Register a window. It starts receiving events after the next housekeeping step.
    pub fn add_client(&self, window: &Rc<Window>) {
        let id = window.id();
        if id == 0 {
            return;
        }
        let mut data = self.thread_data();
        if data.dying.remove(&id) {
            debug!("Window {:#x} was added back before its removal completed", id);
            return;
        }
        if data.live.contains_key(&id) || data.born.iter().any(|(born, _)| *born == id) {
            return;
        }
        data.born.push((id, Rc::clone(window)));
    }

    /// Unregister a window. Its remaining events are dropped.
    pub fn remove_client(&self, id: xproto::Window) {
        let removed = {
            let mut data = self.thread_data();
            match data.born.iter().position(|(born, _)| *born == id) {
                Some(index) => Some(data.born.remove(index).1),
                None => {
                    if data.live.contains_key(&id) {
                        data.dying.insert(id);
                    }
                    None
                }
            }
        };
        let capture_id = self.mouse_capture().map(|window| window.id());
        if capture_id.map_or(false, |capture_id| capture_id == id || capture_id == 0) {
            *self.capture.borrow_mut() = None;
        }
        // Dropping the last reference outside of the registry borrow.
        drop(removed);
    }

    /// Where `id` is in the registry, if anywhere.
    pub fn membership(&self, id: xproto::Window) -> Option<Membership> {
        let data = self.thread_data();
        if data.dying.contains(&id) {
            Some(Membership::Dying)
        } else if data.born.iter().any(|(born, _)| *born == id) {
            Some(Membership::Born)
        } else if data.live.contains_key(&id) {
            Some(Membership::Live)
        } else {
            None
        }
    }

    fn live_window(&self, id: xproto::Window) -> Option<Rc<Window>> {
        self.thread_data().live.get(&id).cloned()
    }

    /// Dispatch every event that is available without blocking, then update the registry.
    ///
    /// An event for a window that is still being born ends the pass. It is kept and
    /// delivered on the next pass, once the window is live.
    pub fn dispatch_pending(&self) -> Result<(), Error> {
        loop {
            let held_back = self.pending.borrow_mut().pop_front();
            let event = match held_back {
                Some(event) => event,
                None => match self.conn.poll_for_event()? {
                    Some(event) => event,
                    None => break,
                },
            };
            let target = match event_target(&event) {
                Some(target) => target,
                None => {
                    trace!("Dropping event without a target window: {:?}", event);
                    continue;
                }
            };
            match self.membership(target) {
                Some(Membership::Dying) => {
                    trace!("Dropping event for dying window {:#x}", target);
                }
                Some(Membership::Born) => {
                    self.pending.borrow_mut().push_front(event);
                    break;
                }
                Some(Membership::Live) => {
                    if let Some(window) = self.live_window(target) {
                        let capture = self
                            .mouse_capture()
                            .filter(|capture| capture.id() != 0)
                            .unwrap_or_else(|| Rc::clone(&window));
                        if let Err(e) = window.process_event(&event, &capture) {
                            error!("Error handling event: {:#}", e);
                        }
                    }
                }
                None => trace!("Dropping event for unknown window {:#x}", target),
            }
        }
        self.housekeeping();
        Ok(())
    }

    /// Retire dying windows and promote newborn ones.
    fn housekeeping(&self) {
        let retired: Vec<Rc<Window>> = {
            let mut data = self.thread_data();
            let data = &mut *data;
            let retired = data
                .dying
                .drain()
                .filter_map(|id| data.live.remove(&id))
                .collect();
            for (id, window) in data.born.drain(..) {
                data.live.insert(id, window);
            }
            retired
        };
        drop(retired);
    }

    /// Wait for and dispatch events until `timeout` expires, or forever if it is `None`.
    ///
    /// Returns `false` if the loop was told to exit, `true` otherwise.
    pub fn process(&self, timeout: Option<Duration>) -> Result<bool, Error> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            self.dispatch_pending()?;
            self.conn.flush()?;
            if !self.pending.borrow().is_empty() {
                continue;
            }

            let timeout_ms = match deadline {
                None => -1,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    // Round up so we don't spin just before the deadline.
                    let millis = (remaining.as_nanos() + 999_999) / 1_000_000;
                    i32::try_from(millis).unwrap_or(i32::MAX)
                }
            };
            let mut fds = [
                PollFd::new(self.conn.as_raw_fd(), PollFlags::POLLIN),
                PollFd::new(self.wake.read, PollFlags::POLLIN),
                PollFd::new(self.exit.read, PollFlags::POLLIN),
            ];
            match poll(&mut fds, timeout_ms) {
                Ok(0) => return Ok(true),
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(BackendError::from(e).into()),
            }
            let readable =
                |fd: &PollFd| fd.revents().map_or(false, |events| !events.is_empty());
            if readable(&fds[2]) {
                self.exit.reset();
                return Ok(false);
            }
            if readable(&fds[1]) {
                self.wake.reset();
                self.run_async_work();
            }
        }
    }

    /// Process events until told to exit.
    pub fn run(&self) -> Result<(), Error> {
        while self.process(None)? {}
        Ok(())
    }

    fn run_async_work(&self) {
        let work = std::mem::take(&mut *self.work.lock().unwrap_or_else(PoisonError::into_inner));
        for work in work {
            work();
        }
        match self.async_handler.try_borrow_mut() {
            Ok(mut handler) => {
                if let Some(handler) = handler.as_mut() {
                    handler();
                }
            }
            Err(_) => error!("async work handler is already running"),
        }
    }

    /// Called on this thread every time the queue is woken up.
    pub fn set_async_work_handler(&self, handler: Option<Box<dyn FnMut()>>) {
        *self.async_handler.borrow_mut() = handler;
    }

    /// Interrupt a blocked [`process`](MessageQueue::process) to run async work.
    pub fn post_async_work_needed(&self) {
        self.wake.set();
    }

    /// Make the current or next [`process`](MessageQueue::process) return `false`.
    pub fn exit(&self) {
        self.exit.set();
    }

    pub fn proxy(&self) -> QueueProxy {
        QueueProxy {
            wake: Arc::clone(&self.wake),
            exit: Arc::clone(&self.exit),
            work: Arc::clone(&self.work),
        }
    }

    /// Give `window` the mouse capture, or take it away.
    ///
    /// Releasing does nothing unless `window` is the current holder.
    pub fn set_mouse_capture(&self, window: &Rc<Window>, capture: bool) {
        let mut holder = self.capture.borrow_mut();
        if capture {
            *holder = Some(Rc::downgrade(window));
        } else if holder
            .as_ref()
            .map_or(false, |holder| holder.ptr_eq(&Rc::downgrade(window)))
        {
            *holder = None;
        } else {
            debug!("Window {:#x} released a mouse capture it didn't hold", window.id());
        }
    }

    pub fn mouse_capture(&self) -> Option<Rc<Window>> {
        self.capture.borrow().as_ref().and_then(Weak::upgrade)
    }
}

/// The window an event is about, as in Xlib's `xany.window`.
pub fn event_target(event: &Event) -> Option<xproto::Window> {
    Some(match event {
        Event::KeyPress(ev) | Event::KeyRelease(ev) => ev.event,
        Event::ButtonPress(ev) | Event::ButtonRelease(ev) => ev.event,
        Event::MotionNotify(ev) => ev.event,
        Event::EnterNotify(ev) | Event::LeaveNotify(ev) => ev.event,
        Event::FocusIn(ev) | Event::FocusOut(ev) => ev.event,
        Event::Expose(ev) => ev.window,
        Event::GraphicsExposure(ev) => ev.drawable,
        Event::NoExposure(ev) => ev.drawable,
        Event::VisibilityNotify(ev) => ev.window,
        Event::CreateNotify(ev) => ev.parent,
        Event::DestroyNotify(ev) => ev.event,
        Event::UnmapNotify(ev) => ev.event,
        Event::MapNotify(ev) => ev.event,
        Event::MapRequest(ev) => ev.parent,
        Event::ReparentNotify(ev) => ev.event,
        Event::ConfigureNotify(ev) => ev.event,
        Event::ConfigureRequest(ev) => ev.parent,
        Event::GravityNotify(ev) => ev.event,
        Event::ResizeRequest(ev) => ev.window,
        Event::CirculateNotify(ev) => ev.event,
        Event::CirculateRequest(ev) => ev.event,
        Event::PropertyNotify(ev) => ev.window,
        Event::SelectionClear(ev) => ev.owner,
        Event::SelectionRequest(ev) => ev.owner,
        Event::SelectionNotify(ev) => ev.requestor,
        Event::ColormapNotify(ev) => ev.window,
        Event::ClientMessage(ev) => ev.window,
        _ => return None,
    })
}
