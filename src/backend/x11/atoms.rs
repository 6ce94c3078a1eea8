// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! Interned atoms and window manager capability negotiation.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};
use x11rb::protocol::xproto::{self, Atom, ClientMessageEvent, EventMask};

use super::connection::XConnection;
use super::error::Error;

/// Every atom a window interns when it is created.
///
/// This list is part of the protocol surface: the names must match ICCCM and EWMH exactly.
pub const ATOM_NAMES: &[&str] = &[
    "WM_PROTOCOLS",
    "WM_CLIENT_MACHINE",
    "WM_DELETE_WINDOW",
    "WM_STATE",
    "WM_CHANGE_STATE",
    "CLIPBOARD",
    "PRIMARY",
    "UTF8_STRING",
    "_NET_SUPPORTED",
    "_NET_SUPPORTING_WM_CHECK",
    // Lengths the window manager added to each side of a window for decorations.
    "_NET_FRAME_EXTENTS",
    // Asks the window manager to compute _NET_FRAME_EXTENTS before mapping. Some window
    // managers don't support it but set the property on unmapped windows anyway.
    "_NET_REQUEST_FRAME_EXTENTS",
    "_NET_WM_FULL_PLACEMENT",
    "_NET_WM_FULLSCREEN_MONITORS",
    "_NET_WM_NAME",
    "_NET_WM_PID",
    "_NET_WM_PING",
    "_NET_WM_STATE",
    "_NET_WM_STATE_HIDDEN",
    "_NET_WM_STATE_FULLSCREEN",
    "_NET_WM_STATE_MAXIMIZED_HORZ",
    "_NET_WM_STATE_MAXIMIZED_VERT",
    "_NET_WM_STATE_MODAL",
    "_NET_WM_WINDOW_TYPE",
    "_NET_WM_WINDOW_TYPE_DESKTOP",
    "_NET_WM_WINDOW_TYPE_DOCK",
    "_NET_WM_WINDOW_TYPE_TOOLBAR",
    "_NET_WM_WINDOW_TYPE_MENU",
    "_NET_WM_WINDOW_TYPE_UTILITY",
    "_NET_WM_WINDOW_TYPE_SPLASH",
    "_NET_WM_WINDOW_TYPE_DIALOG",
    "_NET_WM_WINDOW_TYPE_DROPDOWN_MENU",
    "_NET_WM_WINDOW_TYPE_POPUP_MENU",
    "_NET_WM_WINDOW_TYPE_TOOLTIP",
    "_NET_WM_WINDOW_TYPE_NOTIFICATION",
    "_NET_WM_WINDOW_TYPE_COMBO",
    "_NET_WM_WINDOW_TYPE_DND",
    "_NET_WM_WINDOW_TYPE_NORMAL",
];

/// The action of a `_NET_WM_STATE` client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StateAction {
    Remove = 0,
    Add = 1,
    Toggle = 2,
}

/// Source indication for requests coming from a normal application (EWMH).
const SOURCE_APPLICATION: u32 = 1;

/// Interned atoms, and which of them the window manager advertises in `_NET_SUPPORTED`.
///
/// An atom can exist (the server knows its name) without being supported (the window
/// manager doesn't implement the hint it names); callers that care must ask
/// [`is_supported`](AtomCache::is_supported).
#[derive(Debug, Default)]
pub struct AtomCache {
    atoms: HashMap<&'static str, Atom>,
    supported: HashSet<&'static str>,
}

impl AtomCache {
    pub fn new() -> AtomCache {
        AtomCache::default()
    }

    /// Intern [`ATOM_NAMES`] and read the window manager's `_NET_SUPPORTED` list from the
    /// root window.
    ///
    /// Atoms are interned with `only_if_exists`, so names the server has never seen stay
    /// `NONE`. A window manager that doesn't publish `_NET_SUPPORTED` leaves the supported
    /// set empty.
    pub fn populate(&mut self, conn: &dyn XConnection, root: xproto::Window) -> Result<(), Error> {
        self.clear();
        debug!("Populating X11 atoms");
        for &name in ATOM_NAMES {
            let atom = conn.intern_atom(name, true)?;
            if atom == x11rb::NONE {
                debug!("  {}: not known to the server", name);
            }
            self.atoms.insert(name, atom);
        }

        if !self.exists("_NET_SUPPORTED") {
            info!("_NET_SUPPORTED is not provided by the window manager");
            return Ok(());
        }
        let advertised = match conn.get_property32(root, self.lookup("_NET_SUPPORTED")) {
            Ok(Some(advertised)) => advertised,
            Ok(None) => {
                info!("The window manager does not set _NET_SUPPORTED");
                return Ok(());
            }
            Err(e) => {
                info!("Failed to query _NET_SUPPORTED: {}", e);
                return Ok(());
            }
        };
        for (&name, &atom) in &self.atoms {
            if atom != x11rb::NONE && advertised.contains(&atom) {
                self.supported.insert(name);
            }
        }
        debug!(
            "Window manager supports {} of our atoms, and {} others",
            self.supported.len(),
            advertised.len().saturating_sub(self.supported.len())
        );
        Ok(())
    }

    /// Forget every atom.
    pub fn clear(&mut self) {
        self.atoms.clear();
        self.supported.clear();
    }

    /// Intern one more atom and remember it.
    pub fn intern(
        &mut self,
        conn: &dyn XConnection,
        name: &'static str,
        only_if_exists: bool,
    ) -> Result<Atom, Error> {
        let atom = conn.intern_atom(name, only_if_exists)?;
        self.atoms.insert(name, atom);
        Ok(atom)
    }

    /// The atom interned for `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` was never interned. Use [`exists`](AtomCache::exists) first when
    /// unsure.
    pub fn lookup(&self, name: &str) -> Atom {
        match self.atoms.get(name) {
            Some(&atom) => atom,
            None => panic!("atom {name} was never interned; check `exists` before looking it up"),
        }
    }

    /// `true` if `name` was interned and the server knows it.
    pub fn exists(&self, name: &str) -> bool {
        matches!(self.atoms.get(name), Some(&atom) if atom != x11rb::NONE)
    }

    /// `true` if `name` exists and the window manager lists it in `_NET_SUPPORTED`.
    pub fn is_supported(&self, name: &str) -> bool {
        self.exists(name) && self.supported.contains(name)
    }

    /// Reports, for each of `names`, whether it is currently set in the window's
    /// `_NET_WM_STATE`.
    ///
    /// The result is empty if the state property can't be read. Otherwise it has one entry
    /// per name, in order; names that don't exist are reported as not set.
    pub fn read_state_flags(
        &self,
        conn: &dyn XConnection,
        window: xproto::Window,
        names: &[&str],
    ) -> Vec<bool> {
        if !self.exists("_NET_WM_STATE") {
            debug!("_NET_WM_STATE is not provided by the window manager");
            return Vec::new();
        }
        let state = match conn.get_property32(window, self.lookup("_NET_WM_STATE")) {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!("Window {} has no _NET_WM_STATE", window);
                return Vec::new();
            }
            Err(e) => {
                debug!("Failed to query _NET_WM_STATE: {}", e);
                return Vec::new();
            }
        };
        names
            .iter()
            .map(|&name| {
                if self.exists(name) {
                    state.contains(&self.lookup(name))
                } else {
                    debug!("{} is not provided by the window manager", name);
                    false
                }
            })
            .collect()
    }

    /// Ask the window manager to change one or two `_NET_WM_STATE` atoms of `window`.
    ///
    /// Returns whether the request was sent. The window manager decides whether the state
    /// actually changes; watch the property to find out.
    pub fn request_state_change(
        &self,
        conn: &dyn XConnection,
        root: xproto::Window,
        window: xproto::Window,
        action: StateAction,
        first: &str,
        second: Option<&str>,
    ) -> bool {
        if !self.exists("_NET_WM_STATE") {
            debug!("_NET_WM_STATE is not provided by the window manager");
            return false;
        }
        let atom_or_none = |name: &str| {
            if self.exists(name) {
                self.lookup(name)
            } else {
                debug!("{} is not provided by the window manager", name);
                x11rb::NONE
            }
        };
        let first = atom_or_none(first);
        if first == x11rb::NONE {
            return false;
        }
        let second = second.map_or(x11rb::NONE, atom_or_none);
        let event = ClientMessageEvent::new(
            32,
            window,
            self.lookup("_NET_WM_STATE"),
            [action as u32, first, second, SOURCE_APPLICATION, 0],
        );
        let sent = conn
            .send_client_message(
                root,
                EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT,
                &event,
            )
            .and_then(|()| conn.flush());
        match sent {
            Ok(()) => true,
            Err(e) => {
                debug!("Failed to send _NET_WM_STATE request: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::x11::testing::FakeConnection;
    use test_log::test;

    fn populated(conn: &FakeConnection) -> AtomCache {
        let mut atoms = AtomCache::new();
        atoms
            .populate(conn, conn.screen().root)
            .expect("populate");
        atoms
    }

    #[test]
    fn existence_is_not_support() {
        let conn = FakeConnection::new();
        conn.advertise(&["_NET_WM_STATE", "_NET_WM_STATE_FULLSCREEN"]);
        let atoms = populated(&conn);

        assert!(!atoms.exists("_NOT_AN_ATOM_WE_USE"));
        assert!(!atoms.is_supported("_NOT_AN_ATOM_WE_USE"));

        assert!(atoms.exists("_NET_WM_PING"));
        assert!(!atoms.is_supported("_NET_WM_PING"));

        assert!(atoms.is_supported("_NET_WM_STATE_FULLSCREEN"));
    }

    #[test]
    fn unknown_names_do_not_exist() {
        let conn = FakeConnection::new();
        conn.forget_atom("_NET_WM_STATE_MODAL");
        let atoms = populated(&conn);
        assert!(!atoms.exists("_NET_WM_STATE_MODAL"));
        assert!(!atoms.is_supported("_NET_WM_STATE_MODAL"));
    }

    #[test]
    fn missing_net_supported_is_not_an_error() {
        let conn = FakeConnection::new();
        let atoms = populated(&conn);
        for name in ATOM_NAMES {
            assert!(!atoms.is_supported(name), "{name}");
        }
    }

    #[test]
    #[should_panic(expected = "never interned")]
    fn lookup_of_unknown_name_panics() {
        let conn = FakeConnection::new();
        let atoms = populated(&conn);
        atoms.lookup("_NOT_AN_ATOM_WE_USE");
    }

    #[test]
    fn state_flags_keep_shape() {
        let conn = FakeConnection::new();
        conn.forget_atom("_NET_WM_STATE_MODAL");
        let atoms = populated(&conn);
        let window = 77;
        let fullscreen = atoms.lookup("_NET_WM_STATE_FULLSCREEN");
        conn.set_property32(window, atoms.lookup("_NET_WM_STATE"), &[fullscreen]);

        let names = [
            "_NET_WM_STATE_MAXIMIZED_HORZ",
            "_NET_WM_STATE_MODAL",
            "_NOT_AN_ATOM_WE_USE",
            "_NET_WM_STATE_FULLSCREEN",
        ];
        assert_eq!(
            atoms.read_state_flags(&conn, window, &names),
            vec![false, false, false, true]
        );
    }

    #[test]
    fn state_flags_tolerate_empty_and_missing_state() {
        let conn = FakeConnection::new();
        let atoms = populated(&conn);
        let names = ["_NET_WM_STATE_HIDDEN", "_NET_WM_STATE_FULLSCREEN"];

        assert!(atoms.read_state_flags(&conn, 5, &names).is_empty());

        conn.set_property32(5, atoms.lookup("_NET_WM_STATE"), &[]);
        assert_eq!(atoms.read_state_flags(&conn, 5, &names), vec![false, false]);

        conn.fail_queries(true);
        assert!(atoms.read_state_flags(&conn, 5, &names).is_empty());
    }

    #[test]
    fn state_change_is_a_client_message_to_root() {
        let conn = FakeConnection::new();
        let atoms = populated(&conn);
        let root = conn.screen().root;

        assert!(atoms.request_state_change(
            &conn,
            root,
            9,
            StateAction::Add,
            "_NET_WM_STATE_MAXIMIZED_VERT",
            Some("_NET_WM_STATE_MAXIMIZED_HORZ"),
        ));

        let sent = conn.sent_messages();
        assert_eq!(sent.len(), 1);
        let (destination, mask, event) = &sent[0];
        assert_eq!(*destination, root);
        assert_eq!(
            *mask,
            EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT
        );
        assert_eq!(event.window, 9);
        assert_eq!(event.type_, atoms.lookup("_NET_WM_STATE"));
        assert_eq!(event.format, 32);
        assert_eq!(
            event.data.as_data32(),
            [
                1,
                atoms.lookup("_NET_WM_STATE_MAXIMIZED_VERT"),
                atoms.lookup("_NET_WM_STATE_MAXIMIZED_HORZ"),
                1,
                0
            ]
        );
        // Sending is not the same as the state changing.
        assert_eq!(
            atoms.read_state_flags(&conn, 9, &["_NET_WM_STATE_MAXIMIZED_VERT"]),
            Vec::<bool>::new()
        );
    }

    #[test]
    fn state_change_without_state_atom_is_refused() {
        let conn = FakeConnection::new();
        conn.forget_atom("_NET_WM_STATE");
        let atoms = populated(&conn);
        assert!(!atoms.request_state_change(
            &conn,
            conn.screen().root,
            9,
            StateAction::Toggle,
            "_NET_WM_STATE_FULLSCREEN",
            None,
        ));
        assert!(conn.sent_messages().is_empty());
    }
}
