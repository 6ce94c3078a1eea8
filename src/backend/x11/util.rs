// Copyright 2023 the Druid Authors
// SPDX-License-Identifier: Apache-2.0

//! Miscellaneous utility functions for working with X11.

macro_rules! log_x11 {
    ($val:expr) => {
        if let Err(e) = $val {
            // No file/line numbers: failures here mostly mean the connection to the X server
            // was lost, which says nothing about where in this crate we were.
            tracing::error!("X11 error: {}", e);
        }
    };
}

/// Wrapper around `RefCell::try_borrow_mut` that provides error context.
macro_rules! borrow_mut {
    ($val:expr) => {{
        use anyhow::Context;
        $val.try_borrow_mut().with_context(|| {
            format!(
                "[{}:{}] {}",
                std::file!(),
                std::line!(),
                std::stringify!($val)
            )
        })
    }};
}

/// The name of this machine, for `WM_CLIENT_MACHINE`.
pub(crate) fn hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    match nix::unistd::gethostname(&mut buf) {
        Ok(name) => name.to_str().ok().map(str::to_owned),
        Err(e) => {
            tracing::warn!("Failed to get host name: {}", e);
            None
        }
    }
}

/// Builds the contents of `WM_CLASS` from a program name.
///
/// ICCCM § 4.1.2.5: two consecutive null-terminated strings, the instance name (the program
/// name) and the class name (the program name with its first letter in upper case).
pub(crate) fn wm_class(name: &str) -> Vec<u8> {
    let mut wm_class = Vec::with_capacity(2 * (name.len() + 1));
    wm_class.extend(name.as_bytes());
    wm_class.push(0);
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        wm_class.extend(first.to_uppercase().to_string().as_bytes());
        wm_class.extend(chars.as_str().as_bytes());
    }
    wm_class.push(0);
    wm_class
}

/// The file name of the running binary, if there is one.
pub(crate) fn program_name() -> Option<String> {
    let arg0 = std::env::args_os().next()?;
    let path: &std::path::Path = arg0.as_ref();
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn wm_class_has_instance_and_class() {
        assert_eq!(wm_class("viewer"), b"viewer\0Viewer\0".to_vec());
        assert_eq!(wm_class(""), b"\0\0".to_vec());
    }
}
