//! Exclusive-ownership guards for OS handles
//!
//! Each guard releases its handle at most once, either through an explicit
//! `release` or on drop.

use std::io;

use tracing::warn;

use crate::size::ConsoleSize;
use crate::sys::{ConsoleApi, RawHandle};

/// A pipe, process or thread handle closed with `CloseHandle`
pub(crate) struct OwnedHandle<A: ConsoleApi> {
    api: A,
    raw: RawHandle,
    released: bool,
}

impl<A: ConsoleApi> OwnedHandle<A> {
    pub fn new(api: A, raw: RawHandle) -> Self {
        Self {
            api,
            raw,
            released: false,
        }
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    /// Close the handle. Later calls are no-ops.
    pub fn release(&mut self) -> io::Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.api.close_handle(self.raw)
    }
}

impl<A: ConsoleApi> Drop for OwnedHandle<A> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to close handle {:?}: {}", self.raw, e);
        }
    }
}

/// The pseudo console itself, closed with `ClosePseudoConsole`
pub(crate) struct PseudoConsole<A: ConsoleApi> {
    api: A,
    raw: RawHandle,
    released: bool,
}

impl<A: ConsoleApi> PseudoConsole<A> {
    /// Create a pseudo console reading from `input` and writing to `output`
    pub fn create(api: &A, size: ConsoleSize, input: RawHandle, output: RawHandle) -> io::Result<Self> {
        let raw = api.create_pseudo_console(size, input, output)?;
        Ok(Self {
            api: api.clone(),
            raw,
            released: false,
        })
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn resize(&self, size: ConsoleSize) -> io::Result<()> {
        self.api.resize_pseudo_console(self.raw, size)
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.api.close_pseudo_console(self.raw);
    }
}

impl<A: ConsoleApi> Drop for PseudoConsole<A> {
    fn drop(&mut self) {
        self.release();
    }
}
