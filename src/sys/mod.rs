//! Raw console system calls.
//!
//! The device never talks to the OS directly. Everything goes through
//! [`ConsoleApi`], which keeps the lifecycle logic in `pty` independent of the
//! host and lets the tests account for every handle the device touches.
//!
//! - **win32**: Win32 implementation, pseudo console entry points resolved at runtime
//! - **unsupported**: stand-in for hosts without ConPTY

use std::io;

use crate::error::Result;
use crate::size::ConsoleSize;

#[cfg(windows)]
mod win32;
#[cfg(windows)]
pub use win32::Win32Api;

mod unsupported;
pub use unsupported::UnsupportedApi;

#[cfg(test)]
pub(crate) mod mock;

/// The system implementation for the current host
#[cfg(windows)]
pub type NativeApi = Win32Api;

/// The system implementation for the current host
#[cfg(not(windows))]
pub type NativeApi = UnsupportedApi;

/// An OS handle value, kept as a plain integer so it can cross threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub isize);

/// Handles and id of a freshly created process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessInfo {
    pub process: RawHandle,
    pub thread: RawHandle,
    pub pid: u32,
}

/// Raw OS operations behind a pseudo console device.
///
/// Errors are plain `io::Error`s carrying the OS status code; the device maps
/// them onto [`ConPtyError`](crate::ConPtyError) variants.
pub trait ConsoleApi: Clone {
    /// Check that the pseudo console entry points exist on this host
    fn probe(&self) -> Result<()>;

    /// Create an anonymous pipe, returning `(read, write)`
    fn create_pipe(&self) -> io::Result<(RawHandle, RawHandle)>;

    fn close_handle(&self, handle: RawHandle) -> io::Result<()>;

    /// Create a pseudo console reading from `input` and writing to `output`
    fn create_pseudo_console(
        &self,
        size: ConsoleSize,
        input: RawHandle,
        output: RawHandle,
    ) -> io::Result<RawHandle>;

    fn resize_pseudo_console(&self, console: RawHandle, size: ConsoleSize) -> io::Result<()>;

    fn close_pseudo_console(&self, console: RawHandle);

    /// Bytes needed for an attribute list holding `count` attributes
    fn attribute_list_size(&self, count: u32) -> io::Result<usize>;

    fn initialize_attribute_list(&self, list: &mut [u8], count: u32) -> io::Result<()>;

    /// Store `console` under the pseudo console attribute key
    fn bind_pseudo_console(&self, list: &mut [u8], console: RawHandle) -> io::Result<()>;

    fn delete_attribute_list(&self, list: &mut [u8]);

    /// Create a process with extended startup info carrying `list`
    fn create_process(&self, command_line: &str, list: &mut [u8]) -> io::Result<ProcessInfo>;

    /// Bytes currently readable from `pipe`, without consuming them
    fn peek_available(&self, pipe: RawHandle) -> io::Result<u32>;

    fn read(&self, pipe: RawHandle, buffer: &mut [u8]) -> io::Result<usize>;

    fn write(&self, pipe: RawHandle, data: &[u8]) -> io::Result<usize>;

    /// Returns true once the process has exited
    fn wait_process(&self, process: RawHandle, timeout_ms: u32) -> io::Result<bool>;

    fn exit_code(&self, process: RawHandle) -> io::Result<u32>;
}
