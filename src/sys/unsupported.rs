//! Stand-in for hosts without a pseudo console facility

use std::io;

use super::{ConsoleApi, ProcessInfo, RawHandle};
use crate::error::{ConPtyError, Result};
use crate::size::ConsoleSize;

/// Reports every capability as missing. `probe` fails before anything is
/// allocated, so the remaining calls are never reached by the device.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedApi;

fn unsupported() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "pseudo console is only available on Windows")
}

impl ConsoleApi for UnsupportedApi {
    fn probe(&self) -> Result<()> {
        Err(ConPtyError::UnsupportedPlatform("CreatePseudoConsole"))
    }

    fn create_pipe(&self) -> io::Result<(RawHandle, RawHandle)> {
        Err(unsupported())
    }

    fn close_handle(&self, _handle: RawHandle) -> io::Result<()> {
        Err(unsupported())
    }

    fn create_pseudo_console(
        &self,
        _size: ConsoleSize,
        _input: RawHandle,
        _output: RawHandle,
    ) -> io::Result<RawHandle> {
        Err(unsupported())
    }

    fn resize_pseudo_console(&self, _console: RawHandle, _size: ConsoleSize) -> io::Result<()> {
        Err(unsupported())
    }

    fn close_pseudo_console(&self, _console: RawHandle) {}

    fn attribute_list_size(&self, _count: u32) -> io::Result<usize> {
        Err(unsupported())
    }

    fn initialize_attribute_list(&self, _list: &mut [u8], _count: u32) -> io::Result<()> {
        Err(unsupported())
    }

    fn bind_pseudo_console(&self, _list: &mut [u8], _console: RawHandle) -> io::Result<()> {
        Err(unsupported())
    }

    fn delete_attribute_list(&self, _list: &mut [u8]) {}

    fn create_process(&self, _command_line: &str, _list: &mut [u8]) -> io::Result<ProcessInfo> {
        Err(unsupported())
    }

    fn peek_available(&self, _pipe: RawHandle) -> io::Result<u32> {
        Err(unsupported())
    }

    fn read(&self, _pipe: RawHandle, _buffer: &mut [u8]) -> io::Result<usize> {
        Err(unsupported())
    }

    fn write(&self, _pipe: RawHandle, _data: &[u8]) -> io::Result<usize> {
        Err(unsupported())
    }

    fn wait_process(&self, _process: RawHandle, _timeout_ms: u32) -> io::Result<bool> {
        Err(unsupported())
    }

    fn exit_code(&self, _process: RawHandle) -> io::Result<u32> {
        Err(unsupported())
    }
}
