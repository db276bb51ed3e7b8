//! Pseudo console device
//!
//! [`ConPtyDevice`] owns every handle of one ConPTY session: the caller-side
//! pipe ends, the pseudo console, and the tracking handles of the child process.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{debug, info, warn};

use super::attribute::ProcessAttributeBinding;
use super::handle::{OwnedHandle, PseudoConsole};
use super::pipes::{CallerPipes, PipeSet};
use crate::command::CommandLine;
use crate::error::{ConPtyError, Result};
use crate::size::ConsoleSize;
use crate::sys::{ConsoleApi, NativeApi, ProcessInfo};

/// Lifecycle of a device.
///
/// Only `Active` and `Closed` are ever observable on a constructed device; the
/// earlier stages exist while `create` is running and are reported in its logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Uninitialized,
    PipesReady,
    ConsoleCreated,
    Active,
    Closed,
}

/// A child process attached to a pseudo console
pub struct ConPtyDevice<A: ConsoleApi = NativeApi> {
    state: DeviceState,
    pid: u32,
    size: AtomicU32,
    // Field order is drop order: process tracking, pipes, then the console
    process: OwnedHandle<A>,
    thread: OwnedHandle<A>,
    pipes: CallerPipes<A>,
    console: PseudoConsole<A>,
    api: A,
}

impl ConPtyDevice<NativeApi> {
    /// Launch `command_line` in a new pseudo console of `columns` x `rows` cells
    pub fn create(command_line: &str, columns: i16, rows: i16) -> Result<Self> {
        Self::create_with(NativeApi::default(), command_line, columns, rows)
    }
}

impl<A: ConsoleApi> ConPtyDevice<A> {
    /// Like [`ConPtyDevice::create`] over an explicit system implementation
    pub fn create_with(api: A, command_line: &str, columns: i16, rows: i16) -> Result<Self> {
        api.probe()?;
        let size = ConsoleSize::validated(columns, rows)?;
        let command = CommandLine::resolve(command_line)?;
        Self::start(api, &command, size)
    }

    /// Launch an already resolved command
    pub fn with_command(api: A, command: &CommandLine, size: ConsoleSize) -> Result<Self> {
        api.probe()?;
        let size = ConsoleSize::validated(size.columns, size.rows)?;
        Self::start(api, command, size)
    }

    fn start(api: A, command: &CommandLine, size: ConsoleSize) -> Result<Self> {
        let mut stage = DeviceState::Uninitialized;
        debug!("Creating pseudo console {} for {}", size, command.program().display());

        let (pipes, console, info) = match Self::acquire(&api, command, size, &mut stage) {
            Ok(parts) => parts,
            Err(e) => {
                warn!("Pseudo console creation failed after {:?}: {}", stage, e);
                return Err(e);
            }
        };

        info!("Spawned {} (pid {}) in pseudo console {}", command.program().display(), info.pid, size);
        Ok(Self {
            state: DeviceState::Active,
            pid: info.pid,
            size: AtomicU32::new(size.pack()),
            process: OwnedHandle::new(api.clone(), info.process),
            thread: OwnedHandle::new(api.clone(), info.thread),
            pipes,
            console,
            api,
        })
    }

    /// Acquire pipes, console and process in order. Anything acquired before a
    /// failing step is released by its guard on the way out.
    fn acquire(
        api: &A,
        command: &CommandLine,
        size: ConsoleSize,
        stage: &mut DeviceState,
    ) -> Result<(CallerPipes<A>, PseudoConsole<A>, ProcessInfo)> {
        let pipes = PipeSet::create(api)?;
        *stage = DeviceState::PipesReady;

        let console = PseudoConsole::create(api, size, pipes.pty_in.raw(), pipes.pty_out.raw())
            .map_err(|e| ConPtyError::allocation("pseudo console", e))?;
        *stage = DeviceState::ConsoleCreated;

        // The console holds its own duplicates of the terminal-side ends
        let pipes = pipes.into_caller_side();

        let info = ProcessAttributeBinding::new(api, console.raw())?.spawn(command)?;
        Ok((pipes, console, info))
    }

    fn ensure_active(&self) -> Result<()> {
        match self.state {
            DeviceState::Active => Ok(()),
            _ => Err(ConPtyError::Closed),
        }
    }

    /// Read console output without waiting for it.
    ///
    /// Returns `Ok(0)` when nothing is pending. Otherwise reads at most the
    /// number of bytes already available, so the call never blocks on output
    /// that does not exist yet.
    pub fn read(&self, buffer: &mut [u8]) -> Result<usize> {
        self.ensure_active()?;
        if buffer.is_empty() {
            return Ok(0);
        }

        let output = self.pipes.output.raw();
        let available = self
            .api
            .peek_available(output)
            .map_err(|e| ConPtyError::io("peek", e))?;
        if available == 0 {
            return Ok(0);
        }

        let to_read = buffer.len().min(available as usize);
        self.api
            .read(output, &mut buffer[..to_read])
            .map_err(|e| ConPtyError::io("read", e))
    }

    /// Write input to the console. Returns the number of bytes actually written,
    /// which may be less than `data.len()`.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        self.ensure_active()?;
        self.api
            .write(self.pipes.input.raw(), data)
            .map_err(|e| ConPtyError::io("write", e))
    }

    /// Resize the console viewport
    pub fn resize(&self, columns: i16, rows: i16) -> Result<()> {
        self.ensure_active()?;
        let size = ConsoleSize::validated(columns, rows)?;
        self.console
            .resize(size)
            .map_err(|e| ConPtyError::io("resize", e))?;
        self.size.store(size.pack(), Ordering::SeqCst);
        debug!("Resized pseudo console to {}", size);
        Ok(())
    }

    /// Release the process tracking handles, the pipes and the pseudo console.
    ///
    /// The child is not terminated by this call. Closing twice returns
    /// [`ConPtyError::Closed`].
    pub fn close(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.state = DeviceState::Closed;

        let results = [
            self.process.release(),
            self.thread.release(),
            self.pipes.input.release(),
            self.pipes.output.release(),
        ];
        self.console.release();
        info!("Pseudo console closed (pid {})", self.pid);

        match results.into_iter().find_map(|r| r.err()) {
            Some(e) => {
                warn!("Failed to release a handle while closing: {}", e);
                Err(ConPtyError::io("close", e))
            }
            None => Ok(()),
        }
    }

    /// True when console output is waiting to be read
    pub fn data_available(&self) -> bool {
        self.ensure_active().is_ok()
            && matches!(self.api.peek_available(self.pipes.output.raw()), Ok(n) if n > 0)
    }

    /// Check if the child process is still running
    ///
    /// A failed wait counts as running, so `exit_code` never reports a live child.
    pub fn is_running(&self) -> bool {
        if self.ensure_active().is_err() {
            return false;
        }
        match self.api.wait_process(self.process.raw(), 0) {
            Ok(exited) => !exited,
            Err(e) => {
                debug!("Wait on pid {} failed: {}", self.pid, e);
                true
            }
        }
    }

    /// Exit code of the child once it has exited
    pub fn exit_code(&self) -> Option<u32> {
        if self.ensure_active().is_err() || self.is_running() {
            return None;
        }
        self.api.exit_code(self.process.raw()).ok()
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn size(&self) -> ConsoleSize {
        ConsoleSize::unpack(self.size.load(Ordering::SeqCst))
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }
}

impl<A: ConsoleApi> fmt::Debug for ConPtyDevice<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConPtyDevice")
            .field("pid", &self.pid)
            .field("state", &self.state)
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

/// Byte-stream input, as accepted by anything expecting a writer
impl<A: ConsoleApi> io::Write for &ConPtyDevice<A> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ConPtyDevice::write(*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
