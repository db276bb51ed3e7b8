//! Session management
//!
//! Runs the output polling loop of a device on a background thread and hands
//! the output to the caller over a channel.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::device::ConPtyDevice;
use crate::error::{ConPtyError, Result};
use crate::sys::{ConsoleApi, NativeApi};

/// Session events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Raw console output
    Output(Vec<u8>),
    /// The child process has exited
    Exited(Option<u32>),
    /// Reading failed; the reader has stopped
    Error(String),
}

/// Reader thread tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Size of each read
    pub read_buffer: usize,
    /// Sleep between polls when no output is pending
    pub poll_interval: Duration,
    /// How long the output pipe must stay empty after the child exits before
    /// `Exited` is reported. The console host can flush its last frame late.
    pub exit_grace: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            read_buffer: 4096,
            poll_interval: Duration::from_millis(5),
            exit_grace: Duration::from_millis(100),
        }
    }
}

/// A device with a reader thread pumping its output
pub struct Session<A: ConsoleApi + Send + Sync + 'static = NativeApi> {
    device: Option<Arc<ConPtyDevice<A>>>,
    /// Running flag
    running: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
    events: Receiver<SessionEvent>,
}

impl Session<NativeApi> {
    /// Create a device for `command_line` and start pumping its output
    pub fn spawn(command_line: &str, columns: i16, rows: i16, options: SessionOptions) -> Result<Self> {
        let device = ConPtyDevice::create(command_line, columns, rows)?;
        Ok(Self::start(device, options))
    }
}

impl<A: ConsoleApi + Send + Sync + 'static> Session<A> {
    /// Start the reader thread for an active device
    pub fn start(device: ConPtyDevice<A>, options: SessionOptions) -> Self {
        let device = Arc::new(device);
        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel::<SessionEvent>();

        let pty = device.clone();
        let flag = running.clone();
        let reader_thread = thread::spawn(move || {
            let mut buffer = vec![0u8; options.read_buffer.max(1)];
            // Set once the child is gone and the pipe is empty; cleared by new output
            let mut quiet_since: Option<Instant> = None;

            while flag.load(Ordering::SeqCst) {
                match pty.read(&mut buffer) {
                    Ok(0) => {
                        if !pty.is_running() {
                            let since = *quiet_since.get_or_insert_with(Instant::now);
                            if since.elapsed() >= options.exit_grace {
                                let code = pty.exit_code();
                                debug!("Child exited with {:?}", code);
                                let _ = tx.send(SessionEvent::Exited(code));
                                break;
                            }
                        }
                        thread::sleep(options.poll_interval);
                    }
                    Ok(n) => {
                        quiet_since = None;
                        if tx.send(SessionEvent::Output(buffer[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Reader stopped: {}", e);
                        let _ = tx.send(SessionEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
            flag.store(false, Ordering::SeqCst);
        });

        info!("Session started (pid {})", device.pid());
        Self {
            device: Some(device),
            running,
            reader_thread: Some(reader_thread),
            events: rx,
        }
    }

    /// Check if the reader is still pumping output
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn device(&self) -> Option<&ConPtyDevice<A>> {
        self.device.as_deref()
    }

    /// Write input to the console
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        match &self.device {
            Some(device) => device.write(data),
            None => Err(ConPtyError::Closed),
        }
    }

    /// Write all of `data`, retrying on partial writes
    pub fn write_all(&self, data: &[u8]) -> Result<()> {
        let mut device = self.device.as_deref().ok_or(ConPtyError::Closed)?;
        device
            .write_all(data)
            .map_err(|e| ConPtyError::io("write", e))
    }

    pub fn resize(&self, columns: i16, rows: i16) -> Result<()> {
        match &self.device {
            Some(device) => device.resize(columns, rows),
            None => Err(ConPtyError::Closed),
        }
    }

    /// Next event, if one is ready
    pub fn try_recv(&self) -> Option<SessionEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SessionEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Collect all output received so far (non-blocking)
    pub fn drain_output(&self) -> Vec<u8> {
        let mut all_data = Vec::new();
        while let Some(event) = self.try_recv() {
            if let SessionEvent::Output(data) = event {
                all_data.extend_from_slice(&data);
            }
        }
        all_data
    }

    fn stop_reader(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }

    /// Stop the reader thread and close the device
    pub fn close(mut self) -> Result<()> {
        self.stop_reader();
        let Some(device) = self.device.take() else {
            return Ok(());
        };
        match Arc::try_unwrap(device) {
            Ok(mut device) => device.close(),
            Err(shared) => {
                warn!("Device (pid {}) still referenced after the reader stopped", shared.pid());
                Err(ConPtyError::io(
                    "close",
                    io::Error::new(io::ErrorKind::Other, "device is still in use"),
                ))
            }
        }
    }
}

impl<A: ConsoleApi + Send + Sync + 'static> fmt::Debug for Session<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.device)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<A: ConsoleApi + Send + Sync + 'static> Drop for Session<A> {
    fn drop(&mut self) {
        self.stop_reader();
    }
}
