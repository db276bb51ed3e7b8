//! conpty - pseudo console devices for Windows
//!
//! Allocates a Windows pseudo console (ConPTY), launches a child process
//! attached to it, and exchanges raw bytes with that child as if it were
//! running in an interactive console.
//!
//! # Example
//!
//! ```no_run
//! use conpty::ConPtyDevice;
//!
//! let mut device = ConPtyDevice::create("cmd.exe /c echo HELLO", 80, 25)?;
//!
//! let mut buf = [0u8; 1024];
//! let mut output = Vec::new();
//! while !String::from_utf8_lossy(&output).contains("HELLO") {
//!     // Ok(0) means nothing is ready yet
//!     let n = device.read(&mut buf)?;
//!     output.extend_from_slice(&buf[..n]);
//! }
//!
//! device.close()?;
//! # Ok::<(), conpty::ConPtyError>(())
//! ```
//!
//! Output is whatever the console produces, VT escape sequences included.
//! Interpreting them is left to the caller.

pub mod command;
pub mod config;
pub mod error;
pub mod pty;
pub mod size;
pub mod sys;

pub use command::CommandLine;
pub use error::{ConPtyError, Result};
pub use pty::{ConPtyDevice, DeviceState, Session, SessionEvent, SessionOptions};
pub use size::ConsoleSize;
pub use sys::{ConsoleApi, NativeApi};
