//! Pseudo console device components.
//!
//! - **device**: [`ConPtyDevice`], the lifecycle of one pseudo console session
//! - **session**: background reader pumping device output over a channel
//! - **pipes**, **attribute**, **handle**: the pieces `create` assembles
//!
//! # Architecture
//!
//! ```text
//! ConPtyDevice
//! ├── CallerPipes (cmd_in for writes, cmd_out for reads)
//! ├── PseudoConsole (HPCON, owns duplicates of pty_in / pty_out)
//! └── process + thread tracking handles
//!
//! create: PipeSet -> PseudoConsole -> close pty ends
//!         -> ProcessAttributeBinding -> CreateProcessW
//! ```

mod attribute;
pub mod device;
mod handle;
mod pipes;
pub mod session;

pub use device::{ConPtyDevice, DeviceState};
pub use session::{Session, SessionEvent, SessionOptions};
