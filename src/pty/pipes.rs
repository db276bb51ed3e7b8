//! Pipe pair between the caller and the pseudo console

use tracing::{debug, warn};

use super::handle::OwnedHandle;
use crate::error::{ConPtyError, Result};
use crate::sys::ConsoleApi;

/// Both pipes of a device before the pseudo console takes its ends.
///
/// Input pipe: caller writes `cmd_in`, console reads `pty_in`.
/// Output pipe: console writes `pty_out`, caller reads `cmd_out`.
pub(crate) struct PipeSet<A: ConsoleApi> {
    pub pty_in: OwnedHandle<A>,
    pub pty_out: OwnedHandle<A>,
    pub cmd_in: OwnedHandle<A>,
    pub cmd_out: OwnedHandle<A>,
}

/// Caller-side pipe ends, owned by the device for the whole session
pub(crate) struct CallerPipes<A: ConsoleApi> {
    /// Write target for caller input
    pub input: OwnedHandle<A>,
    /// Read source for console output
    pub output: OwnedHandle<A>,
}

impl<A: ConsoleApi> PipeSet<A> {
    pub fn create(api: &A) -> Result<Self> {
        let (pty_in, cmd_in) = api
            .create_pipe()
            .map_err(|e| ConPtyError::allocation("input pipe", e))?;
        let pty_in = OwnedHandle::new(api.clone(), pty_in);
        let cmd_in = OwnedHandle::new(api.clone(), cmd_in);

        // A failure here drops the input pipe guards above
        let (cmd_out, pty_out) = api
            .create_pipe()
            .map_err(|e| ConPtyError::allocation("output pipe", e))?;
        let cmd_out = OwnedHandle::new(api.clone(), cmd_out);
        let pty_out = OwnedHandle::new(api.clone(), pty_out);

        debug!("Pipes created");
        Ok(Self {
            pty_in,
            pty_out,
            cmd_in,
            cmd_out,
        })
    }

    /// Close the terminal-side ends once the pseudo console has duplicated
    /// them, keeping only the caller side
    pub fn into_caller_side(mut self) -> CallerPipes<A> {
        for end in [&mut self.pty_in, &mut self.pty_out] {
            if let Err(e) = end.release() {
                warn!("Failed to close terminal-side pipe {:?}: {}", end.raw(), e);
            }
        }
        CallerPipes {
            input: self.cmd_in,
            output: self.cmd_out,
        }
    }
}
