//! Process attribute list binding a pseudo console to a new process

use std::mem;

use tracing::debug;

use crate::command::CommandLine;
use crate::error::{ConPtyError, Result};
use crate::sys::{ConsoleApi, ProcessInfo, RawHandle};

/// A one-slot process thread attribute list holding the pseudo console handle.
///
/// The list must outlive the process creation call. It is deleted and its
/// buffer freed when this value is dropped.
pub(crate) struct ProcessAttributeBinding<'a, A: ConsoleApi> {
    api: &'a A,
    // usize words keep the list pointer-aligned
    words: Vec<usize>,
    len: usize,
    initialized: bool,
}

impl<'a, A: ConsoleApi> ProcessAttributeBinding<'a, A> {
    pub fn new(api: &'a A, console: RawHandle) -> Result<Self> {
        let len = api
            .attribute_list_size(1)
            .map_err(|e| ConPtyError::allocation("process attribute list", e))?;

        let word = mem::size_of::<usize>();
        let mut binding = Self {
            api,
            words: vec![0; (len + word - 1) / word],
            len,
            initialized: false,
        };

        api.initialize_attribute_list(binding.as_bytes_mut(), 1)
            .map_err(|e| ConPtyError::allocation("process attribute list", e))?;
        binding.initialized = true;

        api.bind_pseudo_console(binding.as_bytes_mut(), console)
            .map_err(|e| ConPtyError::allocation("pseudo console attribute", e))?;

        debug!("Process attribute list ready ({} bytes)", len);
        Ok(binding)
    }

    /// Create the process attached to the bound pseudo console
    pub fn spawn(&mut self, command: &CommandLine) -> Result<ProcessInfo> {
        let command_line = command.to_windows_string();
        debug!("Creating process: {}", command_line);
        let api = self.api;
        api.create_process(&command_line, self.as_bytes_mut())
            .map_err(ConPtyError::SpawnFailure)
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: u8 has no alignment or validity requirements and `len` fits in `words`
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.len) }
    }
}

impl<A: ConsoleApi> Drop for ProcessAttributeBinding<'_, A> {
    fn drop(&mut self) {
        if self.initialized {
            let api = self.api;
            api.delete_attribute_list(self.as_bytes_mut());
        }
    }
}
