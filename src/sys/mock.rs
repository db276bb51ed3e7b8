//! In-memory [`ConsoleApi`] with handle accounting and fault injection

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ConsoleApi, ProcessInfo, RawHandle};
use crate::error::{ConPtyError, Result};
use crate::size::ConsoleSize;

const ERROR_INVALID_HANDLE: i32 = 6;
const ERROR_BROKEN_PIPE: i32 = 109;
const ATTRIBUTE_LIST_SIZE: usize = 48;
const STILL_ACTIVE: u32 = 259;

/// Which call the mock should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    Probe,
    InputPipe,
    OutputPipe,
    PseudoConsole,
    AttributeSize,
    AttributeInit,
    AttributeBind,
    CreateProcess,
    Peek,
    Read,
    Write,
    Resize,
    Wait,
    CloseHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Pipe,
    Console,
    Process,
    Thread,
}

#[derive(Default)]
struct State {
    next_handle: isize,
    open: HashMap<RawHandle, Kind>,
    faults: Vec<Fault>,
    pipes_created: usize,
    live_attribute_lists: usize,
    bound_console: Option<RawHandle>,
    double_releases: usize,
    calls: Vec<&'static str>,
    console_sizes: Vec<ConsoleSize>,
    command_lines: Vec<String>,
    output: VecDeque<u8>,
    input: Vec<u8>,
    read_requests: Vec<usize>,
    write_limit: Option<usize>,
    exit_code: Option<u32>,
}

impl State {
    fn fail(&self, fault: Fault) -> io::Result<()> {
        if self.faults.contains(&fault) {
            Err(io::Error::from_raw_os_error(ERROR_BROKEN_PIPE))
        } else {
            Ok(())
        }
    }

    fn open(&mut self, kind: Kind) -> RawHandle {
        self.next_handle += 4;
        let handle = RawHandle(self.next_handle);
        self.open.insert(handle, kind);
        handle
    }
}

#[derive(Clone, Default)]
pub(crate) struct MockApi {
    state: Arc<Mutex<State>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(fault: Fault) -> Self {
        let api = Self::new();
        api.inject(fault);
        api
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn inject(&self, fault: Fault) {
        self.state().faults.push(fault);
    }

    pub fn open_handles(&self) -> usize {
        self.state().open.len()
    }

    pub fn open_of(&self, kind: Kind) -> usize {
        self.state().open.values().filter(|k| **k == kind).count()
    }

    pub fn live_attribute_lists(&self) -> usize {
        self.state().live_attribute_lists
    }

    pub fn double_releases(&self) -> usize {
        self.state().double_releases
    }

    pub fn pipes_created(&self) -> usize {
        self.state().pipes_created
    }

    pub fn bound_console(&self) -> Option<RawHandle> {
        self.state().bound_console
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    pub fn console_sizes(&self) -> Vec<ConsoleSize> {
        self.state().console_sizes.clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.state().command_lines.clone()
    }

    pub fn push_output(&self, data: &[u8]) {
        self.state().output.extend(data.iter().copied());
    }

    pub fn input(&self) -> Vec<u8> {
        self.state().input.clone()
    }

    pub fn read_requests(&self) -> Vec<usize> {
        self.state().read_requests.clone()
    }

    pub fn limit_writes(&self, limit: usize) {
        self.state().write_limit = Some(limit);
    }

    pub fn exit_child(&self, code: u32) {
        self.state().exit_code = Some(code);
    }
}

impl ConsoleApi for MockApi {
    fn probe(&self) -> Result<()> {
        let mut state = self.state();
        state.calls.push("probe");
        if state.faults.contains(&Fault::Probe) {
            return Err(ConPtyError::UnsupportedPlatform("CreatePseudoConsole"));
        }
        Ok(())
    }

    fn create_pipe(&self) -> io::Result<(RawHandle, RawHandle)> {
        let mut state = self.state();
        state.calls.push("create_pipe");
        state.pipes_created += 1;
        let fault = if state.pipes_created == 1 {
            Fault::InputPipe
        } else {
            Fault::OutputPipe
        };
        state.fail(fault)?;
        let read = state.open(Kind::Pipe);
        let write = state.open(Kind::Pipe);
        Ok((read, write))
    }

    fn close_handle(&self, handle: RawHandle) -> io::Result<()> {
        let mut state = self.state();
        state.calls.push("close_handle");
        let kind = state.open.get(&handle).copied();
        if matches!(kind, Some(Kind::Console) | None) {
            state.double_releases += 1;
            return Err(io::Error::from_raw_os_error(ERROR_INVALID_HANDLE));
        }
        state.open.remove(&handle);
        // The handle is gone either way, like CloseHandle
        state.fail(Fault::CloseHandle)
    }

    fn create_pseudo_console(
        &self,
        size: ConsoleSize,
        input: RawHandle,
        output: RawHandle,
    ) -> io::Result<RawHandle> {
        let mut state = self.state();
        state.calls.push("create_pseudo_console");
        assert_eq!(state.open.get(&input), Some(&Kind::Pipe));
        assert_eq!(state.open.get(&output), Some(&Kind::Pipe));
        state.fail(Fault::PseudoConsole)?;
        state.console_sizes.push(size);
        Ok(state.open(Kind::Console))
    }

    fn resize_pseudo_console(&self, console: RawHandle, size: ConsoleSize) -> io::Result<()> {
        let mut state = self.state();
        state.calls.push("resize_pseudo_console");
        assert_eq!(state.open.get(&console), Some(&Kind::Console));
        state.fail(Fault::Resize)?;
        state.console_sizes.push(size);
        Ok(())
    }

    fn close_pseudo_console(&self, console: RawHandle) {
        let mut state = self.state();
        state.calls.push("close_pseudo_console");
        if state.open.get(&console) == Some(&Kind::Console) {
            state.open.remove(&console);
        } else {
            state.double_releases += 1;
        }
    }

    fn attribute_list_size(&self, count: u32) -> io::Result<usize> {
        let state = self.state();
        state.fail(Fault::AttributeSize)?;
        Ok(ATTRIBUTE_LIST_SIZE * count as usize)
    }

    fn initialize_attribute_list(&self, list: &mut [u8], count: u32) -> io::Result<()> {
        let mut state = self.state();
        assert!(list.len() >= ATTRIBUTE_LIST_SIZE * count as usize);
        state.fail(Fault::AttributeInit)?;
        state.live_attribute_lists += 1;
        Ok(())
    }

    fn bind_pseudo_console(&self, _list: &mut [u8], console: RawHandle) -> io::Result<()> {
        let mut state = self.state();
        state.fail(Fault::AttributeBind)?;
        state.bound_console = Some(console);
        Ok(())
    }

    fn delete_attribute_list(&self, _list: &mut [u8]) {
        self.state().live_attribute_lists -= 1;
    }

    fn create_process(&self, command_line: &str, _list: &mut [u8]) -> io::Result<ProcessInfo> {
        let mut state = self.state();
        state.calls.push("create_process");
        assert_eq!(state.live_attribute_lists, 1);
        state.fail(Fault::CreateProcess)?;
        state.command_lines.push(command_line.to_string());
        let process = state.open(Kind::Process);
        let thread = state.open(Kind::Thread);
        Ok(ProcessInfo {
            process,
            thread,
            pid: 4242,
        })
    }

    fn peek_available(&self, _pipe: RawHandle) -> io::Result<u32> {
        let state = self.state();
        state.fail(Fault::Peek)?;
        Ok(state.output.len() as u32)
    }

    fn read(&self, _pipe: RawHandle, buffer: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state();
        state.fail(Fault::Read)?;
        state.read_requests.push(buffer.len());
        let n = buffer.len().min(state.output.len());
        for (slot, byte) in buffer.iter_mut().zip(state.output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&self, _pipe: RawHandle, data: &[u8]) -> io::Result<usize> {
        let mut state = self.state();
        state.fail(Fault::Write)?;
        let n = state.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        state.input.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn wait_process(&self, _process: RawHandle, _timeout_ms: u32) -> io::Result<bool> {
        let state = self.state();
        state.fail(Fault::Wait)?;
        Ok(state.exit_code.is_some())
    }

    fn exit_code(&self, _process: RawHandle) -> io::Result<u32> {
        Ok(self.state().exit_code.unwrap_or(STILL_ACTIVE))
    }
}
