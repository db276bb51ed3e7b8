//! Win32 implementation of [`ConsoleApi`]
//!
//! `CreatePseudoConsole` and friends only exist on Windows 10 1809 and later, so
//! they are looked up in `kernel32.dll` at runtime instead of being linked. The
//! lookup runs once per process; hosts without them fail the probe before any
//! handle is created.

use std::ffi::c_void;
use std::io;
use std::mem;
use std::sync::OnceLock;

use tracing::{debug, warn};
use windows::core::{s, w, PCWSTR, PWSTR};
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Storage::FileSystem::{ReadFile, WriteFile};
use windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};
use windows::Win32::System::Pipes::{CreatePipe, PeekNamedPipe};
use windows::Win32::System::Threading::{
    CreateProcessW, DeleteProcThreadAttributeList, GetExitCodeProcess,
    InitializeProcThreadAttributeList, UpdateProcThreadAttribute, WaitForSingleObject,
    EXTENDED_STARTUPINFO_PRESENT, LPPROC_THREAD_ATTRIBUTE_LIST, PROCESS_INFORMATION,
    STARTUPINFOEXW,
};

use super::{ConsoleApi, ProcessInfo, RawHandle};
use crate::error::{ConPtyError, Result};
use crate::size::ConsoleSize;

const PROC_THREAD_ATTRIBUTE_PSEUDOCONSOLE: usize = 0x0002_0016;

const WAIT_OBJECT_0: u32 = 0x0000_0000;
const WAIT_TIMEOUT: u32 = 0x0000_0102;

// COORD is passed by value, which the ABI carries as one 32-bit word
type CreatePseudoConsoleFn = unsafe extern "system" fn(
    size: u32,
    input: isize,
    output: isize,
    flags: u32,
    console: *mut isize,
) -> i32;
type ResizePseudoConsoleFn = unsafe extern "system" fn(console: isize, size: u32) -> i32;
type ClosePseudoConsoleFn = unsafe extern "system" fn(console: isize);

#[derive(Clone, Copy)]
struct PseudoConsoleFns {
    create: CreatePseudoConsoleFn,
    resize: ResizePseudoConsoleFn,
    close: ClosePseudoConsoleFn,
}

static PSEUDO_CONSOLE_FNS: OnceLock<std::result::Result<PseudoConsoleFns, &'static str>> =
    OnceLock::new();

fn pseudo_console_fns() -> std::result::Result<PseudoConsoleFns, &'static str> {
    *PSEUDO_CONSOLE_FNS.get_or_init(|| {
        // SAFETY: the transmuted signatures match the documented kernel32 exports
        let fns = unsafe { load_pseudo_console_fns() };
        match &fns {
            Ok(_) => debug!("Pseudo console entry points resolved"),
            Err(missing) => warn!("Pseudo console unavailable: {} not found", missing),
        }
        fns
    })
}

unsafe fn load_pseudo_console_fns() -> std::result::Result<PseudoConsoleFns, &'static str> {
    let kernel32 = GetModuleHandleW(w!("kernel32.dll")).map_err(|_| "kernel32.dll")?;

    let create = GetProcAddress(kernel32, s!("CreatePseudoConsole")).ok_or("CreatePseudoConsole")?;
    let resize = GetProcAddress(kernel32, s!("ResizePseudoConsole")).ok_or("ResizePseudoConsole")?;
    let close = GetProcAddress(kernel32, s!("ClosePseudoConsole")).ok_or("ClosePseudoConsole")?;

    Ok(PseudoConsoleFns {
        create: mem::transmute::<_, CreatePseudoConsoleFn>(create),
        resize: mem::transmute::<_, ResizePseudoConsoleFn>(resize),
        close: mem::transmute::<_, ClosePseudoConsoleFn>(close),
    })
}

fn handle(raw: RawHandle) -> HANDLE {
    HANDLE(raw.0 as *mut c_void)
}

fn raw(handle: HANDLE) -> RawHandle {
    RawHandle(handle.0 as isize)
}

fn os_error(e: windows::core::Error) -> io::Error {
    io::Error::from_raw_os_error(e.code().0)
}

fn hresult(hr: i32) -> io::Result<()> {
    if hr < 0 {
        Err(io::Error::from_raw_os_error(hr))
    } else {
        Ok(())
    }
}

fn loaded_fns() -> io::Result<PseudoConsoleFns> {
    pseudo_console_fns().map_err(|missing| {
        io::Error::new(io::ErrorKind::Unsupported, format!("{} not found", missing))
    })
}

fn attribute_list(list: &mut [u8]) -> LPPROC_THREAD_ATTRIBUTE_LIST {
    LPPROC_THREAD_ATTRIBUTE_LIST(list.as_mut_ptr().cast())
}

/// Windows ConPTY system calls
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Api;

impl ConsoleApi for Win32Api {
    fn probe(&self) -> Result<()> {
        pseudo_console_fns()
            .map(|_| ())
            .map_err(ConPtyError::UnsupportedPlatform)
    }

    fn create_pipe(&self) -> io::Result<(RawHandle, RawHandle)> {
        let mut read = HANDLE::default();
        let mut write = HANDLE::default();
        unsafe {
            CreatePipe(&mut read, &mut write, None, 0).map_err(os_error)?;
        }
        Ok((raw(read), raw(write)))
    }

    fn close_handle(&self, h: RawHandle) -> io::Result<()> {
        unsafe { CloseHandle(handle(h)).map_err(os_error) }
    }

    fn create_pseudo_console(
        &self,
        size: ConsoleSize,
        input: RawHandle,
        output: RawHandle,
    ) -> io::Result<RawHandle> {
        let fns = loaded_fns()?;
        let mut console: isize = 0;
        let hr = unsafe { (fns.create)(size.pack(), input.0, output.0, 0, &mut console) };
        hresult(hr)?;
        Ok(RawHandle(console))
    }

    fn resize_pseudo_console(&self, console: RawHandle, size: ConsoleSize) -> io::Result<()> {
        let fns = loaded_fns()?;
        hresult(unsafe { (fns.resize)(console.0, size.pack()) })
    }

    fn close_pseudo_console(&self, console: RawHandle) {
        if let Ok(fns) = loaded_fns() {
            unsafe { (fns.close)(console.0) }
        }
    }

    fn attribute_list_size(&self, count: u32) -> io::Result<usize> {
        let mut size: usize = 0;
        // The zero-length probe always fails with ERROR_INSUFFICIENT_BUFFER
        let probe = unsafe {
            InitializeProcThreadAttributeList(LPPROC_THREAD_ATTRIBUTE_LIST::default(), count, 0, &mut size)
        };
        match probe {
            _ if size > 0 => Ok(size),
            Err(e) => Err(os_error(e)),
            Ok(()) => Err(io::Error::new(
                io::ErrorKind::Other,
                "attribute list size probe returned zero",
            )),
        }
    }

    fn initialize_attribute_list(&self, list: &mut [u8], count: u32) -> io::Result<()> {
        let mut size = list.len();
        unsafe {
            InitializeProcThreadAttributeList(attribute_list(list), count, 0, &mut size)
                .map_err(os_error)
        }
    }

    fn bind_pseudo_console(&self, list: &mut [u8], console: RawHandle) -> io::Result<()> {
        unsafe {
            UpdateProcThreadAttribute(
                attribute_list(list),
                0,
                PROC_THREAD_ATTRIBUTE_PSEUDOCONSOLE,
                Some(console.0 as *const c_void),
                mem::size_of::<isize>(),
                None,
                None,
            )
            .map_err(os_error)
        }
    }

    fn delete_attribute_list(&self, list: &mut [u8]) {
        unsafe { DeleteProcThreadAttributeList(attribute_list(list)) }
    }

    fn create_process(&self, command_line: &str, list: &mut [u8]) -> io::Result<ProcessInfo> {
        let mut startup_info = STARTUPINFOEXW::default();
        startup_info.StartupInfo.cb = mem::size_of::<STARTUPINFOEXW>() as u32;
        startup_info.lpAttributeList = attribute_list(list);

        let mut process_info = PROCESS_INFORMATION::default();
        let mut cmd_wide: Vec<u16> = command_line.encode_utf16().chain(std::iter::once(0)).collect();

        unsafe {
            CreateProcessW(
                PCWSTR::null(),
                PWSTR(cmd_wide.as_mut_ptr()),
                None,
                None,
                false,
                EXTENDED_STARTUPINFO_PRESENT,
                None,
                PCWSTR::null(),
                &startup_info.StartupInfo,
                &mut process_info,
            )
            .map_err(os_error)?;
        }

        Ok(ProcessInfo {
            process: raw(process_info.hProcess),
            thread: raw(process_info.hThread),
            pid: process_info.dwProcessId,
        })
    }

    fn peek_available(&self, pipe: RawHandle) -> io::Result<u32> {
        let mut available: u32 = 0;
        unsafe {
            PeekNamedPipe(handle(pipe), None, 0, None, Some(&mut available), None)
                .map_err(os_error)?;
        }
        Ok(available)
    }

    fn read(&self, pipe: RawHandle, buffer: &mut [u8]) -> io::Result<usize> {
        let mut read: u32 = 0;
        unsafe {
            ReadFile(handle(pipe), Some(buffer), Some(&mut read), None).map_err(os_error)?;
        }
        Ok(read as usize)
    }

    fn write(&self, pipe: RawHandle, data: &[u8]) -> io::Result<usize> {
        let mut written: u32 = 0;
        unsafe {
            WriteFile(handle(pipe), Some(data), Some(&mut written), None).map_err(os_error)?;
        }
        Ok(written as usize)
    }

    fn wait_process(&self, process: RawHandle, timeout_ms: u32) -> io::Result<bool> {
        let result = unsafe { WaitForSingleObject(handle(process), timeout_ms) };
        match result.0 {
            WAIT_OBJECT_0 => Ok(true),
            WAIT_TIMEOUT => Ok(false),
            _ => Err(io::Error::last_os_error()),
        }
    }

    fn exit_code(&self, process: RawHandle) -> io::Result<u32> {
        let mut exit_code: u32 = 0;
        unsafe {
            GetExitCodeProcess(handle(process), &mut exit_code).map_err(os_error)?;
        }
        Ok(exit_code)
    }
}
