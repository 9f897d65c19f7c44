//! Windows input backend
//!
//! Production [`InputSimulator`] backed by `SendInput`, `GetAsyncKeyState`,
//! and the foreground-window process lookup. Injected events carry the
//! engine's tag values in `dwExtraInfo`, which is how the hook callback
//! recognizes its own output when it loops back.

use windows::Win32::Foundation::CloseHandle;
use windows::Win32::System::ProcessStatus::K32GetModuleBaseNameW;
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowThreadProcessId};

use crate::input::{InputEvent, InputSimulator};

/// Live-OS input backend.
#[derive(Debug, Default)]
pub struct WindowsInput;

impl WindowsInput {
    pub fn new() -> Self {
        WindowsInput
    }
}

fn to_raw_input(event: &InputEvent) -> INPUT {
    let ki = match *event {
        InputEvent::Key {
            vk,
            down,
            extra_info,
        } => KEYBDINPUT {
            wVk: VIRTUAL_KEY(vk as u16),
            wScan: 0,
            dwFlags: if down {
                KEYBD_EVENT_FLAGS(0)
            } else {
                KEYEVENTF_KEYUP
            },
            time: 0,
            dwExtraInfo: extra_info as usize,
        },
        InputEvent::Unicode {
            unit,
            down,
            extra_info,
        } => KEYBDINPUT {
            wVk: VIRTUAL_KEY(0),
            wScan: unit,
            dwFlags: if down {
                KEYEVENTF_UNICODE
            } else {
                KEYEVENTF_UNICODE | KEYEVENTF_KEYUP
            },
            time: 0,
            dwExtraInfo: extra_info as usize,
        },
    };
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 { ki },
    }
}

impl InputSimulator for WindowsInput {
    fn send_virtual_input(&self, events: &[InputEvent]) {
        if events.is_empty() {
            return;
        }
        let raw: Vec<INPUT> = events.iter().map(to_raw_input).collect();
        let sent = unsafe { SendInput(&raw, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != raw.len() {
            tracing::warn!("SendInput injected {} of {} events", sent, raw.len());
        }
    }

    fn get_virtual_key_state(&self, vk: u32) -> bool {
        if vk > u16::MAX as u32 {
            return false;
        }
        let state = unsafe { GetAsyncKeyState(vk as i32) };
        (state as u16) & 0x8000 != 0
    }

    fn foreground_process(&self) -> String {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.is_invalid() {
            return String::new();
        }
        let mut pid = 0u32;
        unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
        if pid == 0 {
            return String::new();
        }
        let handle = match unsafe {
            OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, pid)
        } {
            Ok(h) => h,
            Err(e) => {
                tracing::debug!("OpenProcess failed for pid {}: {}", pid, e);
                return String::new();
            }
        };
        let mut buf = [0u16; 260];
        let len = unsafe { K32GetModuleBaseNameW(handle, None, &mut buf) } as usize;
        let _ = unsafe { CloseHandle(handle) };
        String::from_utf16_lossy(&buf[..len]).to_lowercase()
    }
}
