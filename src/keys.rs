//! Virtual-key codes and key classification
//!
//! The engine works in Windows virtual-key numbering throughout: the hook
//! reports `u32` codes, the remap tables store them, and the input boundary
//! consumes them. This module holds the constants the rest of the crate
//! needs plus the classification helpers (modifier family/side, toggle
//! keys, the ranges the keyboard-state scan ignores).

/// Left mouse button (start of the mouse-button range the state scan skips)
pub const VK_LBUTTON: u32 = 0x01;
/// Second X mouse button (end of the mouse-button range)
pub const VK_XBUTTON2: u32 = 0x06;

/// Generic Shift (either side)
pub const VK_SHIFT: u32 = 0x10;
/// Generic Control (either side)
pub const VK_CONTROL: u32 = 0x11;
/// Generic Alt (either side)
pub const VK_MENU: u32 = 0x12;
/// Caps Lock
pub const VK_CAPITAL: u32 = 0x14;

/// Left Windows key
pub const VK_LWIN: u32 = 0x5B;
/// Right Windows key
pub const VK_RWIN: u32 = 0x5C;

/// Num Lock
pub const VK_NUMLOCK: u32 = 0x90;
/// Scroll Lock
pub const VK_SCROLL: u32 = 0x91;

pub const VK_LSHIFT: u32 = 0xA0;
pub const VK_RSHIFT: u32 = 0xA1;
pub const VK_LCONTROL: u32 = 0xA2;
pub const VK_RCONTROL: u32 = 0xA3;
pub const VK_LMENU: u32 = 0xA4;
pub const VK_RMENU: u32 = 0xA5;

/// Reserved, otherwise-unused code injected around bare Win transitions so
/// the OS never observes a lone Win press/release and opens the Start menu.
pub const DUMMY_KEY: u32 = 0xFF;

/// Sentinel target meaning "disable this key/shortcut". Sits above the
/// 8-bit virtual-key space so it can never collide with a real key.
pub const VK_DISABLED: u32 = 0x100;

/// Sentinel source/target code for the logical "either Windows key"
/// modifier. No OS-level code represents it; synthesis always resolves it
/// to [`VK_LWIN`] or [`VK_RWIN`].
pub const VK_WIN_BOTH: u32 = 0x104;

/// Highest code visited by the keyboard-state scan.
pub const VK_MAX_SCAN: u32 = 0xFE;

/// The four modifier families a shortcut can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierFamily {
    Win,
    Ctrl,
    Alt,
    Shift,
}

impl ModifierFamily {
    /// Canonical synthesis order: Win, Ctrl, Alt, Shift (key-down).
    /// Key-up events use the reverse.
    pub const CANONICAL_ORDER: [ModifierFamily; 4] = [
        ModifierFamily::Win,
        ModifierFamily::Ctrl,
        ModifierFamily::Alt,
        ModifierFamily::Shift,
    ];

    /// The generic (side-less) code for this family, where one exists.
    /// Win has no generic code; callers must resolve a concrete side.
    pub fn generic_vk(self) -> Option<u32> {
        match self {
            ModifierFamily::Win => None,
            ModifierFamily::Ctrl => Some(VK_CONTROL),
            ModifierFamily::Alt => Some(VK_MENU),
            ModifierFamily::Shift => Some(VK_SHIFT),
        }
    }

    pub fn left_vk(self) -> u32 {
        match self {
            ModifierFamily::Win => VK_LWIN,
            ModifierFamily::Ctrl => VK_LCONTROL,
            ModifierFamily::Alt => VK_LMENU,
            ModifierFamily::Shift => VK_LSHIFT,
        }
    }

    pub fn right_vk(self) -> u32 {
        match self {
            ModifierFamily::Win => VK_RWIN,
            ModifierFamily::Ctrl => VK_RCONTROL,
            ModifierFamily::Alt => VK_RMENU,
            ModifierFamily::Shift => VK_RSHIFT,
        }
    }
}

/// Which physical side of a modifier family a code names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierSide {
    Left,
    Right,
    /// Either side (the generic VK_SHIFT/VK_CONTROL/VK_MENU codes, or the
    /// [`VK_WIN_BOTH`] sentinel).
    Both,
}

/// Classifies a code as a modifier, returning its family and side.
/// Non-modifier codes (action keys) return `None`.
pub fn modifier_of(vk: u32) -> Option<(ModifierFamily, ModifierSide)> {
    match vk {
        VK_LWIN => Some((ModifierFamily::Win, ModifierSide::Left)),
        VK_RWIN => Some((ModifierFamily::Win, ModifierSide::Right)),
        VK_WIN_BOTH => Some((ModifierFamily::Win, ModifierSide::Both)),
        VK_LCONTROL => Some((ModifierFamily::Ctrl, ModifierSide::Left)),
        VK_RCONTROL => Some((ModifierFamily::Ctrl, ModifierSide::Right)),
        VK_CONTROL => Some((ModifierFamily::Ctrl, ModifierSide::Both)),
        VK_LMENU => Some((ModifierFamily::Alt, ModifierSide::Left)),
        VK_RMENU => Some((ModifierFamily::Alt, ModifierSide::Right)),
        VK_MENU => Some((ModifierFamily::Alt, ModifierSide::Both)),
        VK_LSHIFT => Some((ModifierFamily::Shift, ModifierSide::Left)),
        VK_RSHIFT => Some((ModifierFamily::Shift, ModifierSide::Right)),
        VK_SHIFT => Some((ModifierFamily::Shift, ModifierSide::Both)),
        _ => None,
    }
}

/// Keys where the OS flips an indicator state before the hook observes the
/// event. Suppressing one of these desyncs the indicator, so the dispatcher
/// replays a suppressed press to restore it.
pub fn is_toggle_key(vk: u32) -> bool {
    matches!(vk, VK_CAPITAL | VK_NUMLOCK | VK_SCROLL)
}

/// Codes the full-keyboard state scan skips: mouse buttons, undefined and
/// reserved slots, IME state keys, and OEM-specific codes. Holding one of
/// these must never block a shortcut match.
pub fn is_ignored_by_state_scan(vk: u32) -> bool {
    matches!(
        vk,
        VK_LBUTTON..=0x07          // mouse buttons + undefined 0x07
        | 0x0A..=0x0B              // reserved
        | 0x0E..=0x0F              // undefined
        | 0x15..=0x1A              // IME (Kana/Hangul/Junja/Final/Kanji)
        | 0x1C..=0x1F              // IME (Convert/NonConvert/Accept/ModeChange)
        | 0x3A..=0x40              // undefined
        | 0x5E                     // reserved
        | 0x88..=0x8F              // unassigned
        | 0x92..=0x9F              // OEM-specific / unassigned
        | 0xB8..=0xB9              // reserved
        | 0xC1..=0xDA              // reserved / unassigned
        | 0xE0                     // OEM-specific
        | 0xE1                     // OEM-specific
        | 0xE3..=0xE4              // OEM-specific
        | 0xE6                     // OEM-specific
        | 0xE8                     // unassigned
        | 0xFC..=0xFE              // remaining OEM codes
        | DUMMY_KEY
    )
}
