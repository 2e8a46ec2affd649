//! Key event types shared between the filter logic and the platform hook.
//!
//! Virtual-key codes are mirrored here as plain constants so the filter
//! logic compiles and tests without the Windows bindings.

/// A raw key transition as seen by the low-level hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Virtual-key code.
    pub vk: u32,
    /// Press (true) or release (false).
    pub down: bool,
}

impl KeyEvent {
    pub fn down(vk: u32) -> Self {
        Self { vk, down: true }
    }

    pub fn up(vk: u32) -> Self {
        Self { vk, down: false }
    }
}

pub const VK_TAB: u32 = 0x09;
pub const VK_DELETE: u32 = 0x2E;
pub const VK_F4: u32 = 0x73;
pub const VK_LWIN: u32 = 0x5B;
pub const VK_RWIN: u32 = 0x5C;
pub const VK_CONTROL: u32 = 0x11;
pub const VK_LCONTROL: u32 = 0xA2;
pub const VK_RCONTROL: u32 = 0xA3;
pub const VK_MENU: u32 = 0x12;
pub const VK_LMENU: u32 = 0xA4;
pub const VK_RMENU: u32 = 0xA5;
pub const VK_R: u32 = 0x52;

/// Whether the code is any control-key variant.
pub fn is_control(vk: u32) -> bool {
    matches!(vk, VK_CONTROL | VK_LCONTROL | VK_RCONTROL)
}

/// Whether the code is any alt-key variant.
pub fn is_alt(vk: u32) -> bool {
    matches!(vk, VK_MENU | VK_LMENU | VK_RMENU)
}

/// Map a virtual-key code to a lowercase character, when it has one.
/// Letters and digits are enough for passphrase comparison.
pub fn vk_to_char(vk: u32) -> Option<char> {
    match vk {
        0x41..=0x5A => Some((b'a' + (vk - 0x41) as u8) as char),
        0x30..=0x39 => Some((b'0' + (vk - 0x30) as u8) as char),
        _ => None,
    }
}

/// Outcome of filtering one key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    /// Deliver the event to the OS.
    Pass,
    /// Suppress the event.
    Swallow,
    /// Suppress the event and request unlock of the locked surface.
    Unlock,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vk_to_char_letters_and_digits() {
        assert_eq!(vk_to_char(0x41), Some('a'));
        assert_eq!(vk_to_char(0x5A), Some('z'));
        assert_eq!(vk_to_char(0x30), Some('0'));
        assert_eq!(vk_to_char(VK_TAB), None);
    }

    #[test]
    fn test_modifier_classification() {
        assert!(is_control(VK_LCONTROL));
        assert!(is_control(VK_CONTROL));
        assert!(is_alt(VK_RMENU));
        assert!(!is_control(VK_R));
    }
}
