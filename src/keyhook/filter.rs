//! Escape-blocking filter and unlock-sequence detection.
//!
//! This is the decision core of the keyboard interception: given the raw
//! stream of key transitions it decides, per event, whether to deliver,
//! suppress, or suppress-and-unlock. It holds no OS state, so the whole
//! state machine is exercised by plain unit tests.

use crate::keyhook::types::{
    is_alt, is_control, vk_to_char, FilterVerdict, KeyEvent, VK_DELETE, VK_F4, VK_LWIN, VK_R,
    VK_RWIN, VK_TAB,
};

/// Passphrase that, typed after ctrl+R, unlocks the locked surface.
pub const UNLOCK_PASSPHRASE: &str = "parent";

/// Stateful key filter: swallows application-switch and forced-close
/// combinations and watches for the unlock sequence.
#[derive(Debug)]
pub struct EscapeFilter {
    passphrase: Vec<char>,
    armed: bool,
    cursor: usize,
    ctrl_down: bool,
    alt_down: bool,
}

impl EscapeFilter {
    pub fn new() -> Self {
        Self::with_passphrase(UNLOCK_PASSPHRASE)
    }

    pub fn with_passphrase(passphrase: &str) -> Self {
        Self {
            passphrase: passphrase.to_ascii_lowercase().chars().collect(),
            armed: false,
            cursor: 0,
            ctrl_down: false,
            alt_down: false,
        }
    }

    /// Whether sequence capture is currently armed.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Process one key transition and decide its fate.
    pub fn handle(&mut self, event: KeyEvent) -> FilterVerdict {
        // Modifier keys only track state; they never count against the
        // unlock sequence and are always delivered.
        if is_control(event.vk) {
            self.ctrl_down = event.down;
            return FilterVerdict::Pass;
        }
        if is_alt(event.vk) {
            self.alt_down = event.down;
            return FilterVerdict::Pass;
        }
        if !event.down {
            return FilterVerdict::Pass;
        }

        // ctrl+R (re-)arms sequence capture and resets the cursor.
        if event.vk == VK_R && self.ctrl_down {
            self.armed = true;
            self.cursor = 0;
            return FilterVerdict::Swallow;
        }

        if self.armed {
            match vk_to_char(event.vk) {
                Some(c) if c == self.passphrase[self.cursor] => {
                    self.cursor += 1;
                    if self.cursor == self.passphrase.len() {
                        self.armed = false;
                        return FilterVerdict::Unlock;
                    }
                }
                _ => {
                    self.armed = false;
                }
            }
            return FilterVerdict::Swallow;
        }

        let blocked = (self.alt_down && (event.vk == VK_TAB || event.vk == VK_F4))
            || (self.ctrl_down && self.alt_down && event.vk == VK_DELETE)
            || event.vk == VK_LWIN
            || event.vk == VK_RWIN;
        if blocked {
            FilterVerdict::Swallow
        } else {
            FilterVerdict::Pass
        }
    }
}

impl Default for EscapeFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyhook::types::{VK_LCONTROL, VK_LMENU};

    fn vk_of(c: char) -> u32 {
        c.to_ascii_uppercase() as u32
    }

    fn type_word(filter: &mut EscapeFilter, word: &str) -> Vec<FilterVerdict> {
        word.chars()
            .map(|c| filter.handle(KeyEvent::down(vk_of(c))))
            .collect()
    }

    fn arm(filter: &mut EscapeFilter) {
        filter.handle(KeyEvent::down(VK_LCONTROL));
        assert_eq!(filter.handle(KeyEvent::down(VK_R)), FilterVerdict::Swallow);
        filter.handle(KeyEvent::up(VK_LCONTROL));
        assert!(filter.is_armed());
    }

    #[test]
    fn test_full_sequence_unlocks() {
        let mut filter = EscapeFilter::new();
        arm(&mut filter);
        let verdicts = type_word(&mut filter, "parent");
        assert_eq!(verdicts.last(), Some(&FilterVerdict::Unlock));
        assert!(verdicts[..verdicts.len() - 1]
            .iter()
            .all(|v| *v == FilterVerdict::Swallow));
    }

    #[test]
    fn test_sequence_is_case_insensitive() {
        let mut filter = EscapeFilter::new();
        arm(&mut filter);
        let verdicts = type_word(&mut filter, "PARENT");
        assert_eq!(verdicts.last(), Some(&FilterVerdict::Unlock));
    }

    #[test]
    fn test_wrong_character_resets_and_requires_rearm() {
        let mut filter = EscapeFilter::new();
        arm(&mut filter);
        type_word(&mut filter, "par");
        assert_eq!(filter.handle(KeyEvent::down(vk_of('x'))), FilterVerdict::Swallow);
        assert!(!filter.is_armed());

        // Without re-arming, the passphrase no longer progresses.
        let verdicts = type_word(&mut filter, "parent");
        assert!(!verdicts.contains(&FilterVerdict::Unlock));

        // Re-arming starts over from position 0.
        arm(&mut filter);
        let verdicts = type_word(&mut filter, "parent");
        assert_eq!(verdicts.last(), Some(&FilterVerdict::Unlock));
    }

    #[test]
    fn test_rearm_resets_cursor() {
        let mut filter = EscapeFilter::new();
        arm(&mut filter);
        type_word(&mut filter, "par");
        arm(&mut filter);
        let verdicts = type_word(&mut filter, "parent");
        assert_eq!(verdicts.last(), Some(&FilterVerdict::Unlock));
    }

    #[test]
    fn test_switch_combinations_swallowed() {
        let mut filter = EscapeFilter::new();

        filter.handle(KeyEvent::down(VK_LMENU));
        assert_eq!(filter.handle(KeyEvent::down(VK_TAB)), FilterVerdict::Swallow);
        assert_eq!(filter.handle(KeyEvent::down(VK_F4)), FilterVerdict::Swallow);
        filter.handle(KeyEvent::up(VK_LMENU));

        filter.handle(KeyEvent::down(VK_LCONTROL));
        filter.handle(KeyEvent::down(VK_LMENU));
        assert_eq!(
            filter.handle(KeyEvent::down(VK_DELETE)),
            FilterVerdict::Swallow
        );
        filter.handle(KeyEvent::up(VK_LMENU));
        filter.handle(KeyEvent::up(VK_LCONTROL));

        assert_eq!(filter.handle(KeyEvent::down(VK_LWIN)), FilterVerdict::Swallow);
        assert_eq!(filter.handle(KeyEvent::down(VK_RWIN)), FilterVerdict::Swallow);
    }

    #[test]
    fn test_plain_keys_pass_through() {
        let mut filter = EscapeFilter::new();
        assert_eq!(filter.handle(KeyEvent::down(vk_of('a'))), FilterVerdict::Pass);
        assert_eq!(filter.handle(KeyEvent::down(VK_TAB)), FilterVerdict::Pass);
        assert_eq!(filter.handle(KeyEvent::up(vk_of('a'))), FilterVerdict::Pass);
    }

    #[test]
    fn test_unlock_is_one_shot() {
        let mut filter = EscapeFilter::new();
        arm(&mut filter);
        let verdicts = type_word(&mut filter, "parent");
        assert_eq!(verdicts.last(), Some(&FilterVerdict::Unlock));

        // The sequence does not fire again without a fresh ctrl+R.
        let verdicts = type_word(&mut filter, "parent");
        assert!(!verdicts.contains(&FilterVerdict::Unlock));
    }
}
