//! Shortcut value model
//!
//! Canonical representation of a modifier+action(+chord) combination.
//! Provides the ordering the sorted match indices rely on, validity and
//! overlap classification for the editor, and the keyboard-state
//! predicates the dispatcher uses to decide whether a candidate shortcut
//! is currently (and exclusively) held.

use crate::input::InputSimulator;
use crate::keys::{self, ModifierFamily, ModifierSide};
use std::cmp::Ordering;

/// Per-family modifier requirement of a shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ModifierKey {
    /// Family not part of the shortcut.
    #[default]
    Disabled,
    Left,
    Right,
    /// Either physical side satisfies the requirement.
    Both,
}

impl ModifierKey {
    fn from_side(side: ModifierSide) -> Self {
        match side {
            ModifierSide::Left => ModifierKey::Left,
            ModifierSide::Right => ModifierKey::Right,
            ModifierSide::Both => ModifierKey::Both,
        }
    }

    pub fn is_set(self) -> bool {
        self != ModifierKey::Disabled
    }
}

/// What invoking a shortcut does. `RunProgram` and `OpenUri` payloads are
/// opaque to the engine; they are surfaced through the invocation handler
/// and never examined or launched here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Operation {
    #[default]
    Remap,
    RunProgram,
    OpenUri,
}

/// Classification of how two single keys relate when both appear as
/// remap sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOverlap {
    /// Unrelated keys, or true opposite sides of one modifier family.
    None,
    /// The exact same key.
    SameKeyPreviouslyMapped,
    /// Same modifier family, one side-specific and one "Both": ambiguous.
    ConflictingModifierKey,
}

/// A modifier+action(+chord) combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shortcut {
    pub win: ModifierKey,
    pub ctrl: ModifierKey,
    pub alt: ModifierKey,
    pub shift: ModifierKey,
    pub action_key: Option<u32>,
    /// Chorded shortcuts: key pressed after the initial combination.
    pub second_key: Option<u32>,
    pub operation: Operation,
    pub program_path: String,
    pub program_args: String,
    pub uri: String,
}

impl Shortcut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a shortcut from virtual-key codes in any order (modifiers
    /// classified by code, first non-modifier becomes the action key, a
    /// second non-modifier the chord key).
    pub fn from_keys(codes: &[u32]) -> Self {
        let mut shortcut = Self::new();
        for &code in codes {
            shortcut.set_key(code);
        }
        shortcut
    }

    /// Classifies `vk` into a modifier slot or the action/chord key.
    /// Returns `false` (no-op) when the shortcut already holds that exact
    /// value, so callers can skip redundant downstream refreshes.
    pub fn set_key(&mut self, vk: u32) -> bool {
        if let Some((family, side)) = keys::modifier_of(vk) {
            let value = ModifierKey::from_side(side);
            let slot = self.family_mut(family);
            if *slot == value {
                return false;
            }
            *slot = value;
            return true;
        }
        match (self.action_key, self.second_key) {
            (None, _) => {
                self.action_key = Some(vk);
                true
            }
            (Some(action), None) if action != vk => {
                self.second_key = Some(vk);
                true
            }
            (Some(action), _) if action == vk => false,
            (_, Some(second)) if second == vk => false,
            _ => false,
        }
    }

    /// Removes `vk` from the shortcut. Returns `false` if it was not part
    /// of it.
    pub fn clear_key(&mut self, vk: u32) -> bool {
        if let Some((family, side)) = keys::modifier_of(vk) {
            let value = ModifierKey::from_side(side);
            let slot = self.family_mut(family);
            if *slot == value {
                *slot = ModifierKey::Disabled;
                return true;
            }
            return false;
        }
        if self.second_key == Some(vk) {
            self.second_key = None;
            true
        } else if self.action_key == Some(vk) {
            self.action_key = None;
            true
        } else {
            false
        }
    }

    pub fn modifier(&self, family: ModifierFamily) -> ModifierKey {
        match family {
            ModifierFamily::Win => self.win,
            ModifierFamily::Ctrl => self.ctrl,
            ModifierFamily::Alt => self.alt,
            ModifierFamily::Shift => self.shift,
        }
    }

    fn family_mut(&mut self, family: ModifierFamily) -> &mut ModifierKey {
        match family {
            ModifierFamily::Win => &mut self.win,
            ModifierFamily::Ctrl => &mut self.ctrl,
            ModifierFamily::Alt => &mut self.alt,
            ModifierFamily::Shift => &mut self.shift,
        }
    }

    /// Count of populated fields (0-5): set modifier families plus the
    /// action key. Doubles as the match-priority metric for the sorted
    /// table indices.
    pub fn size(&self) -> u32 {
        let mods = ModifierFamily::CANONICAL_ORDER
            .iter()
            .filter(|&&f| self.modifier(f).is_set())
            .count() as u32;
        mods + u32::from(self.action_key.is_some())
    }

    /// A shortcut is valid as a remap source when it has exactly one
    /// action key and at least one modifier.
    pub fn is_valid(&self) -> bool {
        self.action_key.is_some() && self.size() >= 2
    }

    pub fn has_chord(&self) -> bool {
        self.second_key.is_some()
    }

    /// Whether a physical key code belongs to this shortcut's footprint.
    pub fn includes_key(&self, vk: u32) -> bool {
        if self.action_key == Some(vk) || self.second_key == Some(vk) {
            return true;
        }
        match keys::modifier_of(vk) {
            Some((family, side)) => match self.modifier(family) {
                ModifierKey::Disabled => false,
                ModifierKey::Both => true,
                ModifierKey::Left => matches!(side, ModifierSide::Left | ModifierSide::Both),
                ModifierKey::Right => matches!(side, ModifierSide::Right | ModifierSide::Both),
            },
            None => false,
        }
    }

    /// True only if every required modifier currently reads pressed.
    /// `Both` resolves via either concrete side (or the generic code).
    pub fn check_modifiers_pressed(&self, input: &dyn InputSimulator) -> bool {
        for family in ModifierFamily::CANONICAL_ORDER {
            let down = match self.modifier(family) {
                ModifierKey::Disabled => continue,
                ModifierKey::Left => input.get_virtual_key_state(family.left_vk()),
                ModifierKey::Right => input.get_virtual_key_state(family.right_vk()),
                ModifierKey::Both => {
                    input.get_virtual_key_state(family.left_vk())
                        || input.get_virtual_key_state(family.right_vk())
                        || family
                            .generic_vk()
                            .is_some_and(|vk| input.get_virtual_key_state(vk))
                }
            };
            if !down {
                return false;
            }
        }
        true
    }

    /// Scans the full virtual-key space (minus the documented ignore list)
    /// and fails if any key outside the given shortcuts' combined
    /// footprint is down. This is the guard preventing a match while
    /// extra keys are already held, and the reason a superset combination
    /// never triggers a smaller shortcut.
    pub fn is_keyboard_state_clear_except(
        shortcuts: &[&Shortcut],
        input: &dyn InputSimulator,
    ) -> bool {
        for vk in 1..=keys::VK_MAX_SCAN {
            if keys::is_ignored_by_state_scan(vk) {
                continue;
            }
            if !input.get_virtual_key_state(vk) {
                continue;
            }
            if !shortcuts.iter().any(|s| s.includes_key(vk)) {
                return false;
            }
        }
        true
    }
}

impl Ord for Shortcut {
    fn cmp(&self, other: &Self) -> Ordering {
        self.win
            .cmp(&other.win)
            .then_with(|| self.ctrl.cmp(&other.ctrl))
            .then_with(|| self.alt.cmp(&other.alt))
            .then_with(|| self.shift.cmp(&other.shift))
            .then_with(|| self.action_key.cmp(&other.action_key))
            .then_with(|| self.second_key.cmp(&other.second_key))
            .then_with(|| self.operation.cmp(&other.operation))
            .then_with(|| self.program_path.cmp(&other.program_path))
            .then_with(|| self.program_args.cmp(&other.program_args))
            .then_with(|| self.uri.cmp(&other.uri))
    }
}

impl PartialOrd for Shortcut {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Classifies two single remap-source keys. Encodes the modifier-side
/// ambiguity model: a concrete side and the generic "Both" of the same
/// family cannot coexist as independent sources.
pub fn keys_overlap(a: u32, b: u32) -> KeyOverlap {
    if a == b {
        return KeyOverlap::SameKeyPreviouslyMapped;
    }
    if let (Some((family_a, side_a)), Some((family_b, side_b))) =
        (keys::modifier_of(a), keys::modifier_of(b))
    {
        if family_a == family_b {
            let conflicting = (side_a == ModifierSide::Both) != (side_b == ModifierSide::Both);
            if conflicting {
                return KeyOverlap::ConflictingModifierKey;
            }
        }
    }
    KeyOverlap::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::MockedInput;
    use crate::keys::*;

    const VK_A: u32 = 0x41;
    const VK_B: u32 = 0x42;

    #[test]
    fn test_set_key_classifies_modifiers() {
        let mut s = Shortcut::new();
        assert!(s.set_key(VK_LCONTROL));
        assert_eq!(s.ctrl, ModifierKey::Left);
        assert!(s.set_key(VK_CONTROL));
        assert_eq!(s.ctrl, ModifierKey::Both);
        assert!(s.set_key(VK_WIN_BOTH));
        assert_eq!(s.win, ModifierKey::Both);
    }

    #[test]
    fn test_set_key_noop_when_unchanged() {
        let mut s = Shortcut::new();
        assert!(s.set_key(VK_LSHIFT));
        assert!(!s.set_key(VK_LSHIFT));
        assert!(s.set_key(VK_A));
        assert!(!s.set_key(VK_A));
    }

    #[test]
    fn test_second_non_modifier_becomes_chord_key() {
        let s = Shortcut::from_keys(&[VK_CONTROL, VK_A, VK_B]);
        assert_eq!(s.action_key, Some(VK_A));
        assert_eq!(s.second_key, Some(VK_B));
        assert!(s.has_chord());
    }

    #[test]
    fn test_size_and_validity() {
        let mut s = Shortcut::new();
        assert_eq!(s.size(), 0);
        assert!(!s.is_valid());

        s.set_key(VK_A);
        assert_eq!(s.size(), 1);
        assert!(!s.is_valid()); // action key but no modifier

        s.set_key(VK_CONTROL);
        assert_eq!(s.size(), 2);
        assert!(s.is_valid());

        let mods_only = Shortcut::from_keys(&[VK_CONTROL, VK_SHIFT]);
        assert!(!mods_only.is_valid());

        let all = Shortcut::from_keys(&[VK_WIN_BOTH, VK_CONTROL, VK_MENU, VK_SHIFT, VK_A]);
        assert_eq!(all.size(), 5);
    }

    #[test]
    fn test_keys_overlap_classification() {
        assert_eq!(
            keys_overlap(VK_LCONTROL, VK_CONTROL),
            KeyOverlap::ConflictingModifierKey
        );
        assert_eq!(keys_overlap(VK_LCONTROL, VK_RCONTROL), KeyOverlap::None);
        assert_eq!(
            keys_overlap(VK_A, VK_A),
            KeyOverlap::SameKeyPreviouslyMapped
        );
        assert_eq!(keys_overlap(VK_LSHIFT, VK_RCONTROL), KeyOverlap::None);
        assert_eq!(
            keys_overlap(VK_WIN_BOTH, VK_LWIN),
            KeyOverlap::ConflictingModifierKey
        );
    }

    #[test]
    fn test_includes_key_resolves_sides() {
        let s = Shortcut::from_keys(&[VK_WIN_BOTH, VK_LCONTROL, VK_A]);
        assert!(s.includes_key(VK_LWIN));
        assert!(s.includes_key(VK_RWIN));
        assert!(s.includes_key(VK_LCONTROL));
        assert!(s.includes_key(VK_CONTROL));
        assert!(!s.includes_key(VK_RCONTROL));
        assert!(s.includes_key(VK_A));
        assert!(!s.includes_key(VK_B));
    }

    #[test]
    fn test_check_modifiers_pressed_resolves_both() {
        let input = MockedInput::new();
        let s = Shortcut::from_keys(&[VK_WIN_BOTH, VK_A]);
        assert!(!s.check_modifiers_pressed(&input));

        input.send_key_event(crate::input::KeyTransition::KeyDown, VK_RWIN);
        assert!(s.check_modifiers_pressed(&input));
    }

    #[test]
    fn test_keyboard_state_clear_guard() {
        let input = MockedInput::new();
        let s = Shortcut::from_keys(&[VK_LCONTROL, VK_A]);

        input.send_key_event(crate::input::KeyTransition::KeyDown, VK_LCONTROL);
        input.send_key_event(crate::input::KeyTransition::KeyDown, VK_A);
        assert!(Shortcut::is_keyboard_state_clear_except(&[&s], &input));

        input.send_key_event(crate::input::KeyTransition::KeyDown, VK_B);
        assert!(!Shortcut::is_keyboard_state_clear_except(&[&s], &input));

        // Mouse buttons and other ignored codes never block a match.
        input.send_key_event(crate::input::KeyTransition::KeyUp, VK_B);
        input.send_key_event(crate::input::KeyTransition::KeyDown, VK_LBUTTON);
        assert!(Shortcut::is_keyboard_state_clear_except(&[&s], &input));
    }

    #[test]
    fn test_ordering_is_total_and_deterministic() {
        let a = Shortcut::from_keys(&[VK_CONTROL, VK_A]);
        let b = Shortcut::from_keys(&[VK_CONTROL, VK_B]);
        let c = Shortcut::from_keys(&[VK_CONTROL, VK_SHIFT, VK_A]);
        let mut sorted = vec![c.clone(), b.clone(), a.clone()];
        sorted.sort();
        let mut again = vec![b, a, c];
        again.sort();
        assert_eq!(sorted, again);
    }
}
