//! Event classification and synthesis
//!
//! One entry point, [`Dispatcher::handle_key_event`], consumes each
//! physical key transition on the hook callback thread and decides to
//! pass it through, suppress it, or suppress it and inject synthetic
//! input through the [`InputSimulator`] boundary. Classification order,
//! first match wins:
//!
//! 1. Events carrying the engine's own tags: swallow tag swallowed,
//!    injected tag passed through, neither ever reprocessed.
//! 2. Active key detection (editor recording a new remap).
//! 3. Single-key table; a remapped key is owned here for its full
//!    press/release cycle.
//! 4. Global shortcut table, most specific candidate first.
//! 5. App-specific shortcut table, scoped by the foreground process.
//!
//! The hook expects a fast synchronous return; everything here is lock
//! plus arithmetic, no I/O.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::detect::KeyDetector;
use crate::input::{
    is_engine_injected, is_suppress_tagged, EventDecision, InputEvent, InputSimulator, KeyEvent,
    INJECTED_FLAG, SUPPRESS_FLAG,
};
use crate::keys::{self, ModifierFamily};
use crate::shortcut::{ModifierKey, Operation, Shortcut};
use crate::tables::{RemapShortcut, RemapTables, RemapTarget, ShortcutScope, NO_ACTIVATED_APP};

/// Called when an invoked shortcut targets a program or URI. The payload
/// is opaque to the engine; the handler owns launching.
pub type InvocationHandler = Box<dyn Fn(&Shortcut) + Send + Sync>;

pub struct Dispatcher {
    tables: Arc<RemapTables>,
    input: Arc<dyn InputSimulator>,
    detector: Arc<KeyDetector>,
    invocation_handler: RwLock<Option<InvocationHandler>>,
}

impl Dispatcher {
    pub fn new(tables: Arc<RemapTables>, input: Arc<dyn InputSimulator>) -> Self {
        Self {
            tables,
            input,
            detector: Arc::new(KeyDetector::new()),
            invocation_handler: RwLock::new(None),
        }
    }

    pub fn tables(&self) -> &Arc<RemapTables> {
        &self.tables
    }

    pub fn detector(&self) -> &Arc<KeyDetector> {
        &self.detector
    }

    pub fn set_invocation_handler(&self, handler: InvocationHandler) {
        *self.invocation_handler.write() = Some(handler);
    }

    /// Dispatch entry point. Never panics: any internal failure degrades
    /// to passing the event through unmodified, preserving basic keyboard
    /// usability over correct remapping.
    pub fn handle_key_event(&self, event: &KeyEvent) -> EventDecision {
        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(event))) {
            Ok(decision) => decision,
            Err(_) => {
                tracing::error!(
                    "Dispatch failed for vk {:#x}; passing event through",
                    event.vk
                );
                EventDecision::Continue
            }
        }
    }

    fn dispatch(&self, event: &KeyEvent) -> EventDecision {
        // Own output first: injected events re-enter this same hook and
        // must never be reprocessed.
        if is_suppress_tagged(event.extra_info) {
            return EventDecision::Suppress;
        }
        if is_engine_injected(event.extra_info) {
            return EventDecision::Continue;
        }

        if self.detector.is_active() {
            self.detector
                .handle_key(event.vk, event.transition.is_down(), event.time_ms);
            return EventDecision::Suppress;
        }

        let decision = self.classify(event);
        if event.transition.is_up() {
            self.maybe_reset_activated_app(event.vk);
        }
        decision
    }

    fn classify(&self, event: &KeyEvent) -> EventDecision {
        if let Some(decision) = self.handle_single_key_remap(event) {
            return decision;
        }

        if let Some(decision) = self
            .tables
            .with_global_scope_mut(|scope| self.handle_shortcut_scope(event, scope, None, true))
        {
            return decision;
        }

        let foreground = self.input.foreground_process();
        let activated = self.tables.activated_app();

        // An in-flight app-specific gesture keeps ownership of its
        // combination even after focus moves away; only new matches are
        // gated on the foreground process.
        if activated != NO_ACTIVATED_APP && activated != foreground {
            let handled = self.tables.with_app_scope_mut(&activated, |scope| {
                self.handle_shortcut_scope(event, scope, Some(&activated), false)
            });
            if let Some(Some(decision)) = handled {
                return decision;
            }
        }

        let handled = self.tables.with_app_scope_mut(&foreground, |scope| {
            self.handle_shortcut_scope(event, scope, Some(&foreground), true)
        });
        if let Some(Some(decision)) = handled {
            return decision;
        }

        EventDecision::Continue
    }

    // -----------------------------------------------------------------
    // Single-key remaps
    // -----------------------------------------------------------------

    /// A remapped physical key is owned here for its full press/release
    /// cycle; no shortcut handler ever observes it.
    fn handle_single_key_remap(&self, event: &KeyEvent) -> Option<EventDecision> {
        let target = self.tables.single_key_target(event.vk)?;
        let down = event.transition.is_down();

        match target {
            RemapTarget::Key(keys::VK_DISABLED) => {
                // Swallow entirely; nothing is synthesized.
            }
            RemapTarget::Key(vk) => {
                let vk = resolve_target_key(vk);
                self.input.send_virtual_input(&[InputEvent::Key {
                    vk,
                    down,
                    extra_info: INJECTED_FLAG,
                }]);
            }
            RemapTarget::Shortcut(target) if target.operation != Operation::Remap => {
                if down {
                    if let Some(handler) = self.invocation_handler.read().as_ref() {
                        handler(&target);
                    } else {
                        tracing::warn!("Program/URI shortcut invoked with no handler installed");
                    }
                }
            }
            RemapTarget::Shortcut(target) => {
                let events = if down {
                    single_key_shortcut_down(&target)
                } else {
                    single_key_shortcut_up(&target)
                };
                self.input.send_virtual_input(&events);
            }
            RemapTarget::Text(text) => {
                if down {
                    self.input.send_virtual_input(&unicode_events(&text));
                }
            }
        }

        if down && keys::is_toggle_key(event.vk) {
            self.replay_toggle(event.vk);
        }
        Some(EventDecision::Suppress)
    }

    // -----------------------------------------------------------------
    // Shortcut remaps
    // -----------------------------------------------------------------

    /// Runs one shortcut scope. Invoked (or chord-pending) entries own
    /// events belonging to their combination; otherwise key-down events
    /// are tried against the candidates in most-specific-first order.
    fn handle_shortcut_scope(
        &self,
        event: &KeyEvent,
        scope: &mut ShortcutScope,
        app: Option<&str>,
        match_allowed: bool,
    ) -> Option<EventDecision> {
        let sources: Vec<Shortcut> = scope.sorted_sources().to_vec();

        for source in &sources {
            let entry = scope.get_mut(source)?;
            if entry.is_invoked {
                if let Some(decision) = self.handle_invoked(event, source, entry) {
                    return Some(decision);
                }
            } else if entry.chord_started {
                if let Some(decision) = self.handle_chord_pending(event, source, entry, app) {
                    return Some(decision);
                }
            }
        }

        if !match_allowed || event.transition.is_up() {
            return None;
        }

        for source in &sources {
            let entry = scope.get(source)?;
            if entry.is_invoked || entry.chord_started {
                continue;
            }
            if event.vk != source.action_key.unwrap_or(0) {
                continue;
            }
            if !source.check_modifiers_pressed(self.input.as_ref()) {
                continue;
            }
            // A candidate matches only when the currently-down key set
            // exactly equals its footprint; supersets fall through (and a
            // disabled combination's superset is never disabled).
            if !Shortcut::is_keyboard_state_clear_except(&[source], self.input.as_ref()) {
                continue;
            }

            let entry = scope.get_mut(source)?;
            if source.has_chord() {
                entry.chord_started = true;
                tracing::debug!("Chord started, awaiting second key");
                if keys::is_toggle_key(event.vk) {
                    self.replay_toggle(event.vk);
                }
                return Some(EventDecision::Suppress);
            }
            return Some(self.invoke_entry(event, source, entry, app));
        }

        None
    }

    /// Events arriving while the initial combination of a chord has been
    /// pressed and the second key is awaited.
    fn handle_chord_pending(
        &self,
        event: &KeyEvent,
        source: &Shortcut,
        entry: &mut RemapShortcut,
        app: Option<&str>,
    ) -> Option<EventDecision> {
        let down = event.transition.is_down();
        if down {
            if Some(event.vk) == source.second_key
                && source.check_modifiers_pressed(self.input.as_ref())
            {
                return Some(self.invoke_entry(event, source, entry, app));
            }
            if Some(event.vk) == source.action_key {
                // Auto-repeat of the suppressed initial press.
                return Some(EventDecision::Suppress);
            }
            if source.includes_key(event.vk) && keys::modifier_of(event.vk).is_some() {
                // Typematic repeat of a held required modifier; the key is
                // physically down and visible, and the chord stays pending.
                return Some(EventDecision::Continue);
            }
            // Any other key abandons the chord.
            entry.chord_started = false;
            None
        } else {
            if Some(event.vk) == source.action_key {
                return Some(EventDecision::Suppress);
            }
            if source
                .includes_key(event.vk)
                .then(|| keys::modifier_of(event.vk))
                .flatten()
                .is_some()
            {
                // A required modifier went up; the chord can no longer
                // complete. The physical release passes through.
                entry.chord_started = false;
                return Some(EventDecision::Continue);
            }
            None
        }
    }

    /// Transitions the per-mapping machine from `Idle` to `Invoked` and
    /// synthesizes the target.
    fn invoke_entry(
        &self,
        event: &KeyEvent,
        source: &Shortcut,
        entry: &mut RemapShortcut,
        app: Option<&str>,
    ) -> EventDecision {
        entry.is_invoked = true;
        entry.action_released = false;
        entry.chord_started = false;
        entry.suppressed_mods.clear();
        entry.synthesized_mods.clear();
        entry.win_invoked = if source.win == ModifierKey::Both {
            if self.input.get_virtual_key_state(keys::VK_RWIN) {
                ModifierKey::Right
            } else {
                ModifierKey::Left
            }
        } else {
            source.win
        };

        if let Some(app) = app {
            let combination = self.combination_codes(source);
            self.tables.set_activated_app(app, combination);
        }

        let mut events = Vec::new();
        match entry.target.clone() {
            RemapTarget::Key(keys::VK_DISABLED) => {
                // Exact match swallows the combination; nothing is sent.
            }
            RemapTarget::Key(vk) => {
                self.release_source_modifiers(source, &[], &mut events, entry);
                events.push(InputEvent::key_down(resolve_target_key(vk), INJECTED_FLAG));
            }
            RemapTarget::Shortcut(target) if target.operation != Operation::Remap => {
                if let Some(handler) = self.invocation_handler.read().as_ref() {
                    handler(&target);
                } else {
                    tracing::warn!("Program/URI shortcut invoked with no handler installed");
                }
            }
            RemapTarget::Shortcut(target) => {
                let common = self.press_target_modifiers(&target, source, &mut events, entry);
                self.release_source_modifiers(source, &common, &mut events, entry);
                if let Some(action) = target.action_key {
                    events.push(InputEvent::key_down(action, INJECTED_FLAG));
                }
            }
            RemapTarget::Text(text) => {
                self.release_source_modifiers(source, &[], &mut events, entry);
                events.extend(unicode_events(&text));
            }
        }

        if !events.is_empty() {
            self.input.send_virtual_input(&events);
        }
        if keys::is_toggle_key(event.vk) {
            self.replay_toggle(event.vk);
        }
        tracing::debug!("Shortcut invoked for vk {:#x}", event.vk);
        EventDecision::Suppress
    }

    /// Events arriving while this mapping is inside a synthesized gesture
    /// (`Invoked` or `Invoked-ActionUp`).
    fn handle_invoked(
        &self,
        event: &KeyEvent,
        source: &Shortcut,
        entry: &mut RemapShortcut,
    ) -> Option<EventDecision> {
        let down = event.transition.is_down();

        if !source.includes_key(event.vk) {
            if down {
                // A different key combination is being formed: the gesture
                // ends, lingering synthesized modifiers are released, and
                // the new key continues through classification.
                self.teardown(source, entry, None);
                return None;
            }
            // Spurious up for a key never observed down must not reset
            // the invocation state.
            return None;
        }

        let is_action =
            Some(event.vk) == source.action_key || Some(event.vk) == source.second_key;

        if is_action {
            if down {
                // Auto-repeat (or re-press after Invoked-ActionUp).
                entry.action_released = false;
                if let Some(action) = target_action_code(&entry.target) {
                    self.input
                        .send_virtual_input(&[InputEvent::key_down(action, INJECTED_FLAG)]);
                }
            } else if !entry.action_released {
                // Invoked -> Invoked-ActionUp: the target action goes up
                // but synthesized modifiers persist while they still
                // match, keeping repeat-capable gestures alive.
                entry.action_released = true;
                if let Some(action) = target_action_code(&entry.target) {
                    self.input
                        .send_virtual_input(&[InputEvent::key_up(action, INJECTED_FLAG)]);
                }
            }
            return Some(EventDecision::Suppress);
        }

        // A modifier belonging to the combination.
        if down {
            // Physical auto-repeat. Modifiers the engine released at
            // invocation must stay logically up.
            let suppressed = entry
                .suppressed_mods
                .iter()
                .any(|&code| same_family(code, event.vk));
            return Some(if suppressed {
                EventDecision::Suppress
            } else {
                EventDecision::Continue
            });
        }

        // Modifier release ends the gesture.
        let decision = self.teardown(source, entry, Some(event.vk));
        Some(decision)
    }

    /// Ends a gesture: releases whatever the engine still holds down,
    /// re-presses physically-held source modifiers the engine had
    /// released, and resets the per-mapping state to `Idle`.
    fn teardown(
        &self,
        _source: &Shortcut,
        entry: &mut RemapShortcut,
        released_vk: Option<u32>,
    ) -> EventDecision {
        let mut events = Vec::new();

        if !entry.action_released {
            if let Some(action) = target_action_code(&entry.target) {
                events.push(InputEvent::key_up(action, INJECTED_FLAG));
            }
        }
        for &code in entry.synthesized_mods.iter().rev() {
            events.push(InputEvent::key_up(code, INJECTED_FLAG));
        }

        // Modifiers released at invocation but still physically held must
        // return; a dummy pair follows a returning Win press so the OS
        // never interprets the transition as its own gesture.
        let released_family = released_vk.and_then(keys::modifier_of).map(|(f, _)| f);
        for &code in &entry.suppressed_mods {
            let family = keys::modifier_of(code).map(|(f, _)| f);
            if family.is_some() && family == released_family {
                continue;
            }
            events.push(InputEvent::key_down(code, INJECTED_FLAG));
            if family == Some(ModifierFamily::Win) {
                push_dummy_pair(&mut events);
            }
        }

        let was_suppressed = released_vk
            .map(|vk| entry.suppressed_mods.iter().any(|&c| same_family(c, vk)))
            .unwrap_or(false);

        entry.reset_invocation();

        if !events.is_empty() {
            self.input.send_virtual_input(&events);
        }
        tracing::debug!("Shortcut gesture ended");

        if was_suppressed {
            // The OS already believes this modifier is up; forwarding the
            // physical release would be a bare transition.
            EventDecision::Suppress
        } else {
            EventDecision::Continue
        }
    }

    // -----------------------------------------------------------------
    // Synthesis helpers
    // -----------------------------------------------------------------

    /// Presses target modifiers absent from the physical state, in
    /// canonical order. Returns the families satisfied by physically-held
    /// source modifiers (never re-sent, never released).
    fn press_target_modifiers(
        &self,
        target: &Shortcut,
        source: &Shortcut,
        events: &mut Vec<InputEvent>,
        entry: &mut RemapShortcut,
    ) -> Vec<ModifierFamily> {
        let mut common = Vec::new();
        for family in ModifierFamily::CANONICAL_ORDER {
            let target_side = target.modifier(family);
            if !target_side.is_set() {
                continue;
            }
            let satisfied = source.modifier(family).is_set()
                && match target_side {
                    ModifierKey::Both => true,
                    ModifierKey::Left => self.input.get_virtual_key_state(family.left_vk()),
                    ModifierKey::Right => self.input.get_virtual_key_state(family.right_vk()),
                    ModifierKey::Disabled => false,
                };
            if satisfied {
                common.push(family);
            } else {
                let code = resolve_modifier_code(family, target_side);
                events.push(InputEvent::key_down(code, INJECTED_FLAG));
                entry.synthesized_mods.push(code);
            }
        }
        common
    }

    /// Releases source modifiers that are not shared with the target, in
    /// reverse canonical order, with a dummy pair immediately before each
    /// bare Win release.
    fn release_source_modifiers(
        &self,
        source: &Shortcut,
        common: &[ModifierFamily],
        events: &mut Vec<InputEvent>,
        entry: &mut RemapShortcut,
    ) {
        for family in ModifierFamily::CANONICAL_ORDER.iter().rev() {
            if !source.modifier(*family).is_set() || common.contains(family) {
                continue;
            }
            let downs = self.down_codes_of_family(*family);
            if downs.is_empty() {
                continue;
            }
            if *family == ModifierFamily::Win {
                push_dummy_pair(events);
            }
            for code in downs {
                events.push(InputEvent::key_up(code, INJECTED_FLAG));
                entry.suppressed_mods.push(code);
            }
        }
    }

    /// Concrete codes of one family currently reading pressed.
    fn down_codes_of_family(&self, family: ModifierFamily) -> Vec<u32> {
        let mut codes = vec![family.left_vk(), family.right_vk()];
        if let Some(generic) = family.generic_vk() {
            codes.push(generic);
        }
        codes
            .into_iter()
            .filter(|&vk| self.input.get_virtual_key_state(vk))
            .collect()
    }

    /// Concrete keys making up a matched combination, for the
    /// activated-app release tracking.
    fn combination_codes(&self, source: &Shortcut) -> Vec<u32> {
        let mut codes = Vec::new();
        for family in ModifierFamily::CANONICAL_ORDER {
            if source.modifier(family).is_set() {
                codes.extend(self.down_codes_of_family(family));
            }
        }
        codes.extend(source.action_key);
        codes.extend(source.second_key);
        codes
    }

    /// The OS applies a toggle before the hook observes the event, so a
    /// suppressed toggle key is replayed as a swallowed pair to restore
    /// the indicator.
    fn replay_toggle(&self, vk: u32) {
        self.input.send_virtual_input(&[
            InputEvent::key_up(vk, SUPPRESS_FLAG),
            InputEvent::key_down(vk, SUPPRESS_FLAG),
        ]);
    }

    /// Resets the activated-app marker once every key of the matched
    /// combination has been released. `releasing_vk` is the key whose
    /// release is being processed (the input state still shows it down
    /// until the hook returns).
    fn maybe_reset_activated_app(&self, releasing_vk: u32) {
        let Some(combination) = self.tables.activated_combination() else {
            return;
        };
        let app = self.tables.activated_app();
        let any_invoked = self
            .tables
            .with_app_scope_mut(&app, |scope| {
                scope.iter().any(|(_, e)| e.is_invoked || e.chord_started)
            })
            .unwrap_or(false);
        if any_invoked {
            return;
        }
        let all_released = combination
            .iter()
            .all(|&vk| vk == releasing_vk || !self.input.get_virtual_key_state(vk));
        if all_released {
            self.tables.reset_activated_app();
            tracing::debug!("Activated app cleared");
        }
    }
}

/// Resolves sentinel target codes to concrete ones. No generic Win code
/// exists at the OS level; a logical "Both" defaults to the left key.
fn resolve_target_key(vk: u32) -> u32 {
    if vk == keys::VK_WIN_BOTH {
        keys::VK_LWIN
    } else {
        vk
    }
}

fn resolve_modifier_code(family: ModifierFamily, side: ModifierKey) -> u32 {
    match side {
        ModifierKey::Left => family.left_vk(),
        ModifierKey::Right => family.right_vk(),
        ModifierKey::Both | ModifierKey::Disabled => match family.generic_vk() {
            Some(generic) => generic,
            None => keys::VK_LWIN,
        },
    }
}

fn same_family(a: u32, b: u32) -> bool {
    match (keys::modifier_of(a), keys::modifier_of(b)) {
        (Some((fa, _)), Some((fb, _))) => fa == fb,
        _ => false,
    }
}

fn target_action_code(target: &RemapTarget) -> Option<u32> {
    match target {
        RemapTarget::Key(vk) if *vk != keys::VK_DISABLED => Some(resolve_target_key(*vk)),
        RemapTarget::Shortcut(s) if s.operation == Operation::Remap => s.action_key,
        _ => None,
    }
}

fn push_dummy_pair(events: &mut Vec<InputEvent>) {
    events.push(InputEvent::key_down(keys::DUMMY_KEY, SUPPRESS_FLAG));
    events.push(InputEvent::key_up(keys::DUMMY_KEY, SUPPRESS_FLAG));
}

/// Modifier downs in canonical order plus the action, for key-to-shortcut
/// remaps (no physical modifiers are involved on the source side).
fn single_key_shortcut_down(target: &Shortcut) -> Vec<InputEvent> {
    let mut events = Vec::new();
    for family in ModifierFamily::CANONICAL_ORDER {
        let side = target.modifier(family);
        if side.is_set() {
            events.push(InputEvent::key_down(
                resolve_modifier_code(family, side),
                INJECTED_FLAG,
            ));
        }
    }
    if let Some(action) = target.action_key {
        events.push(InputEvent::key_down(action, INJECTED_FLAG));
    }
    events
}

/// Action up then modifier ups in reverse canonical order.
fn single_key_shortcut_up(target: &Shortcut) -> Vec<InputEvent> {
    let mut events = Vec::new();
    if let Some(action) = target.action_key {
        events.push(InputEvent::key_up(action, INJECTED_FLAG));
    }
    for family in ModifierFamily::CANONICAL_ORDER.iter().rev() {
        let side = target.modifier(*family);
        if side.is_set() {
            events.push(InputEvent::key_up(
                resolve_modifier_code(*family, side),
                INJECTED_FLAG,
            ));
        }
    }
    events
}

/// One down/up pair per UTF-16 unit.
fn unicode_events(text: &str) -> Vec<InputEvent> {
    let mut events = Vec::new();
    for unit in text.encode_utf16() {
        events.push(InputEvent::Unicode {
            unit,
            down: true,
            extra_info: INJECTED_FLAG,
        });
        events.push(InputEvent::Unicode {
            unit,
            down: false,
            extra_info: INJECTED_FLAG,
        });
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{KeyTransition, MockedInput};
    use crate::keys::*;

    const VK_A: u32 = 0x41;
    const VK_B: u32 = 0x42;
    const VK_V: u32 = 0x56;

    fn harness() -> (Arc<MockedInput>, Arc<Dispatcher>) {
        let input = Arc::new(MockedInput::new());
        let tables = Arc::new(RemapTables::new());
        let dispatcher = Arc::new(Dispatcher::new(tables, input.clone()));
        let hook_target = dispatcher.clone();
        input.set_hook(Arc::new(move |event| hook_target.handle_key_event(event)));
        (input, dispatcher)
    }

    #[test]
    fn test_injected_events_never_reprocessed() {
        let (input, dispatcher) = harness();
        dispatcher
            .tables()
            .add_single_key_remap(VK_A, RemapTarget::Key(VK_B));

        // Injected traffic passes, swallow-tagged traffic is swallowed,
        // neither hits the tables.
        input.send_virtual_input(&[InputEvent::key_down(VK_A, INJECTED_FLAG)]);
        assert!(input.get_virtual_key_state(VK_A));
        assert!(!input.get_virtual_key_state(VK_B));

        input.send_virtual_input(&[InputEvent::key_down(DUMMY_KEY, SUPPRESS_FLAG)]);
        assert!(!input.get_virtual_key_state(DUMMY_KEY));
    }

    #[test]
    fn test_single_key_remap_owns_full_cycle() {
        let (input, dispatcher) = harness();
        dispatcher
            .tables()
            .add_single_key_remap(VK_A, RemapTarget::Key(VK_B));

        assert_eq!(
            input.send_key_event(KeyTransition::KeyDown, VK_A),
            EventDecision::Suppress
        );
        assert!(!input.get_virtual_key_state(VK_A));
        assert!(input.get_virtual_key_state(VK_B));

        assert_eq!(
            input.send_key_event(KeyTransition::KeyUp, VK_A),
            EventDecision::Suppress
        );
        assert!(!input.get_virtual_key_state(VK_B));
    }

    #[test]
    fn test_single_key_disable_emits_nothing() {
        let (input, dispatcher) = harness();
        dispatcher
            .tables()
            .add_single_key_remap(VK_A, RemapTarget::Key(VK_DISABLED));

        input.send_key_event(KeyTransition::KeyDown, VK_A);
        input.send_key_event(KeyTransition::KeyUp, VK_A);
        assert!(input.sent_events().is_empty());
        assert!(!input.get_virtual_key_state(VK_A));
    }

    #[test]
    fn test_suppressed_toggle_key_is_replayed() {
        let (input, dispatcher) = harness();
        dispatcher
            .tables()
            .add_single_key_remap(VK_NUMLOCK, RemapTarget::Key(VK_DISABLED));

        input.send_key_event(KeyTransition::KeyDown, VK_NUMLOCK);
        let sent = input.sent_events();
        assert_eq!(
            sent,
            vec![
                InputEvent::key_up(VK_NUMLOCK, SUPPRESS_FLAG),
                InputEvent::key_down(VK_NUMLOCK, SUPPRESS_FLAG),
            ]
        );
        // The replayed pair is swallowed; applications never observe it.
        assert!(!input.get_virtual_key_state(VK_NUMLOCK));
    }

    #[test]
    fn test_key_to_shortcut_remap() {
        let (input, dispatcher) = harness();
        let target = Shortcut::from_keys(&[VK_CONTROL, VK_V]);
        dispatcher
            .tables()
            .add_single_key_remap(VK_A, RemapTarget::Shortcut(target));

        input.send_key_event(KeyTransition::KeyDown, VK_A);
        assert!(input.get_virtual_key_state(VK_CONTROL));
        assert!(input.get_virtual_key_state(VK_V));

        input.send_key_event(KeyTransition::KeyUp, VK_A);
        assert!(!input.get_virtual_key_state(VK_CONTROL));
        assert!(!input.get_virtual_key_state(VK_V));
    }

    #[test]
    fn test_key_to_text_remap_sends_unicode_on_down_only() {
        let (input, dispatcher) = harness();
        dispatcher
            .tables()
            .add_single_key_remap(VK_A, RemapTarget::Text("hi".into()));

        input.send_key_event(KeyTransition::KeyDown, VK_A);
        input.send_key_event(KeyTransition::KeyUp, VK_A);
        let units: Vec<(u16, bool)> = input
            .sent_events()
            .iter()
            .filter_map(|e| match e {
                InputEvent::Unicode { unit, down, .. } => Some((*unit, *down)),
                _ => None,
            })
            .collect();
        assert_eq!(
            units,
            vec![(104, true), (104, false), (105, true), (105, false)]
        );
    }

    #[test]
    fn test_dispatch_survives_internal_panic() {
        let (input, dispatcher) = harness();
        dispatcher.set_invocation_handler(Box::new(|_| panic!("handler bug")));
        let mut target = Shortcut::from_keys(&[VK_CONTROL, VK_B]);
        target.operation = Operation::RunProgram;
        target.program_path = "x".into();
        dispatcher.tables().add_global_shortcut(
            Shortcut::from_keys(&[VK_LCONTROL, VK_A]),
            RemapTarget::Shortcut(target),
        );

        input.send_key_event(KeyTransition::KeyDown, VK_LCONTROL);
        // The handler panics during invocation; the event degrades to
        // pass-through instead of unwinding out of the hook.
        let decision = input.send_key_event(KeyTransition::KeyDown, VK_A);
        assert_eq!(decision, EventDecision::Continue);
    }
}
