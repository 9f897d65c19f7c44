//! End-to-end remapping scenarios over the in-memory input backend.
//!
//! The mock loops every injected event back through the hook the way
//! the real OS does, so these tests observe exactly what applications
//! below the hook would: the key-state table after each physical
//! transition.

use std::sync::Arc;

use rebind::input::{InputEvent, KeyTransition, MockedInput};
use rebind::keys::*;
use rebind::tables::NO_ACTIVATED_APP;
use rebind::{Dispatcher, EventDecision, InputSimulator, RemapTables, RemapTarget, Shortcut};

const VK_A: u32 = 0x41;
const VK_B: u32 = 0x42;
const VK_V: u32 = 0x56;
const VK_TAB: u32 = 0x09;

fn harness() -> (Arc<MockedInput>, Arc<Dispatcher>) {
    let input = Arc::new(MockedInput::new());
    let tables = Arc::new(RemapTables::new());
    let dispatcher = Arc::new(Dispatcher::new(tables, input.clone()));
    let hook_target = dispatcher.clone();
    input.set_hook(Arc::new(move |event| hook_target.handle_key_event(event)));
    (input, dispatcher)
}

#[test]
fn test_shortcut_to_shortcut_full_cycle() {
    let (input, dispatcher) = harness();
    dispatcher.tables().add_global_shortcut(
        Shortcut::from_keys(&[VK_CONTROL, VK_A]),
        RemapTarget::Shortcut(Shortcut::from_keys(&[VK_MENU, VK_V])),
    );

    assert_eq!(
        input.send_key_event(KeyTransition::KeyDown, VK_LCONTROL),
        EventDecision::Continue
    );
    assert!(input.get_virtual_key_state(VK_LCONTROL));

    // Invocation: Ctrl is released synthetically, Alt+V pressed, the
    // physical A never reaches applications.
    assert_eq!(
        input.send_key_event(KeyTransition::KeyDown, VK_A),
        EventDecision::Suppress
    );
    assert!(!input.get_virtual_key_state(VK_LCONTROL));
    assert!(!input.get_virtual_key_state(VK_A));
    assert!(input.get_virtual_key_state(VK_MENU));
    assert!(input.get_virtual_key_state(VK_V));

    // Action release: the target action goes up, the synthesized
    // modifier persists for repeat-capable gestures.
    assert_eq!(
        input.send_key_event(KeyTransition::KeyUp, VK_A),
        EventDecision::Suppress
    );
    assert!(!input.get_virtual_key_state(VK_V));
    assert!(input.get_virtual_key_state(VK_MENU));

    // Re-press while invoked re-sends the target action.
    input.send_key_event(KeyTransition::KeyDown, VK_A);
    assert!(input.get_virtual_key_state(VK_V));
    input.send_key_event(KeyTransition::KeyUp, VK_A);

    // Modifier release ends the gesture and is itself suppressed: the
    // OS already believes Ctrl is up.
    assert_eq!(
        input.send_key_event(KeyTransition::KeyUp, VK_LCONTROL),
        EventDecision::Suppress
    );
    assert!(!input.get_virtual_key_state(VK_MENU));
    for vk in [VK_LCONTROL, VK_CONTROL, VK_A, VK_V] {
        assert!(!input.get_virtual_key_state(vk), "vk {vk:#x} still down");
    }
}

#[test]
fn test_win_source_release_is_guarded_by_dummy_pair() {
    let (input, dispatcher) = harness();
    dispatcher.tables().add_global_shortcut(
        Shortcut::from_keys(&[VK_WIN_BOTH, VK_A]),
        RemapTarget::Shortcut(Shortcut::from_keys(&[VK_CONTROL, VK_V])),
    );

    input.send_key_event(KeyTransition::KeyDown, VK_LWIN);
    input.send_key_event(KeyTransition::KeyDown, VK_A);

    assert!(!input.get_virtual_key_state(VK_LWIN));
    assert!(input.get_virtual_key_state(VK_CONTROL));
    assert!(input.get_virtual_key_state(VK_V));
    assert_eq!(input.dummy_key_pairs(), 1);

    // The pair sits immediately before the bare Win release so the OS
    // never sees the transition as a Start-menu tap.
    let sent = input.sent_events();
    let dummy_down = sent
        .iter()
        .position(|e| matches!(e, InputEvent::Key { vk, down: true, .. } if *vk == DUMMY_KEY))
        .unwrap();
    let win_up = sent
        .iter()
        .position(|e| matches!(e, InputEvent::Key { vk, down: false, .. } if *vk == VK_LWIN))
        .unwrap();
    assert!(dummy_down < win_up);

    input.send_key_event(KeyTransition::KeyUp, VK_A);
    assert_eq!(
        input.send_key_event(KeyTransition::KeyUp, VK_LWIN),
        EventDecision::Suppress
    );
    // Win stays logically up through the whole teardown; no second pair.
    assert_eq!(input.dummy_key_pairs(), 1);
    assert!(!input.get_virtual_key_state(VK_CONTROL));
    assert!(!input.get_virtual_key_state(VK_V));
}

#[test]
fn test_exact_disable_lets_superset_through() {
    let (input, dispatcher) = harness();
    dispatcher.tables().add_global_shortcut(
        Shortcut::from_keys(&[VK_CONTROL, VK_A]),
        RemapTarget::Key(VK_DISABLED),
    );

    // Exact combination: swallowed with no synthesis.
    input.send_key_event(KeyTransition::KeyDown, VK_LCONTROL);
    assert_eq!(
        input.send_key_event(KeyTransition::KeyDown, VK_A),
        EventDecision::Suppress
    );
    assert!(input.sent_events().is_empty());
    assert_eq!(
        input.send_key_event(KeyTransition::KeyUp, VK_A),
        EventDecision::Suppress
    );
    assert_eq!(
        input.send_key_event(KeyTransition::KeyUp, VK_LCONTROL),
        EventDecision::Continue
    );

    // Superset: Ctrl+Shift+A is a different combination and passes.
    input.send_key_event(KeyTransition::KeyDown, VK_LCONTROL);
    input.send_key_event(KeyTransition::KeyDown, VK_LSHIFT);
    assert_eq!(
        input.send_key_event(KeyTransition::KeyDown, VK_A),
        EventDecision::Continue
    );
    assert!(input.get_virtual_key_state(VK_A));
}

#[test]
fn test_app_specific_remap_gated_on_foreground() {
    let (input, dispatcher) = harness();
    dispatcher.tables().add_app_specific_shortcut(
        "app1.exe",
        Shortcut::from_keys(&[VK_CONTROL, VK_A]),
        RemapTarget::Shortcut(Shortcut::from_keys(&[VK_MENU, VK_V])),
    );

    input.set_foreground_process("other.exe");
    input.send_key_event(KeyTransition::KeyDown, VK_LCONTROL);
    assert_eq!(
        input.send_key_event(KeyTransition::KeyDown, VK_A),
        EventDecision::Continue
    );
    input.send_key_event(KeyTransition::KeyUp, VK_A);
    input.send_key_event(KeyTransition::KeyUp, VK_LCONTROL);

    input.set_foreground_process("App1.exe");
    assert_eq!(dispatcher.tables().activated_app(), NO_ACTIVATED_APP);
    input.send_key_event(KeyTransition::KeyDown, VK_LCONTROL);
    assert_eq!(
        input.send_key_event(KeyTransition::KeyDown, VK_A),
        EventDecision::Suppress
    );
    assert!(input.get_virtual_key_state(VK_MENU));

    // The marker holds for exactly the lifetime of the gesture: through
    // the action release, until the last combination key goes up.
    assert_eq!(dispatcher.tables().activated_app(), "app1.exe");
    input.send_key_event(KeyTransition::KeyUp, VK_A);
    assert_eq!(dispatcher.tables().activated_app(), "app1.exe");
    input.send_key_event(KeyTransition::KeyUp, VK_LCONTROL);
    assert_eq!(dispatcher.tables().activated_app(), NO_ACTIVATED_APP);
}

#[test]
fn test_invoked_app_shortcut_survives_focus_change() {
    let (input, dispatcher) = harness();
    dispatcher.tables().add_app_specific_shortcut(
        "app1.exe",
        Shortcut::from_keys(&[VK_CONTROL, VK_A]),
        RemapTarget::Shortcut(Shortcut::from_keys(&[VK_MENU, VK_V])),
    );

    input.set_foreground_process("app1.exe");
    input.send_key_event(KeyTransition::KeyDown, VK_LCONTROL);
    input.send_key_event(KeyTransition::KeyDown, VK_A);
    assert!(input.get_virtual_key_state(VK_V));

    // Focus moves mid-gesture; the releases still belong to the invoked
    // mapping and are torn down cleanly rather than passed through.
    input.set_foreground_process("other.exe");
    assert_eq!(
        input.send_key_event(KeyTransition::KeyUp, VK_A),
        EventDecision::Suppress
    );
    assert_eq!(
        input.send_key_event(KeyTransition::KeyUp, VK_LCONTROL),
        EventDecision::Suppress
    );
    assert!(!input.get_virtual_key_state(VK_MENU));

    // The gesture fully ended, so a fresh Ctrl+A in the other app is
    // no longer owned by app1's table.
    input.send_key_event(KeyTransition::KeyDown, VK_LCONTROL);
    assert_eq!(
        input.send_key_event(KeyTransition::KeyDown, VK_A),
        EventDecision::Continue
    );
}

#[test]
fn test_chorded_shortcut_two_phase_invocation() {
    let (input, dispatcher) = harness();
    dispatcher.tables().add_global_shortcut(
        Shortcut::from_keys(&[VK_CONTROL, VK_A, VK_B]),
        RemapTarget::Key(VK_V),
    );

    input.send_key_event(KeyTransition::KeyDown, VK_LCONTROL);
    // Initial combination: suppressed, nothing synthesized yet.
    assert_eq!(
        input.send_key_event(KeyTransition::KeyDown, VK_A),
        EventDecision::Suppress
    );
    assert!(!input.get_virtual_key_state(VK_V));

    // Second key completes the chord.
    assert_eq!(
        input.send_key_event(KeyTransition::KeyDown, VK_B),
        EventDecision::Suppress
    );
    assert!(input.get_virtual_key_state(VK_V));
    assert!(!input.get_virtual_key_state(VK_LCONTROL));

    input.send_key_event(KeyTransition::KeyUp, VK_B);
    assert!(!input.get_virtual_key_state(VK_V));
    input.send_key_event(KeyTransition::KeyUp, VK_A);
    assert_eq!(
        input.send_key_event(KeyTransition::KeyUp, VK_LCONTROL),
        EventDecision::Suppress
    );
}

#[test]
fn test_chord_survives_modifier_auto_repeat() {
    let (input, dispatcher) = harness();
    dispatcher.tables().add_global_shortcut(
        Shortcut::from_keys(&[VK_CONTROL, VK_A, VK_B]),
        RemapTarget::Key(VK_V),
    );

    input.send_key_event(KeyTransition::KeyDown, VK_LCONTROL);
    input.send_key_event(KeyTransition::KeyDown, VK_A);
    // Typematic repeat of the held modifier while the second key is
    // awaited: the physically-down key stays visible and the chord
    // stays pending.
    assert_eq!(
        input.send_key_event(KeyTransition::KeyDown, VK_LCONTROL),
        EventDecision::Continue
    );
    assert_eq!(
        input.send_key_event(KeyTransition::KeyDown, VK_B),
        EventDecision::Suppress
    );
    assert!(input.get_virtual_key_state(VK_V));

    input.send_key_event(KeyTransition::KeyUp, VK_B);
    input.send_key_event(KeyTransition::KeyUp, VK_A);
    input.send_key_event(KeyTransition::KeyUp, VK_LCONTROL);
    assert!(!input.get_virtual_key_state(VK_V));
}

#[test]
fn test_abandoned_chord_passes_later_keys_through() {
    let (input, dispatcher) = harness();
    dispatcher.tables().add_global_shortcut(
        Shortcut::from_keys(&[VK_CONTROL, VK_A, VK_B]),
        RemapTarget::Key(VK_V),
    );

    input.send_key_event(KeyTransition::KeyDown, VK_LCONTROL);
    input.send_key_event(KeyTransition::KeyDown, VK_A);
    // A key that is not the awaited second key abandons the chord and
    // continues through classification.
    assert_eq!(
        input.send_key_event(KeyTransition::KeyDown, VK_TAB),
        EventDecision::Continue
    );
    assert!(input.get_virtual_key_state(VK_TAB));
    assert!(!input.get_virtual_key_state(VK_V));

    // The chord no longer completes.
    input.send_key_event(KeyTransition::KeyUp, VK_TAB);
    assert_eq!(
        input.send_key_event(KeyTransition::KeyDown, VK_B),
        EventDecision::Continue
    );
}

#[test]
fn test_most_specific_candidate_wins() {
    let (input, dispatcher) = harness();
    dispatcher.tables().add_global_shortcut(
        Shortcut::from_keys(&[VK_CONTROL, VK_A]),
        RemapTarget::Key(VK_B),
    );
    dispatcher.tables().add_global_shortcut(
        Shortcut::from_keys(&[VK_CONTROL, VK_SHIFT, VK_A]),
        RemapTarget::Key(VK_V),
    );

    input.send_key_event(KeyTransition::KeyDown, VK_LCONTROL);
    input.send_key_event(KeyTransition::KeyDown, VK_LSHIFT);
    input.send_key_event(KeyTransition::KeyDown, VK_A);
    assert!(input.get_virtual_key_state(VK_V));
    assert!(!input.get_virtual_key_state(VK_B));
}

#[test]
fn test_detection_mode_swallows_and_records() {
    let (input, dispatcher) = harness();
    dispatcher.tables().add_global_shortcut(
        Shortcut::from_keys(&[VK_CONTROL, VK_A]),
        RemapTarget::Key(VK_B),
    );

    dispatcher.detector().start();
    input.send_key_event(KeyTransition::KeyDown, VK_LCONTROL);
    // While recording, even mapped combinations are swallowed whole.
    assert_eq!(
        input.send_key_event(KeyTransition::KeyDown, VK_A),
        EventDecision::Suppress
    );
    assert!(!input.get_virtual_key_state(VK_B));

    let snapshot = dispatcher.detector().snapshot();
    assert_eq!(snapshot.keys, vec![VK_LCONTROL, VK_A]);
    assert!(snapshot.is_valid);

    dispatcher.detector().stop();
    input.send_key_event(KeyTransition::KeyUp, VK_A);
    input.send_key_event(KeyTransition::KeyUp, VK_LCONTROL);
}
