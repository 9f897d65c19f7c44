//! Input boundary between the engine and the OS
//!
//! The dispatcher never talks to the hook API directly. It consumes
//! [`KeyEvent`]s handed to it by whoever owns the hook registration and
//! produces decisions plus synthetic [`InputEvent`]s through the
//! [`InputSimulator`] trait. Production wires in the platform backend;
//! tests wire in [`MockedInput`], which loops injected events back through
//! the registered hook exactly like real injected input re-enters a
//! system-wide hook.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Tag carried by synthetic events that must reach applications (remap
/// output). The dispatcher passes them through without reprocessing; this
/// is the sole mechanism preventing the engine from remapping its own
/// output, since injected events re-enter the same system-wide hook.
pub const INJECTED_FLAG: u64 = 0x1;

/// Tag for synthetic events that exist only for their below-hook side
/// effects (dummy-key pairs, toggle-state replay). The dispatcher swallows
/// them unconditionally so no application ever observes them.
pub const SUPPRESS_FLAG: u64 = 0x2;

/// True when an event was produced by this engine (either tag).
pub fn is_engine_injected(extra_info: u64) -> bool {
    extra_info & (INJECTED_FLAG | SUPPRESS_FLAG) != 0
}

/// True when an event carries the engine's swallow tag.
pub fn is_suppress_tagged(extra_info: u64) -> bool {
    extra_info & SUPPRESS_FLAG != 0
}

/// Hook message variants for one physical key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    KeyDown,
    KeyUp,
    SysKeyDown,
    SysKeyUp,
}

impl KeyTransition {
    pub fn is_down(self) -> bool {
        matches!(self, KeyTransition::KeyDown | KeyTransition::SysKeyDown)
    }

    pub fn is_up(self) -> bool {
        !self.is_down()
    }
}

/// One hook event: a physical (or injected) key transition.
#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    pub transition: KeyTransition,
    pub vk: u32,
    /// Opaque extra-info tag; nonzero only for injected events.
    pub extra_info: u64,
    /// Hook-supplied millisecond tick count (32-bit, wraps).
    pub time_ms: u32,
}

impl KeyEvent {
    pub fn new(transition: KeyTransition, vk: u32, extra_info: u64, time_ms: u32) -> Self {
        Self {
            transition,
            vk,
            extra_info,
            time_ms,
        }
    }
}

/// What the hook should do with the physical event it just reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDecision {
    /// Pass the event through to the rest of the system unmodified.
    Continue,
    /// Swallow the event; no other software observes it.
    Suppress,
}

/// One synthetic input event to inject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A virtual-key transition.
    Key { vk: u32, down: bool, extra_info: u64 },
    /// One UTF-16 unit of text input (key-to-text remaps).
    Unicode {
        unit: u16,
        down: bool,
        extra_info: u64,
    },
}

impl InputEvent {
    pub fn key_down(vk: u32, extra_info: u64) -> Self {
        InputEvent::Key {
            vk,
            down: true,
            extra_info,
        }
    }

    pub fn key_up(vk: u32, extra_info: u64) -> Self {
        InputEvent::Key {
            vk,
            down: false,
            extra_info,
        }
    }
}

/// Abstraction over the three OS facilities the engine needs. Everything
/// the dispatcher does goes through this trait, so the whole engine runs
/// unmodified against the in-memory fake.
pub trait InputSimulator: Send + Sync {
    /// Inject a batch of synthetic input events, in order, as one unit.
    fn send_virtual_input(&self, events: &[InputEvent]);

    /// Whether the given virtual key currently reads as pressed.
    fn get_virtual_key_state(&self, vk: u32) -> bool;

    /// Lowercased executable name of the foreground process.
    fn foreground_process(&self) -> String;
}

/// Hook callback type: the dispatch entry point, as seen by the input
/// source feeding it.
pub type HookHandler = Arc<dyn Fn(&KeyEvent) -> EventDecision + Send + Sync>;

/// Deterministic in-memory [`InputSimulator`].
///
/// Keeps a key-state table covering the full code space (sentinels
/// included) and a log of every injected event.
/// Injected events are looped back through the registered hook before the
/// state table is updated, and a suppressed event leaves no trace in the
/// state table — the same contract the OS provides for real injected
/// input. Tests drive physical traffic through [`MockedInput::send_key_event`].
pub struct MockedInput {
    state: Mutex<[bool; 257]>,
    foreground: Mutex<String>,
    sent: Mutex<Vec<InputEvent>>,
    hook: RwLock<Option<HookHandler>>,
    clock_ms: Mutex<u32>,
}

impl Default for MockedInput {
    fn default() -> Self {
        Self {
            state: Mutex::new([false; 257]),
            foreground: Mutex::new(String::new()),
            sent: Mutex::new(Vec::new()),
            hook: RwLock::new(None),
            clock_ms: Mutex::new(0),
        }
    }
}

impl MockedInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the dispatch entry point all traffic is routed through.
    pub fn set_hook(&self, hook: HookHandler) {
        *self.hook.write() = Some(hook);
    }

    pub fn set_foreground_process(&self, name: &str) {
        *self.foreground.lock() = name.to_string();
    }

    /// Advance the mock tick clock; subsequent events carry the new time.
    pub fn advance_clock(&self, ms: u32) {
        let mut clock = self.clock_ms.lock();
        *clock = clock.wrapping_add(ms);
    }

    /// Simulate one physical key transition arriving at the hook. Returns
    /// the dispatcher's decision; the state table is updated only when the
    /// event is passed through.
    pub fn send_key_event(&self, transition: KeyTransition, vk: u32) -> EventDecision {
        let event = KeyEvent::new(transition, vk, 0, *self.clock_ms.lock());
        self.route(&event)
    }

    /// Every event injected so far, in order.
    pub fn sent_events(&self) -> Vec<InputEvent> {
        self.sent.lock().clone()
    }

    pub fn clear_sent_events(&self) {
        self.sent.lock().clear();
    }

    /// Number of injected dummy-key press/release pairs.
    pub fn dummy_key_pairs(&self) -> usize {
        let sent = self.sent.lock();
        sent.iter()
            .filter(|e| matches!(e, InputEvent::Key { vk, down: true, .. } if *vk == crate::keys::DUMMY_KEY))
            .count()
    }

    fn route(&self, event: &KeyEvent) -> EventDecision {
        let hook = self.hook.read().clone();
        let decision = match hook {
            Some(hook) => hook(event),
            None => EventDecision::Continue,
        };
        if decision == EventDecision::Continue && (event.vk as usize) < 257 {
            self.state.lock()[event.vk as usize] = event.transition.is_down();
        }
        decision
    }
}

impl InputSimulator for MockedInput {
    fn send_virtual_input(&self, events: &[InputEvent]) {
        for event in events {
            self.sent.lock().push(event.clone());
            if let InputEvent::Key {
                vk,
                down,
                extra_info,
            } = *event
            {
                let transition = if down {
                    KeyTransition::KeyDown
                } else {
                    KeyTransition::KeyUp
                };
                let key_event = KeyEvent::new(transition, vk, extra_info, *self.clock_ms.lock());
                self.route(&key_event);
            }
            // Unicode units never touch the key-state table.
        }
    }

    fn get_virtual_key_state(&self, vk: u32) -> bool {
        (vk as usize) < 257 && self.state.lock()[vk as usize]
    }

    fn foreground_process(&self) -> String {
        self.foreground.lock().to_lowercase()
    }
}
