//! Currently-detected-keys snapshot
//!
//! External editor UIs need to render the combination a user is holding
//! while recording a new remap. The engine owns none of that rendering:
//! while detection is active the dispatcher suppresses every physical
//! event and feeds it here, and this module maintains the shortcut being
//! held, notifies an observer on every change, and forwards transitions
//! to a [`KeyDelayRegistry`] so the editor can bind hold-to-confirm keys.

use crate::key_delay::KeyDelayRegistry;
use crate::shortcut::Shortcut;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Snapshot of the keys currently held during detection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetectedKeysSnapshot {
    /// Virtual-key codes in press order.
    pub keys: Vec<u32>,
    /// Whether the held combination is a valid shortcut source.
    pub is_valid: bool,
}

/// Observer invoked on every change to the detected combination.
pub type DetectObserver = Box<dyn Fn(&DetectedKeysSnapshot) + Send + Sync>;

/// Tracks the combination held while a "detect shortcut" editor is open.
#[derive(Default)]
pub struct KeyDetector {
    active: AtomicBool,
    current: Mutex<(Shortcut, Vec<u32>)>,
    observer: RwLock<Option<DetectObserver>>,
    key_delays: KeyDelayRegistry,
}

impl KeyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts detection; the dispatcher suppresses and routes every
    /// physical event here until [`KeyDetector::stop`].
    pub fn start(&self) {
        self.reset();
        self.active.store(true, Ordering::SeqCst);
        tracing::debug!("Key detection started");
    }

    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.reset();
        tracing::debug!("Key detection stopped");
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn set_observer(&self, observer: DetectObserver) {
        *self.observer.write() = Some(observer);
    }

    /// Hold-to-confirm registrations for the editor (e.g. holding Enter).
    pub fn key_delays(&self) -> &KeyDelayRegistry {
        &self.key_delays
    }

    /// The shortcut currently being held.
    pub fn detected_shortcut(&self) -> Shortcut {
        self.current.lock().0.clone()
    }

    pub fn snapshot(&self) -> DetectedKeysSnapshot {
        let current = self.current.lock();
        DetectedKeysSnapshot {
            keys: current.1.clone(),
            is_valid: current.0.is_valid(),
        }
    }

    /// Feeds one suppressed physical transition into the detector.
    pub fn handle_key(&self, vk: u32, down: bool, time_ms: u32) {
        self.key_delays.key_event(vk, down, time_ms);

        let changed = {
            let mut current = self.current.lock();
            if down {
                let changed = current.0.set_key(vk);
                if changed {
                    current.1.push(vk);
                }
                changed
            } else {
                let changed = current.0.clear_key(vk);
                if changed {
                    current.1.retain(|&k| k != vk);
                }
                changed
            }
        };

        if changed {
            self.notify();
        }
    }

    fn reset(&self) {
        *self.current.lock() = (Shortcut::new(), Vec::new());
        self.notify();
    }

    fn notify(&self) {
        if let Some(observer) = self.observer.read().as_ref() {
            observer(&self.snapshot());
        }
    }
}
