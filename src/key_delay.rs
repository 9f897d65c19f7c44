//! Per-key short-press / long-press timing
//!
//! Each registered key gets its own [`KeyDelay`]: a small state machine
//! (`Released` → `OnHold` → `OnHoldTimeout`) fed timestamped transitions
//! from the hook thread and drained by one dedicated worker thread. The
//! worker blocks on its queue with a bounded wait while a key is held so
//! it can detect long-press expiry even when no new events arrive.
//! Exactly one terminal callback pair fires per press/release cycle,
//! never both the short- and long-press outcomes.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

/// Hold duration that promotes a press to a long press.
pub const DEFAULT_LONG_PRESS_MS: u32 = 900;

/// Bounded wait while `OnHold`, so elapsed time is re-evaluated absent
/// new events.
const ON_HOLD_WAIT_MS: u64 = 50;

/// Caller contract violations. Local, non-recoverable for the call, and
/// without effect on the rest of the engine.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyDelayError {
    #[error("key {0:#x} is already registered for delayed handling")]
    AlreadyRegistered(u32),

    #[error("key {0:#x} was never registered for delayed handling")]
    NotRegistered(u32),
}

/// Callback invoked with the registered key code.
pub type DelayCallback = Box<dyn Fn(u32) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelayState {
    Released,
    OnHold,
    OnHoldTimeout,
}

enum DelayMessage {
    Transition { down: bool, time_ms: u32 },
    Quit,
}

/// Current monotonic tick in the same 32-bit millisecond domain the hook
/// stamps events with.
pub fn now_ms() -> u32 {
    #[cfg(target_os = "windows")]
    {
        unsafe { windows::Win32::System::SystemInformation::GetTickCount() }
    }
    #[cfg(not(target_os = "windows"))]
    {
        use std::sync::OnceLock;
        use std::time::Instant;
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        let epoch = EPOCH.get_or_init(Instant::now);
        epoch.elapsed().as_millis() as u32
    }
}

/// Whether `span` milliseconds have passed between two 32-bit tick
/// counts. Both operands are biased by half the range before the
/// subtraction so the comparison tolerates tick wraparound.
fn have_millis_passed(start_ms: u32, now_ms: u32, span_ms: u32) -> bool {
    let half = u32::MAX / 2;
    let start = start_ms.wrapping_add(half);
    let now = now_ms.wrapping_add(half);
    now.wrapping_sub(start) >= span_ms
}

/// Long-press detector for one key.
pub struct KeyDelay {
    key: u32,
    tx: Sender<DelayMessage>,
    worker: Option<JoinHandle<()>>,
}

impl KeyDelay {
    /// Spawns the worker thread with the default 900 ms threshold.
    pub fn new(
        key: u32,
        on_short_press: DelayCallback,
        on_long_press_detected: DelayCallback,
        on_long_press_released: DelayCallback,
    ) -> Self {
        Self::with_threshold(
            key,
            DEFAULT_LONG_PRESS_MS,
            on_short_press,
            on_long_press_detected,
            on_long_press_released,
        )
    }

    /// Spawns the worker thread with an explicit long-press threshold.
    pub fn with_threshold(
        key: u32,
        long_press_ms: u32,
        on_short_press: DelayCallback,
        on_long_press_detected: DelayCallback,
        on_long_press_released: DelayCallback,
    ) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = thread::Builder::new()
            .name(format!("key-delay-{key:#x}"))
            .spawn(move || {
                delay_worker(
                    key,
                    long_press_ms,
                    rx,
                    on_short_press,
                    on_long_press_detected,
                    on_long_press_released,
                );
            })
            .expect("failed to spawn key delay worker");
        Self {
            key,
            tx,
            worker: Some(worker),
        }
    }

    pub fn key(&self) -> u32 {
        self.key
    }

    /// Queues one hook transition for this key. `time_ms` is the
    /// hook-supplied tick count.
    pub fn key_event(&self, down: bool, time_ms: u32) {
        let _ = self.tx.send(DelayMessage::Transition { down, time_ms });
    }
}

impl Drop for KeyDelay {
    fn drop(&mut self) {
        let _ = self.tx.send(DelayMessage::Quit);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn delay_worker(
    key: u32,
    long_press_ms: u32,
    rx: Receiver<DelayMessage>,
    on_short_press: DelayCallback,
    on_long_press_detected: DelayCallback,
    on_long_press_released: DelayCallback,
) {
    let mut state = DelayState::Released;
    let mut hold_start_ms: u32 = 0;

    loop {
        let message = if state == DelayState::OnHold {
            match rx.recv_timeout(Duration::from_millis(ON_HOLD_WAIT_MS)) {
                Ok(message) => Some(message),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        } else {
            match rx.recv() {
                Ok(message) => Some(message),
                Err(_) => return,
            }
        };

        match message {
            Some(DelayMessage::Quit) => return,
            Some(DelayMessage::Transition { down, time_ms }) => match (state, down) {
                (DelayState::Released, true) => {
                    state = DelayState::OnHold;
                    hold_start_ms = time_ms;
                }
                (DelayState::OnHold, true) | (DelayState::OnHoldTimeout, true) => {
                    // Auto-repeat while held; the timer keeps running from
                    // the original press.
                    if state == DelayState::OnHold
                        && have_millis_passed(hold_start_ms, time_ms, long_press_ms)
                    {
                        state = DelayState::OnHoldTimeout;
                        on_long_press_detected(key);
                    }
                }
                (DelayState::OnHold, false) => {
                    state = DelayState::Released;
                    if have_millis_passed(hold_start_ms, time_ms, long_press_ms) {
                        // The release itself crossed the threshold.
                        on_long_press_detected(key);
                        on_long_press_released(key);
                    } else {
                        on_short_press(key);
                    }
                }
                (DelayState::OnHoldTimeout, false) => {
                    state = DelayState::Released;
                    on_long_press_released(key);
                }
                (DelayState::Released, false) => {
                    // Spurious release; nothing was held.
                }
            },
            None => {
                // Bounded wait expired while OnHold: re-evaluate elapsed
                // time without a new event.
                if state == DelayState::OnHold
                    && have_millis_passed(hold_start_ms, now_ms(), long_press_ms)
                {
                    state = DelayState::OnHoldTimeout;
                    on_long_press_detected(key);
                }
            }
        }
    }
}

/// Owns one [`KeyDelay`] per registered key.
#[derive(Default)]
pub struct KeyDelayRegistry {
    delays: Mutex<HashMap<u32, KeyDelay>>,
}

impl KeyDelayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers delayed handling for `key`. Double registration is a
    /// caller contract violation.
    pub fn register(&self, delay: KeyDelay) -> Result<(), KeyDelayError> {
        let mut delays = self.delays.lock();
        let key = delay.key();
        if delays.contains_key(&key) {
            return Err(KeyDelayError::AlreadyRegistered(key));
        }
        delays.insert(key, delay);
        Ok(())
    }

    /// Unregisters `key`, joining its worker.
    pub fn unregister(&self, key: u32) -> Result<(), KeyDelayError> {
        self.delays
            .lock()
            .remove(&key)
            .map(|_| ())
            .ok_or(KeyDelayError::NotRegistered(key))
    }

    pub fn is_registered(&self, key: u32) -> bool {
        self.delays.lock().contains_key(&key)
    }

    /// Forwards a hook transition if the key is registered. Returns
    /// whether it was.
    pub fn key_event(&self, key: u32, down: bool, time_ms: u32) -> bool {
        let delays = self.delays.lock();
        match delays.get(&key) {
            Some(delay) => {
                delay.key_event(down, time_ms);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    const VK_RETURN: u32 = 0x0D;

    struct Counters {
        short: AtomicU32,
        long_detected: AtomicU32,
        long_released: AtomicU32,
    }

    fn counted_delay(threshold_ms: u32) -> (KeyDelay, Arc<Counters>) {
        let counters = Arc::new(Counters {
            short: AtomicU32::new(0),
            long_detected: AtomicU32::new(0),
            long_released: AtomicU32::new(0),
        });
        let (c1, c2, c3) = (counters.clone(), counters.clone(), counters.clone());
        let delay = KeyDelay::with_threshold(
            VK_RETURN,
            threshold_ms,
            Box::new(move |_| {
                c1.short.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(move |_| {
                c2.long_detected.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(move |_| {
                c3.long_released.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (delay, counters)
    }

    fn settle() {
        thread::sleep(Duration::from_millis(120));
    }

    #[test]
    fn test_short_press_fires_short_only() {
        let (delay, counters) = counted_delay(200);
        let start = now_ms();
        delay.key_event(true, start);
        delay.key_event(false, start.wrapping_add(50));
        settle();
        assert_eq!(counters.short.load(Ordering::SeqCst), 1);
        assert_eq!(counters.long_detected.load(Ordering::SeqCst), 0);
        assert_eq!(counters.long_released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_long_press_fires_detected_once_then_released() {
        let (delay, counters) = counted_delay(150);
        delay.key_event(true, now_ms());
        thread::sleep(Duration::from_millis(400));
        // Detected exactly once despite several bounded-wait wakeups.
        assert_eq!(counters.long_detected.load(Ordering::SeqCst), 1);
        assert_eq!(counters.long_released.load(Ordering::SeqCst), 0);

        delay.key_event(false, now_ms());
        settle();
        assert_eq!(counters.short.load(Ordering::SeqCst), 0);
        assert_eq!(counters.long_detected.load(Ordering::SeqCst), 1);
        assert_eq!(counters.long_released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeats_do_not_restart_hold_timer() {
        let (delay, counters) = counted_delay(150);
        let start = now_ms();
        delay.key_event(true, start);
        for i in 1..6 {
            delay.key_event(true, start.wrapping_add(i * 40));
        }
        thread::sleep(Duration::from_millis(350));
        assert_eq!(counters.long_detected.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wraparound_tolerant_elapsed() {
        assert!(have_millis_passed(u32::MAX - 100, 900, 900));
        assert!(!have_millis_passed(u32::MAX - 100, 700, 900));
        assert!(have_millis_passed(0, 900, 900));
        assert!(!have_millis_passed(0, 899, 900));
    }

    #[test]
    fn test_registry_contract_violations() {
        let registry = KeyDelayRegistry::new();
        let (delay, _) = counted_delay(200);
        registry.register(delay).unwrap();

        let (dup, _) = counted_delay(200);
        assert_eq!(
            registry.register(dup),
            Err(KeyDelayError::AlreadyRegistered(VK_RETURN))
        );

        assert!(registry.is_registered(VK_RETURN));
        registry.unregister(VK_RETURN).unwrap();
        assert_eq!(
            registry.unregister(VK_RETURN),
            Err(KeyDelayError::NotRegistered(VK_RETURN))
        );
        assert!(!registry.key_event(VK_RETURN, true, now_ms()));
    }
}
