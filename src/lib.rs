//! Rebind — system-wide keyboard remapping engine
//!
//! Rewrites keyboard input before applications see it: single keys to
//! other keys, shortcuts, or text; key combinations to other
//! combinations, globally or only while a given application is in the
//! foreground. The engine sits behind a suppressing keyboard hook: for
//! every physical event it decides to pass it through or to swallow it
//! and synthesize replacement input.
//!
//! The OS boundary is the [`input::InputSimulator`] trait. Production
//! runs on the Windows backend in [`platform`]; everything above it is
//! platform-neutral and testable against [`input::MockedInput`], which
//! loops injected events back through the hook the way the real OS
//! does.

pub mod config;
pub mod detect;
pub mod dispatcher;
pub mod input;
pub mod key_delay;
pub mod keys;
pub mod logging;
pub mod platform;
pub mod shortcut;
pub mod tables;

pub use dispatcher::Dispatcher;
pub use input::{EventDecision, InputSimulator, KeyEvent, KeyTransition, MockedInput};
pub use shortcut::{ModifierKey, Operation, Shortcut};
pub use tables::{RemapTables, RemapTarget};
