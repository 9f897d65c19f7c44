//! Platform-specific input backends
//!
//! The engine itself is platform-neutral behind [`crate::input::InputSimulator`];
//! this module supplies the production implementation where one exists.
//! On other platforms only the in-memory test double is available.

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "windows")]
pub use windows::WindowsInput;
