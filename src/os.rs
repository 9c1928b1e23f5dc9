//! Execution context primitives
//!
//! The node runs two contexts: the bus interrupt and the cooperative main loop.
//! Anything that must not be preempted by the bus interrupt goes through
//! `InterruptControl`.

/// Masks interrupts for the duration of a closure.
pub trait InterruptControl {
    fn free<R, F: FnOnce() -> R>(&mut self, f: F) -> R;
}
