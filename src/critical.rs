//! Scoped interrupt masking.
//!
//! [`masked`] runs a closure with the sample interrupt held off and restores
//! the previous state on every exit path, including unwinding.

/// Run `f` with interrupts masked on the current core.
#[cfg(target_os = "espidf")]
#[inline]
pub fn masked<R>(f: impl FnOnce() -> R) -> R {
    esp_idf_svc::hal::interrupt::free(f)
}

/// Run `f` directly. The host has no sample interrupt: the only contender is
/// another thread and the ring's atomics already order those accesses.
#[cfg(not(target_os = "espidf"))]
#[inline]
pub fn masked<R>(f: impl FnOnce() -> R) -> R {
    f()
}
