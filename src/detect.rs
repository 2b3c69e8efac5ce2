//! Runtime CPU capability detection.
//!
//! Detection runs once per process and is cached in an atomic. Callers ask
//! `resolve_backend` which kernel family to run for a vectorisation policy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

use crate::config::Vectorisation;

static INIT: Once = Once::new();
static ATOMIC_SSE2: AtomicBool = AtomicBool::new(false);

#[cfg(target_arch = "x86_64")]
pub fn test_sse2() -> bool {
    std::is_x86_feature_detected!("sse2")
}

#[cfg(not(target_arch = "x86_64"))]
pub fn test_sse2() -> bool {
    false
}

pub fn ctor_sse2() {
    ATOMIC_SSE2.store(test_sse2(), Ordering::Relaxed);
}

/// Runs every detector. Idempotent.
pub fn initialize() {
    INIT.call_once(|| {
        ctor_sse2();
        log::debug!("capability detection: sse2={}", ATOMIC_SSE2.load(Ordering::Relaxed));
    });
}

pub fn detect_sse2() -> bool {
    initialize();
    ATOMIC_SSE2.load(Ordering::Relaxed)
}

/// The kernel family a stage runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Scalar,
    Portable,
    Sse2,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Scalar => "scalar",
            Backend::Portable => "portable",
            Backend::Sse2 => "sse2",
        }
    }
}

/// `Auto` picks SSE2 when the CPU has it and falls back to scalar silently.
pub fn resolve_backend(policy: Vectorisation) -> Backend {
    match policy {
        Vectorisation::Scalar => Backend::Scalar,
        Vectorisation::Portable => Backend::Portable,
        Vectorisation::Auto => {
            if detect_sse2() {
                Backend::Sse2
            } else {
                log::debug!("sse2 not available, using the scalar kernels");
                Backend::Scalar
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_policies_ignore_detection() {
        assert_eq!(resolve_backend(Vectorisation::Scalar), Backend::Scalar);
        assert_eq!(resolve_backend(Vectorisation::Portable), Backend::Portable);
    }

    #[test]
    fn test_auto_follows_detection() {
        let expected = if detect_sse2() {
            Backend::Sse2
        } else {
            Backend::Scalar
        };
        assert_eq!(resolve_backend(Vectorisation::Auto), expected);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_sse2_is_baseline_on_x86_64() {
        assert!(detect_sse2());
    }
}
