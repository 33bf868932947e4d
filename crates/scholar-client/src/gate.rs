//! Single-flight gate for mutating operations.
//!
//! A call that finds the gate held is dropped, not queued. The guard releases
//! the gate on drop, so a failing operation cannot leave it locked.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct OperationGate {
    busy: AtomicBool,
}

#[must_use = "the gate is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a OperationGate,
}

impl OperationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<GateGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| GateGuard { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_refused_while_held() {
        let gate = OperationGate::new();
        let guard = gate.try_acquire();
        assert!(guard.is_some());
        assert!(gate.is_busy());
        assert!(gate.try_acquire().is_none());

        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }

    async fn guarded(gate: &OperationGate, fail: bool) -> Option<Result<u32, &'static str>> {
        let _guard = gate.try_acquire()?;
        tokio::task::yield_now().await;
        Some(if fail { Err("boom") } else { Ok(1) })
    }

    #[tokio::test]
    async fn test_released_after_failure() {
        let gate = OperationGate::new();
        assert_eq!(guarded(&gate, true).await, Some(Err("boom")));
        assert!(!gate.is_busy());
        assert_eq!(guarded(&gate, false).await, Some(Ok(1)));
    }

    #[tokio::test]
    async fn test_concurrent_call_is_dropped() {
        let gate = OperationGate::new();
        let (first, second) = tokio::join!(guarded(&gate, false), guarded(&gate, false));
        assert_eq!(first, Some(Ok(1)));
        assert_eq!(second, None);
        assert!(!gate.is_busy());
    }

    #[tokio::test]
    async fn test_released_when_cancelled() {
        let gate = OperationGate::new();
        let pending = async {
            let _guard = gate.try_acquire();
            std::future::pending::<()>().await;
        };
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert!(!gate.is_busy());
    }
}
