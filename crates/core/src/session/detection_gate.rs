use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single-flight admission for detection.
///
/// Holds the user's toggle and a busy flag. At most one [`DetectionPermit`]
/// exists at a time; frames that find the gate closed or busy are dropped,
/// never queued.
#[derive(Debug)]
pub struct DetectionGate {
    enabled: AtomicBool,
    busy: AtomicBool,
}

/// Why [`DetectionGate::try_acquire`] turned a frame away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    Disabled,
    Busy,
}

impl DetectionGate {
    pub fn new(enabled: bool) -> Arc<Self> {
        Arc::new(Self {
            enabled: AtomicBool::new(enabled),
            busy: AtomicBool::new(false),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Takes effect for the next frame; an in-flight detection is unaffected.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Checks the toggle, then claims the slot.
    pub fn try_acquire(self: &Arc<Self>) -> Result<DetectionPermit, GateRejection> {
        if !self.is_enabled() {
            return Err(GateRejection::Disabled);
        }
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| GateRejection::Busy)?;
        Ok(DetectionPermit {
            gate: Arc::clone(self),
        })
    }
}

/// Proof of owning the detection slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct DetectionPermit {
    gate: Arc<DetectionGate>,
}

impl Drop for DetectionPermit {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_busy() {
        let gate = DetectionGate::new(true);
        let permit = gate.try_acquire().unwrap();
        assert_eq!(gate.try_acquire().unwrap_err(), GateRejection::Busy);
        drop(permit);
        assert!(gate.try_acquire().is_ok());
    }

    #[test]
    fn test_disabled_gate_rejects() {
        let gate = DetectionGate::new(false);
        assert_eq!(gate.try_acquire().unwrap_err(), GateRejection::Disabled);
        assert!(!gate.is_busy());
    }

    #[test]
    fn test_disabling_keeps_outstanding_permit() {
        let gate = DetectionGate::new(true);
        let permit = gate.try_acquire().unwrap();
        gate.set_enabled(false);
        assert!(gate.is_busy());
        drop(permit);
        assert!(!gate.is_busy());
        assert_eq!(gate.try_acquire().unwrap_err(), GateRejection::Disabled);
    }

    #[test]
    fn test_permit_released_across_threads() {
        let gate = DetectionGate::new(true);
        let permit = gate.try_acquire().unwrap();
        std::thread::spawn(move || drop(permit)).join().unwrap();
        assert!(!gate.is_busy());
    }
}
