//! Cross-thread handles for steering a running simulation.
//!
//! A UI or input thread holds clones of these handles and writes to them at
//! any time; the run loop reads them only at iteration boundaries. Each value
//! is a single atomic word, so no locking is needed.

use crate::core::stepper::Drive;
use crate::error::Result;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Edge-triggered stop request. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the run loop stop after the current iteration.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct Shared {
    field: AtomicU64,
    scattering_time: AtomicU64,
    reset: AtomicBool,
    revision: AtomicU64,
}

/// Live parameter feed: the electric field and the scattering time, plus a reset button.
///
/// Cloning yields another handle to the same values.
#[derive(Debug, Clone)]
pub struct ControlPanel {
    shared: Arc<Shared>,
}

impl ControlPanel {
    /// Create a panel holding a validated initial drive.
    pub fn new(initial: Drive) -> Result<Self> {
        initial.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                field: AtomicU64::new(initial.field.to_bits()),
                scattering_time: AtomicU64::new(initial.scattering_time.to_bits()),
                reset: AtomicBool::new(false),
                revision: AtomicU64::new(0),
            }),
        })
    }

    /// Set the electric field. Any finite value is accepted, including zero and negatives.
    pub fn set_field(&self, field: f64) -> Result<()> {
        Drive::new(field, self.scattering_time())?;
        self.shared.field.store(field.to_bits(), Ordering::Release);
        self.shared.revision.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Set the mean free time. Rejects non-positive values.
    pub fn set_scattering_time(&self, scattering_time: f64) -> Result<()> {
        Drive::new(self.field(), scattering_time)?;
        self.shared
            .scattering_time
            .store(scattering_time.to_bits(), Ordering::Release);
        self.shared.revision.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Current electric field.
    pub fn field(&self) -> f64 {
        f64::from_bits(self.shared.field.load(Ordering::Acquire))
    }

    /// Current mean free time.
    pub fn scattering_time(&self) -> f64 {
        f64::from_bits(self.shared.scattering_time.load(Ordering::Acquire))
    }

    /// Snapshot both values for one iteration.
    pub fn snapshot(&self) -> Drive {
        Drive {
            field: self.field(),
            scattering_time: self.scattering_time(),
        }
    }

    /// Counter bumped on every successful parameter change.
    pub fn revision(&self) -> u64 {
        self.shared.revision.load(Ordering::Acquire)
    }

    /// Ask the run loop to reset the ensemble at the next iteration boundary.
    pub fn request_reset(&self) {
        self.shared.reset.store(true, Ordering::Release);
    }

    /// Whether a reset is pending, without consuming it.
    pub fn reset_requested(&self) -> bool {
        self.shared.reset.load(Ordering::Acquire)
    }

    /// Consume a pending reset request.
    pub(crate) fn take_reset(&self) -> bool {
        self.shared.reset.swap(false, Ordering::AcqRel)
    }
}
