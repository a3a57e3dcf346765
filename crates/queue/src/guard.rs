//! Mutual exclusion around the two GPU-bound operations.
//!
//! The load gate and the generate gate are independent. The worker loop
//! blocks on them; administrative paths use the `try_` variants and get
//! [`QueueError::Busy`] instead of waiting.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Gate, QueueError};

/// Shared handle to the load and generate gates.
#[derive(Debug, Default)]
pub struct ResourceGuard {
    load: Arc<Mutex<()>>,
    generate: Arc<Mutex<()>>,
}

/// Holding one gate. Dropping it releases the gate.
#[derive(Debug)]
pub struct GatePermit {
    gate: Gate,
    _held: OwnedMutexGuard<()>,
}

impl GatePermit {
    pub fn gate(&self) -> Gate {
        self.gate
    }

    /// Release explicitly; equivalent to dropping.
    pub fn release(self) {}
}

/// Holding both gates, as needed to swap the loaded model.
#[derive(Debug)]
pub struct ExclusivePermit {
    _generate: GatePermit,
    _load: GatePermit,
}

impl ResourceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn gate(&self, gate: Gate) -> &Arc<Mutex<()>> {
        match gate {
            Gate::Load => &self.load,
            Gate::Generate => &self.generate,
        }
    }

    /// Take `gate` if free, failing immediately with `Busy` otherwise.
    pub fn try_acquire(&self, gate: Gate) -> Result<GatePermit, QueueError> {
        let held = Arc::clone(self.gate(gate))
            .try_lock_owned()
            .map_err(|_| QueueError::Busy(gate))?;
        Ok(GatePermit { gate, _held: held })
    }

    /// Wait until `gate` is free and take it.
    pub async fn acquire(&self, gate: Gate) -> GatePermit {
        let held = Arc::clone(self.gate(gate)).lock_owned().await;
        GatePermit { gate, _held: held }
    }

    pub fn try_acquire_load(&self) -> Result<GatePermit, QueueError> {
        self.try_acquire(Gate::Load)
    }

    pub fn try_acquire_generate(&self) -> Result<GatePermit, QueueError> {
        self.try_acquire(Gate::Generate)
    }

    /// Take both gates without waiting. If either is held nothing is kept.
    pub fn try_acquire_exclusive(&self) -> Result<ExclusivePermit, QueueError> {
        let generate = self.try_acquire_generate()?;
        let load = self.try_acquire_load()?;
        Ok(ExclusivePermit {
            _generate: generate,
            _load: load,
        })
    }

    pub fn is_loading(&self) -> bool {
        self.load.try_lock().is_err()
    }

    pub fn is_generating(&self) -> bool {
        self.generate.try_lock().is_err()
    }
}
