//! Memory admission control. The gate does not cap any single compile; it
//! keeps the sum of outstanding job estimates within the cgroup's memory
//! budget so concurrent compiles cannot oversubscribe the shared limit.

use std::{path::PathBuf, sync::Mutex, time::Duration};

use tokio::time;

use crate::cgroup::{self, CgroupError};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct MemoryGate {
    cgroup_root: PathBuf,
    state: Mutex<GateState>,
}

#[derive(Debug, Default)]
struct GateState {
    /// Total budget in bytes; `Some(0)` encodes unlimited.
    budget: Option<u64>,
    /// Sum of outstanding job estimates in bytes.
    reserved: u64,
}

impl MemoryGate {
    pub fn new(cgroup_root: impl Into<PathBuf>) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
            state: Mutex::new(GateState::default()),
        }
    }

    /// Populate the budget from `memory.max` on first use.
    pub fn ensure_budget(&self) -> Result<(), CgroupError> {
        {
            let state = self.state.lock().unwrap();
            if state.budget.is_some() {
                return Ok(());
            }
        }
        let max = cgroup::read_memory_max(&self.cgroup_root)?;
        let mut state = self.state.lock().unwrap();
        state.budget.get_or_insert(max);
        Ok(())
    }

    /// Wait until `current + reserved + estimate` fits the budget, then
    /// reserve. With an unlimited budget the reservation is taken
    /// immediately so that release stays symmetric. Cancellation is by
    /// dropping the future (client disconnect) or by wrapping in a timeout;
    /// nothing is reserved until this returns.
    pub async fn acquire(&self, estimate: u64) -> Reservation<'_> {
        loop {
            {
                let mut state = self.state.lock().unwrap();
                // Budget 0 (or an acquire without prior init) skips the
                // capacity check.
                if state.budget.unwrap_or(0) == 0 {
                    state.reserved += estimate;
                    return Reservation {
                        gate: self,
                        estimate,
                    };
                }
            }

            // The probe runs outside the lock; a failed read falls into the
            // same wait-and-retry branch as insufficient capacity.
            if let Ok(current) = cgroup::read_memory_current(&self.cgroup_root) {
                let mut state = self.state.lock().unwrap();
                let budget = state.budget.unwrap_or(0);
                if current + state.reserved + estimate <= budget {
                    state.reserved += estimate;
                    return Reservation {
                        gate: self,
                        estimate,
                    };
                }
            }

            time::sleep(POLL_INTERVAL).await;
        }
    }

    fn release(&self, estimate: u64) {
        let mut state = self.state.lock().unwrap();
        state.reserved = state.reserved.saturating_sub(estimate);
    }

    pub fn reserved(&self) -> u64 {
        self.state.lock().unwrap().reserved
    }
}

/// An admitted reservation. Dropping it returns the estimate to the gate,
/// which ties release to every control-flow exit of the request.
pub struct Reservation<'a> {
    gate: &'a MemoryGate,
    estimate: u64,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.gate.release(self.estimate);
    }
}
