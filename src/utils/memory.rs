//! Memory sampling for the run's memory budget.

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::utils::config::RunConsts;

/// Source of memory readings. `None` means the reading is unavailable; the
/// coordinator then treats the budget as never exceeded.
pub trait MemorySampler {
    /// Bytes currently used by this process.
    fn used_bytes(&mut self) -> Option<u64>;
    /// Upper bound the budget is derived from when none is configured.
    fn heap_limit_bytes(&mut self) -> Option<u64>;
}

/// Default budget: a fixed share of the heap limit.
pub fn default_budget(heap_limit: u64) -> u64 {
    (heap_limit as f64 * RunConsts::MEMORY_BUDGET_FRACTION) as u64
}

/// Reads the process resident set size and total system memory via sysinfo.
pub struct SystemMemorySampler {
    system: System,
    pid: Option<Pid>,
}

impl SystemMemorySampler {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| log::debug!("current pid unavailable: {}", e))
            .ok();
        Self {
            system: System::new(),
            pid,
        }
    }
}

impl Default for SystemMemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler for SystemMemorySampler {
    fn used_bytes(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system.process(pid).map(|p| p.memory())
    }

    fn heap_limit_bytes(&mut self) -> Option<u64> {
        self.system.refresh_memory();
        match self.system.total_memory() {
            0 => None,
            total => Some(total),
        }
    }
}

/// Sampler with no readings: the budget is never exceeded.
pub struct NoMemorySampler;

impl MemorySampler for NoMemorySampler {
    fn used_bytes(&mut self) -> Option<u64> {
        None
    }

    fn heap_limit_bytes(&mut self) -> Option<u64> {
        None
    }
}
