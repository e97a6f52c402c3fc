//! Real-time process setup.
//!
//! Applied once in the control thread before the first tick:
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`
//! 2. `sched_setaffinity` to the configured core
//! 3. `sched_setscheduler(SCHED_FIFO, prio)`
//!
//! Every step is optional and driven by `[hardware]`.

use manip_common::hal::config::HardwareConfig;
use manip_common::hal::error::HalError;
use tracing::info;

/// True if the calling thread runs under SCHED_FIFO or SCHED_RR.
pub fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: pid 0 queries the calling thread; no memory is passed.
        let policy = unsafe { sched_getscheduler(0) };
        policy == SCHED_FIFO || policy == SCHED_RR
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

/// Lock all current and future pages.
pub fn lock_memory() -> Result<(), HalError> {
    use nix::sys::mman::{MlockAllFlags, mlockall};
    mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE)
        .map_err(|e| HalError::ConfigurationError(format!("mlockall failed: {e}")))
}

/// Pin the calling thread to `cpu`.
pub fn pin_to_cpu(cpu: usize) -> Result<(), HalError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| HalError::ConfigurationError(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| HalError::ConfigurationError(format!("sched_setaffinity failed: {e}")))
}

/// Switch the calling thread to SCHED_FIFO at `priority`.
pub fn set_fifo_priority(priority: i32) -> Result<(), HalError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 targets the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(HalError::ConfigurationError(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

/// Apply every RT setting requested in `config`.
pub fn apply(config: &HardwareConfig) -> Result<(), HalError> {
    if config.lock_memory {
        lock_memory()?;
        info!("Process memory locked");
    }
    if let Some(cpu) = config.cpu_affinity {
        pin_to_cpu(cpu)?;
        info!("Control thread pinned to CPU {}", cpu);
    }
    if let Some(priority) = config.rt_priority {
        set_fifo_priority(priority)?;
        info!("Control thread at SCHED_FIFO priority {}", priority);
    }
    info!("RT mode: {}", if detect_rt_mode() { "enabled" } else { "disabled" });
    Ok(())
}
