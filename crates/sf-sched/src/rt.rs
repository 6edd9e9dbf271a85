//! Real-time setup for the calling thread.
//!
//! With the `rt` feature the sequence is:
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)` - no page faults inside the loop.
//! 2. `sched_setaffinity` - pin to one CPU core.
//! 3. `sched_setscheduler(SCHED_FIFO, priority)`.
//!
//! Without the feature every step is a no-op, so simulation and tests run
//! unprivileged.

use crate::error::SchedResult;

#[cfg(feature = "rt")]
use crate::error::SchedError;

#[cfg(feature = "rt")]
fn rt_mlockall() -> SchedResult<()> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE).map_err(|e| {
        SchedError::RtSetup {
            what: format!("mlockall failed: {e}"),
        }
    })
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> SchedResult<()> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> SchedResult<()> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset.set(cpu).map_err(|e| SchedError::RtSetup {
        what: format!("CpuSet::set({cpu}) failed: {e}"),
    })?;
    sched_setaffinity(Pid::from_raw(0), &cpuset).map_err(|e| SchedError::RtSetup {
        what: format!("sched_setaffinity failed: {e}"),
    })
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> SchedResult<()> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> SchedResult<()> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` is a valid sched_param for the duration of the call; pid 0 is this thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(SchedError::RtSetup {
            what: format!("sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"),
        });
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> SchedResult<()> {
    Ok(())
}

/// Prepare the calling thread for hard real-time execution.
///
/// Intended to be called from a periodic thread's init callback, before the
/// first arming.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> SchedResult<()> {
    rt_mlockall()?;
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    tracing::debug!(cpu_core, rt_priority, rt = cfg!(feature = "rt"), "rt setup complete");
    Ok(())
}
