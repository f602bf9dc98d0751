//! System-level plumbing for the lifecycle supervisor: signal delivery,
//! cpu count, process identity.

mod signals;

pub use signals::UnixSignalSource;

/// Number of logical CPUs, used by the scheduler to size its bounded
/// worker pool (`cpu_count * concurrency_multiplier`).
/// Exposed here purely for callers (e.g. the daemon's startup log line)
/// that want the same figure the scheduler computes internally via
/// `std::thread::available_parallelism()`.
pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// The current process id, used in startup/shutdown log lines.
#[cfg(unix)]
pub fn process_id() -> i32 {
    nix::unistd::getpid().as_raw()
}

#[cfg(not(unix))]
pub fn process_id() -> i32 {
    std::process::id() as i32
}
