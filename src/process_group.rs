//! Process-group isolation and graceful→forceful termination.
//!
//! On POSIX, the child is started in a new process group so a single
//! signal reaches it and everything it spawns; `GracefulKill` operates on
//! the group, never the lone leader pid. Windows gets a best-effort
//! fallback; anything else gets a logged no-op, matching the three-way
//! `cfg` split the pack's own process guard uses.

use std::time::Duration;

use tokio::process::Command;

/// Configures `cmd` to start its own process group on platforms that
/// support it. A no-op everywhere else.
pub fn isolate(cmd: &mut Command) {
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    {
        let _ = cmd;
    }
}

/// Sends the termination signal to the process group led by `pid`.
/// Returns `Ok(())` if the signal was delivered or the group was already
/// gone (`ESRCH`); any other error is reported but not escalated.
#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) -> Result<(), nix::errno::Errno> {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn group_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    // A null signal probes liveness without actually signalling anything.
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Terminates the process group led by `pid`: sends a graceful signal,
/// polls on a 50 ms ticker up to `grace_period` for the leader to exit,
/// then escalates to a forceful signal.
///
/// This function does **not** wait on the child's exit status — a
/// dedicated waiter task owns that responsibility. Calling both `wait` and
/// this function's signal-then-poll loop on the same child from two
/// places is the double-wait hazard the design notes call out; this
/// function only ever signals and probes liveness, never reaps.
pub async fn graceful_kill(pid: u32, grace_period: Duration) {
    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;

        if signal_group(pid, Signal::SIGTERM).is_err() {
            tracing::debug!(pid, "SIGTERM to process group failed");
        }

        let mut ticker = tokio::time::interval(Duration::from_millis(50));
        let deadline = tokio::time::Instant::now() + grace_period;
        loop {
            ticker.tick().await;
            if tokio::time::Instant::now() >= deadline || !group_alive(pid) {
                break;
            }
        }

        if group_alive(pid) {
            if signal_group(pid, Signal::SIGKILL).is_err() {
                tracing::debug!(pid, "SIGKILL to process group failed");
            }
        }
    }

    #[cfg(windows)]
    {
        let _ = tokio::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .output()
            .await;
        let _ = grace_period;
    }

    #[cfg(not(any(unix, windows)))]
    {
        tracing::warn!(pid, "process-group termination not supported on this platform");
        let _ = grace_period;
    }
}

#[cfg(test)]
#[path = "tests/process_group_tests.rs"]
mod tests;
