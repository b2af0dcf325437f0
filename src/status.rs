use crate::command::ExitCode;
use nix::sys::wait::WaitStatus;
use std::fmt;
use std::process::ExitStatus;

/// How the most recent process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Exited(ExitCode),
    Signaled(i32),
}

impl Status {
    /// Converts a terminal wait status. Stopped, continued and still-alive
    /// states are not terminations and yield `None`.
    pub fn from_wait(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(Status::Exited(code)),
            WaitStatus::Signaled(_, signal, _) => Some(Status::Signaled(signal as i32)),
            _ => None,
        }
    }

    pub fn is_signaled(&self) -> bool {
        matches!(self, Status::Signaled(_))
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Exited(0)
    }
}

impl From<ExitStatus> for Status {
    fn from(status: ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        match (status.code(), status.signal()) {
            (Some(code), _) => Status::Exited(code),
            (None, Some(signal)) => Status::Signaled(signal),
            // Neither an exit code nor a signal: treat as a plain failure.
            (None, None) => Status::Exited(1),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Exited(code) => write!(f, "exit value {code}"),
            Status::Signaled(signal) => write!(f, "terminated by signal {signal}"),
        }
    }
}

/// Outcome of the last process that reported, read by the `status` built-in.
#[derive(Debug, Default)]
pub struct StatusTracker {
    last: Status,
}

impl StatusTracker {
    pub fn set(&mut self, status: Status) {
        self.last = status;
    }

    pub fn get(&self) -> Status {
        self.last
    }

    pub fn render(&self) -> String {
        self.last.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;
    use nix::unistd::Pid;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn test_initial_status_is_exit_zero() {
        assert_eq!(StatusTracker::default().render(), "exit value 0");
    }

    #[test]
    fn test_render_last_set_wins() {
        let mut tracker = StatusTracker::default();
        tracker.set(Status::Exited(7));
        assert_eq!(tracker.render(), "exit value 7");
        tracker.set(Status::Signaled(15));
        assert_eq!(tracker.render(), "terminated by signal 15");
        assert!(tracker.get().is_signaled());
    }

    #[test]
    fn test_from_exit_status() {
        // Raw wait statuses: exit code in the high byte, signal in the low bits.
        assert_eq!(Status::from(ExitStatus::from_raw(3 << 8)), Status::Exited(3));
        assert_eq!(Status::from(ExitStatus::from_raw(9)), Status::Signaled(9));
    }

    #[test]
    fn test_from_wait_ignores_non_terminal_states() {
        let pid = Pid::from_raw(42);
        assert_eq!(
            Status::from_wait(WaitStatus::Exited(pid, 2)),
            Some(Status::Exited(2))
        );
        assert_eq!(
            Status::from_wait(WaitStatus::Signaled(pid, Signal::SIGTERM, false)),
            Some(Status::Signaled(15))
        );
        assert_eq!(
            Status::from_wait(WaitStatus::Stopped(pid, Signal::SIGTSTP)),
            None
        );
        assert_eq!(Status::from_wait(WaitStatus::StillAlive), None);
    }
}
