use crate::status::{Status, StatusTracker};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, waitpid};
use nix::unistd::Pid;
use std::io::{self, Write};
use tracing::{debug, info, warn};

/// A live background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: Pid,
}

/// Background jobs that have been spawned and not yet observed to terminate.
///
/// Owned by the read-evaluate loop; there is no other mutator. Pids are
/// unique while they are in the table.
#[derive(Debug, Default)]
pub struct ProcessTable {
    records: Vec<ProcessRecord>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `pid`. The caller guarantees it was just spawned.
    pub fn add(&mut self, pid: Pid) {
        debug_assert!(self.find(pid).is_none(), "pid {pid} tracked twice");
        self.records.push(ProcessRecord { pid });
    }

    /// Removes `pid` if it is tracked.
    pub fn remove(&mut self, pid: Pid) -> Option<ProcessRecord> {
        let idx = self.records.iter().position(|r| r.pid == pid)?;
        Some(self.records.remove(idx))
    }

    pub fn find(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.records.iter().find(|r| r.pid == pid)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.records.iter()
    }

    /// One non-blocking wait for any child.
    ///
    /// When a child has terminated its status becomes the shell's last
    /// status, a completion notice is written to `out` and the pid leaves the
    /// table. Returns the reaped pid, if any.
    pub fn reap_one(
        &mut self,
        status: &mut StatusTracker,
        out: &mut dyn Write,
    ) -> io::Result<Option<Pid>> {
        let wait_status = match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(wait_status) => wait_status,
            Err(Errno::ECHILD) => return Ok(None),
            Err(err) => {
                warn!(%err, "waitpid failed");
                return Ok(None);
            }
        };
        let (Some(pid), Some(reaped)) = (wait_status.pid(), Status::from_wait(wait_status))
        else {
            return Ok(None);
        };

        status.set(reaped);
        if self.remove(pid).is_none() {
            debug!(%pid, "reaped a child that was not tracked");
        }
        info!(%pid, status = %reaped, "background job finished");
        writeln!(out, "background pid {pid} is done: {reaped}")?;
        out.flush()?;
        Ok(Some(pid))
    }

    /// Sends every tracked job SIGTERM, falling back to SIGKILL.
    ///
    /// Records stay in the table; this is only used right before the shell exits.
    pub fn kill_all(&self) {
        for record in &self.records {
            terminate(record.pid);
        }
    }
}

fn terminate(pid: Pid) {
    match kill(pid, Signal::SIGTERM) {
        Ok(()) => debug!(%pid, "sent SIGTERM"),
        Err(err) => {
            debug!(%pid, %err, "SIGTERM failed, trying SIGKILL");
            if let Err(err) = kill(pid, Signal::SIGKILL) {
                warn!(%pid, %err, "failed to kill background job");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::wait::WaitStatus;
    use serial_test::serial;
    use std::process::Command;
    use std::thread;
    use std::time::{Duration, Instant};

    fn spawn(program: &str, args: &[&str]) -> Pid {
        let child = Command::new(program).args(args).spawn().unwrap();
        Pid::from_raw(child.id() as i32)
    }

    fn reap_within(
        table: &mut ProcessTable,
        status: &mut StatusTracker,
        out: &mut Vec<u8>,
        limit: Duration,
    ) -> Option<Pid> {
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            if let Some(pid) = table.reap_one(status, out).unwrap() {
                return Some(pid);
            }
            thread::sleep(Duration::from_millis(20));
        }
        None
    }

    #[test]
    fn test_add_find_remove() {
        let mut table = ProcessTable::new();
        let a = Pid::from_raw(100);
        let b = Pid::from_raw(200);
        table.add(a);
        table.add(b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.find(a), Some(&ProcessRecord { pid: a }));

        assert_eq!(table.remove(a), Some(ProcessRecord { pid: a }));
        assert!(table.find(a).is_none());
        assert_eq!(table.remove(a), None);
        assert_eq!(table.iter().map(|r| r.pid).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    #[serial]
    fn test_reap_one_removes_finished_job() {
        let mut table = ProcessTable::new();
        let mut status = StatusTracker::default();
        status.set(Status::Exited(3));
        let pid = spawn("sleep", &["0.1"]);
        table.add(pid);

        let mut out = Vec::new();
        let reaped = reap_within(&mut table, &mut status, &mut out, Duration::from_secs(5));
        assert_eq!(reaped, Some(pid));
        assert!(table.is_empty());
        assert_eq!(status.get(), Status::Exited(0));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("background pid {pid} is done: exit value 0\n")
        );
    }

    #[test]
    #[serial]
    fn test_reap_one_reports_signal_death() {
        let mut table = ProcessTable::new();
        let mut status = StatusTracker::default();
        let pid = spawn("sleep", &["30"]);
        table.add(pid);
        kill(pid, Signal::SIGKILL).unwrap();

        let mut out = Vec::new();
        let reaped = reap_within(&mut table, &mut status, &mut out, Duration::from_secs(5));
        assert_eq!(reaped, Some(pid));
        assert_eq!(status.render(), "terminated by signal 9");
    }

    #[test]
    #[serial]
    fn test_reap_one_without_children_is_noop() {
        let mut table = ProcessTable::new();
        let mut status = StatusTracker::default();
        let mut out = Vec::new();
        assert_eq!(table.reap_one(&mut status, &mut out).unwrap(), None);
        assert!(out.is_empty());
        assert_eq!(status.get(), Status::Exited(0));
    }

    #[test]
    #[serial]
    fn test_kill_all_terminates_every_job() {
        let mut table = ProcessTable::new();
        let pids: Vec<Pid> = (0..3).map(|_| spawn("sleep", &["30"])).collect();
        for pid in &pids {
            table.add(*pid);
        }

        table.kill_all();
        assert_eq!(table.len(), 3);
        for pid in pids {
            assert_eq!(
                waitpid(pid, None).unwrap(),
                WaitStatus::Signaled(pid, Signal::SIGTERM, false)
            );
        }
    }

    #[test]
    fn test_kill_all_on_empty_table() {
        let table = ProcessTable::new();
        table.kill_all();
        table.kill_all();
        assert!(table.is_empty());
    }
}
