use crate::command::{Command, ExecutableCommand, ExitCode};
use crate::error::ShellError;
use crate::interpreter::ShellState;
use crate::signals::ChildSignals;
use crate::status::Status;
use nix::errno::Errno;
use nix::fcntl::{OFlag, open};
use nix::sys::stat::Mode;
use nix::libc::_exit;
use nix::unistd::{Pid, close, dup2, execvpe};
use std::ffi::{CStr, CString};
use std::io::{self, Write};
use std::os::fd::{BorrowedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, ExitStatus, Stdio};
use tracing::{debug, info, warn};

/// Exit code of a child that failed before running the program.
pub const CHILD_FAILURE: ExitCode = 1;

/// Command that is not a builtin.
pub struct ExternalCommand {
    cmd: Command,
}

impl ExternalCommand {
    pub fn new(cmd: Command) -> Self {
        Self { cmd }
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(
        self: Box<Self>,
        shell: &mut ShellState,
        out: &mut dyn Write,
    ) -> Result<(), ShellError> {
        if self.cmd.is_background() {
            run_background(&self.cmd, shell, out)
        } else {
            run_foreground(&self.cmd, shell, out)
        }
    }
}

/// Runs `cmd` and blocks until it terminates.
///
/// The outcome becomes the shell status; a death by signal is reported right away.
fn run_foreground(
    cmd: &Command,
    shell: &mut ShellState,
    out: &mut dyn Write,
) -> Result<(), ShellError> {
    let Some(mut child) = launch(cmd, ChildSignals::Foreground, shell)? else {
        return Ok(());
    };
    debug!(pid = child.id(), command = %cmd, "waiting for foreground job");

    let status = foreground_status(child.id(), child.wait());
    shell.status.set(status);
    if status.is_signaled() {
        writeln!(out, "{status}")?;
        out.flush()?;
    }
    Ok(())
}

/// A foreground job whose outcome cannot be collected counts as failed.
fn foreground_status(pid: u32, waited: io::Result<ExitStatus>) -> Status {
    match waited {
        Ok(exit_status) => Status::from(exit_status),
        Err(err) => {
            warn!(pid, %err, "failed to wait for foreground job");
            Status::Exited(CHILD_FAILURE)
        }
    }
}

/// Starts `cmd` without waiting and tracks it in the process table.
///
/// Redirection and exec failures happen inside the child, so the job is
/// tracked like any other and its exit code shows up when it is reaped.
fn run_background(
    cmd: &Command,
    shell: &mut ShellState,
    out: &mut dyn Write,
) -> Result<(), ShellError> {
    let Some(child) = launch(cmd, ChildSignals::Background, shell)? else {
        return Ok(());
    };
    let pid = Pid::from_raw(child.id() as i32);
    shell.jobs.add(pid);
    info!(%pid, command = %cmd, "started background job");

    writeln!(out, "background pid is {pid}")?;
    out.flush()?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Input,
    Output,
}

impl Stream {
    fn name(self) -> &'static str {
        match self {
            Stream::Input => "input",
            Stream::Output => "output",
        }
    }

    fn fd(self) -> RawFd {
        match self {
            Stream::Input => 0,
            Stream::Output => 1,
        }
    }

    /// Files created by `>` get mode 0640.
    fn open(self, path: &CStr) -> nix::Result<RawFd> {
        match self {
            Stream::Input => open(path, OFlag::O_RDONLY, Mode::empty()),
            Stream::Output => open(
                path,
                OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
                Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP,
            ),
        }
    }
}

/// A redirection performed by the child between fork and exec.
struct Redirect {
    stream: Stream,
    path: CString,
    failure: Vec<u8>,
}

impl Redirect {
    fn new(stream: Stream, path: &str) -> Result<Self, String> {
        Ok(Self {
            stream,
            path: c_string(path)?,
            failure: format!("cannot open {path} for {}\n", stream.name()).into_bytes(),
        })
    }

    fn install(&self) -> nix::Result<()> {
        let fd = self.stream.open(&self.path)?;
        if fd != self.stream.fd() {
            dup2(fd, self.stream.fd())?;
            close(fd)?;
        }
        Ok(())
    }
}

/// Everything the child does after fork, prepared by the shell so the child
/// never allocates.
struct ChildImage {
    signals: ChildSignals,
    redirects: Vec<Redirect>,
    argv: Vec<CString>,
    envp: Vec<CString>,
    exec_failure: Vec<u8>,
}

impl ChildImage {
    fn new(cmd: &Command, signals: ChildSignals, shell: &ShellState) -> Result<Self, String> {
        let mut redirects = Vec::new();
        if let Some(path) = cmd.input() {
            redirects.push(Redirect::new(Stream::Input, path)?);
        }
        if let Some(path) = cmd.output() {
            redirects.push(Redirect::new(Stream::Output, path)?);
        }
        Ok(Self {
            signals,
            redirects,
            argv: cmd.argv().iter().map(|a| c_string(a)).collect::<Result<_, _>>()?,
            envp: shell
                .env
                .vars()
                .map(|(key, val)| c_string(&format!("{key}={val}")))
                .collect::<Result<_, _>>()?,
            exec_failure: format!("{}: ", cmd.program()).into_bytes(),
        })
    }

    /// Runs in the forked child. Only returns if the signal dispositions
    /// could not be set; every later failure ends the child with
    /// [`CHILD_FAILURE`].
    fn exec(&self) -> io::Result<()> {
        self.signals.apply()?;
        for redirect in &self.redirects {
            if redirect.install().is_err() {
                report(&[redirect.failure.as_slice()]);
                // SAFETY: terminates the forked child without running exit handlers.
                unsafe { _exit(CHILD_FAILURE) };
            }
        }
        let Err(err) = execvpe(&self.argv[0], &self.argv, &self.envp);
        report(&[self.exec_failure.as_slice(), err.desc().as_bytes(), b"\n"]);
        // SAFETY: terminates the forked child without running exit handlers.
        unsafe { _exit(CHILD_FAILURE) }
    }
}

/// Writes a diagnostic to stderr with plain `write` calls.
fn report(parts: &[&[u8]]) {
    // SAFETY: descriptor 2 stays open for the lifetime of the process.
    let stderr = unsafe { BorrowedFd::borrow_raw(2) };
    for part in parts {
        let _ = nix::unistd::write(stderr, part);
    }
}

fn c_string(s: &str) -> Result<CString, String> {
    CString::new(s).map_err(|_| format!("{s:?}: contains a NUL byte"))
}

/// Spawns the child with its signal dispositions in place.
///
/// Redirections and the program lookup happen in the child itself: a failure
/// there is reported on stderr and the child exits with [`CHILD_FAILURE`].
/// Returns `None` only when no child could be started for a reason other
/// than fork failure.
fn launch(
    cmd: &Command,
    signals: ChildSignals,
    shell: &mut ShellState,
) -> Result<Option<Child>, ShellError> {
    let image = match ChildImage::new(cmd, signals, shell) {
        Ok(image) => image,
        Err(message) => return Ok(child_failed(message, shell)),
    };

    // Targets given on the line are opened by the child over these defaults.
    let (stdin, stdout) = match signals {
        ChildSignals::Foreground => (Stdio::inherit(), Stdio::inherit()),
        ChildSignals::Background => (Stdio::null(), Stdio::null()),
    };
    let mut process = std::process::Command::new(cmd.program());
    process
        .args(cmd.args())
        .stdin(stdin)
        .stdout(stdout)
        .current_dir(shell.env.current_dir());
    // SAFETY: the child only issues sigaction, open, dup2, close, write and
    // exec calls on data prepared before fork.
    unsafe {
        process.pre_exec(move || image.exec());
    }

    match process.spawn() {
        Ok(child) => Ok(Some(child)),
        Err(err) if is_fork_failure(&err) => Err(ShellError::Fork(err)),
        Err(err) => Ok(child_failed(format!("{}: {err}", cmd.program()), shell)),
    }
}

fn child_failed(message: String, shell: &mut ShellState) -> Option<Child> {
    debug!(%message, "child could not be started");
    eprintln!("{message}");
    shell.status.set(Status::Exited(CHILD_FAILURE));
    None
}

/// The OS could not create a process at all, as opposed to the new process
/// failing to load the program.
fn is_fork_failure(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error().map(Errno::from_raw),
        Some(Errno::EAGAIN | Errno::ENOMEM)
    )
}
