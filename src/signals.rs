//! Ctrl-C / Ctrl-Z handling for the shell and the processes it spawns.
//!
//! The shell ignores SIGINT outright. SIGTSTP does not suspend anything: each
//! delivery flips the shell between [`Mode::Normal`] and
//! [`Mode::ForegroundOnly`]. The handler only bumps an atomic counter; the
//! read-evaluate loop derives the mode from it and prints the notices.

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use signal_hook::SigId;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Whether a trailing `&` starts a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    ForegroundOnly,
}

impl Mode {
    /// Line printed when the shell enters this mode.
    pub fn notice(&self) -> &'static str {
        match self {
            Mode::ForegroundOnly => "Entering foreground-only mode (& is now ignored)",
            Mode::Normal => "Exiting foreground-only mode",
        }
    }

    fn after_toggles(count: usize) -> Self {
        if count % 2 == 1 {
            Mode::ForegroundOnly
        } else {
            Mode::Normal
        }
    }
}

/// Two-state machine driven by SIGTSTP.
pub struct SignalController {
    toggles: Arc<AtomicUsize>,
    announced: usize,
    registration: Option<SigId>,
}

impl SignalController {
    /// A controller with no OS handlers attached; toggled only via [`toggle`](Self::toggle).
    pub fn new() -> Self {
        Self {
            toggles: Arc::new(AtomicUsize::new(0)),
            announced: 0,
            registration: None,
        }
    }

    /// Ignores SIGINT in the shell process and routes SIGTSTP to the toggle counter.
    pub fn install() -> io::Result<Self> {
        let mut controller = Self::new();
        set_disposition(Signal::SIGINT, SigHandler::SigIgn)?;

        let counter = Arc::clone(&controller.toggles);
        // SAFETY: the action is a single atomic increment, which is
        // async-signal-safe.
        let id = unsafe {
            signal_hook::low_level::register(Signal::SIGTSTP as i32, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        }?;
        controller.registration = Some(id);
        debug!("installed SIGINT/SIGTSTP dispositions");
        Ok(controller)
    }

    /// Current mode, including toggles not yet announced.
    pub fn mode(&self) -> Mode {
        Mode::after_toggles(self.toggles.load(Ordering::SeqCst))
    }

    /// Does exactly what the SIGTSTP handler does.
    pub fn toggle(&self) {
        self.toggles.fetch_add(1, Ordering::SeqCst);
    }

    /// Modes entered since the previous poll, oldest first.
    pub fn poll_notices(&mut self) -> Vec<Mode> {
        let current = self.toggles.load(Ordering::SeqCst);
        let entered = (self.announced..current)
            .map(|n| Mode::after_toggles(n + 1))
            .collect::<Vec<_>>();
        if !entered.is_empty() {
            debug!(mode = ?self.mode(), toggles = entered.len(), "mode changed");
        }
        self.announced = current;
        entered
    }
}

impl Default for SignalController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SignalController {
    fn drop(&mut self) {
        if let Some(id) = self.registration.take() {
            signal_hook::low_level::unregister(id);
        }
    }
}

/// Signal dispositions a spawned child starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSignals {
    /// Ctrl-C terminates the child, Ctrl-Z is ignored.
    Foreground,
    /// Immune to both Ctrl-C and Ctrl-Z.
    Background,
}

impl ChildSignals {
    /// Installs the dispositions in the current process.
    ///
    /// Called in the forked child before the new image is loaded, so it only
    /// issues `sigaction` calls.
    pub fn apply(self) -> io::Result<()> {
        let interrupt = match self {
            ChildSignals::Foreground => SigHandler::SigDfl,
            ChildSignals::Background => SigHandler::SigIgn,
        };
        set_disposition(Signal::SIGINT, interrupt)?;
        set_disposition(Signal::SIGTSTP, SigHandler::SigIgn)
    }
}

fn set_disposition(signal: Signal, handler: SigHandler) -> io::Result<()> {
    let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
    // SAFETY: only SigDfl and SigIgn are installed here, no Rust handler runs.
    unsafe { sigaction(signal, &action) }?;
    Ok(())
}
