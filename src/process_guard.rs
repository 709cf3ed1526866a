//! Process lifecycle management for bootstrap children
//!
//! Every child the bootstrapper spawns is tracked here so it can be torn
//! down when devboot itself goes away:
//!
//! - Background steps (pip, migrate, collectstatic) run in their own process
//!   group, so a single group signal reaches the whole tree.
//! - Terminal steps (createsuperuser, runserver) must stay in the terminal's
//!   foreground group to read input and receive Ctrl+C directly.
//! - Both kinds get `PR_SET_PDEATHSIG`, so they die with the parent.
//! - On SIGTERM/SIGHUP (or SIGINT while a background step runs) tracked
//!   children get SIGTERM, then SIGKILL after a grace period.

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

/// Global registry of child process IDs
static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Grace period used by signal-triggered cleanup
pub const SIGNAL_GRACE_PERIOD: Duration = Duration::from_secs(3);
/// Grace period used when a [`ProcessGuard`] is dropped
pub const DROP_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// How a child relates to the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    /// Own process group, PGID == PID
    Background,
    /// Shares the terminal's foreground process group
    Foreground,
}

/// Registry tracking all spawned child processes
#[derive(Debug, Default)]
pub struct ChildRegistry {
    /// Child PIDs currently running
    children: HashMap<u32, ChildKind>,
    /// Whether cleanup has already been initiated (prevent double-cleanup)
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    /// Register a new child process
    pub fn register(&mut self, pid: u32, kind: ChildKind) {
        self.children.insert(pid, kind);
        tracing::debug!("Registered {:?} child process PID {}", kind, pid);
    }

    /// Unregister a child process (called when it exits normally)
    pub fn unregister(&mut self, pid: u32) {
        self.children.remove(&pid);
        tracing::debug!("Unregistered child process PID {}", pid);
    }

    /// Number of tracked children
    pub fn count(&self) -> usize {
        self.children.len()
    }

    /// True when every tracked child shares the terminal's foreground group.
    ///
    /// Such children receive terminal signals themselves; devboot should
    /// wait for them rather than tear them down.
    pub fn only_foreground(&self) -> bool {
        !self.children.is_empty()
            && self
                .children
                .values()
                .all(|kind| *kind == ChildKind::Foreground)
    }

    /// Terminate all tracked child processes
    /// Sends SIGTERM first, waits up to `grace_period`, then SIGKILL
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            tracing::debug!("Cleanup already initiated, skipping");
            return;
        }
        self.cleanup_initiated = true;

        if self.children.is_empty() {
            tracing::debug!("No child processes to terminate");
            return;
        }

        tracing::info!("Terminating {} child process(es)...", self.children.len());

        let targets: Vec<(u32, ChildKind)> =
            self.children.iter().map(|(pid, kind)| (*pid, *kind)).collect();
        for &(pid, kind) in &targets {
            signal_child(pid, kind, Signal::SIGTERM);
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if targets.iter().all(|(pid, _)| !is_process_alive(*pid)) {
                tracing::info!("All child processes terminated gracefully");
                self.children.clear();
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &(pid, kind) in &targets {
            if is_process_alive(pid) {
                tracing::warn!("Child {} did not terminate, sending SIGKILL", pid);
                signal_child(pid, kind, Signal::SIGKILL);
            }
        }

        self.children.clear();
        tracing::info!("Child process cleanup complete");
    }
}

/// Signal a child the way its kind allows: the whole group for background
/// children, the PID alone for foreground ones.
fn signal_child(pid: u32, kind: ChildKind, sig: Signal) {
    if kind == ChildKind::Background {
        match send_signal_to_group(pid, sig) {
            Ok(()) => {
                tracing::debug!("Sent {} to process group {}", sig, pid);
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to send {} to process group {}: {}", sig, pid, e);
            }
        }
    }
    if let Err(e) = send_signal(pid, sig) {
        tracing::warn!("Failed to send {} to PID {}: {}", sig, pid, e);
    }
}

/// Send a signal to a process
fn send_signal(pid: u32, sig: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), sig)
}

/// Send a signal to an entire process group (negative PID)
fn send_signal_to_group(pgid: u32, sig: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), sig)
}

/// Check if a process is still alive (not dead or zombie)
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    // Field 3 of /proc/<pid>/stat is the state; Z and X are not running
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        let fields: Vec<&str> = stat.split_whitespace().collect();
        if fields.len() > 2 {
            return !matches!(fields[2], "Z" | "X");
        }
    }

    true
}

/// RAII guard that terminates all children on drop
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
}

impl ProcessGuard {
    /// Create a new process guard attached to the global registry
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
        }
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            tracing::debug!(
                "ProcessGuard dropped, cleaning up {} child(ren)",
                registry.count()
            );
            registry.terminate_all(DROP_GRACE_PERIOD);
        }
    }
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP. Call once at startup.
///
/// SIGINT while only foreground children run is left to them: the terminal
/// already delivered it, and the main thread reports their exit status.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::thread;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    thread::spawn(move || {
        for sig in signals.forever() {
            let signal_name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "UNKNOWN",
            };

            let registry = ChildRegistry::global();
            if let Ok(mut guard) = registry.lock() {
                if sig == SIGINT && guard.only_foreground() {
                    tracing::debug!("SIGINT reached the foreground step, waiting for it to exit");
                    continue;
                }
                tracing::info!("Received {} signal, cleaning up...", signal_name);
                guard.terminate_all(SIGNAL_GRACE_PERIOD);
            }

            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait for std::process::Command to set up the death pact
pub trait CommandProcessGroup {
    /// Run the command in its own process group and die with the parent
    fn in_new_process_group(&mut self) -> &mut Self;

    /// Keep the caller's process group (and terminal) but die with the parent
    fn with_parent_death_signal(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: setpgid and prctl are async-signal-safe
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::from)?;
                set_parent_death_signal()
            });
        }
        self
    }

    fn with_parent_death_signal(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: prctl is async-signal-safe
        unsafe {
            self.pre_exec(set_parent_death_signal);
        }
        self
    }
}

fn set_parent_death_signal() -> std::io::Result<()> {
    // SAFETY: plain syscall wrapper with constant arguments
    if unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) } == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
