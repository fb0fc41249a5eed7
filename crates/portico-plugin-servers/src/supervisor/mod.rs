//! Spawning, monitoring, and respawning of managed plugin servers.
//!
//! Each managed server definition (one declaring both a socket and an
//! executable) gets an independent supervision unit: an OS thread that
//! spawns the child, drains its merged stdout/stderr into the log, waits
//! for it to exit, and respawns it. A crashing child is always retried;
//! the only thing that stops a unit is the shutdown flag. Units are
//! isolated from one another, so a failure spawning or monitoring one
//! server never disturbs supervision of the rest.
//!
//! The respawn loop is unconditional and uncapped, with a short fixed
//! pause between attempts so a child that dies instantly cannot busy-spin
//! its thread. The pause waits on the shutdown flag, which is therefore
//! observed before every spawn.

use std::fmt;
use std::io::PipeReader;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use portico_config::{DefinitionStore, ServerDefinition};

use crate::error::SupervisorError;
use crate::forwarder::LogForwarder;

/// Tracing target for supervision lifecycle records.
const SUPERVISOR_TARGET: &str = "portico_plugin_servers::supervisor";

/// Pause between respawn attempts. Keeps a crash-looping or unspawnable
/// child from busy-spinning its unit thread; the retry itself is never
/// skipped.
const RESPAWN_PAUSE: Duration = Duration::from_millis(250);

/// One supervisor may run per process; `start` fails loudly otherwise.
static SUPERVISOR_ACTIVE: AtomicBool = AtomicBool::new(false);

fn lock_state(state: &Mutex<ManagedProcess>) -> MutexGuard<'_, ManagedProcess> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable flag signalling gateway shutdown to supervision units.
///
/// Units observe the flag before every spawn and while pausing between
/// respawns, so no new child is started after the flag is raised.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    inner: Arc<FlagInner>,
}

#[derive(Debug, Default)]
struct FlagInner {
    triggered: Mutex<bool>,
    condvar: Condvar,
}

impl ShutdownFlag {
    /// Creates an untriggered flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag and wakes every waiting unit.
    pub fn trigger(&self) {
        let mut triggered = self
            .inner
            .triggered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *triggered = true;
        drop(triggered);
        self.inner.condvar.notify_all();
    }

    /// Whether the flag has been raised.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self
            .inner
            .triggered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits up to `timeout` for the flag, returning `true` once raised.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        let mut triggered = self
            .inner
            .triggered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while !*triggered {
            let Some(remaining) = timeout.checked_sub(start.elapsed()) else {
                return false;
            };
            let (guard, _timeout_result) = self
                .inner
                .condvar
                .wait_timeout(triggered, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            triggered = guard;
        }
        true
    }
}

/// Lifecycle state of one managed server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No spawn attempted yet.
    Idle,
    /// A spawn attempt is in progress.
    Spawning,
    /// The child is alive and its output is being forwarded.
    Running,
    /// The child exited (or failed to spawn) and awaits respawn.
    Exited,
    /// Shutdown was observed; the unit will not spawn again.
    Stopped,
}

impl ProcessState {
    /// Returns the canonical lowercase name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Spawning => "spawning",
            Self::Running => "running",
            Self::Exited => "exited",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a managed child last left the `Running` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The child exited normally with a status code.
    Exited {
        /// Process exit code.
        code: i32,
    },
    /// The child was terminated by a signal.
    Signalled {
        /// Terminating signal number.
        signal: i32,
    },
    /// The child could not be started at all.
    SpawnFailed {
        /// Description of the spawn failure.
        message: String,
    },
    /// The exit status could not be determined.
    Unknown,
}

impl ExitReason {
    fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited { code };
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signalled { signal };
            }
        }
        Self::Unknown
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited { code } => write!(f, "exit code {code}"),
            Self::Signalled { signal } => write!(f, "signal {signal}"),
            Self::SpawnFailed { message } => write!(f, "spawn failed: {message}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Runtime bookkeeping for one supervised server.
///
/// Mutated only by the owning unit thread; the handle reads clones of it
/// for diagnostics and the recorded pid when stopping.
#[derive(Debug, Clone)]
pub struct ManagedProcess {
    state: ProcessState,
    pid: Option<u32>,
    restarts: u64,
    last_exit: Option<ExitReason>,
}

impl ManagedProcess {
    fn new() -> Self {
        Self {
            state: ProcessState::Idle,
            pid: None,
            restarts: 0,
            last_exit: None,
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    /// Returns the live child's pid, if one is running.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Returns how many times the child has exited or failed to spawn
    /// since supervision began.
    #[must_use]
    pub const fn restarts(&self) -> u64 {
        self.restarts
    }

    /// Returns the most recent exit reason, if any.
    #[must_use]
    pub const fn last_exit(&self) -> Option<&ExitReason> {
        self.last_exit.as_ref()
    }

    fn begin_spawn(&mut self) {
        self.state = ProcessState::Spawning;
    }

    fn mark_running(&mut self, pid: u32) {
        self.state = ProcessState::Running;
        self.pid = Some(pid);
    }

    fn record_exit(&mut self, reason: ExitReason) {
        self.state = ProcessState::Exited;
        self.pid = None;
        self.restarts += 1;
        self.last_exit = Some(reason);
    }

    fn mark_stopped(&mut self) {
        self.state = ProcessState::Stopped;
        self.pid = None;
    }
}

/// Owner of one supervision unit per managed server definition.
///
/// Construct one per worker and call [`Supervisor::start`] exactly once;
/// the leadership gate decides *which* worker does so.
///
/// # Example
///
/// ```no_run
/// use portico_config::{DefinitionStore, ServerDefinition};
/// use portico_plugin_servers::Supervisor;
///
/// let store = DefinitionStore::new(vec![
///     ServerDefinition::new("auth")
///         .with_socket("/run/portico/auth.sock")
///         .with_executable("/usr/local/bin/auth-server"),
/// ]);
/// let handle = Supervisor::new(store).start().expect("start supervision");
/// // ... gateway runs ...
/// handle.stop();
/// ```
#[derive(Debug)]
pub struct Supervisor {
    store: DefinitionStore,
}

impl Supervisor {
    /// Creates a supervisor over the declared definitions.
    #[must_use]
    pub const fn new(store: DefinitionStore) -> Self {
        Self { store }
    }

    /// Validates the definitions and starts one unit per managed server.
    ///
    /// Definitions without a socket are ignored entirely; definitions with
    /// a socket but no executable are externally managed and only logged.
    /// A failure to start one unit is logged and does not affect the rest.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::AlreadyStarted`] when a handle from a
    /// previous `start` is still live in this process, and
    /// [`SupervisorError::Config`] when server names collide after
    /// synthesis.
    pub fn start(self) -> Result<SupervisorHandle, SupervisorError> {
        if SUPERVISOR_ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(SupervisorError::AlreadyStarted);
        }
        self.start_units().inspect_err(|_| {
            SUPERVISOR_ACTIVE.store(false, Ordering::SeqCst);
        })
    }

    fn start_units(self) -> Result<SupervisorHandle, SupervisorError> {
        self.store.ensure_unique_names()?;
        let shutdown = ShutdownFlag::new();
        let mut units = Vec::new();
        for definition in &self.store {
            if definition.socket().is_none() {
                debug!(
                    target: SUPERVISOR_TARGET,
                    server = definition.name(),
                    "no socket declared; definition ignored"
                );
                continue;
            }
            if definition.executable().is_none() {
                info!(
                    target: SUPERVISOR_TARGET,
                    server = definition.name(),
                    "no executable declared; server is externally managed"
                );
                continue;
            }
            match spawn_unit(definition.clone(), shutdown.clone()) {
                Ok(unit) => units.push(unit),
                Err(thread_error) => error!(
                    target: SUPERVISOR_TARGET,
                    server = definition.name(),
                    error = %thread_error,
                    "failed to start supervision unit"
                ),
            }
        }
        info!(
            target: SUPERVISOR_TARGET,
            units = units.len(),
            "plugin server supervision started"
        );
        Ok(SupervisorHandle { shutdown, units })
    }
}

struct UnitHandle {
    name: String,
    state: Arc<Mutex<ManagedProcess>>,
    thread: JoinHandle<()>,
}

impl fmt::Debug for UnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitHandle").field("name", &self.name).finish()
    }
}

/// Running supervisor returned by [`Supervisor::start`].
///
/// Dropping the handle without stopping it detaches the unit threads:
/// children keep being respawned for the life of the process. Call
/// [`SupervisorHandle::stop`] (or [`SupervisorHandle::join`]) for an
/// orderly shutdown.
#[derive(Debug)]
pub struct SupervisorHandle {
    shutdown: ShutdownFlag,
    units: Vec<UnitHandle>,
}

impl SupervisorHandle {
    /// Raises the shutdown flag without touching running children.
    ///
    /// Units stop respawning as soon as they observe the flag; a child
    /// already running is left to exit naturally.
    pub fn shutdown(&self) {
        info!(target: SUPERVISOR_TARGET, "plugin server supervision shutting down");
        self.shutdown.trigger();
    }

    /// Raises the shutdown flag, terminates running children, and joins
    /// every unit thread.
    pub fn stop(mut self) {
        self.shutdown();
        for unit in &self.units {
            if let Some(pid) = lock_state(&unit.state).pid() {
                terminate(&unit.name, pid);
            }
        }
        self.join_units();
    }

    /// Waits for every unit to observe shutdown and finish.
    ///
    /// Children are left to exit naturally; combine with
    /// [`SupervisorHandle::shutdown`] or use [`SupervisorHandle::stop`]
    /// when the gateway should not wait on them.
    pub fn join(mut self) {
        self.join_units();
    }

    /// Returns the number of supervision units that were started.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Returns a point-in-time copy of every unit's bookkeeping, keyed by
    /// server name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, ManagedProcess)> {
        self.units
            .iter()
            .map(|unit| (unit.name.clone(), lock_state(&unit.state).clone()))
            .collect()
    }

    fn join_units(&mut self) {
        for unit in self.units.drain(..) {
            if unit.thread.join().is_err() {
                error!(
                    target: SUPERVISOR_TARGET,
                    server = %unit.name,
                    "supervision thread terminated abnormally"
                );
            }
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        SUPERVISOR_ACTIVE.store(false, Ordering::SeqCst);
    }
}

fn spawn_unit(
    definition: ServerDefinition,
    shutdown: ShutdownFlag,
) -> std::io::Result<UnitHandle> {
    let name = definition.name().to_owned();
    let state = Arc::new(Mutex::new(ManagedProcess::new()));
    let unit_state = Arc::clone(&state);
    let unit_name = name.clone();
    let thread = thread::Builder::new()
        .name(format!("plugin-server:{name}"))
        .spawn(move || {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                supervise(&definition, &unit_state, &shutdown);
            }));
            if outcome.is_err() {
                error!(
                    target: SUPERVISOR_TARGET,
                    server = %unit_name,
                    "supervision unit panicked; server is no longer supervised"
                );
            }
        })?;
    Ok(UnitHandle {
        name,
        state,
        thread,
    })
}

/// Body of one supervision unit: spawn, forward, reap, repeat.
fn supervise(
    definition: &ServerDefinition,
    state: &Mutex<ManagedProcess>,
    shutdown: &ShutdownFlag,
) {
    let server = definition.name();
    let forwarder = LogForwarder::new(server);
    loop {
        if shutdown.is_triggered() {
            break;
        }
        lock_state(state).begin_spawn();
        match spawn_child(definition) {
            Ok((mut child, output)) => {
                let pid = child.id();
                lock_state(state).mark_running(pid);
                info!(target: SUPERVISOR_TARGET, server, pid, "plugin server started");
                if let Err(read_error) = forwarder.consume(output) {
                    warn!(
                        target: SUPERVISOR_TARGET,
                        server,
                        error = %read_error,
                        "error draining plugin server output"
                    );
                }
                let reason = match child.wait() {
                    Ok(status) => ExitReason::from_status(status),
                    Err(wait_error) => {
                        warn!(
                            target: SUPERVISOR_TARGET,
                            server,
                            error = %wait_error,
                            "failed to reap plugin server"
                        );
                        ExitReason::Unknown
                    }
                };
                warn!(target: SUPERVISOR_TARGET, server, reason = %reason, "plugin server exited");
                lock_state(state).record_exit(reason);
            }
            Err(spawn_error) => {
                error!(
                    target: SUPERVISOR_TARGET,
                    server,
                    error = %spawn_error,
                    "failed to spawn plugin server"
                );
                lock_state(state).record_exit(ExitReason::SpawnFailed {
                    message: spawn_error.to_string(),
                });
            }
        }
        if shutdown.wait_timeout(RESPAWN_PAUSE) {
            break;
        }
    }
    lock_state(state).mark_stopped();
    info!(target: SUPERVISOR_TARGET, server, "supervision stopped");
}

/// Launches the child with merged stdout/stderr and the declared
/// environment replacing the ambient one unless inheritance is requested.
fn spawn_child(definition: &ServerDefinition) -> std::io::Result<(Child, PipeReader)> {
    let executable = definition.executable().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "server definition has no executable",
        )
    })?;
    let (reader, writer) = std::io::pipe()?;
    let stderr_writer = writer.try_clone()?;
    let mut command = Command::new(executable);
    command
        .args(definition.args())
        .stdin(Stdio::null())
        .stdout(Stdio::from(writer))
        .stderr(Stdio::from(stderr_writer));
    if !definition.inherit_environment() {
        command.env_clear();
    }
    command.envs(definition.environment());
    let child = command.spawn()?;
    Ok((child, reader))
}

#[cfg(unix)]
fn terminate(server: &str, pid: u32) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(errno) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        warn!(
            target: SUPERVISOR_TARGET,
            server,
            pid,
            errno = %errno,
            "failed to signal plugin server"
        );
    }
}

#[cfg(not(unix))]
fn terminate(_server: &str, _pid: u32) {}
