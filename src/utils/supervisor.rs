use std::{
    ffi::OsString,
    fs::File,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::sleep,
    time::{Duration, Instant},
};

use subprocess::{ExitStatus, Exec, Popen, Redirection};

/// Longest uninterrupted blocking wait, bounds how late a Ctrl+C is noticed.
const WAIT_SLICE: Duration = Duration::from_millis(200);

#[derive(Clone, Copy, Debug, Default)]
pub struct Timing {
    /// time limit the solver enforces on itself
    pub budget: Duration,
    /// extra time granted for startup and flushing before the kill
    pub grace: Duration,
    /// pause after every run
    pub pause: Duration,
}

impl Timing {
    pub fn deadline(&self) -> Duration {
        self.budget.saturating_add(self.grace)
    }

    /// Wall time one run is expected to occupy, used only for ETAs.
    pub fn per_run(&self) -> Duration {
        self.deadline().saturating_add(self.pause)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitKind {
    Success,
    /// non-zero exit code, or `128 + signal` when killed by a signal
    NonZeroExit(i64),
    /// still alive at the deadline and killed
    StillRunningAtDeadline,
    LaunchFailed(String),
    /// killed because the user asked the harness to stop
    Interrupted,
}

#[derive(Clone, Debug)]
pub struct ProcessOutcome {
    pub status: ExitKind,
    pub wall_time: Duration,
}

impl ProcessOutcome {
    pub fn launch_failed(reason: impl Into<String>) -> Self {
        ProcessOutcome {
            status: ExitKind::LaunchFailed(reason.into()),
            wall_time: Duration::ZERO,
        }
    }
}

fn classify(status: ExitStatus) -> ExitKind {
    match status {
        ExitStatus::Exited(0) => ExitKind::Success,
        ExitStatus::Exited(code) => ExitKind::NonZeroExit(code as i64),
        ExitStatus::Signaled(sig) => ExitKind::NonZeroExit(128 + sig as i64),
        ExitStatus::Other(code) => ExitKind::NonZeroExit(code as i64),
        ExitStatus::Undetermined => ExitKind::NonZeroExit(-1),
    }
}

pub struct RunningSolver {
    popen: Popen,
    started: Instant,
}

impl RunningSolver {
    /// Starts `argv[0]` with the remaining arguments. Stdout and stderr both go
    /// to `output`.
    pub fn spawn(argv: &[OsString], output: &Path) -> anyhow::Result<RunningSolver> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow::format_err!("empty command line"))?;
        let out = File::create(output)?;

        let popen = Exec::cmd(program)
            .args(args)
            .stdout(Redirection::File(out))
            .stderr(Redirection::Merge)
            .popen()?;

        Ok(RunningSolver {
            popen,
            started: Instant::now(),
        })
    }

    /// Blocks until the process exits, `limit` elapses since it was started or
    /// `stop` is raised. A process still alive at that point is killed.
    ///
    /// A process that ends while `stop` is raised is reported as interrupted
    /// whatever its exit status, a terminal Ctrl+C reaches the solver too.
    pub fn wait_until(mut self, limit: Duration, stop: &AtomicBool) -> ProcessOutcome {
        // unrepresentable instants mean no deadline at all
        let deadline = self.started.checked_add(limit);

        let status = loop {
            if stop.load(Ordering::Relaxed) {
                self.kill();
                break ExitKind::Interrupted;
            }

            let now = Instant::now();
            let slice = match deadline {
                Some(deadline) if now >= deadline => {
                    break match self.popen.poll() {
                        Some(st) => classify(st),
                        None => {
                            self.kill();
                            ExitKind::StillRunningAtDeadline
                        }
                    };
                }
                Some(deadline) => (deadline - now).min(WAIT_SLICE),
                None => WAIT_SLICE,
            };

            match self.popen.wait_timeout(slice) {
                Ok(Some(st)) => break classify(st),
                Ok(None) => {}
                Err(e) => {
                    warn!("waiting for the solver failed: {}", e);
                    self.kill();
                    break ExitKind::StillRunningAtDeadline;
                }
            }
        };
        let status = if stop.load(Ordering::Relaxed) {
            ExitKind::Interrupted
        } else {
            status
        };

        ProcessOutcome {
            status,
            wall_time: self.started.elapsed(),
        }
    }

    fn kill(&mut self) {
        // no-op for a process that already exited
        _ = self.popen.kill();
        _ = self.popen.wait();
    }
}

/// Runs one solver process at a time under a fixed timing discipline.
pub struct Supervisor {
    timing: Timing,
    stop: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(timing: Timing, stop: Arc<AtomicBool>) -> Self {
        Supervisor { timing, stop }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn interrupted(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Launches `argv`, waits at most `budget + grace`, kills stragglers and
    /// then observes the inter-run pause. Nothing is launched once the stop
    /// flag is up.
    pub fn execute(&self, argv: &[OsString], output: &Path) -> ProcessOutcome {
        if self.interrupted() {
            return ProcessOutcome {
                status: ExitKind::Interrupted,
                wall_time: Duration::ZERO,
            };
        }
        let outcome = match RunningSolver::spawn(argv, output) {
            Ok(solver) => solver.wait_until(self.timing.deadline(), &self.stop),
            Err(e) => ProcessOutcome::launch_failed(format!("{:#}", e)),
        };

        if outcome.status != ExitKind::Interrupted {
            sleep(self.timing.pause);
        }
        outcome
    }

    /// Runs `argv` to completion with no deadline, used for preparation steps
    /// that are not timed.
    pub fn run_to_completion(&self, argv: &[OsString], output: &Path) -> ProcessOutcome {
        if self.interrupted() {
            return ProcessOutcome {
                status: ExitKind::Interrupted,
                wall_time: Duration::ZERO,
            };
        }
        match RunningSolver::spawn(argv, output) {
            Ok(solver) => solver.wait_until(Duration::MAX, &self.stop),
            Err(e) => ProcessOutcome::launch_failed(format!("{:#}", e)),
        }
    }
}

/// Flag raised on SIGINT. Installing it replaces the default action, so only
/// commands that poll the flag should ask for it.
pub fn interrupt_flag() -> anyhow::Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))?;
    Ok(stop)
}
