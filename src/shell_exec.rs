//! Child process execution for segments.
//!
//! Segments never touch [`std::process::Command`] directly. They go through
//! [`Cmd`], which logs each invocation, waits for a free process slot and
//! kills the child once its timeout passes. A killed child surfaces as
//! [`ErrorKind::TimedOut`].

use std::io::{self, ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::sync::OnceLock;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::sync::ProcessSlots;

const MAX_PROCESSES_VAR: &str = "PROMPTLINE_MAX_CONCURRENT_COMMANDS";
const DEFAULT_MAX_PROCESSES: usize = 16;
const POLL_INTERVAL: Duration = Duration::from_millis(5);

static PROCESS_SLOTS: OnceLock<ProcessSlots> = OnceLock::new();
static STARTED: OnceLock<Instant> = OnceLock::new();

fn process_slots() -> &'static ProcessSlots {
    PROCESS_SLOTS.get_or_init(|| {
        let limit = std::env::var(MAX_PROCESSES_VAR)
            .ok()
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_PROCESSES);
        ProcessSlots::new(limit)
    })
}

/// Microseconds since the first traced command in this process.
fn elapsed_us() -> u128 {
    STARTED.get_or_init(Instant::now).elapsed().as_micros()
}

/// Builder for a single external command.
///
/// ```ignore
/// let output = Cmd::new("svn")
///     .args(["info", "/work/copy", "--show-item", "revision"])
///     .context("svn")
///     .timeout(Duration::from_secs(4))
///     .run()?;
/// ```
pub struct Cmd {
    program: String,
    args: Vec<String>,
    dir: Option<PathBuf>,
    label: Option<String>,
    timeout: Option<Duration>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
            label: None,
            timeout: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Label shown in debug output, usually the segment or tool name.
    pub fn context(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Kill the child if it is still running after `limit`.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn build(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null());
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }
        command
    }

    /// Run to completion and collect the output.
    ///
    /// A non-zero exit status is returned as `Ok`; callers decide what it means.
    pub fn run(self) -> io::Result<Output> {
        let line = self.command_line();
        let label = self.label.as_deref().unwrap_or("-");
        log::debug!("$ {line} [{label}]");

        let _slot = process_slots().acquire();
        let started_at = elapsed_us();
        let clock = Instant::now();

        let mut command = self.build();
        let result = match self.timeout {
            Some(limit) => run_with_deadline(&mut command, clock + limit),
            None => command.output(),
        };

        let took = clock.elapsed().as_micros();
        match &result {
            Ok(output) => log::debug!(
                "[pl-trace] ts={started_at} context={label} cmd=\"{line}\" dur_us={took} ok={}",
                output.status.success()
            ),
            Err(e) => log::debug!(
                "[pl-trace] ts={started_at} context={label} cmd=\"{line}\" dur_us={took} err=\"{e}\""
            ),
        }
        result
    }
}

fn drain(pipe: Option<impl Read + Send + 'static>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Both pipes are read on their own threads so a chatty stderr cannot stall
/// a child that is still writing stdout.
fn run_with_deadline(command: &mut Command, deadline: Instant) -> io::Result<Output> {
    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let Some(status) = wait_until(&mut child, deadline)? else {
        let _ = child.kill();
        let _ = child.wait();
        let _ = (stdout.join(), stderr.join());
        return Err(io::Error::new(ErrorKind::TimedOut, "command timed out"));
    };

    Ok(Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}
