//! External process execution
//!
//! Every external tool (git, gclient, python, ninja, patch, the native
//! runner and the platform linkers) is launched through [`ProcessRunner`].
//! Invocations carry their own working directory and environment so the
//! orchestrator never changes its own.

use crate::error::{BuildError, BuildResult};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A single external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Program name or path
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; inherits the caller's when unset
    pub cwd: Option<PathBuf>,
    /// Variables set on top of the inherited environment
    pub env: BTreeMap<String, String>,
    /// Variables removed from the inherited environment
    pub env_remove: Vec<String>,
    /// File fed to the process on stdin
    pub stdin: Option<PathBuf>,
}

impl Invocation {
    /// Create an invocation of `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Path argument, rendered lossily
    pub fn path_arg(self, path: impl AsRef<Path>) -> Self {
        let rendered = path.as_ref().display().to_string();
        self.arg(rendered)
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<'a>(mut self, vars: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        for (key, value) in vars {
            self.env.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.env.remove(&key);
        self.env_remove.push(key);
        self
    }

    /// Feed `path` to the process on stdin (`program < path`)
    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    /// File name of the program, used to key scripted responses
    pub fn program_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.program)
    }

    /// Command line as a single string (no shell quoting)
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        if let Some(stdin) = &self.stdin {
            line.push_str(" < ");
            line.push_str(&stdin.display().to_string());
        }
        line
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutput {
    /// Successful output with the given stdout
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration: Duration::ZERO,
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get combined output
    pub fn output(&self) -> String {
        let mut output = String::new();
        if !self.stdout.is_empty() {
            output.push_str("STDOUT:\n");
            output.push_str(&self.stdout);
            output.push('\n');
        }
        if !self.stderr.is_empty() {
            output.push_str("STDERR:\n");
            output.push_str(&self.stderr);
        }
        output
    }
}

/// Launches external processes
pub trait ProcessRunner: Send + Sync {
    /// Run to completion and capture output
    ///
    /// A non-zero exit status is not an error here; see [`run_checked`].
    fn run(&self, invocation: &Invocation) -> BuildResult<ProcessOutput>;
}

/// Run `invocation` and turn a non-zero exit into [`BuildError::CommandFailed`]
///
/// With `keep_going` the failure is logged and the output returned instead.
pub fn run_checked(
    runner: &dyn ProcessRunner,
    invocation: &Invocation,
    keep_going: bool,
) -> BuildResult<ProcessOutput> {
    let output = runner.run(invocation)?;
    if output.is_success() {
        return Ok(output);
    }

    if keep_going {
        warn!(
            command = %invocation,
            exit_code = output.exit_code,
            "command failed, continuing"
        );
        return Ok(output);
    }

    Err(BuildError::CommandFailed {
        program: invocation.program.clone(),
        exit_code: output.exit_code,
        output: output.output(),
    })
}

/// [`ProcessRunner`] backed by `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, invocation: &Invocation) -> BuildResult<ProcessOutput> {
        debug!(
            command = %invocation,
            cwd = ?invocation.cwd,
            "running"
        );

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(&invocation.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for key in &invocation.env_remove {
            command.env_remove(key);
        }
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }
        match &invocation.stdin {
            Some(path) => {
                let file = File::open(path).map_err(|e| BuildError::io(path, e))?;
                command.stdin(Stdio::from(file));
            }
            None => {
                command.stdin(Stdio::null());
            }
        }

        let start = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|e| BuildError::spawn(&invocation.program, e))?;

        let program = invocation.program_name();
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let (stdout, stderr) = thread::scope(|scope| {
            let out = scope.spawn(move || forward_lines(stdout_pipe, program, "stdout"));
            let err = scope.spawn(move || forward_lines(stderr_pipe, program, "stderr"));
            (out.join().unwrap_or_default(), err.join().unwrap_or_default())
        });
        let status = child
            .wait()
            .map_err(|e| BuildError::spawn(&invocation.program, e))?;

        let result = ProcessOutput {
            exit_code: status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            duration: start.elapsed(),
        };

        debug!(
            program = invocation.program_name(),
            exit_code = result.exit_code,
            elapsed_ms = result.duration.as_millis() as u64,
            "finished"
        );

        Ok(result)
    }
}

/// Log each line of a child stream as it arrives and return the raw bytes
fn forward_lines(pipe: Option<impl Read>, program: &str, stream: &'static str) -> Vec<u8> {
    let Some(pipe) = pipe else {
        return Vec::new();
    };
    let mut reader = BufReader::new(pipe);
    let mut captured = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                info!(program, stream, "{}", String::from_utf8_lossy(&line).trim_end());
                captured.extend_from_slice(&line);
            }
            Err(e) => {
                warn!(program, stream, error = %e, "stopped reading output");
                break;
            }
        }
    }
    captured
}

/// [`ProcessRunner`] that records invocations instead of running them
///
/// Responses are scripted per program, matched first on the full program
/// string and then on its file name. Unscripted programs succeed with
/// empty output.
#[derive(Debug, Default)]
pub struct RecordingProcessRunner {
    invocations: Mutex<Vec<Invocation>>,
    responses: Mutex<HashMap<String, VecDeque<BuildResult<ProcessOutput>>>>,
}

impl RecordingProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next call to `program`
    pub fn respond(&self, program: impl Into<String>, output: ProcessOutput) -> &Self {
        self.queue(program.into(), Ok(output));
        self
    }

    /// Queue a failing exit for the next call to `program`
    pub fn fail(&self, program: impl Into<String>, exit_code: i32) -> &Self {
        let program = program.into();
        let stderr = format!("{program} failed");
        self.queue(program, Ok(ProcessOutput::failure(exit_code, stderr)));
        self
    }

    /// Make the next call to `program` fail to start
    pub fn fail_to_spawn(&self, program: impl Into<String>) -> &Self {
        let program = program.into();
        let error = BuildError::spawn(program.clone(), "program not found");
        self.queue(program, Err(error));
        self
    }

    /// Every invocation seen so far
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Command lines of every invocation seen so far
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .map(Invocation::command_line)
            .collect()
    }

    /// Invocations whose program file name is `name`
    pub fn calls_to(&self, name: &str) -> Vec<Invocation> {
        self.invocations()
            .into_iter()
            .filter(|inv| inv.program == name || inv.program_name() == name)
            .collect()
    }

    fn queue(&self, program: String, response: BuildResult<ProcessOutput>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(program)
            .or_default()
            .push_back(response);
    }

    fn next_response(&self, invocation: &Invocation) -> Option<BuildResult<ProcessOutput>> {
        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        for key in [invocation.program.as_str(), invocation.program_name()] {
            if let Some(response) = responses.get_mut(key).and_then(VecDeque::pop_front) {
                return Some(response);
            }
        }
        None
    }
}

impl ProcessRunner for RecordingProcessRunner {
    fn run(&self, invocation: &Invocation) -> BuildResult<ProcessOutput> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(invocation.clone());
        self.next_response(invocation)
            .unwrap_or_else(|| Ok(ProcessOutput::success("")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let inv = Invocation::new("ninja")
            .args(["-C", "out/host_release"])
            .arg("flutter/third_party/txt:txt_lib")
            .cwd("/engine/src")
            .env("PATH", "/depot_tools");

        assert_eq!(inv.program, "ninja");
        assert_eq!(inv.args.len(), 3);
        assert_eq!(inv.cwd, Some(PathBuf::from("/engine/src")));
        assert_eq!(
            inv.command_line(),
            "ninja -C out/host_release flutter/third_party/txt:txt_lib"
        );
    }

    #[test]
    fn test_env_remove_overrides_set() {
        let inv = Invocation::new("mono").env("SDKROOT", "/sdk").env_remove("SDKROOT");
        assert!(inv.env.is_empty());
        assert_eq!(inv.env_remove, vec!["SDKROOT".to_string()]);
    }

    #[test]
    fn test_command_line_shows_stdin() {
        let inv = Invocation::new("patch").args(["-p1", "-N"]).stdin_file("skia.patch");
        assert_eq!(inv.command_line(), "patch -p1 -N < skia.patch");
    }

    #[test]
    fn test_program_name_strips_directories() {
        let inv = Invocation::new("/Xcode/usr/bin/ld");
        assert_eq!(inv.program_name(), "ld");
    }

    #[test]
    fn test_output_combined() {
        let output = ProcessOutput {
            exit_code: 1,
            stdout: "out".to_string(),
            stderr: "err".to_string(),
            duration: Duration::ZERO,
        };
        assert!(!output.is_success());
        assert_eq!(output.output(), "STDOUT:\nout\nSTDERR:\nerr");
    }

    #[test]
    fn test_recording_runner_scripted_responses() {
        let runner = RecordingProcessRunner::new();
        runner.respond("xcode-select", ProcessOutput::success("/Xcode\n"));
        runner.fail("ninja", 2);

        let out = runner.run(&Invocation::new("xcode-select").arg("-p")).unwrap();
        assert_eq!(out.stdout, "/Xcode\n");

        let out = runner.run(&Invocation::new("ninja")).unwrap();
        assert_eq!(out.exit_code, 2);

        // Queue exhausted: default success
        let out = runner.run(&Invocation::new("ninja")).unwrap();
        assert!(out.is_success());

        assert_eq!(runner.invocations().len(), 3);
        assert_eq!(runner.calls_to("ninja").len(), 2);
    }

    #[test]
    fn test_run_checked_failure() {
        let runner = RecordingProcessRunner::new();
        runner.fail("git", 128);

        let err = run_checked(&runner, &Invocation::new("git").arg("clone"), false).unwrap_err();
        assert!(matches!(
            err,
            BuildError::CommandFailed { exit_code: 128, .. }
        ));
    }

    #[test]
    fn test_run_checked_keep_going() {
        let runner = RecordingProcessRunner::new();
        runner.fail("git", 128);

        let out = run_checked(&runner, &Invocation::new("git"), true).unwrap();
        assert_eq!(out.exit_code, 128);
    }

    #[test]
    fn test_spawn_error_propagates_even_with_keep_going() {
        let runner = RecordingProcessRunner::new();
        runner.fail_to_spawn("mono");

        let err = run_checked(&runner, &Invocation::new("mono"), true).unwrap_err();
        assert!(matches!(err, BuildError::CommandSpawnError { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = SystemProcessRunner
            .run(&Invocation::new("sh").args(["-c", "echo $GREETING"]).env("GREETING", "hi").cwd(dir.path()))
            .unwrap();
        assert!(out.is_success());
        assert_eq!(out.stdout.trim(), "hi");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_keeps_streams_apart() {
        let out = SystemProcessRunner
            .run(&Invocation::new("sh").args([
                "-c",
                "echo one; echo oops 1>&2; printf two; exit 3",
            ]))
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout, "one\ntwo");
        assert_eq!(out.stderr, "oops\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_reads_stdin_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        std::fs::write(&input, "from file").unwrap();

        let out = SystemProcessRunner
            .run(&Invocation::new("cat").stdin_file(&input))
            .unwrap();
        assert_eq!(out.stdout, "from file");
    }

    #[test]
    fn test_system_runner_missing_program() {
        let err = SystemProcessRunner
            .run(&Invocation::new("enginesmith-definitely-missing-tool"))
            .unwrap_err();
        assert!(matches!(err, BuildError::CommandSpawnError { .. }));
    }
}
