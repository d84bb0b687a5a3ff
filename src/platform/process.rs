// Lectern - platform/process.rs
//
// Subprocess seam. Every OS helper the platform layer invokes (xset,
// xdg-screensaver, caffeinate, reg) goes through `CommandRunner`, so tests can
// substitute a recording runner and assert on the exact command sequence.

use std::fmt;
use std::io;
use std::process::{Child, Command, Stdio};

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or `None` when the process was killed by a signal.
    pub status: Option<i32>,
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

impl CommandOutput {
    /// `true` when the command exited with status 0.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// A long-running helper process (e.g. a display-sleep inhibitor).
pub trait BackgroundProcess: Send + fmt::Debug {
    /// `true` while the process has not exited.
    fn is_running(&mut self) -> bool;

    /// Kill the process and reap it. Errors are logged, not returned: the
    /// caller has nothing better to do than forget the handle.
    fn terminate(&mut self);
}

/// Runs OS helper commands.
pub trait CommandRunner: Send + Sync + fmt::Debug {
    /// Run `program` with `args` to completion and capture its output.
    fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput>;

    /// Start `program` with `args` detached from our stdio and return a
    /// handle to it.
    fn spawn(&self, program: &str, args: &[&str]) -> io::Result<Box<dyn BackgroundProcess>>;
}

/// Render a command line for log messages.
pub fn display_command(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

// =============================================================================
// Real implementation
// =============================================================================

/// `CommandRunner` backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;
        tracing::trace!(
            command = %display_command(program, args),
            status = ?output.status.code(),
            "Helper command finished"
        );
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn spawn(&self, program: &str, args: &[&str]) -> io::Result<Box<dyn BackgroundProcess>> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        tracing::debug!(
            command = %display_command(program, args),
            pid = child.id(),
            "Helper process started"
        );
        Ok(Box::new(ChildProcess { child }))
    }
}

/// `BackgroundProcess` wrapping a real child.
#[derive(Debug)]
struct ChildProcess {
    child: Child,
}

impl BackgroundProcess for ChildProcess {
    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn terminate(&mut self) {
        let pid = self.child.id();
        if let Err(e) = self.child.kill() {
            // InvalidInput means the child already exited.
            if e.kind() != io::ErrorKind::InvalidInput {
                tracing::warn!(pid, error = %e, "Failed to kill helper process");
            }
        }
        if let Err(e) = self.child.wait() {
            tracing::warn!(pid, error = %e, "Failed to reap helper process");
        }
    }
}

// =============================================================================
// Recording runner for tests
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command_joins_args() {
        assert_eq!(display_command("xset", &["-dpms"]), "xset -dpms");
        assert_eq!(display_command("xset", &[]), "xset");
    }

    #[test]
    fn test_output_success_requires_zero_status() {
        let ok = CommandOutput {
            status: Some(0),
            ..CommandOutput::default()
        };
        let failed = CommandOutput {
            status: Some(1),
            ..CommandOutput::default()
        };
        let signalled = CommandOutput::default();
        assert!(ok.success());
        assert!(!failed.success());
        assert!(!signalled.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_stdout() {
        let out = SystemRunner.run("echo", &["hello"]).expect("echo runs");
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_system_runner_missing_program_is_io_error() {
        let result = SystemRunner.run("lectern-definitely-not-a-real-program", &[]);
        assert!(result.is_err());
    }
}
