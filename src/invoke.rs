//! Tool invocation boundary
//!
//! Every resource plug-in wraps exactly one external command-line tool and
//! reaches it through [`ToolRunner`], so probes and appliers can be exercised
//! against a scripted fake in tests. Non-zero exit and I/O failure surface
//! uniformly through [`ToolOutput`] / [`ToolRunner::capture`].

use anyhow::{Context, Result};
use std::fmt;
use std::process::Command;

/// Captured result of one tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl ToolOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
        }
    }

    pub fn err(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
        }
    }
}

/// Uniform synchronous interface to external tools
pub trait ToolRunner: Send + Sync + fmt::Debug {
    /// Run `argv[0]` with the remaining arguments, capturing output
    ///
    /// `Err` means the tool could not be spawned at all; a tool that ran and
    /// exited non-zero comes back as `success: false`.
    fn invoke(&self, argv: &[&str]) -> Result<ToolOutput>;

    /// Run and return trimmed stdout, treating non-zero exit as an error
    fn capture(&self, argv: &[&str]) -> Result<String> {
        let output = self.invoke(argv)?;
        if !output.success {
            anyhow::bail!(
                "{} failed: {}",
                argv.first().copied().unwrap_or("command"),
                output.stderr.trim()
            );
        }
        Ok(output.stdout.trim().to_string())
    }
}

/// Real runner over std::process::Command
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn invoke(&self, argv: &[&str]) -> Result<ToolOutput> {
        let (cmd, args) = argv
            .split_first()
            .context("empty argv for tool invocation")?;

        log::debug!("invoking: {}", argv.join(" "));

        let output = Command::new(cmd)
            .args(args)
            .output()
            .with_context(|| format!("Failed to execute: {}", argv.join(" ")))?;

        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }
}

#[cfg(test)]
pub mod fake {
    //! Scripted runner for plug-in tests

    use super::{ToolOutput, ToolRunner};
    use anyhow::Result;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Maps a joined argv string to a canned output, recording calls
    #[derive(Debug, Default)]
    pub struct FakeRunner {
        responses: HashMap<String, ToolOutput>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(mut self, argv: &str, output: ToolOutput) -> Self {
            self.responses.insert(argv.to_string(), output);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl ToolRunner for FakeRunner {
        fn invoke(&self, argv: &[&str]) -> Result<ToolOutput> {
            let key = argv.join(" ");
            self.calls.lock().unwrap().push(key.clone());
            match self.responses.get(&key) {
                Some(output) => Ok(output.clone()),
                None => anyhow::bail!("unscripted invocation: {key}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeRunner;
    use super::*;

    #[test]
    fn capture_returns_trimmed_stdout() {
        let runner = FakeRunner::new().on("echo hi", ToolOutput::ok("hi\n"));
        assert_eq!(runner.capture(&["echo", "hi"]).unwrap(), "hi");
    }

    #[test]
    fn capture_bails_with_stderr_on_failure() {
        let runner = FakeRunner::new().on("broken", ToolOutput::err("no such setting\n"));
        let err = runner.capture(&["broken"]).unwrap_err();
        assert!(err.to_string().contains("no such setting"));
    }

    #[test]
    fn fake_runner_records_calls() {
        let runner = FakeRunner::new().on("a b", ToolOutput::ok(""));
        runner.invoke(&["a", "b"]).unwrap();
        assert_eq!(runner.call_count(), 1);
    }
}
