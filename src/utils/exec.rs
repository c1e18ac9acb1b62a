//! External command execution.
//!
//! The island bundler is an external program. Commands run to completion,
//! their stderr is logged through `log!` after filtering known noise, and a
//! non-zero exit becomes an error carrying the diagnostics.

use crate::log;
use anyhow::{Context, Result};
use regex::Regex;
use std::{
    ffi::OsString,
    path::Path,
    process::{Command, Output},
    sync::OnceLock,
};

// ============================================================================
// Command Execution
// ============================================================================

/// Execute a command and capture its output.
///
/// # Errors
/// Returns error if the command cannot be started or exits non-zero. The
/// error message contains the filtered stderr.
pub fn exec(
    root: Option<&Path>,
    cmd: &[OsString],
    args: &[OsString],
    filter: &'static FilterRule,
) -> Result<Output> {
    let (name, mut command) = prepare(root, cmd, args)?;

    let output = command
        .output()
        .with_context(|| format!("Failed to execute `{name}`"))?;

    if !output.status.success() {
        anyhow::bail!(format_error(&name, &output, filter));
    }

    // On success only stderr is interesting (warnings).
    let stderr = String::from_utf8_lossy(&output.stderr);
    filter.log(&name, stderr.trim());

    Ok(output)
}

fn prepare(root: Option<&Path>, cmd: &[OsString], args: &[OsString]) -> Result<(String, Command)> {
    let (program, rest) = cmd.split_first().context("Empty command")?;
    let name = program.to_string_lossy().into_owned();

    let mut command = Command::new(program);
    command.args(rest).args(args);

    if let Some(dir) = root {
        command.current_dir(dir);
    }

    Ok((name, command))
}

// ============================================================================
// Output Filtering
// ============================================================================

fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());
    re.replace_all(s, "")
}

/// Lines to drop from command output before logging.
pub struct FilterRule {
    /// Matched against the start of each trimmed, color-stripped line.
    pub skip_prefixes: &'static [&'static str],
}

impl FilterRule {
    pub const fn new(skip_prefixes: &'static [&'static str]) -> Self {
        Self { skip_prefixes }
    }

    fn should_skip(&self, line: &str) -> bool {
        line.is_empty() || self.skip_prefixes.iter().any(|p| line.starts_with(p))
    }

    /// Lines of `output` that survive the filter.
    fn keep<'a>(&self, output: &'a str) -> Vec<&'a str> {
        output
            .lines()
            .filter(|line| !self.should_skip(strip_ansi(line).trim()))
            .collect()
    }

    fn log(&self, name: &str, output: &str) {
        let lines = self.keep(output);
        if !lines.is_empty() {
            log!(name; "{}", lines.join("\n"));
        }
    }
}

fn format_error(name: &str, output: &Output, filter: &'static FilterRule) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);

    let mut msg = format!("Command `{name}` failed with {}", output.status);
    for line in filter.keep(stderr.trim()) {
        msg.push('\n');
        msg.push_str(line);
    }

    let stdout = stdout.trim();
    if !stdout.is_empty() {
        msg.push_str("\nStdout:\n");
        msg.push_str(stdout);
    }
    msg
}

// ============================================================================
// Tests
// ============================================================================
