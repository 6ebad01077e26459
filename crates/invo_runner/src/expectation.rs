//! Expected outcome of a step.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::client::LogStream;
use crate::error::{RunnerError, RunnerResult};

/// User supplied expectation, every field optional.
///
/// This is the shape of the table passed to `withExpectation`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectationSpec {
    pub code: Option<i64>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl ExpectationSpec {
    pub fn code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn stdout(mut self, pattern: impl Into<String>) -> Self {
        self.stdout = Some(pattern.into());
        self
    }

    pub fn stderr(mut self, pattern: impl Into<String>) -> Self {
        self.stderr = Some(pattern.into());
        self
    }
}

/// Compiled expectation: exit code plus optional output patterns.
#[derive(Debug, Clone, Default)]
pub struct Expectation {
    code: i64,
    stdout: Option<Regex>,
    stderr: Option<Regex>,
}

/// Which part of an expectation a finished container violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    ExitCode { expected: i64, actual: i64 },
    Output { stream: LogStream, pattern: String },
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl Expectation {
    /// Compile a spec on top of the default expectation.
    pub fn from_spec(spec: &ExpectationSpec) -> RunnerResult<Self> {
        Self::default().apply(spec)
    }

    /// Copy of this expectation with the fields set in `spec` replaced.
    ///
    /// Patterns are compiled here so a bad one is reported while the build
    /// description is evaluated, not when the step runs.
    pub fn apply(&self, spec: &ExpectationSpec) -> RunnerResult<Self> {
        let mut next = self.clone();
        if let Some(code) = spec.code {
            next.code = code;
        }
        if let Some(pattern) = &spec.stdout {
            next.stdout = Some(compile(LogStream::Stdout, pattern)?);
        }
        if let Some(pattern) = &spec.stderr {
            next.stderr = Some(compile(LogStream::Stderr, pattern)?);
        }
        Ok(next)
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn stdout_pattern(&self) -> Option<&str> {
        self.stdout.as_ref().map(Regex::as_str)
    }

    pub fn stderr_pattern(&self) -> Option<&str> {
        self.stderr.as_ref().map(Regex::as_str)
    }

    /// Check exit code first, then stdout, then stderr.
    pub fn check(&self, code: i64, stdout: &str, stderr: &str) -> Verdict {
        if code != self.code {
            return Verdict::ExitCode {
                expected: self.code,
                actual: code,
            };
        }
        self.check_output(stdout, stderr)
    }

    /// Check only the output patterns.
    pub fn check_output(&self, stdout: &str, stderr: &str) -> Verdict {
        let streams = [
            (LogStream::Stdout, &self.stdout, stdout),
            (LogStream::Stderr, &self.stderr, stderr),
        ];
        for (stream, matcher, text) in streams {
            if let Some(regex) = matcher {
                if !regex.is_match(text) {
                    return Verdict::Output {
                        stream,
                        pattern: regex.as_str().to_string(),
                    };
                }
            }
        }
        Verdict::Pass
    }

    pub fn matches(&self, code: i64, stdout: &str, stderr: &str) -> bool {
        self.check(code, stdout, stderr).passed()
    }
}

fn compile(stream: LogStream, pattern: &str) -> RunnerResult<Regex> {
    Regex::new(pattern).map_err(|source| RunnerError::InvalidPattern {
        stream,
        pattern: pattern.to_string(),
        source,
    })
}
