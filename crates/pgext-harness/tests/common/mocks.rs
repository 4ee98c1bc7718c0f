//! Mock implementations for testing
//!
//! `RecordingRunner` stands in for `SystemRunner`: it records every
//! invocation and answers from pre-configured responses, without spawning
//! anything.

#![allow(dead_code)]

use async_trait::async_trait;
use pgext_core::{Error, Result};
use pgext_harness::{CapturedOutput, CommandRunner, CommandSpec, TerminalLog};
use std::sync::Mutex;

/// A canned response for matching invocations
#[derive(Clone, Debug)]
struct MockRule {
    program: String,
    arg_contains: Option<String>,
    output: Option<CapturedOutput>,
}

impl MockRule {
    fn matches(&self, spec: &CommandSpec) -> bool {
        spec.program_name() == self.program
            && self
                .arg_contains
                .as_deref()
                .is_none_or(|needle| spec.args.iter().any(|arg| arg.contains(needle)))
    }
}

/// Command runner that records invocations and returns mocked results
#[derive(Default)]
pub struct RecordingRunner {
    rules: Mutex<Vec<MockRule>>,
    invocations: Mutex<Vec<CommandSpec>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call to `program` with `code` and `stdout`
    pub fn mock_program(&self, program: &str, code: i32, stdout: &str) {
        self.push_rule(program, None, Some(output(code, stdout)));
    }

    /// Answer calls to `program` having an argument containing `needle`
    pub fn mock_call(&self, program: &str, needle: &str, code: i32, stdout: &str) {
        self.push_rule(program, Some(needle), Some(output(code, stdout)));
    }

    /// Make `program` fail to spawn
    pub fn mock_missing(&self, program: &str) {
        self.push_rule(program, None, None);
    }

    fn push_rule(&self, program: &str, needle: Option<&str>, output: Option<CapturedOutput>) {
        // Most recent rule wins
        self.rules.lock().unwrap().insert(
            0,
            MockRule {
                program: program.to_string(),
                arg_contains: needle.map(str::to_string),
                output,
            },
        );
    }

    fn respond(&self, spec: &CommandSpec) -> Result<CapturedOutput> {
        self.invocations.lock().unwrap().push(spec.clone());
        let rules = self.rules.lock().unwrap();
        match rules.iter().find(|rule| rule.matches(spec)) {
            Some(MockRule {
                output: Some(output),
                ..
            }) => Ok(output.clone()),
            Some(MockRule { output: None, .. }) => Err(Error::Spawn {
                program: spec.program.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
            }),
            None => Ok(CapturedOutput::default()),
        }
    }

    /// All recorded invocations, in order
    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations.lock().unwrap().clone()
    }

    /// Invocations of one program
    pub fn calls_to(&self, program: &str) -> Vec<CommandSpec> {
        self.invocations()
            .into_iter()
            .filter(|spec| spec.program_name() == program)
            .collect()
    }

    pub fn invocation_count(&self, program: &str) -> usize {
        self.calls_to(program).len()
    }

    pub fn was_invoked(&self, program: &str) -> bool {
        self.invocation_count(program) > 0
    }

    /// Program names in invocation order
    pub fn program_sequence(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .map(CommandSpec::program_name)
            .collect()
    }

    pub fn clear_invocations(&self) {
        self.invocations.lock().unwrap().clear();
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run_logged(&self, spec: &CommandSpec, log: &TerminalLog) -> Result<i32> {
        log.append(&format!("$ {}\n", spec.display()))?;
        let output = self.respond(spec)?;
        log.append(&output.stdout)?;
        Ok(output.code)
    }

    async fn run_captured(&self, spec: &CommandSpec) -> Result<CapturedOutput> {
        self.respond(spec)
    }
}

fn output(code: i32, stdout: &str) -> CapturedOutput {
    CapturedOutput {
        code,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}
