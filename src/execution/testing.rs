//! Test doubles for the command runner and prompts.

use std::cell::RefCell;
use std::collections::VecDeque;

use super::command::{CommandRunner, Invocation};
use crate::error::{ProvisionError, Result};
use crate::prompt::Prompter;

type Hook = Box<dyn Fn(&Invocation)>;

/// Records every invocation instead of running it.
#[derive(Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<Invocation>>,
    outputs: Vec<(String, String)>,
    hooks: Vec<(String, Hook)>,
    failing: Vec<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output returned by `capture` for commands containing `needle`.
    pub fn with_output(mut self, needle: &str, stdout: &str) -> Self {
        self.outputs.push((needle.to_string(), stdout.to_string()));
        self
    }

    /// Side effect run for commands containing `needle`.
    pub fn on(mut self, needle: &str, hook: impl Fn(&Invocation) + 'static) -> Self {
        self.hooks.push((needle.to_string(), Box::new(hook)));
        self
    }

    /// Makes commands containing `needle` exit with status 1.
    pub fn failing(mut self, needle: &str) -> Self {
        self.failing.push(needle.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Rendered command lines, in call order.
    pub fn lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.to_string()).collect()
    }

    /// Number of calls whose rendered line contains `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.lines().iter().filter(|l| l.contains(needle)).count()
    }

    fn record(&self, invocation: &Invocation) -> Result<String> {
        let line = invocation.to_string();
        self.calls.borrow_mut().push(invocation.clone());

        for (needle, hook) in &self.hooks {
            if line.contains(needle.as_str()) {
                hook(invocation);
            }
        }

        if self.failing.iter().any(|n| line.contains(n.as_str())) {
            return Err(ProvisionError::CommandFailed {
                program: invocation.program.clone(),
                code: Some(1),
            });
        }

        Ok(self
            .outputs
            .iter()
            .find(|(needle, _)| line.contains(needle.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default())
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        self.record(invocation).map(|_| ())
    }

    fn capture(&self, invocation: &Invocation) -> Result<String> {
        self.record(invocation)
    }
}

/// Replays scripted answers and remembers the questions.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<Result<bool>>,
    pub questions: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().map(|a| Ok(*a)).collect(),
            questions: Vec::new(),
        }
    }

    /// Queues an unrecognized answer.
    pub fn then_invalid(mut self, answer: &str) -> Self {
        self.answers
            .push_back(Err(ProvisionError::InvalidAnswer(answer.to_string())));
        self
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        self.questions.push(question.to_string());
        self.answers
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected prompt: {question}"))
    }
}
