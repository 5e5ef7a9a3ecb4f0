//! Interactive Confirmation
//!
//! Existing accounts and installations are never silently reused: the
//! operator is asked first. Only `y` and `n` are accepted; anything else
//! ends the run.

use dialoguer::Input;
use log::info;

use crate::error::{ProvisionError, Result};

/// Asks yes/no questions.
pub trait Prompter {
    fn confirm(&mut self, question: &str) -> Result<bool>;
}

/// Reads answers from the terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        let answer: String = Input::new()
            .with_prompt(format!("{} [y/n]", question))
            .allow_empty(true)
            .interact_text()?;
        parse_answer(&answer)
    }
}

/// Answers yes to everything (`--yes`).
#[derive(Debug, Default)]
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        info!("{} [y/n] y (--yes)", question);
        Ok(true)
    }
}

/// Interprets a confirmation answer.
pub fn parse_answer(answer: &str) -> Result<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" => Ok(true),
        "n" => Ok(false),
        _ => Err(ProvisionError::InvalidAnswer(answer.trim().to_string())),
    }
}
