//! Operator input.
//!
//! Steps ask questions through a [`PromptSource`]; the default reads a line
//! from the terminal after echoing a styled question.

use std::{
    cell::RefCell,
    collections::VecDeque,
    io::{self, BufRead, Write},
    rc::Rc,
};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::errors::{AutoTestError, Result};

/// Blocking source of operator answers.
pub trait PromptSource {
    /// Shows `message` and returns the answer without its trailing newline.
    fn prompt(&self, message: &str) -> Result<String>;
}

impl<T: PromptSource + ?Sized> PromptSource for Rc<T> {
    fn prompt(&self, message: &str) -> Result<String> {
        (**self).prompt(message)
    }
}

impl<T: PromptSource + ?Sized> PromptSource for Box<T> {
    fn prompt(&self, message: &str) -> Result<String> {
        (**self).prompt(message)
    }
}

/// Reads answers from stdin.
pub struct TerminalPrompt {
    color: ColorChoice,
}

impl TerminalPrompt {
    pub fn new(color: ColorChoice) -> Self {
        Self { color }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new(crate::render::auto_color())
    }
}

impl PromptSource for TerminalPrompt {
    fn prompt(&self, message: &str) -> Result<String> {
        let mut stdout = StandardStream::stdout(self.color);
        stdout
            .set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))
            .map_err(AutoTestError::Prompt)?;
        write!(stdout, "{}", message).map_err(AutoTestError::Prompt)?;
        stdout.reset().map_err(AutoTestError::Prompt)?;
        write!(stdout, ": ").map_err(AutoTestError::Prompt)?;
        stdout.flush().map_err(AutoTestError::Prompt)?;

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(AutoTestError::Prompt)?;
        Ok(trim_line_ending(&line).to_string())
    }
}

/// Answers from a queue, for tests and unattended runs.
///
/// An exhausted queue answers with an empty string, the terminal default.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: RefCell<VecDeque<String>>,
    asked: RefCell<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: RefCell::new(answers.into_iter().map(Into::into).collect()),
            asked: RefCell::new(Vec::new()),
        }
    }

    pub fn push(&self, answer: impl Into<String>) {
        self.answers.borrow_mut().push_back(answer.into());
    }

    /// Every question asked so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }
}

impl PromptSource for ScriptedPrompt {
    fn prompt(&self, message: &str) -> Result<String> {
        self.asked.borrow_mut().push(message.to_string());
        let answer = self.answers.borrow_mut().pop_front().unwrap_or_default();
        Ok(trim_line_ending(&answer).to_string())
    }
}

fn trim_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_prompt_answers_in_order_then_defaults_to_empty() {
        let prompt = ScriptedPrompt::new(["first\r\n", "second"]);
        assert_eq!(prompt.prompt("a").unwrap(), "first");
        assert_eq!(prompt.prompt("b").unwrap(), "second");
        assert_eq!(prompt.prompt("c").unwrap(), "");
        assert_eq!(prompt.asked(), vec!["a", "b", "c"]);
    }

    #[test]
    fn only_line_endings_are_trimmed() {
        assert_eq!(trim_line_ending("  SN 42 \n"), "  SN 42 ");
    }
}
