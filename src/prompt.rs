//! Interactive questions asked while preparing a training run.
//!
//! Everything that needs an answer from the user goes through [`Prompter`], so
//! the CLI can talk to a terminal while tests and unattended runs supply answers
//! up front.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Context, Result};

use crate::error::PromptError;

pub trait Prompter {
    /// Ask the user to pick one of `options`, returning the chosen option.
    fn select(&mut self, message: &str, options: &[String]) -> Result<String>;
    fn confirm(&mut self, message: &str) -> Result<bool>;
    /// Free-text answer; an empty reply yields `default`.
    fn input(&mut self, message: &str, default: &str) -> Result<String>;
}

pub struct TerminalPrompter<R, W> {
    reader: R,
    writer: W,
}

impl TerminalPrompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.writer, "{question} ").context("write prompt")?;
        self.writer.flush().context("flush prompt")?;
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).context("read answer")?;
        if read == 0 {
            return Err(anyhow!("input closed while waiting for: {question}"));
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn select(&mut self, message: &str, options: &[String]) -> Result<String> {
        if options.is_empty() {
            return Err(anyhow!("nothing to choose from for: {message}"));
        }
        writeln!(self.writer, "{message}").context("write prompt")?;
        for (index, option) in options.iter().enumerate() {
            writeln!(self.writer, "  {}) {option}", index + 1).context("write prompt")?;
        }
        loop {
            let answer = self.ask(">")?;
            if let Some(choice) = match_choice(&answer, options) {
                return Ok(choice);
            }
            writeln!(self.writer, "Please enter a number between 1 and {}.", options.len())
                .context("write prompt")?;
        }
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        loop {
            let answer = self.ask(&format!("{message} [y/N]"))?;
            match answer.to_ascii_lowercase().as_str() {
                "" | "n" | "no" => return Ok(false),
                "y" | "yes" => return Ok(true),
                _ => writeln!(self.writer, "Please answer y or n.").context("write prompt")?,
            }
        }
    }

    fn input(&mut self, message: &str, default: &str) -> Result<String> {
        let answer = self.ask(&format!("{message} [{default}]"))?;
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer)
        }
    }
}

/// Accepts either a 1-based index or the option text itself.
fn match_choice(answer: &str, options: &[String]) -> Option<String> {
    if let Ok(index) = answer.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|index| options.get(index))
            .cloned();
    }
    options.iter().find(|option| option.as_str() == answer).cloned()
}

/// Fails on every question. Used for unattended runs where the plugin
/// configuration must already answer everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn select(&mut self, message: &str, _options: &[String]) -> Result<String> {
        Err(PromptError::InputRequired(message.to_string()).into())
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        Err(PromptError::InputRequired(message.to_string()).into())
    }

    fn input(&mut self, message: &str, _default: &str) -> Result<String> {
        Err(PromptError::InputRequired(message.to_string()).into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Choice(String),
    Confirm(bool),
    Text(String),
}

/// Replays queued answers in order and records every question it was asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<Answer>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, message: &str) -> Result<Answer> {
        self.asked.push(message.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| PromptError::Exhausted(message.to_string()).into())
    }
}

impl Prompter for ScriptedPrompter {
    fn select(&mut self, message: &str, options: &[String]) -> Result<String> {
        match self.next(message)? {
            Answer::Choice(choice) if options.contains(&choice) => Ok(choice),
            Answer::Choice(choice) => Err(PromptError::InvalidChoice { answer: choice }.into()),
            other => Err(anyhow!("expected a choice for '{message}', got {other:?}")),
        }
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        match self.next(message)? {
            Answer::Confirm(value) => Ok(value),
            other => Err(anyhow!("expected a confirmation for '{message}', got {other:?}")),
        }
    }

    fn input(&mut self, message: &str, default: &str) -> Result<String> {
        match self.next(message)? {
            Answer::Text(text) if text.is_empty() => Ok(default.to_string()),
            Answer::Text(text) => Ok(text),
            other => Err(anyhow!("expected text for '{message}', got {other:?}")),
        }
    }
}
