use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password};

use crate::error::{Error, Result};

/// Asks the user for a single value.
pub trait Prompter: Send + Sync {
    fn ask(&self, message: &str, sensitive: bool) -> Result<String>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&self, message: &str, sensitive: bool) -> Result<String> {
        let theme = ColorfulTheme::default();
        let answer = if sensitive {
            Password::with_theme(&theme).with_prompt(message).interact()?
        } else {
            Input::<String>::with_theme(&theme)
                .with_prompt(message)
                .interact_text()?
        };
        Ok(answer)
    }
}

/// Replays canned answers in order and records what was asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Messages shown so far, oldest first.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&self, message: &str, _sensitive: bool) -> Result<String> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(message.to_string());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .ok_or_else(|| {
                let eof = io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("no scripted answer for prompt `{message}`"),
                );
                Error::Prompt(dialoguer::Error::IO(eof))
            })
    }
}
