//! Human confirmation capability.
//!
//! Consulted after relationship warnings; answers whether the flagged change is
//! operator-approved. The gate never aborts a run, it only steers how a warning
//! is recorded. Non-interactive runs get the deny-everything gate, which is also
//! what tests inject.
use std::io::{self, BufRead, Write};

pub trait ConfirmGate {
    /// Ask the operator to confirm; blocks until answered when interactive.
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Prompts on stderr and reads one line from stdin; `y`/`yes` confirms.
pub struct StdinGate;

impl ConfirmGate for StdinGate {
    fn confirm(&mut self, prompt: &str) -> bool {
        eprint!("{prompt} [y/N] ");
        let _ = io::stderr().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Always declines without prompting.
pub struct DenyGate;

impl ConfirmGate for DenyGate {
    fn confirm(&mut self, _prompt: &str) -> bool {
        false
    }
}

pub fn for_mode(non_interactive: bool) -> Box<dyn ConfirmGate> {
    if non_interactive {
        Box::new(DenyGate)
    } else {
        Box::new(StdinGate)
    }
}

#[cfg(test)]
pub struct ScriptedGate {
    pub answers: Vec<bool>,
    pub prompts: Vec<String>,
}

#[cfg(test)]
impl ScriptedGate {
    pub fn new(answers: Vec<bool>) -> Self {
        Self { answers, prompts: Vec::new() }
    }
}

#[cfg(test)]
impl ConfirmGate for ScriptedGate {
    fn confirm(&mut self, prompt: &str) -> bool {
        self.prompts.push(prompt.to_string());
        if self.answers.is_empty() {
            false
        } else {
            self.answers.remove(0)
        }
    }
}
