//! Interactive disambiguation.
//!
//! When a control-plane query returns several candidates and no override is
//! configured, the user picks one. The capability is a trait so the
//! resolution logic can be driven by a scripted implementation in tests.

use std::io::{self, BufRead, Write};

use crate::error::{Error, Result};

/// A candidate shown to the user: (display name, id).
pub type Candidate = (String, String);

pub trait Chooser {
    /// Pick one index out of `candidates`. Only called with two or more.
    fn choose(&mut self, label: &str, candidates: &[Candidate]) -> Result<usize>;

    /// Ask a yes/no question.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Resolve a candidate list to exactly one element.
///
/// Zero candidates is fatal, one is selected silently, more than one defers
/// to the chooser.
pub fn select_one<'a, T>(
    chooser: &mut dyn Chooser,
    label: &str,
    items: &'a [T],
    display: impl Fn(&T) -> Candidate,
) -> Result<&'a T> {
    match items.len() {
        0 => Err(Error::NotFound(format!("no {label} available"))),
        1 => Ok(&items[0]),
        _ => {
            let candidates: Vec<Candidate> = items.iter().map(display).collect();
            let index = chooser.choose(label, &candidates)?;
            items.get(index).ok_or_else(|| {
                Error::MalformedInput(format!(
                    "selection {index} out of range for {label} (0..{})",
                    items.len() - 1
                ))
            })
        }
    }
}

/// Prompts on stdout, reads answers from stdin.
pub struct TerminalChooser;

impl Chooser for TerminalChooser {
    fn choose(&mut self, label: &str, candidates: &[Candidate]) -> Result<usize> {
        println!("Select a {label}:");
        for (i, (name, id)) in candidates.iter().enumerate() {
            println!("\t{i} -> {name} ({id})");
        }
        print!("\t=> ");
        io::stdout().flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        let index: usize = line
            .trim()
            .parse()
            .map_err(|_| Error::MalformedInput(format!("not a selection index: {:?}", line.trim())))?;
        if index >= candidates.len() {
            return Err(Error::MalformedInput(format!(
                "selection {index} out of range (0..{})",
                candidates.len() - 1
            )));
        }
        Ok(index)
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(matches!(line.trim(), "y" | "Y" | "yes"))
    }
}

/// Chooser that replays a fixed script of answers. Exposed for tests across
/// the crate.
pub struct ScriptedChooser {
    choices: Vec<usize>,
    confirmations: Vec<bool>,
}

impl ScriptedChooser {
    pub fn new(choices: Vec<usize>, confirmations: Vec<bool>) -> Self {
        Self {
            choices,
            confirmations,
        }
    }
}

impl Chooser for ScriptedChooser {
    fn choose(&mut self, label: &str, _candidates: &[Candidate]) -> Result<usize> {
        if self.choices.is_empty() {
            return Err(Error::MalformedInput(format!(
                "unexpected prompt for {label}"
            )));
        }
        Ok(self.choices.remove(0))
    }

    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        if self.confirmations.is_empty() {
            return Ok(false);
        }
        Ok(self.confirmations.remove(0))
    }
}
