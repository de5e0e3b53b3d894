use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Result};
use rustyline_derive::Helper;

const COMMANDS: &[&str] = &["links", "neighbors", "topology", "routes", "tick", "help", "quit"];

/// Line-editing helper: tab-completes the fixed command set. No hinting,
/// highlighting, or multi-line validation beyond rustyline's defaults.
#[derive(Helper)]
pub struct ReplHelper;

impl ReplHelper {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReplHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter for ReplHelper {}

impl Validator for ReplHelper {}

impl Hinter for ReplHelper {
    type Hint = String;
}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Result<(usize, Vec<Pair>)> {
        let start = line[..pos].rfind(' ').map(|i| i + 1).unwrap_or(0);
        let word = &line[start..pos];

        let pairs = COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(word))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();

        Ok((start, pairs))
    }
}
