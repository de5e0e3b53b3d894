use rustyline::error::ReadlineError;
use rustyline::Editor;

mod command;
mod error;
mod helper;

pub use command::{dispatch, Outcome};
pub use error::ReplError;
pub use helper::ReplHelper;

use olsrv2_core::OlsrCore;

pub struct Repl<'a> {
    prompt: &'a str,
    core: OlsrCore,
}

impl<'a> Repl<'a> {
    pub fn new(prompt: &'a str, core: OlsrCore) -> Self {
        Self { prompt, core }
    }

    pub fn run(&mut self) -> Result<(), ReplError> {
        let mut editor = Editor::<ReplHelper>::new()?;
        editor.set_helper(Some(ReplHelper::new()));

        loop {
            let readline = editor.readline(self.prompt);
            match readline {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    editor.add_history_entry(line.as_str());
                    match dispatch(&mut self.core, line.trim()) {
                        Outcome::Printed(text) => print!("{text}"),
                        Outcome::Quit => break,
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("received CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("received CTRL-D");
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }
}
