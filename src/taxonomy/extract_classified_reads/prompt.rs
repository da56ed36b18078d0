use std::io::{BufRead, Write};

use snafu::ResultExt;

use crate::errors;

/// Asks questions on `output` and reads the answers line by line from `input`.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Prompt { input, output }
    }

    /// Ask a question. A blank answer (or end of input) yields the default,
    /// or an empty string if there is none.
    pub fn ask(&mut self, question: &str, default: Option<&str>) -> errors::Result<String> {
        let written = match default {
            Some(default) => write!(self.output, "{} [{}]: ", question, default),
            None => write!(self.output, "{}: ", question),
        };
        written.context(errors::PromptError)?;
        self.output.flush().context(errors::PromptError)?;

        let mut answer = String::new();
        self.input
            .read_line(&mut answer)
            .context(errors::PromptError)?;
        let answer = answer.trim();
        Ok(if answer.is_empty() {
            default.unwrap_or_default().to_owned()
        } else {
            answer.to_owned()
        })
    }

    /// Ask a yes/no question; only "yes" counts as yes.
    pub fn confirm(&mut self, question: &str) -> errors::Result<bool> {
        let answer = self.ask(&format!("{} (yes/no)", question), None)?;
        Ok(answer.eq_ignore_ascii_case("yes"))
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }
}
