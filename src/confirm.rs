//! Confirmation gate before dispatch.
use std::io::{self, BufRead, Write};

pub const PROCEED_QUESTION: &str = "Would you like to proceed with the integration? (yes/no) ";

/// Decides whether a validated batch may be dispatched.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> io::Result<bool>;
}

/// Approves every batch (`--yes`).
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _question: &str) -> io::Result<bool> {
        Ok(true)
    }
}

/// Asks on `output` and reads answers from `input` until one is `yes` or `no`
/// (any case). End of input counts as `no`.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl Prompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Confirm for Prompt<R, W> {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let mut line = String::new();
        loop {
            write!(self.output, "{question}")?;
            self.output.flush()?;
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(false);
            }
            let answer = line.trim();
            if answer.eq_ignore_ascii_case("yes") {
                return Ok(true);
            }
            if answer.eq_ignore_ascii_case("no") {
                return Ok(false);
            }
            writeln!(self.output, "Please, type yes or no")?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ask(input: &str) -> (bool, String) {
        let mut output = Vec::new();
        let answer = Prompt::new(input.as_bytes(), &mut output)
            .confirm(PROCEED_QUESTION)
            .expect("confirm");
        (answer, String::from_utf8(output).expect("utf8 output"))
    }

    #[test]
    fn accepts_yes_in_any_case() {
        assert!(ask("YES\n").0);
        assert!(ask("yes\n").0);
    }

    #[test]
    fn no_declines() {
        assert!(!ask("No\n").0);
    }

    #[test]
    fn reprompts_until_a_valid_answer() {
        let (answer, transcript) = ask("maybe\n\nyes\n");
        assert!(answer);
        assert_eq!(transcript.matches("Please, type yes or no").count(), 2);
        assert_eq!(transcript.matches(PROCEED_QUESTION).count(), 3);
    }

    #[test]
    fn end_of_input_declines() {
        assert!(!ask("maybe\n").0);
    }

    #[test]
    fn assume_yes_never_reads() {
        assert!(AssumeYes.confirm(PROCEED_QUESTION).expect("confirm"));
    }
}
