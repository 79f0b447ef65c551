// src/learning/oracle.rs
use std::collections::VecDeque;
use std::io::{BufRead, Write};

use crate::error::Result;
use crate::models::{Label, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleLabel {
    Match,
    Distinct,
    /// Skip this pair. It is not offered again in the same session.
    Unsure,
    /// End the labeling session.
    Finished,
}

impl OracleLabel {
    pub fn as_label(self) -> Option<Label> {
        match self {
            OracleLabel::Match => Some(Label::Match),
            OracleLabel::Distinct => Some(Label::Distinct),
            OracleLabel::Unsure | OracleLabel::Finished => None,
        }
    }
}

/// A synchronous source of ground truth. The learner blocks on every call.
pub trait LabelOracle {
    fn present_for_label(&mut self, domain: &Record, range: &Record) -> Result<OracleLabel>;
}

/// Prompts on a terminal (or any reader/writer pair) with `y`/`n`/`u`/`f`.
/// End of input counts as finished.
pub struct ConsoleOracle<R: BufRead, W: Write> {
    input: R,
    output: W,
    fields: Vec<String>,
    matches: usize,
    distinct: usize,
}

impl<R: BufRead, W: Write> ConsoleOracle<R, W> {
    pub fn new(input: R, output: W, fields: Vec<String>) -> Self {
        Self {
            input,
            output,
            fields,
            matches: 0,
            distinct: 0,
        }
    }

    fn show_pair(&mut self, domain: &Record, range: &Record) -> Result<()> {
        writeln!(self.output)?;
        for field in &self.fields {
            writeln!(
                self.output,
                "{} : {}",
                field,
                domain.value(field).unwrap_or("[missing]")
            )?;
        }
        writeln!(self.output)?;
        for field in &self.fields {
            writeln!(
                self.output,
                "{} : {}",
                field,
                range.value(field).unwrap_or("[missing]")
            )?;
        }
        writeln!(
            self.output,
            "\n{}/10 positive, {}/10 negative",
            self.matches, self.distinct
        )?;
        Ok(())
    }
}

impl<R: BufRead, W: Write> LabelOracle for ConsoleOracle<R, W> {
    fn present_for_label(&mut self, domain: &Record, range: &Record) -> Result<OracleLabel> {
        self.show_pair(domain, range)?;
        let mut input = String::new();
        loop {
            write!(
                self.output,
                "Do these records refer to the same thing? (y)es / (n)o / (u)nsure / (f)inished: "
            )?;
            self.output.flush()?;
            input.clear();
            if self.input.read_line(&mut input)? == 0 {
                return Ok(OracleLabel::Finished);
            }
            match input.trim().to_lowercase().as_str() {
                "y" => {
                    self.matches += 1;
                    return Ok(OracleLabel::Match);
                }
                "n" => {
                    self.distinct += 1;
                    return Ok(OracleLabel::Distinct);
                }
                "u" => return Ok(OracleLabel::Unsure),
                "f" => return Ok(OracleLabel::Finished),
                _ => writeln!(self.output, "Invalid input. Please enter 'y', 'n', 'u' or 'f'.")?,
            }
        }
    }
}

/// Replays a fixed answer list, then reports finished. Used by tests and
/// batch re-labeling.
pub struct ScriptedOracle {
    answers: VecDeque<OracleLabel>,
    pub presented: Vec<(String, String)>,
}

impl ScriptedOracle {
    pub fn new(answers: impl IntoIterator<Item = OracleLabel>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            presented: Vec::new(),
        }
    }
}

impl LabelOracle for ScriptedOracle {
    fn present_for_label(&mut self, domain: &Record, range: &Record) -> Result<OracleLabel> {
        self.presented.push((domain.id.clone(), range.id.clone()));
        Ok(self.answers.pop_front().unwrap_or(OracleLabel::Finished))
    }
}

/// Answers from a ground-truth function over the two records.
pub struct FnOracle<F: FnMut(&Record, &Record) -> OracleLabel> {
    judge: F,
}

impl<F: FnMut(&Record, &Record) -> OracleLabel> FnOracle<F> {
    pub fn new(judge: F) -> Self {
        Self { judge }
    }
}

impl<F: FnMut(&Record, &Record) -> OracleLabel> LabelOracle for FnOracle<F> {
    fn present_for_label(&mut self, domain: &Record, range: &Record) -> Result<OracleLabel> {
        Ok((self.judge)(domain, range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pair() -> (Record, Record) {
        (
            Record::new("d1").with_field("name", Some("acme corp")),
            Record::new("r1").with_field("name", Some("acme corporation")),
        )
    }

    #[test]
    fn test_console_oracle_reprompts_on_invalid_input() {
        let (d, r) = pair();
        let mut out = Vec::new();
        let mut oracle =
            ConsoleOracle::new(Cursor::new("maybe\ny\n"), &mut out, vec!["name".to_string()]);
        assert_eq!(oracle.present_for_label(&d, &r).unwrap(), OracleLabel::Match);
        drop(oracle);
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("name : acme corp"));
        assert!(shown.contains("Invalid input"));
    }

    #[test]
    fn test_console_oracle_answers_and_eof() {
        let (d, r) = pair();
        let mut oracle = ConsoleOracle::new(Cursor::new("N\nu\nf\n"), Vec::new(), vec![]);
        assert_eq!(oracle.present_for_label(&d, &r).unwrap(), OracleLabel::Distinct);
        assert_eq!(oracle.present_for_label(&d, &r).unwrap(), OracleLabel::Unsure);
        assert_eq!(oracle.present_for_label(&d, &r).unwrap(), OracleLabel::Finished);
        assert_eq!(oracle.present_for_label(&d, &r).unwrap(), OracleLabel::Finished);
    }

    #[test]
    fn test_scripted_oracle_runs_out() {
        let (d, r) = pair();
        let mut oracle = ScriptedOracle::new(vec![OracleLabel::Match]);
        assert_eq!(oracle.present_for_label(&d, &r).unwrap(), OracleLabel::Match);
        assert_eq!(oracle.present_for_label(&d, &r).unwrap(), OracleLabel::Finished);
        assert_eq!(oracle.presented.len(), 2);
        assert_eq!(OracleLabel::Unsure.as_label(), None);
    }
}
