use std::io::{BufRead, Write};

use anyhow::{Result, bail};

use crate::{config::Messages, error::RuleError, rules::RuleSet};

/// Asks for a rule line until one parses. Closed input aborts.
pub fn prompt_rules<R, W>(input: &mut R, out: &mut W, messages: &Messages) -> Result<RuleSet>
where
    R: BufRead,
    W: Write,
{
    let mut line = String::new();
    loop {
        writeln!(out, "{}", messages.rules_prompt())?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            bail!("Input closed before any rules were entered");
        }
        match RuleSet::parse_line(&line) {
            Ok(rules) => return Ok(rules),
            Err(RuleError::Empty) => writeln!(out, "{}", messages.didnt_enter())?,
            Err(RuleError::Malformed { .. }) => writeln!(out, "{}", messages.entered_not_three())?,
        }
    }
}
