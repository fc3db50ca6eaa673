use std::fmt;

use crate::error::RuleError;

/// A single `column match replacement` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub column: String,
    pub match_value: String,
    pub new_value: String,
}

impl Rule {
    pub fn new(
        column: impl Into<String>,
        match_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Rule {
            column: column.into(),
            match_value: match_value.into(),
            new_value: new_value.into(),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        value == self.match_value
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: '{}' -> '{}'",
            self.column, self.match_value, self.new_value
        )
    }
}

/// Ordered, immutable collection of rules shared by every job in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Splits an operator line on whitespace and parses the resulting tokens.
    pub fn parse_line(line: &str) -> Result<Self, RuleError> {
        let tokens = line.split_whitespace().collect::<Vec<_>>();
        parse_rules(&tokens)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// Parses a flat `column match replacement [column match replacement ...]`
/// token list, preserving input order.
pub fn parse_rules<S: AsRef<str>>(tokens: &[S]) -> Result<RuleSet, RuleError> {
    if tokens.is_empty() {
        return Err(RuleError::Empty);
    }
    if tokens.len() % 3 != 0 {
        return Err(RuleError::Malformed {
            count: tokens.len(),
        });
    }
    let rules = tokens
        .chunks_exact(3)
        .map(|triple| Rule::new(triple[0].as_ref(), triple[1].as_ref(), triple[2].as_ref()))
        .collect();
    Ok(RuleSet { rules })
}
