use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_categories::UnicodeCategories;

static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w+").expect("word pattern is a valid regex"));

/// Rule deciding where one word ends and the next begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenRule {
    /// Maximal runs of letters, digits and underscores (`\w+`)
    #[default]
    WordBoundary,
    /// Anything that is not a letter separates words, so digits and
    /// apostrophes never appear in a token
    NonLetter,
}

/// Splits lines into lowercase word tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer {
    rule: TokenRule,
}

impl Tokenizer {
    pub fn new(rule: TokenRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> TokenRule {
        self.rule
    }

    /// Lazily yields the tokens of `line`. Calling again on the same line
    /// restarts from the beginning.
    pub fn tokens<'a>(&self, line: &'a str) -> Tokens<'a> {
        match self.rule {
            TokenRule::WordBoundary => Tokens::Boundary(WORD_PATTERN.find_iter(line)),
            TokenRule::NonLetter => Tokens::NonLetter(line.split(is_separator as fn(char) -> bool)),
        }
    }
}

fn is_separator(c: char) -> bool {
    !c.is_letter()
}

/// Iterator over the tokens of one line
pub enum Tokens<'a> {
    Boundary(regex::Matches<'static, 'a>),
    NonLetter(std::str::Split<'a, fn(char) -> bool>),
}

impl Iterator for Tokens<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match self {
            Tokens::Boundary(matches) => matches.next().map(|m| m.as_str().to_lowercase()),
            Tokens::NonLetter(parts) => parts.find(|w| !w.is_empty()).map(str::to_lowercase),
        }
    }
}
