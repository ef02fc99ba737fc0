//! Requirement lines and the host's word-splitting rules.
//!
//! A requirement line is the argument text of one `require` directive
//! together with the set of methods it applies to. The first word is the
//! directive keyword; the remainder is a list of words that may be quoted:
//!
//! ```text
//! user alice "bob smith" 'carol'
//! ```
//!
//! The keyword is split off at the first whitespace character. Remainder words
//! follow configuration-word rules: leading whitespace is skipped, a word
//! starting with `"` or `'` runs to the matching quote, and inside a word `\\`
//! and `\<quote>` are escapes.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::method::{Method, MethodMask};

// =============================================================================
// Requirement Line
// =============================================================================

/// One configured `require` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementLine {
    /// Methods this line applies to.
    #[serde(default = "all_methods")]
    pub method_mask: MethodMask,

    /// Raw directive text, e.g. `user alice bob`.
    pub requirement: String,
}

fn all_methods() -> MethodMask {
    MethodMask::ALL
}

impl RequirementLine {
    /// A line that applies to every method.
    #[must_use]
    pub fn new(requirement: impl Into<String>) -> Self {
        Self {
            method_mask: MethodMask::ALL,
            requirement: requirement.into(),
        }
    }

    /// A line restricted to `method_mask`.
    #[must_use]
    pub fn with_methods(method_mask: MethodMask, requirement: impl Into<String>) -> Self {
        Self {
            method_mask,
            requirement: requirement.into(),
        }
    }

    /// Whether the line applies to a request made with `method`.
    #[must_use]
    pub fn applies_to(&self, method: Method) -> bool {
        self.method_mask.contains(method)
    }

    /// Splits the text into its keyword and the unparsed remainder.
    #[must_use]
    pub fn split_keyword(&self) -> (&str, &str) {
        split_white_word(&self.requirement)
    }

    /// Classifies the line by its keyword.
    #[must_use]
    pub fn directive(&self) -> Directive<'_> {
        let (keyword, rest) = self.split_keyword();
        Directive::classify(keyword, rest)
    }
}

// =============================================================================
// Requirement Set
// =============================================================================

/// Ordered requirement lines for one configuration scope.
///
/// Cloning is cheap; the lines are shared and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RequirementLine>", into = "Vec<RequirementLine>")]
pub struct RequirementSet {
    lines: Arc<[RequirementLine]>,
}

impl RequirementSet {
    /// An empty set (no `require` directives in effect).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Lines that apply to `method`, in configured order.
    pub fn applicable(&self, method: Method) -> impl Iterator<Item = &RequirementLine> {
        self.lines.iter().filter(move |line| line.applies_to(method))
    }
}

impl Deref for RequirementSet {
    type Target = [RequirementLine];

    fn deref(&self) -> &Self::Target {
        &self.lines
    }
}

impl From<Vec<RequirementLine>> for RequirementSet {
    fn from(lines: Vec<RequirementLine>) -> Self {
        Self {
            lines: lines.into(),
        }
    }
}

impl From<RequirementSet> for Vec<RequirementLine> {
    fn from(set: RequirementSet) -> Self {
        set.lines.to_vec()
    }
}

impl FromIterator<RequirementLine> for RequirementSet {
    fn from_iter<I: IntoIterator<Item = RequirementLine>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a str> for RequirementSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(RequirementLine::new).collect()
    }
}

// =============================================================================
// Directive
// =============================================================================

/// A requirement line classified by keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    /// `valid-user`: any authenticated identity.
    ValidUser,
    /// `user a b ...`: one of the listed identities.
    User(ConfWords<'a>),
    /// `except a b ...`: any identity not listed.
    Except(ConfWords<'a>),
    /// Keyword owned by some other provider.
    Other(&'a str),
}

impl<'a> Directive<'a> {
    /// Keywords compare ASCII case-insensitively.
    #[must_use]
    pub fn classify(keyword: &'a str, rest: &'a str) -> Self {
        if keyword.eq_ignore_ascii_case("valid-user") {
            Directive::ValidUser
        } else if keyword.eq_ignore_ascii_case("user") {
            Directive::User(ConfWords::new(rest))
        } else if keyword.eq_ignore_ascii_case("except") {
            Directive::Except(ConfWords::new(rest))
        } else {
            Directive::Other(keyword)
        }
    }
}

// =============================================================================
// Word Splitting
// =============================================================================

fn is_space(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\x0b'
}

/// Splits off the leading run of non-whitespace and skips the whitespace
/// after it. Leading whitespace is not skipped, so `" user"` has an empty
/// keyword.
#[must_use]
pub fn split_white_word(line: &str) -> (&str, &str) {
    let end = line.find(is_space).unwrap_or(line.len());
    let (word, rest) = line.split_at(end);
    (word, rest.trim_start_matches(is_space))
}

/// Reads one configuration word from the front of `line`.
///
/// Returns the unescaped word and the remainder with leading whitespace
/// removed. An exhausted line yields an empty word.
#[must_use]
pub fn split_conf_word(line: &str) -> (String, &str) {
    let line = line.trim_start_matches(is_space);
    let Some(first) = line.chars().next() else {
        return (String::new(), line);
    };

    let (word, rest) = if first == '"' || first == '\'' {
        let body = &line[1..];
        let bytes = body.as_bytes();
        let quote = first as u8;
        let mut i = 0;
        while i < bytes.len() && bytes[i] != quote {
            if bytes[i] == b'\\' && i + 1 < bytes.len() && (bytes[i + 1] == quote || bytes[i + 1] == b'\\') {
                i += 2;
            } else {
                i += 1;
            }
        }
        let word = unescape(&body[..i], Some(first));
        let rest = if i < bytes.len() { &body[i + 1..] } else { &body[i..] };
        (word, rest)
    } else {
        let end = line.find(is_space).unwrap_or(line.len());
        (unescape(&line[..end], None), &line[end..])
    };

    (word, rest.trim_start_matches(is_space))
}

fn unescape(raw: &str, quote: Option<char>) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '\\' || Some(next) == quote {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Iterator over the configuration words of a requirement remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfWords<'a> {
    rest: &'a str,
}

impl<'a> ConfWords<'a> {
    #[must_use]
    pub fn new(rest: &'a str) -> Self {
        Self { rest }
    }
}

impl Iterator for ConfWords<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let (word, rest) = split_conf_word(self.rest);
        self.rest = rest;
        Some(word)
    }
}
