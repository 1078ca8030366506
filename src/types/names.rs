//! Validated names for commands and editor modes.
//!
//! Both name kinds end up as atoms in the persisted stats file, so the
//! constructors reject anything the file tokenizer could not read back:
//! empty strings, whitespace, parentheses, and the bare dot that the
//! format reserves as pair punctuation. A dot inside a longer name
//! (`isearch-repeat.forward`) is an ordinary character.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a string was refused as a [`CommandName`] or [`ModeName`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidName {
    #[error("name is empty")]
    Empty,
    #[error("name {0:?} contains whitespace")]
    Whitespace(String),
    #[error("name {0:?} contains a parenthesis")]
    Paren(String),
    #[error("`.` is not a valid name")]
    Dot,
}

fn validate_atom(s: &str) -> Result<(), InvalidName> {
    if s.is_empty() {
        return Err(InvalidName::Empty);
    }
    if s == "." {
        return Err(InvalidName::Dot);
    }
    if s.chars().any(char::is_whitespace) {
        return Err(InvalidName::Whitespace(s.to_string()));
    }
    if s.contains('(') || s.contains(')') {
        return Err(InvalidName::Paren(s.to_string()));
    }
    Ok(())
}

/// The name of an interactively invoked command, e.g. `forward-char`.
///
/// Anonymous commands (closures bound directly to a key) have no name
/// and never reach this type; callers represent them as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommandName(String);

impl CommandName {
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidName> {
        let s = s.into();
        validate_atom(&s)?;
        Ok(CommandName(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CommandName {
    type Err = InvalidName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandName::parse(s)
    }
}

impl TryFrom<String> for CommandName {
    type Error = InvalidName;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        CommandName::parse(s)
    }
}

impl From<CommandName> for String {
    fn from(name: CommandName) -> String {
        name.0
    }
}

/// The editing context a command ran in, e.g. `rust-mode` or `org-mode`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModeName(String);

impl ModeName {
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidName> {
        let s = s.into();
        validate_atom(&s)?;
        Ok(ModeName(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ModeName {
    type Err = InvalidName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModeName::parse(s)
    }
}

impl TryFrom<String> for ModeName {
    type Error = InvalidName;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ModeName::parse(s)
    }
}

impl From<ModeName> for String {
    fn from(name: ModeName) -> String {
        name.0
    }
}
