//! Reader and writer for the persisted stats file.
//!
//! The file is a single Lisp association list pairing nested-pair keys
//! with counts, one record per line so that diffs stay readable:
//!
//! ```text
//! ((((c-mode . backward-char) . forward-char) . 12)
//!  (((c-mode . forward-char) . next-line) . 3))
//! ```
//!
//! Each record is `(((mode . predecessor) . command) . count)`. The
//! writer emits records sorted by key, so equal stores produce
//! byte-identical files. The reader is whitespace-insensitive and
//! accepts the same data on one line or with any indentation; it
//! tolerates duplicate keys (they accumulate on load) but rejects any
//! structural damage outright, reporting the byte offset at which
//! parsing failed. Partially written files are not patched up: a store
//! that cannot be parsed must never be silently overwritten.

use thiserror::Error;

use crate::store::CounterStore;
use crate::types::{CommandName, DigramKey, InvalidName, ModeName};

/// Structural failure while parsing a stats file.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("stats file ended unexpectedly")]
    UnexpectedEof,
    #[error("expected {expected} at byte {offset}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
        offset: usize,
    },
    #[error("invalid count {text:?} at byte {offset}")]
    InvalidCount { text: String, offset: usize },
    #[error("trailing data after the record list at byte {offset}")]
    TrailingData { offset: usize },
    #[error("invalid name in stats file: {0}")]
    Name(#[from] InvalidName),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    LParen,
    RParen,
    Dot,
    Atom(&'a str),
}

impl Token<'_> {
    fn describe(&self) -> String {
        match self {
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::Dot => "`.`".to_string(),
            Token::Atom(text) => format!("{text:?}"),
        }
    }
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Tokenizer { input, pos: 0 }
    }

    /// The next token and the byte offset it starts at.
    fn next_token(&mut self) -> Option<(usize, Token<'a>)> {
        let rest = &self.input[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
        let start = self.pos;
        let first = trimmed.chars().next()?;
        let token = match first {
            '(' => {
                self.pos += 1;
                Token::LParen
            }
            ')' => {
                self.pos += 1;
                Token::RParen
            }
            _ => {
                let end = trimmed
                    .find(|c: char| c.is_whitespace() || c == '(' || c == ')')
                    .unwrap_or(trimmed.len());
                self.pos += end;
                let atom = &trimmed[..end];
                if atom == "." {
                    Token::Dot
                } else {
                    Token::Atom(atom)
                }
            }
        };
        Some((start, token))
    }
}

fn next<'a>(tokens: &mut Tokenizer<'a>) -> Result<(usize, Token<'a>), FormatError> {
    tokens.next_token().ok_or(FormatError::UnexpectedEof)
}

fn expect(
    tokens: &mut Tokenizer<'_>,
    want: Token<'static>,
    expected: &'static str,
) -> Result<(), FormatError> {
    let (offset, token) = next(tokens)?;
    if token == want {
        Ok(())
    } else {
        Err(FormatError::Unexpected {
            expected,
            found: token.describe(),
            offset,
        })
    }
}

fn expect_atom<'a>(
    tokens: &mut Tokenizer<'a>,
    expected: &'static str,
) -> Result<(usize, &'a str), FormatError> {
    let (offset, token) = next(tokens)?;
    match token {
        Token::Atom(text) => Ok((offset, text)),
        other => Err(FormatError::Unexpected {
            expected,
            found: other.describe(),
            offset,
        }),
    }
}

/// Parses a stats file into its raw records.
///
/// Records are returned in file order, duplicates and all; callers fold
/// them into a store, which handles accumulation and drops zero counts.
pub fn parse(input: &str) -> Result<Vec<(DigramKey, u64)>, FormatError> {
    let mut tokens = Tokenizer::new(input);
    expect(&mut tokens, Token::LParen, "`(` opening the record list")?;
    let mut records = Vec::new();
    loop {
        match next(&mut tokens)? {
            (_, Token::RParen) => break,
            (_, Token::LParen) => records.push(parse_record(&mut tokens)?),
            (offset, other) => {
                return Err(FormatError::Unexpected {
                    expected: "a record or `)`",
                    found: other.describe(),
                    offset,
                });
            }
        }
    }
    if let Some((offset, _)) = tokens.next_token() {
        return Err(FormatError::TrailingData { offset });
    }
    Ok(records)
}

/// Parses one `(((mode . predecessor) . command) . count)` record; the
/// record's own opening paren has already been consumed.
fn parse_record(tokens: &mut Tokenizer<'_>) -> Result<(DigramKey, u64), FormatError> {
    expect(tokens, Token::LParen, "`(` opening the key")?;
    expect(tokens, Token::LParen, "`(` opening the mode pair")?;
    let (_, mode) = expect_atom(tokens, "a mode name")?;
    expect(tokens, Token::Dot, "`.` after the mode")?;
    let (_, predecessor) = expect_atom(tokens, "a predecessor command")?;
    expect(tokens, Token::RParen, "`)` closing the mode pair")?;
    expect(tokens, Token::Dot, "`.` after the mode pair")?;
    let (_, command) = expect_atom(tokens, "a command name")?;
    expect(tokens, Token::RParen, "`)` closing the key")?;
    expect(tokens, Token::Dot, "`.` before the count")?;
    let (count_offset, count_text) = expect_atom(tokens, "a count")?;
    expect(tokens, Token::RParen, "`)` closing the record")?;

    let count: u64 = count_text.parse().map_err(|_| FormatError::InvalidCount {
        text: count_text.to_string(),
        offset: count_offset,
    })?;
    let key = DigramKey::new(
        ModeName::parse(mode)?,
        CommandName::parse(predecessor)?,
        CommandName::parse(command)?,
    );
    Ok((key, count))
}

/// Renders a store in the persisted format, sorted by key.
pub fn render(store: &CounterStore<DigramKey>) -> String {
    let mut records: Vec<(&DigramKey, u64)> = store.iter().collect();
    records.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::from("(");
    for (i, (key, count)) in records.iter().enumerate() {
        if i > 0 {
            out.push_str("\n ");
        }
        out.push_str(&format!(
            "((({} . {}) . {}) . {})",
            key.mode, key.predecessor, key.command, count
        ));
    }
    out.push_str(")\n");
    out
}
