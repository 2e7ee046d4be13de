//! Parser for Steam's text KeyValues format.
//!
//! App manifests (`appmanifest_<id>.acf`) and `libraryfolders.vdf` use this
//! format: quoted keys followed by either a quoted value or a `{ ... }`
//! block. Key lookups are ASCII case-insensitive, matching Steam's reader.

use crate::SteamError;

/// A value in a KeyValues document.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Block(KeyValues),
}

/// An ordered sequence of key/value pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyValues {
    entries: Vec<(String, Value)>,
}

impl KeyValues {
    /// Returns the first value whose key matches, ignoring ASCII case.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Returns a string value by key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            Value::Str(s) => Some(s),
            Value::Block(_) => None,
        }
    }

    /// Returns a nested block by key.
    pub fn get_block(&self, key: &str) -> Option<&KeyValues> {
        match self.get(key)? {
            Value::Block(kv) => Some(kv),
            Value::Str(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses a KeyValues text document.
pub fn parse(text: &str) -> Result<KeyValues, SteamError> {
    let mut lexer = Lexer {
        data: text.as_bytes(),
        pos: 0,
    };
    parse_block(&mut lexer, false)
}

#[derive(Debug, PartialEq)]
enum Token {
    Str(String),
    Open,
    Close,
}

/// Parses key/value pairs until the closing brace (or end of input at the
/// top level).
fn parse_block(lexer: &mut Lexer<'_>, nested: bool) -> Result<KeyValues, SteamError> {
    let mut block = KeyValues::default();

    loop {
        let key = match lexer.next_token()? {
            None if nested => {
                return Err(SteamError::KeyValues(
                    "unexpected end of input inside block".into(),
                ));
            }
            None => return Ok(block),
            Some(Token::Close) if nested => return Ok(block),
            Some(Token::Close) => {
                return Err(SteamError::KeyValues(format!(
                    "unexpected '}}' at pos {}",
                    lexer.pos - 1
                )));
            }
            Some(Token::Open) => {
                return Err(SteamError::KeyValues(format!(
                    "expected key, found '{{' at pos {}",
                    lexer.pos - 1
                )));
            }
            Some(Token::Str(key)) => key,
        };

        let value = match lexer.next_token()? {
            Some(Token::Str(s)) => Value::Str(s),
            Some(Token::Open) => Value::Block(parse_block(lexer, true)?),
            Some(Token::Close) | None => {
                return Err(SteamError::KeyValues(format!(
                    "missing value for key '{key}'"
                )));
            }
        };

        block.entries.push((key, value));
    }
}

struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn next_token(&mut self) -> Result<Option<Token>, SteamError> {
        self.skip_trivia();

        let Some(b) = self.peek() else {
            return Ok(None);
        };

        match b {
            b'{' => {
                self.pos += 1;
                Ok(Some(Token::Open))
            }
            b'}' => {
                self.pos += 1;
                Ok(Some(Token::Close))
            }
            b'"' => self.read_quoted().map(|s| Some(Token::Str(s))),
            _ => Ok(Some(Token::Str(self.read_bare()))),
        }
    }

    /// Skips whitespace, `//` comments and `[$PLATFORM]` conditionals.
    fn skip_trivia(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else if b == b'/' && self.data.get(self.pos + 1) == Some(&b'/') {
                while let Some(c) = self.peek() {
                    if c == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else if b == b'[' {
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == b']' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_quoted(&mut self) -> Result<String, SteamError> {
        let start = self.pos;
        self.pos += 1; // opening quote

        let mut buf = Vec::new();
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'"' => return Ok(String::from_utf8_lossy(&buf).into_owned()),
                b'\\' => {
                    let Some(esc) = self.peek() else { break };
                    self.pos += 1;
                    match esc {
                        b'n' => buf.push(b'\n'),
                        b't' => buf.push(b'\t'),
                        b'\\' => buf.push(b'\\'),
                        b'"' => buf.push(b'"'),
                        other => {
                            buf.push(b'\\');
                            buf.push(other);
                        }
                    }
                }
                _ => buf.push(b),
            }
        }

        Err(SteamError::KeyValues(format!(
            "unterminated string starting at pos {start}"
        )))
    }

    fn read_bare(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || matches!(b, b'{' | b'}' | b'"') {
                break;
            }
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.data[start..self.pos]).into_owned()
    }
}
