//! Shell-command tokenizer.
//!
//! Splits a raw command string into words and control operators without
//! executing anything. Commands arriving here are adversarial-shaped, so the
//! state machine is deliberately small and explicit: three quote states plus
//! an escape flag, nothing else. No variable expansion, no globbing.

use thiserror::Error;

/// Control operator between command segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `&&`
    And,
    /// `||`
    Or,
    /// `;`
    Seq,
    /// `|`
    Pipe,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Seq => ";",
            Operator::Pipe => "|",
        }
    }
}

/// One lexical unit of a command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word after quote and escape processing.
    Word(String),
    /// A bare (unquoted) control operator.
    Op(Operator),
}

impl Token {
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Token::Word(w) => Some(w),
            Token::Op(_) => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenizeError {
    /// A quote opened with no matching close before end of input.
    #[error("unbalanced {0} quote")]
    UnbalancedQuote(char),
    /// Input ended while a backslash escape was pending.
    #[error("trailing escape at end of input")]
    TrailingEscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unquoted,
    Single,
    Double,
}

/// Tokenize a command string.
///
/// Single quotes suppress all interpretation until the closing quote.
/// Double quotes suppress word-splitting and operator recognition; inside
/// them a backslash is interpreted only before `"`, `\`, `$` and backtick,
/// and is literal otherwise. An unquoted backslash escapes the next
/// character unconditionally. `&&` and `||` are matched before `;` and `|`.
/// Whitespace outside quotes separates words and is not emitted.
pub fn tokenize(command: &str) -> Result<Vec<Token>, TokenizeError> {
    fn flush(cur: &mut String, started: &mut bool, tokens: &mut Vec<Token>) {
        if *started {
            tokens.push(Token::Word(std::mem::take(cur)));
            *started = false;
        }
    }

    let mut tokens = Vec::new();
    let mut cur = String::new();
    // An empty word from `''` or `""` is still a word.
    let mut started = false;
    let mut state = State::Unquoted;
    let mut escape = false;

    let mut chars = command.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            State::Single => {
                if c == '\'' {
                    state = State::Unquoted;
                } else {
                    cur.push(c);
                }
            }
            State::Double => {
                if escape {
                    match c {
                        '"' | '\\' | '$' | '`' => cur.push(c),
                        _ => {
                            cur.push('\\');
                            cur.push(c);
                        }
                    }
                    escape = false;
                } else {
                    match c {
                        '\\' => escape = true,
                        '"' => state = State::Unquoted,
                        _ => cur.push(c),
                    }
                }
            }
            State::Unquoted => {
                if escape {
                    cur.push(c);
                    started = true;
                    escape = false;
                    continue;
                }
                match c {
                    '\\' => escape = true,
                    '\'' => {
                        state = State::Single;
                        started = true;
                    }
                    '"' => {
                        state = State::Double;
                        started = true;
                    }
                    '&' if chars.peek() == Some(&'&') => {
                        chars.next();
                        flush(&mut cur, &mut started, &mut tokens);
                        tokens.push(Token::Op(Operator::And));
                    }
                    '|' => {
                        flush(&mut cur, &mut started, &mut tokens);
                        if chars.peek() == Some(&'|') {
                            chars.next();
                            tokens.push(Token::Op(Operator::Or));
                        } else {
                            tokens.push(Token::Op(Operator::Pipe));
                        }
                    }
                    ';' => {
                        flush(&mut cur, &mut started, &mut tokens);
                        tokens.push(Token::Op(Operator::Seq));
                    }
                    _ if c.is_whitespace() => flush(&mut cur, &mut started, &mut tokens),
                    _ => {
                        // Lone `&` (background) and everything else stays in
                        // the word; only the four operators split.
                        cur.push(c);
                        started = true;
                    }
                }
            }
        }
    }

    if escape {
        return Err(TokenizeError::TrailingEscape);
    }
    match state {
        State::Single => return Err(TokenizeError::UnbalancedQuote('\'')),
        State::Double => return Err(TokenizeError::UnbalancedQuote('"')),
        State::Unquoted => {}
    }
    flush(&mut cur, &mut started, &mut tokens);
    Ok(tokens)
}

/// Tokenize, falling back to naive whitespace splitting when the input has
/// unbalanced quoting. The fallback still maps chunks that are exactly one
/// operator to operator tokens, so chained commands keep their structure
/// and downstream checks stay total over every segment.
pub fn tokenize_lossy(command: &str) -> Vec<Token> {
    match tokenize(command) {
        Ok(tokens) => tokens,
        Err(_) => command
            .split_whitespace()
            .map(|chunk| match chunk {
                "&&" => Token::Op(Operator::And),
                "||" => Token::Op(Operator::Or),
                ";" => Token::Op(Operator::Seq),
                "|" => Token::Op(Operator::Pipe),
                w => Token::Word(w.to_string()),
            })
            .collect(),
    }
}

/// Quote a single word so that `tokenize` reproduces it verbatim.
///
/// Words made of safe characters pass through unchanged; everything else is
/// single-quoted, with embedded single quotes spliced as `'\''`.
pub fn quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    let safe = word.chars().all(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-')
    });
    if safe {
        return word.to_string();
    }
    let mut out = String::with_capacity(word.len() + 2);
    out.push('\'');
    for c in word.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// Serialize tokens back into a command string. Words are quoted as needed;
/// operators are emitted bare. `tokenize(join(tokens))` yields `tokens`.
pub fn join(tokens: &[Token]) -> String {
    let mut parts = Vec::with_capacity(tokens.len());
    for t in tokens {
        match t {
            Token::Word(w) => parts.push(quote(w)),
            Token::Op(op) => parts.push(op.as_str().to_string()),
        }
    }
    parts.join(" ")
}

/// A maximal run of words between control operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub words: Vec<String>,
    /// Operator to the left of this segment (None for the first segment).
    pub left: Option<Operator>,
    /// Operator to the right of this segment (None for the last segment).
    pub right: Option<Operator>,
}

/// Split a token stream into operator-delimited segments. Empty runs
/// (doubled operators, leading/trailing operators) produce no segment; the
/// surviving neighbors keep the nearest operator on each side.
pub fn split_segments(tokens: &[Token]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut words = Vec::new();
    let mut left: Option<Operator> = None;

    for t in tokens {
        match t {
            Token::Word(w) => words.push(w.clone()),
            Token::Op(op) => {
                if !words.is_empty() {
                    segments.push(Segment {
                        words: std::mem::take(&mut words),
                        left,
                        right: Some(*op),
                    });
                }
                left = Some(*op);
            }
        }
    }
    if !words.is_empty() {
        segments.push(Segment {
            words,
            left,
            right: None,
        });
    }
    segments
}
