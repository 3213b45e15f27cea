//! Line-oriented tokenizer for `.transactions` source text.
//!
//! Tokens never span a line boundary. Two tokens only exist at the start of a
//! line: [`TokenKind::Indent`] (exactly four spaces before a posting) and
//! [`TokenKind::Directive`] (a `;` comment line). On lines that start with a
//! datetime the free text before the `;` is grouped into [`TokenKind::Words`].

use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1, take_while_m_n};
use nom::character::complete::{char, digit1, one_of, satisfy};
use nom::combinator::{all_consuming, map, map_res, opt, recognize, value};
use nom::multi::many1;
use nom::sequence::{pair, preceded, tuple};
use nom::IResult;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    DateTime,
    Number,
    Ident,
    PathLike,
    Quoted,
    Words,
    Indent,
    Directive,
    Star,
    Bang,
    Semicolon,
    Comma,
    Colon,
    LBrace,
    DoubleLBrace,
    RBrace,
    DoubleRBrace,
    At,
    AtAt,
    /// Leading whitespace that is not exactly four spaces.
    BadIndent,
    /// A `"` without its closing quote on the same line.
    Unterminated,
    Unknown,
    Newline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub line: usize,
    pub column: usize,
    /// Byte offset of `text` in the whole source.
    pub offset: usize,
}

impl<'a> Token<'a> {
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

#[derive(Clone, Copy)]
pub(crate) struct TimeParts<'a> {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub fraction: Option<&'a str>,
    /// Offset from UTC in seconds, `Z` being zero.
    pub offset: Option<i32>,
}

pub(crate) struct DateTimeParts<'a> {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub time: Option<TimeParts<'a>>,
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'
}

fn is_delimiter(c: char) -> bool {
    matches!(c, ' ' | '\t' | ';' | ',' | '{' | '}' | '@' | '"')
}

fn number_n(n: usize) -> impl Fn(&str) -> IResult<&str, u32> {
    move |input| map_res(take_while_m_n(n, n, is_digit), str::parse::<u32>)(input)
}

fn utc_offset(input: &str) -> IResult<&str, i32> {
    map(
        tuple((one_of("+-"), number_n(2), char(':'), number_n(2))),
        |(sign, hours, _, minutes)| {
            let seconds = (hours * 3600 + minutes * 60) as i32;
            if sign == '-' {
                -seconds
            } else {
                seconds
            }
        },
    )(input)
}

fn time_parts(input: &str) -> IResult<&str, TimeParts<'_>> {
    let (input, (hour, _, minute, _, second)) =
        tuple((number_n(2), char(':'), number_n(2), char(':'), number_n(2)))(input)?;
    let (input, fraction) = opt(preceded(char('.'), take_while_m_n(1, 6, is_digit)))(input)?;
    let (input, offset) = opt(alt((value(0, char('Z')), utc_offset)))(input)?;

    Ok((
        input,
        TimeParts {
            hour,
            minute,
            second,
            fraction,
            offset,
        },
    ))
}

pub(crate) fn datetime_parts(input: &str) -> IResult<&str, DateTimeParts<'_>> {
    let (input, (year, _, month, _, day)) =
        tuple((number_n(4), char('-'), number_n(2), char('-'), number_n(2)))(input)?;
    let (input, time) = opt(preceded(char('T'), time_parts))(input)?;

    Ok((
        input,
        DateTimeParts {
            year: year as i32,
            month,
            day,
            time,
        },
    ))
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("+-")),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input)
}

fn ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn path_like(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(is_path_char),
        many1(preceded(char(':'), take_while1(is_path_char))),
    ))(input)
}

/// Classifies a whole bare chunk of text.
pub(crate) fn classify(chunk: &str) -> TokenKind {
    if all_consuming(datetime_parts)(chunk).is_ok() {
        TokenKind::DateTime
    } else if all_consuming(path_like)(chunk).is_ok() {
        TokenKind::PathLike
    } else if all_consuming(number)(chunk).is_ok() {
        TokenKind::Number
    } else if all_consuming(ident)(chunk).is_ok() {
        TokenKind::Ident
    } else if chunk == "*" {
        TokenKind::Star
    } else if chunk == "!" {
        TokenKind::Bang
    } else {
        TokenKind::Unknown
    }
}

/// Unescapes the body of a [`TokenKind::Quoted`] token (quotes included).
pub fn unquote(text: &str) -> String {
    let inner = text
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(text);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Lazily tokenizes `text`. Every source line, including the last one, ends
/// with a [`TokenKind::Newline`] token.
pub fn tokenize(text: &str) -> Lexer<'_> {
    Lexer::new(text)
}

pub struct Lexer<'a> {
    source: &'a str,
    position: usize,
    line: usize,
    pending: VecDeque<Token<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            position: 0,
            line: 0,
            pending: VecDeque::new(),
        }
    }

    fn next_line(&mut self) -> bool {
        if self.position >= self.source.len() {
            return false;
        }

        let source = self.source;
        let start = self.position;
        let rest = &source[start..];
        let (raw, consumed) = match rest.find('\n') {
            Some(pos) => (&rest[..pos], pos + 1),
            None => (rest, rest.len()),
        };
        self.position += consumed;
        self.line += 1;

        let content = raw.strip_suffix('\r').unwrap_or(raw);
        LineLexer::new(content, self.line, start).run(&mut self.pending);
        true
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pending.is_empty() {
            if !self.next_line() {
                return None;
            }
        }
        self.pending.pop_front()
    }
}

struct LineLexer<'a> {
    text: &'a str,
    line: usize,
    base: usize,
    pos: usize,
    header: bool,
    in_meta: bool,
    previous: Option<TokenKind>,
}

impl<'a> LineLexer<'a> {
    fn new(text: &'a str, line: usize, base: usize) -> Self {
        LineLexer {
            text,
            line,
            base,
            pos: 0,
            header: false,
            in_meta: false,
            previous: None,
        }
    }

    fn token(&mut self, out: &mut VecDeque<Token<'a>>, kind: TokenKind, start: usize, end: usize) {
        let text = self.text;
        out.push_back(Token {
            kind,
            text: &text[start..end],
            line: self.line,
            column: text[..start].chars().count() + 1,
            offset: self.base + start,
        });
        self.previous = Some(kind);
    }

    fn run(mut self, out: &mut VecDeque<Token<'a>>) {
        let text = self.text;
        let end = text.len();

        if !text.trim().is_empty() {
            let indent = text.len() - text.trim_start_matches([' ', '\t']).len();
            let rest = &text[indent..];

            if rest.starts_with(';') {
                self.token(out, TokenKind::Directive, indent, end);
                self.token(out, TokenKind::Newline, end, end);
                return;
            }

            if indent > 0 {
                let kind = if &text[..indent] == "    " {
                    TokenKind::Indent
                } else {
                    TokenKind::BadIndent
                };
                self.token(out, kind, 0, indent);
            } else {
                let first = rest.find(is_delimiter).unwrap_or(rest.len());
                self.header = classify(&rest[..first]) == TokenKind::DateTime;
            }

            self.pos = indent;
            self.lex_content(out);
        }

        self.token(out, TokenKind::Newline, end, end);
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.text[self.pos..].chars().nth(offset)
    }

    fn lex_content(&mut self, out: &mut VecDeque<Token<'a>>) {
        while let Some(c) = self.peek(0) {
            let start = self.pos;
            match c {
                ' ' | '\t' => {
                    self.pos += 1;
                }
                ';' => {
                    self.pos += 1;
                    self.in_meta = true;
                    self.token(out, TokenKind::Semicolon, start, self.pos);
                }
                ',' => {
                    self.pos += 1;
                    self.token(out, TokenKind::Comma, start, self.pos);
                }
                '{' | '}' | '@' => {
                    let doubled = self.peek(1) == Some(c);
                    self.pos += if doubled { 2 } else { 1 };
                    let kind = match (c, doubled) {
                        ('{', false) => TokenKind::LBrace,
                        ('{', true) => TokenKind::DoubleLBrace,
                        ('}', false) => TokenKind::RBrace,
                        ('}', true) => TokenKind::DoubleRBrace,
                        ('@', false) => TokenKind::At,
                        _ => TokenKind::AtAt,
                    };
                    self.token(out, kind, start, self.pos);
                }
                '"' => {
                    if !self.lex_quoted(out) {
                        return;
                    }
                }
                _ => self.lex_chunk(out),
            }
        }
    }

    fn lex_quoted(&mut self, out: &mut VecDeque<Token<'a>>) -> bool {
        let start = self.pos;
        let mut escaped = false;
        for (i, c) in self.text[start + 1..].char_indices() {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => {
                    self.pos = start + 1 + i + 1;
                    self.token(out, TokenKind::Quoted, start, self.pos);
                    return true;
                }
                _ => escaped = false,
            }
        }

        let end = self.text.len();
        self.pos = end;
        self.token(out, TokenKind::Unterminated, start, end);
        false
    }

    fn chunk_end(&self, from: usize) -> usize {
        self.text[from..]
            .find(is_delimiter)
            .map(|i| from + i)
            .unwrap_or(self.text.len())
    }

    fn lex_chunk(&mut self, out: &mut VecDeque<Token<'a>>) {
        let text = self.text;
        let start = self.pos;
        let mut end = self.chunk_end(start);
        let chunk = &text[start..end];

        // Header free text: everything after the datetime (and status) up to `;`.
        if self.header && !self.in_meta && self.previous.is_some() {
            let status =
                self.previous == Some(TokenKind::DateTime) && (chunk == "*" || chunk == "!");
            if !status {
                // Words separated by a single space belong to one group.
                loop {
                    let mut chars = text[end..].chars();
                    match (chars.next(), chars.next()) {
                        (Some(' '), Some(next)) if !is_delimiter(next) => {
                            end = self.chunk_end(end + 1);
                        }
                        _ => break,
                    }
                }
                self.pos = end;
                self.token(out, TokenKind::Words, start, end);
                return;
            }
        }

        self.pos = end;
        if chunk.len() > 1 && chunk.ends_with(':') {
            let key_end = end - 1;
            self.token(out, classify(&text[start..key_end]), start, key_end);
            self.token(out, TokenKind::Colon, key_end, end);
        } else if chunk == ":" {
            self.token(out, TokenKind::Colon, start, end);
        } else {
            self.token(out, classify(chunk), start, end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).map(|t| t.kind).collect()
    }

    fn texts(input: &str) -> Vec<&str> {
        tokenize(input).map(|t| t.text).collect()
    }

    #[test]
    fn classify_test() {
        assert_eq!(classify("2026-01-15"), TokenKind::DateTime);
        assert_eq!(classify("2026-01-15T10:00:00.123456Z"), TokenKind::DateTime);
        assert_eq!(classify("2026-01-15T10:00:00-03:00"), TokenKind::DateTime);
        assert_eq!(classify("-230.10"), TokenKind::Number);
        assert_eq!(classify("+7"), TokenKind::Number);
        assert_eq!(classify("USD"), TokenKind::Ident);
        assert_eq!(classify("assets:cash:usd"), TokenKind::PathLike);
        assert_eq!(classify("txn:01J2N9R9"), TokenKind::PathLike);
        assert_eq!(classify("fee:0.10"), TokenKind::PathLike);
        assert_eq!(classify("1,000"), TokenKind::Unknown);
        assert_eq!(classify("*"), TokenKind::Star);
    }

    #[test]
    fn header_line() {
        let input = r#"2026-01-15 * "Binance" "Buy SOL" ; txn:01J2N9R9, src:binance:order:999"#;
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::DateTime,
                TokenKind::Star,
                TokenKind::Quoted,
                TokenKind::Quoted,
                TokenKind::Semicolon,
                TokenKind::PathLike,
                TokenKind::Comma,
                TokenKind::PathLike,
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn unquoted_header_words() {
        let input = "2026-01-15 ! Corner shop  weekly groceries ; txn:a1";
        let tokens: Vec<Token> = tokenize(input).collect();
        assert_eq!(tokens[1].kind, TokenKind::Bang);
        assert_eq!(tokens[2].kind, TokenKind::Words);
        assert_eq!(tokens[2].text, "Corner shop");
        assert_eq!(tokens[2].column, 14);
        assert_eq!(tokens[3].kind, TokenKind::Words);
        assert_eq!(tokens[3].text, "weekly groceries");
        assert_eq!(tokens[4].kind, TokenKind::Semicolon);
    }

    #[test]
    fn posting_line() {
        let input = "    assets:exchange:binance:sol    10.000000 SOL {{ 230.00 USD, fee:0.10 USD, note:\"maker fee\" }} @ 23.00 USD ; lot:a";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Indent,
                TokenKind::PathLike,
                TokenKind::Number,
                TokenKind::Ident,
                TokenKind::DoubleLBrace,
                TokenKind::Number,
                TokenKind::Ident,
                TokenKind::Comma,
                TokenKind::PathLike,
                TokenKind::Ident,
                TokenKind::Comma,
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Quoted,
                TokenKind::DoubleRBrace,
                TokenKind::At,
                TokenKind::Number,
                TokenKind::Ident,
                TokenKind::Semicolon,
                TokenKind::PathLike,
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn directives_blank_lines_and_indentation() {
        let input = "; month:202601\n\n  assets:cash 1 USD\n\t; nested comment\r\n";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Directive,
                TokenKind::Newline,
                TokenKind::Newline,
                TokenKind::BadIndent,
                TokenKind::PathLike,
                TokenKind::Number,
                TokenKind::Ident,
                TokenKind::Newline,
                TokenKind::Directive,
                TokenKind::Newline,
            ]
        );
        assert_eq!(texts(input)[0], "; month:202601");
    }

    #[test]
    fn positions_are_one_based() {
        let tokens: Vec<Token> = tokenize("\n    assets:cash:usd -1.5 USD").collect();
        let amount = tokens[3];
        assert_eq!(amount.kind, TokenKind::Number);
        assert_eq!(amount.line, 2);
        assert_eq!(amount.column, 21);
        assert_eq!(amount.offset, 21);
    }

    #[test]
    fn quoted_strings() {
        let tokens: Vec<Token> = tokenize(r#"2026-01-15 "Say \"hi\"" "a\\b""#).collect();
        assert_eq!(tokens[1].kind, TokenKind::Quoted);
        assert_eq!(unquote(tokens[1].text), "Say \"hi\"");
        assert_eq!(unquote(tokens[2].text), "a\\b");

        let tokens: Vec<Token> = tokenize("2026-01-15 \"open ; txn:x").collect();
        assert_eq!(tokens[1].kind, TokenKind::Unterminated);
        assert_eq!(tokens[2].kind, TokenKind::Newline);
    }
}
