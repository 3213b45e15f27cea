use super::model::*;
use crate::common::*;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::lexer::{classify, unquote, Token, TokenKind};

/// Parses a token stream into a syntax tree.
///
/// Each line is matched against the file, header and posting productions.
/// A posting that fails to parse is dropped on its own; a header or a stray
/// line that fails puts the parser in resync mode, skipping postings until the
/// next blank line or datetime-started line.
pub fn parse_tokens<'a, I>(tokens: I) -> (File, Vec<Diagnostic>)
where
    I: IntoIterator<Item = Token<'a>>,
{
    let mut parser = Parser::default();
    let mut line: Vec<Token<'a>> = Vec::new();

    for token in tokens {
        let end_of_line = token.kind == TokenKind::Newline;
        line.push(token);
        if end_of_line {
            parser.line(&line);
            line.clear();
        }
    }

    if let Some(last) = line.last().copied() {
        line.push(Token {
            kind: TokenKind::Newline,
            text: "",
            line: last.line,
            column: last.column + last.text.chars().count(),
            offset: last.end(),
        });
        parser.line(&line);
    }

    parser.finish()
}

#[derive(Default)]
struct Parser {
    items: Vec<Item>,
    current: Option<Transaction>,
    skipping: bool,
    diagnostics: Diagnostics,
}

struct Cursor<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
}

impl<'t, 'a> Cursor<'t, 'a> {
    /// `tokens` must end with a newline token.
    fn new(tokens: &'t [Token<'a>]) -> Self {
        Cursor { tokens, pos: 0 }
    }

    fn peek_nth(&self, n: usize) -> Token<'a> {
        let last = self.tokens.len() - 1;
        self.tokens[(self.pos + n).min(last)]
    }

    fn peek(&self) -> Token<'a> {
        self.peek_nth(0)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn bump(&mut self) -> Token<'a> {
        let token = self.peek();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        if self.at(kind) {
            Some(self.bump())
        } else {
            None
        }
    }
}

fn located(token: Token<'_>) -> Located<String> {
    Located::new(token.text.to_string(), token.line, token.column)
}

fn free_text(c: &mut Cursor<'_, '_>) -> Option<String> {
    match c.peek().kind {
        TokenKind::Quoted => Some(unquote(c.bump().text)),
        TokenKind::Words => Some(c.bump().text.to_string()),
        _ => None,
    }
}

impl Parser {
    fn line(&mut self, tokens: &[Token<'_>]) {
        let first = tokens[0];
        match first.kind {
            TokenKind::Newline => {
                self.close();
                self.skipping = false;
                self.items.push(Item::EmptyLine);
            }
            TokenKind::Directive => match self.current {
                Some(ref mut transaction) => transaction.end_line = first.line,
                None => {
                    let comment = first.text.trim_start_matches(';').trim();
                    self.items.push(Item::Directive(comment.to_string()));
                }
            },
            TokenKind::DateTime => {
                self.close();
                self.current = self.header(tokens);
                self.skipping = self.current.is_none();
            }
            TokenKind::Indent => {
                if self.skipping {
                    return;
                }
                if self.current.is_none() {
                    self.diagnostics.error(
                        first.line,
                        first.column,
                        "posting without transaction header",
                    );
                    return;
                }
                let posting = self.posting(tokens);
                if let Some(ref mut transaction) = self.current {
                    transaction.end_line = first.line;
                    transaction.postings.extend(posting);
                }
            }
            TokenKind::BadIndent => {
                if let Some(ref mut transaction) = self.current {
                    transaction.end_line = first.line;
                }
                if !self.skipping {
                    self.diagnostics.error(
                        first.line,
                        first.column,
                        "invalid indentation: postings must start with exactly 4 spaces",
                    );
                }
            }
            _ => {
                self.close();
                self.skipping = true;
                self.diagnostics.error(
                    first.line,
                    first.column,
                    "invalid line: expected transaction header, posting, or directive",
                );
            }
        }
    }

    fn close(&mut self) {
        if let Some(transaction) = self.current.take() {
            self.items.push(Item::Transaction(transaction));
        }
    }

    fn finish(mut self) -> (File, Vec<Diagnostic>) {
        self.close();
        (File { items: self.items }, self.diagnostics.into_sorted())
    }

    fn unexpected(&mut self, token: Token<'_>, context: &str) {
        let message = match token.kind {
            TokenKind::Newline => format!("unexpected end of line {}", context),
            TokenKind::Unterminated => "unterminated string".to_string(),
            _ => format!("unexpected '{}' {}", token.text, context),
        };
        self.diagnostics.error(token.line, token.column, message);
    }

    fn datetime(&mut self, token: Token<'_>) -> Option<LedgerDateTime> {
        match token.text.parse::<LedgerDateTime>() {
            Ok(datetime) => Some(datetime),
            Err(message) => {
                self.diagnostics.error(token.line, token.column, message);
                None
            }
        }
    }

    fn header(&mut self, tokens: &[Token<'_>]) -> Option<Transaction> {
        let mut c = Cursor::new(tokens);
        let start = c.bump();
        let datetime = self.datetime(start)?;

        let status = match c.peek().kind {
            TokenKind::Star | TokenKind::Bang => {
                c.bump().text.chars().next().and_then(TransactionStatus::from_char)
            }
            _ => None,
        };

        // First free-text group is the payee, the second one the narration.
        let payee = free_text(&mut c);
        let narration = if payee.is_some() {
            free_text(&mut c)
        } else {
            let at = c.peek();
            self.diagnostics
                .error(at.line, at.column, "missing transaction details");
            None
        };

        let meta = match c.peek().kind {
            TokenKind::Semicolon => {
                c.bump();
                Some(self.tags(&mut c, "in transaction metadata")?)
            }
            TokenKind::Newline => {
                let at = c.peek();
                self.diagnostics
                    .error(at.line, at.column, "missing meta comment (expected ';')");
                None
            }
            _ => {
                self.unexpected(c.peek(), "in transaction header");
                return None;
            }
        };

        if !c.at(TokenKind::Newline) {
            self.unexpected(c.peek(), "in transaction metadata");
            return None;
        }

        Some(Transaction {
            line: start.line,
            column: start.column,
            end_line: start.line,
            datetime,
            status,
            payee,
            narration,
            meta,
            postings: Vec::new(),
        })
    }

    fn tags(&mut self, c: &mut Cursor<'_, '_>, context: &str) -> Option<Vec<Located<Tag>>> {
        let mut tags = Vec::new();

        loop {
            let token = c.peek();
            let tag = match token.kind {
                TokenKind::Newline if tags.is_empty() => break,
                TokenKind::PathLike => {
                    c.bump();
                    Tag::from_path_like(token.text)
                }
                TokenKind::Ident if c.peek_nth(1).kind == TokenKind::Colon => {
                    c.bump();
                    c.bump();
                    let value = c.peek();
                    match value.kind {
                        TokenKind::Quoted => {
                            c.bump();
                            Tag::pair(token.text, unquote(value.text))
                        }
                        TokenKind::DateTime
                        | TokenKind::Number
                        | TokenKind::Ident
                        | TokenKind::PathLike
                        | TokenKind::Unknown => {
                            c.bump();
                            Tag::pair(token.text, value.text)
                        }
                        // `key:` with nothing after it
                        TokenKind::Comma | TokenKind::Newline => Tag::pair(token.text, ""),
                        _ => {
                            self.unexpected(value, context);
                            return None;
                        }
                    }
                }
                TokenKind::Ident | TokenKind::Number | TokenKind::DateTime | TokenKind::Unknown => {
                    c.bump();
                    Tag::Bare(token.text.to_string())
                }
                _ => {
                    self.unexpected(token, context);
                    return None;
                }
            };
            tags.push(Located::new(tag, token.line, token.column));

            if c.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        Some(tags)
    }

    fn posting(&mut self, tokens: &[Token<'_>]) -> Option<Posting> {
        let mut c = Cursor::new(tokens);
        let indent = c.bump();

        let account = c.peek();
        match account.kind {
            TokenKind::PathLike => {
                c.bump();
            }
            TokenKind::Newline => {
                self.diagnostics
                    .error(account.line, account.column, "missing account");
                return None;
            }
            _ => {
                self.diagnostics.error(
                    account.line,
                    account.column,
                    format!("invalid account path: {}", account.text),
                );
                return None;
            }
        }

        let mut posting = Posting {
            line: indent.line,
            account: account.text.to_string(),
            amount: None,
            commodity: None,
            missing_at: account.column + account.text.chars().count() + 1,
            cost: None,
            price: None,
            meta: Vec::new(),
        };

        let amount = c.peek();
        match amount.kind {
            TokenKind::Number => {
                c.bump();
                posting.amount = Some(located(amount));
                posting.missing_at = amount.column + amount.text.chars().count() + 1;

                let commodity = c.peek();
                match commodity.kind {
                    TokenKind::Ident => {
                        c.bump();
                        posting.commodity = Some(located(commodity));
                    }
                    TokenKind::Newline
                    | TokenKind::Semicolon
                    | TokenKind::LBrace
                    | TokenKind::DoubleLBrace
                    | TokenKind::At
                    | TokenKind::AtAt => {}
                    _ => {
                        self.diagnostics.error(
                            commodity.line,
                            commodity.column,
                            format!("invalid commodity: {}", commodity.text),
                        );
                        return None;
                    }
                }
            }
            TokenKind::Newline | TokenKind::Semicolon => {}
            _ => {
                self.diagnostics.error(
                    amount.line,
                    amount.column,
                    format!("invalid amount: {}", amount.text),
                );
                return None;
            }
        }

        if c.at(TokenKind::LBrace) || c.at(TokenKind::DoubleLBrace) {
            posting.cost = Some(self.cost(&mut c)?);
        }

        if c.at(TokenKind::At) || c.at(TokenKind::AtAt) {
            posting.price = Some(self.price(&mut c)?);
        }

        if c.eat(TokenKind::Semicolon).is_some() {
            posting.meta = self.tags(&mut c, "in posting metadata")?;
        }

        if !c.at(TokenKind::Newline) {
            self.unexpected(c.peek(), "in posting");
            return None;
        }

        Some(posting)
    }

    fn amount_spec(&mut self, c: &mut Cursor<'_, '_>) -> AmountSpec {
        let quantity = c.bump();
        let commodity = c.bump();
        AmountSpec {
            quantity: located(quantity),
            commodity: commodity.text.to_string(),
        }
    }

    fn cost(&mut self, c: &mut Cursor<'_, '_>) -> Option<CostSpec> {
        let open = c.bump();
        let total = open.kind == TokenKind::DoubleLBrace;
        let close = if total {
            TokenKind::DoubleRBrace
        } else {
            TokenKind::RBrace
        };

        let mut spec = CostSpec {
            total,
            amount: None,
            fields: Vec::new(),
        };

        if c.eat(close).is_some() {
            return Some(spec);
        }

        // "amount, fields…" shape; otherwise the body is fields only.
        let after_amount = c.peek_nth(2).kind;
        if c.at(TokenKind::Number)
            && c.peek_nth(1).kind == TokenKind::Ident
            && (after_amount == close || after_amount == TokenKind::Comma)
        {
            spec.amount = Some(self.amount_spec(c));
            if c.eat(close).is_some() {
                return Some(spec);
            }
            c.bump();
        }

        loop {
            spec.fields.push(self.lot_field(c)?);

            let next = c.peek();
            if next.kind == TokenKind::Comma {
                c.bump();
            } else if next.kind == close {
                c.bump();
                return Some(spec);
            } else {
                self.unexpected(next, "in cost annotation");
                return None;
            }
        }
    }

    fn lot_field(&mut self, c: &mut Cursor<'_, '_>) -> Option<LotFieldSpec> {
        let token = c.peek();
        match token.kind {
            TokenKind::PathLike => {
                c.bump();
                match token.text.split_once(':') {
                    Some((key, rest)) if is_identifier(key) => {
                        let column = token.column + key.chars().count() + 1;
                        let value = self.embedded_lot_value(c, rest, token.line, column)?;
                        Some(LotFieldSpec {
                            key: Some(key.to_string()),
                            value,
                        })
                    }
                    _ => Some(LotFieldSpec {
                        key: None,
                        value: LotValueSpec::Path(token.text.to_string()),
                    }),
                }
            }
            TokenKind::Ident if c.peek_nth(1).kind == TokenKind::Colon => {
                c.bump();
                c.bump();
                Some(LotFieldSpec {
                    key: Some(token.text.to_string()),
                    value: self.lot_value(c)?,
                })
            }
            _ => Some(LotFieldSpec {
                key: None,
                value: self.lot_value(c)?,
            }),
        }
    }

    fn lot_value(&mut self, c: &mut Cursor<'_, '_>) -> Option<LotValueSpec> {
        let token = c.peek();
        let value = match token.kind {
            TokenKind::Number if c.peek_nth(1).kind == TokenKind::Ident => {
                LotValueSpec::Amount(self.amount_spec(c))
            }
            TokenKind::Number => {
                c.bump();
                LotValueSpec::Number(located(token))
            }
            TokenKind::DateTime => {
                c.bump();
                LotValueSpec::DateTime(self.datetime(token)?)
            }
            TokenKind::Quoted => {
                c.bump();
                LotValueSpec::Quoted(unquote(token.text))
            }
            TokenKind::PathLike => {
                c.bump();
                LotValueSpec::Path(token.text.to_string())
            }
            TokenKind::Ident | TokenKind::Unknown => {
                c.bump();
                LotValueSpec::Ident(token.text.to_string())
            }
            _ => {
                self.unexpected(token, "in cost annotation");
                return None;
            }
        };
        Some(value)
    }

    /// Value glued to its key inside one path-like token, e.g. `fee:0.10`.
    fn embedded_lot_value(
        &mut self,
        c: &mut Cursor<'_, '_>,
        text: &str,
        line: usize,
        column: usize,
    ) -> Option<LotValueSpec> {
        let quantity = || Located::new(text.to_string(), line, column);
        let value = match classify(text) {
            TokenKind::Number if c.at(TokenKind::Ident) => LotValueSpec::Amount(AmountSpec {
                quantity: quantity(),
                commodity: c.bump().text.to_string(),
            }),
            TokenKind::Number => LotValueSpec::Number(quantity()),
            TokenKind::DateTime => match text.parse::<LedgerDateTime>() {
                Ok(datetime) => LotValueSpec::DateTime(datetime),
                Err(message) => {
                    self.diagnostics.error(line, column, message);
                    return None;
                }
            },
            TokenKind::PathLike => LotValueSpec::Path(text.to_string()),
            _ => LotValueSpec::Ident(text.to_string()),
        };
        Some(value)
    }

    fn price(&mut self, c: &mut Cursor<'_, '_>) -> Option<PriceSpec> {
        let at = c.bump();
        if c.at(TokenKind::Number) && c.peek_nth(1).kind == TokenKind::Ident {
            Some(PriceSpec {
                total: at.kind == TokenKind::AtAt,
                amount: self.amount_spec(c),
            })
        } else {
            self.diagnostics.error(
                at.line,
                at.column,
                "invalid price annotation: expected amount and commodity",
            );
            None
        }
    }
}
