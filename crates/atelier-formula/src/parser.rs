use crate::engine::{FormulaError, FormulaResult};

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Braced reference `{field_name}`, matched against the raw row key.
    Field(String),
    /// Bare identifier, matched against normalized row keys.
    Identifier(String),
    /// `PARAM.<name>` external parameter.
    Param(String),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Plus,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equals,
    NotEquals,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    And,
    Or,
}

impl Expr {
    /// Visit every field reference (braced or bare) in evaluation-independent order.
    pub(crate) fn visit_references<'a>(&'a self, out: &mut impl FnMut(&'a str)) {
        match self {
            Expr::Field(name) | Expr::Identifier(name) => out(name),
            Expr::Number(_) | Expr::Text(_) | Expr::Boolean(_) | Expr::Param(_) => {}
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.visit_references(out);
                }
            }
            Expr::UnaryOp { expr, .. } => expr.visit_references(out),
            Expr::BinaryOp { left, right, .. } => {
                left.visit_references(out);
                right.visit_references(out);
            }
        }
    }
}

const PARAM_PREFIX: &str = "PARAM.";

/// Deepest expression tree the parser builds. Parentheses, unary operators, call arguments and
/// each chained binary operator count as one level.
pub const MAX_EXPRESSION_DEPTH: usize = 256;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Identifier(String),
    Field(String),
    Number(f64),
    String(String),
    Comma,
    Semicolon,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Bang,
    Equals,
    NotEquals,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    AndAnd,
    OrOr,
    Eof,
}

struct Lexer<'a> {
    input: &'a str,
    chars: std::str::Chars<'a>,
    peeked: Option<char>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        let mut chars = input.chars();
        let peeked = chars.next();
        Self {
            input,
            chars,
            peeked,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let current = self.peeked.take();
        self.peeked = self.chars.next();
        current
    }

    fn peek(&self) -> Option<char> {
        self.peeked
    }

    fn consume_while<F>(&mut self, mut predicate: F) -> String
    where
        F: FnMut(char) -> bool,
    {
        let mut buf = String::new();
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            buf.push(ch);
            self.bump();
        }
        buf
    }

    fn skip_whitespace(&mut self) {
        self.consume_while(char::is_whitespace);
    }

    /// Consume `second` if it is next, returning `double`, otherwise `single`.
    fn one_or_two(&mut self, second: char, double: Token, single: Token) -> Token {
        if self.peek() == Some(second) {
            self.bump();
            double
        } else {
            single
        }
    }

    fn next_token(&mut self) -> FormulaResult<Token> {
        self.skip_whitespace();
        let Some(ch) = self.peek() else {
            return Ok(Token::Eof);
        };

        match ch {
            '(' => {
                self.bump();
                Ok(Token::LParen)
            }
            ')' => {
                self.bump();
                Ok(Token::RParen)
            }
            ',' => {
                self.bump();
                Ok(Token::Comma)
            }
            ';' => {
                self.bump();
                Ok(Token::Semicolon)
            }
            '+' => {
                self.bump();
                Ok(Token::Plus)
            }
            '-' => {
                self.bump();
                Ok(Token::Minus)
            }
            '*' => {
                self.bump();
                Ok(Token::Star)
            }
            '/' => {
                self.bump();
                Ok(Token::Slash)
            }
            '=' => {
                self.bump();
                // `=` and `==` are the same comparison.
                Ok(self.one_or_two('=', Token::Equals, Token::Equals))
            }
            '!' => {
                self.bump();
                Ok(self.one_or_two('=', Token::NotEquals, Token::Bang))
            }
            '<' => {
                self.bump();
                match self.peek() {
                    Some('=') => {
                        self.bump();
                        Ok(Token::LessEquals)
                    }
                    Some('>') => {
                        self.bump();
                        Ok(Token::NotEquals)
                    }
                    _ => Ok(Token::Less),
                }
            }
            '>' => {
                self.bump();
                Ok(self.one_or_two('=', Token::GreaterEquals, Token::Greater))
            }
            '&' => {
                self.bump();
                if self.peek() == Some('&') {
                    self.bump();
                    Ok(Token::AndAnd)
                } else {
                    Err(FormulaError::Parse(format!(
                        "unexpected character '&' in {:?}",
                        self.input
                    )))
                }
            }
            '|' => {
                self.bump();
                if self.peek() == Some('|') {
                    self.bump();
                    Ok(Token::OrOr)
                } else {
                    Err(FormulaError::Parse(format!(
                        "unexpected character '|' in {:?}",
                        self.input
                    )))
                }
            }
            '"' | '\'' => {
                let quote = ch;
                self.bump();
                let mut out = String::new();
                loop {
                    match self.bump() {
                        None => return Err(FormulaError::Parse("unterminated string".into())),
                        Some(c) if c == quote => break,
                        Some('\\') => match self.bump() {
                            Some('n') => out.push('\n'),
                            Some('t') => out.push('\t'),
                            Some(other) => out.push(other),
                            None => {
                                return Err(FormulaError::Parse("unterminated string".into()))
                            }
                        },
                        Some(c) => out.push(c),
                    }
                }
                Ok(Token::String(out))
            }
            '{' => {
                self.bump();
                let mut out = String::new();
                loop {
                    match self.bump() {
                        None => {
                            return Err(FormulaError::Parse(
                                "unterminated field reference".into(),
                            ))
                        }
                        Some('}') => break,
                        Some('{') => {
                            return Err(FormulaError::Parse(
                                "nested '{' in field reference".into(),
                            ))
                        }
                        Some(c) => out.push(c),
                    }
                }
                let name = out.trim();
                if name.is_empty() {
                    return Err(FormulaError::Parse("empty field reference {}".into()));
                }
                Ok(Token::Field(name.to_string()))
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut num_str = self.consume_while(|c| c.is_ascii_digit() || c == '.');
                // Support exponent notation like `1e3` / `1E-3`.
                if matches!(self.peek(), Some('e' | 'E')) {
                    if let Some(exp) = self.bump() {
                        num_str.push(exp);
                    }
                    if matches!(self.peek(), Some('+' | '-')) {
                        if let Some(sign) = self.bump() {
                            num_str.push(sign);
                        }
                    }
                    let exp_digits = self.consume_while(|c| c.is_ascii_digit());
                    if exp_digits.is_empty() {
                        return Err(FormulaError::Parse(format!(
                            "invalid number {num_str:?} (expected exponent digits)"
                        )));
                    }
                    num_str.push_str(&exp_digits);
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| FormulaError::Parse(format!("invalid number {num_str:?}")))?;
                Ok(Token::Number(num))
            }
            c if is_ident_start(c) => Ok(Token::Identifier(self.consume_while(is_ident_part))),
            other => Err(FormulaError::Parse(format!(
                "unexpected character {other:?} in {:?}",
                self.input
            ))),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_part(c: char) -> bool {
    // `.` is part of identifiers so `PARAM.coef` lexes as one token.
    c.is_alphanumeric() || c == '_' || c == '.'
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Token,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> FormulaResult<Self> {
        let mut lexer = Lexer::new(input);
        let lookahead = lexer.next_token()?;
        Ok(Self {
            lexer,
            lookahead,
            depth: 0,
        })
    }

    fn bump(&mut self) -> FormulaResult<Token> {
        let current = std::mem::replace(&mut self.lookahead, Token::Eof);
        self.lookahead = self.lexer.next_token()?;
        Ok(current)
    }

    fn expect(&mut self, token: Token) -> FormulaResult<()> {
        if self.lookahead == token {
            self.bump()?;
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "expected {token:?}, found {:?}",
                self.lookahead
            )))
        }
    }

    fn parse(&mut self) -> FormulaResult<Expr> {
        let expr = self.parse_expr(0)?;
        if self.lookahead != Token::Eof {
            return Err(FormulaError::Parse(format!(
                "unexpected token {:?}",
                self.lookahead
            )));
        }
        Ok(expr)
    }

    fn descend(&mut self) -> FormulaResult<()> {
        self.depth += 1;
        if self.depth > MAX_EXPRESSION_DEPTH {
            return Err(FormulaError::Parse(format!(
                "expression nesting exceeds {MAX_EXPRESSION_DEPTH} levels"
            )));
        }
        Ok(())
    }

    fn parse_expr(&mut self, min_prec: u8) -> FormulaResult<Expr> {
        let entry_depth = self.depth;
        self.descend()?;
        let mut left = self.parse_prefix()?;
        while let Some((op, prec)) = self.infix_binding_power() {
            if prec < min_prec {
                break;
            }
            self.bump()?;
            self.descend()?;
            let right = self.parse_expr(prec + 1)?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = entry_depth;
        Ok(left)
    }

    fn parse_prefix(&mut self) -> FormulaResult<Expr> {
        let unary = match self.lookahead {
            Token::Minus => Some(UnaryOp::Negate),
            Token::Plus => Some(UnaryOp::Plus),
            Token::Bang => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = unary {
            self.bump()?;
            let expr = self.parse_expr(7)?;
            return Ok(Expr::UnaryOp {
                op,
                expr: Box::new(expr),
            });
        }

        match &self.lookahead {
            Token::Number(n) => {
                let n = *n;
                self.bump()?;
                Ok(Expr::Number(n))
            }
            Token::String(s) => {
                let s = s.clone();
                self.bump()?;
                Ok(Expr::Text(s))
            }
            Token::Field(name) => {
                let name = name.clone();
                self.bump()?;
                Ok(Expr::Field(name))
            }
            Token::Identifier(_) => self.parse_ident_like(),
            Token::LParen => {
                self.bump()?;
                let inner = self.parse_expr(0)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(FormulaError::Parse(format!(
                "unexpected token in expression: {other:?}"
            ))),
        }
    }

    fn parse_ident_like(&mut self) -> FormulaResult<Expr> {
        let Token::Identifier(ident) = self.bump()? else {
            return Err(FormulaError::Parse("expected identifier".into()));
        };

        if self.lookahead == Token::LParen {
            self.bump()?;
            let mut args = Vec::new();
            if self.lookahead != Token::RParen {
                loop {
                    args.push(self.parse_expr(0)?);
                    if matches!(self.lookahead, Token::Comma | Token::Semicolon) {
                        self.bump()?;
                        continue;
                    }
                    break;
                }
            }
            self.expect(Token::RParen)?;
            return Ok(Expr::Call { name: ident, args });
        }

        if ident.eq_ignore_ascii_case("true") {
            return Ok(Expr::Boolean(true));
        }
        if ident.eq_ignore_ascii_case("false") {
            return Ok(Expr::Boolean(false));
        }
        if let Some(prefix) = ident.get(..PARAM_PREFIX.len()) {
            if prefix.eq_ignore_ascii_case(PARAM_PREFIX) {
                let name = &ident[PARAM_PREFIX.len()..];
                if name.is_empty() {
                    return Err(FormulaError::Parse("empty PARAM name".into()));
                }
                return Ok(Expr::Param(name.to_string()));
            }
        }
        Ok(Expr::Identifier(ident))
    }

    fn infix_binding_power(&self) -> Option<(BinaryOp, u8)> {
        // Higher binds tighter: `* /` > `+ -` > comparisons > `&&` > `||`.
        match self.lookahead {
            Token::OrOr => Some((BinaryOp::Or, 1)),
            Token::AndAnd => Some((BinaryOp::And, 2)),
            Token::Equals => Some((BinaryOp::Equals, 3)),
            Token::NotEquals => Some((BinaryOp::NotEquals, 3)),
            Token::Less => Some((BinaryOp::Less, 3)),
            Token::LessEquals => Some((BinaryOp::LessEquals, 3)),
            Token::Greater => Some((BinaryOp::Greater, 3)),
            Token::GreaterEquals => Some((BinaryOp::GreaterEquals, 3)),
            Token::Plus => Some((BinaryOp::Add, 5)),
            Token::Minus => Some((BinaryOp::Subtract, 5)),
            Token::Star => Some((BinaryOp::Multiply, 6)),
            Token::Slash => Some((BinaryOp::Divide, 6)),
            _ => None,
        }
    }
}

/// Parse a formula. A single leading `=` is accepted and ignored.
pub fn parse(input: &str) -> FormulaResult<Expr> {
    let trimmed = input.trim_start();
    let body = trimmed.strip_prefix('=').unwrap_or(trimmed);
    if body.trim().is_empty() {
        return Err(FormulaError::Parse("empty formula".into()));
    }
    Parser::new(body)?.parse()
}
