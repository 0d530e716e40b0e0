//! Expression lexer and recursive-descent parser.
//!
//! Identifier resolution happens at parse time against the owning engine:
//! function table first, then simple variables, then the external resolver,
//! then data-context binding paths. An identifier that matches none of them
//! is a parse error, so evaluation never sees an unresolved name.

use smallvec::SmallVec;

use chrono::NaiveDateTime;

use crate::ast::{BindingPath, BindingSeg, BinaryOp, Expr, UnaryOp};
use crate::error::{CalcError, CalcResult};
use crate::locale::LocaleConfig;
use crate::value::Value;
use crate::Engine;

#[derive(Debug, Clone)]
pub enum TokenKind {
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
    /// Raw text between balanced braces, outer braces stripped.
    SubContext(String),
    Ident(String),
    LParen,
    RParen,
    Comma,
    Dot,
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Pow,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Compare,
    AddSub,
    MulDiv,
    Power,
    Other,
}

impl TokenKind {
    fn category(&self) -> Category {
        match self {
            TokenKind::Eq
            | TokenKind::Ne
            | TokenKind::Lt
            | TokenKind::Gt
            | TokenKind::Le
            | TokenKind::Ge => Category::Compare,
            TokenKind::Add | TokenKind::Sub => Category::AddSub,
            TokenKind::Mul | TokenKind::Div | TokenKind::IntDiv => Category::MulDiv,
            TokenKind::Pow => Category::Power,
            _ => Category::Other,
        }
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        Some(match self {
            TokenKind::Add => BinaryOp::Add,
            TokenKind::Sub => BinaryOp::Sub,
            TokenKind::Mul => BinaryOp::Mul,
            TokenKind::Div => BinaryOp::Div,
            TokenKind::IntDiv => BinaryOp::IntDiv,
            TokenKind::Pow => BinaryOp::Pow,
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::Ne => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Ge => BinaryOp::Ge,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    locale: &'a LocaleConfig,
    identifier_chars: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(text: &str, locale: &'a LocaleConfig, identifier_chars: &'a str) -> Self {
        Lexer {
            chars: text.chars().collect(),
            pos: 0,
            locale,
            identifier_chars,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn is_ident_start(&self, c: char) -> bool {
        unicode_ident::is_xid_start(c) || c == '_' || self.identifier_chars.contains(c)
    }

    fn is_ident_continue(&self, c: char) -> bool {
        unicode_ident::is_xid_continue(c) || c == '_' || self.identifier_chars.contains(c)
    }

    fn next_token(&mut self) -> CalcResult<Token> {
        while matches!(self.peek(), Some(c) if c <= ' ') {
            self.pos += 1;
        }
        let start = self.pos;
        let c = match self.peek() {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::End,
                    pos: start,
                })
            }
        };

        // Numbers win over the dot operator for leading-decimal literals.
        if c.is_ascii_digit()
            || (c == self.locale.decimal_separator
                && matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()))
        {
            let kind = self.lex_number()?;
            return Ok(Token { kind, pos: start });
        }

        // Two-character comparison operators before their one-character prefixes.
        if c == '<' || c == '>' {
            let kind = match (c, self.peek_at(1)) {
                ('<', Some('=')) => {
                    self.pos += 2;
                    TokenKind::Le
                }
                ('<', Some('>')) => {
                    self.pos += 2;
                    TokenKind::Ne
                }
                ('>', Some('=')) => {
                    self.pos += 2;
                    TokenKind::Ge
                }
                ('<', _) => {
                    self.pos += 1;
                    TokenKind::Lt
                }
                (_, _) => {
                    self.pos += 1;
                    TokenKind::Gt
                }
            };
            return Ok(Token { kind, pos: start });
        }

        if c == self.locale.list_separator {
            self.pos += 1;
            return Ok(Token {
                kind: TokenKind::Comma,
                pos: start,
            });
        }

        let simple = match c {
            '+' => Some(TokenKind::Add),
            '-' => Some(TokenKind::Sub),
            '*' => Some(TokenKind::Mul),
            '/' => Some(TokenKind::Div),
            '\\' => Some(TokenKind::IntDiv),
            '^' => Some(TokenKind::Pow),
            '=' => Some(TokenKind::Eq),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '.' => Some(TokenKind::Dot),
            _ => None,
        };
        if let Some(kind) = simple {
            self.pos += 1;
            return Ok(Token { kind, pos: start });
        }

        if c == '"' || c == '\'' {
            let kind = self.lex_string(c)?;
            return Ok(Token { kind, pos: start });
        }

        if c == '#' {
            let kind = self.lex_date()?;
            return Ok(Token { kind, pos: start });
        }

        if c == '{' {
            let kind = self.lex_sub_context()?;
            return Ok(Token { kind, pos: start });
        }

        if self.is_ident_start(c) {
            let mut name = String::new();
            while let Some(c) = self.peek() {
                if self.is_ident_continue(c) {
                    name.push(c);
                    self.pos += 1;
                } else {
                    break;
                }
            }
            return Ok(Token {
                kind: TokenKind::Ident(name),
                pos: start,
            });
        }

        Err(CalcError::syntax(format!("unexpected character '{c}'"), start))
    }

    fn lex_number(&mut self) -> CalcResult<TokenKind> {
        let start = self.pos;
        let mut value = 0f64;
        let mut div = -1f64;
        let mut scientific = false;
        let mut percent = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                value = value * 10.0 + (c as u8 - b'0') as f64;
                if div > -1.0 {
                    div *= 10.0;
                }
                self.pos += 1;
            } else if c == self.locale.decimal_separator && div < 0.0 {
                div = 1.0;
                self.pos += 1;
            } else if (c == 'e' || c == 'E')
                && matches!(self.peek_at(1), Some(d) if d.is_ascii_digit() || d == '+' || d == '-')
            {
                scientific = true;
                self.pos += 2;
                while matches!(self.peek(), Some(d) if d.is_ascii_digit()) {
                    self.pos += 1;
                }
                break;
            } else if c == self.locale.percent_symbol {
                percent = true;
                self.pos += 1;
                break;
            } else {
                break;
            }
        }
        let mut n = if scientific {
            let text: String = self.chars[start..self.pos].iter().collect();
            self.locale
                .parse_number(&text)
                .ok_or_else(|| CalcError::syntax(format!("invalid number '{text}'"), start))?
        } else if div > 0.0 {
            value / div
        } else {
            value
        };
        if percent {
            n /= 100.0;
        }
        Ok(TokenKind::Number(n))
    }

    fn lex_string(&mut self, quote: char) -> CalcResult<TokenKind> {
        let start = self.pos;
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(CalcError::syntax("unterminated string literal", start)),
                Some(c) if c == quote => {
                    // Doubled delimiter escapes a literal quote character.
                    if self.peek_at(1) == Some(quote) {
                        text.push(quote);
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        break;
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
        Ok(TokenKind::Text(text))
    }

    fn lex_date(&mut self) -> CalcResult<TokenKind> {
        let start = self.pos;
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(CalcError::syntax("unterminated date literal", start)),
                Some('#') => {
                    self.pos += 1;
                    break;
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
        match self.locale.parse_date(&text) {
            Some(date) => Ok(TokenKind::Date(date)),
            None => Err(CalcError::syntax(format!("invalid date '{text}'"), start)),
        }
    }

    /// Captures everything between balanced braces without interpreting it;
    /// the sub-context functions re-parse it against their own engine.
    fn lex_sub_context(&mut self) -> CalcResult<TokenKind> {
        let start = self.pos;
        self.pos += 1;
        let mut depth = 1usize;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(CalcError::syntax("unterminated '{' block", start)),
                Some('{') => {
                    depth += 1;
                    text.push('{');
                    self.pos += 1;
                }
                Some('}') => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        break;
                    }
                    text.push('}');
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
        Ok(TokenKind::SubContext(text))
    }
}

pub(crate) fn parse(engine: &Engine, text: &str) -> CalcResult<Expr> {
    let mut parser = Parser::new(engine, text)?;
    let expr = parser.parse_compare()?;
    if !matches!(parser.token.kind, TokenKind::End) {
        return Err(CalcError::syntax(
            "unexpected input after expression",
            parser.token.pos,
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    engine: &'a Engine,
    lexer: Lexer<'a>,
    token: Token,
}

impl<'a> Parser<'a> {
    fn new(engine: &'a Engine, text: &str) -> CalcResult<Self> {
        let mut lexer = Lexer::new(text, engine.locale(), engine.identifier_chars());
        let token = lexer.next_token()?;
        Ok(Parser {
            engine,
            lexer,
            token,
        })
    }

    fn advance(&mut self) -> CalcResult<()> {
        self.token = self.lexer.next_token()?;
        Ok(())
    }

    fn parse_compare(&mut self) -> CalcResult<Expr> {
        let mut lhs = self.parse_add_sub()?;
        while self.token.kind.category() == Category::Compare {
            let op = self.token.kind.binary_op().unwrap_or(BinaryOp::Eq);
            self.advance()?;
            let rhs = self.parse_add_sub()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_add_sub(&mut self) -> CalcResult<Expr> {
        let mut lhs = self.parse_mul_div()?;
        while self.token.kind.category() == Category::AddSub {
            let op = self.token.kind.binary_op().unwrap_or(BinaryOp::Add);
            self.advance()?;
            let rhs = self.parse_mul_div()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul_div(&mut self) -> CalcResult<Expr> {
        let mut lhs = self.parse_power()?;
        while self.token.kind.category() == Category::MulDiv {
            let op = self.token.kind.binary_op().unwrap_or(BinaryOp::Mul);
            self.advance()?;
            let rhs = self.parse_power()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_power(&mut self) -> CalcResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while self.token.kind.category() == Category::Power {
            self.advance()?;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(BinaryOp::Pow, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> CalcResult<Expr> {
        match self.token.kind {
            TokenKind::Add => {
                self.advance()?;
                let operand = self.parse_atom()?;
                Ok(Expr::Unary(UnaryOp::Plus, Box::new(operand)))
            }
            TokenKind::Sub => {
                self.advance()?;
                let operand = self.parse_atom()?;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)))
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> CalcResult<Expr> {
        let token = self.token.clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance()?;
                Ok(Expr::Literal(Value::Number(n)))
            }
            TokenKind::Text(s) => {
                self.advance()?;
                Ok(Expr::Literal(Value::Text(s)))
            }
            TokenKind::Date(d) => {
                self.advance()?;
                Ok(Expr::Literal(Value::Date(d)))
            }
            TokenKind::SubContext(s) => {
                self.advance()?;
                Ok(Expr::Literal(Value::Text(s)))
            }
            TokenKind::LParen => {
                self.advance()?;
                let inner = self.parse_compare()?;
                self.expect_rparen(token.pos)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                self.advance()?;
                self.resolve_identifier(name, token.pos)
            }
            _ => Err(CalcError::syntax("expected an expression", token.pos)),
        }
    }

    fn resolve_identifier(&mut self, name: String, pos: usize) -> CalcResult<Expr> {
        if let Some(def) = self.engine.lookup_function(&name) {
            let args = self.parse_args()?;
            if args.len() < def.min_args || args.len() > def.max_args {
                return Err(CalcError::Arity {
                    name: def.name.clone(),
                    min: def.min_args,
                    max: def.max_args,
                    got: args.len(),
                });
            }
            return Ok(Expr::Function(def, args));
        }

        // Plain variable slots resolve directly; a trailing member path means
        // the name has to bind through the data context instead.
        if self.engine.has_variable(&name) && !matches!(self.token.kind, TokenKind::Dot) {
            return Ok(Expr::Variable(name));
        }

        if let Some(value) = self.engine.resolve_external(&name) {
            return Ok(Expr::External(value));
        }

        if self.engine.data_context().is_some() {
            return self.parse_binding_path(name);
        }

        Err(CalcError::UnknownIdentifier(format!(
            "{name} (at position {pos})"
        )))
    }

    fn parse_binding_path(&mut self, first: String) -> CalcResult<Expr> {
        let mut segments: SmallVec<[BindingSeg; 2]> = SmallVec::new();
        let args = self.parse_args()?;
        segments.push(BindingSeg { name: first, args });
        while matches!(self.token.kind, TokenKind::Dot) {
            self.advance()?;
            let name = match &self.token.kind {
                TokenKind::Ident(name) => name.clone(),
                _ => {
                    return Err(CalcError::syntax(
                        "expected a member name after '.'",
                        self.token.pos,
                    ))
                }
            };
            self.advance()?;
            let args = self.parse_args()?;
            segments.push(BindingSeg { name, args });
        }
        Ok(Expr::Binding(BindingPath { segments }))
    }

    /// Parses an optional parenthesized argument list. A bare identifier
    /// (no parens) means zero arguments.
    fn parse_args(&mut self) -> CalcResult<Vec<Expr>> {
        if !matches!(self.token.kind, TokenKind::LParen) {
            return Ok(Vec::new());
        }
        let open_pos = self.token.pos;
        self.advance()?;
        if matches!(self.token.kind, TokenKind::RParen) {
            self.advance()?;
            return Ok(Vec::new());
        }
        let mut args = Vec::new();
        loop {
            args.push(self.parse_compare()?);
            match self.token.kind {
                TokenKind::Comma => self.advance()?,
                TokenKind::RParen => {
                    self.advance()?;
                    break;
                }
                _ => {
                    return Err(CalcError::syntax(
                        "expected ',' or ')' in argument list",
                        open_pos,
                    ))
                }
            }
        }
        Ok(args)
    }

    fn expect_rparen(&mut self, open_pos: usize) -> CalcResult<()> {
        if matches!(self.token.kind, TokenKind::RParen) {
            self.advance()
        } else {
            Err(CalcError::syntax("unbalanced parenthesis", open_pos))
        }
    }
}
