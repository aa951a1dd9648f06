use super::engine::check_call;
use super::lexer::{Spanned, Token, tokenize};
use crate::ast::{BinaryOp, Constant, Expr, Program, Statement, UnaryOp};
use crate::error::ParseError;

/// Binding power of prefix `-`/`+`: tighter than `*`, looser than `^`.
const PREFIX_BP: u8 = 5;
const MEMBER_BP: u8 = 10;
/// Deepest expression tree the parser builds.
const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Bracket nesting depth; line breaks are insignificant inside brackets.
    depth: usize,
    nesting: usize,
}

impl Parser {
    fn index(&self) -> usize {
        let mut i = self.pos;
        if self.depth > 0 {
            while matches!(self.tokens[i].token, Token::Newline) {
                i += 1;
            }
        }
        i
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.index()].token
    }

    fn peek_nth(&self, n: usize) -> &Token {
        let i = (self.index() + n).min(self.tokens.len() - 1);
        &self.tokens[i].token
    }

    fn advance(&mut self) -> Spanned {
        let i = self.index();
        let spanned = self.tokens[i].clone();
        if !matches!(spanned.token, Token::Eof) {
            self.pos = i + 1;
        }
        spanned
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let spanned = &self.tokens[self.index()];
        ParseError {
            message: message.into(),
            line: spanned.line,
            column: spanned.column,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(format!(
                "Expected {}, found {}",
                expected.describe(),
                self.peek().describe()
            )))
        }
    }

    fn skip_terminators(&mut self) {
        while matches!(self.peek(), Token::Semicolon | Token::Newline) {
            self.advance();
        }
    }

    fn program(&mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        self.skip_terminators();
        while !matches!(self.peek(), Token::Eof) {
            statements.push(self.statement()?);
            match self.peek() {
                Token::Semicolon | Token::Newline => self.skip_terminators(),
                Token::Eof => {}
                other => {
                    return Err(self.error_here(format!(
                        "Expected ';' or end of line, found {}",
                        other.describe()
                    )));
                }
            }
        }
        Ok(Program { statements })
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        if let (Token::Identifier(name), Token::Assign) = (self.peek(), self.peek_nth(1)) {
            if Constant::from_name(name).is_some() {
                return Err(self.error_here(format!("Cannot assign to constant '{}'", name)));
            }
            let target = name.clone();
            self.advance();
            self.advance();
            let (value, _) = self.expression(0)?;
            return Ok(Statement::Assign { target, value });
        }

        let (expr, _) = self.expression(0)?;
        if matches!(self.peek(), Token::Assign) {
            return Err(self.error_here("Assignment target must be a single identifier"));
        }
        Ok(Statement::Expr(expr))
    }

    fn too_deep(&self) -> ParseError {
        self.error_here(format!("Expression nests deeper than {} levels", MAX_DEPTH))
    }

    /// Parses one expression and returns it with its tree height.
    fn expression(&mut self, min_bp: u8) -> Result<(Expr, usize), ParseError> {
        self.nesting += 1;
        let result = if self.nesting > MAX_DEPTH {
            Err(self.too_deep())
        } else {
            self.expression_tail(min_bp)
        };
        self.nesting -= 1;
        result
    }

    fn expression_tail(&mut self, min_bp: u8) -> Result<(Expr, usize), ParseError> {
        let (mut lhs, mut height) = self.prefix()?;

        loop {
            if height > MAX_DEPTH {
                return Err(self.too_deep());
            }

            if matches!(self.peek(), Token::Dot) {
                if MEMBER_BP < min_bp {
                    break;
                }
                self.advance();
                let field = match self.advance().token {
                    Token::Identifier(field) => field,
                    other => {
                        return Err(self.error_here(format!(
                            "Expected member name after '.', found {}",
                            other.describe()
                        )));
                    }
                };
                lhs = Expr::Member {
                    object: Box::new(lhs),
                    field,
                };
                height += 1;
                continue;
            }

            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Subtract,
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                Token::Percent => BinaryOp::Modulo,
                Token::Caret => BinaryOp::Power,
                _ => break,
            };
            let (left_bp, right_bp) = op.binding_power();
            if left_bp < min_bp {
                break;
            }
            self.advance();
            let (rhs, rhs_height) = self.expression(right_bp)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
            height = height.max(rhs_height) + 1;
        }

        if height > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok((lhs, height))
    }

    fn prefix(&mut self) -> Result<(Expr, usize), ParseError> {
        let spanned = self.advance();
        match spanned.token {
            Token::Number(n) => Ok((Expr::Number(n), 1)),
            Token::Identifier(name) => {
                if matches!(self.peek(), Token::LParen) {
                    self.advance();
                    let args = self.delimited(Token::RParen, |p| p.expression(0))?;
                    check_call(&name, args.len()).map_err(|message| ParseError {
                        message,
                        line: spanned.line,
                        column: spanned.column,
                    })?;
                    let height = args.iter().map(|(_, h)| *h).max().unwrap_or(0) + 1;
                    return Ok((
                        Expr::Call {
                            function: name,
                            args: args.into_iter().map(|(arg, _)| arg).collect(),
                        },
                        height,
                    ));
                }
                Ok(match Constant::from_name(&name) {
                    Some(constant) => (Expr::Constant(constant), 1),
                    None => (Expr::Identifier(name), 1),
                })
            }
            Token::Minus => {
                let (operand, height) = self.expression(PREFIX_BP)?;
                Ok((Expr::Unary(UnaryOp::Negate, Box::new(operand)), height + 1))
            }
            Token::Plus => {
                let (operand, height) = self.expression(PREFIX_BP)?;
                Ok((Expr::Unary(UnaryOp::Plus, Box::new(operand)), height + 1))
            }
            Token::LParen => {
                self.depth += 1;
                let inner = self.expression(0);
                let closed = inner.and_then(|expr| self.expect(Token::RParen).map(|_| expr));
                self.depth -= 1;
                closed
            }
            Token::LBracket => {
                let items = self.delimited(Token::RBracket, |p| p.expression(0))?;
                let height = items.iter().map(|(_, h)| *h).max().unwrap_or(0) + 1;
                Ok((
                    Expr::Array(items.into_iter().map(|(item, _)| item).collect()),
                    height,
                ))
            }
            Token::LBrace => {
                let fields = self.delimited(Token::RBrace, |p| {
                    let key = match p.advance().token {
                        Token::Identifier(key) => key,
                        Token::Number(n) => n.to_string(),
                        other => {
                            return Err(p.error_here(format!(
                                "Expected object key, found {}",
                                other.describe()
                            )));
                        }
                    };
                    p.expect(Token::Colon)?;
                    Ok((key, p.expression(0)?))
                })?;
                let height = fields.iter().map(|(_, (_, h))| *h).max().unwrap_or(0) + 1;
                Ok((
                    Expr::Object(
                        fields
                            .into_iter()
                            .map(|(key, (value, _))| (key, value))
                            .collect(),
                    ),
                    height,
                ))
            }
            other => Err(ParseError {
                message: format!("Unexpected {}", other.describe()),
                line: spanned.line,
                column: spanned.column,
            }),
        }
    }

    /// Parses a comma-separated list up to `close`; the opening bracket has
    /// already been consumed. A trailing comma is accepted.
    fn delimited<T>(
        &mut self,
        close: Token,
        mut item: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        self.depth += 1;
        let result = self.delimited_items(close, &mut item);
        self.depth -= 1;
        result
    }

    fn delimited_items<T>(
        &mut self,
        close: Token,
        item: &mut impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let mut items = Vec::new();
        while *self.peek() != close {
            items.push(item(self)?);
            if matches!(self.peek(), Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }
}

/// Parses expression source text into a statement list.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(source)?;
    Parser {
        tokens,
        pos: 0,
        depth: 0,
        nesting: 0,
    }
    .program()
}
