use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Assign,
    Comma,
    Colon,
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Newline,
    Eof,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::Newline => "end of line".to_string(),
            Token::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Caret => "^",
            Token::Assign => "=",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Dot => ".",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Semicolon => ";",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    source: &'a str,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            source,
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    /// The character after the next one, without consuming anything.
    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, c)| c)
    }

    fn error(&self, message: String, line: usize, column: usize) -> ParseError {
        ParseError {
            message,
            line,
            column,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek_char() {
            let (line, column) = (self.line, self.column);
            let token = match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                    continue;
                }
                '#' => {
                    while matches!(self.peek_char(), Some(c) if c != '\n') {
                        self.bump();
                    }
                    continue;
                }
                '\n' => {
                    self.bump();
                    Token::Newline
                }
                '0'..='9' => self.number()?,
                '.' if matches!(self.peek_second(), Some('0'..='9')) => self.number()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.identifier(),
                _ => {
                    self.bump();
                    match c {
                        '+' => Token::Plus,
                        '-' => Token::Minus,
                        '*' => Token::Star,
                        '/' => Token::Slash,
                        '%' => Token::Percent,
                        '^' => Token::Caret,
                        '=' => Token::Assign,
                        ',' => Token::Comma,
                        ':' => Token::Colon,
                        '.' => Token::Dot,
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        '{' => Token::LBrace,
                        '}' => Token::RBrace,
                        '[' => Token::LBracket,
                        ']' => Token::RBracket,
                        ';' => Token::Semicolon,
                        other => {
                            return Err(self.error(
                                format!("Unexpected character '{}'", other),
                                line,
                                column,
                            ));
                        }
                    }
                }
            };
            tokens.push(Spanned {
                token,
                line,
                column,
            });
        }
        tokens.push(Spanned {
            token: Token::Eof,
            line: self.line,
            column: self.column,
        });
        Ok(tokens)
    }

    fn number(&mut self) -> Result<Token, ParseError> {
        let (line, column) = (self.line, self.column);
        let start = self.chars.peek().map_or(self.source.len(), |(i, _)| *i);
        let mut end = start;
        let mut seen_dot = false;

        while let Some((i, c)) = self.chars.peek().copied() {
            match c {
                '0'..='9' => {}
                '.' if !seen_dot && matches!(self.peek_second(), Some('0'..='9')) => {
                    seen_dot = true;
                }
                'e' | 'E' => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    let exponent_follows = match ahead.next().map(|(_, c)| c) {
                        Some('0'..='9') => true,
                        Some('+') | Some('-') => {
                            matches!(ahead.next().map(|(_, c)| c), Some('0'..='9'))
                        }
                        _ => false,
                    };
                    if !exponent_follows {
                        break;
                    }
                    self.bump();
                    if let Some('+') | Some('-') = self.peek_char() {
                        self.bump();
                    }
                    while let Some((j, '0'..='9')) = self.chars.peek().copied() {
                        end = j + 1;
                        self.bump();
                    }
                    break;
                }
                _ => break,
            }
            end = i + c.len_utf8();
            self.bump();
        }

        let text = &self.source[start..end];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(format!("Invalid number '{}'", text), line, column))
    }

    fn identifier(&mut self) -> Token {
        let mut name = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Token::Identifier(name)
    }
}

/// Splits expression source into tokens, always terminated by [`Token::Eof`].
pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    Lexer::new(source).tokenize()
}
