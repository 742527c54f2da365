//! Parser for the textual program format
//!
//! Clauses are terminated by `.`, heads and bodies separated by `:-`,
//! premises by commas. `=` and `!=` are (dis)unifications, `not` prefixes a
//! negated atom, `_` is an anonymous variable, identifiers beginning with an
//! uppercase letter are variables and lowercase identifiers are
//! constants/predicate names. Queries are atoms terminated by `?`. `%`
//! starts a line comment.

use crate::error::{Error, Result};
use crate::interner::Interner;
use crate::types::{Atom, Clause, Premise, Term};

/// A parsed program: clauses plus any embedded queries
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Clauses in source order
    pub clauses: Vec<Clause>,
    /// Query atoms (`p(...)?`) in source order
    pub queries: Vec<Atom>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Variable(String),
    LParen,
    RParen,
    Comma,
    Dot,
    Question,
    Arrow,
    Eq,
    Neq,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) | Token::Variable(s) => format!("'{}'", s),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Comma => "','".into(),
            Token::Dot => "'.'".into(),
            Token::Question => "'?'".into(),
            Token::Arrow => "':-'".into(),
            Token::Eq => "'='".into(),
            Token::Neq => "'!='".into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
    column: usize,
}

/// Parse a program in the textual format
pub fn parse_program(input: &str, interner: &Interner) -> Result<Program> {
    let tokens = Lexer::new(input).tokenize()?;
    Parser {
        tokens,
        pos: 0,
        interner,
        fresh: 0,
    }
    .parse()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Lexer {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, column: usize, message: String) -> Error {
        Error::Parse {
            line,
            column,
            message,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            let (line, column) = (self.line, self.column);

            if c.is_whitespace() {
                self.bump();
                continue;
            }
            if c == '%' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
                continue;
            }

            let token = match c {
                '(' => {
                    self.bump();
                    Token::LParen
                }
                ')' => {
                    self.bump();
                    Token::RParen
                }
                ',' => {
                    self.bump();
                    Token::Comma
                }
                '.' => {
                    self.bump();
                    Token::Dot
                }
                '?' => {
                    self.bump();
                    Token::Question
                }
                '=' => {
                    self.bump();
                    Token::Eq
                }
                '!' => {
                    self.bump();
                    if self.peek() != Some('=') {
                        return Err(self.error(line, column, "expected '=' after '!'".into()));
                    }
                    self.bump();
                    Token::Neq
                }
                ':' => {
                    self.bump();
                    if self.peek() != Some('-') {
                        return Err(self.error(line, column, "expected '-' after ':'".into()));
                    }
                    self.bump();
                    Token::Arrow
                }
                c if c.is_alphanumeric() || c == '_' => {
                    let mut word = String::new();
                    while let Some(c) = self.peek() {
                        if c.is_alphanumeric() || c == '_' {
                            word.push(c);
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    if c.is_uppercase() || word == "_" {
                        Token::Variable(word)
                    } else if c == '_' {
                        return Err(self.error(
                            line,
                            column,
                            format!("identifier '{}' may not begin with '_'", word),
                        ));
                    } else {
                        Token::Ident(word)
                    }
                }
                c => {
                    return Err(self.error(line, column, format!("unexpected character '{}'", c)));
                }
            };

            tokens.push(Spanned {
                token,
                line,
                column,
            });
        }

        Ok(tokens)
    }
}

struct Parser<'a> {
    tokens: Vec<Spanned>,
    pos: usize,
    interner: &'a Interner,
    fresh: usize,
}

impl<'a> Parser<'a> {
    fn parse(mut self) -> Result<Program> {
        let mut program = Program::default();

        while self.pos < self.tokens.len() {
            let head = self.parse_atom()?;
            match self.next()? {
                (Token::Dot, ..) => program.clauses.push(Clause::fact(head)),
                (Token::Question, ..) => program.queries.push(head),
                (Token::Arrow, ..) => {
                    let mut body = vec![self.parse_premise()?];
                    loop {
                        match self.next()? {
                            (Token::Comma, ..) => body.push(self.parse_premise()?),
                            (Token::Dot, ..) => break,
                            (token, line, column) => {
                                return Err(unexpected(&token, line, column, "',' or '.'"));
                            }
                        }
                    }
                    program.clauses.push(Clause::new(head, body));
                }
                (token, line, column) => {
                    return Err(unexpected(&token, line, column, "'.', '?' or ':-'"));
                }
            }
        }

        Ok(program)
    }

    fn parse_premise(&mut self) -> Result<Premise> {
        match self.peek()? {
            Token::Ident(word) if word == "not" => {
                self.pos += 1;
                Ok(Premise::Negated(self.parse_atom()?))
            }
            Token::Variable(_) => {
                let left = self.parse_term()?;
                self.parse_comparison(left)
            }
            Token::Ident(_) => {
                let name = match self.next()? {
                    (Token::Ident(name), ..) => name,
                    _ => unreachable!("peeked an identifier"),
                };
                // A lowercase identifier is a constant when followed by a
                // comparison operator, otherwise an atom.
                match self.peek_token() {
                    Some(Token::Eq) | Some(Token::Neq) => {
                        let left = Term::constant(self.interner.constant(&name));
                        self.parse_comparison(left)
                    }
                    Some(Token::LParen) => {
                        let terms = self.parse_args()?;
                        let pred = self.interner.predicate(&name, terms.len());
                        Ok(Premise::Atom(Atom::new(pred, terms)))
                    }
                    _ => {
                        let pred = self.interner.predicate(&name, 0);
                        Ok(Premise::Atom(Atom::new(pred, vec![])))
                    }
                }
            }
            _ => {
                let (token, line, column) = self.next()?;
                Err(unexpected(&token, line, column, "a premise"))
            }
        }
    }

    fn parse_comparison(&mut self, left: Term) -> Result<Premise> {
        match self.next()? {
            (Token::Eq, ..) => Ok(Premise::Unify(left, self.parse_term()?)),
            (Token::Neq, ..) => Ok(Premise::Disunify(left, self.parse_term()?)),
            (token, line, column) => Err(unexpected(&token, line, column, "'=' or '!='")),
        }
    }

    fn parse_atom(&mut self) -> Result<Atom> {
        let name = match self.next()? {
            (Token::Ident(name), ..) => name,
            (token, line, column) => {
                return Err(unexpected(&token, line, column, "a predicate name"));
            }
        };
        let terms = if self.peek_token() == Some(&Token::LParen) {
            self.parse_args()?
        } else {
            vec![]
        };
        let pred = self.interner.predicate(&name, terms.len());
        Ok(Atom::new(pred, terms))
    }

    fn parse_args(&mut self) -> Result<Vec<Term>> {
        match self.next()? {
            (Token::LParen, ..) => {}
            (token, line, column) => return Err(unexpected(&token, line, column, "'('")),
        }
        let mut terms = vec![self.parse_term()?];
        loop {
            match self.next()? {
                (Token::Comma, ..) => terms.push(self.parse_term()?),
                (Token::RParen, ..) => break,
                (token, line, column) => {
                    return Err(unexpected(&token, line, column, "',' or ')'"));
                }
            }
        }
        Ok(terms)
    }

    fn parse_term(&mut self) -> Result<Term> {
        match self.next()? {
            (Token::Variable(name), ..) => {
                if name == "_" {
                    // Each occurrence of '_' is a distinct variable
                    let fresh = format!("_{}", self.fresh);
                    self.fresh += 1;
                    Ok(Term::var(fresh))
                } else {
                    Ok(Term::var(name))
                }
            }
            (Token::Ident(name), ..) => Ok(Term::constant(self.interner.constant(&name))),
            (token, line, column) => Err(unexpected(&token, line, column, "a term")),
        }
    }

    fn peek(&self) -> Result<&Token> {
        self.tokens
            .get(self.pos)
            .map(|s| &s.token)
            .ok_or_else(|| self.eof())
    }

    fn peek_token(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn next(&mut self) -> Result<(Token, usize, usize)> {
        let spanned = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| self.eof())?;
        self.pos += 1;
        Ok((spanned.token, spanned.line, spanned.column))
    }

    fn eof(&self) -> Error {
        let (line, column) = self.tokens.last().map_or((1, 1), |s| (s.line, s.column));
        Error::Parse {
            line,
            column,
            message: "unexpected end of input".into(),
        }
    }
}

fn unexpected(token: &Token, line: usize, column: usize, what: &str) -> Error {
    Error::Parse {
        line,
        column,
        message: format!("expected {}, found {}", what, token.describe()),
    }
}
