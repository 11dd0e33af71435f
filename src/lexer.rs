//! Lexer
//!
//! Hand-written char-by-char scanner rather than a table of compiled
//! regexes (see `SPEC_FULL.md`): at each position we dispatch on the
//! current character and greedily consume the longest token that
//! starts there, which is equivalent to "longest token by scanning a
//! fixed ordered list of patterns" for this grammar since no two rules
//! share a starting character class except digits-vs-identifier and
//! the multi-character operator families, both handled explicitly
//! below.

use crate::error::{CompileError, Result};
use crate::token::{Token, TokenKind, COMPARE_WORDS, KEYWORDS};

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while let Some(c) = self.peek(0) {
            if self.skip_trivia(c)? {
                continue;
            }
            match c {
                ';' => self.emit_char(TokenKind::StatementEnd),
                '\n' => {
                    // Tagged with the line it ends, so it stays in the
                    // same line-group as the tokens before it rather
                    // than leaking into the next line's group (see
                    // preprocessor::split_lines, which then trims
                    // *all* trailing statement-ends off a directive
                    // line rather than assuming exactly one).
                    self.emit_char(TokenKind::StatementEnd);
                    self.line += 1;
                }
                '"' => self.scan_string()?,
                '#' => self.emit_char(TokenKind::Preprocessing),
                ',' => self.emit_char(TokenKind::Comma),
                '(' => self.emit_char(TokenKind::LeftParen),
                ')' => self.emit_char(TokenKind::RightParen),
                '{' => self.emit_char(TokenKind::BlockStart),
                '}' => self.emit_char(TokenKind::BlockEnd),
                '[' => self.emit_char(TokenKind::SubscriptLeft),
                ']' => self.emit_char(TokenKind::SubscriptRight),
                c if c.is_ascii_digit() => self.scan_number()?,
                '.' if self.peek(1).map(|n| n.is_ascii_digit()).unwrap_or(false) => {
                    self.scan_leading_dot_float()
                }
                c if is_identifier_start(c) => self.scan_identifier(),
                '-' | '.' | '&' | '|' | '=' | '!' | '<' | '>' | '+' | '*' | '/' | '%' => {
                    self.scan_operator()?
                }
                _ => return Err(self.unexpected()),
            }
        }
        self.tokens.push(Token::new(TokenKind::StatementEnd, "", self.line));
        self.tokens.push(Token::new(TokenKind::Eof, "end of file", self.line));
        Ok(self.tokens)
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek(0);
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn emit_char(&mut self, kind: TokenKind) {
        let c = self.advance().expect("caller peeked a char");
        self.tokens.push(Token::new(kind, c.to_string(), self.line));
    }

    /// Consumes whitespace, escaped newlines, and comments. Returns
    /// `true` if something was consumed (caller should re-peek).
    fn skip_trivia(&mut self, c: char) -> Result<bool> {
        if c == '\\' && self.peek(1) == Some('\n') {
            self.advance();
            self.advance();
            self.line += 1;
            return Ok(true);
        }
        if c == ' ' || c == '\t' || c == '\r' {
            self.advance();
            return Ok(true);
        }
        if c == '/' && self.peek(1) == Some('/') {
            while let Some(c) = self.peek(0) {
                if c == '\n' {
                    break;
                }
                self.advance();
            }
            return Ok(true);
        }
        if c == '/' && self.peek(1) == Some('*') {
            self.advance();
            self.advance();
            loop {
                match self.peek(0) {
                    None => return Err(CompileError::tokenize("unterminated block comment")),
                    Some('*') if self.peek(1) == Some('/') => {
                        self.advance();
                        self.advance();
                        break;
                    }
                    Some('\n') => {
                        self.line += 1;
                        self.advance();
                    }
                    Some(_) => {
                        self.advance();
                    }
                }
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn scan_string(&mut self) -> Result<()> {
        let line = self.line;
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(CompileError::tokenize("unterminated string literal")),
                Some('"') => break,
                Some('\n') => return Err(CompileError::tokenize("unterminated string literal")),
                Some(c) => value.push(c),
            }
        }
        self.tokens.push(Token::new(TokenKind::String, value, line));
        Ok(())
    }

    fn scan_number(&mut self) -> Result<()> {
        let line = self.line;
        let start = self.pos;
        if self.peek(0) == Some('0') && matches!(self.peek(1), Some('b' | 'o' | 'x')) {
            self.advance();
            self.advance();
            let valid: fn(char) -> bool = match self.chars[start + 1] {
                'b' => |c| c == '0' || c == '1',
                'o' => |c| ('0'..='7').contains(&c),
                _ => |c| c.is_ascii_hexdigit(),
            };
            while self.peek(0).map(valid).unwrap_or(false) {
                self.advance();
            }
            let lexeme: String = self.chars[start..self.pos].iter().collect();
            self.tokens.push(Token::new(TokenKind::Integer, lexeme, line));
            return Ok(());
        }

        while self.peek(0).map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.advance();
        }
        let mut is_float = false;
        if self.peek(0) == Some('.') {
            is_float = true;
            self.advance();
            while self.peek(0).map(|c| c.is_ascii_digit()).unwrap_or(false) {
                self.advance();
            }
        }
        let lexeme: String = self.chars[start..self.pos].iter().collect();
        let kind = if is_float { TokenKind::Float } else { TokenKind::Integer };
        self.tokens.push(Token::new(kind, lexeme, line));
        Ok(())
    }

    /// `0?\.\d+` with the leading zero omitted, e.g. `.5`.
    fn scan_leading_dot_float(&mut self) {
        let line = self.line;
        let start = self.pos;
        self.advance();
        while self.peek(0).map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.advance();
        }
        let lexeme: String = self.chars[start..self.pos].iter().collect();
        self.tokens.push(Token::new(TokenKind::Float, lexeme, line));
    }

    fn scan_identifier(&mut self) {
        let line = self.line;
        let start = self.pos;
        while self.peek(0).map(is_identifier_continue).unwrap_or(false) {
            self.advance();
        }
        let lexeme: String = self.chars[start..self.pos].iter().collect();
        let kind = if KEYWORDS.contains(&lexeme.as_str()) {
            TokenKind::Keyword
        } else if COMPARE_WORDS.contains(&lexeme.as_str()) {
            TokenKind::Compare
        } else {
            TokenKind::Identifier
        };
        self.tokens.push(Token::new(kind, lexeme, line));
    }

    /// Multi-character operator families: assignment (`=`, `+=`, …),
    /// compare (`==`, `!=`, `<=`, `>=`, `<`, `>`), and plain operators
    /// (`&&`, `||`, `->`, `..`, `+`, `-`, `*`, `/`, `%`, `!`).
    fn scan_operator(&mut self) -> Result<()> {
        let line = self.line;
        let c = self.advance().expect("caller peeked a char");
        let next = self.peek(0);

        macro_rules! two {
            ($second:expr, $kind:expr) => {{
                self.advance();
                let lexeme = format!("{}{}", c, $second);
                self.tokens.push(Token::new($kind, lexeme, line));
                return Ok(());
            }};
        }

        match (c, next) {
            ('-', Some('>')) => two!('>', TokenKind::Operator),
            ('.', Some('.')) => two!('.', TokenKind::Operator),
            ('&', Some('&')) => two!('&', TokenKind::Operator),
            ('|', Some('|')) => two!('|', TokenKind::Operator),
            ('=', Some('=')) => two!('=', TokenKind::Compare),
            ('!', Some('=')) => two!('=', TokenKind::Compare),
            ('<', Some('=')) => two!('=', TokenKind::Compare),
            ('>', Some('=')) => two!('=', TokenKind::Compare),
            ('+', Some('=')) => two!('=', TokenKind::Assignment),
            ('-', Some('=')) => two!('=', TokenKind::Assignment),
            ('*', Some('=')) => two!('=', TokenKind::Assignment),
            ('/', Some('=')) => two!('=', TokenKind::Assignment),
            ('%', Some('=')) => two!('=', TokenKind::Assignment),
            ('<', _) => {
                self.tokens.push(Token::new(TokenKind::Compare, "<", line));
                Ok(())
            }
            ('>', _) => {
                self.tokens.push(Token::new(TokenKind::Compare, ">", line));
                Ok(())
            }
            ('=', _) => {
                self.tokens.push(Token::new(TokenKind::Assignment, "=", line));
                Ok(())
            }
            ('!', _) | ('+', _) | ('-', _) | ('*', _) | ('/', _) | ('%', _) => {
                self.tokens.push(Token::new(TokenKind::Operator, c.to_string(), line));
                Ok(())
            }
            _ => {
                self.pos -= 1;
                Err(self.unexpected())
            }
        }
    }

    fn unexpected(&self) -> CompileError {
        let remaining: String = self.chars[self.pos..].iter().take(5).collect();
        CompileError::tokenize(format!(
            "invalid or unexpected token on \"{}\"",
            remaining
        ))
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || is_cjk(c)
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || is_cjk(c)
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_source_ends_in_statement_end_then_eof() {
        assert_eq!(kinds(""), vec![TokenKind::StatementEnd, TokenKind::Eof]);
    }

    #[test]
    fn keywords_are_promoted() {
        let tokens = tokenize("var x").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn compare_words_are_promoted() {
        let tokens = tokenize("x in y").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Compare);
        assert_eq!(tokens[1].lexeme, "in");
    }

    #[test]
    fn line_comment_is_discarded() {
        let tokens = tokenize("1 // comment\n2").unwrap();
        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["1", "\n", "2", "", "end of file"]);
    }

    #[test]
    fn block_comment_advances_line_counter() {
        let tokens = tokenize("1 /* a\nb */ 2").unwrap();
        assert_eq!(tokens[2].line, 2);
    }

    #[test]
    fn string_literal_strips_quotes() {
        let tokens = tokenize("\"hi\"").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme, "hi");
    }

    #[test]
    fn radix_prefixed_integers() {
        let tokens = tokenize("0b101 0o17 0xFF").unwrap();
        assert_eq!(tokens[0].lexeme, "0b101");
        assert_eq!(tokens[1].lexeme, "0o17");
        assert_eq!(tokens[2].lexeme, "0xFF");
        assert!(tokens[..3].iter().all(|t| t.kind == TokenKind::Integer));
    }

    #[test]
    fn float_literal() {
        let tokens = tokenize("3.14").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Float);
        assert_eq!(tokens[0].lexeme, "3.14");
    }

    #[test]
    fn cjk_identifier() {
        let tokens = tokenize("变量").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].lexeme, "变量");
    }

    #[test]
    fn multi_char_operators() {
        let tokens = tokenize("a->b a..b a&&b a||b").unwrap();
        let ops: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.lexeme.as_str())
            .collect();
        assert_eq!(ops, vec!["->", "..", "&&", "||"]);
    }

    #[test]
    fn compare_operators_including_negated_forms() {
        let tokens = tokenize("a==b a!=b a<=b a>=b a<b a>b").unwrap();
        let cmp: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Compare)
            .map(|t| t.lexeme.as_str())
            .collect();
        assert_eq!(cmp, vec!["==", "!=", "<=", ">=", "<", ">"]);
    }

    #[test]
    fn assignment_operators() {
        let tokens = tokenize("a=1 a+=1 a-=1 a*=1 a/=1 a%=1").unwrap();
        let assigns: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Assignment)
            .map(|t| t.lexeme.as_str())
            .collect();
        assert_eq!(assigns, vec!["=", "+=", "-=", "*=", "/=", "%="]);
    }

    #[test]
    fn semicolon_and_newline_both_end_statements() {
        let tokens = tokenize("a;\nb").unwrap();
        let ends = tokens.iter().filter(|t| t.kind == TokenKind::StatementEnd).count();
        assert_eq!(ends, 3); // ';' + '\n' + final synthetic one
    }

    #[test]
    fn unmatched_input_reports_first_five_chars() {
        let err = tokenize("@@@@@@@@@@").unwrap_err();
        assert!(err.message.contains("@@@@@"));
    }

    #[test]
    fn leading_dot_float() {
        let tokens = tokenize(".5").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Float);
        assert_eq!(tokens[0].lexeme, ".5");
    }

    #[test]
    fn unary_minus_is_a_plain_operator_token() {
        let tokens = tokenize("-5").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Operator);
        assert_eq!(tokens[1].kind, TokenKind::Integer);
    }
}
