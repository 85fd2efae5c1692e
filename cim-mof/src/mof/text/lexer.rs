/*!
 Splits MOF text into tokens.

 Keywords are not distinguished from other identifiers here; MOF keywords are case-insensitive and
 most of them are only reserved in one position, so the parser matches them by name.
*/

use crate::error::mof::MofError;

/// A token and the byte range of the text it was read from
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) token: Token,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Identifier(String),
    /// `$name`, stored without the `$`
    Alias(String),
    /// A string literal with its escapes resolved
    String(String),
    /// A character literal, `'c'`
    Char(u16),
    /// Decimal, hexadecimal, octal, or binary integer literals
    Integer(i128),
    Real(f64),
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Semicolon,
    Colon,
    Comma,
    Equals,
    Hash,
    Eof,
}

impl Token {
    /// How the token reads in an error message
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Identifier(name) => format!("`{name}`"),
            Token::Alias(name) => format!("`${name}`"),
            Token::String(_) => "a string".to_string(),
            Token::Char(_) => "a character".to_string(),
            Token::Integer(value) => format!("`{value}`"),
            Token::Real(value) => format!("`{value}`"),
            Token::OpenBrace => "`{`".to_string(),
            Token::CloseBrace => "`}`".to_string(),
            Token::OpenParen => "`(`".to_string(),
            Token::CloseParen => "`)`".to_string(),
            Token::OpenBracket => "`[`".to_string(),
            Token::CloseBracket => "`]`".to_string(),
            Token::Semicolon => "`;`".to_string(),
            Token::Colon => "`:`".to_string(),
            Token::Comma => "`,`".to_string(),
            Token::Equals => "`=`".to_string(),
            Token::Hash => "`#`".to_string(),
            Token::Eof => "the end of the text".to_string(),
        }
    }
}

/// Build a syntax error for byte `pos` of `text`, located by line and column
pub(crate) fn syntax_error(text: &str, pos: usize, message: impl Into<String>) -> MofError {
    let before = text.get(..pos).unwrap_or(text);
    let line = before.matches('\n').count() + 1;
    let column = before
        .rsplit('\n')
        .next()
        .map_or(0, |current| current.chars().count())
        + 1;
    MofError::Syntax {
        line,
        column,
        message: message.into(),
    }
}

/// Reads tokens one at a time from MOF text
pub(crate) struct Lexer<'s> {
    text: &'s str,
    pos: usize,
}

impl<'s> Lexer<'s> {
    pub(crate) fn new(text: &'s str) -> Self {
        Self { text, pos: 0 }
    }

    pub(crate) fn error_at(&self, pos: usize, message: impl Into<String>) -> MofError {
        syntax_error(self.text, pos, message)
    }

    fn peek_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.text[self.pos..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skip whitespace and both comment styles
    fn skip_trivia(&mut self) -> Result<(), MofError> {
        loop {
            match (self.peek_char(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.pos;
                    match self.text[start + 2..].find("*/") {
                        Some(length) => self.pos = start + 2 + length + 2,
                        None => return Err(self.error_at(start, "unterminated comment")),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Read the next token, returning [`Token::Eof`] once the text is exhausted
    pub(crate) fn next_token(&mut self) -> Result<Spanned, MofError> {
        self.skip_trivia()?;
        let start = self.pos;
        let Some(c) = self.peek_char() else {
            return Ok(Spanned {
                token: Token::Eof,
                start,
                end: start,
            });
        };

        let token = match c {
            '{' => self.punct(Token::OpenBrace),
            '}' => self.punct(Token::CloseBrace),
            '(' => self.punct(Token::OpenParen),
            ')' => self.punct(Token::CloseParen),
            '[' => self.punct(Token::OpenBracket),
            ']' => self.punct(Token::CloseBracket),
            ';' => self.punct(Token::Semicolon),
            ':' => self.punct(Token::Colon),
            ',' => self.punct(Token::Comma),
            '=' => self.punct(Token::Equals),
            '#' => self.punct(Token::Hash),
            '"' => Token::String(self.string()?),
            '\'' => Token::Char(self.char16()?),
            '$' => {
                self.bump();
                let name = self.identifier();
                if name.is_empty() {
                    return Err(self.error_at(start, "expected an alias name after `$`"));
                }
                Token::Alias(name)
            }
            c if c.is_ascii_digit() => self.number()?,
            '+' | '-' | '.'
                if self
                    .peek_second()
                    .is_some_and(|next| next.is_ascii_digit() || next == '.') =>
            {
                self.number()?
            }
            c if c.is_alphabetic() || c == '_' => Token::Identifier(self.identifier()),
            c => return Err(self.error_at(start, format!("unexpected character {c:?}"))),
        };

        Ok(Spanned {
            token,
            start,
            end: self.pos,
        })
    }

    fn punct(&mut self, token: Token) -> Token {
        self.bump();
        token
    }

    fn identifier(&mut self) -> String {
        let start = self.pos;
        while self
            .peek_char()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.bump();
        }
        self.text[start..self.pos].to_string()
    }

    fn string(&mut self) -> Result<String, MofError> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => out.push(self.escape(start)?),
                Some('\n') | None => return Err(self.error_at(start, "unterminated string")),
                Some(c) => out.push(c),
            }
        }
    }

    fn char16(&mut self) -> Result<u16, MofError> {
        let start = self.pos;
        self.bump();
        let c = match self.bump() {
            Some('\\') => self.escape(start)?,
            Some('\'' | '\n') | None => {
                return Err(self.error_at(start, "empty or unterminated character"))
            }
            Some(c) => c,
        };
        if self.bump() != Some('\'') {
            return Err(self.error_at(start, "unterminated character"));
        }
        u16::try_from(c as u32)
            .map_err(|_| self.error_at(start, "character does not fit in a char16"))
    }

    /// Resolve the escape after a `\`; `start` is where the literal began
    fn escape(&mut self, start: usize) -> Result<char, MofError> {
        let escaped = match self.bump() {
            Some('b') => '\u{8}',
            Some('t') => '\t',
            Some('n') => '\n',
            Some('f') => '\u{c}',
            Some('r') => '\r',
            Some(c @ ('"' | '\'' | '\\')) => c,
            Some('x' | 'X') => {
                let digits = self.pos;
                while self.pos - digits < 4 && self.peek_char().is_some_and(|c| c.is_ascii_hexdigit())
                {
                    self.bump();
                }
                u32::from_str_radix(&self.text[digits..self.pos], 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error_at(start, "invalid `\\x` escape"))?
            }
            _ => return Err(self.error_at(start, "invalid escape sequence")),
        };
        Ok(escaped)
    }

    fn number(&mut self) -> Result<Token, MofError> {
        let source = self.text;
        let start = self.pos;
        if matches!(self.peek_char(), Some('+' | '-')) {
            self.bump();
        }
        let body = self.pos;
        while let Some(c) = self.peek_char() {
            let after_exponent = matches!(source[..self.pos].chars().last(), Some('e' | 'E'))
                && !source[body..self.pos].to_ascii_lowercase().starts_with("0x");
            if c.is_ascii_alphanumeric() || c == '.' || (after_exponent && matches!(c, '+' | '-')) {
                self.bump();
            } else {
                break;
            }
        }

        let text = &source[start..self.pos];
        let digits = source[body..self.pos].to_ascii_lowercase();
        let invalid = || self.error_at(start, format!("invalid number `{text}`"));

        let magnitude = if let Some(hex) = digits.strip_prefix("0x") {
            u128::from_str_radix(hex, 16).ok()
        } else if let Some(binary) = digits
            .strip_suffix('b')
            .filter(|bits| !bits.is_empty() && bits.bytes().all(|bit| bit == b'0' || bit == b'1'))
        {
            u128::from_str_radix(binary, 2).ok()
        } else if digits.contains(['.', 'e']) {
            return text.parse::<f64>().map(Token::Real).map_err(|_| invalid());
        } else if digits.len() > 1 && digits.starts_with('0') {
            u128::from_str_radix(&digits[1..], 8).ok()
        } else {
            digits.parse::<u128>().ok()
        };

        let magnitude = magnitude
            .and_then(|value| i128::try_from(value).ok())
            .ok_or_else(invalid)?;
        Ok(Token::Integer(if text.starts_with('-') {
            -magnitude
        } else {
            magnitude
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::mof::MofError,
        mof::text::lexer::{Lexer, Token},
    };

    fn tokens(text: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(text);
        let mut out = vec![];
        loop {
            let spanned = lexer.next_token().unwrap();
            if spanned.token == Token::Eof {
                return out;
            }
            out.push(spanned.token);
        }
    }

    fn lex_error(text: &str) -> MofError {
        let mut lexer = Lexer::new(text);
        loop {
            match lexer.next_token() {
                Ok(spanned) if spanned.token == Token::Eof => panic!("expected an error"),
                Ok(_) => {}
                Err(why) => return why,
            }
        }
    }

    #[test]
    fn can_lex_class() {
        assert_eq!(
            tokens("class B:A{uint8 p1;};"),
            vec![
                Token::Identifier("class".to_string()),
                Token::Identifier("B".to_string()),
                Token::Colon,
                Token::Identifier("A".to_string()),
                Token::OpenBrace,
                Token::Identifier("uint8".to_string()),
                Token::Identifier("p1".to_string()),
                Token::Semicolon,
                Token::CloseBrace,
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn can_skip_comments() {
        let text = "// line\n/* block\n spanning */ #pragma";

        assert_eq!(
            tokens(text),
            vec![Token::Hash, Token::Identifier("pragma".to_string())]
        );
    }

    #[test]
    fn can_lex_numbers() {
        assert_eq!(
            tokens("42 -7 0x1F 101b 017 0 +3"),
            vec![
                Token::Integer(42),
                Token::Integer(-7),
                Token::Integer(31),
                Token::Integer(5),
                Token::Integer(15),
                Token::Integer(0),
                Token::Integer(3),
            ]
        );
        assert_eq!(
            tokens("1.5 -0.25 2.5e-3 .5"),
            vec![
                Token::Real(1.5),
                Token::Real(-0.25),
                Token::Real(2.5e-3),
                Token::Real(0.5),
            ]
        );
    }

    #[test]
    fn cant_lex_bad_number() {
        assert!(matches!(lex_error("12abc"), MofError::Syntax { .. }));
        assert!(matches!(lex_error("0x"), MofError::Syntax { .. }));
        assert!(matches!(lex_error("019"), MofError::Syntax { .. }));
    }

    #[test]
    fn can_lex_strings_and_chars() {
        assert_eq!(
            tokens(r#""a\"b\\c\n\x41" 'z' '\t' $alias"#),
            vec![
                Token::String("a\"b\\c\nA".to_string()),
                Token::Char(b'z' as u16),
                Token::Char(b'\t' as u16),
                Token::Alias("alias".to_string()),
            ]
        );
    }

    #[test]
    fn cant_lex_unterminated() {
        assert!(matches!(lex_error("\"abc"), MofError::Syntax { .. }));
        assert!(matches!(lex_error("\"abc\ndef\""), MofError::Syntax { .. }));
        assert!(matches!(lex_error("/* never closed"), MofError::Syntax { .. }));
        assert!(matches!(lex_error("'ab'"), MofError::Syntax { .. }));
    }

    #[test]
    fn reports_line_and_column() {
        match lex_error("class A\n{\n  string @p;\n};") {
            MofError::Syntax { line, column, .. } => {
                assert_eq!(line, 3);
                assert_eq!(column, 10);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn cant_lex_nul() {
        match lex_error("\0") {
            MofError::Syntax { line, column, .. } => assert_eq!((line, column), (1, 1)),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
